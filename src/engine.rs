//! Engine facade shared by the admin layer

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::criticity::{CriticityRegistry, CriticityTable};
use crate::error::{BamError, Result};
use crate::expression::{decompose, BooleanEvaluator, Decomposition, Evaluation, EvaluationMode};
use crate::health::{BaHealth, HealthAggregator};
use crate::impact;
use crate::metrics::EngineMetrics;
use crate::models::{BaId, BusinessActivity, CollectorId, Kpi, KpiSource};
use crate::store::{ConfigStore, StatusStore, TopologyStore};
use crate::validation::{
    validate_thresholds, AttachmentValidator, DependencyGraphValidator, DependencyLink,
    PollerAffinityValidator,
};

/// One problem found in stored configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditFinding {
    pub ba_id: BaId,
    pub error: BamError,
}

/// Result of [`Engine::audit`]
#[derive(Debug, Clone, Default)]
pub struct AuditReport {
    pub findings: Vec<AuditFinding>,
    /// Health of every activity, in id order
    pub health: Vec<BaHealth>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Aggregation and consistency engine over a store.
///
/// Clones share the store, the criticity registry and the counters.
pub struct Engine<S> {
    store: Arc<S>,
    criticity: CriticityRegistry,
    config: EngineConfig,
    metrics: Arc<EngineMetrics>,
}

impl<S> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            criticity: self.criticity.clone(),
            config: self.config.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<S> Engine<S>
where
    S: ConfigStore + TopologyStore + StatusStore,
{
    pub fn new(store: S, criticity: CriticityTable, config: EngineConfig) -> Self {
        Self {
            store: Arc::new(store),
            criticity: CriticityRegistry::new(criticity),
            config,
            metrics: Arc::new(EngineMetrics::new()),
        }
    }

    /// Create an engine, loading the criticity table `config` points to
    pub fn from_config(store: S, config: EngineConfig) -> Result<Self> {
        let table = config.criticity_table()?;
        info!(
            levels = table.len(),
            max_walk_depth = config.max_walk_depth,
            "Engine configured"
        );
        Ok(Self::new(store, table, config))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub fn criticity(&self) -> Arc<CriticityTable> {
        self.criticity.snapshot()
    }

    pub fn reload_criticity(&self, table: CriticityTable) {
        self.criticity.reload(table);
    }

    /// Count a guard result, logging rejections
    fn guard<T>(&self, operation: &'static str, result: Result<T>) -> Result<T> {
        self.metrics.inc_validations();
        if let Err(e) = &result {
            self.metrics.inc_rejections();
            warn!(operation = operation, error = %e, "Configuration change rejected");
        }
        result
    }

    pub fn validate_business_activity(&self, ba: &BusinessActivity) -> Result<()> {
        let result = AttachmentValidator::new(self.store.as_ref()).validate_ba(ba);
        self.guard("validate_business_activity", result)
    }

    pub fn validate_kpi(&self, kpi: &Kpi) -> Result<()> {
        let result = AttachmentValidator::new(self.store.as_ref()).validate_kpi(kpi);
        self.guard("validate_kpi", result)
    }

    /// Whether `source` may be added to `ba` given its remote collector
    pub fn check_kpi_for_ba(&self, ba: &BusinessActivity, source: &KpiSource) -> Result<()> {
        let result = AttachmentValidator::new(self.store.as_ref()).check_kpi_for_ba(ba, source);
        self.guard("check_kpi_for_ba", result)
    }

    /// Whether `candidate_child` can be nested in `target`. Self-attachment is never allowed.
    pub fn can_attach(&self, candidate_child: BaId, target: BaId) -> bool {
        self.check_attach(candidate_child, target).is_ok()
    }

    pub fn check_attach(&self, candidate_child: BaId, target: BaId) -> Result<()> {
        let result = if candidate_child == target {
            Err(BamError::SelfAttachment(target))
        } else {
            DependencyGraphValidator::new(self.store.as_ref()).check_attach(candidate_child, target)
        };
        self.guard("check_attach", result)
    }

    pub fn is_collector_compatible(&self, ba_id: BaId, collector_id: CollectorId) -> bool {
        self.check_collector(ba_id, collector_id).is_ok()
    }

    pub fn check_collector(&self, ba_id: BaId, collector_id: CollectorId) -> Result<()> {
        let result =
            PollerAffinityValidator::new(self.store.as_ref()).check_collector(ba_id, collector_id);
        self.guard("check_collector", result)
    }

    pub fn chain_of_dependencies(&self, ba_id: BaId) -> Vec<DependencyLink> {
        PollerAffinityValidator::new(self.store.as_ref()).chain_of_dependencies(ba_id)
    }

    pub fn evaluate_rule(&self, expression: &str, mode: EvaluationMode<'_>) -> Result<bool> {
        self.evaluate_rule_detailed(expression, mode)
            .map(|evaluation| evaluation.value)
    }

    pub fn evaluate_rule_detailed(
        &self,
        expression: &str,
        mode: EvaluationMode<'_>,
    ) -> Result<Evaluation> {
        self.metrics.inc_evaluations();
        let store = self.store.as_ref();
        let result = BooleanEvaluator::new(store, store).evaluate_detailed(expression, mode);
        if result.is_err() {
            self.metrics.inc_evaluation_failures();
        }
        result
    }

    pub fn decompose(&self, expression: &str) -> Result<Decomposition> {
        decompose(expression)
    }

    /// Drop of `kpi` under the current criticity table
    pub fn compute_drop(&self, kpi: &Kpi) -> u32 {
        impact::compute_drop(kpi, &self.criticity.snapshot())
    }

    pub fn compute_health(&self, ba_id: BaId) -> Result<BaHealth> {
        self.metrics.inc_health_computations();
        let table = self.criticity.snapshot();
        HealthAggregator::new(self.store.as_ref(), &table, self.config.max_walk_depth)
            .compute_health(ba_id)
    }

    /// Check every stored activity and compute its health.
    ///
    /// Covers threshold ordering, cycles already present in stored data,
    /// compatibility with each additional collector and boolean rule references.
    pub fn audit(&self) -> AuditReport {
        let store = self.store.as_ref();
        let dependency = DependencyGraphValidator::new(store);
        let poller = PollerAffinityValidator::new(store);
        let evaluator = BooleanEvaluator::new(store, store);
        let mut report = AuditReport::default();

        let activities = store.business_activities();
        for ba in &activities {
            if let Err(error) = validate_thresholds(ba) {
                report.findings.push(AuditFinding { ba_id: ba.id, error });
            }
            if let Some(collector_id) = ba.assigned_collectors.additional {
                if let Err(error) = poller.check_collector(ba.id, collector_id) {
                    report.findings.push(AuditFinding { ba_id: ba.id, error });
                }
            }
            for kpi in store.kpis(ba.id) {
                if let KpiSource::BooleanRule { boolean_id } = kpi.source {
                    let result = match store.boolean_rule(boolean_id) {
                        Some(rule) => evaluator.check(&rule.expression),
                        None => Err(BamError::ResourceNotFound(kpi.source.describe())),
                    };
                    if let Err(error) = result {
                        report.findings.push(AuditFinding { ba_id: ba.id, error });
                    }
                }
            }
        }

        // Re-running the attach walk on one edge of each cycle names the offending path.
        for cycle in dependency.find_cycles() {
            let parent = cycle[0];
            let child = store
                .kpis(parent)
                .iter()
                .filter_map(|kpi| kpi.nested_ba())
                .find(|nested| cycle.contains(nested));
            if let Some(Err(error)) = child.map(|child| dependency.check_attach(child, parent)) {
                report.findings.push(AuditFinding {
                    ba_id: parent,
                    error,
                });
            }
        }

        for ba in &activities {
            match self.compute_health(ba.id) {
                Ok(health) => report.health.push(health),
                Err(e) => warn!(ba_id = ba.id, error = %e, "Health computation failed"),
            }
        }

        info!(
            business_activities = activities.len(),
            findings = report.findings.len(),
            "Configuration audit complete"
        );
        report
    }
}
