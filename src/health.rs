//! Health aggregation - folds KPI drops into a business activity level

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::criticity::CriticityTable;
use crate::error::{BamError, Result};
use crate::expression::{BooleanEvaluator, EvaluationMode};
use crate::impact::compute_drop;
use crate::models::{BaId, BooleanId, BusinessActivity, Kpi, KpiId, KpiSource, ServiceState};
use crate::store::{ConfigStore, StatusStore};

/// Level of a fully healthy activity
pub const FULL_HEALTH: u32 = 100;

/// Contribution of one KPI to its activity's level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KpiDrop {
    pub kpi_id: KpiId,
    /// Status the drop was computed from
    pub status: ServiceState,
    pub drop: u32,
}

/// Computed health of a business activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaHealth {
    pub ba_id: BaId,
    /// Health percentage, 0..=100
    pub level: u32,
    pub state: ServiceState,
    pub drops: Vec<KpiDrop>,
}

/// State of an activity at `level`, per its thresholds.
pub fn state_for_level(ba: &BusinessActivity, level: u32) -> ServiceState {
    if level <= ba.critical_threshold {
        ServiceState::Critical
    } else if level <= ba.warning_threshold {
        ServiceState::Warning
    } else {
        ServiceState::Ok
    }
}

/// State of one `compute_health` call
#[derive(Default)]
struct Walk {
    /// Activities on the current path
    visiting: HashSet<BaId>,
    /// Finished nested activities, each computed once per call
    states: HashMap<BaId, ServiceState>,
}

/// Computes activity health from the statuses of its active KPIs.
pub struct HealthAggregator<'a, S: ?Sized> {
    store: &'a S,
    table: &'a CriticityTable,
    max_depth: usize,
}

impl<'a, S> HealthAggregator<'a, S>
where
    S: ConfigStore + StatusStore + ?Sized,
{
    pub fn new(store: &'a S, table: &'a CriticityTable, max_depth: usize) -> Self {
        Self {
            store,
            table,
            max_depth,
        }
    }

    pub fn compute_health(&self, ba_id: BaId) -> Result<BaHealth> {
        let ba = self
            .store
            .business_activity(ba_id)
            .ok_or_else(|| BamError::ResourceNotFound(format!("business activity {}", ba_id)))?;

        let mut walk = Walk::default();
        walk.visiting.insert(ba_id);
        Ok(self.health_of(&ba, &mut walk, 0))
    }

    fn health_of(
        &self,
        ba: &BusinessActivity,
        walk: &mut Walk,
        depth: usize,
    ) -> BaHealth {
        if ba.in_downtime && ba.ignore_downtime_inheritance {
            return BaHealth {
                ba_id: ba.id,
                level: FULL_HEALTH,
                state: ServiceState::Ok,
                drops: Vec::new(),
            };
        }

        let mut drops = Vec::new();
        let mut total: u32 = 0;
        for kpi in self.store.kpis(ba.id).into_iter().filter(|kpi| kpi.active) {
            let effective = self.effective_kpi(kpi, walk, depth);
            let drop = compute_drop(&effective, self.table);
            total = total.saturating_add(drop);
            drops.push(KpiDrop {
                kpi_id: effective.id,
                status: effective.current_status,
                drop,
            });
        }

        let level = FULL_HEALTH.saturating_sub(total);
        let state = state_for_level(ba, level);
        debug!(
            ba_id = ba.id,
            level = level,
            state = state.as_str(),
            kpis = drops.len(),
            "Business activity health computed"
        );

        BaHealth {
            ba_id: ba.id,
            level,
            state,
            drops,
        }
    }

    /// The KPI with its status (and downtime, for nested activities) derived from its source.
    fn effective_kpi(&self, mut kpi: Kpi, walk: &mut Walk, depth: usize) -> Kpi {
        match kpi.source {
            KpiSource::HostService { .. } | KpiSource::MetaService { .. } => {}
            KpiSource::NestedBa { ba_id } => {
                let nested = self.store.business_activity(ba_id);
                let finished = walk.states.get(&ba_id).copied();
                kpi.current_status = match (&nested, finished) {
                    (Some(_), Some(state)) => state,
                    (Some(_), None)
                        if walk.visiting.contains(&ba_id) || depth + 1 > self.max_depth =>
                    {
                        warn!(
                            kpi_id = kpi.id,
                            nested_ba_id = ba_id,
                            depth = depth,
                            "Nested business activity revisited or too deep"
                        );
                        ServiceState::Unknown
                    }
                    (Some(nested), None) => {
                        walk.visiting.insert(ba_id);
                        let state = self.health_of(nested, walk, depth + 1).state;
                        walk.visiting.remove(&ba_id);
                        walk.states.insert(ba_id, state);
                        state
                    }
                    (None, _) => ServiceState::Unknown,
                };
                if nested.map_or(false, |nested| nested.in_downtime) {
                    kpi.in_downtime = true;
                }
            }
            KpiSource::BooleanRule { boolean_id } => {
                kpi.current_status = self.rule_status(kpi.id, boolean_id);
            }
        }
        kpi
    }

    fn rule_status(&self, kpi_id: KpiId, boolean_id: BooleanId) -> ServiceState {
        let Some(rule) = self.store.boolean_rule(boolean_id) else {
            warn!(kpi_id = kpi_id, boolean_id = boolean_id, "Boolean rule not found");
            return ServiceState::Unknown;
        };
        if !rule.active {
            return ServiceState::Ok;
        }

        match BooleanEvaluator::new(self.store, self.store)
            .evaluate(&rule.expression, EvaluationMode::Live)
        {
            Ok(value) if value == rule.impact_if => ServiceState::Critical,
            Ok(_) => ServiceState::Ok,
            Err(e) => {
                warn!(
                    kpi_id = kpi_id,
                    boolean_id = boolean_id,
                    error = %e,
                    "Boolean rule evaluation failed"
                );
                ServiceState::Unknown
            }
        }
    }
}
