//! Collector (poller) affinity of business activity dependencies

use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

use crate::error::{BamError, Result};
use crate::expression::decompose;
use crate::models::{BaId, CollectorId, HostId, KpiSource};
use crate::store::{ConfigStore, TopologyStore};

/// One `HostService` or `NestedBa` KPI reachable from an activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DependencyLink {
    /// Activity holding the KPI
    pub ba_id: BaId,
    pub host_id: Option<HostId>,
    pub nested_ba_id: Option<BaId>,
}

pub struct PollerAffinityValidator<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> PollerAffinityValidator<'a, S>
where
    S: ConfigStore + TopologyStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Whether every dependency of `ba_id` is observable by `collector_id`
    pub fn is_collector_compatible(&self, ba_id: BaId, collector_id: CollectorId) -> bool {
        self.check_collector(ba_id, collector_id).is_ok()
    }

    /// Fails on the first KPI of `ba_id` that `collector_id` cannot observe.
    pub fn check_collector(&self, ba_id: BaId, collector_id: CollectorId) -> Result<()> {
        if self.store.business_activity(ba_id).is_none() {
            return Err(BamError::ResourceNotFound(format!(
                "business activity {}",
                ba_id
            )));
        }

        let kpis = self.store.kpis(ba_id);
        for kpi in &kpis {
            self.check_source(ba_id, &kpi.source, collector_id)?;
        }

        debug!(
            ba_id = ba_id,
            collector_id = collector_id,
            kpis = kpis.len(),
            "Collector compatible"
        );
        Ok(())
    }

    /// Check that `collector_id` can observe what `source` depends on.
    ///
    /// Meta services are computed centrally and are not checked.
    pub fn check_source(
        &self,
        ba_id: BaId,
        source: &KpiSource,
        collector_id: CollectorId,
    ) -> Result<()> {
        let mismatch = |resource: String| BamError::CollectorMismatch {
            ba_id,
            collector_id,
            resource,
        };

        match *source {
            KpiSource::HostService { host_id, .. } => {
                if self.store.host_collector(host_id) != Some(collector_id) {
                    return Err(mismatch(format!("host {}", host_id)));
                }
            }
            KpiSource::NestedBa { ba_id: nested } => {
                let nested_ba = self.store.business_activity(nested).ok_or_else(|| {
                    BamError::ResourceNotFound(format!("business activity {}", nested))
                })?;
                if !nested_ba.assigned_collectors.contains(collector_id) {
                    return Err(mismatch(format!("business activity {}", nested)));
                }
            }
            KpiSource::BooleanRule { boolean_id } => {
                let rule = self.store.boolean_rule(boolean_id).ok_or_else(|| {
                    BamError::ResourceNotFound(format!("boolean rule {}", boolean_id))
                })?;
                let decomposition = decompose(&rule.expression)?;
                for host in decomposition.hosts() {
                    if self.store.host_collector_by_name(host) != Some(collector_id) {
                        return Err(mismatch(format!(
                            "host {} of boolean rule {}",
                            host, boolean_id
                        )));
                    }
                }
            }
            KpiSource::MetaService { .. } => {}
        }
        Ok(())
    }

    /// Every `HostService` / `NestedBa` KPI reachable from `ba_id` through nested activities.
    pub fn chain_of_dependencies(&self, ba_id: BaId) -> Vec<DependencyLink> {
        let mut links = Vec::new();
        let mut visited = HashSet::from([ba_id]);
        let mut stack = vec![ba_id];

        while let Some(current) = stack.pop() {
            let mut nested_ids = Vec::new();
            for kpi in self.store.kpis(current) {
                match kpi.source {
                    KpiSource::HostService { host_id, .. } => links.push(DependencyLink {
                        ba_id: current,
                        host_id: Some(host_id),
                        nested_ba_id: None,
                    }),
                    KpiSource::NestedBa { ba_id: nested } => {
                        links.push(DependencyLink {
                            ba_id: current,
                            host_id: None,
                            nested_ba_id: Some(nested),
                        });
                        if visited.insert(nested) {
                            nested_ids.push(nested);
                        }
                    }
                    _ => {}
                }
            }
            // Reverse so the first nested activity is walked first.
            stack.extend(nested_ids.into_iter().rev());
        }

        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BooleanRule, BusinessActivity, ImpactConfig, Kpi};
    use crate::store::InMemoryStore;

    const IMPACT: ImpactConfig = ImpactConfig::Direct {
        warning: 10,
        critical: 50,
        unknown: 10,
    };

    fn store() -> InMemoryStore {
        let mut store = InMemoryStore::new();
        store.add_host(1, "web-01", 1);
        store.add_host(2, "web-02", 2);
        store.add_service(1, 10, "http");
        store.add_service(2, 20, "http");
        store.put_business_activity(BusinessActivity::new(1, "shop", 80, 50, 1));
        store.put_business_activity(BusinessActivity::new(2, "front", 80, 50, 1));
        store
    }

    #[test]
    fn test_host_service_mismatch_then_rebind() {
        let mut store = store();
        store.put_kpi(Kpi::new(
            1,
            1,
            KpiSource::HostService {
                host_id: 1,
                service_id: 10,
            },
            IMPACT,
        ));

        let validator = PollerAffinityValidator::new(&store);
        assert!(validator.is_collector_compatible(1, 1));
        assert_eq!(
            validator.check_collector(1, 2).unwrap_err(),
            BamError::CollectorMismatch {
                ba_id: 1,
                collector_id: 2,
                resource: "host 1".into(),
            }
        );

        store.bind_host(1, 2);
        let validator = PollerAffinityValidator::new(&store);
        assert!(validator.is_collector_compatible(1, 2));
    }

    #[test]
    fn test_nested_ba_needs_collector_assignment() {
        let mut store = store();
        store.put_kpi(Kpi::new(1, 1, KpiSource::NestedBa { ba_id: 2 }, IMPACT));

        let validator = PollerAffinityValidator::new(&store);
        assert!(!validator.is_collector_compatible(1, 2));

        store.put_business_activity(
            BusinessActivity::new(2, "front", 80, 50, 1).with_additional_collector(2),
        );
        let validator = PollerAffinityValidator::new(&store);
        assert!(validator.is_collector_compatible(1, 2));
    }

    #[test]
    fn test_boolean_rule_hosts() {
        let mut store = store();
        store.put_boolean_rule(BooleanRule {
            id: 5,
            name: "both fronts".into(),
            expression: "{web-01 http} {IS} {OK} {AND} {web-02 http} {IS} {OK}".into(),
            impact_if: false,
            active: true,
        });
        store.put_kpi(Kpi::new(1, 1, KpiSource::BooleanRule { boolean_id: 5 }, IMPACT));

        let validator = PollerAffinityValidator::new(&store);
        let err = validator.check_collector(1, 1).unwrap_err();
        assert_eq!(
            err,
            BamError::CollectorMismatch {
                ba_id: 1,
                collector_id: 1,
                resource: "host WEB-02 of boolean rule 5".into(),
            }
        );

        store.bind_host(2, 1);
        let validator = PollerAffinityValidator::new(&store);
        assert!(validator.is_collector_compatible(1, 1));
    }

    #[test]
    fn test_empty_activity_is_compatible() {
        let store = store();
        let validator = PollerAffinityValidator::new(&store);
        assert!(validator.is_collector_compatible(2, 42));
        assert!(matches!(
            validator.check_collector(99, 1),
            Err(BamError::ResourceNotFound(_))
        ));
    }

    #[test]
    fn test_chain_of_dependencies() {
        let mut store = store();
        store.put_business_activity(BusinessActivity::new(3, "payments", 80, 50, 1));
        store.put_kpi(Kpi::new(
            1,
            1,
            KpiSource::HostService {
                host_id: 1,
                service_id: 10,
            },
            IMPACT,
        ));
        store.put_kpi(Kpi::new(2, 1, KpiSource::NestedBa { ba_id: 2 }, IMPACT));
        store.put_kpi(Kpi::new(3, 1, KpiSource::MetaService { meta_id: 4 }, IMPACT));
        store.put_kpi(Kpi::new(
            4,
            2,
            KpiSource::HostService {
                host_id: 2,
                service_id: 20,
            },
            IMPACT,
        ));
        store.put_kpi(Kpi::new(5, 2, KpiSource::NestedBa { ba_id: 3 }, IMPACT));
        // Corrupt back edge, must not loop.
        store.put_kpi(Kpi::new(6, 3, KpiSource::NestedBa { ba_id: 1 }, IMPACT));

        let validator = PollerAffinityValidator::new(&store);
        let links = validator.chain_of_dependencies(1);

        assert_eq!(
            links,
            vec![
                DependencyLink { ba_id: 1, host_id: Some(1), nested_ba_id: None },
                DependencyLink { ba_id: 1, host_id: None, nested_ba_id: Some(2) },
                DependencyLink { ba_id: 2, host_id: Some(2), nested_ba_id: None },
                DependencyLink { ba_id: 2, host_id: None, nested_ba_id: Some(3) },
                DependencyLink { ba_id: 3, host_id: None, nested_ba_id: Some(1) },
            ]
        );
    }
}
