//! Cycle guard for business activities nested inside other activities

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use std::collections::HashSet;
use tracing::debug;

use crate::error::{BamError, Result};
use crate::models::BaId;
use crate::store::ConfigStore;

pub struct DependencyGraphValidator<'a, C: ?Sized> {
    store: &'a C,
}

impl<'a, C: ConfigStore + ?Sized> DependencyGraphValidator<'a, C> {
    pub fn new(store: &'a C) -> Self {
        Self { store }
    }

    /// Whether `candidate_child` can become a KPI of `target` without a cycle.
    ///
    /// Self-attachment must be rejected by the caller before this walk.
    pub fn can_attach(&self, candidate_child: BaId, target: BaId) -> bool {
        self.check_attach(candidate_child, target).is_ok()
    }

    /// Walk the nested activities of `candidate_child`, failing on the first
    /// edge that leads back to `target`.
    pub fn check_attach(&self, candidate_child: BaId, target: BaId) -> Result<()> {
        let mut visited = HashSet::from([candidate_child]);
        let mut stack = vec![candidate_child];

        while let Some(ba_id) = stack.pop() {
            for nested in self.store.kpis(ba_id).iter().filter_map(|kpi| kpi.nested_ba()) {
                if nested == target {
                    debug!(
                        parent = target,
                        child = candidate_child,
                        edge_from = ba_id,
                        edge_to = nested,
                        "Nested activity leads back to target"
                    );
                    return Err(BamError::CyclicDependency {
                        parent: target,
                        child: candidate_child,
                        edge_from: ba_id,
                        edge_to: nested,
                    });
                }
                if visited.insert(nested) {
                    stack.push(nested);
                }
            }
        }

        debug!(
            parent = target,
            child = candidate_child,
            walked = visited.len(),
            "No cycle found"
        );
        Ok(())
    }

    /// Activities already caught in a cycle in stored data.
    ///
    /// Each entry is one strongly connected component, ids sorted; self-loops
    /// are reported as single-element components.
    pub fn find_cycles(&self) -> Vec<Vec<BaId>> {
        let mut graph: DiGraphMap<BaId, ()> = DiGraphMap::new();
        for ba in self.store.business_activities() {
            graph.add_node(ba.id);
            for nested in self.store.kpis(ba.id).iter().filter_map(|kpi| kpi.nested_ba()) {
                graph.add_edge(ba.id, nested, ());
            }
        }

        let mut cycles: Vec<Vec<BaId>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
            .map(|mut scc| {
                scc.sort_unstable();
                scc
            })
            .collect();
        cycles.sort();
        cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BusinessActivity, ImpactConfig, Kpi, KpiSource};
    use crate::store::InMemoryStore;

    fn nest(store: &mut InMemoryStore, kpi_id: u32, parent: BaId, child: BaId) {
        store.put_kpi(Kpi::new(
            kpi_id,
            parent,
            KpiSource::NestedBa { ba_id: child },
            ImpactConfig::Direct {
                warning: 10,
                critical: 50,
                unknown: 10,
            },
        ));
    }

    /// BA1 feeds BA2 which feeds BA3; BA4 is unrelated
    fn chain() -> InMemoryStore {
        let mut store = InMemoryStore::new();
        for id in 1..=4 {
            store.put_business_activity(BusinessActivity::new(id, format!("ba{id}"), 80, 50, 1));
        }
        nest(&mut store, 1, 2, 1);
        nest(&mut store, 2, 3, 2);
        store
    }

    #[test]
    fn test_chain_rejects_back_edge() {
        let store = chain();
        let validator = DependencyGraphValidator::new(&store);

        assert!(!validator.can_attach(3, 1));
        assert!(!validator.can_attach(2, 1));
        assert!(validator.can_attach(3, 4));
        // Diamonds are not cycles.
        assert!(validator.can_attach(1, 3));
    }

    #[test]
    fn test_cycle_error_names_edge() {
        let store = chain();
        let validator = DependencyGraphValidator::new(&store);
        let err = validator.check_attach(3, 1).unwrap_err();
        assert_eq!(
            err,
            BamError::CyclicDependency {
                parent: 1,
                child: 3,
                edge_from: 2,
                edge_to: 1,
            }
        );
    }

    #[test]
    fn test_walk_terminates_on_corrupt_data() {
        let mut store = chain();
        // Stored data predating the guard: BA2 -> BA3 closes a loop.
        nest(&mut store, 3, 2, 3);
        let validator = DependencyGraphValidator::new(&store);

        assert!(validator.can_attach(3, 4));
        assert!(!validator.can_attach(3, 1));
        assert_eq!(validator.find_cycles(), vec![vec![2, 3]]);
    }

    #[test]
    fn test_find_cycles_reports_self_loop() {
        let mut store = chain();
        nest(&mut store, 9, 4, 4);
        let validator = DependencyGraphValidator::new(&store);
        assert_eq!(validator.find_cycles(), vec![vec![4]]);
    }
}
