//! Read access to configuration, collector topology and live statuses

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::models::{
    BaId, BooleanId, BooleanRule, BusinessActivity, CollectorId, ConfiguredService, Host, HostId,
    Kpi, KpiId, MetaId, ResourceState, ServiceId,
};

/// Persisted business activity configuration
pub trait ConfigStore {
    fn business_activity(&self, ba_id: BaId) -> Option<BusinessActivity>;

    /// Every activity, ordered by id
    fn business_activities(&self) -> Vec<BusinessActivity>;

    /// KPIs attached to `ba_id`, ordered by KPI id
    fn kpis(&self, ba_id: BaId) -> Vec<Kpi>;

    fn boolean_rule(&self, boolean_id: BooleanId) -> Option<BooleanRule>;

    fn meta_service_exists(&self, meta_id: MetaId) -> bool;

    fn service_configured(&self, host_id: HostId, service_id: ServiceId) -> bool;

    /// Configured service by host name and service description, case-insensitive
    fn find_service(&self, host_name: &str, description: &str) -> Option<ConfiguredService>;
}

/// Host to collector bindings
pub trait TopologyStore {
    fn host_collector(&self, host_id: HostId) -> Option<CollectorId>;

    fn host_collector_by_name(&self, host_name: &str) -> Option<CollectorId>;
}

/// Live monitoring statuses
pub trait StatusStore {
    /// `None` when the service is not currently monitored
    fn service_state(&self, host_name: &str, description: &str) -> Option<ResourceState>;
}

/// Live status of one service, as stored in a snapshot file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservedStatus {
    pub host_name: String,
    pub description: String,
    #[serde(flatten)]
    pub state: ResourceState,
}

/// Serializable view of everything the engine reads
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub business_activities: Vec<BusinessActivity>,
    pub kpis: Vec<Kpi>,
    pub boolean_rules: Vec<BooleanRule>,
    pub hosts: Vec<Host>,
    pub services: Vec<ConfiguredService>,
    pub meta_services: Vec<MetaId>,
    pub statuses: Vec<ObservedStatus>,
}

type ServiceKey = (String, String);

/// Case-insensitive lookup key with runs of whitespace collapsed to one space
fn fold_name(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase()
}

fn host_key(host_name: &str) -> String {
    fold_name(host_name)
}

fn service_key(host_name: &str, description: &str) -> ServiceKey {
    (host_key(host_name), fold_name(description))
}

/// In-memory store over a consistent configuration snapshot
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    bas: BTreeMap<BaId, BusinessActivity>,
    kpis: BTreeMap<KpiId, Kpi>,
    boolean_rules: HashMap<BooleanId, BooleanRule>,
    hosts: HashMap<HostId, Host>,
    host_names: HashMap<String, HostId>,
    services: HashMap<ServiceKey, ConfiguredService>,
    service_ids: HashSet<(HostId, ServiceId)>,
    meta_services: HashSet<MetaId>,
    statuses: HashMap<ServiceKey, ResourceState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a snapshot. Services referencing unknown hosts are skipped.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut store = Self::new();
        for host in snapshot.hosts {
            store.add_host(host.id, host.name, host.collector_id);
        }
        for service in snapshot.services {
            store.add_service(service.host_id, service.service_id, service.description);
        }
        for meta_id in snapshot.meta_services {
            store.add_meta_service(meta_id);
        }
        for ba in snapshot.business_activities {
            store.put_business_activity(ba);
        }
        for kpi in snapshot.kpis {
            store.put_kpi(kpi);
        }
        for rule in snapshot.boolean_rules {
            store.put_boolean_rule(rule);
        }
        for observed in snapshot.statuses {
            store.set_service_state(&observed.host_name, &observed.description, observed.state);
        }
        store
    }

    /// Load a JSON snapshot file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&raw)?;
        let store = Self::from_snapshot(snapshot);
        info!(
            path = ?path,
            business_activities = store.bas.len(),
            kpis = store.kpis.len(),
            "Configuration snapshot loaded"
        );
        Ok(store)
    }

    /// Add a host or move an existing one to another collector
    pub fn add_host(&mut self, id: HostId, name: impl Into<String>, collector_id: CollectorId) {
        let name = name.into();
        let new_key = host_key(&name);
        if let Some(previous) = self.hosts.get(&id) {
            let old_key = host_key(&previous.name);
            if old_key != new_key {
                self.host_names.remove(&old_key);
                self.rekey_host(id, &old_key, &new_key);
            }
        }
        self.host_names.insert(new_key, id);
        self.hosts.insert(
            id,
            Host {
                id,
                name,
                collector_id,
            },
        );
    }

    /// Move the services and statuses of a renamed host under its new name
    fn rekey_host(&mut self, id: HostId, old_key: &str, new_key: &str) {
        let moved: Vec<ServiceKey> = self
            .services
            .iter()
            .filter(|((host, _), service)| host == old_key && service.host_id == id)
            .map(|(key, _)| key.clone())
            .collect();
        for key in moved {
            if let Some(service) = self.services.remove(&key) {
                self.services.insert((new_key.to_string(), key.1), service);
            }
        }

        let moved: Vec<ServiceKey> = self
            .statuses
            .keys()
            .filter(|(host, _)| host == old_key)
            .cloned()
            .collect();
        for key in moved {
            if let Some(state) = self.statuses.remove(&key) {
                self.statuses.insert((new_key.to_string(), key.1), state);
            }
        }
    }

    /// Rebind a known host to `collector_id`. Returns false if the host is unknown.
    pub fn bind_host(&mut self, host_id: HostId, collector_id: CollectorId) -> bool {
        match self.hosts.get_mut(&host_id) {
            Some(host) => {
                host.collector_id = collector_id;
                true
            }
            None => false,
        }
    }

    pub fn add_service(
        &mut self,
        host_id: HostId,
        service_id: ServiceId,
        description: impl Into<String>,
    ) -> bool {
        let Some(host) = self.hosts.get(&host_id) else {
            return false;
        };
        let description = description.into();
        self.services.insert(
            service_key(&host.name, &description),
            ConfiguredService {
                host_id,
                service_id,
                description,
            },
        );
        self.service_ids.insert((host_id, service_id));
        true
    }

    pub fn add_meta_service(&mut self, meta_id: MetaId) {
        self.meta_services.insert(meta_id);
    }

    pub fn put_business_activity(&mut self, ba: BusinessActivity) {
        self.bas.insert(ba.id, ba);
    }

    pub fn put_kpi(&mut self, kpi: Kpi) {
        self.kpis.insert(kpi.id, kpi);
    }

    pub fn remove_kpi(&mut self, kpi_id: KpiId) -> Option<Kpi> {
        self.kpis.remove(&kpi_id)
    }

    pub fn put_boolean_rule(&mut self, rule: BooleanRule) {
        self.boolean_rules.insert(rule.id, rule);
    }

    pub fn set_service_state(&mut self, host_name: &str, description: &str, state: ResourceState) {
        self.statuses
            .insert(service_key(host_name, description), state);
    }
}

impl ConfigStore for InMemoryStore {
    fn business_activity(&self, ba_id: BaId) -> Option<BusinessActivity> {
        self.bas.get(&ba_id).cloned()
    }

    fn business_activities(&self) -> Vec<BusinessActivity> {
        self.bas.values().cloned().collect()
    }

    fn kpis(&self, ba_id: BaId) -> Vec<Kpi> {
        self.kpis
            .values()
            .filter(|kpi| kpi.parent_ba_id == ba_id)
            .cloned()
            .collect()
    }

    fn boolean_rule(&self, boolean_id: BooleanId) -> Option<BooleanRule> {
        self.boolean_rules.get(&boolean_id).cloned()
    }

    fn meta_service_exists(&self, meta_id: MetaId) -> bool {
        self.meta_services.contains(&meta_id)
    }

    fn service_configured(&self, host_id: HostId, service_id: ServiceId) -> bool {
        self.service_ids.contains(&(host_id, service_id))
    }

    fn find_service(&self, host_name: &str, description: &str) -> Option<ConfiguredService> {
        self.services
            .get(&service_key(host_name, description))
            .cloned()
    }
}

impl TopologyStore for InMemoryStore {
    fn host_collector(&self, host_id: HostId) -> Option<CollectorId> {
        self.hosts.get(&host_id).map(|host| host.collector_id)
    }

    fn host_collector_by_name(&self, host_name: &str) -> Option<CollectorId> {
        self.host_names
            .get(&host_key(host_name))
            .and_then(|id| self.host_collector(*id))
    }
}

impl StatusStore for InMemoryStore {
    fn service_state(&self, host_name: &str, description: &str) -> Option<ResourceState> {
        self.statuses
            .get(&service_key(host_name, description))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServiceState;

    #[test]
    fn test_service_lookup_is_case_insensitive() {
        let mut store = InMemoryStore::new();
        store.add_host(1, "web-01", 10);
        assert!(store.add_service(1, 100, "HTTP Check"));

        let service = store.find_service("WEB-01", "http check").unwrap();
        assert_eq!(service.service_id, 100);
        assert!(store.service_configured(1, 100));
        assert_eq!(store.host_collector_by_name("Web-01"), Some(10));
    }

    #[test]
    fn test_service_on_unknown_host_is_skipped() {
        let mut store = InMemoryStore::new();
        assert!(!store.add_service(9, 1, "ping"));
        assert!(store.find_service("nobody", "ping").is_none());
    }

    #[test]
    fn test_rebinding_host() {
        let mut store = InMemoryStore::new();
        store.add_host(1, "db-01", 1);
        assert!(store.bind_host(1, 2));
        assert_eq!(store.host_collector(1), Some(2));
        assert!(!store.bind_host(5, 2));
    }

    #[test]
    fn test_renaming_host_drops_old_name() {
        let mut store = InMemoryStore::new();
        store.add_host(1, "old", 1);
        store.add_host(1, "new", 1);
        assert_eq!(store.host_collector_by_name("old"), None);
        assert_eq!(store.host_collector_by_name("new"), Some(1));
    }

    #[test]
    fn test_renaming_host_moves_services_and_statuses() {
        let mut store = InMemoryStore::new();
        store.add_host(1, "old", 1);
        assert!(store.add_service(1, 100, "ping"));
        store.set_service_state(
            "old",
            "ping",
            ResourceState {
                status: ServiceState::Critical,
                ..Default::default()
            },
        );

        store.add_host(1, "new", 1);
        assert_eq!(store.find_service("new", "ping").unwrap().service_id, 100);
        assert!(store.find_service("old", "ping").is_none());
        assert_eq!(
            store.service_state("new", "ping").unwrap().status,
            ServiceState::Critical
        );
        assert!(store.service_state("old", "ping").is_none());
    }

    #[test]
    fn test_inner_whitespace_is_collapsed() {
        let mut store = InMemoryStore::new();
        store.add_host(1, "web  01", 1);
        assert!(store.add_service(1, 100, "HTTP  Check"));

        assert_eq!(store.find_service("web 01", "http check").unwrap().service_id, 100);
        assert_eq!(store.find_service("WEB 01", " http   check ").unwrap().service_id, 100);
        assert_eq!(store.host_collector_by_name("web 01"), Some(1));
    }

    #[test]
    fn test_from_snapshot_json() {
        let snapshot: Snapshot = serde_json::from_str(
            r#"{
                "hosts": [{ "id": 1, "name": "srv", "collector_id": 3 }],
                "services": [{ "host_id": 1, "service_id": 7, "description": "cpu" }],
                "statuses": [{ "host_name": "srv", "description": "cpu", "status": "critical" }]
            }"#,
        )
        .unwrap();
        let store = InMemoryStore::from_snapshot(snapshot);

        let state = store.service_state("SRV", "CPU").unwrap();
        assert_eq!(state.status, ServiceState::Critical);
        assert!(!state.in_downtime);
        assert_eq!(store.host_collector(1), Some(3));
    }
}
