//! Core domain models for business activity monitoring

use serde::{Deserialize, Serialize};

pub type BaId = u32;
pub type KpiId = u32;
pub type HostId = u32;
pub type ServiceId = u32;
pub type MetaId = u32;
pub type BooleanId = u32;
pub type CollectorId = u32;

/// Monitoring status of a resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    #[default]
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl ServiceState {
    /// Numeric status code (0=OK, 1=WARNING, 2=CRITICAL, 3=UNKNOWN)
    pub fn code(self) -> u8 {
        match self {
            ServiceState::Ok => 0,
            ServiceState::Warning => 1,
            ServiceState::Critical => 2,
            ServiceState::Unknown => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ServiceState::Ok),
            1 => Some(ServiceState::Warning),
            2 => Some(ServiceState::Critical),
            3 => Some(ServiceState::Unknown),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceState::Ok => "OK",
            ServiceState::Warning => "WARNING",
            ServiceState::Critical => "CRITICAL",
            ServiceState::Unknown => "UNKNOWN",
        }
    }
}

/// Collectors a business activity is computed on.
///
/// The primary collector is the central one; the additional collector, when
/// set, is a remote poller that only sees the hosts bound to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorAssignment {
    pub primary: CollectorId,
    #[serde(default)]
    pub additional: Option<CollectorId>,
}

impl CollectorAssignment {
    pub fn contains(&self, collector_id: CollectorId) -> bool {
        self.primary == collector_id || self.additional == Some(collector_id)
    }
}

/// A composite business activity whose health is computed from its KPIs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessActivity {
    pub id: BaId,
    /// Unique display name
    pub name: String,
    /// Health percentage at or below which the activity is WARNING
    pub warning_threshold: u32,
    /// Health percentage at or below which the activity is CRITICAL
    pub critical_threshold: u32,
    pub assigned_collectors: CollectorAssignment,
    /// Ignore child impacts while the activity itself is in downtime
    #[serde(default)]
    pub ignore_downtime_inheritance: bool,
    /// Runtime downtime flag, only read by health aggregation
    #[serde(default)]
    pub in_downtime: bool,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl BusinessActivity {
    pub fn new(
        id: BaId,
        name: impl Into<String>,
        warning_threshold: u32,
        critical_threshold: u32,
        primary_collector: CollectorId,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            warning_threshold,
            critical_threshold,
            assigned_collectors: CollectorAssignment {
                primary: primary_collector,
                additional: None,
            },
            ignore_downtime_inheritance: false,
            in_downtime: false,
            active: true,
        }
    }

    pub fn with_additional_collector(mut self, collector_id: CollectorId) -> Self {
        self.assigned_collectors.additional = Some(collector_id);
        self
    }
}

/// Discriminant of [`KpiSource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiSourceKind {
    HostService,
    MetaService,
    NestedBa,
    BooleanRule,
}

/// What a KPI observes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KpiSource {
    HostService { host_id: HostId, service_id: ServiceId },
    MetaService { meta_id: MetaId },
    NestedBa { ba_id: BaId },
    BooleanRule { boolean_id: BooleanId },
}

impl KpiSource {
    pub fn kind(&self) -> KpiSourceKind {
        match self {
            KpiSource::HostService { .. } => KpiSourceKind::HostService,
            KpiSource::MetaService { .. } => KpiSourceKind::MetaService,
            KpiSource::NestedBa { .. } => KpiSourceKind::NestedBa,
            KpiSource::BooleanRule { .. } => KpiSourceKind::BooleanRule,
        }
    }

    /// Human readable label used in error messages
    pub fn describe(&self) -> String {
        match self {
            KpiSource::HostService { host_id, service_id } => {
                format!("service {} on host {}", service_id, host_id)
            }
            KpiSource::MetaService { meta_id } => format!("meta service {}", meta_id),
            KpiSource::NestedBa { ba_id } => format!("business activity {}", ba_id),
            KpiSource::BooleanRule { boolean_id } => format!("boolean rule {}", boolean_id),
        }
    }
}

/// How a KPI's non-OK status translates into a health drop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ImpactConfig {
    /// Explicit percentage weights
    Direct {
        warning: u32,
        critical: u32,
        unknown: u32,
    },
    /// Codes into the criticity table
    ByCriticity {
        warning_code: u8,
        critical_code: u8,
        unknown_code: u8,
    },
}

/// A key performance indicator attached to a business activity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kpi {
    pub id: KpiId,
    pub parent_ba_id: BaId,
    pub source: KpiSource,
    pub impact: ImpactConfig,
    #[serde(default)]
    pub current_status: ServiceState,
    #[serde(default)]
    pub in_downtime: bool,
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(default)]
    pub ignore_downtime: bool,
    #[serde(default)]
    pub ignore_acknowledged: bool,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl Kpi {
    /// Create an active KPI in OK state with no suppression flags
    pub fn new(id: KpiId, parent_ba_id: BaId, source: KpiSource, impact: ImpactConfig) -> Self {
        Self {
            id,
            parent_ba_id,
            source,
            impact,
            current_status: ServiceState::Ok,
            in_downtime: false,
            acknowledged: false,
            ignore_downtime: false,
            ignore_acknowledged: false,
            active: true,
        }
    }

    pub fn with_status(mut self, status: ServiceState) -> Self {
        self.current_status = status;
        self
    }

    /// Nested activity id when this KPI is of kind `NestedBa`
    pub fn nested_ba(&self) -> Option<BaId> {
        match self.source {
            KpiSource::NestedBa { ba_id } => Some(ba_id),
            _ => None,
        }
    }
}

/// A rule combining several resource statuses into one boolean
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BooleanRule {
    pub id: BooleanId,
    pub name: String,
    pub expression: String,
    /// Expression outcome that puts the KPI in CRITICAL state
    #[serde(default = "default_true")]
    pub impact_if: bool,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// A monitored host and the collector that polls it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub id: HostId,
    pub name: String,
    pub collector_id: CollectorId,
}

/// A service configured on a host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfiguredService {
    pub host_id: HostId,
    pub service_id: ServiceId,
    pub description: String,
}

/// Live status of a monitored service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceState {
    pub status: ServiceState,
    #[serde(default)]
    pub in_downtime: bool,
    #[serde(default)]
    pub acknowledged: bool,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_codes() {
        for code in 0..4 {
            let state = ServiceState::from_code(code).unwrap();
            assert_eq!(state.code(), code);
        }
        assert_eq!(ServiceState::from_code(4), None);
    }

    #[test]
    fn test_kpi_source_kind() {
        let source = KpiSource::NestedBa { ba_id: 7 };
        assert_eq!(source.kind(), KpiSourceKind::NestedBa);
        assert_eq!(source.describe(), "business activity 7");
    }

    #[test]
    fn test_kpi_deserializes_with_defaults() {
        let kpi: Kpi = serde_json::from_str(
            r#"{
                "id": 1,
                "parent_ba_id": 2,
                "source": { "kind": "host_service", "host_id": 3, "service_id": 4 },
                "impact": { "mode": "direct", "warning": 10, "critical": 50, "unknown": 5 }
            }"#,
        )
        .unwrap();
        assert!(kpi.active);
        assert_eq!(kpi.current_status, ServiceState::Ok);
        assert_eq!(
            kpi.source,
            KpiSource::HostService {
                host_id: 3,
                service_id: 4
            }
        );
    }

    #[test]
    fn test_collector_assignment_contains() {
        let ba = BusinessActivity::new(1, "web", 80, 50, 1).with_additional_collector(2);
        assert!(ba.assigned_collectors.contains(1));
        assert!(ba.assigned_collectors.contains(2));
        assert!(!ba.assigned_collectors.contains(3));
    }
}
