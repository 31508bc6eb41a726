//! Per-KPI health drop computation

use crate::criticity::CriticityTable;
use crate::models::{ImpactConfig, Kpi, ServiceState};

/// Highest drop a single KPI can contribute
pub const MAX_DROP: u32 = 100;

/// Health percentage subtracted from the parent activity by `kpi`.
///
/// Never fails: a criticity code missing from `table` contributes nothing, so a
/// partially configured activity stays evaluable.
pub fn compute_drop(kpi: &Kpi, table: &CriticityTable) -> u32 {
    if kpi.ignore_downtime && kpi.in_downtime {
        return 0;
    }
    if kpi.ignore_acknowledged && kpi.acknowledged {
        return 0;
    }

    let drop = match (kpi.current_status, kpi.impact) {
        (ServiceState::Ok, _) => 0,
        (status, ImpactConfig::Direct { warning, critical, unknown }) => match status {
            ServiceState::Warning => warning,
            ServiceState::Critical => critical,
            _ => unknown,
        },
        (
            status,
            ImpactConfig::ByCriticity {
                warning_code,
                critical_code,
                unknown_code,
            },
        ) => {
            let code = match status {
                ServiceState::Warning => warning_code,
                ServiceState::Critical => critical_code,
                _ => unknown_code,
            };
            table.impact(code).unwrap_or(0)
        }
    };

    drop.min(MAX_DROP)
}
