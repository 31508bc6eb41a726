//! Engine counters, exportable in Prometheus text format

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by every clone of an engine
#[derive(Default)]
pub struct EngineMetrics {
    /// Guard operations run (activity, KPI, attach and collector checks)
    pub validations_total: AtomicU64,
    /// Guard operations that rejected the change
    pub rejections_total: AtomicU64,
    /// Boolean rules evaluated through the engine
    pub evaluations_total: AtomicU64,
    pub evaluation_failures_total: AtomicU64,
    /// Activities whose health was computed
    pub health_computations_total: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_validations(&self) {
        self.validations_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rejections(&self) {
        self.rejections_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_evaluations(&self) {
        self.evaluations_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_evaluation_failures(&self) {
        self.evaluation_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_health_computations(&self) {
        self.health_computations_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            validations_total: self.validations_total.load(Ordering::Relaxed),
            rejections_total: self.rejections_total.load(Ordering::Relaxed),
            evaluations_total: self.evaluations_total.load(Ordering::Relaxed),
            evaluation_failures_total: self.evaluation_failures_total.load(Ordering::Relaxed),
            health_computations_total: self.health_computations_total.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub validations_total: u64,
    pub rejections_total: u64,
    pub evaluations_total: u64,
    pub evaluation_failures_total: u64,
    pub health_computations_total: u64,
}

impl MetricsSnapshot {
    /// Render the counters as Prometheus exposition text
    pub fn to_prometheus(&self) -> String {
        format!(
            r#"# HELP bam_validations_total Total number of configuration guard checks run
# TYPE bam_validations_total counter
bam_validations_total {}

# HELP bam_rejections_total Total number of configuration changes rejected
# TYPE bam_rejections_total counter
bam_rejections_total {}

# HELP bam_evaluations_total Total number of boolean rule evaluations
# TYPE bam_evaluations_total counter
bam_evaluations_total {}

# HELP bam_evaluation_failures_total Total number of failed boolean rule evaluations
# TYPE bam_evaluation_failures_total counter
bam_evaluation_failures_total {}

# HELP bam_health_computations_total Total number of business activity health computations
# TYPE bam_health_computations_total counter
bam_health_computations_total {}

# HELP bam_engine_info Build information
# TYPE bam_engine_info gauge
bam_engine_info{{version="{}"}} 1
"#,
            self.validations_total,
            self.rejections_total,
            self.evaluations_total,
            self.evaluation_failures_total,
            self.health_computations_total,
            env!("CARGO_PKG_VERSION"),
        )
    }
}
