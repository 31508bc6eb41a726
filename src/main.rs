//! bam-engine - audits a business activity configuration snapshot

use anyhow::Context;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bam_engine::config::EngineConfig;
use bam_engine::store::InMemoryStore;
use bam_engine::Engine;

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bam_engine=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("BAM_LOG_FORMAT").is_ok_and(|format| format == "json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // Configuration
    let config = EngineConfig::from_env().context("Invalid engine configuration")?;
    let snapshot_file = config
        .snapshot_file
        .clone()
        .context("BAM_SNAPSHOT_FILE must point to a configuration snapshot")?;

    let store = InMemoryStore::load(&snapshot_file)
        .with_context(|| format!("Failed to load snapshot {}", snapshot_file.display()))?;
    let engine = Engine::from_config(store, config).context("Failed to load criticity table")?;

    info!(
        "bam-engine v{} auditing {}",
        env!("CARGO_PKG_VERSION"),
        snapshot_file.display()
    );

    let report = engine.audit();
    for finding in &report.findings {
        warn!(ba_id = finding.ba_id, error = %finding.error, "Audit finding");
    }
    for health in &report.health {
        info!(
            ba_id = health.ba_id,
            level = health.level,
            state = health.state.as_str(),
            "Business activity health"
        );
    }

    debug!("Engine counters\n{}", engine.metrics().get_metrics().to_prometheus());

    if !report.is_clean() {
        error!(findings = report.findings.len(), "Configuration is inconsistent");
        std::process::exit(1);
    }

    info!("Configuration is consistent");
    Ok(())
}
