//! Record-level rules for business activities and their KPIs

use tracing::debug;

use super::dependency::DependencyGraphValidator;
use super::poller::PollerAffinityValidator;
use crate::error::{BamError, Result};
use crate::expression::BooleanEvaluator;
use crate::models::{BusinessActivity, Kpi, KpiSource};
use crate::store::{ConfigStore, StatusStore, TopologyStore};

/// Highest accepted threshold, in health percent
pub const MAX_THRESHOLD: u32 = 100;

/// Both thresholds within 0..=100 and `warning >= critical`.
pub fn validate_thresholds(ba: &BusinessActivity) -> Result<()> {
    if ba.warning_threshold > MAX_THRESHOLD || ba.critical_threshold > MAX_THRESHOLD {
        return Err(BamError::InvalidThreshold(format!(
            "thresholds of business activity {} must be at most {} (warning {}, critical {})",
            ba.id, MAX_THRESHOLD, ba.warning_threshold, ba.critical_threshold
        )));
    }
    if ba.warning_threshold < ba.critical_threshold {
        return Err(BamError::InvalidThreshold(format!(
            "warning threshold {} of business activity {} is below critical threshold {}",
            ba.warning_threshold, ba.id, ba.critical_threshold
        )));
    }
    Ok(())
}

/// Validates activities and KPIs before they are persisted.
///
/// Records may be new or updates of stored ones; a stored record with the same
/// id never conflicts with itself.
pub struct AttachmentValidator<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> AttachmentValidator<'a, S>
where
    S: ConfigStore + TopologyStore + StatusStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn validate_ba(&self, ba: &BusinessActivity) -> Result<()> {
        validate_thresholds(ba)?;

        let name = ba.name.trim();
        if let Some(other) = self
            .store
            .business_activities()
            .into_iter()
            .find(|other| other.id != ba.id && other.name.trim().eq_ignore_ascii_case(name))
        {
            return Err(BamError::DuplicateName(format!(
                "business activity {} is already named {}",
                other.id, other.name
            )));
        }

        // Moving an activity to another remote collector re-checks what it already holds.
        if let Some(collector_id) = ba.assigned_collectors.additional {
            let poller = PollerAffinityValidator::new(self.store);
            for kpi in self.store.kpis(ba.id) {
                poller.check_source(ba.id, &kpi.source, collector_id)?;
            }
        }

        debug!(ba_id = ba.id, name = %name, "Business activity valid");
        Ok(())
    }

    pub fn validate_kpi(&self, kpi: &Kpi) -> Result<()> {
        let parent = self
            .store
            .business_activity(kpi.parent_ba_id)
            .ok_or_else(|| {
                BamError::ResourceNotFound(format!("business activity {}", kpi.parent_ba_id))
            })?;

        self.check_source_exists(kpi)?;

        if let Some(existing) = self
            .store
            .kpis(parent.id)
            .into_iter()
            .find(|existing| existing.id != kpi.id && existing.source == kpi.source)
        {
            return Err(BamError::DuplicateAttachment(format!(
                "{} is already KPI {} of business activity {}",
                kpi.source.describe(),
                existing.id,
                parent.id
            )));
        }

        self.check_kpi_for_ba(&parent, &kpi.source)?;

        debug!(
            kpi_id = kpi.id,
            ba_id = parent.id,
            source = %kpi.source.describe(),
            "KPI valid"
        );
        Ok(())
    }

    /// A source attached to an activity with a remote collector must be
    /// observable by that collector.
    pub fn check_kpi_for_ba(&self, ba: &BusinessActivity, source: &KpiSource) -> Result<()> {
        match ba.assigned_collectors.additional {
            Some(collector_id) => {
                PollerAffinityValidator::new(self.store).check_source(ba.id, source, collector_id)
            }
            None => Ok(()),
        }
    }

    fn check_source_exists(&self, kpi: &Kpi) -> Result<()> {
        match kpi.source {
            KpiSource::HostService {
                host_id,
                service_id,
            } => {
                if !self.store.service_configured(host_id, service_id) {
                    return Err(BamError::ResourceNotFound(kpi.source.describe()));
                }
            }
            KpiSource::MetaService { meta_id } => {
                if !self.store.meta_service_exists(meta_id) {
                    return Err(BamError::ResourceNotFound(kpi.source.describe()));
                }
            }
            KpiSource::NestedBa { ba_id } => {
                if ba_id == kpi.parent_ba_id {
                    return Err(BamError::SelfAttachment(ba_id));
                }
                if self.store.business_activity(ba_id).is_none() {
                    return Err(BamError::ResourceNotFound(kpi.source.describe()));
                }
                DependencyGraphValidator::new(self.store).check_attach(ba_id, kpi.parent_ba_id)?;
            }
            KpiSource::BooleanRule { boolean_id } => {
                let rule = self
                    .store
                    .boolean_rule(boolean_id)
                    .ok_or_else(|| BamError::ResourceNotFound(kpi.source.describe()))?;
                BooleanEvaluator::new(self.store, self.store).check(&rule.expression)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BooleanRule, ImpactConfig};
    use crate::store::InMemoryStore;

    const IMPACT: ImpactConfig = ImpactConfig::Direct {
        warning: 10,
        critical: 50,
        unknown: 10,
    };

    fn store() -> InMemoryStore {
        let mut store = InMemoryStore::new();
        store.add_host(1, "web-01", 1);
        store.add_host(2, "edge-01", 2);
        store.add_service(1, 10, "http");
        store.add_service(2, 20, "ping");
        store.add_meta_service(7);
        store.put_business_activity(BusinessActivity::new(1, "Shop", 80, 50, 1));
        store.put_business_activity(BusinessActivity::new(2, "Front", 80, 50, 1));
        store.put_boolean_rule(BooleanRule {
            id: 3,
            name: "web up".into(),
            expression: "{web-01 http} {IS} {OK}".into(),
            impact_if: false,
            active: true,
        });
        store
    }

    fn host_service(host_id: u32, service_id: u32) -> KpiSource {
        KpiSource::HostService {
            host_id,
            service_id,
        }
    }

    #[test]
    fn test_threshold_ordering() {
        let ba = BusinessActivity::new(9, "x", 40, 60, 1);
        assert!(matches!(
            validate_thresholds(&ba),
            Err(BamError::InvalidThreshold(_))
        ));
        assert!(validate_thresholds(&BusinessActivity::new(9, "x", 60, 60, 1)).is_ok());
        assert!(matches!(
            validate_thresholds(&BusinessActivity::new(9, "x", 120, 60, 1)),
            Err(BamError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn test_duplicate_name_is_case_insensitive() {
        let store = store();
        let validator = AttachmentValidator::new(&store);

        let err = validator
            .validate_ba(&BusinessActivity::new(9, "shop ", 80, 50, 1))
            .unwrap_err();
        assert!(matches!(err, BamError::DuplicateName(_)));

        // Renaming in place keeps its own name.
        assert!(validator
            .validate_ba(&BusinessActivity::new(1, "SHOP", 80, 50, 1))
            .is_ok());
    }

    #[test]
    fn test_remote_collector_rechecks_existing_kpis() {
        let mut store = store();
        store.put_kpi(Kpi::new(1, 1, host_service(1, 10), IMPACT));
        let validator = AttachmentValidator::new(&store);

        let moved = BusinessActivity::new(1, "Shop", 80, 50, 1).with_additional_collector(2);
        assert!(matches!(
            validator.validate_ba(&moved),
            Err(BamError::CollectorMismatch { .. })
        ));
    }

    #[test]
    fn test_duplicate_attachment() {
        let mut store = store();
        store.put_kpi(Kpi::new(1, 1, host_service(1, 10), IMPACT));
        let validator = AttachmentValidator::new(&store);

        let err = validator
            .validate_kpi(&Kpi::new(2, 1, host_service(1, 10), IMPACT))
            .unwrap_err();
        assert!(matches!(err, BamError::DuplicateAttachment(_)));

        // Updating the stored KPI itself is not a duplicate.
        assert!(validator
            .validate_kpi(&Kpi::new(1, 1, host_service(1, 10), IMPACT))
            .is_ok());
        // Same source under another activity is fine.
        assert!(validator
            .validate_kpi(&Kpi::new(2, 2, host_service(1, 10), IMPACT))
            .is_ok());
    }

    #[test]
    fn test_self_attachment() {
        let store = store();
        let validator = AttachmentValidator::new(&store);
        let err = validator
            .validate_kpi(&Kpi::new(1, 1, KpiSource::NestedBa { ba_id: 1 }, IMPACT))
            .unwrap_err();
        assert_eq!(err, BamError::SelfAttachment(1));
    }

    #[test]
    fn test_nested_cycle_rejected() {
        let mut store = store();
        store.put_kpi(Kpi::new(1, 2, KpiSource::NestedBa { ba_id: 1 }, IMPACT));
        let validator = AttachmentValidator::new(&store);

        let err = validator
            .validate_kpi(&Kpi::new(2, 1, KpiSource::NestedBa { ba_id: 2 }, IMPACT))
            .unwrap_err();
        assert!(matches!(err, BamError::CyclicDependency { .. }));
    }

    #[test]
    fn test_missing_sources() {
        let store = store();
        let validator = AttachmentValidator::new(&store);

        for source in [
            host_service(1, 99),
            KpiSource::MetaService { meta_id: 8 },
            KpiSource::NestedBa { ba_id: 42 },
            KpiSource::BooleanRule { boolean_id: 42 },
        ] {
            let err = validator.validate_kpi(&Kpi::new(5, 1, source, IMPACT)).unwrap_err();
            assert!(matches!(err, BamError::ResourceNotFound(_)), "{:?}", source);
        }

        let err = validator
            .validate_kpi(&Kpi::new(5, 77, host_service(1, 10), IMPACT))
            .unwrap_err();
        assert!(matches!(err, BamError::ResourceNotFound(_)));
    }

    #[test]
    fn test_boolean_rule_existence_check() {
        let mut store = store();
        let validator = AttachmentValidator::new(&store);
        assert!(validator
            .validate_kpi(&Kpi::new(5, 1, KpiSource::BooleanRule { boolean_id: 3 }, IMPACT))
            .is_ok());

        store.put_boolean_rule(BooleanRule {
            id: 4,
            name: "ghost".into(),
            expression: "{ghost-01 http} {IS} {OK}".into(),
            impact_if: true,
            active: true,
        });
        let validator = AttachmentValidator::new(&store);
        let err = validator
            .validate_kpi(&Kpi::new(6, 1, KpiSource::BooleanRule { boolean_id: 4 }, IMPACT))
            .unwrap_err();
        assert!(matches!(err, BamError::ResourceNotFound(_)));
    }

    #[test]
    fn test_remote_collector_on_attach() {
        let mut store = store();
        store.put_business_activity(
            BusinessActivity::new(1, "Shop", 80, 50, 1).with_additional_collector(2),
        );
        let validator = AttachmentValidator::new(&store);

        assert!(matches!(
            validator.validate_kpi(&Kpi::new(5, 1, host_service(1, 10), IMPACT)),
            Err(BamError::CollectorMismatch { .. })
        ));
        assert!(validator
            .validate_kpi(&Kpi::new(5, 1, host_service(2, 20), IMPACT))
            .is_ok());
        // Meta services are computed centrally.
        assert!(validator
            .validate_kpi(&Kpi::new(6, 1, KpiSource::MetaService { meta_id: 7 }, IMPACT))
            .is_ok());
    }
}
