//! Boolean rule evaluation against live or hypothetical statuses

use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use super::formula;
use super::token::{normalize, scan, ResourceRef, Segment, TokenClass};
use crate::error::{BamError, Result};
use crate::models::ServiceState;
use crate::store::{ConfigStore, StatusStore};

/// Hypothetical statuses keyed by resource token text (`host service`).
///
/// Keys are matched the way tokens are: case-insensitive, whitespace folded.
#[derive(Debug, Clone, Default)]
pub struct StatusOverrides {
    statuses: HashMap<String, ServiceState>,
}

impl StatusOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: &str, status: ServiceState) -> &mut Self {
        self.statuses.insert(override_key(token), status);
        self
    }

    pub fn with(mut self, token: &str, status: ServiceState) -> Self {
        self.insert(token, status);
        self
    }

    pub fn get(&self, token: &str) -> Option<ServiceState> {
        self.statuses.get(&override_key(token)).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}

fn override_key(token: &str) -> String {
    normalize(token)
        .split(' ')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Where resource statuses come from
#[derive(Debug, Clone, Copy)]
pub enum EvaluationMode<'o> {
    /// Live lookup in the status store
    Live,
    /// Supplied statuses first, live lookup for the others
    Overrides(&'o StatusOverrides),
    /// Only confirm every resource is configured; statuses are taken as OK
    ExistenceCheck,
}

/// Outcome of an evaluation along with the status used for every resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub value: bool,
    pub resources: BTreeMap<String, ServiceState>,
}

/// Evaluates boolean rule expressions.
pub struct BooleanEvaluator<'a, C: ?Sized, S: ?Sized> {
    config: &'a C,
    statuses: &'a S,
}

impl<'a, C, S> BooleanEvaluator<'a, C, S>
where
    C: ConfigStore + ?Sized,
    S: StatusStore + ?Sized,
{
    pub fn new(config: &'a C, statuses: &'a S) -> Self {
        Self { config, statuses }
    }

    pub fn evaluate(&self, expression: &str, mode: EvaluationMode<'_>) -> Result<bool> {
        self.evaluate_detailed(expression, mode)
            .map(|evaluation| evaluation.value)
    }

    /// Confirm every referenced resource is configured and the formula is well formed
    pub fn check(&self, expression: &str) -> Result<()> {
        self.evaluate(expression, EvaluationMode::ExistenceCheck)
            .map(|_| ())
    }

    pub fn evaluate_detailed(
        &self,
        expression: &str,
        mode: EvaluationMode<'_>,
    ) -> Result<Evaluation> {
        let segments = scan(&normalize(expression))?;

        // Every token is classified before anything is resolved.
        let mut references: Vec<(&str, ResourceRef)> = Vec::new();
        for segment in &segments {
            if let Segment::Token(TokenClass::Resource(raw)) = segment {
                if !references.iter().any(|(seen, _)| *seen == raw.as_str()) {
                    references.push((raw.as_str(), ResourceRef::parse(raw)?));
                }
            }
        }

        for (_, resource) in &references {
            if self
                .config
                .find_service(&resource.host_name, &resource.description)
                .is_none()
            {
                return Err(BamError::ResourceNotFound(format!(
                    "Could not find resource {}",
                    resource
                )));
            }
        }

        let mut resolved = BTreeMap::new();
        for (raw, resource) in &references {
            resolved.insert(raw.to_string(), self.resolve(raw, resource, mode)?);
        }

        let mut substituted = String::with_capacity(expression.len());
        for segment in &segments {
            match segment {
                Segment::Text(text) => substituted.push_str(text),
                Segment::Token(TokenClass::Status(status)) => {
                    substituted.push_str(&status.code().to_string())
                }
                Segment::Token(TokenClass::Comparison(op)) => substituted.push_str(op.operator()),
                Segment::Token(TokenClass::Logical(op)) => substituted.push_str(op.operator()),
                Segment::Token(TokenClass::Resource(raw)) => {
                    let status = resolved.get(raw.as_str()).copied().unwrap_or_default();
                    substituted.push_str(&status.code().to_string());
                }
            }
        }

        let value = formula::parse(&substituted)?.eval() != 0;
        debug!(
            expression = %expression.trim(),
            formula = %substituted.trim(),
            resources = resolved.len(),
            value = value,
            "Boolean expression evaluated"
        );

        Ok(Evaluation {
            value,
            resources: resolved,
        })
    }

    fn resolve(
        &self,
        raw: &str,
        resource: &ResourceRef,
        mode: EvaluationMode<'_>,
    ) -> Result<ServiceState> {
        match mode {
            EvaluationMode::ExistenceCheck => Ok(ServiceState::Ok),
            EvaluationMode::Overrides(overrides) => match overrides.get(raw) {
                Some(status) => Ok(status),
                None => self.live_status(resource),
            },
            EvaluationMode::Live => self.live_status(resource),
        }
    }

    fn live_status(&self, resource: &ResourceRef) -> Result<ServiceState> {
        self.statuses
            .service_state(&resource.host_name, &resource.description)
            .map(|state| state.status)
            .ok_or_else(|| {
                BamError::ResourceNotFound(format!("Could not find status for {}", resource))
            })
    }
}
