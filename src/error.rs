//! Engine error types

use thiserror::Error;

use crate::models::{BaId, CollectorId};

/// Errors raised by the validators and the boolean rule evaluator.
///
/// Every variant names the resource, expression or edge that caused the
/// failure so the admin layer can display it verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BamError {
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Cyclic dependency: business activity {child} already depends on {parent} (via {edge_from} -> {edge_to})")]
    CyclicDependency {
        /// Activity being edited.
        parent: BaId,
        /// Activity that was about to be attached as a KPI.
        child: BaId,
        edge_from: BaId,
        edge_to: BaId,
    },

    #[error("Collector mismatch: {resource} of business activity {ba_id} is not collected by poller {collector_id}")]
    CollectorMismatch {
        ba_id: BaId,
        collector_id: CollectorId,
        resource: String,
    },

    #[error("Duplicate attachment: {0}")]
    DuplicateAttachment(String),

    #[error("Business activity {0} cannot be attached to itself")]
    SelfAttachment(BaId),

    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),

    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using BamError
pub type Result<T> = std::result::Result<T, BamError>;

impl From<serde_json::Error> for BamError {
    fn from(err: serde_json::Error) -> Self {
        BamError::Config(err.to_string())
    }
}

impl From<std::io::Error> for BamError {
    fn from(err: std::io::Error) -> Self {
        BamError::Config(err.to_string())
    }
}
