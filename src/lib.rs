//! bam-engine library exports

pub mod config;
pub mod criticity;
pub mod engine;
pub mod error;
pub mod expression;
pub mod health;
pub mod impact;
pub mod metrics;
pub mod models;
pub mod store;
pub mod validation;

pub use engine::{AuditFinding, AuditReport, Engine};
pub use error::{BamError, Result};
