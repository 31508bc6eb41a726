//! Structural guards run before a configuration change is persisted

pub mod attachment;
pub mod dependency;
pub mod poller;

pub use attachment::{validate_thresholds, AttachmentValidator};
pub use dependency::DependencyGraphValidator;
pub use poller::{DependencyLink, PollerAffinityValidator};
