//! Engine configuration from environment variables

use std::path::PathBuf;

use crate::criticity::CriticityTable;
use crate::error::{BamError, Result};

/// Default bound on dependency walks
pub const DEFAULT_MAX_WALK_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Deepest chain of nested activities a walk follows
    pub max_walk_depth: usize,
    /// JSON criticity table; built-in defaults when unset
    pub criticity_file: Option<PathBuf>,
    /// JSON configuration snapshot audited by the binary
    pub snapshot_file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_walk_depth: DEFAULT_MAX_WALK_DEPTH,
            criticity_file: None,
            snapshot_file: None,
        }
    }
}

impl EngineConfig {
    /// Read `BAM_MAX_WALK_DEPTH`, `BAM_CRITICITY_FILE` and `BAM_SNAPSHOT_FILE`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let max_walk_depth = match lookup("BAM_MAX_WALK_DEPTH") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|depth| *depth > 0)
                .ok_or_else(|| BamError::Config(format!("Invalid BAM_MAX_WALK_DEPTH: {}", raw)))?,
            None => DEFAULT_MAX_WALK_DEPTH,
        };

        Ok(Self {
            max_walk_depth,
            criticity_file: lookup("BAM_CRITICITY_FILE").map(PathBuf::from),
            snapshot_file: lookup("BAM_SNAPSHOT_FILE").map(PathBuf::from),
        })
    }

    /// Criticity table from `criticity_file`, or the built-in defaults
    pub fn criticity_table(&self) -> Result<CriticityTable> {
        match &self.criticity_file {
            Some(path) => CriticityTable::load(path),
            None => Ok(CriticityTable::default()),
        }
    }
}
