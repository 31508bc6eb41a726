//! Criticity levels and their default impacts

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::{BamError, Result};

/// The six ordered criticity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriticityLevel {
    Null,
    Weak,
    Minor,
    Major,
    Critical,
    Blocking,
}

impl CriticityLevel {
    pub const ALL: [CriticityLevel; 6] = [
        CriticityLevel::Null,
        CriticityLevel::Weak,
        CriticityLevel::Minor,
        CriticityLevel::Major,
        CriticityLevel::Critical,
        CriticityLevel::Blocking,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            CriticityLevel::Null => "Null",
            CriticityLevel::Weak => "Weak",
            CriticityLevel::Minor => "Minor",
            CriticityLevel::Major => "Major",
            CriticityLevel::Critical => "Critical",
            CriticityLevel::Blocking => "Blocking",
        }
    }
}

/// Impact and display color of one level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticityEntry {
    /// Health percentage subtracted when a KPI hits this level
    pub impact: u32,
    pub color: String,
}

/// Criticity code to impact mapping.
///
/// A table loaded from configuration may omit some codes; lookups of an absent
/// code return `None` and callers treat that as no impact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticityTable {
    levels: BTreeMap<u8, CriticityEntry>,
}

impl Default for CriticityTable {
    fn default() -> Self {
        let defaults = [
            (CriticityLevel::Null, 0, "#88b917"),
            (CriticityLevel::Weak, 5, "#ffff00"),
            (CriticityLevel::Minor, 25, "#ffbd00"),
            (CriticityLevel::Major, 50, "#ff9a13"),
            (CriticityLevel::Critical, 75, "#ff4a4a"),
            (CriticityLevel::Blocking, 100, "#cd0000"),
        ];
        let levels = defaults
            .into_iter()
            .map(|(level, impact, color)| {
                (
                    level.code(),
                    CriticityEntry {
                        impact,
                        color: color.to_string(),
                    },
                )
            })
            .collect();
        Self { levels }
    }
}

impl CriticityTable {
    /// An empty table, every lookup misses
    pub fn empty() -> Self {
        Self {
            levels: BTreeMap::new(),
        }
    }

    /// Set the entry of a level, replacing the previous one
    pub fn set(&mut self, level: CriticityLevel, impact: u32, color: impl Into<String>) {
        self.levels.insert(
            level.code(),
            CriticityEntry {
                impact,
                color: color.into(),
            },
        );
    }

    pub fn impact(&self, code: u8) -> Option<u32> {
        self.levels.get(&code).map(|entry| entry.impact)
    }

    pub fn color(&self, code: u8) -> Option<&str> {
        self.levels.get(&code).map(|entry| entry.color.as_str())
    }

    pub fn label(&self, code: u8) -> Option<&'static str> {
        CriticityLevel::from_code(code).map(CriticityLevel::label)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Parse a JSON table. Codes outside the six levels are rejected.
    pub fn from_json(raw: &str) -> Result<Self> {
        let table: CriticityTable = serde_json::from_str(raw)?;
        if let Some(code) = table
            .levels
            .keys()
            .find(|code| CriticityLevel::from_code(**code).is_none())
        {
            return Err(BamError::Config(format!("Unknown criticity code: {}", code)));
        }
        Ok(table)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }
}

/// Process-wide holder of the current criticity table.
///
/// Evaluation takes an [`Arc`] snapshot; an admin reload swaps the table
/// without disturbing evaluations already holding the previous one.
#[derive(Clone, Default)]
pub struct CriticityRegistry {
    current: Arc<RwLock<Arc<CriticityTable>>>,
}

impl CriticityRegistry {
    pub fn new(table: CriticityTable) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(table))),
        }
    }

    pub fn snapshot(&self) -> Arc<CriticityTable> {
        Arc::clone(&self.current.read())
    }

    pub fn reload(&self, table: CriticityTable) {
        let levels = table.len();
        *self.current.write() = Arc::new(table);
        info!(levels = levels, "Criticity table reloaded");
    }
}
