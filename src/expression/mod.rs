//! Boolean rule language.
//!
//! A rule is free text holding `{TOKEN}` spans: status literals
//! (`OK`, `WARNING`, `CRITICAL`, `UNKNOWN`), comparisons (`IS`, `NOT`),
//! logical operators (`AND`, `OR`, `XOR`) and `{host service}` resource
//! references. Tokens are substituted into a formula over `[0-3=!()&| ^]`
//! which is parsed into an [`formula::Expr`] and evaluated.

pub mod evaluator;
pub mod formula;
pub mod token;

pub use evaluator::{BooleanEvaluator, Evaluation, EvaluationMode, StatusOverrides};
pub use token::{Comparison, LogicalOp, ResourceRef};

use crate::error::Result;
use crate::models::ServiceState;
use token::{normalize, scan, Segment, TokenClass};

/// Tokens of a rule grouped by class, first-seen order, without duplicates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decomposition {
    /// Resource token text, uppercased (`HOST SERVICE`)
    pub resources: Vec<String>,
    pub statuses: Vec<ServiceState>,
    pub logical_ops: Vec<LogicalOp>,
    pub conditions: Vec<Comparison>,
}

impl Decomposition {
    /// Non-empty host names referenced by the rule
    pub fn hosts(&self) -> Vec<&str> {
        let mut hosts: Vec<&str> = Vec::new();
        for resource in &self.resources {
            let host = ResourceRef::host_of(resource);
            if !host.is_empty() && !hosts.contains(&host) {
                hosts.push(host);
            }
        }
        hosts
    }
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}

/// Classify every token of `expression` without evaluating it.
pub fn decompose(expression: &str) -> Result<Decomposition> {
    let mut decomposition = Decomposition::default();
    for segment in scan(&normalize(expression))? {
        match segment {
            Segment::Text(_) => {}
            Segment::Token(TokenClass::Status(status)) => {
                push_unique(&mut decomposition.statuses, status)
            }
            Segment::Token(TokenClass::Comparison(op)) => {
                push_unique(&mut decomposition.conditions, op)
            }
            Segment::Token(TokenClass::Logical(op)) => {
                push_unique(&mut decomposition.logical_ops, op)
            }
            Segment::Token(TokenClass::Resource(raw)) => {
                push_unique(&mut decomposition.resources, raw)
            }
        }
    }
    Ok(decomposition)
}
