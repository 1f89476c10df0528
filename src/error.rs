//! Error types for grammar construction, generation and search.

use crate::rule::RuleId;
use crate::symbol::Symbol;
use rand::distributions::WeightedError;
use thiserror::Error;

/// Errors raised by the grammar engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GrammarError {
    #[error("lambda rule for {nonterminal} must have exactly one child, found {found}")]
    MalformedLambda { nonterminal: Symbol, found: usize },
    #[error("invalid {kind} weight {value} for rule {name} of {nonterminal}")]
    InvalidWeight {
        nonterminal: Symbol,
        name: Symbol,
        kind: &'static str,
        value: f64,
    },
    #[error("{0} is not a nonterminal")]
    NotANonterminal(Symbol),
    #[error("no rule with id {0}")]
    UnknownRule(RuleId),
    #[error("enumeration from {nonterminal} reaches rule {rule} which binds variables")]
    UnsupportedBoundVariables { nonterminal: Symbol, rule: Symbol },
    #[error("resample normalizer is {0}; no node can be selected")]
    NothingToResample(f64),
    #[error("tree has no node at pre-order index {0}")]
    InvalidIndex(usize),
    #[error("categorical draw failed: {0}")]
    Sampling(#[from] WeightedError),
}

/// Result type for grammar operations.
pub type Result<T> = std::result::Result<T, GrammarError>;
