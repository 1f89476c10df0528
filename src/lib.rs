//! lot-pcfg: probabilistic context-free grammars with scoped bound variables,
//! for Bayesian program induction.
//!
//! This crate provides:
//! - A rule store with lambda-style rules that bind variables for their subtree
//! - Top-down generation of derivation trees with per-node log-probabilities
//! - Scoped traversal and weighted selection of nodes
//! - A subtree-regeneration proposal for Metropolis-Hastings
//! - Lazy enumeration of all trees up to a depth
//! - Rule-count statistics and the rational-rules prior
//! - A small text format for writing grammars
//!
//! # Example
//!
//! ```rust
//! use lot_pcfg::parse_grammar;
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let grammar = parse_grammar(r#"
//!     EXPR -> x 5.
//!     EXPR -> plus_(EXPR, EXPR).
//! "#).unwrap();
//!
//! let mut rng = StdRng::seed_from_u64(0);
//! let tree = grammar.generate("EXPR", &mut rng).unwrap();
//! let proposal = grammar.propose(&tree, &mut rng).unwrap();
//! assert!(proposal.log_fb.is_finite());
//! ```

pub mod enumerate;
pub mod error;
pub mod generate;
pub mod grammar;
pub mod parser;
pub mod proposal;
pub mod rule;
pub mod stats;
pub mod symbol;
pub mod traverse;
pub mod tree;

#[cfg(test)]
mod properties_test;

// Re-exports for convenience
pub use enumerate::Enumerate;
pub use error::{GrammarError, Result};
pub use grammar::{Grammar, GrammarConfig, Scope};
pub use parser::{parse_grammar, parse_grammar_with, ParseError};
pub use proposal::Proposal;
pub use rule::{Rule, RuleId, RuleSpec};
pub use stats::{rational_rules_prior, rule_counts};
pub use symbol::{Item, Symbol};
pub use traverse::{Selection, Subnodes, Visit};
pub use tree::{Child, Node};
