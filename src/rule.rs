//! Rule representation for probabilistic grammars.
//!
//! A rule expands a nonterminal into a named production with an ordered list
//! of children, a generation weight, a resample weight and, for lambda-like
//! rules, the nonterminals of the variables it binds in its subtree.

use crate::error::{GrammarError, Result};
use crate::symbol::{write_symbol, Item, Symbol};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifier of a rule within a grammar.
///
/// Permanent rules get non-negative ids in insertion order. Bound-variable
/// rules get negative ids, allocated per generation or traversal call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub i64);

impl RuleId {
    /// Check if this id belongs to an ephemeral bound-variable rule.
    pub fn is_bound_variable(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A grammar rule: `nonterminal -> name(children)`.
#[derive(Clone, Debug)]
pub struct Rule {
    /// The nonterminal this rule expands
    pub nonterminal: Symbol,
    /// The production name (function name in the generated program)
    pub name: Symbol,
    /// Right-hand-side items, expanded left to right
    pub children: Vec<Item>,
    /// Unnormalised generation weight
    pub weight: f64,
    /// Weight of nodes built by this rule when picking a node to regenerate
    pub resample_weight: f64,
    /// Nonterminals of the variables this rule binds for its children
    pub bound_vars: Vec<Symbol>,
    pub id: RuleId,
}

impl Rule {
    /// Create a rule with default resample weight and no bound variables.
    pub fn new(
        nonterminal: impl Into<Symbol>,
        name: impl Into<Symbol>,
        children: Vec<Item>,
        weight: f64,
        id: RuleId,
    ) -> Self {
        Rule {
            nonterminal: nonterminal.into(),
            name: name.into(),
            children,
            weight,
            resample_weight: 1.0,
            bound_vars: Vec::new(),
            id,
        }
    }

    /// Check if this rule is named as a lambda introduction.
    pub fn is_lambda(&self) -> bool {
        self.name.eq_ignore_ascii_case("lambda")
    }

    /// Check if expanding this rule introduces bound variables.
    pub fn binds_variables(&self) -> bool {
        !self.bound_vars.is_empty()
    }

    /// Check if this is an ephemeral bound-variable rule.
    pub fn is_bound_variable(&self) -> bool {
        self.id.is_bound_variable()
    }

    /// Number of right-hand-side items.
    pub fn arity(&self) -> usize {
        self.children.len()
    }

    /// Check the construction-time invariants of the rule.
    pub fn validate(&self) -> Result<()> {
        if self.is_lambda() && self.children.len() != 1 {
            return Err(GrammarError::MalformedLambda {
                nonterminal: self.nonterminal.clone(),
                found: self.children.len(),
            });
        }
        if !(self.weight.is_finite() && self.weight > 0.0) {
            return Err(self.invalid_weight("generation", self.weight));
        }
        if !(self.resample_weight.is_finite() && self.resample_weight >= 0.0) {
            return Err(self.invalid_weight("resample", self.resample_weight));
        }
        Ok(())
    }

    fn invalid_weight(&self, kind: &'static str, value: f64) -> GrammarError {
        GrammarError::InvalidWeight {
            nonterminal: self.nonterminal.clone(),
            name: self.name.clone(),
            kind,
            value,
        }
    }
}

// Identity is (nonterminal, id): two rules with the same production but
// different ids are distinct alternatives.
impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.nonterminal == other.nonterminal
    }
}

impl Eq for Rule {}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.nonterminal.hash(state);
        self.id.hash(state);
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_symbol(f, &self.nonterminal)?;
        write!(f, " -> ")?;
        if !self.name.is_empty() {
            write_symbol(f, &self.name)?;
        }
        if !self.children.is_empty() || self.name.is_empty() {
            write!(f, "(")?;
            for (i, child) in self.children.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", child)?;
            }
            write!(f, ")")?;
        }
        write!(f, " {}", self.weight)?;
        if self.resample_weight != 1.0 {
            write!(f, " resample={}", self.resample_weight)?;
        }
        if !self.bound_vars.is_empty() {
            write!(f, " bind=[")?;
            for (i, bv) in self.bound_vars.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_symbol(f, bv)?;
            }
            write!(f, "]")?;
        }
        write!(f, ".")
    }
}

/// Description of a rule to add to a grammar; the grammar assigns the id.
#[derive(Clone, Debug)]
pub struct RuleSpec {
    pub nonterminal: Symbol,
    pub name: Symbol,
    pub children: Vec<Item>,
    pub weight: f64,
    pub resample_weight: f64,
    pub bound_vars: Vec<Symbol>,
}

impl RuleSpec {
    pub fn new(
        nonterminal: impl Into<Symbol>,
        name: impl Into<Symbol>,
        children: Vec<Item>,
        weight: f64,
    ) -> Self {
        RuleSpec {
            nonterminal: nonterminal.into(),
            name: name.into(),
            children,
            weight,
            resample_weight: 1.0,
            bound_vars: Vec::new(),
        }
    }

    /// Set the resample weight.
    pub fn resample_weight(mut self, weight: f64) -> Self {
        self.resample_weight = weight;
        self
    }

    /// Bind a variable of the given nonterminal for the rule's children.
    pub fn bind(mut self, nonterminal: impl Into<Symbol>) -> Self {
        self.bound_vars.push(nonterminal.into());
        self
    }

    pub(crate) fn into_rule(self, id: RuleId) -> Rule {
        Rule {
            nonterminal: self.nonterminal,
            name: self.name,
            children: self.children,
            weight: self.weight,
            resample_weight: self.resample_weight,
            bound_vars: self.bound_vars,
            id,
        }
    }
}
