//! Top-down sampling of derivation trees.

use crate::error::{GrammarError, Result};
use crate::grammar::{Grammar, Scope};
use crate::rule::Rule;
use crate::symbol::Item;
use crate::tree::{Child, Node};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use std::borrow::Cow;
use tracing::trace;

/// Log-probability of picking an alternative of weight `weight` out of
/// alternatives summing to `total`.
pub fn choice_log_prob(weight: f64, total: f64) -> f64 {
    weight.ln() - total.ln()
}

/// Weighted categorical draw. Returns the chosen index and its
/// log-probability.
pub fn weighted_sample<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Result<(usize, f64)> {
    let dist = WeightedIndex::new(weights)?;
    let idx = dist.sample(rng);
    let total: f64 = weights.iter().sum();
    Ok((idx, choice_log_prob(weights[idx], total)))
}

impl Grammar {
    /// Generate a tree from `nonterminal` with a fresh scope at depth 0.
    pub fn generate<R: Rng + ?Sized>(&self, nonterminal: &str, rng: &mut R) -> Result<Node> {
        let mut scope = Scope::new();
        self.generate_in(nonterminal, 0, &mut scope, rng)
    }

    /// Generate a tree for `nonterminal` at `depth` with the bound variables
    /// of `scope` visible. The scope is left as it was found.
    pub fn generate_in<R: Rng + ?Sized>(
        &self,
        nonterminal: &str,
        depth: usize,
        scope: &mut Scope,
        rng: &mut R,
    ) -> Result<Node> {
        if !self.is_nonterminal_in(nonterminal, scope) {
            return Err(GrammarError::NotANonterminal(nonterminal.into()));
        }
        let (rule, log_prob) = self.draw_rule(nonterminal, scope, rng)?;
        trace!(rule = %rule.name, nonterminal, depth, log_prob, "expanding");

        let mark = scope.mark();
        let introduced: Vec<Rule> = rule
            .bound_vars
            .iter()
            .map(|bv| self.add_bound_variable_rule(scope, bv.clone(), depth + 1))
            .collect();
        let children = rule
            .children
            .iter()
            .map(|item| self.generate_item(item, depth + 1, scope, rng))
            .collect::<Result<Vec<_>>>();
        scope.truncate(mark);

        let mut node = Node::from_rule(&rule, children?, log_prob, depth);
        node.introduced = introduced;
        Ok(node)
    }

    /// Generate from any right-hand-side item: nonterminals are expanded,
    /// sequences are mapped elementwise at the same depth, and terminals are
    /// returned unchanged.
    pub fn generate_item<R: Rng + ?Sized>(
        &self,
        item: &Item,
        depth: usize,
        scope: &mut Scope,
        rng: &mut R,
    ) -> Result<Child> {
        match item {
            Item::Seq(items) => items
                .iter()
                .map(|i| self.generate_item(i, depth, scope, rng))
                .collect::<Result<Vec<_>>>()
                .map(Child::Seq),
            Item::Symbol(s) if self.is_nonterminal_in(s, scope) => {
                self.generate_in(s, depth, scope, rng).map(Child::Node)
            }
            Item::Symbol(s) => Ok(Child::Leaf(s.clone())),
        }
    }

    /// Draw one visible rule for `nonterminal`. Permanent rules are borrowed;
    /// bound-variable rules are copied out of the scope so it can be
    /// extended while the rule is in use.
    fn draw_rule<'g, R: Rng + ?Sized>(
        &'g self,
        nonterminal: &str,
        scope: &Scope,
        rng: &mut R,
    ) -> Result<(Cow<'g, Rule>, f64)> {
        let base = self.rules(nonterminal);
        let weights: Vec<f64> = self
            .visible_rules(nonterminal, scope)
            .map(|r| r.weight)
            .collect();
        let (idx, log_prob) = weighted_sample(&weights, rng)?;
        let rule = match base.get(idx) {
            Some(rule) => Cow::Borrowed(rule),
            None => scope
                .visible(nonterminal)
                .nth(idx - base.len())
                .cloned()
                .map(Cow::Owned)
                .ok_or_else(|| GrammarError::NotANonterminal(nonterminal.into()))?,
        };
        Ok((rule, log_prob))
    }

    /// Log-normalizer of the rules visible for `nonterminal`.
    pub fn log_normalizer(&self, nonterminal: &str, scope: &Scope) -> f64 {
        self.visible_rules(nonterminal, scope)
            .map(|r| r.weight)
            .sum::<f64>()
            .ln()
    }
}
