//! The rule store: a probabilistic grammar with scoped bound variables.
//!
//! Permanent rules live in the [`Grammar`] and are only changed through
//! `&mut self`. Rules for variables bound by lambda-like productions are
//! ephemeral; they live in a [`Scope`] overlay owned by the generation or
//! traversal call that introduced them, so they can never outlive the
//! subtree they belong to.

use crate::error::{GrammarError, Result};
use crate::rule::{Rule, RuleId, RuleSpec};
use crate::symbol::{Item, Symbol};
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use tracing::{debug, trace};

/// Configuration for bound-variable rules.
#[derive(Debug, Clone)]
pub struct GrammarConfig {
    /// Generation weight of a bound-variable rule (bias towards using variables).
    pub bound_var_weight: f64,
    /// Resample weight of nodes built from bound-variable rules.
    pub bound_var_resample_weight: f64,
    /// Name prefix of bound-variable rules; the depth is appended.
    pub bound_var_prefix: String,
}

impl Default for GrammarConfig {
    fn default() -> Self {
        GrammarConfig {
            bound_var_weight: 10.0,
            bound_var_resample_weight: 1.0,
            bound_var_prefix: "y".to_string(),
        }
    }
}

/// Bound-variable rules visible at some point of a derivation.
///
/// Rules are kept in push order; callers take a [`mark`](Scope::mark)
/// before pushing and [`truncate`](Scope::truncate) back to it when the
/// subtree is finished. Ids are allocated downwards from -1 and only need
/// to be unique within one scope.
#[derive(Clone, Debug, Default)]
pub struct Scope {
    rules: Vec<Rule>,
    last_id: i64,
}

impl Scope {
    /// Create an empty scope.
    pub fn new() -> Self {
        Scope::default()
    }

    /// Create an empty scope whose fresh ids continue below `lowest`.
    pub fn below(lowest: RuleId) -> Self {
        Scope {
            rules: Vec::new(),
            last_id: lowest.0.min(0),
        }
    }

    /// Number of bound-variable rules currently in scope.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// All rules in scope, outermost first.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Rules in scope for a nonterminal.
    pub fn visible<'a>(&'a self, nonterminal: &'a str) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules
            .iter()
            .filter(move |r| &*r.nonterminal == nonterminal)
    }

    /// Check if any rule in scope expands `nonterminal`.
    pub fn binds(&self, nonterminal: &str) -> bool {
        self.visible(nonterminal).next().is_some()
    }

    /// Current position, to truncate back to later.
    pub fn mark(&self) -> usize {
        self.rules.len()
    }

    /// Drop every rule pushed since `mark`.
    pub fn truncate(&mut self, mark: usize) {
        self.rules.truncate(mark);
    }

    /// Bring an existing rule into scope (used when replaying a tree).
    pub fn push(&mut self, rule: Rule) {
        if rule.id.0 < self.last_id {
            self.last_id = rule.id.0;
        }
        self.rules.push(rule);
    }

    /// Make fresh ids continue below `lowest`.
    pub fn reserve_below(&mut self, lowest: RuleId) {
        self.last_id = self.last_id.min(lowest.0);
    }

    /// The lowest id handed out so far.
    pub fn lowest_id(&self) -> RuleId {
        RuleId(self.last_id)
    }

    fn fresh_id(&mut self) -> RuleId {
        self.last_id -= 1;
        RuleId(self.last_id)
    }
}

/// A probabilistic context-free grammar keyed by nonterminal.
#[derive(Clone, Debug, Default)]
pub struct Grammar {
    rules: FxHashMap<Symbol, Vec<Rule>>,
    next_id: i64,
    config: GrammarConfig,
}

impl Grammar {
    /// Create an empty grammar with the default configuration.
    pub fn new() -> Self {
        Grammar::default()
    }

    /// Create an empty grammar with a custom configuration.
    pub fn with_config(config: GrammarConfig) -> Self {
        Grammar {
            rules: FxHashMap::default(),
            next_id: 0,
            config,
        }
    }

    pub fn config(&self) -> &GrammarConfig {
        &self.config
    }

    /// Add a rule with resample weight 1 and no bound variables.
    pub fn add_rule(
        &mut self,
        nonterminal: impl Into<Symbol>,
        name: impl Into<Symbol>,
        children: Vec<Item>,
        weight: f64,
    ) -> Result<Rule> {
        self.add_rule_with(RuleSpec::new(nonterminal, name, children, weight))
    }

    /// Add a rule, assigning it the next permanent id.
    pub fn add_rule_with(&mut self, spec: RuleSpec) -> Result<Rule> {
        let rule = spec.into_rule(RuleId(self.next_id));
        rule.validate()?;
        self.next_id += 1;
        debug!(rule = %rule, id = rule.id.0, "adding rule");
        self.rules
            .entry(rule.nonterminal.clone())
            .or_default()
            .push(rule.clone());
        Ok(rule)
    }

    /// Remove a rule by identity. A nonterminal left without rules stops
    /// being a nonterminal.
    pub fn remove_rule(&mut self, rule: &Rule) -> Option<Rule> {
        let list = self.rules.get_mut(&rule.nonterminal)?;
        let pos = list.iter().position(|r| r == rule)?;
        let removed = list.remove(pos);
        if list.is_empty() {
            self.rules.remove(&rule.nonterminal);
        }
        debug!(rule = %removed, "removed rule");
        Some(removed)
    }

    /// Create a bound-variable rule for `nonterminal` introduced at `depth`
    /// and push it into `scope`.
    pub fn add_bound_variable_rule(
        &self,
        scope: &mut Scope,
        nonterminal: impl Into<Symbol>,
        depth: usize,
    ) -> Rule {
        let name = format!("{}{}", self.config.bound_var_prefix, depth);
        let rule = Rule {
            nonterminal: nonterminal.into(),
            name: name.into(),
            children: Vec::new(),
            weight: self.config.bound_var_weight,
            resample_weight: self.config.bound_var_resample_weight,
            bound_vars: Vec::new(),
            id: scope.fresh_id(),
        };
        trace!(nonterminal = %rule.nonterminal, name = %rule.name, id = rule.id.0, "binding variable");
        scope.push(rule.clone());
        rule
    }

    /// Check if `symbol` has permanent rules.
    pub fn is_nonterminal(&self, symbol: &str) -> bool {
        self.rules.contains_key(symbol)
    }

    /// Check if `symbol` has permanent rules or rules bound in `scope`.
    pub fn is_nonterminal_in(&self, symbol: &str, scope: &Scope) -> bool {
        self.is_nonterminal(symbol) || scope.binds(symbol)
    }

    /// Check if `item` is terminal: not a nonterminal, and for sequences,
    /// made only of terminals.
    pub fn is_terminal(&self, item: &Item) -> bool {
        self.is_terminal_in(item, &Scope::new())
    }

    /// Scope-aware version of [`is_terminal`](Grammar::is_terminal).
    pub fn is_terminal_in(&self, item: &Item, scope: &Scope) -> bool {
        match item {
            Item::Symbol(s) => !self.is_nonterminal_in(s, scope),
            Item::Seq(items) => items.iter().all(|i| self.is_terminal_in(i, scope)),
        }
    }

    /// Check if every child of a rule is terminal.
    pub fn produces_terminals(&self, rule: &Rule) -> bool {
        rule.children.iter().all(|c| self.is_terminal(c))
    }

    /// Permanent rules for a nonterminal, in insertion order.
    pub fn rules(&self, nonterminal: &str) -> &[Rule] {
        self.rules
            .get(nonterminal)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Permanent rules followed by the rules bound in `scope`.
    pub fn visible_rules<'a>(
        &'a self,
        nonterminal: &'a str,
        scope: &'a Scope,
    ) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules(nonterminal).iter().chain(scope.visible(nonterminal))
    }

    /// All nonterminals, sorted.
    pub fn nonterminals(&self) -> Vec<Symbol> {
        let mut nts: Vec<Symbol> = self.rules.keys().cloned().collect();
        nts.sort();
        nts
    }

    /// Total number of permanent rules.
    pub fn rule_count(&self) -> usize {
        self.rules.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterate over all permanent rules, grouped by sorted nonterminal.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.nonterminals()
            .into_iter()
            .flat_map(move |nt| self.rules(&nt).iter())
    }

    /// Look up a permanent rule by id.
    pub fn get_rule(&self, id: RuleId) -> Option<&Rule> {
        self.rules.values().flatten().find(|r| r.id == id)
    }

    /// Change the generation weight of a permanent rule.
    pub fn set_rule_weight(&mut self, id: RuleId, weight: f64) -> Result<()> {
        let rule = self
            .rules
            .values_mut()
            .flatten()
            .find(|r| r.id == id)
            .ok_or(GrammarError::UnknownRule(id))?;
        if !(weight.is_finite() && weight > 0.0) {
            return Err(GrammarError::InvalidWeight {
                nonterminal: rule.nonterminal.clone(),
                name: rule.name.clone(),
                kind: "generation",
                value: weight,
            });
        }
        rule.weight = weight;
        Ok(())
    }

    /// Nonterminals reachable from `start` through permanent rules,
    /// including `start` itself when it is a nonterminal.
    pub fn reachable_from(&self, start: &str) -> FxHashSet<Symbol> {
        let mut seen = FxHashSet::default();
        let mut stack: Vec<Symbol> = Vec::new();
        if let Some((nt, _)) = self.rules.get_key_value(start) {
            stack.push(nt.clone());
        }
        while let Some(nt) = stack.pop() {
            if !seen.insert(nt.clone()) {
                continue;
            }
            for rule in self.rules(&nt) {
                for child in &rule.children {
                    child.for_each_symbol(&mut |s| {
                        if self.is_nonterminal(s) && !seen.contains(s) {
                            stack.push(s.clone());
                        }
                    });
                }
                for bv in &rule.bound_vars {
                    if self.is_nonterminal(bv) && !seen.contains(bv) {
                        stack.push(bv.clone());
                    }
                }
            }
        }
        seen
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rule in self.iter() {
            writeln!(f, "{}", rule)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::items;

    fn arithmetic() -> Grammar {
        let mut g = Grammar::new();
        g.add_rule("START", "", items(["EXPR"]), 1.0).unwrap();
        g.add_rule("EXPR", "plus_", items(["EXPR", "EXPR"]), 4.0).unwrap();
        g.add_rule("EXPR", "x", Vec::new(), 25.0).unwrap();
        g.add_rule("EXPR", "1.0", Vec::new(), 2.0).unwrap();
        g
    }

    #[test]
    fn test_rule_ids_in_insertion_order() {
        let g = arithmetic();
        let ids: Vec<i64> = g.rules("EXPR").iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(g.rules("START")[0].id, RuleId(0));
        assert_eq!(g.rule_count(), 4);
    }

    #[test]
    fn test_terminal_classification() {
        let g = arithmetic();
        assert!(g.is_nonterminal("EXPR"));
        assert!(!g.is_nonterminal("x"));
        assert!(g.is_terminal(&Item::from("x")));
        assert!(!g.is_terminal(&Item::from("EXPR")));
        assert!(g.is_terminal(&Item::seq(items(["a", "b"]))));
        assert!(!g.is_terminal(&Item::seq(vec![
            Item::from("a"),
            Item::seq(items(["EXPR"])),
        ])));
    }

    #[test]
    fn test_remove_rule() {
        let mut g = arithmetic();
        let start = g.rules("START")[0].clone();
        assert_eq!(g.remove_rule(&start), Some(start.clone()));
        assert!(!g.is_nonterminal("START"));
        assert_eq!(g.remove_rule(&start), None);
        assert_eq!(g.rule_count(), 3);
    }

    #[test]
    fn test_malformed_lambda_rejected() {
        let mut g = Grammar::new();
        let err = g
            .add_rule_with(RuleSpec::new("FUNCTION", "lambda", Vec::new(), 1.0).bind("EXPR"))
            .unwrap_err();
        assert!(matches!(err, GrammarError::MalformedLambda { found: 0, .. }));
        assert!(g.is_empty());
    }

    #[test]
    fn test_bound_variable_rules_live_in_scope() {
        let g = arithmetic();
        let mut scope = Scope::new();
        let mark = scope.mark();

        let y1 = g.add_bound_variable_rule(&mut scope, "EXPR", 1);
        let y2 = g.add_bound_variable_rule(&mut scope, "EXPR", 2);
        assert_eq!(y1.id, RuleId(-1));
        assert_eq!(y2.id, RuleId(-2));
        assert_eq!(&*y1.name, "y1");
        assert_eq!(y1.weight, 10.0);
        assert!(y1.children.is_empty());

        assert_eq!(g.visible_rules("EXPR", &scope).count(), 5);
        assert_eq!(g.rules("EXPR").len(), 3);

        scope.truncate(mark);
        assert_eq!(g.visible_rules("EXPR", &scope).count(), 3);
        assert_eq!(scope.lowest_id(), RuleId(-2));
    }

    #[test]
    fn test_scope_makes_new_nonterminals() {
        let g = arithmetic();
        let mut scope = Scope::new();
        assert!(!g.is_nonterminal_in("VAR", &scope));
        g.add_bound_variable_rule(&mut scope, "VAR", 0);
        assert!(g.is_nonterminal_in("VAR", &scope));
        assert!(!g.is_nonterminal("VAR"));
    }

    #[test]
    fn test_scope_below() {
        let mut scope = Scope::below(RuleId(-7));
        let g = Grammar::new();
        assert_eq!(g.add_bound_variable_rule(&mut scope, "E", 0).id, RuleId(-8));
        assert_eq!(Scope::below(RuleId(4)).lowest_id(), RuleId(0));
    }

    #[test]
    fn test_set_rule_weight() {
        let mut g = arithmetic();
        g.set_rule_weight(RuleId(2), 5.0).unwrap();
        assert_eq!(g.get_rule(RuleId(2)).unwrap().weight, 5.0);
        assert!(g.set_rule_weight(RuleId(2), -1.0).is_err());
        assert_eq!(
            g.set_rule_weight(RuleId(99), 1.0),
            Err(GrammarError::UnknownRule(RuleId(99)))
        );
    }

    #[test]
    fn test_reachable_from() {
        let mut g = arithmetic();
        g.add_rule("OTHER", "o", Vec::new(), 1.0).unwrap();
        let reach = g.reachable_from("START");
        assert!(reach.contains("START"));
        assert!(reach.contains("EXPR"));
        assert!(!reach.contains("OTHER"));
        assert!(g.reachable_from("x").is_empty());
    }

    #[test]
    fn test_grammar_display() {
        let g = arithmetic();
        let text = format!("{}", g);
        assert_eq!(
            text,
            "EXPR -> plus_(EXPR, EXPR) 4.\nEXPR -> x 25.\nEXPR -> \"1.0\" 2.\nSTART -> (EXPR) 1.\n"
        );
    }
}
