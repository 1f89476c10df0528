//! Exhaustive, lazy enumeration of derivation trees up to a depth bound.
//!
//! Each nonterminal yields its terminal-producing rules first, then every
//! combination of children for its other rules. Combinations are produced by
//! an odometer: one sub-enumerator per child, the right-most advancing first
//! and carrying leftward by restarting the exhausted position.

use crate::error::{GrammarError, Result};
use crate::generate::choice_log_prob;
use crate::grammar::Grammar;
use crate::rule::Rule;
use crate::symbol::Item;
use crate::tree::{Child, Node};
use smallvec::SmallVec;
use tracing::trace;

type Nodes<'g> = Box<dyn Iterator<Item = Node> + 'g>;
type Children<'g> = Box<dyn Iterator<Item = Child> + 'g>;

/// Iterator over every tree for a nonterminal within a depth bound.
pub struct Enumerate<'g> {
    inner: Nodes<'g>,
}

impl Iterator for Enumerate<'_> {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        let node = self.inner.next()?;
        trace!(tree = %node, "enumerated");
        Some(node)
    }
}

/// Mixed-radix counter over the values of a list of items.
struct Odometer<'g> {
    grammar: &'g Grammar,
    items: &'g [Item],
    budget: usize,
    level: usize,
    slots: SmallVec<[Children<'g>; 4]>,
    current: Vec<Child>,
    started: bool,
    done: bool,
}

impl<'g> Odometer<'g> {
    fn new(grammar: &'g Grammar, items: &'g [Item], budget: usize, level: usize) -> Self {
        let mut slots = SmallVec::new();
        let mut current = Vec::with_capacity(items.len());
        let mut done = false;
        for item in items {
            let mut it = grammar.enumerate_item(item, budget, level);
            match it.next() {
                Some(first) => current.push(first),
                None => done = true,
            }
            slots.push(it);
        }
        Odometer {
            grammar,
            items,
            budget,
            level,
            slots,
            current,
            started: false,
            done,
        }
    }
}

impl Iterator for Odometer<'_> {
    type Item = Vec<Child>;

    fn next(&mut self) -> Option<Vec<Child>> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(self.current.clone());
        }
        let (grammar, items) = (self.grammar, self.items);
        for pos in (0..self.slots.len()).rev() {
            if let Some(value) = self.slots[pos].next() {
                self.current[pos] = value;
                return Some(self.current.clone());
            }
            // carry
            let mut restarted = grammar.enumerate_item(&items[pos], self.budget, self.level);
            match restarted.next() {
                Some(first) => self.current[pos] = first,
                None => break,
            }
            self.slots[pos] = restarted;
        }
        self.done = true;
        None
    }
}

fn terminal_child(item: &Item) -> Child {
    match item {
        Item::Symbol(s) => Child::Leaf(s.clone()),
        Item::Seq(items) => Child::Seq(items.iter().map(terminal_child).collect()),
    }
}

impl Grammar {
    /// Enumerate every tree rooted at `nonterminal` whose nonterminal
    /// expansions nest at most `max_depth` deep. Each call starts afresh.
    ///
    /// Grammars whose rules reachable from `nonterminal` bind variables are
    /// rejected.
    pub fn enumerate(&self, nonterminal: &str, max_depth: usize) -> Result<Enumerate<'_>> {
        if !self.is_nonterminal(nonterminal) {
            return Err(GrammarError::NotANonterminal(nonterminal.into()));
        }
        let mut reachable: Vec<_> = self.reachable_from(nonterminal).into_iter().collect();
        reachable.sort();
        for nt in &reachable {
            if let Some(rule) = self.rules(nt).iter().find(|r| r.binds_variables()) {
                return Err(GrammarError::UnsupportedBoundVariables {
                    nonterminal: nt.clone(),
                    rule: rule.name.clone(),
                });
            }
        }
        Ok(Enumerate {
            inner: self.enumerate_nonterminal(nonterminal, max_depth, 0),
        })
    }

    fn enumerate_nonterminal<'g>(&'g self, nonterminal: &str, budget: usize, level: usize) -> Nodes<'g> {
        let rules = self.rules(nonterminal);
        let total: f64 = rules.iter().map(|r| r.weight).sum();

        let terminals = rules
            .iter()
            .filter(move |r| self.produces_terminals(r))
            .map(move |r| {
                let children = r.children.iter().map(terminal_child).collect();
                Node::from_rule(r, children, choice_log_prob(r.weight, total), level)
            });
        let expansions = rules
            .iter()
            .filter(move |r| budget > 0 && !self.produces_terminals(r))
            .flat_map(move |r| self.expand_rule(r, budget - 1, level, total));
        Box::new(terminals.chain(expansions))
    }

    fn expand_rule<'g>(&'g self, rule: &'g Rule, budget: usize, level: usize, total: f64) -> Nodes<'g> {
        let log_prob = choice_log_prob(rule.weight, total);
        Box::new(
            Odometer::new(self, &rule.children, budget, level + 1)
                .map(move |children| Node::from_rule(rule, children, log_prob, level)),
        )
    }

    fn enumerate_item<'g>(&'g self, item: &'g Item, budget: usize, level: usize) -> Children<'g> {
        match item {
            Item::Symbol(s) if self.is_nonterminal(s) => {
                Box::new(self.enumerate_nonterminal(s, budget, level).map(Child::Node))
            }
            Item::Symbol(s) => Box::new(std::iter::once(Child::Leaf(s.clone()))),
            Item::Seq(items) => Box::new(Odometer::new(self, items, budget, level).map(Child::Seq)),
        }
    }
}
