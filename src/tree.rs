//! Derivation trees.
//!
//! A [`Node`] records the rule that produced it, the log-probability of that
//! single choice, and the bound-variable rules it brought into scope for its
//! children. Trees own their children, so `clone` is a deep copy; the
//! proposal kernel mutates only copies it owns.

use crate::rule::{Rule, RuleId};
use crate::symbol::{write_symbol, Symbol};
use std::fmt;

/// A child of a node: a subtree, a terminal literal, or a structured literal.
#[derive(Clone, Debug, PartialEq)]
pub enum Child {
    Node(Node),
    Leaf(Symbol),
    Seq(Vec<Child>),
}

impl Child {
    /// Push the direct subtrees of this child (looking through sequences).
    pub(crate) fn collect_nodes<'a>(&'a self, out: &mut impl Extend<&'a Node>) {
        match self {
            Child::Node(n) => out.extend(Some(n)),
            Child::Leaf(_) => {}
            Child::Seq(children) => {
                for c in children {
                    c.collect_nodes(out);
                }
            }
        }
    }
}

impl fmt::Display for Child {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Child::Node(n) => write!(f, "{}", n),
            Child::Leaf(s) => write_symbol(f, s),
            Child::Seq(children) => {
                write!(f, "[")?;
                for (i, c) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", c)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// A node of a derivation tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    /// The nonterminal this node expands
    pub nonterminal: Symbol,
    /// Name of the rule that produced it
    pub name: Symbol,
    pub rule_id: RuleId,
    pub children: Vec<Child>,
    /// Log-probability of choosing this node's rule, and only that choice
    pub log_prob: f64,
    pub resample_weight: f64,
    /// Bound-variable rules this node put in scope for its children
    pub introduced: Vec<Rule>,
    /// Distance from the root of the generation call that built the node
    pub depth: usize,
}

impl Node {
    /// Create a node for a rule choice.
    pub fn from_rule(rule: &Rule, children: Vec<Child>, log_prob: f64, depth: usize) -> Self {
        Node {
            nonterminal: rule.nonterminal.clone(),
            name: rule.name.clone(),
            rule_id: rule.id,
            children,
            log_prob,
            resample_weight: rule.resample_weight,
            introduced: Vec::new(),
            depth,
        }
    }

    /// Check if this node was produced by a bound-variable rule.
    pub fn is_bound_variable(&self) -> bool {
        self.rule_id.is_bound_variable()
    }

    /// Direct subtrees, looking through structured literals.
    pub fn child_nodes(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        for c in &self.children {
            c.collect_nodes(&mut out);
        }
        out
    }

    /// Iterate over every node in pre-order, ignoring scope.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            let start = stack.len();
            for c in &node.children {
                c.collect_nodes(&mut stack);
            }
            stack[start..].reverse();
            Some(node)
        })
    }

    /// Log-probability of the whole tree: the sum of every node's `log_prob`.
    pub fn log_probability(&self) -> f64 {
        self.iter().map(|n| n.log_prob).sum()
    }

    /// Number of nodes.
    pub fn size(&self) -> usize {
        self.iter().count()
    }

    /// Length of the longest root-to-leaf path, counted in nodes.
    pub fn height(&self) -> usize {
        1 + self
            .child_nodes()
            .into_iter()
            .map(Node::height)
            .max()
            .unwrap_or(0)
    }

    /// Terminal literals in left-to-right order.
    pub fn leaves(&self) -> Vec<Symbol> {
        fn walk(child: &Child, out: &mut Vec<Symbol>) {
            match child {
                Child::Leaf(s) => out.push(s.clone()),
                Child::Node(n) => {
                    for c in &n.children {
                        walk(c, out);
                    }
                }
                Child::Seq(cs) => {
                    for c in cs {
                        walk(c, out);
                    }
                }
            }
        }
        let mut out = Vec::new();
        for c in &self.children {
            walk(c, &mut out);
        }
        out
    }

    /// The lowest rule id used or introduced anywhere in the tree.
    pub fn lowest_rule_id(&self) -> RuleId {
        self.iter()
            .flat_map(|n| std::iter::once(n.rule_id).chain(n.introduced.iter().map(|r| r.id)))
            .min()
            .unwrap_or(RuleId(0))
    }

    /// Find the node at a pre-order position.
    pub fn get(&self, index: usize) -> Option<&Node> {
        self.iter().nth(index)
    }

    /// Find the node at a pre-order position, mutably.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Node> {
        let mut remaining = index;
        self.find_mut(&mut remaining)
    }

    fn find_mut(&mut self, remaining: &mut usize) -> Option<&mut Node> {
        if *remaining == 0 {
            return Some(self);
        }
        *remaining -= 1;
        for child in &mut self.children {
            if let Some(node) = find_in_child(child, remaining) {
                return Some(node);
            }
        }
        None
    }
}

fn find_in_child<'a>(child: &'a mut Child, remaining: &mut usize) -> Option<&'a mut Node> {
    match child {
        Child::Node(n) => n.find_mut(remaining),
        Child::Leaf(_) => None,
        Child::Seq(children) => {
            for c in children {
                if let Some(node) = find_in_child(c, remaining) {
                    return Some(node);
                }
            }
            None
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() && self.children.len() == 1 {
            return write!(f, "{}", self.children[0]);
        }
        if !self.name.is_empty() {
            write_symbol(f, &self.name)?;
        }
        if !self.children.is_empty() {
            write!(f, "(")?;
            for (i, c) in self.children.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", c)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}
