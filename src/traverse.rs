//! Scoped depth-first traversal of derivation trees, and weighted selection
//! of a node to regenerate.
//!
//! The traversal owns its [`Scope`]: when it advances past a node, the
//! bound-variable rules that node introduced are pushed, and they are
//! dropped again once its subtree is finished. A caller that stops iterating
//! early simply drops the iterator, and with it every binding it made.

use crate::error::{GrammarError, Result};
use crate::grammar::{Grammar, Scope};
use crate::symbol::Symbol;
use crate::tree::Node;
use rand::Rng;
use smallvec::SmallVec;

/// Predicate accepting every node.
pub type AnyNode = fn(&Node, &Scope) -> bool;

fn any_node(_: &Node, _: &Scope) -> bool {
    true
}

/// One node produced by a traversal.
#[derive(Clone, Copy, Debug)]
pub struct Visit<'t> {
    pub node: &'t Node,
    /// Distance from the traversal root
    pub depth: usize,
    /// Pre-order position among all nodes, matched or not
    pub index: usize,
}

struct Frame<'t> {
    children: smallvec::IntoIter<[&'t Node; 4]>,
    mark: usize,
    depth: usize,
}

/// Lazy pre-order iterator over the nodes of a tree.
pub struct Subnodes<'t, P = AnyNode> {
    stack: Vec<Frame<'t>>,
    // Last yielded node; its bindings and children are pushed on the next advance.
    pending: Option<(&'t Node, usize)>,
    scope: Scope,
    with_scope: bool,
    index: usize,
    predicate: P,
}

impl<'t, P> Subnodes<'t, P>
where
    P: FnMut(&Node, &Scope) -> bool,
{
    fn new(root: &'t Node, predicate: P, with_scope: bool) -> Self {
        let mut children = SmallVec::new();
        children.push(root);
        Subnodes {
            stack: vec![Frame {
                children: children.into_iter(),
                mark: 0,
                depth: 0,
            }],
            pending: None,
            scope: Scope::new(),
            with_scope,
            index: 0,
            predicate,
        }
    }

    /// The scope in effect at the last yielded node: the bindings of its
    /// ancestors, not its own.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    fn descend(&mut self, node: &'t Node, depth: usize) {
        let mark = self.scope.mark();
        if self.with_scope {
            for rule in &node.introduced {
                self.scope.push(rule.clone());
            }
        }
        let mut children: SmallVec<[&'t Node; 4]> = SmallVec::new();
        for c in &node.children {
            c.collect_nodes(&mut children);
        }
        self.stack.push(Frame {
            children: children.into_iter(),
            mark,
            depth: depth + 1,
        });
    }
}

impl<'t, P> Iterator for Subnodes<'t, P>
where
    P: FnMut(&Node, &Scope) -> bool,
{
    type Item = Visit<'t>;

    fn next(&mut self) -> Option<Visit<'t>> {
        loop {
            if let Some((node, depth)) = self.pending.take() {
                self.descend(node, depth);
            }
            let (node, depth) = loop {
                let frame = self.stack.last_mut()?;
                if let Some(n) = frame.children.next() {
                    break (n, frame.depth);
                }
                let mark = frame.mark;
                self.stack.pop();
                self.scope.truncate(mark);
            };
            let index = self.index;
            self.index += 1;
            self.pending = Some((node, depth));
            if (self.predicate)(node, &self.scope) {
                return Some(Visit { node, depth, index });
            }
        }
    }
}

/// A node picked for regeneration.
#[derive(Clone, Debug)]
pub struct Selection {
    /// Pre-order position, usable with [`Node::get_mut`]
    pub index: usize,
    /// Distance from the traversal root
    pub depth: usize,
    /// The depth recorded in the node when it was generated
    pub node_depth: usize,
    pub nonterminal: Symbol,
    pub resample_weight: f64,
    /// `ln(resample_weight) - ln(Z)`
    pub log_prob: f64,
    /// Bound-variable rules visible at the node
    pub scope: Scope,
}

impl Selection {
    fn new(visit: Visit<'_>, scope: &Scope, z: f64) -> Self {
        let w = visit.node.resample_weight;
        Selection {
            index: visit.index,
            depth: visit.depth,
            node_depth: visit.node.depth,
            nonterminal: visit.node.nonterminal.clone(),
            resample_weight: w,
            log_prob: w.ln() - z.ln(),
            scope: scope.clone(),
        }
    }
}

impl Grammar {
    /// Visit every node of `tree` with scope tracking.
    pub fn iterate<'t>(&self, tree: &'t Node) -> Subnodes<'t, AnyNode> {
        Subnodes::new(tree, any_node as AnyNode, true)
    }

    /// Visit the nodes of `tree` accepted by `predicate`. With `with_scope`
    /// off, introduced rules are not tracked and the predicate always sees an
    /// empty scope.
    pub fn iterate_with<'t, P>(&self, tree: &'t Node, predicate: P, with_scope: bool) -> Subnodes<'t, P>
    where
        P: FnMut(&Node, &Scope) -> bool,
    {
        Subnodes::new(tree, predicate, with_scope)
    }

    /// Total resample weight of the nodes accepted by `predicate`.
    pub fn resample_normalizer<P>(&self, tree: &Node, predicate: P) -> f64
    where
        P: FnMut(&Node, &Scope) -> bool,
    {
        self.iterate_with(tree, predicate, true)
            .map(|v| v.node.resample_weight)
            .sum()
    }

    /// Pick a node accepted by `predicate` with probability proportional to
    /// its resample weight.
    pub fn sample_random_node<P, R>(&self, tree: &Node, mut predicate: P, rng: &mut R) -> Result<Selection>
    where
        P: FnMut(&Node, &Scope) -> bool,
        R: Rng + ?Sized,
    {
        let z = self.resample_normalizer(tree, &mut predicate);
        if !(z > 0.0 && z.is_finite()) {
            return Err(GrammarError::NothingToResample(z));
        }
        let r = rng.gen::<f64>() * z;

        let mut nodes = self.iterate_with(tree, &mut predicate, true);
        let mut cumulative = 0.0;
        let mut last = None;
        while let Some(visit) = nodes.next() {
            let w = visit.node.resample_weight;
            if w <= 0.0 {
                continue;
            }
            cumulative += w;
            if cumulative > r {
                return Ok(Selection::new(visit, nodes.scope(), z));
            }
            last = Some(visit.index);
        }
        // Rounding can leave the running sum a hair below r.
        let index = last.ok_or(GrammarError::NothingToResample(z))?;
        self.select_at(tree, index, z)
    }

    /// Build the selection for the node at pre-order `index`.
    fn select_at(&self, tree: &Node, index: usize, z: f64) -> Result<Selection> {
        let mut nodes = self.iterate(tree);
        while let Some(visit) = nodes.next() {
            if visit.index == index {
                return Ok(Selection::new(visit, nodes.scope(), z));
            }
        }
        Err(GrammarError::InvalidIndex(index))
    }
}
