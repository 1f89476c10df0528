//! Subtree-regeneration proposals for Metropolis-Hastings.

use crate::error::{GrammarError, Result};
use crate::grammar::{Grammar, Scope};
use crate::tree::Node;
use rand::Rng;
use tracing::debug;

/// A proposed tree with its forward minus backward log proposal probability.
#[derive(Clone, Debug)]
pub struct Proposal {
    pub tree: Node,
    pub log_fb: f64,
}

impl Grammar {
    /// Regenerate one node of `tree`, chosen by resample weight.
    pub fn propose<R: Rng + ?Sized>(&self, tree: &Node, rng: &mut R) -> Result<Proposal> {
        self.propose_with(tree, |_, _| true, rng)
    }

    /// Regenerate one node of `tree` among those accepted by `predicate`.
    ///
    /// The input tree is never modified. With `p` the resample weight of the
    /// selected node and `Z`, `Z'` the normalizers before and after, the
    /// returned `log_fb` is
    /// `(ln p - ln Z + lp(new)) - (ln p - ln Z' + lp(old))`
    /// where `lp` is the whole-tree log-probability.
    pub fn propose_with<P, R>(&self, tree: &Node, mut predicate: P, rng: &mut R) -> Result<Proposal>
    where
        P: FnMut(&Node, &Scope) -> bool,
        R: Rng + ?Sized,
    {
        let selection = self.sample_random_node(tree, &mut predicate, rng)?;

        let mut scope = selection.scope;
        scope.reserve_below(tree.lowest_rule_id());
        let replacement = self.generate_in(&selection.nonterminal, selection.node_depth, &mut scope, rng)?;

        let mut new_tree = tree.clone();
        *new_tree
            .get_mut(selection.index)
            .ok_or(GrammarError::InvalidIndex(selection.index))? = replacement;

        let new_z = self.resample_normalizer(&new_tree, &mut predicate);
        let forward = selection.log_prob + new_tree.log_probability();
        let backward = selection.resample_weight.ln() - new_z.ln() + tree.log_probability();
        debug!(
            index = selection.index,
            nonterminal = %selection.nonterminal,
            forward,
            backward,
            "proposed {}",
            new_tree
        );
        Ok(Proposal {
            tree: new_tree,
            log_fb: forward - backward,
        })
    }
}
