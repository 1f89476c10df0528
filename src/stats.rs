//! Rule-usage statistics and priors over trees and grammars.

use crate::grammar::Grammar;
use crate::rule::RuleId;
use crate::symbol::Symbol;
use crate::tree::Node;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// How often each permanent rule is used in `tree`, per nonterminal, in
/// rule-list order. Bound-variable nodes are not counted.
pub fn rule_counts(grammar: &Grammar, tree: &Node) -> BTreeMap<Symbol, Vec<u32>> {
    rule_counts_over(grammar, std::iter::once(tree))
}

/// Rule counts summed over several trees.
pub fn rule_counts_over<'t>(
    grammar: &Grammar,
    trees: impl IntoIterator<Item = &'t Node>,
) -> BTreeMap<Symbol, Vec<u32>> {
    let mut by_id: FxHashMap<RuleId, u32> = FxHashMap::default();
    for tree in trees {
        for node in tree.iter().filter(|n| !n.is_bound_variable()) {
            *by_id.entry(node.rule_id).or_insert(0) += 1;
        }
    }
    grammar
        .nonterminals()
        .into_iter()
        .map(|nt| {
            let counts = grammar
                .rules(&nt)
                .iter()
                .map(|r| by_id.get(&r.id).copied().unwrap_or(0))
                .collect();
            (nt, counts)
        })
        .collect()
}

/// Rational-rules prior: the Dirichlet-multinomial marginal likelihood of the
/// tree's rule counts with a symmetric pseudocount per rule.
pub fn rational_rules_prior(grammar: &Grammar, tree: &Node, pseudocount: f64) -> f64 {
    rule_counts(grammar, tree)
        .values()
        .map(|counts| {
            let alpha = vec![pseudocount; counts.len()];
            let posterior: Vec<f64> = counts.iter().map(|&c| f64::from(c) + pseudocount).collect();
            ln_beta(&posterior) - ln_beta(&alpha)
        })
        .sum()
}

/// Sum over permanent rules of the Gamma(`shape`, `scale`) log-density of
/// the rule weight.
pub fn gamma_weight_prior(grammar: &Grammar, shape: f64, scale: f64) -> f64 {
    let norm = ln_gamma(shape) + shape * scale.ln();
    grammar
        .iter()
        .map(|r| (shape - 1.0) * r.weight.ln() - r.weight / scale - norm)
        .sum()
}

const LANCZOS_G: f64 = 7.0;
const LANCZOS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

/// Natural log of the absolute value of the gamma function (Lanczos
/// approximation, about 15 significant digits).
pub fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        // reflection
        return (PI / (PI * x).sin().abs()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let mut a = LANCZOS[0];
    let t = x + LANCZOS_G + 0.5;
    for (i, c) in LANCZOS.iter().enumerate().skip(1) {
        a += c / (x + i as f64);
    }
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
}

/// Log of the multivariate beta function: `Σ lnΓ(v_i) − lnΓ(Σ v_i)`.
pub fn ln_beta(v: &[f64]) -> f64 {
    v.iter().map(|&x| ln_gamma(x)).sum::<f64>() - ln_gamma(v.iter().sum())
}

/// `ln Σ exp(x_i)`, computed without overflow. Empty input gives `-inf`.
pub fn logsumexp(xs: &[f64]) -> f64 {
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return max;
    }
    max + xs.iter().map(|x| (x - max).exp()).sum::<f64>().ln()
}
