//! Statistical and structural properties checked across modules.

use crate::grammar::Grammar;
use crate::parser::parse_grammar;
use crate::tree::Node;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn lambda_grammar() -> Grammar {
    parse_grammar(
        r#"
        START -> (EXPR).
        EXPR -> x 5.
        EXPR -> plus_(EXPR, EXPR) 1.
        EXPR -> apply(FUNCTION, EXPR) 2.
        FUNCTION -> lambda(EXPR) bind=[EXPR].
        "#,
    )
    .unwrap()
}

fn rule_list_sizes(g: &Grammar) -> Vec<(String, usize)> {
    g.nonterminals()
        .into_iter()
        .map(|nt| (nt.to_string(), g.rules(&nt).len()))
        .collect()
}

fn check_bound_scoping(node: &Node, in_scope: &mut Vec<(i64, usize)>) {
    if node.is_bound_variable() {
        let &(_, introduced_at) = in_scope
            .iter()
            .find(|(id, _)| *id == node.rule_id.0)
            .unwrap_or_else(|| panic!("{} used outside its lambda", node.name));
        assert_eq!(&*node.name, format!("y{}", introduced_at + 1));
    }
    let mark = in_scope.len();
    in_scope.extend(node.introduced.iter().map(|r| (r.id.0, node.depth)));
    for child in node.child_nodes() {
        check_bound_scoping(child, in_scope);
    }
    in_scope.truncate(mark);
}

#[test]
fn test_probability_round_trip() {
    init_tracing();
    let g = lambda_grammar();
    let mut rng = StdRng::seed_from_u64(101);
    for _ in 0..500 {
        let t = g.generate("START", &mut rng).unwrap();
        let mut total = 0.0;
        let mut nodes = g.iterate(&t);
        while let Some(v) = nodes.next() {
            let node = v.node;
            let weight = g
                .visible_rules(&node.nonterminal, nodes.scope())
                .find(|r| r.id == node.rule_id)
                .map(|r| r.weight)
                .unwrap();
            let log_z = g.log_normalizer(&node.nonterminal, nodes.scope());
            assert!((node.log_prob - (weight.ln() - log_z)).abs() < 1e-12);
            total += node.log_prob;
        }
        assert!((t.log_probability() - total).abs() < 1e-9);
    }
}

#[test]
fn test_scope_cleanliness() {
    let g = lambda_grammar();
    let baseline = rule_list_sizes(&g);
    let mut rng = StdRng::seed_from_u64(102);
    for i in 0..300 {
        let t = g.generate("START", &mut rng).unwrap();
        let full = g.iterate(&t).count();
        // Abandon part way through.
        let _ = g.iterate(&t).take(i % full.max(1)).count();
        assert_eq!(rule_list_sizes(&g), baseline);
        assert!(!g.is_nonterminal("y1"));
    }
}

fn finite_grammar() -> Grammar {
    parse_grammar(
        r#"
        S -> f(A, B) 2.
        S -> g(A).
        A -> a 3.
        A -> b(B).
        B -> c.
        B -> d 4.
        "#,
    )
    .unwrap()
}

fn enumerated_support(g: &Grammar, start: &str) -> FxHashMap<String, f64> {
    let mut support: FxHashMap<String, f64> = FxHashMap::default();
    for t in g.enumerate(start, 5).unwrap() {
        assert!(support.insert(t.to_string(), t.log_probability()).is_none());
    }
    support
}

#[test]
fn test_enumeration_matches_generation() {
    let g = finite_grammar();
    let support = enumerated_support(&g, "S");
    // f(A, B) has 3 * 2 trees, g(A) has 3
    assert_eq!(support.len(), 9);
    let mass: f64 = support.values().map(|lp| lp.exp()).sum();
    assert!((mass - 1.0).abs() < 1e-12);

    let mut rng = StdRng::seed_from_u64(103);
    let n = 30_000;
    let mut counts: FxHashMap<String, usize> = FxHashMap::default();
    for _ in 0..n {
        let t = g.generate("S", &mut rng).unwrap();
        let key = t.to_string();
        assert_eq!(support.get(&key), Some(&t.log_probability()), "{}", key);
        *counts.entry(key).or_insert(0) += 1;
    }
    for (key, lp) in &support {
        let freq = counts.get(key).copied().unwrap_or(0) as f64 / n as f64;
        assert!((freq - lp.exp()).abs() < 0.015, "{}: {} vs {}", key, freq, lp.exp());
    }
}

#[test]
fn test_mh_chain_detailed_balance() {
    init_tracing();
    let g = finite_grammar();
    let support = enumerated_support(&g, "S");
    let mut rng = StdRng::seed_from_u64(104);
    let mut current = g.generate("S", &mut rng).unwrap();
    let mut counts: FxHashMap<String, usize> = FxHashMap::default();
    let steps = 200_000;
    for _ in 0..steps {
        let p = g.propose(&current, &mut rng).unwrap();
        let log_accept = p.tree.log_probability() - current.log_probability() - p.log_fb;
        if log_accept >= 0.0 || rng.gen::<f64>().ln() < log_accept {
            current = p.tree;
        }
        *counts.entry(current.to_string()).or_insert(0) += 1;
    }
    assert!(counts.keys().all(|k| support.contains_key(k)));
    // The rarest tree, f(b(c), c), has probability 1/150.
    for (key, lp) in &support {
        let expected = lp.exp();
        let freq = counts.get(key).copied().unwrap_or(0) as f64 / steps as f64;
        assert!(
            (freq - expected).abs() < 0.2 * expected,
            "{}: {} vs {}",
            key,
            freq,
            expected
        );
    }
}

#[test]
fn test_generation_terminates() {
    let g = parse_grammar(
        r#"
        EXPR -> one 0.7.
        EXPR -> plus(EXPR, EXPR) 0.3.
        "#,
    )
    .unwrap();
    let mut rng = StdRng::seed_from_u64(105);
    let n = 10_000;
    let mut total = 0usize;
    for _ in 0..n {
        let size = g.generate("EXPR", &mut rng).unwrap().size();
        assert!(size < 10_000);
        total += size;
    }
    // Mean size of a subcritical binary branching process: 1 / (1 - 2 * 0.3)
    let mean = total as f64 / n as f64;
    assert!((mean - 2.5).abs() < 0.25, "mean size {}", mean);
}

#[test]
fn test_bound_variable_scoping() {
    let g = lambda_grammar();
    let baseline = g.rules("EXPR").len();
    let mut rng = StdRng::seed_from_u64(106);
    let mut variables = 0;
    for _ in 0..1000 {
        let t = g.generate("FUNCTION", &mut rng).unwrap();
        assert_eq!(g.rules("EXPR").len(), baseline);
        check_bound_scoping(&t, &mut Vec::new());
        variables += t.iter().filter(|n| n.is_bound_variable()).count();

        let t = g.generate("START", &mut rng).unwrap();
        check_bound_scoping(&t, &mut Vec::new());
    }
    assert!(variables > 0);

    // Proposals keep the same discipline.
    let mut t = g.generate("START", &mut rng).unwrap();
    for _ in 0..2000 {
        t = g.propose(&t, &mut rng).unwrap().tree;
        check_bound_scoping(&t, &mut Vec::new());
    }
}
