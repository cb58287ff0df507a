use kernel::test_support::*;
use kernel::{is_def_eq, Env, FnBody, FnDef, MetaStore, Normalizer, Term};
use std::rc::Rc;

fn build_def_chain(env: &mut Env, depth: usize) -> (Rc<Term>, Rc<Term>) {
    add_nat(env);
    let base = zero();
    let mut current = base.clone();
    for i in 0..depth {
        let name = format!("d{}", i);
        env.add_fn(FnDef::new(&name, Vec::new(), nat(), FnBody::Expr(current.clone())))
            .expect("Failed to add chained definition");
        current = Term::fn_call(&name, Vec::new());
    }
    (current, base)
}

/// Microbench-style guard: a linear delta chain should normalize within a modest fuel budget.
#[test]
fn defeq_microbench_linear_chain_budget() {
    let mut env = Env::new();
    let (deep, base) = build_def_chain(&mut env, 64);
    let metas = MetaStore::new();
    let budget = 128;

    for _ in 0..50 {
        let norm = Normalizer::with_fuel(&env, &metas, budget);
        assert!(
            is_def_eq(&norm, &deep, &base),
            "Linear defeq chain should normalize within budget"
        );
        assert!(!norm.exhausted());
    }
}

/// Regression guard: too-small fuel should fail on the same chain.
#[test]
fn defeq_budget_regression_guard() {
    let mut env = Env::new();
    let (deep, base) = build_def_chain(&mut env, 64);
    let metas = MetaStore::new();
    let norm = Normalizer::with_fuel(&env, &metas, 10);

    assert!(
        !is_def_eq(&norm, &deep, &base),
        "Insufficient fuel should fail on linear defeq chain"
    );
    assert!(norm.exhausted());
}
