//! Algebraic laws of reduction and rewriting over generated naturals.

use kernel::test_support::*;
use kernel::{alpha_eq, is_def_eq, LocalVar, MetaStore, Normalizer, Subst, Term};
use proptest::prelude::*;
use std::rc::Rc;

/// A small term mixing literals, unary naturals and `add` calls.
fn arith() -> impl Strategy<Value = Rc<Term>> {
    let leaf = prop_oneof![(0u64..6).prop_map(int), (0u64..6).prop_map(nat_lit)];
    leaf.prop_recursive(3, 12, 2, |inner| {
        prop_oneof![
            inner.clone().prop_map(suc),
            (inner.clone(), inner).prop_map(|(a, b)| add_call(a, b)),
        ]
    })
}

fn value(t: &Term) -> u64 {
    match t {
        Term::Int(lit) => lit.value,
        Term::ConCall { head, args } if &*head.con == "suc" => 1 + value(&args[0].term),
        Term::ConCall { head, .. } if &*head.con == "zero" => 0,
        Term::FnCall { args, .. } => value(&args[0].term) + value(&args[1].term),
        other => panic!("not an arithmetic term: {}", other),
    }
}

proptest! {
    #[test]
    fn prop_whnf_is_idempotent(t in arith()) {
        let env = prelude();
        let metas = MetaStore::new();
        let norm = Normalizer::new(&env, &metas);
        let once = norm.whnf(&t);
        let twice = norm.whnf(&once);
        prop_assert_eq!(&*once, &*twice);
    }

    #[test]
    fn prop_nf_is_a_fixed_point(t in arith()) {
        let env = prelude();
        let metas = MetaStore::new();
        let norm = Normalizer::new(&env, &metas);
        let once = norm.nf(&t).expect("closed arithmetic normalizes");
        let twice = norm.nf(&once).expect("normal forms normalize");
        prop_assert!(Rc::ptr_eq(&once, &twice) || *once == *twice);
    }

    #[test]
    fn prop_add_computes_the_sum(a in 0u64..12, b in 0u64..12, literal in any::<bool>()) {
        let env = prelude();
        let metas = MetaStore::new();
        let norm = Normalizer::new(&env, &metas);
        let lhs = if literal { int(a) } else { nat_lit(a) };
        let t = add_call(lhs, nat_lit(b));
        let out = norm.nf(&t).expect("normalizes");
        prop_assert_eq!(value(&out), a + b);
        prop_assert!(is_def_eq(&norm, &t, &int(a + b)));
    }

    #[test]
    fn prop_closed_arithmetic_normalizes_to_its_literal(t in arith()) {
        let env = prelude();
        let metas = MetaStore::new();
        let norm = Normalizer::new(&env, &metas);
        let out = norm.nf(&t).expect("normalizes");
        prop_assert_eq!(&*out, &*int(value(&t)));
    }

    #[test]
    fn prop_nf_preserves_value(t in arith()) {
        let env = prelude();
        let metas = MetaStore::new();
        let norm = Normalizer::new(&env, &metas);
        let out = norm.nf(&t).expect("normalizes");
        prop_assert_eq!(value(&out), value(&t));
    }

    #[test]
    fn prop_identity_descent_keeps_the_node(t in arith()) {
        let out = t.descent(|c| c.clone());
        prop_assert!(Rc::ptr_eq(&t, &out));
    }

    #[test]
    fn prop_substituting_an_absent_variable_is_identity(t in arith()) {
        let x = LocalVar::new("x");
        let out = t.subst(&Subst::singleton(x, zero()));
        prop_assert!(Rc::ptr_eq(&t, &out));
    }

    #[test]
    fn prop_rename_is_alpha_equivalent(n in 0u64..4) {
        let x = LocalVar::new("x");
        let y = LocalVar::new("y");
        let body = Term::tup(Term::var(&x), add_call(Term::var(&y), nat_lit(n)));
        let t = Term::lam(x, Term::lam(y, body));
        prop_assert!(alpha_eq(&t, &t.rename()));
    }
}
