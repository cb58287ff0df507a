//! Overlapping clauses must agree, unreachable clauses are reported, and
//! clauses on the higher constructor `zro` must respect its boundary.

use insta::assert_snapshot;
use kernel::test_support::*;
use kernel::{alpha_eq, Arg, Env, LocalVar, MetaStore, Modifiers, Normalizer, Param, Pat, Span, Term};
use pretty_assertions::assert_eq;
use std::rc::Rc;
use tyck::{
    check_clauses, check_conditions, check_confluence, classify, ClassifyConfig, Clause,
    ClausesProblem, DefEqUnifier, Unifier,
};

fn config() -> ClassifyConfig {
    ClassifyConfig {
        fuel: 5,
        literal_threshold: 64,
    }
}

fn clause(line: usize, pats: Vec<Rc<Pat>>, body: Rc<Term>) -> Clause {
    Clause::new(Span::at_line(line), pats.into_iter().map(Arg::ex).collect(), body)
}

fn true_pat() -> Rc<Pat> {
    Pat::con(bool_head("true"), Vec::new())
}

fn false_pat() -> Rc<Pat> {
    Pat::con(bool_head("false"), Vec::new())
}

fn any(name: &str, ty: Rc<Term>) -> Rc<Pat> {
    bind_pat(name, ty).1
}

fn overlap() -> Modifiers {
    Modifiers {
        overlap: true,
        ..Modifiers::default()
    }
}

fn check(env: &Env, tele: &[Param], clauses: &[Clause], modifiers: Modifiers) -> Vec<ClausesProblem> {
    let metas = MetaStore::new();
    let norm = Normalizer::new(env, &metas);
    check_clauses(&norm, tele, clauses, modifiers, config(), Span::at_line(1)).problems
}

/// `| true, _ ⇒ true | _, true ⇒ <second> | false, false ⇒ false`
fn or_clauses(second: Rc<Term>) -> (Vec<Param>, Vec<Clause>) {
    let tele = vec![Param::ex("x", bool_ty()), Param::ex("y", bool_ty())];
    let clauses = vec![
        clause(2, vec![true_pat(), any("y", bool_ty())], tt()),
        clause(3, vec![any("x", bool_ty()), true_pat()], second),
        clause(4, vec![false_pat(), false_pat()], ff()),
    ];
    (tele, clauses)
}

// =============================================================================
// CONFLUENCE
// =============================================================================

#[test]
fn overlapping_or_is_confluent() {
    let env = prelude();
    let (tele, clauses) = or_clauses(tt());
    assert!(check(&env, &tele, &clauses, overlap()).is_empty());
}

#[test]
fn overlapping_clauses_that_disagree_are_rejected() {
    let env = prelude();
    let (tele, clauses) = or_clauses(ff());
    let problems = check(&env, &tele, &clauses, overlap());
    assert_eq!(problems.len(), 1);
    match &problems[0] {
        ClausesProblem::Confluence { i, j, i_pos, j_pos, .. } => {
            assert_eq!((*i, *j), (1, 2));
            assert_eq!((*i_pos, *j_pos), (Span::at_line(2), Span::at_line(3)));
        }
        other => panic!("expected a confluence failure, got {:?}", other),
    }
    assert!(problems[0].is_error());
    assert_snapshot!(
        problems[0].to_diagnostic().to_string(),
        @r"
    Error[E0103] at 3:1: The 1st and the 2nd clauses are not confluent because we failed to unify `true` and `false`
      note at 2:1: the 1st clause
      note at 3:1: the 2nd clause
    "
    );
}

#[test]
fn agreement_is_up_to_reduction() {
    let env = prelude();
    let metas = MetaStore::new();
    let norm = Normalizer::new(&env, &metas);
    let tele = vec![Param::ex("x", nat())];
    let (n, n_pat) = bind_pat("n", nat());
    let clauses = vec![
        clause(2, vec![zero_pat()], zero()),
        clause(3, vec![n_pat], add_call(Term::var(&n), zero())),
    ];
    let tree = classify(&norm, &clauses, &tele, config(), Span::at_line(1)).tree;
    let mut unifier = DefEqUnifier::new(&norm);
    assert!(check_confluence(&mut unifier, &clauses, &tree).is_empty());

    struct Syntactic;
    impl Unifier for Syntactic {
        fn compare(&mut self, lhs: &Rc<Term>, rhs: &Rc<Term>) -> bool {
            alpha_eq(lhs, rhs)
        }
    }
    let problems = check_confluence(&mut Syntactic, &clauses, &tree);
    assert_eq!(problems.len(), 1);
    assert_eq!(
        problems[0].to_string(),
        "The 1st and the 2nd clauses are not confluent because we failed to unify `zero` and `add zero zero`"
    );
}

#[test]
fn literal_clauses_agree_with_constructor_clauses() {
    let env = prelude();
    let tele = vec![Param::ex("x", nat())];
    let (n, n_pat) = bind_pat("n", nat());
    let clauses = vec![
        clause(2, vec![int_pat(1)], int(1)),
        clause(3, vec![suc_pat(n_pat)], suc(Term::var(&n))),
        clause(4, vec![zero_pat()], zero()),
    ];
    assert!(check(&env, &tele, &clauses, overlap()).is_empty());
}

#[test]
fn clauses_with_upstream_errors_are_not_compared() {
    let env = prelude();
    let (tele, clauses) = or_clauses(ff());
    clauses[1].mark_error();
    let problems = check(&env, &tele, &clauses, overlap());
    assert!(problems.is_empty(), "{:?}", problems);
}

// =============================================================================
// DOMINATION
// =============================================================================

#[test]
fn catch_all_first_dominates_later_clause() {
    let env = prelude();
    let tele = vec![Param::ex("n", nat())];
    let (x, x_pat) = bind_pat("x", nat());
    let clauses = vec![
        clause(2, vec![x_pat], Term::var(&x)),
        clause(3, vec![zero_pat()], suc(zero())),
    ];
    let problems = check(&env, &tele, &clauses, Modifiers::default());
    assert_eq!(problems.len(), 1);
    assert!(!problems[0].is_error());
    assert_snapshot!(
        problems[0].to_string(),
        @"The 1st clause dominates the 2nd clause. The 2nd clause will be unreachable"
    );
}

#[test]
fn clause_covered_by_several_others_is_first_match_dominated() {
    let env = prelude();
    let tele = vec![Param::ex("x", bool_ty()), Param::ex("y", bool_ty())];
    let clauses = vec![
        clause(2, vec![true_pat(), any("y", bool_ty())], tt()),
        clause(3, vec![false_pat(), any("y", bool_ty())], ff()),
        clause(4, vec![any("x", bool_ty()), any("y", bool_ty())], ff()),
    ];
    let problems = check(&env, &tele, &clauses, Modifiers::default());
    assert_eq!(problems.len(), 1);
    match &problems[0] {
        ClausesProblem::FmDomination { sub, pos } => {
            assert_eq!(*sub, 3);
            assert_eq!(*pos, Span::at_line(4));
        }
        other => panic!("expected first-match domination, got {:?}", other),
    }
    assert_eq!(
        problems[0].to_string(),
        "The 3rd clause is dominated by the other clauses, hence unreachable"
    );
}

#[test]
fn absurd_clauses_are_never_unreachable() {
    let env = prelude();
    let tele = vec![Param::ex("e", empty_ty())];
    let clauses = vec![Clause::absurd(Span::at_line(2), vec![Arg::ex(Pat::absurd())])];
    assert!(check(&env, &tele, &clauses, Modifiers::default()).is_empty());
}

// =============================================================================
// CONDITIONS
// =============================================================================

/// `| pos n ⇒ n | neg n ⇒ n | zro i ⇒ <on_zro>`
fn int_clauses(on_zro: impl FnOnce(&LocalVar) -> Rc<Term>) -> (Vec<Param>, Vec<Clause>) {
    let tele = vec![Param::ex("z", int_ty())];
    let (p, p_pat) = bind_pat("n", nat());
    let (q, q_pat) = bind_pat("n", nat());
    let (i, i_pat) = bind_pat("i", Term::interval());
    let clauses = vec![
        clause(2, vec![Pat::con(int_head("pos"), vec![Arg::ex(p_pat)])], Term::var(&p)),
        clause(3, vec![Pat::con(int_head("neg"), vec![Arg::ex(q_pat)])], Term::var(&q)),
        clause(4, vec![Pat::con(int_head("zro"), vec![Arg::ex(i_pat)])], on_zro(&i)),
    ];
    (tele, clauses)
}

#[test]
fn boundary_respecting_clause_passes_conditions() {
    let env = prelude();
    let (tele, clauses) = int_clauses(|_| zero());
    assert!(check(&env, &tele, &clauses, Modifiers::default()).is_empty());
}

#[test]
fn boundary_breaking_clause_fails_at_both_endpoints() {
    let env = prelude();
    let metas = MetaStore::new();
    let norm = Normalizer::new(&env, &metas);
    let (_, clauses) = int_clauses(|_| suc(zero()));
    let mut unifier = DefEqUnifier::new(&norm);
    let problems = check_conditions(&norm, &mut unifier, &clauses, false);
    let faces: Vec<_> = problems
        .iter()
        .map(|p| match p {
            ClausesProblem::Conditions { nth, face, .. } => (*nth, face.clone()),
            other => panic!("expected a condition failure, got {:?}", other),
        })
        .collect();
    assert_eq!(faces, [(3, "i = 0".to_string()), (3, "i = 1".to_string())]);
    assert_snapshot!(
        problems[0].to_string(),
        @"The 3rd clause matches on a constructor with condition(s). When checking the condition i = 0, we failed to unify `suc zero` and `0`"
    );
}

#[test]
fn conditions_never_fail_for_lack_of_fuel() {
    let env = prelude();
    let metas = MetaStore::new();
    let (_, clauses) = int_clauses(|_| zero());
    for fuel in 0..40 {
        let norm = Normalizer::with_fuel(&env, &metas, fuel);
        let mut unifier = DefEqUnifier::new(&norm);
        let problems = check_conditions(&norm, &mut unifier, &clauses, false);
        assert!(problems.is_empty(), "fuel {}: {:?}", fuel, problems);
    }
}

#[test]
fn missing_target_clause_fails_conditions() {
    let env = prelude();
    let metas = MetaStore::new();
    let norm = Normalizer::new(&env, &metas);
    let (_, mut clauses) = int_clauses(|_| zero());
    clauses.remove(1);
    let mut unifier = DefEqUnifier::new(&norm);
    let problems = check_conditions(&norm, &mut unifier, &clauses, false);
    assert_eq!(problems.len(), 1);
    match &problems[0] {
        ClausesProblem::Conditions { face, rhs, .. } => {
            assert_eq!(face, "i = 1");
            assert!(rhs.is_none());
        }
        other => panic!("expected a condition failure, got {:?}", other),
    }
}

#[test]
fn body_mentioning_the_dimension_is_checked_after_substitution() {
    let env = prelude();
    let tele = vec![Param::ex("z", int_ty())];
    let (p, p_pat) = bind_pat("n", nat());
    let (q, q_pat) = bind_pat("n", nat());
    let (i, i_pat) = bind_pat("i", Term::interval());
    let clauses = vec![
        clause(2, vec![Pat::con(int_head("pos"), vec![Arg::ex(p_pat)])], pos(Term::var(&p))),
        clause(3, vec![Pat::con(int_head("neg"), vec![Arg::ex(q_pat)])], neg(Term::var(&q))),
        clause(4, vec![Pat::con(int_head("zro"), vec![Arg::ex(i_pat)])], zro(Term::var(&i))),
    ];
    assert!(check(&env, &tele, &clauses, Modifiers::default()).is_empty());
}
