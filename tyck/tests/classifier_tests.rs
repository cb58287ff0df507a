//! Coverage: the case trees built for small functions over the prelude
//! types, the gaps they report, and index unification on `Vec`.

use insta::assert_snapshot;
use kernel::test_support::*;
use kernel::{
    Arg, ConDef, ConHead, Env, LocalVar, MetaStore, Normalizer, Param, Pat, Sort, Span, Term,
};
use pretty_assertions::assert_eq;
use std::rc::Rc;
use tyck::{classify, Classification, ClassifyConfig, Clause, ClausesProblem, MissingReason};

fn config() -> ClassifyConfig {
    ClassifyConfig {
        fuel: 5,
        literal_threshold: 64,
    }
}

fn run(env: &Env, tele: &[Param], clauses: &[Clause], config: ClassifyConfig) -> Classification {
    let metas = MetaStore::new();
    let norm = Normalizer::new(env, &metas);
    classify(&norm, clauses, tele, config, Span::at_line(1))
}

fn clause(line: usize, pats: Vec<Rc<Pat>>, body: Rc<Term>) -> Clause {
    Clause::new(Span::at_line(line), pats.into_iter().map(Arg::ex).collect(), body)
}

fn missing(out: &Classification) -> Vec<String> {
    out.missing().iter().map(|m| m.to_string()).collect()
}

fn type0() -> Rc<Term> {
    Term::sort(Sort::type_(0))
}

// =============================================================================
// NAT
// =============================================================================

#[test]
fn zero_and_suc_cover_nat() {
    let env = prelude();
    let tele = vec![Param::ex("x", nat())];
    let (m, m_pat) = bind_pat("m", nat());
    let clauses = vec![
        clause(2, vec![zero_pat()], zero()),
        clause(3, vec![suc_pat(m_pat)], Term::var(&m)),
    ];
    let out = run(&env, &tele, &clauses, config());
    assert!(out.problems.is_empty());
    assert_eq!(out.classes().len(), 2);
    assert_snapshot!(out.tree.to_string(), @r"
    split x : Nat
      zero:
        zero ⇒ #1
      suc:
        suc _ ⇒ #2
    ");
}

#[test]
fn zero_alone_misses_exactly_suc() {
    let env = prelude();
    let tele = vec![Param::ex("x", nat())];
    let clauses = vec![clause(2, vec![zero_pat()], zero())];
    let out = run(&env, &tele, &clauses, config());
    assert_eq!(missing(&out), ["suc _"]);
    assert_eq!(out.problems.len(), 1);
    match &out.problems[0] {
        ClausesProblem::MissingCase { reason, pos, .. } => {
            assert_eq!(*reason, MissingReason::NoClause);
            assert_eq!(*pos, Span::at_line(1));
        }
        other => panic!("expected a missing case, got {:?}", other),
    }
    assert_eq!(out.problems[0].to_string(), "Unhandled case: suc _");
}

#[test]
fn catch_all_is_tagged_on_every_leaf() {
    let env = prelude();
    let tele = vec![Param::ex("x", nat())];
    let (n, n_pat) = bind_pat("n", nat());
    let clauses = vec![
        clause(2, vec![zero_pat()], zero()),
        clause(3, vec![n_pat], Term::var(&n)),
    ];
    let out = run(&env, &tele, &clauses, config());
    let leaves: Vec<_> = out.classes().iter().map(|c| c.clauses.clone()).collect();
    assert_eq!(leaves, [vec![0, 1], vec![1]]);
}

#[test]
fn small_literals_are_peeled_into_constructors() {
    let env = prelude();
    let tele = vec![Param::ex("x", nat())];
    let (n, n_pat) = bind_pat("n", nat());
    let clauses = vec![
        clause(2, vec![int_pat(0)], tt()),
        clause(3, vec![int_pat(1)], ff()),
        clause(4, vec![n_pat], Term::var(&n)),
    ];
    let out = run(&env, &tele, &clauses, config());
    assert!(out.problems.is_empty());
    assert_snapshot!(out.tree.to_string(), @r"
    split x : Nat
      zero:
        zero ⇒ #1 #3
      suc:
        split n : Nat
          zero:
            suc zero ⇒ #2 #3
          suc:
            suc (suc _) ⇒ #3
    ");
}

#[test]
fn large_literals_are_grouped_by_value() {
    let env = prelude();
    let tele = vec![Param::ex("x", nat())];
    let (n, n_pat) = bind_pat("n", nat());
    let clauses = vec![
        clause(2, vec![int_pat(100)], tt()),
        clause(3, vec![int_pat(200)], ff()),
        clause(4, vec![n_pat], Term::var(&n)),
    ];
    let out = run(&env, &tele, &clauses, config());
    assert!(out.problems.is_empty());
    assert_snapshot!(out.tree.to_string(), @r"
    split x : Nat
      100:
        100 ⇒ #1 #3
      200:
        200 ⇒ #2 #3
      _:
        _ ⇒ #3
    ");
}

#[test]
fn large_literals_without_catch_all_miss_the_rest() {
    let env = prelude();
    let tele = vec![Param::ex("x", nat())];
    let clauses = vec![
        clause(2, vec![int_pat(100)], tt()),
        clause(3, vec![int_pat(100)], ff()),
    ];
    let out = run(&env, &tele, &clauses, config());
    assert_eq!(missing(&out), ["_"]);
    let leaves: Vec<_> = out.classes().iter().map(|c| c.clauses.clone()).collect();
    assert_eq!(leaves, [vec![0, 1]]);
}

#[test]
fn lowering_the_threshold_enables_the_fast_path() {
    let env = prelude();
    let tele = vec![Param::ex("x", nat())];
    let (n, n_pat) = bind_pat("n", nat());
    let clauses = vec![
        clause(2, vec![int_pat(3)], tt()),
        clause(3, vec![n_pat], Term::var(&n)),
    ];
    let config = ClassifyConfig {
        literal_threshold: 2,
        ..config()
    };
    let out = run(&env, &tele, &clauses, config);
    assert_snapshot!(out.tree.to_string(), @r"
    split x : Nat
      3:
        3 ⇒ #1 #2
      _:
        _ ⇒ #2
    ");
}

// =============================================================================
// FUEL
// =============================================================================

#[test]
fn exhausted_fuel_reports_without_probing() {
    let env = prelude();
    let tele = vec![Param::ex("x", nat())];
    let clauses = vec![clause(2, vec![zero_pat()], zero())];
    let config = ClassifyConfig { fuel: 1, ..config() };
    let out = run(&env, &tele, &clauses, config);
    assert_eq!(missing(&out), ["suc _"]);
    assert_eq!(out.missing()[0].reason, MissingReason::FuelExhausted);
    let diagnostic = out.problems[0].to_diagnostic();
    assert_eq!(diagnostic.notes.len(), 1);
}

#[test]
fn deep_patterns_report_one_gap_per_constructor() {
    let env = prelude();
    let tele = vec![Param::ex("x", nat())];
    let clauses = vec![clause(2, vec![suc_pat(suc_pat(zero_pat()))], zero())];
    let out = run(&env, &tele, &clauses, config());
    assert_eq!(missing(&out), ["zero", "suc zero", "suc (suc (suc _))"]);
}

// =============================================================================
// OTHER SHAPES
// =============================================================================

#[test]
fn absurd_pattern_on_empty_needs_no_case() {
    let env = prelude();
    let tele = vec![Param::ex("e", empty_ty())];
    let clauses = vec![Clause::absurd(Span::at_line(2), vec![Arg::ex(Pat::absurd())])];
    let out = run(&env, &tele, &clauses, config());
    assert!(out.problems.is_empty());
    assert!(out.classes().is_empty());
}

#[test]
fn unit_is_covered_by_its_constructor() {
    let env = prelude();
    let tele = vec![Param::ex("u", unit_ty())];
    let tt_pat = Pat::con(
        kernel::ConHead::new(Rc::from("Unit"), Rc::from("tt"), Vec::new()),
        Vec::new(),
    );
    let out = run(&env, &tele, &[clause(2, vec![tt_pat], zero())], config());
    assert!(out.problems.is_empty());
    assert_eq!(out.classes().len(), 1);
}

#[test]
fn tuple_patterns_split_both_components() {
    let env = prelude();
    let tele = vec![Param::ex(
        "p",
        Term::sigma(Param::ex("a", nat()), bool_ty()),
    )];
    let (b, b_pat) = bind_pat("b", bool_ty());
    let (_, n_pat) = bind_pat("n", nat());
    let true_pat = Pat::con(bool_head("true"), Vec::new());
    let clauses = vec![
        clause(2, vec![Pat::tuple(zero_pat(), b_pat)], Term::var(&b)),
        clause(3, vec![Pat::tuple(suc_pat(n_pat), true_pat)], tt()),
    ];
    let out = run(&env, &tele, &clauses, config());
    assert_eq!(missing(&out), ["(suc _, false)"]);
    assert_eq!(out.classes().len(), 2);
}

#[test]
fn bind_patterns_refine_later_columns() {
    let env = prelude();
    let tele = vec![Param::ex("x", nat()), Param::ex("y", nat())];
    let (a, a_pat) = bind_pat("a", nat());
    let (b, b_pat) = bind_pat("b", nat());
    let (c, c_pat) = bind_pat("c", nat());
    let clauses = vec![
        clause(2, vec![a_pat, zero_pat()], Term::var(&a)),
        clause(3, vec![b_pat, suc_pat(c_pat)], add_call(Term::var(&b), Term::var(&c))),
    ];
    let out = run(&env, &tele, &clauses, config());
    assert!(out.problems.is_empty());
    let rendered: Vec<_> = out.classes().iter().map(|c| c.to_string()).collect();
    assert_eq!(rendered, ["_, zero ⇒ #1", "_, suc _ ⇒ #2"]);
}

#[test]
fn wrong_pattern_count_is_marked_and_skipped() {
    let env = prelude();
    let tele = vec![Param::ex("x", nat())];
    let (n, n_pat) = bind_pat("n", nat());
    let clauses = vec![
        clause(2, vec![zero_pat(), zero_pat()], zero()),
        clause(3, vec![n_pat], Term::var(&n)),
    ];
    let out = run(&env, &tele, &clauses, config());
    assert!(clauses[0].has_error());
    assert!(!clauses[1].has_error());
    assert!(out.problems.is_empty());
    assert!(out.classes().iter().all(|c| c.clauses == [1]));
}

// =============================================================================
// INDEXED FAMILIES
// =============================================================================

fn vec_tele(len: impl FnOnce(&LocalVar) -> Rc<Term>) -> Vec<Param> {
    let a = Param::ex("A", type0());
    let n = Param::ex("n", nat());
    let xs = Param::ex("xs", vec_ty(a.to_term(), len(&n.var)));
    vec![a, n, xs]
}

fn vcons_pat(tele: &[Param], len: Rc<Term>) -> (LocalVar, Rc<Pat>) {
    let (x, x_pat) = bind_pat("x", tele[0].to_term());
    let (_, xs_pat) = bind_pat("xs", vec_ty(tele[0].to_term(), len.clone()));
    let head = vec_head("vcons", tele[0].to_term(), suc(len));
    (x, Pat::con(head, vec![Arg::ex(x_pat), Arg::ex(xs_pat)]))
}

#[test]
fn impossible_constructor_is_excluded_by_its_index() {
    let env = prelude();
    let tele = vec_tele(|n| suc(Term::var(n)));
    let (_, a_pat) = bind_pat("A", type0());
    let (_, n_pat) = bind_pat("n", nat());
    let (x, cons) = vcons_pat(&tele, tele[1].to_term());
    let clauses = vec![clause(2, vec![a_pat, n_pat, cons], Term::var(&x))];
    let out = run(&env, &tele, &clauses, config());
    assert!(out.problems.is_empty(), "{:?}", out.problems);
    let rendered: Vec<_> = out.classes().iter().map(|c| c.to_string()).collect();
    assert_eq!(rendered, ["_, _, vcons _ _ ⇒ #1"]);
}

#[test]
fn stuck_index_without_catch_all_is_a_fatal_unsure_case() {
    let env = prelude();
    let tele = vec_tele(Term::var);
    let (_, a_pat) = bind_pat("A", type0());
    let (_, n_pat) = bind_pat("n", nat());
    let nil = Pat::con(vec_head("vnil", tele[0].to_term(), zero()), Vec::new());
    let clauses = vec![clause(2, vec![a_pat, n_pat, nil], zero())];
    let out = run(&env, &tele, &clauses, config());
    assert!(out.has_errors());
    let unsure: Vec<_> = out
        .problems
        .iter()
        .map(|p| match p {
            ClausesProblem::UnsureCase { con, data, fatal, .. } => (con.clone(), data.clone(), *fatal),
            other => panic!("expected an unsure case, got {:?}", other),
        })
        .collect();
    assert_eq!(
        unsure,
        [
            ("vnil".to_string(), "Vec A n".to_string(), true),
            ("vcons".to_string(), "Vec A n".to_string(), true),
        ]
    );
    assert_snapshot!(
        out.problems[0].to_string(),
        @"I'm unsure if there should be a case for constructor `vnil` because I got stuck on the index unification of type `Vec A n`"
    );
}

#[test]
fn stuck_index_with_catch_all_only_warns() {
    let env = prelude();
    let tele = vec_tele(Term::var);
    let (_, a_pat) = bind_pat("A", type0());
    let (_, n_pat) = bind_pat("n", nat());
    let nil = Pat::con(vec_head("vnil", tele[0].to_term(), zero()), Vec::new());
    let (_, a2) = bind_pat("A", type0());
    let (_, n2) = bind_pat("n", nat());
    let (_, xs) = bind_pat("xs", tele[2].ty.clone());
    let clauses = vec![
        clause(2, vec![a_pat, n_pat, nil], zero()),
        clause(3, vec![a2, n2, xs], suc(zero())),
    ];
    let out = run(&env, &tele, &clauses, config());
    assert!(!out.has_errors());
    assert_eq!(out.problems.len(), 2);
    let leaves: Vec<_> = out.classes().iter().map(|c| c.clauses.clone()).collect();
    assert_eq!(leaves, [vec![0, 1], vec![1]]);
}

#[test]
fn uninhabited_constructor_fields_need_no_clause() {
    let env = prelude();
    let tele = vec![Param::ex("xs", vec_ty(empty_ty(), nat_lit(1)))];
    let out = run(&env, &tele, &[], config());
    assert!(out.problems.is_empty(), "{:?}", out.problems);
    assert!(out.classes().is_empty());
}

/// `data T | a | c <fields>`
fn add_t(env: &mut Env, fields: Vec<Param>) {
    let a = ConDef::new("T", "a", Vec::new(), Vec::new());
    let c = ConDef::new("T", "c", Vec::new(), fields);
    env.add_data("T", Vec::new(), Sort::type_(0), vec![a, c])
        .expect("T should be accepted");
}

fn t_head(con: &str) -> ConHead {
    ConHead::new(Rc::from("T"), Rc::from(con), Vec::new())
}

#[test]
fn empty_field_makes_constructor_vacant_in_any_position() {
    let orders = [
        vec![Param::ex("e", empty_ty()), Param::ex("n", nat())],
        vec![Param::ex("n", nat()), Param::ex("e", empty_ty())],
        vec![
            Param::ex("n", nat()),
            Param::ex("b", bool_ty()),
            Param::ex("e", empty_ty()),
        ],
    ];
    for fields in orders {
        let mut env = prelude();
        add_t(&mut env, fields);
        let tele = vec![Param::ex("t", Term::data("T", Vec::new()))];
        let clauses = vec![clause(2, vec![Pat::con(t_head("a"), Vec::new())], zero())];
        let out = run(&env, &tele, &clauses, config());
        assert!(out.problems.is_empty(), "{:?}", out.problems);
        assert_eq!(out.classes().len(), 1);
    }
}

#[test]
fn inhabited_fields_still_miss_the_constructor() {
    let mut env = prelude();
    add_t(&mut env, vec![Param::ex("n", nat()), Param::ex("b", bool_ty())]);
    let tele = vec![Param::ex("t", Term::data("T", Vec::new()))];
    let clauses = vec![clause(2, vec![Pat::con(t_head("a"), Vec::new())], zero())];
    let out = run(&env, &tele, &clauses, config());
    assert_eq!(missing(&out), ["c _ _"]);
}

#[test]
fn empty_later_parameter_covers_every_gap() {
    let env = prelude();
    let tele = vec![Param::ex("x", nat()), Param::ex("e", empty_ty())];
    let (_, e_pat) = bind_pat("e", empty_ty());
    let clauses = vec![clause(2, vec![zero_pat(), e_pat], zero())];
    let out = run(&env, &tele, &clauses, config());
    assert!(out.problems.is_empty(), "{:?}", out.problems);
}
