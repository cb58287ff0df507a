//! Builders for the small standard library the tests are written against:
//! `Nat` with literals and `add`, `Bool`, `Unit`, `Empty`, length-indexed
//! `Vec`, and the higher inductive `Int` whose `zro` constructor glues
//! `pos 0` to `neg 0`.
//!
//! Declarations panic on failure; they only ever run in tests.

use crate::ast::{Arg, Args, ConHead, DimEnd, Face, IntLit, IntShape, LocalVar, Param, Sort, Term};
use crate::env::{ConDef, Env, FnBody, FnDef, Modifiers};
use crate::pat::{Matching, Pat};
use crate::span::Span;
use std::rc::Rc;

// =============================================================================
// Nat
// =============================================================================

pub fn nat_shape() -> Rc<IntShape> {
    Rc::new(IntShape {
        data: Rc::from("Nat"),
        zero: Rc::from("zero"),
        suc: Rc::from("suc"),
    })
}

pub fn nat() -> Rc<Term> {
    Term::data("Nat", Vec::new())
}

pub fn zero_head() -> ConHead {
    ConHead::new(Rc::from("Nat"), Rc::from("zero"), Vec::new())
}

pub fn suc_head() -> ConHead {
    ConHead::new(Rc::from("Nat"), Rc::from("suc"), Vec::new())
}

pub fn zero() -> Rc<Term> {
    Term::con(zero_head(), Vec::new())
}

pub fn suc(n: Rc<Term>) -> Rc<Term> {
    Term::con(suc_head(), vec![Arg::ex(n)])
}

/// `n` as a chain of `suc` constructors ending in `zero`.
pub fn nat_lit(n: u64) -> Rc<Term> {
    (0..n).fold(zero(), |acc, _| suc(acc))
}

/// `n` as a literal.
pub fn int(n: u64) -> Rc<Term> {
    Term::int(IntLit::new(n, nat_shape()))
}

pub fn bind_pat(name: &str, ty: Rc<Term>) -> (LocalVar, Rc<Pat>) {
    let var = LocalVar::new(name);
    let pat = Pat::bind(var.clone(), ty);
    (var, pat)
}

pub fn zero_pat() -> Rc<Pat> {
    Pat::con(zero_head(), Vec::new())
}

pub fn suc_pat(p: Rc<Pat>) -> Rc<Pat> {
    Pat::con(suc_head(), vec![Arg::ex(p)])
}

pub fn int_pat(n: u64) -> Rc<Pat> {
    Pat::int(IntLit::new(n, nat_shape()))
}

pub fn add_nat(env: &mut Env) {
    let zero = ConDef::new("Nat", "zero", Vec::new(), Vec::new());
    let suc = ConDef::new("Nat", "suc", Vec::new(), vec![Param::ex("n", nat())]);
    env.add_data("Nat", Vec::new(), Sort::type_(0), vec![zero, suc])
        .expect("Nat should be accepted");
}

/// Parameters and clauses of
///
/// ```text
/// add : Nat → Nat → Nat
/// | zero,  b ⇒ b
/// | suc a, b ⇒ suc (add a b)
/// ```
pub fn add_matchings() -> (Vec<Param>, Vec<Matching>) {
    let tele = vec![Param::ex("x", nat()), Param::ex("y", nat())];
    let (b1, b1_pat) = bind_pat("b", nat());
    let first = Matching::new(
        Span::at_line(2),
        vec![Arg::ex(zero_pat()), Arg::ex(b1_pat)],
        Term::var(&b1),
    );
    let (a, a_pat) = bind_pat("a", nat());
    let (b2, b2_pat) = bind_pat("b", nat());
    let second = Matching::new(
        Span::at_line(3),
        vec![Arg::ex(suc_pat(a_pat)), Arg::ex(b2_pat)],
        suc(add_call(Term::var(&a), Term::var(&b2))),
    );
    (tele, vec![first, second])
}

pub fn add_add(env: &mut Env) {
    let (tele, matchings) = add_matchings();
    let def = FnDef::new("add", tele, nat(), FnBody::Clauses(matchings));
    env.add_fn(def).expect("add should be accepted");
}

pub fn add_call(a: Rc<Term>, b: Rc<Term>) -> Rc<Term> {
    Term::fn_call("add", vec![Arg::ex(a), Arg::ex(b)])
}

/// Declares a function whose body is the given clauses.
pub fn add_clauses_fn(
    env: &mut Env,
    name: &str,
    tele: Vec<Param>,
    result: Rc<Term>,
    matchings: Vec<Matching>,
    modifiers: Modifiers,
) {
    let def = FnDef::new(name, tele, result, FnBody::Clauses(matchings)).with_modifiers(modifiers);
    env.add_fn(def).expect("function should be accepted");
}

// =============================================================================
// Bool, Unit, Empty
// =============================================================================

pub fn bool_ty() -> Rc<Term> {
    Term::data("Bool", Vec::new())
}

pub fn bool_head(con: &str) -> ConHead {
    ConHead::new(Rc::from("Bool"), Rc::from(con), Vec::new())
}

pub fn tt() -> Rc<Term> {
    Term::con(bool_head("true"), Vec::new())
}

pub fn ff() -> Rc<Term> {
    Term::con(bool_head("false"), Vec::new())
}

pub fn add_bool(env: &mut Env) {
    let t = ConDef::new("Bool", "true", Vec::new(), Vec::new());
    let f = ConDef::new("Bool", "false", Vec::new(), Vec::new());
    env.add_data("Bool", Vec::new(), Sort::type_(0), vec![t, f])
        .expect("Bool should be accepted");
}

pub fn unit_ty() -> Rc<Term> {
    Term::data("Unit", Vec::new())
}

pub fn add_unit(env: &mut Env) {
    let tt = ConDef::new("Unit", "tt", Vec::new(), Vec::new());
    env.add_data("Unit", Vec::new(), Sort::type_(0), vec![tt])
        .expect("Unit should be accepted");
}

pub fn empty_ty() -> Rc<Term> {
    Term::data("Empty", Vec::new())
}

pub fn add_empty(env: &mut Env) {
    env.add_data("Empty", Vec::new(), Sort::type_(0), Vec::new())
        .expect("Empty should be accepted");
}

// =============================================================================
// Vec
// =============================================================================

pub fn vec_ty(elem: Rc<Term>, len: Rc<Term>) -> Rc<Term> {
    Term::data("Vec", vec![Arg::ex(elem), Arg::ex(len)])
}

pub fn vec_head(con: &str, elem: Rc<Term>, len: Rc<Term>) -> ConHead {
    ConHead::new(Rc::from("Vec"), Rc::from(con), vec![Arg::ex(elem), Arg::ex(len)])
}

/// ```text
/// data Vec (A : Type) (n : Nat)
/// | A, zero  ⇒ vnil
/// | A, suc m ⇒ vcons (x : A) (xs : Vec A m)
/// ```
pub fn add_vec(env: &mut Env) {
    let tele = vec![
        Param::ex("A", Term::sort(Sort::type_(0))),
        Param::ex("n", nat()),
    ];

    let a = LocalVar::new("A");
    let vnil = ConDef::new(
        "Vec",
        "vnil",
        vec![Param::new(a.clone(), Term::sort(Sort::type_(0)), true)],
        Vec::new(),
    )
    .with_owner_pats(vec![
        Arg::ex(Pat::bind(a, Term::sort(Sort::type_(0)))),
        Arg::ex(zero_pat()),
    ]);

    let a = LocalVar::new("A");
    let m = LocalVar::new("m");
    let vcons = ConDef::new(
        "Vec",
        "vcons",
        vec![
            Param::new(a.clone(), Term::sort(Sort::type_(0)), true),
            Param::new(m.clone(), nat(), true),
        ],
        vec![
            Param::ex("x", Term::var(&a)),
            Param::ex("xs", vec_ty(Term::var(&a), Term::var(&m))),
        ],
    )
    .with_owner_pats(vec![
        Arg::ex(Pat::bind(a, Term::sort(Sort::type_(0)))),
        Arg::ex(suc_pat(Pat::bind(m, nat()))),
    ]);

    env.add_data("Vec", tele, Sort::type_(0), vec![vnil, vcons])
        .expect("Vec should be accepted");
}

// =============================================================================
// Int, a higher inductive type
// =============================================================================

pub fn int_ty() -> Rc<Term> {
    Term::data("Int", Vec::new())
}

pub fn int_head(con: &str) -> ConHead {
    ConHead::new(Rc::from("Int"), Rc::from(con), Vec::new())
}

pub fn pos(n: Rc<Term>) -> Rc<Term> {
    Term::con(int_head("pos"), vec![Arg::ex(n)])
}

pub fn neg(n: Rc<Term>) -> Rc<Term> {
    Term::con(int_head("neg"), vec![Arg::ex(n)])
}

pub fn zro(i: Rc<Term>) -> Rc<Term> {
    Term::con(int_head("zro"), vec![Arg::ex(i)])
}

/// ```text
/// data Int
/// | pos (n : Nat)
/// | neg (n : Nat)
/// | zro (i : I) { i = 0 ⇒ pos 0 | i = 1 ⇒ neg 0 }
/// ```
pub fn add_int(env: &mut Env) {
    let pos = ConDef::new("Int", "pos", Vec::new(), vec![Param::ex("n", nat())]);
    let neg = ConDef::new("Int", "neg", Vec::new(), vec![Param::ex("n", nat())]);
    let i = Param::ex("i", Term::interval());
    let boundary = vec![
        (Face::eq(i.to_term(), DimEnd::I0), self::pos(zero())),
        (Face::eq(i.to_term(), DimEnd::I1), self::neg(zero())),
    ];
    let zro = ConDef::new("Int", "zro", Vec::new(), vec![i]).with_boundary(boundary);
    env.add_data("Int", Vec::new(), Sort::set(0), vec![pos, neg, zro])
        .expect("Int should be accepted");
}

/// Nat, Bool, Unit, Empty, Vec and Int, plus `add`.
pub fn prelude() -> Env {
    let mut env = Env::new();
    add_nat(&mut env);
    add_bool(&mut env);
    add_unit(&mut env);
    add_empty(&mut env);
    add_vec(&mut env);
    add_int(&mut env);
    add_add(&mut env);
    env
}

pub fn args(terms: impl IntoIterator<Item = Rc<Term>>) -> Args {
    terms.into_iter().map(Arg::ex).collect()
}
