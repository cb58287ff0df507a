use crate::ast::{
    Arg, Args, ConHead, DimEnd, Face, IntLit, LocalVar, Param, Partial, Prim, Restr, Term,
};
use crate::conv::alpha_eq;
use crate::env::{Env, FnBody};
use crate::matcher::{match_all, MatchResult};
use crate::meta::{MetaId, MetaStore};
use crate::pat::Matching;
use crate::subst::{tele_subst, Subst};
use log::{debug, trace};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReduceError {
    #[error("unsolved meta {0} in a term that must be fully resolved")]
    UnsolvedMeta(MetaId),
    #[error("reduction fuel exhausted after {steps} steps")]
    FuelExhausted { steps: u64 },
}

const DEFAULT_REDUCE_FUEL: u64 = 1_000_000;

pub fn default_reduce_fuel() -> u64 {
    static DEFAULT: OnceLock<u64> = OnceLock::new();
    *DEFAULT.get_or_init(|| {
        std::env::var("CUBICAL_REDUCE_FUEL")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .filter(|val| *val > 0)
            .unwrap_or(DEFAULT_REDUCE_FUEL)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NormalizeMode {
    Whnf,
    Nf,
}

enum Step {
    /// Reduced one head redex; keep going.
    Continue(Rc<Term>),
    /// The head is irreducible.
    Done(Rc<Term>),
}

/// Reduction over a read-only view of the definitions and meta solutions.
///
/// Every head step costs one unit of fuel. Once the budget is spent `whnf`
/// returns the term it got to and `nf` reports `FuelExhausted`.
pub struct Normalizer<'a> {
    env: &'a Env,
    metas: &'a MetaStore,
    budget: u64,
    fuel: Cell<u64>,
    exhausted: Cell<bool>,
}

impl<'a> Normalizer<'a> {
    pub fn new(env: &'a Env, metas: &'a MetaStore) -> Self {
        Self::with_fuel(env, metas, default_reduce_fuel())
    }

    pub fn with_fuel(env: &'a Env, metas: &'a MetaStore, fuel: u64) -> Self {
        Normalizer {
            env,
            metas,
            budget: fuel,
            fuel: Cell::new(fuel),
            exhausted: Cell::new(false),
        }
    }

    pub fn env(&self) -> &'a Env {
        self.env
    }

    pub fn metas(&self) -> &'a MetaStore {
        self.metas
    }

    /// Steps granted by each `refuel`.
    pub fn budget(&self) -> u64 {
        self.budget
    }

    pub fn exhausted(&self) -> bool {
        self.exhausted.get()
    }

    /// Restores the full budget, e.g. between two independent queries.
    pub fn refuel(&self) {
        self.fuel.set(self.budget);
        self.exhausted.set(false);
    }

    fn tick(&self) -> bool {
        let left = self.fuel.get();
        if left == 0 {
            if !self.exhausted.replace(true) {
                debug!(target: "reduce", "reduction fuel exhausted after {} steps", self.budget);
            }
            return false;
        }
        self.fuel.set(left - 1);
        true
    }

    pub fn normalize(&self, term: &Rc<Term>, mode: NormalizeMode) -> Result<Rc<Term>, ReduceError> {
        match mode {
            NormalizeMode::Whnf => {
                let out = self.whnf(term);
                if self.exhausted() {
                    return Err(ReduceError::FuelExhausted { steps: self.budget });
                }
                Ok(out)
            }
            NormalizeMode::Nf => self.nf(term),
        }
    }

    // =========================================================================
    // Weak head normal form
    // =========================================================================

    pub fn whnf(&self, term: &Rc<Term>) -> Rc<Term> {
        let mut term = term.clone();
        loop {
            if !self.tick() {
                return term;
            }
            match self.step(&term) {
                Step::Continue(next) => term = next,
                Step::Done(done) => return done,
            }
        }
    }

    fn step(&self, t: &Rc<Term>) -> Step {
        match t.as_ref() {
            Term::App(f, a) => {
                let f2 = self.whnf(f);
                match f2.as_ref() {
                    Term::Lam(x, body) => Step::Continue(body.subst_one(x, a.clone())),
                    _ if Rc::ptr_eq(&f2, f) => Step::Done(t.clone()),
                    _ => Step::Done(Term::app(f2, a.clone())),
                }
            }
            Term::Proj(tup, ix) => {
                let tup2 = self.whnf(tup);
                match tup2.as_ref() {
                    Term::Tup(a, _) if *ix == 0 => Step::Continue(a.clone()),
                    Term::Tup(_, b) => Step::Continue(b.clone()),
                    _ if Rc::ptr_eq(&tup2, tup) => Step::Done(t.clone()),
                    _ => Step::Done(Term::proj(tup2, *ix)),
                }
            }
            Term::Let(x, val, body) => Step::Continue(body.subst_one(x, val.clone())),
            Term::FnCall { name, ulift, args } => match self.unfold_fn(name, *ulift, args) {
                Some(next) => Step::Continue(next),
                None => Step::Done(t.clone()),
            },
            Term::ConCall { head, args } => self.con_step(t, head, args),
            Term::Meta { id, ulift, args } => match self.metas.solution(*id) {
                Some(sol) => Step::Continue(self.instantiate_meta(*id, sol, *ulift, args)),
                None => Step::Done(t.clone()),
            },
            Term::PrimCall { prim, ulift, args } => self.prim_step(t, *prim, *ulift, args),
            Term::PApp { fun, arg, a, b } => {
                let r = self.whnf(arg);
                match r.as_dim() {
                    Some(DimEnd::I0) => Step::Continue(a.clone()),
                    Some(DimEnd::I1) => Step::Continue(b.clone()),
                    None => {
                        let fun2 = self.whnf(fun);
                        match fun2.as_ref() {
                            Term::PLam(i, body) => Step::Continue(body.subst_one(i, r)),
                            _ if Rc::ptr_eq(&fun2, fun) && Rc::ptr_eq(&r, arg) => {
                                Step::Done(t.clone())
                            }
                            _ => Step::Done(Term::papp(fun2, r, a.clone(), b.clone())),
                        }
                    }
                }
            }
            Term::OutS(inner, partial) => {
                let inner2 = self.whnf(inner);
                if let Term::InS(_, u) = inner2.as_ref() {
                    return Step::Continue(u.clone());
                }
                match self.simplify_partial(partial) {
                    Partial::Const(u) => Step::Continue(u),
                    p2 if Rc::ptr_eq(&inner2, inner) && p2 == *partial => Step::Done(t.clone()),
                    p2 => Step::Done(Rc::new(Term::OutS(inner2, p2))),
                }
            }
            Term::Partial(p) => {
                let p2 = self.simplify_partial(p);
                if p2 == *p {
                    Step::Done(t.clone())
                } else {
                    Step::Done(Rc::new(Term::Partial(p2)))
                }
            }
            Term::PartialTy(ty, restr) => {
                let restr2 = self.simplify_restr(restr);
                if restr2 == *restr {
                    Step::Done(t.clone())
                } else {
                    Step::Done(Rc::new(Term::PartialTy(ty.clone(), restr2)))
                }
            }
            Term::Coe { var, ty, r, s } => self.coe_step(t, var, ty, r, s),
            _ => Step::Done(t.clone()),
        }
    }

    fn instantiate_meta(&self, id: MetaId, sol: &Rc<Term>, ulift: u32, args: &Args) -> Rc<Term> {
        let params = self
            .metas
            .get(id)
            .map(|entry| entry.params.as_slice())
            .unwrap_or_default();
        let mut s = Subst::new();
        for (p, a) in params.iter().zip(args) {
            s.add(p.clone(), a.term.clone());
        }
        let body = sol.subst(&s).lift(ulift);
        Term::apps(body, args.iter().skip(params.len()).map(|a| a.term.clone()))
    }

    fn unfold_fn(&self, name: &str, ulift: u32, args: &Args) -> Option<Rc<Term>> {
        let def = self.env.get_fn(name)?;
        if def.modifiers.opaque {
            return None;
        }
        match &def.body {
            FnBody::Expr(body) => {
                if args.len() != def.tele.len() {
                    return None;
                }
                let s = tele_subst(&def.tele, args);
                trace!(target: "reduce", "unfold {}", name);
                Some(body.subst(&s).lift(ulift))
            }
            FnBody::Clauses(matchings) => {
                let out = self.try_unfold_clauses(args, matchings, def.modifiers.overlap, ulift);
                if out.is_some() {
                    trace!(target: "reduce", "unfold {} by clauses", name);
                }
                out
            }
        }
    }

    /// Tries each clause in source order. Without `overlap` the first stuck
    /// clause commits the call to being stuck; with `overlap` it is skipped.
    pub fn try_unfold_clauses(
        &self,
        args: &Args,
        matchings: &[Matching],
        overlap: bool,
        ulift: u32,
    ) -> Option<Rc<Term>> {
        for (ix, matching) in matchings.iter().enumerate() {
            match match_all(self, &matching.patterns, args) {
                MatchResult::Matched(s) => {
                    trace!(target: "reduce", "clause {} fires", ix + 1);
                    return Some(matching.body.subst(&s).lift(ulift));
                }
                MatchResult::Mismatch => continue,
                MatchResult::Stuck if overlap => continue,
                MatchResult::Stuck => {
                    trace!(target: "reduce", "clause {} is stuck", ix + 1);
                    return None;
                }
            }
        }
        None
    }

    fn con_step(&self, t: &Rc<Term>, head: &ConHead, args: &Args) -> Step {
        if let Some(lit) = fold_suc_literal(head, args) {
            return Step::Done(Term::int(lit));
        }
        let Some(con) = self.env.get_con(&head.con) else {
            return Step::Done(t.clone());
        };
        if !con.has_boundary() || args.len() != con.self_tele.len() {
            return Step::Done(t.clone());
        }
        let mut s = tele_subst(&con.self_tele, args);
        if con.owner_pats.is_none() && con.owner_tele.len() == head.data_args.len() {
            s.extend(tele_subst(&con.owner_tele, &head.data_args));
        }
        for (face, body) in &con.boundary {
            let face = Face {
                conds: face
                    .conds
                    .iter()
                    .map(|(dim, end)| (dim.subst(&s), *end))
                    .collect(),
            };
            if let Some(face) = self.simplify_face(&face) {
                if face.is_top() {
                    trace!(target: "reduce", "{} reduces on its boundary", head.con);
                    return Step::Continue(body.subst(&s).lift(head.ulift));
                }
            }
        }
        Step::Done(t.clone())
    }

    fn prim_step(&self, t: &Rc<Term>, prim: Prim, ulift: u32, args: &Args) -> Step {
        if args.len() != prim.arity() {
            return Step::Done(t.clone());
        }
        let whnfs: Vec<Rc<Term>> = args.iter().map(|a| self.whnf(&a.term)).collect();
        let ends: Vec<Option<DimEnd>> = whnfs.iter().map(|w| w.as_dim()).collect();
        let reduced = match (prim, ends.as_slice()) {
            (Prim::IntervalInv, [Some(e)]) => Some(Term::dim(e.flip())),
            (Prim::IntervalInv, [None]) => match whnfs[0].as_ref() {
                Term::PrimCall {
                    prim: Prim::IntervalInv,
                    args: inner,
                    ..
                } if inner.len() == 1 => Some(inner[0].term.clone()),
                _ => None,
            },
            (Prim::IntervalMin, [Some(DimEnd::I0), _]) | (Prim::IntervalMin, [_, Some(DimEnd::I0)]) => {
                Some(Term::dim(DimEnd::I0))
            }
            (Prim::IntervalMin, [Some(DimEnd::I1), _]) => Some(whnfs[1].clone()),
            (Prim::IntervalMin, [_, Some(DimEnd::I1)]) => Some(whnfs[0].clone()),
            (Prim::IntervalMax, [Some(DimEnd::I1), _]) | (Prim::IntervalMax, [_, Some(DimEnd::I1)]) => {
                Some(Term::dim(DimEnd::I1))
            }
            (Prim::IntervalMax, [Some(DimEnd::I0), _]) => Some(whnfs[1].clone()),
            (Prim::IntervalMax, [_, Some(DimEnd::I0)]) => Some(whnfs[0].clone()),
            _ => None,
        };
        match reduced {
            Some(next) => Step::Continue(next),
            None if whnfs.iter().zip(args).all(|(w, a)| Rc::ptr_eq(w, &a.term)) => {
                Step::Done(t.clone())
            }
            None => Step::Done(Rc::new(Term::PrimCall {
                prim,
                ulift,
                args: whnfs
                    .into_iter()
                    .zip(args)
                    .map(|(w, a)| Arg::new(w, a.explicit))
                    .collect(),
            })),
        }
    }

    // =========================================================================
    // Faces and partial elements
    // =========================================================================

    /// `None` when the face can never hold; the empty face when it always does.
    pub fn simplify_face(&self, face: &Face) -> Option<Face> {
        let mut conds: Vec<(Rc<Term>, DimEnd)> = Vec::new();
        for (dim, end) in &face.conds {
            let dim = self.whnf(dim);
            match dim.as_dim() {
                Some(e) if e == *end => continue,
                Some(_) => return None,
                None => {}
            }
            if let Some(var) = dim.as_var() {
                let clash = conds
                    .iter()
                    .any(|(d, e)| d.as_var() == Some(var) && e != end);
                if clash {
                    return None;
                }
            }
            conds.push((dim, *end));
        }
        Some(Face { conds })
    }

    pub fn simplify_restr(&self, restr: &Restr) -> Restr {
        let faces: Vec<Face> = restr
            .faces
            .iter()
            .filter_map(|face| self.simplify_face(face))
            .collect();
        if faces.iter().any(Face::is_top) {
            return Restr {
                faces: vec![Face::top()],
            };
        }
        Restr { faces }
    }

    pub fn simplify_partial(&self, partial: &Partial) -> Partial {
        match partial {
            Partial::Const(u) => Partial::Const(u.clone()),
            Partial::Split(clauses) => {
                let mut kept = Vec::new();
                for (face, u) in clauses {
                    match self.simplify_face(face) {
                        None => {}
                        Some(face) if face.is_top() => return Partial::Const(u.clone()),
                        Some(face) => kept.push((face, u.clone())),
                    }
                }
                Partial::Split(kept)
            }
        }
    }

    // =========================================================================
    // Coercion
    // =========================================================================

    fn coe_step(
        &self,
        t: &Rc<Term>,
        var: &LocalVar,
        ty: &Rc<Term>,
        r: &Rc<Term>,
        s: &Rc<Term>,
    ) -> Step {
        let r2 = self.whnf(r);
        let s2 = self.whnf(s);
        if alpha_eq(&r2, &s2) || !ty.occurs(var) {
            return Step::Continue(identity());
        }
        let ty2 = self.whnf(ty);
        let next = match ty2.as_ref() {
            Term::Pi(param, cod) => coe_pi(var, param, cod, &r2, &s2),
            Term::Sigma(param, snd) => coe_sigma(var, param, snd, &r2, &s2),
            Term::Path { var: k, ty: a, a: lhs, b: rhs } => coe_path(var, k, a, lhs, rhs, &r2, &s2),
            Term::Sort(_) => identity(),
            Term::DataCall { args, .. } if args.is_empty() => identity(),
            _ => {
                trace!(target: "reduce", "coe stuck on {}", ty2);
                return Step::Done(t.clone());
            }
        };
        Step::Continue(next)
    }

    // =========================================================================
    // Normal form
    // =========================================================================

    /// Full normalization. Unlike `whnf` this refuses unsolved metas.
    pub fn nf(&self, term: &Rc<Term>) -> Result<Rc<Term>, ReduceError> {
        let head = self.whnf(term);
        if self.exhausted() {
            return Err(ReduceError::FuelExhausted { steps: self.budget });
        }
        if let Term::Meta { id, .. } = head.as_ref() {
            return Err(ReduceError::UnsolvedMeta(*id));
        }
        let out = head.try_descent(&mut |c| self.nf(c))?;
        if let Term::ConCall { head, args } = out.as_ref() {
            if let Some(lit) = self.fold_zero_literal(head, args) {
                return Ok(Term::int(lit));
            }
            if let Some(lit) = fold_suc_literal(head, args) {
                return Ok(Term::int(lit));
            }
        }
        Ok(out)
    }

    /// The nullary constructor of a naturals-shaped type is the literal `0`.
    /// Together with `fold_suc_literal` this makes every closed numeral
    /// normalize to one literal, however it was built.
    fn fold_zero_literal(&self, head: &ConHead, args: &Args) -> Option<IntLit> {
        if !args.is_empty() {
            return None;
        }
        let shape = self.env.int_shape(&head.data)?;
        (shape.zero == head.con).then(|| IntLit::new(0, shape.clone()))
    }

    /// Replaces every solved meta by its solution without reducing anything
    /// else. A meta that is still unsolved is an error.
    pub fn zonk(&self, term: &Rc<Term>) -> Result<Rc<Term>, ReduceError> {
        if let Term::Meta { id, ulift, args } = term.as_ref() {
            let sol = self
                .metas
                .solution(*id)
                .ok_or(ReduceError::UnsolvedMeta(*id))?;
            return self.zonk(&self.instantiate_meta(*id, sol, *ulift, args));
        }
        term.try_descent(&mut |c| self.zonk(c))
    }
}

/// `suc n` where `n` is a literal of the same shape is the literal `n + 1`,
/// unless that literal is not representable.
fn fold_suc_literal(head: &ConHead, args: &Args) -> Option<IntLit> {
    match args.as_slice() {
        [arg] => match arg.term.as_ref() {
            Term::Int(lit) if lit.shape.suc == head.con && lit.shape.data == head.data => {
                lit.value.checked_add(1).map(|value| lit.with_value(value))
            }
            _ => None,
        },
        _ => None,
    }
}

fn identity() -> Rc<Term> {
    let x = LocalVar::new("x");
    Term::lam(x.clone(), Term::var(&x))
}

fn coe(var: &LocalVar, ty: Rc<Term>, r: &Rc<Term>, s: &Rc<Term>) -> Rc<Term> {
    Term::coe(var.clone(), ty, r.clone(), s.clone())
}

/// `λ f y. coe^{r→s}_{i. B[x ↦ coe^{s→i}_A y]} (f (coe^{s→r}_A y))`
fn coe_pi(i: &LocalVar, param: &Param, cod: &Rc<Term>, r: &Rc<Term>, s: &Rc<Term>) -> Rc<Term> {
    let f = LocalVar::new("f");
    let y = LocalVar::new("y");
    let j = i.fresh();
    let a_j = param.ty.subst_one(i, Term::var(&j));
    let y_at_i = Term::app(coe(&j, a_j, s, &Term::var(i)), Term::var(&y));
    let fam = cod.subst_one(&param.var, y_at_i);
    let y_at_r = Term::app(coe(i, param.ty.clone(), s, r), Term::var(&y));
    let body = Term::app(coe(i, fam, r, s), Term::app(Term::var(&f), y_at_r));
    Term::lam(f, Term::lam(y, body))
}

/// `λ p. (coe^{r→s}_A p.0, coe^{r→s}_{i. B[x ↦ coe^{r→i}_A p.0]} p.1)`
fn coe_sigma(i: &LocalVar, param: &Param, snd: &Rc<Term>, r: &Rc<Term>, s: &Rc<Term>) -> Rc<Term> {
    let p = LocalVar::new("p");
    let j = i.fresh();
    let fst_of = Term::proj(Term::var(&p), 0);
    let fst = Term::app(coe(i, param.ty.clone(), r, s), fst_of.clone());
    let a_j = param.ty.subst_one(i, Term::var(&j));
    let fst_at_i = Term::app(coe(&j, a_j, r, &Term::var(i)), fst_of);
    let fam = snd.subst_one(&param.var, fst_at_i);
    let snd = Term::app(coe(i, fam, r, s), Term::proj(Term::var(&p), 1));
    Term::lam(p, Term::tup(fst, snd))
}

/// `λ p. λ⟨k⟩. coe^{r→s}_{i. A} (p @ k)`
fn coe_path(
    i: &LocalVar,
    k: &LocalVar,
    a: &Rc<Term>,
    lhs: &Rc<Term>,
    rhs: &Rc<Term>,
    r: &Rc<Term>,
    s: &Rc<Term>,
) -> Rc<Term> {
    let p = LocalVar::new("p");
    let k2 = k.fresh();
    let ty_k = a.subst_one(k, Term::var(&k2));
    let at_r = Subst::singleton(i.clone(), r.clone());
    let app = Term::papp(Term::var(&p), Term::var(&k2), lhs.subst(&at_r), rhs.subst(&at_r));
    Term::lam(p, Term::plam(k2, Term::app(coe(i, ty_k, r, s), app)))
}
