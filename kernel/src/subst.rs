use crate::ast::{Arg, LocalVar, Param, Term};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("variable `{0}` is not bound in this scope")]
    Unbound(LocalVar),
}

// =============================================================================
// Substitution maps
// =============================================================================

/// Finite map from variables to replacement terms.
#[derive(Debug, Clone, Default)]
pub struct Subst {
    map: HashMap<LocalVar, Rc<Term>>,
}

impl Subst {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn singleton(var: LocalVar, term: Rc<Term>) -> Self {
        let mut s = Subst::new();
        s.add(var, term);
        s
    }

    pub fn add(&mut self, var: LocalVar, term: Rc<Term>) {
        self.map.insert(var, term);
    }

    pub fn with(mut self, var: LocalVar, term: Rc<Term>) -> Self {
        self.add(var, term);
        self
    }

    /// Adds `var ↦ term` and pushes it through the existing range, so that
    /// one application of the map is enough after a chain of refinements.
    pub fn compose_add(&mut self, var: LocalVar, term: Rc<Term>) {
        let one = Subst::singleton(var.clone(), term.clone());
        for value in self.map.values_mut() {
            *value = value.subst(&one);
        }
        self.map.insert(var, term);
    }

    /// `self` followed by `other`: apply `other` to every range term, then
    /// take the entries of `other` that `self` does not define.
    pub fn then(&self, other: &Subst) -> Subst {
        let mut map: HashMap<_, _> = self
            .map
            .iter()
            .map(|(k, v)| (k.clone(), v.subst(other)))
            .collect();
        for (k, v) in &other.map {
            map.entry(k.clone()).or_insert_with(|| v.clone());
        }
        Subst { map }
    }

    pub fn extend(&mut self, other: Subst) {
        self.map.extend(other.map);
    }

    pub fn get(&self, var: &LocalVar) -> Option<&Rc<Term>> {
        self.map.get(var)
    }

    pub fn contains(&self, var: &LocalVar) -> bool {
        self.map.contains_key(var)
    }

    pub fn remove(&mut self, var: &LocalVar) -> Option<Rc<Term>> {
        self.map.remove(var)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LocalVar, &Rc<Term>)> {
        self.map.iter()
    }

    fn range_free_vars(&self) -> HashSet<LocalVar> {
        let mut out = HashSet::new();
        for term in self.map.values() {
            collect_free(term, &mut Vec::new(), &mut out);
        }
        out
    }
}

// =============================================================================
// Capture-avoiding traversal
// =============================================================================

struct Substituter {
    map: HashMap<LocalVar, Rc<Term>>,
    /// Free variables of the range; binders with these names are renamed.
    danger: HashSet<LocalVar>,
    rename_all: bool,
}

impl Substituter {
    fn new(subst: &Subst, rename_all: bool) -> Self {
        Substituter {
            danger: subst.range_free_vars(),
            map: subst.map.clone(),
            rename_all,
        }
    }

    /// Enters the scope of `var`, returning the binder to use and whatever
    /// mapping it shadowed.
    fn enter(&mut self, var: &LocalVar) -> (LocalVar, Option<Rc<Term>>) {
        if self.rename_all || self.danger.contains(var) {
            let fresh = var.fresh();
            let saved = self.map.insert(var.clone(), Term::var(&fresh));
            (fresh, saved)
        } else {
            (var.clone(), self.map.remove(var))
        }
    }

    fn exit(&mut self, var: &LocalVar, saved: Option<Rc<Term>>) {
        match saved {
            Some(t) => self.map.insert(var.clone(), t),
            None => self.map.remove(var),
        };
    }

    fn scoped(&mut self, var: &LocalVar, body: &Rc<Term>) -> (LocalVar, Rc<Term>) {
        let (fresh, saved) = self.enter(var);
        let body = self.term(body);
        self.exit(var, saved);
        (fresh, body)
    }

    fn param(&mut self, p: &Param) -> Rc<Term> {
        self.term(&p.ty)
    }

    fn term(&mut self, t: &Rc<Term>) -> Rc<Term> {
        if self.map.is_empty() && !self.rename_all {
            return t.clone();
        }
        match t.as_ref() {
            Term::Var(v) => self.map.get(v).cloned().unwrap_or_else(|| t.clone()),
            Term::Lam(v, body) => {
                let (v2, body2) = self.scoped(v, body);
                if v2 == *v && Rc::ptr_eq(&body2, body) {
                    t.clone()
                } else {
                    Term::lam(v2, body2)
                }
            }
            Term::PLam(v, body) => {
                let (v2, body2) = self.scoped(v, body);
                if v2 == *v && Rc::ptr_eq(&body2, body) {
                    t.clone()
                } else {
                    Term::plam(v2, body2)
                }
            }
            Term::Pi(p, body) | Term::Sigma(p, body) => {
                let ty = self.param(p);
                let (v2, body2) = self.scoped(&p.var, body);
                if v2 == p.var && Rc::ptr_eq(&ty, &p.ty) && Rc::ptr_eq(&body2, body) {
                    return t.clone();
                }
                let p2 = Param::new(v2, ty, p.explicit);
                if matches!(t.as_ref(), Term::Pi(..)) {
                    Term::pi(p2, body2)
                } else {
                    Term::sigma(p2, body2)
                }
            }
            Term::Let(v, val, body) => {
                let val2 = self.term(val);
                let (v2, body2) = self.scoped(v, body);
                if v2 == *v && Rc::ptr_eq(&val2, val) && Rc::ptr_eq(&body2, body) {
                    t.clone()
                } else {
                    Term::let_(v2, val2, body2)
                }
            }
            Term::Path { var, ty, a, b } => {
                let a2 = self.term(a);
                let b2 = self.term(b);
                let (v2, ty2) = self.scoped(var, ty);
                if v2 == *var && Rc::ptr_eq(&ty2, ty) && Rc::ptr_eq(&a2, a) && Rc::ptr_eq(&b2, b) {
                    t.clone()
                } else {
                    Term::path(v2, ty2, a2, b2)
                }
            }
            Term::Coe { var, ty, r, s } => {
                let r2 = self.term(r);
                let s2 = self.term(s);
                let (v2, ty2) = self.scoped(var, ty);
                if v2 == *var && Rc::ptr_eq(&ty2, ty) && Rc::ptr_eq(&r2, r) && Rc::ptr_eq(&s2, s) {
                    t.clone()
                } else {
                    Term::coe(v2, ty2, r2, s2)
                }
            }
            _ => t.descent(|c| self.term(c)),
        }
    }
}

fn collect_scoped(
    var: &LocalVar,
    body: &Rc<Term>,
    bound: &mut Vec<LocalVar>,
    out: &mut HashSet<LocalVar>,
) {
    bound.push(var.clone());
    collect_free(body, bound, out);
    bound.pop();
}

fn collect_free(t: &Rc<Term>, bound: &mut Vec<LocalVar>, out: &mut HashSet<LocalVar>) {
    match t.as_ref() {
        Term::Var(v) => {
            if !bound.contains(v) {
                out.insert(v.clone());
            }
        }
        Term::Lam(v, body) | Term::PLam(v, body) => collect_scoped(v, body, bound, out),
        Term::Pi(p, body) | Term::Sigma(p, body) => {
            collect_free(&p.ty, bound, out);
            collect_scoped(&p.var, body, bound, out);
        }
        Term::Let(v, val, body) => {
            collect_free(val, bound, out);
            collect_scoped(v, body, bound, out);
        }
        Term::Path { var, ty, a, b } => {
            collect_free(a, bound, out);
            collect_free(b, bound, out);
            collect_scoped(var, ty, bound, out);
        }
        Term::Coe { var, ty, r, s } => {
            collect_free(r, bound, out);
            collect_free(s, bound, out);
            collect_scoped(var, ty, bound, out);
        }
        _ => {
            t.descent(|c| {
                collect_free(c, bound, out);
                c.clone()
            });
        }
    }
}

fn lift_term(t: &Rc<Term>, n: u32) -> Rc<Term> {
    let t = t.descent(|c| lift_term(c, n));
    match t.as_ref() {
        Term::Sort(s) => Term::sort(s.lift(n)),
        Term::DataCall { name, ulift, args } => Rc::new(Term::DataCall {
            name: name.clone(),
            ulift: ulift.saturating_add(n),
            args: args.clone(),
        }),
        Term::FnCall { name, ulift, args } => Rc::new(Term::FnCall {
            name: name.clone(),
            ulift: ulift.saturating_add(n),
            args: args.clone(),
        }),
        Term::PrimCall { prim, ulift, args } => Rc::new(Term::PrimCall {
            prim: *prim,
            ulift: ulift.saturating_add(n),
            args: args.clone(),
        }),
        Term::Meta { id, ulift, args } => Rc::new(Term::Meta {
            id: *id,
            ulift: ulift.saturating_add(n),
            args: args.clone(),
        }),
        Term::ConCall { head, args } => {
            let mut head = head.clone();
            head.ulift = head.ulift.saturating_add(n);
            Term::con(head, args.clone())
        }
        _ => t,
    }
}

impl Term {
    /// Capture-avoiding substitution. Binders that would capture a free
    /// variable of the substituted terms are renamed first.
    pub fn subst(self: &Rc<Self>, s: &Subst) -> Rc<Term> {
        if s.is_empty() {
            return self.clone();
        }
        Substituter::new(s, false).term(self)
    }

    pub fn subst_one(self: &Rc<Self>, var: &LocalVar, with: Rc<Term>) -> Rc<Term> {
        self.subst(&Subst::singleton(var.clone(), with))
    }

    /// Alpha-variant with every bound variable replaced by a fresh one.
    pub fn rename(self: &Rc<Self>) -> Rc<Term> {
        Substituter::new(&Subst::new(), true).term(self)
    }

    /// Raises universe levels of sorts, calls and holes by `n`. Variables carry
    /// no level of their own, so they are left as they are.
    pub fn lift(self: &Rc<Self>, n: u32) -> Rc<Term> {
        if n == 0 {
            return self.clone();
        }
        lift_term(self, n)
    }

    pub fn free_vars(self: &Rc<Self>) -> HashSet<LocalVar> {
        let mut out = HashSet::new();
        collect_free(self, &mut Vec::new(), &mut out);
        out
    }

    pub fn occurs(self: &Rc<Self>, var: &LocalVar) -> bool {
        self.free_vars().contains(var)
    }
}

/// Substitutes into a telescope, each param seeing the earlier ones unchanged.
pub fn subst_tele(tele: &[Param], s: &Subst) -> Vec<Param> {
    tele.iter()
        .map(|p| Param::new(p.var.clone(), p.ty.subst(s), p.explicit))
        .collect()
}

/// Maps each param of `tele` to the matching argument.
pub fn tele_subst(tele: &[Param], args: &[Arg<Rc<Term>>]) -> Subst {
    let mut s = Subst::new();
    for (p, a) in tele.iter().zip(args) {
        s.add(p.var.clone(), a.term.clone());
    }
    s
}

/// Gives every param a fresh variable, rewriting later types to match.
pub fn rename_tele(tele: &[Param]) -> (Vec<Param>, Subst) {
    let mut s = Subst::new();
    let params = tele
        .iter()
        .map(|p| {
            let fresh = p.var.fresh();
            let ty = p.ty.subst(&s);
            s.add(p.var.clone(), Term::var(&fresh));
            Param::new(fresh, ty, p.explicit)
        })
        .collect();
    (params, s)
}

/// Every free variable of `term` must be one of the telescope's variables.
pub fn check_scope(term: &Rc<Term>, tele: &[Param]) -> Result<(), ScopeError> {
    let mut free: Vec<_> = term.free_vars().into_iter().collect();
    free.sort_by_key(LocalVar::id);
    match free.into_iter().find(|v| tele.iter().all(|p| p.var != *v)) {
        Some(v) => Err(ScopeError::Unbound(v)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Sort;

    #[test]
    fn subst_replaces_variable() {
        let x = LocalVar::new("x");
        let v = Term::sort(Sort::type_(0));
        let out = Term::var(&x).subst_one(&x, v.clone());
        assert!(Rc::ptr_eq(&out, &v));
    }

    #[test]
    fn subst_without_hits_is_identity() {
        let x = LocalVar::new("x");
        let y = LocalVar::new("y");
        let t = Term::lam(y.clone(), Term::app(Term::var(&y), Term::var(&y)));
        let out = t.subst_one(&x, Term::interval());
        assert!(Rc::ptr_eq(&t, &out));
    }

    #[test]
    fn subst_renames_capturing_binder() {
        let x = LocalVar::new("x");
        let y = LocalVar::new("y");
        let t = Term::lam(y.clone(), Term::var(&x));
        let out = t.subst_one(&x, Term::var(&y));
        match out.as_ref() {
            Term::Lam(y2, body) => {
                assert_ne!(*y2, y);
                assert_eq!(body.as_var(), Some(&y));
            }
            other => panic!("expected lambda, got {:?}", other),
        }
    }

    #[test]
    fn compose_add_chains_refinements() {
        let x = LocalVar::new("x");
        let y = LocalVar::new("y");
        let mut s = Subst::new();
        s.compose_add(x.clone(), Term::tup(Term::var(&y), Term::var(&y)));
        s.compose_add(y.clone(), Term::interval());
        let out = Term::var(&x).subst(&s);
        assert_eq!(*out, *Term::tup(Term::interval(), Term::interval()));
    }

    #[test]
    fn lift_raises_sorts_not_variables() {
        let x = LocalVar::new("x");
        let t = Term::tup(Term::sort(Sort::type_(1)), Term::var(&x));
        let lifted = t.lift(2);
        assert_eq!(*lifted, *Term::tup(Term::sort(Sort::type_(3)), Term::var(&x)));
    }

    #[test]
    fn lift_saturates_at_the_top_level() {
        let call = Rc::new(Term::DataCall {
            name: Rc::from("Nat"),
            ulift: u32::MAX - 1,
            args: Vec::new(),
        });
        match call.lift(3).as_ref() {
            Term::DataCall { ulift, .. } => assert_eq!(*ulift, u32::MAX),
            other => panic!("expected a data call, got {:?}", other),
        }
        let top = Term::sort(Sort::type_(u32::MAX));
        assert_eq!(*top.lift(1), *top);
    }

    #[test]
    fn rename_freshens_every_binder() {
        let x = LocalVar::new("x");
        let t = Term::lam(x.clone(), Term::var(&x));
        let out = t.rename();
        match out.as_ref() {
            Term::Lam(x2, body) => {
                assert_ne!(*x2, x);
                assert_eq!(body.as_var(), Some(x2));
            }
            other => panic!("expected lambda, got {:?}", other),
        }
    }

    #[test]
    fn check_scope_reports_unbound() {
        let x = LocalVar::new("x");
        let y = LocalVar::new("y");
        let tele = vec![Param::new(x.clone(), Term::interval(), true)];
        assert!(check_scope(&Term::var(&x), &tele).is_ok());
        assert_eq!(
            check_scope(&Term::tup(Term::var(&x), Term::var(&y)), &tele),
            Err(ScopeError::Unbound(y))
        );
    }
}
