use crate::ast::{Arg, Term};
use crate::pat::Pat;
use crate::reduce::Normalizer;
use crate::subst::Subst;
use log::trace;
use std::rc::Rc;

/// Outcome of matching a pattern against a term.
#[derive(Debug, Clone)]
pub enum MatchResult {
    Matched(Subst),
    /// The term can never match, however its free variables are instantiated.
    Mismatch,
    /// The term is not yet reduced enough to tell.
    Stuck,
}

impl MatchResult {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchResult::Matched(_))
    }

    pub fn is_mismatch(&self) -> bool {
        matches!(self, MatchResult::Mismatch)
    }

    pub fn is_stuck(&self) -> bool {
        matches!(self, MatchResult::Stuck)
    }
}

/// Introduction forms and types: a head that will never become a
/// constructor or a tuple.
fn is_canonical(t: &Term) -> bool {
    matches!(
        t,
        Term::Lam(..)
            | Term::Pi(..)
            | Term::Sigma(..)
            | Term::Tup(..)
            | Term::Sort(_)
            | Term::DataCall { .. }
            | Term::ConCall { .. }
            | Term::Int(_)
            | Term::Interval
            | Term::Dim(_)
            | Term::Path { .. }
            | Term::PLam(..)
            | Term::PartialTy(..)
            | Term::Partial(_)
            | Term::InS(..)
    )
}

pub fn match_pat(norm: &Normalizer, pat: &Rc<Pat>, term: &Rc<Term>) -> MatchResult {
    match pat.as_ref() {
        Pat::Bind { var, .. } => MatchResult::Matched(Subst::singleton(var.clone(), term.clone())),
        Pat::Absurd => MatchResult::Stuck,
        Pat::Meta(meta) => match meta.solution() {
            Some(sol) => match_pat(norm, sol, term),
            None => panic!(
                "unsolved meta pattern `{}` reached the matcher",
                meta.fake
            ),
        },
        Pat::Tuple(p, q) => {
            let t = norm.whnf(term);
            match t.as_ref() {
                Term::Tup(a, b) => merge(vec![match_pat(norm, p, a), match_pat(norm, q, b)]),
                other if is_canonical(other) => MatchResult::Mismatch,
                _ => MatchResult::Stuck,
            }
        }
        Pat::ShapedInt(lit) => {
            let t = norm.whnf(term);
            match t.as_ref() {
                Term::Int(other) if other.shape.data == lit.shape.data => {
                    if other.value == lit.value {
                        MatchResult::Matched(Subst::new())
                    } else {
                        MatchResult::Mismatch
                    }
                }
                Term::ConCall { .. } => match_pat(norm, &pat.constructor_form(), &t),
                other if is_canonical(other) => MatchResult::Mismatch,
                _ => MatchResult::Stuck,
            }
        }
        Pat::Con { head, args } => {
            let t = norm.whnf(term);
            match t.as_ref() {
                Term::ConCall {
                    head: term_head,
                    args: term_args,
                } => {
                    if head.same_con(term_head) {
                        match_all(norm, args, term_args)
                    } else {
                        MatchResult::Mismatch
                    }
                }
                // Not through `match_pat`: its `whnf` would fold the peeled
                // `suc` straight back into a literal.
                Term::Int(lit) if lit.shape.data == head.data => {
                    match lit.constructor_form().as_ref() {
                        Term::ConCall {
                            head: term_head,
                            args: term_args,
                        } if head.same_con(term_head) => match_all(norm, args, term_args),
                        _ => MatchResult::Mismatch,
                    }
                }
                other if is_canonical(other) => MatchResult::Mismatch,
                _ => {
                    trace!(target: "match", "{} is stuck against {}", t, pat);
                    MatchResult::Stuck
                }
            }
        }
    }
}

/// Matches a pattern list position by position. A definite mismatch anywhere
/// wins over a stuck position elsewhere, since the clause can then never fire.
pub fn match_all(norm: &Normalizer, pats: &[Arg<Rc<Pat>>], terms: &[Arg<Rc<Term>>]) -> MatchResult {
    if pats.len() != terms.len() {
        return MatchResult::Stuck;
    }
    merge(
        pats.iter()
            .zip(terms)
            .map(|(p, t)| match_pat(norm, &p.term, &t.term))
            .collect(),
    )
}

fn merge(results: Vec<MatchResult>) -> MatchResult {
    let mut subst = Subst::new();
    let mut stuck = false;
    for result in results {
        match result {
            MatchResult::Matched(s) => subst.extend(s),
            MatchResult::Mismatch => return MatchResult::Mismatch,
            MatchResult::Stuck => stuck = true,
        }
    }
    if stuck {
        MatchResult::Stuck
    } else {
        MatchResult::Matched(subst)
    }
}
