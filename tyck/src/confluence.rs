//! Agreement of clauses that may fire on the same arguments.
//!
//! Two clauses sharing a leaf of the case tree are unified pattern by
//! pattern; both bodies are then instantiated at the common instance and
//! must be equal. Clauses matching on constructors with a boundary are also
//! checked at every endpoint of their interval variables, where the
//! constructor reduces and another clause may take over.

use crate::classifier::CaseTree;
use crate::clause::Clause;
use crate::problem::ClausesProblem;
use kernel::{
    alpha_eq, is_def_eq, Arg, Args, DimEnd, Env, LocalVar, Matching, Normalizer, Pat, ReduceError,
    Subst, Term,
};
use log::{debug, trace};
use std::collections::HashSet;
use std::rc::Rc;

/// Equality of two right-hand sides.
pub trait Unifier {
    fn compare(&mut self, lhs: &Rc<Term>, rhs: &Rc<Term>) -> bool;
}

/// Definitional equality with a fresh reduction budget per comparison.
pub struct DefEqUnifier<'n, 'a> {
    norm: &'n Normalizer<'a>,
}

impl<'n, 'a> DefEqUnifier<'n, 'a> {
    pub fn new(norm: &'n Normalizer<'a>) -> Self {
        DefEqUnifier { norm }
    }
}

impl Unifier for DefEqUnifier<'_, '_> {
    fn compare(&mut self, lhs: &Rc<Term>, rhs: &Rc<Term>) -> bool {
        self.norm.refuel();
        is_def_eq(self.norm, lhs, rhs)
    }
}

// =============================================================================
// Pattern unification
// =============================================================================

/// The most general common instance of two pattern lists.
///
/// `args` is that instance; `lhs` and `rhs` send the binds of each side to
/// their part of it.
#[derive(Debug, Clone)]
pub struct PatUnify {
    pub args: Args,
    pub lhs: Subst,
    pub rhs: Subst,
}

impl PatUnify {
    /// `None` if no argument matches both lists.
    pub fn unify(lpats: &[Arg<Rc<Pat>>], rpats: &[Arg<Rc<Pat>>]) -> Option<PatUnify> {
        if lpats.len() != rpats.len() {
            return None;
        }
        let mut out = PatUnify {
            args: Vec::new(),
            lhs: Subst::new(),
            rhs: Subst::new(),
        };
        for (l, r) in lpats.iter().zip(rpats) {
            let term = out.pat(&l.term.inline(), &r.term.inline())?;
            out.args.push(Arg::new(term, l.explicit));
        }
        Some(out)
    }

    fn pat(&mut self, l: &Rc<Pat>, r: &Rc<Pat>) -> Option<Rc<Term>> {
        match (l.as_ref(), r.as_ref()) {
            (Pat::Bind { var: x, .. }, Pat::Bind { var: y, .. }) => {
                let joint = Term::var(&x.fresh());
                self.lhs.add(x.clone(), joint.clone());
                self.rhs.add(y.clone(), joint.clone());
                Some(joint)
            }
            (Pat::Bind { var, .. }, _) => {
                let term = r.to_term();
                self.lhs.add(var.clone(), term.clone());
                Some(term)
            }
            (_, Pat::Bind { var, .. }) => {
                let term = l.to_term();
                self.rhs.add(var.clone(), term.clone());
                Some(term)
            }
            (Pat::Tuple(a, b), Pat::Tuple(c, d)) => {
                let fst = self.pat(a, c)?;
                let snd = self.pat(b, d)?;
                Some(Term::tup(fst, snd))
            }
            (Pat::Con { head: lh, args: la }, Pat::Con { head: rh, args: ra }) => {
                if !lh.same_con(rh) || la.len() != ra.len() {
                    return None;
                }
                let args = la
                    .iter()
                    .zip(ra)
                    .map(|(x, y)| Some(Arg::new(self.pat(&x.term, &y.term)?, x.explicit)))
                    .collect::<Option<Args>>()?;
                Some(Term::con(lh.clone(), args))
            }
            (Pat::ShapedInt(x), Pat::ShapedInt(y)) => {
                (x.value == y.value).then(|| Term::int(x.clone()))
            }
            (Pat::ShapedInt(_), Pat::Con { .. }) => self.pat(&l.constructor_form(), r),
            (Pat::Con { .. }, Pat::ShapedInt(_)) => self.pat(l, &r.constructor_form()),
            _ => None,
        }
    }
}

// =============================================================================
// Confluence and domination
// =============================================================================

/// Compares every two consecutive live clauses of each leaf, then reports
/// unreachable clauses.
pub fn check_confluence(
    unifier: &mut impl Unifier,
    clauses: &[Clause],
    tree: &CaseTree,
) -> Vec<ClausesProblem> {
    let mut problems = Vec::new();
    let mut seen = HashSet::new();
    for class in tree.leaves() {
        let live: Vec<usize> = class
            .clauses
            .iter()
            .copied()
            .filter(|&ix| clauses.get(ix).is_some_and(Clause::is_live))
            .collect();
        for pair in live.windows(2) {
            let (i, j) = (pair[0], pair[1]);
            if !seen.insert((i, j)) {
                continue;
            }
            if let Some(problem) = check_pair(unifier, &clauses[i], i, &clauses[j], j) {
                problems.push(problem);
            }
        }
    }
    problems.extend(check_domination(clauses, tree));
    problems
}

fn check_pair(
    unifier: &mut impl Unifier,
    lhs: &Clause,
    i: usize,
    rhs: &Clause,
    j: usize,
) -> Option<ClausesProblem> {
    let (Some(lbody), Some(rbody)) = (&lhs.body, &rhs.body) else {
        return None;
    };
    let Some(unified) = PatUnify::unify(&lhs.pats, &rhs.pats) else {
        trace!(target: "confluence", "clauses {} and {} do not overlap", i + 1, j + 1);
        return None;
    };
    let l = lbody.subst(&unified.lhs);
    let r = rbody.subst(&unified.rhs);
    if unifier.compare(&l, &r) {
        trace!(target: "confluence", "clauses {} and {} agree", i + 1, j + 1);
        return None;
    }
    debug!(
        target: "confluence",
        "clauses {} and {} disagree: `{}` vs `{}`",
        i + 1,
        j + 1,
        l,
        r
    );
    Some(ClausesProblem::Confluence {
        pos: rhs.pos,
        i: i + 1,
        j: j + 1,
        lhs: l,
        rhs: r,
        i_pos: lhs.pos,
        j_pos: rhs.pos,
    })
}

/// A live clause that is first in none of the leaves it appears in never
/// fires. If one earlier clause shares all of its leaves, that clause is
/// named as the dominating one.
pub fn check_domination(clauses: &[Clause], tree: &CaseTree) -> Vec<ClausesProblem> {
    let classes = tree.leaves();
    let mut first = vec![0usize; clauses.len()];
    let mut leaves_of: Vec<Vec<usize>> = vec![Vec::new(); clauses.len()];
    for (leaf, class) in classes.iter().enumerate() {
        for &ix in &class.clauses {
            if let Some(leaves) = leaves_of.get_mut(ix) {
                leaves.push(leaf);
            }
        }
        if let Some(&ix) = class.clauses.first() {
            first[ix] += 1;
        }
    }

    let mut problems = Vec::new();
    for (sub, clause) in clauses.iter().enumerate() {
        if !clause.is_live() || first[sub] > 0 {
            continue;
        }
        let leaves = &leaves_of[sub];
        let dom = if leaves.is_empty() {
            None
        } else {
            (0..sub).find(|d| leaves.iter().all(|&leaf| classes[leaf].clauses.contains(d)))
        };
        debug!(target: "confluence", "clause {} is unreachable", sub + 1);
        problems.push(match dom {
            Some(dom) => ClausesProblem::Domination {
                pos: clause.pos,
                dom: dom + 1,
                sub: sub + 1,
            },
            None => ClausesProblem::FmDomination {
                pos: clause.pos,
                sub: sub + 1,
            },
        });
    }
    problems
}

// =============================================================================
// Conditions
// =============================================================================

/// Beyond this many interval variables in one clause the endpoints are not
/// enumerated.
const MAX_CONDITION_DIMS: usize = 16;

/// For each clause matching on a constructor with a boundary, substitutes
/// every combination of endpoints for its interval variables. Where that
/// makes the arguments reduce, the clause's body must agree with what the
/// clauses compute on the reduced arguments.
pub fn check_conditions(
    norm: &Normalizer,
    unifier: &mut impl Unifier,
    clauses: &[Clause],
    overlap: bool,
) -> Vec<ClausesProblem> {
    let matchings: Vec<Matching> = clauses
        .iter()
        .filter(|c| !c.has_error())
        .filter_map(Clause::to_matching)
        .collect();
    let mut problems = Vec::new();
    for (ix, clause) in clauses.iter().enumerate() {
        let Some(body) = clause.body.as_ref().filter(|_| clause.is_live()) else {
            continue;
        };
        let pats = clause.inlined_pats();
        let dims = boundary_dims(norm.env(), &pats);
        if dims.is_empty() {
            continue;
        }
        if dims.len() > MAX_CONDITION_DIMS {
            debug!(
                target: "confluence",
                "clause {} binds {} interval variables, conditions not checked",
                ix + 1,
                dims.len()
            );
            continue;
        }
        let args: Args = pats.iter().map(|a| a.map(|p| p.to_term())).collect();
        for mask in 0..(1u32 << dims.len()) {
            let (s, face) = endpoints(&dims, mask);
            let at_face: Args = args.iter().map(|a| a.map(|t| t.subst(&s))).collect();
            norm.refuel();
            let reduced: Result<Args, ReduceError> = at_face
                .iter()
                .map(|a| Ok(Arg::new(norm.nf(&a.term)?, a.explicit)))
                .collect();
            let reduced = match reduced {
                Ok(reduced) => reduced,
                Err(err) => {
                    unchecked(ix, &face, &err);
                    continue;
                }
            };
            if reduced
                .iter()
                .zip(&at_face)
                .all(|(r, a)| alpha_eq(&r.term, &a.term))
            {
                continue;
            }
            let lhs = body.subst(&s);
            trace!(target: "confluence", "clause {} at {}", ix + 1, face);
            match norm.try_unfold_clauses(&reduced, &matchings, overlap, 0) {
                Some(rhs) if unifier.compare(&lhs, &rhs) => {}
                _ if norm.exhausted() => {
                    let err = ReduceError::FuelExhausted {
                        steps: norm.budget(),
                    };
                    unchecked(ix, &face, &err);
                }
                rhs => {
                    debug!(
                        target: "confluence",
                        "clause {} breaks its condition at {}",
                        ix + 1,
                        face
                    );
                    problems.push(ClausesProblem::Conditions {
                        pos: clause.pos,
                        nth: ix + 1,
                        face,
                        lhs,
                        rhs,
                    });
                }
            }
        }
    }
    problems
}

fn unchecked(ix: usize, face: &str, err: &ReduceError) {
    debug!(
        target: "confluence",
        "condition {} of clause {} not checked: {}",
        face,
        ix + 1,
        err
    );
}

/// Interval variables bound directly under a constructor that has a
/// boundary, in pattern order.
fn boundary_dims(env: &Env, pats: &[Arg<Rc<Pat>>]) -> Vec<LocalVar> {
    let mut out = Vec::new();
    for pat in pats {
        collect_dims(env, &pat.term, &mut out);
    }
    out
}

fn collect_dims(env: &Env, pat: &Pat, out: &mut Vec<LocalVar>) {
    match pat {
        Pat::Con { head, args } => {
            if env.get_con(&head.con).is_some_and(|con| con.has_boundary()) {
                for arg in args {
                    if let Pat::Bind { var, ty } = arg.term.as_ref() {
                        if matches!(ty.as_ref(), Term::Interval) && !out.contains(var) {
                            out.push(var.clone());
                        }
                    }
                }
            }
            for arg in args {
                collect_dims(env, &arg.term, out);
            }
        }
        Pat::Tuple(a, b) => {
            collect_dims(env, a, out);
            collect_dims(env, b, out);
        }
        _ => {}
    }
}

/// Bit `k` of `mask` picks the endpoint of `dims[k]`.
fn endpoints(dims: &[LocalVar], mask: u32) -> (Subst, String) {
    let mut s = Subst::new();
    let mut conds = Vec::new();
    for (bit, dim) in dims.iter().enumerate() {
        let end = if mask & (1 << bit) == 0 {
            DimEnd::I0
        } else {
            DimEnd::I1
        };
        s.add(dim.clone(), Term::dim(end));
        conds.push(format!("{} = {}", dim, end));
    }
    (s, conds.join(" ∧ "))
}
