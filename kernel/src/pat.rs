use crate::ast::{Arg, ConHead, IntLit, LocalVar, Term};
use crate::span::Span;
use crate::subst::Subst;
use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatError {
    #[error("meta pattern `{0}` is already solved")]
    AlreadySolved(LocalVar),
}

/// Patterns: the introduction forms of `Term` that may appear on a clause's
/// left-hand side.
#[derive(Debug, Clone)]
pub enum Pat {
    /// Catch-all, binding `var`.
    Bind { var: LocalVar, ty: Rc<Term> },
    Absurd,
    Tuple(Rc<Pat>, Rc<Pat>),
    Con {
        head: ConHead,
        args: Vec<Arg<Rc<Pat>>>,
    },
    ShapedInt(IntLit),
    Meta(Rc<MetaPat>),
}

/// A pattern still being inferred. Solved at most once; while unsolved it
/// behaves as a bind of `fake`.
#[derive(Debug)]
pub struct MetaPat {
    pub fake: LocalVar,
    pub ty: Rc<Term>,
    solution: OnceCell<Rc<Pat>>,
}

impl MetaPat {
    pub fn new(fake: LocalVar, ty: Rc<Term>) -> Self {
        MetaPat {
            fake,
            ty,
            solution: OnceCell::new(),
        }
    }

    pub fn solve(&self, pat: Rc<Pat>) -> Result<(), PatError> {
        self.solution
            .set(pat)
            .map_err(|_| PatError::AlreadySolved(self.fake.clone()))
    }

    pub fn solution(&self) -> Option<&Rc<Pat>> {
        self.solution.get()
    }
}

impl Pat {
    pub fn bind(var: LocalVar, ty: Rc<Term>) -> Rc<Self> {
        Rc::new(Pat::Bind { var, ty })
    }

    pub fn con(head: ConHead, args: Vec<Arg<Rc<Pat>>>) -> Rc<Self> {
        Rc::new(Pat::Con { head, args })
    }

    pub fn tuple(a: Rc<Pat>, b: Rc<Pat>) -> Rc<Self> {
        Rc::new(Pat::Tuple(a, b))
    }

    pub fn int(lit: IntLit) -> Rc<Self> {
        Rc::new(Pat::ShapedInt(lit))
    }

    pub fn absurd() -> Rc<Self> {
        Rc::new(Pat::Absurd)
    }

    pub fn meta(meta: MetaPat) -> Rc<Self> {
        Rc::new(Pat::Meta(Rc::new(meta)))
    }

    /// Rewrites term children with `f` and pattern children with `g`,
    /// returning `self` when nothing changed.
    pub fn descent(
        self: &Rc<Self>,
        mut f: impl FnMut(&Rc<Term>) -> Rc<Term>,
        mut g: impl FnMut(&Rc<Pat>) -> Rc<Pat>,
    ) -> Rc<Pat> {
        match self.as_ref() {
            Pat::Absurd | Pat::ShapedInt(_) | Pat::Meta(_) => self.clone(),
            Pat::Bind { var, ty } => {
                let ty2 = f(ty);
                if Rc::ptr_eq(&ty2, ty) {
                    self.clone()
                } else {
                    Pat::bind(var.clone(), ty2)
                }
            }
            Pat::Tuple(a, b) => {
                let (a2, b2) = (g(a), g(b));
                if Rc::ptr_eq(&a2, a) && Rc::ptr_eq(&b2, b) {
                    self.clone()
                } else {
                    Pat::tuple(a2, b2)
                }
            }
            Pat::Con { head, args } => {
                let mut changed = false;
                let data_args = head
                    .data_args
                    .iter()
                    .map(|a| {
                        let t = f(&a.term);
                        changed |= !Rc::ptr_eq(&t, &a.term);
                        Arg::new(t, a.explicit)
                    })
                    .collect();
                let args = args
                    .iter()
                    .map(|a| {
                        let p = g(&a.term);
                        changed |= !Rc::ptr_eq(&p, &a.term);
                        Arg::new(p, a.explicit)
                    })
                    .collect();
                if !changed {
                    return self.clone();
                }
                let head = ConHead {
                    data: head.data.clone(),
                    con: head.con.clone(),
                    ulift: head.ulift,
                    data_args,
                };
                Pat::con(head, args)
            }
        }
    }

    /// Replaces solved meta patterns by their solutions and unsolved ones by
    /// a bind of their fallback variable.
    pub fn inline(self: &Rc<Self>) -> Rc<Pat> {
        match self.as_ref() {
            Pat::Meta(meta) => match meta.solution() {
                Some(sol) => sol.inline(),
                None => Pat::bind(meta.fake.clone(), meta.ty.clone()),
            },
            _ => self.descent(|t| t.clone(), |p| p.inline()),
        }
    }

    pub fn subst(self: &Rc<Self>, s: &Subst) -> Rc<Pat> {
        if s.is_empty() {
            return self.clone();
        }
        self.descent(|t| t.subst(s), |p| p.subst(s))
    }

    pub fn to_term(&self) -> Rc<Term> {
        match self {
            Pat::Bind { var, .. } => Term::var(var),
            Pat::Absurd => Term::error("absurd pattern"),
            Pat::Tuple(a, b) => Term::tup(a.to_term(), b.to_term()),
            Pat::Con { head, args } => Term::con(
                head.clone(),
                args.iter().map(|a| a.map(|p| p.to_term())).collect(),
            ),
            Pat::ShapedInt(lit) => Term::int(lit.clone()),
            Pat::Meta(meta) => match meta.solution() {
                Some(sol) => sol.to_term(),
                None => Term::var(&meta.fake),
            },
        }
    }

    /// `0` is `zero`, `n + 1` is `suc n`; other patterns are returned as is.
    pub fn constructor_form(self: &Rc<Self>) -> Rc<Pat> {
        match self.as_ref() {
            Pat::ShapedInt(lit) if lit.value == 0 => Pat::con(lit.zero_head(), Vec::new()),
            Pat::ShapedInt(lit) => Pat::con(
                lit.suc_head(),
                vec![Arg::ex(Pat::int(lit.with_value(lit.value - 1)))],
            ),
            _ => self.clone(),
        }
    }

    pub fn is_catch_all(&self) -> bool {
        match self {
            Pat::Bind { .. } => true,
            Pat::Meta(meta) => match meta.solution() {
                Some(sol) => sol.is_catch_all(),
                None => true,
            },
            _ => false,
        }
    }

    /// Bound variables in left-to-right order.
    pub fn binds(&self) -> Vec<LocalVar> {
        self.binds_with_types().into_iter().map(|(v, _)| v).collect()
    }

    pub fn binds_with_types(&self) -> Vec<(LocalVar, Rc<Term>)> {
        let mut out = Vec::new();
        self.collect_typed_binds(&mut out);
        out
    }

    fn collect_typed_binds(&self, out: &mut Vec<(LocalVar, Rc<Term>)>) {
        match self {
            Pat::Bind { var, ty } => out.push((var.clone(), ty.clone())),
            Pat::Absurd | Pat::ShapedInt(_) => {}
            Pat::Tuple(a, b) => {
                a.collect_typed_binds(out);
                b.collect_typed_binds(out);
            }
            Pat::Con { args, .. } => args.iter().for_each(|a| a.term.collect_typed_binds(out)),
            Pat::Meta(meta) => match meta.solution() {
                Some(sol) => sol.collect_typed_binds(out),
                None => out.push((meta.fake.clone(), meta.ty.clone())),
            },
        }
    }

    pub fn has_absurd(&self) -> bool {
        match self {
            Pat::Absurd => true,
            Pat::Bind { .. } | Pat::ShapedInt(_) => false,
            Pat::Tuple(a, b) => a.has_absurd() || b.has_absurd(),
            Pat::Con { args, .. } => args.iter().any(|a| a.term.has_absurd()),
            Pat::Meta(meta) => meta.solution().is_some_and(|sol| sol.has_absurd()),
        }
    }
}

fn fmt_pat(f: &mut fmt::Formatter<'_>, pat: &Pat, nested: bool) -> fmt::Result {
    match pat {
        Pat::Bind { var, .. } => write!(f, "{}", var),
        Pat::Absurd => write!(f, "()"),
        Pat::Tuple(a, b) => {
            write!(f, "(")?;
            fmt_pat(f, a, false)?;
            write!(f, ", ")?;
            fmt_pat(f, b, false)?;
            write!(f, ")")
        }
        Pat::Con { head, args } => {
            let parens = nested && !args.is_empty();
            if parens {
                write!(f, "(")?;
            }
            write!(f, "{}", head.con)?;
            for arg in args {
                if arg.explicit {
                    write!(f, " ")?;
                    fmt_pat(f, &arg.term, true)?;
                } else {
                    write!(f, " {{")?;
                    fmt_pat(f, &arg.term, false)?;
                    write!(f, "}}")?;
                }
            }
            if parens {
                write!(f, ")")?;
            }
            Ok(())
        }
        Pat::ShapedInt(lit) => write!(f, "{}", lit.value),
        Pat::Meta(meta) => match meta.solution() {
            Some(sol) => fmt_pat(f, sol, nested),
            None => write!(f, "?{}", meta.fake),
        },
    }
}

impl fmt::Display for Pat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_pat(f, self, false)
    }
}

/// Renders a clause's left-hand side, separating positions by commas.
pub fn display_pats(pats: &[Arg<Rc<Pat>>]) -> String {
    pats.iter()
        .map(|a| {
            if a.explicit {
                a.term.to_string()
            } else {
                format!("{{{}}}", a.term)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// Compiled clauses
// =============================================================================

/// A clause after elaboration: inlined patterns and a body over their binds.
#[derive(Debug, Clone)]
pub struct Matching {
    pub pos: Span,
    pub patterns: Vec<Arg<Rc<Pat>>>,
    pub bind_count: usize,
    pub body: Rc<Term>,
}

impl Matching {
    pub fn new(pos: Span, patterns: Vec<Arg<Rc<Pat>>>, body: Rc<Term>) -> Self {
        let patterns: Vec<_> = patterns.iter().map(|a| a.map(|p| p.inline())).collect();
        let bind_count = patterns.iter().map(|a| a.term.binds().len()).sum();
        Matching {
            pos,
            patterns,
            bind_count,
            body,
        }
    }
}
