use crate::ast::{Args, ConHead, Face, IntLit, LocalVar, Partial, Restr, Term};
use crate::reduce::Normalizer;
use std::rc::Rc;

/// Syntactic equality up to renaming of bound variables.
pub fn alpha_eq(a: &Rc<Term>, b: &Rc<Term>) -> bool {
    Conv::new(None).term(a, b)
}

/// Definitional equality: compares weak head normal forms structurally, with
/// eta for functions and pairs and literals unfolded to constructors on demand.
pub fn is_def_eq(norm: &Normalizer, a: &Rc<Term>, b: &Rc<Term>) -> bool {
    Conv::new(Some(norm)).term(a, b)
}

struct Conv<'n, 'a> {
    norm: Option<&'n Normalizer<'a>>,
    /// Pairs of binders entered together, innermost last.
    scope: Vec<(LocalVar, LocalVar)>,
}

impl<'n, 'a> Conv<'n, 'a> {
    fn new(norm: Option<&'n Normalizer<'a>>) -> Self {
        Conv {
            norm,
            scope: Vec::new(),
        }
    }

    fn var(&self, x: &LocalVar, y: &LocalVar) -> bool {
        for (l, r) in self.scope.iter().rev() {
            if l == x || r == y {
                return l == x && r == y;
            }
        }
        x == y
    }

    fn bind(&mut self, x: &LocalVar, y: &LocalVar, f: impl FnOnce(&mut Self) -> bool) -> bool {
        self.scope.push((x.clone(), y.clone()));
        let out = f(self);
        self.scope.pop();
        out
    }

    fn args(&mut self, a: &Args, b: &Args) -> bool {
        a.len() == b.len()
            && a.iter()
                .zip(b)
                .all(|(x, y)| x.explicit == y.explicit && self.term(&x.term, &y.term))
    }

    fn face(&mut self, a: &Face, b: &Face) -> bool {
        a.conds.len() == b.conds.len()
            && a.conds
                .iter()
                .zip(&b.conds)
                .all(|((d1, e1), (d2, e2))| e1 == e2 && self.term(d1, d2))
    }

    fn restr(&mut self, a: &Restr, b: &Restr) -> bool {
        a.faces.len() == b.faces.len()
            && a.faces.iter().zip(&b.faces).all(|(x, y)| self.face(x, y))
    }

    fn partial(&mut self, a: &Partial, b: &Partial) -> bool {
        match (a, b) {
            (Partial::Const(x), Partial::Const(y)) => self.term(x, y),
            (Partial::Split(xs), Partial::Split(ys)) => {
                xs.len() == ys.len()
                    && xs
                        .iter()
                        .zip(ys)
                        .all(|((f1, t1), (f2, t2))| self.face(f1, f2) && self.term(t1, t2))
            }
            _ => false,
        }
    }

    /// Peels one constructor off the literal by hand: going through `whnf`
    /// would fold `suc` of a literal straight back.
    fn literal(&mut self, lit: &IntLit, head: &ConHead, args: &Args) -> bool {
        if head.data != lit.shape.data {
            return false;
        }
        match args.as_slice() {
            [] => lit.value == 0 && head.con == lit.shape.zero,
            [pred] if lit.value > 0 && head.con == lit.shape.suc => {
                self.term(&Term::int(lit.with_value(lit.value - 1)), &pred.term)
            }
            _ => false,
        }
    }

    fn term(&mut self, a: &Rc<Term>, b: &Rc<Term>) -> bool {
        if Rc::ptr_eq(a, b) && self.scope.is_empty() {
            return true;
        }
        let (a, b) = match self.norm {
            Some(norm) => (norm.whnf(a), norm.whnf(b)),
            None => (a.clone(), b.clone()),
        };
        let eta = self.norm.is_some();
        match (a.as_ref(), b.as_ref()) {
            (Term::Var(x), Term::Var(y)) => self.var(x, y),
            (Term::Lam(x, bx), Term::Lam(y, by)) => self.bind(x, y, |c| c.term(bx, by)),
            (Term::Lam(x, bx), _) if eta => {
                let applied = Term::app(b.clone(), Term::var(x));
                self.term(bx, &applied)
            }
            (_, Term::Lam(y, by)) if eta => {
                let applied = Term::app(a.clone(), Term::var(y));
                self.term(&applied, by)
            }
            (Term::Pi(p, b1), Term::Pi(q, b2)) | (Term::Sigma(p, b1), Term::Sigma(q, b2)) => {
                p.explicit == q.explicit
                    && self.term(&p.ty, &q.ty)
                    && self.bind(&p.var, &q.var, |c| c.term(b1, b2))
            }
            (Term::Tup(a1, b1), Term::Tup(a2, b2)) => self.term(a1, a2) && self.term(b1, b2),
            (Term::Tup(a1, b1), _) if eta => {
                self.term(a1, &Term::proj(b.clone(), 0)) && self.term(b1, &Term::proj(b.clone(), 1))
            }
            (_, Term::Tup(a2, b2)) if eta => {
                self.term(&Term::proj(a.clone(), 0), a2) && self.term(&Term::proj(a.clone(), 1), b2)
            }
            (Term::Proj(t1, i), Term::Proj(t2, j)) => i == j && self.term(t1, t2),
            (Term::App(f1, a1), Term::App(f2, a2)) => self.term(f1, f2) && self.term(a1, a2),
            (Term::Sort(s1), Term::Sort(s2)) => s1 == s2,
            (
                Term::DataCall {
                    name: n1,
                    ulift: l1,
                    args: a1,
                },
                Term::DataCall {
                    name: n2,
                    ulift: l2,
                    args: a2,
                },
            )
            | (
                Term::FnCall {
                    name: n1,
                    ulift: l1,
                    args: a1,
                },
                Term::FnCall {
                    name: n2,
                    ulift: l2,
                    args: a2,
                },
            ) => n1 == n2 && l1 == l2 && self.args(a1, a2),
            (
                Term::PrimCall {
                    prim: p1, args: a1, ..
                },
                Term::PrimCall {
                    prim: p2, args: a2, ..
                },
            ) => p1 == p2 && self.args(a1, a2),
            (Term::ConCall { head: h1, args: a1 }, Term::ConCall { head: h2, args: a2 }) => {
                h1.same_con(h2) && self.args(a1, a2)
            }
            (Term::Int(l1), Term::Int(l2)) => l1.value == l2.value && l1.shape.data == l2.shape.data,
            (Term::Int(lit), Term::ConCall { head, args }) | (Term::ConCall { head, args }, Term::Int(lit)) => {
                self.literal(lit, head, args)
            }
            (
                Term::Meta {
                    id: m1, args: a1, ..
                },
                Term::Meta {
                    id: m2, args: a2, ..
                },
            ) => m1 == m2 && self.args(a1, a2),
            (Term::Let(x, v1, b1), Term::Let(y, v2, b2)) => {
                self.term(v1, v2) && self.bind(x, y, |c| c.term(b1, b2))
            }
            (Term::Error(m1), Term::Error(m2)) => m1 == m2,
            (Term::Interval, Term::Interval) => true,
            (Term::Dim(e1), Term::Dim(e2)) => e1 == e2,
            (
                Term::Path {
                    var: i,
                    ty: t1,
                    a: a1,
                    b: b1,
                },
                Term::Path {
                    var: j,
                    ty: t2,
                    a: a2,
                    b: b2,
                },
            ) => self.term(a1, a2) && self.term(b1, b2) && self.bind(i, j, |c| c.term(t1, t2)),
            (Term::PLam(i, b1), Term::PLam(j, b2)) => self.bind(i, j, |c| c.term(b1, b2)),
            (Term::PApp { fun: f1, arg: r1, .. }, Term::PApp { fun: f2, arg: r2, .. }) => {
                self.term(f1, f2) && self.term(r1, r2)
            }
            (Term::PartialTy(t1, r1), Term::PartialTy(t2, r2)) => {
                self.restr(r1, r2) && self.term(t1, t2)
            }
            (Term::Partial(p1), Term::Partial(p2)) => self.partial(p1, p2),
            (Term::InS(r1, t1), Term::InS(r2, t2)) => self.restr(r1, r2) && self.term(t1, t2),
            (Term::OutS(t1, _), Term::OutS(t2, _)) => self.term(t1, t2),
            (
                Term::Coe {
                    var: i,
                    ty: t1,
                    r: r1,
                    s: s1,
                },
                Term::Coe {
                    var: j,
                    ty: t2,
                    r: r2,
                    s: s2,
                },
            ) => self.term(r1, r2) && self.term(s1, s2) && self.bind(i, j, |c| c.term(t1, t2)),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Env;
    use crate::meta::MetaStore;
    use crate::test_support::*;

    #[test]
    fn alpha_equivalent_lambdas() {
        let x = LocalVar::new("x");
        let y = LocalVar::new("y");
        let a = Term::lam(x.clone(), Term::var(&x));
        let b = Term::lam(y.clone(), Term::var(&y));
        assert!(alpha_eq(&a, &b));
        let free = Term::lam(y.clone(), Term::var(&x));
        assert!(!alpha_eq(&a, &free));
    }

    #[test]
    fn shadowing_is_respected() {
        let x = LocalVar::new("x");
        let y = LocalVar::new("y");
        // λ x. λ y. x  vs  λ y. λ x. x
        let a = Term::lam(x.clone(), Term::lam(y.clone(), Term::var(&x)));
        let b = Term::lam(y.clone(), Term::lam(x.clone(), Term::var(&x)));
        assert!(!alpha_eq(&a, &b));
    }

    #[test]
    fn def_eq_unfolds_and_eta_expands() {
        let mut env = Env::new();
        add_nat(&mut env);
        add_add(&mut env);
        let metas = MetaStore::new();
        let norm = Normalizer::new(&env, &metas);
        assert!(is_def_eq(&norm, &add_call(nat_lit(1), nat_lit(1)), &nat_lit(2)));
        assert!(is_def_eq(&norm, &int(2), &nat_lit(2)));
        let f = LocalVar::new("f");
        let x = LocalVar::new("x");
        let expanded = Term::lam(x.clone(), Term::app(Term::var(&f), Term::var(&x)));
        assert!(is_def_eq(&norm, &expanded, &Term::var(&f)));
        assert!(!is_def_eq(&norm, &zero(), &suc(zero())));
    }
}
