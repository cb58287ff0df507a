use crate::meta::MetaId;
use std::convert::Infallible;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

pub type Name = Rc<str>;

// =============================================================================
// Variables, arguments and telescopes
// =============================================================================

static NEXT_VAR_ID: AtomicU64 = AtomicU64::new(1);

/// A locally bound variable. Identity is the `id`; the name is only for display.
#[derive(Clone)]
pub struct LocalVar {
    name: Rc<str>,
    id: u64,
}

impl LocalVar {
    pub fn new(name: &str) -> Self {
        LocalVar {
            name: Rc::from(name),
            id: NEXT_VAR_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// A distinct variable with the same display name.
    pub fn fresh(&self) -> Self {
        LocalVar {
            name: self.name.clone(),
            id: NEXT_VAR_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl PartialEq for LocalVar {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for LocalVar {}

impl Hash for LocalVar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for LocalVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}

impl fmt::Display for LocalVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Something paired with its explicitness, e.g. an argument or a pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg<T> {
    pub term: T,
    pub explicit: bool,
}

impl<T> Arg<T> {
    pub fn new(term: T, explicit: bool) -> Self {
        Arg { term, explicit }
    }

    pub fn ex(term: T) -> Self {
        Arg::new(term, true)
    }

    pub fn im(term: T) -> Self {
        Arg::new(term, false)
    }

    pub fn map<U>(&self, f: impl FnOnce(&T) -> U) -> Arg<U> {
        Arg::new(f(&self.term), self.explicit)
    }
}

pub type Args = Vec<Arg<Rc<Term>>>;

/// A binder in a telescope. `ty` may mention the variables of earlier params.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub var: LocalVar,
    pub ty: Rc<Term>,
    pub explicit: bool,
}

impl Param {
    pub fn new(var: LocalVar, ty: Rc<Term>, explicit: bool) -> Self {
        Param { var, ty, explicit }
    }

    pub fn ex(name: &str, ty: Rc<Term>) -> Self {
        Param::new(LocalVar::new(name), ty, true)
    }

    pub fn im(name: &str, ty: Rc<Term>) -> Self {
        Param::new(LocalVar::new(name), ty, false)
    }

    pub fn to_term(&self) -> Rc<Term> {
        Term::var(&self.var)
    }

    pub fn to_arg(&self) -> Arg<Rc<Term>> {
        Arg::new(self.to_term(), self.explicit)
    }
}

pub type Telescope = Vec<Param>;

// =============================================================================
// Universes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortKind {
    Type,
    Set,
    Prop,
    ISet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sort {
    pub kind: SortKind,
    pub level: u32,
}

impl Sort {
    pub fn type_(level: u32) -> Self {
        Sort {
            kind: SortKind::Type,
            level,
        }
    }

    pub fn set(level: u32) -> Self {
        Sort {
            kind: SortKind::Set,
            level,
        }
    }

    pub const PROP: Sort = Sort {
        kind: SortKind::Prop,
        level: 0,
    };

    pub const ISET: Sort = Sort {
        kind: SortKind::ISet,
        level: 0,
    };

    /// Prop and ISet are not stratified, so lifting leaves them alone.
    pub fn lift(self, n: u32) -> Self {
        match self.kind {
            SortKind::Type | SortKind::Set => Sort {
                kind: self.kind,
                level: self.level.saturating_add(n),
            },
            SortKind::Prop | SortKind::ISet => self,
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SortKind::Type => write!(f, "Type {}", self.level),
            SortKind::Set => write!(f, "Set {}", self.level),
            SortKind::Prop => write!(f, "Prop"),
            SortKind::ISet => write!(f, "ISet"),
        }
    }
}

// =============================================================================
// Cubical structure: endpoints, faces, partial elements
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DimEnd {
    I0,
    I1,
}

impl DimEnd {
    pub fn flip(self) -> Self {
        match self {
            DimEnd::I0 => DimEnd::I1,
            DimEnd::I1 => DimEnd::I0,
        }
    }
}

impl fmt::Display for DimEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimEnd::I0 => write!(f, "0"),
            DimEnd::I1 => write!(f, "1"),
        }
    }
}

/// A conjunction of `r = ε` constraints. The empty face is always satisfied.
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    pub conds: Vec<(Rc<Term>, DimEnd)>,
}

impl Face {
    pub fn top() -> Self {
        Face { conds: Vec::new() }
    }

    pub fn eq(dim: Rc<Term>, end: DimEnd) -> Self {
        Face {
            conds: vec![(dim, end)],
        }
    }

    pub fn and(mut self, dim: Rc<Term>, end: DimEnd) -> Self {
        self.conds.push((dim, end));
        self
    }

    pub fn is_top(&self) -> bool {
        self.conds.is_empty()
    }
}

/// A disjunction of faces. The empty restriction is never satisfied.
#[derive(Debug, Clone, PartialEq)]
pub struct Restr {
    pub faces: Vec<Face>,
}

impl Restr {
    pub fn bottom() -> Self {
        Restr { faces: Vec::new() }
    }

    pub fn is_top(&self) -> bool {
        self.faces.iter().any(Face::is_top)
    }
}

/// A partial element: a system of terms on faces, or a total constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Partial {
    Split(Vec<(Face, Rc<Term>)>),
    Const(Rc<Term>),
}

impl Partial {
    pub fn restr(&self) -> Restr {
        match self {
            Partial::Split(clauses) => Restr {
                faces: clauses.iter().map(|(face, _)| face.clone()).collect(),
            },
            Partial::Const(_) => Restr {
                faces: vec![Face::top()],
            },
        }
    }
}

// =============================================================================
// Literals and call heads
// =============================================================================

/// The unary data type an integer literal stands for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IntShape {
    pub data: Name,
    pub zero: Name,
    pub suc: Name,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IntLit {
    pub value: u64,
    pub shape: Rc<IntShape>,
}

impl IntLit {
    pub fn new(value: u64, shape: Rc<IntShape>) -> Self {
        IntLit { value, shape }
    }

    pub fn with_value(&self, value: u64) -> Self {
        IntLit::new(value, self.shape.clone())
    }

    pub fn zero_head(&self) -> ConHead {
        ConHead::new(self.shape.data.clone(), self.shape.zero.clone(), Vec::new())
    }

    pub fn suc_head(&self) -> ConHead {
        ConHead::new(self.shape.data.clone(), self.shape.suc.clone(), Vec::new())
    }

    /// Peels one constructor off the literal: `0` is `zero`, `n + 1` is `suc n`.
    pub fn constructor_form(&self) -> Rc<Term> {
        if self.value == 0 {
            Term::con(self.zero_head(), Vec::new())
        } else {
            Term::con(
                self.suc_head(),
                vec![Arg::ex(Term::int(self.with_value(self.value - 1)))],
            )
        }
    }
}

/// Constructor reference together with the arguments of its data type.
#[derive(Debug, Clone, PartialEq)]
pub struct ConHead {
    pub data: Name,
    pub con: Name,
    pub ulift: u32,
    pub data_args: Args,
}

impl ConHead {
    pub fn new(data: Name, con: Name, data_args: Args) -> Self {
        ConHead {
            data,
            con,
            ulift: 0,
            data_args,
        }
    }

    pub fn same_con(&self, other: &ConHead) -> bool {
        self.data == other.data && self.con == other.con
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prim {
    IntervalInv,
    IntervalMin,
    IntervalMax,
}

impl Prim {
    pub fn arity(self) -> usize {
        match self {
            Prim::IntervalInv => 1,
            Prim::IntervalMin | Prim::IntervalMax => 2,
        }
    }
}

// =============================================================================
// Terms
// =============================================================================

/// Checked terms. Nodes are shared through `Rc` and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Var(LocalVar),
    App(Rc<Term>, Rc<Term>),
    /// Projection out of a binary sigma: 0 or 1.
    Proj(Rc<Term>, usize),
    Lam(LocalVar, Rc<Term>),
    Pi(Param, Rc<Term>),
    Sigma(Param, Rc<Term>),
    Tup(Rc<Term>, Rc<Term>),
    Sort(Sort),
    DataCall {
        name: Name,
        ulift: u32,
        args: Args,
    },
    ConCall {
        head: ConHead,
        args: Args,
    },
    FnCall {
        name: Name,
        ulift: u32,
        args: Args,
    },
    PrimCall {
        prim: Prim,
        ulift: u32,
        args: Args,
    },
    /// A hole; `args` instantiate the meta's context.
    Meta {
        id: MetaId,
        ulift: u32,
        args: Args,
    },
    Let(LocalVar, Rc<Term>, Rc<Term>),
    Error(Rc<str>),
    Int(IntLit),
    Interval,
    Dim(DimEnd),
    Path {
        var: LocalVar,
        ty: Rc<Term>,
        a: Rc<Term>,
        b: Rc<Term>,
    },
    PLam(LocalVar, Rc<Term>),
    /// Path application, carrying the endpoints of the path type.
    PApp {
        fun: Rc<Term>,
        arg: Rc<Term>,
        a: Rc<Term>,
        b: Rc<Term>,
    },
    PartialTy(Rc<Term>, Restr),
    Partial(Partial),
    InS(Restr, Rc<Term>),
    OutS(Rc<Term>, Partial),
    /// `coe^{r→s}_{var. ty}`, a function from `ty[r/var]` to `ty[s/var]`.
    Coe {
        var: LocalVar,
        ty: Rc<Term>,
        r: Rc<Term>,
        s: Rc<Term>,
    },
}

impl Term {
    pub fn var(v: &LocalVar) -> Rc<Self> {
        Rc::new(Term::Var(v.clone()))
    }

    pub fn app(f: Rc<Term>, a: Rc<Term>) -> Rc<Self> {
        Rc::new(Term::App(f, a))
    }

    pub fn apps(f: Rc<Term>, args: impl IntoIterator<Item = Rc<Term>>) -> Rc<Self> {
        args.into_iter().fold(f, Term::app)
    }

    pub fn proj(t: Rc<Term>, ix: usize) -> Rc<Self> {
        Rc::new(Term::Proj(t, ix))
    }

    pub fn lam(v: LocalVar, body: Rc<Term>) -> Rc<Self> {
        Rc::new(Term::Lam(v, body))
    }

    pub fn pi(param: Param, body: Rc<Term>) -> Rc<Self> {
        Rc::new(Term::Pi(param, body))
    }

    /// Non-dependent function type.
    pub fn arrow(dom: Rc<Term>, cod: Rc<Term>) -> Rc<Self> {
        Term::pi(Param::ex("_", dom), cod)
    }

    pub fn sigma(param: Param, body: Rc<Term>) -> Rc<Self> {
        Rc::new(Term::Sigma(param, body))
    }

    pub fn tup(a: Rc<Term>, b: Rc<Term>) -> Rc<Self> {
        Rc::new(Term::Tup(a, b))
    }

    pub fn sort(s: Sort) -> Rc<Self> {
        Rc::new(Term::Sort(s))
    }

    pub fn data(name: &str, args: Args) -> Rc<Self> {
        Rc::new(Term::DataCall {
            name: Rc::from(name),
            ulift: 0,
            args,
        })
    }

    pub fn con(head: ConHead, args: Args) -> Rc<Self> {
        Rc::new(Term::ConCall { head, args })
    }

    pub fn fn_call(name: &str, args: Args) -> Rc<Self> {
        Rc::new(Term::FnCall {
            name: Rc::from(name),
            ulift: 0,
            args,
        })
    }

    pub fn prim(prim: Prim, args: Args) -> Rc<Self> {
        Rc::new(Term::PrimCall {
            prim,
            ulift: 0,
            args,
        })
    }

    pub fn meta(id: MetaId, args: Args) -> Rc<Self> {
        Rc::new(Term::Meta { id, ulift: 0, args })
    }

    pub fn let_(v: LocalVar, val: Rc<Term>, body: Rc<Term>) -> Rc<Self> {
        Rc::new(Term::Let(v, val, body))
    }

    pub fn error(msg: &str) -> Rc<Self> {
        Rc::new(Term::Error(Rc::from(msg)))
    }

    pub fn int(lit: IntLit) -> Rc<Self> {
        Rc::new(Term::Int(lit))
    }

    pub fn interval() -> Rc<Self> {
        Rc::new(Term::Interval)
    }

    pub fn dim(end: DimEnd) -> Rc<Self> {
        Rc::new(Term::Dim(end))
    }

    pub fn path(var: LocalVar, ty: Rc<Term>, a: Rc<Term>, b: Rc<Term>) -> Rc<Self> {
        Rc::new(Term::Path { var, ty, a, b })
    }

    pub fn plam(var: LocalVar, body: Rc<Term>) -> Rc<Self> {
        Rc::new(Term::PLam(var, body))
    }

    pub fn papp(fun: Rc<Term>, arg: Rc<Term>, a: Rc<Term>, b: Rc<Term>) -> Rc<Self> {
        Rc::new(Term::PApp { fun, arg, a, b })
    }

    pub fn coe(var: LocalVar, ty: Rc<Term>, r: Rc<Term>, s: Rc<Term>) -> Rc<Self> {
        Rc::new(Term::Coe { var, ty, r, s })
    }

    pub fn as_var(&self) -> Option<&LocalVar> {
        match self {
            Term::Var(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_dim(&self) -> Option<DimEnd> {
        match self {
            Term::Dim(e) => Some(*e),
            _ => None,
        }
    }

    /// The variable a binder node introduces, if any.
    pub fn binder(&self) -> Option<&LocalVar> {
        match self {
            Term::Lam(v, _) | Term::Let(v, _, _) | Term::PLam(v, _) => Some(v),
            Term::Pi(p, _) | Term::Sigma(p, _) => Some(&p.var),
            Term::Path { var, .. } | Term::Coe { var, .. } => Some(var),
            _ => None,
        }
    }

    /// Rewrites the immediate children with `f`. When every child comes back
    /// pointer-identical the original `Rc` is returned and nothing is allocated.
    pub fn descent(self: &Rc<Self>, mut f: impl FnMut(&Rc<Term>) -> Rc<Term>) -> Rc<Term> {
        match self.try_descent::<Infallible, _>(&mut |t| Ok(f(t))) {
            Ok(t) => t,
            Err(never) => match never {},
        }
    }

    /// Fallible `descent`: the first error aborts the rewrite.
    pub fn try_descent<E, F>(self: &Rc<Self>, f: &mut F) -> Result<Rc<Term>, E>
    where
        F: FnMut(&Rc<Term>) -> Result<Rc<Term>, E>,
    {
        let mut rb = Rebuild { f, changed: false };
        let node = match self.as_ref() {
            Term::Var(_)
            | Term::Sort(_)
            | Term::Error(_)
            | Term::Int(_)
            | Term::Interval
            | Term::Dim(_) => return Ok(self.clone()),
            Term::App(fun, arg) => Term::App(rb.term(fun)?, rb.term(arg)?),
            Term::Proj(t, ix) => Term::Proj(rb.term(t)?, *ix),
            Term::Lam(v, body) => Term::Lam(v.clone(), rb.term(body)?),
            Term::Pi(p, body) => Term::Pi(rb.param(p)?, rb.term(body)?),
            Term::Sigma(p, body) => Term::Sigma(rb.param(p)?, rb.term(body)?),
            Term::Tup(a, b) => Term::Tup(rb.term(a)?, rb.term(b)?),
            Term::DataCall { name, ulift, args } => Term::DataCall {
                name: name.clone(),
                ulift: *ulift,
                args: rb.args(args)?,
            },
            Term::ConCall { head, args } => Term::ConCall {
                head: ConHead {
                    data: head.data.clone(),
                    con: head.con.clone(),
                    ulift: head.ulift,
                    data_args: rb.args(&head.data_args)?,
                },
                args: rb.args(args)?,
            },
            Term::FnCall { name, ulift, args } => Term::FnCall {
                name: name.clone(),
                ulift: *ulift,
                args: rb.args(args)?,
            },
            Term::PrimCall { prim, ulift, args } => Term::PrimCall {
                prim: *prim,
                ulift: *ulift,
                args: rb.args(args)?,
            },
            Term::Meta { id, ulift, args } => Term::Meta {
                id: *id,
                ulift: *ulift,
                args: rb.args(args)?,
            },
            Term::Let(v, val, body) => Term::Let(v.clone(), rb.term(val)?, rb.term(body)?),
            Term::Path { var, ty, a, b } => Term::Path {
                var: var.clone(),
                ty: rb.term(ty)?,
                a: rb.term(a)?,
                b: rb.term(b)?,
            },
            Term::PLam(v, body) => Term::PLam(v.clone(), rb.term(body)?),
            Term::PApp { fun, arg, a, b } => Term::PApp {
                fun: rb.term(fun)?,
                arg: rb.term(arg)?,
                a: rb.term(a)?,
                b: rb.term(b)?,
            },
            Term::PartialTy(ty, restr) => Term::PartialTy(rb.term(ty)?, rb.restr(restr)?),
            Term::Partial(p) => Term::Partial(rb.partial(p)?),
            Term::InS(restr, t) => Term::InS(rb.restr(restr)?, rb.term(t)?),
            Term::OutS(t, p) => Term::OutS(rb.term(t)?, rb.partial(p)?),
            Term::Coe { var, ty, r, s } => Term::Coe {
                var: var.clone(),
                ty: rb.term(ty)?,
                r: rb.term(r)?,
                s: rb.term(s)?,
            },
        };
        Ok(if rb.changed { Rc::new(node) } else { self.clone() })
    }
}

struct Rebuild<'f, F> {
    f: &'f mut F,
    changed: bool,
}

impl<F> Rebuild<'_, F> {
    fn term<E>(&mut self, t: &Rc<Term>) -> Result<Rc<Term>, E>
    where
        F: FnMut(&Rc<Term>) -> Result<Rc<Term>, E>,
    {
        let out = (self.f)(t)?;
        if !Rc::ptr_eq(&out, t) {
            self.changed = true;
        }
        Ok(out)
    }

    fn args<E>(&mut self, args: &Args) -> Result<Args, E>
    where
        F: FnMut(&Rc<Term>) -> Result<Rc<Term>, E>,
    {
        args.iter()
            .map(|a| Ok(Arg::new(self.term(&a.term)?, a.explicit)))
            .collect()
    }

    fn param<E>(&mut self, p: &Param) -> Result<Param, E>
    where
        F: FnMut(&Rc<Term>) -> Result<Rc<Term>, E>,
    {
        Ok(Param::new(p.var.clone(), self.term(&p.ty)?, p.explicit))
    }

    fn face<E>(&mut self, face: &Face) -> Result<Face, E>
    where
        F: FnMut(&Rc<Term>) -> Result<Rc<Term>, E>,
    {
        let conds = face
            .conds
            .iter()
            .map(|(dim, end)| Ok((self.term(dim)?, *end)))
            .collect::<Result<_, E>>()?;
        Ok(Face { conds })
    }

    fn restr<E>(&mut self, restr: &Restr) -> Result<Restr, E>
    where
        F: FnMut(&Rc<Term>) -> Result<Rc<Term>, E>,
    {
        let faces = restr
            .faces
            .iter()
            .map(|face| self.face(face))
            .collect::<Result<_, E>>()?;
        Ok(Restr { faces })
    }

    fn partial<E>(&mut self, p: &Partial) -> Result<Partial, E>
    where
        F: FnMut(&Rc<Term>) -> Result<Rc<Term>, E>,
    {
        Ok(match p {
            Partial::Const(t) => Partial::Const(self.term(t)?),
            Partial::Split(clauses) => Partial::Split(
                clauses
                    .iter()
                    .map(|(face, t)| Ok((self.face(face)?, self.term(t)?)))
                    .collect::<Result<_, E>>()?,
            ),
        })
    }
}

// =============================================================================
// Display
// =============================================================================

const PREC_TOP: u8 = 0;
const PREC_APP: u8 = 1;
const PREC_ARG: u8 = 2;

fn fmt_args(f: &mut fmt::Formatter<'_>, args: &Args) -> fmt::Result {
    for arg in args {
        if arg.explicit {
            write!(f, " ")?;
            fmt_term(f, &arg.term, PREC_ARG)?;
        } else {
            write!(f, " {{")?;
            fmt_term(f, &arg.term, PREC_TOP)?;
            write!(f, "}}")?;
        }
    }
    Ok(())
}

fn fmt_call(
    f: &mut fmt::Formatter<'_>,
    name: &str,
    ulift: u32,
    args: &Args,
    prec: u8,
) -> fmt::Result {
    let parens = prec >= PREC_ARG && !args.is_empty();
    if parens {
        write!(f, "(")?;
    }
    write!(f, "{}", name)?;
    if ulift > 0 {
        write!(f, "^{}", ulift)?;
    }
    fmt_args(f, args)?;
    if parens {
        write!(f, ")")?;
    }
    Ok(())
}

fn fmt_face(f: &mut fmt::Formatter<'_>, face: &Face) -> fmt::Result {
    if face.is_top() {
        return write!(f, "⊤");
    }
    for (i, (dim, end)) in face.conds.iter().enumerate() {
        if i > 0 {
            write!(f, " ∧ ")?;
        }
        fmt_term(f, dim, PREC_ARG)?;
        write!(f, " = {}", end)?;
    }
    Ok(())
}

impl fmt::Display for Restr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.faces.is_empty() {
            return write!(f, "⊥");
        }
        for (i, face) in self.faces.iter().enumerate() {
            if i > 0 {
                write!(f, " ∨ ")?;
            }
            fmt_face(f, face)?;
        }
        Ok(())
    }
}

fn fmt_partial(f: &mut fmt::Formatter<'_>, p: &Partial) -> fmt::Result {
    match p {
        Partial::Const(t) => {
            write!(f, "{{| ")?;
            fmt_term(f, t, PREC_TOP)?;
            write!(f, " |}}")
        }
        Partial::Split(clauses) => {
            write!(f, "{{|")?;
            for (i, (face, t)) in clauses.iter().enumerate() {
                if i > 0 {
                    write!(f, " |")?;
                }
                write!(f, " ")?;
                fmt_face(f, face)?;
                write!(f, " ↦ ")?;
                fmt_term(f, t, PREC_TOP)?;
            }
            write!(f, " |}}")
        }
    }
}

fn fmt_term(f: &mut fmt::Formatter<'_>, term: &Term, prec: u8) -> fmt::Result {
    let open = |f: &mut fmt::Formatter<'_>, needed: u8| {
        if prec >= needed {
            write!(f, "(")
        } else {
            Ok(())
        }
    };
    let close = |f: &mut fmt::Formatter<'_>, needed: u8| {
        if prec >= needed {
            write!(f, ")")
        } else {
            Ok(())
        }
    };
    match term {
        Term::Var(v) => write!(f, "{}", v),
        Term::App(fun, arg) => {
            open(f, PREC_ARG)?;
            fmt_term(f, fun, PREC_APP)?;
            write!(f, " ")?;
            fmt_term(f, arg, PREC_ARG)?;
            close(f, PREC_ARG)
        }
        Term::Proj(t, ix) => {
            fmt_term(f, t, PREC_ARG)?;
            write!(f, ".{}", ix)
        }
        Term::Lam(v, body) => {
            open(f, PREC_APP)?;
            write!(f, "λ {}. ", v)?;
            fmt_term(f, body, PREC_TOP)?;
            close(f, PREC_APP)
        }
        Term::Pi(p, body) => {
            open(f, PREC_APP)?;
            if p.explicit {
                write!(f, "Π ({} : ", p.var)?;
                fmt_term(f, &p.ty, PREC_TOP)?;
                write!(f, ") → ")?;
            } else {
                write!(f, "Π {{{} : ", p.var)?;
                fmt_term(f, &p.ty, PREC_TOP)?;
                write!(f, "}} → ")?;
            }
            fmt_term(f, body, PREC_TOP)?;
            close(f, PREC_APP)
        }
        Term::Sigma(p, body) => {
            open(f, PREC_APP)?;
            write!(f, "Σ ({} : ", p.var)?;
            fmt_term(f, &p.ty, PREC_TOP)?;
            write!(f, ") × ")?;
            fmt_term(f, body, PREC_TOP)?;
            close(f, PREC_APP)
        }
        Term::Tup(a, b) => {
            write!(f, "(")?;
            fmt_term(f, a, PREC_TOP)?;
            write!(f, ", ")?;
            fmt_term(f, b, PREC_TOP)?;
            write!(f, ")")
        }
        Term::Sort(s) => match s.kind {
            SortKind::Type | SortKind::Set if prec >= PREC_ARG => write!(f, "({})", s),
            _ => write!(f, "{}", s),
        },
        Term::DataCall { name, ulift, args } | Term::FnCall { name, ulift, args } => {
            fmt_call(f, name, *ulift, args, prec)
        }
        Term::ConCall { head, args } => fmt_call(f, &head.con, head.ulift, args, prec),
        Term::PrimCall { prim, args, .. } => match (prim, args.as_slice()) {
            (Prim::IntervalInv, [r]) => {
                write!(f, "~")?;
                fmt_term(f, &r.term, PREC_ARG)
            }
            (Prim::IntervalMin, [r, s]) | (Prim::IntervalMax, [r, s]) => {
                open(f, PREC_APP)?;
                fmt_term(f, &r.term, PREC_ARG)?;
                let op = if *prim == Prim::IntervalMin { "∧" } else { "∨" };
                write!(f, " {} ", op)?;
                fmt_term(f, &s.term, PREC_ARG)?;
                close(f, PREC_APP)
            }
            _ => fmt_call(f, &format!("{:?}", prim), 0, args, prec),
        },
        Term::Meta { id, ulift, args } => fmt_call(f, &id.to_string(), *ulift, args, prec),
        Term::Let(v, val, body) => {
            open(f, PREC_APP)?;
            write!(f, "let {} := ", v)?;
            fmt_term(f, val, PREC_TOP)?;
            write!(f, " in ")?;
            fmt_term(f, body, PREC_TOP)?;
            close(f, PREC_APP)
        }
        Term::Error(msg) => write!(f, "<error: {}>", msg),
        Term::Int(lit) => write!(f, "{}", lit.value),
        Term::Interval => write!(f, "I"),
        Term::Dim(end) => write!(f, "{}", end),
        Term::Path { var, ty, a, b } => {
            open(f, PREC_ARG)?;
            write!(f, "Path (λ {}. ", var)?;
            fmt_term(f, ty, PREC_TOP)?;
            write!(f, ") ")?;
            fmt_term(f, a, PREC_ARG)?;
            write!(f, " ")?;
            fmt_term(f, b, PREC_ARG)?;
            close(f, PREC_ARG)
        }
        Term::PLam(v, body) => {
            open(f, PREC_APP)?;
            write!(f, "λ⟨{}⟩. ", v)?;
            fmt_term(f, body, PREC_TOP)?;
            close(f, PREC_APP)
        }
        Term::PApp { fun, arg, .. } => {
            open(f, PREC_ARG)?;
            fmt_term(f, fun, PREC_APP)?;
            write!(f, " @ ")?;
            fmt_term(f, arg, PREC_ARG)?;
            close(f, PREC_ARG)
        }
        Term::PartialTy(ty, restr) => {
            open(f, PREC_ARG)?;
            write!(f, "Partial ({}) ", restr)?;
            fmt_term(f, ty, PREC_ARG)?;
            close(f, PREC_ARG)
        }
        Term::Partial(p) => fmt_partial(f, p),
        Term::InS(_, t) => {
            open(f, PREC_ARG)?;
            write!(f, "inS ")?;
            fmt_term(f, t, PREC_ARG)?;
            close(f, PREC_ARG)
        }
        Term::OutS(t, _) => {
            open(f, PREC_ARG)?;
            write!(f, "outS ")?;
            fmt_term(f, t, PREC_ARG)?;
            close(f, PREC_ARG)
        }
        Term::Coe { var, ty, r, s } => {
            open(f, PREC_ARG)?;
            write!(f, "coe ")?;
            fmt_term(f, r, PREC_ARG)?;
            write!(f, " ")?;
            fmt_term(f, s, PREC_ARG)?;
            write!(f, " (λ {}. ", var)?;
            fmt_term(f, ty, PREC_TOP)?;
            write!(f, ")")?;
            close(f, PREC_ARG)
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_term(f, self, PREC_TOP)
    }
}
