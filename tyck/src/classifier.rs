//! Coverage by case splitting.
//!
//! The clauses are read as a pattern matrix, one row per clause and one
//! column per pending parameter. The classifier splits the first column
//! according to its type, rewrites the rows for each branch and recurses
//! until no column is left. Each leaf of the resulting tree records the
//! clauses that may fire on that path; a leaf with none is a coverage gap.

use crate::clause::Clause;
use crate::problem::{ClausesProblem, MissingReason};
use kernel::{
    match_all, rename_tele, subst_tele, tele_subst, Arg, Args, ConDef, IntLit, LocalVar,
    MatchResult, Name, Normalizer, Param, Pat, Span, Subst, Term,
};
use log::{debug, trace};
use std::fmt;
use std::rc::Rc;
use std::sync::OnceLock;

const DEFAULT_CLASSIFY_FUEL: u32 = 5;
const DEFAULT_LITERAL_THRESHOLD: u64 = 64;

pub fn default_classify_fuel() -> u32 {
    static DEFAULT: OnceLock<u32> = OnceLock::new();
    *DEFAULT.get_or_init(|| {
        std::env::var("CUBICAL_CLASSIFY_FUEL")
            .ok()
            .and_then(|val| val.parse::<u32>().ok())
            .filter(|val| *val > 0)
            .unwrap_or(DEFAULT_CLASSIFY_FUEL)
    })
}

pub fn default_literal_threshold() -> u64 {
    static DEFAULT: OnceLock<u64> = OnceLock::new();
    *DEFAULT.get_or_init(|| {
        std::env::var("CUBICAL_LITERAL_FAST_PATH")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(DEFAULT_LITERAL_THRESHOLD)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifyConfig {
    /// How many constructor layers an uncovered case is explored before it
    /// is reported without looking further.
    pub fuel: u32,
    /// Literal patterns at least this large are grouped by value instead of
    /// being peeled one `suc` at a time.
    pub literal_threshold: u64,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        ClassifyConfig {
            fuel: default_classify_fuel(),
            literal_threshold: default_literal_threshold(),
        }
    }
}

// =============================================================================
// Case trees
// =============================================================================

/// A covered path: the arguments it stands for, in terms of the variables
/// the splits introduced, and the clauses (0-based, in source order) that
/// may fire on it.
#[derive(Debug, Clone)]
pub struct PatClass {
    pub args: Args,
    pub clauses: Vec<usize>,
}

/// An uncovered path.
#[derive(Debug, Clone)]
pub struct MissingClass {
    pub args: Args,
    pub reason: MissingReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseLabel {
    Con(Name),
    Tuple,
    Literal(u64),
    /// Every value not listed by a sibling `Literal` branch.
    Default,
}

#[derive(Debug, Clone)]
pub struct CaseBranch {
    pub label: CaseLabel,
    pub tree: CaseTree,
}

#[derive(Debug, Clone)]
pub enum CaseTree {
    Leaf(PatClass),
    Missing(MissingClass),
    Split {
        var: LocalVar,
        ty: Rc<Term>,
        branches: Vec<CaseBranch>,
    },
}

impl CaseTree {
    pub fn leaves(&self) -> Vec<&PatClass> {
        let mut out = Vec::new();
        self.walk(&mut |tree| {
            if let CaseTree::Leaf(class) = tree {
                out.push(class);
            }
        });
        out
    }

    pub fn missing(&self) -> Vec<&MissingClass> {
        let mut out = Vec::new();
        self.walk(&mut |tree| {
            if let CaseTree::Missing(class) = tree {
                out.push(class);
            }
        });
        out
    }

    fn walk<'t>(&'t self, visit: &mut impl FnMut(&'t CaseTree)) {
        match self {
            CaseTree::Split { branches, .. } => {
                for branch in branches {
                    branch.tree.walk(visit);
                }
            }
            _ => visit(self),
        }
    }

    fn lines(&self, indent: usize, out: &mut Vec<String>) {
        match self {
            CaseTree::Leaf(class) => out.push(format!("{:indent$}{}", "", class)),
            CaseTree::Missing(class) => out.push(format!("{:indent$}{} ⇒ missing", "", class)),
            CaseTree::Split { var, ty, branches } => {
                out.push(format!("{:indent$}split {} : {}", "", var, ty));
                for branch in branches {
                    out.push(format!("{:w$}{}:", "", branch.label, w = indent + 2));
                    branch.tree.lines(indent + 4, out);
                }
            }
        }
    }
}

impl fmt::Display for CaseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseLabel::Con(name) => write!(f, "{}", name),
            CaseLabel::Tuple => write!(f, "(,)"),
            CaseLabel::Literal(value) => write!(f, "{}", value),
            CaseLabel::Default => write!(f, "_"),
        }
    }
}

impl fmt::Display for PatClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let clauses: Vec<_> = self.clauses.iter().map(|ix| format!("#{}", ix + 1)).collect();
        write!(f, "{} ⇒ {}", render_args(&self.args), clauses.join(" "))
    }
}

impl fmt::Display for MissingClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", render_args(&self.args))
    }
}

impl fmt::Display for CaseTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = Vec::new();
        self.lines(0, &mut lines);
        write!(f, "{}", lines.join("\n"))
    }
}

/// Renders split arguments the way a user would write the patterns: every
/// variable is a `_`.
pub fn render_args(args: &Args) -> String {
    args.iter()
        .map(|a| {
            if a.explicit {
                render_term(&a.term, false)
            } else {
                format!("{{{}}}", render_term(&a.term, false))
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_term(term: &Rc<Term>, nested: bool) -> String {
    match term.as_ref() {
        Term::Var(_) => "_".to_string(),
        Term::Tup(a, b) => format!("({}, {})", render_term(a, false), render_term(b, false)),
        Term::ConCall { head, args } => {
            let mut out = head.con.to_string();
            for arg in args {
                if arg.explicit {
                    out.push(' ');
                    out.push_str(&render_term(&arg.term, true));
                } else {
                    out.push_str(&format!(" {{{}}}", render_term(&arg.term, false)));
                }
            }
            if nested && !args.is_empty() {
                format!("({})", out)
            } else {
                out
            }
        }
        _ => term.to_string(),
    }
}

// =============================================================================
// Classification
// =============================================================================

#[derive(Debug, Clone)]
pub struct Classification {
    pub tree: CaseTree,
    /// `UnsureCase` problems in the order they were met, then one
    /// `MissingCase` per gap.
    pub problems: Vec<ClausesProblem>,
}

impl Classification {
    pub fn classes(&self) -> Vec<&PatClass> {
        self.tree.leaves()
    }

    pub fn missing(&self) -> Vec<&MissingClass> {
        self.tree.missing()
    }

    pub fn has_errors(&self) -> bool {
        self.problems.iter().any(ClausesProblem::is_error)
    }
}

/// Splits the parameters of `telescope` until every path is either covered
/// by some clauses or known to be missing.
///
/// Clauses with the wrong number of patterns are marked as erroneous and left
/// out of the matrix. Reduction inside the classifier uses `norm`'s fuel; the
/// caller refuels it beforehand if needed.
pub fn classify(
    norm: &Normalizer,
    clauses: &[Clause],
    telescope: &[Param],
    config: ClassifyConfig,
    pos: Span,
) -> Classification {
    let rows: Vec<Row> = clauses
        .iter()
        .enumerate()
        .filter_map(|(ix, clause)| {
            if clause.pats.len() != telescope.len() {
                debug!(
                    target: "classify",
                    "clause {} has {} patterns for {} parameters",
                    ix + 1,
                    clause.pats.len(),
                    telescope.len()
                );
                clause.mark_error();
                return None;
            }
            Some(Row {
                ix,
                pats: clause.inlined_pats(),
            })
        })
        .collect();

    let mut classifier = Classifier {
        norm,
        config,
        pos,
        top: telescope.to_vec(),
        problems: Vec::new(),
    };
    let tree = classifier.split(telescope, &rows, &Subst::new(), config.fuel);
    let mut problems = classifier.problems;
    for class in tree.missing() {
        debug!(target: "classify", "missing case: {}", class);
        problems.push(ClausesProblem::MissingCase {
            pos,
            pats: class.to_string(),
            reason: class.reason,
        });
    }
    Classification { tree, problems }
}

/// One clause's remaining patterns, aligned with the pending columns.
#[derive(Debug, Clone)]
struct Row {
    ix: usize,
    pats: Vec<Arg<Rc<Pat>>>,
}

impl Row {
    fn head(&self) -> &Rc<Pat> {
        &self.pats[0].term
    }

    fn drop_head(&self) -> Row {
        Row {
            ix: self.ix,
            pats: self.pats[1..].to_vec(),
        }
    }

    fn replace_head(&self, with: Vec<Arg<Rc<Pat>>>) -> Row {
        let mut pats = with;
        pats.extend_from_slice(&self.pats[1..]);
        Row { ix: self.ix, pats }
    }
}

/// The column being split: its parameter, the parameter's type in WHNF and
/// the columns after it.
struct Column<'c> {
    param: &'c Param,
    ty: Rc<Term>,
    rest: &'c [Param],
}

fn splits_data(pat: &Pat) -> bool {
    matches!(pat, Pat::Con { .. } | Pat::ShapedInt(_) | Pat::Absurd)
}

fn fresh_binds(tele: &[Param]) -> Vec<Arg<Rc<Pat>>> {
    tele.iter()
        .map(|p| Arg::new(Pat::bind(p.var.fresh(), p.ty.clone()), p.explicit))
        .collect()
}

struct Classifier<'n, 'a> {
    norm: &'n Normalizer<'a>,
    config: ClassifyConfig,
    pos: Span,
    top: Vec<Param>,
    problems: Vec<ClausesProblem>,
}

impl Classifier<'_, '_> {
    /// `refined` maps the telescope's variables to what the splits so far
    /// have refined them to.
    fn split(&mut self, cols: &[Param], rows: &[Row], refined: &Subst, fuel: u32) -> CaseTree {
        let Some((param, rest)) = cols.split_first() else {
            return self.leaf(rows, refined);
        };
        let column = Column {
            param,
            ty: self.norm.whnf(&param.ty),
            rest,
        };
        match column.ty.as_ref() {
            Term::Sigma(fst, snd)
                if rows.iter().any(|r| matches!(r.head().as_ref(), Pat::Tuple(..))) =>
            {
                self.split_tuple(&column, (fst, snd), rows, refined, fuel)
            }
            Term::DataCall { .. }
                if rows.is_empty() || rows.iter().any(|r| splits_data(r.head())) =>
            {
                match self.split_data(&column, rows, refined, fuel) {
                    Some(tree) => tree,
                    None => self.skip(&column, rows, refined, fuel),
                }
            }
            _ => self.skip(&column, rows, refined, fuel),
        }
    }

    /// Nothing to split on: drop the column.
    fn skip(&mut self, column: &Column, rows: &[Row], refined: &Subst, fuel: u32) -> CaseTree {
        trace!(target: "classify", "no split on `{}`", column.param.var);
        let rows: Vec<Row> = rows.iter().map(Row::drop_head).collect();
        self.split(column.rest, &rows, refined, fuel)
    }

    fn split_tuple(
        &mut self,
        column: &Column,
        (fst, snd): (&Param, &Rc<Term>),
        rows: &[Row],
        refined: &Subst,
        fuel: u32,
    ) -> CaseTree {
        let var = &column.param.var;
        let a = fst.var.fresh();
        let b = LocalVar::new(&format!("{}.2", var.name()));
        let fst_ty = fst.ty.clone();
        let snd_ty = snd.subst_one(&fst.var, Term::var(&a));
        let tup = Term::tup(Term::var(&a), Term::var(&b));

        let mut cols = vec![
            Param::new(a.clone(), fst_ty.clone(), true),
            Param::new(b.clone(), snd_ty.clone(), true),
        ];
        cols.extend(subst_tele(
            column.rest,
            &Subst::singleton(var.clone(), tup.clone()),
        ));

        let rows: Vec<Row> = rows
            .iter()
            .filter_map(|row| {
                let (x, y) = match row.head().as_ref() {
                    Pat::Tuple(x, y) => (x.clone(), y.clone()),
                    Pat::Bind { .. } => (
                        Pat::bind(a.fresh(), fst_ty.clone()),
                        Pat::bind(b.fresh(), snd_ty.clone()),
                    ),
                    _ => return None,
                };
                Some(row.replace_head(vec![Arg::ex(x), Arg::ex(y)]))
            })
            .collect();

        let mut refined = refined.clone();
        refined.compose_add(var.clone(), tup);
        debug!(target: "classify", "split `{}` : {} into a pair", var, column.ty);
        let tree = self.split(&cols, &rows, &refined, fuel);
        CaseTree::Split {
            var: var.clone(),
            ty: column.ty.clone(),
            branches: vec![CaseBranch {
                label: CaseLabel::Tuple,
                tree,
            }],
        }
    }

    /// `None` if the column's type is not a declared data type.
    fn split_data(
        &mut self,
        column: &Column,
        rows: &[Row],
        refined: &Subst,
        fuel: u32,
    ) -> Option<CaseTree> {
        let Term::DataCall {
            name,
            args: data_args,
            ..
        } = column.ty.as_ref()
        else {
            return None;
        };
        let cons = self.norm.env().cons_of(name).ok()?;
        if let Some(tree) = self.split_literals(column, rows, refined, fuel) {
            return Some(tree);
        }

        let var = &column.param.var;
        let mut branches = Vec::new();
        for con in &cons {
            let Some(tele) = self.con_tele(con, column, data_args, rows) else {
                continue;
            };
            let (tele, _) = rename_tele(&tele);
            let con_term = Term::con(
                con.head(data_args.clone()),
                tele.iter().map(Param::to_arg).collect(),
            );
            let mut cols = tele.clone();
            cols.extend(subst_tele(
                column.rest,
                &Subst::singleton(var.clone(), con_term.clone()),
            ));
            let mut refined = refined.clone();
            refined.compose_add(var.clone(), con_term);

            let sub_rows: Vec<Row> = rows
                .iter()
                .filter_map(|row| {
                    let pat = row.head().constructor_form();
                    match pat.as_ref() {
                        Pat::Con { head, args } if head.con == con.name => {
                            (args.len() == tele.len()).then(|| row.replace_head(args.clone()))
                        }
                        Pat::Bind { .. } => Some(row.replace_head(fresh_binds(&tele))),
                        _ => None,
                    }
                })
                .collect();

            let fuel = fuel.saturating_sub(1);
            let tree = if sub_rows.is_empty() {
                self.uncovered(con, &tele, &cols, &refined, fuel)
            } else {
                Some(self.split(&cols, &sub_rows, &refined, fuel))
            };
            if let Some(tree) = tree {
                branches.push(CaseBranch {
                    label: CaseLabel::Con(con.name.clone()),
                    tree,
                });
            }
        }

        debug!(
            target: "classify",
            "split `{}` : {} into {} case(s)",
            var,
            column.ty,
            branches.len()
        );
        Some(CaseTree::Split {
            var: var.clone(),
            ty: column.ty.clone(),
            branches,
        })
    }

    /// The constructor's own telescope at the column's data arguments, or
    /// `None` if the constructor is not available there.
    fn con_tele(
        &mut self,
        con: &ConDef,
        column: &Column,
        data_args: &Args,
        rows: &[Row],
    ) -> Option<Vec<Param>> {
        let Some(owner_pats) = &con.owner_pats else {
            let s = tele_subst(&con.owner_tele, data_args);
            return Some(subst_tele(&con.self_tele, &s));
        };
        match match_all(self.norm, owner_pats, data_args) {
            MatchResult::Matched(s) => Some(subst_tele(&con.self_tele, &s)),
            MatchResult::Mismatch => {
                trace!(
                    target: "classify",
                    "`{}` is not available at `{}`",
                    con.name,
                    column.ty
                );
                None
            }
            MatchResult::Stuck => {
                if rows.is_empty() {
                    return Some(con.self_tele.clone());
                }
                let catch_all = rows.iter().any(|r| r.head().is_catch_all());
                debug!(
                    target: "classify",
                    "unsure whether `{}` is available at `{}`",
                    con.name,
                    column.ty
                );
                self.problems.push(ClausesProblem::UnsureCase {
                    pos: self.pos,
                    con: con.name.to_string(),
                    data: column.ty.to_string(),
                    fatal: !catch_all,
                });
                catch_all.then(|| con.self_tele.clone())
            }
        }
    }

    /// No clause covers `con`. `cols` are its fields followed by the
    /// columns after the split; the case is only missing if they can all be
    /// inhabited at once.
    fn uncovered(
        &mut self,
        con: &ConDef,
        tele: &[Param],
        cols: &[Param],
        refined: &Subst,
        fuel: u32,
    ) -> Option<CaseTree> {
        if fuel > 0 && self.vacant(cols, fuel) {
            trace!(target: "classify", "`{}` has no values, nothing is missing", con.name);
            return None;
        }
        let reason = if fuel == 0 && !tele.is_empty() {
            MissingReason::FuelExhausted
        } else {
            MissingReason::NoClause
        };
        Some(self.missing(refined, reason))
    }

    /// Whether no assignment of `cols` exists. A column makes the whole row
    /// vacant if the columns after it already are, or if each of its
    /// available constructors leaves a vacant row. `false` means "not shown
    /// vacant within `fuel`".
    fn vacant(&mut self, cols: &[Param], fuel: u32) -> bool {
        let Some((param, rest)) = cols.split_first() else {
            return false;
        };
        if self.vacant(rest, fuel) {
            return true;
        }
        let column = Column {
            param,
            ty: self.norm.whnf(&param.ty),
            rest,
        };
        let Term::DataCall {
            name,
            args: data_args,
            ..
        } = column.ty.as_ref()
        else {
            return false;
        };
        let Ok(cons) = self.norm.env().cons_of(name) else {
            return false;
        };
        cons.iter().all(|con| {
            let Some(tele) = self.con_tele(con, &column, data_args, &[]) else {
                return true;
            };
            if fuel == 0 {
                return false;
            }
            let (tele, _) = rename_tele(&tele);
            let con_term = Term::con(
                con.head(data_args.clone()),
                tele.iter().map(Param::to_arg).collect(),
            );
            let mut next = tele;
            next.extend(subst_tele(
                rest,
                &Subst::singleton(param.var.clone(), con_term),
            ));
            self.vacant(&next, fuel - 1)
        })
    }

    /// Groups the rows by literal value when the column is matched only by
    /// large literals and catch-alls.
    fn split_literals(
        &mut self,
        column: &Column,
        rows: &[Row],
        refined: &Subst,
        fuel: u32,
    ) -> Option<CaseTree> {
        let mut values: Vec<IntLit> = Vec::new();
        for row in rows {
            match row.head().as_ref() {
                Pat::ShapedInt(lit) => {
                    if !values.iter().any(|v| v.value == lit.value) {
                        values.push(lit.clone());
                    }
                }
                pat if pat.is_catch_all() => {}
                _ => return None,
            }
        }
        let max = values.iter().map(|v| v.value).max()?;
        if max < self.config.literal_threshold {
            return None;
        }

        let var = &column.param.var;
        debug!(
            target: "classify",
            "split `{}` by {} literal value(s)",
            var,
            values.len()
        );
        let mut branches = Vec::new();
        for lit in values {
            let value = lit.value;
            let term = Term::int(lit);
            let cols = subst_tele(column.rest, &Subst::singleton(var.clone(), term.clone()));
            let mut refined = refined.clone();
            refined.compose_add(var.clone(), term);
            let group: Vec<Row> = rows
                .iter()
                .filter(|r| match r.head().as_ref() {
                    Pat::ShapedInt(other) => other.value == value,
                    pat => pat.is_catch_all(),
                })
                .map(Row::drop_head)
                .collect();
            branches.push(CaseBranch {
                label: CaseLabel::Literal(value),
                tree: self.split(&cols, &group, &refined, fuel),
            });
        }

        let others: Vec<Row> = rows
            .iter()
            .filter(|r| r.head().is_catch_all())
            .map(Row::drop_head)
            .collect();
        let tree = if others.is_empty() {
            self.missing(refined, MissingReason::NoClause)
        } else {
            self.split(column.rest, &others, refined, fuel)
        };
        branches.push(CaseBranch {
            label: CaseLabel::Default,
            tree,
        });
        Some(CaseTree::Split {
            var: var.clone(),
            ty: column.ty.clone(),
            branches,
        })
    }

    fn leaf(&mut self, rows: &[Row], refined: &Subst) -> CaseTree {
        if rows.is_empty() {
            return self.missing(refined, MissingReason::NoClause);
        }
        let class = PatClass {
            args: self.instantiate(refined),
            clauses: rows.iter().map(|r| r.ix).collect(),
        };
        trace!(target: "classify", "leaf {}", class);
        CaseTree::Leaf(class)
    }

    fn missing(&self, refined: &Subst, reason: MissingReason) -> CaseTree {
        CaseTree::Missing(MissingClass {
            args: self.instantiate(refined),
            reason,
        })
    }

    fn instantiate(&self, refined: &Subst) -> Args {
        self.top
            .iter()
            .map(|p| {
                let term = refined.get(&p.var).cloned().unwrap_or_else(|| p.to_term());
                Arg::new(term, p.explicit)
            })
            .collect()
    }
}
