use crate::diagnostics::{Diagnostic, Level};
use kernel::{Span, Term};
use std::rc::Rc;
use thiserror::Error;

/// Why a coverage gap was reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingReason {
    /// No clause reaches the case.
    NoClause,
    /// The classifier ran out of fuel before it could tell the case apart.
    FuelExhausted,
}

/// Everything clause checking can report about a set of clauses.
#[derive(Debug, Clone, Error)]
pub enum ClausesProblem {
    #[error("Unhandled case: {pats}")]
    MissingCase {
        pos: Span,
        pats: String,
        reason: MissingReason,
    },

    #[error(
        "I'm unsure if there should be a case for constructor `{con}` because I got stuck on the index unification of type `{data}`"
    )]
    UnsureCase {
        pos: Span,
        con: String,
        data: String,
        fatal: bool,
    },

    #[error(
        "The {} and the {} clauses are not confluent because we failed to unify `{lhs}` and `{rhs}`",
        ordinal(.i),
        ordinal(.j)
    )]
    Confluence {
        pos: Span,
        i: usize,
        j: usize,
        lhs: Rc<Term>,
        rhs: Rc<Term>,
        i_pos: Span,
        j_pos: Span,
    },

    #[error(
        "The {} clause matches on a constructor with condition(s). When checking the condition {face}, {}",
        ordinal(.nth),
        condition_failure(.lhs, .rhs)
    )]
    Conditions {
        pos: Span,
        nth: usize,
        face: String,
        lhs: Rc<Term>,
        rhs: Option<Rc<Term>>,
    },

    #[error(
        "The {} clause dominates the {} clause. The {} clause will be unreachable",
        ordinal(.dom),
        ordinal(.sub),
        ordinal(.sub)
    )]
    Domination { pos: Span, dom: usize, sub: usize },

    #[error(
        "The {} clause is dominated by the other clauses, hence unreachable",
        ordinal(.sub)
    )]
    FmDomination { pos: Span, sub: usize },
}

/// `1st`, `2nd`, `3rd`, `4th`, ..., `11th`, `12th`, `13th`, `21st`, ...
pub fn ordinal(n: &usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

fn condition_failure(lhs: &Rc<Term>, rhs: &Option<Rc<Term>>) -> String {
    match rhs {
        Some(rhs) => format!("we failed to unify `{}` and `{}`", lhs, rhs),
        None => format!(
            "we failed to find any of the clause(s) to check against `{}`",
            lhs
        ),
    }
}

impl ClausesProblem {
    pub fn pos(&self) -> Span {
        match self {
            ClausesProblem::MissingCase { pos, .. }
            | ClausesProblem::UnsureCase { pos, .. }
            | ClausesProblem::Confluence { pos, .. }
            | ClausesProblem::Conditions { pos, .. }
            | ClausesProblem::Domination { pos, .. }
            | ClausesProblem::FmDomination { pos, .. } => *pos,
        }
    }

    pub fn level(&self) -> Level {
        match self {
            ClausesProblem::UnsureCase { fatal: false, .. }
            | ClausesProblem::Domination { .. }
            | ClausesProblem::FmDomination { .. } => Level::Warning,
            _ => Level::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.level() == Level::Error
    }

    pub fn code(&self) -> &'static str {
        match self {
            ClausesProblem::MissingCase { .. } => "E0101",
            ClausesProblem::UnsureCase { .. } => "E0102",
            ClausesProblem::Confluence { .. } => "E0103",
            ClausesProblem::Conditions { .. } => "E0104",
            ClausesProblem::Domination { .. } => "W0101",
            ClausesProblem::FmDomination { .. } => "W0102",
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::from(self)
    }
}
