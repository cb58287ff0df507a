use crate::classifier::{classify, Classification, ClassifyConfig};
use crate::clause::Clause;
use crate::confluence::{check_conditions, check_confluence, check_domination, DefEqUnifier};
use crate::diagnostics::DiagnosticHandler;
use crate::problem::ClausesProblem;
use kernel::{FnBody, Modifiers, Normalizer, Param, Span};
use log::debug;

/// Outcome of checking one function's clauses.
#[derive(Debug, Clone)]
pub struct ClausesReport {
    pub classification: Classification,
    /// Classifier problems first, then confluence or domination, then
    /// conditions.
    pub problems: Vec<ClausesProblem>,
}

impl ClausesReport {
    pub fn has_errors(&self) -> bool {
        self.problems.iter().any(ClausesProblem::is_error)
    }

    pub fn report(&self, handler: &mut impl DiagnosticHandler) {
        for problem in &self.problems {
            handler.report(problem);
        }
    }
}

/// Runs every clause check for a function with parameters `telescope`.
///
/// Overlapping functions must be confluent; otherwise clauses that can never
/// fire first are reported. Conditions of higher constructors are checked
/// either way.
pub fn check_clauses(
    norm: &Normalizer,
    telescope: &[Param],
    clauses: &[Clause],
    modifiers: Modifiers,
    config: ClassifyConfig,
    pos: Span,
) -> ClausesReport {
    norm.refuel();
    let classification = classify(norm, clauses, telescope, config, pos);
    let mut problems = classification.problems.clone();
    let mut unifier = DefEqUnifier::new(norm);
    if modifiers.overlap {
        problems.extend(check_confluence(&mut unifier, clauses, &classification.tree));
    } else {
        problems.extend(check_domination(clauses, &classification.tree));
    }
    problems.extend(check_conditions(
        norm,
        &mut unifier,
        clauses,
        modifiers.overlap,
    ));
    debug!(
        target: "classify",
        "{} clause(s) in {} class(es), {} problem(s)",
        clauses.len(),
        classification.classes().len(),
        problems.len()
    );
    ClausesReport {
        classification,
        problems,
    }
}

/// The body reduction runs, made of the clauses that have one.
pub fn compile(clauses: &[Clause]) -> FnBody {
    FnBody::Clauses(clauses.iter().filter_map(Clause::to_matching).collect())
}
