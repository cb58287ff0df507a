pub mod check;
pub mod classifier;
pub mod clause;
pub mod confluence;
pub mod diagnostics;
pub mod problem;

pub use check::{check_clauses, compile, ClausesReport};
pub use classifier::{
    classify, CaseBranch, CaseLabel, CaseTree, Classification, ClassifyConfig, MissingClass,
    PatClass,
};
pub use clause::Clause;
pub use confluence::{
    check_conditions, check_confluence, check_domination, DefEqUnifier, PatUnify, Unifier,
};
pub use diagnostics::{Diagnostic, DiagnosticCollector, DiagnosticHandler, Level};
pub use problem::{ClausesProblem, MissingReason};
