//! User-facing rendering of clause problems.

use crate::problem::{ordinal, ClausesProblem, MissingReason};
use kernel::Span;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Error,
    Warning,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Error => write!(f, "Error"),
            Level::Warning => write!(f, "Warning"),
        }
    }
}

/// One rendered clause problem. Unknown spans are dropped, both for the
/// headline and for the notes.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: Level,
    pub code: &'static str,
    pub message: String,
    pub span: Option<Span>,
    pub notes: Vec<(Span, String)>,
}

impl Diagnostic {
    fn note(&mut self, span: Span, text: String) {
        if !span.is_unknown() {
            self.notes.push((span, text));
        }
    }
}

impl From<&ClausesProblem> for Diagnostic {
    fn from(problem: &ClausesProblem) -> Self {
        let pos = problem.pos();
        let mut diagnostic = Diagnostic {
            level: problem.level(),
            code: problem.code(),
            message: problem.to_string(),
            span: (!pos.is_unknown()).then_some(pos),
            notes: Vec::new(),
        };
        match problem {
            ClausesProblem::Confluence {
                i,
                j,
                i_pos,
                j_pos,
                ..
            } => {
                diagnostic.note(*i_pos, format!("the {} clause", ordinal(i)));
                diagnostic.note(*j_pos, format!("the {} clause", ordinal(j)));
            }
            ClausesProblem::MissingCase {
                reason: MissingReason::FuelExhausted,
                ..
            } => diagnostic.note(pos, "the case split ran out of fuel here".to_string()),
            _ => {}
        }
        diagnostic
    }
}

/// `Error[E0101] at 3:1: Unhandled case: suc _`, then one `  note` line per
/// note.
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.level, self.code)?;
        if let Some(span) = self.span {
            write!(f, " at {}", span)?;
        }
        write!(f, ": {}", self.message)?;
        for (span, note) in &self.notes {
            write!(f, "\n  note at {}: {}", span, note)?;
        }
        Ok(())
    }
}

/// Receives the problems of a clause check in report order.
pub trait DiagnosticHandler {
    fn handle(&mut self, diagnostic: Diagnostic);

    fn report(&mut self, problem: &ClausesProblem) {
        self.handle(Diagnostic::from(problem));
    }
}

#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn error_count(&self) -> usize {
        self.count(Level::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Level::Warning)
    }

    fn count(&self, level: Level) -> usize {
        self.diagnostics.iter().filter(|d| d.level == level).count()
    }

    pub fn render(&self) -> String {
        self.diagnostics
            .iter()
            .map(Diagnostic::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl DiagnosticHandler for DiagnosticCollector {
    fn handle(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}
