use kernel::{display_pats, Arg, Matching, Pat, Span, Term};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// A clause as the checker sees it: source position, patterns over the
/// function's telescope, and a body unless the clause is absurd.
///
/// `has_error` is set when an earlier pass already reported a problem with
/// the clause; it is still classified but takes no part in confluence.
#[derive(Debug, Clone)]
pub struct Clause {
    pub pos: Span,
    pub pats: Vec<Arg<Rc<Pat>>>,
    pub body: Option<Rc<Term>>,
    has_error: Cell<bool>,
}

impl Clause {
    pub fn new(pos: Span, pats: Vec<Arg<Rc<Pat>>>, body: Rc<Term>) -> Self {
        Clause {
            pos,
            pats,
            body: Some(body),
            has_error: Cell::new(false),
        }
    }

    /// A clause whose patterns contain `()` and so has no right-hand side.
    pub fn absurd(pos: Span, pats: Vec<Arg<Rc<Pat>>>) -> Self {
        Clause {
            pos,
            pats,
            body: None,
            has_error: Cell::new(false),
        }
    }

    pub fn has_error(&self) -> bool {
        self.has_error.get()
    }

    pub fn mark_error(&self) {
        self.has_error.set(true);
    }

    /// Patterns with meta patterns inlined.
    pub fn inlined_pats(&self) -> Vec<Arg<Rc<Pat>>> {
        self.pats.iter().map(|a| a.map(|p| p.inline())).collect()
    }

    /// The compiled form used by reduction. Absurd clauses have none.
    pub fn to_matching(&self) -> Option<Matching> {
        let body = self.body.as_ref()?;
        Some(Matching::new(self.pos, self.inlined_pats(), body.clone()))
    }

    /// Checkable by confluence: a body and no upstream error.
    pub(crate) fn is_live(&self) -> bool {
        self.body.is_some() && !self.has_error()
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            Some(body) => write!(f, "| {} ⇒ {}", display_pats(&self.pats), body),
            None => write!(f, "| {}", display_pats(&self.pats)),
        }
    }
}
