use std::fmt;

/// Source position of a clause or definition, carried through for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub col: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, col: usize) -> Self {
        Span {
            start,
            end,
            line,
            col,
        }
    }

    /// Span with a line only, for hand-built clauses in tests and tooling.
    pub fn at_line(line: usize) -> Self {
        Span {
            start: 0,
            end: 0,
            line,
            col: 1,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.start == 0 && self.end == 0 && self.line == 0 && self.col == 0
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            write!(f, "<unknown>")
        } else {
            write!(f, "{}:{}", self.line, self.col)
        }
    }
}
