use crate::ast::{LocalVar, Term};
use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetaId(pub u32);

impl fmt::Display for MetaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetaError {
    #[error("meta {0} is already solved")]
    AlreadySolved(MetaId),
    #[error("unknown meta {0}")]
    UnknownMeta(MetaId),
}

/// A hole created during elaboration. `params` is the context the solution
/// is abstracted over; a call site supplies one argument per param.
#[derive(Debug)]
pub struct MetaEntry {
    pub name: String,
    pub params: Vec<LocalVar>,
    solution: OnceCell<Rc<Term>>,
}

/// Arena of metas. Each solution cell is written at most once.
#[derive(Debug, Default)]
pub struct MetaStore {
    metas: Vec<MetaEntry>,
}

impl MetaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self, name: &str, params: Vec<LocalVar>) -> MetaId {
        let id = MetaId(self.metas.len() as u32);
        self.metas.push(MetaEntry {
            name: name.to_string(),
            params,
            solution: OnceCell::new(),
        });
        id
    }

    pub fn get(&self, id: MetaId) -> Option<&MetaEntry> {
        self.metas.get(id.0 as usize)
    }

    /// Single assignment: a second `solve` on the same meta fails.
    pub fn solve(&self, id: MetaId, solution: Rc<Term>) -> Result<(), MetaError> {
        let entry = self.get(id).ok_or(MetaError::UnknownMeta(id))?;
        entry
            .solution
            .set(solution)
            .map_err(|_| MetaError::AlreadySolved(id))?;
        log::trace!(target: "reduce", "solved meta {} ({})", id, entry.name);
        Ok(())
    }

    pub fn solution(&self, id: MetaId) -> Option<&Rc<Term>> {
        self.get(id).and_then(|entry| entry.solution.get())
    }

    pub fn is_solved(&self, id: MetaId) -> bool {
        self.solution(id).is_some()
    }

    pub fn unsolved(&self) -> impl Iterator<Item = MetaId> + '_ {
        self.metas
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.solution.get().is_none())
            .map(|(ix, _)| MetaId(ix as u32))
    }

    pub fn len(&self) -> usize {
        self.metas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }
}
