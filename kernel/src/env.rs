use crate::ast::{Arg, Args, ConHead, Face, IntShape, Name, Param, Sort, Term};
use crate::pat::{Matching, Pat};
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    #[error("duplicate definition `{0}`")]
    Duplicate(String),
    #[error("unknown data type `{0}`")]
    UnknownData(String),
    #[error("unknown constructor `{con}` of `{data}`")]
    UnknownCon { data: String, con: String },
    #[error("unknown function `{0}`")]
    UnknownFn(String),
}

// =============================================================================
// Definitions
// =============================================================================

#[derive(Debug, Clone)]
pub struct DataDef {
    pub name: Name,
    pub tele: Vec<Param>,
    pub sort: Sort,
    /// Constructor names in declaration order.
    pub cons: Vec<Name>,
}

impl DataDef {
    pub fn call(&self, args: Args) -> Rc<Term> {
        Term::data(&self.name, args)
    }
}

/// A constructor. `owner_tele` is the part of the data telescope the
/// constructor sees; for an indexed family `owner_pats` restricts which data
/// arguments it targets, and `owner_tele` then lists the binds of those
/// patterns. `boundary` lists the faces, over `self_tele`'s interval
/// variables, on which a call to the constructor reduces to another term.
#[derive(Debug, Clone)]
pub struct ConDef {
    pub data: Name,
    pub name: Name,
    pub owner_tele: Vec<Param>,
    pub owner_pats: Option<Vec<Arg<Rc<Pat>>>>,
    pub self_tele: Vec<Param>,
    pub boundary: Vec<(Face, Rc<Term>)>,
}

impl ConDef {
    pub fn new(data: &str, name: &str, owner_tele: Vec<Param>, self_tele: Vec<Param>) -> Self {
        ConDef {
            data: Rc::from(data),
            name: Rc::from(name),
            owner_tele,
            owner_pats: None,
            self_tele,
            boundary: Vec::new(),
        }
    }

    pub fn with_owner_pats(mut self, pats: Vec<Arg<Rc<Pat>>>) -> Self {
        self.owner_pats = Some(pats);
        self
    }

    pub fn with_boundary(mut self, boundary: Vec<(Face, Rc<Term>)>) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn head(&self, data_args: Args) -> ConHead {
        ConHead::new(self.data.clone(), self.name.clone(), data_args)
    }

    pub fn has_boundary(&self) -> bool {
        !self.boundary.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum FnBody {
    Expr(Rc<Term>),
    Clauses(Vec<Matching>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Never delta-unfolded.
    pub opaque: bool,
    /// Clauses may overlap and are checked for confluence; a stuck clause
    /// does not block later ones.
    pub overlap: bool,
}

#[derive(Debug, Clone)]
pub struct FnDef {
    pub name: Name,
    pub tele: Vec<Param>,
    pub result: Rc<Term>,
    pub body: FnBody,
    pub modifiers: Modifiers,
}

impl FnDef {
    pub fn new(name: &str, tele: Vec<Param>, result: Rc<Term>, body: FnBody) -> Self {
        FnDef {
            name: Rc::from(name),
            tele,
            result,
            body,
            modifiers: Modifiers::default(),
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn call(&self, args: Args) -> Rc<Term> {
        Term::fn_call(&self.name, args)
    }
}

// =============================================================================
// Environment
// =============================================================================

/// Global definitions, read-only during reduction and classification.
#[derive(Debug, Clone, Default)]
pub struct Env {
    datas: HashMap<Name, Rc<DataDef>>,
    cons: HashMap<Name, Rc<ConDef>>,
    fns: HashMap<Name, Rc<FnDef>>,
    /// Data types shaped like the naturals, by name.
    shapes: HashMap<Name, Rc<IntShape>>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_fresh(&self, name: &Name) -> Result<(), EnvError> {
        if self.datas.contains_key(name) || self.cons.contains_key(name) || self.fns.contains_key(name)
        {
            return Err(EnvError::Duplicate(name.to_string()));
        }
        Ok(())
    }

    /// Adds a data type with its constructors. Constructor names are global.
    pub fn add_data(
        &mut self,
        name: &str,
        tele: Vec<Param>,
        sort: Sort,
        cons: Vec<ConDef>,
    ) -> Result<(), EnvError> {
        let name: Name = Rc::from(name);
        self.check_fresh(&name)?;
        for con in &cons {
            self.check_fresh(&con.name)?;
            if con.data != name {
                return Err(EnvError::UnknownData(con.data.to_string()));
            }
        }
        if let Some(shape) = nat_shape_of(&name, &tele, &cons) {
            self.shapes.insert(name.clone(), Rc::new(shape));
        }
        let data = DataDef {
            name: name.clone(),
            tele,
            sort,
            cons: cons.iter().map(|c| c.name.clone()).collect(),
        };
        self.datas.insert(name, Rc::new(data));
        for con in cons {
            self.cons.insert(con.name.clone(), Rc::new(con));
        }
        Ok(())
    }

    pub fn add_fn(&mut self, def: FnDef) -> Result<(), EnvError> {
        self.check_fresh(&def.name)?;
        self.fns.insert(def.name.clone(), Rc::new(def));
        Ok(())
    }

    /// Replaces the body of an already declared function, e.g. once its
    /// clauses have been checked.
    pub fn set_fn_body(&mut self, name: &str, body: FnBody) -> Result<(), EnvError> {
        let def = self
            .fns
            .get_mut(name)
            .ok_or_else(|| EnvError::UnknownFn(name.to_string()))?;
        Rc::make_mut(def).body = body;
        Ok(())
    }

    pub fn get_data(&self, name: &str) -> Option<&Rc<DataDef>> {
        self.datas.get(name)
    }

    pub fn get_con(&self, name: &str) -> Option<&Rc<ConDef>> {
        self.cons.get(name)
    }

    pub fn get_fn(&self, name: &str) -> Option<&Rc<FnDef>> {
        self.fns.get(name)
    }

    /// The literal shape of `data`, if it was recognized as the naturals.
    pub fn int_shape(&self, data: &str) -> Option<&Rc<IntShape>> {
        self.shapes.get(data)
    }

    pub fn cons_of(&self, data: &str) -> Result<Vec<Rc<ConDef>>, EnvError> {
        let def = self
            .get_data(data)
            .ok_or_else(|| EnvError::UnknownData(data.to_string()))?;
        def.cons
            .iter()
            .map(|c| {
                self.get_con(c).cloned().ok_or_else(|| EnvError::UnknownCon {
                    data: data.to_string(),
                    con: c.to_string(),
                })
            })
            .collect()
    }

    /// Looks up `con` of `data` by name, failing when it belongs to another type.
    pub fn con_of(&self, data: &str, con: &str) -> Result<&Rc<ConDef>, EnvError> {
        match self.get_con(con) {
            Some(def) if &*def.data == data => Ok(def),
            _ => Err(EnvError::UnknownCon {
                data: data.to_string(),
                con: con.to_string(),
            }),
        }
    }
}

/// A parameterless type with exactly a nullary constructor and a constructor
/// taking one explicit argument of the type itself.
fn nat_shape_of(name: &Name, tele: &[Param], cons: &[ConDef]) -> Option<IntShape> {
    let plain = |c: &ConDef| c.owner_pats.is_none() && !c.has_boundary();
    let recursive = |c: &ConDef| match c.self_tele.as_slice() {
        [p] => {
            p.explicit
                && matches!(p.ty.as_ref(), Term::DataCall { name: n, args, .. } if n == name && args.is_empty())
        }
        _ => false,
    };
    match cons {
        [a, b] if tele.is_empty() && plain(a) && plain(b) => {
            let (zero, suc) = if a.self_tele.is_empty() { (a, b) } else { (b, a) };
            (zero.self_tele.is_empty() && recursive(suc)).then(|| IntShape {
                data: name.clone(),
                zero: zero.name.clone(),
                suc: suc.name.clone(),
            })
        }
        _ => None,
    }
}
