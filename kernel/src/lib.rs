pub mod ast;
pub mod conv;
pub mod env;
pub mod matcher;
pub mod meta;
pub mod pat;
pub mod reduce;
pub mod span;
pub mod subst;
#[doc(hidden)]
pub mod test_support;

pub use ast::*;
pub use conv::{alpha_eq, is_def_eq};
pub use env::{ConDef, DataDef, Env, EnvError, FnBody, FnDef, Modifiers};
pub use matcher::{match_all, match_pat, MatchResult};
pub use meta::{MetaError, MetaId, MetaStore};
pub use pat::{display_pats, Matching, MetaPat, Pat};
pub use reduce::{NormalizeMode, Normalizer, ReduceError};
pub use span::Span;
pub use subst::{check_scope, rename_tele, subst_tele, tele_subst, ScopeError, Subst};
