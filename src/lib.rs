//! Card query language (MQL) compiler.
//!
//! Parses MQL text into a typed AST bound against a per-project property
//! catalog, validates it, and compiles dialect-correct SQL over the current
//! cards table or the historical card versions table.
//!
//! ```ignore
//! use mql::prelude::*;
//! let query = CardQuery::parse("SELECT Name WHERE Status = 'Open'", catalog, ParseOptions::default())?;
//! let sql = query.to_sql(&CompileParams::new(Dialect::Postgres, now))?;
//! ```

pub mod analyzer;
pub mod ast;
mod binder;
pub mod catalog;
pub mod engine;
pub mod error;
mod fmt;
mod parser;
pub mod transpiler;
mod validator;

#[cfg(test)]
pub(crate) mod testkit;

pub use engine::CardQuery;

pub mod prelude {
    pub use crate::CardQuery;
    pub use crate::ast::*;
    pub use crate::catalog::{CardContext, ContentProvider, PropertyCatalog};
    pub use crate::engine::{ApiVersion, CardListView, ExecutionBackend, ParseOptions, Row};
    pub use crate::error::{MqlError, MqlResult};
    pub use crate::transpiler::{CompileParams, Dialect};
}
