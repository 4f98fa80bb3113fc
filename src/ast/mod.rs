//! The bound MQL AST.
//!
//! Every node is a closed tagged union: the validator, the SQL generator and
//! the analyzers all match exhaustively, so adding a variant without handling
//! it everywhere is a compile error. Nodes are immutable once bound; the only
//! way to derive a different query is to build a new one.

mod columns;
mod conditions;
mod operators;
mod query;
mod values;

pub use columns::{Column, ColumnSource, OrdinalClass, SelectItem};
pub use conditions::{Condition, Rhs};
pub use operators::{AggregateFunc, CmpOp, SortOrder};
pub use query::Query;
pub use values::CardValue;
