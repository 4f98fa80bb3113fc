//! Read-only AST analyzers.
//!
//! Each analyzer answers one dependency question over an already-built AST
//! without re-parsing; rename/delete-safety checks and the query cache rely
//! on them.

mod detectors;
mod implied_type;
mod validations;

pub use detectors::{
    CardTypeDetector, CardUsageDetector, InPlanDetector, PlvDetector, PropertyUsageDetector,
    TaggedWithDetector, can_be_cached,
};
pub use implied_type::ImpliedCardTypeDetector;
pub use validations::{AggregateConditionValidations, MqlFilterValidations};
