//! Error types for MQL compilation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MqlError {
    /// Malformed MQL grammar. The message quotes the offending token.
    #[error("{0}")]
    Parse(String),

    /// An identifier did not resolve against the property catalog.
    #[error("Card property '{property}' does not exist!{}", suggestion_suffix(.suggestion))]
    PropertyNotExist {
        property: String,
        suggestion: Option<String>,
    },

    /// FROM TREE named a tree the project does not have.
    #[error("Tree '{0}' does not exist!")]
    TreeNotExist(String),

    /// FROM TREE named more than one tree.
    #[error("Only one tree can be specified in the FROM TREE clause")]
    MultipleTreesNotSupported,

    /// Semantic validation failure: type mismatches, illegal keyword
    /// placement, illegal nested-query shape, illegal aggregate usage,
    /// PLV association mismatches, AS OF combination conflicts.
    #[error("{0}")]
    Domain(String),

    /// A condition-only parse context received a non-conditional clause.
    #[error("{0} clause is not allowed here, only conditions are")]
    NonConditionalPartsExist(String),

    /// The execution backend failed. Carried through unchanged.
    #[error("Execution error: {0}")]
    Backend(String),
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" Did you mean '{s}'?"),
        None => String::new(),
    }
}

impl MqlError {
    /// Create a parse error quoting the offending token.
    pub fn parse_at(token: &str) -> Self {
        Self::Parse(format!("Unable to parse MQL at or near '{token}'"))
    }

    pub fn domain(message: impl Into<String>) -> Self {
        Self::Domain(message.into())
    }
}

/// Result type alias for MQL operations.
pub type MqlResult<T> = Result<T, MqlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_not_exist_display() {
        let err = MqlError::PropertyNotExist {
            property: "statsu".to_string(),
            suggestion: Some("Status".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Card property 'statsu' does not exist! Did you mean 'Status'?"
        );

        let err = MqlError::PropertyNotExist {
            property: "wip".to_string(),
            suggestion: None,
        };
        assert_eq!(err.to_string(), "Card property 'wip' does not exist!");
    }

    #[test]
    fn test_non_conditional_parts_display() {
        let err = MqlError::NonConditionalPartsExist("SELECT".to_string());
        assert_eq!(
            err.to_string(),
            "SELECT clause is not allowed here, only conditions are"
        );
    }
}
