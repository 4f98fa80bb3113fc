use crate::error::{MqlError, MqlResult};
use serde::{Deserialize, Serialize};

/// Comparison operator in a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    pub fn sql_symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Gt => ">",
            CmpOp::Gte => ">=",
            CmpOp::Lt => "<",
            CmpOp::Lte => "<=",
        }
    }

    /// Ordered operators are only legal on columns with an ordinal class
    /// that defines an ordering.
    pub fn is_ordered(&self) -> bool {
        matches!(self, CmpOp::Gt | CmpOp::Gte | CmpOp::Lt | CmpOp::Lte)
    }
}

impl std::fmt::Display for CmpOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.sql_symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortOrder::Asc => write!(f, "ASC"),
            SortOrder::Desc => write!(f, "DESC"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunc {
    /// Recognize an aggregate name from query text. Unrecognized names are
    /// a parse-time error quoting the offending token.
    pub fn from_name(name: &str) -> MqlResult<Self> {
        match name.to_uppercase().as_str() {
            "COUNT" => Ok(AggregateFunc::Count),
            "SUM" => Ok(AggregateFunc::Sum),
            "AVG" => Ok(AggregateFunc::Avg),
            "MIN" => Ok(AggregateFunc::Min),
            "MAX" => Ok(AggregateFunc::Max),
            _ => Err(MqlError::Parse(format!(
                "'{name}' is not a recognized aggregate function"
            ))),
        }
    }
}

impl std::fmt::Display for AggregateFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregateFunc::Count => write!(f, "COUNT"),
            AggregateFunc::Sum => write!(f, "SUM"),
            AggregateFunc::Avg => write!(f, "AVG"),
            AggregateFunc::Min => write!(f, "MIN"),
            AggregateFunc::Max => write!(f, "MAX"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_from_name_case_insensitive() {
        assert_eq!(AggregateFunc::from_name("sum").unwrap(), AggregateFunc::Sum);
        assert_eq!(AggregateFunc::from_name("Count").unwrap(), AggregateFunc::Count);
    }

    #[test]
    fn test_unknown_aggregate_rejected() {
        let err = AggregateFunc::from_name("median").unwrap_err();
        assert_eq!(
            err.to_string(),
            "'median' is not a recognized aggregate function"
        );
    }
}
