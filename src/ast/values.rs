use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A typed literal in a comparison, produced by the binder from the raw
/// token text once the column's type is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CardValue {
    Null,
    Number(Decimal),
    Text(String),
    Date(NaiveDate),
    User(String),
    /// A card referenced by number (`NUMBER 42`, `THIS CARD`).
    CardNumber(i64),
}

impl CardValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CardValue::Null)
    }
}

/// Canonical MQL rendering. Dates regenerate in the project display format.
impl std::fmt::Display for CardValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CardValue::Null => write!(f, "NULL"),
            CardValue::Number(n) => write!(f, "'{}'", n),
            CardValue::Text(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            CardValue::Date(d) => write!(f, "'{}'", d.format("%d %b %Y")),
            CardValue::User(u) => write!(f, "'{}'", u.replace('\'', "\\'")),
            CardValue::CardNumber(n) => write!(f, "NUMBER {}", n),
        }
    }
}

impl From<Decimal> for CardValue {
    fn from(n: Decimal) -> Self {
        CardValue::Number(n)
    }
}

impl From<NaiveDate> for CardValue {
    fn from(d: NaiveDate) -> Self {
        CardValue::Date(d)
    }
}

impl From<&str> for CardValue {
    fn from(s: &str) -> Self {
        CardValue::Text(s.to_string())
    }
}

impl From<String> for CardValue {
    fn from(s: String) -> Self {
        CardValue::Text(s)
    }
}
