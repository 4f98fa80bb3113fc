//! Dialect trait for the SQL generator.
//!
//! The generator builds every fragment through these hooks; property, tag
//! and tree names never reach the SQL text without passing through the
//! dialect's quoting.

use chrono::{NaiveDate, NaiveDateTime};

/// The SQL dialects the generator targets. They differ in identifier
/// quoting and numeric cast syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Mysql,
}

impl Dialect {
    pub fn generator(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Postgres => &super::sql::postgres::PostgresDialect,
            Dialect::Mysql => &super::sql::mysql::MysqlDialect,
        }
    }
}

/// Dialect-specific SQL generation hooks.
pub trait SqlDialect {
    /// Quote an identifier (result-column alias, etc.).
    fn quote_identifier(&self, name: &str) -> String;

    /// Cast a character-typed numeric expression for numeric comparison.
    fn cast_to_decimal(&self, expr: &str) -> String;

    fn date_literal(&self, date: NaiveDate) -> String;

    fn timestamp_literal(&self, ts: NaiveDateTime) -> String;

    /// String literal with embedded quotes doubled.
    fn quote_string(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_string_doubles_quotes() {
        let g = Dialect::Postgres.generator();
        assert_eq!(g.quote_string("it's"), "'it''s'");
    }
}
