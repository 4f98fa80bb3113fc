use crate::transpiler::traits::SqlDialect;
use chrono::{NaiveDate, NaiveDateTime};

pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn cast_to_decimal(&self, expr: &str) -> String {
        format!("CAST({expr} AS NUMERIC)")
    }

    fn date_literal(&self, date: NaiveDate) -> String {
        format!("DATE '{}'", date.format("%Y-%m-%d"))
    }

    fn timestamp_literal(&self, ts: NaiveDateTime) -> String {
        format!("TIMESTAMP '{}'", ts.format("%Y-%m-%d %H:%M:%S"))
    }
}
