use crate::transpiler::traits::SqlDialect;
use chrono::{NaiveDate, NaiveDateTime};

pub struct MysqlDialect;

impl SqlDialect for MysqlDialect {
    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn cast_to_decimal(&self, expr: &str) -> String {
        format!("CAST({expr} AS DECIMAL(65,2))")
    }

    fn date_literal(&self, date: NaiveDate) -> String {
        format!("'{}'", date.format("%Y-%m-%d"))
    }

    fn timestamp_literal(&self, ts: NaiveDateTime) -> String {
        format!("'{}'", ts.format("%Y-%m-%d %H:%M:%S"))
    }
}
