use crate::testkit::parse;
use crate::transpiler::{CompileParams, Dialect};
use chrono::NaiveDate;

fn now() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2010, 8, 6)
        .expect("valid date")
        .and_hms_opt(12, 0, 0)
        .expect("valid time")
}

#[test]
fn test_dialects_differ_only_in_quoting_and_casts() {
    let query = parse("SELECT Name, SUM(Size) WHERE 'Due Date' > '01 Aug 2010'");

    let pg = query
        .to_sql(&CompileParams::new(Dialect::Postgres, now()))
        .expect("postgres compiles");
    let my = query
        .to_sql(&CompileParams::new(Dialect::Mysql, now()))
        .expect("mysql compiles");

    assert!(pg.contains("AS \"name\""), "got: {pg}");
    assert!(my.contains("AS `name`"), "got: {my}");

    assert!(pg.contains("CAST(cards.cp_size AS NUMERIC)"), "got: {pg}");
    assert!(my.contains("CAST(cards.cp_size AS DECIMAL(65,2))"), "got: {my}");

    assert!(pg.contains("DATE '2010-08-01'"), "got: {pg}");
    assert!(my.contains("'2010-08-01'"), "got: {my}");
    assert!(!my.contains("DATE '"), "got: {my}");
}

#[test]
fn test_mysql_timestamp_literal_in_version_mode() {
    let query = parse("SELECT Name AS OF '06 Aug 2010'");
    let my = query
        .to_sql(&CompileParams::new(Dialect::Mysql, now()))
        .expect("mysql compiles");
    assert!(my.contains("cv2.updated_at <= '2010-08-06 23:59:59'"), "got: {my}");
    assert!(!my.contains("TIMESTAMP '"), "got: {my}");
}
