use crate::error::MqlError;
use crate::parser::{parse, parse_conditions};

#[test]
fn test_duplicate_select_columns() {
    let err = parse("SELECT Name, Name").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Duplicate columns in SELECT clause are illegal"
    );
}

#[test]
fn test_duplicate_group_by_columns() {
    let err = parse("SELECT COUNT(*) GROUP BY Status, status").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Duplicate columns in GROUP BY clause are illegal"
    );
}

#[test]
fn test_duplicate_order_by_columns() {
    let err = parse("SELECT Name ORDER BY Size, Size DESC").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Duplicate columns in ORDER BY clause are illegal"
    );
}

#[test]
fn test_unknown_aggregate_function() {
    let err = parse("SELECT MEDIAN(Size)").unwrap_err();
    assert_eq!(
        err.to_string(),
        "'MEDIAN' is not a recognized aggregate function"
    );
}

#[test]
fn test_trailing_content_quotes_offending_token() {
    let err = parse("SELECT Name bogus").unwrap_err();
    assert!(matches!(err, MqlError::Parse(_)));
    assert!(err.to_string().contains("'bogus'"), "got: {err}");
}

#[test]
fn test_reserved_keyword_gets_quoting_hint() {
    // A parse failure at a bare keyword suggests quoting it.
    let err = parse("Status = Open ORDER Name").unwrap_err();
    assert!(err.to_string().contains("reserved keyword"), "got: {err}");
    assert!(err.to_string().contains("quotes"), "got: {err}");
}

#[test]
fn test_conditions_context_rejects_select() {
    let err = parse_conditions("SELECT Name").unwrap_err();
    assert_eq!(
        err.to_string(),
        "SELECT clause is not allowed here, only conditions are"
    );
}

#[test]
fn test_conditions_context_rejects_order_by() {
    let err = parse_conditions("Status = Open ORDER BY Name").unwrap_err();
    assert_eq!(
        err.to_string(),
        "ORDER BY clause is not allowed here, only conditions are"
    );
}

#[test]
fn test_conditions_context_accepts_bare_conditions() {
    let parsed = parse_conditions("Status = Open AND TAGGED WITH 'rss'").unwrap();
    assert!(parsed.is_some());
}
