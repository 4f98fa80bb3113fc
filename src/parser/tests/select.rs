use crate::ast::SortOrder;
use crate::parser::{ParsedSelect, parse};
use pretty_assertions::assert_eq;

#[test]
fn test_select_columns() {
    let q = parse("SELECT Name, Status").unwrap();
    assert_eq!(
        q.select,
        vec![
            ParsedSelect::Property("Name".to_string()),
            ParsedSelect::Property("Status".to_string()),
        ]
    );
    assert!(!q.distinct);
    assert!(q.conditions.is_none());
}

#[test]
fn test_select_distinct() {
    let q = parse("SELECT DISTINCT Status").unwrap();
    assert!(q.distinct);
    assert_eq!(q.select.len(), 1);
}

#[test]
fn test_select_aggregates() {
    let q = parse("SELECT Status, SUM(Size), COUNT(*)").unwrap();
    assert_eq!(q.select.len(), 3);
    assert_eq!(
        q.select[1],
        ParsedSelect::Aggregate {
            func: "SUM".to_string(),
            arg: Some("Size".to_string()),
        }
    );
    assert_eq!(
        q.select[2],
        ParsedSelect::Aggregate {
            func: "COUNT".to_string(),
            arg: None,
        }
    );
}

#[test]
fn test_quoted_long_property_name() {
    let q = parse("SELECT 'Due Date'").unwrap();
    assert_eq!(q.select, vec![ParsedSelect::Property("Due Date".to_string())]);
}

#[test]
fn test_group_by_and_order_by() {
    let q = parse("SELECT Status, SUM(Size) GROUP BY Status ORDER BY Status DESC, Size").unwrap();
    assert_eq!(q.group_by, vec!["Status".to_string()]);
    assert_eq!(
        q.order_by,
        vec![
            ("Status".to_string(), SortOrder::Desc),
            ("Size".to_string(), SortOrder::Asc),
        ]
    );
}

#[test]
fn test_as_of_clause() {
    let q = parse("SELECT Name AS OF '06 Aug 2010'").unwrap();
    assert_eq!(q.as_of.as_deref(), Some("06 Aug 2010"));
}

#[test]
fn test_from_tree_clause() {
    let q = parse("SELECT Name FROM TREE 'Planning' WHERE Status = Open").unwrap();
    assert_eq!(q.from_trees, vec!["Planning".to_string()]);
    assert!(q.conditions.is_some());
}

#[test]
fn test_keywords_are_case_insensitive() {
    let q = parse("select name order by name desc").unwrap();
    assert_eq!(q.select.len(), 1);
    assert_eq!(q.order_by, vec![("name".to_string(), SortOrder::Desc)]);
}
