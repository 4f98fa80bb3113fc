use crate::ast::CmpOp;
use crate::parser::{ParsedCondition, ParsedRhs, parse};
use pretty_assertions::assert_eq;

fn conditions(text: &str) -> ParsedCondition {
    parse(text).unwrap().conditions.expect("has conditions")
}

#[test]
fn test_bare_comparison() {
    let c = conditions("Status = Open");
    assert_eq!(
        c,
        ParsedCondition::Comparison {
            property: "Status".to_string(),
            op: CmpOp::Eq,
            rhs: ParsedRhs::Literal("Open".to_string()),
        }
    );
}

#[test]
fn test_numeric_literal_stays_textual() {
    let c = conditions("Iteration > 2.0");
    assert_eq!(
        c,
        ParsedCondition::Comparison {
            property: "Iteration".to_string(),
            op: CmpOp::Gt,
            rhs: ParsedRhs::Literal("2.0".to_string()),
        }
    );
}

#[test]
fn test_and_binds_tighter_than_or() {
    let c = conditions("a = 1 AND b = 2 OR c = 3");
    let ParsedCondition::Or(parts) = c else {
        panic!("expected OR at the top");
    };
    assert_eq!(parts.len(), 2);
    assert!(matches!(&parts[0], ParsedCondition::And(xs) if xs.len() == 2));
    assert!(matches!(&parts[1], ParsedCondition::Comparison { .. }));
}

#[test]
fn test_parens_override_precedence() {
    let c = conditions("a = 1 AND (b = 2 OR c = 3)");
    let ParsedCondition::And(parts) = c else {
        panic!("expected AND at the top");
    };
    assert!(matches!(&parts[1], ParsedCondition::Or(xs) if xs.len() == 2));
}

#[test]
fn test_not_tagged_with_normalizes() {
    let c = conditions("NOT TAGGED WITH 'rss'");
    assert_eq!(
        c,
        ParsedCondition::TaggedWith {
            tag: "rss".to_string(),
            negated: true,
        }
    );
}

#[test]
fn test_not_wraps_other_conditions() {
    let c = conditions("NOT Status = Open");
    assert!(matches!(c, ParsedCondition::Not(_)));
}

#[test]
fn test_is_null_and_equals_null_normalize() {
    assert_eq!(
        conditions("Status IS NULL"),
        ParsedCondition::IsNull {
            property: "Status".to_string(),
            negated: false,
        }
    );
    assert_eq!(conditions("Status = NULL"), conditions("Status IS NULL"));
    assert_eq!(conditions("Status != NULL"), conditions("Status IS NOT NULL"));
}

#[test]
fn test_in_list() {
    let c = conditions("Status IN (Open, Closed)");
    assert_eq!(
        c,
        ParsedCondition::InList {
            property: "Status".to_string(),
            values: vec!["Open".to_string(), "Closed".to_string()],
        }
    );
}

#[test]
fn test_numbers_in_list() {
    let c = conditions("Dependency NUMBERS IN (1, 2, 3)");
    assert_eq!(
        c,
        ParsedCondition::NumbersInList {
            property: "Dependency".to_string(),
            numbers: vec!["1".to_string(), "2".to_string(), "3".to_string()],
        }
    );
}

#[test]
fn test_nested_in_subquery() {
    let c = conditions("Dependency IN (SELECT Number WHERE Status = Open)");
    let ParsedCondition::InSubquery {
        property,
        query,
        numbers,
    } = c
    else {
        panic!("expected nested IN");
    };
    assert_eq!(property, "Dependency");
    assert!(!numbers);
    assert_eq!(query.select.len(), 1);
    assert!(query.conditions.is_some());
}

#[test]
fn test_rhs_keywords() {
    assert_eq!(
        conditions("'Due Date' = TODAY"),
        ParsedCondition::Comparison {
            property: "Due Date".to_string(),
            op: CmpOp::Eq,
            rhs: ParsedRhs::Today,
        }
    );
    assert_eq!(
        conditions("Owner = CURRENT USER"),
        ParsedCondition::Comparison {
            property: "Owner".to_string(),
            op: CmpOp::Eq,
            rhs: ParsedRhs::CurrentUser,
        }
    );
    assert_eq!(
        conditions("Dependency = NUMBER 42"),
        ParsedCondition::Comparison {
            property: "Dependency".to_string(),
            op: CmpOp::Eq,
            rhs: ParsedRhs::CardNumber("42".to_string()),
        }
    );
}

#[test]
fn test_this_card_rhs() {
    assert_eq!(
        conditions("Dependency = THIS CARD"),
        ParsedCondition::Comparison {
            property: "Dependency".to_string(),
            op: CmpOp::Eq,
            rhs: ParsedRhs::ThisCard(None),
        }
    );
    assert_eq!(
        conditions("Size = THIS CARD.Size"),
        ParsedCondition::Comparison {
            property: "Size".to_string(),
            op: CmpOp::Eq,
            rhs: ParsedRhs::ThisCard(Some("Size".to_string())),
        }
    );
}

#[test]
fn test_plv_rhs() {
    assert_eq!(
        conditions("Release = (current release)"),
        ParsedCondition::Comparison {
            property: "Release".to_string(),
            op: CmpOp::Eq,
            rhs: ParsedRhs::Plv("current release".to_string()),
        }
    );
}

#[test]
fn test_property_keyword_rhs() {
    assert_eq!(
        conditions("Size = PROPERTY Estimate"),
        ParsedCondition::Comparison {
            property: "Size".to_string(),
            op: CmpOp::Eq,
            rhs: ParsedRhs::Property("Estimate".to_string()),
        }
    );
}

#[test]
fn test_in_plan() {
    assert_eq!(
        conditions("IN PLAN 'Q3 Launch'"),
        ParsedCondition::InPlan {
            plan: "Q3 Launch".to_string(),
        }
    );
}

#[test]
fn test_escaped_quote_in_value() {
    let c = conditions(r"Name = 'it\'s done'");
    assert_eq!(
        c,
        ParsedCondition::Comparison {
            property: "Name".to_string(),
            op: CmpOp::Eq,
            rhs: ParsedRhs::Literal("it's done".to_string()),
        }
    );
}

#[test]
fn test_identifier_starting_with_keyword() {
    // `selected` starts with SELECT but is an ordinary identifier.
    let c = conditions("selected = 1");
    assert!(matches!(
        c,
        ParsedCondition::Comparison { property, .. } if property == "selected"
    ));
}
