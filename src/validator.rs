//! Type-directed semantic validation over the bound AST.
//!
//! The binder guarantees every identifier resolved and every literal was
//! typed; this pass enforces comparison legality per ordinal class, reserved
//! keyword placement, nested-query shape, aggregate usage and the AS OF
//! combination rules. Every rejection is a `DomainException`-category error
//! naming the offending property or keyword.

use crate::ast::{
    AggregateFunc, CardValue, Column, Condition, OrdinalClass, Query, Rhs, SelectItem,
};
use crate::error::{MqlError, MqlResult};

pub(crate) fn validate(query: &Query) -> MqlResult<()> {
    validate_select(query)?;
    validate_as_of_combinations(query)?;

    if let Some(conditions) = &query.conditions {
        validate_condition(conditions)?;
    }
    Ok(())
}

fn validate_select(query: &Query) -> MqlResult<()> {
    for item in &query.columns {
        if let SelectItem::Aggregate { func, column } = item {
            match column {
                None => {
                    if *func != AggregateFunc::Count {
                        return Err(MqlError::domain(format!(
                            "{func}(*) is not a valid aggregate; only COUNT(*) may aggregate over '*'"
                        )));
                    }
                }
                Some(c) => {
                    if *func != AggregateFunc::Count && !c.is_numeric_valued() {
                        return Err(MqlError::domain(format!(
                            "Property '{}' is not numeric and cannot be aggregated with {func}",
                            c.name
                        )));
                    }
                }
            }
        }
    }
    Ok(())
}

fn validate_as_of_combinations(query: &Query) -> MqlResult<()> {
    if query.as_of.is_none() {
        return Ok(());
    }
    if query.from_tree.is_some() {
        return Err(MqlError::domain("AS OF cannot be combined with FROM TREE"));
    }
    let mut has_tagged_with = false;
    query.walk_conditions(&mut |c| {
        if matches!(c, Condition::TaggedWith { .. }) {
            has_tagged_with = true;
        }
    });
    if has_tagged_with {
        return Err(MqlError::domain("AS OF cannot be combined with TAGGED WITH"));
    }
    Ok(())
}

fn validate_condition(condition: &Condition) -> MqlResult<()> {
    match condition {
        Condition::And(xs) | Condition::Or(xs) => {
            for x in xs {
                validate_condition(x)?;
            }
        }
        Condition::Not(x) => validate_condition(x)?,
        Condition::Comparison { column, op, rhs } => {
            validate_comparison(column, *op, rhs)?;
        }
        Condition::IsNull { .. } | Condition::TaggedWith { .. } | Condition::InPlan { .. } => {}
        Condition::InList { .. } => {}
        Condition::NumbersInList { column, .. } => {
            if !column.is_relationship() {
                return Err(MqlError::domain(format!(
                    "NUMBERS IN can only be used with card or tree relationship properties; \
                     '{}' is not one",
                    column.name
                )));
            }
        }
        Condition::InSubquery { column, query, .. } => {
            validate_nested(column, query)?;
        }
    }
    Ok(())
}

fn validate_comparison(column: &Column, op: crate::ast::CmpOp, rhs: &Rhs) -> MqlResult<()> {
    if op.is_ordered() && !column.ordinal_class.supports_ordering() {
        return Err(MqlError::domain(format!(
            "Property '{}' cannot be compared with '{op}'; only '=' and '!=' are supported",
            column.name
        )));
    }

    match rhs {
        Rhs::Today => {
            if column.ordinal_class != OrdinalClass::Date {
                return Err(MqlError::domain(format!(
                    "Property '{}' is not a date property and cannot be compared with TODAY",
                    column.name
                )));
            }
        }
        Rhs::CurrentUser => {
            if column.ordinal_class != OrdinalClass::User {
                return Err(MqlError::domain(format!(
                    "Property '{}' is not a user property and cannot be compared with CURRENT USER",
                    column.name
                )));
            }
        }
        Rhs::Property(other) => {
            if !(column.is_numeric() && other.is_numeric()) {
                return Err(MqlError::domain(format!(
                    "Properties '{}' and '{}' cannot be compared with each other; \
                     only numeric properties can be compared with the PROPERTY keyword",
                    column.name, other.name
                )));
            }
        }
        Rhs::Value(CardValue::CardNumber(_)) => {
            if !column.is_relationship() {
                return Err(MqlError::domain(format!(
                    "NUMBER can only be used with card or tree relationship properties; \
                     '{}' is not one",
                    column.name
                )));
            }
        }
        Rhs::ThisCard { property: None, .. } => {
            if !column.is_relationship() {
                return Err(MqlError::domain(format!(
                    "THIS CARD can only be compared with card or tree relationship properties; \
                     '{}' is not one",
                    column.name
                )));
            }
        }
        Rhs::Value(_) | Rhs::Plv { .. } | Rhs::ThisCard { .. } => {}
    }
    Ok(())
}

/// Nested IN sub-queries select one column; against a relationship column
/// that column must be Name or Number. The binder already rejected AS OF,
/// GROUP BY and ORDER BY inside.
fn validate_nested(outer: &Column, nested: &Query) -> MqlResult<()> {
    let selected = match nested.columns.as_slice() {
        [SelectItem::Column(c)] => c,
        [SelectItem::Aggregate { .. }] => {
            return Err(MqlError::domain(
                "A nested IN clause cannot select an aggregate",
            ));
        }
        _ => {
            return Err(MqlError::domain(
                "A nested IN clause must select exactly one column",
            ));
        }
    };

    if outer.is_relationship() && !(selected.is_card_number() || selected.is_card_name()) {
        return Err(MqlError::domain(format!(
            "Only Name and Number can be selected in a nested IN clause compared with \
             relationship property '{}'",
            outer.name
        )));
    }

    validate(nested)
}

#[cfg(test)]
mod tests {
    use crate::testkit::try_parse;

    fn error_of(text: &str) -> String {
        try_parse(text).unwrap_err().to_string()
    }

    #[test]
    fn test_ordered_comparison_needs_ordered_class() {
        assert!(error_of("Name > 'x'").contains("cannot be compared with '>'"));
        assert!(error_of("Owner < 'bob'").contains("cannot be compared with '<'"));
        assert!(error_of("Dependency < NUMBER 4").contains("cannot be compared with '<'"));
        assert!(try_parse("Size > 2").is_ok());
        assert!(try_parse("Release > 1").is_ok());
        assert!(try_parse("Type > Bug").is_ok());
    }

    #[test]
    fn test_today_only_on_date_columns() {
        let message = error_of("Size = TODAY");
        assert!(message.contains("Size"), "got: {message}");
        assert!(message.contains("TODAY"), "got: {message}");
        assert!(try_parse("'Due Date' = TODAY").is_ok());
    }

    #[test]
    fn test_current_user_only_on_user_columns() {
        let message = error_of("Status = CURRENT USER");
        assert!(message.contains("CURRENT USER"), "got: {message}");
        assert!(try_parse("Owner = CURRENT USER").is_ok());
    }

    #[test]
    fn test_property_keyword_requires_numeric_operands() {
        let message = error_of("Status = PROPERTY Status");
        assert!(message.contains("'Status'"), "got: {message}");
        let message = error_of("'Due Date' = PROPERTY 'Due Date'");
        assert!(message.contains("'Due Date'"), "got: {message}");
        assert!(try_parse("Size = PROPERTY Estimate").is_ok());
    }

    #[test]
    fn test_number_keyword_requires_relationship_column() {
        let message = error_of("Size = NUMBER 5");
        assert!(message.contains("NUMBER"), "got: {message}");
        assert!(try_parse("Dependency = NUMBER 5").is_ok());
        assert!(try_parse("'Planning release' = NUMBER 5").is_ok());
    }

    #[test]
    fn test_numbers_in_requires_relationship_column() {
        let message = error_of("Size NUMBERS IN (1, 2)");
        assert!(message.contains("NUMBERS IN"), "got: {message}");
        assert!(try_parse("Dependency NUMBERS IN (1, 2)").is_ok());
    }

    #[test]
    fn test_as_of_combination_conflicts() {
        assert_eq!(
            error_of("SELECT Name AS OF '06 Aug 2010' WHERE TAGGED WITH 'rss'"),
            "AS OF cannot be combined with TAGGED WITH"
        );
        assert_eq!(
            error_of("SELECT Name AS OF '06 Aug 2010' FROM TREE 'Planning'"),
            "AS OF cannot be combined with FROM TREE"
        );
    }

    #[test]
    fn test_nested_in_clause_restrictions() {
        assert_eq!(
            error_of("Dependency IN (SELECT Number AS OF '06 Aug 2010')"),
            "AS OF is not supported in a nested IN clause"
        );
        assert_eq!(
            error_of("Dependency IN (SELECT Number GROUP BY Status)"),
            "GROUP BY is not supported in a nested IN clause"
        );
        assert_eq!(
            error_of("Dependency IN (SELECT Number ORDER BY Name)"),
            "ORDER BY is not supported in a nested IN clause"
        );
        assert_eq!(
            error_of("Dependency IN (SELECT Number, Name)"),
            "A nested IN clause must select exactly one column"
        );
    }

    #[test]
    fn test_nested_select_restricted_to_name_or_number() {
        let message = error_of("Dependency IN (SELECT Status)");
        assert!(message.contains("Only Name and Number"), "got: {message}");
        assert!(try_parse("Dependency IN (SELECT Number)").is_ok());
        assert!(try_parse("Dependency IN (SELECT Name)").is_ok());
    }

    #[test]
    fn test_aggregate_rules() {
        let message = error_of("SELECT SUM(Status)");
        assert!(message.contains("not numeric"), "got: {message}");

        let message = error_of("SELECT SUM(*)");
        assert!(message.contains("COUNT(*)"), "got: {message}");

        assert!(try_parse("SELECT COUNT(*)").is_ok());
        assert!(try_parse("SELECT AVG(Release)").is_ok());
        assert!(try_parse("SELECT MIN(Estimate)").is_ok());
    }
}
