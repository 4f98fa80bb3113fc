//! Context validations: constructs that are unsafe in aggregate
//! definitions and saved filters.

use crate::ast::{Condition, Query, Rhs};

/// Constructs a query uses that depend on evaluation context.
fn contextual_constructs(query: &Query) -> Vec<&'static str> {
    let mut found = Vec::new();
    let mut push = |name: &'static str| {
        if !found.contains(&name) {
            found.push(name);
        }
    };

    if query.from_tree.is_some() {
        push("FROM TREE");
    }
    query.walk_conditions(&mut |c| {
        if let Condition::Comparison { rhs, .. } = c {
            match rhs {
                Rhs::Today => push("TODAY"),
                Rhs::CurrentUser => push("CURRENT USER"),
                Rhs::ThisCard { .. } => push("THIS CARD"),
                _ => {}
            }
        }
    });
    found
}

/// Flags constructs that cannot be used in project aggregate conditions.
pub struct AggregateConditionValidations;

impl AggregateConditionValidations {
    pub fn validate(query: &Query) -> Vec<String> {
        contextual_constructs(query)
            .into_iter()
            .map(|c| format!("{c} cannot be used in an aggregate condition"))
            .collect()
    }
}

/// Flags constructs that cannot be used in saved MQL filters.
pub struct MqlFilterValidations;

impl MqlFilterValidations {
    pub fn validate(query: &Query) -> Vec<String> {
        contextual_constructs(query)
            .into_iter()
            .map(|c| format!("{c} cannot be used in a saved filter"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::parse;

    #[test]
    fn test_contextual_constructs_flagged_for_aggregates() {
        let query = parse(
            "SELECT Name FROM TREE 'Planning' WHERE 'Due Date' = TODAY AND Owner = CURRENT USER",
        );
        let messages = AggregateConditionValidations::validate(query.ast());
        assert_eq!(
            messages,
            vec![
                "FROM TREE cannot be used in an aggregate condition",
                "TODAY cannot be used in an aggregate condition",
                "CURRENT USER cannot be used in an aggregate condition",
            ]
        );
    }

    #[test]
    fn test_this_card_flagged_for_saved_filters() {
        let query = parse("Dependency = THIS CARD");
        let messages = MqlFilterValidations::validate(query.ast());
        assert_eq!(messages, vec!["THIS CARD cannot be used in a saved filter"]);
    }

    #[test]
    fn test_clean_queries_produce_no_messages() {
        let query = parse("Status = Open");
        assert!(AggregateConditionValidations::validate(query.ast()).is_empty());
        assert!(MqlFilterValidations::validate(query.ast()).is_empty());
    }
}
