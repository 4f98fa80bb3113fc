//! Implied card types.
//!
//! Computes the minimal set of card types a query's WHERE clause can ever
//! match, for the property-applicability UIs. Narrows on AND, unions on OR.
//! NOT over a condition that does not reference `Type` contributes the full
//! type set rather than inverting anything; downstream UI correctness
//! depends on exactly this behavior.

use crate::ast::{CardValue, CmpOp, Condition, Query, Rhs};
use crate::catalog::PropertyCatalog;
use std::collections::BTreeSet;

pub struct ImpliedCardTypeDetector;

impl ImpliedCardTypeDetector {
    /// The card types the query can match, in catalog position order.
    pub fn implied_card_types(query: &Query, catalog: &PropertyCatalog) -> Vec<String> {
        let positions = match &query.conditions {
            None => all(catalog),
            Some(c) => implied(c, catalog),
        };
        positions
            .into_iter()
            .filter_map(|p| catalog.card_types().get(p).cloned())
            .collect()
    }
}

fn all(catalog: &PropertyCatalog) -> BTreeSet<usize> {
    (0..catalog.card_types().len()).collect()
}

fn implied(condition: &Condition, catalog: &PropertyCatalog) -> BTreeSet<usize> {
    match condition {
        Condition::And(xs) => xs
            .iter()
            .map(|x| implied(x, catalog))
            .reduce(|a, b| a.intersection(&b).copied().collect())
            .unwrap_or_else(|| all(catalog)),
        Condition::Or(xs) => xs
            .iter()
            .map(|x| implied(x, catalog))
            .reduce(|a, b| a.union(&b).copied().collect())
            .unwrap_or_else(|| all(catalog)),
        Condition::Not(x) => negated(x, catalog),
        Condition::Comparison { column, op, rhs } if column.is_card_type() => {
            type_comparison(*op, rhs, catalog)
        }
        Condition::InList { column, values } if column.is_card_type() => values
            .iter()
            .filter_map(|v| match v {
                CardValue::Text(t) => catalog.card_type_position(t),
                _ => None,
            })
            .collect(),
        _ => all(catalog),
    }
}

fn negated(condition: &Condition, catalog: &PropertyCatalog) -> BTreeSet<usize> {
    match condition {
        // De Morgan over branches that reference Type; a negated non-Type
        // leaf still contributes the full set.
        Condition::And(xs) => xs
            .iter()
            .map(|x| negated(x, catalog))
            .reduce(|a, b| a.union(&b).copied().collect())
            .unwrap_or_else(|| all(catalog)),
        Condition::Or(xs) => xs
            .iter()
            .map(|x| negated(x, catalog))
            .reduce(|a, b| a.intersection(&b).copied().collect())
            .unwrap_or_else(|| all(catalog)),
        Condition::Not(x) => implied(x, catalog),
        Condition::Comparison { column, op, rhs } if column.is_card_type() => {
            let positive = type_comparison(*op, rhs, catalog);
            all(catalog).difference(&positive).copied().collect()
        }
        Condition::InList { column, values } if column.is_card_type() => {
            let positive: BTreeSet<usize> = values
                .iter()
                .filter_map(|v| match v {
                    CardValue::Text(t) => catalog.card_type_position(t),
                    _ => None,
                })
                .collect();
            all(catalog).difference(&positive).copied().collect()
        }
        _ => all(catalog),
    }
}

fn type_comparison(op: CmpOp, rhs: &Rhs, catalog: &PropertyCatalog) -> BTreeSet<usize> {
    let name = match rhs {
        Rhs::Value(CardValue::Text(t)) => t,
        _ => return all(catalog),
    };
    let Some(pivot) = catalog.card_type_position(name) else {
        return BTreeSet::new();
    };

    match op {
        CmpOp::Eq => std::iter::once(pivot).collect(),
        CmpOp::Ne => all(catalog).into_iter().filter(|p| *p != pivot).collect(),
        CmpOp::Gt => all(catalog).into_iter().filter(|p| *p > pivot).collect(),
        CmpOp::Gte => all(catalog).into_iter().filter(|p| *p >= pivot).collect(),
        CmpOp::Lt => all(catalog).into_iter().filter(|p| *p < pivot).collect(),
        CmpOp::Lte => all(catalog).into_iter().filter(|p| *p <= pivot).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{catalog, parse};

    fn implied_types(text: &str) -> Vec<String> {
        let query = parse(text);
        ImpliedCardTypeDetector::implied_card_types(query.ast(), &catalog())
    }

    #[test]
    fn test_equality_narrows_to_one_type() {
        assert_eq!(implied_types("Type = Story"), vec!["Story"]);
    }

    #[test]
    fn test_or_unions_and_and_narrows() {
        assert_eq!(
            implied_types("Type = Story OR Type = Bug"),
            vec!["Story", "Bug"]
        );
        assert_eq!(
            implied_types("Type = Story AND Status = Open"),
            vec!["Story"]
        );
        assert!(implied_types("Type = Story AND Type = Bug").is_empty());
    }

    #[test]
    fn test_inequality_and_ordinal_comparisons() {
        assert_eq!(implied_types("Type != Story"), vec!["Bug", "Epic"]);
        assert_eq!(implied_types("Type > Story"), vec!["Bug", "Epic"]);
        assert_eq!(implied_types("Type <= Bug"), vec!["Story", "Bug"]);
        assert_eq!(
            implied_types("Type IN (Story, Epic)"),
            vec!["Story", "Epic"]
        );
    }

    #[test]
    fn test_not_inverts_type_conditions() {
        assert_eq!(implied_types("NOT Type = Story"), vec!["Bug", "Epic"]);
        assert_eq!(
            implied_types("NOT (Type = Story OR Type = Bug)"),
            vec!["Epic"]
        );
    }

    #[test]
    fn test_not_on_non_type_condition_does_not_invert() {
        // The full set survives NOT over a non-Type condition.
        assert_eq!(
            implied_types("NOT Size > 2"),
            vec!["Story", "Bug", "Epic"]
        );
        assert_eq!(
            implied_types("NOT (Type = Story AND Size > 2)"),
            vec!["Story", "Bug", "Epic"]
        );
    }

    #[test]
    fn test_no_conditions_implies_all_types() {
        assert_eq!(
            implied_types("SELECT Name"),
            vec!["Story", "Bug", "Epic"]
        );
    }
}
