use crate::ast::{Column, Condition, SelectItem, SortOrder};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The bound, validated query AST. Immutable after construction: deriving
/// a restricted or re-selected query always builds a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub columns: Vec<SelectItem>,
    /// False when the query text had no SELECT clause and the implicit
    /// Number/Name selection applies.
    pub explicit_columns: bool,
    pub distinct: bool,
    pub conditions: Option<Condition>,
    pub group_by: Vec<Column>,
    pub order_by: Vec<(Column, SortOrder)>,
    /// Present iff the query compiles in version mode.
    pub as_of: Option<NaiveDate>,
    /// Canonical tree name from the catalog.
    pub from_tree: Option<String>,
}

impl Query {
    pub fn has_aggregates(&self) -> bool {
        self.columns.iter().any(|c| c.is_aggregate())
    }

    pub fn non_aggregate_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter_map(|item| match item {
            SelectItem::Column(c) => Some(c),
            SelectItem::Aggregate { .. } => None,
        })
    }

    /// A new query with `extra` conjoined onto the conditions. The receiver
    /// is left untouched.
    pub fn restricted(&self, extra: Condition) -> Query {
        let mut next = self.clone();
        next.conditions = Some(match next.conditions.take() {
            Some(existing) => existing.conjoin(extra),
            None => extra,
        });
        next
    }

    /// A new query selecting different columns over the same conditions.
    pub fn reselected(&self, columns: Vec<SelectItem>) -> Query {
        let mut next = self.clone();
        next.columns = columns;
        next.explicit_columns = true;
        next.distinct = false;
        next.group_by.clear();
        next.order_by.clear();
        next
    }

    /// Visit every condition node, including nested sub-queries.
    pub fn walk_conditions(&self, f: &mut impl FnMut(&Condition)) {
        if let Some(c) = &self.conditions {
            c.walk(f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_query() -> Query {
        Query {
            columns: vec![],
            explicit_columns: false,
            distinct: false,
            conditions: None,
            group_by: vec![],
            order_by: vec![],
            as_of: None,
            from_tree: None,
        }
    }

    fn tagged(tag: &str) -> Condition {
        Condition::TaggedWith {
            tag: tag.to_string(),
            negated: false,
        }
    }

    #[test]
    fn test_restricted_does_not_mutate() {
        let q = empty_query();
        let restricted = q.restricted(tagged("a"));
        assert!(q.conditions.is_none());
        assert!(restricted.conditions.is_some());
    }

    #[test]
    fn test_restricted_is_associative() {
        let q = empty_query();
        let one_by_one = q.restricted(tagged("a")).restricted(tagged("b"));
        let at_once = q.restricted(tagged("a").conjoin(tagged("b")));
        assert_eq!(one_by_one, at_once);
    }

    #[test]
    fn test_walk_reaches_nested_subquery() {
        let nested = Query {
            conditions: Some(tagged("inner")),
            ..empty_query()
        };
        let outer = Query {
            conditions: Some(Condition::InSubquery {
                column: Column {
                    name: "Dependency".to_string(),
                    column_name: "cp_dependency".to_string(),
                    source: crate::ast::ColumnSource::CardRelationship,
                    ordinal_class: crate::ast::OrdinalClass::CardRelationship,
                    prop_type: crate::catalog::PropertyType::Card,
                    property_id: Some(9),
                },
                query: Box::new(nested),
                numbers: false,
            }),
            ..empty_query()
        };

        let mut seen = Vec::new();
        outer.walk_conditions(&mut |c| {
            if let Condition::TaggedWith { tag, .. } = c {
                seen.push(tag.clone());
            }
        });
        assert_eq!(seen, vec!["inner"]);
    }
}
