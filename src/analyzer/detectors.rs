//! Usage detectors: which cards, card types, tags, variables and
//! properties a query depends on.

use crate::ast::{CardValue, Condition, Query, Rhs, SelectItem};

/// Does the query reference a specific card, or any card at all?
pub struct CardUsageDetector;

impl CardUsageDetector {
    pub fn uses(query: &Query, number: i64) -> bool {
        let mut found = false;
        query.walk_conditions(&mut |c| match c {
            Condition::Comparison { rhs, .. } => {
                if rhs_card_number(rhs) == Some(number) {
                    found = true;
                }
            }
            Condition::NumbersInList { numbers, .. } => {
                if numbers.contains(&number) {
                    found = true;
                }
            }
            _ => {}
        });
        found
    }

    pub fn uses_any_card(query: &Query) -> bool {
        let mut found = false;
        query.walk_conditions(&mut |c| match c {
            Condition::Comparison { column, rhs, .. } => {
                if column.is_relationship() && !matches!(rhs, Rhs::Property(_)) {
                    found = true;
                }
                if rhs_card_number(rhs).is_some() {
                    found = true;
                }
            }
            Condition::NumbersInList { .. } => found = true,
            Condition::InList { column, .. } | Condition::InSubquery { column, .. } => {
                if column.is_relationship() {
                    found = true;
                }
            }
            _ => {}
        });
        found
    }
}

fn rhs_card_number(rhs: &Rhs) -> Option<i64> {
    match rhs {
        Rhs::Value(CardValue::CardNumber(n)) => Some(*n),
        Rhs::ThisCard {
            value: CardValue::CardNumber(n),
            ..
        } => Some(*n),
        Rhs::Plv {
            value: CardValue::CardNumber(n),
            ..
        } => Some(*n),
        _ => None,
    }
}

/// Card types a query names explicitly, split into included (`=`, `IN`)
/// and excluded (`!=`) sets, each deduplicated independently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardTypeDetector {
    pub included: Vec<String>,
    pub excluded: Vec<String>,
}

impl CardTypeDetector {
    pub fn analyze(query: &Query) -> Self {
        let mut result = Self::default();
        query.walk_conditions(&mut |c| match c {
            Condition::Comparison {
                column,
                op,
                rhs: Rhs::Value(CardValue::Text(value)),
            } if column.is_card_type() => match op {
                crate::ast::CmpOp::Eq => push_unique(&mut result.included, value),
                crate::ast::CmpOp::Ne => push_unique(&mut result.excluded, value),
                _ => {}
            },
            Condition::InList { column, values } if column.is_card_type() => {
                for value in values {
                    if let CardValue::Text(t) = value {
                        push_unique(&mut result.included, t);
                    }
                }
            }
            _ => {}
        });
        result
    }
}

/// Tags a query depends on, positively and negatively. Sets from several
/// queries combine for cache invalidation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaggedWithDetector {
    pub tagged_with: Vec<String>,
    pub not_tagged_with: Vec<String>,
}

impl TaggedWithDetector {
    pub fn analyze(query: &Query) -> Self {
        let mut result = Self::default();
        query.walk_conditions(&mut |c| {
            if let Condition::TaggedWith { tag, negated } = c {
                if *negated {
                    push_unique(&mut result.not_tagged_with, tag);
                } else {
                    push_unique(&mut result.tagged_with, tag);
                }
            }
        });
        result
    }

    pub fn combine(mut self, other: Self) -> Self {
        for tag in other.tagged_with {
            push_unique(&mut self.tagged_with, &tag);
        }
        for tag in other.not_tagged_with {
            push_unique(&mut self.not_tagged_with, &tag);
        }
        self
    }
}

/// Project-level variables a query references.
pub struct PlvDetector;

impl PlvDetector {
    pub fn plvs_used(query: &Query) -> Vec<String> {
        let mut names = Vec::new();
        query.walk_conditions(&mut |c| {
            if let Condition::Comparison {
                rhs: Rhs::Plv { name, .. },
                ..
            } = c
            {
                push_unique(&mut names, name);
            }
        });
        names
    }

    pub fn uses_plv(query: &Query, name: &str) -> bool {
        Self::plvs_used(query)
            .iter()
            .any(|n| n.eq_ignore_ascii_case(name))
    }
}

/// Property definitions a query depends on, in any clause, including via
/// `THIS CARD.property` and the select column of `NUMBERS IN` sub-queries.
pub struct PropertyUsageDetector;

impl PropertyUsageDetector {
    pub fn properties_used(query: &Query) -> Vec<String> {
        let mut names = Vec::new();
        collect_properties(query, &mut names);
        names
    }

    pub fn uses_property(query: &Query, name: &str) -> bool {
        Self::properties_used(query)
            .iter()
            .any(|n| n.eq_ignore_ascii_case(name))
    }
}

fn collect_properties(query: &Query, names: &mut Vec<String>) {
    for item in &query.columns {
        match item {
            SelectItem::Column(c) => push_unique(names, &c.name),
            SelectItem::Aggregate {
                column: Some(c), ..
            } => push_unique(names, &c.name),
            SelectItem::Aggregate { column: None, .. } => {}
        }
    }
    for c in &query.group_by {
        push_unique(names, &c.name);
    }
    for (c, _) in &query.order_by {
        push_unique(names, &c.name);
    }

    if let Some(conditions) = &query.conditions {
        collect_condition_properties(conditions, names);
    }
}

fn collect_condition_properties(condition: &Condition, names: &mut Vec<String>) {
    match condition {
        Condition::And(xs) | Condition::Or(xs) => {
            for x in xs {
                collect_condition_properties(x, names);
            }
        }
        Condition::Not(x) => collect_condition_properties(x, names),
        Condition::Comparison { column, rhs, .. } => {
            push_unique(names, &column.name);
            match rhs {
                Rhs::Property(other) => push_unique(names, &other.name),
                Rhs::ThisCard {
                    property: Some(p), ..
                } => push_unique(names, p),
                _ => {}
            }
        }
        Condition::IsNull { column, .. } | Condition::NumbersInList { column, .. } => {
            push_unique(names, &column.name);
        }
        Condition::InList { column, .. } => push_unique(names, &column.name),
        Condition::InSubquery { column, query, .. } => {
            push_unique(names, &column.name);
            collect_properties(query, names);
        }
        Condition::TaggedWith { .. } | Condition::InPlan { .. } => {}
    }
}

/// Does the query use IN PLAN?
pub struct InPlanDetector;

impl InPlanDetector {
    pub fn uses_in_plan(query: &Query) -> bool {
        let mut found = false;
        query.walk_conditions(&mut |c| {
            if matches!(c, Condition::InPlan { .. }) {
                found = true;
            }
        });
        found
    }
}

/// A query's results can be cached iff no condition depends on the acting
/// user.
pub fn can_be_cached(query: &Query) -> bool {
    let mut current_user = false;
    query.walk_conditions(&mut |c| {
        if let Condition::Comparison {
            rhs: Rhs::CurrentUser,
            ..
        } = c
        {
            current_user = true;
        }
    });
    !current_user
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
        names.push(name.to_string());
    }
}
