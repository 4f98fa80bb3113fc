use crate::ast::{CardValue, CmpOp, Column, Query};
use serde::{Deserialize, Serialize};

/// Right-hand side of a comparison.
///
/// PLV and THIS CARD operands keep their provenance alongside the value
/// resolved at bind time, so regeneration and the static analyzers still
/// see the original construct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Rhs {
    Value(CardValue),
    /// A project-level variable, resolved to its value at bind time.
    Plv { name: String, value: CardValue },
    /// THIS CARD or THIS CARD.property; value is Null when the content
    /// provider could not supply one yet.
    ThisCard {
        property: Option<String>,
        value: CardValue,
    },
    Today,
    CurrentUser,
    /// Column-to-column comparison via the PROPERTY keyword.
    Property(Column),
}

impl std::fmt::Display for Rhs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rhs::Value(v) => write!(f, "{}", v),
            Rhs::Plv { name, .. } => write!(f, "({})", name),
            Rhs::ThisCard { property, .. } => match property {
                Some(p) => write!(f, "THIS CARD.{}", p),
                None => write!(f, "THIS CARD"),
            },
            Rhs::Today => write!(f, "TODAY"),
            Rhs::CurrentUser => write!(f, "CURRENT USER"),
            Rhs::Property(c) => write!(f, "PROPERTY {}", c.mql_name()),
        }
    }
}

/// A node of the WHERE tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    Comparison {
        column: Column,
        op: CmpOp,
        rhs: Rhs,
    },
    IsNull {
        column: Column,
        negated: bool,
    },
    TaggedWith {
        tag: String,
        negated: bool,
    },
    InList {
        column: Column,
        values: Vec<CardValue>,
    },
    /// Nested sub-query: `IN (SELECT ...)` or `NUMBERS IN (SELECT ...)`.
    InSubquery {
        column: Column,
        query: Box<Query>,
        numbers: bool,
    },
    /// `NUMBERS IN (1, 2, 3)` against a relationship column.
    NumbersInList {
        column: Column,
        numbers: Vec<i64>,
    },
    InPlan {
        plan: String,
    },
}

impl Condition {
    /// Conjoin two condition trees, flattening nested ANDs so that
    /// restriction is associative.
    pub fn conjoin(self, other: Condition) -> Condition {
        let mut parts = Vec::new();
        match self {
            Condition::And(xs) => parts.extend(xs),
            c => parts.push(c),
        }
        match other {
            Condition::And(xs) => parts.extend(xs),
            c => parts.push(c),
        }
        Condition::And(parts)
    }

    /// Visit this node and every descendant, including conditions inside
    /// nested sub-queries.
    pub fn walk(&self, f: &mut impl FnMut(&Condition)) {
        f(self);
        match self {
            Condition::And(xs) | Condition::Or(xs) => {
                for x in xs {
                    x.walk(f);
                }
            }
            Condition::Not(x) => x.walk(f),
            Condition::InSubquery { query, .. } => {
                if let Some(c) = &query.conditions {
                    c.walk(f);
                }
            }
            Condition::Comparison { .. }
            | Condition::IsNull { .. }
            | Condition::TaggedWith { .. }
            | Condition::InList { .. }
            | Condition::NumbersInList { .. }
            | Condition::InPlan { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(tag: &str) -> Condition {
        Condition::TaggedWith {
            tag: tag.to_string(),
            negated: false,
        }
    }

    #[test]
    fn test_conjoin_flattens() {
        let a = tagged("a");
        let b = tagged("b");
        let c = tagged("c");

        let left = a.clone().conjoin(b.clone()).conjoin(c.clone());
        let right = a.conjoin(b.conjoin(c));
        assert_eq!(left, right);
        assert!(matches!(&left, Condition::And(xs) if xs.len() == 3));
    }

    #[test]
    fn test_walk_visits_nested() {
        let cond = Condition::Not(Box::new(Condition::Or(vec![tagged("a"), tagged("b")])));
        let mut tags = Vec::new();
        cond.walk(&mut |c| {
            if let Condition::TaggedWith { tag, .. } = c {
                tags.push(tag.clone());
            }
        });
        assert_eq!(tags, vec!["a", "b"]);
    }
}
