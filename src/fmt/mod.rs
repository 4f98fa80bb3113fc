//! Canonical MQL regeneration.
//!
//! Regenerated text is semantically idempotent: parsing it again yields the
//! same bound AST. Property names come back in catalog casing, values come
//! back quoted, keywords come back uppercase.

use crate::ast::{Condition, Query, SortOrder};
use std::fmt::{Formatter, Result};


impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let mut lead = Lead::new();

        if self.explicit_columns {
            write!(f, "SELECT ")?;
            if self.distinct {
                write!(f, "DISTINCT ")?;
            }
            for (i, item) in self.columns.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{item}")?;
            }
            lead.written();
        }

        if let Some(as_of) = self.as_of {
            lead.space(f)?;
            write!(f, "AS OF '{}'", as_of.format("%d %b %Y"))?;
        }

        if let Some(tree) = &self.from_tree {
            lead.space(f)?;
            write!(f, "FROM TREE '{tree}'")?;
        }

        if let Some(conditions) = &self.conditions {
            // Bare condition queries regenerate without the WHERE keyword,
            // matching the saved-filter form they were parsed from.
            if lead.any_written() {
                lead.space(f)?;
                write!(f, "WHERE ")?;
            } else {
                lead.written();
            }
            write_condition(f, conditions)?;
        }

        if !self.group_by.is_empty() {
            lead.space(f)?;
            write!(f, "GROUP BY ")?;
            for (i, col) in self.group_by.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", col.mql_name())?;
            }
        }

        if !self.order_by.is_empty() {
            lead.space(f)?;
            write!(f, "ORDER BY ")?;
            for (i, (col, dir)) in self.order_by.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", col.mql_name())?;
                if *dir == SortOrder::Desc {
                    write!(f, " DESC")?;
                }
            }
        }

        Ok(())
    }
}

/// Tracks whether a clause has been written yet, so separators only go
/// between clauses.
struct Lead {
    any: bool,
}

impl Lead {
    fn new() -> Self {
        Self { any: false }
    }

    fn written(&mut self) {
        self.any = true;
    }

    fn any_written(&self) -> bool {
        self.any
    }

    fn space(&mut self, f: &mut Formatter<'_>) -> Result {
        if self.any {
            write!(f, " ")?;
        }
        self.any = true;
        Ok(())
    }
}

fn write_condition(f: &mut Formatter<'_>, condition: &Condition) -> Result {
    match condition {
        Condition::And(xs) => {
            for (i, x) in xs.iter().enumerate() {
                if i > 0 {
                    write!(f, " AND ")?;
                }
                write_condition(f, x)?;
            }
            Ok(())
        }
        Condition::Or(xs) => {
            write!(f, "(")?;
            for (i, x) in xs.iter().enumerate() {
                if i > 0 {
                    write!(f, " OR ")?;
                }
                write_condition(f, x)?;
            }
            write!(f, ")")
        }
        Condition::Not(x) => {
            // OR groups already parenthesize themselves.
            if matches!(**x, Condition::Or(_)) {
                write!(f, "NOT ")?;
                write_condition(f, x)
            } else {
                write!(f, "NOT (")?;
                write_condition(f, x)?;
                write!(f, ")")
            }
        }
        Condition::Comparison { column, op, rhs } => {
            write!(f, "{} {op} {rhs}", column.mql_name())
        }
        Condition::IsNull { column, negated } => {
            if *negated {
                write!(f, "{} IS NOT NULL", column.mql_name())
            } else {
                write!(f, "{} IS NULL", column.mql_name())
            }
        }
        Condition::TaggedWith { tag, negated } => {
            if *negated {
                write!(f, "NOT TAGGED WITH '{tag}'")
            } else {
                write!(f, "TAGGED WITH '{tag}'")
            }
        }
        Condition::InList { column, values } => {
            write!(f, "{} IN (", column.mql_name())?;
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{v}")?;
            }
            write!(f, ")")
        }
        Condition::InSubquery {
            column,
            query,
            numbers,
        } => {
            let keyword = if *numbers { "NUMBERS IN" } else { "IN" };
            write!(f, "{} {keyword} ({query})", column.mql_name())
        }
        Condition::NumbersInList { column, numbers } => {
            write!(f, "{} NUMBERS IN (", column.mql_name())?;
            for (i, n) in numbers.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{n}")?;
            }
            write!(f, ")")
        }
        Condition::InPlan { plan } => write!(f, "IN PLAN '{plan}'"),
    }
}
