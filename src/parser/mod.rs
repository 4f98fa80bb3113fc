//! MQL parser using nom.
//!
//! Parses MQL text into an unresolved parse tree; identifiers (including
//! numeric literals) stay as strings until the binder types them against the
//! property catalog.
//!
//! # Syntax Overview
//!
//! ```text
//! SELECT Name, SUM(Size)
//! AS OF '06 Aug 2010'
//! FROM TREE 'Release Planning'
//! WHERE Status = 'Open' AND TAGGED WITH 'urgent'
//! GROUP BY Status
//! ORDER BY Size DESC
//! ```
//!
//! A query may also be bare conditions (`Type = Story`), the form used by
//! saved filters and `restrict_with`.

pub(crate) mod grammar;

#[cfg(test)]
mod tests;

use crate::ast::{AggregateFunc, CmpOp, SortOrder};
use crate::error::{MqlError, MqlResult};

/// Unresolved SELECT entry.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ParsedSelect {
    Property(String),
    /// Aggregate call; `arg` of `None` means `*`.
    Aggregate { func: String, arg: Option<String> },
}

impl ParsedSelect {
    /// Lowercased rendering used for duplicate detection.
    fn dedup_key(&self) -> String {
        match self {
            ParsedSelect::Property(p) => p.to_lowercase(),
            ParsedSelect::Aggregate { func, arg } => format!(
                "{}({})",
                func.to_lowercase(),
                arg.as_deref().unwrap_or("*").to_lowercase()
            ),
        }
    }
}

/// Unresolved right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ParsedRhs {
    Literal(String),
    Null,
    Plv(String),
    ThisCard(Option<String>),
    Today,
    CurrentUser,
    Property(String),
    CardNumber(String),
}

/// Unresolved condition tree.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ParsedCondition {
    And(Vec<ParsedCondition>),
    Or(Vec<ParsedCondition>),
    Not(Box<ParsedCondition>),
    Comparison {
        property: String,
        op: CmpOp,
        rhs: ParsedRhs,
    },
    IsNull {
        property: String,
        negated: bool,
    },
    TaggedWith {
        tag: String,
        negated: bool,
    },
    InList {
        property: String,
        values: Vec<String>,
    },
    InSubquery {
        property: String,
        query: Box<ParsedQuery>,
        numbers: bool,
    },
    NumbersInList {
        property: String,
        numbers: Vec<String>,
    },
    InPlan {
        plan: String,
    },
}

/// The whole unresolved query.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct ParsedQuery {
    pub select: Vec<ParsedSelect>,
    pub distinct: bool,
    pub conditions: Option<ParsedCondition>,
    pub group_by: Vec<String>,
    pub order_by: Vec<(String, SortOrder)>,
    pub as_of: Option<String>,
    pub from_trees: Vec<String>,
}

/// Parse a complete MQL query string.
pub(crate) fn parse(input: &str) -> MqlResult<ParsedQuery> {
    let input = input.trim();

    let parsed = match grammar::parse_root(input) {
        Ok(("", parsed)) => parsed,
        Ok((remaining, _)) => return Err(error_at(remaining)),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => return Err(error_at(e.input)),
        Err(nom::Err::Incomplete(_)) => {
            return Err(MqlError::Parse("Unexpected end of query".to_string()));
        }
    };

    check_query(&parsed)?;
    Ok(parsed)
}

/// Parse in the condition-only context used by saved filters and
/// `restrict_with`. Non-conditional clauses are rejected by name.
pub(crate) fn parse_conditions(input: &str) -> MqlResult<Option<ParsedCondition>> {
    let parsed = parse(input)?;
    if !parsed.select.is_empty() || parsed.distinct {
        return Err(MqlError::NonConditionalPartsExist("SELECT".to_string()));
    }
    if !parsed.group_by.is_empty() {
        return Err(MqlError::NonConditionalPartsExist("GROUP BY".to_string()));
    }
    if !parsed.order_by.is_empty() {
        return Err(MqlError::NonConditionalPartsExist("ORDER BY".to_string()));
    }
    if parsed.as_of.is_some() {
        return Err(MqlError::NonConditionalPartsExist("AS OF".to_string()));
    }
    if !parsed.from_trees.is_empty() {
        return Err(MqlError::NonConditionalPartsExist("FROM TREE".to_string()));
    }
    Ok(parsed.conditions)
}

/// Build a parse error quoting the first offending token. A bare keyword in
/// identifier position gets the quoting hint instead of the generic message.
fn error_at(remaining: &str) -> MqlError {
    let token = remaining
        .split_whitespace()
        .next()
        .unwrap_or("end of query");
    let word: String = token
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if grammar::base::is_keyword(&word) {
        return MqlError::Parse(format!(
            "'{word}' is a reserved keyword. Surround it with quotes to use it as a property name"
        ));
    }
    MqlError::parse_at(token)
}

/// Post-parse checks that are still parse-time from the caller's view:
/// duplicate columns and aggregate-name validity, recursively through
/// nested sub-queries.
fn check_query(parsed: &ParsedQuery) -> MqlResult<()> {
    check_duplicates(
        parsed.select.iter().map(|s| s.dedup_key()),
        "SELECT",
    )?;
    check_duplicates(parsed.group_by.iter().map(|g| g.to_lowercase()), "GROUP BY")?;
    check_duplicates(
        parsed.order_by.iter().map(|(o, _)| o.to_lowercase()),
        "ORDER BY",
    )?;

    for item in &parsed.select {
        if let ParsedSelect::Aggregate { func, .. } = item {
            AggregateFunc::from_name(func)?;
        }
    }

    if let Some(conditions) = &parsed.conditions {
        check_nested(conditions)?;
    }
    Ok(())
}

fn check_nested(condition: &ParsedCondition) -> MqlResult<()> {
    match condition {
        ParsedCondition::And(xs) | ParsedCondition::Or(xs) => {
            for x in xs {
                check_nested(x)?;
            }
        }
        ParsedCondition::Not(x) => check_nested(x)?,
        ParsedCondition::InSubquery { query, .. } => check_query(query)?,
        _ => {}
    }
    Ok(())
}

fn check_duplicates(keys: impl Iterator<Item = String>, clause: &str) -> MqlResult<()> {
    let mut seen = std::collections::HashSet::new();
    for key in keys {
        if !seen.insert(key) {
            return Err(MqlError::Parse(format!(
                "Duplicate columns in {clause} clause are illegal"
            )));
        }
    }
    Ok(())
}
