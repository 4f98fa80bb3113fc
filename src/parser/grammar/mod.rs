pub mod base;
pub mod clauses;
pub mod conditions;

use crate::parser::{ParsedCondition, ParsedQuery};
use nom::{IResult, Parser, character::complete::multispace0, combinator::opt};

/// Parse an MQL query (root entry point). Does not require end-of-input;
/// `parser::parse` rejects trailing content with the offending token.
pub fn parse_root(input: &str) -> IResult<&str, ParsedQuery> {
    let input = input.trim_start();

    let (input, select) = opt(clauses::parse_select_clause).parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, as_of) = opt(clauses::parse_as_of).parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, from_trees) = opt(clauses::parse_from_tree).parse(input)?;
    let (input, _) = multispace0(input)?;

    let bare_allowed = select.is_none() && as_of.is_none() && from_trees.is_none();
    let (input, conditions) = parse_conditions_part(input, bare_allowed)?;
    let (input, _) = multispace0(input)?;

    let (input, group_by) = opt(clauses::parse_group_by).parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, order_by) = opt(clauses::parse_order_by).parse(input)?;
    let (input, _) = multispace0(input)?;

    let (select_items, distinct) = select.unwrap_or((Vec::new(), false));
    Ok((
        input,
        ParsedQuery {
            select: select_items,
            distinct,
            conditions,
            group_by: group_by.unwrap_or_default(),
            order_by: order_by.unwrap_or_default(),
            as_of,
            from_trees: from_trees.unwrap_or_default(),
        },
    ))
}

/// Conditions come WHERE-prefixed in clause form, or bare when the whole
/// input is a filter expression (saved filters, restrict_with).
fn parse_conditions_part(
    input: &str,
    bare_allowed: bool,
) -> IResult<&str, Option<ParsedCondition>> {
    if let Ok((rest, _)) = base::kw("WHERE")(input) {
        let (rest, cond) = conditions::parse_condition_tree(rest)?;
        return Ok((rest, Some(cond)));
    }
    if bare_allowed
        && !input.is_empty()
        && base::kw("GROUP BY")(input).is_err()
        && base::kw("ORDER BY")(input).is_err()
    {
        let (rest, cond) = conditions::parse_condition_tree(input)?;
        return Ok((rest, Some(cond)));
    }
    Ok((input, None))
}
