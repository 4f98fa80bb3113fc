//! Condition tree grammar: OR binds loosest, then AND, then NOT, then
//! parenthesized groups and atomic conditions.

use super::base::{bare_identifier, comma, identifier, kw};
use crate::ast::CmpOp;
use crate::parser::{ParsedCondition, ParsedRhs};
use nom::{
    IResult, Parser,
    character::complete::{char, multispace0, multispace1},
    error::{Error, ErrorKind},
    multi::separated_list1,
};

pub fn parse_condition_tree(input: &str) -> IResult<&str, ParsedCondition> {
    parse_or(input)
}

fn parse_or(input: &str) -> IResult<&str, ParsedCondition> {
    let (mut input, first) = parse_and(input)?;
    let mut parts = vec![first];
    loop {
        let Ok((rest, _)) = ws_kw(input, "OR") else {
            break;
        };
        let (rest, next) = parse_and(rest)?;
        parts.push(next);
        input = rest;
    }
    Ok((input, flatten(parts, true)))
}

fn parse_and(input: &str) -> IResult<&str, ParsedCondition> {
    let (mut input, first) = parse_not(input)?;
    let mut parts = vec![first];
    loop {
        let Ok((rest, _)) = ws_kw(input, "AND") else {
            break;
        };
        let (rest, next) = parse_not(rest)?;
        parts.push(next);
        input = rest;
    }
    Ok((input, flatten(parts, false)))
}

fn flatten(mut parts: Vec<ParsedCondition>, or: bool) -> ParsedCondition {
    if parts.len() == 1 {
        parts.pop().expect("non-empty")
    } else if or {
        ParsedCondition::Or(parts)
    } else {
        ParsedCondition::And(parts)
    }
}

fn ws_kw<'a>(input: &'a str, keyword: &'static str) -> IResult<&'a str, ()> {
    let (input, _) = multispace0(input)?;
    kw(keyword)(input)
}

fn parse_not(input: &str) -> IResult<&str, ParsedCondition> {
    let (input, _) = multispace0(input)?;
    if let Ok((rest, _)) = kw("NOT")(input) {
        let (rest, inner) = parse_not(rest)?;
        // NOT TAGGED WITH normalizes onto the node itself so analyzers and
        // the generator see one construct.
        if let ParsedCondition::TaggedWith { tag, negated } = inner {
            return Ok((
                rest,
                ParsedCondition::TaggedWith {
                    tag,
                    negated: !negated,
                },
            ));
        }
        return Ok((rest, ParsedCondition::Not(Box::new(inner))));
    }
    parse_primary(input)
}

fn parse_primary(input: &str) -> IResult<&str, ParsedCondition> {
    let (input, _) = multispace0(input)?;

    if input.starts_with('(') {
        let (input, _) = char('(').parse(input)?;
        let (input, inner) = parse_or(input)?;
        let (input, _) = multispace0(input)?;
        let (input, _) = char(')').parse(input)?;
        return Ok((input, inner));
    }

    if let Ok((rest, _)) = kw("TAGGED WITH")(input) {
        let (rest, _) = multispace0(rest)?;
        let (rest, tag) = identifier(rest)?;
        return Ok((
            rest,
            ParsedCondition::TaggedWith {
                tag,
                negated: false,
            },
        ));
    }

    if let Ok((rest, _)) = kw("IN PLAN")(input) {
        let (rest, _) = multispace0(rest)?;
        let (rest, plan) = identifier(rest)?;
        return Ok((rest, ParsedCondition::InPlan { plan }));
    }

    let (input, property) = identifier(input)?;
    let (input, _) = multispace0(input)?;

    if let Ok((rest, _)) = kw("IS")(input) {
        let (rest, _) = multispace0(rest)?;
        let (rest, negated) = match kw("NOT")(rest) {
            Ok((r, _)) => {
                let (r, _) = multispace0(r)?;
                (r, true)
            }
            Err(_) => (rest, false),
        };
        let (rest, _) = kw("NULL")(rest)?;
        return Ok((rest, ParsedCondition::IsNull { property, negated }));
    }

    if let Ok((rest, _)) = kw("NUMBERS IN")(input) {
        return in_parens(rest, property, true);
    }
    if let Ok((rest, _)) = kw("IN")(input) {
        return in_parens(rest, property, false);
    }

    let (input, op) = parse_op(input)?;
    let (input, _) = multispace0(input)?;
    let (input, rhs) = parse_rhs(input)?;

    // `= NULL` / `!= NULL` normalize to the IS NULL form.
    let cond = match (&rhs, op) {
        (ParsedRhs::Null, CmpOp::Eq) => ParsedCondition::IsNull {
            property,
            negated: false,
        },
        (ParsedRhs::Null, CmpOp::Ne) => ParsedCondition::IsNull {
            property,
            negated: true,
        },
        (ParsedRhs::Null, _) => {
            return Err(nom::Err::Error(Error::new(input, ErrorKind::Tag)));
        }
        _ => ParsedCondition::Comparison { property, op, rhs },
    };
    Ok((input, cond))
}

/// `IN (...)` and `NUMBERS IN (...)`: a value list or a nested sub-query.
fn in_parens(input: &str, property: String, numbers: bool) -> IResult<&str, ParsedCondition> {
    let (input, _) = multispace0(input)?;
    let (input, _) = char('(').parse(input)?;
    let (input, _) = multispace0(input)?;

    if kw("SELECT")(input).is_ok() {
        let (input, query) = super::parse_root(input)?;
        let (input, _) = multispace0(input)?;
        let (input, _) = char(')').parse(input)?;
        return Ok((
            input,
            ParsedCondition::InSubquery {
                property,
                query: Box::new(query),
                numbers,
            },
        ));
    }

    let (input, values) = separated_list1(comma, identifier).parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char(')').parse(input)?;

    let cond = if numbers {
        ParsedCondition::NumbersInList {
            property,
            numbers: values,
        }
    } else {
        ParsedCondition::InList { property, values }
    };
    Ok((input, cond))
}

fn parse_op(input: &str) -> IResult<&str, CmpOp> {
    const OPS: &[(&str, CmpOp)] = &[
        (">=", CmpOp::Gte),
        ("<=", CmpOp::Lte),
        ("!=", CmpOp::Ne),
        ("=", CmpOp::Eq),
        (">", CmpOp::Gt),
        ("<", CmpOp::Lt),
    ];
    for (sym, op) in OPS {
        if let Some(rest) = input.strip_prefix(sym) {
            return Ok((rest, *op));
        }
    }
    Err(nom::Err::Error(Error::new(input, ErrorKind::Tag)))
}

fn parse_rhs(input: &str) -> IResult<&str, ParsedRhs> {
    if let Ok((rest, _)) = kw("THIS CARD")(input) {
        if let Some(r) = rest.strip_prefix('.') {
            let (r, prop) = identifier(r)?;
            return Ok((r, ParsedRhs::ThisCard(Some(prop))));
        }
        return Ok((rest, ParsedRhs::ThisCard(None)));
    }
    if let Ok((rest, _)) = kw("CURRENT USER")(input) {
        return Ok((rest, ParsedRhs::CurrentUser));
    }
    if let Ok((rest, _)) = kw("TODAY")(input) {
        return Ok((rest, ParsedRhs::Today));
    }
    if let Ok((rest, _)) = kw("NULL")(input) {
        return Ok((rest, ParsedRhs::Null));
    }
    if let Ok((rest, _)) = kw("PROPERTY")(input) {
        let (rest, _) = multispace1(rest)?;
        let (rest, prop) = identifier(rest)?;
        return Ok((rest, ParsedRhs::Property(prop)));
    }

    let number_attempt = (|| {
        let (r, _) = kw("NUMBER")(input)?;
        let (r, _) = multispace1(r)?;
        let (r, num) = bare_identifier(r)?;
        Ok::<_, nom::Err<Error<&str>>>((r, num))
    })();
    if let Ok((rest, num)) = number_attempt {
        return Ok((rest, ParsedRhs::CardNumber(num)));
    }

    // Parenthesized identifier group: a project-level variable reference.
    if let Some(rest) = input.strip_prefix('(') {
        let end = rest.find(')').ok_or(nom::Err::Error(Error::new(
            input,
            ErrorKind::Char,
        )))?;
        let name = rest[..end].trim();
        if name.is_empty() {
            return Err(nom::Err::Error(Error::new(input, ErrorKind::Char)));
        }
        return Ok((&rest[end + 1..], ParsedRhs::Plv(name.to_string())));
    }

    let (rest, literal) = identifier(input)?;
    Ok((rest, ParsedRhs::Literal(literal)))
}
