//! SELECT / AS OF / FROM TREE / GROUP BY / ORDER BY clause grammars.

use super::base::{comma, identifier, kw};
use crate::ast::SortOrder;
use crate::parser::ParsedSelect;
use nom::{
    IResult, Parser,
    character::complete::{char, multispace0, multispace1},
    error::Error,
    multi::separated_list1,
};

pub fn parse_select_clause(input: &str) -> IResult<&str, (Vec<ParsedSelect>, bool)> {
    let (input, _) = kw("SELECT")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, distinct) = match kw("DISTINCT")(input) {
        Ok((rest, _)) => {
            let (rest, _) = multispace1(rest)?;
            (rest, true)
        }
        Err(_) => (input, false),
    };
    let (input, items) = separated_list1(comma, select_item).parse(input)?;
    Ok((input, (items, distinct)))
}

/// A property reference or an aggregate call (`SUM(Size)`, `COUNT(*)`).
fn select_item(input: &str) -> IResult<&str, ParsedSelect> {
    let (after_name, name) = identifier(input)?;

    let attempt = (|| {
        let (r, _) = multispace0(after_name)?;
        let (r, _) = char::<_, Error<&str>>('(').parse(r)?;
        let (r, _) = multispace0(r)?;
        let (r, arg) = match char::<_, Error<&str>>('*').parse(r) {
            Ok((r, _)) => (r, None),
            Err(_) => {
                let (r, arg) = identifier(r)?;
                (r, Some(arg))
            }
        };
        let (r, _) = multispace0(r)?;
        let (r, _) = char::<_, Error<&str>>(')').parse(r)?;
        Ok::<_, nom::Err<Error<&str>>>((r, arg))
    })();

    match attempt {
        Ok((rest, arg)) => Ok((rest, ParsedSelect::Aggregate { func: name, arg })),
        Err(_) => Ok((after_name, ParsedSelect::Property(name))),
    }
}

pub fn parse_as_of(input: &str) -> IResult<&str, String> {
    let (input, _) = kw("AS OF")(input)?;
    let (input, _) = multispace0(input)?;
    identifier(input)
}

pub fn parse_from_tree(input: &str) -> IResult<&str, Vec<String>> {
    let (input, _) = kw("FROM TREE")(input)?;
    let (input, _) = multispace0(input)?;
    separated_list1(comma, identifier).parse(input)
}

pub fn parse_group_by(input: &str) -> IResult<&str, Vec<String>> {
    let (input, _) = kw("GROUP BY")(input)?;
    let (input, _) = multispace1(input)?;
    separated_list1(comma, identifier).parse(input)
}

pub fn parse_order_by(input: &str) -> IResult<&str, Vec<(String, SortOrder)>> {
    let (input, _) = kw("ORDER BY")(input)?;
    let (input, _) = multispace1(input)?;
    separated_list1(comma, order_item).parse(input)
}

fn order_item(input: &str) -> IResult<&str, (String, SortOrder)> {
    let (after_name, name) = identifier(input)?;

    let attempt = (|| {
        let (r, _) = multispace1(after_name)?;
        if let Ok((r, _)) = kw("DESC")(r) {
            return Ok((r, SortOrder::Desc));
        }
        let (r, _) = kw("ASC")(r)?;
        Ok::<_, nom::Err<Error<&str>>>((r, SortOrder::Asc))
    })();

    match attempt {
        Ok((rest, order)) => Ok((rest, (name, order))),
        Err(_) => Ok((after_name, (name, SortOrder::Asc))),
    }
}
