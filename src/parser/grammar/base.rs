//! Token-level combinators shared by the clause and condition grammars.

use nom::{
    IResult, Parser,
    bytes::complete::{tag_no_case, take_while1},
    character::complete::{char, multispace0, multispace1},
    error::{Error, ErrorKind},
};

/// Reserved words of the grammar. An unquoted identifier that is exactly a
/// keyword cannot be a property name; the parse error path turns that into
/// the "surround it with quotes" hint.
pub const KEYWORDS: &[&str] = &[
    "select", "distinct", "where", "and", "or", "not", "in", "is", "null", "tagged", "with",
    "today", "current", "user", "this", "card", "as", "of", "from", "tree", "group", "order", "by",
    "asc", "desc", "number", "numbers", "property", "plan",
];

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word.to_lowercase().as_str())
}

/// Case-insensitive, word-bounded keyword parser. Multi-word keywords
/// (`TAGGED WITH`, `THIS CARD`, `AS OF`) match as a single logical token.
/// The word-boundary check keeps identifiers that merely start with a
/// keyword (a property named `selected`) from being shadowed.
pub fn kw(keyword: &'static str) -> impl Fn(&str) -> IResult<&str, ()> {
    move |input: &str| {
        let mut rest = input;
        for (i, word) in keyword.split(' ').enumerate() {
            if i > 0 {
                let (r, _) = multispace1(rest)?;
                rest = r;
            }
            let (r, _) = tag_no_case::<_, _, Error<&str>>(word).parse(rest)?;
            if r.chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
            {
                return Err(nom::Err::Error(Error::new(input, ErrorKind::Tag)));
            }
            rest = r;
        }
        Ok((rest, ()))
    }
}

fn is_bare_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '-' | '/')
}

/// Bare identifier token. Numeric literals are identifiers here; the binder
/// types them against the catalog later.
pub fn bare_identifier(input: &str) -> IResult<&str, String> {
    let (rest, word) = take_while1(is_bare_ident_char).parse(input)?;
    Ok((rest, word.to_string()))
}

/// Quoted identifier or literal: `'...'` or `"..."` with `\'` / `\"` / `\\`
/// escapes preserving the escaped character.
pub fn quoted_string(input: &str) -> IResult<&str, String> {
    let mut chars = input.char_indices();
    let quote = match chars.next() {
        Some((_, c @ ('\'' | '"'))) => c,
        _ => return Err(nom::Err::Error(Error::new(input, ErrorKind::Char))),
    };

    let mut out = String::new();
    let mut escaped = false;
    for (idx, c) in chars {
        if escaped {
            out.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Ok((&input[idx + c.len_utf8()..], out));
        } else {
            out.push(c);
        }
    }
    Err(nom::Err::Error(Error::new(input, ErrorKind::Char)))
}

/// Quoted or bare identifier.
pub fn identifier(input: &str) -> IResult<&str, String> {
    if input.starts_with('\'') || input.starts_with('"') {
        quoted_string(input)
    } else {
        bare_identifier(input)
    }
}

/// List separator: `,` with surrounding whitespace.
pub fn comma(input: &str) -> IResult<&str, ()> {
    let (input, _) = multispace0(input)?;
    let (input, _) = char(',').parse(input)?;
    let (input, _) = multispace0(input)?;
    Ok((input, ()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kw_is_word_bounded() {
        assert!(kw("SELECT")("SELECT name").is_ok());
        assert!(kw("SELECT")("select name").is_ok());
        // A property merely starting with a keyword is not shadowed.
        assert!(kw("SELECT")("selected = 1").is_err());
    }

    #[test]
    fn test_multiword_kw() {
        let (rest, _) = kw("TAGGED WITH")("TAGGED WITH 'rss'").unwrap();
        assert_eq!(rest, " 'rss'");
        assert!(kw("TAGGED WITH")("TAGGEDWITH x").is_err());
        assert!(kw("THIS CARD")("this   card.size").is_ok());
    }

    #[test]
    fn test_quoted_string_preserves_escaped_quote() {
        let (rest, s) = quoted_string(r"'it\'s done' rest").unwrap();
        assert_eq!(s, "it's done");
        assert_eq!(rest, " rest");

        let (_, s) = quoted_string(r#""a \"b\" c""#).unwrap();
        assert_eq!(s, "a \"b\" c");
    }

    #[test]
    fn test_bare_identifier_accepts_numeric_literals() {
        let (rest, s) = bare_identifier("2.0 AND x").unwrap();
        assert_eq!(s, "2.0");
        assert_eq!(rest, " AND x");
    }
}
