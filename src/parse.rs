use crate::types::{ParseError, Path, Segment};
use nom::{
    branch::alt,
    bytes::complete::take_till1,
    character::complete::char,
    combinator::{all_consuming, map, opt, value},
    multi::separated_list1,
    sequence::delimited,
    IResult, Parser,
};
use nom_language::error::{VerboseError, VerboseErrorKind};

type Res<'a, U> = IResult<&'a str, U, VerboseError<&'a str>>;

/// Characters that can never appear inside a field name.
const RESERVED: [char; 5] = [',', '/', '(', ')', '*'];

/// Parses a fields expression into the list of paths it selects.
///
/// Groups are distributed over their prefix (`a(b,c)` is `a/b,a/c`), and trailing
/// wildcards are stripped from every path. Paths are returned in the order they are
/// written, duplicates included.
///
/// ## Arguments
///
/// * `input` - The fields expression, e.g. "items(id,author/*)"
///
/// ## Returns
///
/// Returns the exploded paths, or a `ParseError` carrying the whole input if any part of
/// it is malformed.
pub fn parse_paths(input: &str) -> Result<Vec<Path>, ParseError> {
    match all_consuming(expression).parse(input) {
        Ok((_, paths)) => Ok(paths.into_iter().map(strip_trailing_wildcards).collect()),
        Err(nom::Err::Error(err)) | Err(nom::Err::Failure(err)) => {
            Err(ParseError::new(input, describe(input, &err)))
        }
        Err(nom::Err::Incomplete(_)) => Err(ParseError::new(input, "unexpected end of input")),
    }
}

/// `a`, `a/*` and `a/*/*` all select the same thing. A lone `*` is kept.
pub fn strip_trailing_wildcards(mut path: Path) -> Path {
    while path.len() > 1 && path.last().is_some_and(Segment::is_wildcard) {
        path.pop();
    }
    path
}

fn describe(input: &str, err: &VerboseError<&str>) -> String {
    let Some((remaining, kind)) = err.errors.first() else {
        return "unknown error".to_string();
    };
    let offset = input.len() - remaining.len();
    let found = match remaining.chars().next() {
        Some(c) => format!("'{}'", c),
        None => "end of input".to_string(),
    };
    match kind {
        VerboseErrorKind::Char(expected) => {
            format!("expected '{}' but found {} at offset {}", expected, found, offset)
        }
        VerboseErrorKind::Context(context) => {
            format!("{} failed at {} (offset {})", context, found, offset)
        }
        VerboseErrorKind::Nom(_) => format!("unexpected {} at offset {}", found, offset),
    }
}

fn expression(input: &str) -> Res<'_, Vec<Path>> {
    map(
        separated_list1(char(','), selection),
        |selections: Vec<Vec<Path>>| selections.into_iter().flatten().collect(),
    )
    .parse(input)
}

fn selection(input: &str) -> Res<'_, Vec<Path>> {
    let (input, prefix) = separated_list1(char('/'), segment).parse(input)?;
    let (input, group) = opt(delimited(char('('), expression, char(')'))).parse(input)?;

    let paths = match group {
        None => vec![prefix],
        Some(children) => children
            .into_iter()
            .map(|child| prefix.iter().cloned().chain(child).collect())
            .collect(),
    };

    Ok((input, paths))
}

fn segment(input: &str) -> Res<'_, Segment> {
    alt((value(Segment::Wildcard, char('*')), field_name)).parse(input)
}

fn field_name(input: &str) -> Res<'_, Segment> {
    map(
        take_till1(|c: char| RESERVED.contains(&c) || c.is_whitespace()),
        |name: &str| Segment::Name(name.to_string()),
    )
    .parse(input)
}
