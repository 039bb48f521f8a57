//! Lexical pieces of the prefix query syntax.

use nom::{
    bytes::complete::{take_till1, take_while1},
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{map, map_res, opt},
    number::complete::double,
    sequence::{preceded, terminated, tuple},
    IResult,
};

/// `#name[/distance](`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorHead<'a> {
    pub name: &'a str,
    pub distance: Option<u32>,
}

fn distance(input: &str) -> IResult<&str, u32> {
    map_res(digit1, str::parse::<u32>)(input)
}

/// Parse an operator head, leaving the input just past the opening paren.
pub fn operator_head(input: &str) -> IResult<&str, OperatorHead<'_>> {
    map(
        tuple((
            char('#'),
            take_while1(|c: char| c.is_ascii_alphanumeric()),
            opt(preceded(char('/'), distance)),
            multispace0,
            char('('),
        )),
        |(_, name, distance, _, _)| OperatorHead { name, distance },
    )(input)
}

/// Parse an argument weight, which must be followed by whitespace.
pub fn weight(input: &str) -> IResult<&str, f64> {
    terminated(double, multispace1)(input)
}

/// Parse a whitespace-delimited term token.
pub fn term_token(input: &str) -> IResult<&str, &str> {
    take_till1(char::is_whitespace)(input)
}

/// Split `text.field` into its parts. The field is absent when there is no dot or nothing
/// follows it.
pub fn split_field(token: &str) -> (&str, Option<&str>) {
    match token.split_once('.') {
        Some((text, field)) if !field.is_empty() => (text, Some(field)),
        Some((text, _)) => (text, None),
        None => (token, None),
    }
}

/// Split trailing digits off an operator name: `uw8` gives `("uw", Some(8))`.
pub fn split_trailing_number(name: &str) -> (&str, Option<u32>) {
    let prefix = name.trim_end_matches(|c: char| c.is_ascii_digit());
    let digits = &name[prefix.len()..];
    (prefix, digits.parse().ok())
}

/// Byte offset of the paren closing the one at `open`.
pub fn matching_paren(input: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, c) in input[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Byte offset of the first paren that breaks balance, or `input.len()` when an opener is
/// left unclosed.
pub fn unbalanced_at(input: &str) -> Option<usize> {
    let mut open = Vec::new();
    for (offset, c) in input.char_indices() {
        match c {
            '(' => open.push(offset),
            ')' => {
                if open.pop().is_none() {
                    return Some(offset);
                }
            }
            _ => {}
        }
    }
    open.first().copied()
}
