//! Command line list parsers using nom.
//!
//! # Syntax Overview
//!
//! ```text
//! --set  "updated_at=NOW(), status='active', retries=0"
//!         ─────┬─────────── ────────┬──────── ────┬────
//!              │                    │             └── number literal
//!              │                    └── quoted string, escaped on output
//!              └── bare expression, embedded verbatim
//!
//! --exclude "id, created_at, `order`"
//! ```

use nom::{
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, multispace0},
    combinator::{map, recognize},
    multi::separated_list1,
    sequence::{delimited, tuple},
    IResult,
};

use crate::error::{UpsertError, UpsertResult};
use crate::value::SqlValue;

/// Parse an assignment list such as `a=1, b='x', c=NOW()`.
pub fn parse_assignments(input: &str) -> UpsertResult<Vec<(String, SqlValue)>> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Vec::new());
    }
    finish(input, assignment_list(input))
}

/// Parse a column list such as `id, created_at`.
pub fn parse_columns(input: &str) -> UpsertResult<Vec<String>> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Vec::new());
    }
    finish(input, column_list(input))
}

fn finish<T>(input: &str, result: IResult<&str, T>) -> UpsertResult<T> {
    match result {
        Ok((remaining, value)) if remaining.trim().is_empty() => Ok(value),
        Ok((remaining, _)) => Err(UpsertError::parse(
            input.len() - remaining.len(),
            format!("Unexpected trailing content: '{}'", remaining),
        )),
        Err(e) => Err(UpsertError::parse(0, format!("Parse failed: {:?}", e))),
    }
}

fn comma(input: &str) -> IResult<&str, char> {
    delimited(multispace0, char(','), multispace0)(input)
}

fn assignment_list(input: &str) -> IResult<&str, Vec<(String, SqlValue)>> {
    separated_list1(comma, assignment)(input)
}

fn column_list(input: &str) -> IResult<&str, Vec<String>> {
    separated_list1(comma, map(identifier, str::to_string))(input)
}

/// `column = value`
fn assignment(input: &str) -> IResult<&str, (String, SqlValue)> {
    let (input, (column, _, _, _, value)) =
        tuple((identifier, multispace0, char('='), multispace0, value))(input)?;
    Ok((input, (column.to_string(), value)))
}

/// A bare identifier (optionally dotted) or a backtick-quoted one.
fn identifier(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(delimited(char('`'), take_while1(|c: char| c != '`'), char('`'))),
        take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '$' || c == '.'),
    ))(input)
}

fn value(input: &str) -> IResult<&str, SqlValue> {
    alt((
        map(single_quoted, SqlValue::String),
        map(double_quoted, SqlValue::String),
        map(raw_expr, classify),
    ))(input)
}

fn single_quoted(input: &str) -> IResult<&str, String> {
    quoted('\'', input)
}

fn double_quoted(input: &str) -> IResult<&str, String> {
    quoted('"', input)
}

/// A string in `q` quotes. Backslash escapes and doubled quotes are
/// unescaped.
fn quoted(q: char, input: &str) -> IResult<&str, String> {
    let (rest, _) = char(q)(input)?;
    let mut out = String::new();
    let mut chars = rest.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            if let Some((_, escaped)) = chars.next() {
                out.push(match escaped {
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    '0' => '\0',
                    other => other,
                });
            }
        } else if c == q {
            if matches!(chars.peek(), Some((_, next)) if *next == q) {
                chars.next();
                out.push(q);
            } else {
                return Ok((&rest[i + c.len_utf8()..], out));
            }
        } else {
            out.push(c);
        }
    }
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Char,
    )))
}

/// Everything up to the next top-level comma, with balanced parentheses.
fn raw_expr(input: &str) -> IResult<&str, &str> {
    let mut depth = 0usize;
    let mut in_quote: Option<char> = None;
    let mut end = input.len();

    for (i, c) in input.char_indices() {
        match (in_quote, c) {
            (Some(q), c) if c == q => in_quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => in_quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') if depth == 0 => {
                end = i;
                break;
            }
            (None, ')') => depth -= 1,
            (None, ',') if depth == 0 => {
                end = i;
                break;
            }
            _ => {}
        }
    }

    let expr = input[..end].trim_end();
    if expr.is_empty() || depth != 0 || in_quote.is_some() {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::TakeWhile1,
        )));
    }
    Ok((&input[expr.len()..], expr))
}

/// Turn a bare token into a typed literal where it is one.
fn classify(token: &str) -> SqlValue {
    if token.eq_ignore_ascii_case("null") {
        SqlValue::Null
    } else if token.eq_ignore_ascii_case("true") {
        SqlValue::Bool(true)
    } else if token.eq_ignore_ascii_case("false") {
        SqlValue::Bool(false)
    } else if let Ok(n) = token.parse::<i64>() {
        SqlValue::Int(n)
    } else if let Ok(f) = token.parse::<f64>().map_err(|_| ()).and_then(finite) {
        SqlValue::Float(f)
    } else {
        SqlValue::Raw(token.to_string())
    }
}

fn finite(f: f64) -> Result<f64, ()> {
    if f.is_finite() { Ok(f) } else { Err(()) }
}
