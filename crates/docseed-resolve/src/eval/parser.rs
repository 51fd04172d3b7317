//! `nom` grammar for `$eval` expressions.

use std::cell::Cell;

use nom::branch::alt;
use nom::bytes::complete::{is_not, tag, take_while};
use nom::character::complete::{anychar, char, digit0, digit1, multispace0, one_of, satisfy};
use nom::combinator::{cut, eof, map, map_res, not, opt, recognize, value};
use nom::error::{ErrorKind, ParseError, VerboseError, VerboseErrorKind};
use nom::multi::{fold_many0, separated_list0};
use nom::sequence::{delimited, pair, preceded, separated_pair, terminated, tuple};
use nom::{Finish, IResult};
use serde_json::Value;

/// Deepest nesting of sub-expressions, unary operators and postfix accesses.
pub(super) const MAX_DEPTH: usize = 64;

const TOO_DEEP: &str = "expression nested too deeply";

type PResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Expr {
    Literal(Value),
    This,
    Global(String),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    Unary(&'static str, Box<Expr>),
    /// Operators of one precedence level applied left to right.
    Binary(Box<Expr>, usize, Vec<(&'static str, Expr)>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

/// Binary operator levels, loosest first; longer spellings first per level.
const BINARY_LEVELS: &[&[&str]] = &[
    &["??"],
    &["||"],
    &["&&"],
    &["===", "!==", "==", "!="],
    &["<=", ">=", "<", ">"],
    &["+", "-"],
    &["*", "/", "%"],
];

/// Parse a complete expression.
pub(super) fn parse(source: &str) -> Result<Expr, String> {
    if source.trim().is_empty() {
        return Err("empty expression".to_string());
    }
    let grammar = Grammar::default();
    let parsed = terminated(|input| grammar.expression(input), pair(multispace0, eof))(source)
        .finish();
    match parsed {
        Ok((_, expr)) => Ok(expr),
        Err(err) => Err(describe(source, &err)),
    }
}

fn describe(source: &str, err: &VerboseError<&str>) -> String {
    let Some((rest, kind)) = err.errors.first() else {
        return "invalid expression".to_string();
    };
    let offset = source.len() - rest.len();
    match kind {
        VerboseErrorKind::Context(context) => format!("{context} at {offset}"),
        _ if rest.trim().is_empty() => "unexpected end of expression".to_string(),
        _ => format!("unexpected input at {offset}"),
    }
}

#[derive(Default)]
struct Grammar {
    depth: Cell<usize>,
}

/// Holds one level of nesting until dropped.
struct Nesting<'g>(&'g Cell<usize>);

impl Drop for Nesting<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

impl Grammar {
    fn nest<'a>(&self, input: &'a str) -> Result<Nesting<'_>, nom::Err<VerboseError<&'a str>>> {
        let depth = self.depth.get() + 1;
        if depth > MAX_DEPTH {
            return Err(nom::Err::Failure(VerboseError {
                errors: vec![(input, VerboseErrorKind::Context(TOO_DEEP))],
            }));
        }
        self.depth.set(depth);
        Ok(Nesting(&self.depth))
    }

    fn expression<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        let _nesting = self.nest(input)?;
        self.conditional(input)
    }

    fn conditional<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        let (input, test) = self.binary(input, 0)?;
        let (input, branches) = opt(preceded(
            symbol("?"),
            cut(separated_pair(
                |i| self.expression(i),
                symbol(":"),
                |i| self.expression(i),
            )),
        ))(input)?;
        Ok((
            input,
            match branches {
                Some((consequent, alternate)) => Expr::Conditional(
                    Box::new(test),
                    Box::new(consequent),
                    Box::new(alternate),
                ),
                None => test,
            },
        ))
    }

    /// Precedence climbing; same-level runs are collected into one node so
    /// long operator chains stay flat.
    fn binary<'a>(&self, input: &'a str, min_level: usize) -> PResult<'a, Expr> {
        let (mut input, mut left) = self.unary(input)?;
        while let Ok((after_op, (op, level))) = operator(input, min_level) {
            let (after, right) = cut(|i| self.binary(i, level + 1))(after_op)?;
            left = match left {
                Expr::Binary(head, found, mut rest) if found == level => {
                    rest.push((op, right));
                    Expr::Binary(head, level, rest)
                }
                other => Expr::Binary(Box::new(other), level, vec![(op, right)]),
            };
            input = after;
        }
        Ok((input, left))
    }

    fn unary<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        let (input, op) = opt(preceded(
            multispace0,
            alt((
                value("!", char('!')),
                value("-", char('-')),
                value("+", char('+')),
                value("typeof", keyword("typeof")),
            )),
        ))(input)?;
        let Some(op) = op else {
            return self.postfix(input);
        };
        let _nesting = self.nest(input)?;
        let (input, operand) = cut(|i| self.unary(i))(input)?;
        Ok((input, Expr::Unary(op, Box::new(operand))))
    }

    fn postfix<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        let (mut input, mut expr) = self.primary(input)?;
        let mut nestings = Vec::new();
        loop {
            let (rest, step) = opt(preceded(
                multispace0,
                alt((
                    map(
                        preceded(char('.'), cut(preceded(multispace0, identifier))),
                        |name: &str| Step::Member(name.to_string()),
                    ),
                    map(
                        preceded(char('['), cut(terminated(|i| self.expression(i), symbol("]")))),
                        Step::Index,
                    ),
                    map(preceded(char('('), cut(|i| self.list(i, ")"))), Step::Call),
                )),
            ))(input)?;
            let Some(step) = step else {
                return Ok((input, expr));
            };
            nestings.push(self.nest(rest)?);
            expr = match step {
                Step::Member(name) => Expr::Member(Box::new(expr), name),
                Step::Index(index) => Expr::Index(Box::new(expr), Box::new(index)),
                Step::Call(args) => Expr::Call(Box::new(expr), args),
            };
            input = rest;
        }
    }

    fn primary<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        preceded(
            multispace0,
            alt((
                map(number, |number| Expr::Literal(super::number_value(number))),
                map(string, |text| Expr::Literal(Value::String(text))),
                map(identifier, word),
                delimited(char('('), |i| self.expression(i), cut(symbol(")"))),
                map(preceded(char('['), cut(|i| self.list(i, "]"))), Expr::Array),
                preceded(char('{'), cut(|i| self.object(i))),
            )),
        )(input)
    }

    /// Comma separated expressions up to `close`; a trailing comma is allowed.
    fn list<'a>(&self, input: &'a str, close: &'static str) -> PResult<'a, Vec<Expr>> {
        terminated(
            terminated(
                separated_list0(symbol(","), |i| self.expression(i)),
                opt(symbol(",")),
            ),
            symbol(close),
        )(input)
    }

    fn object<'a>(&self, input: &'a str) -> PResult<'a, Expr> {
        let entry = separated_pair(
            preceded(multispace0, property_key),
            symbol(":"),
            |i| self.expression(i),
        );
        map(
            terminated(
                terminated(separated_list0(symbol(","), entry), opt(symbol(","))),
                symbol("}"),
            ),
            Expr::Object,
        )(input)
    }
}

enum Step {
    Member(String),
    Index(Expr),
    Call(Vec<Expr>),
}

fn word(name: &str) -> Expr {
    match name {
        "this" => Expr::This,
        "true" => Expr::Literal(Value::Bool(true)),
        "false" => Expr::Literal(Value::Bool(false)),
        "null" | "undefined" | "NaN" | "Infinity" => Expr::Literal(Value::Null),
        _ => Expr::Global(name.to_string()),
    }
}

fn operator(input: &str, min_level: usize) -> PResult<'_, (&'static str, usize)> {
    let (input, _) = multispace0(input)?;
    for (level, operators) in BINARY_LEVELS.iter().enumerate().skip(min_level) {
        for op in operators.iter() {
            if let Ok((rest, _)) = tag::<_, _, VerboseError<&str>>(*op)(input) {
                return Ok((rest, (*op, level)));
            }
        }
    }
    Err(nom::Err::Error(VerboseError::from_error_kind(
        input,
        ErrorKind::Tag,
    )))
}

fn symbol<'a>(text: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    preceded(multispace0, tag(text))
}

fn is_identifier_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

fn identifier(input: &str) -> PResult<'_, &str> {
    recognize(pair(
        satisfy(|ch| ch.is_alphabetic() || ch == '_' || ch == '$'),
        take_while(is_identifier_char),
    ))(input)
}

fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    terminated(tag(word), not(satisfy(is_identifier_char)))
}

fn number(input: &str) -> PResult<'_, f64> {
    map_res(
        recognize(tuple((
            alt((
                recognize(pair(digit1, opt(pair(char('.'), digit0)))),
                recognize(pair(char('.'), digit1)),
            )),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        str::parse::<f64>,
    )(input)
}

fn string(input: &str) -> PResult<'_, String> {
    alt((quoted('\'', "'\\"), quoted('"', "\"\\")))(input)
}

enum Piece<'a> {
    Text(&'a str),
    Escaped(char),
}

fn quoted<'a>(
    quote: char,
    stop: &'static str,
) -> impl FnMut(&'a str) -> PResult<'a, String> {
    delimited(
        char(quote),
        fold_many0(
            alt((
                map(is_not(stop), Piece::Text),
                map(preceded(char('\\'), anychar), |escaped| {
                    Piece::Escaped(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        other => other,
                    })
                }),
            )),
            String::new,
            |mut text: String, piece: Piece<'a>| {
                match piece {
                    Piece::Text(chunk) => text.push_str(chunk),
                    Piece::Escaped(ch) => text.push(ch),
                }
                text
            },
        ),
        char(quote),
    )
}

fn property_key(input: &str) -> PResult<'_, String> {
    alt((
        map(identifier, str::to_string),
        string,
        map(number, |number| super::to_display(&super::number_value(number))),
    ))(input)
}
