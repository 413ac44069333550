use chumsky::prelude::*;
use std::fmt;

pub type Span = SimpleSpan;
pub type LexError<'src> = Rich<'src, char, Span>;

#[derive(Debug, Clone, PartialEq)]
pub enum Token<'src> {
    /// digits with an optional fraction and exponent, `0.1` after a `.` indexes twice
    Number(&'src str),
    String(String),
    Ident(&'src str),
    /// operators and punctuation
    Symbol(&'static str),
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(text) => f.write_str(text),
            Token::String(text) => write!(f, "'{text}'"),
            Token::Ident(ident) => f.write_str(ident),
            Token::Symbol(symbol) => f.write_str(symbol),
        }
    }
}

/// longest symbols first so that `//` wins over `/`
const SYMBOLS: &[&str] = &[
    "==", "!=", "<=", ">=", "//", "&&", "||", "(", ")", "[", "]", "{", "}", ",", ":", ".", "|",
    "+", "-", "*", "/", "%", "~", "<", ">", "!", "=",
];

pub fn lexer<'src>(
) -> impl Parser<'src, &'src str, Vec<(Token<'src>, Span)>, extra::Err<LexError<'src>>> {
    let digits = any()
        .filter(char::is_ascii_digit)
        .then(any().filter(|c: &char| c.is_ascii_digit() || *c == '_').repeated());

    let exponent = one_of("eE")
        .then(one_of("+-").or_not())
        .then(digits.clone());

    let number = digits
        .clone()
        .then(just('.').then(digits.clone()).or_not())
        .then(exponent.or_not())
        .to_slice()
        .map(Token::Number);

    let escape = just('\\').ignore_then(any().map(|escaped| match escaped {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        other => other,
    }));

    let quoted = |quote: char| {
        just(quote)
            .ignore_then(
                escape
                    .clone()
                    .or(any().filter(move |c: &char| *c != quote && *c != '\\'))
                    .repeated()
                    .collect::<String>(),
            )
            .then_ignore(just(quote))
    };
    let string = quoted('\'').or(quoted('"')).map(Token::String);

    let ident = any()
        .filter(|c: &char| c.is_alphabetic() || *c == '_')
        .then(any().filter(|c: &char| c.is_alphanumeric() || *c == '_').repeated())
        .to_slice()
        .map(Token::Ident);

    let symbol = choice(SYMBOLS.iter().map(|symbol| just::<&'src str, _, _>(*symbol).to(*symbol)).collect::<Vec<_>>())
        .map(Token::Symbol);

    choice((number, string, ident, symbol))
        .map_with(|token, extra| (token, extra.span()))
        .padded()
        .repeated()
        .collect()
        .then_ignore(end())
}
