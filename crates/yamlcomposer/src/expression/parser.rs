//! expression grammar on top of the token stream
use super::lexer::{lexer, Span, Token};
use super::ExpressionError;
use crate::value::Value;
use chumsky::{input::ValueInput, pratt::*, prelude::*};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Variable(String),
    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    Negate(Box<Expr>),
    Not(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    /// `then if condition else otherwise`
    Conditional {
        then: Box<Expr>,
        condition: Box<Expr>,
        otherwise: Option<Box<Expr>>,
    },
    Attribute(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    /// filters (`input | name(args)`) and methods (`input.name(args)`)
    Call {
        name: String,
        input: Box<Expr>,
        args: Vec<Argument>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    FloorDivide,
    Modulo,
    Concat,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    In,
    NotIn,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: Option<String>,
    pub value: Expr,
}

type ParseError<'src> = Rich<'src, Token<'src>, Span>;

/// Parses a complete expression
pub fn parse(source: &str) -> Result<Expr, ExpressionError> {
    let tokens = lexer().parse(source).into_result().map_err(first_error)?;

    let input = tokens
        .as_slice()
        .map(Span::from(source.len()..source.len()), |(token, span)| (token, span));
    let expr = parser().parse(input).into_result().map_err(first_error)?;
    Ok(expr)
}

fn first_error<T: fmt::Display>(errors: Vec<Rich<'_, T, Span>>) -> ExpressionError {
    match errors.into_iter().next() {
        Some(error) => ExpressionError::Parse {
            message: error.reason().to_string(),
            offset: error.span().start,
        },
        None => ExpressionError::Parse {
            message: "invalid expression".to_string(),
            offset: 0,
        },
    }
}

fn symbol<'src, I>(
    symbol: &'static str,
) -> impl Parser<'src, I, Token<'src>, extra::Err<ParseError<'src>>> + Clone
where
    I: ValueInput<'src, Token = Token<'src>, Span = Span>,
{
    just(Token::Symbol(symbol))
}

fn keyword<'src, I>(
    keyword: &'static str,
) -> impl Parser<'src, I, Token<'src>, extra::Err<ParseError<'src>>> + Clone
where
    I: ValueInput<'src, Token = Token<'src>, Span = Span>,
{
    just(Token::Ident(keyword))
}

const KEYWORDS: &[&str] = &["if", "else", "and", "or", "not", "in"];

fn number(text: &str) -> Option<Value> {
    let text = text.replace('_', "");
    if text.contains(['.', 'e', 'E']) {
        text.parse().ok().map(Value::Float)
    } else {
        text.parse().ok().map(Value::Integer)
    }
}

/// `a.0.1` lexes the indexes as the number `0.1`
fn indexes(text: &str) -> Option<Vec<i64>> {
    text.split('.')
        .map(|index| index.replace('_', "").parse().ok())
        .collect()
}

/// What may follow an operand: `.name`, `.name(args)`, `.0` or `[index]`
enum Access {
    Attribute(String),
    Method(String, Vec<Argument>),
    Indexes(Vec<i64>),
    Index(Expr),
}

fn parser<'src, I>() -> impl Parser<'src, I, Expr, extra::Err<ParseError<'src>>>
where
    I: ValueInput<'src, Token = Token<'src>, Span = Span>,
{
    recursive(|expr| {
        let name = select! { Token::Ident(name) => name };

        let literal = select! {
            Token::Ident("true" | "True") => Value::Bool(true),
            Token::Ident("false" | "False") => Value::Bool(false),
            Token::Ident("null" | "None" | "none") => Value::Null,
            Token::String(text) => Value::String(text),
        };
        let numeric = select! { Token::Number(text) => text }.try_map(|text, span| {
            number(text).ok_or_else(|| Rich::custom(span, format!("invalid number '{text}'")))
        });
        let variable = name
            .clone()
            .filter(|name| !KEYWORDS.contains(name))
            .map(|name| Expr::Variable(name.to_string()));

        let list = expr
            .clone()
            .separated_by(symbol(","))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(symbol("["), symbol("]"))
            .map(Expr::List);

        let map_key = choice((
            name.clone()
                .then_ignore(symbol(":"))
                .map(|key| Expr::Literal(Value::from(key))),
            expr.clone().then_ignore(symbol(":")),
        ));
        let map = map_key
            .then(expr.clone())
            .separated_by(symbol(","))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(symbol("{"), symbol("}"))
            .map(Expr::Map);

        let nested = expr.clone().delimited_by(symbol("("), symbol(")"));

        let atom = choice((
            literal.map(Expr::Literal),
            numeric.map(Expr::Literal),
            variable,
            list,
            map,
            nested,
        ));

        let arguments = name
            .clone()
            .then_ignore(symbol("="))
            .or_not()
            .then(expr.clone())
            .map(|(name, value)| Argument {
                name: name.map(str::to_string),
                value,
            })
            .separated_by(symbol(","))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(symbol("("), symbol(")"));

        let dotted = symbol(".").ignore_then(choice((
            name.clone()
                .then(arguments.clone().or_not())
                .map(|(name, arguments)| match arguments {
                    Some(arguments) => Access::Method(name.to_string(), arguments),
                    None => Access::Attribute(name.to_string()),
                }),
            select! { Token::Number(text) => text }.try_map(|text, span| {
                indexes(text)
                    .map(Access::Indexes)
                    .ok_or_else(|| Rich::custom(span, format!("invalid index '{text}'")))
            }),
        )));
        let indexed = expr
            .clone()
            .delimited_by(symbol("["), symbol("]"))
            .map(Access::Index);

        let operand = atom.foldl(dotted.or(indexed).repeated(), |target, access| match access {
            Access::Attribute(name) => Expr::Attribute(Box::new(target), name),
            Access::Method(name, args) => Expr::Call {
                name,
                input: Box::new(target),
                args,
            },
            Access::Indexes(indexes) => indexes.into_iter().fold(target, |target, index| {
                Expr::Index(Box::new(target), Box::new(Expr::Literal(Value::Integer(index))))
            }),
            Access::Index(index) => Expr::Index(Box::new(target), Box::new(index)),
        });

        let filter = symbol("|").ignore_then(name.then(arguments.or_not()));

        let comparison = select! {
            Token::Symbol("==") => BinaryOp::Equal,
            Token::Symbol("!=") => BinaryOp::NotEqual,
            Token::Symbol("<") => BinaryOp::Less,
            Token::Symbol("<=") => BinaryOp::LessEqual,
            Token::Symbol(">") => BinaryOp::Greater,
            Token::Symbol(">=") => BinaryOp::GreaterEqual,
            Token::Ident("in") => BinaryOp::In,
        }
        .or(keyword("not").then(keyword("in")).to(BinaryOp::NotIn));
        let additive = select! {
            Token::Symbol("+") => BinaryOp::Add,
            Token::Symbol("-") => BinaryOp::Subtract,
        };
        let multiplicative = select! {
            Token::Symbol("*") => BinaryOp::Multiply,
            Token::Symbol("/") => BinaryOp::Divide,
            Token::Symbol("//") => BinaryOp::FloorDivide,
            Token::Symbol("%") => BinaryOp::Modulo,
        };

        // lowest binding power first
        let operators = operand
            .pratt((
                infix(left(1), keyword("or").or(symbol("||")), |lhs, _, rhs, _| {
                    Expr::Or(Box::new(lhs), Box::new(rhs))
                }),
                infix(left(2), keyword("and").or(symbol("&&")), |lhs, _, rhs, _| {
                    Expr::And(Box::new(lhs), Box::new(rhs))
                }),
                prefix(3, keyword("not").or(symbol("!")), |_, inner, _| {
                    Expr::Not(Box::new(inner))
                }),
                infix(left(4), comparison, |lhs, op, rhs, _| {
                    Expr::Binary(op, Box::new(lhs), Box::new(rhs))
                }),
                infix(left(5), symbol("~"), |lhs, _, rhs, _| {
                    Expr::Binary(BinaryOp::Concat, Box::new(lhs), Box::new(rhs))
                }),
                infix(left(6), additive, |lhs, op, rhs, _| {
                    Expr::Binary(op, Box::new(lhs), Box::new(rhs))
                }),
                infix(left(7), multiplicative, |lhs, op, rhs, _| {
                    Expr::Binary(op, Box::new(lhs), Box::new(rhs))
                }),
                prefix(8, symbol("-"), |_, inner, _| Expr::Negate(Box::new(inner))),
                prefix(8, symbol("+"), |_, inner, _| inner),
                postfix(9, filter, |input, (name, args), _| Expr::Call {
                    name: String::from(name),
                    input: Box::new(input),
                    args: Option::unwrap_or_default(args),
                }),
            ))
            .boxed();

        // `then if condition else otherwise`, the condition is not a ternary itself
        operators
            .clone()
            .then(
                keyword("if")
                    .ignore_then(operators)
                    .then(keyword("else").ignore_then(expr).or_not())
                    .or_not(),
            )
            .map(|(then, conditional)| match conditional {
                None => then,
                Some((condition, otherwise)) => Expr::Conditional {
                    then: Box::new(then),
                    condition: Box::new(condition),
                    otherwise: otherwise.map(Box::new),
                },
            })
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn var(name: &str) -> Box<Expr> {
        Box::new(Expr::Variable(name.into()))
    }

    fn int(i: i64) -> Box<Expr> {
        Box::new(Expr::Literal(Value::Integer(i)))
    }

    #[test]
    fn precedence() {
        assert_eq!(
            parse("a + b * 2").expect("valid"),
            Expr::Binary(
                BinaryOp::Add,
                var("a"),
                Box::new(Expr::Binary(BinaryOp::Multiply, var("b"), int(2)))
            )
        );
        assert_eq!(
            parse("not a == 1 and b").expect("valid"),
            Expr::And(
                Box::new(Expr::Not(Box::new(Expr::Binary(
                    BinaryOp::Equal,
                    var("a"),
                    int(1)
                )))),
                var("b")
            )
        );
    }

    #[test]
    fn filters_bind_tighter_than_arithmetic() {
        assert_eq!(
            parse("-x | abs").expect("valid"),
            Expr::Negate(Box::new(Expr::Call {
                name: "abs".into(),
                input: var("x"),
                args: vec![],
            }))
        );
    }

    #[test]
    fn filter_arguments() {
        let expr = parse("name | default('x', boolean=true)").expect("valid");
        let Expr::Call { name, args, .. } = expr else {
            panic!("expected call, got {expr:?}");
        };
        assert_eq!(name, "default");
        assert_eq!(args.len(), 2);
        assert_eq!(args[1].name.as_deref(), Some("boolean"));
    }

    #[test]
    fn methods_attributes_and_indexes() {
        assert_eq!(
            parse("a.b[0].upper()").expect("valid"),
            Expr::Call {
                name: "upper".into(),
                input: Box::new(Expr::Index(
                    Box::new(Expr::Attribute(var("a"), "b".into())),
                    int(0)
                )),
                args: vec![],
            }
        );
    }

    #[test]
    fn ternary_and_not_in() {
        assert_eq!(
            parse("'x' if a not in b").expect("valid"),
            Expr::Conditional {
                then: Box::new(Expr::Literal(Value::from("x"))),
                condition: Box::new(Expr::Binary(BinaryOp::NotIn, var("a"), var("b"))),
                otherwise: None,
            }
        );
    }

    #[test]
    fn literals() {
        assert_eq!(
            parse("{a: 1, 'b c': [true, None,]}").expect("valid"),
            Expr::Map(vec![
                (Expr::Literal(Value::from("a")), Expr::Literal(Value::Integer(1))),
                (
                    Expr::Literal(Value::from("b c")),
                    Expr::List(vec![
                        Expr::Literal(Value::Bool(true)),
                        Expr::Literal(Value::Null)
                    ])
                ),
            ])
        );
    }

    #[test]
    fn errors() {
        assert!(matches!(parse("a +"), Err(ExpressionError::Parse { .. })));
        assert!(matches!(
            parse("a b"),
            Err(ExpressionError::Parse { offset: 2, .. })
        ));
        assert!(matches!(parse("(a"), Err(ExpressionError::Parse { .. })));
        assert!(matches!(parse(""), Err(ExpressionError::Parse { .. })));
        assert!(matches!(
            parse("a ? b"),
            Err(ExpressionError::Parse { offset: 2, .. })
        ));
    }

    #[test]
    fn chained_numeric_indexes() {
        assert_eq!(
            parse("a.0.1").expect("valid"),
            Expr::Index(Box::new(Expr::Index(var("a"), int(0))), int(1))
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(parse("1_000").expect("valid"), *int(1000));
        assert_eq!(
            parse("1.5e2").expect("valid"),
            Expr::Literal(Value::Float(150.0))
        );
        assert!(matches!(
            parse("99999999999999999999"),
            Err(ExpressionError::Parse { offset: 0, .. })
        ));
    }

    #[test]
    fn else_chains_are_right_associative() {
        assert_eq!(
            parse("1 if a else 2 if b else 3").expect("valid"),
            Expr::Conditional {
                then: int(1),
                condition: var("a"),
                otherwise: Some(Box::new(Expr::Conditional {
                    then: int(2),
                    condition: var("b"),
                    otherwise: Some(int(3)),
                })),
            }
        );
    }
}
