//! the `${ ... }` expression language
//!
//! A small, side-effect free language evaluated against a [Variables](crate::variables::Variables) scope.
//!
//! ```text
//! name | default('unnamed')
//! 'on' if enabled else 'off'
//! VARS['key with spaces'].items[0] ~ '-' ~ package_id | upper
//! ```
//!
//! Evaluation never produces a hard error for the composer. Every [ExpressionError] and every undefined variable is
//! turned into a warning by the caller and the expression counts as undefined (`None`).
mod eval;
mod functions;
mod lexer;
mod parser;

pub use eval::Evaluator;
pub use parser::{parse, Argument, BinaryOp, Expr};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("{message} at offset {offset}")]
    Parse { message: String, offset: usize },
    #[error("Unknown function '{0}'")]
    UnknownFunction(String),
    #[error("'{function}' takes {expected} argument(s), got {got}")]
    Arity {
        function: &'static str,
        expected: String,
        got: usize,
    },
    #[error("{0}")]
    Type(String),
    #[error("Division by zero")]
    DivisionByZero,
}

impl ExpressionError {
    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        ExpressionError::Type(message.into())
    }
}

#[cfg(test)]
use crate::variables::Variables;

#[cfg(test)]
pub(crate) fn evaluate_str(
    source: &str,
    scope: &Variables,
) -> Result<Option<crate::value::Value>, ExpressionError> {
    Evaluator::new(scope).evaluate(source)
}
