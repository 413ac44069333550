//! `${ ... }` placeholders inside strings
//!
//! A string consisting of exactly one placeholder evaluates to the native value of the expression. Anything else
//! is spliced together as a string.
//!
//! ```yaml
//! port: !sub ${ base_port + 1 }        # integer
//! url: !sub http://${ host }:${ port } # string
//! ```
//!
//! Delimiters are configurable through a [Pattern]. Matching is quote aware so `${ x | default('}') }` works, and
//! one level of nested brackets (`${ {'a': 1}['a'] }`) is tracked as well.
use crate::diagnostics::BufferedLogger;
use crate::expression::{Evaluator, ExpressionError};
use crate::value::Value;
use crate::variables::Variables;
use std::fmt;

/// Placeholder delimiters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    prefix: String,
    suffix: String,
}

impl Default for Pattern {
    fn default() -> Self {
        Pattern {
            prefix: "${".to_string(),
            suffix: "}".to_string(),
        }
    }
}

impl Pattern {
    /// Parses `PREFIX..SUFFIX`, e.g. `$[[..]]`
    pub fn parse(delimiters: &str) -> Option<Pattern> {
        let (prefix, suffix) = delimiters.split_once("..")?;
        if prefix.is_empty() || suffix.is_empty() {
            return None;
        }
        Some(Pattern {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// bracket opened by the prefix (`{` for `${`)
    fn opener(&self) -> Option<char> {
        self.prefix.chars().last()
    }

    /// bracket closed by the suffix (`}` for `}`)
    fn closer(&self) -> Option<char> {
        self.suffix.chars().next()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.prefix, self.suffix)
    }
}

/// A placeholder found in a string, byte offsets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder<'t> {
    pub start: usize,
    pub end: usize,
    pub expression: &'t str,
}

/// Finds all placeholders of `pattern` in `text`
pub fn placeholders<'t>(text: &'t str, pattern: &Pattern) -> Vec<Placeholder<'t>> {
    let mut found = Vec::new();
    let mut position = 0;

    while let Some(relative) = text[position..].find(pattern.prefix()) {
        let start = position + relative;
        let content_start = start + pattern.prefix().len();

        let Some(content_end) = closing(text, content_start, pattern) else {
            break;
        };
        let end = content_end + pattern.suffix().len();

        found.push(Placeholder {
            start,
            end,
            expression: &text[content_start..content_end],
        });
        position = end;
    }

    found
}

/// Byte offset of the suffix closing a placeholder whose content starts at `from`
fn closing(text: &str, from: usize, pattern: &Pattern) -> Option<usize> {
    let opener = pattern.opener();
    let closer = pattern.closer();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut depth = 0usize;

    for (offset, c) in text[from..].char_indices() {
        let index = from + offset;

        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        if depth == 0 && text[index..].starts_with(pattern.suffix()) {
            return Some(index);
        }

        match c {
            '\'' | '"' => quote = Some(c),
            c if Some(c) == closer => depth = depth.saturating_sub(1),
            c if Some(c) == opener => depth += 1,
            _ => {}
        }
    }

    // unbalanced quotes or brackets, fall back to the next suffix
    text[from..].find(pattern.suffix()).map(|offset| from + offset)
}

/// Interpolates all placeholders of `text`
///
/// Returns `None` if `text` contains no placeholder. Failures are logged and count as null.
pub fn interpolate(
    text: &str,
    pattern: &Pattern,
    scope: &Variables,
    logger: &BufferedLogger,
) -> Option<Value> {
    let placeholders = placeholders(text, pattern);
    if placeholders.is_empty() {
        return None;
    }

    if let [single] = placeholders.as_slice() {
        if single.start == 0 && single.end == text.len() {
            return Some(evaluate(single.expression, scope, logger).unwrap_or_default());
        }
    }

    let mut result = String::with_capacity(text.len());
    let mut position = 0;
    for placeholder in &placeholders {
        result.push_str(&text[position..placeholder.start]);
        if let Some(value) = evaluate(placeholder.expression, scope, logger) {
            result.push_str(&value.to_string());
        }
        position = placeholder.end;
    }
    result.push_str(&text[position..]);

    Some(Value::String(result))
}

/// Evaluates a single expression, logging failures
pub(crate) fn evaluate(
    expression: &str,
    scope: &Variables,
    logger: &BufferedLogger,
) -> Option<Value> {
    if expression.trim().is_empty() {
        return None;
    }

    let mut evaluator = Evaluator::new(scope);
    let result = evaluator.evaluate(expression);
    for warning in evaluator.into_warnings() {
        logger.warn(warning);
    }

    match result {
        Ok(value) => value,
        Err(error @ ExpressionError::Parse { .. }) => {
            logger.warn(format!("Error parsing '{}': {error}", expression.trim()));
            None
        }
        Err(error) => {
            logger.warn(format!("Error evaluating '{}': {error}", expression.trim()));
            None
        }
    }
}
