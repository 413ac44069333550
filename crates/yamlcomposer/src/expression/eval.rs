use super::functions::{self, repeat, Arguments};
use super::parser::{parse, Argument, BinaryOp, Expr};
use super::ExpressionError;
use crate::value::{Mapping, Value};
use crate::variables::Variables;
use std::cmp::Ordering;

/// name of the variable holding the whole scope
pub const VARS: &str = "VARS";

/// Evaluates expressions against a scope
///
/// `None` results mean "undefined". Warnings about undefined variables are collected and handed to the caller
/// through [Evaluator::into_warnings].
#[derive(derive_new::new)]
pub struct Evaluator<'a> {
    scope: &'a Variables,
    #[new(default)]
    warnings: Vec<String>,
}

impl<'a> Evaluator<'a> {
    pub fn evaluate(&mut self, source: &str) -> Result<Option<Value>, ExpressionError> {
        let expr = parse(source)?;
        self.eval(&expr)
    }

    pub fn into_warnings(self) -> Vec<String> {
        self.warnings
    }

    pub fn eval(&mut self, expr: &Expr) -> Result<Option<Value>, ExpressionError> {
        match expr {
            Expr::Literal(value) => Ok(Some(value.clone())),
            Expr::Variable(name) => Ok(self.variable(name)),

            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.extend(self.eval(item)?);
                }
                Ok(Some(Value::Sequence(values)))
            }
            Expr::Map(entries) => {
                let mut mapping = Mapping::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = self.eval(key)?.unwrap_or_default();
                    if let Some(value) = self.eval(value)? {
                        mapping.insert(key, value);
                    }
                }
                Ok(Some(Value::Mapping(mapping)))
            }

            Expr::Negate(inner) => match self.eval(inner)? {
                None => Ok(None),
                Some(Value::Integer(i)) => i
                    .checked_neg()
                    .map(|i| Some(Value::Integer(i)))
                    .ok_or_else(|| ExpressionError::type_error("integer overflow")),
                Some(Value::Float(f)) => Ok(Some(Value::Float(-f))),
                Some(other) => Err(ExpressionError::type_error(format!(
                    "cannot negate a {}",
                    other.type_name()
                ))),
            },
            Expr::Not(inner) => {
                let value = self.eval(inner)?;
                Ok(Some(Value::Bool(!truthy(&value))))
            }

            Expr::And(left, right) => {
                let left = self.eval(left)?;
                if !truthy(&left) {
                    return Ok(left);
                }
                self.eval(right)
            }
            Expr::Or(left, right) => {
                let left = self.eval(left)?;
                if truthy(&left) {
                    return Ok(left);
                }
                self.eval(right)
            }

            Expr::Conditional {
                then,
                condition,
                otherwise,
            } => {
                if truthy(&self.eval(condition)?) {
                    self.eval(then)
                } else if let Some(otherwise) = otherwise {
                    self.eval(otherwise)
                } else {
                    Ok(None)
                }
            }

            Expr::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, left, right)
            }

            Expr::Attribute(target, name) => Ok(self
                .eval(target)?
                .and_then(|target| attribute(&target, name))),

            Expr::Index(target, index) => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                match (target, index) {
                    (Some(target), Some(index)) => Ok(functions::index(&target, &index)),
                    _ => Ok(None),
                }
            }

            Expr::Call { name, input, args } => {
                let reported = self.warnings.len();
                let input = self.eval(input)?;
                // undefined is an expected input of `default`
                if name == "default" {
                    self.warnings.truncate(reported);
                }
                let args = self.arguments(args)?;
                functions::call(name, input, args)
            }
        }
    }

    fn arguments(&mut self, args: &[Argument]) -> Result<Arguments, ExpressionError> {
        let mut arguments = Arguments::default();
        for arg in args {
            let value = self.eval(&arg.value)?.unwrap_or_default();
            match &arg.name {
                Some(name) => {
                    arguments.named.insert(name.clone(), value);
                }
                None => arguments.positional.push(value),
            }
        }
        Ok(arguments)
    }

    fn variable(&mut self, name: &str) -> Option<Value> {
        if let Some(value) = self.scope.get(name) {
            return Some(value.clone());
        }
        if name == VARS {
            return Some(self.scope.to_mapping());
        }

        let mut warning = format!("Undefined variable '{name}'");
        if let Some(suggestion) = closest(name, self.scope.names()) {
            warning.push_str(&format!(" Did you mean '{suggestion}'?"));
        }
        tracing::trace!(%warning, "undefined variable");
        self.warnings.push(warning);
        None
    }
}

fn truthy(value: &Option<Value>) -> bool {
    value.as_ref().is_some_and(Value::is_truthy)
}

/// The closest known name within a small edit distance
fn closest<'n>(name: &str, candidates: impl Iterator<Item = &'n str>) -> Option<&'n str> {
    let threshold = (name.chars().count() / 3).max(2);
    candidates
        .map(|candidate| (strsim::levenshtein(name, candidate), candidate))
        .filter(|(distance, _)| *distance > 0 && *distance <= threshold)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate)
}

fn attribute(target: &Value, name: &str) -> Option<Value> {
    match target {
        Value::Mapping(mapping) => mapping.get(&Value::from(name)).cloned(),
        Value::Tagged(tagged) => attribute(&tagged.value, name),
        _ => None,
    }
}

/// Numeric view of a value
#[derive(Debug, Clone, Copy)]
enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    fn of(value: &Value) -> Option<Number> {
        match value {
            Value::Integer(i) => Some(Number::Integer(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Integer(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

fn binary(
    op: BinaryOp,
    left: Option<Value>,
    right: Option<Value>,
) -> Result<Option<Value>, ExpressionError> {
    use BinaryOp::*;

    match op {
        Equal => Ok(Some(Value::Bool(equals(
            &left.unwrap_or_default(),
            &right.unwrap_or_default(),
        )))),
        NotEqual => Ok(Some(Value::Bool(!equals(
            &left.unwrap_or_default(),
            &right.unwrap_or_default(),
        )))),
        Concat => Ok(Some(Value::String(format!(
            "{}{}",
            left.unwrap_or_default(),
            right.unwrap_or_default()
        )))),
        _ => {
            let (Some(left), Some(right)) = (left, right) else {
                return Ok(None);
            };
            match op {
                Less | LessEqual | Greater | GreaterEqual => {
                    let ordering = compare(&left, &right)?;
                    Ok(Some(Value::Bool(match op {
                        Less => ordering == Ordering::Less,
                        LessEqual => ordering != Ordering::Greater,
                        Greater => ordering == Ordering::Greater,
                        _ => ordering != Ordering::Less,
                    })))
                }
                In => contains(&right, &left).map(|found| Some(Value::Bool(found))),
                NotIn => contains(&right, &left).map(|found| Some(Value::Bool(!found))),
                _ => arithmetic(op, left, right).map(Some),
            }
        }
    }
}

/// Equality with integers and floats comparing by numeric value
pub(crate) fn equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Tagged(tagged), other) | (other, Value::Tagged(tagged)) => {
            equals(&tagged.value, other)
        }
        (Value::Integer(i), Value::Float(f)) | (Value::Float(f), Value::Integer(i)) => {
            *i as f64 == *f
        }
        _ => left == right,
    }
}

pub(crate) fn compare(left: &Value, right: &Value) -> Result<Ordering, ExpressionError> {
    if let (Some(left), Some(right)) = (Number::of(left), Number::of(right)) {
        return Ok(match (left, right) {
            (Number::Integer(a), Number::Integer(b)) => a.cmp(&b),
            (a, b) => a.as_f64().total_cmp(&b.as_f64()),
        });
    }

    match (left, right) {
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
        _ => Err(ExpressionError::type_error(format!(
            "cannot compare {} with {}",
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn contains(haystack: &Value, needle: &Value) -> Result<bool, ExpressionError> {
    match haystack {
        Value::String(s) => Ok(s.contains(&needle.to_string())),
        Value::Sequence(items) => Ok(items.iter().any(|item| equals(item, needle))),
        Value::Mapping(mapping) => Ok(mapping.contains_key(needle)),
        other => Err(ExpressionError::type_error(format!(
            "'in' needs a string, sequence or mapping, got {}",
            other.type_name()
        ))),
    }
}

fn arithmetic(op: BinaryOp, left: Value, right: Value) -> Result<Value, ExpressionError> {
    use BinaryOp::*;

    let overflow = || ExpressionError::type_error("integer overflow");

    if let (Some(a), Some(b)) = (Number::of(&left), Number::of(&right)) {
        return match (op, a, b) {
            (Divide | FloorDivide | Modulo, _, b) if b.as_f64() == 0.0 => {
                Err(ExpressionError::DivisionByZero)
            }
            (Add | Subtract | Multiply | FloorDivide | Modulo, Number::Integer(a), Number::Integer(b)) => {
                let result = match op {
                    Add => a.checked_add(b),
                    Subtract => a.checked_sub(b),
                    Multiply => a.checked_mul(b),
                    FloorDivide => a.checked_div_euclid(b),
                    _ => a.checked_rem_euclid(b),
                };
                result.map(Value::Integer).ok_or_else(overflow)
            }
            (Add, a, b) => Ok(Value::Float(a.as_f64() + b.as_f64())),
            (Subtract, a, b) => Ok(Value::Float(a.as_f64() - b.as_f64())),
            (Multiply, a, b) => Ok(Value::Float(a.as_f64() * b.as_f64())),
            (Divide, a, b) => Ok(Value::Float(a.as_f64() / b.as_f64())),
            (FloorDivide, a, b) => Ok(Value::Float((a.as_f64() / b.as_f64()).floor())),
            (Modulo, a, b) => Ok(Value::Float(a.as_f64().rem_euclid(b.as_f64()))),
            _ => Err(ExpressionError::type_error("unsupported operator")),
        };
    }

    match (op, left, right) {
        (Add, Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
        (Add, Value::Sequence(mut a), Value::Sequence(b)) => {
            a.extend(b);
            Ok(Value::Sequence(a))
        }
        (Add, Value::Mapping(mut a), Value::Mapping(b)) => {
            a.extend(b);
            Ok(Value::Mapping(a))
        }
        (Multiply, Value::String(s), Value::Integer(n))
        | (Multiply, Value::Integer(n), Value::String(s)) => Ok(Value::String(repeat(&s, n)?)),
        (op, left, right) => Err(ExpressionError::type_error(format!(
            "unsupported operand types for {op:?}: {} and {}",
            left.type_name(),
            right.type_name()
        ))),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::expression::evaluate_str;
    use pretty_assertions::assert_eq;

    fn scope() -> Variables {
        let mut scope = Variables::default();
        scope.define("name", "world");
        scope.define("count", 3);
        scope.define("enabled", true);
        scope.define("items", Value::from(vec!["a", "b", "c"]));
        scope.define(
            "server",
            Value::from_iter([("host", Value::from("localhost")), ("port", Value::from(8080))]),
        );
        scope.define("with space", "spaced");
        scope
    }

    fn eval(source: &str) -> Option<Value> {
        evaluate_str(source, &scope()).expect("valid expression")
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert_eq!(eval("1 + 2 * 3"), Some(Value::from(7)));
        assert_eq!(eval("(1 + 2) * 3"), Some(Value::from(9)));
        assert_eq!(eval("7 // 2"), Some(Value::from(3)));
        assert_eq!(eval("7 % 4"), Some(Value::from(3)));
        assert_eq!(eval("7 / 2"), Some(Value::from(3.5)));
        assert_eq!(eval("count * 1.5"), Some(Value::from(4.5)));
        assert_eq!(eval("-count"), Some(Value::from(-3)));
        assert_eq!(eval("'ab' * 2"), Some(Value::from("abab")));
    }

    #[test]
    fn strings() {
        assert_eq!(eval("'hello ' + name"), Some(Value::from("hello world")));
        assert_eq!(eval("name ~ '-' ~ count"), Some(Value::from("world-3")));
    }

    #[test]
    fn comparisons_and_logic() {
        assert_eq!(eval("count > 2 and enabled"), Some(Value::from(true)));
        assert_eq!(eval("count == 3.0"), Some(Value::from(true)));
        assert_eq!(eval("'b' in items"), Some(Value::from(true)));
        assert_eq!(eval("'x' not in items"), Some(Value::from(true)));
        assert_eq!(eval("'host' in server"), Some(Value::from(true)));
        assert_eq!(eval("not enabled"), Some(Value::from(false)));
        assert_eq!(eval("missing or 'fallback'"), Some(Value::from("fallback")));
        assert_eq!(eval("missing == null"), Some(Value::from(true)));
    }

    #[test]
    fn ternary() {
        assert_eq!(eval("'on' if enabled else 'off'"), Some(Value::from("on")));
        assert_eq!(eval("'on' if not enabled"), None);
    }

    #[test]
    fn lookups() {
        assert_eq!(eval("server.port"), Some(Value::from(8080)));
        assert_eq!(eval("server['host']"), Some(Value::from("localhost")));
        assert_eq!(eval("items[-1]"), Some(Value::from("c")));
        assert_eq!(eval("items.1"), Some(Value::from("b")));
        assert_eq!(eval("VARS['with space']"), Some(Value::from("spaced")));
        assert_eq!(eval("server.missing"), None);
    }

    #[test]
    fn literals_drop_undefined_entries() {
        assert_eq!(
            eval("[1, missing, 'x' if false, 2]"),
            Some(Value::from(vec![1, 2]))
        );
        assert_eq!(
            eval("{a: 1, b: missing}"),
            Some(Value::from_iter([("a", 1)]))
        );
    }

    #[test]
    fn undefined_arithmetic_is_undefined() {
        assert_eq!(eval("missing + 1"), None);
    }

    #[test]
    fn undefined_variables_warn_with_suggestion() {
        let scope = scope();
        let mut evaluator = Evaluator::new(&scope);

        assert_eq!(evaluator.evaluate("nmae").expect("valid"), None);
        assert_eq!(evaluator.evaluate("zzzzzzzz").expect("valid"), None);
        assert_eq!(
            evaluator.into_warnings(),
            vec![
                "Undefined variable 'nmae' Did you mean 'name'?".to_string(),
                "Undefined variable 'zzzzzzzz'".to_string(),
            ]
        );
    }

    #[test]
    fn default_does_not_warn() {
        let scope = scope();
        let mut evaluator = Evaluator::new(&scope);
        assert_eq!(
            evaluator.evaluate("missing | default(7)").expect("valid"),
            Some(Value::from(7))
        );
        assert!(evaluator.into_warnings().is_empty());
    }

    #[test]
    fn ternary_without_else_does_not_warn() {
        let scope = scope();
        let mut evaluator = Evaluator::new(&scope);
        assert_eq!(evaluator.evaluate("1 if false").expect("valid"), None);
        assert!(evaluator.into_warnings().is_empty());
    }

    #[test]
    fn errors() {
        let scope = scope();
        assert_eq!(
            evaluate_str("1 / 0", &scope),
            Err(ExpressionError::DivisionByZero)
        );
        assert!(matches!(
            evaluate_str("name < 1", &scope),
            Err(ExpressionError::Type(_))
        ));
        assert!(matches!(
            evaluate_str("name +", &scope),
            Err(ExpressionError::Parse { .. })
        ));
    }

    #[test]
    fn oversized_string_repetition_is_an_error() {
        let scope = scope();
        for source in ["'abc' * 9223372036854775807", "9223372036854775807 * name"] {
            assert!(
                matches!(evaluate_str(source, &scope), Err(ExpressionError::Type(_))),
                "{source}"
            );
        }
        assert_eq!(eval("'ab' * -2"), Some(Value::from("")));
    }
}
