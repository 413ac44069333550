//! functions usable as filters (`value | name(args)`) and methods (`value.name(args)`)
use super::eval::{compare, equals};
use super::ExpressionError;
use crate::value::Value;
use indexmap::IndexMap;
use std::cmp::Ordering;

#[derive(Debug, Default)]
pub(crate) struct Arguments {
    pub positional: Vec<Value>,
    pub named: IndexMap<String, Value>,
}

impl Arguments {
    fn get(&self, position: usize, name: &str) -> Option<&Value> {
        self.named.get(name).or_else(|| self.positional.get(position))
    }
}

/// upper bound for strings built by repetition
const MAX_REPEAT_LENGTH: usize = 16 * 1024 * 1024;

/// `text` repeated `count` times, negative counts yield an empty string
pub(crate) fn repeat(text: &str, count: i64) -> Result<String, ExpressionError> {
    let count = usize::try_from(count.max(0)).unwrap_or(usize::MAX);
    match text.len().checked_mul(count) {
        Some(length) if length <= MAX_REPEAT_LENGTH => Ok(text.repeat(count)),
        _ => Err(ExpressionError::type_error(format!(
            "repeating a string of length {} {count} times exceeds {MAX_REPEAT_LENGTH} bytes",
            text.len()
        ))),
    }
}

/// (name, minimum arguments, maximum arguments, named arguments)
type Signature = (&'static str, usize, Option<usize>, &'static [&'static str]);

const FUNCTIONS: &[Signature] = &[
    ("default", 0, Some(2), &["value", "boolean"]),
    ("label", 0, Some(0), &[]),
    ("dig", 1, None, &[]),
    ("upper", 0, Some(0), &[]),
    ("lower", 0, Some(0), &[]),
    ("capitalize", 0, Some(0), &[]),
    ("title", 0, Some(0), &[]),
    ("trim", 0, Some(1), &[]),
    ("strip", 0, Some(1), &[]),
    ("replace", 2, Some(3), &[]),
    ("repeat", 1, Some(1), &[]),
    ("split", 0, Some(1), &[]),
    ("startswith", 1, Some(1), &[]),
    ("endswith", 1, Some(1), &[]),
    ("contains", 1, Some(1), &[]),
    ("length", 0, Some(0), &[]),
    ("int", 0, Some(1), &["default"]),
    ("float", 0, Some(1), &["default"]),
    ("string", 0, Some(0), &[]),
    ("bool", 0, Some(0), &[]),
    ("join", 0, Some(1), &["separator"]),
    ("first", 0, Some(0), &[]),
    ("last", 0, Some(0), &[]),
    ("keys", 0, Some(0), &[]),
    ("values", 0, Some(0), &[]),
    ("reverse", 0, Some(0), &[]),
    ("sort", 0, Some(0), &[]),
    ("unique", 0, Some(0), &[]),
    ("min", 0, Some(0), &[]),
    ("max", 0, Some(0), &[]),
    ("abs", 0, Some(0), &[]),
    ("round", 0, Some(1), &["digits"]),
    ("tojson", 0, Some(0), &[]),
];

fn check_arity(name: &str, args: &Arguments) -> Result<&'static str, ExpressionError> {
    let Some(&(function, min, max, named)) =
        FUNCTIONS.iter().find(|(function, ..)| *function == name)
    else {
        return Err(ExpressionError::UnknownFunction(name.to_string()));
    };

    if let Some(unknown) = args
        .named
        .keys()
        .find(|key| !named.contains(&key.as_str()))
    {
        return Err(ExpressionError::type_error(format!(
            "'{function}' got an unexpected keyword argument '{unknown}'"
        )));
    }

    let got = args.positional.len() + args.named.len();
    if got < min || max.is_some_and(|max| got > max) {
        let expected = match max {
            Some(max) if max == min => min.to_string(),
            Some(max) => format!("{min} to {max}"),
            None => format!("at least {min}"),
        };
        return Err(ExpressionError::Arity {
            function,
            expected,
            got,
        });
    }

    Ok(function)
}

/// Calls a function; an undefined input stays undefined (except for `default`)
pub(crate) fn call(
    name: &str,
    input: Option<Value>,
    args: Arguments,
) -> Result<Option<Value>, ExpressionError> {
    let function = check_arity(name, &args)?;

    if function == "default" {
        return Ok(Some(default(input, &args)));
    }
    let Some(input) = input else {
        return Ok(None);
    };
    let input = match input {
        Value::Tagged(tagged) => tagged.value,
        other => other,
    };

    let string_arg = |position: usize| args.positional.get(position).map(Value::to_string);

    let result = match function {
        "label" => Value::String(label(&input.to_string())),
        "dig" => dig(&input, &args.positional),

        "upper" => Value::String(input.to_string().to_uppercase()),
        "lower" => Value::String(input.to_string().to_lowercase()),
        "capitalize" => Value::String(capitalize(&input.to_string())),
        "title" => Value::String(
            input
                .to_string()
                .split(' ')
                .map(capitalize)
                .collect::<Vec<_>>()
                .join(" "),
        ),
        "trim" | "strip" => {
            let text = input.to_string();
            Value::String(match string_arg(0) {
                Some(chars) => text.trim_matches(|c: char| chars.contains(c)).to_string(),
                None => text.trim().to_string(),
            })
        }
        "replace" => {
            let text = input.to_string();
            let from = string_arg(0).unwrap_or_default();
            let to = string_arg(1).unwrap_or_default();
            Value::String(match args.positional.get(2) {
                Some(Value::Integer(count)) => {
                    text.replacen(&from, &to, (*count).max(0) as usize)
                }
                Some(other) => {
                    return Err(ExpressionError::type_error(format!(
                        "'replace' count must be an integer, got {}",
                        other.type_name()
                    )))
                }
                None => text.replace(&from, &to),
            })
        }
        "repeat" => match args.positional.first() {
            Some(Value::Integer(n)) => Value::String(repeat(&input.to_string(), *n)?),
            _ => return Err(ExpressionError::type_error("'repeat' needs an integer")),
        },
        "split" => {
            let text = input.to_string();
            let parts: Vec<Value> = match string_arg(0) {
                Some(separator) if !separator.is_empty() => {
                    text.split(separator.as_str()).map(Value::from).collect()
                }
                _ => text.split_whitespace().map(Value::from).collect(),
            };
            Value::Sequence(parts)
        }
        "startswith" => {
            let prefix = string_arg(0).unwrap_or_default();
            Value::Bool(input.to_string().starts_with(&prefix))
        }
        "endswith" => {
            let suffix = string_arg(0).unwrap_or_default();
            Value::Bool(input.to_string().ends_with(&suffix))
        }
        "contains" => {
            let needle = args.positional.first().cloned().unwrap_or_default();
            Value::Bool(match &input {
                Value::Sequence(items) => items.iter().any(|item| equals(item, &needle)),
                Value::Mapping(mapping) => mapping.contains_key(&needle),
                other => other.to_string().contains(&needle.to_string()),
            })
        }

        "length" => match &input {
            Value::String(s) => Value::Integer(s.chars().count() as i64),
            Value::Sequence(items) => Value::Integer(items.len() as i64),
            Value::Mapping(mapping) => Value::Integer(mapping.len() as i64),
            other => return Err(type_mismatch("length", "a string or collection", other)),
        },
        "int" => match to_int(&input) {
            Some(i) => Value::Integer(i),
            None => args.get(0, "default").cloned().unwrap_or(Value::Integer(0)),
        },
        "float" => match to_float(&input) {
            Some(f) => Value::Float(f),
            None => args.get(0, "default").cloned().unwrap_or(Value::Float(0.0)),
        },
        "string" => Value::String(input.to_string()),
        "bool" => Value::Bool(to_bool(&input)),
        "join" => {
            let separator = args
                .get(0, "separator")
                .map(Value::to_string)
                .unwrap_or_default();
            match &input {
                Value::Sequence(items) => Value::String(
                    items
                        .iter()
                        .map(Value::to_string)
                        .collect::<Vec<_>>()
                        .join(&separator),
                ),
                other => return Err(type_mismatch("join", "a sequence", other)),
            }
        }

        "first" | "last" => {
            let item = match &input {
                Value::Sequence(items) if function == "first" => items.first().cloned(),
                Value::Sequence(items) => items.last().cloned(),
                Value::String(s) if function == "first" => {
                    s.chars().next().map(|c| Value::String(c.into()))
                }
                Value::String(s) => s.chars().last().map(|c| Value::String(c.into())),
                other => return Err(type_mismatch(function, "a sequence or string", other)),
            };
            return Ok(item);
        }
        "keys" | "values" => match input {
            Value::Mapping(mapping) if function == "keys" => {
                Value::Sequence(mapping.into_keys().collect())
            }
            Value::Mapping(mapping) => Value::Sequence(mapping.into_values().collect()),
            other => return Err(type_mismatch(function, "a mapping", &other)),
        },
        "reverse" => match input {
            Value::Sequence(mut items) => {
                items.reverse();
                Value::Sequence(items)
            }
            Value::String(s) => Value::String(s.chars().rev().collect()),
            other => return Err(type_mismatch("reverse", "a sequence or string", &other)),
        },
        "sort" => match input {
            Value::Sequence(items) => Value::Sequence(sorted(items)?),
            other => return Err(type_mismatch("sort", "a sequence", &other)),
        },
        "unique" => match input {
            Value::Sequence(items) => {
                let mut unique: Vec<Value> = Vec::with_capacity(items.len());
                for item in items {
                    if !unique.iter().any(|seen| equals(seen, &item)) {
                        unique.push(item);
                    }
                }
                Value::Sequence(unique)
            }
            other => return Err(type_mismatch("unique", "a sequence", &other)),
        },
        "min" | "max" => match input {
            Value::Sequence(items) => {
                let items = sorted(items)?;
                let item = if function == "min" {
                    items.into_iter().next()
                } else {
                    items.into_iter().last()
                };
                return Ok(item);
            }
            other => return Err(type_mismatch(function, "a sequence", &other)),
        },

        "abs" => match input {
            Value::Integer(i) => Value::Integer(i.saturating_abs()),
            Value::Float(f) => Value::Float(f.abs()),
            other => return Err(type_mismatch("abs", "a number", &other)),
        },
        "round" => {
            let digits = match args.get(0, "digits") {
                None => 0,
                Some(Value::Integer(digits)) => *digits,
                Some(other) => return Err(type_mismatch("round", "integer digits", other)),
            };
            match input {
                Value::Integer(i) => Value::Integer(i),
                Value::Float(f) => {
                    let factor = 10f64.powi(digits.clamp(-15, 15) as i32);
                    Value::Float((f * factor).round() / factor)
                }
                other => return Err(type_mismatch("round", "a number", &other)),
            }
        }
        "tojson" => Value::String(input.to_json_string()),

        other => return Err(ExpressionError::UnknownFunction(other.to_string())),
    };

    Ok(Some(result))
}

fn type_mismatch(function: &str, expected: &str, got: &Value) -> ExpressionError {
    ExpressionError::type_error(format!(
        "'{function}' expects {expected}, got {}",
        got.type_name()
    ))
}

fn default(input: Option<Value>, args: &Arguments) -> Value {
    let fallback = args
        .get(0, "value")
        .cloned()
        .unwrap_or_else(|| Value::from(""));
    let boolean = args.get(1, "boolean").is_some_and(Value::is_truthy);

    match input {
        None | Some(Value::Null) => fallback,
        Some(value) if boolean && !value.is_truthy() => fallback,
        Some(value) => value,
    }
}

/// Index access: mapping keys, sequence positions (negative counts from the end) and string characters
pub(crate) fn index(target: &Value, index: &Value) -> Option<Value> {
    match (target, index) {
        (Value::Tagged(tagged), index) => self::index(&tagged.value, index),
        (Value::Mapping(mapping), key) => mapping
            .get(key)
            .or_else(|| mapping.get(&Value::from(key.to_string())))
            .cloned(),
        (Value::Sequence(items), Value::Integer(i)) => {
            position(items.len(), *i).and_then(|i| items.get(i).cloned())
        }
        (Value::String(s), Value::Integer(i)) => {
            let chars: Vec<char> = s.chars().collect();
            position(chars.len(), *i)
                .and_then(|i| chars.get(i))
                .map(|c| Value::String(c.to_string()))
        }
        _ => None,
    }
}

fn position(len: usize, index: i64) -> Option<usize> {
    if index < 0 {
        len.checked_sub(index.unsigned_abs() as usize)
    } else {
        Some(index as usize)
    }
}

/// Safe deep lookup, a missing segment yields null
fn dig(input: &Value, path: &[Value]) -> Value {
    let segments = path.iter().flat_map(|segment| match segment {
        Value::String(s) => s.split('.').map(Value::from).collect::<Vec<_>>(),
        other => vec![other.clone()],
    });

    let mut current = input.clone();
    for segment in segments {
        let next = match (&current, &segment) {
            (Value::Sequence(_), Value::String(s)) => s
                .parse::<i64>()
                .ok()
                .and_then(|i| index(&current, &Value::Integer(i))),
            _ => index(&current, &segment),
        };
        match next {
            Some(next) => current = next,
            None => return Value::Null,
        }
    }
    current
}

/// `fooBar`, `foo_bar`, `foo bar` become `Foo Bar`; `StatusLED` becomes `Status LED`
fn label(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut word = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' || c.is_whitespace() {
            if !word.is_empty() {
                words.push(std::mem::take(&mut word));
            }
            continue;
        }

        let previous = i.checked_sub(1).and_then(|p| chars.get(p));
        let next = chars.get(i + 1);
        let boundary = c.is_uppercase()
            && previous.is_some_and(|p| {
                p.is_lowercase()
                    || p.is_ascii_digit()
                    || (p.is_uppercase() && next.is_some_and(|n| n.is_lowercase()))
            });
        if boundary && !word.is_empty() {
            words.push(std::mem::take(&mut word));
        }
        word.push(c);
    }
    if !word.is_empty() {
        words.push(word);
    }

    words
        .iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

fn to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(*i),
        Value::Float(f) if f.is_finite() => Some(f.trunc() as i64),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => {
            let s = s.trim();
            s.parse().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

fn to_float(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_bool(value: &Value) -> bool {
    match value {
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => true,
            "false" | "no" | "off" | "0" | "" => false,
            _ => true,
        },
        other => other.is_truthy(),
    }
}

fn sorted(mut items: Vec<Value>) -> Result<Vec<Value>, ExpressionError> {
    let mut error = None;
    items.sort_by(|a, b| {
        compare(a, b).unwrap_or_else(|e| {
            error.get_or_insert(e);
            Ordering::Equal
        })
    });
    match error {
        Some(error) => Err(error),
        None => Ok(items),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::expression::evaluate_str;
    use crate::variables::Variables;
    use pretty_assertions::assert_eq;

    fn eval(source: &str) -> Option<Value> {
        let mut scope = Variables::default();
        scope.define("name", "world");
        scope.define("empty", "");
        scope.define("nothing", Value::Null);
        scope.define("items", Value::from(vec![3, 1, 2, 1]));
        scope.define(
            "config",
            Value::from_iter([(
                "servers",
                Value::from(vec![Value::from_iter([("host", "alpha")])]),
            )]),
        );
        evaluate_str(source, &scope).expect("valid expression")
    }

    #[test]
    fn default_filter() {
        assert_eq!(eval("missing | default('x')"), Some(Value::from("x")));
        assert_eq!(eval("nothing | default('x')"), Some(Value::from("x")));
        assert_eq!(eval("empty | default('x')"), Some(Value::from("")));
        assert_eq!(eval("empty | default('x', true)"), Some(Value::from("x")));
        assert_eq!(eval("empty | default('x', boolean=true)"), Some(Value::from("x")));
        assert_eq!(eval("name | default('x')"), Some(Value::from("world")));
        assert_eq!(eval("missing | default('}')"), Some(Value::from("}")));
    }

    #[test]
    fn string_functions() {
        assert_eq!(eval("name | upper"), Some(Value::from("WORLD")));
        assert_eq!(eval("name.upper()"), Some(Value::from("WORLD")));
        assert_eq!(eval("'hello world' | title"), Some(Value::from("Hello World")));
        assert_eq!(eval("'hELLO' | capitalize"), Some(Value::from("Hello")));
        assert_eq!(eval("'  x ' | trim"), Some(Value::from("x")));
        assert_eq!(eval("'a-b-c' | replace('-', '+')"), Some(Value::from("a+b+c")));
        assert_eq!(eval("'a-b-c' | replace('-', '+', 1)"), Some(Value::from("a+b-c")));
        assert_eq!(eval("'ab' | repeat(3)"), Some(Value::from("ababab")));
        assert_eq!(eval("'a,b' | split(',')"), Some(Value::from(vec!["a", "b"])));
        assert_eq!(eval("name.startswith('wor')"), Some(Value::from(true)));
        assert_eq!(eval("name | endswith('x')"), Some(Value::from(false)));
    }

    #[test]
    fn oversized_repeats_are_rejected() {
        let scope = Variables::default();
        assert!(matches!(
            evaluate_str("'abc' | repeat(9223372036854775807)", &scope),
            Err(ExpressionError::Type(_))
        ));
        assert_eq!(eval("'ab' | repeat(-1)"), Some(Value::from("")));
        assert_eq!(eval("'' | repeat(9223372036854775807)"), Some(Value::from("")));
    }

    #[test]
    fn labels() {
        for (input, expected) in [
            ("fooBar", "Foo Bar"),
            ("foo_bar", "Foo Bar"),
            ("foo bar", "Foo Bar"),
            ("StatusLED", "Status LED"),
            ("LEDStatus", "LED Status"),
        ] {
            assert_eq!(label(input), expected, "label of {input}");
        }
    }

    #[test]
    fn collections() {
        assert_eq!(eval("items | length"), Some(Value::from(4)));
        assert_eq!(eval("items | sort"), Some(Value::from(vec![1, 1, 2, 3])));
        assert_eq!(eval("items | unique"), Some(Value::from(vec![3, 1, 2])));
        assert_eq!(eval("items | first"), Some(Value::from(3)));
        assert_eq!(eval("items | max"), Some(Value::from(3)));
        assert_eq!(eval("items | reverse | join('-')"), Some(Value::from("1-2-1-3")));
        assert_eq!(eval("[] | first"), None);
        assert_eq!(eval("{a: 1} | keys"), Some(Value::from(vec!["a"])));
    }

    #[test]
    fn conversions() {
        assert_eq!(eval("'42' | int"), Some(Value::from(42)));
        assert_eq!(eval("'4.7' | int"), Some(Value::from(4)));
        assert_eq!(eval("'nope' | int"), Some(Value::from(0)));
        assert_eq!(eval("'nope' | int(7)"), Some(Value::from(7)));
        assert_eq!(eval("'1.5' | float"), Some(Value::from(1.5)));
        assert_eq!(eval("'off' | bool"), Some(Value::from(false)));
        assert_eq!(eval("1.25 | string"), Some(Value::from("1.25")));
        assert_eq!(eval("(-2.567) | abs | round(2)"), Some(Value::from(2.57)));
        assert_eq!(eval("{a: [1]} | tojson"), Some(Value::from(r#"{"a":[1]}"#)));
    }

    #[test]
    fn dig_lookups() {
        assert_eq!(eval("config | dig('servers.0.host')"), Some(Value::from("alpha")));
        assert_eq!(eval("config | dig('servers', 0, 'host')"), Some(Value::from("alpha")));
        assert_eq!(eval("config | dig('servers.5.host')"), Some(Value::Null));
    }

    #[test]
    fn undefined_input_stays_undefined() {
        assert_eq!(eval("missing | upper"), None);
    }

    #[test]
    fn arity_and_unknown_functions() {
        let scope = Variables::default();
        assert!(matches!(
            evaluate_str("'x' | upper(1)", &scope),
            Err(ExpressionError::Arity { function: "upper", got: 1, .. })
        ));
        assert!(matches!(
            evaluate_str("'x' | replace('a')", &scope),
            Err(ExpressionError::Arity { function: "replace", .. })
        ));
        assert_eq!(
            evaluate_str("'x' | frobnicate", &scope),
            Err(ExpressionError::UnknownFunction("frobnicate".into()))
        );
    }
}
