//! scalar and tag resolution
//!
//! Plain scalars follow the yaml 1.2 core schema: `on`/`off`/`yes`/`no` stay strings. Quoted scalars are always
//! strings. Standard `!!` tags force a type; local `!` tags become directive [Tag]s wrapped around the resolved
//! payload.
use crate::value::{Tag, Value};
use yaml_rust2::parser::Tag as YamlTag;
use yaml_rust2::scanner::TScalarStyle;

const CORE_SCHEMA_PREFIX: &str = "tag:yaml.org,2002:";

/// What a tag on a node means to the composer
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Resolution {
    /// `!!str`, `!!int`, ...
    Core(String),
    Directive(Tag),
}

pub(crate) fn classify(tag: &YamlTag) -> Resolution {
    match tag.handle.as_str() {
        "!!" | CORE_SCHEMA_PREFIX => Resolution::Core(tag.suffix.clone()),
        "!" => Resolution::Directive(Tag::from_suffix(&tag.suffix)),
        "" => match tag.suffix.strip_prefix(CORE_SCHEMA_PREFIX) {
            Some(core) => Resolution::Core(core.to_string()),
            None => Resolution::Directive(Tag::from_suffix(
                tag.suffix.trim_start_matches('!'),
            )),
        },
        handle => Resolution::Directive(Tag::Unknown(format!(
            "{}{}",
            handle.trim_start_matches('!'),
            tag.suffix
        ))),
    }
}

/// Resolves a scalar event into a value
pub(crate) fn resolve_scalar(
    text: String,
    style: TScalarStyle,
    tag: Option<&YamlTag>,
    mark: usize,
) -> Value {
    let plain = matches!(style, TScalarStyle::Plain);
    let untagged = |text: String| {
        if plain {
            resolve_plain(&text).unwrap_or(Value::String(text))
        } else {
            Value::String(text)
        }
    };

    match tag.map(classify) {
        None => untagged(text),
        Some(Resolution::Core(name)) => resolve_core(&name, text),
        Some(Resolution::Directive(tag)) => Value::tagged(tag, untagged(text), mark),
    }
}

/// Resolves a plain (unquoted) scalar, `None` means it stays a string
pub fn resolve_plain(text: &str) -> Option<Value> {
    match text {
        "" | "~" | "null" | "Null" | "NULL" => return Some(Value::Null),
        "true" | "True" | "TRUE" => return Some(Value::Bool(true)),
        "false" | "False" | "FALSE" => return Some(Value::Bool(false)),
        _ => {}
    }

    parse_integer(text)
        .map(Value::Integer)
        .or_else(|| parse_float(text).map(Value::Float))
}

/// Resolves a plain scalar, keeping anything that is not null/bool/number as a string
pub fn resolve_plain_str(text: &str) -> Value {
    resolve_plain(text).unwrap_or_else(|| Value::from(text))
}

fn resolve_core(name: &str, text: String) -> Value {
    let resolved = match name {
        "str" => None,
        "null" => Some(Value::Null),
        "bool" => match text.as_str() {
            "true" | "True" | "TRUE" => Some(Value::Bool(true)),
            "false" | "False" | "FALSE" => Some(Value::Bool(false)),
            _ => None,
        },
        "int" => parse_integer(&text).map(Value::Integer),
        "float" => parse_float(&text)
            .or_else(|| parse_integer(&text).map(|i| i as f64))
            .map(Value::Float),
        _ => None,
    };
    resolved.unwrap_or(Value::String(text))
}

fn parse_integer(text: &str) -> Option<i64> {
    let (negative, digits) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };

    let magnitude = if let Some(hex) = digits.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(octal) = digits.strip_prefix("0o") {
        i64::from_str_radix(octal, 8).ok()?
    } else if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        digits.parse().ok()?
    } else {
        return None;
    };

    Some(if negative { -magnitude } else { magnitude })
}

fn parse_float(text: &str) -> Option<f64> {
    match text {
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => return Some(f64::INFINITY),
        "-.inf" | "-.Inf" | "-.INF" => return Some(f64::NEG_INFINITY),
        ".nan" | ".NaN" | ".NAN" => return Some(f64::NAN),
        _ => {}
    }

    let numeric = text
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    let has_digit = text.bytes().any(|b| b.is_ascii_digit());
    if !numeric || !has_digit {
        return None;
    }
    text.parse().ok()
}
