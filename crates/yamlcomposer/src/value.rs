//! value representation
//!
//! The document tree contains the following data types
//! - null
//! - boolean (true/false)
//! - integer (signed, i64)
//! - float (f64)
//! - string (utf-8)
//! - sequence ("list" of values)
//! - mapping (order-preserving "map", keys are values themselves)
//!
//! Additionally a node may carry a directive [Tag] (`!include`, `!sub`, ...). Tagged nodes only exist while a
//! document is being composed; a finished document returned to the host contains none of them.
//!
//! Floats compare and hash by their bit pattern so that any value can be used as a mapping key.
use indexmap::IndexMap;
use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serializer,
};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Order-preserving mapping of the document tree
pub type Mapping = IndexMap<Value, Value>;

/// All possible value types
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Sequence(Vec<Value>),
    Mapping(Mapping),
    Tagged(Box<Tagged>),
}

/// A node carrying a directive tag
#[derive(Debug, Clone)]
pub struct Tagged {
    pub tag: Tag,
    pub value: Value,
    /// character offset of the tagged node in its source document
    pub mark: usize,
}

/// Directive tags understood by the composer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    /// `!sub` or `!sub:<pattern variable>`
    Sub(Option<String>),
    NoSub,
    If,
    Include,
    Insert,
    Remove,
    Replace,
    /// engine owned tag for plain `<<` keys
    MergeKey,
    /// engine owned tag for nodes spliced in by an alias (`*name`)
    Alias,
    Unknown(String),
}

impl Tag {
    /// Maps the suffix of a local tag (`!suffix`) to a directive
    pub fn from_suffix(suffix: &str) -> Tag {
        match suffix {
            "sub" => Tag::Sub(None),
            "nosub" => Tag::NoSub,
            "if" => Tag::If,
            "include" => Tag::Include,
            "insert" => Tag::Insert,
            "remove" => Tag::Remove,
            "replace" => Tag::Replace,
            other => match other.strip_prefix("sub:") {
                Some(variable) if !variable.is_empty() => Tag::Sub(Some(variable.to_string())),
                _ => Tag::Unknown(other.to_string()),
            },
        }
    }

    pub fn is_override_marker(&self) -> bool {
        matches!(self, Tag::Remove | Tag::Replace)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Sub(None) => f.write_str("!sub"),
            Tag::Sub(Some(variable)) => write!(f, "!sub:{variable}"),
            Tag::NoSub => f.write_str("!nosub"),
            Tag::If => f.write_str("!if"),
            Tag::Include => f.write_str("!include"),
            Tag::Insert => f.write_str("!insert"),
            Tag::Remove => f.write_str("!remove"),
            Tag::Replace => f.write_str("!replace"),
            Tag::MergeKey => f.write_str("<<"),
            Tag::Alias => f.write_str("*alias"),
            Tag::Unknown(name) => write!(f, "!{name}"),
        }
    }
}

impl Value {
    pub fn tagged(tag: Tag, value: Value, mark: usize) -> Value {
        Value::Tagged(Box::new(Tagged { tag, value, mark }))
    }

    /// The key a plain `<<` is parsed into
    pub fn merge_key() -> Value {
        Value::tagged(Tag::MergeKey, Value::from("<<"), 0)
    }

    pub fn is_merge_key(&self) -> bool {
        matches!(self, Value::Tagged(tagged) if tagged.tag == Tag::MergeKey)
    }

    /// The node an alias points at
    pub fn unaliased(self) -> Value {
        match self {
            Value::Tagged(tagged) if tagged.tag == Tag::Alias => tagged.value.unaliased(),
            other => other,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    pub fn into_mapping(self) -> Option<Mapping> {
        match self {
            Value::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_tagged(&self) -> Option<&Tagged> {
        match self {
            Value::Tagged(tagged) => Some(tagged),
            _ => None,
        }
    }

    /// Looks up a string key of a mapping
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_mapping()?.get_str(key)
    }

    /// Follows a path of string keys through nested mappings
    pub fn pointer<'a>(&self, path: impl IntoIterator<Item = &'a str>) -> Option<&Value> {
        path.into_iter().try_fold(self, |value, key| value.get(key))
    }

    /// Truthiness as used by `!if` and boolean operators
    ///
    /// null, `false`, zero, blank strings, the string `"false"` and empty collections are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::String(s) => {
                let s = s.trim();
                !s.is_empty() && !s.eq_ignore_ascii_case("false")
            }
            Value::Sequence(items) => !items.is_empty(),
            Value::Mapping(mapping) => !mapping.is_empty(),
            Value::Tagged(tagged) => tagged.value.is_truthy(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
            Value::Tagged(tagged) => tagged.value.type_name(),
        }
    }

    /// Drops all directive tags, keeping the tagged payloads
    pub fn untagged(self) -> Value {
        match self {
            Value::Tagged(tagged) => tagged.value.untagged(),
            Value::Sequence(items) => Value::Sequence(items.into_iter().map(Value::untagged).collect()),
            Value::Mapping(mapping) => Value::Mapping(
                mapping
                    .into_iter()
                    .map(|(k, v)| (k.untagged(), v.untagged()))
                    .collect(),
            ),
            other => other,
        }
    }

    /// String form of a value used as a variable or template name
    pub fn to_key_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            other => other.to_string(),
        }
    }

    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn to_yaml_string(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Textual form used when a value is spliced into a string
///
/// null renders empty, collections render as json.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::String(s) => f.write_str(s),
            Value::Sequence(_) | Value::Mapping(_) => f.write_str(&self.to_json_string()),
            Value::Tagged(tagged) => tagged.value.fmt(f),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Sequence(a), Value::Sequence(b)) => a == b,
            (Value::Mapping(a), Value::Mapping(b)) => a == b,
            (Value::Tagged(a), Value::Tagged(b)) => a.tag == b.tag && a.value == b.value,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Sequence(items) => items.hash(state),
            // mapping equality ignores order
            Value::Mapping(mapping) => mapping.len().hash(state),
            Value::Tagged(tagged) => {
                tagged.tag.hash(state);
                tagged.value.hash(state);
            }
        }
    }
}

/// Convenience lookups with string keys
pub trait MappingExt {
    fn get_str(&self, key: &str) -> Option<&Value>;
    fn remove_str(&mut self, key: &str) -> Option<Value>;
    fn contains_str(&self, key: &str) -> bool;
}

impl MappingExt for Mapping {
    fn get_str(&self, key: &str) -> Option<&Value> {
        self.get(&Value::from(key))
    }

    fn remove_str(&mut self, key: &str) -> Option<Value> {
        self.shift_remove(&Value::from(key))
    }

    fn contains_str(&self, key: &str) -> bool {
        self.contains_key(&Value::from(key))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<Mapping> for Value {
    fn from(value: Mapping) -> Self {
        Value::Mapping(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Sequence(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<K: Into<Value>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Mapping(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl serde::ser::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(value) => serializer.serialize_bool(*value),
            Value::Integer(value) => serializer.serialize_i64(*value),
            Value::Float(value) => serializer.serialize_f64(*value),
            Value::String(value) => serializer.serialize_str(value),
            Value::Sequence(value) => {
                let mut ser = serializer.serialize_seq(Some(value.len()))?;
                for element in value {
                    ser.serialize_element(element)?;
                }
                ser.end()
            }
            Value::Mapping(value) => {
                let mut ser = serializer.serialize_map(Some(value.len()))?;
                for (element_key, element_value) in value {
                    ser.serialize_entry(&element_key.to_key_string(), element_value)?;
                }
                ser.end()
            }
            Value::Tagged(tagged) => tagged.value.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn truthiness() {
        for falsy in [
            Value::Null,
            Value::from(false),
            Value::from(0),
            Value::from(0.0),
            Value::from(""),
            Value::from("  "),
            Value::from("false"),
            Value::Sequence(vec![]),
            Value::Mapping(Mapping::new()),
        ] {
            assert!(!falsy.is_truthy(), "{falsy:?} must be falsy");
        }

        for truthy in [
            Value::from(true),
            Value::from(42),
            Value::from("'hello'"),
            Value::from(vec!["item"]),
            Value::from_iter([("key", "value")]),
        ] {
            assert!(truthy.is_truthy(), "{truthy:?} must be truthy");
        }
    }

    #[test]
    fn merge_keys_are_equal_regardless_of_position() {
        let mut mapping = Mapping::new();
        mapping.insert(Value::merge_key(), Value::from(1));
        mapping.insert(Value::tagged(Tag::MergeKey, Value::from("<<"), 42), Value::from(2));

        assert_eq!(mapping.len(), 1);
        assert!(!mapping.contains_str("<<"));
    }

    #[test]
    fn tag_from_suffix() {
        assert_eq!(Tag::from_suffix("sub"), Tag::Sub(None));
        assert_eq!(
            Tag::from_suffix("sub:bracket_pattern"),
            Tag::Sub(Some("bracket_pattern".into()))
        );
        assert_eq!(Tag::from_suffix("sub:"), Tag::Unknown("sub:".into()));
        assert_eq!(Tag::from_suffix("nope"), Tag::Unknown("nope".into()));
    }

    #[test]
    fn display_for_splicing() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::from(1.0).to_string(), "1.0");
        assert_eq!(Value::from(vec![1, 2]).to_string(), "[1,2]");
        assert_eq!(Value::from_iter([("a", "b")]).to_string(), r#"{"a":"b"}"#);
    }

    #[test]
    fn serializes_keys_as_strings() {
        let value = Value::from_iter([(Value::from(1), Value::from(true))]);
        assert_eq!(value.to_json_string(), r#"{"1":true}"#);
    }
}
