//! yaml parsing into the document tree
//!
//! We consume the raw event stream of [yaml_rust2] instead of its `Yaml` model because
//! - repeated `<<` keys must survive (the native loader keeps only one of them)
//! - merge keys must not be resolved by the parser but later by the composer (see [Tag::MergeKey])
//! - directive tags and their source offsets must be kept
//! - aliased nodes must stay recognizable, substitution does not reach into them (see [Tag::Alias])
use crate::error::ComposeError;
use crate::resolver::{self, Resolution};
use crate::source::SourceLocator;
use crate::value::{Mapping, Tag, Value};
use std::collections::HashMap;
use std::path::Path;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser, Tag as YamlTag};
use yaml_rust2::scanner::{Marker, TScalarStyle};

/// Parses the first document of `text`
///
/// An empty stream yields [Value::Null].
pub fn parse(text: &str, file: &Path, locator: &SourceLocator) -> Result<Value, ComposeError> {
    let mut parser = Parser::new_from_str(text);
    let mut builder = DocumentBuilder::default();

    parser
        .load(&mut builder, false)
        .map_err(|error| ComposeError::Syntax {
            location: locator.locate(file, error.marker().index()),
            message: error.info().to_string(),
        })?;

    Ok(builder.root.unwrap_or_default())
}

#[derive(Default)]
struct DocumentBuilder {
    stack: Vec<Frame>,
    anchors: HashMap<usize, Value>,
    root: Option<Value>,
}

struct Frame {
    kind: FrameKind,
    anchor_id: usize,
    tag: Option<YamlTag>,
    mark: usize,
}

enum FrameKind {
    Sequence(Vec<Value>),
    Mapping(Vec<(Value, Option<Value>)>),
}

impl DocumentBuilder {
    fn expecting_key(&self) -> bool {
        match self.stack.last() {
            Some(Frame {
                kind: FrameKind::Mapping(entries),
                ..
            }) => entries.last().map_or(true, |(_, value)| value.is_some()),
            _ => false,
        }
    }

    fn complete(&mut self, value: Value, anchor_id: usize) {
        if anchor_id != 0 {
            self.anchors.insert(anchor_id, value.clone());
        }

        let Some(parent) = self.stack.last_mut() else {
            self.root = Some(value);
            return;
        };

        match &mut parent.kind {
            FrameKind::Sequence(items) => items.push(value),
            FrameKind::Mapping(entries) => match entries.last_mut() {
                Some((_, slot @ None)) => *slot = Some(value),
                _ => entries.push((value, None)),
            },
        }
    }

    fn scalar(&mut self, text: String, style: TScalarStyle, tag: Option<YamlTag>, mark: usize) -> Value {
        let is_merge_key = tag.is_none()
            && matches!(style, TScalarStyle::Plain)
            && text == "<<"
            && self.expecting_key();
        if is_merge_key {
            return Value::tagged(Tag::MergeKey, Value::from(text), mark);
        }

        resolver::resolve_scalar(text, style, tag.as_ref(), mark)
    }
}

impl MarkedEventReceiver for DocumentBuilder {
    fn on_event(&mut self, ev: Event, marker: Marker) {
        match ev {
            Event::Nothing
            | Event::StreamStart
            | Event::StreamEnd
            | Event::DocumentStart
            | Event::DocumentEnd => {}

            Event::Alias(anchor_id) => {
                // a self-referencing alias points at a node that is not complete yet
                let value = self.anchors.get(&anchor_id).cloned().unwrap_or_default();
                self.complete(Value::tagged(Tag::Alias, value, marker.index()), 0);
            }

            Event::Scalar(text, style, anchor_id, tag) => {
                let value = self.scalar(text, style, tag, marker.index());
                self.complete(value, anchor_id);
            }

            Event::SequenceStart(anchor_id, tag) => self.stack.push(Frame {
                kind: FrameKind::Sequence(Vec::new()),
                anchor_id,
                tag,
                mark: marker.index(),
            }),

            Event::MappingStart(anchor_id, tag) => self.stack.push(Frame {
                kind: FrameKind::Mapping(Vec::new()),
                anchor_id,
                tag,
                mark: marker.index(),
            }),

            Event::SequenceEnd | Event::MappingEnd => {
                let Some(frame) = self.stack.pop() else {
                    return;
                };

                let value = match frame.kind {
                    FrameKind::Sequence(items) => Value::Sequence(items),
                    FrameKind::Mapping(entries) => Value::Mapping(build_mapping(entries)),
                };

                let value = match frame.tag.as_ref().map(resolver::classify) {
                    Some(Resolution::Directive(tag)) => Value::tagged(tag, value, frame.mark),
                    Some(Resolution::Core(_)) | None => value,
                };

                self.complete(value, frame.anchor_id);
            }
        }
    }
}

/// Builds a mapping; repeated merge keys are combined into one ordered list of merge sources
fn build_mapping(entries: Vec<(Value, Option<Value>)>) -> Mapping {
    let mut mapping = Mapping::with_capacity(entries.len());

    for (key, value) in entries {
        let value = value.unwrap_or_default();

        if key.is_merge_key() {
            if let Some(sources) = mapping.get_mut(&key) {
                *sources = match std::mem::take(sources) {
                    Value::Sequence(mut items) => {
                        items.push(value);
                        Value::Sequence(items)
                    }
                    first => Value::Sequence(vec![first, value]),
                };
                continue;
            }
        }

        mapping.insert(key, value);
    }

    mapping
}

#[cfg(test)]
mod test {
    use crate::value::MappingExt;
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_str(text: &str) -> Value {
        parse(text, Path::new("test.yaml"), &SourceLocator::new(text)).expect("valid yaml")
    }

    #[test]
    fn empty_documents_are_null() {
        assert_eq!(parse_str(""), Value::Null);
        assert_eq!(parse_str("# Comment"), Value::Null);
        assert_eq!(parse_str("null"), Value::Null);
        assert_eq!(parse_str("- null"), Value::from(vec![Value::Null]));
    }

    #[test]
    fn scalars_and_collections() {
        let value = parse_str("a: 1\nb: [x, 'true', true]\nc: { d: 1.5 }");

        assert_eq!(value.get("a"), Some(&Value::Integer(1)));
        assert_eq!(
            value.get("b"),
            Some(&Value::from(vec![
                Value::from("x"),
                Value::from("true"),
                Value::Bool(true)
            ]))
        );
        assert_eq!(value.pointer(["c", "d"]), Some(&Value::Float(1.5)));
    }

    #[test]
    fn anchors_and_aliases() {
        let value = parse_str("foo: &name bar\nbaz: *name\n? *name\n: qux\n").untagged();

        assert_eq!(value.get("baz"), Some(&Value::from("bar")));
        assert_eq!(value.get("bar"), Some(&Value::from("qux")));
    }

    #[test]
    fn aliases_are_tagged() {
        let value = parse_str("foo: &name ${x}\nbaz: *name\n");

        let alias = value.get("baz").and_then(Value::as_tagged).expect("tagged");
        assert_eq!(alias.tag, Tag::Alias);
        assert_eq!(alias.value, Value::from("${x}"));
        assert_eq!(value.get("foo"), Some(&Value::from("${x}")));
    }

    #[test]
    fn self_referencing_alias_is_null() {
        let value = parse_str("baz: &id001\n  me: *id001\n").untagged();
        assert_eq!(value.pointer(["baz", "me"]), Some(&Value::Null));
    }

    #[test]
    fn plain_merge_keys_are_tagged() {
        let value = parse_str("base: &base { a: 1 }\ntarget:\n  <<: *base\n  '<<': quoted\n");
        let target = value.get("target").and_then(Value::as_mapping).expect("mapping");

        assert_eq!(
            target.get(&Value::merge_key()).cloned().map(Value::unaliased),
            Some(Value::from_iter([("a", 1)]))
        );
        assert_eq!(target.get_str("<<"), Some(&Value::from("quoted")));
    }

    #[test]
    fn repeated_merge_keys_are_combined() {
        let value = parse_str("m1: &m1 { a: 1 }\nm2: &m2 { b: 2 }\ntarget:\n  <<: *m1\n  <<: *m2\n");
        let target = value.get("target").and_then(Value::as_mapping).expect("mapping");

        assert_eq!(target.len(), 1);
        let sources = target.get(&Value::merge_key()).and_then(Value::as_sequence).expect("sources");
        assert_eq!(
            sources.iter().cloned().map(Value::unaliased).collect::<Vec<_>>(),
            vec![Value::from_iter([("a", 1)]), Value::from_iter([("b", 2)])]
        );
    }

    #[test]
    fn merge_key_value_position_is_a_string() {
        let value = parse_str("key: <<");
        assert_eq!(value.get("key"), Some(&Value::from("<<")));
    }

    #[test]
    fn directive_tags_on_collections_and_keys() {
        let value = parse_str("a: !sub\n  b: ${x}\nc:\n  !sub ${name}: 1\n");

        let a = value.get("a").and_then(Value::as_tagged).expect("tagged");
        assert_eq!(a.tag, Tag::Sub(None));
        assert_eq!(a.value, Value::from_iter([("b", "${x}")]));

        let c = value.get("c").and_then(Value::as_mapping).expect("mapping");
        let (key, _) = c.first().expect("entry");
        assert_eq!(key.as_tagged().map(|t| &t.tag), Some(&Tag::Sub(None)));
    }

    #[test]
    fn syntax_errors_carry_a_location() {
        let text = "a: 1\nb: [unclosed\n";
        let error = parse(text, Path::new("broken.yaml"), &SourceLocator::new(text))
            .expect_err("must fail");

        let ComposeError::Syntax { location, .. } = error else {
            panic!("expected a syntax error, got {error:?}");
        };
        assert_eq!(location.file, Path::new("broken.yaml"));
        assert!(location.line >= 2, "{location}");
    }
}
