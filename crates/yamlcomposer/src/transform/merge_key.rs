use super::{Action, Processor, Walk};
use crate::error::ComposeError;
use crate::value::{Mapping, Value};

/// Resolves `<<` merge keys once substitution, includes and inserts produced their sources
///
/// Local keys win over merged keys and earlier sources win over later ones. The merge is shallow.
pub struct MergeKeyProcessor;

impl Processor for MergeKeyProcessor {
    fn apply(&self, value: Value, walk: &Walk) -> Result<Action, ComposeError> {
        let Value::Mapping(mut mapping) = value else {
            return Ok(Action::Unchanged(value));
        };
        if !walk.is_standard() {
            return Ok(Action::Unchanged(Value::Mapping(mapping)));
        }
        let Some(sources) = mapping.shift_remove(&Value::merge_key()) else {
            return Ok(Action::Unchanged(Value::Mapping(mapping)));
        };

        for source in merge_sources(sources, walk) {
            for (key, value) in source {
                mapping.entry(key).or_insert(value);
            }
        }

        Ok(Action::Replace(Value::Mapping(mapping)))
    }
}

fn merge_sources(sources: Value, walk: &Walk) -> Vec<Mapping> {
    match sources {
        Value::Null => Vec::new(),
        Value::Mapping(source) => vec![source],
        // repeated `<<` keys whose first source is an aliased sequence nest one level
        Value::Sequence(items) => items
            .into_iter()
            .flat_map(|item| merge_sources(item, walk))
            .collect(),
        other => {
            invalid_source(&other, walk);
            Vec::new()
        }
    }
}

fn invalid_source(source: &Value, walk: &Walk) {
    walk.warn(format!(
        "Expected a mapping or a sequence of mappings for merge key '<<', got {}",
        source.type_name()
    ));
}
