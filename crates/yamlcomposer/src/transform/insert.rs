use super::{parse_arguments, Action, Processor, Walk};
use crate::error::ComposeError;
use crate::value::{Tag, Tagged, Value};

/// `!insert` instantiates a template of the current file
///
/// ```yaml
/// web: !insert service?replicas=3
/// worker: !insert
///   template: service
///   vars:
///     replicas: 1
/// ```
///
/// The template body is transformed at the insertion point with the current scope plus `vars`.
pub struct InsertProcessor;

impl Processor for InsertProcessor {
    fn apply(&self, value: Value, walk: &Walk) -> Result<Action, ComposeError> {
        let Value::Tagged(tagged) = value else {
            return Ok(Action::Unchanged(value));
        };
        if tagged.tag != Tag::Insert || !walk.is_standard() {
            return Ok(Action::Unchanged(Value::Tagged(tagged)));
        }

        let Tagged { value, mark, .. } = *tagged;
        let payload = walk.transform(value)?.unwrap_or_default();
        let Some(arguments) = parse_arguments(payload, "template") else {
            walk.warn(format!(
                "{}: Failed to process !insert: missing template name",
                walk.locate(mark)
            ));
            return Ok(Action::Remove);
        };

        let name = arguments.target;
        let Some(body) = walk.templates.get(&name) else {
            walk.warn(format!(
                "{}: Failed to process !insert: template not found: '{name}'",
                walk.locate(mark)
            ));
            return Ok(Action::Remove);
        };

        if walk.inserting.contains(&name) {
            return Err(ComposeError::CircularInsertion {
                location: walk.locate(mark),
                chain: walk.inserting.iter().chain([&name]).collect(),
            });
        }

        tracing::trace!(template = %name, "inserting template");
        let scope = walk.scope.overlay(&arguments.vars, walk.logger());
        let mut inner = walk.with_scope(&scope);
        inner.sub = None;
        inner.inserting.push(name);

        Ok(match inner.transform(body.clone())? {
            Some(instance) => Action::Replace(instance),
            None => Action::Remove,
        })
    }
}
