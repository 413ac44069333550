use super::{Action, Phase, Processor, Walk};
use crate::error::ComposeError;
use crate::value::{Tag, Tagged, Value};

/// `!remove` and `!replace`
///
/// ```yaml
/// packages:
///   defaults:
///     logging:
///       level: debug
///       format: json
/// logging: !replace
///   level: warn
/// metrics: !remove
/// ```
///
/// Both markers survive the standard pass (a `!replace` payload is transformed, the marker is kept) so that package
/// merging can see them. The package override pass then deletes `!remove`d nodes and unwraps `!replace`.
pub struct OverrideProcessor;

impl Processor for OverrideProcessor {
    fn apply(&self, value: Value, walk: &Walk) -> Result<Action, ComposeError> {
        let Value::Tagged(tagged) = value else {
            return Ok(Action::Unchanged(value));
        };
        if !tagged.tag.is_override_marker() {
            return Ok(Action::Unchanged(Value::Tagged(tagged)));
        }

        let Tagged { tag, value, mark } = *tagged;
        match (walk.phase, tag) {
            (Phase::Standard, Tag::Replace) => {
                let payload = walk.transform(value)?.unwrap_or_default();
                Ok(Action::Replace(Value::tagged(Tag::Replace, payload, mark)))
            }
            (Phase::PackageOverrides, Tag::Replace) => Ok(match walk.transform(value)? {
                Some(payload) => Action::Replace(payload),
                None => Action::Remove,
            }),
            (Phase::PackageOverrides, _) => Ok(Action::Remove),
            (Phase::Standard, tag) => Ok(Action::Unchanged(Value::tagged(tag, value, mark))),
        }
    }
}
