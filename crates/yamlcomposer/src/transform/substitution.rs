use super::{Action, Processor, Walk};
use crate::error::ComposeError;
use crate::interpolate::{interpolate, Pattern};
use crate::value::{Tag, Value};

/// Interpolates strings inside a `!sub` context
pub struct SubstitutionProcessor;

impl Processor for SubstitutionProcessor {
    fn apply(&self, value: Value, walk: &Walk) -> Result<Action, ComposeError> {
        let (Some(pattern), Value::String(text)) = (&walk.sub, &value) else {
            return Ok(Action::Unchanged(value));
        };
        if !walk.is_standard() {
            return Ok(Action::Unchanged(value));
        }

        match interpolate(text, pattern, walk.scope, walk.logger()) {
            Some(interpolated) => Ok(Action::Replace(interpolated)),
            None => Ok(Action::Unchanged(value)),
        }
    }
}

/// `!sub`, `!sub:<pattern variable>` and `!nosub` switch substitution on and off for their subtree
///
/// Aliased nodes are spliced in like `!nosub`, a `!sub` around an alias does not reach the anchored node.
pub struct SubScopeProcessor;

impl Processor for SubScopeProcessor {
    fn apply(&self, value: Value, walk: &Walk) -> Result<Action, ComposeError> {
        let Value::Tagged(tagged) = value else {
            return Ok(Action::Unchanged(value));
        };
        if !walk.is_standard() {
            return Ok(Action::Unchanged(Value::Tagged(tagged)));
        }

        let sub = match &tagged.tag {
            Tag::Sub(variable) => Some(resolve_pattern(variable.as_deref(), walk)),
            Tag::NoSub | Tag::Alias => None,
            _ => return Ok(Action::Unchanged(Value::Tagged(tagged))),
        };

        Ok(match walk.with_sub(sub).transform(tagged.value)? {
            Some(transformed) => Action::Replace(transformed),
            None => Action::Remove,
        })
    }
}

/// The pattern for `!sub:<variable>`, the default pattern for a plain `!sub`
pub(crate) fn resolve_pattern(variable: Option<&str>, walk: &Walk) -> Pattern {
    let Some(variable) = variable else {
        return Pattern::default();
    };

    match walk.scope.get(variable) {
        Some(Value::String(delimiters)) => match Pattern::parse(delimiters) {
            Some(pattern) => pattern,
            None => {
                walk.warn(format!(
                    "Invalid substitution pattern '{delimiters}' in variable '{variable}', expected PREFIX..SUFFIX. Using '{}'",
                    Pattern::default()
                ));
                Pattern::default()
            }
        },
        _ => {
            walk.warn(format!(
                "Substitution pattern variable '{variable}' is not defined. Using '{}'",
                Pattern::default()
            ));
            Pattern::default()
        }
    }
}

/// Unknown tags are reported and dropped
pub struct UnknownTagProcessor;

impl Processor for UnknownTagProcessor {
    fn apply(&self, value: Value, walk: &Walk) -> Result<Action, ComposeError> {
        let Value::Tagged(tagged) = value else {
            return Ok(Action::Unchanged(value));
        };
        let Tag::Unknown(name) = &tagged.tag else {
            return Ok(Action::Unchanged(Value::Tagged(tagged)));
        };
        if !walk.is_standard() {
            return Ok(Action::Unchanged(Value::Tagged(tagged)));
        }

        walk.warn(format!(
            "{}: Unknown tag '!{name}' ignored",
            walk.locate(tagged.mark)
        ));
        Ok(match walk.transform(tagged.value)? {
            Some(transformed) => Action::Replace(transformed),
            None => Action::Remove,
        })
    }
}
