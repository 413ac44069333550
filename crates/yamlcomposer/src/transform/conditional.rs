use super::{Action, Processor, Walk};
use crate::error::ComposeError;
use crate::interpolate::evaluate;
use crate::value::{Mapping, MappingExt, Tag, Tagged, Value};

/// `!if` in mapping form
///
/// ```yaml
/// key: !if
///   if: enabled
///   then: on
///   else: off
/// ```
///
/// or sequence form
///
/// ```yaml
/// key: !if
///   - if: mode == 'a'
///     then: 1
///   - elseif: mode == 'b'
///     then: 2
///   - else: 3
/// ```
///
/// Only the selected branch is transformed. Without a selected branch the node is removed.
pub struct IfProcessor;

impl Processor for IfProcessor {
    fn apply(&self, value: Value, walk: &Walk) -> Result<Action, ComposeError> {
        let Value::Tagged(tagged) = value else {
            return Ok(Action::Unchanged(value));
        };
        if tagged.tag != Tag::If || !walk.is_standard() {
            return Ok(Action::Unchanged(Value::Tagged(tagged)));
        }

        let Tagged { value, mark, .. } = *tagged;

        let branch = match value {
            Value::Mapping(clause) => {
                if !clause.contains_str("if") {
                    walk.warn(format!(
                        "{}: Failed to process !if: missing 'if' condition",
                        walk.locate(mark)
                    ));
                    return Ok(Action::Remove);
                }
                mapping_branch(clause, walk)?
            }
            Value::Sequence(clauses) => sequence_branch(clauses, walk)?,
            other => {
                walk.warn(format!(
                    "{}: Failed to process !if: expected a mapping or a sequence, got {}",
                    walk.locate(mark),
                    other.type_name()
                ));
                return Ok(Action::Remove);
            }
        };

        let Some(branch) = branch else {
            return Ok(Action::Remove);
        };
        Ok(match walk.transform(branch)? {
            Some(transformed) => Action::Replace(transformed),
            None => Action::Remove,
        })
    }
}

fn mapping_branch(mut clause: Mapping, walk: &Walk) -> Result<Option<Value>, ComposeError> {
    let condition = clause.remove_str("if").unwrap_or_default();
    if is_true(condition, walk)? {
        Ok(clause.remove_str("then"))
    } else {
        Ok(clause.remove_str("else"))
    }
}

fn sequence_branch(clauses: Vec<Value>, walk: &Walk) -> Result<Option<Value>, ComposeError> {
    for (position, clause) in clauses.into_iter().enumerate() {
        let clause = clause.unaliased();
        let Value::Mapping(mut clause) = clause else {
            walk.warn(format!(
                "Failed to process !if: clause {} must be a mapping, got {}",
                position + 1,
                clause.type_name()
            ));
            continue;
        };

        if let Some(otherwise) = clause.remove_str("else") {
            return Ok(Some(otherwise));
        }

        let condition = ["if", "elseif", "elif"]
            .into_iter()
            .find_map(|key| clause.remove_str(key));
        let Some(condition) = condition else {
            walk.warn(format!(
                "Failed to process !if: clause {} has no 'if', 'elseif' or 'else'",
                position + 1
            ));
            continue;
        };

        if is_true(condition, walk)? {
            return Ok(clause.remove_str("then"));
        }
    }
    Ok(None)
}

/// Transforms a condition; strings are evaluated as expressions
fn is_true(condition: Value, walk: &Walk) -> Result<bool, ComposeError> {
    let condition = walk.transform(condition)?.unwrap_or_default();

    let Value::String(expression) = condition else {
        return Ok(condition.is_truthy());
    };
    if expression.trim().is_empty() {
        return Ok(false);
    }

    let value = evaluate(&expression, walk.scope, walk.logger());
    Ok(value.is_some_and(|value| value.is_truthy()))
}
