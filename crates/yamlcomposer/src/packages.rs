//! packages merged into the document root
//!
//! ```yaml
//! packages:
//!   logging: !include packages/logging.inc.yaml
//!   metrics:
//!     metrics:
//!       port: !sub ${ 9000 + offset }
//! ```
//!
//! Every package is transformed with `package_id` (its key) in scope and deep merged into the root: maps merge
//! recursively, scalars of later packages win and sequences are appended. `!remove` and `!replace` markers of the
//! root are kept so the package override pass can apply them to the merged result.
use crate::error::ComposeError;
use crate::transform::{resolve_pattern, Walk};
use crate::value::{Mapping, Tag, Tagged, Value};

pub const PACKAGE_ID: &str = "package_id";

/// Merges all packages of `section` into `root`
///
/// A `!sub` or `!nosub` on the section applies to every package, which still sees its own `package_id`. Any other
/// tag (`!include`, `!if`, ...) is resolved first and must produce the mapping of packages.
pub fn merge_packages(root: &mut Mapping, section: Value, walk: &Walk) -> Result<(), ComposeError> {
    let (section, sub) = match section.unaliased() {
        Value::Tagged(tagged) => {
            let Tagged { tag, value, mark } = *tagged;
            match (tag, value) {
                (Tag::Sub(variable), packages @ Value::Mapping(_)) => {
                    let pattern = resolve_pattern(variable.as_deref(), walk);
                    (packages, Some(pattern))
                }
                (Tag::NoSub, packages @ Value::Mapping(_)) => (packages, None),
                (tag, value) => {
                    let resolved = walk.transform(Value::tagged(tag, value, mark))?;
                    (resolved.unwrap_or_default(), walk.sub.clone())
                }
            }
        }
        other => (other, walk.sub.clone()),
    };

    let packages = match section {
        Value::Null => return Ok(()),
        Value::Mapping(packages) => packages,
        other => {
            walk.warn(format!(
                "The 'packages' section must be a mapping, got {}",
                other.type_name()
            ));
            return Ok(());
        }
    };

    let walk = walk.with_sub(sub);
    for (id, body) in packages {
        let Some(id) = walk.transform(id)? else {
            continue;
        };
        let id = id.to_key_string();
        let mut scope = walk.scope.clone();
        scope.define(PACKAGE_ID, id.as_str());

        match walk.with_scope(&scope).transform(body)? {
            Some(Value::Mapping(package)) => {
                tracing::debug!(package = %id, keys = package.len(), "merging package");
                deep_merge(root, package);
            }
            Some(Value::Null) | None => {}
            Some(other) => walk.warn(format!(
                "Package '{id}' must be a mapping, got {}",
                other.type_name()
            )),
        }
    }

    Ok(())
}

/// Merges `source` into `target`
pub fn deep_merge(target: &mut Mapping, source: Mapping) {
    for (key, incoming) in source {
        let Some(existing) = target.get_mut(&key) else {
            target.insert(key, incoming);
            continue;
        };

        match (existing, incoming) {
            (Value::Tagged(marker), _) if marker.tag.is_override_marker() => {}
            (Value::Mapping(existing), Value::Mapping(incoming)) => deep_merge(existing, incoming),
            (Value::Sequence(existing), Value::Sequence(incoming)) => existing.extend(incoming),
            (existing, incoming) => *existing = incoming,
        }
    }
}

/// `!remove` and `!replace` markers still present in a tree
pub fn has_override_markers(value: &Value) -> bool {
    match value {
        Value::Tagged(tagged) => {
            matches!(tagged.tag, Tag::Remove | Tag::Replace) || has_override_markers(&tagged.value)
        }
        Value::Sequence(items) => items.iter().any(has_override_markers),
        Value::Mapping(mapping) => mapping
            .iter()
            .any(|(key, value)| has_override_markers(key) || has_override_markers(value)),
        _ => false,
    }
}
