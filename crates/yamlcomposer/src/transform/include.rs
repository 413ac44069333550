use super::{Action, Processor, Walk};
use crate::composer::YamlComposer;
use crate::error::{Chain, ComposeError};
use crate::resolver::resolve_plain_str;
use crate::value::{Mapping, MappingExt, Tag, Tagged, Value};
use std::path::PathBuf;

/// Target and local variables of an `!include` or `!insert`
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct IncludeArguments {
    pub target: String,
    pub vars: Mapping,
}

/// Reads the arguments of a (transformed) directive payload
///
/// - scalar form `target?a=1&flag`, argument values are plain yaml scalars and a bare flag is `true`
/// - mapping form `{<name_key>: target, vars: {...}}`
///
/// `None` if there is no target.
pub(crate) fn parse_arguments(payload: Value, name_key: &str) -> Option<IncludeArguments> {
    match payload {
        Value::Null => None,
        Value::Mapping(mut mapping) => {
            let target = mapping
                .remove_str(name_key)
                .filter(|target| !target.is_null())?
                .to_key_string();
            let vars = mapping
                .remove_str("vars")
                .and_then(Value::into_mapping)
                .unwrap_or_default();
            non_blank(target, vars)
        }
        Value::String(text) => {
            let Some((target, query)) = text.split_once('?') else {
                return non_blank(text, Mapping::new());
            };

            let mut vars = Mapping::new();
            for argument in query.split('&').filter(|argument| !argument.is_empty()) {
                let (name, value) = match argument.split_once('=') {
                    Some((name, value)) => (name, resolve_plain_str(value)),
                    None => (argument, Value::Bool(true)),
                };
                vars.insert(Value::from(name), value);
            }
            non_blank(target.to_string(), vars)
        }
        other => non_blank(other.to_key_string(), Mapping::new()),
    }
}

fn non_blank(target: String, vars: Mapping) -> Option<IncludeArguments> {
    let target = target.trim();
    if target.is_empty() {
        return None;
    }
    Some(IncludeArguments {
        target: target.to_string(),
        vars,
    })
}

/// `!include` replaces the node with the composed contents of another file
///
/// ```yaml
/// database: !include database.inc.yaml
/// cache: !include $shared/cache.inc.yaml?ttl=60
/// server: !include
///   file: "@/server.inc.yaml"
///   vars:
///     port: 8080
/// ```
///
/// The included file sees the variables of the including scope plus `vars`, its own `variables:` section
/// cannot override them.
pub struct IncludeProcessor;

impl Processor for IncludeProcessor {
    fn apply(&self, value: Value, walk: &Walk) -> Result<Action, ComposeError> {
        let Value::Tagged(tagged) = value else {
            return Ok(Action::Unchanged(value));
        };
        if tagged.tag != Tag::Include || !walk.is_standard() {
            return Ok(Action::Unchanged(Value::Tagged(tagged)));
        }

        let Tagged { value, mark, .. } = *tagged;
        let payload = walk.transform(value)?.unwrap_or_default();
        let Some(arguments) = parse_arguments(payload, "file") else {
            walk.warn(format!(
                "{}: Failed to process !include: missing 'file' parameter",
                walk.locate(mark)
            ));
            return Ok(Action::Remove);
        };

        let composer = walk.composer;
        let config = &composer.context().config;
        let path = resolve_path(&arguments.target, composer);
        let target = std::fs::canonicalize(&path).map_err(|e| ComposeError::io(&path, e))?;

        let stack = composer.include_stack();
        if stack.contains(&target) {
            return Err(ComposeError::CircularInclusion {
                location: walk.locate(mark),
                chain: stack.iter().chain([&target]).collect::<Chain>(),
            });
        }
        if stack.len() > config.max_include_depth {
            return Err(ComposeError::IncludeDepth {
                location: walk.locate(mark),
                max: config.max_include_depth,
                path: target,
            });
        }

        tracing::debug!(from=%composer.file().display(), path=%target.display(), "including file");
        composer.context().notify_include(&target);

        let inherited = walk.scope.inherit(&arguments.vars, walk.logger());
        let mut child_stack = stack.to_vec();
        child_stack.push(target.clone());

        let child = YamlComposer::new(composer.context(), target, child_stack)?;
        Ok(Action::Replace(child.compose(Some(&inherited))?))
    }
}

/// `@path` is relative to the config root, `$path` to the include root and anything else to the including file
fn resolve_path(target: &str, composer: &YamlComposer) -> PathBuf {
    let config = &composer.context().config;
    if let Some(rest) = target.strip_prefix('@') {
        config.config_root.join(rest.trim_start_matches('/'))
    } else if let Some(rest) = target.strip_prefix('$') {
        config.include_root.join(rest.trim_start_matches('/'))
    } else {
        composer.directory().join(target)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn arguments(target: &str, vars: Mapping) -> Option<IncludeArguments> {
        Some(IncludeArguments {
            target: target.to_string(),
            vars,
        })
    }

    #[test]
    fn scalar_form() {
        assert_eq!(
            parse_arguments(Value::from("db.inc.yaml"), "file"),
            arguments("db.inc.yaml", Mapping::new())
        );

        let vars = Value::from_iter([
            ("port", Value::from(8080)),
            ("name", Value::from("main")),
            ("debug", Value::from(true)),
        ]);
        assert_eq!(
            parse_arguments(Value::from("db.inc.yaml?port=8080&name=main&debug"), "file"),
            arguments("db.inc.yaml", vars.into_mapping().unwrap_or_default())
        );
    }

    #[test]
    fn mapping_form() {
        let payload = Value::from_iter([
            ("template", Value::from("service")),
            ("vars", Value::from_iter([("replicas", 3)])),
        ]);
        let vars = Value::from_iter([("replicas", 3)]).into_mapping().unwrap_or_default();
        assert_eq!(
            parse_arguments(payload, "template"),
            arguments("service", vars)
        );
    }

    #[test]
    fn missing_target() {
        assert_eq!(parse_arguments(Value::Null, "file"), None);
        assert_eq!(parse_arguments(Value::from("  "), "file"), None);
        assert_eq!(parse_arguments(Value::from("?a=1"), "file"), None);
        assert_eq!(
            parse_arguments(Value::from_iter([("vars", Value::Null)]), "file"),
            None
        );
        assert_eq!(
            parse_arguments(Value::from_iter([("file", "x.yaml")]), "template"),
            None
        );
    }
}
