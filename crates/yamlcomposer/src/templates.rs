//! file-local templates
//!
//! ```yaml
//! templates:
//!   service:
//!     image: !sub app:${ version }
//!     replicas: !sub ${ replicas | default(1) }
//! ```
//!
//! Bodies are stored untransformed and instantiated by `!insert` with the scope of the insertion point.
//! A `templates: !sub` section has its names substituted right away, its bodies are instantiated with substitution
//! enabled.
use crate::error::ComposeError;
use crate::transform::{resolve_pattern, Walk};
use crate::value::{Tag, Tagged, Value};
use indexmap::IndexMap;

#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: IndexMap<String, Value>,
}

impl TemplateRegistry {
    /// Extracts the templates of a `templates:` section
    pub fn load(section: Value, walk: &Walk) -> Result<Self, ComposeError> {
        let mut registry = TemplateRegistry::default();

        match section.unaliased() {
            Value::Null => {}
            Value::Mapping(entries) => {
                for (name, body) in entries {
                    registry.define(name.to_key_string(), body);
                }
            }
            Value::Tagged(tagged) => {
                let Tagged { tag, value, mark } = *tagged;
                match (tag, value) {
                    (Tag::Sub(variable), Value::Mapping(entries)) => {
                        let keys = walk.with_sub(Some(resolve_pattern(variable.as_deref(), walk)));
                        for (name, body) in entries {
                            let Some(name) = keys.transform(name)? else {
                                continue;
                            };
                            let body = Value::tagged(Tag::Sub(variable.clone()), body, mark);
                            registry.define(name.to_key_string(), body);
                        }
                    }
                    (Tag::Include, value) => {
                        let included = walk.transform(Value::tagged(Tag::Include, value, mark))?;
                        match included {
                            Some(Value::Mapping(entries)) => {
                                for (name, body) in entries {
                                    registry.define(name.to_key_string(), body);
                                }
                            }
                            Some(Value::Null) | None => {}
                            Some(other) => invalid(&other, walk),
                        }
                    }
                    (_, other) => invalid(&other, walk),
                }
            }
            other => invalid(&other, walk),
        }

        tracing::trace!(templates = registry.templates.len(), "templates loaded");
        Ok(registry)
    }

    pub fn define(&mut self, name: impl Into<String>, body: Value) {
        self.templates.insert(name.into(), body);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.templates.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

fn invalid(section: &Value, walk: &Walk) {
    walk.warn(format!(
        "The 'templates' section must be a mapping, got {}",
        section.type_name()
    ));
}
