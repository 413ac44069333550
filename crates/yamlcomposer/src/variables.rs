//! variable scopes
//!
//! Every document starts with a set of built-in variables describing the document itself. They are followed by
//! variables inherited from an including document and finally by the document's own `variables:` section:
//!
//! ```yaml
//! variables:
//!   env: production
//!   host: !sub db-${ env }.internal    # may use variables defined above
//!   limits: !include limits.inc.yaml  # may be included
//! ```
//!
//! Built-in variables can never be overridden and inherited variables win over a document's own definitions.
use crate::config::ComposerConfig;
use crate::diagnostics::BufferedLogger;
use crate::error::ComposeError;
use crate::interpolate::Pattern;
use crate::templates::TemplateRegistry;
use crate::transform::{resolve_pattern, Walk};
use crate::value::{Mapping, Tag, Tagged, Value};
use indexmap::{IndexMap, IndexSet};
use std::path::Path;

pub const FILE: &str = "__FILE__";
pub const FILE_NAME: &str = "__FILE_NAME__";
pub const FILE_EXT: &str = "__FILE_EXT__";
pub const DIRECTORY: &str = "__DIRECTORY__";
pub const RELATIVE_FILE: &str = "__RELATIVE_FILE__";
pub const CONFIG_ROOT: &str = "CONFIG_ROOT";
pub const ENV: &str = "ENV";

const BUILTINS: [&str; 7] = [
    FILE,
    FILE_NAME,
    FILE_EXT,
    DIRECTORY,
    RELATIVE_FILE,
    CONFIG_ROOT,
    ENV,
];

/// An ordered name -> value scope
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variables {
    values: IndexMap<String, Value>,
}

impl Variables {
    /// The built-in variables of `file`
    pub fn builtin(file: &Path, config: &ComposerConfig) -> Self {
        let mut variables = Variables::default();
        let text = |path: &Path| Value::from(path.display().to_string());
        let os_text = |text: Option<&std::ffi::OsStr>| {
            Value::from(text.map(|text| text.to_string_lossy().into_owned()).unwrap_or_default())
        };

        let config_root = std::fs::canonicalize(&config.config_root)
            .unwrap_or_else(|_| config.config_root.clone());
        let relative = file
            .strip_prefix(&config_root)
            .or_else(|_| file.strip_prefix(&config.config_root))
            .unwrap_or(file);

        let mut environment: Vec<(String, String)> = std::env::vars_os()
            .map(|(name, value)| {
                (
                    name.to_string_lossy().into_owned(),
                    value.to_string_lossy().into_owned(),
                )
            })
            .collect();
        environment.sort();

        variables.set_builtin(FILE, text(file));
        variables.set_builtin(FILE_NAME, os_text(file.file_stem()));
        variables.set_builtin(FILE_EXT, os_text(file.extension()));
        variables.set_builtin(DIRECTORY, text(file.parent().unwrap_or(Path::new(""))));
        variables.set_builtin(RELATIVE_FILE, text(relative));
        variables.set_builtin(CONFIG_ROOT, text(&config.config_root));
        variables.set_builtin(ENV, Value::from_iter(environment));
        variables
    }

    pub fn is_builtin(name: &str) -> bool {
        BUILTINS.contains(&name)
    }

    fn set_builtin(&mut self, name: &'static str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Defines or redefines a variable, built-in names are refused
    pub fn define(&mut self, name: impl Into<String>, value: impl Into<Value>) -> bool {
        let name = name.into();
        if Self::is_builtin(&name) {
            return false;
        }
        self.values.insert(name, value.into());
        true
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The whole scope as a mapping value
    pub fn to_mapping(&self) -> Value {
        Value::from_iter(self.values.iter().map(|(k, v)| (k.as_str(), v.clone())))
    }

    /// What a nested document inherits: the user defined variables of this scope plus `vars`
    pub fn inherit(&self, vars: &Mapping, logger: &BufferedLogger) -> Variables {
        let mut inherited = Variables {
            values: self
                .values
                .iter()
                .filter(|(name, _)| !Self::is_builtin(name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        };
        inherited.define_all(vars, logger);
        inherited
    }

    /// This scope (including built-ins) plus `vars`
    pub fn overlay(&self, vars: &Mapping, logger: &BufferedLogger) -> Variables {
        let mut overlaid = self.clone();
        overlaid.define_all(vars, logger);
        overlaid
    }

    /// Adds all variables of `other`, skipping built-ins
    pub fn extend_from(&mut self, other: &Variables) {
        for (name, value) in &other.values {
            self.define(name.clone(), value.clone());
        }
    }

    fn define_all(&mut self, vars: &Mapping, logger: &BufferedLogger) {
        for (name, value) in vars {
            self.define_logged(name.to_key_string(), value.clone(), logger);
        }
    }

    fn define_logged(&mut self, name: String, value: Value, logger: &BufferedLogger) {
        if !self.define(name.as_str(), value) {
            logger.warn(format!("Cannot override built-in variable '{name}'"));
        }
    }
}

/// Evaluates a `variables:` section entry by entry
///
/// Each value is transformed with the scope built so far, so later variables can refer to earlier ones. Names
/// in `protected` (variables inherited from an including document) keep their inherited value.
pub struct VariableLoader<'w, 'a> {
    walk: &'w Walk<'a>,
    protected: IndexSet<String>,
}

impl<'w, 'a> VariableLoader<'w, 'a> {
    pub fn new(walk: &'w Walk<'a>, protected: impl IntoIterator<Item = String>) -> Self {
        Self {
            walk,
            protected: protected.into_iter().collect(),
        }
    }

    /// Loads `section` on top of the walk's scope
    pub fn load(&self, section: Value) -> Result<Variables, ComposeError> {
        let mut scope = self.walk.scope.clone();

        let (entries, sub) = match section.unaliased() {
            Value::Null => return Ok(scope),
            Value::Mapping(entries) => (entries, None),
            Value::Tagged(tagged) => {
                let Tagged { tag, value, mark } = *tagged;
                match (tag, value) {
                    (Tag::Sub(variable), Value::Mapping(entries)) => {
                        let sub = resolve_pattern(variable.as_deref(), self.walk);
                        (entries, Some(sub))
                    }
                    (Tag::Include, value) => {
                        let included = Value::tagged(Tag::Include, value, mark);
                        match self.walk.transform(included)? {
                            Some(Value::Mapping(entries)) => (entries, None),
                            Some(Value::Null) | None => return Ok(scope),
                            Some(other) => {
                                self.invalid(&other);
                                return Ok(scope);
                            }
                        }
                    }
                    (_, other) => {
                        self.invalid(&other);
                        return Ok(scope);
                    }
                }
            }
            other => {
                self.invalid(&other);
                return Ok(scope);
            }
        };

        for (name, value) in entries {
            let name = name.to_key_string();
            if self.protected.contains(&name) {
                tracing::trace!(variable = %name, "keeping inherited value");
                continue;
            }

            let value = self.evaluate(value, &scope, sub.clone())?;
            scope.define_logged(name, value, self.walk.logger());
        }

        Ok(scope)
    }

    fn evaluate(
        &self,
        value: Value,
        scope: &Variables,
        sub: Option<Pattern>,
    ) -> Result<Value, ComposeError> {
        let templates = TemplateRegistry::default();
        let mut walk = self.walk.with_scope(scope);
        walk.templates = &templates;
        walk.sub = sub;
        Ok(walk.transform(value)?.unwrap_or_default())
    }

    fn invalid(&self, section: &Value) {
        self.walk.warn(format!(
            "The 'variables' section must be a mapping, got {}",
            section.type_name()
        ));
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::diagnostics::LogSession;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn builtin_variables() {
        let config = ComposerConfig::new("/nonexistent/root");
        let file = PathBuf::from("/nonexistent/root/services/web.inc.yaml");
        let variables = Variables::builtin(&file, &config);

        assert_eq!(
            variables.get(FILE),
            Some(&Value::from("/nonexistent/root/services/web.inc.yaml"))
        );
        assert_eq!(variables.get(FILE_NAME), Some(&Value::from("web.inc")));
        assert_eq!(variables.get(FILE_EXT), Some(&Value::from("yaml")));
        assert_eq!(
            variables.get(DIRECTORY),
            Some(&Value::from("/nonexistent/root/services"))
        );
        assert_eq!(
            variables.get(RELATIVE_FILE),
            Some(&Value::from("services/web.inc.yaml"))
        );
        assert_eq!(variables.get(CONFIG_ROOT), Some(&Value::from("/nonexistent/root")));
        assert!(matches!(variables.get(ENV), Some(Value::Mapping(_))));
    }

    #[test]
    fn builtins_are_protected() {
        let session = LogSession::default();
        let logger = BufferedLogger::new(&session, "test", None);
        let config = ComposerConfig::new("/srv");
        let mut variables = Variables::builtin(Path::new("/srv/main.yaml"), &config);

        assert!(!variables.define(FILE, "other.yaml"));
        assert!(variables.define("name", "main"));

        let vars = Value::from_iter([("__FILE__", "x"), ("port", "80")])
            .into_mapping()
            .unwrap_or_default();
        let overlaid = variables.overlay(&vars, &logger);
        assert_eq!(overlaid.get(FILE), Some(&Value::from("/srv/main.yaml")));
        assert_eq!(overlaid.get("port"), Some(&Value::from("80")));
        assert_eq!(
            session.tracked_warnings(),
            vec!["Cannot override built-in variable '__FILE__'"]
        );
    }

    #[test]
    fn inherit_drops_builtins_and_vars_win() {
        let session = LogSession::default();
        let logger = BufferedLogger::new(&session, "test", None);
        let config = ComposerConfig::new("/srv");
        let mut variables = Variables::builtin(Path::new("/srv/main.yaml"), &config);
        variables.define("env", "dev");
        variables.define("region", "eu");

        let vars = Value::from_iter([("env", "prod")])
            .into_mapping()
            .unwrap_or_default();
        let inherited = variables.inherit(&vars, &logger);

        assert_eq!(inherited.names().collect::<Vec<_>>(), vec!["env", "region"]);
        assert_eq!(inherited.get("env"), Some(&Value::from("prod")));
        assert!(session.tracked_warnings().is_empty());
    }
}
