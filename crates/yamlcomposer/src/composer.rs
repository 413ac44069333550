//! composing a single document
//!
//! A [YamlComposer] is created for the top-level document and for every included file. All composers of one
//! top-level load share a [LoadContext]: configuration, file cache, warning session and include callback.
//!
//! Composing a document runs these steps
//! 1. read the file (through the [IncludeCache]) and parse it
//! 2. set up the built-in variables, plus variables inherited from an including document
//! 3. documents that are not a mapping only get the standard pass (and the override pass if top-level)
//! 4. remove the `variables`, `templates` and `packages` sections
//! 5. evaluate `variables`
//! 6. register `templates`
//! 7. run the standard pass over the rest of the document
//! 8. merge `packages` and drop hidden (`.`-prefixed) top-level keys
//! 9. top-level only: run the package override pass, drop null keys and all remaining tags
use crate::cache::IncludeCache;
use crate::config::ComposerConfig;
use crate::diagnostics::{BufferedLogger, LogSession};
use crate::document;
use crate::error::ComposeError;
use crate::packages::{has_override_markers, merge_packages};
use crate::source::{Location, SourceLocator};
use crate::templates::TemplateRegistry;
use crate::transform::{Phase, RecursiveTransformer, Walk};
use crate::value::{Mapping, MappingExt, Value};
use crate::variables::{VariableLoader, Variables};
use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// State shared by all composers of one top-level load
pub struct LoadContext<'a> {
    pub config: ComposerConfig,
    pub cache: &'a IncludeCache,
    pub session: &'a LogSession,
    on_include: &'a dyn Fn(&Path),
    transformer: RecursiveTransformer,
    notified: RefCell<HashSet<PathBuf>>,
}

impl<'a> LoadContext<'a> {
    pub fn new(
        config: ComposerConfig,
        cache: &'a IncludeCache,
        session: &'a LogSession,
        on_include: &'a dyn Fn(&Path),
    ) -> Self {
        Self {
            config,
            cache,
            session,
            on_include,
            transformer: RecursiveTransformer::default(),
            notified: RefCell::default(),
        }
    }

    /// Reports an included file to the host, once per file and load
    pub fn notify_include(&self, path: &Path) {
        let first = self.notified.borrow_mut().insert(path.to_path_buf());
        if first {
            tracing::trace!(path=%path.display(), "notifying include");
            (self.on_include)(path);
        }
    }
}

pub struct YamlComposer<'a> {
    context: &'a LoadContext<'a>,
    file: PathBuf,
    text: String,
    locator: SourceLocator,
    /// files being composed, the top-level document first and this file last
    include_stack: Vec<PathBuf>,
    logger: BufferedLogger<'a>,
}

impl<'a> YamlComposer<'a> {
    /// Loads and composes `path` with a configuration from the environment
    ///
    /// `on_include` is called once for every distinct file included along the way. Warnings are summarized
    /// and emitted when the load finishes.
    pub fn load(path: impl AsRef<Path>, on_include: impl Fn(&Path)) -> Result<Value, ComposeError> {
        let config = ComposerConfig::from_env()?;
        let cache = IncludeCache::default();
        let session = LogSession::default();
        let context = LoadContext::new(config, &cache, &session, &on_include);

        let result = YamlComposer::load_with(path, &context);
        session.close();
        result
    }

    /// Loads and composes `path` with an explicit context
    ///
    /// The session of the context is not closed.
    pub fn load_with(path: impl AsRef<Path>, context: &LoadContext) -> Result<Value, ComposeError> {
        let path = path.as_ref();
        let file = std::fs::canonicalize(path).map_err(|e| ComposeError::io(path, e))?;
        tracing::info!(path=%file.display(), "loading file");

        context.notified.borrow_mut().clear();
        let composer = YamlComposer::new(context, file.clone(), vec![file])?;
        composer.compose(None)
    }

    /// Reads `file`, which must be the last entry of `include_stack`
    pub fn new(
        context: &'a LoadContext<'a>,
        file: PathBuf,
        include_stack: Vec<PathBuf>,
    ) -> Result<Self, ComposeError> {
        let bytes = context.cache.read(&file)?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|_| ComposeError::Encoding { path: file.clone() })?
            .to_string();

        Ok(Self {
            context,
            locator: SourceLocator::new(&text),
            logger: BufferedLogger::new(context.session, "yamlcomposer", Some(file.clone())),
            file,
            text,
            include_stack,
        })
    }

    pub fn context(&self) -> &'a LoadContext<'a> {
        self.context
    }

    pub fn transformer(&self) -> &'a RecursiveTransformer {
        &self.context.transformer
    }

    pub fn logger(&self) -> &BufferedLogger<'a> {
        &self.logger
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn directory(&self) -> &Path {
        self.file.parent().unwrap_or(Path::new(""))
    }

    pub fn include_stack(&self) -> &[PathBuf] {
        &self.include_stack
    }

    /// A top-level document, not an include
    pub fn is_root(&self) -> bool {
        self.include_stack.len() <= 1
    }

    pub fn locate(&self, mark: usize) -> Location {
        self.locator.locate(&self.file, mark)
    }

    /// Composes the document, `inherited` are the variables passed down by an including document
    #[tracing::instrument(level = "trace", skip_all, fields(file = %self.file.display()))]
    pub fn compose(&self, inherited: Option<&Variables>) -> Result<Value, ComposeError> {
        let document = document::parse(&self.text, &self.file, &self.locator)?;

        let mut builtin = Variables::builtin(&self.file, &self.context.config);
        if let Some(inherited) = inherited {
            builtin.extend_from(inherited);
        }
        let no_templates = TemplateRegistry::default();

        let Value::Mapping(mut root) = document else {
            let walk = Walk::new(self, &no_templates, &builtin, Phase::Standard);
            let composed = walk.transform(document)?.unwrap_or_default();
            return self.finish(composed, &walk);
        };

        let variables = root.remove_str("variables");
        let templates = root.remove_str("templates");
        let packages = root.remove_str("packages");

        let walk = Walk::new(self, &no_templates, &builtin, Phase::Standard);
        let scope = match variables {
            Some(section) => {
                let protected = inherited
                    .into_iter()
                    .flat_map(|inherited| inherited.names().map(str::to_string));
                VariableLoader::new(&walk, protected).load(section)?
            }
            None => builtin.clone(),
        };

        let walk = Walk::new(self, &no_templates, &scope, Phase::Standard);
        let templates = match templates {
            Some(section) => TemplateRegistry::load(section, &walk)?,
            None => TemplateRegistry::default(),
        };

        let walk = Walk::new(self, &templates, &scope, Phase::Standard);
        let composed = match walk.transform(Value::Mapping(root))? {
            Some(Value::Mapping(mut tree)) => {
                if let Some(packages) = packages {
                    merge_packages(&mut tree, packages, &walk)?;
                }
                Value::Mapping(without_hidden_keys(tree))
            }
            other => other.unwrap_or_default(),
        };

        self.finish(composed, &walk)
    }

    /// The package override pass and cleanup of a top-level document
    fn finish(&self, composed: Value, walk: &Walk) -> Result<Value, ComposeError> {
        if !self.is_root() {
            return Ok(composed);
        }

        let composed = if has_override_markers(&composed) {
            let overrides = Walk::new(self, walk.templates, walk.scope, Phase::PackageOverrides);
            overrides.transform(composed)?.unwrap_or_default()
        } else {
            composed
        };

        Ok(without_null_keys(composed.untagged()))
    }
}

fn without_hidden_keys(mut tree: Mapping) -> Mapping {
    tree.retain(|key, _| !key.as_str().is_some_and(|key| key.starts_with('.')));
    tree
}

fn without_null_keys(value: Value) -> Value {
    match value {
        Value::Mapping(mapping) => Value::Mapping(
            mapping
                .into_iter()
                .filter(|(key, _)| !key.is_null())
                .map(|(key, value)| (key, without_null_keys(value)))
                .collect(),
        ),
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(without_null_keys).collect()),
        other => other,
    }
}
