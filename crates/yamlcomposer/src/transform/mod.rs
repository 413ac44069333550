//! the recursive tree transformation
//!
//! [RecursiveTransformer::transform] walks the document depth first. Children of untagged mappings (keys first,
//! then values) and sequences are transformed before the node itself is offered to every [Processor] in order.
//! The first processor returning something other than [Action::Unchanged] ends the chain for that node.
//!
//! Tagged nodes have no generic children: the processor owning the tag decides what to transform (an `!if` only
//! transforms the selected branch, `!sub` transforms its payload with substitution enabled, ...).
//!
//! The processors act in two phases
//! - [Phase::Standard]: substitution, conditionals, includes, template insertion and merge keys
//! - [Phase::PackageOverrides]: `!remove` and `!replace`, after packages are merged
use crate::composer::YamlComposer;
use crate::diagnostics::BufferedLogger;
use crate::error::ComposeError;
use crate::interpolate::Pattern;
use crate::source::Location;
use crate::templates::TemplateRegistry;
use crate::value::{Mapping, Value};
use crate::variables::Variables;

mod conditional;
mod include;
mod insert;
mod merge_key;
mod overrides;
mod substitution;

pub use conditional::IfProcessor;
pub use include::IncludeProcessor;
pub use insert::InsertProcessor;
pub use merge_key::MergeKeyProcessor;
pub use overrides::OverrideProcessor;
pub use substitution::{SubScopeProcessor, SubstitutionProcessor, UnknownTagProcessor};

pub(crate) use include::parse_arguments;
pub(crate) use substitution::resolve_pattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Standard,
    PackageOverrides,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Unchanged(Value),
    Replace(Value),
    /// drop the node; mapping entries and sequence items disappear
    Remove,
}

pub trait Processor {
    fn apply(&self, value: Value, walk: &Walk) -> Result<Action, ComposeError>;
}

pub struct RecursiveTransformer {
    processors: Vec<Box<dyn Processor>>,
}

impl Default for RecursiveTransformer {
    fn default() -> Self {
        Self::new(vec![
            Box::new(SubstitutionProcessor),
            Box::new(SubScopeProcessor),
            Box::new(IfProcessor),
            Box::new(IncludeProcessor),
            Box::new(InsertProcessor),
            Box::new(OverrideProcessor),
            Box::new(MergeKeyProcessor),
            Box::new(UnknownTagProcessor),
        ])
    }
}

impl RecursiveTransformer {
    pub fn new(processors: Vec<Box<dyn Processor>>) -> Self {
        Self { processors }
    }

    /// Transforms `value`, `None` means the node was removed
    pub fn transform(&self, value: Value, walk: &Walk) -> Result<Option<Value>, ComposeError> {
        let mut value = match value {
            Value::Sequence(items) => {
                let mut transformed = Vec::with_capacity(items.len());
                for item in items {
                    transformed.extend(self.transform(item, walk)?);
                }
                Value::Sequence(transformed)
            }
            Value::Mapping(mapping) => {
                let mut transformed = Mapping::with_capacity(mapping.len());
                for (key, value) in mapping {
                    let Some(key) = self.transform(key, walk)? else {
                        continue;
                    };
                    if let Some(value) = self.transform(value, walk)? {
                        transformed.insert(key, value);
                    }
                }
                Value::Mapping(transformed)
            }
            other => other,
        };

        for processor in &self.processors {
            match processor.apply(value, walk)? {
                Action::Unchanged(unchanged) => value = unchanged,
                Action::Replace(replacement) => return Ok(Some(replacement)),
                Action::Remove => return Ok(None),
            }
        }

        Ok(Some(value))
    }
}

/// Where the transformer currently is: file, scope, substitution context and phase
#[derive(Clone)]
pub struct Walk<'a> {
    pub composer: &'a YamlComposer<'a>,
    pub templates: &'a TemplateRegistry,
    pub scope: &'a Variables,
    /// active placeholder pattern, `None` outside of `!sub`
    pub sub: Option<Pattern>,
    pub phase: Phase,
    /// templates currently being inserted, outermost first
    pub inserting: Vec<String>,
}

impl<'a> Walk<'a> {
    pub fn new(
        composer: &'a YamlComposer<'a>,
        templates: &'a TemplateRegistry,
        scope: &'a Variables,
        phase: Phase,
    ) -> Self {
        Walk {
            composer,
            templates,
            scope,
            sub: None,
            phase,
            inserting: Vec::new(),
        }
    }

    pub fn transform(&self, value: Value) -> Result<Option<Value>, ComposeError> {
        self.composer.transformer().transform(value, self)
    }

    pub fn with_sub(&self, sub: Option<Pattern>) -> Walk<'a> {
        Walk {
            sub,
            ..self.clone()
        }
    }

    pub fn with_scope<'b>(&'b self, scope: &'b Variables) -> Walk<'b> {
        Walk {
            composer: self.composer,
            templates: self.templates,
            scope,
            sub: self.sub.clone(),
            phase: self.phase,
            inserting: self.inserting.clone(),
        }
    }

    pub fn logger(&self) -> &BufferedLogger<'a> {
        self.composer.logger()
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.logger().warn(message)
    }

    pub fn locate(&self, mark: usize) -> Location {
        self.composer.locate(mark)
    }

    pub fn is_standard(&self) -> bool {
        self.phase == Phase::Standard
    }
}
