//! # yamlcomposer - declarative yaml composition
//!
//! ## Introduction for developers
//!
//! Read this to understand how `yamlcomposer` works internally.
//!
//! ### Directives
//!
//! Quick introduction to the elements of a composed document.
//!
//! ```yaml
//! variables:                      # evaluated top to bottom
//!   env: production
//!   replicas: !sub ${ 3 if env == 'production' else 1 }
//!
//! templates:                      # instantiated by !insert
//!   service:
//!     image: !sub registry/${ name }:latest
//!     replicas: !sub ${ replicas }
//!
//! packages:                       # merged into the document root
//!   monitoring: !include $monitoring.inc.yaml
//!
//! web: !insert service?name=web
//! database: !include database.inc.yaml?port=5432
//! debug: !if
//!   if: env != 'production'
//!   then: true
//! defaults: &defaults
//!   timeout: 30
//! api:
//!   <<: *defaults
//!   retries: 3
//! ```
//!
//! ### Loading files
//!
//! A top-level load ([YamlComposer::load]) gets a [LoadContext]: the [ComposerConfig], an [IncludeCache] with file
//! contents keyed by path and modification time, a [LogSession] collecting warnings and the host's include callback.
//! Every included file is composed by its own [YamlComposer] sharing that context.
//!
//! ### Parsing
//!
//! see [document::parse]
//!
//! The yaml event stream is turned into a [Value] tree. Plain scalars are resolved with yaml 1.2 core schema rules
//! ([resolver]), directive tags (`!include`, `!sub`, ...) are kept as [value::Tag]s together with their source
//! offset and plain `<<` keys become engine owned merge keys instead of being merged by the parser.
//!
//! ### Transformation
//!
//! see [transform::RecursiveTransformer]
//!
//! The tree is walked depth first and every node is offered to a chain of processors. A processor replaces the node,
//! removes it or leaves it to the next processor. Which processor acts depends only on the node itself: its tag, or
//! for merge keys and `${ .. }` substitution its shape.
//!
//! Substitution only happens below a `!sub` tag. Expressions inside `${ .. }` are evaluated by [expression] against
//! the current [Variables] scope.
//!
//! ### Packages and overrides
//!
//! After the standard pass the packages are deep merged into the root ([packages]). `!remove` and `!replace` markers
//! are left in place by the standard pass and applied by a second pass over the merged tree, so they can act on
//! content contributed by packages.
//!
//! ### Errors and warnings
//!
//! Include cycles, recursive templates, exceeding the include depth, unreadable files and syntax errors abort the
//! load with a [ComposeError]. Everything else (undefined variables, broken expressions, unknown templates, ...) is
//! reported to the [LogSession] and the offending value is treated as absent. A session emits every distinct
//! warning once, with an occurrence count.
//!
//! ### Output
//!
//! The composed [Value] contains no tags anymore and can be serialized via [serde].
//!
pub mod cache;
pub mod composer;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod expression;
pub mod interpolate;
pub mod packages;
pub mod registry;
pub mod resolver;
pub mod source;
pub mod templates;
pub mod transform;
pub mod value;
pub mod variables;

pub use cache::IncludeCache;
pub use composer::{LoadContext, YamlComposer};
pub use config::{ComposerConfig, ConfigError};
pub use diagnostics::{BufferedLogger, LogSession};
pub use error::ComposeError;
pub use registry::IncludeRegistry;
pub use source::Location;
pub use value::{Mapping, Value};
pub use variables::Variables;
