//! fatal composition errors
//!
//! Everything in here aborts the current top-level load. Recoverable problems (undefined variables, malformed
//! expressions, missing templates, ...) never end up as a [ComposeError], they are reported through the
//! [LogSession](crate::diagnostics::LogSession) instead.
use crate::config::ConfigError;
use crate::source::Location;
use std::fmt;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum ComposeError {
    #[error("Unable to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not valid UTF-8", path.display())]
    Encoding { path: PathBuf },
    #[error("{location}: {message}")]
    Syntax { location: Location, message: String },
    #[error("{location}: Circular inclusion detected: {chain}")]
    CircularInclusion { location: Location, chain: Chain },
    #[error("{location}: Maximum include depth of {max} exceeded including {}", path.display())]
    IncludeDepth {
        location: Location,
        max: usize,
        path: PathBuf,
    },
    #[error("{location}: Circular template insertion detected: {chain}")]
    CircularInsertion { location: Location, chain: Chain },
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl ComposeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ComposeError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Ordered chain of files or templates leading to a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain(pub Vec<String>);

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" -> "))
    }
}

impl<T: AsRef<std::path::Path>> FromIterator<T> for Chain {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Chain(
            iter.into_iter()
                .map(|path| path.as_ref().display().to_string())
                .collect(),
        )
    }
}
