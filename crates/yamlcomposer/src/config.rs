//! composer configuration
//!
//! | environment variable              | default                       |
//! |-----------------------------------|-------------------------------|
//! | `YAMLCOMPOSER_ROOT`               | current working directory     |
//! | `YAMLCOMPOSER_INCLUDE_ROOT`       | `<root>/yamlcomposer`         |
//! | `YAMLCOMPOSER_MAX_INCLUDE_DEPTH`  | `100`                         |
use std::path::PathBuf;

pub const ROOT_ENV: &str = "YAMLCOMPOSER_ROOT";
pub const INCLUDE_ROOT_ENV: &str = "YAMLCOMPOSER_INCLUDE_ROOT";
pub const MAX_INCLUDE_DEPTH_ENV: &str = "YAMLCOMPOSER_MAX_INCLUDE_DEPTH";

pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 100;

#[derive(Debug, Clone)]
pub struct ComposerConfig {
    /// base directory for `@`-prefixed include paths
    pub config_root: PathBuf,
    /// base directory for `$`-prefixed include paths
    pub include_root: PathBuf,
    /// nested includes allowed below a top-level document
    pub max_include_depth: usize,
}

impl ComposerConfig {
    pub fn new(config_root: impl Into<PathBuf>) -> Self {
        let config_root = config_root.into();
        Self {
            include_root: config_root.join("yamlcomposer"),
            config_root,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }

    pub fn with_include_root(mut self, include_root: impl Into<PathBuf>) -> Self {
        self.include_root = include_root.into();
        self
    }

    pub fn with_max_include_depth(mut self, max_include_depth: usize) -> Self {
        self.max_include_depth = max_include_depth;
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let config_root = match std::env::var_os(ROOT_ENV) {
            Some(root) => PathBuf::from(root),
            None => std::env::current_dir().map_err(ConfigError::WorkingDirectory)?,
        };
        let mut config = Self::new(config_root);

        if let Some(include_root) = std::env::var_os(INCLUDE_ROOT_ENV) {
            config.include_root = PathBuf::from(include_root);
        }

        if let Ok(depth) = std::env::var(MAX_INCLUDE_DEPTH_ENV) {
            config.max_include_depth =
                depth
                    .trim()
                    .parse()
                    .map_err(|source| ConfigError::InvalidNumber {
                        variable: MAX_INCLUDE_DEPTH_ENV,
                        value: depth.clone(),
                        source,
                    })?;
        }

        tracing::debug!(config_root=%config.config_root.display(), include_root=%config.include_root.display(), max_include_depth=config.max_include_depth, "configuration loaded");
        Ok(config)
    }
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self::new(std::env::current_dir().unwrap_or_default())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Unable to determine working directory")]
    WorkingDirectory(#[source] std::io::Error),
    #[error("{variable} must be a positive number, got '{value}'")]
    InvalidNumber {
        variable: &'static str,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
}
