//! aggregated warnings
//!
//! Templates and includes are instantiated over and over again. Instead of repeating the same warning for every
//! instantiation, warnings of a top-level load are collected in a [LogSession] and emitted once, with an occurrence
//! count, when the session is flushed.
use indexmap::IndexMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

#[derive(Debug)]
struct Occurrences {
    count: usize,
    /// logger that reported the message first
    origin: String,
}

/// Warning buffer of one top-level load
#[derive(Debug, Default)]
pub struct LogSession {
    warnings: Mutex<IndexMap<String, Occurrences>>,
}

impl LogSession {
    pub fn warn(&self, origin: impl Into<String>, message: impl Into<String>) {
        let mut warnings = self.warnings.lock().unwrap_or_else(PoisonError::into_inner);
        warnings
            .entry(message.into())
            .and_modify(|occurrences| occurrences.count += 1)
            .or_insert_with(|| Occurrences {
                count: 1,
                origin: origin.into(),
            });
    }

    /// Distinct messages collected so far, in order of first occurrence
    pub fn tracked_warnings(&self) -> Vec<String> {
        let warnings = self.warnings.lock().unwrap_or_else(PoisonError::into_inner);
        warnings.keys().cloned().collect()
    }

    /// How often `message` was reported
    pub fn count(&self, message: &str) -> usize {
        let warnings = self.warnings.lock().unwrap_or_else(PoisonError::into_inner);
        warnings.get(message).map_or(0, |occurrences| occurrences.count)
    }

    /// Emits every distinct message once and clears the session
    ///
    /// Returns the emitted lines.
    pub fn flush(&self) -> Vec<String> {
        let drained: Vec<(String, Occurrences)> = {
            let mut warnings = self.warnings.lock().unwrap_or_else(PoisonError::into_inner);
            warnings.drain(..).collect()
        };

        drained
            .into_iter()
            .map(|(message, occurrences)| {
                let line = match occurrences.count {
                    1 => message,
                    count => format!("{message} ({count} times)"),
                };
                tracing::warn!(origin = %occurrences.origin, "{line}");
                line
            })
            .collect()
    }

    /// Emits a summary followed by all collected warnings
    pub fn close(&self) -> Vec<String> {
        let (total, distinct) = {
            let warnings = self.warnings.lock().unwrap_or_else(PoisonError::into_inner);
            let total: usize = warnings.values().map(|occurrences| occurrences.count).sum();
            (total, warnings.len())
        };

        if total > 0 {
            tracing::warn!(total, distinct, "{total} warnings ({distinct} distinct)");
        }
        self.flush()
    }
}

impl Drop for LogSession {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Logger handed to the parts of a load
///
/// `warn` goes through the [LogSession], everything else is emitted right away.
#[derive(Debug, Clone, derive_new::new)]
pub struct BufferedLogger<'s> {
    session: &'s LogSession,
    origin: &'static str,
    source: Option<PathBuf>,
}

impl<'s> BufferedLogger<'s> {
    fn origin(&self) -> String {
        match &self.source {
            Some(source) => format!("{} ({})", self.origin, source.display()),
            None => self.origin.to_string(),
        }
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::trace!(origin = self.origin, %message, "buffering warning");
        self.session.warn(self.origin(), message);
    }

    pub fn info(&self, message: impl AsRef<str>) {
        tracing::info!(origin = %self.origin(), "{}", message.as_ref());
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        tracing::debug!(origin = %self.origin(), "{}", message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        tracing::error!(origin = %self.origin(), "{}", message.as_ref());
    }

    pub fn session(&self) -> &'s LogSession {
        self.session
    }
}
