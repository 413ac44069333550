//! source positions for diagnostics
//!
//! The yaml parser reports positions as character offsets into the document. [SourceLocator] turns these into
//! 1-based line/column pairs which end up in [Location]s of user facing errors.
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct SourceLocator {
    /// character offset of the first character of every line
    line_starts: Vec<usize>,
}

impl SourceLocator {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (offset, c) in text.chars().enumerate() {
            if c == '\n' {
                line_starts.push(offset + 1);
            }
        }
        Self { line_starts }
    }

    /// 1-based (line, column) of a character offset
    pub fn position(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next_line) => next_line.saturating_sub(1),
        };
        let line_start = self.line_starts.get(line).copied().unwrap_or(0);
        (line + 1, offset - line_start + 1)
    }

    pub fn locate(&self, file: impl Into<PathBuf>, offset: usize) -> Location {
        let (line, column) = self.position(offset);
        Location::new(file.into(), line, column)
    }
}

/// A position inside a source file
#[derive(Debug, Clone, PartialEq, Eq, derive_new::new)]
pub struct Location {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}
