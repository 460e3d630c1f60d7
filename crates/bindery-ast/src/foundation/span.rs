//! Source location tracking for error reporting.
//!
//! # Design
//!
//! - `Span`: compact byte range inside one source file
//! - `SourceMap`: owns every loaded source and converts spans to locations
//! - `SourceFile`: single source with line indexing
//! - `Location`: human-facing `file:line:column` triple carried by errors
//!
//! # Examples
//!
//! ```
//! # use bindery_ast::foundation::*;
//! let mut map = SourceMap::new();
//! let file_id = map.add_file("base.gin", "A = 1\nB = 2".to_string());
//! let span = Span::new(file_id, 6, 11);
//!
//! assert_eq!(map.location(&span).to_string(), "base.gin:2:1");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Compact source location reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Index into `SourceMap` files
    pub file_id: u16,
    /// Byte offset of start position
    pub start: u32,
    /// Byte offset of end position (exclusive)
    pub end: u32,
}

impl Span {
    pub fn new(file_id: u16, start: u32, end: u32) -> Self {
        Self {
            file_id,
            start,
            end,
        }
    }

    /// Create a zero-length span at the start of a file.
    pub fn zero(file_id: u16) -> Self {
        Self::new(file_id, 0, 0)
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Human-readable position of a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Source identifier (path, URI or `<binding:N>` for direct overrides)
    pub file: String,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Collection of all source files seen while loading a configuration.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

/// A single source file with line indexing.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Identifier the loader resolved this source to
    pub name: String,
    /// Original source text
    pub source: String,
    /// Byte offset of each line start; a trailing newline opens an empty last line
    pub line_starts: Vec<u32>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    /// Add a source file and return its ID.
    pub fn add_file(&mut self, name: impl Into<String>, source: String) -> u16 {
        let file_id = self.files.len();
        assert!(file_id < u16::MAX as usize, "too many source files");
        self.files.push(SourceFile::new(name.into(), source));
        file_id as u16
    }

    pub fn file(&self, file_id: u16) -> &SourceFile {
        &self.files[file_id as usize]
    }

    /// Resolve a span to its `file:line:column` location.
    pub fn location(&self, span: &Span) -> Location {
        let file = self.file(span.file_id);
        let (line, column) = file.line_col(span.start);
        Location {
            file: file.name.clone(),
            line,
            column,
        }
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

impl SourceFile {
    pub fn new(name: String, source: String) -> Self {
        let line_starts = compute_line_starts(&source);
        Self {
            name,
            source,
            line_starts,
        }
    }

    /// Get (line, column) for a byte offset. Both are 1-based.
    ///
    /// Offsets past EOF clamp to the end of the file.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let offset = offset.min(self.source.len() as u32);
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let line = (line_idx + 1) as u32;
        let col = (offset - self.line_starts[line_idx]) + 1;
        (line, col)
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

/// Compute byte offsets of line starts. The first line always starts at 0.
fn compute_line_starts(source: &str) -> Vec<u32> {
    let mut line_starts = vec![0];
    for (idx, ch) in source.char_indices() {
        if ch == '\n' {
            line_starts.push((idx + 1) as u32);
        }
    }
    line_starts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_span_is_empty() {
        assert!(Span::zero(0).is_empty());
        assert!(!Span::new(0, 10, 20).is_empty());
    }

    #[test]
    fn test_line_col() {
        let file = SourceFile::new("a.gin".into(), "ab\ncd\nef".into());
        assert_eq!(file.line_col(0), (1, 1));
        assert_eq!(file.line_col(1), (1, 2));
        assert_eq!(file.line_col(3), (2, 1));
        assert_eq!(file.line_col(7), (3, 2));
        assert_eq!(file.line_count(), 3);
    }

    #[test]
    fn test_line_col_at_eof_after_newline() {
        let file = SourceFile::new("a.gin".into(), "ab\n".into());
        assert_eq!(file.line_col(3), (2, 1));
        assert_eq!(file.line_count(), 2);

        let file = SourceFile::new("b.gin".into(), "B = [\n".into());
        assert_eq!(file.line_col(6), (2, 1));
        assert_eq!(file.line_col(5), (1, 6));
    }

    #[test]
    fn test_empty_source() {
        let file = SourceFile::new("empty.gin".into(), String::new());
        assert_eq!(file.line_col(0), (1, 1));
    }

    #[test]
    fn test_location_display() {
        let mut map = SourceMap::new();
        let id = map.add_file("configs/base.gin", "A = 1\n  B = 2\n".to_string());
        let loc = map.location(&Span::new(id, 8, 8));
        assert_eq!(loc.to_string(), "configs/base.gin:2:3");
    }
}
