//! Dotted names and scope paths.
//!
//! Two kinds of hierarchical names appear in binding files:
//! - `Path`: dot-separated configurable names: `t5x.utils.CheckpointConfig`
//! - `ScopePath`: slash-separated scope prefixes: `train/eval` in
//!   `train/eval/DatasetConfig.batch_size`

use std::fmt;

use serde::{Deserialize, Serialize};

/// A dot-separated name such as a configurable symbol or macro.
///
/// # Examples
///
/// ```
/// # use bindery_ast::foundation::Path;
/// let path = Path::from("t5x.utils.CheckpointConfig");
/// assert_eq!(path.last(), Some("CheckpointConfig"));
/// assert!(path.ends_with(&Path::from("utils.CheckpointConfig")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    /// Parse a path from a dot-separated string.
    pub fn parse(s: &str) -> Self {
        Self {
            segments: s.split('.').map(String::from).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn first(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    /// Get the last segment (leaf name).
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn join(&self, sep: &str) -> String {
        self.segments.join(sep)
    }

    /// Append a segment to create a new path.
    pub fn append(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self::new(segments)
    }

    /// All segments except the last, or `None` for single-segment paths.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() <= 1 {
            None
        } else {
            Some(Self::new(self.segments[..self.segments.len() - 1].to_vec()))
        }
    }

    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Whether `suffix` matches the trailing segments of this path.
    pub fn ends_with(&self, suffix: &Path) -> bool {
        self.segments.ends_with(&suffix.segments)
    }

    /// Replace the first `prefix_len` segments with `replacement`.
    pub fn replace_prefix(&self, prefix_len: usize, replacement: &Path) -> Self {
        let mut segments = replacement.segments.clone();
        segments.extend_from_slice(&self.segments[prefix_len.min(self.segments.len())..]);
        Self::new(segments)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for Path {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<Path> for String {
    fn from(path: Path) -> Self {
        path.to_string()
    }
}

impl PartialEq<&str> for Path {
    fn eq(&self, other: &&str) -> bool {
        self.to_string() == *other
    }
}

/// A slash-separated scope prefix. The empty scope is the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopePath {
    segments: Vec<String>,
}

impl ScopePath {
    /// The unscoped root.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    /// Parse `a/b/c`; the empty string is the root scope.
    pub fn parse(s: &str) -> Self {
        if s.is_empty() {
            return Self::root();
        }
        Self {
            segments: s.split('/').map(String::from).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// This scope followed by each enclosing scope, ending with the root.
    ///
    /// `a/b` yields `a/b`, `a`, and the root, in that order.
    pub fn ancestors(&self) -> impl Iterator<Item = ScopePath> + '_ {
        (0..=self.segments.len())
            .rev()
            .map(|len| ScopePath::new(self.segments[..len].to_vec()))
    }
}

impl fmt::Display for ScopePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl From<&str> for ScopePath {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}
