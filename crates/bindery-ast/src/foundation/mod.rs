//! Foundation types shared by the parser and the resolution engine.

pub mod path;
pub mod span;

pub use path::{Path, ScopePath};
pub use span::{Location, SourceFile, SourceMap, Span};
