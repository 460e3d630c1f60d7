// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! AST types for the bindery configuration language.
//!
//! This crate contains the statement and expression nodes produced by the
//! parser, the foundation types (paths, scopes, spans, source map) shared with
//! the resolution engine, and a printer that renders nodes back to source.

pub mod ast;
pub mod foundation;
pub mod print;

pub use ast::*;
pub use foundation::{Location, Path, ScopePath, SourceFile, SourceMap, Span};
