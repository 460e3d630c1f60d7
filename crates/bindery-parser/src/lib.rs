//! Hand-written recursive descent parser for the bindery configuration language.

pub mod parser;

pub use parser::{
    ParseError, ParseErrorKind, parse_binding, parse_source, parse_statements, parse_value,
};

// Re-export lexer
pub use bindery_lexer::Token;
