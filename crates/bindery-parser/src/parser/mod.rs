//! Hand-written recursive descent parser for binding files.
//!
//! ## Architecture
//!
//! - `stream`: TokenStream wrapper with lookahead
//! - `error`: ParseError and its kinds
//! - `expr`: value expressions (literals, containers, macros, references)
//! - `stmt`: statements (imports, includes, macros, bindings)
//!
//! Parsing never evaluates anything; values stay symbolic until resolution.

mod error;
mod expr;
mod stmt;
mod stream;

pub use error::{ParseError, ParseErrorKind};
use stream::TokenStream;

use bindery_ast::{Expr, Statement, StatementKind};
use bindery_lexer::{Token, tokenize};
use std::ops::Range;

/// Parse a sequence of tokens with byte spans into statements.
pub fn parse_statements(
    tokens: &[(Token, Range<usize>)],
    file_id: u16,
) -> Result<Vec<Statement>, ParseError> {
    let mut stream = TokenStream::new(tokens, file_id);
    stmt::parse_statements(&mut stream)
}

/// Tokenize and parse a whole source file.
pub fn parse_source(source: &str, file_id: u16) -> Result<Vec<Statement>, ParseError> {
    let tokens = tokenize(source).map_err(|e| ParseError::from_lex(&e, file_id))?;
    parse_statements(&tokens, file_id)
}

/// Parse a single value expression, requiring it to span the whole input.
pub fn parse_value(source: &str, file_id: u16) -> Result<Expr, ParseError> {
    let tokens = tokenize(source).map_err(|e| ParseError::from_lex(&e, file_id))?;
    let mut stream = TokenStream::new(&tokens, file_id);
    let value = expr::parse_expr(&mut stream)?;
    if !stream.at_end() {
        return Err(ParseError::unexpected_token(
            stream.peek(),
            "after value",
            stream.current_span(),
        ));
    }
    Ok(value)
}

/// Parse one direct `key = value` override, as passed on a command line.
///
/// Only macro assignments and bindings are accepted.
pub fn parse_binding(source: &str, file_id: u16) -> Result<Statement, ParseError> {
    let tokens = tokenize(source).map_err(|e| ParseError::from_lex(&e, file_id))?;
    let mut stream = TokenStream::new(&tokens, file_id);
    let statement = stmt::parse_statement(&mut stream)?;
    if !stream.at_end() {
        return Err(ParseError::unexpected_token(
            stream.peek(),
            "after binding",
            stream.current_span(),
        ));
    }
    match statement.kind {
        StatementKind::Macro(_) | StatementKind::Binding(_) => Ok(statement),
        _ => Err(ParseError::invalid_syntax(
            "only `key = value` bindings are allowed here",
            statement.span,
        )),
    }
}
