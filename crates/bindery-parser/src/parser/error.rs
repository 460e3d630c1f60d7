//! Parse error types.

use bindery_ast::Span;
use bindery_lexer::{LexError, Token};
use std::fmt;

/// Parse error with source location and context.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// Kind of parse error
    pub kind: ParseErrorKind,
    /// Source location where error occurred
    pub span: Span,
    /// Human-readable error message
    pub message: String,
}

/// Category of parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The lexer rejected a character sequence or an unterminated literal.
    InvalidToken,

    /// Unexpected token encountered where a specific token was expected.
    ///
    /// Example: expected `=` after a binding target, found a string instead.
    UnexpectedToken,

    /// Unexpected end of input while a statement was incomplete.
    ///
    /// Example: reached EOF inside a list literal, missing `]`.
    UnexpectedEof,

    /// Tokens are present but violate a grammar rule.
    ///
    /// Example: `scope/NAME = 1` (macros cannot be scoped).
    InvalidSyntax,
}

impl ParseError {
    /// Create an "expected token" error.
    pub fn expected_token(expected: Token, found: Option<Token>, span: Span) -> Self {
        let message = match &found {
            Some(token) => format!("expected `{}`, found `{}`", expected, token),
            None => format!("expected `{}`, found end of input", expected),
        };
        Self {
            kind: if found.is_none() {
                ParseErrorKind::UnexpectedEof
            } else {
                ParseErrorKind::UnexpectedToken
            },
            span,
            message,
        }
    }

    /// Create an "unexpected token" error.
    pub fn unexpected_token(found: Option<&Token>, context: &str, span: Span) -> Self {
        let message = match found {
            Some(token) => format!("unexpected `{}` {}", token, context),
            None => format!("unexpected end of input {}", context),
        };
        Self {
            kind: if found.is_none() {
                ParseErrorKind::UnexpectedEof
            } else {
                ParseErrorKind::UnexpectedToken
            },
            span,
            message,
        }
    }

    /// Create an "invalid syntax" error.
    pub fn invalid_syntax(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: ParseErrorKind::InvalidSyntax,
            span,
            message: message.into(),
        }
    }

    /// Wrap a lexer failure.
    pub fn from_lex(error: &LexError, file_id: u16) -> Self {
        let range = error.span();
        Self {
            kind: ParseErrorKind::InvalidToken,
            span: Span::new(file_id, range.start as u32, range.end as u32),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ParseError {}
