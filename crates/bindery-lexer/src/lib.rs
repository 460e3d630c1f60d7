// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Lexical analysis for the bindery configuration language.
//!
//! This crate provides tokenization of binding files using logos.
//!
//! # Design
//!
//! - `Token`: all token types (keywords, punctuation, literals, identifiers)
//! - `#` comments and whitespace are stripped during lexing (not tokens)
//! - Dotted names (`t5x.utils.CheckpointConfig`) and scopes (`train/Foo`) are
//!   sequences of `Ident` separated by `Dot` / `Slash`; the parser assembles them
//! - [`tokenize`] pairs every token with its byte range and turns lexing
//!   failures into a [`LexError`]
//!
//! # Examples
//!
//! ```
//! # use bindery_lexer::*;
//! # use logos::Logos;
//! let source = "train/CheckpointConfig.period = 1000";
//! let tokens: Vec<Result<Token, ()>> = Token::lexer(source).collect();
//! assert!(tokens.iter().all(Result::is_ok));
//! ```

use logos::Logos;
use std::ops::Range;
use std::rc::Rc;
use thiserror::Error;

/// Binding-language token.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")] // Skip whitespace
#[logos(skip r"#[^\n]*")] // Skip # comments
pub enum Token {
    // === Keywords ===
    /// Keyword `import`
    #[token("import")]
    Import,
    /// Keyword `from`
    #[token("from")]
    From,
    /// Keyword `include`
    #[token("include")]
    Include,
    /// Keyword `as`
    #[token("as")]
    As,

    // Constants
    #[token("True")]
    True,
    #[token("False")]
    False,
    #[token("None")]
    None,

    // === Punctuation ===
    /// Reference marker `@`
    #[token("@")]
    At,
    /// Macro marker `%`
    #[token("%")]
    Percent,
    /// Scope separator `/`
    #[token("/")]
    Slash,
    #[token("=")]
    Eq,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,

    // === Delimiters ===
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,

    // === Literals ===
    /// Integer literal (e.g. `42`, `-1`, `1_000_000`)
    ///
    /// Overflowing literals fail the callback and surface as a lexing error.
    #[regex(r"-?[0-9][0-9_]*", |lex| parse_number::<i64>(lex.slice()))]
    Integer(i64),

    /// Float literal (e.g. `0.001`, `1e-4`, `-2.5E3`)
    #[regex(r"-?[0-9][0-9_]*\.[0-9][0-9_]*([eE][+-]?[0-9]+)?", |lex| parse_number::<f64>(lex.slice()))]
    #[regex(r"-?[0-9][0-9_]*[eE][+-]?[0-9]+", |lex| parse_number::<f64>(lex.slice()))]
    Float(f64),

    /// String literal, single or double quoted.
    ///
    /// Uses `Rc<str>` for cheap cloning throughout the parser pipeline.
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| unquote(lex.slice()))]
    #[regex(r#"'([^'\\\n]|\\.)*'"#, |lex| unquote(lex.slice()))]
    String(Rc<str>),

    /// Identifier (e.g. `CheckpointConfig`, `period`, `__gin__`)
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| Rc::from(lex.slice()))]
    Ident(Rc<str>),
}

fn parse_number<T: std::str::FromStr>(slice: &str) -> Option<T> {
    slice.replace('_', "").parse::<T>().ok()
}

fn unquote(slice: &str) -> Option<Rc<str>> {
    let content = &slice[1..slice.len() - 1];
    unescape_string(content).map(|s| Rc::from(s.as_str()))
}

/// Unescape a string literal content.
fn unescape_string(s: &str) -> Option<String> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some('\'') => result.push('\''),
                // Unsupported escape sequence or trailing backslash
                _ => return None,
            }
        } else {
            result.push(c);
        }
    }
    Some(result)
}

impl Token {
    /// Fixed spelling of keyword, constant and punctuation tokens.
    ///
    /// Returns `None` for tokens that carry data.
    pub fn symbol(&self) -> Option<&'static str> {
        let s = match self {
            Token::Import => "import",
            Token::From => "from",
            Token::Include => "include",
            Token::As => "as",
            Token::True => "True",
            Token::False => "False",
            Token::None => "None",
            Token::At => "@",
            Token::Percent => "%",
            Token::Slash => "/",
            Token::Eq => "=",
            Token::Colon => ":",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Integer(_) | Token::Float(_) | Token::String(_) | Token::Ident(_) => {
                return None;
            }
        };
        Some(s)
    }

    /// Identifier text, also for keywords that may appear as names.
    ///
    /// Keywords are only reserved at statement starts; `as`, `from` and friends
    /// are still valid parameter and module names elsewhere.
    pub fn as_name(&self) -> Option<Rc<str>> {
        match self {
            Token::Ident(name) => Some(name.clone()),
            Token::Import | Token::From | Token::Include | Token::As => {
                self.symbol().map(Rc::from)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Integer(n) => write!(f, "{}", n),
            Token::Float(x) => write!(f, "{:?}", x),
            Token::String(s) => write!(f, "'{}'", s),
            Token::Ident(id) => write!(f, "{}", id),
            other => f.write_str(other.symbol().unwrap_or("?")),
        }
    }
}

/// Lexing failure with the byte range of the offending input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    /// A quote was opened but never closed on the same line.
    #[error("unterminated string literal")]
    UnterminatedString { span: Range<usize> },
    /// A numeric literal that does not fit its type.
    #[error("numeric literal out of range")]
    NumberOutOfRange { span: Range<usize> },
    /// Any other character sequence the language does not know.
    #[error("invalid character sequence `{text}`")]
    InvalidToken { text: String, span: Range<usize> },
}

impl LexError {
    /// Byte range of the offending input.
    pub fn span(&self) -> Range<usize> {
        match self {
            LexError::UnterminatedString { span }
            | LexError::NumberOutOfRange { span }
            | LexError::InvalidToken { span, .. } => span.clone(),
        }
    }
}

/// Lex a whole source text into tokens paired with their byte ranges.
///
/// Stops at the first invalid character sequence.
pub fn tokenize(source: &str) -> Result<Vec<(Token, Range<usize>)>, LexError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => return Err(classify_error(source, span)),
        }
    }
    Ok(tokens)
}

fn classify_error(source: &str, span: Range<usize>) -> LexError {
    let rest = &source[span.start..];
    if rest.starts_with('\'') || rest.starts_with('"') {
        let line_end = rest.find('\n').map_or(source.len(), |i| span.start + i);
        return LexError::UnterminatedString {
            span: span.start..line_end,
        };
    }
    if rest.starts_with(|c: char| c.is_ascii_digit() || c == '-') && span.len() > 1 {
        return LexError::NumberOutOfRange { span };
    }
    LexError::InvalidToken {
        text: source[span.clone()].to_string(),
        span,
    }
}
