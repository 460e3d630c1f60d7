//! Token stream wrapper for hand-written parser.

use bindery_ast::Span;
use bindery_lexer::Token;
use std::ops::Range;
use std::rc::Rc;

use super::ParseError;

/// Token stream with lookahead and position tracking.
///
/// Each token is paired with its byte span from the source, enabling
/// accurate error message locations.
pub struct TokenStream<'src> {
    tokens: &'src [(Token, Range<usize>)],
    pos: usize,
    file_id: u16,
}

impl<'src> TokenStream<'src> {
    /// Create a new token stream from tokens with their byte spans.
    pub fn new(tokens: &'src [(Token, Range<usize>)], file_id: u16) -> Self {
        Self {
            tokens,
            pos: 0,
            file_id,
        }
    }

    /// Peek at the current token without consuming it.
    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(tok, _)| tok)
    }

    /// Advance to the next token and return the current one.
    pub fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos).map(|(tok, _)| tok);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Check if the current token matches the expected token kind.
    pub fn check(&self, expected: &Token) -> bool {
        matches!(self.peek(), Some(t) if std::mem::discriminant(t) == std::mem::discriminant(expected))
    }

    /// Consume the current token if it matches.
    pub fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Expect a specific token and advance if it matches.
    pub fn expect(&mut self, expected: Token) -> Result<Span, ParseError> {
        if self.check(&expected) {
            let start = self.pos;
            self.advance();
            Ok(self.span_from(start))
        } else {
            Err(ParseError::expected_token(
                expected,
                self.peek().cloned(),
                self.current_span(),
            ))
        }
    }

    /// Expect a name: an identifier, or a keyword used in name position.
    pub fn expect_name(&mut self, context: &str) -> Result<Rc<str>, ParseError> {
        match self.peek().and_then(Token::as_name) {
            Some(name) => {
                self.pos += 1;
                Ok(name)
            }
            None => Err(ParseError::unexpected_token(
                self.peek(),
                context,
                self.current_span(),
            )),
        }
    }

    /// Check if we've reached the end of the token stream.
    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Get the current position in the token stream.
    pub fn current_pos(&self) -> usize {
        self.pos
    }

    /// Create a span from a starting token position to the last consumed token.
    pub fn span_from(&self, start: usize) -> Span {
        let start_byte = self
            .tokens
            .get(start)
            .map_or_else(|| self.eof_offset(), |(_, span)| span.start);
        let end_byte = if self.pos > start {
            self.tokens
                .get(self.pos - 1)
                .map_or(start_byte, |(_, span)| span.end)
        } else {
            start_byte
        };
        Span::new(self.file_id, start_byte as u32, end_byte as u32)
    }

    /// Get a span for the current token, or a zero-length span at EOF.
    pub fn current_span(&self) -> Span {
        match self.tokens.get(self.pos) {
            Some((_, span)) => Span::new(self.file_id, span.start as u32, span.end as u32),
            None => {
                let eof = self.eof_offset() as u32;
                Span::new(self.file_id, eof, eof)
            }
        }
    }

    fn eof_offset(&self) -> usize {
        self.tokens.last().map_or(0, |(_, span)| span.end)
    }
}
