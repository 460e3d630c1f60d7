//! Value expression parser.
//!
//! Expressions are plain data: literals, containers, `%MACRO` references and
//! `@configurable` references. There are no operators.

use bindery_ast::{Expr, ExprKind, Literal, Path, Reference, ScopePath};
use bindery_lexer::Token;

use super::{ParseError, TokenStream};

/// Parse one value expression.
pub fn parse_expr(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    let kind = match stream.peek() {
        Some(Token::String(_)) => ExprKind::Literal(Literal::Str(parse_strings(stream))),
        Some(Token::Integer(n)) => {
            let n = *n;
            stream.advance();
            ExprKind::Literal(Literal::Int(n))
        }
        Some(Token::Float(x)) => {
            let x = *x;
            stream.advance();
            ExprKind::Literal(Literal::Float(x))
        }
        Some(Token::True) => {
            stream.advance();
            ExprKind::Literal(Literal::Bool(true))
        }
        Some(Token::False) => {
            stream.advance();
            ExprKind::Literal(Literal::Bool(false))
        }
        Some(Token::None) => {
            stream.advance();
            ExprKind::Literal(Literal::None)
        }
        Some(Token::LBracket) => {
            stream.advance();
            ExprKind::List(parse_sequence(stream, Token::RBracket)?.0)
        }
        Some(Token::LParen) => return parse_parenthesized(stream),
        Some(Token::LBrace) => {
            stream.advance();
            ExprKind::Map(parse_map_entries(stream)?)
        }
        Some(Token::Percent) => {
            stream.advance();
            ExprKind::Macro(parse_dotted(stream, "in macro name")?)
        }
        Some(Token::At) => {
            stream.advance();
            ExprKind::Reference(parse_reference(stream, ScopePath::root())?)
        }
        Some(token) if token.as_name().is_some() => {
            // `scope/@symbol()` spelling of a scoped reference
            let scope = parse_scope_prefix(stream)?;
            stream.expect(Token::At)?;
            ExprKind::Reference(parse_reference(stream, scope)?)
        }
        other => {
            return Err(ParseError::unexpected_token(
                other,
                "where a value was expected",
                stream.current_span(),
            ));
        }
    };
    Ok(Expr::new(kind, stream.span_from(start)))
}

/// Adjacent string literals concatenate, as in `'gs://bucket/' 'model'`.
fn parse_strings(stream: &mut TokenStream) -> String {
    let mut text = String::new();
    while let Some(Token::String(s)) = stream.peek() {
        text.push_str(s);
        stream.advance();
    }
    text
}

/// Parse comma-separated expressions up to `close`.
///
/// Returns the items and whether a trailing comma was present.
fn parse_sequence(stream: &mut TokenStream, close: Token) -> Result<(Vec<Expr>, bool), ParseError> {
    let mut items = Vec::new();
    let mut trailing_comma = false;
    while !stream.check(&close) {
        items.push(parse_expr(stream)?);
        trailing_comma = stream.eat(&Token::Comma);
        if !trailing_comma {
            break;
        }
    }
    stream.expect(close)?;
    Ok((items, trailing_comma))
}

/// `()` is an empty tuple, `(x)` is just `x`, `(x,)` and `(x, y)` are tuples.
fn parse_parenthesized(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    stream.expect(Token::LParen)?;
    let (mut items, trailing_comma) = parse_sequence(stream, Token::RParen)?;
    if items.len() == 1 && !trailing_comma {
        let mut inner = items.remove(0);
        inner.span = stream.span_from(start);
        return Ok(inner);
    }
    Ok(Expr::new(ExprKind::Tuple(items), stream.span_from(start)))
}

/// Parse `'key': value` entries up to the closing brace.
fn parse_map_entries(stream: &mut TokenStream) -> Result<Vec<(String, Expr)>, ParseError> {
    let mut entries = Vec::new();
    while !stream.check(&Token::RBrace) {
        let key = match stream.peek() {
            Some(Token::String(_)) => parse_strings(stream),
            other => {
                return Err(ParseError::unexpected_token(
                    other,
                    "where a string mapping key was expected",
                    stream.current_span(),
                ));
            }
        };
        stream.expect(Token::Colon)?;
        let value = parse_expr(stream)?;
        entries.push((key, value));
        if !stream.eat(&Token::Comma) {
            break;
        }
    }
    stream.expect(Token::RBrace)?;
    Ok(entries)
}

/// Parse `name(.name)*`.
pub fn parse_dotted(stream: &mut TokenStream, context: &str) -> Result<Path, ParseError> {
    let mut segments = vec![stream.expect_name(context)?.to_string()];
    while stream.check(&Token::Dot) {
        stream.advance();
        segments.push(stream.expect_name(context)?.to_string());
    }
    Ok(Path::new(segments))
}

/// Parse `name/name/.../` when followed by `@`, leaving the stream at `@`.
fn parse_scope_prefix(stream: &mut TokenStream) -> Result<ScopePath, ParseError> {
    let mut segments = Vec::new();
    loop {
        segments.push(stream.expect_name("in reference scope")?.to_string());
        stream.expect(Token::Slash)?;
        if stream.check(&Token::At) {
            return Ok(ScopePath::new(segments));
        }
    }
}

/// Parse the part of a reference after `@`: `[scope/]*dotted[()]`.
///
/// `outer` holds scope segments written before the `@`.
fn parse_reference(stream: &mut TokenStream, outer: ScopePath) -> Result<Reference, ParseError> {
    let mut scope: Vec<String> = outer.segments().to_vec();
    let mut symbol = parse_dotted(stream, "in reference")?;
    while stream.check(&Token::Slash) {
        let start = stream.current_pos();
        if symbol.len() != 1 {
            return Err(ParseError::invalid_syntax(
                format!("scope name `{}` cannot be dotted", symbol),
                stream.span_from(start),
            ));
        }
        stream.advance();
        scope.push(symbol.to_string());
        symbol = parse_dotted(stream, "in reference")?;
    }
    let call = if stream.check(&Token::LParen) {
        stream.advance();
        stream.expect(Token::RParen)?;
        true
    } else {
        false
    };
    Ok(Reference {
        scope: ScopePath::new(scope),
        symbol,
        call,
    })
}
