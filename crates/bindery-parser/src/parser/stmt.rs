//! Statement parsers (keyword-dispatched).

use bindery_ast::{
    Binding, BindingTarget, Expr, ExprKind, Import, Include, MacroAssignment, Path, ScopePath,
    Statement, StatementKind,
};
use bindery_lexer::Token;

use super::expr::{parse_dotted, parse_expr};
use super::{ParseError, TokenStream};

/// Module name that introduces dynamic registration.
const GIN_MODULE: &str = "__gin__";
const DYNAMIC_REGISTRATION: &str = "dynamic_registration";

/// Parse every statement until EOF.
pub fn parse_statements(stream: &mut TokenStream) -> Result<Vec<Statement>, ParseError> {
    let mut statements = Vec::new();
    while !stream.at_end() {
        statements.push(parse_statement(stream)?);
    }
    Ok(statements)
}

/// Parse a single statement.
pub fn parse_statement(stream: &mut TokenStream) -> Result<Statement, ParseError> {
    let start = stream.current_pos();
    let kind = match stream.peek() {
        Some(Token::Import) => parse_import(stream)?,
        Some(Token::From) => parse_from_import(stream)?,
        Some(Token::Include) => parse_include(stream)?,
        Some(token) if token.as_name().is_some() => parse_assignment(stream)?,
        other => {
            return Err(ParseError::unexpected_token(
                other,
                "at start of statement",
                stream.current_span(),
            ));
        }
    };
    Ok(Statement {
        kind,
        span: stream.span_from(start),
    })
}

/// `import a.b.c [as d]`
fn parse_import(stream: &mut TokenStream) -> Result<StatementKind, ParseError> {
    stream.expect(Token::Import)?;
    let module = parse_dotted(stream, "in import")?;
    let alias = parse_alias(stream)?;
    Ok(StatementKind::Import(Import {
        module,
        alias,
        from_form: false,
    }))
}

/// `from a.b import c [as d]`, including `from __gin__ import dynamic_registration`.
fn parse_from_import(stream: &mut TokenStream) -> Result<StatementKind, ParseError> {
    stream.expect(Token::From)?;
    let parent = parse_dotted(stream, "in import")?;
    stream.expect(Token::Import)?;
    let name = stream.expect_name("in import")?;

    if parent == GIN_MODULE {
        if &*name != DYNAMIC_REGISTRATION {
            return Err(ParseError::invalid_syntax(
                format!("unknown `{}` import `{}`", GIN_MODULE, name),
                stream.current_span(),
            ));
        }
        return Ok(StatementKind::DynamicRegistration);
    }

    let alias = parse_alias(stream)?;
    Ok(StatementKind::Import(Import {
        module: parent.append(name.to_string()),
        alias,
        from_form: true,
    }))
}

fn parse_alias(stream: &mut TokenStream) -> Result<Option<String>, ParseError> {
    if stream.eat(&Token::As) {
        Ok(Some(stream.expect_name("after `as`")?.to_string()))
    } else {
        Ok(None)
    }
}

/// `include 'path/to/file.gin'`
fn parse_include(stream: &mut TokenStream) -> Result<StatementKind, ParseError> {
    stream.expect(Token::Include)?;
    let path = match stream.peek() {
        Some(Token::String(path)) => path.to_string(),
        other => {
            return Err(ParseError::unexpected_token(
                other,
                "where an include path string was expected",
                stream.current_span(),
            ));
        }
    };
    stream.advance();
    Ok(StatementKind::Include(Include { path }))
}

/// Macro assignment, single binding, or block binding.
///
/// ```text
/// NAME = expr
/// scope/a.b.Symbol.param = expr
/// scope/a.b.Symbol: { param = expr, ... }
/// ```
fn parse_assignment(stream: &mut TokenStream) -> Result<StatementKind, ParseError> {
    let target_start = stream.current_pos();
    let (scope, path) = parse_target_path(stream)?;
    let target_span = stream.span_from(target_start);

    if stream.eat(&Token::Colon) {
        let value = parse_block(stream)?;
        return Ok(StatementKind::Binding(Binding {
            target: BindingTarget {
                scope,
                symbol: path,
                param: None,
            },
            value,
        }));
    }

    stream.expect(Token::Eq)?;
    let value = parse_expr(stream)?;

    match path.parent() {
        None if scope.is_root() => Ok(StatementKind::Macro(MacroAssignment {
            name: path.to_string(),
            value,
        })),
        None => Err(ParseError::invalid_syntax(
            format!(
                "`{}/{}` is neither a macro nor a binding; bindings need `Symbol.parameter`",
                scope, path
            ),
            target_span,
        )),
        Some(symbol) => Ok(StatementKind::Binding(Binding {
            target: BindingTarget {
                scope,
                symbol,
                param: path.last().map(String::from),
            },
            value,
        })),
    }
}

/// Parse `[scope/]*dotted`.
fn parse_target_path(stream: &mut TokenStream) -> Result<(ScopePath, Path), ParseError> {
    let mut scope = Vec::new();
    let mut path = parse_dotted(stream, "in binding target")?;
    while stream.check(&Token::Slash) {
        if path.len() != 1 {
            return Err(ParseError::invalid_syntax(
                format!("scope name `{}` cannot be dotted", path),
                stream.current_span(),
            ));
        }
        stream.advance();
        scope.push(path.to_string());
        path = parse_dotted(stream, "in binding target")?;
    }
    Ok((ScopePath::new(scope), path))
}

/// `{ param = expr [,] ... }`, returned as a map keyed by parameter name.
fn parse_block(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    stream.expect(Token::LBrace)?;
    let mut entries = Vec::new();
    while !stream.check(&Token::RBrace) {
        let param_start = stream.current_pos();
        let param = stream.expect_name("where a parameter name was expected")?;
        if entries.iter().any(|(name, _): &(String, Expr)| name.as_str() == &*param) {
            return Err(ParseError::invalid_syntax(
                format!("parameter `{}` bound twice in one block", param),
                stream.span_from(param_start),
            ));
        }
        stream.expect(Token::Eq)?;
        let value = parse_expr(stream)?;
        entries.push((param.to_string(), value));
        stream.eat(&Token::Comma);
    }
    stream.expect(Token::RBrace)?;
    Ok(Expr::new(ExprKind::Map(entries), stream.span_from(start)))
}
