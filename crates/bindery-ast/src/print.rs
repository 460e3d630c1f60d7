//! Render AST nodes back into binding-language syntax.
//!
//! Used for override diagnostics and for the operative config dump.

use std::fmt;
use std::fmt::Write as _;

use crate::ast::{
    Binding, BindingTarget, Expr, ExprKind, Literal, Reference, Statement, StatementKind,
};

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::None => f.write_str("None"),
            Literal::Bool(true) => f.write_str("True"),
            Literal::Bool(false) => f.write_str("False"),
            Literal::Int(n) => write!(f, "{}", n),
            Literal::Float(x) => write!(f, "{:?}", x),
            Literal::Str(s) => write_quoted(f, s),
        }
    }
}

/// Write a single-quoted string literal with escapes.
pub fn write_quoted(f: &mut impl fmt::Write, s: &str) -> fmt::Result {
    f.write_char('\'')?;
    for c in s.chars() {
        match c {
            '\'' => f.write_str("\\'")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('\'')
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('@')?;
        if !self.scope.is_root() {
            write!(f, "{}/", self.scope)?;
        }
        write!(f, "{}", self.symbol)?;
        if self.call {
            f.write_str("()")?;
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal(lit) => write!(f, "{}", lit),
            ExprKind::Macro(name) => write!(f, "%{}", name),
            ExprKind::Reference(r) => write!(f, "{}", r),
            ExprKind::List(items) => {
                f.write_char('[')?;
                write_items(f, items)?;
                f.write_char(']')
            }
            ExprKind::Tuple(items) => {
                f.write_char('(')?;
                write_items(f, items)?;
                if items.len() == 1 {
                    f.write_char(',')?;
                }
                f.write_char(')')
            }
            ExprKind::Map(entries) => {
                f.write_char('{')?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_quoted(f, key)?;
                    write!(f, ": {}", value)?;
                }
                f.write_char('}')
            }
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for BindingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.scope.is_root() {
            write!(f, "{}/", self.scope)?;
        }
        write!(f, "{}", self.symbol)?;
        if let Some(param) = &self.param {
            write!(f, ".{}", param)?;
        }
        Ok(())
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.target.param.is_some() {
            return write!(f, "{} = {}", self.target, self.value);
        }
        writeln!(f, "{}: {{", self.target)?;
        for (param, value) in self.parameters() {
            writeln!(f, "    {} = {},", param, value)?;
        }
        f.write_char('}')
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StatementKind::Import(import) => {
                if import.from_form {
                    let parent = import.module.parent().map(|p| p.to_string()).unwrap_or_default();
                    write!(f, "from {} import {}", parent, import.module.last().unwrap_or_default())?;
                } else {
                    write!(f, "import {}", import.module)?;
                }
                if let Some(alias) = &import.alias {
                    write!(f, " as {}", alias)?;
                }
                Ok(())
            }
            StatementKind::DynamicRegistration => {
                f.write_str("from __gin__ import dynamic_registration")
            }
            StatementKind::Include(include) => {
                f.write_str("include ")?;
                write_quoted(f, &include.path)
            }
            StatementKind::Macro(assignment) => {
                write!(f, "{} = {}", assignment.name, assignment.value)
            }
            StatementKind::Binding(binding) => write!(f, "{}", binding),
        }
    }
}
