//! Statement and expression nodes produced by the parser.
//!
//! Nothing here is evaluated. Macro references and configurable references
//! stay symbolic until the resolution engine replays them.

use crate::foundation::{Path, ScopePath, Span};

/// One top-level statement of a binding file.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    /// `import a.b`, `import a.b as c`, `from a import b [as c]`
    Import(Import),
    /// `from __gin__ import dynamic_registration`
    DynamicRegistration,
    /// `include 'path/to/file.gin'`
    Include(Include),
    /// `NAME = expr`
    Macro(MacroAssignment),
    /// `scope/a.b.Symbol.param = expr` or `scope/a.b.Symbol: { ... }`
    Binding(Binding),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    /// Fully qualified module path
    pub module: Path,
    /// Explicit `as` name, if any
    pub alias: Option<String>,
    /// `true` for the `from a import b` form
    pub from_form: bool,
}

impl Import {
    /// The local name this import introduces into the file.
    ///
    /// `import a.b as c` and `from a import b as c` bind `c`;
    /// `from a import b` binds `b`; plain `import a.b` binds `a.b` itself.
    pub fn local_name(&self) -> Path {
        match (&self.alias, self.from_form) {
            (Some(alias), _) => Path::from(alias.as_str()),
            (None, true) => Path::from(self.module.last().unwrap_or_default()),
            (None, false) => self.module.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Include {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacroAssignment {
    pub name: String,
    pub value: Expr,
}

/// Where a binding applies: `scope/symbol.param`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingTarget {
    pub scope: ScopePath,
    pub symbol: Path,
    /// `None` for the block form, which binds several parameters at once
    pub param: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub target: BindingTarget,
    /// For block bindings this is an `ExprKind::Map` keyed by parameter name.
    pub value: Expr,
}

impl Binding {
    /// Expand the binding into `(parameter, value)` pairs in source order.
    ///
    /// A single-parameter binding yields one pair; a block binding yields one
    /// pair per entry.
    pub fn parameters(&self) -> Vec<(&str, &Expr)> {
        match (&self.target.param, &self.value.kind) {
            (Some(param), _) => vec![(param.as_str(), &self.value)],
            (None, ExprKind::Map(entries)) => {
                entries.iter().map(|(k, v)| (k.as_str(), v)).collect()
            }
            (None, _) => Vec::new(),
        }
    }
}

/// A value expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    /// Mapping with string keys, in source order
    Map(Vec<(String, Expr)>),
    /// `%NAME`
    Macro(Path),
    /// `@scope/symbol()` or `@symbol`
    Reference(Reference),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// A reference to another configurable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub scope: ScopePath,
    pub symbol: Path,
    /// Written with trailing `()`
    pub call: bool,
}

/// Name of the built-in macro marking a parameter as required.
pub const REQUIRED_MACRO: &str = "gin.REQUIRED";

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Whether this expression is the `%gin.REQUIRED` marker.
    pub fn is_required_marker(&self) -> bool {
        matches!(&self.kind, ExprKind::Macro(name) if *name == REQUIRED_MACRO)
    }

    /// Visit this expression and every nested sub-expression, depth-first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expr)) {
        visit(self);
        match &self.kind {
            ExprKind::List(items) | ExprKind::Tuple(items) => {
                for item in items {
                    item.walk(visit);
                }
            }
            ExprKind::Map(entries) => {
                for (_, value) in entries {
                    value.walk(visit);
                }
            }
            ExprKind::Literal(_) | ExprKind::Macro(_) | ExprKind::Reference(_) => {}
        }
    }

    /// Every user macro referenced by this expression, with its span.
    ///
    /// The `%gin.REQUIRED` marker is not a user macro and is skipped.
    pub fn macro_refs(&self) -> Vec<(&Path, Span)> {
        let mut refs = Vec::new();
        self.walk(&mut |expr| {
            if let ExprKind::Macro(name) = &expr.kind {
                if *name != REQUIRED_MACRO {
                    refs.push((name, expr.span));
                }
            }
        });
        refs
    }

    /// Every configurable reference in this expression.
    pub fn references(&self) -> Vec<&Reference> {
        let mut refs = Vec::new();
        self.walk(&mut |expr| {
            if let ExprKind::Reference(r) = &expr.kind {
                refs.push(r);
            }
        });
        refs
    }

    /// Rewrite every reference symbol through `rename`, returning a new tree.
    pub fn map_references(&self, rename: &impl Fn(&Path) -> Path) -> Expr {
        let kind = match &self.kind {
            ExprKind::Reference(r) => ExprKind::Reference(Reference {
                scope: r.scope.clone(),
                symbol: rename(&r.symbol),
                call: r.call,
            }),
            ExprKind::List(items) => {
                ExprKind::List(items.iter().map(|e| e.map_references(rename)).collect())
            }
            ExprKind::Tuple(items) => {
                ExprKind::Tuple(items.iter().map(|e| e.map_references(rename)).collect())
            }
            ExprKind::Map(entries) => ExprKind::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.map_references(rename)))
                    .collect(),
            ),
            other => other.clone(),
        };
        Expr::new(kind, self.span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(kind: ExprKind) -> Expr {
        Expr::new(kind, Span::zero(0))
    }

    fn reference(symbol: &str) -> Expr {
        expr(ExprKind::Reference(Reference {
            scope: ScopePath::root(),
            symbol: Path::from(symbol),
            call: true,
        }))
    }

    #[test]
    fn test_import_local_name() {
        let plain = Import {
            module: Path::from("t5x.models"),
            alias: None,
            from_form: false,
        };
        assert_eq!(plain.local_name(), "t5x.models");

        let from = Import {
            module: Path::from("t5x.models"),
            alias: None,
            from_form: true,
        };
        assert_eq!(from.local_name(), "models");

        let aliased = Import {
            module: Path::from("t5x.models"),
            alias: Some("m".into()),
            from_form: false,
        };
        assert_eq!(aliased.local_name(), "m");
    }

    #[test]
    fn test_macro_refs_skip_required() {
        let value = expr(ExprKind::List(vec![
            expr(ExprKind::Macro(Path::from("BATCH_SIZE"))),
            expr(ExprKind::Macro(Path::from(REQUIRED_MACRO))),
            expr(ExprKind::Map(vec![(
                "k".into(),
                expr(ExprKind::Macro(Path::from("SEQ_LEN"))),
            )])),
        ]));
        let names: Vec<String> = value
            .macro_refs()
            .into_iter()
            .map(|(p, _)| p.to_string())
            .collect();
        assert_eq!(names, vec!["BATCH_SIZE", "SEQ_LEN"]);
    }

    #[test]
    fn test_map_references() {
        let value = expr(ExprKind::Tuple(vec![reference("models.Model")]));
        let renamed =
            value.map_references(&|p| p.replace_prefix(1, &Path::from("t5x.models")));
        let refs = renamed.references();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].symbol, "t5x.models.Model");
    }

    #[test]
    fn test_block_parameters() {
        let binding = Binding {
            target: BindingTarget {
                scope: ScopePath::root(),
                symbol: Path::from("CheckpointConfig"),
                param: None,
            },
            value: expr(ExprKind::Map(vec![
                ("period".into(), expr(ExprKind::Literal(Literal::Int(1000)))),
                ("keep".into(), expr(ExprKind::Literal(Literal::Int(20)))),
            ])),
        };
        let names: Vec<&str> = binding.parameters().into_iter().map(|(p, _)| p).collect();
        assert_eq!(names, vec!["period", "keep"]);
    }
}
