//! Statement-level parser tests.
//!
//! Covers every statement form of the binding language plus the value
//! expression grammar they carry.

use bindery_ast::{ExprKind, Literal, Path, ScopePath, Statement, StatementKind};
use bindery_parser::{ParseErrorKind, parse_binding, parse_source, parse_value};

fn parse_ok(source: &str) -> Vec<Statement> {
    parse_source(source, 0).expect("Parse should succeed")
}

fn single(source: &str) -> StatementKind {
    let mut statements = parse_ok(source);
    assert_eq!(statements.len(), 1, "expected one statement: {:?}", statements);
    statements.remove(0).kind
}

// =============================================================================
// Imports and includes
// =============================================================================

#[test]
fn test_plain_import() {
    match single("import t5x.models") {
        StatementKind::Import(import) => {
            assert_eq!(import.module, "t5x.models");
            assert_eq!(import.alias, None);
            assert!(!import.from_form);
        }
        other => panic!("expected import, got {:?}", other),
    }
}

#[test]
fn test_import_as() {
    match single("import t5x.adafactor as af") {
        StatementKind::Import(import) => {
            assert_eq!(import.local_name(), "af");
            assert_eq!(import.module, "t5x.adafactor");
        }
        other => panic!("expected import, got {:?}", other),
    }
}

#[test]
fn test_from_import() {
    match single("from t5x import utils") {
        StatementKind::Import(import) => {
            assert_eq!(import.module, "t5x.utils");
            assert_eq!(import.local_name(), "utils");
            assert!(import.from_form);
        }
        other => panic!("expected import, got {:?}", other),
    }
}

#[test]
fn test_dynamic_registration() {
    assert_eq!(
        single("from __gin__ import dynamic_registration"),
        StatementKind::DynamicRegistration
    );
}

#[test]
fn test_unknown_gin_import_rejected() {
    let err = parse_source("from __gin__ import something_else", 0).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::InvalidSyntax);
}

#[test]
fn test_include() {
    match single("include 't5x/configs/runs/pretrain.gin'") {
        StatementKind::Include(include) => assert_eq!(include.path, "t5x/configs/runs/pretrain.gin"),
        other => panic!("expected include, got {:?}", other),
    }
}

#[test]
fn test_include_requires_string() {
    let err = parse_source("include base", 0).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::UnexpectedToken);
}

// =============================================================================
// Macros and bindings
// =============================================================================

#[test]
fn test_macro_assignment() {
    match single("TRAIN_STEPS = 100_000") {
        StatementKind::Macro(m) => {
            assert_eq!(m.name, "TRAIN_STEPS");
            assert_eq!(m.value.kind, ExprKind::Literal(Literal::Int(100_000)));
        }
        other => panic!("expected macro, got {:?}", other),
    }
}

#[test]
fn test_simple_binding() {
    match single("utils.SaveCheckpointConfig.period = 1000") {
        StatementKind::Binding(b) => {
            assert!(b.target.scope.is_root());
            assert_eq!(b.target.symbol, "utils.SaveCheckpointConfig");
            assert_eq!(b.target.param.as_deref(), Some("period"));
        }
        other => panic!("expected binding, got {:?}", other),
    }
}

#[test]
fn test_scoped_binding() {
    match single("train/eval/DatasetConfig.batch_size = 128") {
        StatementKind::Binding(b) => {
            assert_eq!(b.target.scope, ScopePath::parse("train/eval"));
            assert_eq!(b.target.symbol, "DatasetConfig");
            assert_eq!(b.target.param.as_deref(), Some("batch_size"));
        }
        other => panic!("expected binding, got {:?}", other),
    }
}

#[test]
fn test_scoped_macro_rejected() {
    let err = parse_source("train/BATCH_SIZE = 8", 0).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::InvalidSyntax);
    assert!(err.message.contains("Symbol.parameter"), "{}", err.message);
}

#[test]
fn test_dotted_scope_rejected() {
    let err = parse_source("a.b/C.d = 1", 0).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::InvalidSyntax);
}

#[test]
fn test_block_binding() {
    let source = r#"
        utils.CheckpointConfig: {
            period = 2000,
            keep = 20
        }
    "#;
    match single(source) {
        StatementKind::Binding(b) => {
            assert_eq!(b.target.symbol, "utils.CheckpointConfig");
            assert_eq!(b.target.param, None);
            let params: Vec<&str> = b.parameters().into_iter().map(|(p, _)| p).collect();
            assert_eq!(params, vec!["period", "keep"]);
        }
        other => panic!("expected block binding, got {:?}", other),
    }
}

#[test]
fn test_block_duplicate_parameter_rejected() {
    let err = parse_source("X: { a = 1, a = 2 }", 0).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::InvalidSyntax);
}

#[test]
fn test_statements_are_newline_insensitive() {
    let statements = parse_ok("A = 1 B = [1,\n 2]\nC.d = %A");
    assert_eq!(statements.len(), 3);
}

#[test]
fn test_comments_ignored() {
    let source = r#"
        # Defaults for pretraining.
        BATCH_SIZE = 128  # global batch
        # trailing comment
    "#;
    assert_eq!(parse_ok(source).len(), 1);
}

#[test]
fn test_empty_source() {
    assert!(parse_ok("").is_empty());
    assert!(parse_ok("# only a comment\n").is_empty());
}

// =============================================================================
// Values
// =============================================================================

#[test]
fn test_value_literals() {
    assert_eq!(
        parse_value("'constant'", 0).unwrap().kind,
        ExprKind::Literal(Literal::Str("constant".into()))
    );
    assert_eq!(
        parse_value("1e-3", 0).unwrap().kind,
        ExprKind::Literal(Literal::Float(1e-3))
    );
    assert_eq!(
        parse_value("None", 0).unwrap().kind,
        ExprKind::Literal(Literal::None)
    );
    assert_eq!(
        parse_value("False", 0).unwrap().kind,
        ExprKind::Literal(Literal::Bool(false))
    );
}

#[test]
fn test_string_concatenation() {
    assert_eq!(
        parse_value("'gs://bucket/' 'model'", 0).unwrap().kind,
        ExprKind::Literal(Literal::Str("gs://bucket/model".into()))
    );
}

#[test]
fn test_tuples_and_parentheses() {
    let value = parse_value("(1, 2)", 0).unwrap();
    assert!(matches!(value.kind, ExprKind::Tuple(ref items) if items.len() == 2));

    let single_tuple = parse_value("(1,)", 0).unwrap();
    assert!(matches!(single_tuple.kind, ExprKind::Tuple(ref items) if items.len() == 1));

    let grouped = parse_value("(1)", 0).unwrap();
    assert_eq!(grouped.kind, ExprKind::Literal(Literal::Int(1)));

    let empty = parse_value("()", 0).unwrap();
    assert_eq!(empty.kind, ExprKind::Tuple(vec![]));
}

#[test]
fn test_mapping() {
    let value = parse_value("{'inputs': 512, 'targets': 114,}", 0).unwrap();
    match value.kind {
        ExprKind::Map(entries) => {
            let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
            assert_eq!(keys, vec!["inputs", "targets"]);
        }
        other => panic!("expected map, got {:?}", other),
    }
}

#[test]
fn test_mapping_requires_string_keys() {
    let err = parse_value("{inputs: 1}", 0).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::UnexpectedToken);
}

#[test]
fn test_macro_reference() {
    assert_eq!(
        parse_value("%gin.REQUIRED", 0).unwrap().kind,
        ExprKind::Macro(Path::from("gin.REQUIRED"))
    );
}

#[test]
fn test_references() {
    let call = parse_value("@adafactor.Adafactor()", 0).unwrap();
    match call.kind {
        ExprKind::Reference(r) => {
            assert_eq!(r.symbol, "adafactor.Adafactor");
            assert!(r.call);
            assert!(r.scope.is_root());
        }
        other => panic!("expected reference, got {:?}", other),
    }

    let bare = parse_value("@utils.SaveCheckpointConfig", 0).unwrap();
    assert!(matches!(bare.kind, ExprKind::Reference(ref r) if !r.call));
}

#[test]
fn test_scoped_reference_both_spellings() {
    let prefix = parse_value("@train/utils.DatasetConfig()", 0).unwrap();
    let infix = parse_value("train/@utils.DatasetConfig()", 0).unwrap();
    assert_eq!(prefix.kind, infix.kind);
    match prefix.kind {
        ExprKind::Reference(r) => {
            assert_eq!(r.scope, ScopePath::parse("train"));
            assert_eq!(r.symbol, "utils.DatasetConfig");
        }
        other => panic!("expected reference, got {:?}", other),
    }
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_unclosed_list() {
    let err = parse_source("A = [1, 2", 0).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::UnexpectedEof);
}

#[test]
fn test_missing_value() {
    let err = parse_source("A =", 0).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::UnexpectedEof);
}

#[test]
fn test_lex_error_surfaces_with_span() {
    let err = parse_source("A = 1\nB = 'open", 3).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::InvalidToken);
    assert_eq!(err.span.file_id, 3);
    assert_eq!(err.span.start, 10);
}

#[test]
fn test_statement_cannot_start_with_value() {
    let err = parse_source("42", 0).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::UnexpectedToken);
}

#[test]
fn test_statement_spans() {
    let statements = parse_ok("A = 1\nX.y = 'z'");
    assert_eq!((statements[0].span.start, statements[0].span.end), (0, 5));
    assert_eq!((statements[1].span.start, statements[1].span.end), (6, 15));
}

// =============================================================================
// Direct overrides
// =============================================================================

#[test]
fn test_parse_binding_accepts_bindings() {
    let statement = parse_binding("utils.SaveCheckpointConfig.keep = 20", 0).unwrap();
    assert!(matches!(statement.kind, StatementKind::Binding(_)));
    let statement = parse_binding("TRAIN_STEPS=10", 0).unwrap();
    assert!(matches!(statement.kind, StatementKind::Macro(_)));
}

#[test]
fn test_parse_binding_rejects_includes_and_trailing_input() {
    assert!(parse_binding("include 'x.gin'", 0).is_err());
    assert!(parse_binding("A = 1 B = 2", 0).is_err());
}

#[test]
fn test_printed_statement_reparses() {
    let source = "train/DatasetConfig.task_feature_lengths = {'inputs': (512,), 'targets': [%LEN, @Vocab()]}";
    let first = parse_ok(source);
    let printed = first[0].to_string();
    let second = parse_ok(&printed);
    match (&first[0].kind, &second[0].kind) {
        (StatementKind::Binding(a), StatementKind::Binding(b)) => {
            assert_eq!(a.target, b.target);
            assert_eq!(a.value.to_string(), b.value.to_string());
        }
        other => panic!("expected bindings, got {:?}", other),
    }
}
