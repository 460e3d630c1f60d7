//! Override store: the ordered log of every macro and binding statement.
//!
//! The include loader appends statements in encounter order (include order
//! across files, statement order within a file, direct overrides last).
//! Nothing is ever removed: replaying the log into a [`BindingTable`] gives the
//! last-write-wins view, while [`OverrideStore::history`] keeps the full chain
//! for diagnostics.

use std::fmt;

use bindery_ast::{Expr, Location, Path, ScopePath, SourceMap, Span};
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::registry::Registry;

/// A (scope, symbol, parameter) triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingKey {
    pub scope: ScopePath,
    pub symbol: Path,
    pub param: String,
}

impl BindingKey {
    pub fn new(scope: ScopePath, symbol: Path, param: impl Into<String>) -> Self {
        Self {
            scope,
            symbol,
            param: param.into(),
        }
    }

    /// Same parameter under a different scope.
    pub fn with_scope(&self, scope: ScopePath) -> Self {
        Self {
            scope,
            symbol: self.symbol.clone(),
            param: self.param.clone(),
        }
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.scope.is_root() {
            write!(f, "{}/", self.scope)?;
        }
        write!(f, "{}.{}", self.symbol, self.param)
    }
}

/// One parameter assignment as it appeared in the sources.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingEvent {
    pub key: BindingKey,
    pub value: Expr,
    pub origin: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacroEvent {
    pub name: String,
    pub value: Expr,
    pub origin: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Binding(BindingEvent),
    Macro(MacroEvent),
}

/// How a repeated binding relates to the earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideKind {
    /// Every binding of the key has the same value.
    Redundant,
    /// At least one binding changed the value.
    Conflicting,
}

/// A key bound more than once.
#[derive(Debug, Clone)]
pub struct Override<'a> {
    pub key: &'a BindingKey,
    /// Every binding of the key, oldest first
    pub events: Vec<&'a BindingEvent>,
    pub kind: OverrideKind,
}

impl Override<'_> {
    pub fn winner(&self) -> Option<&BindingEvent> {
        self.events.last().copied()
    }
}

fn collect_overrides<'a>(
    groups: impl Iterator<Item = (&'a BindingKey, Vec<&'a BindingEvent>)>,
) -> Vec<Override<'a>> {
    groups
        .filter(|(_, events)| events.len() > 1)
        .map(|(key, events)| {
            let first = events[0].value.to_string();
            let kind = if events.iter().all(|e| e.value.to_string() == first) {
                OverrideKind::Redundant
            } else {
                OverrideKind::Conflicting
            };
            Override { key, events, kind }
        })
        .collect()
}

/// Ordered log of macro and binding statements.
#[derive(Debug, Clone, Default)]
pub struct OverrideStore {
    sources: SourceMap,
    events: Vec<Event>,
    /// Macro name to the log index of its latest definition
    macros: IndexMap<String, usize>,
}

impl OverrideStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every source file the events were read from.
    pub fn sources(&self) -> &SourceMap {
        &self.sources
    }

    pub(crate) fn add_source(&mut self, name: impl Into<String>, text: String) -> u16 {
        self.sources.add_file(name, text)
    }

    pub fn location(&self, span: &Span) -> Location {
        self.sources.location(span)
    }

    fn check_macros(&self, value: &Expr) -> Result<()> {
        for (name, span) in value.macro_refs() {
            if !self.macros.contains_key(&name.to_string()) {
                return Err(Error::UndefinedMacro {
                    name: name.to_string(),
                    location: self.location(&span),
                });
            }
        }
        Ok(())
    }

    /// Append a macro definition. Redefinition shadows earlier values.
    pub fn push_macro(&mut self, name: impl Into<String>, value: Expr, span: Span) -> Result<()> {
        self.check_macros(&value)?;
        let name = name.into();
        let origin = self.location(&span);
        if let Some(previous) = self.macro_value(&name) {
            debug!(
                name = %name,
                previous = %previous.origin,
                origin = %origin,
                "macro redefined"
            );
        }
        self.macros.insert(name.clone(), self.events.len());
        self.events.push(Event::Macro(MacroEvent {
            name,
            value,
            origin,
        }));
        Ok(())
    }

    /// Append a parameter binding.
    pub fn push_binding(&mut self, key: BindingKey, value: Expr, span: Span) -> Result<()> {
        self.check_macros(&value)?;
        let origin = self.location(&span);
        self.events.push(Event::Binding(BindingEvent { key, value, origin }));
        Ok(())
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Drop every event from `len` on, restoring the macro definitions that
    /// were visible at that point. Source files stay registered.
    pub(crate) fn truncate(&mut self, len: usize) {
        if len >= self.events.len() {
            return;
        }
        self.events.truncate(len);
        self.macros.clear();
        for (idx, event) in self.events.iter().enumerate() {
            if let Event::Macro(m) = event {
                self.macros.insert(m.name.clone(), idx);
            }
        }
    }

    pub fn bindings(&self) -> impl Iterator<Item = &BindingEvent> {
        self.events.iter().filter_map(|event| match event {
            Event::Binding(binding) => Some(binding),
            Event::Macro(_) => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Latest definition of a macro.
    pub fn macro_value(&self, name: &str) -> Option<&MacroEvent> {
        match self.macros.get(name).map(|&idx| &self.events[idx]) {
            Some(Event::Macro(event)) => Some(event),
            _ => None,
        }
    }

    /// Every definition of a macro, oldest first.
    pub fn macro_history(&self, name: &str) -> Vec<&MacroEvent> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Macro(m) if m.name == name => Some(m),
                _ => None,
            })
            .collect()
    }

    /// Override chain of a key as written in the sources, oldest first.
    pub fn history(&self, key: &BindingKey) -> Vec<&BindingEvent> {
        self.bindings().filter(|event| &event.key == key).collect()
    }

    /// Final value expression bound to the exact triple.
    pub fn query(&self, scope: &ScopePath, symbol: &Path, param: &str) -> Option<&Expr> {
        self.bindings()
            .filter(|e| &e.key.scope == scope && &e.key.symbol == symbol && e.key.param == param)
            .last()
            .map(|e| &e.value)
    }

    /// Every key bound more than once, in order of first binding.
    pub fn overrides(&self) -> Vec<Override<'_>> {
        let mut groups: IndexMap<&BindingKey, Vec<&BindingEvent>> = IndexMap::new();
        for event in self.bindings() {
            groups.entry(&event.key).or_default().push(event);
        }
        collect_overrides(groups.into_iter())
    }

    /// Validate every binding against the registry and build the final table.
    ///
    /// Symbols are canonicalized to their registered names, so `Config.x` and
    /// `a.b.Config.x` land on the same key. The first invalid binding in log
    /// order fails the whole replay.
    pub fn replay(&self, registry: &Registry) -> Result<BindingTable> {
        let mut table = BindingTable::default();
        for event in self.bindings() {
            let registration = registry
                .lookup(&event.key.symbol)
                .map_err(|e| e.at(event.origin.clone()))?;
            if !registration.signature().has_param(&event.key.param) {
                return Err(Error::UnknownParameter {
                    symbol: registration.name().to_string(),
                    param: event.key.param.clone(),
                    location: Some(event.origin.clone()),
                });
            }

            let key = BindingKey::new(
                event.key.scope.clone(),
                registration.name().clone(),
                event.key.param.clone(),
            );
            let chain = table.entries.entry(key.clone()).or_default();
            if let Some(previous) = chain.last() {
                debug!(
                    binding = %key,
                    previous = %previous.origin,
                    origin = %event.origin,
                    "override"
                );
            }
            chain.push(BindingEvent {
                key,
                value: event.value.clone(),
                origin: event.origin.clone(),
            });
        }
        info!(
            events = self.events.len(),
            bindings = table.len(),
            files = self.sources.file_count(),
            "replayed override log"
        );
        Ok(table)
    }
}

/// Last-write-wins view of the log, keyed by canonical triples.
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    entries: IndexMap<BindingKey, Vec<BindingEvent>>,
}

impl BindingTable {
    /// Final binding of the exact key.
    pub fn get(&self, key: &BindingKey) -> Option<&BindingEvent> {
        self.entries.get(key).and_then(|chain| chain.last())
    }

    /// Final binding for `key`, searching its scope and then every enclosing
    /// scope up to the root.
    pub fn get_scoped(&self, key: &BindingKey) -> Option<&BindingEvent> {
        key.scope
            .ancestors()
            .find_map(|scope| self.get(&key.with_scope(scope)))
    }

    /// Override chain of a canonical key, oldest first.
    pub fn history(&self, key: &BindingKey) -> &[BindingEvent] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn overrides(&self) -> Vec<Override<'_>> {
        collect_overrides(
            self.entries
                .iter()
                .map(|(key, chain)| (key, chain.iter().collect::<Vec<_>>())),
        )
    }

    /// Final bindings in order of first appearance.
    pub fn iter(&self) -> impl Iterator<Item = &BindingEvent> {
        self.entries.values().filter_map(|chain| chain.last())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::registry::{Param, Signature};
    use bindery_ast::{ExprKind, Literal};

    const SOURCE: &str = "0123456789\n0123456789\n";

    fn store() -> OverrideStore {
        let mut store = OverrideStore::new();
        store.add_source("test.gin", SOURCE.to_string());
        store
    }

    fn int(i: i64) -> Expr {
        Expr::new(ExprKind::Literal(Literal::Int(i)), Span::new(0, 0, 1))
    }

    fn macro_ref(name: &str, offset: u32) -> Expr {
        Expr::new(ExprKind::Macro(Path::from(name)), Span::new(0, offset, offset + 2))
    }

    fn key(scope: &str, symbol: &str, param: &str) -> BindingKey {
        BindingKey::new(ScopePath::parse(scope), Path::from(symbol), param)
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register(
                Signature::new("t5x.utils.CheckpointConfig")
                    .param(Param::required("period"))
                    .param(Param::required("keep")),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_undefined_macro_rejected_at_append() {
        let mut store = store();
        let err = store
            .push_binding(key("", "CheckpointConfig", "period"), macro_ref("STEPS", 12), Span::new(0, 11, 20))
            .unwrap_err();
        match err {
            Error::UndefinedMacro { name, location } => {
                assert_eq!(name, "STEPS");
                assert_eq!((location.line, location.column), (2, 2));
            }
            other => panic!("expected UndefinedMacro, got {:?}", other),
        }
        assert!(store.is_empty());
    }

    #[test]
    fn test_macro_redefinition_keeps_history() {
        let mut store = store();
        store.push_macro("STEPS", int(1), Span::new(0, 0, 5)).unwrap();
        store.push_macro("STEPS", int(2), Span::new(0, 11, 16)).unwrap();
        assert_eq!(store.macro_history("STEPS").len(), 2);
        let latest = store.macro_value("STEPS").unwrap();
        assert_eq!(latest.value.kind, ExprKind::Literal(Literal::Int(2)));
        assert_eq!(latest.origin.line, 2);
    }

    #[test]
    fn test_truncate_restores_shadowed_macro() {
        let mut store = store();
        store.push_macro("STEPS", int(1), Span::new(0, 0, 5)).unwrap();
        store.push_macro("STEPS", int(2), Span::new(0, 11, 16)).unwrap();
        store.truncate(1);
        assert_eq!(store.events().len(), 1);
        let latest = store.macro_value("STEPS").unwrap();
        assert_eq!(latest.value.kind, ExprKind::Literal(Literal::Int(1)));

        store.truncate(0);
        assert!(store.macro_value("STEPS").is_none());
    }

    #[test]
    fn test_history_query_and_overrides() {
        let mut store = store();
        let period = key("", "CheckpointConfig", "period");
        let keep = key("", "CheckpointConfig", "keep");
        store.push_binding(period.clone(), int(1000), Span::new(0, 0, 1)).unwrap();
        store.push_binding(keep.clone(), int(20), Span::new(0, 2, 3)).unwrap();
        store.push_binding(period.clone(), int(2000), Span::new(0, 11, 12)).unwrap();
        store.push_binding(keep.clone(), int(20), Span::new(0, 13, 14)).unwrap();

        assert_eq!(store.history(&period).len(), 2);
        assert_eq!(
            store.query(&ScopePath::root(), &Path::from("CheckpointConfig"), "period").map(|e| &e.kind),
            Some(&ExprKind::Literal(Literal::Int(2000)))
        );

        let overrides = store.overrides();
        assert_eq!(overrides.len(), 2);
        assert_eq!(overrides[0].key, &period);
        assert_eq!(overrides[0].kind, OverrideKind::Conflicting);
        assert_eq!(overrides[1].kind, OverrideKind::Redundant);
        assert_eq!(overrides[0].winner().map(|e| e.origin.line), Some(2));
    }

    #[test]
    fn test_replay_canonicalizes_and_merges_spellings() {
        let mut store = store();
        store.push_binding(key("", "CheckpointConfig", "period"), int(1000), Span::new(0, 0, 1)).unwrap();
        store
            .push_binding(key("", "t5x.utils.CheckpointConfig", "period"), int(2000), Span::new(0, 11, 12))
            .unwrap();

        let table = store.replay(&registry()).unwrap();
        assert_eq!(table.len(), 1);
        let canonical = key("", "t5x.utils.CheckpointConfig", "period");
        assert_eq!(table.history(&canonical).len(), 2);
        assert_eq!(
            table.get(&canonical).map(|e| &e.value.kind),
            Some(&ExprKind::Literal(Literal::Int(2000)))
        );
        assert_eq!(table.overrides()[0].kind, OverrideKind::Conflicting);
    }

    #[test]
    fn test_replay_scoped_lookup_walks_ancestors() {
        let mut store = store();
        store.push_binding(key("", "CheckpointConfig", "period"), int(1), Span::new(0, 0, 1)).unwrap();
        store.push_binding(key("train", "CheckpointConfig", "period"), int(2), Span::new(0, 2, 3)).unwrap();
        let table = store.replay(&registry()).unwrap();

        let deep = key("train/eval", "t5x.utils.CheckpointConfig", "period");
        let other = key("infer", "t5x.utils.CheckpointConfig", "period");
        let found = |k: &BindingKey| table.get_scoped(k).map(|e| e.value.kind.clone());
        assert_eq!(found(&deep), Some(ExprKind::Literal(Literal::Int(2))));
        assert_eq!(found(&other), Some(ExprKind::Literal(Literal::Int(1))));
        assert!(table.get(&deep).is_none());
    }

    #[test]
    fn test_replay_reports_first_error_in_log_order() {
        let mut store = store();
        store.push_binding(key("", "CheckpointConfig", "colour"), int(1), Span::new(0, 0, 1)).unwrap();
        store.push_binding(key("", "Missing", "x"), int(1), Span::new(0, 11, 12)).unwrap();

        let err = store.replay(&registry()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownParameter);
        assert_eq!(err.location().map(|l| l.line), Some(1));
    }

    #[test]
    fn test_replay_unknown_configurable_has_location() {
        let mut store = store();
        store.push_binding(key("", "Missing", "x"), int(1), Span::new(0, 11, 12)).unwrap();
        let err = store.replay(&registry()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownConfigurable);
        assert_eq!(err.location().map(|l| (l.line, l.column)), Some((2, 1)));
    }
}
