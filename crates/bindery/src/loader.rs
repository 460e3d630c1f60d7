//! Include loader: turns a tree of configuration files into one ordered log.
//!
//! Files are processed depth-first in include order. Each file gets its own
//! import alias table; `include` does not leak aliases in either direction.

use bindery_ast::{Expr, Location, Path, StatementKind};
use bindery_parser::{ParseError, parse_binding, parse_source};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::registry::{AliasTable, Registry};
use crate::resolve::Config;
use crate::source::{LoadedSource, SourceLoader};
use crate::store::{BindingKey, OverrideStore};

/// Source identifiers currently being processed, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeChain {
    files: Vec<String>,
}

impl IncludeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn contains(&self, id: &str) -> bool {
        self.files.iter().any(|f| f == id)
    }

    /// The innermost file, which is the one doing the including.
    pub fn current(&self) -> Option<&str> {
        self.files.last().map(String::as_str)
    }

    /// This chain with `id` appended.
    pub fn extended(&self, id: &str) -> Self {
        let mut files = self.files.clone();
        files.push(id.to_string());
        Self { files }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Per-file state while walking statements.
struct FileScope {
    aliases: AliasTable,
    dynamic: bool,
}

/// Loads configuration files and direct overrides into an [`OverrideStore`].
///
/// Each public load call is all-or-nothing: when it fails, the events it had
/// already appended are dropped and the loader is left as it was before the
/// call.
///
/// ```
/// use bindery::{IncludeLoader, MemoryLoader, Registry, Signature, Param};
///
/// let mut registry = Registry::new();
/// registry
///     .register(Signature::new("train.Scheduler").param(Param::required("warmup")))
///     .unwrap();
///
/// let sources = MemoryLoader::new().with("base.gin", "Scheduler.warmup = 1000");
/// let mut loader = IncludeLoader::new(&registry, sources);
/// loader.load_file("base.gin").unwrap();
/// loader.apply_binding("Scheduler.warmup = 10").unwrap();
/// let config = loader.finish().unwrap();
/// assert_eq!(config.table().len(), 1);
/// ```
pub struct IncludeLoader<'r, L> {
    registry: &'r Registry,
    loader: L,
    store: OverrideStore,
    direct_overrides: usize,
}

impl<'r, L: SourceLoader> IncludeLoader<'r, L> {
    pub fn new(registry: &'r Registry, loader: L) -> Self {
        Self {
            registry,
            loader,
            store: OverrideStore::new(),
            direct_overrides: 0,
        }
    }

    /// Process a top-level file.
    pub fn load_file(&mut self, path: &str) -> Result<()> {
        self.process(path, &IncludeChain::new())
    }

    fn atomically(&mut self, op: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        let checkpoint = self.store.events().len();
        let result = op(self);
        if let Err(err) = &result {
            debug!(
                discarded = self.store.events().len() - checkpoint,
                error = %err,
                "load failed, rolling back"
            );
            self.store.truncate(checkpoint);
        }
        result
    }

    /// Process a file whose text is already in hand. Its includes still go
    /// through the source loader.
    pub fn load_str(&mut self, id: &str, text: &str) -> Result<()> {
        let source = LoadedSource {
            id: id.to_string(),
            text: text.to_string(),
        };
        self.atomically(|loader| loader.process_source(source, &IncludeChain::new(), None))
    }

    /// Load `path` as included from the innermost file of `chain`.
    pub fn process(&mut self, path: &str, chain: &IncludeChain) -> Result<()> {
        self.atomically(|loader| loader.process_at(path, chain, None))
    }

    fn process_at(
        &mut self,
        path: &str,
        chain: &IncludeChain,
        site: Option<Location>,
    ) -> Result<()> {
        let source = self
            .loader
            .load(path, chain.current())
            .map_err(|e| Error::FileLoad {
                path: path.to_string(),
                reason: e.to_string(),
                location: site.clone(),
            })?;
        self.process_source(source, chain, site)
    }

    fn process_source(
        &mut self,
        source: LoadedSource,
        chain: &IncludeChain,
        site: Option<Location>,
    ) -> Result<()> {
        if chain.contains(&source.id) {
            let mut files = chain.files().to_vec();
            files.push(source.id);
            return Err(Error::CircularInclude {
                chain: files,
                location: site,
            });
        }

        debug!(file = %source.id, depth = chain.len(), "processing config file");
        let file_id = self.store.add_source(source.id.clone(), source.text.clone());
        let statements =
            parse_source(&source.text, file_id).map_err(|e| self.syntax_error(e))?;

        let inner = chain.extended(&source.id);
        let mut scope = FileScope {
            aliases: AliasTable::new(),
            dynamic: false,
        };

        for statement in statements {
            match statement.kind {
                StatementKind::Import(import) => {
                    let local = import.local_name();
                    debug!(alias = %local, module = %import.module, "import");
                    scope.aliases.insert(local, import.module);
                }
                StatementKind::DynamicRegistration => {
                    debug!(file = %source.id, "dynamic registration enabled");
                    scope.dynamic = true;
                }
                StatementKind::Include(include) => {
                    let site = self.store.location(&statement.span);
                    self.process_at(&include.path, &inner, Some(site))?;
                }
                StatementKind::Macro(assignment) => {
                    let value = self.canonical_value(&scope, &assignment.value);
                    self.store
                        .push_macro(assignment.name, value, statement.span)?;
                }
                StatementKind::Binding(binding) => {
                    let symbol = self.canonical_name(&scope, &binding.target.symbol);
                    for (param, value) in binding.parameters() {
                        let key = BindingKey::new(
                            binding.target.scope.clone(),
                            symbol.clone(),
                            param,
                        );
                        let value = self.canonical_value(&scope, value);
                        self.store.push_binding(key, value, statement.span)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Append a single `key = value` override after everything loaded so far.
    pub fn apply_binding(&mut self, text: &str) -> Result<()> {
        self.atomically(|loader| loader.apply_binding_text(text))
    }

    fn apply_binding_text(&mut self, text: &str) -> Result<()> {
        let id = format!("<binding:{}>", self.direct_overrides);
        self.direct_overrides += 1;
        let file_id = self.store.add_source(id.clone(), text.to_string());
        let statement = parse_binding(text, file_id).map_err(|e| self.syntax_error(e))?;

        debug!(source = %id, binding = %statement, "direct override");
        match statement.kind {
            StatementKind::Macro(assignment) => {
                self.store
                    .push_macro(assignment.name, assignment.value, statement.span)
            }
            StatementKind::Binding(binding) => {
                for (param, value) in binding.parameters() {
                    let key = BindingKey::new(
                        binding.target.scope.clone(),
                        binding.target.symbol.clone(),
                        param,
                    );
                    self.store.push_binding(key, value.clone(), statement.span)?;
                }
                Ok(())
            }
            _ => Err(Error::Syntax {
                location: self.store.location(&statement.span),
                message: "only `name = value` bindings and macros can be applied directly"
                    .to_string(),
            }),
        }
    }

    pub fn store(&self) -> &OverrideStore {
        &self.store
    }

    /// Validate the accumulated log against the registry.
    pub fn finish(self) -> Result<Config<'r>> {
        let table = self.store.replay(self.registry)?;
        info!(
            files = self.store.sources().file_count(),
            bindings = table.len(),
            "configuration loaded"
        );
        Ok(Config::new(self.registry, self.store, table))
    }

    fn syntax_error(&self, err: ParseError) -> Error {
        Error::Syntax {
            location: self.store.location(&err.span),
            message: err.message,
        }
    }

    fn canonical_name(&self, scope: &FileScope, name: &Path) -> Path {
        if scope.dynamic {
            self.registry.resolve_alias(&scope.aliases, name)
        } else {
            name.clone()
        }
    }

    fn canonical_value(&self, scope: &FileScope, value: &Expr) -> Expr {
        if scope.dynamic {
            value.map_references(&|name| self.registry.resolve_alias(&scope.aliases, name))
        } else {
            value.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::registry::{Param, Signature};
    use crate::source::MemoryLoader;
    use bindery_ast::{ExprKind, Literal, ScopePath};

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register(
                Signature::new("t5x.utils.CheckpointConfig")
                    .param(Param::required("period"))
                    .param(Param::optional("keep", crate::Value::None)),
            )
            .unwrap();
        registry
            .register(Signature::new("t5x.trainer.Trainer").param(Param::required("checkpoint")))
            .unwrap();
        registry
    }

    fn period_key() -> BindingKey {
        BindingKey::new(
            ScopePath::root(),
            Path::from("t5x.utils.CheckpointConfig"),
            "period",
        )
    }

    fn final_period(config: &Config<'_>) -> Option<ExprKind> {
        config.table().get(&period_key()).map(|e| e.value.kind.clone())
    }

    #[test]
    fn test_include_is_processed_in_place() {
        let registry = registry();
        let sources = MemoryLoader::new()
            .with("base.gin", "CheckpointConfig.period = 1000")
            .with(
                "run.gin",
                "CheckpointConfig.period = 5\ninclude 'base.gin'\n",
            );
        let mut loader = IncludeLoader::new(&registry, sources);
        loader.load_file("run.gin").unwrap();
        let config = loader.finish().unwrap();
        // The include comes after the local binding, so it wins.
        assert_eq!(
            final_period(&config),
            Some(ExprKind::Literal(Literal::Int(1000)))
        );
    }

    #[test]
    fn test_self_include_is_circular() {
        let registry = registry();
        let sources = MemoryLoader::new().with("loop.gin", "include 'loop.gin'");
        let mut loader = IncludeLoader::new(&registry, sources);
        let err = loader.load_file("loop.gin").unwrap_err();
        match err {
            Error::CircularInclude { chain, location } => {
                assert_eq!(chain, vec!["loop.gin", "loop.gin"]);
                assert_eq!(location.map(|l| l.line), Some(1));
            }
            other => panic!("expected CircularInclude, got {:?}", other),
        }
    }

    #[test]
    fn test_diamond_include_is_allowed() {
        let registry = registry();
        let sources = MemoryLoader::new()
            .with("common.gin", "CheckpointConfig.keep = 3")
            .with("a.gin", "include 'common.gin'")
            .with("b.gin", "include 'common.gin'")
            .with("top.gin", "include 'a.gin'\ninclude 'b.gin'");
        let mut loader = IncludeLoader::new(&registry, sources);
        loader.load_file("top.gin").unwrap();
        assert_eq!(loader.store().bindings().count(), 2);
    }

    #[test]
    fn test_missing_include_reports_site() {
        let registry = registry();
        let sources = MemoryLoader::new().with("top.gin", "\n\ninclude 'gone.gin'");
        let mut loader = IncludeLoader::new(&registry, sources);
        let err = loader.load_file("top.gin").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileLoad);
        assert_eq!(err.location().map(|l| (l.line, l.column)), Some((3, 1)));
    }

    #[test]
    fn test_syntax_error_location() {
        let registry = registry();
        let mut loader = IncludeLoader::new(&registry, MemoryLoader::new());
        let err = loader.load_str("bad.gin", "A = 1\nB = [").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        let location = err.location().unwrap();
        assert_eq!(location.file, "bad.gin");
        assert_eq!(location.line, 2);
    }

    #[test]
    fn test_dynamic_registration_canonicalizes_aliases() {
        let registry = registry();
        let text = r#"
from __gin__ import dynamic_registration
from t5x import utils
import t5x.trainer as tr

tr.Trainer.checkpoint = @utils.CheckpointConfig()
utils.CheckpointConfig.period = 10
"#;
        let mut loader = IncludeLoader::new(&registry, MemoryLoader::new());
        loader.load_str("dyn.gin", text).unwrap();

        let keys: Vec<String> = loader
            .store()
            .bindings()
            .map(|e| e.key.symbol.to_string())
            .collect();
        assert_eq!(keys, vec!["t5x.trainer.Trainer", "t5x.utils.CheckpointConfig"]);
        let reference = loader.store().bindings().next().unwrap().value.references()[0].clone();
        assert_eq!(reference.symbol, "t5x.utils.CheckpointConfig");
    }

    #[test]
    fn test_aliases_ignored_without_dynamic_registration() {
        let registry = registry();
        let mut loader = IncludeLoader::new(&registry, MemoryLoader::new());
        loader
            .load_str("plain.gin", "import t5x.utils as u\nu.CheckpointConfig.period = 1")
            .unwrap();
        let symbol = loader.store().bindings().next().unwrap().key.symbol.clone();
        assert_eq!(symbol, "u.CheckpointConfig");
        let err = loader.finish().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownConfigurable);
    }

    #[test]
    fn test_aliases_do_not_leak_into_includes() {
        let registry = registry();
        let sources = MemoryLoader::new()
            .with("child.gin", "from __gin__ import dynamic_registration\nutils.CheckpointConfig.period = 1")
            .with(
                "parent.gin",
                "from __gin__ import dynamic_registration\nfrom t5x import utils\ninclude 'child.gin'",
            );
        let mut loader = IncludeLoader::new(&registry, sources);
        loader.load_file("parent.gin").unwrap();
        let symbol = loader.store().bindings().next().unwrap().key.symbol.clone();
        assert_eq!(symbol, "utils.CheckpointConfig");
    }

    #[test]
    fn test_direct_overrides_append_in_call_order() {
        let registry = registry();
        let sources = MemoryLoader::new().with("base.gin", "CheckpointConfig.period = 1000");
        let mut loader = IncludeLoader::new(&registry, sources);
        loader.apply_binding("CheckpointConfig.period = 7").unwrap();
        loader.load_file("base.gin").unwrap();
        loader.apply_binding("CheckpointConfig.period = 9").unwrap();
        let config = loader.finish().unwrap();

        assert_eq!(final_period(&config), Some(ExprKind::Literal(Literal::Int(9))));
        let history = config.table().history(&period_key());
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].origin.file, "<binding:1>");
    }

    #[test]
    fn test_failed_load_leaves_earlier_state() {
        let registry = registry();
        let sources = MemoryLoader::new()
            .with("base.gin", "STEPS = 1000\nCheckpointConfig.period = %STEPS")
            .with(
                "broken.gin",
                "STEPS = 5\nCheckpointConfig.period = 5\ninclude 'gone.gin'",
            );
        let mut loader = IncludeLoader::new(&registry, sources);
        loader.load_file("base.gin").unwrap();
        let err = loader.load_file("broken.gin").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileLoad);

        assert_eq!(loader.store().events().len(), 2);
        let steps = loader.store().macro_value("STEPS").unwrap();
        assert_eq!(steps.value.kind, ExprKind::Literal(Literal::Int(1000)));
        let config = loader.finish().unwrap();
        assert_eq!(config.table().history(&period_key()).len(), 1);
    }

    #[test]
    fn test_failed_block_binding_is_dropped_whole() {
        let registry = registry();
        let mut loader = IncludeLoader::new(&registry, MemoryLoader::new());
        let err = loader
            .apply_binding("CheckpointConfig: { period = 1, keep = %MISSING }")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UndefinedMacro);
        assert!(loader.store().is_empty());
    }

    #[test]
    fn test_direct_override_rejects_other_statements() {
        let registry = registry();
        let mut loader = IncludeLoader::new(&registry, MemoryLoader::new());
        for text in ["include 'base.gin'", "import t5x.utils", "from t5x import utils"] {
            let err = loader.apply_binding(text).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Syntax, "{text}");
        }
        assert!(loader.store().is_empty());
    }

    #[test]
    fn test_direct_override_syntax_error() {
        let registry = registry();
        let mut loader = IncludeLoader::new(&registry, MemoryLoader::new());
        let err = loader.apply_binding("CheckpointConfig.period").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert_eq!(err.location().map(|l| l.file.as_str()), Some("<binding:0>"));
    }
}
