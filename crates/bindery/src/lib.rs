// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Configuration resolution engine for gin-style binding files.
//!
//! Resolution runs in two phases:
//!
//! 1. **Loading**: the [`IncludeLoader`] walks the include tree and appends
//!    every macro and binding statement, in order, to an [`OverrideStore`].
//!    Replaying that log against the [`Registry`] yields a validated
//!    [`Config`].
//! 2. **Construction**: a [`Resolver`] builds requested configurables on
//!    demand, constructing every referenced node exactly once and failing on
//!    cycles, missing parameters and type mismatches.
//!
//! ```
//! use bindery::{MemoryLoader, Param, Registry, ScopePath, Signature, Value};
//!
//! let mut registry = Registry::new();
//! registry
//!     .register(
//!         Signature::new("t5x.utils.CheckpointConfig")
//!             .param(Param::required("period"))
//!             .param(Param::optional("keep", Value::None)),
//!     )
//!     .unwrap();
//!
//! let sources = MemoryLoader::new()
//!     .with("base.gin", "utils.CheckpointConfig.period = 1000")
//!     .with("run.gin", "include 'base.gin'\nCheckpointConfig.period = 2000");
//!
//! let graph = bindery::resolve(
//!     &registry,
//!     sources,
//!     &["run.gin"],
//!     &["CheckpointConfig.keep = 20"],
//!     &[(ScopePath::root(), "CheckpointConfig")],
//! )
//! .unwrap();
//!
//! let node = graph.find(&ScopePath::root(), "CheckpointConfig").unwrap();
//! assert_eq!(node.params().get("period"), Some(&Value::Int(2000)));
//! assert_eq!(node.params().get("keep"), Some(&Value::Int(20)));
//! ```

pub mod error;
pub mod loader;
pub mod registry;
pub mod resolve;
pub mod source;
pub mod store;
pub mod value;

pub use bindery_ast::{Location, Path, ScopePath};
pub use error::{Error, ErrorKind, Result};
pub use loader::{IncludeChain, IncludeLoader};
pub use registry::{AliasTable, Constructor, Param, ParamKind, Registration, Registry, Signature};
pub use resolve::{Config, Node, NodeKey, ObjectGraph, Resolver};
pub use source::{FsLoader, LoadedSource, MemoryLoader, SourceLoader, normalize};
pub use store::{
    BindingEvent, BindingKey, BindingTable, MacroEvent, Override, OverrideKind, OverrideStore,
};
pub use value::{Instance, Params, Value};

/// Load `files` in order, then apply each direct override in `bindings`.
///
/// Later files and bindings take precedence over earlier ones.
pub fn parse_config_files_and_bindings<'r, L, F, B>(
    registry: &'r Registry,
    loader: L,
    files: F,
    bindings: B,
) -> Result<Config<'r>>
where
    L: SourceLoader,
    F: IntoIterator,
    F::Item: AsRef<str>,
    B: IntoIterator,
    B::Item: AsRef<str>,
{
    let mut include_loader = IncludeLoader::new(registry, loader);
    for file in files {
        include_loader.load_file(file.as_ref())?;
    }
    for binding in bindings {
        include_loader.apply_binding(binding.as_ref())?;
    }
    include_loader.finish()
}

/// Load a configuration and construct every root in `roots`.
///
/// Roots are `(scope, symbol)` pairs; the symbol may be any registered
/// spelling. Nothing is returned unless every root resolves.
pub fn resolve<L, F, B>(
    registry: &Registry,
    loader: L,
    files: F,
    bindings: B,
    roots: &[(ScopePath, &str)],
) -> Result<ObjectGraph>
where
    L: SourceLoader,
    F: IntoIterator,
    F::Item: AsRef<str>,
    B: IntoIterator,
    B::Item: AsRef<str>,
{
    let config = parse_config_files_and_bindings(registry, loader, files, bindings)?;
    let mut resolver = config.resolver();
    for (scope, symbol) in roots {
        resolver.resolve(scope, symbol)?;
    }
    Ok(resolver.finish())
}
