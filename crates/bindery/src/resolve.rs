//! Reference resolution and object graph construction.
//!
//! Construction is lazy and depth-first: resolving a node evaluates its
//! parameters, which may reference further nodes. Every (scope, symbol) pair
//! is built at most once per [`Resolver`]. Nodes under construction are kept
//! in an ordered in-progress set so a cycle can be reported as the full chain.
//!
//! # Parameter lookup
//!
//! For a node `train/eval/Config`, parameter `p` takes the first of:
//!
//! 1. a binding `train/eval/Config.p`
//! 2. a binding `train/Config.p`
//! 3. a binding `Config.p`
//! 4. the declared default
//!
//! and fails with `MissingRequiredParameter` otherwise. References carry
//! their own absolute scope; they do not inherit the referencing node's.

use std::any::Any;
use std::fmt;
use std::iter;
use std::sync::Arc;

use bindery_ast::{Expr, ExprKind, Path, REQUIRED_MACRO, ScopePath};
use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::registry::{Param, Registry};
use crate::store::{BindingEvent, BindingKey, BindingTable, OverrideStore};
use crate::value::{Instance, Params, Value};

/// Identity of a constructed node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub scope: ScopePath,
    /// Canonical registered name
    pub symbol: Path,
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scope.is_root() {
            write!(f, "{}", self.symbol)
        } else {
            write!(f, "{}/{}", self.scope, self.symbol)
        }
    }
}

/// A constructed configurable.
pub struct Node {
    key: NodeKey,
    params: Params,
    instance: Instance,
}

impl Node {
    pub fn key(&self) -> &NodeKey {
        &self.key
    }

    /// Parameter values the node was constructed with.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The constructed object, if it is a `T`.
    ///
    /// Configurables registered without a constructor hold their [`Params`].
    pub fn instance<T: Any>(&self) -> Option<&T> {
        self.instance.downcast_ref::<T>()
    }

    pub fn instance_arc(&self) -> &Instance {
        &self.instance
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("key", &self.key)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// A loaded and validated configuration, ready to resolve.
#[derive(Debug)]
pub struct Config<'r> {
    registry: &'r Registry,
    store: OverrideStore,
    table: BindingTable,
}

impl<'r> Config<'r> {
    pub(crate) fn new(registry: &'r Registry, store: OverrideStore, table: BindingTable) -> Self {
        Self {
            registry,
            store,
            table,
        }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// The full statement log, with every override retained.
    pub fn store(&self) -> &OverrideStore {
        &self.store
    }

    /// Final bindings keyed by canonical triple.
    pub fn table(&self) -> &BindingTable {
        &self.table
    }

    /// Final binding of `scope/symbol.param`, accepting any registered
    /// spelling of `symbol`.
    pub fn query(
        &self,
        scope: &ScopePath,
        symbol: &str,
        param: &str,
    ) -> Result<Option<&BindingEvent>> {
        let registration = self.registry.lookup(&Path::parse(symbol))?;
        let key = BindingKey::new(scope.clone(), registration.name().clone(), param);
        Ok(self.table.get(&key))
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(self)
    }
}

/// Builds nodes on demand and caches them for the lifetime of the resolver.
pub struct Resolver<'c> {
    config: &'c Config<'c>,
    cache: IndexMap<NodeKey, Arc<Node>>,
    in_progress: IndexSet<NodeKey>,
    macro_stack: Vec<String>,
    roots: Vec<NodeKey>,
}

impl<'c> Resolver<'c> {
    pub fn new(config: &'c Config<'c>) -> Self {
        Self {
            config,
            cache: IndexMap::new(),
            in_progress: IndexSet::new(),
            macro_stack: Vec::new(),
            roots: Vec::new(),
        }
    }

    /// Resolve `symbol` (any registered spelling) in `scope`.
    ///
    /// On failure every node created during this call is discarded, so the
    /// resolver is left exactly as it was before the call.
    pub fn resolve(&mut self, scope: &ScopePath, symbol: &str) -> Result<Arc<Node>> {
        let registration = self.config.registry.lookup(&Path::parse(symbol))?;
        let key = NodeKey {
            scope: scope.clone(),
            symbol: registration.name().clone(),
        };

        let checkpoint = self.cache.len();
        match self.resolve_key(&key) {
            Ok(node) => {
                if !self.roots.contains(&key) {
                    self.roots.push(key);
                }
                Ok(node)
            }
            Err(err) => {
                debug!(
                    root = %key,
                    discarded = self.cache.len() - checkpoint,
                    error = %err,
                    "resolution failed, rolling back"
                );
                self.cache.truncate(checkpoint);
                self.in_progress.clear();
                self.macro_stack.clear();
                Err(err)
            }
        }
    }

    /// Already-constructed node, if any.
    pub fn cached(&self, key: &NodeKey) -> Option<&Arc<Node>> {
        self.cache.get(key)
    }

    fn resolve_key(&mut self, key: &NodeKey) -> Result<Arc<Node>> {
        if let Some(node) = self.cache.get(key) {
            return Ok(Arc::clone(node));
        }
        if let Some(start) = self.in_progress.get_index_of(key) {
            let chain = self
                .in_progress
                .iter()
                .skip(start)
                .chain(iter::once(key))
                .map(ToString::to_string)
                .collect();
            return Err(Error::CyclicReference { chain });
        }

        let config = self.config;
        let registration = config.registry.lookup(&key.symbol)?;
        self.in_progress.insert(key.clone());

        let mut params = Params::new();
        for param in &registration.signature().params {
            let value = self.parameter_value(key, param)?;
            if !param.kind.accepts(&value) {
                return Err(Error::ParameterType {
                    scope: key.scope.clone(),
                    symbol: key.symbol.to_string(),
                    param: param.name.clone(),
                    expected: param.kind,
                    found: value.type_name().to_string(),
                });
            }
            params.insert(param.name.clone(), value);
        }

        let instance = match registration.constructor() {
            Some(constructor) => constructor(&params).map_err(|message| Error::Constructor {
                scope: key.scope.clone(),
                symbol: key.symbol.to_string(),
                message,
            })?,
            None => Arc::new(params.clone()) as Instance,
        };

        self.in_progress.pop();
        let node = Arc::new(Node {
            key: key.clone(),
            params,
            instance,
        });
        debug!(node = %key, params = node.params.len(), "constructed");
        self.cache.insert(key.clone(), Arc::clone(&node));
        Ok(node)
    }

    fn parameter_value(&mut self, key: &NodeKey, param: &Param) -> Result<Value> {
        let config = self.config;
        let binding = BindingKey::new(key.scope.clone(), key.symbol.clone(), param.name.clone());
        match config.table.get_scoped(&binding) {
            Some(event) => self.evaluate(&event.value, key, param),
            None => param
                .default
                .clone()
                .ok_or_else(|| missing_parameter(key, param)),
        }
    }

    fn evaluate(&mut self, expr: &'c Expr, key: &NodeKey, param: &Param) -> Result<Value> {
        let config = self.config;
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(Value::from(literal)),
            ExprKind::List(items) => items
                .iter()
                .map(|item| self.evaluate(item, key, param))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            ExprKind::Tuple(items) => items
                .iter()
                .map(|item| self.evaluate(item, key, param))
                .collect::<Result<Vec<_>>>()
                .map(Value::Tuple),
            ExprKind::Map(entries) => {
                let mut map = IndexMap::new();
                for (name, value) in entries {
                    map.insert(name.clone(), self.evaluate(value, key, param)?);
                }
                Ok(Value::Map(map))
            }
            ExprKind::Macro(name) if *name == REQUIRED_MACRO => Err(missing_parameter(key, param)),
            ExprKind::Macro(name) => self.expand_macro(name, expr, key, param),
            ExprKind::Reference(reference) => {
                let registration = config
                    .registry
                    .lookup(&reference.symbol)
                    .map_err(|e| e.at(config.store.location(&expr.span)))?;
                let target = NodeKey {
                    scope: reference.scope.clone(),
                    symbol: registration.name().clone(),
                };
                self.resolve_key(&target).map(Value::Object)
            }
        }
    }

    /// Substitute the final value of a macro.
    fn expand_macro(
        &mut self,
        name: &Path,
        expr: &Expr,
        key: &NodeKey,
        param: &Param,
    ) -> Result<Value> {
        let config = self.config;
        let name = name.to_string();
        if let Some(start) = self.macro_stack.iter().position(|m| *m == name) {
            let chain = self.macro_stack[start..]
                .iter()
                .chain(iter::once(&name))
                .map(|m| format!("%{}", m))
                .collect();
            return Err(Error::CyclicReference { chain });
        }
        let Some(definition) = config.store.macro_value(&name) else {
            return Err(Error::UndefinedMacro {
                name,
                location: config.store.location(&expr.span),
            });
        };

        self.macro_stack.push(name);
        let value = self.evaluate(&definition.value, key, param);
        self.macro_stack.pop();
        value
    }

    /// Consume the resolver, keeping everything it constructed.
    pub fn finish(self) -> ObjectGraph {
        info!(
            nodes = self.cache.len(),
            roots = self.roots.len(),
            "object graph complete"
        );
        ObjectGraph {
            nodes: self.cache,
            roots: self.roots,
        }
    }
}

fn missing_parameter(key: &NodeKey, param: &Param) -> Error {
    Error::MissingRequiredParameter {
        scope: key.scope.clone(),
        symbol: key.symbol.to_string(),
        param: param.name.clone(),
    }
}

/// Every node constructed during one resolution pass, in construction order.
#[derive(Debug, Default)]
pub struct ObjectGraph {
    nodes: IndexMap<NodeKey, Arc<Node>>,
    roots: Vec<NodeKey>,
}

impl ObjectGraph {
    pub fn get(&self, key: &NodeKey) -> Option<&Arc<Node>> {
        self.nodes.get(key)
    }

    /// Find a node by scope and any trailing part of its symbol name.
    pub fn find(&self, scope: &ScopePath, symbol: &str) -> Option<&Arc<Node>> {
        let suffix = Path::parse(symbol);
        self.nodes
            .iter()
            .find(|(key, _)| &key.scope == scope && key.symbol.ends_with(&suffix))
            .map(|(_, node)| node)
    }

    /// Nodes that were requested directly rather than through a reference.
    pub fn roots(&self) -> impl Iterator<Item = &Arc<Node>> {
        self.roots.iter().filter_map(|key| self.nodes.get(key))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Arc<Node>> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Render every parameter value actually used, in binding syntax.
    ///
    /// Macros appear already substituted and references as `@symbol()`.
    /// Nodes are listed in construction order, dependencies first.
    pub fn operative_config(&self) -> String {
        let mut out = String::new();
        for node in self.nodes.values() {
            if node.params.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("# Parameters for {}:\n", node.key));
            out.push_str(&format!("# {}\n", "=".repeat(78)));
            for (name, value) in node.params.iter() {
                let key = BindingKey::new(node.key.scope.clone(), node.key.symbol.clone(), name);
                out.push_str(&format!("{} = {}\n", key, value));
            }
        }
        out
    }
}
