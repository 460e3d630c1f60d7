//! Registry of configurable symbols.
//!
//! A configurable is a dotted name plus an ordered parameter list. External
//! collaborators register them before any configuration is loaded; after that
//! the registry is only read.
//!
//! # Example
//!
//! ```
//! use bindery::registry::{Param, Registry, Signature};
//!
//! let mut registry = Registry::new();
//! registry
//!     .register(
//!         Signature::new("t5x.utils.CheckpointConfig")
//!             .param(Param::required("period"))
//!             .param(Param::optional("keep", bindery::Value::None)),
//!     )
//!     .unwrap();
//!
//! let found = registry.lookup(&"CheckpointConfig".into()).unwrap();
//! assert_eq!(found.signature().name, "t5x.utils.CheckpointConfig");
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bindery_ast::Path;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::error::{Error, Result};
use crate::value::{Instance, Params, Value};

/// Loose declared type of a parameter, checked after evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    #[default]
    Any,
    /// `None`, bool, int or float
    Scalar,
    String,
    /// List or tuple
    List,
    Mapping,
    /// A constructed configurable
    Reference,
}

impl ParamKind {
    /// Whether `value` satisfies this kind. `None` satisfies every kind.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::None) | (ParamKind::Any, _) => true,
            (ParamKind::Scalar, Value::Bool(_) | Value::Int(_) | Value::Float(_)) => true,
            (ParamKind::String, Value::Str(_)) => true,
            (ParamKind::List, Value::List(_) | Value::Tuple(_)) => true,
            (ParamKind::Mapping, Value::Map(_)) => true,
            (ParamKind::Reference, Value::Object(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::Any => "any",
            ParamKind::Scalar => "scalar",
            ParamKind::String => "string",
            ParamKind::List => "list",
            ParamKind::Mapping => "mapping",
            ParamKind::Reference => "reference",
        };
        f.write_str(name)
    }
}

/// One constructor parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    /// `None` means the parameter is required.
    pub default: Option<Value>,
    pub kind: ParamKind,
}

impl Param {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            kind: ParamKind::Any,
        }
    }

    pub fn optional(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            default: Some(default.into()),
            kind: ParamKind::Any,
        }
    }

    pub fn with_kind(mut self, kind: ParamKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Name and parameter list of a configurable.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    /// Fully qualified dotted name
    pub name: Path,
    pub params: Vec<Param>,
}

impl Signature {
    pub fn new(name: impl Into<Path>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Append a parameter (builder style).
    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// External constructor callback.
pub type Constructor = Arc<dyn Fn(&Params) -> std::result::Result<Instance, String> + Send + Sync>;

/// A registered configurable.
#[derive(Clone)]
pub struct Registration {
    signature: Signature,
    constructor: Option<Constructor>,
}

impl Registration {
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn name(&self) -> &Path {
        &self.signature.name
    }

    pub fn constructor(&self) -> Option<&Constructor> {
        self.constructor.as_ref()
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("signature", &self.signature)
            .field("constructor", &self.constructor.is_some())
            .finish()
    }
}

/// Import aliases visible in one file: local name to module path.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    aliases: IndexMap<Path, Path>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `local` to `module`. Rebinding a name replaces it.
    pub fn insert(&mut self, local: Path, module: Path) {
        self.aliases.insert(local, module);
    }

    pub fn get(&self, local: &Path) -> Option<&Path> {
        self.aliases.get(local)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Rewrite the longest aliased prefix of `name`, if any.
    pub fn canonicalize(&self, name: &Path) -> Option<Path> {
        (1..=name.len()).rev().find_map(|len| {
            let prefix = Path::new(name.segments()[..len].to_vec());
            self.aliases
                .get(&prefix)
                .map(|module| name.replace_prefix(len, module))
        })
    }
}

/// Process-wide table of configurables.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: IndexMap<Path, Registration>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a signature whose instances are plain parameter records.
    pub fn register(&mut self, signature: Signature) -> Result<()> {
        self.insert(signature, None)
    }

    /// Register a signature together with its constructor callback.
    pub fn register_with<T, F>(&mut self, signature: Signature, constructor: F) -> Result<()>
    where
        T: Any + Send + Sync,
        F: Fn(&Params) -> std::result::Result<T, String> + Send + Sync + 'static,
    {
        let constructor: Constructor =
            Arc::new(move |params: &Params| constructor(params).map(|v| Arc::new(v) as Instance));
        self.insert(signature, Some(constructor))
    }

    fn insert(&mut self, signature: Signature, constructor: Option<Constructor>) -> Result<()> {
        if self.entries.contains_key(&signature.name) {
            return Err(Error::DuplicateRegistration {
                name: signature.name.to_string(),
            });
        }
        for (i, param) in signature.params.iter().enumerate() {
            if signature.params[..i].iter().any(|p| p.name == param.name) {
                return Err(Error::DuplicateRegistration {
                    name: format!("{}.{}", signature.name, param.name),
                });
            }
        }
        debug!(
            configurable = %signature.name,
            params = signature.params.len(),
            "registered"
        );
        self.entries.insert(
            signature.name.clone(),
            Registration {
                signature,
                constructor,
            },
        );
        Ok(())
    }

    /// Find a configurable by exact name, else by unique dotted suffix.
    pub fn lookup(&self, name: &Path) -> Result<&Registration> {
        if let Some(registration) = self.entries.get(name) {
            return Ok(registration);
        }
        let matches: Vec<&Registration> = self
            .entries
            .iter()
            .filter(|(key, _)| key.ends_with(name))
            .map(|(_, registration)| registration)
            .collect();
        match matches.as_slice() {
            [] => Err(Error::UnknownConfigurable {
                name: name.to_string(),
                location: None,
            }),
            [single] => Ok(*single),
            several => Err(Error::AmbiguousConfigurable {
                name: name.to_string(),
                candidates: several.iter().map(|r| r.name().to_string()).collect(),
                location: None,
            }),
        }
    }

    /// Whether `name` is registered under exactly that name.
    pub fn contains(&self, name: &Path) -> bool {
        self.entries.contains_key(name)
    }

    /// Canonicalize a name written under dynamic registration.
    ///
    /// Exact registered names are kept; otherwise the longest import alias
    /// prefix is rewritten to its module path. Names matching no alias pass
    /// through unchanged and are checked later by [`Registry::lookup`].
    pub fn resolve_alias(&self, aliases: &AliasTable, name: &Path) -> Path {
        if self.contains(name) {
            return name.clone();
        }
        aliases.canonicalize(name).unwrap_or_else(|| name.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Registration> {
        self.entries.values()
    }

    /// Register every configurable described by a YAML manifest.
    ///
    /// ```yaml
    /// configurables:
    ///   - name: t5x.utils.CheckpointConfig
    ///     params:
    ///       - period
    ///       - name: keep
    ///         default: null
    ///         kind: scalar
    /// ```
    ///
    /// A bare parameter name is required; an explicit `default` (even `null`)
    /// makes it optional. Returns the number of configurables registered.
    pub fn load_manifest(&mut self, yaml: &str) -> Result<usize> {
        let manifest: Manifest =
            serde_yaml::from_str(yaml).map_err(|e| Error::Manifest(e.to_string()))?;
        let count = manifest.configurables.len();
        for entry in manifest.configurables {
            let mut signature = Signature::new(entry.name.as_str());
            for param in entry.params {
                signature = signature.param(param.into_param(&entry.name)?);
            }
            self.register(signature)?;
        }
        Ok(count)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    #[serde(default)]
    configurables: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestEntry {
    name: String,
    #[serde(default)]
    params: Vec<ManifestParam>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ManifestParam {
    Name(String),
    Full(ParamSpec),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParamSpec {
    name: String,
    #[serde(default, deserialize_with = "present")]
    default: Option<serde_yaml::Value>,
    #[serde(default)]
    kind: ParamKind,
}

/// Distinguish `default: null` from an absent key.
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<serde_yaml::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_yaml::Value::deserialize(deserializer).map(Some)
}

impl ManifestParam {
    fn into_param(self, owner: &str) -> Result<Param> {
        match self {
            ManifestParam::Name(name) => Ok(Param::required(name)),
            ManifestParam::Full(spec) => {
                let default = match spec.default {
                    Some(raw) => Some(yaml_value(raw).map_err(|reason| {
                        Error::Manifest(format!(
                            "default for `{}.{}`: {}",
                            owner, spec.name, reason
                        ))
                    })?),
                    None => None,
                };
                Ok(Param {
                    name: spec.name,
                    default,
                    kind: spec.kind,
                })
            }
        }
    }
}

fn yaml_value(raw: serde_yaml::Value) -> std::result::Result<Value, String> {
    use serde_yaml::Value as Yaml;

    match raw {
        Yaml::Null => Ok(Value::None),
        Yaml::Bool(b) => Ok(Value::Bool(b)),
        Yaml::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::Int(i)),
            None => n
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| format!("unsupported number `{}`", n)),
        },
        Yaml::String(s) => Ok(Value::Str(s)),
        Yaml::Sequence(items) => items
            .into_iter()
            .map(yaml_value)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(Value::List),
        Yaml::Mapping(entries) => {
            let mut map = IndexMap::new();
            for (key, value) in entries {
                let Yaml::String(key) = key else {
                    return Err("mapping keys must be strings".to_string());
                };
                map.insert(key, yaml_value(value)?);
            }
            Ok(Value::Map(map))
        }
        Yaml::Tagged(tagged) => Err(format!("unsupported tag `{}`", tagged.tag)),
    }
}
