//! Evaluated parameter values.
//!
//! Binding expressions are symbolic until resolution. Once macros are
//! substituted and references constructed, every parameter holds a [`Value`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bindery_ast::Literal;
use bindery_ast::print::write_quoted;
use indexmap::IndexMap;

use crate::resolve::Node;

/// Opaque object produced by a constructor callback.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// A fully evaluated parameter value.
#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Map(IndexMap<String, Value>),
    /// A constructed configurable
    Object(Arc<Node>),
}

impl Value {
    /// Short name of the value's shape, used in type errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "None",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Map(_) => "mapping",
            Value::Object(_) => "reference",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers widen to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Items of a list or tuple.
    pub fn as_items(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Arc<Node>> {
        match self {
            Value::Object(node) => Some(node),
            _ => None,
        }
    }
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::None => Value::None,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(i) => Value::Int(*i),
            Literal::Float(f) => Value::Float(*f),
            Literal::Str(s) => Value::Str(s.clone()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            // Nodes are singletons; identity is equality.
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Int(i) => write!(f, "Int({})", i),
            Value::Float(x) => write!(f, "Float({})", x),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Tuple(items) => f.debug_tuple("Tuple").field(items).finish(),
            Value::Map(map) => f.debug_tuple("Map").field(map).finish(),
            Value::Object(node) => write!(f, "Object({})", node.key()),
        }
    }
}

/// Renders the value in binding syntax, so operative configs reparse.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", Literal::Float(*x)),
            Value::Str(s) => write_quoted(f, s),
            Value::List(items) => {
                write!(f, "[")?;
                write_items(f, items)?;
                write!(f, "]")
            }
            Value::Tuple(items) => {
                write!(f, "(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write_quoted(f, key)?;
                    write!(f, ": {}", value)?;
                }
                write!(f, "}}")
            }
            Value::Object(node) => {
                let key = node.key();
                if key.scope.is_root() {
                    write!(f, "@{}()", key.symbol)
                } else {
                    write!(f, "@{}/{}()", key.scope, key.symbol)
                }
            }
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// Final parameter values handed to a constructor, in signature order.
///
/// The accessors return `Result<_, String>` so constructor callbacks can use
/// `?` directly; the message becomes the `Constructor` error text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: IndexMap<String, Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn require(&self, name: &str) -> Result<&Value, String> {
        self.values
            .get(name)
            .ok_or_else(|| format!("no parameter `{}`", name))
    }

    pub fn int(&self, name: &str) -> Result<i64, String> {
        let value = self.require(name)?;
        value.as_int().ok_or_else(|| mismatch(name, "int", value))
    }

    pub fn float(&self, name: &str) -> Result<f64, String> {
        let value = self.require(name)?;
        value.as_float().ok_or_else(|| mismatch(name, "float", value))
    }

    pub fn bool(&self, name: &str) -> Result<bool, String> {
        let value = self.require(name)?;
        value.as_bool().ok_or_else(|| mismatch(name, "bool", value))
    }

    pub fn string(&self, name: &str) -> Result<&str, String> {
        let value = self.require(name)?;
        value.as_str().ok_or_else(|| mismatch(name, "string", value))
    }

    /// Borrow the instance a reference parameter was constructed into.
    pub fn object<T: Any>(&self, name: &str) -> Result<&T, String> {
        let value = self.require(name)?;
        value
            .as_node()
            .and_then(|node| node.instance::<T>())
            .ok_or_else(|| mismatch(name, std::any::type_name::<T>(), value))
    }
}

fn mismatch(name: &str, expected: &str, found: &Value) -> String {
    format!(
        "parameter `{}` should be {}, found {}",
        name,
        expected,
        found.type_name()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_reparses_as_gin() {
        let mut map = IndexMap::new();
        map.insert("inputs".to_string(), Value::Int(512));
        map.insert("name".to_string(), Value::from("c4"));
        let value = Value::List(vec![
            Value::Tuple(vec![Value::Float(0.5)]),
            Value::Map(map),
            Value::None,
            Value::Bool(true),
        ]);
        assert_eq!(
            value.to_string(),
            "[(0.5,), {'inputs': 512, 'name': 'c4'}, None, True]"
        );
    }

    #[test]
    fn test_whole_floats_keep_a_decimal_point() {
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
    }

    #[test]
    fn test_params_accessors() {
        let mut params = Params::new();
        params.insert("steps", Value::Int(10));
        params.insert("rate", Value::Int(1));
        params.insert("name", Value::from("adafactor"));

        assert_eq!(params.int("steps"), Ok(10));
        assert_eq!(params.float("rate"), Ok(1.0));
        assert_eq!(params.string("name"), Ok("adafactor"));
        assert!(params.bool("steps").unwrap_err().contains("should be bool"));
        assert!(params.int("missing").unwrap_err().contains("no parameter"));
    }
}
