//! Tree node: map, sequence or scalar.

use std::fmt;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_yaml::Value;

use crate::domain::error::{DomainError, DomainResult};

/// Mapping storage. Insertion order is kept so that traversal follows
/// source-merge order.
pub type NodeMap = IndexMap<String, Node>;

/// Leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    /// Integers above `i64::MAX`.
    UInt(u64),
    Float(f64),
    Str(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::UInt(u) => write!(f, "{u}"),
            Scalar::Float(x) => fmt_float(*x, f),
            Scalar::Str(s) => write!(f, "{s}"),
        }
    }
}

/// Whole floats keep their fraction (`1.0`); non-finite values use the
/// YAML spellings.
fn fmt_float(x: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if x.is_nan() {
        f.write_str(".nan")
    } else if x.is_infinite() {
        f.write_str(if x > 0.0 { ".inf" } else { "-.inf" })
    } else {
        write!(f, "{x:?}")
    }
}

/// The tree's unit of storage.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Map(NodeMap),
    Seq(Vec<Node>),
    Scalar(Scalar),
}

impl Default for Node {
    fn default() -> Self {
        Node::Map(NodeMap::new())
    }
}

impl Node {
    pub fn null() -> Self {
        Node::Scalar(Scalar::Null)
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Node::Map(_))
    }

    pub fn is_seq(&self) -> bool {
        matches!(self, Node::Seq(_))
    }

    pub fn is_container(&self) -> bool {
        !matches!(self, Node::Scalar(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Scalar(Scalar::Null))
    }

    pub fn as_map(&self) -> Option<&NodeMap> {
        match self {
            Node::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Node]> {
        match self {
            Node::Seq(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Node::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Scalar(Scalar::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Node::Scalar(Scalar::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Node::Scalar(Scalar::Int(i)) => u64::try_from(*i).ok(),
            Node::Scalar(Scalar::UInt(u)) => Some(*u),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Node::Scalar(Scalar::Float(x)) => Some(*x),
            Node::Scalar(Scalar::Int(i)) => Some(*i as f64),
            Node::Scalar(Scalar::UInt(u)) => Some(*u as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Node::Scalar(Scalar::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Direct child by key (maps) or index (sequences).
    pub fn child(&self, segment: &str) -> Option<&Node> {
        match self {
            Node::Map(m) => m.get(segment),
            Node::Seq(s) => crate::domain::path::as_index(segment).and_then(|i| s.get(i)),
            Node::Scalar(_) => None,
        }
    }

    pub fn child_mut(&mut self, segment: &str) -> Option<&mut Node> {
        match self {
            Node::Map(m) => m.get_mut(segment),
            Node::Seq(s) => crate::domain::path::as_index(segment).and_then(|i| s.get_mut(i)),
            Node::Scalar(_) => None,
        }
    }

    /// Keys of a map node (empty for anything else).
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.as_map()
            .into_iter()
            .flat_map(|m| m.keys().map(String::as_str))
    }

    /// Values of a map node, or the elements of a sequence.
    pub fn values(&self) -> Box<dyn Iterator<Item = &Node> + '_> {
        match self {
            Node::Map(m) => Box::new(m.values()),
            Node::Seq(s) => Box::new(s.iter()),
            Node::Scalar(_) => Box::new(std::iter::empty()),
        }
    }

    /// Key/value pairs of a map node.
    pub fn items(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.as_map()
            .into_iter()
            .flat_map(|m| m.iter().map(|(k, v)| (k.as_str(), v)))
    }

    /// Dotted path of the map holding the first empty key, if any.
    ///
    /// An empty key has no dotted path of its own, so trees refuse it.
    pub fn empty_key_parent(&self) -> Option<String> {
        empty_key_parent(self, "")
    }

    /// Deep right-biased merge: map into map recurses, anything else replaces.
    pub fn merge(&mut self, incoming: Node) {
        match (self, incoming) {
            (Node::Map(base), Node::Map(overlay)) => {
                for (key, value) in overlay {
                    match base.get_mut(&key) {
                        Some(existing) => existing.merge(value),
                        None => {
                            base.insert(key, value);
                        }
                    }
                }
            }
            (slot, other) => *slot = other,
        }
    }

    /// Render as a YAML value.
    pub fn to_yaml_value(&self) -> Value {
        match self {
            Node::Map(m) => {
                let mut mapping = serde_yaml::Mapping::new();
                for (k, v) in m {
                    mapping.insert(Value::String(k.clone()), v.to_yaml_value());
                }
                Value::Mapping(mapping)
            }
            Node::Seq(s) => Value::Sequence(s.iter().map(Node::to_yaml_value).collect()),
            Node::Scalar(Scalar::Null) => Value::Null,
            Node::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
            Node::Scalar(Scalar::Int(i)) => Value::Number((*i).into()),
            Node::Scalar(Scalar::UInt(u)) => Value::Number((*u).into()),
            Node::Scalar(Scalar::Float(x)) => Value::Number((*x).into()),
            Node::Scalar(Scalar::Str(s)) => Value::String(s.clone()),
        }
    }

    /// Render as YAML text.
    pub fn to_yaml_string(&self) -> DomainResult<String> {
        serde_yaml::to_string(&self.to_yaml_value()).map_err(|e| DomainError::SourceFormat {
            source_name: "render".to_string(),
            message: e.to_string(),
        })
    }

    /// Build a node from a parsed YAML value.
    ///
    /// Non-string map keys are rendered to strings; tags are dropped.
    pub fn from_yaml_value(value: Value) -> DomainResult<Node> {
        Ok(match value {
            Value::Null => Node::null(),
            Value::Bool(b) => Node::Scalar(Scalar::Bool(b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Node::Scalar(Scalar::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Node::Scalar(Scalar::UInt(u))
                } else {
                    Node::Scalar(Scalar::Float(n.as_f64().unwrap_or(f64::NAN)))
                }
            }
            Value::String(s) => Node::Scalar(Scalar::Str(s)),
            Value::Sequence(items) => Node::Seq(
                items
                    .into_iter()
                    .map(Node::from_yaml_value)
                    .collect::<DomainResult<_>>()?,
            ),
            Value::Mapping(mapping) => {
                let mut map = NodeMap::with_capacity(mapping.len());
                for (k, v) in mapping {
                    map.insert(key_to_string(k)?, Node::from_yaml_value(v)?);
                }
                Node::Map(map)
            }
            Value::Tagged(tagged) => Node::from_yaml_value(tagged.value)?,
        })
    }

    /// Deserialize this node into a typed model.
    ///
    /// `path` and the target type name end up in the error.
    pub fn to<T: DeserializeOwned>(&self, path: &str) -> DomainResult<T> {
        serde_yaml::from_value(self.to_yaml_value()).map_err(|e| DomainError::ModelConversion {
            type_name: std::any::type_name::<T>().to_string(),
            path: path.to_string(),
            message: e.to_string(),
        })
    }
}

fn empty_key_parent(node: &Node, prefix: &str) -> Option<String> {
    match node {
        Node::Map(map) => map.iter().find_map(|(key, child)| {
            if key.is_empty() {
                Some(prefix.to_string())
            } else {
                empty_key_parent(child, &crate::domain::path::join(prefix, key))
            }
        }),
        Node::Seq(items) => items.iter().enumerate().find_map(|(i, child)| {
            empty_key_parent(child, &crate::domain::path::join(prefix, &i.to_string()))
        }),
        Node::Scalar(_) => None,
    }
}

fn key_to_string(key: Value) -> DomainResult<String> {
    match key {
        Value::String(s) => Ok(s),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok("null".to_string()),
        Value::Tagged(tagged) => key_to_string(tagged.value),
        other => Err(DomainError::SourceFormat {
            source_name: "mapping".to_string(),
            message: format!("unsupported mapping key: {other:?}"),
        }),
    }
}

impl From<Scalar> for Node {
    fn from(s: Scalar) -> Self {
        Node::Scalar(s)
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Scalar(Scalar::Str(s.to_string()))
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::Scalar(Scalar::Str(s))
    }
}

impl From<i64> for Node {
    fn from(i: i64) -> Self {
        Node::Scalar(Scalar::Int(i))
    }
}

impl From<i32> for Node {
    fn from(i: i32) -> Self {
        Node::Scalar(Scalar::Int(i64::from(i)))
    }
}

impl From<u64> for Node {
    fn from(u: u64) -> Self {
        i64::try_from(u).map_or(Node::Scalar(Scalar::UInt(u)), |i| Node::Scalar(Scalar::Int(i)))
    }
}

impl From<f64> for Node {
    fn from(x: f64) -> Self {
        Node::Scalar(Scalar::Float(x))
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Self {
        Node::Scalar(Scalar::Bool(b))
    }
}

impl<T: Into<Node>> From<Vec<T>> for Node {
    fn from(items: Vec<T>) -> Self {
        Node::Seq(items.into_iter().map(Into::into).collect())
    }
}

impl From<NodeMap> for Node {
    fn from(map: NodeMap) -> Self {
        Node::Map(map)
    }
}

impl<K: Into<String>, V: Into<Node>, const N: usize> From<[(K, V); N]> for Node {
    fn from(pairs: [(K, V); N]) -> Self {
        Node::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl PartialEq<&str> for Node {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

impl PartialEq<i64> for Node {
    fn eq(&self, other: &i64) -> bool {
        self.as_i64() == Some(*other)
    }
}

impl PartialEq<i32> for Node {
    fn eq(&self, other: &i32) -> bool {
        self.as_i64() == Some(i64::from(*other))
    }
}

impl PartialEq<bool> for Node {
    fn eq(&self, other: &bool) -> bool {
        self.as_bool() == Some(*other)
    }
}
