//! Recursive ordered string-keyed mapping with structure-preserving bulk
//! operations.
//!
//! Leaves are a closed tagged variant ([`Value`]): arrays, scalars,
//! sequences, or nested containers. Keys are canonically ordered and unique
//! per level; every node is addressable by a dot-delimited key-chain.

pub(crate) mod map;
mod ops;

pub use map::{multi_map, MapPolicy};

use std::collections::BTreeMap;
use std::fmt;

use crate::array::Array;
use crate::error::{Error, Result};

/// Scalar leaf value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(v) => write!(f, "{v}"),
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Float(v) => write!(f, "{v}"),
        }
    }
}

/// One node of a container tree.
///
/// Traversal code matches on this exhaustively; there is no open-ended
/// duck-typing anywhere in the recursion.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Array(Array),
    Scalar(Scalar),
    Seq(Vec<Value>),
    Container(Container),
}

impl Value {
    /// `true` for nodes that terminate recursion under default policies.
    pub fn is_leaf(&self) -> bool {
        !matches!(self, Value::Container(_))
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Value::Container(container) => Some(container),
            _ => None,
        }
    }
}

impl From<Array> for Value {
    fn from(array: Array) -> Self {
        Value::Array(array)
    }
}

impl From<&Array> for Value {
    fn from(array: &Array) -> Self {
        Value::Array(array.clone())
    }
}

impl From<Container> for Value {
    fn from(container: Container) -> Self {
        Value::Container(container)
    }
}

impl From<&Container> for Value {
    fn from(container: &Container) -> Self {
        Value::Container(container.clone())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Scalar(Scalar::Float(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Scalar(Scalar::Int(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Scalar(Scalar::Bool(value))
    }
}

/// Recursive ordered mapping from string key to [`Value`].
///
/// Keys are kept in canonical (sorted) order, which makes traversal
/// deterministic and display stable; equality is structural.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Container {
    entries: BTreeMap<String, Value>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a container from `(key, value)` pairs; later duplicates
    /// overwrite earlier ones.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut container = Container::new();
        for (key, value) in pairs {
            container.insert(key, value);
        }
        container
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Key sets of two containers compared level-locally.
    pub(crate) fn same_keys(&self, other: &Container) -> bool {
        self.len() == other.len() && self.keys().zip(other.keys()).all(|(a, b)| a == b)
    }

    /// Enumerates every leaf key-chain in depth-first key order.
    ///
    /// Sequences count as single leaves here; index recursion only happens
    /// under a `map_sequences` policy.
    pub fn key_chains(&self) -> Vec<String> {
        let mut chains = Vec::new();
        self.collect_key_chains("", &mut chains);
        chains
    }

    fn collect_key_chains(&self, prefix: &str, chains: &mut Vec<String>) {
        for (key, value) in &self.entries {
            let chain = join_chain(prefix, key);
            match value {
                Value::Container(sub) => sub.collect_key_chains(&chain, chains),
                _ => chains.push(chain),
            }
        }
    }

    /// Resolves a dot-delimited key-chain to the node it addresses.
    pub fn at_key_chain(&self, chain: &str) -> Result<&Value> {
        let mut segments = chain.split('.');
        let first = segments
            .next()
            .ok_or_else(|| Error::key_chain_mismatch(chain, "container"))?;
        let mut node = self
            .entries
            .get(first)
            .ok_or_else(|| Error::key_chain_mismatch(chain, "container"))?;
        for segment in segments {
            match node {
                Value::Container(sub) => {
                    node = sub
                        .entries
                        .get(segment)
                        .ok_or_else(|| Error::key_chain_mismatch(chain, "container"))?;
                }
                _ => return Err(Error::key_chain_mismatch(chain, "container")),
            }
        }
        Ok(node)
    }

    pub fn at_key_chain_mut(&mut self, chain: &str) -> Result<&mut Value> {
        let mut segments = chain.split('.');
        let first = segments
            .next()
            .ok_or_else(|| Error::key_chain_mismatch(chain, "container"))?;
        let mut node = self
            .entries
            .get_mut(first)
            .ok_or_else(|| Error::key_chain_mismatch(chain, "container"))?;
        for segment in segments {
            match node {
                Value::Container(sub) => {
                    node = sub
                        .entries
                        .get_mut(segment)
                        .ok_or_else(|| Error::key_chain_mismatch(chain, "container"))?;
                }
                _ => return Err(Error::key_chain_mismatch(chain, "container")),
            }
        }
        Ok(node)
    }

    /// Sets the node at a key-chain, creating intermediate containers.
    ///
    /// Fails when an intermediate segment addresses an existing non-container
    /// node.
    pub fn set_at_key_chain(&mut self, chain: &str, value: impl Into<Value>) -> Result<()> {
        let segments: Vec<&str> = chain.split('.').collect();
        let (last, path) = segments
            .split_last()
            .ok_or_else(|| Error::invalid_value("empty key chain"))?;
        let mut node = self;
        for segment in path {
            let entry = node
                .entries
                .entry((*segment).to_string())
                .or_insert_with(|| Value::Container(Container::new()));
            match entry {
                Value::Container(sub) => node = sub,
                _ => return Err(Error::key_chain_mismatch(chain, "non-container node")),
            }
        }
        node.entries.insert((*last).to_string(), value.into());
        Ok(())
    }

    /// Removes the node at a key-chain, dropping subtrees emptied by the
    /// removal. Unknown chains are a no-op.
    pub fn prune_key_chain(&mut self, chain: &str) {
        let segments: Vec<&str> = chain.split('.').collect();
        self.prune_segments(&segments);
    }

    fn prune_segments(&mut self, segments: &[&str]) {
        match segments {
            [] => {}
            [last] => {
                self.entries.remove(*last);
            }
            [first, rest @ ..] => {
                if let Some(Value::Container(sub)) = self.entries.get_mut(*first) {
                    sub.prune_segments(rest);
                    if sub.is_empty() {
                        self.entries.remove(*first);
                    }
                }
            }
        }
    }

    /// Flattens to `(key-chain, leaf)` pairs in depth-first key order.
    pub fn flatten(&self) -> Vec<(String, Value)> {
        let mut out = Vec::new();
        for chain in self.key_chains() {
            if let Ok(value) = self.at_key_chain(&chain) {
                out.push((chain, value.clone()));
            }
        }
        out
    }

    /// Rebuilds a container from flattened `(key-chain, leaf)` pairs.
    pub fn from_flat<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut container = Container::new();
        for (chain, value) in pairs {
            container.set_at_key_chain(&chain, value)?;
        }
        Ok(container)
    }

    /// Recursive in-place merge: `other`'s entries overwrite or extend this
    /// container's; nested containers merge rather than replace.
    pub fn merge_in_place(&mut self, other: &Container) {
        for (key, value) in other.iter() {
            match (self.entries.get_mut(key), value) {
                (Some(Value::Container(dst)), Value::Container(src)) => dst.merge_in_place(src),
                (_, value) => {
                    self.entries.insert(key.clone(), value.clone());
                }
            }
        }
    }

    /// Builds a container from a nested native mapping in JSON form.
    ///
    /// Objects become containers, arrays become sequences, numbers and
    /// booleans become scalars. Strings and nulls have no leaf
    /// representation and are rejected.
    pub fn from_json(value: &serde_json::Value) -> Result<Container> {
        match json_to_value(value)? {
            Value::Container(container) => Ok(container),
            _ => Err(Error::invalid_value("top-level JSON value must be an object")),
        }
    }

    /// Converts a scalar/sequence tree back to JSON. Array leaves have no
    /// canonical JSON form and are rejected.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        value_to_json(&Value::Container(self.clone()))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Container {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Container::from_pairs(iter)
    }
}

pub(crate) fn join_chain(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn json_to_value(value: &serde_json::Value) -> Result<Value> {
    match value {
        serde_json::Value::Bool(v) => Ok(Value::Scalar(Scalar::Bool(*v))),
        serde_json::Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                Ok(Value::Scalar(Scalar::Int(v)))
            } else if let Some(v) = n.as_f64() {
                Ok(Value::Scalar(Scalar::Float(v)))
            } else {
                Err(Error::invalid_value(format!("unrepresentable number {n}")))
            }
        }
        serde_json::Value::Array(items) => Ok(Value::Seq(
            items.iter().map(json_to_value).collect::<Result<_>>()?,
        )),
        serde_json::Value::Object(map) => {
            let mut container = Container::new();
            for (key, item) in map {
                container.insert(key.clone(), json_to_value(item)?);
            }
            Ok(Value::Container(container))
        }
        serde_json::Value::Null => Err(Error::invalid_value("null has no leaf representation")),
        serde_json::Value::String(_) => {
            Err(Error::invalid_value("strings have no leaf representation"))
        }
    }
}

fn value_to_json(value: &Value) -> Result<serde_json::Value> {
    match value {
        Value::Scalar(Scalar::Bool(v)) => Ok(serde_json::Value::Bool(*v)),
        Value::Scalar(Scalar::Int(v)) => Ok(serde_json::Value::from(*v)),
        Value::Scalar(Scalar::Float(v)) => serde_json::Number::from_f64(*v)
            .map(serde_json::Value::Number)
            .ok_or_else(|| Error::invalid_value(format!("non-finite float {v}"))),
        Value::Seq(items) => Ok(serde_json::Value::Array(
            items.iter().map(value_to_json).collect::<Result<_>>()?,
        )),
        Value::Container(container) => {
            let mut map = serde_json::Map::new();
            for (key, item) in container.iter() {
                map.insert(key.clone(), value_to_json(item)?);
            }
            Ok(serde_json::Value::Object(map))
        }
        Value::Array(_) => Err(Error::invalid_value(
            "array leaves have no canonical JSON form",
        )),
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_container(self, f, 0)
    }
}

fn fmt_container(container: &Container, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
    let pad = "    ".repeat(indent);
    writeln!(f, "{{")?;
    for (key, value) in container.iter() {
        write!(f, "{pad}    {key}: ")?;
        fmt_value(value, f, indent + 1)?;
        writeln!(f, ",")?;
    }
    write!(f, "{pad}}}")
}

fn fmt_value(value: &Value, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
    match value {
        Value::Array(array) => write!(
            f,
            "{}{:?} on {}",
            array.dtype(),
            array.shape().dims(),
            array.backend().backend_name()
        ),
        Value::Scalar(scalar) => write!(f, "{scalar}"),
        Value::Seq(items) => {
            write!(f, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                fmt_value(item, f, indent)?;
            }
            write!(f, "]")
        }
        Value::Container(sub) => fmt_container(sub, f, indent),
    }
}
