//! Structure-preserving traversal: `map`, `multi_map`, the static-method
//! funnel behind every container operation, and `out=` merging.
//!
//! Every call walks depth-first in key order. Each node resolves to exactly
//! one of: descend (nested container), apply (selected leaf), pass through
//! (unselected leaf), or prune (unselected leaf under a pruning policy).

use std::collections::BTreeSet;

use super::{join_chain, Container, Scalar, Value};
use crate::array::Array;
use crate::backend::spec::{DType, OpCall};
use crate::error::{Error, Result};

/// Key-chain selector controlling which leaves an operation touches.
#[derive(Debug, Clone)]
pub struct MapPolicy {
    /// Chains to act on (or to skip, per `to_apply`). `None` selects all.
    pub key_chains: Option<BTreeSet<String>>,
    /// With listed chains: `true` applies only to them, `false` to all
    /// chains except them.
    pub to_apply: bool,
    /// Drop unapplied leaves from the result instead of passing them
    /// through.
    pub prune_unapplied: bool,
    /// Recurse into sequence leaves, extending chains with element indices.
    pub map_sequences: bool,
}

impl MapPolicy {
    /// Selects every chain; applied leaves replace, others never occur.
    pub fn all() -> Self {
        MapPolicy {
            key_chains: None,
            to_apply: true,
            prune_unapplied: false,
            map_sequences: false,
        }
    }

    /// Acts only on the listed chains (and their subtrees).
    pub fn only<I, S>(chains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MapPolicy {
            key_chains: Some(chains.into_iter().map(Into::into).collect()),
            to_apply: true,
            ..MapPolicy::all()
        }
    }

    /// Acts on every chain except the listed ones (and their subtrees).
    pub fn except<I, S>(chains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MapPolicy {
            key_chains: Some(chains.into_iter().map(Into::into).collect()),
            to_apply: false,
            ..MapPolicy::all()
        }
    }

    pub fn prune(mut self) -> Self {
        self.prune_unapplied = true;
        self
    }

    pub fn map_sequences(mut self) -> Self {
        self.map_sequences = true;
        self
    }

    /// Whether the leaf at `chain` is selected for application.
    ///
    /// A listed chain matches the addressed node and everything below it.
    pub fn selects(&self, chain: &str) -> bool {
        let Some(listed) = &self.key_chains else {
            return true;
        };
        let hit = listed
            .iter()
            .any(|kc| chain == kc || chain.starts_with(&format!("{kc}.")));
        if self.to_apply {
            hit
        } else {
            !hit
        }
    }
}

impl Default for MapPolicy {
    fn default() -> Self {
        MapPolicy::all()
    }
}

impl Container {
    /// Produces a new container by transforming every selected leaf with
    /// `f(leaf, key_chain)`; unselected leaves pass through or are pruned
    /// per the policy.
    pub fn map<F>(&self, policy: &MapPolicy, f: &mut F) -> Result<Container>
    where
        F: FnMut(&Value, &str) -> Result<Value>,
    {
        map_node(self, "", policy, f)
    }
}

fn map_node<F>(container: &Container, prefix: &str, policy: &MapPolicy, f: &mut F) -> Result<Container>
where
    F: FnMut(&Value, &str) -> Result<Value>,
{
    let mut out = Container::new();
    for (key, value) in container.iter() {
        let chain = join_chain(prefix, key);
        match value {
            Value::Container(sub) => {
                let mapped = map_node(sub, &chain, policy, f)?;
                if policy.prune_unapplied && mapped.is_empty() && !sub.is_empty() {
                    continue;
                }
                out.insert(key.clone(), mapped);
            }
            Value::Seq(items) if policy.map_sequences => {
                if let Some(mapped) = map_seq(items, &chain, policy, f)? {
                    out.insert(key.clone(), mapped);
                }
            }
            leaf => {
                if policy.selects(&chain) {
                    out.insert(key.clone(), f(leaf, &chain)?);
                } else if !policy.prune_unapplied {
                    out.insert(key.clone(), leaf.clone());
                }
            }
        }
    }
    Ok(out)
}

fn map_seq<F>(
    items: &[Value],
    chain: &str,
    policy: &MapPolicy,
    f: &mut F,
) -> Result<Option<Value>>
where
    F: FnMut(&Value, &str) -> Result<Value>,
{
    let mut out = Vec::new();
    for (index, item) in items.iter().enumerate() {
        let item_chain = format!("{chain}.{index}");
        match item {
            Value::Container(sub) => {
                let mapped = map_node(sub, &item_chain, policy, f)?;
                if policy.prune_unapplied && mapped.is_empty() && !sub.is_empty() {
                    continue;
                }
                out.push(Value::Container(mapped));
            }
            Value::Seq(nested) => {
                if let Some(mapped) = map_seq(nested, &item_chain, policy, f)? {
                    out.push(mapped);
                }
            }
            leaf => {
                if policy.selects(&item_chain) {
                    out.push(f(leaf, &item_chain)?);
                } else if !policy.prune_unapplied {
                    out.push(leaf.clone());
                }
            }
        }
    }
    if policy.prune_unapplied && out.is_empty() && !items.is_empty() {
        Ok(None)
    } else {
        Ok(Some(Value::Seq(out)))
    }
}

/// Walks N structurally-aligned operands in lockstep, calling
/// `f(leaves, key_chain)` at every selected leaf position.
///
/// Non-container operands broadcast to every key-chain. Containers that
/// diverge in key structure fail with a structure mismatch; an operand list
/// without any container yields an empty container.
pub fn multi_map<F>(policy: &MapPolicy, operands: &[Value], f: &mut F) -> Result<Container>
where
    F: FnMut(&[&Value], &str) -> Result<Value>,
{
    if !operands
        .iter()
        .any(|v| matches!(v, Value::Container(_)))
    {
        return Ok(Container::new());
    }
    let refs: Vec<&Value> = operands.iter().collect();
    match multi_map_node(&refs, "", policy, f)? {
        Some(Value::Container(container)) => Ok(container),
        _ => Ok(Container::new()),
    }
}

fn multi_map_node<F>(
    operands: &[&Value],
    chain: &str,
    policy: &MapPolicy,
    f: &mut F,
) -> Result<Option<Value>>
where
    F: FnMut(&[&Value], &str) -> Result<Value>,
{
    let reference = operands
        .iter()
        .find_map(|v| v.as_container());

    if let Some(reference) = reference {
        for operand in operands {
            if let Value::Container(other) = operand {
                if !reference.same_keys(other) {
                    let at = if chain.is_empty() { "<root>" } else { chain };
                    return Err(Error::structure_mismatch(
                        at,
                        format!(
                            "keys {:?} vs {:?}",
                            reference.keys().collect::<Vec<_>>(),
                            other.keys().collect::<Vec<_>>()
                        ),
                    ));
                }
            }
        }
        let mut out = Container::new();
        for key in reference.keys() {
            let children: Vec<&Value> = operands
                .iter()
                .map(|operand| match operand {
                    Value::Container(sub) => sub.get(key).expect("aligned keys"),
                    leaf => *leaf,
                })
                .collect();
            let child_chain = join_chain(chain, key);
            if let Some(mapped) = multi_map_node(&children, &child_chain, policy, f)? {
                out.insert(key.clone(), mapped);
            }
        }
        if policy.prune_unapplied && out.is_empty() && !reference.is_empty() {
            return Ok(None);
        }
        return Ok(Some(Value::Container(out)));
    }

    if policy.map_sequences {
        if let Some(reference_len) = operands.iter().find_map(|v| match v {
            Value::Seq(items) => Some(items.len()),
            _ => None,
        }) {
            for operand in operands {
                if let Value::Seq(items) = operand {
                    if items.len() != reference_len {
                        let at = if chain.is_empty() { "<root>" } else { chain };
                        return Err(Error::structure_mismatch(
                            at,
                            format!(
                                "sequence lengths {} vs {}",
                                reference_len,
                                items.len()
                            ),
                        ));
                    }
                }
            }
            let mut out = Vec::new();
            for index in 0..reference_len {
                let children: Vec<&Value> = operands
                    .iter()
                    .map(|operand| match operand {
                        Value::Seq(items) => &items[index],
                        leaf => *leaf,
                    })
                    .collect();
                let item_chain = format!("{chain}.{index}");
                if let Some(mapped) = multi_map_node(&children, &item_chain, policy, f)? {
                    out.push(mapped);
                }
            }
            if policy.prune_unapplied && out.is_empty() && reference_len > 0 {
                return Ok(None);
            }
            return Ok(Some(Value::Seq(out)));
        }
    }

    // Leaf position.
    if policy.selects(chain) {
        Ok(Some(f(operands, chain)?))
    } else if policy.prune_unapplied {
        Ok(None)
    } else {
        Ok(Some(operands[0].clone()))
    }
}

/// The single funnel behind every container operation: walks the operand
/// forest, invokes `op` on each selected leaf alignment, and merges the
/// result into `out` when supplied.
pub(crate) fn multi_map_op(
    op: &OpCall,
    operands: &[Value],
    policy: &MapPolicy,
    out: Option<&mut Container>,
) -> Result<Container> {
    let mut leaf_fn =
        |leaves: &[&Value], _chain: &str| -> Result<Value> { apply_op_to_leaves(op, leaves) };
    let result = multi_map(policy, operands, &mut leaf_fn)?;
    handle_inplace(result, out)
}

/// Invokes `op` on one aligned leaf tuple.
///
/// The op applies whenever the tuple contains at least one array; scalar
/// operands are promoted to single-element arrays on that array's backend.
/// Tuples without any array pass through untouched, so heterogeneous
/// containers keep their non-array leaves.
pub(crate) fn apply_op_to_leaves(op: &OpCall, leaves: &[&Value]) -> Result<Value> {
    let Some(like) = leaves.iter().find_map(|v| v.as_array()).cloned() else {
        return match leaves.first() {
            Some(leaf) => Ok((*leaf).clone()),
            None => Err(Error::invalid_value("no operands")),
        };
    };

    let mut arrays: Vec<Array> = Vec::with_capacity(leaves.len());
    for leaf in leaves {
        match leaf {
            Value::Array(array) => arrays.push(array.clone()),
            Value::Scalar(scalar) => arrays.push(scalar_to_array(scalar, &like)?),
            Value::Seq(_) | Value::Container(_) => {
                return Err(Error::invalid_value(
                    "nested value used as an operation argument",
                ))
            }
        }
    }
    let refs: Vec<&Array> = arrays.iter().collect();
    Ok(Value::Array(Array::eval(op, &refs, None)?))
}

/// Promotes a scalar leaf to a single-element array aligned with `like`'s
/// backend and dtype kind.
pub(crate) fn scalar_to_array(scalar: &Scalar, like: &Array) -> Result<Array> {
    let backend = like.backend();
    let (dtype, value) = match scalar {
        Scalar::Bool(v) => (DType::Bool, f64::from(u8::from(*v))),
        Scalar::Int(v) => {
            let dtype = if like.dtype().is_int() || like.dtype().is_float() {
                like.dtype()
            } else {
                backend.default_int_dtype()
            };
            (dtype, *v as f64)
        }
        Scalar::Float(v) => {
            let dtype = if like.dtype().is_float() {
                like.dtype()
            } else {
                backend.default_float_dtype()
            };
            (dtype, *v)
        }
    };
    Array::scalar_on(backend, dtype, value)
}

/// Merges `result` into an optional `out` target.
///
/// With no target, `result` is returned unchanged. Otherwise every leaf of
/// `out` is overwritten in place with the leaf `result` holds at the same
/// key-chain, and an alias of `out` is returned. `result` must cover every
/// chain of `out`.
pub(crate) fn handle_inplace(result: Container, out: Option<&mut Container>) -> Result<Container> {
    let Some(target) = out else {
        return Ok(result);
    };
    for chain in target.key_chains() {
        let replacement = result
            .at_key_chain(&chain)
            .map_err(|_| Error::key_chain_mismatch(&chain, "result container"))?
            .clone();
        let slot = target.at_key_chain_mut(&chain)?;
        match (slot, replacement) {
            (Value::Array(dst), Value::Array(src)) => dst.assign(&src)?,
            (slot, replacement) => *slot = replacement,
        }
    }
    Ok(target.clone())
}
