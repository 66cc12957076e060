//! Top-level dispatch functions.
//!
//! Each function mirrors a same-named [`Array`]/[`Container`] method:
//! container inputs are redirected into the multi-map machinery, array
//! inputs into the wrapper funnel, with identical semantics either way.

use crate::array::Array;
use crate::backend::spec::{
    BinaryOp, ClipSpec, ClipVectorNormSpec, ConcatSpec, ExpandDimsSpec, FlipSpec, GatherSpec,
    OpCall, PermuteDimsSpec, ReshapeSpec, RollSpec, SqueezeSpec, StableDivideSpec, StackSpec,
    UnaryOp, ZeroPadSpec,
};
use crate::container::map::{apply_op_to_leaves, multi_map_op};
use crate::container::{Container, MapPolicy, Value};
use crate::error::{Error, Result};

/// Input accepted by every top-level dispatch function.
pub enum OpInput {
    Array(Array),
    Container(Container),
}

impl From<Array> for OpInput {
    fn from(array: Array) -> Self {
        OpInput::Array(array)
    }
}

impl From<&Array> for OpInput {
    fn from(array: &Array) -> Self {
        OpInput::Array(array.clone())
    }
}

impl From<Container> for OpInput {
    fn from(container: Container) -> Self {
        OpInput::Container(container)
    }
}

impl From<&Container> for OpInput {
    fn from(container: &Container) -> Self {
        OpInput::Container(container.clone())
    }
}

fn unary(op: &OpCall, x: OpInput) -> Result<Value> {
    match x {
        OpInput::Array(array) => Ok(Value::Array(Array::eval(op, &[&array], None)?)),
        OpInput::Container(container) => Ok(Value::Container(multi_map_op(
            op,
            &[Value::Container(container)],
            &MapPolicy::default(),
            None,
        )?)),
    }
}

fn binary(op: &OpCall, x: Value, y: Value) -> Result<Value> {
    if matches!(x, Value::Container(_)) || matches!(y, Value::Container(_)) {
        return Ok(Value::Container(multi_map_op(
            op,
            &[x, y],
            &MapPolicy::default(),
            None,
        )?));
    }
    if !matches!(x, Value::Array(_)) && !matches!(y, Value::Array(_)) {
        return Err(Error::invalid_value(
            "at least one operand must be an array or container",
        ));
    }
    apply_op_to_leaves(op, &[&x, &y])
}

macro_rules! top_level_binary {
    ($(($name:ident, $op:ident)),* $(,)?) => {
        $(
            pub fn $name(x: impl Into<Value>, y: impl Into<Value>) -> Result<Value> {
                binary(&OpCall::Binary(BinaryOp::$op), x.into(), y.into())
            }
        )*
    };
}

top_level_binary!(
    (add, Add),
    (sub, Sub),
    (mul, Mul),
    (div, Div),
    (minimum, Minimum),
    (maximum, Maximum),
);

pub fn neg(x: impl Into<OpInput>) -> Result<Value> {
    unary(&OpCall::Unary(UnaryOp::Neg), x.into())
}

pub fn abs(x: impl Into<OpInput>) -> Result<Value> {
    unary(&OpCall::Unary(UnaryOp::Abs), x.into())
}

/// Numerically-stable division: `x / (y + min_denominator)`.
pub fn stable_divide(
    x: impl Into<Value>,
    y: impl Into<Value>,
    min_denominator: Option<f64>,
) -> Result<Value> {
    let spec = match min_denominator {
        Some(min_denominator) => StableDivideSpec { min_denominator },
        None => StableDivideSpec::default(),
    };
    binary(&OpCall::StableDivide(spec), x.into(), y.into())
}

pub fn clip(x: impl Into<OpInput>, min: f64, max: f64) -> Result<Value> {
    unary(&OpCall::Clip(ClipSpec { min, max }), x.into())
}

pub fn clip_vector_norm(x: impl Into<OpInput>, max_norm: f64, p: f64) -> Result<Value> {
    unary(
        &OpCall::ClipVectorNorm(ClipVectorNormSpec { max_norm, p }),
        x.into(),
    )
}

pub fn reshape(x: impl Into<OpInput>, new_shape: &[i64]) -> Result<Value> {
    unary(
        &OpCall::Reshape(ReshapeSpec {
            new_shape: new_shape.to_vec(),
        }),
        x.into(),
    )
}

pub fn expand_dims(x: impl Into<OpInput>, axis: i64) -> Result<Value> {
    unary(&OpCall::ExpandDims(ExpandDimsSpec { axis }), x.into())
}

pub fn squeeze(x: impl Into<OpInput>, axis: Option<i64>) -> Result<Value> {
    unary(&OpCall::Squeeze(SqueezeSpec { axis }), x.into())
}

pub fn permute_dims(x: impl Into<OpInput>, perm: &[usize]) -> Result<Value> {
    unary(
        &OpCall::PermuteDims(PermuteDimsSpec {
            perm: perm.to_vec(),
        }),
        x.into(),
    )
}

pub fn flip(x: impl Into<OpInput>, axes: Option<&[i64]>) -> Result<Value> {
    unary(
        &OpCall::Flip(FlipSpec {
            axes: axes.map(<[i64]>::to_vec),
        }),
        x.into(),
    )
}

pub fn roll(x: impl Into<OpInput>, shifts: &[i64], axes: Option<&[i64]>) -> Result<Value> {
    unary(
        &OpCall::Roll(RollSpec {
            shifts: shifts.to_vec(),
            axes: axes.map(<[i64]>::to_vec),
        }),
        x.into(),
    )
}

pub fn zero_pad(x: impl Into<OpInput>, pad_widths: &[(usize, usize)]) -> Result<Value> {
    unary(
        &OpCall::ZeroPad(ZeroPadSpec {
            pad_widths: pad_widths.to_vec(),
        }),
        x.into(),
    )
}

pub fn gather(x: impl Into<Value>, indices: impl Into<Value>, axis: i64) -> Result<Value> {
    binary(&OpCall::Gather(GatherSpec { axis }), x.into(), indices.into())
}

/// Concatenates inputs along an existing axis; any container operand turns
/// the whole call into a per-key-chain concat.
pub fn concat(xs: &[Value], axis: i64) -> Result<Value> {
    nary(&OpCall::Concat(ConcatSpec { axis }), xs)
}

/// Stacks inputs along a fresh axis.
pub fn stack(xs: &[Value], axis: i64) -> Result<Value> {
    nary(&OpCall::Stack(StackSpec { axis }), xs)
}

fn nary(op: &OpCall, xs: &[Value]) -> Result<Value> {
    if xs.iter().any(|v| matches!(v, Value::Container(_))) {
        return Ok(Value::Container(multi_map_op(
            op,
            xs,
            &MapPolicy::default(),
            None,
        )?));
    }
    let refs: Vec<&Value> = xs.iter().collect();
    apply_op_to_leaves(op, &refs)
}

/// Structural and value equality across arrays, scalars, sequences, and
/// containers.
pub fn all_equal(x: &Value, y: &Value) -> bool {
    x == y
}
