//! Operation surface of [`Array`].
//!
//! Every method forwards to the same-named backend operation through
//! [`Array::eval`]; `*_into` variants write into an existing array and
//! return an alias of it.

use super::Array;
use crate::backend::spec::{
    BinaryOp, ClipSpec, ClipVectorNormSpec, ConcatSpec, ExpandDimsSpec, FlipSpec, GatherSpec,
    OpCall, PermuteDimsSpec, ReshapeSpec, RollSpec, SqueezeSpec, StableDivideSpec, StackSpec,
    UnaryOp, ZeroPadSpec,
};
use crate::error::Result;

macro_rules! binary_ops {
    ($(($method:ident, $into:ident, $op:ident)),* $(,)?) => {
        $(
            pub fn $method(&self, rhs: &Array) -> Result<Array> {
                Array::eval(&OpCall::Binary(BinaryOp::$op), &[self, rhs], None)
            }

            pub fn $into(&self, rhs: &Array, out: &mut Array) -> Result<Array> {
                Array::eval(&OpCall::Binary(BinaryOp::$op), &[self, rhs], Some(out))
            }
        )*
    };
}

impl Array {
    binary_ops!(
        (add, add_into, Add),
        (sub, sub_into, Sub),
        (mul, mul_into, Mul),
        (div, div_into, Div),
        (minimum, minimum_into, Minimum),
        (maximum, maximum_into, Maximum),
    );

    pub fn neg(&self) -> Result<Array> {
        Array::eval(&OpCall::Unary(UnaryOp::Neg), &[self], None)
    }

    pub fn abs(&self) -> Result<Array> {
        Array::eval(&OpCall::Unary(UnaryOp::Abs), &[self], None)
    }

    /// Numerically-stable division: `self / (rhs + min_denominator)`.
    pub fn stable_divide(&self, rhs: &Array, min_denominator: Option<f64>) -> Result<Array> {
        let spec = match min_denominator {
            Some(min_denominator) => StableDivideSpec { min_denominator },
            None => StableDivideSpec::default(),
        };
        Array::eval(&OpCall::StableDivide(spec), &[self, rhs], None)
    }

    /// Clamps every element into `[min, max]`.
    pub fn clip(&self, min: f64, max: f64) -> Result<Array> {
        Array::eval(&OpCall::Clip(ClipSpec { min, max }), &[self], None)
    }

    pub fn clip_into(&self, min: f64, max: f64, out: &mut Array) -> Result<Array> {
        Array::eval(&OpCall::Clip(ClipSpec { min, max }), &[self], Some(out))
    }

    /// Downscales the array so its p-norm does not exceed `max_norm`.
    pub fn clip_vector_norm(&self, max_norm: f64, p: f64) -> Result<Array> {
        Array::eval(
            &OpCall::ClipVectorNorm(ClipVectorNormSpec { max_norm, p }),
            &[self],
            None,
        )
    }

    pub fn reshape(&self, new_shape: &[i64]) -> Result<Array> {
        Array::eval(
            &OpCall::Reshape(ReshapeSpec {
                new_shape: new_shape.to_vec(),
            }),
            &[self],
            None,
        )
    }

    pub fn expand_dims(&self, axis: i64) -> Result<Array> {
        Array::eval(&OpCall::ExpandDims(ExpandDimsSpec { axis }), &[self], None)
    }

    pub fn squeeze(&self, axis: Option<i64>) -> Result<Array> {
        Array::eval(&OpCall::Squeeze(SqueezeSpec { axis }), &[self], None)
    }

    pub fn permute_dims(&self, perm: &[usize]) -> Result<Array> {
        Array::eval(
            &OpCall::PermuteDims(PermuteDimsSpec {
                perm: perm.to_vec(),
            }),
            &[self],
            None,
        )
    }

    pub fn flip(&self, axes: Option<&[i64]>) -> Result<Array> {
        Array::eval(
            &OpCall::Flip(FlipSpec {
                axes: axes.map(<[i64]>::to_vec),
            }),
            &[self],
            None,
        )
    }

    /// Rolls elements along the given axes; with `axes: None` the single
    /// shift applies to the flattened array.
    pub fn roll(&self, shifts: &[i64], axes: Option<&[i64]>) -> Result<Array> {
        Array::eval(&roll_call(shifts, axes), &[self], None)
    }

    pub fn roll_into(
        &self,
        shifts: &[i64],
        axes: Option<&[i64]>,
        out: &mut Array,
    ) -> Result<Array> {
        Array::eval(&roll_call(shifts, axes), &[self], Some(out))
    }

    /// Pads each axis with zeros, `(before, after)` per axis.
    pub fn zero_pad(&self, pad_widths: &[(usize, usize)]) -> Result<Array> {
        Array::eval(
            &OpCall::ZeroPad(ZeroPadSpec {
                pad_widths: pad_widths.to_vec(),
            }),
            &[self],
            None,
        )
    }

    /// Gathers slices of `self` along `axis` at the given integer indices.
    pub fn gather(&self, indices: &Array, axis: i64) -> Result<Array> {
        Array::eval(&OpCall::Gather(GatherSpec { axis }), &[self, indices], None)
    }

    pub fn gather_into(&self, indices: &Array, axis: i64, out: &mut Array) -> Result<Array> {
        Array::eval(
            &OpCall::Gather(GatherSpec { axis }),
            &[self, indices],
            Some(out),
        )
    }

    /// Concatenates arrays along an existing axis.
    pub fn concat(arrays: &[&Array], axis: i64) -> Result<Array> {
        Array::eval(&OpCall::Concat(ConcatSpec { axis }), arrays, None)
    }

    /// Stacks arrays along a fresh axis.
    pub fn stack(arrays: &[&Array], axis: i64) -> Result<Array> {
        Array::eval(&OpCall::Stack(StackSpec { axis }), arrays, None)
    }
}

fn roll_call(shifts: &[i64], axes: Option<&[i64]>) -> OpCall {
    OpCall::Roll(RollSpec {
        shifts: shifts.to_vec(),
        axes: axes.map(<[i64]>::to_vec),
    })
}
