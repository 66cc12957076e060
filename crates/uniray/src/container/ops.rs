//! Operation surface of [`Container`].
//!
//! Every method pairs an instance form with a `static_*` form carrying the
//! full key-chain selector and `out=` target; both route through the
//! [`multi_map_op`] funnel, so `c.op(...)` and `Container::static_op(c, ...)`
//! are interchangeable. Methods mirror the [`crate::Array`] surface
//! name-for-name.

use super::map::{multi_map_op, MapPolicy};
use super::{Container, Value};
use crate::backend::spec::{
    BinaryOp, ClipSpec, ClipVectorNormSpec, ConcatSpec, ExpandDimsSpec, FlipSpec, GatherSpec,
    OpCall, PermuteDimsSpec, ReshapeSpec, RollSpec, SqueezeSpec, StableDivideSpec, StackSpec,
    UnaryOp, ZeroPadSpec,
};
use crate::error::Result;

macro_rules! container_binary_ops {
    ($(($method:ident, $static_method:ident, $op:ident)),* $(,)?) => {
        $(
            pub fn $method(&self, other: impl Into<Value>) -> Result<Container> {
                Self::$static_method(self, other, &MapPolicy::default(), None)
            }

            pub fn $static_method(
                x: &Container,
                other: impl Into<Value>,
                policy: &MapPolicy,
                out: Option<&mut Container>,
            ) -> Result<Container> {
                multi_map_op(
                    &OpCall::Binary(BinaryOp::$op),
                    &[Value::from(x), other.into()],
                    policy,
                    out,
                )
            }
        )*
    };
}

macro_rules! container_unary_ops {
    ($(($method:ident, $static_method:ident, $call:expr)),* $(,)?) => {
        $(
            pub fn $method(&self) -> Result<Container> {
                Self::$static_method(self, &MapPolicy::default(), None)
            }

            pub fn $static_method(
                x: &Container,
                policy: &MapPolicy,
                out: Option<&mut Container>,
            ) -> Result<Container> {
                multi_map_op(&$call, &[Value::from(x)], policy, out)
            }
        )*
    };
}

impl Container {
    container_binary_ops!(
        (add, static_add, Add),
        (sub, static_sub, Sub),
        (mul, static_mul, Mul),
        (div, static_div, Div),
        (minimum, static_minimum, Minimum),
        (maximum, static_maximum, Maximum),
    );

    container_unary_ops!(
        (neg, static_neg, OpCall::Unary(UnaryOp::Neg)),
        (abs, static_abs, OpCall::Unary(UnaryOp::Abs)),
    );

    /// Numerically-stable division of every array leaf.
    pub fn stable_divide(
        &self,
        other: impl Into<Value>,
        min_denominator: Option<f64>,
    ) -> Result<Container> {
        Self::static_stable_divide(self, other, min_denominator, &MapPolicy::default(), None)
    }

    pub fn static_stable_divide(
        x: &Container,
        other: impl Into<Value>,
        min_denominator: Option<f64>,
        policy: &MapPolicy,
        out: Option<&mut Container>,
    ) -> Result<Container> {
        let spec = match min_denominator {
            Some(min_denominator) => StableDivideSpec { min_denominator },
            None => StableDivideSpec::default(),
        };
        multi_map_op(
            &OpCall::StableDivide(spec),
            &[Value::from(x), other.into()],
            policy,
            out,
        )
    }

    /// Clamps every array leaf into `[min, max]`.
    pub fn clip(&self, min: f64, max: f64) -> Result<Container> {
        Self::static_clip(self, min, max, &MapPolicy::default(), None)
    }

    pub fn static_clip(
        x: &Container,
        min: f64,
        max: f64,
        policy: &MapPolicy,
        out: Option<&mut Container>,
    ) -> Result<Container> {
        multi_map_op(
            &OpCall::Clip(ClipSpec { min, max }),
            &[Value::from(x)],
            policy,
            out,
        )
    }

    /// Downscales each array leaf so its p-norm does not exceed `max_norm`.
    pub fn clip_vector_norm(&self, max_norm: f64, p: f64) -> Result<Container> {
        Self::static_clip_vector_norm(self, max_norm, p, &MapPolicy::default(), None)
    }

    pub fn static_clip_vector_norm(
        x: &Container,
        max_norm: f64,
        p: f64,
        policy: &MapPolicy,
        out: Option<&mut Container>,
    ) -> Result<Container> {
        multi_map_op(
            &OpCall::ClipVectorNorm(ClipVectorNormSpec { max_norm, p }),
            &[Value::from(x)],
            policy,
            out,
        )
    }

    pub fn reshape(&self, new_shape: &[i64]) -> Result<Container> {
        Self::static_reshape(self, new_shape, &MapPolicy::default(), None)
    }

    pub fn static_reshape(
        x: &Container,
        new_shape: &[i64],
        policy: &MapPolicy,
        out: Option<&mut Container>,
    ) -> Result<Container> {
        multi_map_op(
            &OpCall::Reshape(ReshapeSpec {
                new_shape: new_shape.to_vec(),
            }),
            &[Value::from(x)],
            policy,
            out,
        )
    }

    pub fn expand_dims(&self, axis: i64) -> Result<Container> {
        Self::static_expand_dims(self, axis, &MapPolicy::default(), None)
    }

    pub fn static_expand_dims(
        x: &Container,
        axis: i64,
        policy: &MapPolicy,
        out: Option<&mut Container>,
    ) -> Result<Container> {
        multi_map_op(
            &OpCall::ExpandDims(ExpandDimsSpec { axis }),
            &[Value::from(x)],
            policy,
            out,
        )
    }

    pub fn squeeze(&self, axis: Option<i64>) -> Result<Container> {
        Self::static_squeeze(self, axis, &MapPolicy::default(), None)
    }

    pub fn static_squeeze(
        x: &Container,
        axis: Option<i64>,
        policy: &MapPolicy,
        out: Option<&mut Container>,
    ) -> Result<Container> {
        multi_map_op(
            &OpCall::Squeeze(SqueezeSpec { axis }),
            &[Value::from(x)],
            policy,
            out,
        )
    }

    pub fn permute_dims(&self, perm: &[usize]) -> Result<Container> {
        Self::static_permute_dims(self, perm, &MapPolicy::default(), None)
    }

    pub fn static_permute_dims(
        x: &Container,
        perm: &[usize],
        policy: &MapPolicy,
        out: Option<&mut Container>,
    ) -> Result<Container> {
        multi_map_op(
            &OpCall::PermuteDims(PermuteDimsSpec {
                perm: perm.to_vec(),
            }),
            &[Value::from(x)],
            policy,
            out,
        )
    }

    pub fn flip(&self, axes: Option<&[i64]>) -> Result<Container> {
        Self::static_flip(self, axes, &MapPolicy::default(), None)
    }

    pub fn static_flip(
        x: &Container,
        axes: Option<&[i64]>,
        policy: &MapPolicy,
        out: Option<&mut Container>,
    ) -> Result<Container> {
        multi_map_op(
            &OpCall::Flip(FlipSpec {
                axes: axes.map(<[i64]>::to_vec),
            }),
            &[Value::from(x)],
            policy,
            out,
        )
    }

    /// Rolls every array leaf; with `axes: None` the single shift applies
    /// to each leaf's flattened form.
    pub fn roll(&self, shifts: &[i64], axes: Option<&[i64]>) -> Result<Container> {
        Self::static_roll(self, shifts, axes, &MapPolicy::default(), None)
    }

    pub fn static_roll(
        x: &Container,
        shifts: &[i64],
        axes: Option<&[i64]>,
        policy: &MapPolicy,
        out: Option<&mut Container>,
    ) -> Result<Container> {
        multi_map_op(
            &OpCall::Roll(RollSpec {
                shifts: shifts.to_vec(),
                axes: axes.map(<[i64]>::to_vec),
            }),
            &[Value::from(x)],
            policy,
            out,
        )
    }

    pub fn zero_pad(&self, pad_widths: &[(usize, usize)]) -> Result<Container> {
        Self::static_zero_pad(self, pad_widths, &MapPolicy::default(), None)
    }

    pub fn static_zero_pad(
        x: &Container,
        pad_widths: &[(usize, usize)],
        policy: &MapPolicy,
        out: Option<&mut Container>,
    ) -> Result<Container> {
        multi_map_op(
            &OpCall::ZeroPad(ZeroPadSpec {
                pad_widths: pad_widths.to_vec(),
            }),
            &[Value::from(x)],
            policy,
            out,
        )
    }

    /// Gathers along `axis` in every array leaf; `indices` may itself be a
    /// container aligned with `self`, or a single array broadcast to every
    /// key-chain.
    pub fn gather(&self, indices: impl Into<Value>, axis: i64) -> Result<Container> {
        Self::static_gather(self, indices, axis, &MapPolicy::default(), None)
    }

    pub fn static_gather(
        x: &Container,
        indices: impl Into<Value>,
        axis: i64,
        policy: &MapPolicy,
        out: Option<&mut Container>,
    ) -> Result<Container> {
        multi_map_op(
            &OpCall::Gather(GatherSpec { axis }),
            &[Value::from(x), indices.into()],
            policy,
            out,
        )
    }

    /// Concatenates aligned leaves across the operand forest along an
    /// existing axis.
    pub fn static_concat(
        xs: &[Value],
        axis: i64,
        policy: &MapPolicy,
        out: Option<&mut Container>,
    ) -> Result<Container> {
        multi_map_op(&OpCall::Concat(ConcatSpec { axis }), xs, policy, out)
    }

    /// Stacks aligned leaves across the operand forest along a fresh axis.
    pub fn static_stack(
        xs: &[Value],
        axis: i64,
        policy: &MapPolicy,
        out: Option<&mut Container>,
    ) -> Result<Container> {
        multi_map_op(&OpCall::Stack(StackSpec { axis }), xs, policy, out)
    }

    /// Structural and value equality with another container.
    pub fn all_equal(&self, other: &Container) -> bool {
        self == other
    }
}
