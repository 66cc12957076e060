//! Backend built on [`ndarray`]: float and 64-bit integer dtypes, with
//! native in-place writes through shared, lock-guarded buffers.
//!
//! The narrower dtype table is deliberate: requests for `bool` or `i32`
//! arrays surface as unsupported-dtype errors at the dispatch layer.

use std::sync::{Arc, RwLock};

use ndarray::{concatenate, ArrayD, Axis, IxDyn, Slice, Zip};

use uniray::backend::spec::{
    normalize_axis, ArrayInit, ArrayLiteral, ArraySpec, BackendError, BackendResult, BinaryOp,
    ClipVectorNormSpec, DType, GatherSpec, LiteralData, OpCall, PortableBackend, RollSpec,
    StableDivideSpec, UnaryOp, ZeroPadSpec,
};

/// Dtype-tagged ndarray storage.
#[derive(Clone)]
pub enum NdData {
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
    I64(ArrayD<i64>),
}

/// Handle minted by [`NdArrayBackend`].
///
/// The buffer sits behind a shared lock, so aliases observe in-place writes
/// the way they would with any natively-mutable array framework.
#[derive(Clone)]
pub struct NdHandle {
    pub spec: ArraySpec,
    pub data: Arc<RwLock<NdData>>,
}

impl NdHandle {
    fn new(spec: ArraySpec, data: NdData) -> Self {
        NdHandle {
            spec,
            data: Arc::new(RwLock::new(data)),
        }
    }

    fn read(&self) -> NdData {
        self.data.read().unwrap().clone()
    }
}

#[derive(Clone, Default)]
pub struct NdArrayBackend;

impl NdArrayBackend {
    pub fn new() -> Self {
        NdArrayBackend
    }
}

const SUPPORTED: &[DType] = &[DType::I64, DType::F32, DType::F64];

impl PortableBackend for NdArrayBackend {
    type Handle = NdHandle;

    fn backend_name(&self) -> &str {
        "ndarray"
    }

    fn materialize(&self, init: ArrayInit) -> BackendResult<Self::Handle> {
        match init {
            ArrayInit::Literal(literal) => literal_to_handle(&literal),
            ArrayInit::Zeroed(spec) => {
                let dim = IxDyn(spec.shape.dims());
                let data = match spec.dtype {
                    DType::F32 => NdData::F32(ArrayD::zeros(dim)),
                    DType::F64 => NdData::F64(ArrayD::zeros(dim)),
                    DType::I64 => NdData::I64(ArrayD::zeros(dim)),
                    dtype => {
                        return Err(BackendError::DTypeNotSupported {
                            op: "materialize",
                            dtype,
                        })
                    }
                };
                Ok(NdHandle::new(spec, data))
            }
        }
    }

    fn to_literal(&self, handle: &Self::Handle) -> BackendResult<ArrayLiteral> {
        let data = match &*handle.data.read().unwrap() {
            NdData::F32(a) => LiteralData::F32(a.iter().copied().collect()),
            NdData::F64(a) => LiteralData::F64(a.iter().copied().collect()),
            NdData::I64(a) => LiteralData::I64(a.iter().copied().collect()),
        };
        ArrayLiteral::new(handle.spec.clone(), data)
    }

    fn execute(
        &self,
        op: &OpCall,
        inputs: &[Self::Handle],
        out_spec: &ArraySpec,
    ) -> BackendResult<Self::Handle> {
        execute_op(op, inputs, out_spec)
    }

    fn copy_into(&self, dst: &Self::Handle, src: &Self::Handle) -> BackendResult<()> {
        let value = src.read();
        *dst.data.write().unwrap() = value;
        Ok(())
    }

    fn supported_dtypes(&self) -> &[DType] {
        SUPPORTED
    }

    fn default_int_dtype(&self) -> DType {
        DType::I64
    }
}

fn literal_to_handle(literal: &ArrayLiteral) -> BackendResult<NdHandle> {
    let dim = IxDyn(literal.spec.shape.dims());
    let data = match &literal.data {
        LiteralData::F32(v) => NdData::F32(from_vec("materialize", dim, v.clone())?),
        LiteralData::F64(v) => NdData::F64(from_vec("materialize", dim, v.clone())?),
        LiteralData::I64(v) => NdData::I64(from_vec("materialize", dim, v.clone())?),
        other => {
            return Err(BackendError::DTypeNotSupported {
                op: "materialize",
                dtype: other.dtype(),
            })
        }
    };
    Ok(NdHandle::new(literal.spec.clone(), data))
}

fn from_vec<T>(op: &'static str, dim: IxDyn, values: Vec<T>) -> BackendResult<ArrayD<T>> {
    ArrayD::from_shape_vec(dim, values)
        .map_err(|err| BackendError::execution(format!("{op}: {err}")))
}

/// Applies one generic transform per dtype arm.
macro_rules! per_dtype {
    ($input:expr, |$a:ident| $body:expr) => {
        match $input {
            NdData::F32($a) => NdData::F32($body?),
            NdData::F64($a) => NdData::F64($body?),
            NdData::I64($a) => NdData::I64($body?),
        }
    };
}

fn execute_op(op: &OpCall, inputs: &[NdHandle], out_spec: &ArraySpec) -> BackendResult<NdHandle> {
    match op {
        OpCall::Binary(binary) => {
            let (lhs, rhs) = two_inputs(op.name(), inputs)?;
            op_binary(*binary, lhs, rhs, out_spec)
        }
        OpCall::Unary(unary) => {
            let input = one_input(op.name(), inputs)?;
            let data = match (unary, input.read()) {
                (UnaryOp::Neg, NdData::F32(a)) => NdData::F32(a.mapv(|x| -x)),
                (UnaryOp::Neg, NdData::F64(a)) => NdData::F64(a.mapv(|x| -x)),
                (UnaryOp::Neg, NdData::I64(a)) => NdData::I64(a.mapv(|x| -x)),
                (UnaryOp::Abs, NdData::F32(a)) => NdData::F32(a.mapv(f32::abs)),
                (UnaryOp::Abs, NdData::F64(a)) => NdData::F64(a.mapv(f64::abs)),
                (UnaryOp::Abs, NdData::I64(a)) => NdData::I64(a.mapv(i64::abs)),
            };
            Ok(NdHandle::new(out_spec.clone(), data))
        }
        OpCall::StableDivide(spec) => {
            let (lhs, rhs) = two_inputs(op.name(), inputs)?;
            op_stable_divide(spec, lhs, rhs, out_spec)
        }
        OpCall::Clip(spec) => {
            let input = one_input(op.name(), inputs)?;
            let data = match input.read() {
                NdData::F32(a) => {
                    let (lo, hi) = (spec.min as f32, spec.max as f32);
                    NdData::F32(a.mapv(|x| x.clamp(lo, hi)))
                }
                NdData::F64(a) => NdData::F64(a.mapv(|x| x.clamp(spec.min, spec.max))),
                NdData::I64(a) => {
                    let (lo, hi) = (spec.min.ceil() as i64, spec.max.floor() as i64);
                    NdData::I64(a.mapv(|x| x.clamp(lo, hi)))
                }
            };
            Ok(NdHandle::new(out_spec.clone(), data))
        }
        OpCall::ClipVectorNorm(spec) => {
            let input = one_input(op.name(), inputs)?;
            op_clip_vector_norm(spec, input, out_spec)
        }
        OpCall::Reshape(_) | OpCall::ExpandDims(_) | OpCall::Squeeze(_) => {
            let input = one_input(op.name(), inputs)?;
            let dim = IxDyn(out_spec.shape.dims());
            let data = per_dtype!(input.read(), |a| from_vec(
                op.name(),
                dim.clone(),
                a.iter().copied().collect()
            ));
            Ok(NdHandle::new(out_spec.clone(), data))
        }
        OpCall::PermuteDims(spec) => {
            let input = one_input(op.name(), inputs)?;
            let data = match input.read() {
                NdData::F32(a) => NdData::F32(a.view().permuted_axes(IxDyn(&spec.perm)).to_owned()),
                NdData::F64(a) => NdData::F64(a.view().permuted_axes(IxDyn(&spec.perm)).to_owned()),
                NdData::I64(a) => NdData::I64(a.view().permuted_axes(IxDyn(&spec.perm)).to_owned()),
            };
            Ok(NdHandle::new(out_spec.clone(), data))
        }
        OpCall::Flip(spec) => {
            let input = one_input(op.name(), inputs)?;
            let rank = input.spec.shape.rank();
            let axes = match &spec.axes {
                Some(axes) => axes
                    .iter()
                    .map(|&axis| normalize_axis(op.name(), axis, rank))
                    .collect::<BackendResult<Vec<_>>>()?,
                None => (0..rank).collect(),
            };
            fn flipped<T: Clone>(mut a: ArrayD<T>, axes: &[usize]) -> BackendResult<ArrayD<T>> {
                for &axis in axes {
                    a.invert_axis(Axis(axis));
                }
                Ok(a)
            }
            let data = per_dtype!(input.read(), |a| flipped(a, &axes));
            Ok(NdHandle::new(out_spec.clone(), data))
        }
        OpCall::Roll(spec) => {
            let input = one_input(op.name(), inputs)?;
            op_roll(spec, input, out_spec)
        }
        OpCall::ZeroPad(spec) => {
            let input = one_input(op.name(), inputs)?;
            op_zero_pad(spec, input, out_spec)
        }
        OpCall::Concat(spec) => {
            let axis = normalize_axis(op.name(), spec.axis, out_spec.shape.rank())?;
            op_concat(op.name(), inputs, axis, out_spec, false)
        }
        OpCall::Stack(spec) => {
            let axis = normalize_axis(op.name(), spec.axis, out_spec.shape.rank())?;
            op_concat(op.name(), inputs, axis, out_spec, true)
        }
        OpCall::Gather(spec) => {
            let (params, indices) = two_inputs(op.name(), inputs)?;
            op_gather(spec, params, indices, out_spec)
        }
    }
}

fn one_input<'a>(op: &'static str, inputs: &'a [NdHandle]) -> BackendResult<&'a NdHandle> {
    match inputs {
        [input] => Ok(input),
        _ => Err(BackendError::invalid(
            op,
            format!("expected 1 input, got {}", inputs.len()),
        )),
    }
}

fn two_inputs<'a>(
    op: &'static str,
    inputs: &'a [NdHandle],
) -> BackendResult<(&'a NdHandle, &'a NdHandle)> {
    match inputs {
        [lhs, rhs] => Ok((lhs, rhs)),
        _ => Err(BackendError::invalid(
            op,
            format!("expected 2 inputs, got {}", inputs.len()),
        )),
    }
}

/// Broadcast-zips two operands to the output shape.
fn zip_to<T: Copy>(
    op: &'static str,
    a: &ArrayD<T>,
    b: &ArrayD<T>,
    out_dims: &[usize],
    f: impl Fn(T, T) -> T,
) -> BackendResult<ArrayD<T>> {
    let dim = IxDyn(out_dims);
    let av = a
        .broadcast(dim.clone())
        .ok_or_else(|| BackendError::execution(format!("{op}: lhs does not broadcast")))?;
    let bv = b
        .broadcast(dim)
        .ok_or_else(|| BackendError::execution(format!("{op}: rhs does not broadcast")))?;
    Ok(Zip::from(&av).and(&bv).map_collect(|&x, &y| f(x, y)))
}

fn op_binary(
    op: BinaryOp,
    lhs: &NdHandle,
    rhs: &NdHandle,
    out_spec: &ArraySpec,
) -> BackendResult<NdHandle> {
    let name = OpCall::Binary(op).name();
    let dims = out_spec.shape.dims();
    let data = match (lhs.read(), rhs.read()) {
        (NdData::F32(a), NdData::F32(b)) => NdData::F32(match op {
            BinaryOp::Add => zip_to(name, &a, &b, dims, |x, y| x + y)?,
            BinaryOp::Sub => zip_to(name, &a, &b, dims, |x, y| x - y)?,
            BinaryOp::Mul => zip_to(name, &a, &b, dims, |x, y| x * y)?,
            BinaryOp::Div => zip_to(name, &a, &b, dims, |x, y| x / y)?,
            BinaryOp::Minimum => zip_to(name, &a, &b, dims, f32::min)?,
            BinaryOp::Maximum => zip_to(name, &a, &b, dims, f32::max)?,
        }),
        (NdData::F64(a), NdData::F64(b)) => NdData::F64(match op {
            BinaryOp::Add => zip_to(name, &a, &b, dims, |x, y| x + y)?,
            BinaryOp::Sub => zip_to(name, &a, &b, dims, |x, y| x - y)?,
            BinaryOp::Mul => zip_to(name, &a, &b, dims, |x, y| x * y)?,
            BinaryOp::Div => zip_to(name, &a, &b, dims, |x, y| x / y)?,
            BinaryOp::Minimum => zip_to(name, &a, &b, dims, f64::min)?,
            BinaryOp::Maximum => zip_to(name, &a, &b, dims, f64::max)?,
        }),
        (NdData::I64(a), NdData::I64(b)) => {
            if matches!(op, BinaryOp::Div) && b.iter().any(|&v| v == 0) {
                return Err(BackendError::execution("integer division by zero"));
            }
            NdData::I64(match op {
                BinaryOp::Add => zip_to(name, &a, &b, dims, |x, y| x.wrapping_add(y))?,
                BinaryOp::Sub => zip_to(name, &a, &b, dims, |x, y| x.wrapping_sub(y))?,
                BinaryOp::Mul => zip_to(name, &a, &b, dims, |x, y| x.wrapping_mul(y))?,
                BinaryOp::Div => zip_to(name, &a, &b, dims, |x, y| x / y)?,
                BinaryOp::Minimum => zip_to(name, &a, &b, dims, |x, y| x.min(y))?,
                BinaryOp::Maximum => zip_to(name, &a, &b, dims, |x, y| x.max(y))?,
            })
        }
        _ => {
            return Err(BackendError::execution(format!(
                "{name}: operand dtypes diverge"
            )))
        }
    };
    Ok(NdHandle::new(out_spec.clone(), data))
}

fn op_stable_divide(
    spec: &StableDivideSpec,
    lhs: &NdHandle,
    rhs: &NdHandle,
    out_spec: &ArraySpec,
) -> BackendResult<NdHandle> {
    let dims = out_spec.shape.dims();
    let data = match (lhs.read(), rhs.read()) {
        (NdData::F32(a), NdData::F32(b)) => {
            let eps = spec.min_denominator as f32;
            NdData::F32(zip_to("stable_divide", &a, &b, dims, |x, y| x / (y + eps))?)
        }
        (NdData::F64(a), NdData::F64(b)) => {
            let eps = spec.min_denominator;
            NdData::F64(zip_to("stable_divide", &a, &b, dims, |x, y| x / (y + eps))?)
        }
        _ => {
            return Err(BackendError::invalid(
                "stable_divide",
                "requires matching float operands",
            ))
        }
    };
    Ok(NdHandle::new(out_spec.clone(), data))
}

fn op_clip_vector_norm(
    spec: &ClipVectorNormSpec,
    input: &NdHandle,
    out_spec: &ArraySpec,
) -> BackendResult<NdHandle> {
    let data = match input.read() {
        NdData::F32(a) => {
            let norm = a
                .iter()
                .map(|&x| (x as f64).abs().powf(spec.p))
                .sum::<f64>()
                .powf(1.0 / spec.p);
            let scale = norm_scale(norm, spec.max_norm) as f32;
            NdData::F32(a.mapv(|x| x * scale))
        }
        NdData::F64(a) => {
            let norm = a.iter().map(|&x| x.abs().powf(spec.p)).sum::<f64>().powf(1.0 / spec.p);
            let scale = norm_scale(norm, spec.max_norm);
            NdData::F64(a.mapv(|x| x * scale))
        }
        NdData::I64(_) => {
            return Err(BackendError::invalid(
                "clip_vector_norm",
                "requires a float array",
            ))
        }
    };
    Ok(NdHandle::new(out_spec.clone(), data))
}

fn norm_scale(norm: f64, max_norm: f64) -> f64 {
    if norm > max_norm && norm > 0.0 {
        max_norm / norm
    } else {
        1.0
    }
}

fn op_roll(spec: &RollSpec, input: &NdHandle, out_spec: &ArraySpec) -> BackendResult<NdHandle> {
    let rank = input.spec.shape.rank();
    match &spec.axes {
        // Flat roll: rotate the logical element order.
        None => {
            let shift = spec.shifts[0];
            let dim = IxDyn(out_spec.shape.dims());
            fn rotated<T: Copy>(
                a: &ArrayD<T>,
                shift: i64,
                dim: IxDyn,
            ) -> BackendResult<ArrayD<T>> {
                let mut flat: Vec<T> = a.iter().copied().collect();
                if !flat.is_empty() {
                    let k = shift.rem_euclid(flat.len() as i64) as usize;
                    flat.rotate_right(k);
                }
                ArrayD::from_shape_vec(dim, flat)
                    .map_err(|err| BackendError::execution(format!("roll: {err}")))
            }
            let data = per_dtype!(&*input.data.read().unwrap(), |a| rotated(
                a,
                shift,
                dim.clone()
            ));
            Ok(NdHandle::new(out_spec.clone(), data))
        }
        // Axis rolls compose as slice swaps along each axis.
        Some(axes) => {
            fn rolled<T: Copy>(
                a: &ArrayD<T>,
                axes: &[usize],
                shifts: &[i64],
            ) -> BackendResult<ArrayD<T>> {
                let mut out = a.clone();
                for (&axis, &shift) in axes.iter().zip(shifts) {
                    let dim = out.shape()[axis] as i64;
                    if dim == 0 {
                        continue;
                    }
                    let k = shift.rem_euclid(dim) as usize;
                    if k == 0 {
                        continue;
                    }
                    let split = (dim as usize) - k;
                    let tail = out.slice_axis(Axis(axis), Slice::from(split..)).to_owned();
                    let head = out.slice_axis(Axis(axis), Slice::from(..split)).to_owned();
                    out = concatenate(Axis(axis), &[tail.view(), head.view()])
                        .map_err(|err| BackendError::execution(format!("roll: {err}")))?;
                }
                Ok(out)
            }
            let axes = axes
                .iter()
                .map(|&axis| normalize_axis("roll", axis, rank))
                .collect::<BackendResult<Vec<_>>>()?;
            let data = per_dtype!(&*input.data.read().unwrap(), |a| rolled(
                a,
                &axes,
                &spec.shifts
            ));
            Ok(NdHandle::new(out_spec.clone(), data))
        }
    }
}

fn op_zero_pad(
    spec: &ZeroPadSpec,
    input: &NdHandle,
    out_spec: &ArraySpec,
) -> BackendResult<NdHandle> {
    use ndarray::SliceInfoElem;
    let out_dim = IxDyn(out_spec.shape.dims());
    let window: Vec<SliceInfoElem> = spec
        .pad_widths
        .iter()
        .zip(input.spec.shape.dims())
        .map(|(&(before, _), &extent)| SliceInfoElem::Slice {
            start: before as isize,
            end: Some((before + extent) as isize),
            step: 1,
        })
        .collect();

    fn padded<T: Copy + num_traits::Zero>(
        a: &ArrayD<T>,
        out_dim: IxDyn,
        window: &[SliceInfoElem],
    ) -> BackendResult<ArrayD<T>> {
        let mut out = ArrayD::zeros(out_dim);
        out.slice_mut(window).assign(a);
        Ok(out)
    }

    let data = per_dtype!(&*input.data.read().unwrap(), |a| padded(
        a,
        out_dim.clone(),
        &window
    ));
    Ok(NdHandle::new(out_spec.clone(), data))
}

fn op_concat(
    op: &'static str,
    inputs: &[NdHandle],
    axis: usize,
    out_spec: &ArraySpec,
    fresh_axis: bool,
) -> BackendResult<NdHandle> {
    macro_rules! concat_case {
        ($variant:ident) => {{
            let mut owned = Vec::with_capacity(inputs.len());
            for input in inputs {
                match input.read() {
                    NdData::$variant(a) => owned.push(if fresh_axis {
                        a.insert_axis(Axis(axis))
                    } else {
                        a
                    }),
                    _ => {
                        return Err(BackendError::execution(format!(
                            "{op}: operand dtypes diverge"
                        )))
                    }
                }
            }
            let views: Vec<_> = owned.iter().map(|a| a.view()).collect();
            NdData::$variant(
                concatenate(Axis(axis), &views)
                    .map_err(|err| BackendError::execution(format!("{op}: {err}")))?,
            )
        }};
    }
    let first = inputs
        .first()
        .ok_or_else(|| BackendError::invalid(op, "at least one input is required"))?;
    let data = match &*first.data.read().unwrap() {
        NdData::F32(_) => concat_case!(F32),
        NdData::F64(_) => concat_case!(F64),
        NdData::I64(_) => concat_case!(I64),
    };
    Ok(NdHandle::new(out_spec.clone(), data))
}

fn op_gather(
    spec: &GatherSpec,
    params: &NdHandle,
    indices: &NdHandle,
    out_spec: &ArraySpec,
) -> BackendResult<NdHandle> {
    let axis = normalize_axis("gather", spec.axis, params.spec.shape.rank())?;
    if indices.spec.shape.rank() > 1 {
        return Err(BackendError::unimplemented(
            "gather",
            "only scalar or vector index arrays",
        ));
    }
    let raw: Vec<i64> = match &*indices.data.read().unwrap() {
        NdData::I64(a) => a.iter().copied().collect(),
        _ => {
            return Err(BackendError::invalid(
                "gather",
                "indices must be an integer array",
            ))
        }
    };
    let extent = params.spec.shape.dims()[axis] as i64;
    let mut resolved = Vec::with_capacity(raw.len());
    for index in raw {
        let shifted = if index < 0 { index + extent } else { index };
        if shifted < 0 || shifted >= extent {
            return Err(BackendError::execution(format!(
                "gather index {index} out of bounds for axis extent {extent}"
            )));
        }
        resolved.push(shifted as usize);
    }

    let scalar_index = indices.spec.shape.rank() == 0;
    fn selected<T: Copy>(
        a: &ArrayD<T>,
        axis: usize,
        resolved: &[usize],
        scalar_index: bool,
        out_dim: IxDyn,
    ) -> BackendResult<ArrayD<T>> {
        let picked = a.select(Axis(axis), resolved);
        if scalar_index {
            // Drop the index axis again for scalar index arrays.
            return ArrayD::from_shape_vec(out_dim, picked.iter().copied().collect())
                .map_err(|err| BackendError::execution(format!("gather: {err}")));
        }
        Ok(picked)
    }
    let out_dim = IxDyn(out_spec.shape.dims());
    let data = per_dtype!(&*params.data.read().unwrap(), |a| selected(
        a,
        axis,
        &resolved,
        scalar_index,
        out_dim.clone()
    ));
    Ok(NdHandle::new(out_spec.clone(), data))
}
