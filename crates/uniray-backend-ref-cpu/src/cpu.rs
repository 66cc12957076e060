//! Reference CPU backend: dtype-tagged owned buffers and straightforward
//! index arithmetic, with no external dependencies.
//!
//! Handles are immutable (`Arc` slices), so the backend leaves `copy_into`
//! unimplemented and the dispatch layer falls back to handle rebinding for
//! `out=` targets.

use std::sync::Arc;

use uniray::backend::spec::{
    normalize_axis, ArrayInit, ArrayLiteral, ArraySpec, BackendError, BackendResult, BinaryOp,
    ClipSpec, ClipVectorNormSpec, DType, GatherSpec, LiteralData, OpCall, PortableBackend,
    RollSpec, Shape, StableDivideSpec, UnaryOp, ZeroPadSpec,
};

/// One dense array owned by the reference backend.
#[derive(Clone, Debug)]
pub struct CpuArray {
    pub spec: ArraySpec,
    pub data: BufferData,
}

/// Dtype-tagged buffer storage.
#[derive(Clone, Debug)]
pub enum BufferData {
    Bool(Arc<[bool]>),
    I32(Arc<[i32]>),
    I64(Arc<[i64]>),
    F32(Arc<[f32]>),
    F64(Arc<[f64]>),
}

impl BufferData {
    pub fn len(&self) -> usize {
        match self {
            BufferData::Bool(v) => v.len(),
            BufferData::I32(v) => v.len(),
            BufferData::I64(v) => v.len(),
            BufferData::F32(v) => v.len(),
            BufferData::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Default)]
pub struct RefCpuBackend;

impl RefCpuBackend {
    pub fn new() -> Self {
        RefCpuBackend
    }
}

const SUPPORTED: &[DType] = &[DType::Bool, DType::I32, DType::I64, DType::F32, DType::F64];

impl PortableBackend for RefCpuBackend {
    type Handle = CpuArray;

    fn backend_name(&self) -> &str {
        "ref-cpu"
    }

    fn materialize(&self, init: ArrayInit) -> BackendResult<Self::Handle> {
        match init {
            ArrayInit::Literal(literal) => literal_to_array(&literal),
            ArrayInit::Zeroed(spec) => Ok(zeroed_array(&spec)),
        }
    }

    fn to_literal(&self, handle: &Self::Handle) -> BackendResult<ArrayLiteral> {
        let data = match &handle.data {
            BufferData::Bool(v) => LiteralData::Bool(v.to_vec()),
            BufferData::I32(v) => LiteralData::I32(v.to_vec()),
            BufferData::I64(v) => LiteralData::I64(v.to_vec()),
            BufferData::F32(v) => LiteralData::F32(v.to_vec()),
            BufferData::F64(v) => LiteralData::F64(v.to_vec()),
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

    fn supported_dtypes(&self) -> &[DType] {
        SUPPORTED
    }
}

fn literal_to_array(literal: &ArrayLiteral) -> BackendResult<CpuArray> {
    let data = match &literal.data {
        LiteralData::Bool(v) => BufferData::Bool(Arc::from(v.as_slice())),
        LiteralData::I32(v) => BufferData::I32(Arc::from(v.as_slice())),
        LiteralData::I64(v) => BufferData::I64(Arc::from(v.as_slice())),
        LiteralData::F32(v) => BufferData::F32(Arc::from(v.as_slice())),
        LiteralData::F64(v) => BufferData::F64(Arc::from(v.as_slice())),
    };
    Ok(CpuArray {
        spec: literal.spec.clone(),
        data,
    })
}

fn zeroed_array(spec: &ArraySpec) -> CpuArray {
    let len = spec.element_count();
    let data = match spec.dtype {
        DType::Bool => BufferData::Bool(Arc::from(vec![false; len].as_slice())),
        DType::I32 => BufferData::I32(Arc::from(vec![0i32; len].as_slice())),
        DType::I64 => BufferData::I64(Arc::from(vec![0i64; len].as_slice())),
        DType::F32 => BufferData::F32(Arc::from(vec![0f32; len].as_slice())),
        DType::F64 => BufferData::F64(Arc::from(vec![0f64; len].as_slice())),
    };
    CpuArray {
        spec: spec.clone(),
        data,
    }
}

fn execute_op(op: &OpCall, inputs: &[CpuArray], out_spec: &ArraySpec) -> BackendResult<CpuArray> {
    match op {
        OpCall::Binary(binary) => {
            let (lhs, rhs) = two_inputs(op.name(), inputs)?;
            op_binary(*binary, lhs, rhs, out_spec)
        }
        OpCall::Unary(unary) => {
            let input = one_input(op.name(), inputs)?;
            op_unary(*unary, input, out_spec)
        }
        OpCall::StableDivide(spec) => {
            let (lhs, rhs) = two_inputs(op.name(), inputs)?;
            op_stable_divide(spec, lhs, rhs, out_spec)
        }
        OpCall::Clip(spec) => {
            let input = one_input(op.name(), inputs)?;
            op_clip(spec, input, out_spec)
        }
        OpCall::ClipVectorNorm(spec) => {
            let input = one_input(op.name(), inputs)?;
            op_clip_vector_norm(spec, input, out_spec)
        }
        // Pure metadata changes: the buffer is shared, only the spec moves.
        OpCall::Reshape(_) | OpCall::ExpandDims(_) | OpCall::Squeeze(_) => {
            let input = one_input(op.name(), inputs)?;
            Ok(CpuArray {
                spec: out_spec.clone(),
                data: input.data.clone(),
            })
        }
        OpCall::PermuteDims(spec) => {
            let input = one_input(op.name(), inputs)?;
            let map = permute_map(input.spec.shape.dims(), &spec.perm);
            Ok(remap(input, out_spec, &map))
        }
        OpCall::Flip(spec) => {
            let input = one_input(op.name(), inputs)?;
            let rank = input.spec.shape.rank();
            let axes = match &spec.axes {
                Some(axes) => normalize_axes(op.name(), axes, rank)?,
                None => (0..rank).collect(),
            };
            let map = flip_map(input.spec.shape.dims(), &axes);
            Ok(remap(input, out_spec, &map))
        }
        OpCall::Roll(spec) => {
            let input = one_input(op.name(), inputs)?;
            let map = roll_map(op.name(), &input.spec.shape, spec)?;
            Ok(remap(input, out_spec, &map))
        }
        OpCall::ZeroPad(spec) => {
            let input = one_input(op.name(), inputs)?;
            op_zero_pad(spec, input, out_spec)
        }
        OpCall::Concat(spec) => {
            let axis = normalize_axis(op.name(), spec.axis, out_spec.shape.rank())?;
            let dims_list: Vec<&[usize]> =
                inputs.iter().map(|i| i.spec.shape.dims()).collect();
            let map = concat_map(&dims_list, axis, out_spec.shape.dims());
            gather_multi(op.name(), inputs, out_spec, &map)
        }
        OpCall::Stack(spec) => {
            let axis = normalize_axis(op.name(), spec.axis, out_spec.shape.rank())?;
            // Stacking is concatenation of inputs viewed with a fresh unit axis.
            let expanded: Vec<Vec<usize>> = inputs
                .iter()
                .map(|input| {
                    let mut dims = input.spec.shape.dims().to_vec();
                    dims.insert(axis, 1);
                    dims
                })
                .collect();
            let dims_list: Vec<&[usize]> = expanded.iter().map(Vec::as_slice).collect();
            let map = concat_map(&dims_list, axis, out_spec.shape.dims());
            gather_multi(op.name(), inputs, out_spec, &map)
        }
        OpCall::Gather(spec) => {
            let (params, indices) = two_inputs(op.name(), inputs)?;
            op_gather(spec, params, indices, out_spec)
        }
    }
}

fn one_input<'a>(op: &'static str, inputs: &'a [CpuArray]) -> BackendResult<&'a CpuArray> {
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
    inputs: &'a [CpuArray],
) -> BackendResult<(&'a CpuArray, &'a CpuArray)> {
    match inputs {
        [lhs, rhs] => Ok((lhs, rhs)),
        _ => Err(BackendError::invalid(
            op,
            format!("expected 2 inputs, got {}", inputs.len()),
        )),
    }
}

// ---------------------------------------------------------------------------
// Elementwise kernels

/// Pairs elements under the same-shape-or-singleton broadcast rule.
fn zip_broadcast<T: Copy>(a: &[T], b: &[T], f: impl Fn(T, T) -> T) -> Vec<T> {
    if a.len() == b.len() {
        a.iter().zip(b).map(|(&x, &y)| f(x, y)).collect()
    } else if b.len() == 1 {
        a.iter().map(|&x| f(x, b[0])).collect()
    } else {
        b.iter().map(|&y| f(a[0], y)).collect()
    }
}

fn has_zero_divisor<T: Copy + PartialEq>(b: &[T], zero: T) -> bool {
    b.iter().any(|&v| v == zero)
}

fn op_binary(
    op: BinaryOp,
    lhs: &CpuArray,
    rhs: &CpuArray,
    out_spec: &ArraySpec,
) -> BackendResult<CpuArray> {
    macro_rules! float_case {
        ($a:expr, $b:expr, $variant:ident) => {{
            let out = match op {
                BinaryOp::Add => zip_broadcast($a, $b, |x, y| x + y),
                BinaryOp::Sub => zip_broadcast($a, $b, |x, y| x - y),
                BinaryOp::Mul => zip_broadcast($a, $b, |x, y| x * y),
                BinaryOp::Div => zip_broadcast($a, $b, |x, y| x / y),
                BinaryOp::Minimum => zip_broadcast($a, $b, |x, y| x.min(y)),
                BinaryOp::Maximum => zip_broadcast($a, $b, |x, y| x.max(y)),
            };
            BufferData::$variant(Arc::from(out.as_slice()))
        }};
    }
    macro_rules! int_case {
        ($a:expr, $b:expr, $variant:ident, $zero:expr) => {{
            if matches!(op, BinaryOp::Div) && has_zero_divisor($b, $zero) {
                return Err(BackendError::execution("integer division by zero"));
            }
            let out = match op {
                BinaryOp::Add => zip_broadcast($a, $b, |x, y| x.wrapping_add(y)),
                BinaryOp::Sub => zip_broadcast($a, $b, |x, y| x.wrapping_sub(y)),
                BinaryOp::Mul => zip_broadcast($a, $b, |x, y| x.wrapping_mul(y)),
                BinaryOp::Div => zip_broadcast($a, $b, |x, y| x / y),
                BinaryOp::Minimum => zip_broadcast($a, $b, |x, y| x.min(y)),
                BinaryOp::Maximum => zip_broadcast($a, $b, |x, y| x.max(y)),
            };
            BufferData::$variant(Arc::from(out.as_slice()))
        }};
    }

    let name = OpCall::Binary(op).name();
    let data = match (&lhs.data, &rhs.data) {
        (BufferData::F32(a), BufferData::F32(b)) => float_case!(a, b, F32),
        (BufferData::F64(a), BufferData::F64(b)) => float_case!(a, b, F64),
        (BufferData::I32(a), BufferData::I32(b)) => int_case!(a, b, I32, 0i32),
        (BufferData::I64(a), BufferData::I64(b)) => int_case!(a, b, I64, 0i64),
        (BufferData::Bool(_), _) | (_, BufferData::Bool(_)) => {
            return Err(BackendError::invalid(name, "not defined for bool arrays"))
        }
        _ => {
            return Err(BackendError::execution(format!(
                "{name}: operand dtypes diverge"
            )))
        }
    };
    Ok(CpuArray {
        spec: out_spec.clone(),
        data,
    })
}

fn op_unary(op: UnaryOp, input: &CpuArray, out_spec: &ArraySpec) -> BackendResult<CpuArray> {
    macro_rules! signed_case {
        ($v:expr, $variant:ident) => {{
            let out: Vec<_> = match op {
                UnaryOp::Neg => $v.iter().map(|&x| -x).collect(),
                UnaryOp::Abs => $v.iter().map(|&x| if x < Default::default() { -x } else { x }).collect(),
            };
            BufferData::$variant(Arc::from(out.as_slice()))
        }};
    }
    let data = match &input.data {
        BufferData::F32(v) => signed_case!(v, F32),
        BufferData::F64(v) => signed_case!(v, F64),
        BufferData::I32(v) => signed_case!(v, I32),
        BufferData::I64(v) => signed_case!(v, I64),
        BufferData::Bool(_) => {
            return Err(BackendError::invalid(
                OpCall::Unary(op).name(),
                "not defined for bool arrays",
            ))
        }
    };
    Ok(CpuArray {
        spec: out_spec.clone(),
        data,
    })
}

fn op_stable_divide(
    spec: &StableDivideSpec,
    lhs: &CpuArray,
    rhs: &CpuArray,
    out_spec: &ArraySpec,
) -> BackendResult<CpuArray> {
    let data = match (&lhs.data, &rhs.data) {
        (BufferData::F32(a), BufferData::F32(b)) => {
            let eps = spec.min_denominator as f32;
            BufferData::F32(Arc::from(
                zip_broadcast(a, b, |x, y| x / (y + eps)).as_slice(),
            ))
        }
        (BufferData::F64(a), BufferData::F64(b)) => {
            let eps = spec.min_denominator;
            BufferData::F64(Arc::from(
                zip_broadcast(a, b, |x, y| x / (y + eps)).as_slice(),
            ))
        }
        _ => {
            return Err(BackendError::invalid(
                "stable_divide",
                "requires matching float operands",
            ))
        }
    };
    Ok(CpuArray {
        spec: out_spec.clone(),
        data,
    })
}

fn op_clip(spec: &ClipSpec, input: &CpuArray, out_spec: &ArraySpec) -> BackendResult<CpuArray> {
    let data = match &input.data {
        BufferData::F32(v) => {
            let (lo, hi) = (spec.min as f32, spec.max as f32);
            BufferData::F32(v.iter().map(|&x| x.clamp(lo, hi)).collect::<Vec<_>>().as_slice().into())
        }
        BufferData::F64(v) => {
            BufferData::F64(v.iter().map(|&x| x.clamp(spec.min, spec.max)).collect::<Vec<_>>().as_slice().into())
        }
        BufferData::I32(v) => {
            let (lo, hi) = (spec.min.ceil() as i32, spec.max.floor() as i32);
            BufferData::I32(v.iter().map(|&x| x.clamp(lo, hi)).collect::<Vec<_>>().as_slice().into())
        }
        BufferData::I64(v) => {
            let (lo, hi) = (spec.min.ceil() as i64, spec.max.floor() as i64);
            BufferData::I64(v.iter().map(|&x| x.clamp(lo, hi)).collect::<Vec<_>>().as_slice().into())
        }
        BufferData::Bool(_) => {
            return Err(BackendError::invalid("clip", "not defined for bool arrays"))
        }
    };
    Ok(CpuArray {
        spec: out_spec.clone(),
        data,
    })
}

fn op_clip_vector_norm(
    spec: &ClipVectorNormSpec,
    input: &CpuArray,
    out_spec: &ArraySpec,
) -> BackendResult<CpuArray> {
    let data = match &input.data {
        BufferData::F32(v) => {
            let norm = p_norm(v.iter().map(|&x| x as f64), spec.p);
            let scale = norm_scale(norm, spec.max_norm) as f32;
            BufferData::F32(v.iter().map(|&x| x * scale).collect::<Vec<_>>().as_slice().into())
        }
        BufferData::F64(v) => {
            let norm = p_norm(v.iter().copied(), spec.p);
            let scale = norm_scale(norm, spec.max_norm);
            BufferData::F64(v.iter().map(|&x| x * scale).collect::<Vec<_>>().as_slice().into())
        }
        _ => {
            return Err(BackendError::invalid(
                "clip_vector_norm",
                "requires a float array",
            ))
        }
    };
    Ok(CpuArray {
        spec: out_spec.clone(),
        data,
    })
}

fn p_norm(values: impl Iterator<Item = f64>, p: f64) -> f64 {
    values.map(|x| x.abs().powf(p)).sum::<f64>().powf(1.0 / p)
}

fn norm_scale(norm: f64, max_norm: f64) -> f64 {
    if norm > max_norm && norm > 0.0 {
        max_norm / norm
    } else {
        1.0
    }
}

// ---------------------------------------------------------------------------
// Index-mapped kernels

fn row_major_strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; dims.len()];
    for i in (0..dims.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * dims[i + 1];
    }
    strides
}

fn unravel(mut linear: usize, strides: &[usize]) -> Vec<usize> {
    strides
        .iter()
        .map(|&stride| {
            let coord = linear / stride;
            linear %= stride;
            coord
        })
        .collect()
}

fn ravel(coords: &[usize], strides: &[usize]) -> usize {
    coords.iter().zip(strides).map(|(&c, &s)| c * s).sum()
}

/// Copies `src[map[i]]` into slot `i` of a fresh buffer.
fn select_by_map<T: Copy>(src: &[T], map: &[usize]) -> Arc<[T]> {
    Arc::from(map.iter().map(|&i| src[i]).collect::<Vec<_>>().as_slice())
}

fn remap(input: &CpuArray, out_spec: &ArraySpec, map: &[usize]) -> CpuArray {
    let data = match &input.data {
        BufferData::Bool(v) => BufferData::Bool(select_by_map(v, map)),
        BufferData::I32(v) => BufferData::I32(select_by_map(v, map)),
        BufferData::I64(v) => BufferData::I64(select_by_map(v, map)),
        BufferData::F32(v) => BufferData::F32(select_by_map(v, map)),
        BufferData::F64(v) => BufferData::F64(select_by_map(v, map)),
    };
    CpuArray {
        spec: out_spec.clone(),
        data,
    }
}

fn normalize_axes(op: &'static str, axes: &[i64], rank: usize) -> BackendResult<Vec<usize>> {
    axes.iter()
        .map(|&axis| normalize_axis(op, axis, rank))
        .collect()
}

fn permute_map(in_dims: &[usize], perm: &[usize]) -> Vec<usize> {
    let out_dims: Vec<usize> = perm.iter().map(|&p| in_dims[p]).collect();
    let in_strides = row_major_strides(in_dims);
    let out_strides = row_major_strides(&out_dims);
    let count: usize = in_dims.iter().product();
    (0..count)
        .map(|linear| {
            let out_coords = unravel(linear, &out_strides);
            let mut in_coords = vec![0usize; in_dims.len()];
            for (out_axis, &in_axis) in perm.iter().enumerate() {
                in_coords[in_axis] = out_coords[out_axis];
            }
            ravel(&in_coords, &in_strides)
        })
        .collect()
}

fn flip_map(dims: &[usize], axes: &[usize]) -> Vec<usize> {
    let strides = row_major_strides(dims);
    let count: usize = dims.iter().product();
    (0..count)
        .map(|linear| {
            let mut coords = unravel(linear, &strides);
            for &axis in axes {
                coords[axis] = dims[axis] - 1 - coords[axis];
            }
            ravel(&coords, &strides)
        })
        .collect()
}

fn roll_map(op: &'static str, shape: &Shape, spec: &RollSpec) -> BackendResult<Vec<usize>> {
    let dims = shape.dims();
    let count = shape.element_count();
    match &spec.axes {
        None => {
            let shift = spec.shifts[0];
            let len = count as i64;
            if len == 0 {
                return Ok(Vec::new());
            }
            Ok((0..count)
                .map(|i| (i as i64 - shift).rem_euclid(len) as usize)
                .collect())
        }
        Some(axes) => {
            let axes = normalize_axes(op, axes, dims.len())?;
            let strides = row_major_strides(dims);
            Ok((0..count)
                .map(|linear| {
                    let mut coords = unravel(linear, &strides);
                    for (&axis, &shift) in axes.iter().zip(&spec.shifts) {
                        let dim = dims[axis] as i64;
                        coords[axis] = (coords[axis] as i64 - shift).rem_euclid(dim) as usize;
                    }
                    ravel(&coords, &strides)
                })
                .collect())
        }
    }
}

fn op_zero_pad(
    spec: &ZeroPadSpec,
    input: &CpuArray,
    out_spec: &ArraySpec,
) -> BackendResult<CpuArray> {
    let in_dims = input.spec.shape.dims();
    let out_dims = out_spec.shape.dims();
    let in_strides = row_major_strides(in_dims);
    let out_strides = row_major_strides(out_dims);
    let count = out_spec.element_count();
    let map: Vec<Option<usize>> = (0..count)
        .map(|linear| {
            let out_coords = unravel(linear, &out_strides);
            let mut in_coords = Vec::with_capacity(in_dims.len());
            for (axis, &coord) in out_coords.iter().enumerate() {
                let (before, _) = spec.pad_widths[axis];
                if coord < before || coord >= before + in_dims[axis] {
                    return None;
                }
                in_coords.push(coord - before);
            }
            Some(ravel(&in_coords, &in_strides))
        })
        .collect();

    fn padded<T: Copy + Default>(src: &[T], map: &[Option<usize>]) -> Arc<[T]> {
        Arc::from(
            map.iter()
                .map(|slot| slot.map(|i| src[i]).unwrap_or_default())
                .collect::<Vec<_>>()
                .as_slice(),
        )
    }

    let data = match &input.data {
        BufferData::Bool(v) => BufferData::Bool(padded(v, &map)),
        BufferData::I32(v) => BufferData::I32(padded(v, &map)),
        BufferData::I64(v) => BufferData::I64(padded(v, &map)),
        BufferData::F32(v) => BufferData::F32(padded(v, &map)),
        BufferData::F64(v) => BufferData::F64(padded(v, &map)),
    };
    Ok(CpuArray {
        spec: out_spec.clone(),
        data,
    })
}

/// For each output slot, which input array and which linear index feed it.
fn concat_map(dims_list: &[&[usize]], axis: usize, out_dims: &[usize]) -> Vec<(usize, usize)> {
    let out_strides = row_major_strides(out_dims);
    let strides_list: Vec<Vec<usize>> =
        dims_list.iter().map(|dims| row_major_strides(dims)).collect();
    let count: usize = out_dims.iter().product();
    (0..count)
        .map(|linear| {
            let mut coords = unravel(linear, &out_strides);
            let mut axis_coord = coords[axis];
            let mut source = 0usize;
            while axis_coord >= dims_list[source][axis] {
                axis_coord -= dims_list[source][axis];
                source += 1;
            }
            coords[axis] = axis_coord;
            (source, ravel(&coords, &strides_list[source]))
        })
        .collect()
}

fn gather_multi(
    op: &'static str,
    inputs: &[CpuArray],
    out_spec: &ArraySpec,
    map: &[(usize, usize)],
) -> BackendResult<CpuArray> {
    macro_rules! collect_case {
        ($variant:ident) => {{
            let mut slices = Vec::with_capacity(inputs.len());
            for input in inputs {
                match &input.data {
                    BufferData::$variant(v) => slices.push(v.as_ref()),
                    _ => {
                        return Err(BackendError::execution(format!(
                            "{op}: operand dtypes diverge"
                        )))
                    }
                }
            }
            let out: Vec<_> = map.iter().map(|&(src, i)| slices[src][i]).collect();
            BufferData::$variant(Arc::from(out.as_slice()))
        }};
    }
    let first = inputs
        .first()
        .ok_or_else(|| BackendError::invalid(op, "at least one input is required"))?;
    let data = match &first.data {
        BufferData::Bool(_) => collect_case!(Bool),
        BufferData::I32(_) => collect_case!(I32),
        BufferData::I64(_) => collect_case!(I64),
        BufferData::F32(_) => collect_case!(F32),
        BufferData::F64(_) => collect_case!(F64),
    };
    Ok(CpuArray {
        spec: out_spec.clone(),
        data,
    })
}

fn op_gather(
    spec: &GatherSpec,
    params: &CpuArray,
    indices: &CpuArray,
    out_spec: &ArraySpec,
) -> BackendResult<CpuArray> {
    let dims = params.spec.shape.dims();
    let axis = normalize_axis("gather", spec.axis, dims.len())?;
    let index_values: Vec<i64> = match &indices.data {
        BufferData::I32(v) => v.iter().map(|&i| i64::from(i)).collect(),
        BufferData::I64(v) => v.to_vec(),
        _ => {
            return Err(BackendError::invalid(
                "gather",
                "indices must be an integer array",
            ))
        }
    };
    let axis_dim = dims[axis] as i64;
    let mut resolved = Vec::with_capacity(index_values.len());
    for index in index_values {
        let shifted = if index < 0 { index + axis_dim } else { index };
        if shifted < 0 || shifted >= axis_dim {
            return Err(BackendError::execution(format!(
                "gather index {index} out of bounds for axis extent {axis_dim}"
            )));
        }
        resolved.push(shifted as usize);
    }

    // Output coords split as [outer.., index_coords.., inner..].
    let in_strides = row_major_strides(dims);
    let out_dims = out_spec.shape.dims();
    let out_strides = row_major_strides(out_dims);
    let index_rank = indices.spec.shape.rank();
    let index_strides = row_major_strides(indices.spec.shape.dims());
    let count = out_spec.element_count();
    let map: Vec<usize> = (0..count)
        .map(|linear| {
            let out_coords = unravel(linear, &out_strides);
            let outer = &out_coords[..axis];
            let index_coords = &out_coords[axis..axis + index_rank];
            let inner = &out_coords[axis + index_rank..];
            let picked = resolved[ravel(index_coords, &index_strides)];
            let mut in_coords = Vec::with_capacity(dims.len());
            in_coords.extend_from_slice(outer);
            in_coords.push(picked);
            in_coords.extend_from_slice(inner);
            ravel(&in_coords, &in_strides)
        })
        .collect();
    Ok(remap(params, out_spec, &map))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_array(dims: &[usize], values: Vec<f32>) -> CpuArray {
        literal_to_array(&ArrayLiteral::from_f32(Shape::new(dims.to_vec()), values).unwrap())
            .unwrap()
    }

    fn values(array: &CpuArray) -> Vec<f32> {
        match &array.data {
            BufferData::F32(v) => v.to_vec(),
            _ => panic!("expected f32 buffer"),
        }
    }

    #[test]
    fn roll_wraps_flat_buffers() {
        let input = f32_array(&[3], vec![0.0, 1.0, 2.0]);
        let spec = input.spec.clone();
        let out = execute_op(
            &OpCall::Roll(RollSpec {
                shifts: vec![1],
                axes: None,
            }),
            &[input],
            &spec,
        )
        .unwrap();
        assert_eq!(values(&out), vec![2.0, 0.0, 1.0]);
    }

    #[test]
    fn permute_transposes_matrices() {
        let input = f32_array(&[2, 3], vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let out_spec = ArraySpec::new(DType::F32, Shape::new(vec![3, 2]));
        let out = execute_op(
            &OpCall::PermuteDims(uniray::backend::spec::PermuteDimsSpec { perm: vec![1, 0] }),
            &[input],
            &out_spec,
        )
        .unwrap();
        assert_eq!(values(&out), vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
    }

    #[test]
    fn gather_selects_rows() {
        let params = f32_array(&[3, 2], vec![0.0, 1.0, 10.0, 11.0, 20.0, 21.0]);
        let indices = literal_to_array(
            &ArrayLiteral::from_i64(Shape::new(vec![2]), vec![2, 0]).unwrap(),
        )
        .unwrap();
        let out_spec = ArraySpec::new(DType::F32, Shape::new(vec![2, 2]));
        let out = execute_op(
            &OpCall::Gather(GatherSpec { axis: 0 }),
            &[params, indices],
            &out_spec,
        )
        .unwrap();
        assert_eq!(values(&out), vec![20.0, 21.0, 0.0, 1.0]);
    }

    #[test]
    fn zero_pad_fills_borders() {
        let input = f32_array(&[2], vec![1.0, 2.0]);
        let out_spec = ArraySpec::new(DType::F32, Shape::new(vec![4]));
        let out = execute_op(
            &OpCall::ZeroPad(ZeroPadSpec {
                pad_widths: vec![(1, 1)],
            }),
            &[input],
            &out_spec,
        )
        .unwrap();
        assert_eq!(values(&out), vec![0.0, 1.0, 2.0, 0.0]);
    }

    #[test]
    fn integer_division_by_zero_is_reported() {
        let lhs = literal_to_array(
            &ArrayLiteral::from_i32(Shape::new(vec![2]), vec![4, 9]).unwrap(),
        )
        .unwrap();
        let rhs = literal_to_array(
            &ArrayLiteral::from_i32(Shape::new(vec![2]), vec![2, 0]).unwrap(),
        )
        .unwrap();
        let spec = lhs.spec.clone();
        let err = execute_op(&OpCall::Binary(BinaryOp::Div), &[lhs, rhs], &spec).unwrap_err();
        assert!(matches!(err, BackendError::Execution { .. }));
    }
}
