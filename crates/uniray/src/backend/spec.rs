//! Backend contract: dtypes, shapes, literals, operation descriptors, and the
//! typed [`PortableBackend`] trait every native backend implements.
//!
//! The result spec of every operation is inferred here, before execution, so
//! callers can validate `out=` targets without invoking the op.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Scalar element types understood by the dispatch layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    Bool,
    I32,
    I64,
    F32,
    F64,
}

impl DType {
    /// Returns `true` when the dtype is a signed integer.
    pub fn is_int(self) -> bool {
        matches!(self, DType::I32 | DType::I64)
    }

    /// Returns `true` when the dtype is a floating-point representation.
    pub fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    pub fn is_bool(self) -> bool {
        matches!(self, DType::Bool)
    }

    /// Returns the storage size in bytes of one element.
    pub fn size_in_bytes(self) -> usize {
        match self {
            DType::Bool => 1,
            DType::I32 | DType::F32 => 4,
            DType::I64 | DType::F64 => 8,
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DType::Bool => "bool",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::F32 => "f32",
            DType::F64 => "f64",
        };
        f.write_str(name)
    }
}

/// Logical array shape as an ordered list of static extents.
///
/// Rank zero denotes a scalar array with exactly one element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    pub fn new<D: Into<Vec<usize>>>(dims: D) -> Self {
        Shape { dims: dims.into() }
    }

    /// The rank-zero shape of a single scalar element.
    pub fn scalar() -> Self {
        Shape { dims: Vec::new() }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements implied by the shape.
    pub fn element_count(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn into_dims(self) -> Vec<usize> {
        self.dims
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.dims)
    }
}

/// Array metadata coupling dtype and shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArraySpec {
    pub dtype: DType,
    pub shape: Shape,
}

impl ArraySpec {
    pub fn new(dtype: DType, shape: Shape) -> Self {
        Self { dtype, shape }
    }

    pub fn element_count(&self) -> usize {
        self.shape.element_count()
    }

    pub fn byte_len(&self) -> usize {
        self.element_count() * self.dtype.size_in_bytes()
    }
}

/// Dense host-side payload, tagged by dtype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralData {
    Bool(Vec<bool>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl LiteralData {
    pub fn dtype(&self) -> DType {
        match self {
            LiteralData::Bool(_) => DType::Bool,
            LiteralData::I32(_) => DType::I32,
            LiteralData::I64(_) => DType::I64,
            LiteralData::F32(_) => DType::F32,
            LiteralData::F64(_) => DType::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            LiteralData::Bool(v) => v.len(),
            LiteralData::I32(v) => v.len(),
            LiteralData::I64(v) => v.len(),
            LiteralData::F32(v) => v.len(),
            LiteralData::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Dense literal array exchanged between host code and backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayLiteral {
    pub spec: ArraySpec,
    pub data: LiteralData,
}

impl ArrayLiteral {
    /// Couples a payload with its spec, validating the element count.
    pub fn new(spec: ArraySpec, data: LiteralData) -> BackendResult<Self> {
        if spec.dtype != data.dtype() {
            return Err(BackendError::execution(format!(
                "literal dtype {} does not match spec dtype {}",
                data.dtype(),
                spec.dtype
            )));
        }
        if spec.element_count() != data.len() {
            return Err(BackendError::execution(format!(
                "literal payload length {} does not match shape {:?}",
                data.len(),
                spec.shape.dims()
            )));
        }
        Ok(Self { spec, data })
    }

    pub fn from_f32(shape: Shape, values: Vec<f32>) -> BackendResult<Self> {
        Self::new(ArraySpec::new(DType::F32, shape), LiteralData::F32(values))
    }

    pub fn from_f64(shape: Shape, values: Vec<f64>) -> BackendResult<Self> {
        Self::new(ArraySpec::new(DType::F64, shape), LiteralData::F64(values))
    }

    pub fn from_i32(shape: Shape, values: Vec<i32>) -> BackendResult<Self> {
        Self::new(ArraySpec::new(DType::I32, shape), LiteralData::I32(values))
    }

    pub fn from_i64(shape: Shape, values: Vec<i64>) -> BackendResult<Self> {
        Self::new(ArraySpec::new(DType::I64, shape), LiteralData::I64(values))
    }
}

/// Initialization payload when materialising arrays on a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ArrayInit {
    Literal(ArrayLiteral),
    Zeroed(ArraySpec),
}

/// Elementwise binary ops shared by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Minimum,
    Maximum,
}

/// Elementwise unary ops shared by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Abs,
}

/// Attribute payload for `stable_divide`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StableDivideSpec {
    pub min_denominator: f64,
}

impl Default for StableDivideSpec {
    fn default() -> Self {
        Self {
            min_denominator: 1e-12,
        }
    }
}

/// Attribute payload for `clip`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipSpec {
    pub min: f64,
    pub max: f64,
}

/// Attribute payload for `clip_vector_norm`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipVectorNormSpec {
    pub max_norm: f64,
    pub p: f64,
}

/// Requested output extents for `reshape`; `-1` infers one extent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReshapeSpec {
    pub new_shape: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandDimsSpec {
    pub axis: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqueezeSpec {
    pub axis: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermuteDimsSpec {
    pub perm: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlipSpec {
    pub axes: Option<Vec<i64>>,
}

/// Attribute payload for `roll`. With `axes: None` a single shift applies to
/// the flattened array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollSpec {
    pub shifts: Vec<i64>,
    pub axes: Option<Vec<i64>>,
}

/// Per-axis `(before, after)` widths for `zero_pad`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZeroPadSpec {
    pub pad_widths: Vec<(usize, usize)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcatSpec {
    pub axis: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackSpec {
    pub axis: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatherSpec {
    pub axis: i64,
}

/// Closed descriptor of one dispatchable operation.
///
/// Backends match on this exhaustively; the dispatch layer never resolves
/// operations through string-keyed lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OpCall {
    Binary(BinaryOp),
    Unary(UnaryOp),
    StableDivide(StableDivideSpec),
    Clip(ClipSpec),
    ClipVectorNorm(ClipVectorNormSpec),
    Reshape(ReshapeSpec),
    ExpandDims(ExpandDimsSpec),
    Squeeze(SqueezeSpec),
    PermuteDims(PermuteDimsSpec),
    Flip(FlipSpec),
    Roll(RollSpec),
    ZeroPad(ZeroPadSpec),
    Concat(ConcatSpec),
    Stack(StackSpec),
    Gather(GatherSpec),
}

impl OpCall {
    /// Stable operation name used in error reports.
    pub fn name(&self) -> &'static str {
        match self {
            OpCall::Binary(BinaryOp::Add) => "add",
            OpCall::Binary(BinaryOp::Sub) => "sub",
            OpCall::Binary(BinaryOp::Mul) => "mul",
            OpCall::Binary(BinaryOp::Div) => "div",
            OpCall::Binary(BinaryOp::Minimum) => "minimum",
            OpCall::Binary(BinaryOp::Maximum) => "maximum",
            OpCall::Unary(UnaryOp::Neg) => "neg",
            OpCall::Unary(UnaryOp::Abs) => "abs",
            OpCall::StableDivide(_) => "stable_divide",
            OpCall::Clip(_) => "clip",
            OpCall::ClipVectorNorm(_) => "clip_vector_norm",
            OpCall::Reshape(_) => "reshape",
            OpCall::ExpandDims(_) => "expand_dims",
            OpCall::Squeeze(_) => "squeeze",
            OpCall::PermuteDims(_) => "permute_dims",
            OpCall::Flip(_) => "flip",
            OpCall::Roll(_) => "roll",
            OpCall::ZeroPad(_) => "zero_pad",
            OpCall::Concat(_) => "concat",
            OpCall::Stack(_) => "stack",
            OpCall::Gather(_) => "gather",
        }
    }

    /// Computes the result spec from the input specs without executing.
    pub fn infer_spec(&self, inputs: &[ArraySpec]) -> BackendResult<ArraySpec> {
        match self {
            OpCall::Binary(_) => {
                let (lhs, rhs) = binary_inputs(self.name(), inputs)?;
                infer_elementwise_pair(self.name(), lhs, rhs)
            }
            OpCall::StableDivide(_) => {
                let (lhs, rhs) = binary_inputs(self.name(), inputs)?;
                if !lhs.dtype.is_float() {
                    return Err(BackendError::invalid(
                        self.name(),
                        format!("requires a float dtype, got {}", lhs.dtype),
                    ));
                }
                infer_elementwise_pair(self.name(), lhs, rhs)
            }
            OpCall::Unary(_) | OpCall::Clip(_) => {
                let input = unary_input(self.name(), inputs)?;
                if input.dtype.is_bool() {
                    return Err(BackendError::invalid(
                        self.name(),
                        "not defined for bool arrays".to_string(),
                    ));
                }
                Ok(input.clone())
            }
            OpCall::ClipVectorNorm(spec) => {
                let input = unary_input(self.name(), inputs)?;
                if !input.dtype.is_float() {
                    return Err(BackendError::invalid(
                        self.name(),
                        format!("requires a float dtype, got {}", input.dtype),
                    ));
                }
                if spec.p <= 0.0 {
                    return Err(BackendError::invalid(
                        self.name(),
                        format!("p must be positive, got {}", spec.p),
                    ));
                }
                Ok(input.clone())
            }
            OpCall::Reshape(spec) => {
                let input = unary_input(self.name(), inputs)?;
                let dims = resolve_reshape_dims(&spec.new_shape, input.element_count())?;
                Ok(ArraySpec::new(input.dtype, Shape::new(dims)))
            }
            OpCall::ExpandDims(spec) => {
                let input = unary_input(self.name(), inputs)?;
                let rank = input.shape.rank();
                let axis = normalize_axis(self.name(), spec.axis, rank + 1)?;
                let mut dims = input.shape.dims().to_vec();
                dims.insert(axis, 1);
                Ok(ArraySpec::new(input.dtype, Shape::new(dims)))
            }
            OpCall::Squeeze(spec) => {
                let input = unary_input(self.name(), inputs)?;
                let dims = input.shape.dims();
                let new_dims = match spec.axis {
                    Some(axis) => {
                        let axis = normalize_axis(self.name(), axis, dims.len())?;
                        if dims[axis] != 1 {
                            return Err(BackendError::invalid(
                                self.name(),
                                format!("axis {axis} has extent {}, expected 1", dims[axis]),
                            ));
                        }
                        let mut out = dims.to_vec();
                        out.remove(axis);
                        out
                    }
                    None => dims.iter().copied().filter(|d| *d != 1).collect(),
                };
                Ok(ArraySpec::new(input.dtype, Shape::new(new_dims)))
            }
            OpCall::PermuteDims(spec) => {
                let input = unary_input(self.name(), inputs)?;
                let dims = input.shape.dims();
                if spec.perm.len() != dims.len() || !is_permutation(&spec.perm) {
                    return Err(BackendError::invalid(
                        self.name(),
                        format!("{:?} is not a permutation of rank {}", spec.perm, dims.len()),
                    ));
                }
                let new_dims: Vec<usize> = spec.perm.iter().map(|&p| dims[p]).collect();
                Ok(ArraySpec::new(input.dtype, Shape::new(new_dims)))
            }
            OpCall::Flip(spec) => {
                let input = unary_input(self.name(), inputs)?;
                if let Some(axes) = &spec.axes {
                    for &axis in axes {
                        normalize_axis(self.name(), axis, input.shape.rank())?;
                    }
                }
                Ok(input.clone())
            }
            OpCall::Roll(spec) => {
                let input = unary_input(self.name(), inputs)?;
                match &spec.axes {
                    Some(axes) => {
                        if axes.len() != spec.shifts.len() {
                            return Err(BackendError::invalid(
                                self.name(),
                                format!(
                                    "{} shifts for {} axes",
                                    spec.shifts.len(),
                                    axes.len()
                                ),
                            ));
                        }
                        for &axis in axes {
                            normalize_axis(self.name(), axis, input.shape.rank())?;
                        }
                    }
                    None => {
                        if spec.shifts.len() != 1 {
                            return Err(BackendError::invalid(
                                self.name(),
                                "a single shift is required when axes is unset".to_string(),
                            ));
                        }
                    }
                }
                Ok(input.clone())
            }
            OpCall::ZeroPad(spec) => {
                let input = unary_input(self.name(), inputs)?;
                let dims = input.shape.dims();
                if spec.pad_widths.len() != dims.len() {
                    return Err(BackendError::invalid(
                        self.name(),
                        format!(
                            "{} pad widths for rank {}",
                            spec.pad_widths.len(),
                            dims.len()
                        ),
                    ));
                }
                let new_dims: Vec<usize> = dims
                    .iter()
                    .zip(&spec.pad_widths)
                    .map(|(&d, &(before, after))| d + before + after)
                    .collect();
                Ok(ArraySpec::new(input.dtype, Shape::new(new_dims)))
            }
            OpCall::Concat(spec) => {
                let first = inputs.first().ok_or_else(|| {
                    BackendError::invalid(self.name(), "at least one input is required".to_string())
                })?;
                let rank = first.shape.rank();
                let axis = normalize_axis(self.name(), spec.axis, rank)?;
                let mut axis_total = 0usize;
                for input in inputs {
                    if input.dtype != first.dtype {
                        return Err(BackendError::invalid(
                            self.name(),
                            format!("mixed dtypes {} and {}", first.dtype, input.dtype),
                        ));
                    }
                    if input.shape.rank() != rank {
                        return Err(BackendError::invalid(
                            self.name(),
                            format!("mixed ranks {} and {}", rank, input.shape.rank()),
                        ));
                    }
                    for (d, (&a, &b)) in first
                        .shape
                        .dims()
                        .iter()
                        .zip(input.shape.dims())
                        .enumerate()
                    {
                        if d != axis && a != b {
                            return Err(BackendError::invalid(
                                self.name(),
                                format!("extent mismatch on axis {d}: {a} vs {b}"),
                            ));
                        }
                    }
                    axis_total += input.shape.dims()[axis];
                }
                let mut dims = first.shape.dims().to_vec();
                dims[axis] = axis_total;
                Ok(ArraySpec::new(first.dtype, Shape::new(dims)))
            }
            OpCall::Stack(spec) => {
                let first = inputs.first().ok_or_else(|| {
                    BackendError::invalid(self.name(), "at least one input is required".to_string())
                })?;
                for input in inputs {
                    if input != first {
                        return Err(BackendError::invalid(
                            self.name(),
                            "all inputs must share dtype and shape".to_string(),
                        ));
                    }
                }
                let axis = normalize_axis(self.name(), spec.axis, first.shape.rank() + 1)?;
                let mut dims = first.shape.dims().to_vec();
                dims.insert(axis, inputs.len());
                Ok(ArraySpec::new(first.dtype, Shape::new(dims)))
            }
            OpCall::Gather(spec) => {
                let (params, indices) = binary_inputs(self.name(), inputs)?;
                if !indices.dtype.is_int() {
                    return Err(BackendError::invalid(
                        self.name(),
                        format!("indices must be integer, got {}", indices.dtype),
                    ));
                }
                let axis = normalize_axis(self.name(), spec.axis, params.shape.rank())?;
                let mut dims = params.shape.dims()[..axis].to_vec();
                dims.extend_from_slice(indices.shape.dims());
                dims.extend_from_slice(&params.shape.dims()[axis + 1..]);
                Ok(ArraySpec::new(params.dtype, Shape::new(dims)))
            }
        }
    }
}

fn unary_input<'a>(op: &'static str, inputs: &'a [ArraySpec]) -> BackendResult<&'a ArraySpec> {
    match inputs {
        [input] => Ok(input),
        _ => Err(BackendError::invalid(
            op,
            format!("expected 1 input, got {}", inputs.len()),
        )),
    }
}

fn binary_inputs<'a>(
    op: &'static str,
    inputs: &'a [ArraySpec],
) -> BackendResult<(&'a ArraySpec, &'a ArraySpec)> {
    match inputs {
        [lhs, rhs] => Ok((lhs, rhs)),
        _ => Err(BackendError::invalid(
            op,
            format!("expected 2 inputs, got {}", inputs.len()),
        )),
    }
}

/// Elementwise pair rule: identical shapes, or one single-element operand
/// broadcast against the other.
fn infer_elementwise_pair(
    op: &'static str,
    lhs: &ArraySpec,
    rhs: &ArraySpec,
) -> BackendResult<ArraySpec> {
    if lhs.dtype != rhs.dtype {
        return Err(BackendError::invalid(
            op,
            format!("mixed dtypes {} and {}", lhs.dtype, rhs.dtype),
        ));
    }
    if lhs.shape == rhs.shape {
        return Ok(lhs.clone());
    }
    if rhs.element_count() == 1 {
        return Ok(lhs.clone());
    }
    if lhs.element_count() == 1 {
        return Ok(rhs.clone());
    }
    Err(BackendError::invalid(
        op,
        format!(
            "shapes {:?} and {:?} are not broadcast-compatible",
            lhs.shape.dims(),
            rhs.shape.dims()
        ),
    ))
}

/// Resolves `-1` placeholders and validates the element count.
fn resolve_reshape_dims(new_shape: &[i64], element_count: usize) -> BackendResult<Vec<usize>> {
    let mut known = 1usize;
    let mut infer_at = None;
    for (i, &d) in new_shape.iter().enumerate() {
        match d {
            -1 => {
                if infer_at.replace(i).is_some() {
                    return Err(BackendError::invalid(
                        "reshape",
                        "at most one extent may be -1".to_string(),
                    ));
                }
            }
            d if d < 0 => {
                return Err(BackendError::invalid(
                    "reshape",
                    format!("negative extent {d}"),
                ));
            }
            d => known *= d as usize,
        }
    }
    let mut dims: Vec<usize> = new_shape.iter().map(|&d| d.max(0) as usize).collect();
    if let Some(i) = infer_at {
        if known == 0 || element_count % known != 0 {
            return Err(BackendError::invalid(
                "reshape",
                format!("cannot infer extent for {new_shape:?} from {element_count} elements"),
            ));
        }
        dims[i] = element_count / known;
    } else if known != element_count {
        return Err(BackendError::invalid(
            "reshape",
            format!("{new_shape:?} does not cover {element_count} elements"),
        ));
    }
    Ok(dims)
}

/// Maps a possibly-negative axis into `0..rank`.
pub fn normalize_axis(op: &'static str, axis: i64, rank: usize) -> BackendResult<usize> {
    let rank_i = rank as i64;
    let resolved = if axis < 0 { axis + rank_i } else { axis };
    if resolved < 0 || resolved >= rank_i {
        return Err(BackendError::invalid(
            op,
            format!("axis {axis} out of range for rank {rank}"),
        ));
    }
    Ok(resolved as usize)
}

fn is_permutation(perm: &[usize]) -> bool {
    let mut seen = vec![false; perm.len()];
    for &p in perm {
        if p >= perm.len() || seen[p] {
            return false;
        }
        seen[p] = true;
    }
    true
}

/// Failure surfaced by a backend routine.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The operation arguments violate the op contract.
    #[error("{op}: {reason}")]
    InvalidOp { op: &'static str, reason: String },
    /// The backend does not implement the requested behavior.
    #[error("{op} is not implemented: {reason}")]
    Unimplemented { op: &'static str, reason: String },
    /// A handle from another backend was passed in.
    #[error("handle does not belong to backend '{backend}'")]
    HandleMismatch { backend: String },
    /// The backend cannot represent the requested dtype.
    #[error("{op}: dtype {dtype} not supported")]
    DTypeNotSupported { op: &'static str, dtype: DType },
    /// Anything that went wrong while executing a kernel.
    #[error("backend execution failure: {message}")]
    Execution { message: String },
}

impl BackendError {
    pub fn invalid(op: &'static str, reason: impl Into<String>) -> Self {
        BackendError::InvalidOp {
            op,
            reason: reason.into(),
        }
    }

    pub fn unimplemented(op: &'static str, reason: impl Into<String>) -> Self {
        BackendError::Unimplemented {
            op,
            reason: reason.into(),
        }
    }

    pub fn handle_mismatch(backend: impl Into<String>) -> Self {
        BackendError::HandleMismatch {
            backend: backend.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        BackendError::Execution {
            message: message.into(),
        }
    }
}

/// Convenience alias for results returned by backend routines.
pub type BackendResult<T> = Result<T, BackendError>;

/// Typed contract implemented by every native backend.
///
/// `Handle` is the backend's native array object. The dispatch layer stores
/// handles verbatim and never inspects their representation.
pub trait PortableBackend: Send + Sync {
    type Handle: Clone + Send + Sync + 'static;

    /// Human-readable backend identifier (e.g. "ref-cpu", "ndarray").
    fn backend_name(&self) -> &str;

    /// Materializes a native handle from host initialization data.
    fn materialize(&self, init: ArrayInit) -> BackendResult<Self::Handle>;

    /// Reads a native handle back into a dense literal.
    fn to_literal(&self, handle: &Self::Handle) -> BackendResult<ArrayLiteral>;

    /// Executes one operation. `out_spec` is the pre-inferred result spec.
    fn execute(
        &self,
        op: &OpCall,
        inputs: &[Self::Handle],
        out_spec: &ArraySpec,
    ) -> BackendResult<Self::Handle>;

    /// Overwrites `dst`'s buffer with `src`'s values without rebinding.
    ///
    /// Backends whose handles are immutable leave the default, and the
    /// wrapper falls back to rebinding the target handle.
    fn copy_into(&self, _dst: &Self::Handle, _src: &Self::Handle) -> BackendResult<()> {
        Err(BackendError::unimplemented(
            "copy_into",
            "backend handles are immutable",
        ))
    }

    /// The dtype table this backend accepts.
    fn supported_dtypes(&self) -> &[DType];

    fn default_float_dtype(&self) -> DType {
        DType::F32
    }

    fn default_int_dtype(&self) -> DType {
        DType::I32
    }

    /// Returns `true` when `dtype` is a float dtype this backend supports.
    fn is_float_dtype(&self, dtype: DType) -> bool {
        dtype.is_float() && self.supported_dtypes().contains(&dtype)
    }

    /// Returns `true` when `dtype` is an integer dtype this backend supports.
    fn is_int_dtype(&self, dtype: DType) -> bool {
        dtype.is_int() && self.supported_dtypes().contains(&dtype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(dtype: DType, dims: &[usize]) -> ArraySpec {
        ArraySpec::new(dtype, Shape::new(dims.to_vec()))
    }

    #[test]
    fn elementwise_pair_broadcasts_single_elements() {
        let a = spec(DType::F32, &[2, 3]);
        let b = spec(DType::F32, &[1]);
        let out = OpCall::Binary(BinaryOp::Add)
            .infer_spec(&[a.clone(), b])
            .unwrap();
        assert_eq!(out, a);
    }

    #[test]
    fn elementwise_pair_rejects_mixed_dtypes() {
        let a = spec(DType::F32, &[2]);
        let b = spec(DType::F64, &[2]);
        let err = OpCall::Binary(BinaryOp::Add).infer_spec(&[a, b]).unwrap_err();
        assert!(matches!(err, BackendError::InvalidOp { op: "add", .. }));
    }

    #[test]
    fn reshape_infers_single_placeholder() {
        let input = spec(DType::I64, &[2, 6]);
        let out = OpCall::Reshape(ReshapeSpec {
            new_shape: vec![3, -1],
        })
        .infer_spec(&[input])
        .unwrap();
        assert_eq!(out.shape.dims(), &[3, 4]);
    }

    #[test]
    fn concat_sums_along_axis() {
        let a = spec(DType::F32, &[2, 3]);
        let b = spec(DType::F32, &[2, 5]);
        let out = OpCall::Concat(ConcatSpec { axis: 1 })
            .infer_spec(&[a, b])
            .unwrap();
        assert_eq!(out.shape.dims(), &[2, 8]);
    }

    #[test]
    fn gather_splices_index_shape() {
        let params = spec(DType::F32, &[4, 5]);
        let indices = spec(DType::I64, &[3]);
        let out = OpCall::Gather(GatherSpec { axis: 0 })
            .infer_spec(&[params, indices])
            .unwrap();
        assert_eq!(out.shape.dims(), &[3, 5]);
    }

    #[test]
    fn roll_requires_matching_shift_count() {
        let input = spec(DType::F32, &[2, 2]);
        let err = OpCall::Roll(RollSpec {
            shifts: vec![1],
            axes: Some(vec![0, 1]),
        })
        .infer_spec(&[input])
        .unwrap_err();
        assert!(matches!(err, BackendError::InvalidOp { op: "roll", .. }));
    }
}
