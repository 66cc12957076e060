//! Value type wrapping one native array handle.
//!
//! An [`Array`] couples a type-erased native handle with its spec and the
//! backend that minted it. Handles are stored verbatim: construction never
//! copies or normalizes dtype. Every operation flows through one funnel that
//! infers the result spec, validates dtype support and any `out=` target,
//! and only then executes on the backend.

mod ops;

use std::fmt;
use std::sync::Arc;

use crate::backend::registry::{ArrayHandle, ErasedBackend};
use crate::backend::resolver::current_backend;
use crate::backend::spec::{
    ArrayInit, ArrayLiteral, ArraySpec, BackendError, DType, LiteralData, OpCall, Shape,
};
use crate::error::{Error, Result};

/// Wraps exactly one native array handle together with its metadata.
pub struct Array {
    backend: Arc<dyn ErasedBackend>,
    spec: ArraySpec,
    handle: ArrayHandle,
}

impl Clone for Array {
    fn clone(&self) -> Self {
        Array {
            backend: Arc::clone(&self.backend),
            spec: self.spec.clone(),
            handle: Arc::clone(&self.handle),
        }
    }
}

impl Array {
    /// Wraps an existing native handle verbatim, without copying.
    ///
    /// Fails when the handle was minted by a different backend.
    pub fn from_native(
        backend: Arc<dyn ErasedBackend>,
        spec: ArraySpec,
        handle: ArrayHandle,
    ) -> Result<Self> {
        if !backend.owns_handle(&handle) {
            return Err(BackendError::handle_mismatch(backend.backend_name()).into());
        }
        Ok(Array {
            backend,
            spec,
            handle,
        })
    }

    /// Materializes a literal on the given backend.
    pub fn from_literal_on(
        backend: Arc<dyn ErasedBackend>,
        literal: ArrayLiteral,
    ) -> Result<Self> {
        let dtype = literal.spec.dtype;
        if !backend.supported_dtypes().contains(&dtype) {
            return Err(Error::UnsupportedDtypeOrDevice {
                backend: backend.backend_name().to_string(),
                dtype,
            });
        }
        let spec = literal.spec.clone();
        let handle = backend.materialize(ArrayInit::Literal(literal))?;
        Ok(Array {
            backend,
            spec,
            handle,
        })
    }

    /// Materializes a literal on the active backend.
    pub fn from_literal(literal: ArrayLiteral) -> Result<Self> {
        Self::from_literal_on(current_backend()?, literal)
    }

    /// Zero-filled array of the given spec on the active backend.
    pub fn zeros(spec: ArraySpec) -> Result<Self> {
        let backend = current_backend()?;
        if !backend.supported_dtypes().contains(&spec.dtype) {
            return Err(Error::UnsupportedDtypeOrDevice {
                backend: backend.backend_name().to_string(),
                dtype: spec.dtype,
            });
        }
        let handle = backend.materialize(ArrayInit::Zeroed(spec.clone()))?;
        Ok(Array {
            backend,
            spec,
            handle,
        })
    }

    pub fn from_f32(shape: impl Into<Vec<usize>>, values: Vec<f32>) -> Result<Self> {
        Self::from_literal(ArrayLiteral::from_f32(Shape::new(shape.into()), values)?)
    }

    pub fn from_f64(shape: impl Into<Vec<usize>>, values: Vec<f64>) -> Result<Self> {
        Self::from_literal(ArrayLiteral::from_f64(Shape::new(shape.into()), values)?)
    }

    pub fn from_i32(shape: impl Into<Vec<usize>>, values: Vec<i32>) -> Result<Self> {
        Self::from_literal(ArrayLiteral::from_i32(Shape::new(shape.into()), values)?)
    }

    pub fn from_i64(shape: impl Into<Vec<usize>>, values: Vec<i64>) -> Result<Self> {
        Self::from_literal(ArrayLiteral::from_i64(Shape::new(shape.into()), values)?)
    }

    /// Single-element scalar array on the active backend, using the
    /// backend's default dtype for the scalar kind.
    pub fn scalar_f64(value: f64) -> Result<Self> {
        let backend = current_backend()?;
        let dtype = backend.default_float_dtype();
        Self::scalar_on(backend, dtype, value)
    }

    pub fn scalar_i64(value: i64) -> Result<Self> {
        let backend = current_backend()?;
        let dtype = backend.default_int_dtype();
        Self::scalar_on(backend, dtype, value as f64)
    }

    /// Single-element scalar array of an explicit dtype.
    pub fn scalar_on(
        backend: Arc<dyn ErasedBackend>,
        dtype: DType,
        value: f64,
    ) -> Result<Self> {
        let data = match dtype {
            DType::Bool => LiteralData::Bool(vec![value != 0.0]),
            DType::I32 => LiteralData::I32(vec![value as i32]),
            DType::I64 => LiteralData::I64(vec![value as i64]),
            DType::F32 => LiteralData::F32(vec![value as f32]),
            DType::F64 => LiteralData::F64(vec![value]),
        };
        let literal = ArrayLiteral::new(ArraySpec::new(dtype, Shape::scalar()), data)?;
        Self::from_literal_on(backend, literal)
    }

    pub fn spec(&self) -> &ArraySpec {
        &self.spec
    }

    pub fn shape(&self) -> &Shape {
        &self.spec.shape
    }

    pub fn dtype(&self) -> DType {
        self.spec.dtype
    }

    /// The backend that owns this array's handle.
    pub fn backend(&self) -> Arc<dyn ErasedBackend> {
        Arc::clone(&self.backend)
    }

    /// The wrapped native handle.
    pub fn native_handle(&self) -> &ArrayHandle {
        &self.handle
    }

    /// Copies the array back to the host as a dense literal.
    pub fn to_literal(&self) -> Result<ArrayLiteral> {
        Ok(self.backend.to_literal(&self.handle)?)
    }

    /// `true` when both wrappers point at the same native handle.
    pub fn shares_handle(&self, other: &Array) -> bool {
        Arc::ptr_eq(&self.handle, &other.handle)
    }

    /// Overwrites this array in place with `src`'s values.
    ///
    /// Uses the backend's native in-place write when the specs line up and
    /// the backend supports it; otherwise rebinds the wrapped handle to
    /// `src`'s, sharing its buffer.
    pub fn assign(&mut self, src: &Array) -> Result<()> {
        if self.spec == src.spec
            && Arc::ptr_eq(&self.backend, &src.backend)
            && self.backend.owns_handle(&self.handle)
        {
            match self.backend.copy_into(&self.handle, &src.handle) {
                Ok(()) => return Ok(()),
                Err(BackendError::Unimplemented { .. }) => {}
                Err(err) => return Err(err.into()),
            }
        }
        self.backend = Arc::clone(&src.backend);
        self.spec = src.spec.clone();
        self.handle = Arc::clone(&src.handle);
        Ok(())
    }

    /// The single funnel behind every array operation.
    ///
    /// Infers the result spec first so `out=` targets are validated before
    /// anything executes, then dispatches to the backend owning the first
    /// input's handle. With `out` supplied, the target is overwritten in
    /// place (native write, or handle rebind as fallback) and the returned
    /// array aliases the target's handle.
    pub(crate) fn eval(op: &OpCall, inputs: &[&Array], out: Option<&mut Array>) -> Result<Array> {
        let primary = inputs
            .first()
            .ok_or_else(|| BackendError::invalid(op.name(), "no inputs"))?;
        let backend = Arc::clone(&primary.backend);

        for input in inputs {
            if !backend.supported_dtypes().contains(&input.dtype()) {
                return Err(Error::UnsupportedDtypeOrDevice {
                    backend: backend.backend_name().to_string(),
                    dtype: input.dtype(),
                });
            }
            if !Arc::ptr_eq(&input.backend, &backend) {
                return Err(BackendError::handle_mismatch(backend.backend_name()).into());
            }
        }

        let specs: Vec<ArraySpec> = inputs.iter().map(|a| a.spec.clone()).collect();
        let out_spec = op.infer_spec(&specs)?;

        if let Some(target) = &out {
            if target.shape() != &out_spec.shape {
                return Err(Error::ShapeMismatch {
                    expected: out_spec.shape.clone(),
                    found: target.shape().clone(),
                });
            }
        }

        let handles: Vec<ArrayHandle> = inputs.iter().map(|a| Arc::clone(&a.handle)).collect();
        let result = backend.execute(op, &handles, &out_spec)?;

        match out {
            None => Ok(Array {
                backend,
                spec: out_spec,
                handle: result,
            }),
            Some(target) => {
                let native_target = Arc::ptr_eq(&target.backend, &backend)
                    && backend.owns_handle(&target.handle);
                if native_target {
                    match backend.copy_into(&target.handle, &result) {
                        Ok(()) => {
                            target.spec = out_spec;
                            return Ok(target.clone());
                        }
                        Err(BackendError::Unimplemented { .. }) => {
                            log::debug!(
                                "backend '{}' has no native in-place write for {}; rebinding",
                                backend.backend_name(),
                                op.name()
                            );
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
                target.backend = backend;
                target.spec = out_spec;
                target.handle = result;
                Ok(target.clone())
            }
        }
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("backend", &self.backend.backend_name())
            .field("dtype", &self.spec.dtype)
            .field("shape", &self.spec.shape.dims())
            .finish()
    }
}

/// Value equality: same spec and identical host values. Read-back failures
/// compare as unequal.
impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        if self.spec != other.spec {
            return false;
        }
        if self.shares_handle(other) {
            return true;
        }
        match (self.to_literal(), other.to_literal()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}
