//! Runtime backend registry for dynamic backend selection.
//!
//! Backends register themselves by name (from any crate, including external
//! ones) and are instantiated on demand. The registry is the only place that
//! knows how to turn a backend name into a live module; the resolver builds
//! its active-backend stack on top of it.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use super::spec::{
    ArrayInit, ArrayLiteral, ArraySpec, BackendError, BackendResult, DType, OpCall,
    PortableBackend,
};

/// Type-erased native array handle.
///
/// `Arc` rather than `Box` so the wrapper can alias a handle into an `out=`
/// target and so cloning an [`crate::Array`] never copies device data.
pub type ArrayHandle = Arc<dyn Any + Send + Sync>;

/// Factory function that creates a new backend instance.
pub type BackendConstructor = Box<dyn Fn() -> Box<dyn ErasedBackend> + Send + Sync>;

/// Object-safe backend trait used for dynamic dispatch.
///
/// Each method works with type-erased handles that get downcast internally;
/// a handle minted by one backend is rejected by every other.
pub trait ErasedBackend: Send + Sync {
    /// Human-readable backend identifier (e.g. "ref-cpu", "ndarray").
    fn backend_name(&self) -> &str;

    /// Materializes a native handle from host initialization data.
    fn materialize(&self, init: ArrayInit) -> BackendResult<ArrayHandle>;

    /// Reads a handle back into a dense literal.
    fn to_literal(&self, handle: &ArrayHandle) -> BackendResult<ArrayLiteral>;

    /// Executes a single operation with type-erased handles.
    fn execute(
        &self,
        op: &OpCall,
        inputs: &[ArrayHandle],
        out_spec: &ArraySpec,
    ) -> BackendResult<ArrayHandle>;

    /// Overwrites `dst`'s native buffer with `src`'s values.
    fn copy_into(&self, dst: &ArrayHandle, src: &ArrayHandle) -> BackendResult<()>;

    /// Returns `true` when `handle` was minted by this backend.
    fn owns_handle(&self, handle: &ArrayHandle) -> bool;

    /// The dtype table this backend accepts.
    fn supported_dtypes(&self) -> &[DType];

    fn default_float_dtype(&self) -> DType;

    fn default_int_dtype(&self) -> DType;

    /// Clone this backend as a trait object.
    fn clone_backend(&self) -> Box<dyn ErasedBackend>;

    /// Downcast to `Any` for type recovery when needed.
    fn as_any(&self) -> &dyn Any;
}

/// Wrapper that implements [`ErasedBackend`] for any concrete [`PortableBackend`].
pub struct BackendWrapper<B: PortableBackend> {
    inner: Arc<B>,
}

impl<B: PortableBackend> BackendWrapper<B> {
    pub fn new(backend: B) -> Self {
        Self {
            inner: Arc::new(backend),
        }
    }

    /// Get a reference to the inner backend.
    pub fn backend(&self) -> &Arc<B> {
        &self.inner
    }

    fn downcast<'a>(&self, handle: &'a ArrayHandle) -> BackendResult<&'a B::Handle> {
        handle
            .downcast_ref::<B::Handle>()
            .ok_or_else(|| BackendError::handle_mismatch(self.inner.backend_name()))
    }
}

impl<B: PortableBackend + 'static> ErasedBackend for BackendWrapper<B> {
    fn backend_name(&self) -> &str {
        self.inner.backend_name()
    }

    fn materialize(&self, init: ArrayInit) -> BackendResult<ArrayHandle> {
        let handle = self.inner.materialize(init)?;
        Ok(Arc::new(handle) as ArrayHandle)
    }

    fn to_literal(&self, handle: &ArrayHandle) -> BackendResult<ArrayLiteral> {
        self.inner.to_literal(self.downcast(handle)?)
    }

    fn execute(
        &self,
        op: &OpCall,
        inputs: &[ArrayHandle],
        out_spec: &ArraySpec,
    ) -> BackendResult<ArrayHandle> {
        let mut typed_inputs = Vec::with_capacity(inputs.len());
        for handle in inputs {
            typed_inputs.push(self.downcast(handle)?.clone());
        }
        let output = self.inner.execute(op, &typed_inputs, out_spec)?;
        Ok(Arc::new(output) as ArrayHandle)
    }

    fn copy_into(&self, dst: &ArrayHandle, src: &ArrayHandle) -> BackendResult<()> {
        self.inner.copy_into(self.downcast(dst)?, self.downcast(src)?)
    }

    fn owns_handle(&self, handle: &ArrayHandle) -> bool {
        handle.downcast_ref::<B::Handle>().is_some()
    }

    fn supported_dtypes(&self) -> &[DType] {
        self.inner.supported_dtypes()
    }

    fn default_float_dtype(&self) -> DType {
        self.inner.default_float_dtype()
    }

    fn default_int_dtype(&self) -> DType {
        self.inner.default_int_dtype()
    }

    fn clone_backend(&self) -> Box<dyn ErasedBackend> {
        Box::new(BackendWrapper {
            inner: Arc::clone(&self.inner),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Global backend registry mapping backend names to constructors.
struct BackendRegistry {
    backends: RwLock<HashMap<String, BackendConstructor>>,
}

impl BackendRegistry {
    fn new() -> Self {
        Self {
            backends: RwLock::new(HashMap::new()),
        }
    }

    fn register(&self, name: String, constructor: BackendConstructor) {
        log::debug!("registering backend '{name}'");
        self.backends.write().unwrap().insert(name, constructor);
    }

    fn create(&self, name: &str) -> Option<Box<dyn ErasedBackend>> {
        let registry = self.backends.read().unwrap();
        let constructor = registry.get(name)?;
        Some(constructor())
    }

    fn list_backends(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.read().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    fn has_backend(&self, name: &str) -> bool {
        self.backends.read().unwrap().contains_key(name)
    }
}

static GLOBAL_REGISTRY: OnceLock<BackendRegistry> = OnceLock::new();

fn global_registry() -> &'static BackendRegistry {
    GLOBAL_REGISTRY.get_or_init(BackendRegistry::new)
}

/// Register a backend by name with a constructor function.
///
/// The constructor is called each time the backend is requested via
/// [`create_backend`]. External crates register their backends by calling
/// this from a module initializer.
pub fn register_backend<F>(name: impl Into<String>, constructor: F)
where
    F: Fn() -> Box<dyn ErasedBackend> + Send + Sync + 'static,
{
    global_registry().register(name.into(), Box::new(constructor));
}

/// Register a concrete [`PortableBackend`] implementation.
///
/// Convenience wrapper that handles the [`BackendWrapper`] boilerplate.
pub fn register_portable_backend<B, F>(name: impl Into<String>, constructor: F)
where
    B: PortableBackend + 'static,
    F: Fn() -> B + Send + Sync + 'static,
{
    register_backend(name, move || Box::new(BackendWrapper::new(constructor())));
}

/// Create a backend instance by name.
///
/// Returns `None` if no backend with the given name has been registered.
pub fn create_backend(name: &str) -> Option<Box<dyn ErasedBackend>> {
    global_registry().create(name)
}

/// List all registered backend names.
pub fn list_backends() -> Vec<String> {
    global_registry().list_backends()
}

/// Check if a backend with the given name is registered.
pub fn has_backend(name: &str) -> bool {
    global_registry().has_backend(name)
}

/// Helper to access the typed backend behind a [`BackendWrapper`].
pub fn get_typed_backend<B: PortableBackend + 'static>(
    backend: &dyn ErasedBackend,
) -> Option<Arc<B>> {
    backend
        .as_any()
        .downcast_ref::<BackendWrapper<B>>()
        .map(|wrapper| Arc::clone(wrapper.backend()))
}
