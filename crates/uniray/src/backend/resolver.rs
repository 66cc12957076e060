//! Active-backend selection: a process-wide stack of backend activations.
//!
//! `set_backend` pushes, `unset_backend` pops, and `current_backend` answers
//! every dispatch until the stack changes. Instances are cached per name so
//! repeated activation of the same backend yields the same module.
//!
//! Backend switching is not thread-safe by design: callers use one backend
//! per process or serialize switches externally. The interior lock only
//! exists because Rust statics must be `Sync`.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use super::registry::{create_backend, ErasedBackend};
use crate::env;
use crate::error::{Error, Result};

struct ResolverState {
    /// One cached instance per backend name.
    cache: HashMap<String, Arc<dyn ErasedBackend>>,
    /// Activation stack; the top answers `current_backend`.
    stack: Vec<Arc<dyn ErasedBackend>>,
}

static STATE: OnceLock<RwLock<ResolverState>> = OnceLock::new();

fn state() -> &'static RwLock<ResolverState> {
    STATE.get_or_init(|| {
        RwLock::new(ResolverState {
            cache: HashMap::new(),
            stack: Vec::new(),
        })
    })
}

fn resolve_cached(state: &mut ResolverState, name: &str) -> Result<Arc<dyn ErasedBackend>> {
    if let Some(backend) = state.cache.get(name) {
        return Ok(Arc::clone(backend));
    }
    let backend: Arc<dyn ErasedBackend> = create_backend(name)
        .ok_or_else(|| Error::UnavailableBackend {
            name: name.to_string(),
        })?
        .into();
    state.cache.insert(name.to_string(), Arc::clone(&backend));
    Ok(backend)
}

/// Activates the named backend for all subsequent dispatch calls.
///
/// Pushes onto the activation stack; a failed lookup leaves the stack
/// untouched and reports [`Error::UnavailableBackend`].
pub fn set_backend(name: &str) -> Result<Arc<dyn ErasedBackend>> {
    let mut guard = state().write().unwrap();
    let backend = resolve_cached(&mut guard, name)?;
    log::debug!("activating backend '{name}'");
    guard.stack.push(Arc::clone(&backend));
    Ok(backend)
}

/// Pops the most recent activation, restoring the previous backend (or the
/// configured default when the stack empties). Returns the popped backend.
pub fn unset_backend() -> Option<Arc<dyn ErasedBackend>> {
    let popped = state().write().unwrap().stack.pop();
    if let Some(backend) = &popped {
        log::debug!("deactivating backend '{}'", backend.backend_name());
    }
    popped
}

/// The backend answering dispatch right now: the top of the activation
/// stack, or the configured default (`UNIRAY_BACKEND`, else "ref-cpu").
pub fn current_backend() -> Result<Arc<dyn ErasedBackend>> {
    let mut guard = state().write().unwrap();
    if let Some(backend) = guard.stack.last() {
        return Ok(Arc::clone(backend));
    }
    let name = env::default_backend_name().to_string();
    resolve_cached(&mut guard, &name)
}

/// Scoped backend activation with guaranteed LIFO restoration.
///
/// The previous backend is restored when the guard drops, on every exit
/// path including `?` returns and panics.
#[must_use = "the previous backend is restored when the scope is dropped"]
pub struct BackendScope {
    backend: Arc<dyn ErasedBackend>,
}

impl BackendScope {
    /// Enters a scope in which `name` is the active backend.
    pub fn enter(name: &str) -> Result<Self> {
        let backend = set_backend(name)?;
        Ok(BackendScope { backend })
    }

    /// The backend activated by this scope.
    pub fn backend(&self) -> Arc<dyn ErasedBackend> {
        Arc::clone(&self.backend)
    }
}

impl Drop for BackendScope {
    fn drop(&mut self) {
        unset_backend();
    }
}
