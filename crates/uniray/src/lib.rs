//! uniray: one array/container API over interchangeable numerical backends.
//!
//! Backends register by name, the resolver picks the active one at runtime
//! (with scoped, exception-safe overrides), [`Array`] proxies a single
//! native handle, and [`Container`] applies operations across arbitrarily
//! nested trees of arrays while preserving structure.

pub mod array;
pub mod backend;
pub mod container;
mod env;
pub mod error;
pub mod ops;

pub use array::Array;
pub use backend::registry::{
    create_backend, has_backend, list_backends, register_backend, register_portable_backend,
    ArrayHandle, ErasedBackend,
};
pub use backend::resolver::{current_backend, set_backend, unset_backend, BackendScope};
pub use backend::spec::{
    ArrayInit, ArrayLiteral, ArraySpec, BackendError, BackendResult, DType, LiteralData, OpCall,
    PortableBackend, Shape,
};
pub use container::{Container, MapPolicy, Scalar, Value};
pub use error::{Error, Result};
