//! Public error taxonomy. Every failure propagates immediately to the
//! caller; nothing in this layer retries.

use thiserror::Error;

use crate::backend::spec::{BackendError, DType, Shape};

#[derive(Debug, Error)]
pub enum Error {
    /// The requested backend is not registered (native dependency missing
    /// or the backend crate was never linked in).
    #[error("backend '{name}' is not available")]
    UnavailableBackend { name: String },

    /// An `out=` target's shape is incompatible with the computed result.
    #[error("out shape {found} is incompatible with result shape {expected}")]
    ShapeMismatch { expected: Shape, found: Shape },

    /// Containers walked in lockstep diverge in key structure.
    #[error("container structure mismatch at '{key_chain}': {reason}")]
    StructureMismatch { key_chain: String, reason: String },

    /// A merge target addresses a key-chain the result does not carry.
    #[error("key chain '{key_chain}' missing from {context}")]
    KeyChainMismatch { key_chain: String, context: String },

    /// The active backend declares the dtype unsupported.
    #[error("backend '{backend}' does not support dtype {dtype}")]
    UnsupportedDtypeOrDevice { backend: String, dtype: DType },

    /// A leaf value that the requested operation cannot act on.
    #[error("invalid value: {reason}")]
    InvalidValue { reason: String },

    /// Failure reported by the backend itself.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl Error {
    pub(crate) fn structure_mismatch(key_chain: &str, reason: impl Into<String>) -> Self {
        Error::StructureMismatch {
            key_chain: key_chain.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn key_chain_mismatch(key_chain: &str, context: impl Into<String>) -> Self {
        Error::KeyChainMismatch {
            key_chain: key_chain.to_string(),
            context: context.into(),
        }
    }

    pub(crate) fn invalid_value(reason: impl Into<String>) -> Self {
        Error::InvalidValue {
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
