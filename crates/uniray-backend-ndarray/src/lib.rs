pub mod nd;

pub use nd::{NdArrayBackend, NdData, NdHandle};

/// Register the ndarray backend with the global backend registry.
pub fn register_ndarray_backend() {
    uniray::register_portable_backend("ndarray", NdArrayBackend::new);
}

// Auto-register on library load
#[cfg(not(target_family = "wasm"))]
#[used]
#[link_section = ".init_array"]
static REGISTER_NDARRAY_BACKEND: extern "C" fn() = {
    extern "C" fn register() {
        register_ndarray_backend();
    }
    register
};
