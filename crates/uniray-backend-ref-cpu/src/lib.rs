pub mod cpu;

pub use cpu::{BufferData, CpuArray, RefCpuBackend};

/// Register the reference CPU backend with the global backend registry.
///
/// Called automatically via a static initializer, but can also be invoked
/// manually to make registration explicit. The backend answers to both
/// "ref-cpu" and "cpu".
pub fn register_ref_cpu_backend() {
    uniray::register_portable_backend("ref-cpu", RefCpuBackend::new);
    uniray::register_portable_backend("cpu", RefCpuBackend::new);
}

// Auto-register on library load
#[cfg(not(target_family = "wasm"))]
#[used]
#[link_section = ".init_array"]
static REGISTER_REF_CPU_BACKEND: extern "C" fn() = {
    extern "C" fn register() {
        register_ref_cpu_backend();
    }
    register
};
