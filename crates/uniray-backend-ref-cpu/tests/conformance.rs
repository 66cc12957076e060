uniray_backend_tests::define_backend_tests!(
    ref_cpu_conformance,
    uniray_backend_ref_cpu::register_ref_cpu_backend,
    "ref-cpu"
);
