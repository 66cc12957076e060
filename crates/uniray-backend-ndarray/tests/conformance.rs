uniray_backend_tests::define_backend_tests!(
    ndarray_conformance,
    uniray_backend_ndarray::register_ndarray_backend,
    "ndarray"
);
