//! Cross-backend parity: the same program through "ref-cpu" and "ndarray"
//! must produce identical host values.

use uniray::{Array, BackendScope, Container, LiteralData, Value};

fn register_all() {
    uniray_backend_ref_cpu::register_ref_cpu_backend();
    uniray_backend_ndarray::register_ndarray_backend();
}

fn f32_values(array: &Array) -> Vec<f32> {
    match array.to_literal().unwrap().data {
        LiteralData::F32(v) => v,
        other => panic!("expected f32 data, got {:?}", other.dtype()),
    }
}

/// Runs one mixed workload on the named backend and flattens the results.
fn run_workload(backend: &str) -> Vec<Vec<f32>> {
    let _guard = uniray_backend_tests::suite_lock();
    let _scope = BackendScope::enter(backend).unwrap();

    let container = Container::from_pairs([
        (
            "weights",
            Container::from_pairs([
                ("w", Array::from_f32(vec![2, 3], vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap()),
                ("b", Array::from_f32(vec![3], vec![0.5, -0.5, 1.5]).unwrap()),
            ]),
        ),
        (
            "stats",
            Container::from_pairs([(
                "mean",
                Array::from_f32(vec![3], vec![3.0, 4.0, 0.0]).unwrap(),
            )]),
        ),
    ]);

    let shifted = container.roll(&[1], None).unwrap();
    let scaled = shifted.mul(2.0_f64).unwrap();
    let clipped = scaled.clip(-4.0, 4.0).unwrap();
    let normed = clipped.clip_vector_norm(3.0, 2.0).unwrap();

    let mut out = Vec::new();
    for chain in normed.key_chains() {
        match normed.at_key_chain(&chain).unwrap() {
            Value::Array(array) => out.push(f32_values(array)),
            other => panic!("unexpected leaf {other:?}"),
        }
    }
    out
}

#[test]
fn workload_matches_across_backends() {
    register_all();
    let reference = run_workload("ref-cpu");
    let ndarray = run_workload("ndarray");
    assert_eq!(reference.len(), ndarray.len());
    for (a, b) in reference.iter().zip(&ndarray) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-6, "parity drift: {x} vs {y}");
        }
    }
}

#[test]
fn gather_parity() {
    register_all();
    let results: Vec<Vec<f32>> = ["ref-cpu", "ndarray"]
        .iter()
        .map(|backend| {
            let _guard = uniray_backend_tests::suite_lock();
            let _scope = BackendScope::enter(backend).unwrap();
            let params =
                Array::from_f32(vec![4, 2], vec![0., 1., 10., 11., 20., 21., 30., 31.]).unwrap();
            let indices = Array::from_i64(vec![3], vec![3, 0, -1]).unwrap();
            f32_values(&params.gather(&indices, 0).unwrap())
        })
        .collect();
    assert_eq!(results[0], results[1]);
}
