//! `out=` semantics across the two mutability models: handle rebinding on
//! the immutable reference backend, native buffer writes on ndarray.

use std::sync::{Mutex, MutexGuard, PoisonError};

use uniray::{Array, ArraySpec, BackendScope, DType, Error, LiteralData, Shape};

static LOCK: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    uniray_backend_ref_cpu::register_ref_cpu_backend();
    uniray_backend_ndarray::register_ndarray_backend();
    LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

fn f32_values(array: &Array) -> Vec<f32> {
    match array.to_literal().unwrap().data {
        LiteralData::F32(v) => v,
        other => panic!("expected f32 data, got {:?}", other.dtype()),
    }
}

#[test]
fn rebind_fallback_leaves_old_aliases_untouched() {
    let _guard = serial();
    let _scope = BackendScope::enter("ref-cpu").unwrap();
    let a = Array::from_f32(vec![3], vec![1.0, 2.0, 3.0]).unwrap();
    let b = Array::from_f32(vec![3], vec![10.0, 20.0, 30.0]).unwrap();
    let mut out = Array::zeros(a.spec().clone()).unwrap();
    let stale = out.clone();

    let ret = a.add_into(&b, &mut out).unwrap();
    assert!(ret.shares_handle(&out));
    assert_eq!(f32_values(&out), vec![11.0, 22.0, 33.0]);
    // The reference backend's buffers are immutable: the old handle still
    // holds zeros after the rebind.
    assert_eq!(f32_values(&stale), vec![0.0, 0.0, 0.0]);
    assert!(!stale.shares_handle(&out));
}

#[test]
fn native_write_updates_every_alias() {
    let _guard = serial();
    let _scope = BackendScope::enter("ndarray").unwrap();
    let a = Array::from_f32(vec![3], vec![1.0, 2.0, 3.0]).unwrap();
    let b = Array::from_f32(vec![3], vec![10.0, 20.0, 30.0]).unwrap();
    let mut out = Array::zeros(a.spec().clone()).unwrap();
    let alias = out.clone();

    let ret = a.add_into(&b, &mut out).unwrap();
    assert!(ret.shares_handle(&out));
    assert_eq!(f32_values(&out), vec![11.0, 22.0, 33.0]);
    // ndarray handles share one guarded buffer: the alias observes the
    // in-place write, native-framework style.
    assert_eq!(f32_values(&alias), vec![11.0, 22.0, 33.0]);
    assert!(alias.shares_handle(&out));
}

#[test]
fn incompatible_out_shape_fails_before_execution() {
    let _guard = serial();
    let _scope = BackendScope::enter("ref-cpu").unwrap();
    let a = Array::from_f32(vec![2, 3], vec![0.0; 6]).unwrap();
    let mut out = Array::zeros(ArraySpec::new(DType::F32, Shape::new(vec![3, 3]))).unwrap();
    let err = a.roll_into(&[1], Some(&[0]), &mut out).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));
    // The target is untouched by the failed call.
    assert_eq!(f32_values(&out), vec![0.0; 9]);
}

#[test]
fn out_values_match_the_plain_call() {
    let _guard = serial();
    let _scope = BackendScope::enter("ref-cpu").unwrap();
    let a = Array::from_f32(vec![4], vec![3.0, -1.0, 0.5, 2.0]).unwrap();
    let mut out = Array::zeros(a.spec().clone()).unwrap();
    let ret = a.clip_into(-0.5, 1.0, &mut out).unwrap();
    assert!(ret.shares_handle(&out));
    assert_eq!(f32_values(&ret), f32_values(&a.clip(-0.5, 1.0).unwrap()));
}

#[test]
fn assign_prefers_native_writes() {
    let _guard = serial();
    let _scope = BackendScope::enter("ndarray").unwrap();
    let src = Array::from_f32(vec![2], vec![7.0, 8.0]).unwrap();
    let mut dst = Array::zeros(src.spec().clone()).unwrap();
    let alias = dst.clone();
    dst.assign(&src).unwrap();
    assert_eq!(f32_values(&dst), vec![7.0, 8.0]);
    assert_eq!(f32_values(&alias), vec![7.0, 8.0]);
}

#[test]
fn integer_dtypes_are_rejected_by_the_float_backend() {
    let _guard = serial();
    let _scope = BackendScope::enter("ndarray").unwrap();
    match Array::from_i32(vec![2], vec![1, 2]) {
        Err(Error::UnsupportedDtypeOrDevice { backend, dtype }) => {
            assert_eq!(backend, "ndarray");
            assert_eq!(dtype, DType::I32);
        }
        other => panic!("expected unsupported dtype, got {other:?}"),
    }
    // 64-bit integers are in the table.
    assert!(Array::from_i64(vec![2], vec![1, 2]).is_ok());
}
