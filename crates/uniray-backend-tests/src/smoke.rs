//! Backend-agnostic conformance cases.
//!
//! Every case activates the backend under test through a [`BackendScope`],
//! drives the public `Array`/`Container` API, and checks values against
//! hand-computed references.

use uniray::{Array, ArrayLiteral, BackendScope, Container, DType, Error, LiteralData, Shape};

fn f32_values(array: &Array) -> Vec<f32> {
    match array.to_literal().unwrap().data {
        LiteralData::F32(v) => v,
        other => panic!("expected f32 data, got {:?}", other.dtype()),
    }
}

fn f32_array(dims: &[usize], values: &[f32]) -> Array {
    Array::from_f32(dims.to_vec(), values.to_vec()).unwrap()
}

pub fn literal_roundtrip(backend: &str) {
    let _scope = BackendScope::enter(backend).unwrap();
    let literal = ArrayLiteral::from_f32(Shape::new(vec![2, 3]), vec![0.5; 6]).unwrap();
    let array = Array::from_literal(literal.clone()).unwrap();
    assert_eq!(array.dtype(), DType::F32);
    assert_eq!(array.shape().dims(), &[2, 3]);
    assert_eq!(array.to_literal().unwrap(), literal);
}

pub fn elementwise_matches_reference(backend: &str) {
    let _scope = BackendScope::enter(backend).unwrap();
    let a = f32_array(&[4], &[1.0, -2.0, 3.0, -4.0]);
    let b = f32_array(&[4], &[2.0, 2.0, 2.0, 2.0]);

    assert_eq!(f32_values(&a.add(&b).unwrap()), vec![3.0, 0.0, 5.0, -2.0]);
    assert_eq!(f32_values(&a.sub(&b).unwrap()), vec![-1.0, -4.0, 1.0, -6.0]);
    assert_eq!(f32_values(&a.mul(&b).unwrap()), vec![2.0, -4.0, 6.0, -8.0]);
    assert_eq!(f32_values(&a.div(&b).unwrap()), vec![0.5, -1.0, 1.5, -2.0]);
    assert_eq!(f32_values(&a.minimum(&b).unwrap()), vec![1.0, -2.0, 2.0, -4.0]);
    assert_eq!(f32_values(&a.maximum(&b).unwrap()), vec![2.0, 2.0, 3.0, 2.0]);
    assert_eq!(f32_values(&a.neg().unwrap()), vec![-1.0, 2.0, -3.0, 4.0]);
    assert_eq!(f32_values(&a.abs().unwrap()), vec![1.0, 2.0, 3.0, 4.0]);

    // Singleton broadcast against a scalar-shaped operand.
    let two = f32_array(&[1], &[2.0]);
    assert_eq!(f32_values(&a.mul(&two).unwrap()), vec![2.0, -4.0, 6.0, -8.0]);

    let denominator = f32_array(&[4], &[0.0, 1.0, 0.0, 2.0]);
    let stable = a.stable_divide(&denominator, Some(1.0)).unwrap();
    assert_eq!(f32_values(&stable), vec![1.0, -1.0, 3.0, -4.0 / 3.0]);
}

pub fn clip_family_matches_reference(backend: &str) {
    let _scope = BackendScope::enter(backend).unwrap();
    let a = f32_array(&[5], &[-3.0, -1.0, 0.0, 1.0, 3.0]);
    assert_eq!(
        f32_values(&a.clip(-1.0, 2.0).unwrap()),
        vec![-1.0, -1.0, 0.0, 1.0, 2.0]
    );

    // 3-4-norm: ||[3,4]||_2 = 5, clipped to 2.5 halves every element.
    let v = f32_array(&[2], &[3.0, 4.0]);
    assert_eq!(
        f32_values(&v.clip_vector_norm(2.5, 2.0).unwrap()),
        vec![1.5, 2.0]
    );
    // Norm already under the cap: unchanged.
    assert_eq!(
        f32_values(&v.clip_vector_norm(10.0, 2.0).unwrap()),
        vec![3.0, 4.0]
    );
}

pub fn manipulation_matches_reference(backend: &str) {
    let _scope = BackendScope::enter(backend).unwrap();
    let a = f32_array(&[2, 3], &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);

    let reshaped = a.reshape(&[3, -1]).unwrap();
    assert_eq!(reshaped.shape().dims(), &[3, 2]);
    assert_eq!(f32_values(&reshaped), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);

    let expanded = a.expand_dims(0).unwrap();
    assert_eq!(expanded.shape().dims(), &[1, 2, 3]);
    assert_eq!(expanded.squeeze(Some(0)).unwrap().shape().dims(), &[2, 3]);

    let transposed = a.permute_dims(&[1, 0]).unwrap();
    assert_eq!(transposed.shape().dims(), &[3, 2]);
    assert_eq!(f32_values(&transposed), vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);

    let flipped = a.flip(Some(&[1])).unwrap();
    assert_eq!(f32_values(&flipped), vec![2.0, 1.0, 0.0, 5.0, 4.0, 3.0]);

    let rolled = a.roll(&[1], Some(&[1])).unwrap();
    assert_eq!(f32_values(&rolled), vec![2.0, 0.0, 1.0, 5.0, 3.0, 4.0]);

    let flat_rolled = a.roll(&[2], None).unwrap();
    assert_eq!(f32_values(&flat_rolled), vec![4.0, 5.0, 0.0, 1.0, 2.0, 3.0]);

    let padded = a.zero_pad(&[(0, 0), (1, 1)]).unwrap();
    assert_eq!(padded.shape().dims(), &[2, 5]);
    assert_eq!(
        f32_values(&padded),
        vec![0.0, 0.0, 1.0, 2.0, 0.0, 0.0, 3.0, 4.0, 5.0, 0.0]
    );

    let b = f32_array(&[1, 3], &[6.0, 7.0, 8.0]);
    let joined = Array::concat(&[&a, &b], 0).unwrap();
    assert_eq!(joined.shape().dims(), &[3, 3]);
    assert_eq!(
        f32_values(&joined),
        vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]
    );

    let x = f32_array(&[2], &[1.0, 2.0]);
    let y = f32_array(&[2], &[3.0, 4.0]);
    let stacked = Array::stack(&[&x, &y], 0).unwrap();
    assert_eq!(stacked.shape().dims(), &[2, 2]);
    assert_eq!(f32_values(&stacked), vec![1.0, 2.0, 3.0, 4.0]);
}

pub fn gather_matches_reference(backend: &str) {
    let _scope = BackendScope::enter(backend).unwrap();
    let params = f32_array(&[3, 2], &[0.0, 1.0, 10.0, 11.0, 20.0, 21.0]);
    let indices = Array::from_i64(vec![2], vec![2, 0]).unwrap();
    let gathered = params.gather(&indices, 0).unwrap();
    assert_eq!(gathered.shape().dims(), &[2, 2]);
    assert_eq!(f32_values(&gathered), vec![20.0, 21.0, 0.0, 1.0]);

    // Negative indices wrap.
    let last = Array::from_i64(vec![1], vec![-1]).unwrap();
    assert_eq!(
        f32_values(&params.gather(&last, 0).unwrap()),
        vec![20.0, 21.0]
    );

    // Out-of-bounds indices are an execution failure, not silence.
    let bogus = Array::from_i64(vec![1], vec![3]).unwrap();
    assert!(params.gather(&bogus, 0).is_err());
}

pub fn out_target_is_aliased(backend: &str) {
    let _scope = BackendScope::enter(backend).unwrap();
    let a = f32_array(&[3], &[1.0, 2.0, 3.0]);
    let b = f32_array(&[3], &[10.0, 20.0, 30.0]);
    let mut out = Array::zeros(a.spec().clone()).unwrap();

    let ret = a.add_into(&b, &mut out).unwrap();
    assert!(ret.shares_handle(&out), "out= must return the target's handle");
    assert_eq!(f32_values(&out), vec![11.0, 22.0, 33.0]);
    assert_eq!(f32_values(&ret), f32_values(&a.add(&b).unwrap()));

    // Shape-incompatible targets are rejected before execution.
    let mut bad = Array::zeros(uniray::ArraySpec::new(
        DType::F32,
        Shape::new(vec![4]),
    ))
    .unwrap();
    match a.add_into(&b, &mut bad) {
        Err(Error::ShapeMismatch { .. }) => {}
        other => panic!("expected shape mismatch, got {other:?}"),
    }
}

pub fn container_roll_scenario(backend: &str) {
    let _scope = BackendScope::enter(backend).unwrap();
    let container = Container::from_pairs([
        ("a", f32_array(&[3], &[0.0, 1.0, 2.0])),
        ("b", f32_array(&[3], &[3.0, 4.0, 5.0])),
    ]);
    let rolled = container.roll(&[1], None).unwrap();
    let a = rolled.at_key_chain("a").unwrap().as_array().unwrap().clone();
    let b = rolled.at_key_chain("b").unwrap().as_array().unwrap().clone();
    assert_eq!(f32_values(&a), vec![2.0, 0.0, 1.0]);
    assert_eq!(f32_values(&b), vec![5.0, 3.0, 4.0]);

    // Instance and static forms agree.
    let via_static = Container::static_roll(
        &container,
        &[1],
        None,
        &uniray::MapPolicy::default(),
        None,
    )
    .unwrap();
    assert!(rolled.all_equal(&via_static));
}

pub fn dtype_table_is_enforced(backend: &str) {
    let scope = BackendScope::enter(backend).unwrap();
    let supported = scope.backend().supported_dtypes().to_vec();
    let candidates = [
        (DType::Bool, LiteralData::Bool(vec![true, false])),
        (DType::I32, LiteralData::I32(vec![1, 2])),
        (DType::I64, LiteralData::I64(vec![1, 2])),
        (DType::F32, LiteralData::F32(vec![1.0, 2.0])),
        (DType::F64, LiteralData::F64(vec![1.0, 2.0])),
    ];
    for (dtype, data) in candidates {
        let literal =
            ArrayLiteral::new(uniray::ArraySpec::new(dtype, Shape::new(vec![2])), data).unwrap();
        let result = Array::from_literal(literal);
        if supported.contains(&dtype) {
            assert!(result.is_ok(), "{dtype} should be accepted");
        } else {
            match result {
                Err(Error::UnsupportedDtypeOrDevice { dtype: reported, .. }) => {
                    assert_eq!(reported, dtype);
                }
                other => panic!("expected unsupported dtype for {dtype}, got {:?}", other.err()),
            }
        }
    }
}
