//! Construction round-trips, the static/instance/top-level equivalence, and
//! key-chain-directed merging into `out=` targets.

use anyhow::Result;

use uniray::{ops, Array, Container, Error, LiteralData, MapPolicy, Scalar, Value};

fn setup() {
    uniray_backend_ref_cpu::register_ref_cpu_backend();
}

fn f32_array(dims: &[usize], values: &[f32]) -> Array {
    Array::from_f32(dims.to_vec(), values.to_vec()).unwrap()
}

fn f32_values(value: &Value) -> Vec<f32> {
    let array = value.as_array().expect("array leaf");
    match array.to_literal().unwrap().data {
        LiteralData::F32(v) => v,
        other => panic!("expected f32 data, got {:?}", other.dtype()),
    }
}

fn sample() -> Container {
    Container::from_pairs([
        (
            "layers",
            Value::Container(Container::from_pairs([
                ("w", Value::Array(f32_array(&[2, 2], &[1.0, 2.0, 3.0, 4.0]))),
                ("b", Value::Array(f32_array(&[2], &[0.1, 0.2]))),
            ])),
        ),
        ("step", Value::Scalar(Scalar::Int(3))),
    ])
}

#[test]
fn flatten_and_rebuild_reproduce_the_container() -> Result<()> {
    setup();
    let container = sample();
    let flat = container.flatten();
    let chains: Vec<&str> = flat.iter().map(|(chain, _)| chain.as_str()).collect();
    assert_eq!(chains, vec!["layers.b", "layers.w", "step"]);

    let rebuilt = Container::from_flat(flat)?;
    assert_eq!(container, rebuilt);
    Ok(())
}

#[test]
fn json_mapping_roundtrip() -> Result<()> {
    setup();
    let native = serde_json::json!({
        "config": { "lr": 0.1, "epochs": 10 },
        "flags": [true, false],
    });
    let container = Container::from_json(&native)?;
    assert_eq!(
        container.key_chains(),
        vec!["config.epochs", "config.lr", "flags"]
    );
    assert_eq!(container.to_json()?, native);
    Ok(())
}

#[test]
fn json_rejects_unrepresentable_leaves() {
    setup();
    let err = Container::from_json(&serde_json::json!({ "name": "resnet" })).unwrap_err();
    assert!(matches!(err, Error::InvalidValue { .. }));
}

#[test]
fn instance_static_and_top_level_agree() {
    setup();
    let container = sample();
    let via_method = container.abs().unwrap();
    let via_static = Container::static_abs(&container, &MapPolicy::default(), None).unwrap();
    let via_ops = match ops::abs(&container).unwrap() {
        Value::Container(result) => result,
        other => panic!("expected container, got {other:?}"),
    };
    assert_eq!(via_method, via_static);
    assert_eq!(via_method, via_ops);
    // Non-array leaves ride along untouched.
    assert_eq!(
        via_method.at_key_chain("step").unwrap(),
        &Value::Scalar(Scalar::Int(3))
    );
}

#[test]
fn static_op_merges_into_out_by_key_chain() {
    setup();
    let container = Container::from_pairs([
        ("a", f32_array(&[3], &[0.0, 1.0, 2.0])),
        ("b", f32_array(&[3], &[3.0, 4.0, 5.0])),
    ]);
    let mut target = Container::from_pairs([
        ("a", f32_array(&[3], &[0.0; 3])),
        ("b", f32_array(&[3], &[0.0; 3])),
    ]);

    let ret = Container::static_roll(
        &container,
        &[1],
        None,
        &MapPolicy::default(),
        Some(&mut target),
    )
    .unwrap();

    assert_eq!(f32_values(target.at_key_chain("a").unwrap()), vec![2.0, 0.0, 1.0]);
    assert_eq!(f32_values(target.at_key_chain("b").unwrap()), vec![5.0, 3.0, 4.0]);
    // The returned container aliases the target's leaves.
    let ret_a = ret.at_key_chain("a").unwrap().as_array().unwrap();
    let target_a = target.at_key_chain("a").unwrap().as_array().unwrap();
    assert!(ret_a.shares_handle(target_a));
}

#[test]
fn merge_target_with_unknown_chain_fails() {
    setup();
    let container = Container::from_pairs([("a", f32_array(&[2], &[1.0, 2.0]))]);
    let mut target = Container::from_pairs([
        ("a", f32_array(&[2], &[0.0; 2])),
        ("extra", f32_array(&[2], &[0.0; 2])),
    ]);
    let err = Container::static_neg(&container, &MapPolicy::default(), Some(&mut target))
        .unwrap_err();
    match err {
        Error::KeyChainMismatch { key_chain, .. } => assert_eq!(key_chain, "extra"),
        other => panic!("expected key chain mismatch, got {other:?}"),
    }
}

#[test]
fn merge_in_place_combines_nested_containers() {
    setup();
    let mut base = sample();
    let update = Container::from_pairs([
        (
            "layers",
            Value::Container(Container::from_pairs([(
                "b",
                Value::Array(f32_array(&[2], &[9.0, 9.0])),
            )])),
        ),
        ("step", Value::Scalar(Scalar::Int(4))),
    ]);
    base.merge_in_place(&update);
    assert_eq!(f32_values(base.at_key_chain("layers.b").unwrap()), vec![9.0, 9.0]);
    // Sibling entries survive the merge.
    assert!(base.at_key_chain("layers.w").is_ok());
    assert_eq!(
        base.at_key_chain("step").unwrap(),
        &Value::Scalar(Scalar::Int(4))
    );
}

#[test]
fn top_level_concat_broadcasts_plain_arrays() {
    setup();
    let container = Container::from_pairs([
        ("a", f32_array(&[2], &[1.0, 2.0])),
        ("b", f32_array(&[2], &[3.0, 4.0])),
    ]);
    let tail = f32_array(&[1], &[99.0]);
    let joined = match ops::concat(&[Value::from(&container), Value::from(&tail)], 0).unwrap() {
        Value::Container(result) => result,
        other => panic!("expected container, got {other:?}"),
    };
    assert_eq!(f32_values(joined.at_key_chain("a").unwrap()), vec![1.0, 2.0, 99.0]);
    assert_eq!(f32_values(joined.at_key_chain("b").unwrap()), vec![3.0, 4.0, 99.0]);
}

#[test]
fn set_and_prune_key_chains() {
    setup();
    let mut container = sample();
    container
        .set_at_key_chain("layers.stats.count", Value::Scalar(Scalar::Int(1)))
        .unwrap();
    assert_eq!(
        container.at_key_chain("layers.stats.count").unwrap(),
        &Value::Scalar(Scalar::Int(1))
    );

    container.prune_key_chain("layers.stats.count");
    assert!(container.at_key_chain("layers.stats.count").is_err());
    // The intermediate container emptied out and was dropped too.
    assert!(container.at_key_chain("layers.stats").is_err());
    assert!(container.at_key_chain("layers.w").is_ok());
}

#[test]
fn scalars_promote_against_array_leaves() {
    setup();
    let container = Container::from_pairs([("a", f32_array(&[2], &[1.0, 2.0]))]);
    let bumped = container.add(1.0_f64).unwrap();
    assert_eq!(f32_values(bumped.at_key_chain("a").unwrap()), vec![2.0, 3.0]);

    let halved = container.div(2.0_f64).unwrap();
    assert_eq!(f32_values(halved.at_key_chain("a").unwrap()), vec![0.5, 1.0]);
}
