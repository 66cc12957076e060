//! Container traversal semantics: selection, pruning, sequence mapping,
//! lockstep walks, and the documented failure modes.

use uniray::container::multi_map;
use uniray::{Array, Container, Error, LiteralData, MapPolicy, Scalar, Value};

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

fn sample_container() -> Container {
    Container::from_pairs([
        (
            "a",
            Value::Container(Container::from_pairs([
                ("b", Value::Array(f32_array(&[2], &[1.0, 2.0]))),
                ("c", Value::Array(f32_array(&[2], &[3.0, 4.0]))),
            ])),
        ),
        ("d", Value::Array(f32_array(&[2], &[5.0, 6.0]))),
        ("e", Value::Scalar(Scalar::Int(7))),
    ])
}

#[test]
fn identity_map_is_idempotent() {
    setup();
    let container = sample_container();
    let once = container
        .map(&MapPolicy::default(), &mut |leaf, _| Ok(leaf.clone()))
        .unwrap();
    let twice = once
        .map(&MapPolicy::default(), &mut |leaf, _| Ok(leaf.clone()))
        .unwrap();
    assert_eq!(container, once);
    assert_eq!(once, twice);
}

#[test]
fn map_visits_chains_in_depth_first_key_order() {
    setup();
    let container = sample_container();
    let mut visited = Vec::new();
    container
        .map(&MapPolicy::default(), &mut |leaf, chain| {
            visited.push(chain.to_string());
            Ok(leaf.clone())
        })
        .unwrap();
    assert_eq!(visited, vec!["a.b", "a.c", "d", "e"]);
    assert_eq!(container.key_chains(), visited);
}

#[test]
fn key_chain_filter_transforms_only_selected_leaves() {
    setup();
    let container = sample_container();
    fn doubled(leaf: &Value, _: &str) -> uniray::Result<Value> {
        match leaf {
            Value::Array(array) => Ok(Value::Array(array.mul(array).unwrap())),
            other => Ok(other.clone()),
        }
    }

    let policy = MapPolicy::only(["a.b"]);
    let result = container.map(&policy, &mut doubled).unwrap();
    assert_eq!(f32_values(result.at_key_chain("a.b").unwrap()), vec![1.0, 4.0]);
    assert_eq!(f32_values(result.at_key_chain("a.c").unwrap()), vec![3.0, 4.0]);
    assert_eq!(f32_values(result.at_key_chain("d").unwrap()), vec![5.0, 6.0]);

    let pruned = container.map(&policy.clone().prune(), &mut doubled).unwrap();
    assert_eq!(pruned.key_chains(), vec!["a.b"]);
    assert_eq!(f32_values(pruned.at_key_chain("a.b").unwrap()), vec![1.0, 4.0]);
    assert!(pruned.at_key_chain("d").is_err());
}

#[test]
fn listed_chain_selects_whole_subtree() {
    setup();
    let container = sample_container();
    let policy = MapPolicy::only(["a"]).prune();
    let mut visited = Vec::new();
    let result = container
        .map(&policy, &mut |leaf, chain| {
            visited.push(chain.to_string());
            Ok(leaf.clone())
        })
        .unwrap();
    assert_eq!(visited, vec!["a.b", "a.c"]);
    assert_eq!(result.key_chains(), vec!["a.b", "a.c"]);
}

#[test]
fn except_policy_inverts_selection() {
    setup();
    let container = sample_container();
    let policy = MapPolicy::except(["a.b"]);
    let mut visited = Vec::new();
    container
        .map(&policy, &mut |leaf, chain| {
            visited.push(chain.to_string());
            Ok(leaf.clone())
        })
        .unwrap();
    assert_eq!(visited, vec!["a.c", "d", "e"]);
}

#[test]
fn map_sequences_extends_chains_with_indices() {
    setup();
    let container = Container::from_pairs([(
        "lst",
        Value::Seq(vec![
            Value::Array(f32_array(&[1], &[1.0])),
            Value::Array(f32_array(&[1], &[2.0])),
        ]),
    )]);

    // Sequences are opaque leaves by default.
    let mut chains = Vec::new();
    container
        .map(&MapPolicy::default(), &mut |leaf, chain| {
            chains.push(chain.to_string());
            Ok(leaf.clone())
        })
        .unwrap();
    assert_eq!(chains, vec!["lst"]);

    // With map_sequences the walk descends, indexing each element.
    let mut chains = Vec::new();
    container
        .map(&MapPolicy::default().map_sequences(), &mut |leaf, chain| {
            chains.push(chain.to_string());
            Ok(leaf.clone())
        })
        .unwrap();
    assert_eq!(chains, vec!["lst.0", "lst.1"]);
}

#[test]
fn multi_map_walks_aligned_containers_in_lockstep() {
    setup();
    let c1 = Container::from_pairs([
        ("a", f32_array(&[2], &[1.0, 2.0])),
        ("b", f32_array(&[2], &[3.0, 4.0])),
    ]);
    let c2 = Container::from_pairs([
        ("a", f32_array(&[2], &[10.0, 20.0])),
        ("b", f32_array(&[2], &[30.0, 40.0])),
    ]);

    let mut visited = Vec::new();
    let summed = multi_map(
        &MapPolicy::default(),
        &[Value::from(&c1), Value::from(&c2)],
        &mut |leaves, chain| {
            visited.push(chain.to_string());
            assert_eq!(leaves.len(), 2);
            let lhs = leaves[0].as_array().unwrap();
            let rhs = leaves[1].as_array().unwrap();
            Ok(Value::Array(lhs.add(rhs).unwrap()))
        },
    )
    .unwrap();

    assert_eq!(visited, vec!["a", "b"], "each chain exactly once, in order");
    assert_eq!(f32_values(summed.at_key_chain("a").unwrap()), vec![11.0, 22.0]);
    assert_eq!(f32_values(summed.at_key_chain("b").unwrap()), vec![33.0, 44.0]);
}

#[test]
fn multi_map_broadcasts_plain_arrays() {
    setup();
    let container = Container::from_pairs([
        ("a", f32_array(&[2], &[1.0, 2.0])),
        ("b", f32_array(&[2], &[3.0, 4.0])),
    ]);
    let offset = f32_array(&[2], &[100.0, 200.0]);

    let result = container.add(&offset).unwrap();
    assert_eq!(f32_values(result.at_key_chain("a").unwrap()), vec![101.0, 202.0]);
    assert_eq!(f32_values(result.at_key_chain("b").unwrap()), vec![103.0, 204.0]);
}

#[test]
fn multi_map_rejects_diverging_structures() {
    setup();
    let c1 = Container::from_pairs([("a", Value::Scalar(Scalar::Int(1)))]);
    let c2 = Container::from_pairs([
        ("a", Value::Scalar(Scalar::Int(1))),
        ("b", Value::Scalar(Scalar::Int(2))),
    ]);
    let err = multi_map(
        &MapPolicy::default(),
        &[Value::from(&c1), Value::from(&c2)],
        &mut |leaves, _| Ok(leaves[0].clone()),
    )
    .unwrap_err();
    assert!(matches!(err, Error::StructureMismatch { .. }));
}

#[test]
fn empty_forest_yields_empty_container() {
    setup();
    let none: Vec<Value> = Vec::new();
    let result = multi_map(&MapPolicy::default(), &none, &mut |leaves, _| {
        Ok(leaves[0].clone())
    })
    .unwrap();
    assert!(result.is_empty());

    // Arrays alone are not a container forest either.
    let arrays = vec![Value::Array(f32_array(&[1], &[1.0]))];
    let result = multi_map(&MapPolicy::default(), &arrays, &mut |leaves, _| {
        Ok(leaves[0].clone())
    })
    .unwrap();
    assert!(result.is_empty());
}

#[test]
fn prune_unapplied_drops_emptied_subtrees() {
    setup();
    let container = sample_container();
    let policy = MapPolicy::only(["d"]).prune();
    let result = container
        .map(&policy, &mut |leaf, _| Ok(leaf.clone()))
        .unwrap();
    assert_eq!(result.key_chains(), vec!["d"]);
    assert!(!result.contains_key("a"), "emptied subtree must disappear");
}
