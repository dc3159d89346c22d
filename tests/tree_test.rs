//! Tests for ConfigTree: path access, merging, flattening and suffix search

use rstest::rstest;

use cfgtree::domain::mask::compile_masks;
use cfgtree::{ConfigTree, DomainError, Node, Scalar};

fn tree(node: Node) -> ConfigTree {
    ConfigTree::from_node(node).expect("map root")
}

#[test]
fn given_empty_tree_when_setting_nested_path_then_get_returns_value() {
    let mut tree = ConfigTree::new();

    tree.set("debug.db.url", "postgres://localhost/app").unwrap();

    assert_eq!(tree.get("debug.db.url").unwrap(), &"postgres://localhost/app");
    assert!(tree.get("debug.db").unwrap().is_map());
    assert_eq!(tree.keys().collect::<Vec<_>>(), vec!["debug"]);
}

#[test]
fn given_two_sources_when_merging_then_later_wins_and_siblings_survive() {
    // Arrange
    let mut tree = tree(Node::from([(
        "db",
        Node::from([("host", Node::from("localhost")), ("port", Node::from(5432))]),
    )]));

    // Act
    tree.merge(Node::from([(
        "db",
        Node::from([("port", Node::from(6432)), ("user", Node::from("app"))]),
    )]))
    .unwrap();

    // Assert
    assert_eq!(tree.get("db.host").unwrap(), &"localhost");
    assert_eq!(tree.get("db.port").unwrap(), &6432);
    assert_eq!(tree.get("db.user").unwrap(), &"app");
    assert_eq!(
        tree.get("db").unwrap().keys().collect::<Vec<_>>(),
        vec!["host", "port", "user"]
    );
}

#[test]
fn given_scalar_source_when_merging_then_rejected() {
    let mut tree = ConfigTree::new();

    let err = tree.merge(Node::from(vec![1, 2])).unwrap_err();

    assert!(matches!(err, DomainError::SourceFormat { .. }));
}

#[test]
fn given_empty_key_when_merging_then_rejected_before_resolution() {
    let mut tree = ConfigTree::new();

    let top = tree
        .merge(Node::from([("", "${{ env:X:1 }}")]))
        .unwrap_err();
    let nested = tree
        .merge_source(
            "inline",
            cfgtree::domain::sources::SourceKind::Mapping,
            Node::from([("svc", Node::from(vec![Node::from([("", 1)])]))]),
        )
        .unwrap_err();

    assert!(matches!(top, DomainError::SourceFormat { .. }), "{top:?}");
    match nested {
        DomainError::SourceFormat { source_name, message } => {
            assert_eq!(source_name, "inline");
            assert!(message.contains("'svc.0'"), "{message}");
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert!(tree.root().as_map().unwrap().is_empty());
    assert!(tree.sources().is_empty());
}

#[test]
fn given_flattened_tree_when_rebuilt_by_set_then_equal_to_original() {
    let original = tree(Node::from([(
        "a",
        Node::from([("b", Node::from(1)), ("c", Node::from(vec![2, 3]))]),
    )]));

    let flat = original.flatten();
    assert_eq!(
        flat.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["a.b", "a.c.0", "a.c.1"]
    );

    // sequence indices only append into an existing sequence
    let mut rebuilt = tree(Node::from([(
        "a",
        Node::from([("b", Node::null()), ("c", Node::Seq(vec![]))]),
    )]));
    for (path, value) in flat {
        rebuilt.set(&path, value).unwrap();
    }
    assert_eq!(rebuilt.root(), original.root());
}

#[test]
fn given_null_and_float_leaves_when_flattening_then_scalars_kept() {
    let tree = tree(Node::from([
        ("ratio", Node::from(0.5)),
        ("missing", Node::null()),
        ("empty", Node::Seq(vec![])),
    ]));

    let flat = tree.flatten();

    assert_eq!(flat["ratio"], Scalar::Float(0.5));
    assert_eq!(flat["missing"], Scalar::Null);
    assert!(!flat.contains_key("empty"));
}

#[rstest]
#[case("db.user")]
#[case("^db.user")]
fn given_absolute_or_plain_path_when_removing_then_gone(#[case] path: &str) {
    let mut tree = tree(Node::from([(
        "db",
        Node::from([("user", Node::from("alice")), ("name", Node::from("app"))]),
    )]));

    let removed = tree.remove(path).unwrap();

    assert_eq!(removed, Node::from("alice"));
    assert!(!tree.contains("db.user"));
    assert!(tree.contains("db.name"));
}

#[rstest]
#[case("db..user")]
#[case(".db")]
#[case("db.")]
fn given_empty_segment_when_getting_then_invalid_path(#[case] path: &str) {
    let tree = tree(Node::from([("db", Node::from([("user", "alice")]))]));

    let err = tree.get(path).unwrap_err();

    assert!(matches!(err, DomainError::InvalidPath { .. }), "{err:?}");
}

#[test]
fn given_nested_suffix_when_searching_then_all_matches_in_natural_order() {
    let tree = tree(Node::from([
        ("a", Node::from([("b", Node::from([("c", 1)]))])),
        (
            "x",
            Node::from([("a", Node::from([("b", Node::from([("c", 2)]))]))]),
        ),
    ]));

    let found = tree.find_by_suffix("a.b.c", &[]).unwrap();
    let paths: Vec<&str> = found.iter().map(|(p, _)| p.as_str()).collect();
    assert_eq!(paths, vec!["a.b.c", "x.a.b.c"]);

    let masks = compile_masks(&["x.**"][..]).unwrap();
    let found = tree.find_by_suffix("a.b.c", &masks).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].0, "x.a.b.c");
    assert_eq!(found[0].1, &2);
}

#[test]
fn given_partial_segment_when_searching_then_no_substring_match() {
    let tree = tree(Node::from([
        ("env", Node::from([("mydb", Node::from([("user", "a")]))])),
        ("prod", Node::from([("db", Node::from([("user", "b")]))])),
    ]));

    let found = tree.find_by_suffix("db.user", &[]).unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].0, "prod.db.user");
}

#[test]
fn given_typed_model_when_extracting_then_fields_converted() {
    #[derive(serde::Deserialize, Debug)]
    struct Db {
        host: String,
        port: u16,
    }

    let tree = tree(Node::from([(
        "db",
        Node::from([("host", Node::from("localhost")), ("port", Node::from(5432))]),
    )]));

    let db: Db = tree.extract("db").unwrap();
    assert_eq!(db.host, "localhost");
    assert_eq!(db.port, 5432);

    let err = tree.extract::<Db>("db.host").unwrap_err();
    match err {
        DomainError::ModelConversion { path, .. } => assert_eq!(path, "db.host"),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn given_u64_max_in_yaml_when_extracting_then_value_exact() {
    let root = cfgtree::domain::sources::parse_yaml_source("big: 18446744073709551615\n", "big.yaml").unwrap();
    let tree = tree(root);

    assert_eq!(tree.extract::<u64>("big").unwrap(), u64::MAX);
    assert_eq!(tree.flatten()["big"], Scalar::UInt(u64::MAX));
}

#[test]
fn given_tree_when_rendered_as_yaml_then_reparses_to_same_root() {
    let original = tree(Node::from([
        ("name", Node::from("app")),
        ("ports", Node::from(vec![80, 443])),
    ]));

    let yaml = original.to_yaml_string().unwrap();
    let reparsed = cfgtree::domain::sources::parse_yaml_source(&yaml, "render").unwrap();

    assert_eq!(&reparsed, original.root());
}

#[test]
fn given_top_level_pairs_when_iterating_then_insertion_order() {
    let tree = tree(Node::from([("key1", "value1"), ("key2", "value2")]));

    assert_eq!(tree.keys().collect::<Vec<_>>(), vec!["key1", "key2"]);
    let values: Vec<&str> = tree.values().filter_map(Node::as_str).collect();
    assert_eq!(values, vec!["value1", "value2"]);
    let items: Vec<(&str, Option<&str>)> = tree.items().map(|(k, v)| (k, v.as_str())).collect();
    assert_eq!(items, vec![("key1", Some("value1")), ("key2", Some("value2"))]);
}
