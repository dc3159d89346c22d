//! Tests for ConfigHolder: the process-wide home of resolved trees

use std::sync::Arc;
use std::thread;

use cfgtree::application::{ApplicationError, DEFAULT_KEY};
use cfgtree::{ConfigHolder, ConfigTree, Node};

fn tree(name: &str) -> ConfigTree {
    ConfigTree::from_node(Node::from([("name", name)])).expect("map root")
}

#[test]
fn given_nothing_set_when_reading_then_not_configured() {
    let holder = ConfigHolder::new();

    let err = holder.get().unwrap_err();

    match err {
        ApplicationError::NotConfigured { key } => assert_eq!(key, DEFAULT_KEY),
        other => panic!("unexpected: {other:?}"),
    }
    assert!(!holder.is_set(DEFAULT_KEY));
}

#[test]
fn given_keyed_trees_when_replacing_and_removing_then_slots_independent() {
    let holder = ConfigHolder::new();
    holder.set(tree("main")).unwrap();
    holder.set_keyed("tests", tree("fixture")).unwrap();

    let old = holder.replace("tests", tree("updated"));
    assert_eq!(old.unwrap().get("name").unwrap(), &"fixture");
    assert_eq!(holder.keys(), vec![DEFAULT_KEY.to_string(), "tests".to_string()]);

    holder.remove(DEFAULT_KEY);
    assert!(holder.get().is_err());
    assert_eq!(holder.get_keyed("tests").unwrap().get("name").unwrap(), &"updated");
}

#[test]
fn given_shared_holder_when_read_from_threads_then_all_see_tree() {
    let holder = Arc::new(ConfigHolder::new());
    holder.set(tree("shared")).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let holder = Arc::clone(&holder);
            thread::spawn(move || holder.get().is_ok_and(|t| t.get("name").is_ok_and(|n| n == &"shared")))
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
}

#[test]
fn given_global_holder_when_set_under_key_then_visible_through_global() {
    ConfigHolder::global()
        .set_keyed("holder_test.global", tree("process"))
        .unwrap();

    let read = ConfigHolder::global().get_keyed("holder_test.global").unwrap();

    assert_eq!(read.get("name").unwrap(), &"process");
    assert!(ConfigHolder::global().remove("holder_test.global").is_some());
}
