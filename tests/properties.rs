//! Property tests over random edit sequences

use gametree::{AppendOptions, Direction, MergeOnKeys, NodeData, NodeId, Tree, TreeOptions};
use proptest::prelude::*;
use std::sync::Arc;

#[derive(Clone, Debug)]
enum Op {
    Append { parent: usize, value: u8 },
    AppendWithId { parent: usize, id: u8, value: u8 },
    Remove { target: usize },
    Shift { target: usize, direction: u8 },
    Tag { target: usize, value: u8 },
    Reroot { target: usize },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (any::<usize>(), 0u8..4).prop_map(|(parent, value)| Op::Append { parent, value }),
        2 => (any::<usize>(), 0u8..6, 0u8..4)
            .prop_map(|(parent, id, value)| Op::AppendWithId { parent, id, value }),
        1 => any::<usize>().prop_map(|target| Op::Remove { target }),
        1 => (any::<usize>(), 0u8..3).prop_map(|(target, direction)| Op::Shift { target, direction }),
        1 => (any::<usize>(), 0u8..4).prop_map(|(target, value)| Op::Tag { target, value }),
        1 => any::<usize>().prop_map(|target| Op::Reroot { target }),
    ]
}

fn pick(tree: &Tree, index: usize) -> NodeId {
    let ids: Vec<_> = tree.list_nodes().map(|node| node.id.clone()).collect();
    ids[index % ids.len()].clone()
}

fn move_data(value: u8) -> NodeData {
    NodeData::from([("B".to_string(), vec![format!("m{}", value)])])
}

/// Apply one op as its own transaction
fn apply(tree: &Tree, op: &Op) -> Tree {
    tree.mutate(|draft| {
        match op {
            Op::Append { parent, value } => {
                draft.append_node(&pick(tree, *parent), move_data(*value), AppendOptions::default());
            }
            Op::AppendWithId { parent, id, value } => {
                draft.append_node_with_id(
                    &pick(tree, *parent),
                    format!("x{}", id),
                    move_data(*value),
                    AppendOptions::default(),
                );
            }
            Op::Remove { target } => {
                let id = pick(tree, *target);
                if id != *draft.root_id() {
                    draft.remove_node(&id)?;
                }
            }
            Op::Shift { target, direction } => {
                let direction = match direction {
                    0 => Direction::Left,
                    1 => Direction::Right,
                    _ => Direction::Main,
                };
                draft.shift_node(&pick(tree, *target), direction);
            }
            Op::Tag { target, value } => {
                draft.add_to_property(&pick(tree, *target), "C", format!("c{}", value));
            }
            Op::Reroot { target } => {
                draft.make_root(&pick(tree, *target));
            }
        }
        Ok(())
    })
    .unwrap()
}

fn snapshot(tree: &Tree) -> Vec<(NodeId, NodeData, Vec<NodeId>)> {
    tree.list_nodes()
        .map(|node| {
            let children = node.children.iter().map(|c| c.id.clone()).collect();
            (node.id.clone(), node.data.clone(), children)
        })
        .collect()
}

fn new_tree() -> Tree {
    Tree::with_options(TreeOptions::new().merger(MergeOnKeys::new(["B"])))
}

proptest! {
    #[test]
    fn prop_edits_never_touch_earlier_versions(ops in prop::collection::vec(op(), 1..40)) {
        let mut versions = vec![new_tree()];
        let mut snapshots = vec![snapshot(&versions[0])];

        for op in &ops {
            let next = apply(versions.last().unwrap(), op);
            snapshots.push(snapshot(&next));
            versions.push(next);
        }

        for (tree, before) in versions.iter().zip(&snapshots) {
            prop_assert_eq!(&snapshot(tree), before);
        }
    }

    #[test]
    fn prop_cached_shape_matches_fresh_tree(ops in prop::collection::vec(op(), 1..40)) {
        let mut tree = new_tree();
        for op in &ops {
            // Warm the caches so commits carry them forward
            tree.get_height();
            tree.get_structure_hash();
            tree = apply(&tree, op);
        }

        let fresh = Tree::from_json(&tree.to_json().unwrap(), TreeOptions::new()).unwrap();
        prop_assert_eq!(tree.get_height(), fresh.get_height());
        prop_assert_eq!(tree.get_structure_hash(), fresh.get_structure_hash());
        prop_assert_eq!(tree.get_hash(), fresh.get_hash());
    }

    #[test]
    fn prop_parent_links_are_consistent(ops in prop::collection::vec(op(), 1..40)) {
        let mut tree = new_tree();
        for op in &ops {
            tree = apply(&tree, op);
        }

        prop_assert!(tree.root().parent_id.is_none());
        for node in tree.list_nodes() {
            for child in &node.children {
                prop_assert_eq!(child.parent_id.as_ref(), Some(&node.id));
                let found = tree.get(&child.id).unwrap();
                prop_assert!(Arc::ptr_eq(&found, child));
            }
        }
    }

    #[test]
    fn prop_ids_resolve_to_listed_nodes(ops in prop::collection::vec(op(), 1..60)) {
        let mut tree = new_tree();
        for op in &ops {
            tree = apply(&tree, op);
        }

        let listed: Vec<_> = tree.list_nodes().collect();
        let mut seen = std::collections::HashSet::new();
        for node in &listed {
            prop_assert!(seen.insert(node.id.clone()), "duplicate id {}", node.id);
            prop_assert_eq!(tree.resolve(&node.id), &node.id);
        }
        for id in (0..6).map(|n| NodeId::from(format!("x{}", n))) {
            if let Some(node) = tree.get(&id) {
                prop_assert!(listed.iter().any(|listed| Arc::ptr_eq(listed, &node)));
            }
        }
    }

    #[test]
    fn prop_untouched_subtrees_are_shared(ops in prop::collection::vec(op(), 1..20), value in 0u8..4) {
        let mut tree = new_tree();
        for op in &ops {
            tree = apply(&tree, op);
        }

        let Some(first) = tree.root().children.first().cloned() else {
            return Ok(());
        };
        let next = tree
            .mutate(|draft| {
                let root = draft.root_id().clone();
                draft.add_to_property(&root, "C", format!("c{}", value));
                Ok(())
            })
            .unwrap();

        prop_assert!(Arc::ptr_eq(&next.root().children[0], &first));
    }
}
