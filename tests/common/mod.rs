//! Shared fixtures for integration tests

#![allow(dead_code)]

use gametree::{AppendOptions, MergeOnKeys, NodeData, NodeId, Tree, TreeOptions};

/// Build node data from `(key, values)` pairs
pub fn data(pairs: &[(&str, &[&str])]) -> NodeData {
    pairs
        .iter()
        .map(|(key, values)| {
            (
                key.to_string(),
                values.iter().map(|v| v.to_string()).collect(),
            )
        })
        .collect()
}

/// The standard fixture:
///
/// ```text
/// root
/// └ id1 {B: dd}
///   ├ child1 {W: dq, MA: qd qq}
///   ├ child2 {W: qd}
///   └ child3 {W: qq}
///     └ sub_child1 {B: dq}
/// ```
pub struct Fixture {
    pub tree: Tree,
    pub root: NodeId,
    pub id1: NodeId,
    pub child1: NodeId,
    pub child2: NodeId,
    pub child3: NodeId,
    pub sub_child1: NodeId,
}

pub fn fixture() -> Fixture {
    let base = Tree::with_options(TreeOptions::new().merger(MergeOnKeys::new(["B", "W"])));
    let root = base.root_id().clone();

    let mut ids = Vec::new();
    let tree = base
        .mutate(|draft| {
            let opts = AppendOptions::default();
            let id1 = draft.append_node(&root, data(&[("B", &["dd"])]), opts).unwrap();
            let child1 = draft
                .append_node(&id1, data(&[("W", &["dq"]), ("MA", &["qd", "qq"])]), opts)
                .unwrap();
            let child2 = draft.append_node(&id1, data(&[("W", &["qd"])]), opts).unwrap();
            let child3 = draft.append_node(&id1, data(&[("W", &["qq"])]), opts).unwrap();
            let sub_child1 = draft.append_node(&child3, data(&[("B", &["dq"])]), opts).unwrap();
            ids = vec![id1, child1, child2, child3, sub_child1];
            Ok(())
        })
        .unwrap();

    let mut ids = ids.into_iter();
    let mut next = move || ids.next().unwrap();
    Fixture {
        tree,
        root,
        id1: next(),
        child1: next(),
        child2: next(),
        child3: next(),
        sub_child1: next(),
    }
}

/// Ids of a node's children, in order
pub fn child_ids(tree: &Tree, id: &NodeId) -> Vec<NodeId> {
    tree.get(id)
        .map(|node| node.children.iter().map(|c| c.id.clone()).collect())
        .unwrap_or_default()
}

pub fn ids<I>(nodes: I) -> Vec<NodeId>
where
    I: IntoIterator<Item = std::sync::Arc<gametree::Node>>,
{
    nodes.into_iter().map(|node| node.id.clone()).collect()
}
