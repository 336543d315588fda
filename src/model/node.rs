//! Node type - one position in a branching record

use super::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Property name → ordered values. A key is present only while its values
/// are non-empty.
pub type NodeData = BTreeMap<String, Vec<String>>;

/// Chosen child per node, used to follow a "current" line through variations
pub type Currents = HashMap<NodeId, NodeId>;

/// An immutable tree node
///
/// Children are shared by reference between tree versions; index 0 is the
/// main continuation. `parent_id` is a lookup key into the owning tree, not a
/// back-pointer.
///
/// The serde impls recurse once per level. [`Tree::to_json`] and
/// [`Tree::from_json`] do not, and are the way to move deep trees.
///
/// [`Tree::to_json`]: crate::Tree::to_json
/// [`Tree::from_json`]: crate::Tree::from_json
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,

    #[serde(default)]
    pub data: NodeData,

    #[serde(default)]
    pub parent_id: Option<NodeId>,

    #[serde(default)]
    pub children: Vec<Arc<Node>>,
}

impl Node {
    /// Create a childless node
    pub fn new(id: impl Into<NodeId>, data: NodeData, parent_id: Option<NodeId>) -> Self {
        Node {
            id: id.into(),
            data,
            parent_id,
            children: Vec::new(),
        }
    }

    /// Values of a property, if present
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.data.get(key).map(Vec::as_slice)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Position of a direct child
    pub fn child_index(&self, id: &NodeId) -> Option<usize> {
        self.children.iter().position(|child| &child.id == id)
    }

    /// The child the line follows: the one `currents` names if it is a real
    /// child, otherwise the first child
    pub fn current_child(&self, currents: &Currents) -> Option<&Arc<Node>> {
        currents
            .get(&self.id)
            .and_then(|id| self.children.iter().find(|child| &child.id == id))
            .or_else(|| self.children.first())
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Node) -> bool {
        let mut stack = vec![(self, other)];

        while let Some((a, b)) = stack.pop() {
            if a.id != b.id
                || a.data != b.data
                || a.parent_id != b.parent_id
                || a.children.len() != b.children.len()
            {
                return false;
            }
            stack.extend(
                a.children
                    .iter()
                    .zip(&b.children)
                    .filter(|(x, y)| !Arc::ptr_eq(x, y))
                    .map(|(x, y)| (&**x, &**y)),
            );
        }

        true
    }
}

impl Drop for Node {
    // Unlink uniquely owned descendants one by one; the derived drop
    // would recurse once per level.
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(child) = stack.pop() {
            if let Ok(mut node) = Arc::try_unwrap(child) {
                stack.append(&mut node.children);
            }
        }
    }
}
