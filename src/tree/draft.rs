//! Transaction-scoped copy-on-write builder
//!
//! A draft stages edits against a base tree. Touching a node clones it and
//! every ancestor up to the root; everything else stays shared with the
//! base. Staged clones are keyed by id, so a parent's child slot is
//! superseded by the staged clone of the same id until commit re-links them.

use super::tree::{resolve_alias, Aliases, Cache, CacheEntry};
use super::Tree;
use crate::model::{Fingerprint, Node, NodeData, NodeId};
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument, trace};

/// Where a node moves among its siblings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// One position towards the front
    Left,
    /// One position towards the back
    Right,
    /// To the front, making it the main continuation
    Main,
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            "main" => Ok(Direction::Main),
            other => Err(Error::InvalidDirection(other.to_string())),
        }
    }
}

/// Options for appending a node
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AppendOptions {
    /// Always create a new node, even if the merger would match a sibling
    pub disable_merging: bool,
}

impl AppendOptions {
    pub fn without_merging() -> Self {
        AppendOptions {
            disable_merging: true,
        }
    }
}

/// A node as the draft currently sees it
enum Staged<'n> {
    Draft(&'n Node),
    Base(Arc<Node>),
}

impl Deref for Staged<'_> {
    type Target = Node;

    fn deref(&self) -> &Node {
        match self {
            Staged::Draft(node) => node,
            Staged::Base(node) => node,
        }
    }
}

/// A cloned or new node and its distance to the draft's root
#[derive(Debug)]
struct Entry {
    node: Node,
    depth: usize,
}

/// Mutable view of a tree during one [`Tree::mutate`] call
pub struct Draft<'a> {
    base: &'a Tree,
    root_id: NodeId,
    /// Clones and new nodes, all attached to the draft's root. Child slots
    /// may still point at base nodes whose ids are staged here; the staged
    /// entry wins.
    nodes: HashMap<NodeId, Entry>,
    removed: HashSet<NodeId>,
    aliases: Arc<Aliases>,
    pass_on_node_cache: bool,
    height: Option<usize>,
    structure_hash: Option<Fingerprint>,
}

impl<'a> Draft<'a> {
    pub(crate) fn new(base: &'a Tree) -> Self {
        let (height, structure_hash) = base.cached_shape();

        Draft {
            base,
            root_id: base.root_id().clone(),
            nodes: HashMap::new(),
            removed: HashSet::new(),
            aliases: Arc::clone(base.aliases()),
            pass_on_node_cache: true,
            height,
            structure_hash,
        }
    }

    // === Reads ===

    pub fn root_id(&self) -> &NodeId {
        &self.root_id
    }

    /// Follow aliases, including ones recorded in this transaction
    pub fn resolve(&self, id: &NodeId) -> NodeId {
        resolve_alias(&self.aliases, id).clone()
    }

    pub fn has(&self, id: &NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn data(&self, id: &NodeId) -> Option<NodeData> {
        self.node(id).map(|node| node.data.clone())
    }

    pub fn parent_id(&self, id: &NodeId) -> Option<NodeId> {
        self.node(id).and_then(|node| node.parent_id.clone())
    }

    pub fn children_ids(&self, id: &NodeId) -> Vec<NodeId> {
        self.node(id)
            .map(|node| node.children.iter().map(|c| c.id.clone()).collect())
            .unwrap_or_default()
    }

    /// Depth below the draft's root
    pub fn level(&self, id: &NodeId) -> Option<usize> {
        self.depth(&self.resolve(id))
    }

    /// Distance to the root, or `None` if the node is not in the draft's tree
    ///
    /// Staged nodes answer directly. A base node climbs to its first staged
    /// ancestor, which must still list the child it was reached from.
    fn depth(&self, id: &NodeId) -> Option<usize> {
        if self.removed.contains(id) {
            return None;
        }
        if let Some(entry) = self.nodes.get(id) {
            return Some(entry.depth);
        }

        let mut current = self.base.get(id)?;
        let mut steps = 0;
        loop {
            if current.id == self.root_id {
                return Some(steps);
            }
            let parent_id = current.parent_id.as_ref()?;
            steps += 1;

            if let Some(parent) = self.nodes.get(parent_id) {
                parent.node.child_index(&current.id)?;
                return Some(parent.depth + steps);
            }
            current = self.base.get(parent_id)?;
        }
    }

    fn node(&self, id: &NodeId) -> Option<Staged<'_>> {
        let id = self.resolve(id);
        self.depth(&id)?;
        match self.nodes.get(&id) {
            Some(entry) => Some(Staged::Draft(&entry.node)),
            None => self.base.get(&id).map(Staged::Base),
        }
    }

    /// Copy-on-write access: clones the node and its unstaged ancestors on
    /// first use
    fn get_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        let id = self.resolve(id);
        let depth = self.depth(&id)?;

        if !self.nodes.contains_key(&id) {
            let mut current = self.base.get(&id)?;
            let mut level = depth;
            let mut cloned = 0;
            loop {
                let parent_id = current.parent_id.clone();
                self.nodes.insert(
                    current.id.clone(),
                    Entry {
                        node: (*current).clone(),
                        depth: level,
                    },
                );
                cloned += 1;

                match parent_id {
                    Some(parent_id) if level > 0 && !self.nodes.contains_key(&parent_id) => {
                        current = self.base.get(&parent_id)?;
                        level -= 1;
                    }
                    _ => break,
                }
            }
            trace!(%id, cloned, "copied path into draft");
        }

        self.nodes.get_mut(&id).map(|entry| &mut entry.node)
    }

    /// Drop a staged subtree from the draft
    fn unstage(&mut self, id: &NodeId) {
        let mut stack = vec![id.clone()];
        while let Some(id) = stack.pop() {
            if let Some(entry) = self.nodes.remove(&id) {
                stack.extend(entry.node.children.iter().map(|child| child.id.clone()));
            }
        }
    }

    // === Structure edits ===

    /// Append a child with a freshly generated id
    ///
    /// Returns the id of the new node, or of the sibling it merged into.
    /// `None` if the parent does not exist.
    pub fn append_node(
        &mut self,
        parent_id: &NodeId,
        data: NodeData,
        options: AppendOptions,
    ) -> Option<NodeId> {
        let parent_id = self.resolve(parent_id);
        self.depth(&parent_id)?;
        let id = self.base.next_id();
        self.append(&parent_id, id, data, options, false)
    }

    /// Append a child under a caller-chosen id, e.g. to replay a recorded
    /// append
    ///
    /// If the node merges into a sibling with a different id, `id` becomes
    /// a permanent alias of that sibling. Fails if the parent is missing, or
    /// if `id` already names a node other than the merge target.
    pub fn append_node_with_id(
        &mut self,
        parent_id: &NodeId,
        id: impl Into<NodeId>,
        data: NodeData,
        options: AppendOptions,
    ) -> bool {
        self.append(parent_id, id.into(), data, options, true)
            .is_some()
    }

    /// `explicit` ids are checked against live nodes; generated ones are
    /// fresh by contract.
    fn append(
        &mut self,
        parent_id: &NodeId,
        id: NodeId,
        mut data: NodeData,
        options: AppendOptions,
        explicit: bool,
    ) -> Option<NodeId> {
        let parent_id = self.resolve(parent_id);
        let parent_depth = self.depth(&parent_id)?;
        data.retain(|_, values| !values.is_empty());

        let base = self.base;
        if let Some(merger) = base.merger().filter(|_| !options.disable_merging) {
            let matched = {
                let parent = self.node(&parent_id)?;
                parent.children.iter().find_map(|child| {
                    let existing = self
                        .nodes
                        .get(&child.id)
                        .map_or(&child.data, |entry| &entry.node.data);
                    merger
                        .merge(existing, &data)
                        .map(|merged| (child.id.clone(), merged))
                })
            };

            if let Some((matched_id, mut merged)) = matched {
                if explicit && id != matched_id {
                    if let Some(live) = self.node(&id) {
                        if live.id != matched_id {
                            trace!(%id, %matched_id, "id names another node, not aliasing");
                            return None;
                        }
                    }
                }

                merged.retain(|_, values| !values.is_empty());
                self.get_mut(&matched_id)?.data = merged;

                if explicit && id != matched_id {
                    trace!(%id, %matched_id, "aliasing merged id");
                    Arc::make_mut(&mut self.aliases).insert(id, matched_id.clone());
                }
                return Some(matched_id);
            }
        }

        if explicit && self.node(&id).is_some() {
            return None;
        }

        let node = Node::new(id.clone(), data, Some(parent_id.clone()));
        self.get_mut(&parent_id)?
            .children
            .push(Arc::new(node.clone()));
        self.nodes.insert(
            id.clone(),
            Entry {
                node,
                depth: parent_depth + 1,
            },
        );
        self.removed.remove(&id);
        if self.aliases.contains_key(&id) {
            // A stale alias must not shadow the node now holding this id
            Arc::make_mut(&mut self.aliases).remove(&id);
        }
        self.structure_hash = None;

        if let Some(height) = self.height {
            if parent_depth + 1 == height {
                self.height = Some(height + 1);
            }
        }

        Some(id)
    }

    /// Detach a node and its subtree
    ///
    /// Returns `Ok(false)` if the node or its parent cannot be found.
    pub fn remove_node(&mut self, id: &NodeId) -> Result<bool> {
        let id = self.resolve(id);
        let parent_id = match self.node(&id) {
            Some(node) => node.parent_id.clone(),
            None => return Ok(false),
        };
        let Some(parent_id) = parent_id else {
            return Err(Error::CannotRemoveRoot(id));
        };

        let Some(parent) = self.get_mut(&parent_id) else {
            return Ok(false);
        };
        let Some(index) = parent.child_index(&id) else {
            return Ok(false);
        };
        parent.children.remove(index);

        self.unstage(&id);
        self.removed.insert(id);
        self.structure_hash = None;
        self.height = None;

        Ok(true)
    }

    /// Move a node among its siblings and return its new position
    ///
    /// `Right` on the last sibling reports a position one past the end and
    /// leaves the order as it was.
    pub fn shift_node(&mut self, id: &NodeId, direction: Direction) -> Option<usize> {
        let id = self.resolve(id);
        let parent_id = self.node(&id)?.parent_id.clone()?;
        let parent = self.get_mut(&parent_id)?;
        let index = parent.child_index(&id)?;

        let target = match direction {
            Direction::Left => index.saturating_sub(1),
            Direction::Right => (index + 1).min(parent.children.len()),
            Direction::Main => 0,
        };

        if target != index {
            let child = parent.children.remove(index);
            let slot = target.min(parent.children.len());
            parent.children.insert(slot, child);
            self.structure_hash = None;
        }

        Some(target)
    }

    /// Re-root the tree at a node, dropping everything outside its subtree
    pub fn make_root(&mut self, id: &NodeId) -> bool {
        let id = self.resolve(id);
        if id == self.root_id {
            return true;
        }

        let Some(offset) = self.depth(&id) else {
            return false;
        };
        let Some(node) = self.get_mut(&id) else {
            return false;
        };
        node.parent_id = None;

        // Keep only the staged part of the new subtree, re-based to depth 0
        let mut kept = HashMap::new();
        let mut stack = vec![id.clone()];
        while let Some(cid) = stack.pop() {
            if let Some(mut entry) = self.nodes.remove(&cid) {
                entry.depth -= offset;
                stack.extend(entry.node.children.iter().map(|child| child.id.clone()));
                kept.insert(cid, entry);
            }
        }
        self.nodes = kept;

        self.root_id = id;
        self.pass_on_node_cache = false;
        self.height = None;
        self.structure_hash = None;

        true
    }

    // === Property edits ===

    /// Add a value unless the property already holds it
    pub fn add_to_property(
        &mut self,
        id: &NodeId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> bool {
        let Some(node) = self.get_mut(id) else {
            return false;
        };

        let value = value.into();
        let values = node.data.entry(key.into()).or_default();
        if !values.contains(&value) {
            values.push(value);
        }

        true
    }

    /// Remove a value, deleting the property once it is empty
    pub fn remove_from_property(&mut self, id: &NodeId, key: &str, value: &str) -> bool {
        let Some(node) = self.get_mut(id) else {
            return false;
        };

        if let Some(values) = node.data.get_mut(key) {
            values.retain(|v| v != value);
            if values.is_empty() {
                node.data.remove(key);
            }
        }

        true
    }

    /// Replace all values of a property; no values deletes it
    pub fn update_property<I, S>(&mut self, id: &NodeId, key: impl Into<String>, values: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let Some(node) = self.get_mut(id) else {
            return false;
        };

        let key = key.into();
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            node.data.remove(&key);
        } else {
            node.data.insert(key, values);
        }

        true
    }

    pub fn remove_property(&mut self, id: &NodeId, key: &str) -> bool {
        self.update_property(id, key, std::iter::empty::<String>())
    }

    // === Commit ===

    /// Build the resulting tree, or hand back the base if nothing changed
    #[instrument(level = "trace", skip_all)]
    pub(crate) fn commit(mut self) -> Tree {
        let base = self.base;
        let changed = self.root_id != *base.root_id() || self.nodes.contains_key(&self.root_id);
        if !changed {
            trace!("transaction left the tree unchanged");
            return base.clone();
        }

        let staged = self.nodes.len();
        let Some((root, sealed)) = self.seal() else {
            return base.clone();
        };

        let mut cache = Cache {
            height: self.height,
            structure_hash: self.structure_hash,
            ..Cache::default()
        };
        if self.pass_on_node_cache {
            cache.nodes.extend(
                sealed
                    .into_iter()
                    .map(|(id, node)| (id, CacheEntry::Present(node))),
            );
            cache
                .nodes
                .extend(self.removed.into_iter().map(|id| (id, CacheEntry::Absent)));
        }

        debug!(
            root = %root.id,
            staged,
            aliases = self.aliases.len(),
            "committed transaction"
        );

        Tree::from_parts(
            root,
            Arc::clone(base.id_generator()),
            base.merger().cloned(),
            self.aliases,
            cache,
        )
    }

    /// Turn staged nodes reachable from the root into shared nodes, children
    /// before parents
    fn seal(&mut self) -> Option<(Arc<Node>, HashMap<NodeId, Arc<Node>>)> {
        let mut sealed: HashMap<NodeId, Arc<Node>> = HashMap::new();
        let mut stack = vec![(self.root_id.clone(), false)];

        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                let mut node = self.nodes.remove(&id)?.node;
                for child in node.children.iter_mut() {
                    if let Some(done) = sealed.get(&child.id) {
                        *child = Arc::clone(done);
                    }
                }
                sealed.insert(id, Arc::new(node));
            } else {
                let pending: Vec<NodeId> = self
                    .nodes
                    .get(&id)?
                    .node
                    .children
                    .iter()
                    .filter(|child| self.nodes.contains_key(&child.id))
                    .map(|child| child.id.clone())
                    .collect();
                stack.push((id, true));
                stack.extend(pending.into_iter().map(|child| (child, false)));
            }
        }

        let root = Arc::clone(sealed.get(&self.root_id)?);
        Some((root, sealed))
    }
}
