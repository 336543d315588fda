//! The persistent tree value

use super::document;
use super::draft::Draft;
use super::options::{Counter, IdGenerator, TreeOptions};
use super::traversal::{Horizontal, PreOrder, Vertical};
use crate::hasher::RollingHasher;
use crate::merge::Merger;
use crate::model::{Currents, Fingerprint, Node, NodeData, NodeId};
use crate::{Error, Result};
use parking_lot::Mutex;
use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{instrument, trace};

/// Id → canonical id, created when a merge collapses an appended id
pub(crate) type Aliases = HashMap<NodeId, NodeId>;

/// Entry of the lazy id index. Unknown ids have no entry at all.
#[derive(Clone, Debug)]
pub(crate) enum CacheEntry {
    Present(Arc<Node>),
    Absent,
}

/// Memoized, re-derivable facts about one tree value
#[derive(Debug, Default)]
pub(crate) struct Cache {
    pub(crate) nodes: HashMap<NodeId, CacheEntry>,
    pub(crate) height: Option<usize>,
    pub(crate) structure_hash: Option<Fingerprint>,
    pub(crate) hash: Option<Fingerprint>,
}

struct TreeInner {
    root: Arc<Node>,
    id_generator: Arc<dyn IdGenerator>,
    merger: Option<Arc<dyn Merger>>,
    aliases: Arc<Aliases>,
    /// Only ever filled in, never changed in a way reads can observe
    cache: Mutex<Cache>,
}

/// An immutable, structurally shared game tree
///
/// Cloning a `Tree` is cheap and yields the same value. Edits go through
/// [`Tree::mutate`], which returns a new tree sharing every untouched
/// subtree with the old one.
#[derive(Clone)]
pub struct Tree {
    inner: Arc<TreeInner>,
}

impl Tree {
    /// Create a tree holding a single empty root node
    pub fn new() -> Self {
        Self::with_options(TreeOptions::default())
    }

    pub fn with_options(options: TreeOptions) -> Self {
        let TreeOptions {
            id_generator,
            merger,
            root,
        } = options;

        let (root, id_generator) = match (root, id_generator) {
            (Some(root), Some(generator)) => (root, generator),
            (Some(root), None) => {
                let first = max_numeric_id(&root).map_or(0, |n| n + 1);
                let generator: Arc<dyn IdGenerator> = Arc::new(Counter::starting_at(first));
                (root, generator)
            }
            (None, generator) => {
                let generator =
                    generator.unwrap_or_else(|| Arc::new(Counter::new()) as Arc<dyn IdGenerator>);
                let root = Node::new(generator.next_id(), NodeData::new(), None);
                (root, generator)
            }
        };

        let mut root = root;
        root.parent_id = None;

        Self::from_parts(
            Arc::new(root),
            id_generator,
            merger,
            Arc::new(Aliases::new()),
            Cache::default(),
        )
    }

    pub(crate) fn from_parts(
        root: Arc<Node>,
        id_generator: Arc<dyn IdGenerator>,
        merger: Option<Arc<dyn Merger>>,
        aliases: Arc<Aliases>,
        cache: Cache,
    ) -> Self {
        Tree {
            inner: Arc::new(TreeInner {
                root,
                id_generator,
                merger,
                aliases,
                cache: Mutex::new(cache),
            }),
        }
    }

    /// Parse a tree from its nested JSON form
    ///
    /// Parent ids are re-derived from the nesting. Nesting depth is limited
    /// by memory only.
    pub fn from_json(json: &str, options: TreeOptions) -> Result<Self> {
        let root = document::read(json)?;
        Ok(Self::with_options(options.root(root)))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(document::write(&self.inner.root, false))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(document::write(&self.inner.root, true))
    }

    // === Accessors ===

    pub fn root(&self) -> &Arc<Node> {
        &self.inner.root
    }

    pub fn root_id(&self) -> &NodeId {
        &self.inner.root.id
    }

    /// Whether two handles refer to the same tree value
    pub fn ptr_eq(a: &Tree, b: &Tree) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    pub(crate) fn merger(&self) -> Option<&Arc<dyn Merger>> {
        self.inner.merger.as_ref()
    }

    pub(crate) fn id_generator(&self) -> &Arc<dyn IdGenerator> {
        &self.inner.id_generator
    }

    pub(crate) fn next_id(&self) -> NodeId {
        self.inner.id_generator.next_id()
    }

    pub(crate) fn aliases(&self) -> &Arc<Aliases> {
        &self.inner.aliases
    }

    /// Height and structure hash, if already computed
    pub(crate) fn cached_shape(&self) -> (Option<usize>, Option<Fingerprint>) {
        let cache = self.inner.cache.lock();
        (cache.height, cache.structure_hash)
    }

    // === Identity ===

    /// Follow aliases to the canonical id
    pub fn resolve<'a>(&'a self, id: &'a NodeId) -> &'a NodeId {
        resolve_alias(&self.inner.aliases, id)
    }

    /// Look up a node by id, following aliases
    pub fn get(&self, id: &NodeId) -> Option<Arc<Node>> {
        let id = self.resolve(id);
        let mut cache = self.inner.cache.lock();

        let node = match cache.nodes.get(id).cloned() {
            Some(CacheEntry::Present(node)) => Some(node),
            Some(CacheEntry::Absent) => None,
            None => {
                trace!(%id, "node cache miss");
                let found = search(&self.inner.root, id, &mut cache.nodes);
                if found.is_none() {
                    cache.nodes.insert(id.clone(), CacheEntry::Absent);
                }
                found
            }
        }?;

        for child in &node.children {
            cache
                .nodes
                .entry(child.id.clone())
                .or_insert_with(|| CacheEntry::Present(Arc::clone(child)));
        }

        Some(node)
    }

    pub fn has(&self, id: &NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Count all nodes
    pub fn len(&self) -> usize {
        self.list_nodes().count()
    }

    /// A tree always holds at least its root
    pub fn is_empty(&self) -> bool {
        false
    }

    // === Traversal ===

    /// The node, then its single-child continuation up to the next fork or leaf
    pub fn get_sequence(&self, id: &NodeId) -> impl Iterator<Item = Arc<Node>> {
        std::iter::successors(self.get(id), |node| match node.children.as_slice() {
            [only] => Some(Arc::clone(only)),
            _ => None,
        })
    }

    /// Move `step` levels from a node: up through parents when negative, down
    /// along the current line when positive
    pub fn navigate(&self, id: &NodeId, step: isize, currents: &Currents) -> Option<Arc<Node>> {
        let mut node = self.get(id)?;

        if step < 0 {
            for _ in 0..step.unsigned_abs() {
                node = self.get(node.parent_id.as_ref()?)?;
            }
        } else {
            for _ in 0..step {
                node = Arc::clone(node.current_child(currents)?);
            }
        }

        Some(node)
    }

    /// All nodes, depth-first pre-order
    pub fn list_nodes(&self) -> PreOrder {
        PreOrder::new(Arc::clone(&self.inner.root))
    }

    /// Walk a level sideways from `start_id`, spilling into the next level
    /// (deeper for +1, shallower for -1) when a level runs out
    pub fn list_nodes_horizontally(&self, start_id: &NodeId, step: isize) -> Result<Horizontal<'_>> {
        check_step(step)?;
        Ok(Horizontal::new(self, start_id, step))
    }

    /// Repeated single-step [`navigate`](Self::navigate), starting with the
    /// start node itself
    pub fn list_nodes_vertically<'a>(
        &'a self,
        start_id: &NodeId,
        step: isize,
        currents: &'a Currents,
    ) -> Result<Vertical<'a>> {
        check_step(step)?;
        Ok(Vertical::new(
            self,
            self.get(start_id),
            step,
            Cow::Borrowed(currents),
        ))
    }

    /// The line from the root following `currents`
    pub fn list_current_nodes<'a>(&'a self, currents: &'a Currents) -> Vertical<'a> {
        Vertical::new(
            self,
            Some(Arc::clone(&self.inner.root)),
            1,
            Cow::Borrowed(currents),
        )
    }

    /// The line from the root following first children
    pub fn list_main_nodes(&self) -> Vertical<'_> {
        Vertical::new(
            self,
            Some(Arc::clone(&self.inner.root)),
            1,
            Cow::Owned(Currents::new()),
        )
    }

    /// Depth of a node, the root being level 0
    pub fn get_level(&self, id: &NodeId) -> Option<usize> {
        let mut node = self.get(id)?;
        let mut level = 0;

        while let Some(parent_id) = &node.parent_id {
            node = self.get(parent_id)?;
            level += 1;
        }

        Some(level)
    }

    /// All nodes at exactly `level`, in document order
    pub fn get_section(&self, level: isize) -> impl Iterator<Item = Arc<Node>> {
        let mut frontier = Vec::new();

        if level >= 0 {
            frontier.push(Arc::clone(&self.inner.root));
            for _ in 1..level {
                frontier = frontier
                    .iter()
                    .flat_map(|node| node.children.iter().cloned())
                    .collect();
            }
        }

        let expand = level > 0;
        frontier.into_iter().flat_map(move |node| {
            if expand {
                node.children.clone()
            } else {
                vec![node]
            }
        })
    }

    /// Number of nodes on the line chosen by `currents`
    pub fn get_current_height(&self, currents: &Currents) -> usize {
        let mut node = Arc::clone(&self.inner.root);
        let mut height = 1;

        while let Some(child) = node.current_child(currents) {
            node = Arc::clone(child);
            height += 1;
        }

        height
    }

    /// Number of levels in the tree
    pub fn get_height(&self) -> usize {
        if let Some(height) = self.inner.cache.lock().height {
            return height;
        }

        let mut height = 0;
        let mut stack = vec![(&self.inner.root, 1usize)];
        while let Some((node, depth)) = stack.pop() {
            height = height.max(depth);
            stack.extend(node.children.iter().map(|child| (child, depth + 1)));
        }

        self.inner.cache.lock().height = Some(height);
        height
    }

    /// Fingerprint of ids and branching only
    pub fn get_structure_hash(&self) -> Fingerprint {
        if let Some(hash) = self.inner.cache.lock().structure_hash {
            return hash;
        }

        trace!("computing structure hash");
        let hash = fingerprint(&self.inner.root, |node| Cow::Borrowed(node.id.as_str()));
        self.inner.cache.lock().structure_hash = Some(hash);
        hash
    }

    /// Fingerprint of data and branching
    pub fn get_hash(&self) -> Fingerprint {
        if let Some(hash) = self.inner.cache.lock().hash {
            return hash;
        }

        trace!("computing content hash");
        let hash = fingerprint(&self.inner.root, |node| {
            Cow::Owned(document::encode_data(&node.data))
        });
        self.inner.cache.lock().hash = Some(hash);
        hash
    }

    /// Whether every step from the node up to the root follows `currents`
    pub fn on_current_line(&self, id: &NodeId, currents: &Currents) -> bool {
        let Some(mut node) = self.get(id) else {
            return false;
        };

        while let Some(parent_id) = &node.parent_id {
            let Some(parent) = self.get(parent_id) else {
                return false;
            };

            match parent.current_child(currents) {
                Some(child) if child.id == node.id => {}
                _ => return false,
            }

            node = parent;
        }

        true
    }

    pub fn on_main_line(&self, id: &NodeId) -> bool {
        self.on_current_line(id, &Currents::new())
    }

    // === Mutation ===

    /// Apply a transaction and return the resulting tree
    ///
    /// If the transaction fails, the error is returned and nothing it did is
    /// observable. If it changes nothing, the same tree value is returned.
    ///
    /// ```
    /// use gametree::{AppendOptions, NodeData, Tree};
    ///
    /// let tree = Tree::new();
    /// let mut id = None;
    /// let next = tree
    ///     .mutate(|draft| {
    ///         let root = draft.root_id().clone();
    ///         id = draft.append_node(&root, NodeData::new(), AppendOptions::default());
    ///         Ok(())
    ///     })
    ///     .unwrap();
    ///
    /// assert!(next.get(&id.unwrap()).is_some());
    /// assert_eq!(tree.len(), 1);
    /// ```
    #[instrument(level = "debug", skip_all, fields(root = %self.root_id()))]
    pub fn mutate<F>(&self, transaction: F) -> Result<Tree>
    where
        F: FnOnce(&mut Draft<'_>) -> Result<()>,
    {
        let mut draft = Draft::new(self);
        transaction(&mut draft)?;
        Ok(draft.commit())
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("root", self.root_id())
            .field("aliases", &self.inner.aliases)
            .finish()
    }
}

/// Nested form of the root. Recurses once per level; use
/// [`Tree::to_json`] for deep trees.
impl Serialize for Tree {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.inner.root.serialize(serializer)
    }
}

pub(crate) fn resolve_alias<'a>(aliases: &'a Aliases, id: &'a NodeId) -> &'a NodeId {
    let mut current = id;
    // Chains are collapsed on insert, the bound only guards against cycles
    for _ in 0..=aliases.len() {
        match aliases.get(current) {
            Some(next) if next != current => current = next,
            _ => break,
        }
    }
    current
}

pub(crate) fn check_step(step: isize) -> Result<()> {
    if step.abs() == 1 {
        Ok(())
    } else {
        Err(Error::InvalidStep(step))
    }
}

/// Depth-first search that records every visited node in the index
fn search(
    root: &Arc<Node>,
    target: &NodeId,
    index: &mut HashMap<NodeId, CacheEntry>,
) -> Option<Arc<Node>> {
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        index.insert(node.id.clone(), CacheEntry::Present(Arc::clone(node)));
        if &node.id == target {
            return Some(Arc::clone(node));
        }
        stack.extend(node.children.iter().rev());
    }

    None
}

/// Pre-order bracketed walk: `[` + key on entry, `]` on exit
fn fingerprint<'n, F>(root: &'n Arc<Node>, key: F) -> Fingerprint
where
    F: Fn(&'n Node) -> Cow<'n, str>,
{
    enum Visit<'n> {
        Enter(&'n Arc<Node>),
        Exit,
    }

    let mut hasher = RollingHasher::new();
    let mut stack = vec![Visit::Enter(root)];

    while let Some(visit) = stack.pop() {
        match visit {
            Visit::Enter(node) => {
                hasher.feed("[");
                hasher.feed(&key(node.as_ref()));
                stack.push(Visit::Exit);
                stack.extend(node.children.iter().rev().map(Visit::Enter));
            }
            Visit::Exit => {
                hasher.feed("]");
            }
        }
    }

    hasher.finish()
}

fn max_numeric_id(root: &Node) -> Option<u64> {
    let mut max = root.id.as_number();
    let mut stack: Vec<&Node> = root.children.iter().map(|c| &**c).collect();

    while let Some(node) = stack.pop() {
        max = max.max(node.id.as_number());
        stack.extend(node.children.iter().map(|c| &**c));
    }

    max
}
