//! Tree construction options

use crate::merge::Merger;
use crate::model::{Node, NodeId};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of fresh node ids
///
/// Every call must return an id never returned before by this generator.
/// The generator is shared by all trees derived from one another.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> NodeId;
}

impl<F> IdGenerator for F
where
    F: Fn() -> NodeId + Send + Sync,
{
    fn next_id(&self) -> NodeId {
        self()
    }
}

/// Monotonically increasing in-process counter
#[derive(Debug, Default)]
pub struct Counter {
    next: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(first: u64) -> Self {
        Counter {
            next: AtomicU64::new(first),
        }
    }
}

impl IdGenerator for Counter {
    fn next_id(&self) -> NodeId {
        NodeId::from(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Options for building a [`Tree`](super::Tree)
///
/// ```
/// use gametree::{MergeOnKeys, Tree, TreeOptions};
///
/// let tree = Tree::with_options(TreeOptions::new().merger(MergeOnKeys::new(["B", "W"])));
/// assert_eq!(tree.root_id().as_str(), "0");
/// ```
#[derive(Default)]
pub struct TreeOptions {
    pub(crate) id_generator: Option<Arc<dyn IdGenerator>>,
    pub(crate) merger: Option<Arc<dyn Merger>>,
    pub(crate) root: Option<Node>,
}

impl TreeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom id generator instead of the default counter
    pub fn id_generator(mut self, generator: impl IdGenerator + 'static) -> Self {
        self.id_generator = Some(Arc::new(generator));
        self
    }

    /// Set the merge policy consulted on every append
    pub fn merger(mut self, merger: impl Merger + 'static) -> Self {
        self.merger = Some(Arc::new(merger));
        self
    }

    /// Start from a pre-built root node
    ///
    /// If no id generator is set, the default counter starts past the
    /// largest numeric id found in this subtree.
    pub fn root(mut self, root: Node) -> Self {
        self.root = Some(root);
        self
    }
}

impl fmt::Debug for TreeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeOptions")
            .field("id_generator", &self.id_generator.is_some())
            .field("merger", &self.merger.is_some())
            .field("root", &self.root.as_ref().map(|root| &root.id))
            .finish()
    }
}
