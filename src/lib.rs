//! # gametree
//!
//! An immutable, structurally shared tree for branching records such as a
//! game's move sequence with its variations.
//!
//! Every edit produces a new tree value; previously held trees never change,
//! and unchanged subtrees are shared between versions.
//!
//! ## Core Concepts
//!
//! - **Nodes**: an id, a property map, a parent id and ordered children
//!   (child 0 is the main continuation)
//! - **Trees**: persistent values with lazily cached lookups, heights and
//!   fingerprints
//! - **Drafts**: transaction-scoped builders that clone only the path from
//!   an edited node to the root
//! - **Merging**: an optional policy folding a repeated append into an
//!   existing sibling, with the would-be id kept as an alias
//!
//! ## Example
//!
//! ```
//! use gametree::{AppendOptions, NodeData, Tree};
//!
//! let tree = Tree::new();
//! let next = tree.mutate(|draft| {
//!     let root = draft.root_id().clone();
//!     let mut data = NodeData::new();
//!     data.insert("B".into(), vec!["dd".into()]);
//!     draft.append_node(&root, data, AppendOptions::default());
//!     Ok(())
//! })?;
//!
//! assert_eq!(tree.get_height(), 1);
//! assert_eq!(next.get_height(), 2);
//! # Ok::<(), gametree::Error>(())
//! ```

pub mod hasher;
pub mod merge;
pub mod model;
pub mod tree;

mod error;

pub use error::{Error, Result};
pub use merge::{MergeOnKeys, Merger};
pub use model::{Currents, Fingerprint, Node, NodeData, NodeId};
pub use tree::{AppendOptions, Counter, Direction, Draft, IdGenerator, Tree, TreeOptions};
