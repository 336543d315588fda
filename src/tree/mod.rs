//! Persistent game tree with copy-on-write transactions
//!
//! - [`Tree`] is the immutable value: lookups, traversal, fingerprints
//! - [`Draft`] is the builder a transaction edits through
//! - Untouched subtrees are shared by reference between versions

mod document;
mod draft;
mod options;
mod traversal;
#[allow(clippy::module_inception)]
mod tree;

pub use draft::{AppendOptions, Direction, Draft};
pub use options::{Counter, IdGenerator, TreeOptions};
pub use traversal::{Horizontal, PreOrder, Vertical};
pub use tree::Tree;
