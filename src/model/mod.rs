//! Core data model types for gametree

mod hash;
mod id;
mod node;

pub use hash::Fingerprint;
pub use id::NodeId;
pub use node::{Currents, Node, NodeData};
