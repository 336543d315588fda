//! Error types for gametree

use crate::model::NodeId;
use thiserror::Error;

/// Result type alias for gametree operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in gametree operations
///
/// Lookups of unknown ids are not errors; they yield `None` or an empty
/// iterator instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid value for step: {0}, only -1 or 1 allowed")]
    InvalidStep(isize),

    #[error("Invalid value for direction: {0}")]
    InvalidDirection(String),

    #[error("Cannot remove root node: {0}")]
    CannotRemoveRoot(NodeId),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
