//! Pluggable merge policies
//!
//! When a node is appended, the draft asks the tree's merger whether the new
//! data folds into an existing sibling. The first sibling that matches wins
//! and its data is replaced by the merged result.

use crate::model::NodeData;

/// Strategy deciding whether appended data merges into an existing child
///
/// Implementations must be pure: the same inputs always give the same answer.
pub trait Merger: Send + Sync {
    /// Return the merged data if `incoming` should fold into `existing`
    fn merge(&self, existing: &NodeData, incoming: &NodeData) -> Option<NodeData>;
}

impl<F> Merger for F
where
    F: Fn(&NodeData, &NodeData) -> Option<NodeData> + Send + Sync,
{
    fn merge(&self, existing: &NodeData, incoming: &NodeData) -> Option<NodeData> {
        self(existing, incoming)
    }
}

/// Merges records that agree on the first value of any listed key
///
/// Typical use is move deduplication: `MergeOnKeys::new(["B", "W"])` folds a
/// repeated move into the existing variation. The merged data is the
/// incoming record.
#[derive(Clone, Debug)]
pub struct MergeOnKeys {
    keys: Vec<String>,
}

impl MergeOnKeys {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MergeOnKeys {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl Merger for MergeOnKeys {
    fn merge(&self, existing: &NodeData, incoming: &NodeData) -> Option<NodeData> {
        let matches = self.keys.iter().any(|key| {
            match (
                existing.get(key).and_then(|v| v.first()),
                incoming.get(key).and_then(|v| v.first()),
            ) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        });

        matches.then(|| incoming.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(pairs: &[(&str, &[&str])]) -> NodeData {
        pairs
            .iter()
            .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_merge_on_first_value() {
        let merger = MergeOnKeys::new(["B", "W"]);
        let existing = data(&[("B", &["x"])]);
        let incoming = data(&[("B", &["x", "y"])]);

        assert_eq!(merger.merge(&existing, &incoming), Some(incoming.clone()));
    }

    #[test]
    fn test_no_merge_on_different_values() {
        let merger = MergeOnKeys::new(["B"]);
        assert_eq!(
            merger.merge(&data(&[("B", &["x"])]), &data(&[("B", &["z"])])),
            None
        );
    }

    #[test]
    fn test_no_merge_when_key_missing() {
        let merger = MergeOnKeys::new(["B"]);
        assert_eq!(
            merger.merge(&data(&[("W", &["x"])]), &data(&[("W", &["x"])])),
            None
        );
    }

    #[test]
    fn test_closure_is_a_merger() {
        let always = |_: &NodeData, incoming: &NodeData| Some(incoming.clone());
        let incoming = data(&[("C", &["hi"])]);
        assert_eq!(always.merge(&NodeData::new(), &incoming), Some(incoming));
    }
}
