//! Lazy traversal iterators over a tree value
//!
//! All iterators are read-only and restartable: calling the producing
//! method again starts a fresh walk.

use super::Tree;
use crate::model::{Currents, Node, NodeId};
use std::borrow::Cow;
use std::sync::Arc;

/// Depth-first pre-order walk
#[derive(Debug, Clone)]
pub struct PreOrder {
    stack: Vec<Arc<Node>>,
}

impl PreOrder {
    pub(crate) fn new(root: Arc<Node>) -> Self {
        PreOrder { stack: vec![root] }
    }
}

impl Iterator for PreOrder {
    type Item = Arc<Node>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev().cloned());
        Some(node)
    }
}

/// Level-by-level sideways walk
///
/// Moving right, an exhausted level continues with the first node of the
/// next deeper level; moving left, with the last node of the next shallower
/// one. The walk ends on the first empty level.
pub struct Horizontal<'a> {
    tree: &'a Tree,
    section: Vec<Arc<Node>>,
    level: isize,
    index: isize,
    step: isize,
}

impl<'a> Horizontal<'a> {
    pub(crate) fn new(tree: &'a Tree, start_id: &NodeId, step: isize) -> Self {
        let start = tree.resolve(start_id).clone();
        let level = tree.get_level(&start).map_or(-1, |level| level as isize);
        let section: Vec<_> = tree.get_section(level).collect();
        let index = section
            .iter()
            .position(|node| node.id == start)
            .map_or(-1, |index| index as isize);

        Horizontal {
            tree,
            section: if index < 0 { Vec::new() } else { section },
            level,
            index,
            step,
        }
    }

    fn advance_level(&mut self) {
        self.level += self.step;
        self.section = if self.step > 0 {
            self.section
                .iter()
                .flat_map(|node| node.children.iter().cloned())
                .collect()
        } else {
            self.tree.get_section(self.level).collect()
        };
        self.index = if self.step > 0 {
            0
        } else {
            self.section.len() as isize - 1
        };
    }
}

impl Iterator for Horizontal<'_> {
    type Item = Arc<Node>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.section.is_empty() {
            return None;
        }

        if !(0..self.section.len() as isize).contains(&self.index) {
            self.advance_level();
            if self.section.is_empty() {
                return None;
            }
        }

        let node = Arc::clone(&self.section[self.index as usize]);
        self.index += self.step;
        Some(node)
    }
}

/// Repeated single-step navigation
pub struct Vertical<'a> {
    tree: &'a Tree,
    next: Option<Arc<Node>>,
    step: isize,
    currents: Cow<'a, Currents>,
}

impl<'a> Vertical<'a> {
    pub(crate) fn new(
        tree: &'a Tree,
        start: Option<Arc<Node>>,
        step: isize,
        currents: Cow<'a, Currents>,
    ) -> Self {
        Vertical {
            tree,
            next: start,
            step,
            currents,
        }
    }
}

impl Iterator for Vertical<'_> {
    type Item = Arc<Node>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next.take()?;
        self.next = self.tree.navigate(&node.id, self.step, &self.currents);
        Some(node)
    }
}
