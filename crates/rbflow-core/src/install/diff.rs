//! Structural comparison of two trees for reuse
//!
//! A node matches when its scalar fields match. It matches fully when every
//! child also matches fully. The first child that does not match fully ends
//! the comparison for the remaining siblings: they are reinstalled even when
//! unchanged, so an earlier edit can never leave a later sibling reading
//! stale local bindings.

use crate::ast::{Node, NodeId, NodeKind};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Match {
    /// The whole subtree is identical; graph objects are adopted as is
    Full,
    /// Same node, different children; scope objects are carried over
    Shell,
}

pub(crate) type ReuseMap = HashMap<NodeId, (NodeId, Match)>;

pub(crate) struct Differ<'a> {
    pub new_unassigned: &'a HashSet<NodeId>,
    pub old_unassigned: &'a HashSet<NodeId>,
}

impl Differ<'_> {
    pub fn diff(&self, new: &Node, old: &Node) -> ReuseMap {
        let mut out = ReuseMap::new();
        self.diff_node(new, old, &mut out);
        out
    }

    fn same(&self, new: &Node, old: &Node) -> bool {
        if !new.same_attrs(old) {
            return false;
        }
        match new.kind {
            // a read's wiring depends on whether it may see an unassigned variable
            NodeKind::LocalRead(_) => {
                self.new_unassigned.contains(&new.id) == self.old_unassigned.contains(&old.id)
            }
            _ => true,
        }
    }

    /// Returns whether `new` matched fully
    fn diff_node(&self, new: &Node, old: &Node, out: &mut ReuseMap) -> bool {
        if !self.same(new, old) {
            return false;
        }
        let new_children = new.children();
        let old_children = old.children();
        if new_children.len() != old_children.len() {
            return false;
        }
        let mut full = true;
        for (n, o) in new_children.into_iter().zip(old_children) {
            if !self.diff_node(n, o, out) {
                full = false;
                break;
            }
        }
        let kind = if full { Match::Full } else { Match::Shell };
        out.insert(new.id, (old.id, kind));
        full
    }
}
