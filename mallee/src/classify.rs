//! Classification of nodes touched by an edit script.

use crate::chawathe::{Action, EditScript};
use crate::tree::Tree;
use crate::{debug, trace};
use indextree::NodeId;
use rapidhash::RapidHashSet as HashSet;

/// Which source and destination nodes an edit script touches, and how.
///
/// Move sets include the whole moved subtree on both sides. Tree actions
/// expand to every node of the affected subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Source nodes whose label (or type) changed.
    pub src_updated: HashSet<NodeId>,
    /// Source nodes that were removed.
    pub src_deleted: HashSet<NodeId>,
    /// Source nodes that were relocated, with their descendants.
    pub src_moved: HashSet<NodeId>,
    /// Destination counterparts of updated nodes.
    pub dst_updated: HashSet<NodeId>,
    /// Destination nodes that were added.
    pub dst_inserted: HashSet<NodeId>,
    /// Destination counterparts of moved nodes, with their descendants.
    pub dst_moved: HashSet<NodeId>,
}

impl Classification {
    /// Source nodes that were updated or deleted.
    pub fn src_changed(&self) -> HashSet<NodeId> {
        self.src_updated.union(&self.src_deleted).copied().collect()
    }

    /// Destination nodes that were updated or inserted.
    pub fn dst_changed(&self) -> HashSet<NodeId> {
        self.dst_updated.union(&self.dst_inserted).copied().collect()
    }

    /// Whether nothing was classified.
    pub fn is_empty(&self) -> bool {
        self.src_updated.is_empty()
            && self.src_deleted.is_empty()
            && self.src_moved.is_empty()
            && self.dst_updated.is_empty()
            && self.dst_inserted.is_empty()
            && self.dst_moved.is_empty()
    }
}

fn with_descendants(tree: &Tree, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
    core::iter::once(node).chain(tree.descendants(node))
}

/// Classify every node touched by `script`, which must have been generated
/// from `src` and `dst` (raw or simplified).
pub fn classify(script: &EditScript, src: &Tree, dst: &Tree) -> Classification {
    let mut out = Classification::default();

    for action in script {
        trace!(%action, "classify");
        match action {
            Action::Delete { node } => {
                out.src_deleted.insert(*node);
            }
            Action::TreeDelete { node } => {
                out.src_deleted.extend(with_descendants(src, *node));
            }
            Action::Insert { dst: x, .. } => {
                out.dst_inserted.insert(*x);
            }
            Action::TreeInsert { dst: x, .. } => {
                out.dst_inserted.extend(with_descendants(dst, *x));
            }
            Action::Update { node, dst: x, .. } => {
                out.src_updated.insert(*node);
                out.dst_updated.insert(*x);
            }
            Action::Move { node, dst: x, .. } => {
                out.src_moved.extend(with_descendants(src, *node));
                out.dst_moved.extend(with_descendants(dst, *x));
            }
        }
    }

    debug!(
        src_updated = out.src_updated.len(),
        src_deleted = out.src_deleted.len(),
        src_moved = out.src_moved.len(),
        dst_updated = out.dst_updated.len(),
        dst_inserted = out.dst_inserted.len(),
        dst_moved = out.dst_moved.len(),
        "classify done"
    );
    out
}
