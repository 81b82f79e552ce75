//! Edit script simplification.
//!
//! Consolidates redundant actions to produce cleaner scripts:
//! - When a whole subtree is inserted, report one tree insert at its root
//! - When a whole subtree is deleted, report one tree delete at its root
//!
//! Updates and moves are kept as they are.

use crate::chawathe::{Action, EditScript};
use crate::tree::Tree;
use crate::{debug, trace};
use indextree::NodeId;
use rapidhash::RapidHashSet as HashSet;

/// Nodes of `tree` that are in `marked` together with all their descendants.
fn fully_marked(tree: &Tree, marked: &HashSet<NodeId>) -> HashSet<NodeId> {
    let mut full = HashSet::default();
    for node in tree.post_order() {
        if marked.contains(&node) && tree.children(node).all(|c| full.contains(&c)) {
            full.insert(node);
        }
    }
    full
}

/// Simplify an edit script by replacing per-node inserts and deletes of
/// entire subtrees with [`Action::TreeInsert`] and [`Action::TreeDelete`].
///
/// The simplified script applies to the same working copy and produces the
/// same result.
pub fn simplify_edit_script(script: EditScript, src: &Tree, dst: &Tree) -> EditScript {
    debug!(actions = script.len(), "simplify_edit_script start");

    let mut inserted: HashSet<NodeId> = HashSet::default();
    let mut deleted: HashSet<NodeId> = HashSet::default();
    for action in &script {
        match action {
            Action::Insert { dst, .. } => {
                inserted.insert(*dst);
            }
            Action::Delete { node } => {
                deleted.insert(*node);
            }
            _ => {}
        }
    }

    let fully_inserted = fully_marked(dst, &inserted);
    let fully_deleted = fully_marked(src, &deleted);
    debug!(
        inserted = inserted.len(),
        fully_inserted = fully_inserted.len(),
        deleted = deleted.len(),
        fully_deleted = fully_deleted.len(),
        "collected nodes"
    );

    let EditScript { actions, fake_root } = script;
    let mut simplified = Vec::with_capacity(actions.len());
    for action in actions {
        match action {
            Action::Insert {
                node,
                dst: x,
                parent,
                position,
                ..
            } if fully_inserted.contains(&x) => {
                if dst.parent(x).is_some_and(|p| fully_inserted.contains(&p)) {
                    trace!(dst = usize::from(x), "simplify: insert covered by ancestor");
                } else if dst.is_leaf(x) {
                    simplified.push(action);
                } else {
                    simplified.push(Action::TreeInsert {
                        node,
                        dst: x,
                        parent,
                        position,
                    });
                }
            }
            Action::Delete { node } if fully_deleted.contains(&node) => {
                if src.parent(node).is_some_and(|p| fully_deleted.contains(&p)) {
                    trace!(node = usize::from(node), "simplify: delete covered by ancestor");
                } else if src.is_leaf(node) {
                    simplified.push(action);
                } else {
                    simplified.push(Action::TreeDelete { node });
                }
            }
            other => simplified.push(other),
        }
    }

    debug!(actions = simplified.len(), "simplify_edit_script done");
    EditScript {
        actions: simplified,
        fake_root,
    }
}
