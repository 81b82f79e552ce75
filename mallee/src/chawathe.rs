//! Chawathe edit script generation.
//!
//! Produces an ordered script of INSERT, DELETE, UPDATE and MOVE actions that
//! turns the source tree into the destination tree, given a mapping between
//! them. Based on "Change Detection in Hierarchically Structured Information"
//! (Chawathe et al., 1996).
//!
//! The script is built by replaying it on a working copy of the source:
//! 1. Breadth-first over dst: insert unmapped nodes, update relabelled ones,
//!    move mapped nodes whose parent differs
//! 2. After each node, align its children: keep the longest run of mapped
//!    children already in order and move the rest into place
//! 3. Delete every working-copy node left unmapped, children first

use crate::interner::NodeType;
use crate::lcs::lcs;
use crate::mapping::MappingStore;
use crate::tree::{NodeData, Tree, insert_child_at, position_in_parent};
use crate::{debug, trace};
use compact_str::CompactString;
use core::fmt;
use indextree::{Arena, NodeEdge, NodeId};
use rapidhash::RapidHashSet as HashSet;

/// An edit action.
///
/// `node` always names a node of the working copy: original source nodes
/// keep their source `NodeId`, inserted nodes get fresh ids. Actions tied to
/// a destination node also carry it as `dst`.
#[derive(Clone, PartialEq, Eq)]
pub enum Action {
    /// Insert a new leaf.
    Insert {
        /// The new node in the working copy.
        node: NodeId,
        /// The destination node it stands for.
        dst: NodeId,
        /// Parent in the working copy.
        parent: NodeId,
        /// Index among the parent's children at insertion time.
        position: usize,
        /// Type of the new node.
        kind: NodeType,
        /// Label of the new node.
        label: Option<CompactString>,
    },

    /// Insert a copy of a whole destination subtree.
    TreeInsert {
        /// The new subtree root in the working copy.
        node: NodeId,
        /// The destination subtree root.
        dst: NodeId,
        /// Parent in the working copy.
        parent: NodeId,
        /// Index among the parent's children at insertion time.
        position: usize,
    },

    /// Delete a leaf.
    Delete {
        /// The deleted node.
        node: NodeId,
    },

    /// Delete a whole subtree.
    TreeDelete {
        /// Root of the deleted subtree.
        node: NodeId,
    },

    /// Change the label (and for a forced root pair, the type) of a node.
    Update {
        /// The updated node.
        node: NodeId,
        /// Its destination counterpart.
        dst: NodeId,
        /// Label before the update.
        old_label: Option<CompactString>,
        /// Label after the update.
        new_label: Option<CompactString>,
        /// New type, when the mapped nodes disagree on it.
        retype: Option<NodeType>,
    },

    /// Move a subtree under a new parent or to a new position.
    Move {
        /// Root of the moved subtree.
        node: NodeId,
        /// Its destination counterpart.
        dst: NodeId,
        /// New parent in the working copy.
        parent: NodeId,
        /// Index among the new parent's children, computed with the moved
        /// node already detached.
        position: usize,
    },
}

impl Action {
    /// The working-copy node the action applies to.
    pub fn node(&self) -> NodeId {
        match self {
            Action::Insert { node, .. }
            | Action::TreeInsert { node, .. }
            | Action::Delete { node }
            | Action::TreeDelete { node }
            | Action::Update { node, .. }
            | Action::Move { node, .. } => *node,
        }
    }

    /// The destination node the action is tied to, if any.
    pub fn dst(&self) -> Option<NodeId> {
        match self {
            Action::Insert { dst, .. }
            | Action::TreeInsert { dst, .. }
            | Action::Update { dst, .. }
            | Action::Move { dst, .. } => Some(*dst),
            Action::Delete { .. } | Action::TreeDelete { .. } => None,
        }
    }

    /// Short name of the action kind.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Insert { .. } => "insert",
            Action::TreeInsert { .. } => "insert-tree",
            Action::Delete { .. } => "delete",
            Action::TreeDelete { .. } => "delete-tree",
            Action::Update { .. } => "update",
            Action::Move { .. } => "move",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Insert {
                node,
                dst,
                parent,
                position,
                kind,
                label,
            } => {
                write!(
                    f,
                    "Insert({} {}{} as b:{} @{} under {})",
                    usize::from(*node),
                    kind,
                    label
                        .as_deref()
                        .map(|l| format!(" {l:?}"))
                        .unwrap_or_default(),
                    usize::from(*dst),
                    position,
                    usize::from(*parent)
                )
            }
            Action::TreeInsert {
                node,
                dst,
                parent,
                position,
            } => write!(
                f,
                "TreeInsert({} as b:{} @{} under {})",
                usize::from(*node),
                usize::from(*dst),
                position,
                usize::from(*parent)
            ),
            Action::Delete { node } => write!(f, "Delete({})", usize::from(*node)),
            Action::TreeDelete { node } => write!(f, "TreeDelete({})", usize::from(*node)),
            Action::Update {
                node,
                dst,
                old_label,
                new_label,
                retype,
            } => {
                write!(
                    f,
                    "Update({} → b:{} {:?} → {:?}",
                    usize::from(*node),
                    usize::from(*dst),
                    old_label.as_deref(),
                    new_label.as_deref()
                )?;
                if let Some(kind) = retype {
                    write!(f, " as {kind}")?;
                }
                write!(f, ")")
            }
            Action::Move {
                node,
                dst,
                parent,
                position,
            } => write!(
                f,
                "Move({} → b:{} @{} under {})",
                usize::from(*node),
                usize::from(*dst),
                position,
                usize::from(*parent)
            ),
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// An ordered list of actions, applicable to a working copy of the source
/// whose root hangs under a synthetic fake root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditScript {
    /// Actions in application order.
    pub actions: Vec<Action>,
    /// Id of the fake root in the working copy the script was generated on.
    /// Actions targeting the top level use it as their parent.
    pub fake_root: NodeId,
}

impl EditScript {
    /// Number of actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the script is empty (the trees are identical under the
    /// mapping).
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Iterate over the actions.
    pub fn iter(&self) -> impl Iterator<Item = &Action> + '_ {
        self.actions.iter()
    }

    /// Number of actions with the given [`Action::name`].
    pub fn count(&self, name: &str) -> usize {
        self.actions.iter().filter(|a| a.name() == name).count()
    }
}

impl<'a> IntoIterator for &'a EditScript {
    type Item = &'a Action;
    type IntoIter = core::slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

/// Wrapper for collecting actions with automatic tracing.
struct Actions {
    inner: Vec<Action>,
}

impl Actions {
    fn new() -> Self {
        Self { inner: Vec::new() }
    }

    fn push(&mut self, action: Action) {
        debug!(%action, "emit");
        self.inner.push(action);
    }

    fn into_inner(self) -> Vec<Action> {
        self.inner
    }
}

struct Generator<'a> {
    dst: &'a Tree,
    /// Working copy of the source arena.
    work: Arena<NodeData>,
    fake_root: NodeId,
    /// Working copy ↔ dst.
    mappings: MappingStore,
    dst_in_order: HashSet<NodeId>,
    actions: Actions,
}

impl<'a> Generator<'a> {
    fn new(src: &Tree, dst: &'a Tree, mappings: &MappingStore) -> Self {
        let mut work = src.arena.clone();
        let fake_root = work.new_node(NodeData::fake_root());
        fake_root.append(src.root, &mut work);

        Self {
            dst,
            work,
            fake_root,
            mappings: mappings.clone(),
            dst_in_order: HashSet::default(),
            actions: Actions::new(),
        }
    }

    /// Working-copy image of the parent of `x`; the fake root for the dst
    /// root.
    fn parent_image(&self, x: NodeId) -> NodeId {
        match self.dst.parent(x) {
            Some(y) => self
                .mappings
                .get_src_for_dst(y)
                .unwrap_or(self.fake_root),
            None => self.fake_root,
        }
    }

    fn run(mut self) -> EditScript {
        let order: Vec<NodeId> = self.dst.iter().collect();

        for x in order {
            let z = self.parent_image(x);
            let w = match self.mappings.get_src_for_dst(x) {
                None => self.insert(x, z),
                Some(w) => {
                    self.update(w, x);
                    if self.work[w].parent() != Some(z) {
                        self.relocate(w, x, z);
                    }
                    w
                }
            };
            self.dst_in_order.insert(x);
            self.align_children(w, x);
        }

        let leftovers: Vec<NodeId> = self
            .fake_root
            .traverse(&self.work)
            .filter_map(|edge| match edge {
                NodeEdge::End(id) => Some(id),
                NodeEdge::Start(_) => None,
            })
            .filter(|&id| id != self.fake_root && !self.mappings.is_src_mapped(id))
            .collect();
        for node in leftovers {
            self.actions.push(Action::Delete { node });
        }

        EditScript {
            actions: self.actions.into_inner(),
            fake_root: self.fake_root,
        }
    }

    fn insert(&mut self, x: NodeId, z: NodeId) -> NodeId {
        let k = self.find_pos(x);
        let data = self.dst.get(x).clone();
        let (kind, label) = (data.kind, data.label.clone());
        let w = self.work.new_node(data);
        insert_child_at(&mut self.work, z, w, k);
        self.mappings.add_mapping(w, x);
        self.actions.push(Action::Insert {
            node: w,
            dst: x,
            parent: z,
            position: k,
            kind,
            label,
        });
        w
    }

    fn update(&mut self, w: NodeId, x: NodeId) {
        let target = self.dst.get(x);
        let current = self.work[w].get_mut();
        if current.label == target.label && current.kind == target.kind {
            return;
        }
        let retype = (current.kind != target.kind).then_some(target.kind);
        let old_label = core::mem::replace(&mut current.label, target.label.clone());
        current.kind = target.kind;
        self.actions.push(Action::Update {
            node: w,
            dst: x,
            old_label,
            new_label: target.label.clone(),
            retype,
        });
    }

    fn relocate(&mut self, w: NodeId, x: NodeId, z: NodeId) {
        let k = self.find_pos(x);
        insert_child_at(&mut self.work, z, w, k);
        self.actions.push(Action::Move {
            node: w,
            dst: x,
            parent: z,
            position: k,
        });
    }

    fn align_children(&mut self, w: NodeId, x: NodeId) {
        let dst = self.dst;
        for c in dst.children(x) {
            self.dst_in_order.remove(&c);
        }

        let s1: Vec<NodeId> = w
            .children(&self.work)
            .filter(|&c| {
                self.mappings
                    .get_dst_for_src(c)
                    .is_some_and(|d| dst.parent(d) == Some(x))
            })
            .collect();
        let s2: Vec<NodeId> = dst
            .children(x)
            .filter(|&c| {
                self.mappings
                    .get_src_for_dst(c)
                    .is_some_and(|s| self.work[s].parent() == Some(w))
            })
            .collect();

        let common = lcs(s1.len(), s2.len(), |i, j| {
            self.mappings.has(s1[i], s2[j])
        });
        let mut aligned: HashSet<NodeId> = HashSet::default();
        for &(_, j) in &common {
            self.dst_in_order.insert(s2[j]);
            aligned.insert(s2[j]);
        }
        trace!(
            node = usize::from(w),
            mapped = s2.len(),
            aligned = aligned.len(),
            "align_children"
        );

        for a in s1 {
            let Some(b) = self.mappings.get_dst_for_src(a) else {
                continue;
            };
            if aligned.contains(&b) {
                continue;
            }
            a.detach(&mut self.work);
            let k = self.find_pos(b);
            insert_child_at(&mut self.work, w, a, k);
            self.actions.push(Action::Move {
                node: a,
                dst: b,
                parent: w,
                position: k,
            });
            self.dst_in_order.insert(b);
        }
    }

    /// Index at which the image of `x` must go among the children of its
    /// parent image, given the siblings already in order.
    fn find_pos(&self, x: NodeId) -> usize {
        let siblings: Vec<NodeId> = match self.dst.parent(x) {
            Some(y) => self.dst.children(y).collect(),
            None => vec![x],
        };

        if let Some(&first) = siblings
            .iter()
            .find(|&&c| self.dst_in_order.contains(&c))
            && first == x
        {
            return 0;
        }

        let v = siblings
            .iter()
            .take_while(|&&c| c != x)
            .filter(|&&c| self.dst_in_order.contains(&c))
            .last();
        match v.and_then(|&v| self.mappings.get_src_for_dst(v)) {
            Some(u) => position_in_parent(&self.work, u) + 1,
            None => 0,
        }
    }
}

/// Generate an edit script from a mapping between two trees.
///
/// Applying the script to `src` (see [`EditScript::replay`]) yields a tree
/// isomorphic to `dst`. The mapping is not modified.
pub fn generate_edit_script(src: &Tree, dst: &Tree, mappings: &MappingStore) -> EditScript {
    trace!(matched_pairs = mappings.len(), "generate_edit_script start");
    let script = Generator::new(src, dst, mappings).run();
    debug!(total_actions = script.len(), "generate_edit_script done");
    script
}
