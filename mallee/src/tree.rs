//! Arena-backed ordered, labelled trees.
//!
//! Nodes live in an [`indextree::Arena`] and link to each other through
//! [`NodeId`]s, so cloning a tree (which the edit script generator does to get
//! a working copy) duplicates one vector and keeps every id valid.

use crate::interner::NodeType;
use crate::metrics::{self, TreeMetrics};
use compact_str::CompactString;
use indexmap::IndexMap;
use indextree::{Arena, NodeEdge, NodeId};
use std::collections::VecDeque;

/// Free-form annotations attached to a node (stable identifiers, file names...).
pub type Metadata = IndexMap<CompactString, CompactString>;

/// Data stored in each arena node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeData {
    /// Interned syntactic type.
    pub kind: NodeType,
    /// Source text carried by the node. `None` means "no label", which is
    /// different from an empty label.
    pub label: Option<CompactString>,
    /// Byte offset of the node in the original source.
    pub pos: usize,
    /// Byte length of the node in the original source.
    pub length: usize,
    /// Auxiliary annotations, never looked at by the matchers.
    pub metadata: Metadata,
}

impl NodeData {
    /// An unlabelled node of the given type with an empty span.
    pub fn new(kind: NodeType) -> Self {
        Self {
            kind,
            label: None,
            pos: 0,
            length: 0,
            metadata: Metadata::new(),
        }
    }

    /// A labelled node of the given type with an empty span.
    pub fn labeled(kind: NodeType, label: impl Into<CompactString>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::new(kind)
        }
    }

    /// Set the source span.
    pub fn with_span(mut self, pos: usize, length: usize) -> Self {
        self.pos = pos;
        self.length = length;
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata(
        mut self,
        key: impl Into<CompactString>,
        value: impl Into<CompactString>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Byte offset one past the end of the node's span.
    pub fn end(&self) -> usize {
        self.pos + self.length
    }

    pub(crate) fn fake_root() -> Self {
        Self::new(NodeType::FAKE_ROOT)
    }
}

/// An ordered tree of [`NodeData`].
///
/// Build it with [`Tree::new`] and [`Tree::add_child`], then call
/// [`Tree::compute_metrics`] once before handing it to the matchers. Any
/// structural change drops the metrics again.
#[derive(Debug, Clone)]
pub struct Tree {
    /// Node storage.
    pub arena: Arena<NodeData>,
    /// The root node.
    pub root: NodeId,
    metrics: Vec<TreeMetrics>,
}

impl Tree {
    /// Create a tree holding a single root node.
    pub fn new(root_data: NodeData) -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(root_data);
        Self {
            arena,
            root,
            metrics: Vec::new(),
        }
    }

    pub(crate) fn from_parts(arena: Arena<NodeData>, root: NodeId) -> Self {
        Self {
            arena,
            root,
            metrics: Vec::new(),
        }
    }

    /// Append a new last child under `parent`.
    pub fn add_child(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let child = self.arena.new_node(data);
        parent.append(child, &mut self.arena);
        self.metrics.clear();
        child
    }

    /// Compute [`TreeMetrics`] for every node in one post-order pass.
    pub fn compute_metrics(&mut self) {
        self.metrics = metrics::compute(self);
    }

    /// Whether metrics are available for the current shape of the tree.
    pub fn has_metrics(&self) -> bool {
        !self.metrics.is_empty()
    }

    /// Metrics of a node.
    ///
    /// # Panics
    ///
    /// Panics if [`Tree::compute_metrics`] has not been called since the last
    /// structural change.
    #[inline]
    pub fn metrics(&self, id: NodeId) -> &TreeMetrics {
        assert!(
            self.has_metrics(),
            "tree metrics must be computed before matching"
        );
        &self.metrics[usize::from(id)]
    }

    /// Data of a node.
    #[inline]
    pub fn get(&self, id: NodeId) -> &NodeData {
        self.arena[id].get()
    }

    /// Mutable data of a node. Drops the metrics since labels feed the hashes.
    pub fn get_mut(&mut self, id: NodeId) -> &mut NodeData {
        self.metrics.clear();
        self.arena[id].get_mut()
    }

    /// Type of a node.
    #[inline]
    pub fn kind(&self, id: NodeId) -> NodeType {
        self.get(id).kind
    }

    /// Label of a node, if any.
    #[inline]
    pub fn label(&self, id: NodeId) -> Option<&str> {
        self.get(id).label.as_deref()
    }

    /// Parent of a node, `None` for the root.
    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].parent()
    }

    /// Children of a node, in order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    /// First child of a node.
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].first_child()
    }

    /// Number of children.
    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).count()
    }

    /// Index of a node among its siblings (0 for the root).
    pub fn position(&self, id: NodeId) -> usize {
        position_in_parent(&self.arena, id)
    }

    /// Whether the node has no parent.
    pub fn is_root(&self, id: NodeId) -> bool {
        self.parent(id).is_none()
    }

    /// Whether the node has no children.
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.first_child(id).is_none()
    }

    /// Number of nodes reachable from the root.
    pub fn node_count(&self) -> usize {
        if self.has_metrics() {
            self.metrics(self.root).size
        } else {
            self.pre_order().count()
        }
    }

    /// Breadth-first traversal from the root.
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        let mut queue = VecDeque::from([self.root]);
        core::iter::from_fn(move || {
            let id = queue.pop_front()?;
            queue.extend(self.children(id));
            Some(id)
        })
    }

    /// Pre-order traversal from the root.
    pub fn pre_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.root.descendants(&self.arena)
    }

    /// Post-order traversal from the root.
    pub fn post_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.post_order_from(self.root)
    }

    /// Post-order traversal of the subtree rooted at `id`.
    pub fn post_order_from(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.traverse(&self.arena).filter_map(|edge| match edge {
            NodeEdge::End(node) => Some(node),
            NodeEdge::Start(_) => None,
        })
    }

    /// Proper descendants of a node in pre-order.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.descendants(&self.arena).skip(1)
    }

    /// Proper ancestors of a node, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.ancestors(&self.arena).skip(1)
    }

    /// Whether `node` lies strictly below `ancestor`.
    ///
    /// Constant time: descendants occupy the post-order ranks just before
    /// their ancestor.
    pub fn is_descendant_of(&self, node: NodeId, ancestor: NodeId) -> bool {
        let n = self.metrics(node);
        let a = self.metrics(ancestor);
        n.position < a.position && n.position + a.size > a.position
    }

    /// Whether the subtree at `a` and the subtree at `b` in `other` are
    /// isomorphic: same types, labels and child order at every position.
    pub fn is_isomorphic(&self, a: NodeId, other: &Tree, b: NodeId) -> bool {
        self.metrics(a).hash == other.metrics(b).hash && self.subtree_matches(a, other, b, true)
    }

    /// Like [`Tree::is_isomorphic`] but ignoring labels.
    pub fn is_iso_structural(&self, a: NodeId, other: &Tree, b: NodeId) -> bool {
        self.metrics(a).structure_hash == other.metrics(b).structure_hash
            && self.subtree_matches(a, other, b, false)
    }

    /// Whether the two whole trees carry the same types, labels and child
    /// order. Needs no metrics.
    pub fn is_structurally_equal(&self, other: &Tree) -> bool {
        self.subtree_matches(self.root, other, other.root, true)
    }

    /// Node-by-node comparison driven by an explicit work stack.
    pub(crate) fn subtree_matches(
        &self,
        a: NodeId,
        other: &Tree,
        b: NodeId,
        compare_labels: bool,
    ) -> bool {
        let mut stack = vec![(a, b)];
        while let Some((x, y)) = stack.pop() {
            let (dx, dy) = (self.get(x), other.get(y));
            if dx.kind != dy.kind || (compare_labels && dx.label != dy.label) {
                return false;
            }
            let xs: Vec<NodeId> = self.children(x).collect();
            let ys: Vec<NodeId> = other.children(y).collect();
            if xs.len() != ys.len() {
                return false;
            }
            stack.extend(xs.into_iter().zip(ys));
        }
        true
    }
}

/// Index of `id` among its siblings in `arena`.
pub(crate) fn position_in_parent(arena: &Arena<NodeData>, id: NodeId) -> usize {
    let mut position = 0;
    let mut current = arena[id].previous_sibling();
    while let Some(sibling) = current {
        position += 1;
        current = arena[sibling].previous_sibling();
    }
    position
}

/// Insert `child` (detached first) so that it ends up at `index` among the
/// children of `parent`.
pub(crate) fn insert_child_at(
    arena: &mut Arena<NodeData>,
    parent: NodeId,
    child: NodeId,
    index: usize,
) {
    child.detach(arena);
    match parent.children(arena).nth(index) {
        Some(sibling) => sibling.insert_before(child, arena),
        None => parent.append(child, arena),
    }
}
