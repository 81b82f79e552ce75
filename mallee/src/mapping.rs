//! Bidirectional node mappings between a source and a destination tree.

use crate::tree::Tree;
use indextree::NodeId;

/// A partial bijection between source nodes and destination nodes.
///
/// Lookups are O(1) in both directions: each side is a `Vec` indexed by
/// `NodeId`. Pairs are also kept in insertion order for iteration, since a
/// `NodeId` cannot be rebuilt from its index alone.
#[derive(Debug, Clone, Default)]
pub struct MappingStore {
    src_to_dst: Vec<Option<NodeId>>,
    dst_to_src: Vec<Option<NodeId>>,
    pairs: Vec<(NodeId, NodeId)>,
}

impl MappingStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with room for arenas of the given sizes.
    pub fn with_capacity(src_nodes: usize, dst_nodes: usize) -> Self {
        Self {
            src_to_dst: vec![None; src_nodes + 1],
            dst_to_src: vec![None; dst_nodes + 1],
            pairs: Vec::new(),
        }
    }

    /// Map `src` to `dst`.
    ///
    /// # Panics
    ///
    /// Panics if either node is already mapped.
    pub fn add_mapping(&mut self, src: NodeId, dst: NodeId) {
        assert!(
            !self.is_src_mapped(src) && !self.is_dst_mapped(dst),
            "mapping {src:?} -> {dst:?} would break the bijection"
        );

        let (s, d) = (usize::from(src), usize::from(dst));
        if s >= self.src_to_dst.len() {
            self.src_to_dst.resize(s + 1, None);
        }
        if d >= self.dst_to_src.len() {
            self.dst_to_src.resize(d + 1, None);
        }
        self.src_to_dst[s] = Some(dst);
        self.dst_to_src[d] = Some(src);
        self.pairs.push((src, dst));
    }

    /// Map two isomorphic subtrees node by node, in pre-order.
    ///
    /// # Panics
    ///
    /// Panics if the subtrees differ in shape or types, or if any node on
    /// either side is already mapped.
    pub fn add_mapping_recursively(
        &mut self,
        src_tree: &Tree,
        dst_tree: &Tree,
        src: NodeId,
        dst: NodeId,
    ) {
        let mut stack = vec![(src, dst)];
        while let Some((a, b)) = stack.pop() {
            assert_eq!(
                src_tree.kind(a),
                dst_tree.kind(b),
                "recursive mapping requires identical types"
            );
            self.add_mapping(a, b);
            let xs: Vec<NodeId> = src_tree.children(a).collect();
            let ys: Vec<NodeId> = dst_tree.children(b).collect();
            assert_eq!(
                xs.len(),
                ys.len(),
                "recursive mapping requires identical shapes"
            );
            // reversed so the stack pops children left to right
            stack.extend(xs.into_iter().zip(ys).rev());
        }
    }

    /// Remove the pair `(src, dst)` if present. Returns whether it was.
    pub fn remove_mapping(&mut self, src: NodeId, dst: NodeId) -> bool {
        if self.get_dst_for_src(src) != Some(dst) {
            return false;
        }
        self.src_to_dst[usize::from(src)] = None;
        self.dst_to_src[usize::from(dst)] = None;
        self.pairs.retain(|&pair| pair != (src, dst));
        true
    }

    /// Whether a source node is mapped.
    #[inline(always)]
    pub fn is_src_mapped(&self, src: NodeId) -> bool {
        self.get_dst_for_src(src).is_some()
    }

    /// Whether a destination node is mapped.
    #[inline(always)]
    pub fn is_dst_mapped(&self, dst: NodeId) -> bool {
        self.get_src_for_dst(dst).is_some()
    }

    /// Image of a source node.
    #[inline(always)]
    pub fn get_dst_for_src(&self, src: NodeId) -> Option<NodeId> {
        self.src_to_dst.get(usize::from(src)).copied().flatten()
    }

    /// Pre-image of a destination node.
    #[inline(always)]
    pub fn get_src_for_dst(&self, dst: NodeId) -> Option<NodeId> {
        self.dst_to_src.get(usize::from(dst)).copied().flatten()
    }

    /// Whether exactly `(src, dst)` is mapped.
    pub fn has(&self, src: NodeId, dst: NodeId) -> bool {
        self.get_dst_for_src(src) == Some(dst)
    }

    /// Whether neither node is mapped.
    pub fn are_both_unmapped(&self, src: NodeId, dst: NodeId) -> bool {
        !self.is_src_mapped(src) && !self.is_dst_mapped(dst)
    }

    /// Whether `src` and `dst` may be mapped to each other: same type and
    /// both unmapped.
    pub fn is_mapping_allowed(
        &self,
        src_tree: &Tree,
        dst_tree: &Tree,
        src: NodeId,
        dst: NodeId,
    ) -> bool {
        src_tree.kind(src) == dst_tree.kind(dst) && self.are_both_unmapped(src, dst)
    }

    /// Whether some child of `src` is unmapped.
    pub fn has_unmapped_src_children(&self, src_tree: &Tree, src: NodeId) -> bool {
        src_tree.children(src).any(|c| !self.is_src_mapped(c))
    }

    /// Whether some child of `dst` is unmapped.
    pub fn has_unmapped_dst_children(&self, dst_tree: &Tree, dst: NodeId) -> bool {
        dst_tree.children(dst).any(|c| !self.is_dst_mapped(c))
    }

    /// Whether `src` and everything below it is unmapped.
    pub fn are_src_descendants_unmapped(&self, src_tree: &Tree, src: NodeId) -> bool {
        !self.is_src_mapped(src) && src_tree.descendants(src).all(|d| !self.is_src_mapped(d))
    }

    /// Whether `dst` and everything below it is unmapped.
    pub fn are_dst_descendants_unmapped(&self, dst_tree: &Tree, dst: NodeId) -> bool {
        !self.is_dst_mapped(dst) && dst_tree.descendants(dst).all(|d| !self.is_dst_mapped(d))
    }

    /// All pairs, in the order they were added.
    pub fn pairs(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.pairs.iter().copied()
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether no pair is mapped.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
