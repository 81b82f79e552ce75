//! Per-node metrics: size, height, depth, post-order rank and subtree hashes.

use crate::tree::{NodeData, Tree};
use core::hash::{Hash, Hasher};
use indextree::NodeEdge;
use rapidhash::RapidHasher;

/// Cached facts about a node and its subtree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeMetrics {
    /// Number of nodes in the subtree, the node included.
    pub size: usize,
    /// 0 for leaves, otherwise 1 + the tallest child.
    pub height: usize,
    /// Subtree hash over types and labels. Isomorphic subtrees hash equal.
    pub hash: u64,
    /// Subtree hash over types only.
    pub structure_hash: u64,
    /// Distance from the root.
    pub depth: usize,
    /// 0-based post-order rank within the whole tree.
    pub position: usize,
}

const BASE: u64 = 33;
const ENTER: u8 = 0;
const LEAVE: u8 = 1;

fn token(marker: u8, data: &NodeData, with_label: bool) -> u64 {
    let mut hasher = RapidHasher::default();
    marker.hash(&mut hasher);
    data.kind.hash(&mut hasher);
    if with_label {
        data.label.hash(&mut hasher);
    }
    hasher.finish()
}

/// `BASE^exp` with wrapping arithmetic.
fn base_pow(mut exp: usize) -> u64 {
    let mut result: u64 = 1;
    let mut base = BASE;
    while exp > 0 {
        if exp & 1 == 1 {
            result = result.wrapping_mul(base);
        }
        base = base.wrapping_mul(base);
        exp >>= 1;
    }
    result
}

/// Hashes are rolling polynomials over the enter/leave token sequence of a
/// pre-order walk, so a parent's hash folds in its children's hashes shifted
/// by the number of tokens preceding them.
pub(crate) fn compute(tree: &Tree) -> Vec<TreeMetrics> {
    let mut metrics = vec![TreeMetrics::default(); tree.arena.count() + 1];
    let mut depth = 0usize;
    let mut rank = 0usize;

    for edge in tree.root.traverse(&tree.arena) {
        match edge {
            NodeEdge::Start(_) => depth += 1,
            NodeEdge::End(id) => {
                depth -= 1;
                let data = tree.get(id);
                let mut size = 1;
                let mut height = 0;
                let mut hash = token(ENTER, data, true);
                let mut structure_hash = token(ENTER, data, false);
                let mut offset = 1;

                for child in tree.children(id) {
                    let m = metrics[usize::from(child)];
                    let factor = base_pow(offset);
                    hash = hash.wrapping_add(m.hash.wrapping_mul(factor));
                    structure_hash =
                        structure_hash.wrapping_add(m.structure_hash.wrapping_mul(factor));
                    offset += 2 * m.size;
                    size += m.size;
                    height = height.max(m.height + 1);
                }

                let factor = base_pow(offset);
                hash = hash.wrapping_add(token(LEAVE, data, true).wrapping_mul(factor));
                structure_hash =
                    structure_hash.wrapping_add(token(LEAVE, data, false).wrapping_mul(factor));

                metrics[usize::from(id)] = TreeMetrics {
                    size,
                    height,
                    hash,
                    structure_hash,
                    depth,
                    position: rank,
                };
                rank += 1;
            }
        }
    }

    metrics
}

#[cfg(test)]
mod tests {
    use crate::interner::TypeInterner;
    use crate::tree::{NodeData, Tree};
    use facet_testhelpers::test;

    #[test]
    fn test_size_height_depth_position() {
        let interner = TypeInterner::new();
        let block = interner.intern("Block");
        let ident = interner.intern("Identifier");

        let mut tree = Tree::new(NodeData::new(block));
        let inner = tree.add_child(tree.root, NodeData::new(block));
        let a = tree.add_child(inner, NodeData::labeled(ident, "a"));
        let b = tree.add_child(tree.root, NodeData::labeled(ident, "b"));
        tree.compute_metrics();

        let root = tree.metrics(tree.root);
        assert_eq!((root.size, root.height, root.depth, root.position), (4, 2, 0, 3));
        let m = tree.metrics(inner);
        assert_eq!((m.size, m.height, m.depth, m.position), (2, 1, 1, 1));
        let m = tree.metrics(a);
        assert_eq!((m.size, m.height, m.depth, m.position), (1, 0, 2, 0));
        let m = tree.metrics(b);
        assert_eq!((m.size, m.height, m.depth, m.position), (1, 0, 1, 2));
    }

    #[test]
    fn test_hash_sensitivity() {
        let interner = TypeInterner::new();
        let call = interner.intern("Call");
        let ident = interner.intern("Identifier");

        let build = |labels: &[&str]| {
            let mut tree = Tree::new(NodeData::new(call));
            for label in labels {
                tree.add_child(tree.root, NodeData::labeled(ident, *label));
            }
            tree.compute_metrics();
            tree
        };

        let ab = build(&["a", "b"]);
        let ab2 = build(&["a", "b"]);
        let ba = build(&["b", "a"]);
        let ac = build(&["a", "c"]);

        let hash = |t: &Tree| t.metrics(t.root).hash;
        let shape = |t: &Tree| t.metrics(t.root).structure_hash;

        assert_eq!(hash(&ab), hash(&ab2));
        assert_ne!(hash(&ab), hash(&ba));
        assert_ne!(hash(&ab), hash(&ac));
        assert_eq!(shape(&ab), shape(&ba));
        assert_eq!(shape(&ab), shape(&ac));
    }

    #[test]
    fn test_hash_distinguishes_nesting() {
        let interner = TypeInterner::new();
        let node = interner.intern("Node");

        // (Node (Node) (Node)) vs (Node (Node (Node)))
        let mut flat = Tree::new(NodeData::new(node));
        flat.add_child(flat.root, NodeData::new(node));
        flat.add_child(flat.root, NodeData::new(node));
        flat.compute_metrics();

        let mut deep = Tree::new(NodeData::new(node));
        let mid = deep.add_child(deep.root, NodeData::new(node));
        deep.add_child(mid, NodeData::new(node));
        deep.compute_metrics();

        assert_ne!(
            flat.metrics(flat.root).structure_hash,
            deep.metrics(deep.root).structure_hash
        );
    }
}
