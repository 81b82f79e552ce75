//! Zhang–Shasha tree edit distance, used as an exact matcher on small
//! subtrees.
//!
//! Nodes are numbered 1..=n in post-order within the subtree being compared,
//! so the leftmost leaf descendant of node `i` is simply `i - size(i) + 1`.
//! Distances live in flat `(n + 1) × (m + 1)` tables.

use super::Matcher;
use super::similarity::trigram_similarity;
use crate::mapping::MappingStore;
use crate::tree::Tree;
use crate::{debug, trace};
use indextree::NodeId;

const DELETE: f64 = 1.0;
const INSERT: f64 = 1.0;

/// One side of the comparison, indexed 1-based in post-order.
struct Indexed<'a> {
    tree: &'a Tree,
    /// `nodes[i - 1]` is node `i`.
    nodes: Vec<NodeId>,
    /// Leftmost leaf descendant, 1-based. `lld[0]` is unused.
    lld: Vec<usize>,
    keyroots: Vec<usize>,
}

impl<'a> Indexed<'a> {
    fn new(tree: &'a Tree, root: NodeId) -> Self {
        let nodes: Vec<NodeId> = tree.post_order_from(root).collect();
        let mut lld = Vec::with_capacity(nodes.len() + 1);
        lld.push(0);
        for (i, &id) in nodes.iter().enumerate() {
            lld.push(i + 2 - tree.metrics(id).size);
        }

        // a key root is the highest node sharing its leftmost leaf
        let mut seen = vec![false; nodes.len() + 1];
        let mut keyroots = Vec::new();
        for i in (1..=nodes.len()).rev() {
            if !seen[lld[i]] {
                seen[lld[i]] = true;
                keyroots.push(i);
            }
        }
        keyroots.reverse();

        Self {
            tree,
            nodes,
            lld,
            keyroots,
        }
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn node(&self, i: usize) -> NodeId {
        self.nodes[i - 1]
    }
}

struct State<'a> {
    src: Indexed<'a>,
    dst: Indexed<'a>,
    cols: usize,
    tree_dist: Vec<f64>,
    forest_dist: Vec<f64>,
}

impl<'a> State<'a> {
    fn new(src: &'a Tree, a: NodeId, dst: &'a Tree, b: NodeId) -> Self {
        let src = Indexed::new(src, a);
        let dst = Indexed::new(dst, b);
        let cells = (src.len() + 1) * (dst.len() + 1);
        Self {
            cols: dst.len() + 1,
            src,
            dst,
            tree_dist: vec![0.0; cells],
            forest_dist: vec![0.0; cells],
        }
    }

    #[inline]
    fn fd(&self, i: usize, j: usize) -> f64 {
        self.forest_dist[i * self.cols + j]
    }

    #[inline]
    fn set_fd(&mut self, i: usize, j: usize, value: f64) {
        self.forest_dist[i * self.cols + j] = value;
    }

    fn update_cost(&self, i: usize, j: usize) -> f64 {
        let a = self.src.tree.get(self.src.node(i));
        let b = self.dst.tree.get(self.dst.node(j));
        if a.kind != b.kind {
            return f64::INFINITY;
        }
        match (&a.label, &b.label) {
            (None, None) => 0.0,
            (Some(x), Some(y)) if x == y => 0.0,
            (Some(x), Some(y)) => (1.0 - trigram_similarity(x, y)).max(f64::EPSILON),
            _ => 1.0,
        }
    }

    fn compute_tree_dist(&mut self) {
        let src_keyroots = self.src.keyroots.clone();
        let dst_keyroots = self.dst.keyroots.clone();
        for &i in &src_keyroots {
            for &j in &dst_keyroots {
                self.compute_forest_dist(i, j);
            }
        }
    }

    fn compute_forest_dist(&mut self, i: usize, j: usize) {
        let li = self.src.lld[i];
        let lj = self.dst.lld[j];

        self.set_fd(li - 1, lj - 1, 0.0);
        for di in li..=i {
            let value = self.fd(di - 1, lj - 1) + DELETE;
            self.set_fd(di, lj - 1, value);
        }
        for dj in lj..=j {
            let value = self.fd(li - 1, dj - 1) + INSERT;
            self.set_fd(li - 1, dj, value);
        }

        for di in li..=i {
            for dj in lj..=j {
                let delete = self.fd(di - 1, dj) + DELETE;
                let insert = self.fd(di, dj - 1) + INSERT;
                let value = if self.src.lld[di] == li && self.dst.lld[dj] == lj {
                    let update = self.fd(di - 1, dj - 1) + self.update_cost(di, dj);
                    let value = delete.min(insert).min(update);
                    self.tree_dist[di * self.cols + dj] = value;
                    value
                } else {
                    let subtree = self.fd(self.src.lld[di] - 1, self.dst.lld[dj] - 1)
                        + self.tree_dist[di * self.cols + dj];
                    delete.min(insert).min(subtree)
                };
                self.set_fd(di, dj, value);
            }
        }
    }

    /// Walk the distance tables back from the two roots, collecting the
    /// substituted pairs. Nested subtree pairs go on an explicit stack and
    /// get their forest table recomputed when popped.
    fn backtrace(&mut self) -> Vec<(NodeId, NodeId)> {
        let mut pairs = Vec::new();
        let mut stack = vec![(self.src.len(), self.dst.len())];
        let mut root_pair = true;

        while let Some((last_row, last_col)) = stack.pop() {
            if !root_pair {
                self.compute_forest_dist(last_row, last_col);
            }
            root_pair = false;

            let first_row = self.src.lld[last_row] - 1;
            let first_col = self.dst.lld[last_col] - 1;
            let (mut row, mut col) = (last_row, last_col);

            while row > first_row || col > first_col {
                let current = self.fd(row, col);
                if row > first_row && self.fd(row - 1, col) + DELETE == current {
                    row -= 1;
                } else if col > first_col && self.fd(row, col - 1) + INSERT == current {
                    col -= 1;
                } else if self.src.lld[row] == self.src.lld[last_row]
                    && self.dst.lld[col] == self.dst.lld[last_col]
                {
                    let (a, b) = (self.src.node(row), self.dst.node(col));
                    assert_eq!(
                        self.src.tree.kind(a),
                        self.dst.tree.kind(b),
                        "edit distance backtrace paired nodes of different types"
                    );
                    pairs.push((a, b));
                    row -= 1;
                    col -= 1;
                } else {
                    stack.push((row, col));
                    row = self.src.lld[row] - 1;
                    col = self.dst.lld[col] - 1;
                }
            }
        }

        pairs
    }
}

/// Minimum-cost node pairs between the subtree at `a` in `src` and the
/// subtree at `b` in `dst`. Every returned pair has matching types.
pub fn match_subtrees(src: &Tree, a: NodeId, dst: &Tree, b: NodeId) -> Vec<(NodeId, NodeId)> {
    let mut state = State::new(src, a, dst, b);
    trace!(
        src_size = state.src.len(),
        dst_size = state.dst.len(),
        "zhang_shasha start"
    );
    state.compute_tree_dist();
    state.backtrace()
}

/// Edit distance between two subtrees under the same cost model.
pub fn tree_distance(src: &Tree, a: NodeId, dst: &Tree, b: NodeId) -> f64 {
    let mut state = State::new(src, a, dst, b);
    state.compute_tree_dist();
    state.tree_dist[state.src.len() * state.cols + state.dst.len()]
}

/// Runs the exact algorithm on the whole pair of trees. Quadratic memory:
/// meant for small inputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZhangShashaMatcher;

impl Matcher for ZhangShashaMatcher {
    fn match_trees(&self, src: &Tree, dst: &Tree, mappings: &mut MappingStore) {
        for (a, b) in match_subtrees(src, src.root, dst, dst.root) {
            if mappings.is_mapping_allowed(src, dst, a, b) {
                mappings.add_mapping(a, b);
            }
        }
        debug!(matched = mappings.len(), "zhang_shasha done");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interner::TypeInterner;
    use crate::sexpr::parse_sexpr;
    use facet_testhelpers::test;

    fn trees(src: &str, dst: &str) -> (Tree, Tree) {
        let interner = TypeInterner::new();
        (
            parse_sexpr(src, &interner).unwrap(),
            parse_sexpr(dst, &interner).unwrap(),
        )
    }

    #[test]
    fn test_identical_trees_cost_nothing() {
        let text = r#"(Block (Call (Id "f") (Id "x")) (Return))"#;
        let (src, dst) = trees(text, text);
        assert_eq!(tree_distance(&src, src.root, &dst, dst.root), 0.0);

        let pairs = match_subtrees(&src, src.root, &dst, dst.root);
        assert_eq!(pairs.len(), 5);
        for (a, b) in src.post_order().zip(dst.post_order()) {
            assert!(pairs.contains(&(a, b)));
        }
    }

    #[test]
    fn test_insertion_and_relabel() {
        let (src, dst) = trees(
            r#"(Block (Id "a") (Id "b"))"#,
            r#"(Block (Id "a") (Lit "1") (Id "c"))"#,
        );
        // one insertion plus one relabel that shares no trigram
        let distance = tree_distance(&src, src.root, &dst, dst.root);
        assert_eq!(distance, 2.0);

        let pairs = match_subtrees(&src, src.root, &dst, dst.root);
        let s: Vec<_> = src.children(src.root).collect();
        let d: Vec<_> = dst.children(dst.root).collect();
        assert!(pairs.contains(&(src.root, dst.root)));
        assert!(pairs.contains(&(s[0], d[0])));
        assert!(pairs.contains(&(s[1], d[2])));
        assert_eq!(pairs.len(), 3);
    }

    #[test]
    fn test_type_mismatch_never_paired() {
        let (src, dst) = trees(r#"(Block (Id "a"))"#, r#"(Block (Lit "a"))"#);
        let pairs = match_subtrees(&src, src.root, &dst, dst.root);
        assert_eq!(pairs, vec![(src.root, dst.root)]);
        assert_eq!(tree_distance(&src, src.root, &dst, dst.root), 2.0);
    }

    #[test]
    fn test_nested_keyroots() {
        let (src, dst) = trees(
            r#"(F (D (A) (C (B))) (E))"#,
            r#"(F (C (D (A) (B))) (E))"#,
        );
        let pairs = match_subtrees(&src, src.root, &dst, dst.root);
        for &(a, b) in &pairs {
            assert_eq!(src.kind(a), dst.kind(b));
        }
        // the classic example: distance 2 (delete C, insert C)
        assert_eq!(tree_distance(&src, src.root, &dst, dst.root), 2.0);
        assert_eq!(pairs.len(), 5);
    }

    #[test]
    fn test_matcher_fills_store() {
        let (src, dst) = trees(r#"(Block (Id "a") (Id "b"))"#, r#"(Block (Id "b"))"#);
        let mut mappings = MappingStore::new();
        ZhangShashaMatcher.match_trees(&src, &dst, &mut mappings);
        let b_src = src.children(src.root).nth(1).unwrap();
        let b_dst = dst.first_child(dst.root).unwrap();
        assert!(mappings.has(src.root, dst.root));
        assert!(mappings.has(b_src, b_dst));
        assert_eq!(mappings.len(), 2);
    }
}
