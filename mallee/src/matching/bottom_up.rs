//! Bottom-up matching of containers by the similarity of their content.
//!
//! Walks src in post-order. Every unmapped inner node looks for a same-typed
//! dst container among the ancestors of its mapped descendants' images and
//! takes the most similar one. Each new container pair then gets a
//! "last-chance" pass that tries to map the still unmapped nodes inside it.

use super::similarity::Similarity;
use super::zhang_shasha;
use super::{BottomUp, Matcher, MatchingConfig};
use crate::interner::NodeType;
use crate::lcs::lcs;
use crate::mapping::MappingStore;
use crate::tree::Tree;
use crate::{debug, trace};
use indexmap::IndexMap;
use indextree::NodeId;
use rapidhash::RapidHashSet as HashSet;
use smallvec::SmallVec;

/// Bottom-up matcher, parameterised by [`BottomUp`] strategy.
#[derive(Debug, Clone)]
pub struct BottomUpMatcher {
    /// Which last-chance strategy to use.
    pub strategy: BottomUp,
    /// Candidate scoring.
    pub similarity: Similarity,
    /// Fixed acceptance threshold. `None` means the strategy's default.
    pub similarity_threshold: Option<f64>,
    /// Subtrees smaller than this go through the exact matcher.
    pub size_threshold: usize,
}

impl Default for BottomUpMatcher {
    fn default() -> Self {
        Self::new(&MatchingConfig::default())
    }
}

impl BottomUpMatcher {
    /// Build the matcher from a configuration.
    pub fn new(config: &MatchingConfig) -> Self {
        Self {
            strategy: config.bottom_up,
            similarity: config.similarity(),
            similarity_threshold: config.similarity_threshold,
            size_threshold: config.size_threshold(),
        }
    }

    fn threshold(&self, src: &Tree, dst: &Tree, t: NodeId, candidate: NodeId) -> f64 {
        if let Some(fixed) = self.similarity_threshold {
            return fixed;
        }
        match self.strategy {
            BottomUp::Greedy => 0.5,
            BottomUp::Simple | BottomUp::Hybrid => {
                let size = src.metrics(t).size + dst.metrics(candidate).size;
                1.0 / (1.0 + (size as f64).ln())
            }
        }
    }

    fn is_small(&self, src: &Tree, dst: &Tree, a: NodeId, b: NodeId) -> bool {
        src.metrics(a).size < self.size_threshold || dst.metrics(b).size < self.size_threshold
    }

    fn last_chance_match(
        &self,
        src: &Tree,
        dst: &Tree,
        mappings: &mut MappingStore,
        a: NodeId,
        b: NodeId,
    ) {
        let mut work = vec![(a, b)];
        while let Some((a, b)) = work.pop() {
            match self.strategy {
                BottomUp::Greedy => {
                    if self.is_small(src, dst, a, b) {
                        exact_match(src, dst, mappings, a, b);
                    }
                }
                BottomUp::Simple => heuristic_match(src, dst, mappings, a, b, &mut work),
                BottomUp::Hybrid => {
                    if self.is_small(src, dst, a, b) {
                        exact_match(src, dst, mappings, a, b);
                    } else {
                        heuristic_match(src, dst, mappings, a, b, &mut work);
                    }
                }
            }
        }
    }
}

/// Collect unmapped, same-typed, non-root dst ancestors of the images of
/// `t`'s mapped descendants, in first-seen order.
fn dst_candidates(src: &Tree, dst: &Tree, mappings: &MappingStore, t: NodeId) -> Vec<NodeId> {
    let kind = src.kind(t);
    let mut visited: HashSet<NodeId> = HashSet::default();
    let mut candidates = Vec::new();

    for descendant in src.descendants(t) {
        let Some(mut current) = mappings.get_dst_for_src(descendant) else {
            continue;
        };
        while let Some(parent) = dst.parent(current) {
            if !visited.insert(parent) {
                break;
            }
            if dst.kind(parent) == kind && !mappings.is_dst_mapped(parent) && !dst.is_root(parent)
            {
                candidates.push(parent);
            }
            current = parent;
        }
    }

    candidates
}

fn exact_match(src: &Tree, dst: &Tree, mappings: &mut MappingStore, a: NodeId, b: NodeId) {
    for (x, y) in zhang_shasha::match_subtrees(src, a, dst, b) {
        if mappings.is_mapping_allowed(src, dst, x, y) {
            mappings.add_mapping(x, y);
        }
    }
}

/// Map unmapped children of `a` and `b`: first identical subtrees in
/// order, then structurally identical ones, then unique survivors per type.
fn heuristic_match(
    src: &Tree,
    dst: &Tree,
    mappings: &mut MappingStore,
    a: NodeId,
    b: NodeId,
    work: &mut Vec<(NodeId, NodeId)>,
) {
    for compare_labels in [true, false] {
        let xs: Vec<NodeId> = src
            .children(a)
            .filter(|&c| !mappings.is_src_mapped(c))
            .collect();
        let ys: Vec<NodeId> = dst
            .children(b)
            .filter(|&c| !mappings.is_dst_mapped(c))
            .collect();

        let equal = |i: usize, j: usize| {
            if compare_labels {
                src.is_isomorphic(xs[i], dst, ys[j])
            } else {
                src.is_iso_structural(xs[i], dst, ys[j])
            }
        };
        for (i, j) in lcs(xs.len(), ys.len(), equal) {
            let (x, y) = (xs[i], ys[j]);
            if mappings.are_src_descendants_unmapped(src, x)
                && mappings.are_dst_descendants_unmapped(dst, y)
            {
                mappings.add_mapping_recursively(src, dst, x, y);
            }
        }
    }

    let mut src_histogram: IndexMap<NodeType, SmallVec<[NodeId; 2]>> = IndexMap::new();
    for c in src.children(a).filter(|&c| !mappings.is_src_mapped(c)) {
        src_histogram.entry(src.kind(c)).or_default().push(c);
    }
    let mut dst_histogram: IndexMap<NodeType, SmallVec<[NodeId; 2]>> = IndexMap::new();
    for c in dst.children(b).filter(|&c| !mappings.is_dst_mapped(c)) {
        dst_histogram.entry(dst.kind(c)).or_default().push(c);
    }

    for (kind, xs) in &src_histogram {
        let Some(ys) = dst_histogram.get(kind) else {
            continue;
        };
        if let (&[x], &[y]) = (xs.as_slice(), ys.as_slice())
            && mappings.is_mapping_allowed(src, dst, x, y)
        {
            mappings.add_mapping(x, y);
            work.push((x, y));
        }
    }
}

impl Matcher for BottomUpMatcher {
    fn match_trees(&self, src: &Tree, dst: &Tree, mappings: &mut MappingStore) {
        let before = mappings.len();

        for t in src.post_order() {
            if src.is_root(t) {
                if !mappings.has(t, dst.root) {
                    // roots always pair up
                    if let Some(image) = mappings.get_dst_for_src(t) {
                        mappings.remove_mapping(t, image);
                    }
                    if let Some(origin) = mappings.get_src_for_dst(dst.root) {
                        mappings.remove_mapping(origin, dst.root);
                    }
                    trace!(src = usize::from(t), dst = usize::from(dst.root), "bottom_up: roots");
                    mappings.add_mapping(t, dst.root);
                }
                self.last_chance_match(src, dst, mappings, t, dst.root);
                break;
            }

            if !mappings.is_src_mapped(t) && !src.is_leaf(t) {
                let mut best: Option<NodeId> = None;
                let mut max = -1.0;
                for candidate in dst_candidates(src, dst, mappings, t) {
                    let threshold = self.threshold(src, dst, t, candidate);
                    let score = self.similarity.score(src, dst, t, candidate, mappings);
                    if score > max && score >= threshold {
                        max = score;
                        best = Some(candidate);
                    }
                }

                if let Some(candidate) = best {
                    trace!(
                        src = usize::from(t),
                        dst = usize::from(candidate),
                        score = max,
                        "bottom_up: container match"
                    );
                    mappings.add_mapping(t, candidate);
                    self.last_chance_match(src, dst, mappings, t, candidate);
                }
            } else if let Some(image) = mappings.get_dst_for_src(t)
                && mappings.has_unmapped_src_children(src, t)
                && mappings.has_unmapped_dst_children(dst, image)
            {
                self.last_chance_match(src, dst, mappings, t, image);
            }
        }

        debug!(
            strategy = ?self.strategy,
            added = mappings.len() - before,
            "bottom_up done"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interner::TypeInterner;
    use crate::matching::top_down::GreedySubtreeMatcher;
    use crate::sexpr::parse_sexpr;
    use facet_testhelpers::test;

    fn run(strategy: MatchingConfig, src: &str, dst: &str) -> (Tree, Tree, MappingStore) {
        let interner = TypeInterner::new();
        let src = parse_sexpr(src, &interner).unwrap();
        let dst = parse_sexpr(dst, &interner).unwrap();
        let mut mappings = MappingStore::new();
        GreedySubtreeMatcher::new(&strategy).match_trees(&src, &dst, &mut mappings);
        BottomUpMatcher::new(&strategy).match_trees(&src, &dst, &mut mappings);
        (src, dst, mappings)
    }

    fn assert_typed_bijection(src: &Tree, dst: &Tree, mappings: &MappingStore) {
        for (a, b) in mappings.pairs() {
            assert_eq!(mappings.get_src_for_dst(b), Some(a));
            if !src.is_root(a) {
                assert_eq!(src.kind(a), dst.kind(b));
            }
        }
    }

    const SRC: &str = r#"(Unit
        (Func (Name "f") (Body (Call (Name "g") (Arg "x")) (Ret (Name "y"))))
        (Func (Name "h") (Body (Assign (Name "z") (Lit "1")))))"#;
    const DST: &str = r#"(Unit
        (Func (Name "h") (Body (Assign (Name "z") (Lit "2"))))
        (Func (Name "f2") (Body (Call (Name "g") (Arg "x")) (Ret (Name "y")))))"#;

    #[test]
    fn test_containers_follow_their_content() {
        for config in [
            MatchingConfig::greedy(),
            MatchingConfig::simple(),
            MatchingConfig::hybrid(),
        ] {
            let (src, dst, mappings) = run(config.clone(), SRC, DST);
            assert_typed_bijection(&src, &dst, &mappings);

            let f_src = src.first_child(src.root).unwrap();
            let f_dst = dst.children(dst.root).nth(1).unwrap();
            let h_src = src.children(src.root).nth(1).unwrap();
            let h_dst = dst.first_child(dst.root).unwrap();

            assert!(mappings.has(src.root, dst.root), "{config:?}");
            assert!(mappings.has(f_src, f_dst), "{config:?}");
            if config.bottom_up == BottomUp::Simple {
                assert!(mappings.has(h_src, h_dst), "{config:?}");
            } else {
                // exact matching under the root keeps order, so only one of
                // the two crossing functions survives
                assert!(!mappings.has(h_src, h_dst), "{config:?}");
            }

            // renamed function name is recovered inside the matched container
            let name_src = src.first_child(f_src).unwrap();
            let name_dst = dst.first_child(f_dst).unwrap();
            assert!(mappings.has(name_src, name_dst), "{config:?}");
        }
    }

    #[test]
    fn test_roots_forced_even_across_types() {
        let (src, dst, mappings) = run(
            MatchingConfig::default(),
            r#"(CompilationUnit (Identifier "x"))"#,
            r#"(Identifier "x")"#,
        );
        assert!(mappings.has(src.root, dst.root));
        assert_eq!(mappings.len(), 1);
    }

    #[test]
    fn test_histogram_maps_unique_types() {
        let (src, dst, mappings) = run(
            MatchingConfig::simple(),
            r#"(Block (If (Cond "a") (Then "b")) (Ret "r"))"#,
            r#"(Block (If (Cond "c") (Then "d")) (Ret "s"))"#,
        );
        assert_typed_bijection(&src, &dst, &mappings);
        // every node finds its counterpart by type uniqueness
        assert_eq!(mappings.len(), src.node_count());
    }

    #[test]
    fn test_adaptive_threshold() {
        let interner = TypeInterner::new();
        let src = parse_sexpr(r#"(A (B) (C))"#, &interner).unwrap();
        let dst = parse_sexpr(r#"(A (B))"#, &interner).unwrap();
        let matcher = BottomUpMatcher::new(&MatchingConfig::simple());
        let expected = 1.0 / (1.0 + 5f64.ln());
        assert_eq!(matcher.threshold(&src, &dst, src.root, dst.root), expected);

        let greedy = BottomUpMatcher::new(&MatchingConfig::greedy());
        assert_eq!(greedy.threshold(&src, &dst, src.root, dst.root), 0.5);
    }

    #[test]
    fn test_adaptive_threshold_accepts_sparse_container() {
        // K keeps one of its six children; Chawathe scores 2/7, just above
        // 1/(1+ln 13) for the combined size of 13
        let src = r#"(R (W (K (P (L "a")) (X "1") (X "2") (X "3") (X "4") (X "5"))))"#;
        let dst = r#"(R (V (K (P (L "a")) (Y "9") (Y "8"))))"#;
        for config in [MatchingConfig::simple(), MatchingConfig::hybrid()] {
            let (src, dst, mappings) = run(config.clone(), src, dst);
            assert_typed_bijection(&src, &dst, &mappings);
            let k = |t: &Tree| t.first_child(t.first_child(t.root).unwrap()).unwrap();
            assert!(mappings.has(k(&src), k(&dst)), "{config:?}");
        }
    }

    #[test]
    fn test_root_pair_replaces_inner_match() {
        // top-down maps the whole src onto the nested dst copy
        for config in [
            MatchingConfig::greedy(),
            MatchingConfig::simple(),
            MatchingConfig::hybrid(),
        ] {
            let (src, dst, mappings) = run(config.clone(), "(T3 (T0))", "(T0 (T3 (T0)))");
            assert_typed_bijection(&src, &dst, &mappings);

            let inner = dst.first_child(dst.root).unwrap();
            let leaf_src = src.first_child(src.root).unwrap();
            let leaf_dst = dst.first_child(inner).unwrap();

            assert!(mappings.has(src.root, dst.root), "{config:?}");
            assert!(!mappings.is_dst_mapped(inner), "{config:?}");
            assert!(mappings.has(leaf_src, leaf_dst), "{config:?}");
            assert_eq!(mappings.len(), 2, "{config:?}");
        }
    }
}
