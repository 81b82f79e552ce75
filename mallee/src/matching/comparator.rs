//! Ordering of ambiguous candidate pairs left over by the top-down matcher.
//!
//! When several isomorphic subtrees compete for each other, the pairs are
//! ranked by a chain of keys and committed greedily in that order.

use super::similarity::{Similarity, dice};
use crate::interner::NodeType;
use crate::lcs::lcs;
use crate::mapping::MappingStore;
use crate::tree::Tree;
use core::cmp::Ordering;
use indextree::NodeId;
use smallvec::SmallVec;

/// Precomputed ranking keys for one candidate pair.
#[derive(Debug, Clone, Copy)]
struct CandidateKey {
    /// Higher first.
    sibling_similarity: f64,
    /// Higher first.
    parent_similarity: f64,
    /// Lower first.
    position_distance: f64,
    /// Lower first.
    textual_distance: usize,
    /// Lower first.
    rank_distance: usize,
}

impl CandidateKey {
    fn new(src: &Tree, dst: &Tree, mappings: &MappingStore, a: NodeId, b: NodeId) -> Self {
        Self {
            sibling_similarity: sibling_similarity(src, dst, mappings, a, b),
            parent_similarity: parent_similarity(src, dst, a, b),
            position_distance: position_distance(src, dst, a, b),
            textual_distance: {
                let (da, db) = (src.get(a), dst.get(b));
                da.pos.abs_diff(db.pos) + da.end().abs_diff(db.end())
            },
            rank_distance: src.metrics(a).position.abs_diff(dst.metrics(b).position),
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        other
            .sibling_similarity
            .total_cmp(&self.sibling_similarity)
            .then_with(|| other.parent_similarity.total_cmp(&self.parent_similarity))
            .then_with(|| self.position_distance.total_cmp(&other.position_distance))
            .then_with(|| self.textual_distance.cmp(&other.textual_distance))
            .then_with(|| self.rank_distance.cmp(&other.rank_distance))
    }
}

fn sibling_similarity(
    src: &Tree,
    dst: &Tree,
    mappings: &MappingStore,
    a: NodeId,
    b: NodeId,
) -> f64 {
    match (src.parent(a), dst.parent(b)) {
        (Some(pa), Some(pb)) => Similarity::Dice.score(src, dst, pa, pb, mappings),
        _ => 0.0,
    }
}

fn parent_similarity(src: &Tree, dst: &Tree, a: NodeId, b: NodeId) -> f64 {
    let sa: SmallVec<[NodeType; 16]> = src.ancestors(a).map(|p| src.kind(p)).collect();
    let sb: SmallVec<[NodeType; 16]> = dst.ancestors(b).map(|p| dst.kind(p)).collect();
    let common = lcs(sa.len(), sb.len(), |i, j| sa[i] == sb[j]).len();
    dice(common, sa.len(), sb.len())
}

fn position_vector(tree: &Tree, node: NodeId) -> SmallVec<[usize; 16]> {
    let mut positions = SmallVec::new();
    let mut current = Some(node);
    while let Some(id) = current {
        positions.push(tree.position(id));
        current = tree.parent(id);
    }
    // root first
    positions.reverse();
    positions
}

fn position_distance(src: &Tree, dst: &Tree, a: NodeId, b: NodeId) -> f64 {
    let pa = position_vector(src, a);
    let pb = position_vector(dst, b);
    let sum: f64 = pa
        .iter()
        .zip(pb.iter())
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum();
    sum.sqrt()
}

/// Sort candidate pairs best first. The sort is stable, so pairs with equal
/// keys keep their generation order.
pub(crate) fn sort_candidates(
    src: &Tree,
    dst: &Tree,
    mappings: &MappingStore,
    candidates: &mut Vec<(NodeId, NodeId)>,
) {
    let mut keyed: Vec<(CandidateKey, (NodeId, NodeId))> = candidates
        .drain(..)
        .map(|(a, b)| (CandidateKey::new(src, dst, mappings, a, b), (a, b)))
        .collect();
    keyed.sort_by(|x, y| x.0.compare(&y.0));
    candidates.extend(keyed.into_iter().map(|(_, pair)| pair));
}
