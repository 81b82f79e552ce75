//! Similarity measures between subtrees and between labels.

use crate::mapping::MappingStore;
use crate::tree::Tree;
use indextree::NodeId;
use rapidhash::RapidHashMap as HashMap;

/// How the bottom-up matchers score a candidate pair.
///
/// All three measures count the mapped descendants two subtrees have in
/// common and normalise by their descendant counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Similarity {
    /// `2·common / (|desc(a)| + |desc(b)|)`
    Dice,
    /// `common / max(|desc(a)|, |desc(b)|)`
    Chawathe,
    /// `common / (|desc(a)| + |desc(b)| − common)`
    Jaccard,
}

impl Similarity {
    /// Score the subtree at `a` in `src` against the subtree at `b` in `dst`.
    pub fn score(
        self,
        src: &Tree,
        dst: &Tree,
        a: NodeId,
        b: NodeId,
        mappings: &MappingStore,
    ) -> f64 {
        let common = number_of_mapped_descendants(src, dst, a, b, mappings);
        let left = src.metrics(a).size - 1;
        let right = dst.metrics(b).size - 1;
        match self {
            Similarity::Dice => dice(common, left, right),
            Similarity::Chawathe => chawathe(common, left, right),
            Similarity::Jaccard => jaccard(common, left, right),
        }
    }
}

/// Number of descendants of `a` whose image is a descendant of `b`.
pub fn number_of_mapped_descendants(
    src: &Tree,
    dst: &Tree,
    a: NodeId,
    b: NodeId,
    mappings: &MappingStore,
) -> usize {
    src.descendants(a)
        .filter_map(|d| mappings.get_dst_for_src(d))
        .filter(|&image| dst.is_descendant_of(image, b))
        .count()
}

/// Dice coefficient. 1 when both sides are empty.
pub fn dice(common: usize, left: usize, right: usize) -> f64 {
    if left + right == 0 {
        return 1.0;
    }
    2.0 * common as f64 / (left + right) as f64
}

/// Chawathe similarity. 1 when both sides are empty.
pub fn chawathe(common: usize, left: usize, right: usize) -> f64 {
    let max = left.max(right);
    if max == 0 {
        return 1.0;
    }
    common as f64 / max as f64
}

/// Jaccard index. 1 when both sides are empty.
pub fn jaccard(common: usize, left: usize, right: usize) -> f64 {
    let union = left + right - common;
    if union == 0 {
        return 1.0;
    }
    common as f64 / union as f64
}

fn trigram_profile(text: &str) -> HashMap<[char; 3], i64> {
    let padded: Vec<char> = "##"
        .chars()
        .chain(text.chars())
        .chain("##".chars())
        .collect();
    let mut profile = HashMap::default();
    for window in padded.windows(3) {
        *profile.entry([window[0], window[1], window[2]]).or_insert(0) += 1;
    }
    profile
}

/// Character trigram similarity of two labels, in `[0, 1]`.
///
/// Both strings are padded with `##` on each side, so even empty strings
/// produce trigrams. The score is one minus the L1 distance between the two
/// trigram multisets, normalised by their combined cardinality.
pub fn trigram_similarity(a: &str, b: &str) -> f64 {
    let pa = trigram_profile(a);
    let pb = trigram_profile(b);
    let total: i64 = pa.values().sum::<i64>() + pb.values().sum::<i64>();

    let mut distance: i64 = 0;
    for (gram, &count) in &pa {
        distance += (count - pb.get(gram).copied().unwrap_or(0)).abs();
    }
    for (gram, &count) in &pb {
        if !pa.contains_key(gram) {
            distance += count;
        }
    }

    1.0 - distance as f64 / total as f64
}
