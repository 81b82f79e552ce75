//! GumTree node matching.
//!
//! Matching runs in two phases over one [`MappingStore`]:
//! 1. Top-down: map identical subtrees, largest first, by hash
//! 2. Bottom-up: map containers by the similarity of their mapped content,
//!    then recover what is left inside them ("last-chance" matching)

use crate::debug;
use crate::mapping::MappingStore;
use crate::tree::Tree;

pub mod bottom_up;
mod comparator;
pub mod similarity;
pub mod top_down;
pub mod zhang_shasha;

pub use bottom_up::BottomUpMatcher;
pub use similarity::Similarity;
pub use top_down::GreedySubtreeMatcher;
pub use zhang_shasha::ZhangShashaMatcher;

/// A matching phase: adds pairs to `mappings`, never removes any.
pub trait Matcher {
    /// Extend `mappings` with pairs between `src` and `dst`.
    fn match_trees(&self, src: &Tree, dst: &Tree, mappings: &mut MappingStore);
}

/// Two matchers run one after the other.
impl<A: Matcher, B: Matcher> Matcher for (A, B) {
    fn match_trees(&self, src: &Tree, dst: &Tree, mappings: &mut MappingStore) {
        self.0.match_trees(src, dst, mappings);
        self.1.match_trees(src, dst, mappings);
    }
}

/// Priority of subtrees in the top-down queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    /// Subtree height.
    #[default]
    Height,
    /// Subtree node count.
    Size,
}

/// Last-chance strategy of the bottom-up phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BottomUp {
    /// Exact matching on small containers only. Dice similarity, fixed 0.5
    /// threshold.
    #[default]
    Greedy,
    /// LCS and histogram heuristics everywhere. Chawathe similarity,
    /// size-adaptive threshold.
    Simple,
    /// Exact matching on small containers, heuristics on large ones.
    /// Chawathe similarity, size-adaptive threshold.
    Hybrid,
}

/// Configuration for the matching algorithm.
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// Top-down queue priority.
    pub priority: Priority,

    /// Subtrees with a lower priority are left for bottom-up matching.
    pub min_priority: usize,

    /// Bottom-up strategy.
    pub bottom_up: BottomUp,

    /// Similarity used to score containers. `None` picks the strategy's
    /// default: Dice for greedy, Chawathe otherwise.
    pub similarity: Option<Similarity>,

    /// Minimum similarity for a container match. `None` picks the strategy's
    /// default: 0.5 for greedy, `1 / (1 + ln(n))` otherwise, `n` being the
    /// combined descendant count of the two containers.
    pub similarity_threshold: Option<f64>,

    /// Containers smaller than this are matched exactly. `None` picks the
    /// strategy's default: 1000 for greedy, 20 for hybrid. Unused by simple.
    pub size_threshold: Option<usize>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            priority: Priority::Height,
            min_priority: 1,
            bottom_up: BottomUp::Greedy,
            similarity: None,
            similarity_threshold: None,
            size_threshold: None,
        }
    }
}

impl MatchingConfig {
    /// Greedy bottom-up preset (the default).
    pub fn greedy() -> Self {
        Self::default()
    }

    /// Simple bottom-up preset.
    pub fn simple() -> Self {
        Self {
            bottom_up: BottomUp::Simple,
            ..Self::default()
        }
    }

    /// Hybrid bottom-up preset.
    pub fn hybrid() -> Self {
        Self {
            bottom_up: BottomUp::Hybrid,
            ..Self::default()
        }
    }

    /// Use `priority` for the top-down queues.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Override the container similarity.
    pub fn with_similarity(mut self, similarity: Similarity) -> Self {
        self.similarity = Some(similarity);
        self
    }

    /// Override the container threshold.
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = Some(threshold);
        self
    }

    /// Override the exact-matching size threshold.
    pub fn with_size_threshold(mut self, size: usize) -> Self {
        self.size_threshold = Some(size);
        self
    }

    /// The similarity in effect.
    pub fn similarity(&self) -> Similarity {
        self.similarity.unwrap_or(match self.bottom_up {
            BottomUp::Greedy => Similarity::Dice,
            BottomUp::Simple | BottomUp::Hybrid => Similarity::Chawathe,
        })
    }

    /// The size threshold in effect.
    pub fn size_threshold(&self) -> usize {
        self.size_threshold.unwrap_or(match self.bottom_up {
            BottomUp::Greedy => 1000,
            BottomUp::Simple | BottomUp::Hybrid => 20,
        })
    }
}

/// Compute the matching between two trees: top-down, then bottom-up.
///
/// # Panics
///
/// Panics if either tree lacks computed metrics.
pub fn compute_matching(src: &Tree, dst: &Tree, config: &MatchingConfig) -> MappingStore {
    assert!(
        src.has_metrics() && dst.has_metrics(),
        "tree metrics must be computed before matching"
    );
    debug!(
        src_nodes = src.node_count(),
        dst_nodes = dst.node_count(),
        strategy = ?config.bottom_up,
        "compute_matching start"
    );

    let mut mappings = MappingStore::with_capacity(src.arena.count(), dst.arena.count());
    let matcher = (GreedySubtreeMatcher::new(config), BottomUpMatcher::new(config));
    matcher.match_trees(src, dst, &mut mappings);

    debug!(matched = mappings.len(), "compute_matching done");
    mappings
}
