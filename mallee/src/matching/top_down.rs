//! Greedy top-down matching of isomorphic subtrees.
//!
//! Both trees are explored from their roots through priority queues keyed by
//! subtree height (or size). At each priority level, subtrees are bucketed by
//! hash; a bucket with exactly one subtree per side is an unambiguous match,
//! larger buckets are resolved at the end through the comparator chain.

use super::comparator::sort_candidates;
use super::{Matcher, MatchingConfig, Priority};
use crate::mapping::MappingStore;
use crate::tree::Tree;
use crate::{debug, trace};
use core::cmp::Reverse;
use indexmap::IndexMap;
use indextree::NodeId;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Entry {
    priority: usize,
    // earlier pushes pop first among equal priorities
    seq: Reverse<u64>,
    node: NodeId,
}

/// Subtrees of one tree waiting to be compared, highest priority first.
struct PriorityTreeQueue<'a> {
    tree: &'a Tree,
    priority: Priority,
    min_priority: usize,
    heap: BinaryHeap<Entry>,
    seq: u64,
}

impl<'a> PriorityTreeQueue<'a> {
    fn new(tree: &'a Tree, priority: Priority, min_priority: usize) -> Self {
        let mut queue = Self {
            tree,
            priority,
            min_priority,
            heap: BinaryHeap::new(),
            seq: 0,
        };
        queue.push(tree.root);
        queue
    }

    fn priority_of(&self, node: NodeId) -> usize {
        let metrics = self.tree.metrics(node);
        match self.priority {
            Priority::Height => metrics.height,
            Priority::Size => metrics.size,
        }
    }

    fn push(&mut self, node: NodeId) {
        let priority = self.priority_of(node);
        if priority >= self.min_priority {
            self.heap.push(Entry {
                priority,
                seq: Reverse(self.seq),
                node,
            });
            self.seq += 1;
        }
    }

    fn open(&mut self, node: NodeId) {
        for child in self.tree.children(node) {
            self.push(child);
        }
    }

    fn current_priority(&self) -> Option<usize> {
        self.heap.peek().map(|entry| entry.priority)
    }

    /// Remove every subtree at the current priority level.
    fn pop(&mut self) -> Vec<NodeId> {
        let mut popped = Vec::new();
        let Some(level) = self.current_priority() else {
            return popped;
        };
        while self.current_priority() == Some(level) {
            if let Some(entry) = self.heap.pop() {
                popped.push(entry.node);
            }
        }
        popped
    }

    fn pop_open(&mut self) {
        for node in self.pop() {
            self.open(node);
        }
    }

    fn clear(&mut self) {
        self.heap.clear();
    }
}

/// Bring both queues to the same priority level. Returns `false` (and
/// empties both) once either side runs dry.
fn synchronize(src: &mut PriorityTreeQueue<'_>, dst: &mut PriorityTreeQueue<'_>) -> bool {
    loop {
        match (src.current_priority(), dst.current_priority()) {
            (Some(a), Some(b)) if a == b => return true,
            (Some(a), Some(b)) => {
                if a > b {
                    src.pop_open();
                } else {
                    dst.pop_open();
                }
            }
            _ => {
                src.clear();
                dst.clear();
                return false;
            }
        }
    }
}

/// Hash bucket at one priority level.
#[derive(Default)]
struct Bucket {
    src: Vec<NodeId>,
    dst: Vec<NodeId>,
}

/// Maps identical subtrees, largest first.
#[derive(Debug, Clone)]
pub struct GreedySubtreeMatcher {
    /// How queue priorities are computed.
    pub priority: Priority,
    /// Subtrees with a lower priority are left to later phases.
    pub min_priority: usize,
}

impl Default for GreedySubtreeMatcher {
    fn default() -> Self {
        Self::new(&MatchingConfig::default())
    }
}

impl GreedySubtreeMatcher {
    /// Build the matcher from a configuration.
    pub fn new(config: &MatchingConfig) -> Self {
        Self {
            priority: config.priority,
            min_priority: config.min_priority,
        }
    }
}

fn can_map_subtrees(
    src: &Tree,
    dst: &Tree,
    mappings: &MappingStore,
    a: NodeId,
    b: NodeId,
) -> bool {
    mappings.are_src_descendants_unmapped(src, a) && mappings.are_dst_descendants_unmapped(dst, b)
}

impl Matcher for GreedySubtreeMatcher {
    fn match_trees(&self, src: &Tree, dst: &Tree, mappings: &mut MappingStore) {
        let mut src_queue = PriorityTreeQueue::new(src, self.priority, self.min_priority);
        let mut dst_queue = PriorityTreeQueue::new(dst, self.priority, self.min_priority);
        let mut ambiguous: Vec<Bucket> = Vec::new();

        while synchronize(&mut src_queue, &mut dst_queue) {
            let mut buckets: IndexMap<u64, Bucket> = IndexMap::new();
            for node in src_queue.pop() {
                buckets.entry(src.metrics(node).hash).or_default().src.push(node);
            }
            for node in dst_queue.pop() {
                buckets.entry(dst.metrics(node).hash).or_default().dst.push(node);
            }

            for (_, bucket) in buckets {
                if bucket.src.len() == 1 && bucket.dst.len() == 1 {
                    let (a, b) = (bucket.src[0], bucket.dst[0]);
                    if src.is_isomorphic(a, dst, b)
                        && can_map_subtrees(src, dst, mappings, a, b)
                    {
                        trace!(
                            src = usize::from(a),
                            dst = usize::from(b),
                            "top_down: unique match"
                        );
                        mappings.add_mapping_recursively(src, dst, a, b);
                    } else {
                        src_queue.open(a);
                        dst_queue.open(b);
                    }
                } else if bucket.src.is_empty() || bucket.dst.is_empty() {
                    for &a in &bucket.src {
                        src_queue.open(a);
                    }
                    for &b in &bucket.dst {
                        dst_queue.open(b);
                    }
                } else {
                    ambiguous.push(bucket);
                }
            }
        }

        debug!(
            matched = mappings.len(),
            ambiguous_buckets = ambiguous.len(),
            "top_down: queues exhausted"
        );
        self.resolve_ambiguous(src, dst, mappings, ambiguous);
        debug!(matched = mappings.len(), "top_down done");
    }
}

impl GreedySubtreeMatcher {
    fn resolve_ambiguous(
        &self,
        src: &Tree,
        dst: &Tree,
        mappings: &mut MappingStore,
        mut ambiguous: Vec<Bucket>,
    ) {
        let max_size = |bucket: &Bucket| {
            bucket
                .src
                .iter()
                .map(|&a| src.metrics(a).size)
                .max()
                .unwrap_or(0)
        };
        ambiguous.sort_by_key(|bucket| Reverse(max_size(bucket)));

        for bucket in ambiguous {
            let mut candidates: Vec<(NodeId, NodeId)> = Vec::new();
            for &a in &bucket.src {
                for &b in &bucket.dst {
                    if src.is_isomorphic(a, dst, b) {
                        candidates.push((a, b));
                    }
                }
            }
            sort_candidates(src, dst, mappings, &mut candidates);

            for (a, b) in candidates {
                if can_map_subtrees(src, dst, mappings, a, b) {
                    trace!(
                        src = usize::from(a),
                        dst = usize::from(b),
                        "top_down: ambiguous match"
                    );
                    mappings.add_mapping_recursively(src, dst, a, b);
                }
            }
        }
    }
}
