//! # Mallee
//!
//! GumTree-style AST differencing with a Zhang–Shasha fallback for small
//! subtrees and Chawathe edit script generation.
//!
//! Named after the mallee, the multi-stemmed scrub eucalyptus: many small gum
//! trees growing from one rootstock.
//!
//! ## Algorithm Overview
//!
//! The diff runs in phases:
//!
//! 1. **Top-down matching**: map identical subtrees by hash, largest first
//! 2. **Bottom-up matching**: map containers by the similarity of their
//!    mapped descendants, then recover the rest inside them with an exact
//!    tree edit distance (small containers) or LCS and histogram heuristics
//! 3. **Edit script generation**: insert, delete, update and move actions
//!    that turn the source tree into the destination tree
//! 4. **Simplification** and **classification** of the script
//!
//! ## Usage
//!
//! ```
//! use mallee::{Diff, MatchingConfig, Tree, TypeInterner};
//!
//! let types = TypeInterner::new();
//! let src = Tree::parse_sexpr(r#"(Call (Id "f") (Id "x"))"#, &types).unwrap();
//! let dst = Tree::parse_sexpr(r#"(Call (Id "g") (Id "x"))"#, &types).unwrap();
//!
//! let diff = Diff::compute(&src, &dst, &MatchingConfig::default());
//! assert_eq!(diff.script.count("update"), 1);
//! assert_eq!(diff.classification.src_updated.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::std_instead_of_core)]

pub use indextree;

mod tracing_macros;
pub(crate) use tracing_macros::{debug, trace};

mod chawathe;
mod classify;
/// Type names and their interned ids
pub mod interner;
mod lcs;
/// Bijective node mappings
pub mod mapping;
/// GumTree matching algorithm
pub mod matching;
/// Per-node subtree metrics
pub mod metrics;
mod replay;
mod sexpr;
mod simplify;
/// Tree representation
pub mod tree;

pub use chawathe::{Action, EditScript, generate_edit_script};
pub use classify::{Classification, classify};
pub use interner::{NodeType, TypeInterner};
pub use mapping::MappingStore;
pub use matching::{
    BottomUp, BottomUpMatcher, GreedySubtreeMatcher, Matcher, MatchingConfig, Priority,
    Similarity, ZhangShashaMatcher, compute_matching,
};
pub use metrics::TreeMetrics;
pub use replay::ReplayError;
pub use sexpr::{ParseError, SexprDisplay, parse_sexpr};
pub use simplify::simplify_edit_script;
pub use tree::{Metadata, NodeData, Tree};

use rayon::prelude::*;

/// Compute an edit script between two trees.
///
/// This is the main entry point for tree diffing. It:
/// 1. Computes a matching between nodes using GumTree's two-phase algorithm
/// 2. Generates an edit script using Chawathe's algorithm
///
/// # Example
///
/// ```
/// use mallee::{MatchingConfig, NodeData, Tree, TypeInterner, diff_trees};
///
/// let types = TypeInterner::new();
/// let block = types.intern("Block");
/// let lit = types.intern("Lit");
///
/// let mut src = Tree::new(NodeData::new(block));
/// src.add_child(src.root, NodeData::labeled(lit, "1"));
/// src.compute_metrics();
///
/// let mut dst = Tree::new(NodeData::new(block));
/// dst.add_child(dst.root, NodeData::labeled(lit, "2"));
/// dst.compute_metrics();
///
/// let script = diff_trees(&src, &dst, &MatchingConfig::default());
/// assert_eq!(script.len(), 1);
/// ```
///
/// # Panics
///
/// Panics if either tree lacks computed metrics.
pub fn diff_trees(src: &Tree, dst: &Tree, config: &MatchingConfig) -> EditScript {
    let (script, _mappings) = diff_trees_with_matching(src, dst, config);
    script
}

/// Like [`diff_trees`], but also returns the node matching.
///
/// Consumers that relate source and destination nodes beyond the script
/// (dependence graphs, change spans) need the mappings as well.
pub fn diff_trees_with_matching(
    src: &Tree,
    dst: &Tree,
    config: &MatchingConfig,
) -> (EditScript, MappingStore) {
    let mappings = compute_matching(src, dst, config);
    let script = generate_edit_script(src, dst, &mappings);
    (script, mappings)
}

/// Everything one diff produces.
#[derive(Debug, Clone)]
pub struct Diff {
    /// Source/destination node pairs.
    pub mappings: MappingStore,
    /// The raw Chawathe script.
    pub script: EditScript,
    /// The script with whole-subtree inserts and deletes collapsed.
    pub simplified: EditScript,
    /// Nodes touched by the script.
    pub classification: Classification,
}

impl Diff {
    /// Match, generate, simplify and classify in one go.
    pub fn compute(src: &Tree, dst: &Tree, config: &MatchingConfig) -> Self {
        let (script, mappings) = diff_trees_with_matching(src, dst, config);
        let simplified = simplify_edit_script(script.clone(), src, dst);
        let classification = classify(&simplified, src, dst);
        debug!(
            mappings = mappings.len(),
            actions = script.len(),
            simplified = simplified.len(),
            "diff done"
        );
        Self {
            mappings,
            script,
            simplified,
            classification,
        }
    }
}

/// Diff many tree pairs in parallel, one independent [`Diff`] per pair, in
/// input order.
pub fn diff_many(pairs: &[(Tree, Tree)], config: &MatchingConfig) -> Vec<Diff> {
    debug!(pairs = pairs.len(), "diff_many");
    pairs
        .par_iter()
        .map(|(src, dst)| Diff::compute(src, dst, config))
        .collect()
}
