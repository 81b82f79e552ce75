//! Interning of syntactic node types.
//!
//! Every tree taking part in a diff must draw its [`NodeType`]s from the same
//! [`TypeInterner`], otherwise type equality between the two trees is
//! meaningless. Build one interner up front and hand it (usually behind an
//! `Arc`) to every parser that produces trees.

use compact_str::CompactString;
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};
use dashmap::DashMap;

/// An interned node type.
///
/// Cheap to copy and compare. The numeric value is only meaningful relative to
/// the interner that produced it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeType(u32);

impl NodeType {
    /// Type of the synthetic root the edit script generator wraps trees in.
    /// Never handed out by an interner.
    pub(crate) const FAKE_ROOT: NodeType = NodeType(u32::MAX);

    /// The raw interned index.
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::FAKE_ROOT {
            write!(f, "#fake")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Thread-safe table mapping type names to [`NodeType`]s.
///
/// Lookups and insertions may happen concurrently from many diff tasks. The
/// first caller to intern a name decides its id; later callers get the same
/// id back.
#[derive(Debug, Default)]
pub struct TypeInterner {
    by_name: DashMap<CompactString, NodeType>,
    by_type: DashMap<NodeType, CompactString>,
    next: AtomicU32,
}

impl TypeInterner {
    /// Create an empty interner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `name`, returning its type.
    pub fn intern(&self, name: &str) -> NodeType {
        if let Some(existing) = self.by_name.get(name) {
            return *existing;
        }

        // The entry guard holds the shard lock, so two racing callers cannot
        // both allocate an id for the same name.
        *self
            .by_name
            .entry(CompactString::from(name))
            .or_insert_with(|| {
                let kind = NodeType(self.next.fetch_add(1, Ordering::Relaxed));
                assert!(kind != NodeType::FAKE_ROOT, "type interner exhausted");
                self.by_type.insert(kind, CompactString::from(name));
                kind
            })
    }

    /// Look up an already interned name.
    pub fn get(&self, name: &str) -> Option<NodeType> {
        self.by_name.get(name).map(|kind| *kind)
    }

    /// The name a type was interned under.
    pub fn resolve(&self, kind: NodeType) -> Option<CompactString> {
        self.by_type.get(&kind).map(|name| name.value().clone())
    }

    /// Number of distinct types interned so far.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether nothing has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;
    use std::sync::Arc;

    #[test]
    fn test_intern_is_idempotent() {
        let interner = TypeInterner::new();
        let a = interner.intern("Identifier");
        let b = interner.intern("BinOp");
        assert_ne!(a, b);
        assert_eq!(interner.intern("Identifier"), a);
        assert_eq!(interner.len(), 2);
        assert_eq!(interner.resolve(b).as_deref(), Some("BinOp"));
        assert_eq!(interner.get("Missing"), None);
    }

    #[test]
    fn test_concurrent_interning_agrees() {
        let interner = Arc::new(TypeInterner::new());
        let names = ["Call", "Assign", "If", "Loop", "Return", "Identifier"];

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let interner = Arc::clone(&interner);
                std::thread::spawn(move || {
                    names
                        .iter()
                        .map(|name| interner.intern(name))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let results: Vec<Vec<NodeType>> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();

        for result in &results[1..] {
            assert_eq!(result, &results[0]);
        }
        assert_eq!(interner.len(), names.len());
    }
}
