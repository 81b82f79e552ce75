//! Applying edit scripts to a fresh copy of the source tree.

use crate::chawathe::{Action, EditScript};
use crate::tree::{NodeData, Tree, insert_child_at};
use crate::{debug, trace};
use indextree::{Arena, NodeId};
use rapidhash::RapidHashMap as HashMap;

/// Why an edit script could not be replayed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    /// An action names a node that does not exist in the working copy.
    #[error("action {index}: unknown node {node}")]
    UnknownNode {
        /// Index of the failing action.
        index: usize,
        /// Index of the missing node.
        node: usize,
    },

    /// A tree insert names a destination node that does not exist.
    #[error("action {index}: unknown destination node {node}")]
    UnknownDstNode {
        /// Index of the failing action.
        index: usize,
        /// Index of the missing node.
        node: usize,
    },

    /// An insert or move targets a position past the end of the children.
    #[error("action {index}: position {position} out of bounds under node {parent} ({len} children)")]
    PositionOutOfBounds {
        /// Index of the failing action.
        index: usize,
        /// The target parent.
        parent: usize,
        /// The requested position.
        position: usize,
        /// Number of children of the parent.
        len: usize,
    },

    /// A leaf delete targets a node that still has children.
    #[error("action {index}: node {node} still has children")]
    NotALeaf {
        /// Index of the failing action.
        index: usize,
        /// The node.
        node: usize,
    },

    /// A move would attach a node below itself.
    #[error("action {index}: node {node} cannot move into its own subtree")]
    MoveIntoOwnSubtree {
        /// Index of the failing action.
        index: usize,
        /// The node.
        node: usize,
    },

    /// The fake root does not end up with exactly one child.
    #[error("replay left {0} roots under the fake root")]
    RootCount(usize),
}

struct Replayer<'a> {
    dst: &'a Tree,
    arena: Arena<NodeData>,
    fake_root: NodeId,
    /// Script ids of inserted nodes to their ids in this arena.
    alias: HashMap<NodeId, NodeId>,
}

impl Replayer<'_> {
    fn resolve(&self, index: usize, id: NodeId) -> Result<NodeId, ReplayError> {
        let id = self.alias.get(&id).copied().unwrap_or(id);
        match self.arena.get(id) {
            Some(node) if !node.is_removed() => Ok(id),
            _ => Err(ReplayError::UnknownNode {
                index,
                node: usize::from(id),
            }),
        }
    }

    fn check_position(
        &self,
        index: usize,
        parent: NodeId,
        position: usize,
    ) -> Result<(), ReplayError> {
        let len = parent.children(&self.arena).count();
        if position > len {
            return Err(ReplayError::PositionOutOfBounds {
                index,
                parent: usize::from(parent),
                position,
                len,
            });
        }
        Ok(())
    }

    /// Copy the dst subtree rooted at `x` into the arena, returning the copy
    /// of `x` (detached).
    fn copy_dst_subtree(&mut self, x: NodeId) -> NodeId {
        let root = self.arena.new_node(self.dst.get(x).clone());
        let mut stack = vec![(x, root)];
        while let Some((from, to)) = stack.pop() {
            for child in self.dst.children(from) {
                let copy = self.arena.new_node(self.dst.get(child).clone());
                to.append(copy, &mut self.arena);
                stack.push((child, copy));
            }
        }
        root
    }

    fn apply(&mut self, index: usize, action: &Action) -> Result<(), ReplayError> {
        trace!(index, %action, "replay");
        match action {
            Action::Insert {
                node,
                parent,
                position,
                kind,
                label,
                ..
            } => {
                let parent = self.resolve(index, *parent)?;
                self.check_position(index, parent, *position)?;
                let mut data = NodeData::new(*kind);
                data.label = label.clone();
                let id = self.arena.new_node(data);
                insert_child_at(&mut self.arena, parent, id, *position);
                self.alias.insert(*node, id);
            }
            Action::TreeInsert {
                node,
                dst: x,
                parent,
                position,
            } => {
                let parent = self.resolve(index, *parent)?;
                self.check_position(index, parent, *position)?;
                if self.dst.arena.get(*x).is_none_or(|n| n.is_removed()) {
                    return Err(ReplayError::UnknownDstNode {
                        index,
                        node: usize::from(*x),
                    });
                }
                let id = self.copy_dst_subtree(*x);
                insert_child_at(&mut self.arena, parent, id, *position);
                self.alias.insert(*node, id);
            }
            Action::Delete { node } => {
                let node = self.resolve(index, *node)?;
                if self.arena[node].first_child().is_some() {
                    return Err(ReplayError::NotALeaf {
                        index,
                        node: usize::from(node),
                    });
                }
                node.detach(&mut self.arena);
            }
            Action::TreeDelete { node } => {
                let node = self.resolve(index, *node)?;
                node.detach(&mut self.arena);
            }
            Action::Update {
                node,
                new_label,
                retype,
                ..
            } => {
                let node = self.resolve(index, *node)?;
                let data = self.arena[node].get_mut();
                data.label = new_label.clone();
                if let Some(kind) = retype {
                    data.kind = *kind;
                }
            }
            Action::Move {
                node,
                parent,
                position,
                ..
            } => {
                let node = self.resolve(index, *node)?;
                let parent = self.resolve(index, *parent)?;
                if parent.ancestors(&self.arena).any(|a| a == node) {
                    return Err(ReplayError::MoveIntoOwnSubtree {
                        index,
                        node: usize::from(node),
                    });
                }
                node.detach(&mut self.arena);
                self.check_position(index, parent, *position)?;
                insert_child_at(&mut self.arena, parent, node, *position);
            }
        }
        Ok(())
    }
}

impl EditScript {
    /// Apply the script to a fresh copy of `src` and return the resulting
    /// tree, with metrics computed.
    ///
    /// `src` must be the tree the script was generated from. `dst` is only
    /// read to expand [`Action::TreeInsert`].
    pub fn replay(&self, src: &Tree, dst: &Tree) -> Result<Tree, ReplayError> {
        let mut arena = src.arena.clone();
        let fake_root = arena.new_node(NodeData::fake_root());
        fake_root.append(src.root, &mut arena);

        let mut replayer = Replayer {
            dst,
            arena,
            fake_root,
            alias: HashMap::default(),
        };
        replayer.alias.insert(self.fake_root, fake_root);

        for (index, action) in self.actions.iter().enumerate() {
            replayer.apply(index, action)?;
        }

        let Replayer {
            mut arena,
            fake_root,
            ..
        } = replayer;
        let roots: Vec<NodeId> = fake_root.children(&arena).collect();
        let [root] = roots[..] else {
            return Err(ReplayError::RootCount(roots.len()));
        };
        root.detach(&mut arena);

        let mut tree = Tree::from_parts(arena, root);
        tree.compute_metrics();
        debug!(
            actions = self.len(),
            nodes = tree.node_count(),
            "replay done"
        );
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chawathe::generate_edit_script;
    use crate::interner::TypeInterner;
    use crate::matching::{MatchingConfig, compute_matching};
    use crate::sexpr::parse_sexpr;
    use crate::simplify::simplify_edit_script;
    use facet_testhelpers::test;

    fn round_trip(src: &str, dst: &str) {
        let interner = TypeInterner::new();
        let src = parse_sexpr(src, &interner).unwrap();
        let dst = parse_sexpr(dst, &interner).unwrap();

        for config in [
            MatchingConfig::greedy(),
            MatchingConfig::simple(),
            MatchingConfig::hybrid(),
        ] {
            let mappings = compute_matching(&src, &dst, &config);
            let raw = generate_edit_script(&src, &dst, &mappings);
            let replayed = raw.replay(&src, &dst).unwrap();
            assert!(
                replayed.is_structurally_equal(&dst),
                "{config:?}: got {}, want {}",
                replayed.display(&interner),
                dst.display(&interner)
            );

            let simplified = simplify_edit_script(raw, &src, &dst);
            let replayed = simplified.replay(&src, &dst).unwrap();
            assert!(replayed.is_structurally_equal(&dst), "{config:?} simplified");
        }
    }

    #[test]
    fn test_round_trip_mixed_changes() {
        round_trip(
            r#"(Block (Call (Id "f") (Id "x")) (Ret (Id "y")) (Dead (Lit "1")))"#,
            r#"(Block (Ret (Id "y")) (Call (Id "g") (Id "x") (Id "z")) (New (Args (Lit "2"))))"#,
        );
    }

    #[test]
    fn test_round_trip_root_replaced() {
        round_trip(r#"(CompilationUnit (Identifier "x"))"#, r#"(Identifier "x")"#);
    }

    #[test]
    fn test_round_trip_deep_move() {
        round_trip(
            r#"(File (Func (Body (If (Cond "c") (Call (Id "log") (Str "hi"))))) (Func (Body)))"#,
            r#"(File (Func (Body (If (Cond "c")))) (Func (Body (Call (Id "log") (Str "hi")))))"#,
        );
    }

    /// The fake root id scripts over `src` use: the first node allocated
    /// after a clone of its arena.
    fn fake_root_of(src: &Tree) -> NodeId {
        let mut scratch = src.arena.clone();
        scratch.new_node(NodeData::fake_root())
    }

    #[test]
    fn test_replay_errors() {
        let interner = TypeInterner::new();
        let src = parse_sexpr(r#"(Block (Id "a"))"#, &interner).unwrap();
        let dst = parse_sexpr(r#"(Block)"#, &interner).unwrap();
        let leaf = src.first_child(src.root).unwrap();
        let fake_root = fake_root_of(&src);

        let script = EditScript {
            actions: vec![Action::Delete { node: src.root }],
            fake_root,
        };
        assert_eq!(
            script.replay(&src, &dst).unwrap_err(),
            ReplayError::NotALeaf {
                index: 0,
                node: usize::from(src.root)
            }
        );

        let script = EditScript {
            actions: vec![Action::Move {
                node: leaf,
                dst: dst.root,
                parent: src.root,
                position: 3,
            }],
            fake_root,
        };
        assert!(matches!(
            script.replay(&src, &dst).unwrap_err(),
            ReplayError::PositionOutOfBounds { position: 3, len: 0, .. }
        ));

        let script = EditScript {
            actions: vec![Action::Move {
                node: src.root,
                dst: dst.root,
                parent: leaf,
                position: 0,
            }],
            fake_root,
        };
        assert!(matches!(
            script.replay(&src, &dst).unwrap_err(),
            ReplayError::MoveIntoOwnSubtree { index: 0, .. }
        ));
    }

    #[test]
    fn test_unknown_node() {
        let interner = TypeInterner::new();
        let src = parse_sexpr(r#"(Block (Id "a"))"#, &interner).unwrap();
        let dst = parse_sexpr(
            r#"(Block (Id "a") (Id "b") (Id "c") (Id "d"))"#,
            &interner,
        )
        .unwrap();
        let fake_root = fake_root_of(&src);
        let missing = dst.children(dst.root).nth(3).unwrap();

        // Only ids that exist in src (or were inserted) can be resolved.
        let script = EditScript {
            actions: vec![Action::Delete { node: missing }],
            fake_root,
        };
        assert!(matches!(
            script.replay(&src, &dst).unwrap_err(),
            ReplayError::UnknownNode { index: 0, .. }
        ));
    }

    #[test]
    fn test_replay_root_count() {
        let interner = TypeInterner::new();
        let src = parse_sexpr(r#"(Block (Id "a"))"#, &interner).unwrap();
        let dst = parse_sexpr(r#"(Block (Id "a"))"#, &interner).unwrap();
        let mappings = compute_matching(&src, &dst, &MatchingConfig::default());
        let mut script = generate_edit_script(&src, &dst, &mappings);
        script.actions.push(Action::TreeDelete { node: src.root });

        assert_eq!(
            script.replay(&src, &dst).unwrap_err(),
            ReplayError::RootCount(0)
        );
    }
}
