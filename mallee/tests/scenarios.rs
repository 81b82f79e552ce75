//! End-to-end diff scenarios on small ASTs.

use facet_testhelpers::test;
use mallee::{Action, Diff, MatchingConfig, Tree, TypeInterner};

fn parse_pair(types: &TypeInterner, src: &str, dst: &str) -> (Tree, Tree) {
    (
        Tree::parse_sexpr(src, types).unwrap(),
        Tree::parse_sexpr(dst, types).unwrap(),
    )
}

fn all_configs() -> [MatchingConfig; 3] {
    [
        MatchingConfig::greedy(),
        MatchingConfig::simple(),
        MatchingConfig::hybrid(),
    ]
}

#[test]
fn test_renamed_operand_is_one_update() {
    let types = TypeInterner::new();
    let (src, dst) = parse_pair(
        &types,
        r#"(BinOp (Identifier "a") (Operator "+") (Identifier "b"))"#,
        r#"(BinOp (Identifier "a") (Operator "+") (Identifier "c"))"#,
    );
    let src_children: Vec<_> = src.children(src.root).collect();
    let dst_children: Vec<_> = dst.children(dst.root).collect();

    for config in all_configs() {
        let diff = Diff::compute(&src, &dst, &config);
        assert_eq!(diff.mappings.len(), 4);
        assert!(diff.mappings.has(src_children[0], dst_children[0]));
        assert!(diff.mappings.has(src_children[1], dst_children[1]));
        assert!(diff.mappings.has(src_children[2], dst_children[2]));

        assert_eq!(diff.script.len(), 1, "{:?}", diff.script.actions);
        match &diff.script.actions[0] {
            Action::Update {
                node,
                dst,
                old_label,
                new_label,
                retype,
            } => {
                assert_eq!(*node, src_children[2]);
                assert_eq!(*dst, dst_children[2]);
                assert_eq!(old_label.as_deref(), Some("b"));
                assert_eq!(new_label.as_deref(), Some("c"));
                assert_eq!(*retype, None);
            }
            other => panic!("expected an update, got {other}"),
        }

        let classes = &diff.classification;
        assert_eq!(classes.src_updated.len(), 1);
        assert!(classes.src_updated.contains(&src_children[2]));
        assert_eq!(classes.dst_updated.len(), 1);
        assert!(classes.dst_updated.contains(&dst_children[2]));
        assert!(classes.src_deleted.is_empty());
        assert!(classes.dst_inserted.is_empty());
        assert!(classes.src_moved.is_empty());
    }
}

#[test]
fn test_swapped_statements_are_one_move() {
    let types = TypeInterner::new();
    let (src, dst) = parse_pair(
        &types,
        r#"(StatementList
             (ExprStmt (Call (Identifier "open")))
             (Assign (Identifier "x") (Int "1"))
             (Return (Identifier "x")))"#,
        r#"(StatementList
             (ExprStmt (Call (Identifier "open")))
             (Return (Identifier "x"))
             (Assign (Identifier "x") (Int "1")))"#,
    );

    for config in all_configs() {
        let diff = Diff::compute(&src, &dst, &config);
        assert_eq!(diff.mappings.len(), src.node_count());
        for (a, b) in src.children(src.root).zip([0, 2, 1]) {
            let b = dst.children(dst.root).nth(b).unwrap();
            assert!(diff.mappings.has(a, b));
            for (x, y) in src.descendants(a).zip(dst.descendants(b)) {
                assert!(diff.mappings.has(x, y));
            }
        }

        assert_eq!(diff.script.count("move"), 1, "{:?}", diff.script.actions);
        assert_eq!(diff.script.len(), 1);
        let moved = diff.script.actions[0].node();
        assert_eq!(src.parent(moved), Some(src.root));
        assert_ne!(moved, src.first_child(src.root).unwrap());
    }
}

#[test]
fn test_root_type_change_deletes_leaf() {
    let types = TypeInterner::new();
    let (src, dst) = parse_pair(
        &types,
        r#"(CompilationUnit (Identifier "main"))"#,
        r#"(Module)"#,
    );
    let leaf = src.first_child(src.root).unwrap();

    for config in all_configs() {
        let diff = Diff::compute(&src, &dst, &config);
        assert_eq!(diff.mappings.len(), 1);
        assert!(diff.mappings.has(src.root, dst.root));
        assert!(!diff.mappings.is_src_mapped(leaf));

        assert_eq!(diff.script.len(), 2, "{:?}", diff.script.actions);
        assert!(matches!(
            diff.script.actions[0],
            Action::Update { node, retype: Some(kind), .. }
                if node == src.root && kind == dst.kind(dst.root)
        ));
        assert_eq!(diff.script.actions[1], Action::Delete { node: leaf });

        let replayed = diff.script.replay(&src, &dst).unwrap();
        assert!(replayed.is_structurally_equal(&dst));
        assert_eq!(
            replayed.display(&types).to_string(),
            dst.display(&types).to_string()
        );
    }
}

#[test]
fn test_identity_law() {
    let types = TypeInterner::new();
    let text = r#"(File
        (Function (Identifier "main")
          (Block
            (Let (Identifier "x") (Int "1"))
            (If (Identifier "x") (Block (Return (Identifier "x"))))
            (Return (Int "0")))))"#;
    let (src, dst) = parse_pair(&types, text, text);

    for config in all_configs() {
        let diff = Diff::compute(&src, &dst, &config);
        assert_eq!(diff.mappings.len(), src.node_count());
        for (a, b) in src.pre_order().zip(dst.pre_order()) {
            assert!(diff.mappings.has(a, b));
        }
        assert!(diff.script.is_empty());
        assert!(diff.simplified.is_empty());
        assert!(diff.classification.is_empty());
    }
}

#[test]
fn test_inserted_block_is_classified_whole() {
    let types = TypeInterner::new();
    let (src, dst) = parse_pair(
        &types,
        r#"(Block (Return (Identifier "x")))"#,
        r#"(Block (Log (String "returning")) (Return (Identifier "x")))"#,
    );
    let log = dst.first_child(dst.root).unwrap();

    let diff = Diff::compute(&src, &dst, &MatchingConfig::default());
    assert_eq!(diff.script.count("insert"), 2);
    assert_eq!(diff.simplified.len(), 1);
    assert!(matches!(
        diff.simplified.actions[0],
        Action::TreeInsert { dst, position: 0, .. } if dst == log
    ));
    assert_eq!(diff.classification.dst_inserted.len(), 2);
    assert!(diff.classification.dst_inserted.contains(&log));
}
