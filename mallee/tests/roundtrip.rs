//! Roundtrip tests for tree diffing using datatest-stable.
//!
//! Each test case is a file in `tests/roundtrip-cases/` with format:
//! ```text
//! <source tree>
//! ===
//! <destination tree>
//! ```
//!
//! Trees use the s-expression notation. For every bottom-up strategy the
//! test verifies: replay(src, diff(src, dst)) == dst, for the raw and the
//! simplified script.

use mallee::{Diff, MatchingConfig, Tree, TypeInterner};
use std::path::Path;

fn run_roundtrip_test(path: &Path) -> datatest_stable::Result<()> {
    facet_testhelpers::setup();

    let content = std::fs::read_to_string(path)?;
    let parts: Vec<&str> = content.split("\n===\n").collect();

    if parts.len() != 2 {
        return Err(format!(
            "Test file must have exactly one '===' separator, found {} parts",
            parts.len()
        )
        .into());
    }

    let types = TypeInterner::new();
    let src = Tree::parse_sexpr(parts[0].trim(), &types)?;
    let dst = Tree::parse_sexpr(parts[1].trim(), &types)?;

    for config in [
        MatchingConfig::greedy(),
        MatchingConfig::simple(),
        MatchingConfig::hybrid(),
    ] {
        let diff = Diff::compute(&src, &dst, &config);

        for (which, script) in [("raw", &diff.script), ("simplified", &diff.simplified)] {
            let result = script
                .replay(&src, &dst)
                .map_err(|e| format!("{:?} {which} replay failed: {e}", config.bottom_up))?;
            if !result.is_structurally_equal(&dst) {
                return Err(format!(
                    "Roundtrip failed ({:?}, {which})!\nSrc: {}\nDst: {}\nResult: {}\nScript:\n{}",
                    config.bottom_up,
                    src.display(&types),
                    dst.display(&types),
                    result.display(&types),
                    script
                        .iter()
                        .map(|a| a.to_string())
                        .collect::<Vec<_>>()
                        .join("\n")
                )
                .into());
            }
        }

        for (a, b) in diff.mappings.pairs() {
            if a != src.root && src.kind(a) != dst.kind(b) {
                return Err(format!("{:?}: mapped nodes of different types", config.bottom_up).into());
            }
        }
    }

    Ok(())
}

datatest_stable::harness! {
    { test = run_roundtrip_test, root = "tests/roundtrip-cases", pattern = r".*\.sexp$" },
}
