//! Longest common subsequence over index ranges.

/// Longest common subsequence of `0..len_a` and `0..len_b` under `eq`,
/// returned as matched index pairs in increasing order.
///
/// `eq` is evaluated exactly once per index pair.
pub(crate) fn lcs(
    len_a: usize,
    len_b: usize,
    mut eq: impl FnMut(usize, usize) -> bool,
) -> Vec<(usize, usize)> {
    if len_a == 0 || len_b == 0 {
        return Vec::new();
    }

    let cols = len_b + 1;
    let mut equal = vec![false; len_a * len_b];
    for i in 0..len_a {
        for j in 0..len_b {
            equal[i * len_b + j] = eq(i, j);
        }
    }

    // opt[i][j] = LCS length of a[i..] and b[j..]
    let mut opt = vec![0u32; (len_a + 1) * cols];
    for i in (0..len_a).rev() {
        for j in (0..len_b).rev() {
            opt[i * cols + j] = if equal[i * len_b + j] {
                opt[(i + 1) * cols + j + 1] + 1
            } else {
                opt[(i + 1) * cols + j].max(opt[i * cols + j + 1])
            };
        }
    }

    let mut pairs = Vec::with_capacity(opt[0] as usize);
    let (mut i, mut j) = (0, 0);
    while i < len_a && j < len_b {
        if equal[i * len_b + j] {
            pairs.push((i, j));
            i += 1;
            j += 1;
        } else if opt[(i + 1) * cols + j] >= opt[i * cols + j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    pairs
}
