//! Longest-common-substring similarity between junction sequences.

/// All longest common substrings of a pair of sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongestCommonSubstrings {
    /// Length of the longest contiguous shared run (0 if none).
    pub length: usize,
    /// Distinct substrings of that length, in order of their end position in `a`.
    pub substrings: Vec<Vec<u8>>,
}

/// Find every longest common substring (not subsequence) of `a` and `b`.
///
/// Bytes are compared exactly; callers lower-case sequences beforehand.
/// Uses an (|a|+1) x (|b|+1) table of match-run lengths, O(|a|·|b|) in time
/// and space, which is fine for junction sequences of a few hundred bases.
pub fn longest_common_substrings(a: &[u8], b: &[u8]) -> LongestCommonSubstrings {
    let n = a.len();
    let m = b.len();
    let cols = m + 1;

    // Flat run-length table: index = i * cols + j
    let mut runs = vec![0usize; (n + 1) * cols];
    let mut longest = 0usize;
    let mut ends: Vec<usize> = Vec::new(); // end positions in `a` of maximal runs

    for i in 1..=n {
        for j in 1..=m {
            if a[i - 1] != b[j - 1] {
                continue;
            }
            let run = runs[(i - 1) * cols + (j - 1)] + 1;
            runs[i * cols + j] = run;
            if run > longest {
                longest = run;
                ends.clear();
                ends.push(i);
            } else if run == longest {
                ends.push(i);
            }
        }
    }

    let mut substrings: Vec<Vec<u8>> = Vec::new();
    if longest > 0 {
        for end in ends {
            let sub = &a[end - longest..end];
            if !substrings.iter().any(|s| s.as_slice() == sub) {
                substrings.push(sub.to_vec());
            }
        }
    }

    LongestCommonSubstrings { length: longest, substrings }
}

/// Normalized overlap score: `2 * |LCS| / (|a| + |b|)`.
///
/// Returns 0.0 when both inputs are empty.
pub fn similarity_ratio(a: &[u8], b: &[u8]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 0.0;
    }
    let lcs = longest_common_substrings(a, b);
    (2 * lcs.length) as f64 / total as f64
}
