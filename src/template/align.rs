//! Longest-common-subsequence alignment

/// Computes an LCS of two sequences as matched index pairs
///
/// Pairs are returned in increasing order of both indices. Among
/// alignments of equal length the one matching the earliest elements of
/// `a` is chosen, so the result is deterministic.
///
/// # Example
///
/// ```
/// use stencil::template::lcs_pairs;
///
/// let a = ["html", "body", "h1", "p"];
/// let b = ["html", "body", "nav", "p"];
/// assert_eq!(lcs_pairs(&a, &b), vec![(0, 0), (1, 1), (3, 3)]);
/// ```
pub fn lcs_pairs<T: PartialEq>(a: &[T], b: &[T]) -> Vec<(usize, usize)> {
    // A common prefix always belongs to the leftmost optimal alignment. A
    // common suffix does not: an earlier element of `a` may match it instead.
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();

    let mut pairs: Vec<(usize, usize)> = (0..prefix).map(|i| (i, i)).collect();
    pairs.extend(
        lcs_table_pairs(&a[prefix..], &b[prefix..])
            .into_iter()
            .map(|(i, j)| (i + prefix, j + prefix)),
    );
    pairs
}

/// Quadratic dynamic program over suffix lengths
fn lcs_table_pairs<T: PartialEq>(a: &[T], b: &[T]) -> Vec<(usize, usize)> {
    let (n, m) = (a.len(), b.len());
    if n == 0 || m == 0 {
        return Vec::new();
    }

    let width = m + 1;
    let mut table = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * width + j] = if a[i] == b[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let mut pairs = Vec::with_capacity(table[0] as usize);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            pairs.push((i, j));
            i += 1;
            j += 1;
        } else if table[i * width + j + 1] >= table[(i + 1) * width + j] {
            // Keep a[i] available for a later match in b
            j += 1;
        } else {
            i += 1;
        }
    }
    pairs
}
