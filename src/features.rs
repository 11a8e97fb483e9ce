/// Expands `n` raw feature values into a `2n` vector.
///
/// The first `n` entries are the values themselves. Entry `n + i` is
/// `xs[i] - xs[i + 1]`, with the last one wrapping around to `xs[n - 1] - xs[0]`.
pub fn expand(xs: &[f64]) -> Vec<f64> {
    let n = xs.len();
    let mut expanded = Vec::with_capacity(n * 2);
    expanded.extend_from_slice(xs);
    expanded.extend((0..n).map(|i| xs[i] - xs[(i + 1) % n]));
    expanded
}
