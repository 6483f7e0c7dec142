//! Vector math shared by the embedder adapters, the in-memory index and the
//! classifier.

/// Norms below this are treated as zero.
const MIN_NORM: f32 = f32::EPSILON;

/// Compute L2 norm of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale `v` to unit length in place.
///
/// Returns `false` (and leaves `v` untouched) for a zero-norm vector.
pub fn normalize(v: &mut [f32]) -> bool {
    let norm = l2_norm(v);
    if norm < MIN_NORM {
        return false;
    }
    v.iter_mut().for_each(|x| *x /= norm);
    true
}

/// Dot product of two vectors of equal length.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Cosine similarity, normalizing both sides at comparison time.
///
/// Returns 0.0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a < MIN_NORM || norm_b < MIN_NORM {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}
