//! Cosine similarity between embedding vectors

/// Calculate cosine similarity between two vectors
///
/// Returns 0.0 when the lengths differ, either vector is empty, or either
/// vector has zero magnitude. Degenerate inputs are non-matches, never errors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot_product = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot_product += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = dot_product / (norm_a.sqrt() * norm_b.sqrt());

    similarity.clamp(-1.0, 1.0) as f32
}
