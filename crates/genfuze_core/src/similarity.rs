//! Vector similarity used to compare stored embeddings.

/// Cosine similarity of two vectors.
///
/// Returns 0.0 when the lengths differ, either side is empty, or either side has a
/// zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}

/// Maps a cosine similarity onto the 0..=100 accuracy scale shown on dashboards.
pub fn similarity_to_accuracy(similarity: f32) -> f64 {
    (similarity.clamp(0.0, 1.0) as f64 * 100.0 * 100.0).round() / 100.0
}
