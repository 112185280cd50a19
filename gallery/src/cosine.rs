/// Cosine similarity between two vectors.
///
/// Uses f64 intermediate precision. Returns 0.0 for zero vectors or
/// dimension mismatches; callers compare only equal-length embeddings.
pub fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot: f64 = 0.0;
    let mut na: f64 = 0.0;
    let mut nb: f64 = 0.0;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    let denom = na.sqrt() * nb.sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    (dot / denom).clamp(-1.0, 1.0) as f32
}

/// Normalizes a vector to unit length in-place. Zero vectors are left as-is.
pub fn l2_normalize(v: &mut [f32]) {
    let sum: f64 = v.iter().map(|&x| (x as f64) * (x as f64)).sum();
    let norm = sum.sqrt();
    if norm > 0.0 {
        let scale = (1.0 / norm) as f32;
        for x in v.iter_mut() {
            *x *= scale;
        }
    }
}

/// Arithmetic mean, or `None` for an empty iterator.
pub(crate) fn mean(values: impl IntoIterator<Item = f32>) -> Option<f32> {
    let mut sum: f64 = 0.0;
    let mut n = 0usize;
    for v in values {
        sum += v as f64;
        n += 1;
    }
    (n > 0).then(|| (sum / n as f64) as f32)
}
