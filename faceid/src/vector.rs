//! Dense vector math shared by the matcher and the clusterer.
//!
//! All accumulation uses f64 intermediates; inputs and outputs stay f32.

/// Cosine similarity between two vectors.
///
/// Returns 0 when either vector has zero length. Vectors of different
/// lengths are compared over the shorter prefix.
pub fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    let mut dot: f64 = 0.0;
    let mut na: f64 = 0.0;
    let mut nb: f64 = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let ai = x as f64;
        let bi = y as f64;
        dot += ai * bi;
        na += ai * ai;
        nb += bi * bi;
    }
    let denom = na.sqrt() * nb.sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    (dot / denom) as f32
}

/// Euclidean distance between two vectors.
pub fn euclidean(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Arithmetic mean of a set of vectors. Not re-normalized.
///
/// The result has the length of the longest input; shorter inputs
/// contribute zeros to the missing tail. Returns an empty vector for an
/// empty set.
pub fn mean(vectors: &[Vec<f32>]) -> Vec<f32> {
    let dim = vectors.iter().map(Vec::len).max().unwrap_or(0);
    if vectors.is_empty() || dim == 0 {
        return Vec::new();
    }
    let mut acc = vec![0.0f64; dim];
    for v in vectors {
        for (slot, &x) in acc.iter_mut().zip(v.iter()) {
            *slot += x as f64;
        }
    }
    let n = vectors.len() as f64;
    acc.into_iter().map(|x| (x / n) as f32).collect()
}
