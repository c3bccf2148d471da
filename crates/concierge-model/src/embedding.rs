//! Embedding vectors and cosine similarity

use serde::{Deserialize, Serialize};

/// Fixed-length embedding produced by the external embedding provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    #[inline]
    #[must_use]
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    #[inline]
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.0.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Cosine similarity against another embedding
    #[inline]
    #[must_use]
    pub fn cosine(&self, other: &Self) -> f64 {
        cosine_similarity(&self.0, &other.0)
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// Cosine similarity of two vectors
///
/// Returns 0.0 when the dimensions differ or either vector has zero norm, so a
/// malformed stored vector can never outrank a real match.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_score_one() {
        let e = Embedding::new(vec![0.3, 0.4, 0.5]);
        assert!((e.cosine(&e) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![0.0, 1.0]);
        assert!(a.cosine(&b).abs() < 1e-12);
    }

    #[test]
    fn mismatched_dimensions_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn zero_norm_scores_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn scale_invariant() {
        let a = cosine_similarity(&[1.0, 2.0, 3.0], &[2.0, 1.0, 0.5]);
        let b = cosine_similarity(&[10.0, 20.0, 30.0], &[2.0, 1.0, 0.5]);
        assert!((a - b).abs() < 1e-9);
    }
}
