use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A fixed-length image embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Identifier of the model that produced the vector, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum EmbeddingError {
    #[error("embedding dimensions differ: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },
    #[error("embedding is empty")]
    Empty,
    #[error("embedding has zero norm")]
    ZeroNorm,
}

fn check_dimensions(a: &[f32], b: &[f32]) -> Result<(), EmbeddingError> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    if a.is_empty() {
        return Err(EmbeddingError::Empty);
    }
    Ok(())
}

/// Cosine similarity in [-1, 1]. Accumulates in f64.
pub fn cosine_similarity(a: &Embedding, b: &Embedding) -> Result<f32, EmbeddingError> {
    check_dimensions(&a.values, &b.values)?;

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.values.iter().zip(&b.values) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(EmbeddingError::ZeroNorm);
    }

    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())) as f32)
}

/// Euclidean distance between two embeddings.
pub fn euclidean_distance(a: &Embedding, b: &Embedding) -> Result<f32, EmbeddingError> {
    check_dimensions(&a.values, &b.values)?;

    let sum: f64 = a
        .values
        .iter()
        .zip(&b.values)
        .map(|(&x, &y)| {
            let diff = x as f64 - y as f64;
            diff * diff
        })
        .sum();

    Ok(sum.sqrt() as f32)
}

/// How the live embedding is compared with the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    /// Higher is closer; a value below the threshold is a mismatch.
    #[default]
    Cosine,
    /// Lower is closer; a value above the threshold is a mismatch.
    Euclidean,
}

impl SimilarityMetric {
    pub fn measure(self, reference: &Embedding, live: &Embedding) -> Result<f32, EmbeddingError> {
        match self {
            SimilarityMetric::Cosine => cosine_similarity(reference, live),
            SimilarityMetric::Euclidean => euclidean_distance(reference, live),
        }
    }

    pub fn is_mismatch(self, value: f32, threshold: f32) -> bool {
        match self {
            SimilarityMetric::Cosine => value < threshold,
            SimilarityMetric::Euclidean => value > threshold,
        }
    }
}

impl std::fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimilarityMetric::Cosine => f.write_str("cosine"),
            SimilarityMetric::Euclidean => f.write_str("euclidean"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(values: &[f32]) -> Embedding {
        Embedding::new(values.to_vec())
    }

    #[test]
    fn test_identical_vectors_have_similarity_one() {
        let a = emb(&[0.3, -0.2, 0.9]);
        let sim = cosine_similarity(&a, &a).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_orthogonal_vectors_have_similarity_zero() {
        let sim = cosine_similarity(&emb(&[1.0, 0.0]), &emb(&[0.0, 1.0])).unwrap();
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_similarity_is_scale_invariant() {
        let sim = cosine_similarity(&emb(&[1.0, 2.0, 3.0]), &emb(&[2.0, 4.0, 6.0])).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_opposite_vectors_have_similarity_minus_one() {
        let sim = cosine_similarity(&emb(&[1.0, -1.0]), &emb(&[-1.0, 1.0])).unwrap();
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let err = cosine_similarity(&emb(&[1.0, 0.0]), &emb(&[1.0])).unwrap_err();
        assert_eq!(err, EmbeddingError::DimensionMismatch { left: 2, right: 1 });
    }

    #[test]
    fn test_zero_norm_rejected() {
        let err = cosine_similarity(&emb(&[0.0, 0.0]), &emb(&[1.0, 0.0])).unwrap_err();
        assert_eq!(err, EmbeddingError::ZeroNorm);
    }

    #[test]
    fn test_empty_rejected() {
        let err = euclidean_distance(&emb(&[]), &emb(&[])).unwrap_err();
        assert_eq!(err, EmbeddingError::Empty);
    }

    #[test]
    fn test_euclidean_distance_known_geometry() {
        // 3-4-5 triangle
        let d = euclidean_distance(&emb(&[0.0, 0.0]), &emb(&[3.0, 4.0])).unwrap();
        assert!((d - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_metric_mismatch_direction() {
        assert!(SimilarityMetric::Cosine.is_mismatch(0.85, 0.9));
        assert!(!SimilarityMetric::Cosine.is_mismatch(0.9, 0.9));
        assert!(!SimilarityMetric::Cosine.is_mismatch(0.98, 0.9));

        assert!(SimilarityMetric::Euclidean.is_mismatch(1.2, 1.0));
        assert!(!SimilarityMetric::Euclidean.is_mismatch(1.0, 1.0));
        assert!(!SimilarityMetric::Euclidean.is_mismatch(0.3, 1.0));
    }
}
