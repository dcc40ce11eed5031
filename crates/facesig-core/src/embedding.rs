//! Embedding math: L2 normalization, centroid aggregation, cosine similarity.
//!
//! Inputs and outputs are `f32`; every sum is accumulated in `f64` so that
//! rounding error does not compound across high-dimensional vectors.

use thiserror::Error;

/// Added to every norm before dividing, so an all-zero vector never divides by zero.
///
/// Match thresholds downstream were tuned with this exact floor; keep it fixed.
pub const EPSILON: f64 = 1e-10;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingError {
    #[error("embedding has no dimensions")]
    Empty,
    #[error("cannot build a centroid from zero samples")]
    EmptySet,
    #[error("dimension mismatch at index {index}: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        index: usize,
    },
}

/// L2-normalize a vector: `v_i / (sqrt(Σ v_i²) + ε)`.
///
/// An all-zero vector comes back as all zeros rather than a unit vector.
pub fn normalize(v: &[f32]) -> Result<Vec<f32>, EmbeddingError> {
    if v.is_empty() {
        return Err(EmbeddingError::Empty);
    }
    let wide: Vec<f64> = v.iter().map(|&x| x as f64).collect();
    Ok(scale_to_unit(&wide))
}

/// Mean of all vectors in `set`, then normalized.
///
/// Returns `Ok(None)` for an empty set. Every element must share the
/// dimensionality of the first one.
pub fn centroid<S: AsRef<[f32]>>(set: &[S]) -> Result<Option<Vec<f32>>, EmbeddingError> {
    if set.is_empty() {
        return Ok(None);
    }
    let dim = common_dimension(set)?;

    let mut sum = vec![0.0f64; dim];
    for v in set {
        for (acc, &x) in sum.iter_mut().zip(v.as_ref()) {
            *acc += x as f64;
        }
    }

    let count = set.len() as f64;
    for acc in sum.iter_mut() {
        *acc /= count;
    }

    Ok(Some(scale_to_unit(&sum)))
}

/// Cosine similarity `dot(a, b) / (||a|| · ||b|| + ε)`, approximately in [-1, 1].
pub fn cosine(a: &[f32], b: &[f32]) -> Result<f64, EmbeddingError> {
    if a.is_empty() || b.is_empty() {
        return Err(EmbeddingError::Empty);
    }
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
            index: 1,
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    Ok(dot / (norm_a.sqrt() * norm_b.sqrt() + EPSILON))
}

/// Normalize every vector independently, preserving order and count.
pub fn normalize_each<S: AsRef<[f32]>>(list: &[S]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if list.is_empty() {
        return Ok(Vec::new());
    }
    common_dimension(list)?;
    list.iter().map(|v| normalize(v.as_ref())).collect()
}

/// Dimensionality shared by every vector in a non-empty set.
fn common_dimension<S: AsRef<[f32]>>(set: &[S]) -> Result<usize, EmbeddingError> {
    let expected = set.first().map(|v| v.as_ref().len()).unwrap_or(0);
    if expected == 0 {
        return Err(EmbeddingError::Empty);
    }
    for (index, v) in set.iter().enumerate().skip(1) {
        let actual = v.as_ref().len();
        if actual != expected {
            return Err(EmbeddingError::DimensionMismatch {
                expected,
                actual,
                index,
            });
        }
    }
    Ok(expected)
}

fn scale_to_unit(values: &[f64]) -> Vec<f32> {
    let norm = values.iter().map(|x| x * x).sum::<f64>().sqrt() + EPSILON;
    values.iter().map(|x| (x / norm) as f32).collect()
}
