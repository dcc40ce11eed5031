//! Gallery matching on top of cosine similarity.

use crate::embedding::EmbeddingError;
use crate::types::{Embedding, MatchResult, SubjectSignature};

/// Strategy for comparing a probe embedding against a gallery of enrolled subjects.
pub trait Matcher {
    fn compare(
        &self,
        probe: &Embedding,
        gallery: &[SubjectSignature],
        threshold: f32,
    ) -> Result<MatchResult, EmbeddingError>;
}

/// Cosine similarity matcher with constant-time gallery traversal.
///
/// Well-formed galleries are iterated in full, with no early exit on a good
/// match. A dimension mismatch aborts the comparison with an error. Entries
/// whose similarity is NaN never match; if nothing else scores, the NaN is
/// reported back as the similarity.
pub struct CosineMatcher;

impl Matcher for CosineMatcher {
    fn compare(
        &self,
        probe: &Embedding,
        gallery: &[SubjectSignature],
        threshold: f32,
    ) -> Result<MatchResult, EmbeddingError> {
        let mut best_sim = f32::NEG_INFINITY;
        let mut best_idx: Option<usize> = None;
        let mut saw_nan = false;

        for (i, subject) in gallery.iter().enumerate() {
            let sim = probe
                .similarity(&subject.centroid)
                .map_err(|e| match e {
                    EmbeddingError::DimensionMismatch {
                        expected, actual, ..
                    } => EmbeddingError::DimensionMismatch {
                        expected,
                        actual,
                        index: i,
                    },
                    other => other,
                })?;
            if sim.is_nan() {
                saw_nan = true;
                continue;
            }
            if sim > best_sim {
                best_sim = sim;
                best_idx = Some(i);
            }
        }

        tracing::debug!(
            gallery = gallery.len(),
            best = best_sim,
            threshold,
            "cosine match"
        );

        Ok(match best_idx {
            Some(idx) if best_sim >= threshold => MatchResult {
                matched: true,
                similarity: best_sim,
                subject_id: Some(gallery[idx].id.clone()),
                subject_label: Some(gallery[idx].label.clone()),
            },
            Some(_) => MatchResult::no_match(best_sim),
            None if saw_nan => MatchResult::no_match(f32::NAN),
            None => MatchResult::no_match(0.0),
        })
    }
}
