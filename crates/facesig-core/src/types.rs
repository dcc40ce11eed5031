use serde::{Deserialize, Serialize};

use crate::embedding::{self, EmbeddingError};

/// Face embedding vector as produced by the recognition model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
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

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// L2-normalized copy of this embedding.
    pub fn normalized(&self) -> Result<Embedding, EmbeddingError> {
        Ok(Embedding {
            values: embedding::normalize(&self.values)?,
            model_version: self.model_version.clone(),
        })
    }

    /// Cosine similarity in [-1, 1]. Higher = more similar.
    pub fn similarity(&self, other: &Embedding) -> Result<f32, EmbeddingError> {
        embedding::cosine(&self.values, &other.values).map(|s| s as f32)
    }

    /// Normalized mean of `samples`, or `None` when there are no samples.
    ///
    /// The centroid keeps the model version only when every sample agrees on it.
    pub fn centroid(samples: &[Embedding]) -> Result<Option<Embedding>, EmbeddingError> {
        let Some(values) = embedding::centroid(samples)? else {
            return Ok(None);
        };
        let model_version = samples
            .first()
            .and_then(|s| s.model_version.clone())
            .filter(|v| {
                samples
                    .iter()
                    .all(|s| s.model_version.as_deref() == Some(v.as_str()))
            });
        Ok(Some(Embedding {
            values,
            model_version,
        }))
    }

    /// Normalize a batch of samples before they are stored.
    pub fn normalize_each(samples: &[Embedding]) -> Result<Vec<Embedding>, EmbeddingError> {
        let normalized = embedding::normalize_each(samples)?;
        Ok(normalized
            .into_iter()
            .zip(samples)
            .map(|(values, s)| Embedding {
                values,
                model_version: s.model_version.clone(),
            })
            .collect())
    }
}

impl AsRef<[f32]> for Embedding {
    fn as_ref(&self) -> &[f32] {
        &self.values
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

/// Canonical signature of one enrolled subject: the centroid of its samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectSignature {
    pub id: String,
    pub label: String,
    pub centroid: Embedding,
    /// Number of samples the centroid was computed from.
    #[serde(default)]
    pub samples: usize,
}

impl SubjectSignature {
    /// Build a signature from raw samples. Call again whenever the sample set changes.
    pub fn from_samples(
        id: impl Into<String>,
        label: impl Into<String>,
        samples: &[Embedding],
    ) -> Result<Self, EmbeddingError> {
        let centroid = Embedding::centroid(samples)?.ok_or(EmbeddingError::EmptySet)?;
        Ok(Self {
            id: id.into(),
            label: label.into(),
            centroid,
            samples: samples.len(),
        })
    }
}

/// Result of matching a probe embedding against a gallery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub matched: bool,
    /// Cosine similarity of the best match [-1, 1].
    pub similarity: f32,
    /// ID of the matched subject (if any).
    pub subject_id: Option<String>,
    /// Label of the matched subject (if any).
    pub subject_label: Option<String>,
}

impl MatchResult {
    pub fn no_match(similarity: f32) -> Self {
        Self {
            matched: false,
            similarity,
            subject_id: None,
            subject_label: None,
        }
    }
}
