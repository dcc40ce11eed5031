//! facesig-core — Numeric post-processing for face embeddings and photo quality gating.
//!
//! Embedding math (normalization, centroids, cosine similarity) and a cheap
//! local-contrast blur heuristic. Everything here is pure and operates on
//! caller-owned buffers.

pub mod embedding;
pub mod matcher;
pub mod pixels;
pub mod quality;
pub mod types;

pub use embedding::EmbeddingError;
pub use matcher::{CosineMatcher, Matcher};
pub use pixels::{PixelBuffer, PixelBufferError};
pub use quality::{QualityConfig, QualityScore};
pub use types::{Embedding, MatchResult, SubjectSignature};
