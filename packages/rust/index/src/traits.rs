//! Capability traits for embedding and similarity search.

use async_trait::async_trait;
use newsreel_shared::{LeadId, StageError};

/// A nearest-neighbor hit from a similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMatch {
    pub lead_id: LeadId,
    /// Cosine similarity in [-1, 1]; near-identical text scores ≈ 1.0.
    pub similarity: f32,
}

/// Turns text into a fixed-length vector. External capability: implementations
/// call an embedding provider; the deduplicator only consumes the contract.
///
/// The trait is async to support remote APIs; failures are classified
/// [`StageError`]s so the stage runner can apply its retry policy to them.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text. Deterministic for identical input, modulo
    /// provider nondeterminism which callers must tolerate.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, StageError>;

    /// Expected dimensionality of produced vectors.
    fn dimensions(&self) -> usize;
}

/// Stores embeddings keyed by lead id and answers nearest-neighbor queries.
///
/// The index is the only resource mutated across run boundaries: its content
/// accumulates history so later runs deduplicate against everything ever
/// indexed.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return matches with similarity ≥ `threshold`, best first, at most
    /// `top_k`. Empty when nothing clears the threshold.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<IndexMatch>, StageError>;

    /// Insert or overwrite the embedding for `lead_id`. Idempotent.
    async fn upsert(&self, lead_id: LeadId, vector: Vec<f32>) -> Result<(), StageError>;

    /// Number of indexed records.
    async fn len(&self) -> Result<usize, StageError>;
}
