//! Vector-similarity deduplication.
//!
//! Classifies each discovered lead as unique or duplicate against every
//! embedding ever indexed, including leads earlier in the same batch. The
//! algorithm is incremental/online: a unique lead's embedding is upserted
//! immediately, before the next lead is examined, so classification depends
//! on discovery order. This is the one stage where concurrent per-lead
//! execution is disallowed for correctness.

use tracing::debug;

use newsreel_index::{Embedder, VectorIndex};
use newsreel_shared::{DedupConfig, Lead, Stage, StageError};

use crate::runner::StageVerdict;

/// Partitions a batch into unique and duplicate leads using an embedder and
/// a similarity index.
pub struct Deduplicator<'a> {
    embedder: &'a dyn Embedder,
    index: &'a dyn VectorIndex,
    config: DedupConfig,
}

impl<'a> Deduplicator<'a> {
    pub fn new(
        embedder: &'a dyn Embedder,
        index: &'a dyn VectorIndex,
        config: DedupConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            config,
        }
    }

    /// Classify one lead against everything indexed so far.
    ///
    /// A nearest neighbor with similarity ≥ the configured threshold
    /// (inclusive) makes the lead a duplicate: its `duplicate_of` metadata is
    /// set to the matched lead and its embedding is NOT indexed. Otherwise
    /// the embedding is upserted before returning, so the next lead in the
    /// batch can match against it.
    pub async fn classify(&self, mut lead: Lead) -> Result<StageVerdict, StageError> {
        let vector = self.embedder.embed(&lead.text).await?;
        let matches = self
            .index
            .query(
                &vector,
                self.config.top_k,
                self.config.similarity_threshold,
            )
            .await?;

        if let Some(best) = matches.first() {
            debug!(
                lead_id = %lead.id,
                duplicate_of = %best.lead_id,
                similarity = best.similarity,
                threshold = self.config.similarity_threshold,
                "duplicate lead"
            );
            lead.metadata.duplicate_of = Some(best.lead_id);
            return Ok(StageVerdict::Discard(lead));
        }

        self.index.upsert(lead.id, vector).await?;
        lead.stage = Stage::Dedup;
        Ok(StageVerdict::Advance(lead))
    }
}
