//! Durable similarity index: in-memory search, write-through persistence.
//!
//! Dedup must see every embedding from every previous run, so the index is
//! hydrated from the embeddings table on startup and each upsert is written
//! to storage before it is acknowledged. Queries never touch the database.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use newsreel_index::{IndexMatch, MemoryIndex, VectorIndex};
use newsreel_shared::{EmbeddingRecord, LeadId, StageError};

use crate::Storage;

/// A [`MemoryIndex`] backed by the embeddings table.
pub struct PersistentIndex {
    storage: Arc<Storage>,
    memory: MemoryIndex,
}

impl PersistentIndex {
    /// Hydrate the index from storage.
    pub async fn load(storage: Arc<Storage>, dimensions: usize) -> newsreel_shared::Result<Self> {
        let records = storage.load_embeddings().await?;
        let count = records.len();

        let memory = MemoryIndex::new(dimensions);
        memory
            .bulk_load(records)
            .map_err(|e| newsreel_shared::NewsreelError::Storage(e.to_string()))?;

        info!(embeddings = count, dimensions, "similarity index hydrated");
        Ok(Self { storage, memory })
    }

    /// Number of indexed embeddings.
    pub fn count(&self) -> usize {
        self.memory.count()
    }
}

#[async_trait]
impl VectorIndex for PersistentIndex {
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<IndexMatch>, StageError> {
        self.memory.query(vector, top_k, threshold).await
    }

    /// Persist first, then index. A lead acknowledged as unique must survive
    /// a crash, otherwise the next run would re-admit its duplicates.
    async fn upsert(&self, lead_id: LeadId, vector: Vec<f32>) -> Result<(), StageError> {
        // Reject bad vectors before the durable write so hydration never
        // sees an embedding the in-memory index would refuse.
        if vector.len() != self.memory.dimensions() {
            return Err(StageError::validation(format!(
                "dimension mismatch: expected {}, got {}",
                self.memory.dimensions(),
                vector.len()
            )));
        }
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm < f32::EPSILON {
            return Err(StageError::validation(
                "cannot index a zero-norm embedding",
            ));
        }

        let record = EmbeddingRecord {
            lead_id,
            vector,
            inserted_at: chrono::Utc::now(),
        };
        self.storage
            .save_embedding(&record)
            .await
            .map_err(|e| StageError::transient(format!("embedding persist failed: {e}")))?;
        self.memory.upsert(lead_id, record.vector).await
    }

    async fn len(&self) -> Result<usize, StageError> {
        Ok(self.memory.count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_storage;

    #[tokio::test]
    async fn upsert_survives_a_reload() {
        let storage = Arc::new(test_storage().await);
        let index = PersistentIndex::load(storage.clone(), 2).await.unwrap();
        assert_eq!(index.count(), 0);

        let id = LeadId::new();
        index.upsert(id, vec![1.0, 0.0]).await.unwrap();

        // Fresh hydration from the same storage sees the embedding
        let reloaded = PersistentIndex::load(storage, 2).await.unwrap();
        assert_eq!(reloaded.count(), 1);
        let hits = reloaded.query(&[1.0, 0.0], 5, 0.85).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].lead_id, id);
    }

    #[tokio::test]
    async fn invalid_vector_is_not_persisted() {
        let storage = Arc::new(test_storage().await);
        let index = PersistentIndex::load(storage.clone(), 2).await.unwrap();

        assert!(index.upsert(LeadId::new(), vec![0.0, 0.0]).await.is_err());
        assert!(index.upsert(LeadId::new(), vec![1.0, 0.0, 0.0]).await.is_err());
        assert_eq!(storage.embedding_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn queries_do_not_require_storage_roundtrips() {
        let storage = Arc::new(test_storage().await);
        let index = PersistentIndex::load(storage, 2).await.unwrap();
        index.upsert(LeadId::new(), vec![0.0, 1.0]).await.unwrap();

        let hits = index.query(&[1.0, 0.0], 5, 0.85).await.unwrap();
        assert!(hits.is_empty());
        assert_eq!(index.len().await.unwrap(), 1);
    }
}
