//! In-memory vector index with cosine similarity search.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use newsreel_shared::{EmbeddingRecord, LeadId, StageError};

use crate::traits::{IndexMatch, VectorIndex};

/// Errors from index math and bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("cannot store or search with a zero-norm vector")]
    ZeroNormVector,
}

impl From<IndexError> for StageError {
    fn from(err: IndexError) -> Self {
        StageError::validation(err.to_string())
    }
}

/// In-memory cosine-similarity index keyed by lead id.
///
/// Interior mutability (`RwLock`) keeps the [`VectorIndex`] trait methods on
/// `&self`; no lock is held across an await point.
pub struct MemoryIndex {
    entries: RwLock<HashMap<LeadId, EmbeddingRecord>>,
    dimensions: usize,
}

impl MemoryIndex {
    /// Create a new empty index expecting vectors of `dimensions` length.
    pub fn new(dimensions: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            dimensions,
        }
    }

    /// Expected embedding dimensions.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Insert or overwrite a record, validating dimensions and norm.
    pub fn insert(&self, lead_id: LeadId, vector: Vec<f32>) -> Result<(), IndexError> {
        self.validate(&vector)?;
        let record = EmbeddingRecord {
            lead_id,
            vector,
            inserted_at: Utc::now(),
        };
        self.entries
            .write()
            .expect("index lock poisoned")
            .insert(lead_id, record);
        Ok(())
    }

    /// Load previously persisted records, e.g. when hydrating from storage.
    pub fn bulk_load(&self, records: Vec<EmbeddingRecord>) -> Result<(), IndexError> {
        let mut entries = self.entries.write().expect("index lock poisoned");
        for record in records {
            if record.vector.len() != self.dimensions {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimensions,
                    got: record.vector.len(),
                });
            }
            entries.insert(record.lead_id, record);
        }
        Ok(())
    }

    /// Whether an entry exists for `lead_id`.
    pub fn contains(&self, lead_id: LeadId) -> bool {
        self.entries
            .read()
            .expect("index lock poisoned")
            .contains_key(&lead_id)
    }

    /// Number of indexed records.
    pub fn count(&self) -> usize {
        self.entries.read().expect("index lock poisoned").len()
    }

    /// Matches with similarity ≥ `threshold`, best first, truncated to `top_k`.
    pub fn search(
        &self,
        query: &[f32],
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<IndexMatch>, IndexError> {
        self.validate(query)?;
        let query_norm = l2_norm(query);

        let entries = self.entries.read().expect("index lock poisoned");
        let mut results: Vec<IndexMatch> = entries
            .values()
            .filter_map(|record| {
                let similarity = cosine_similarity(query, &record.vector, query_norm);
                // Inclusive comparison: an exact-threshold neighbor matches.
                (similarity >= threshold).then_some(IndexMatch {
                    lead_id: record.lead_id,
                    similarity,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k);

        Ok(results)
    }

    fn validate(&self, vector: &[f32]) -> Result<(), IndexError> {
        if vector.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: vector.len(),
            });
        }
        if l2_norm(vector) < f32::EPSILON {
            return Err(IndexError::ZeroNormVector);
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<IndexMatch>, StageError> {
        Ok(self.search(vector, top_k, threshold)?)
    }

    async fn upsert(&self, lead_id: LeadId, vector: Vec<f32>) -> Result<(), StageError> {
        Ok(self.insert(lead_id, vector)?)
    }

    async fn len(&self) -> Result<usize, StageError> {
        Ok(self.count())
    }
}

/// Compute L2 norm of a vector.
fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity with the query norm precomputed.
fn cosine_similarity(query: &[f32], target: &[f32], query_norm: f32) -> f32 {
    let target_norm = l2_norm(target);
    if target_norm < f32::EPSILON {
        return 0.0;
    }
    let dot: f32 = query.iter().zip(target.iter()).map(|(a, b)| a * b).sum();
    dot / (query_norm * target_norm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_contains() {
        let index = MemoryIndex::new(3);
        let id = LeadId::new();
        index.insert(id, vec![1.0, 0.0, 0.0]).unwrap();

        assert_eq!(index.count(), 1);
        assert!(index.contains(id));
        assert!(!index.contains(LeadId::new()));
    }

    #[test]
    fn insert_rejects_dimension_mismatch() {
        let index = MemoryIndex::new(3);
        let result = index.insert(LeadId::new(), vec![1.0, 0.0, 0.0, 0.0]);
        assert!(matches!(result, Err(IndexError::DimensionMismatch { .. })));
    }

    #[test]
    fn insert_rejects_zero_norm() {
        let index = MemoryIndex::new(3);
        let result = index.insert(LeadId::new(), vec![0.0, 0.0, 0.0]);
        assert!(matches!(result, Err(IndexError::ZeroNormVector)));
    }

    #[test]
    fn upsert_overwrites_existing_id() {
        let index = MemoryIndex::new(3);
        let id = LeadId::new();
        index.insert(id, vec![1.0, 0.0, 0.0]).unwrap();
        index.insert(id, vec![0.0, 1.0, 0.0]).unwrap();

        assert_eq!(index.count(), 1);
        let hits = index.search(&[0.0, 1.0, 0.0], 5, 0.9).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].lead_id, id);
    }

    #[test]
    fn search_orders_by_similarity_descending() {
        let index = MemoryIndex::new(3);
        let near = LeadId::new();
        let far = LeadId::new();
        index.insert(near, vec![1.0, 0.1, 0.0]).unwrap();
        index.insert(far, vec![0.0, 1.0, 0.0]).unwrap();

        let hits = index.search(&[1.0, 0.0, 0.0], 5, 0.0).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].lead_id, near);
        assert!(hits[0].similarity > hits[1].similarity);
    }

    #[test]
    fn search_threshold_is_inclusive() {
        let index = MemoryIndex::new(2);
        let id = LeadId::new();
        // 45° apart: similarity is exactly cos(45°) ≈ 0.7071
        index.insert(id, vec![1.0, 0.0]).unwrap();
        let query = [std::f32::consts::FRAC_1_SQRT_2, std::f32::consts::FRAC_1_SQRT_2];
        let similarity = {
            let hits = index.search(&query, 5, 0.0).unwrap();
            hits[0].similarity
        };

        let at_threshold = index.search(&query, 5, similarity).unwrap();
        assert_eq!(at_threshold.len(), 1, "exact-threshold neighbor must match");

        let above_threshold = index
            .search(&query, 5, similarity + 1e-4)
            .unwrap();
        assert!(above_threshold.is_empty());
    }

    #[test]
    fn search_truncates_to_top_k() {
        let index = MemoryIndex::new(3);
        for i in 0..10 {
            index
                .insert(LeadId::new(), vec![1.0, i as f32 * 0.01, 0.0])
                .unwrap();
        }

        let hits = index.search(&[1.0, 0.0, 0.0], 3, 0.0).unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn bulk_load_hydrates_records() {
        let index = MemoryIndex::new(3);
        let a = LeadId::new();
        let b = LeadId::new();
        index
            .bulk_load(vec![
                EmbeddingRecord {
                    lead_id: a,
                    vector: vec![1.0, 0.0, 0.0],
                    inserted_at: Utc::now(),
                },
                EmbeddingRecord {
                    lead_id: b,
                    vector: vec![0.0, 1.0, 0.0],
                    inserted_at: Utc::now(),
                },
            ])
            .unwrap();

        assert_eq!(index.count(), 2);
        assert!(index.contains(a));
        assert!(index.contains(b));
    }

    #[tokio::test]
    async fn trait_surface_roundtrip() {
        let index = MemoryIndex::new(3);
        let id = LeadId::new();

        VectorIndex::upsert(&index, id, vec![1.0, 0.0, 0.0])
            .await
            .unwrap();
        let hits = VectorIndex::query(&index, &[1.0, 0.0, 0.0], 5, 0.85)
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert!((hits[0].similarity - 1.0).abs() < 1e-5);
        assert_eq!(VectorIndex::len(&index).await.unwrap(), 1);
    }
}
