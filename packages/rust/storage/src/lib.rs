//! Turso Embedded / libSQL storage layer.
//!
//! The [`Storage`] struct wraps a libSQL database holding finished stories,
//! the similarity-index embeddings, and run report history. The CLI is the
//! sole writer.
//!
//! Two adapters bridge storage into the pipeline's capability traits:
//! [`PersistentIndex`] (a hydrated in-memory index with write-through
//! persistence) and [`StoryPersister`] (the store stage's sink).

mod index;
mod migrations;
mod persister;

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use libsql::{Connection, Database, params};

use newsreel_shared::{EmbeddingRecord, LeadId, NewsreelError, Result, RunReport};

pub use index::PersistentIndex;
pub use persister::StoryPersister;

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

/// One persisted story row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryRecord {
    pub id: String,
    pub lead_id: LeadId,
    pub headline: Option<String>,
    pub text: String,
    pub script: String,
    pub research_notes: Option<String>,
    pub audio_url: Option<String>,
    pub audio_size_bytes: Option<u64>,
    pub anchor: Option<String>,
    pub source: String,
    pub category: Option<String>,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Storage {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| NewsreelError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| NewsreelError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| NewsreelError::Storage(e.to_string()))?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    NewsreelError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Story operations
    // -----------------------------------------------------------------------

    /// Insert a finished story. One row per lead; a second insert for the
    /// same lead is a storage error.
    pub async fn insert_story(&self, story: &StoryRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO stories (id, lead_id, headline, text, script, research_notes,
                                      audio_url, audio_size_bytes, anchor, source, category,
                                      content_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    story.id.as_str(),
                    story.lead_id.to_string(),
                    story.headline.as_deref(),
                    story.text.as_str(),
                    story.script.as_str(),
                    story.research_notes.as_deref(),
                    story.audio_url.as_deref(),
                    story.audio_size_bytes.map(|v| v as i64),
                    story.anchor.as_deref(),
                    story.source.as_str(),
                    story.category.as_deref(),
                    story.content_hash.as_str(),
                    story.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| NewsreelError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Stories created within the last `hours` hours, newest first.
    pub async fn recent_stories(&self, hours: i64) -> Result<Vec<StoryRecord>> {
        let cutoff = (Utc::now() - Duration::hours(hours)).to_rfc3339();
        let mut rows = self
            .conn
            .query(
                "SELECT id, lead_id, headline, text, script, research_notes,
                        audio_url, audio_size_bytes, anchor, source, category,
                        content_hash, created_at
                 FROM stories WHERE created_at >= ?1 ORDER BY created_at DESC",
                params![cutoff.as_str()],
            )
            .await
            .map_err(|e| NewsreelError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_story(&row)?);
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Embedding operations
    // -----------------------------------------------------------------------

    /// Persist one embedding (upserts by lead id).
    pub async fn save_embedding(&self, record: &EmbeddingRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO embeddings (lead_id, vector, inserted_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(lead_id) DO UPDATE SET
                   vector = excluded.vector,
                   inserted_at = excluded.inserted_at",
                params![
                    record.lead_id.to_string(),
                    encode_vector(&record.vector),
                    record.inserted_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| NewsreelError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Load every persisted embedding, e.g. to hydrate the in-memory index.
    pub async fn load_embeddings(&self) -> Result<Vec<EmbeddingRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT lead_id, vector, inserted_at FROM embeddings",
                params![],
            )
            .await
            .map_err(|e| NewsreelError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let lead_id: String = row
                .get(0)
                .map_err(|e| NewsreelError::Storage(e.to_string()))?;
            let blob: Vec<u8> = row
                .get(1)
                .map_err(|e| NewsreelError::Storage(e.to_string()))?;
            let inserted_at: String = row
                .get(2)
                .map_err(|e| NewsreelError::Storage(e.to_string()))?;

            results.push(EmbeddingRecord {
                lead_id: lead_id
                    .parse()
                    .map_err(|e| NewsreelError::Storage(format!("invalid lead id: {e}")))?,
                vector: decode_vector(&blob)?,
                inserted_at: parse_timestamp(&inserted_at)?,
            });
        }
        Ok(results)
    }

    /// Number of persisted embeddings.
    pub async fn embedding_count(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM embeddings", params![])
            .await
            .map_err(|e| NewsreelError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row
                    .get(0)
                    .map_err(|e| NewsreelError::Storage(e.to_string()))?;
                Ok(count as usize)
            }
            _ => Ok(0),
        }
    }

    // -----------------------------------------------------------------------
    // Run report operations
    // -----------------------------------------------------------------------

    /// Persist a finished run report.
    pub async fn insert_run_report(&self, report: &RunReport) -> Result<()> {
        let report_json = serde_json::to_string(report)
            .map_err(|e| NewsreelError::Storage(format!("serialize run report: {e}")))?;
        let outcome = if report.is_aborted() {
            "aborted"
        } else {
            "completed"
        };
        self.conn
            .execute(
                "INSERT INTO runs (id, outcome, report_json, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    report.run_id.to_string(),
                    outcome,
                    report_json.as_str(),
                    report.started_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| NewsreelError::Storage(e.to_string()))?;
        Ok(())
    }

    /// The most recent run report, if any runs have been recorded.
    pub async fn latest_run_report(&self) -> Result<Option<RunReport>> {
        let mut rows = self
            .conn
            .query(
                "SELECT report_json FROM runs ORDER BY created_at DESC LIMIT 1",
                params![],
            )
            .await
            .map_err(|e| NewsreelError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let json: String = row
                    .get(0)
                    .map_err(|e| NewsreelError::Storage(e.to_string()))?;
                let report = serde_json::from_str(&json)
                    .map_err(|e| NewsreelError::Storage(format!("parse run report: {e}")))?;
                Ok(Some(report))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(NewsreelError::Storage(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Row and vector codecs
// ---------------------------------------------------------------------------

/// Encode an f32 vector as a little-endian byte blob.
fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode a little-endian byte blob back into an f32 vector.
fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(NewsreelError::Storage(format!(
            "embedding blob length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| NewsreelError::Storage(format!("invalid date: {e}")))
}

fn row_to_story(row: &libsql::Row) -> Result<StoryRecord> {
    let lead_id: String = row
        .get(1)
        .map_err(|e| NewsreelError::Storage(e.to_string()))?;
    let created_at: String = row
        .get(12)
        .map_err(|e| NewsreelError::Storage(e.to_string()))?;

    Ok(StoryRecord {
        id: row
            .get::<String>(0)
            .map_err(|e| NewsreelError::Storage(e.to_string()))?,
        lead_id: lead_id
            .parse()
            .map_err(|e| NewsreelError::Storage(format!("invalid lead id: {e}")))?,
        headline: row.get::<String>(2).ok(),
        text: row
            .get::<String>(3)
            .map_err(|e| NewsreelError::Storage(e.to_string()))?,
        script: row
            .get::<String>(4)
            .map_err(|e| NewsreelError::Storage(e.to_string()))?,
        research_notes: row.get::<String>(5).ok(),
        audio_url: row.get::<String>(6).ok(),
        audio_size_bytes: row.get::<i64>(7).ok().map(|v| v as u64),
        anchor: row.get::<String>(8).ok(),
        source: row
            .get::<String>(9)
            .map_err(|e| NewsreelError::Storage(e.to_string()))?,
        category: row.get::<String>(10).ok(),
        content_hash: row
            .get::<String>(11)
            .map_err(|e| NewsreelError::Storage(e.to_string()))?,
        created_at: parse_timestamp(&created_at)?,
    })
}
