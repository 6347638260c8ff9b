//! Core domain types for the Newsreel pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// LeadId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for lead identifiers (time-sortable).
///
/// Assigned once at discovery; a lead keeps its id across every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeadId(pub Uuid);

impl LeadId {
    /// Generate a new time-sortable lead identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for LeadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LeadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for LeadId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// One transformation step in the fixed pipeline sequence.
///
/// Doubles as the tag on a [`Lead`] recording the last stage successfully
/// applied to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Discover,
    Dedup,
    Curate,
    Research,
    Write,
    Voice,
    Store,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 7] = [
        Stage::Discover,
        Stage::Dedup,
        Stage::Curate,
        Stage::Research,
        Stage::Write,
        Stage::Voice,
        Stage::Store,
    ];

    /// Stable lowercase name used in logs and reports.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Discover => "discover",
            Stage::Dedup => "dedup",
            Stage::Curate => "curate",
            Stage::Research => "research",
            Stage::Write => "write",
            Stage::Voice => "voice",
            Stage::Store => "store",
        }
    }

    /// Whether a zero-success outcome at this stage aborts the whole run.
    ///
    /// Discovery and deduplication are pipeline-critical: an empty batch out
    /// of either means there is nothing for any later stage to work on.
    /// Later stages merely shrink the batch.
    pub fn is_critical(self) -> bool {
        matches!(self, Stage::Discover | Stage::Dedup)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Lead
// ---------------------------------------------------------------------------

/// Stage-specific metadata accumulated by a lead as it moves through the
/// pipeline. Fields are additive: a stage fills its own fields and never
/// clears earlier ones, so full provenance is reconstructible at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadMetadata {
    /// Where the lead was discovered (e.g., "perplexity").
    pub source: String,
    /// Topic category reported by discovery, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Discovery timestamp; also the curation tie-breaker.
    pub discovered_at: DateTime<Utc>,
    /// Impact score assigned by curation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Id of the earlier lead this one duplicates, set by deduplication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<LeadId>,
    /// Research notes gathered for the lead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_notes: Option<String>,
    /// Finished story script produced by the writing stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    /// Name of the anchor voice used for synthesis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
    /// CDN URL of the synthesized audio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    /// Size of the synthesized audio in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_size_bytes: Option<u64>,
    /// Storage id assigned when the story was persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stored_id: Option<String>,
}

impl LeadMetadata {
    /// Metadata for a freshly discovered lead.
    pub fn discovered(source: impl Into<String>, category: Option<String>) -> Self {
        Self {
            source: source.into(),
            category,
            discovered_at: Utc::now(),
            score: None,
            duplicate_of: None,
            research_notes: None,
            script: None,
            anchor: None,
            audio_url: None,
            audio_size_bytes: None,
            stored_id: None,
        }
    }
}

/// A discovered candidate news unit tracked through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    /// Stable identifier, assigned at discovery, never changes.
    pub id: LeadId,
    /// Primary textual content, used for embedding and similarity.
    pub text: String,
    /// Additive stage-specific metadata.
    pub metadata: LeadMetadata,
    /// Last stage successfully applied.
    pub stage: Stage,
}

impl Lead {
    /// Construct a newly discovered lead.
    pub fn discovered(
        text: impl Into<String>,
        source: impl Into<String>,
        category: Option<String>,
    ) -> Self {
        Self {
            id: LeadId::new(),
            text: text.into(),
            metadata: LeadMetadata::discovered(source, category),
            stage: Stage::Discover,
        }
    }
}

// ---------------------------------------------------------------------------
// ScoredLead
// ---------------------------------------------------------------------------

/// A lead plus its curation score and 1-based rank.
///
/// Ephemeral: produced by the curator, consumed by the research stage within
/// a single run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredLead {
    pub lead: Lead,
    pub score: f64,
    pub rank: usize,
}

// ---------------------------------------------------------------------------
// EmbeddingRecord
// ---------------------------------------------------------------------------

/// A persisted embedding owned by the similarity index.
///
/// One record per lead ever indexed; duplicates are not re-indexed. Created
/// on first-seen unique lead, never mutated, removed only by an index-wide
/// reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub lead_id: LeadId,
    pub vector: Vec<f32>,
    pub inserted_at: DateTime<Utc>,
}
