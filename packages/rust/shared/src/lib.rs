//! Shared types, error model, and configuration for Newsreel.
//!
//! This crate is the foundation depended on by all other Newsreel crates.
//! It provides:
//! - [`NewsreelError`] / [`StageError`] — the unified error model
//! - Domain types ([`Lead`], [`Stage`], [`ScoredLead`], [`EmbeddingRecord`])
//! - Run reporting ([`RunReport`], [`StageReport`], [`FailureRecord`])
//! - Configuration ([`AppConfig`] and section structs, config loading)

pub mod config;
pub mod error;
pub mod report;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AnchorVoice, AppConfig, CdnConfig, CriteriaWeights, CurationConfig, DedupConfig,
    DefaultsConfig, DiscoveryConfig, OpenAiConfig, PerplexityConfig, RunnerConfig, config_dir,
    config_file_path, db_path, init_config, load_config, load_config_from, validate,
    validate_api_key,
};
pub use error::{ErrorKind, NewsreelError, Result, StageError};
pub use report::{FailureRecord, RunOutcome, RunReport, StageReport};
pub use types::{EmbeddingRecord, Lead, LeadId, LeadMetadata, ScoredLead, Stage};
