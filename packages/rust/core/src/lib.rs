//! Pipeline core: orchestration, stage execution, deduplication, and
//! curation.
//!
//! This crate owns the run loop and its policies; network and storage
//! collaborators are injected behind the [`capabilities`] traits.

pub mod capabilities;
pub mod curator;
pub mod dedup;
pub mod pipeline;
pub mod runner;

pub use capabilities::{
    AudioClip, Discoverer, ObjectStore, Persister, ProgressReporter, Researcher, SilentProgress,
    Voicer, Writer,
};
pub use curator::Curator;
pub use dedup::Deduplicator;
pub use pipeline::{Capabilities, run_pipeline};
pub use runner::{StageBatch, StageRunner, StageVerdict};
