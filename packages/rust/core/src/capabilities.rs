//! Capability traits the pipeline consumes.
//!
//! Implementations live in external crates (HTTP clients, storage). The
//! pipeline holds them as trait objects constructed once and injected at
//! startup, so tests can substitute fakes without global state. Every method
//! is a potential suspension point; cancellation is by the stage runner's
//! timeout only (a timed-out call is abandoned, not interrupted at the
//! provider).

use async_trait::async_trait;

use newsreel_shared::{Lead, RunReport, Stage, StageError, StageReport};

/// Finds new candidate leads from external sources.
#[async_trait]
pub trait Discoverer: Send + Sync {
    /// Produce the initial batch of discovered leads, each stamped with
    /// source and discovery timestamp.
    async fn discover(&self) -> Result<Vec<Lead>, StageError>;
}

/// Enriches a lead with research context.
#[async_trait]
pub trait Researcher: Send + Sync {
    /// Return the lead with `research_notes` filled.
    async fn enrich(&self, lead: Lead) -> Result<Lead, StageError>;
}

/// Turns a researched lead into a finished story script.
#[async_trait]
pub trait Writer: Send + Sync {
    /// Return the lead with `script` filled.
    async fn compose(&self, lead: Lead) -> Result<Lead, StageError>;
}

/// Synthesized audio plus the anchor voice that read it.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    /// On-air name of the anchor voice used.
    pub anchor: String,
}

impl AudioClip {
    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Converts a script into spoken audio.
#[async_trait]
pub trait Voicer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<AudioClip, StageError>;
}

/// Opaque CDN-style upload returning a public URL.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, bytes: &[u8]) -> Result<String, StageError>;
}

/// Persists a finished story, returning its storage id.
#[async_trait]
pub trait Persister: Send + Sync {
    async fn save(&self, lead: &Lead) -> Result<String, StageError>;
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for surfacing pipeline status to a driver (CLI).
pub trait ProgressReporter: Send + Sync {
    /// Called when a stage begins.
    fn phase(&self, stage: Stage);
    /// Called when a stage's tallies are final.
    fn stage_done(&self, report: &StageReport);
    /// Called once when the run finishes, completed or aborted.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _stage: Stage) {}
    fn stage_done(&self, _report: &StageReport) {}
    fn done(&self, _report: &RunReport) {}
}
