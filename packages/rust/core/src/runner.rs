//! Generic per-lead stage executor with retry, timeout, and failure
//! containment.
//!
//! Every stage boundary goes through [`StageRunner::run`]: it applies a
//! transform to each lead independently, isolates per-lead failures, and
//! returns survivors in their original relative order plus a report entry.
//! A stage with zero successes does not abort here; that decision belongs to
//! the orchestrator.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use newsreel_shared::{
    ErrorKind, FailureRecord, Lead, RunnerConfig, Stage, StageError, StageReport,
};

/// Outcome of a successful transform attempt.
#[derive(Debug)]
pub enum StageVerdict {
    /// The lead advances to the next stage.
    Advance(Lead),
    /// The lead is filtered out as a valid non-failure outcome
    /// (e.g. classified as a duplicate). Counted as attempted but neither
    /// succeeded nor failed.
    Discard(Lead),
}

/// Result of running one stage over a batch.
#[derive(Debug)]
pub struct StageBatch {
    /// Survivors, in original relative order.
    pub kept: Vec<Lead>,
    /// Leads discarded by the transform (not failures).
    pub dropped: Vec<Lead>,
    pub report: StageReport,
    pub failures: Vec<FailureRecord>,
}

/// Executes one stage's transform over a batch with per-lead isolation.
pub struct StageRunner {
    options: RunnerConfig,
}

impl StageRunner {
    pub fn new(options: RunnerConfig) -> Self {
        Self { options }
    }

    /// Run `transform` over `leads` sequentially, in batch order.
    ///
    /// Sequential execution is required for deduplication (each lead must see
    /// earlier leads' index writes) and keeps the survivor order a stable
    /// filter of the input for every other stage.
    ///
    /// Failure policy per lead:
    /// - `Transient`/`Timeout`: retried up to `max_retries` with exponential
    ///   backoff, then recorded as a terminal failure.
    /// - `Validation`: terminal immediately.
    /// - `Capability`: terminal immediately, and short-circuits the remaining
    ///   batch — the unprocessed leads are recorded failed without attempts.
    pub async fn run<F, Fut>(&self, stage: Stage, leads: Vec<Lead>, transform: F) -> StageBatch
    where
        F: Fn(Lead) -> Fut,
        Fut: Future<Output = Result<StageVerdict, StageError>>,
    {
        let started = Instant::now();
        let attempted = leads.len();

        let mut kept = Vec::with_capacity(attempted);
        let mut dropped = Vec::new();
        let mut failures = Vec::new();

        let mut remaining = leads.into_iter();
        let mut dead_collaborator: Option<StageError> = None;

        while let Some(lead) = remaining.next() {
            let lead_id = lead.id;
            match self.attempt_lead(stage, lead, &transform).await {
                Ok(StageVerdict::Advance(lead)) => kept.push(lead),
                Ok(StageVerdict::Discard(lead)) => {
                    debug!(stage = %stage, lead_id = %lead.id, "lead filtered");
                    dropped.push(lead);
                }
                Err(err) => {
                    warn!(
                        stage = %stage,
                        lead_id = %lead_id,
                        kind = %err.kind,
                        error = %err.message,
                        "lead failed"
                    );
                    failures.push(FailureRecord {
                        lead_id: Some(lead_id),
                        stage,
                        kind: err.kind,
                        message: err.message.clone(),
                    });
                    if err.kind == ErrorKind::Capability {
                        dead_collaborator = Some(err);
                        break;
                    }
                }
            }
        }

        // A dead collaborator fails every unprocessed lead uniformly instead
        // of burning the retry budget lead by lead.
        if let Some(err) = dead_collaborator {
            for lead in remaining {
                failures.push(FailureRecord {
                    lead_id: Some(lead.id),
                    stage,
                    kind: ErrorKind::Capability,
                    message: format!("skipped, collaborator unavailable: {}", err.message),
                });
            }
        }

        let report = StageReport {
            stage,
            attempted,
            succeeded: kept.len(),
            failed: failures.len(),
            duration: started.elapsed(),
        };

        debug!(
            stage = %stage,
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            "stage complete"
        );

        StageBatch {
            kept,
            dropped,
            report,
            failures,
        }
    }

    /// Run the transform for one lead with timeout and retry.
    async fn attempt_lead<F, Fut>(
        &self,
        stage: Stage,
        lead: Lead,
        transform: &F,
    ) -> Result<StageVerdict, StageError>
    where
        F: Fn(Lead) -> Fut,
        Fut: Future<Output = Result<StageVerdict, StageError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            let outcome =
                match tokio::time::timeout(self.options.timeout(), transform(lead.clone())).await {
                    Ok(result) => result,
                    Err(_) => Err(StageError::timeout(format!(
                        "{stage} transform exceeded {}s deadline",
                        self.options.timeout_secs
                    ))),
                };

            match outcome {
                Ok(verdict) => return Ok(verdict),
                Err(err) if err.is_retryable() && attempt < self.options.max_retries => {
                    attempt += 1;
                    let delay = backoff(self.options.retry_base_delay(), attempt);
                    debug!(
                        stage = %stage,
                        lead_id = %lead.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err.message,
                        "retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Exponential backoff: base × 2^(attempt−1), doubling capped at 5.
fn backoff(base: Duration, attempt: u32) -> Duration {
    base * (1u32 << (attempt - 1).min(5))
}
