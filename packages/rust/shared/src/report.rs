//! Per-run report types.
//!
//! The [`RunReport`] is the sole artifact a pipeline run is required to
//! produce, whatever the outcome. Its shape (stage tallies plus a flat
//! failure list) is the stable contract callers and monitors depend on, so
//! they can tell "ran, found nothing" apart from "crashed".

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorKind;
use crate::types::{LeadId, Stage};

/// Terminal state of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum RunOutcome {
    /// Every stage executed; the batch may still have shrunk to zero.
    Completed,
    /// A critical stage produced zero survivors; later stages never ran.
    Aborted { stage: Stage, reason: String },
}

/// Attempt/success/failure tallies for one stage of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    /// Leads fed into the stage.
    pub attempted: usize,
    /// Leads that advanced to the next stage.
    pub succeeded: usize,
    /// Leads that terminally failed. Filtered leads (duplicates, selection
    /// cuts) are neither succeeded nor failed.
    pub failed: usize,
    pub duration: Duration,
}

/// A terminal failure, with the stage and classified cause.
///
/// `lead_id` is `None` for whole-stage failures with no lead in hand, e.g.
/// a discovery call that returned an error before producing a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<LeadId>,
    pub stage: Stage,
    pub kind: ErrorKind,
    pub message: String,
}

/// The per-run record: one entry per executed stage plus terminal failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: RunOutcome,
    pub stages: Vec<StageReport>,
    pub failures: Vec<FailureRecord>,
}

impl RunReport {
    /// Start a fresh report at orchestration start.
    pub fn begin() -> Self {
        Self {
            run_id: Uuid::now_v7(),
            started_at: Utc::now(),
            finished_at: None,
            outcome: RunOutcome::Completed,
            stages: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Append one stage's tallies and its failure records.
    pub fn record_stage(&mut self, report: StageReport, failures: Vec<FailureRecord>) {
        self.stages.push(report);
        self.failures.extend(failures);
    }

    /// Finalize as completed.
    pub fn complete(&mut self) {
        self.outcome = RunOutcome::Completed;
        self.finished_at = Some(Utc::now());
    }

    /// Finalize as aborted at `stage`.
    pub fn abort(&mut self, stage: Stage, reason: impl Into<String>) {
        self.outcome = RunOutcome::Aborted {
            stage,
            reason: reason.into(),
        };
        self.finished_at = Some(Utc::now());
    }

    /// Look up the report entry for a stage, if it ran.
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// Whether the run aborted at a critical stage.
    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, RunOutcome::Aborted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_lifecycle() {
        let mut report = RunReport::begin();
        assert!(report.finished_at.is_none());

        report.record_stage(
            StageReport {
                stage: Stage::Discover,
                attempted: 5,
                succeeded: 5,
                failed: 0,
                duration: Duration::from_millis(120),
            },
            vec![],
        );
        report.complete();

        assert!(!report.is_aborted());
        assert_eq!(report.stage(Stage::Discover).unwrap().succeeded, 5);
        assert!(report.stage(Stage::Dedup).is_none());
        assert!(report.finished_at.is_some());
    }

    #[test]
    fn aborted_report_serializes_reason() {
        let mut report = RunReport::begin();
        report.abort(Stage::Dedup, "all 3 leads were duplicates");

        let json = serde_json::to_string(&report).expect("serialize");
        assert!(json.contains("aborted"));
        assert!(json.contains("all 3 leads were duplicates"));

        let parsed: RunReport = serde_json::from_str(&json).expect("deserialize");
        assert!(parsed.is_aborted());
    }
}
