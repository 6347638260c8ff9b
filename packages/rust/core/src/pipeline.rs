//! Pipeline orchestration.
//!
//! Runs the fixed stage sequence discover → dedup → curate → research →
//! write → voice → store over one batch of leads and always returns a
//! [`RunReport`], whatever happens. Discovery and deduplication are critical:
//! zero survivors out of either aborts the run. Later stages shrink the batch
//! and a stage left with nothing to do is recorded as attempted 0.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use newsreel_index::{Embedder, VectorIndex};
use newsreel_shared::{
    AppConfig, FailureRecord, Lead, RunReport, Stage, StageError, StageReport,
};

use crate::capabilities::{
    Discoverer, ObjectStore, Persister, ProgressReporter, Researcher, Voicer, Writer,
};
use crate::curator::Curator;
use crate::dedup::Deduplicator;
use crate::runner::{StageRunner, StageVerdict};

/// The collaborator set a pipeline run is wired with.
///
/// Constructed once at startup from config and injected; tests substitute
/// in-process fakes.
#[derive(Clone)]
pub struct Capabilities {
    pub discoverer: Arc<dyn Discoverer>,
    pub embedder: Arc<dyn Embedder>,
    pub index: Arc<dyn VectorIndex>,
    pub researcher: Arc<dyn Researcher>,
    pub writer: Arc<dyn Writer>,
    pub voicer: Arc<dyn Voicer>,
    pub object_store: Arc<dyn ObjectStore>,
    pub persister: Arc<dyn Persister>,
}

/// Execute one full pipeline run.
///
/// Never returns an error: every failure mode, including a discovery call
/// that produces nothing, ends in a finalized report. The caller decides what
/// to do with an aborted run.
pub async fn run_pipeline(
    config: &AppConfig,
    caps: &Capabilities,
    progress: &dyn ProgressReporter,
) -> RunReport {
    let mut report = RunReport::begin();
    let runner = StageRunner::new(config.runner.clone());

    info!(run_id = %report.run_id, "pipeline run started");

    // -- Discover ----------------------------------------------------------
    progress.phase(Stage::Discover);
    let started = Instant::now();
    let leads = match caps.discoverer.discover().await {
        Ok(leads) => {
            let stage_report = StageReport {
                stage: Stage::Discover,
                attempted: leads.len(),
                succeeded: leads.len(),
                failed: 0,
                duration: started.elapsed(),
            };
            progress.stage_done(&stage_report);
            report.record_stage(stage_report, vec![]);
            leads
        }
        Err(err) => {
            warn!(kind = %err.kind, error = %err.message, "discovery failed");
            let reason = format!("discovery failed: {}", err.message);
            let stage_report = StageReport {
                stage: Stage::Discover,
                attempted: 0,
                succeeded: 0,
                failed: 1,
                duration: started.elapsed(),
            };
            progress.stage_done(&stage_report);
            report.record_stage(
                stage_report,
                vec![FailureRecord {
                    lead_id: None,
                    stage: Stage::Discover,
                    kind: err.kind,
                    message: err.message,
                }],
            );
            report.abort(Stage::Discover, reason);
            progress.done(&report);
            return report;
        }
    };

    if leads.is_empty() {
        report.abort(Stage::Discover, "discovery produced no leads");
        progress.done(&report);
        return report;
    }
    info!(count = leads.len(), "leads discovered");

    // -- Dedup -------------------------------------------------------------
    progress.phase(Stage::Dedup);
    let dedup = Deduplicator::new(
        caps.embedder.as_ref(),
        caps.index.as_ref(),
        config.dedup.clone(),
    );
    let batch = runner
        .run(Stage::Dedup, leads, |lead| dedup.classify(lead))
        .await;
    if !batch.dropped.is_empty() {
        info!(duplicates = batch.dropped.len(), "duplicate leads filtered");
    }
    progress.stage_done(&batch.report);
    let empty = batch.kept.is_empty();
    report.record_stage(batch.report, batch.failures);
    if empty {
        report.abort(Stage::Dedup, "every discovered lead was a duplicate");
        progress.done(&report);
        return report;
    }
    let leads = batch.kept;

    // -- Curate ------------------------------------------------------------
    progress.phase(Stage::Curate);
    let curator = Curator::new(config.curation.clone());
    let batch = runner
        .run(Stage::Curate, leads, |mut lead| {
            let scored = curator.score(&lead);
            async move {
                lead.metadata.score = Some(scored?);
                lead.stage = Stage::Curate;
                Ok(StageVerdict::Advance(lead))
            }
        })
        .await;
    let selected = curator.rank_and_select(&batch.kept, config.curation.max_select);
    info!(
        scored = batch.kept.len(),
        selected = selected.len(),
        "leads curated"
    );
    // Leads cut by selection are filtered, not failed.
    let mut stage_report = batch.report;
    stage_report.succeeded = selected.len();
    progress.stage_done(&stage_report);
    report.record_stage(stage_report, batch.failures);
    let leads: Vec<Lead> = selected.into_iter().map(|s| s.lead).collect();

    // -- Research ----------------------------------------------------------
    progress.phase(Stage::Research);
    let researcher = &caps.researcher;
    let batch = runner
        .run(Stage::Research, leads, |lead| async move {
            let mut lead = researcher.enrich(lead).await?;
            lead.stage = Stage::Research;
            Ok(StageVerdict::Advance(lead))
        })
        .await;
    progress.stage_done(&batch.report);
    report.record_stage(batch.report, batch.failures);
    let leads = batch.kept;

    // -- Write -------------------------------------------------------------
    progress.phase(Stage::Write);
    let writer = &caps.writer;
    let batch = runner
        .run(Stage::Write, leads, |lead| async move {
            let mut lead = writer.compose(lead).await?;
            lead.stage = Stage::Write;
            Ok(StageVerdict::Advance(lead))
        })
        .await;
    progress.stage_done(&batch.report);
    report.record_stage(batch.report, batch.failures);
    let leads = batch.kept;

    // -- Voice -------------------------------------------------------------
    progress.phase(Stage::Voice);
    let voicer = &caps.voicer;
    let object_store = &caps.object_store;
    let batch = runner
        .run(Stage::Voice, leads, |mut lead| async move {
            let script = lead
                .metadata
                .script
                .clone()
                .ok_or_else(|| StageError::validation("lead reached voice with no script"))?;
            let clip = voicer.synthesize(&script).await?;
            let url = object_store.upload(&clip.bytes).await?;
            lead.metadata.anchor = Some(clip.anchor.clone());
            lead.metadata.audio_size_bytes = Some(clip.size_bytes());
            lead.metadata.audio_url = Some(url);
            lead.stage = Stage::Voice;
            Ok(StageVerdict::Advance(lead))
        })
        .await;
    progress.stage_done(&batch.report);
    report.record_stage(batch.report, batch.failures);
    let leads = batch.kept;

    // -- Store -------------------------------------------------------------
    progress.phase(Stage::Store);
    let persister = &caps.persister;
    let batch = runner
        .run(Stage::Store, leads, |mut lead| async move {
            // Tag the terminal stage before persisting so the stored record
            // reflects where the lead actually ended up.
            lead.stage = Stage::Store;
            let stored_id = persister.save(&lead).await?;
            lead.metadata.stored_id = Some(stored_id);
            Ok(StageVerdict::Advance(lead))
        })
        .await;
    progress.stage_done(&batch.report);
    report.record_stage(batch.report, batch.failures);

    report.complete();
    info!(
        run_id = %report.run_id,
        stories = report.stage(Stage::Store).map(|s| s.succeeded).unwrap_or(0),
        "pipeline run completed"
    );
    progress.done(&report);
    report
}
