//! Batch runner: fans records out over a bounded set of tokio tasks.
//!
//! Extraction is awaited inside each task; enrichment, normalization and
//! validation are synchronous and run on the blocking pool. A failing
//! record never stops the batch.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};

use super::ingestion::CardExtractor;
use super::metrics::PipelineMetrics;
use super::processing::enrich::EnrichmentOutcome;
use super::processing::quality_gate::Violation;
use super::reconcile::{Reconciler, Rejection};
use super::storage::{CardStore, PartialArtifact};
use crate::card::CanonicalCard;

/// Last stage a record reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Enrich,
    Normalize,
    Validate,
    Write,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Enrich => "enrich",
            Stage::Normalize => "normalize",
            Stage::Validate => "validate",
            Stage::Write => "write",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WrittenCard {
    pub source: String,
    pub stem: String,
    pub path: Option<PathBuf>,
    pub warnings: Vec<String>,
    pub enrichment: EnrichmentOutcome,
    pub card: CanonicalCard,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordFailure {
    pub source: String,
    pub stage: Stage,
    pub error: String,
    pub violations: Vec<Violation>,
    /// Partial artifact written for the record, if the store keeps files
    pub partial: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum RecordOutcome {
    Written(Box<WrittenCard>),
    Failed(RecordFailure),
}

impl RecordOutcome {
    pub fn source(&self) -> &str {
        match self {
            RecordOutcome::Written(card) => &card.source,
            RecordOutcome::Failed(failure) => &failure.source,
        }
    }
}

/// Per-record results, sorted by source
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub written: Vec<WrittenCard>,
    pub failed: Vec<RecordFailure>,
}

impl BatchSummary {
    fn from_outcomes(mut outcomes: Vec<RecordOutcome>) -> Self {
        outcomes.sort_by(|a, b| a.source().cmp(b.source()));
        let mut summary = Self::default();
        for outcome in outcomes {
            match outcome {
                RecordOutcome::Written(card) => summary.written.push(*card),
                RecordOutcome::Failed(failure) => summary.failed.push(failure),
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.written.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct BatchRunner {
    extractor: Arc<dyn CardExtractor>,
    reconciler: Arc<Reconciler>,
    store: Arc<dyn CardStore>,
    workers: usize,
}

impl BatchRunner {
    pub fn new(
        extractor: Arc<dyn CardExtractor>,
        reconciler: Arc<Reconciler>,
        store: Arc<dyn CardStore>,
        workers: usize,
    ) -> Self {
        Self {
            extractor,
            reconciler,
            store,
            workers: workers.max(1),
        }
    }

    /// Process every source and report per-record outcomes.
    pub async fn run(&self, sources: Vec<PathBuf>) -> BatchSummary {
        info!(
            "Processing {} record(s) with {} worker(s) via {}",
            sources.len(),
            self.workers,
            self.extractor.extractor_name()
        );
        let permits = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for source in sources {
            let permits = Arc::clone(&permits);
            let extractor = Arc::clone(&self.extractor);
            let reconciler = Arc::clone(&self.reconciler);
            let store = Arc::clone(&self.store);

            tasks.spawn(async move {
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return RecordOutcome::Failed(RecordFailure {
                            source: source.display().to_string(),
                            stage: Stage::Extract,
                            error: format!("worker pool closed: {}", e),
                            violations: Vec::new(),
                            partial: None,
                        })
                    }
                };

                let reached = Arc::new(Mutex::new(Stage::Extract));
                let record = tokio::spawn(process_record(
                    extractor,
                    reconciler,
                    Arc::clone(&store),
                    source.clone(),
                    Arc::clone(&reached),
                ));
                match record.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        let stage = *reached.lock().unwrap_or_else(|p| p.into_inner());
                        let artifact = PartialArtifact::new(
                            source.display().to_string(),
                            stage,
                            format!("record task failed: {}", e),
                        );
                        fail(store.as_ref(), artifact).await
                    }
                }
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!("Record task aborted: {}", e),
            }
        }

        let summary = BatchSummary::from_outcomes(outcomes);
        info!(
            "Batch finished: {} written, {} failed",
            summary.written.len(),
            summary.failed.len()
        );
        summary
    }
}

#[instrument(skip(extractor, reconciler, store, reached), fields(source = %source.display()))]
async fn process_record(
    extractor: Arc<dyn CardExtractor>,
    reconciler: Arc<Reconciler>,
    store: Arc<dyn CardStore>,
    source: PathBuf,
    reached: Arc<Mutex<Stage>>,
) -> RecordOutcome {
    let started = Instant::now();
    let source_id = source.display().to_string();

    let raw = match extractor.extract(&source).await {
        Ok(raw) => raw,
        Err(e) => {
            let artifact = PartialArtifact::new(&source_id, Stage::Extract, e.to_string());
            return fail(store.as_ref(), artifact).await;
        }
    };

    mark(&reached, Stage::Normalize);
    let image = extractor.image_for(&source);
    let raw_value = raw.to_value();
    let blocking_source = source.clone();
    let reconciled = tokio::task::spawn_blocking(move || {
        let mut merged = raw;
        let enrichment = reconciler.enrich(&blocking_source, &mut merged);
        let result = reconciler.reconcile(&merged, image.as_deref());
        (merged, enrichment, result)
    })
    .await;

    let (merged, enrichment, result) = match reconciled {
        Ok(parts) => parts,
        Err(e) => {
            let mut artifact =
                PartialArtifact::new(&source_id, Stage::Normalize, format!("normalization panicked: {}", e));
            artifact.raw = Some(raw_value);
            return fail(store.as_ref(), artifact).await;
        }
    };
    PipelineMetrics::record_enriched(enrichment.filled.len());

    let report = match result {
        Ok(report) => report,
        Err(rejection) => {
            PipelineMetrics::record_rejected(rejection.violations.len());
            let artifact = rejection_artifact(&source_id, rejection, Some(merged.into_value()));
            return fail(store.as_ref(), artifact).await;
        }
    };

    mark(&reached, Stage::Write);
    match store.store_card(&report.card).await {
        Ok(stored) => {
            PipelineMetrics::record_written(started.elapsed().as_secs_f64());
            RecordOutcome::Written(Box::new(WrittenCard {
                source: source_id,
                stem: stored.stem,
                path: stored.path,
                warnings: report.validation.warnings,
                enrichment,
                card: report.card,
            }))
        }
        Err(e) => {
            let mut artifact = PartialArtifact::new(&source_id, Stage::Write, e.to_string());
            artifact.raw = Some(raw_value);
            artifact.normalized = serde_json::to_value(&report.card).ok();
            fail(store.as_ref(), artifact).await
        }
    }
}

fn mark(reached: &Mutex<Stage>, stage: Stage) {
    *reached.lock().unwrap_or_else(|p| p.into_inner()) = stage;
}

fn rejection_artifact(source: &str, rejection: Rejection, merged: Option<serde_json::Value>) -> PartialArtifact {
    let mut artifact = PartialArtifact::new(source, Stage::Validate, rejection.to_string());
    artifact.violations = rejection.violations;
    artifact.raw = Some(rejection.raw);
    artifact.merged = merged;
    artifact.normalized = Some(rejection.normalized);
    artifact
}

async fn fail(store: &dyn CardStore, artifact: PartialArtifact) -> RecordOutcome {
    warn!("{} failed at {}: {}", artifact.source, artifact.stage, artifact.error);
    PipelineMetrics::record_failed(artifact.stage);

    let partial = match store.store_failure(&artifact).await {
        Ok(path) => path,
        Err(e) => {
            error!("Could not write partial output for {}: {}", artifact.source, e);
            None
        }
    };

    RecordOutcome::Failed(RecordFailure {
        source: artifact.source,
        stage: artifact.stage,
        error: artifact.error,
        violations: artifact.violations,
        partial,
    })
}
