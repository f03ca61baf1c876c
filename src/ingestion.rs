use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::database::Database;
use crate::errors::{GenerationError, PipelineError};
use crate::extract;
use crate::generator::ItemGenerator;
use crate::models::{CandidateItem, ContentUnit, DeckStatus, Document};

/// Pipeline tuning knobs; see `IngestionConfig` for the env-driven source.
#[derive(Debug, Clone)]
pub struct IngestionSettings {
    /// Units with less extracted text than this are skipped.
    pub min_unit_chars: usize,
    /// Upper bound on concurrently generating units.
    pub max_concurrent_units: usize,
    /// Per-unit model-call timeout; expiry is a unit failure.
    pub unit_timeout_secs: u64,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            min_unit_chars: extract::DEFAULT_MIN_UNIT_CHARS,
            max_concurrent_units: 4,
            unit_timeout_secs: 60,
        }
    }
}

/// Outcome telemetry for one pipeline run. `units_failed > 0` with a
/// `ready` deck is a partial-extraction run; all-zero counts are the valid
/// degenerate empty-document case.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    pub deck_id: Uuid,
    pub units_total: usize,
    pub units_failed: usize,
    pub items_committed: usize,
}

/// Handle returned to the ingest caller once the deck is claimed. The
/// pipeline itself runs in a background task; `completion` delivers the
/// final result for callers that want it and can simply be dropped by
/// fire-and-forget callers.
pub struct IngestionTicket {
    pub deck_id: Uuid,
    pub completion: oneshot::Receiver<Result<IngestionReport, PipelineError>>,
}

/// Orchestrates document → units → per-unit generation → bulk commit and
/// owns the deck's lifecycle status.
#[derive(Clone)]
pub struct IngestionPipeline {
    db: Database,
    generator: ItemGenerator,
    settings: IngestionSettings,
}

impl IngestionPipeline {
    pub fn new(db: Database, generator: ItemGenerator, settings: IngestionSettings) -> Self {
        Self {
            db,
            generator,
            settings,
        }
    }

    /// Accepts an ingestion run for a deck. Claims the deck with an atomic
    /// conditional update (at most one run in flight per deck), flips it
    /// to `generating`, and returns; generation and commit continue in a
    /// spawned task.
    pub async fn ingest(
        &self,
        deck_id: Uuid,
        document: Document,
    ) -> Result<IngestionTicket, PipelineError> {
        let claimed = self
            .db
            .try_begin_generation(deck_id)
            .await
            .map_err(PipelineError::Store)?;

        if !claimed {
            // Distinguish a missing deck from one that is already running.
            return match self.db.get_deck(deck_id).await.map_err(PipelineError::Store)? {
                Some(_) => Err(PipelineError::AlreadyGenerating(deck_id)),
                None => Err(PipelineError::DeckNotFound(deck_id)),
            };
        }

        info!(
            deck_id = %deck_id,
            filename = %document.filename,
            "Ingestion accepted, deck marked generating"
        );

        let (tx, rx) = oneshot::channel();
        let pipeline = self.clone();
        tokio::spawn(async move {
            let outcome = pipeline.run(deck_id, document).await;
            match &outcome {
                Ok(report) => {
                    info!(
                        deck_id = %deck_id,
                        units_total = report.units_total,
                        units_failed = report.units_failed,
                        items_committed = report.items_committed,
                        "Ingestion completed, deck ready"
                    );
                }
                Err(e) => {
                    error!(deck_id = %deck_id, error = %e, "Ingestion failed, deck marked error");
                    if let Err(status_err) = pipeline.db.set_deck_status(deck_id, DeckStatus::Error).await
                    {
                        error!(
                            deck_id = %deck_id,
                            error = %status_err,
                            "Failed to record error status for deck"
                        );
                    }
                }
            }
            // The receiver may have been dropped by a fire-and-forget caller.
            let _ = tx.send(outcome);
        });

        Ok(IngestionTicket {
            deck_id,
            completion: rx,
        })
    }

    async fn run(
        &self,
        deck_id: Uuid,
        document: Document,
    ) -> Result<IngestionReport, PipelineError> {
        // Extraction failure aborts before any generation starts.
        let units = extract::produce(&document, self.settings.min_unit_chars)?;
        let units_total = units.len();

        let results = self.generate_all(&units).await;

        let mut units_failed = 0usize;
        let mut candidates: Vec<CandidateItem> = Vec::new();
        for (index, result) in results {
            match result {
                Ok(unit_candidates) => candidates.extend(unit_candidates),
                Err(e) => {
                    // Unit-local failure: log and move on with the rest.
                    warn!(
                        deck_id = %deck_id,
                        unit_index = index,
                        error = %e,
                        "Unit generation failed, continuing without it"
                    );
                    units_failed += 1;
                }
            }
        }

        if candidates.is_empty() {
            info!(
                deck_id = %deck_id,
                units_total,
                units_failed,
                "Document produced no candidate items"
            );
        }

        let committed = self
            .db
            .insert_items_bulk(deck_id, &candidates)
            .await
            .map_err(PipelineError::Commit)?;

        self.db
            .set_deck_status(deck_id, DeckStatus::Ready)
            .await
            .map_err(PipelineError::Store)?;

        Ok(IngestionReport {
            deck_id,
            units_total,
            units_failed,
            items_committed: committed.len(),
        })
    }

    /// Runs the generator over all units with bounded parallelism.
    /// Completion order is irrelevant; results are re-sorted by unit index
    /// so the committed set is order-stable.
    async fn generate_all(
        &self,
        units: &[ContentUnit],
    ) -> Vec<(usize, Result<Vec<CandidateItem>, GenerationError>)> {
        let timeout = Duration::from_secs(self.settings.unit_timeout_secs);

        let mut results: Vec<(usize, Result<Vec<CandidateItem>, GenerationError>)> =
            stream::iter(units.iter().cloned())
                .map(|unit| {
                    let generator = self.generator.clone();
                    let timeout_secs = self.settings.unit_timeout_secs;
                    async move {
                        let result = match tokio::time::timeout(timeout, generator.generate(&unit))
                            .await
                        {
                            Ok(result) => result,
                            Err(_) => Err(GenerationError::Timeout(timeout_secs)),
                        };
                        (unit.index, result)
                    }
                })
                .buffer_unordered(self.settings.max_concurrent_units.max(1))
                .collect()
                .await;

        results.sort_by_key(|(index, _)| *index);
        results
    }
}
