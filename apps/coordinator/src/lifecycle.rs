// [apps/coordinator/src/lifecycle.rs]
//! Run lifecycle state machine:
//! `active -> processing_complete -> post_processing -> completed`,
//! with `failed`/`abandoned` as the other absorbing states.
//!
//! The queue can look drained for an instant while another worker is
//! between claiming and committing a new item, so a single empty
//! observation is not proof the run is done. This controller requires
//! two consecutive drained observations before acting — a strengthening of the naive
//! one-shot check that would otherwise be sufficient.

use crate::errors::CoordinatorError;
use ingest_core_collaborators::RelationshipDetector;
use ingest_domain_models::{QueueSummary, RunStatus};
use ingest_infra_store::{QueueRepository, RunRepository};
use tracing::{info, instrument, warn};

pub struct LifecycleController {
    consecutive_drained_observations: u32,
}

impl LifecycleController {
    pub fn new() -> Self {
        Self {
            consecutive_drained_observations: 0,
        }
    }

    /// Feeds one observation of the queue's drained-ness; returns `true`
    /// only once it has seen the queue drained twice in a row, resetting
    /// the counter on any non-drained observation.
    fn observe(&mut self, summary: &QueueSummary) -> bool {
        if summary.is_drained() {
            self.consecutive_drained_observations += 1;
        } else {
            self.consecutive_drained_observations = 0;
        }
        self.consecutive_drained_observations >= 2
    }

    /// Advances the run's lifecycle by one step if warranted: transitions
    /// `active -> processing_complete` once the queue is confirmed
    /// drained, then drives post-processing if relationship detection is
    /// enabled, otherwise completes the run directly. Only the current
    /// leader drives a transition; a non-leader still detects and
    /// reports a terminal run so it can exit its poll loop.
    #[instrument(skip(self, runs, queue, detector))]
    pub async fn advance(
        &mut self,
        run_id: &str,
        runs: &RunRepository,
        queue: &QueueRepository,
        worker_id: &str,
        relationship_detection_enabled: bool,
        detector: Option<&dyn RelationshipDetector>,
        is_leader: bool,
    ) -> Result<(), CoordinatorError> {
        let run = runs.get_run(run_id).await?;

        match run.status {
            RunStatus::Completed | RunStatus::Failed | RunStatus::Abandoned => {
                return Err(CoordinatorError::RunTerminal(run_id.to_string()));
            }
            _ if !is_leader => return Ok(()),
            RunStatus::Active => {
                let summary = queue.summarize_queue(run_id).await?;
                if self.observe(&summary) {
                    match runs.transition_run(run_id, RunStatus::Active, RunStatus::ProcessingComplete).await {
                        Ok(()) => info!(run_id, "queue drained, run moved to processing_complete"),
                        Err(ingest_infra_store::StoreError::Conflict(_)) => {
                            // another worker already advanced it; nothing to do
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            }
            RunStatus::ProcessingComplete => {
                if relationship_detection_enabled {
                    match runs.transition_run(run_id, RunStatus::ProcessingComplete, RunStatus::PostProcessing).await {
                        Ok(()) => info!(run_id, "run moved to post_processing"),
                        Err(ingest_infra_store::StoreError::Conflict(_)) => {}
                        Err(e) => return Err(e.into()),
                    }
                } else {
                    match runs.transition_run(run_id, RunStatus::ProcessingComplete, RunStatus::Completed).await {
                        Ok(()) => info!(run_id, "run completed (no post-processing configured)"),
                        Err(ingest_infra_store::StoreError::Conflict(_)) => {}
                        Err(e) => return Err(e.into()),
                    }
                }
            }
            RunStatus::PostProcessing => {
                let Some(detector) = detector else {
                    warn!(run_id, "run is post_processing but no RelationshipDetector is configured");
                    return Ok(());
                };
                if !runs.acquire_post_processing_lock(run_id, worker_id).await? {
                    // another worker already holds the post-processing lock
                    return Ok(());
                }
                let summary = detector.detect(run_id).await?;
                info!(run_id, relationships_written = summary.relationships_written, "post-processing complete");
                runs.transition_run(run_id, RunStatus::PostProcessing, RunStatus::Completed).await?;
            }
        }
        Ok(())
    }
}

impl Default for LifecycleController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(pending: i64, processing: i64, retry: i64) -> QueueSummary {
        QueueSummary {
            pending,
            processing,
            completed: 0,
            failed: 0,
            retry,
        }
    }

    #[test]
    fn requires_two_consecutive_drained_observations() {
        let mut controller = LifecycleController::new();
        assert!(!controller.observe(&summary(0, 0, 0)));
        assert!(controller.observe(&summary(0, 0, 0)));
    }

    #[test]
    fn a_non_drained_observation_resets_the_counter() {
        let mut controller = LifecycleController::new();
        assert!(!controller.observe(&summary(0, 0, 0)));
        assert!(!controller.observe(&summary(1, 0, 0)));
        assert!(!controller.observe(&summary(0, 0, 0)));
        assert!(controller.observe(&summary(0, 0, 0)));
    }

    #[tokio::test]
    async fn only_the_leader_advances_the_run_past_active() {
        use ingest_domain_models::{EmbeddingConfig, OntologyConfig, SourceConfig, StorageTarget};
        use ingest_infra_store::StoreClient;

        let snapshot = ingest_domain_models::ConfigSnapshot {
            sources: vec![SourceConfig {
                name: "docs".to_string(),
                source_type: "filesystem".to_string(),
                canonical_parameters: serde_json::json!({"root": "/docs"}),
            }],
            embedding: EmbeddingConfig {
                provider: "openai".to_string(),
                model: "text-embedding-3-large".to_string(),
                dimensions: 3072,
            },
            ontology: OntologyConfig {
                identifiers: vec!["core".to_string()],
                versions: vec!["1.0".to_string()],
            },
            relationship_detection_enabled: false,
            storage_target: StorageTarget {
                kind: "postgres".to_string(),
                identity: "test-artifacts".to_string(),
            },
        };

        let store = StoreClient::connect(":memory:", None).await.unwrap();
        let runs = RunRepository::new(store.connection().unwrap());
        runs.create_or_attach_run("run-1", "hash-1", &snapshot).await.unwrap();
        let queue = QueueRepository::new(store.connection().unwrap());

        let mut controller = LifecycleController::new();
        controller.advance("run-1", &runs, &queue, "worker-b", false, None, false).await.unwrap();
        controller.advance("run-1", &runs, &queue, "worker-b", false, None, false).await.unwrap();
        assert_eq!(runs.get_run("run-1").await.unwrap().status, RunStatus::Active, "a non-leader must not advance the run");

        controller.advance("run-1", &runs, &queue, "worker-a", false, None, true).await.unwrap();
        controller.advance("run-1", &runs, &queue, "worker-a", false, None, true).await.unwrap();
        assert_eq!(
            runs.get_run("run-1").await.unwrap().status,
            RunStatus::ProcessingComplete,
            "the leader advances the run once it observes two drained queues"
        );
    }
}
