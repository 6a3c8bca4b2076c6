// [apps/coordinator/src/worker_loop.rs]
//! The per-worker poll loop:
//!
//! ```text
//! loop:
//!     heartbeat()
//!     attempt_leader_election()
//!     advance_lifecycle()
//!     item = claim_next()
//!     if item is none:
//!         if run is terminal: break
//!         sleep(poll_interval)
//!         continue
//!     fetch -> process -> store artifacts -> enqueue discovered links
//!     complete_item() or fail_item()
//! ```

use crate::config::RuntimeSettings;
use crate::errors::CoordinatorError;
use crate::leader::LeaderElector;
use crate::lifecycle::LifecycleController;
use crate::queue::enqueue_discovered_links;
use ingest_core_collaborators::{ArtifactStore, ContentSource, DocumentPipeline, RelationshipDetector};
use ingest_domain_models::IngestionConfig;
use ingest_infra_store::{DependencyRepository, QueueRepository, RunRepository, StoreClient, WorkerRepository};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub struct WorkerLoop {
    pub store: StoreClient,
    pub settings: RuntimeSettings,
    pub sources: HashMap<String, Box<dyn ContentSource>>,
    pub pipeline: Box<dyn DocumentPipeline>,
    pub artifacts: Box<dyn ArtifactStore>,
    pub detector: Option<Box<dyn RelationshipDetector>>,
    pub capabilities: BTreeSet<String>,
}

impl WorkerLoop {
    /// Joins a run (creating it if this is the first worker to compute
    /// this config's fingerprint) and seeds its queue, then processes
    /// work until the run reaches a terminal status.
    #[instrument(skip(self, ingestion_config))]
    pub async fn run(&mut self, ingestion_config: &IngestionConfig) -> Result<(), CoordinatorError> {
        let fingerprint = ingest_core_fingerprint::fingerprint(&ingestion_config.snapshot)?;
        let run_id = fingerprint.run_id.clone();
        let worker_id = self.settings.worker_id.clone();

        let conn = self.store.connection()?;
        let runs = RunRepository::new(conn);
        runs.create_or_attach_run(&run_id, &fingerprint.config_hash, &ingestion_config.snapshot)
            .await?;
        runs.record_worker_joined(&run_id).await?;

        let conn = self.store.connection()?;
        let workers = WorkerRepository::new(conn);
        workers
            .register_worker(&run_id, &worker_id, &hostname(), std::process::id() as i64, env!("CARGO_PKG_VERSION"), &self.capabilities)
            .await?;

        let conn = self.store.connection()?;
        let queue = QueueRepository::new(conn);
        let seeded = crate::registry::seed_configured_sources(
            &run_id,
            &queue,
            &self.sources,
            self.settings.default_max_link_depth,
            self.settings.default_max_retries,
        )
        .await?;
        runs.increment_document_counters(&run_id, seeded as i64, 0, 0, 0).await?;
        debug!(run_id, seeded, "seeded queue from configured sources");

        let leader = LeaderElector::new(&run_id, &worker_id, self.settings.leader_lease_sec);
        let mut lifecycle = LifecycleController::new();

        info!(run_id, worker_id, "worker loop starting");

        loop {
            let conn = self.store.connection()?;
            let workers = WorkerRepository::new(conn);
            workers.heartbeat_worker(&run_id, &worker_id).await?;

            let conn = self.store.connection()?;
            let runs = RunRepository::new(conn);
            let is_leader = leader.attempt(&runs).await?;

            let conn = self.store.connection()?;
            let queue = QueueRepository::new(conn);
            let detector_ref = self.detector.as_deref();
            match lifecycle
                .advance(
                    &run_id,
                    &runs,
                    &queue,
                    &worker_id,
                    ingestion_config.snapshot.relationship_detection_enabled,
                    detector_ref,
                    is_leader,
                )
                .await
            {
                Ok(()) => {}
                Err(CoordinatorError::RunTerminal(_)) => {
                    info!(run_id, "run reached a terminal state, worker exiting");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }

            let claimed = queue.claim_next(&run_id, &worker_id, &self.capabilities).await?;
            let Some(item) = claimed else {
                tokio::time::sleep(Duration::from_millis(self.settings.poll_interval_ms)).await;
                continue;
            };

            debug!(run_id, doc_id = %item.doc_id, queue_id = item.queue_id, "claimed queue item");

            let outcome = self.process_one(&run_id, &worker_id, &item).await;

            let conn = self.store.connection()?;
            let queue = QueueRepository::new(conn);
            let conn = self.store.connection()?;
            let runs = RunRepository::new(conn);
            let conn = self.store.connection()?;
            let workers = WorkerRepository::new(conn);

            match outcome {
                Ok(processed) => {
                    queue.complete_item(item.queue_id, &worker_id, &processed.content_hash).await?;
                    runs.increment_document_counters(&run_id, processed.links_enqueued as i64, 1, 0, 0).await?;
                    workers.record_document_outcome(&run_id, &worker_id, 0, 1, 0, 0.0).await?;
                }
                Err(e) => {
                    warn!(run_id, doc_id = %item.doc_id, error = %e, "document processing failed");
                    let next_status = queue
                        .fail_item(item.queue_id, &e.to_string(), None, self.settings.backoff_base_sec, self.settings.backoff_cap_sec)
                        .await?;
                    if next_status == ingest_domain_models::QueueItemStatus::Failed {
                        runs.increment_document_counters(&run_id, 0, 0, 1, 0).await?;
                        workers.record_document_outcome(&run_id, &worker_id, 0, 0, 1, 0.0).await?;
                    } else {
                        runs.increment_document_counters(&run_id, 0, 0, 0, 1).await?;
                    }
                }
            }
        }
    }

    async fn process_one(
        &self,
        run_id: &str,
        worker_id: &str,
        item: &ingest_domain_models::QueueItem,
    ) -> Result<ProcessOutcome, CoordinatorError> {
        let source = self
            .sources
            .get(&item.source_name)
            .ok_or_else(|| CoordinatorError::PermanentSource(format!("unknown source {}", item.source_name)))?;

        let fetched = source.fetch(&item.doc_id).await?;
        let metadata = ingest_core_collaborators::DocumentMetadata {
            doc_id: item.doc_id.clone(),
            last_modified: fetched.last_modified,
            file_size: Some(fetched.size),
            extra: Default::default(),
        };

        let processed = self.pipeline.process(&item.doc_id, &fetched.bytes, &metadata).await?;

        self.artifacts.put_elements(&item.doc_id, &processed.elements).await.map_err(|e| CoordinatorError::Pipeline(e.0))?;
        self.artifacts.put_entities(&item.doc_id, &processed.entities).await.map_err(|e| CoordinatorError::Pipeline(e.0))?;

        let conn = self.store.connection()?;
        let queue = QueueRepository::new(conn);
        let conn = self.store.connection()?;
        let dependencies = DependencyRepository::new(conn);
        let links_enqueued =
            enqueue_discovered_links(&queue, &dependencies, item, worker_id, &processed.outbound_links).await?;

        let _ = run_id;
        Ok(ProcessOutcome {
            content_hash: processed.content_hash,
            links_enqueued,
        })
    }
}

struct ProcessOutcome {
    content_hash: String,
    links_enqueued: u64,
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown-host".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostname_falls_back_when_env_unset() {
        std::env::remove_var("HOSTNAME");
        assert_eq!(hostname(), "unknown-host");
    }
}
