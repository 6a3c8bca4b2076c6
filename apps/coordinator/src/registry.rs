// [apps/coordinator/src/registry.rs]
//! Seeds a run's queue from its configured content sources the first
//! time a worker attaches.

use crate::errors::CoordinatorError;
use ingest_core_collaborators::ContentSource;
use ingest_domain_models::SourceType;
use ingest_infra_store::repositories::queue::EnqueueRequest;
use ingest_infra_store::QueueRepository;
use std::collections::{BTreeSet, HashMap};
use tracing::{info, instrument};

/// Enumerates every configured source and enqueues each document it
/// offers as a `configured`-type, depth-0 queue item. Enqueuing is
/// idempotent, so calling this more than once for the same run is
/// harmless — later workers just insert zero new rows.
#[instrument(skip(queue, sources))]
pub async fn seed_configured_sources(
    run_id: &str,
    queue: &QueueRepository,
    sources: &HashMap<String, Box<dyn ContentSource>>,
    default_max_link_depth: i64,
    default_max_retries: i64,
) -> Result<u64, CoordinatorError> {
    let mut seeded = 0u64;

    for source in sources.values() {
        let documents = source.enumerate().await?;
        info!(
            run_id,
            source = source.name(),
            documents = documents.len(),
            "enumerated content source"
        );

        for doc in documents {
            let inserted = queue
                .enqueue_document(EnqueueRequest {
                    run_id,
                    doc_id: &doc.doc_id,
                    source_name: source.name(),
                    source_type: SourceType::Configured,
                    parent_doc_id: None,
                    link_depth: 0,
                    max_link_depth: default_max_link_depth,
                    priority: 0,
                    max_retries: default_max_retries,
                    required_capabilities: &BTreeSet::new(),
                    scheduled_for: chrono::Utc::now(),
                    content_hash: None,
                })
                .await?;
            if inserted {
                seeded += 1;
            }
        }
    }

    Ok(seeded)
}
