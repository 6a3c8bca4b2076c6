// [apps/coordinator/src/queue.rs]
//! Queue wrapper: turns the outbound links a `DocumentPipeline`
//! discovers into new queue items, applying the depth, priority and
//! capability-inheritance rules the store's plain `enqueue_document`
//! does not know about.

use crate::errors::CoordinatorError;
use chrono::Utc;
use ingest_core_collaborators::OutboundLink;
use ingest_domain_models::{DocumentDependency, LinkType, QueueItem, SourceType};
use ingest_infra_store::repositories::queue::EnqueueRequest;
use ingest_infra_store::{DependencyRepository, QueueRepository};
use tracing::{debug, instrument};

/// Records a dependency edge for every discovered link, then enqueues a
/// `linked`-type item one depth below its parent for each link within
/// `parent.max_link_depth` — links beyond the bound are recorded as
/// dependencies but not enqueued. `max_link_depth` is inherited
/// unchanged from parent to child; priority is the parent's minus one,
/// so depth-first dominance is avoided, and required capabilities are
/// inherited unchanged.
#[instrument(skip(queue, dependencies, links))]
pub async fn enqueue_discovered_links(
    queue: &QueueRepository,
    dependencies: &DependencyRepository,
    parent: &QueueItem,
    worker_id: &str,
    links: &[OutboundLink],
) -> Result<u64, CoordinatorError> {
    let next_depth = parent.link_depth + 1;
    let within_depth = next_depth <= parent.max_link_depth;
    if !within_depth {
        debug!(
            run_id = %parent.run_id,
            doc_id = %parent.doc_id,
            max_link_depth = parent.max_link_depth,
            "link discovery beyond max_link_depth: recording dependencies only"
        );
    }

    let mut enqueued = 0u64;
    for link in links {
        dependencies
            .record_dependency(&DocumentDependency {
                run_id: parent.run_id.clone(),
                parent_doc_id: parent.doc_id.clone(),
                child_doc_id: link.child_doc_id.clone(),
                source_name: link.source_name.clone(),
                link_type: LinkType::Discovered,
                link_depth: next_depth,
                discovered_at: Utc::now(),
                discovered_by_worker: worker_id.to_string(),
            })
            .await?;

        if !within_depth {
            continue;
        }

        let inserted = queue
            .enqueue_document(EnqueueRequest {
                run_id: &parent.run_id,
                doc_id: &link.child_doc_id,
                source_name: &link.source_name,
                source_type: SourceType::Linked,
                parent_doc_id: Some(&parent.doc_id),
                link_depth: next_depth,
                max_link_depth: parent.max_link_depth,
                priority: parent.priority - 1,
                max_retries: parent.max_retries,
                required_capabilities: &parent.required_capabilities,
                scheduled_for: Utc::now(),
                content_hash: None,
            })
            .await?;
        if inserted {
            enqueued += 1;
        }
    }
    Ok(enqueued)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_domain_models::{QueueItemStatus, SourceType as QueueSourceType};
    use ingest_infra_store::StoreClient;
    use std::collections::BTreeSet;

    fn parent_item(priority: i64, link_depth: i64, max_link_depth: i64) -> QueueItem {
        QueueItem {
            queue_id: 1,
            run_id: "run-1".to_string(),
            doc_id: "doc-1".to_string(),
            source_name: "docs".to_string(),
            source_type: QueueSourceType::Configured,
            status: QueueItemStatus::Processing,
            worker_id: Some("worker-a".to_string()),
            claimed_at: None,
            started_at: None,
            completed_at: None,
            failed_at: None,
            retry_count: 0,
            max_retries: 3,
            error_message: None,
            error_details: None,
            parent_doc_id: None,
            link_depth,
            max_link_depth,
            content_hash: None,
            last_modified: None,
            file_size: None,
            priority,
            scheduled_for: chrono::Utc::now(),
            required_capabilities: BTreeSet::new(),
        }
    }

    #[tokio::test]
    async fn within_depth_links_are_recorded_and_enqueued_with_priority_minus_one() {
        let store = StoreClient::connect(":memory:", None).await.unwrap();
        let queue = QueueRepository::new(store.connection().unwrap());
        let dependencies = DependencyRepository::new(store.connection().unwrap());
        let parent = parent_item(5, 0, 3);
        let links = vec![OutboundLink {
            child_doc_id: "doc-2".to_string(),
            source_name: "docs".to_string(),
        }];

        let enqueued = enqueue_discovered_links(&queue, &dependencies, &parent, "worker-a", &links).await.unwrap();
        assert_eq!(enqueued, 1);

        let children = dependencies.list_children("run-1", "doc-1").await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].child_doc_id, "doc-2");
        assert_eq!(children[0].link_type, LinkType::Discovered);

        let claimed = queue.claim_next("run-1", "worker-b", &BTreeSet::new()).await.unwrap().unwrap();
        assert_eq!(claimed.priority, 4);
    }

    #[tokio::test]
    async fn beyond_depth_links_are_recorded_but_not_enqueued() {
        let store = StoreClient::connect(":memory:", None).await.unwrap();
        let queue = QueueRepository::new(store.connection().unwrap());
        let dependencies = DependencyRepository::new(store.connection().unwrap());
        let parent = parent_item(0, 3, 3);
        let links = vec![OutboundLink {
            child_doc_id: "doc-2".to_string(),
            source_name: "docs".to_string(),
        }];

        let enqueued = enqueue_discovered_links(&queue, &dependencies, &parent, "worker-a", &links).await.unwrap();
        assert_eq!(enqueued, 0, "link beyond max_link_depth must not be enqueued");

        let children = dependencies.list_children("run-1", "doc-1").await.unwrap();
        assert_eq!(children.len(), 1, "the dependency edge is still recorded");

        assert!(queue.claim_next("run-1", "worker-b", &BTreeSet::new()).await.unwrap().is_none());
    }
}
