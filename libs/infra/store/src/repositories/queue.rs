// [libs/infra/store/src/repositories/queue.rs]
//! `QueueItem` persistence: enqueue, claim, complete, fail and reclaim.
//!
//! libSQL serializes writers, so an `UPDATE ... WHERE status = ...`
//! guard clause stands in for `SELECT ... FOR UPDATE SKIP LOCKED`: a
//! claim only succeeds if the guard clause still matches at write time.

use crate::errors::StoreError;
use crate::parse_optional_timestamp;
use chrono::{DateTime, Utc};
use ingest_domain_models::{QueueItem, QueueItemStatus, QueueSummary, SourceType};
use libsql::{params, Connection, Row};
use std::collections::BTreeSet;
use tracing::{instrument, warn};

const SELECT_COLUMNS: &str = "queue_id, run_id, doc_id, source_name, source_type, status, \
     worker_id, claimed_at, started_at, completed_at, failed_at, retry_count, max_retries, \
     error_message, error_details, parent_doc_id, link_depth, max_link_depth, content_hash, \
     last_modified, file_size, priority, scheduled_for, required_capabilities";

/// Parameters for enqueuing one document, grouped to keep the call site
/// from becoming an unreadable wall of positional arguments.
pub struct EnqueueRequest<'a> {
    pub run_id: &'a str,
    pub doc_id: &'a str,
    pub source_name: &'a str,
    pub source_type: SourceType,
    pub parent_doc_id: Option<&'a str>,
    pub link_depth: i64,
    pub max_link_depth: i64,
    pub priority: i64,
    pub max_retries: i64,
    pub required_capabilities: &'a BTreeSet<String>,
    pub scheduled_for: DateTime<Utc>,
    /// Content hash observed by the caller, if already known (e.g. a
    /// re-discovered link). Used only to detect whether a previously
    /// `completed` row needs reopening; absent on first discovery.
    pub content_hash: Option<&'a str>,
}

pub struct QueueRepository {
    conn: Connection,
}

impl QueueRepository {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Idempotent on `(run_id, doc_id, source_name)`; returns `true` if a
    /// new row was inserted, or if an existing `completed` row was
    /// reopened because `req.content_hash` differs from the stored hash.
    #[instrument(skip(self, req))]
    pub async fn enqueue_document(&self, req: EnqueueRequest<'_>) -> Result<bool, StoreError> {
        let capabilities_json = serde_json::to_string(req.required_capabilities)
            .map_err(|e| StoreError::Mapping(format!("capabilities serialize: {e}")))?;

        let affected = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO queue_items (run_id, doc_id, source_name, source_type, \
                 status, parent_doc_id, link_depth, max_link_depth, priority, max_retries, \
                 required_capabilities, scheduled_for) \
                 VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    req.run_id,
                    req.doc_id,
                    req.source_name,
                    req.source_type.as_str(),
                    req.parent_doc_id,
                    req.link_depth,
                    req.max_link_depth,
                    req.priority,
                    req.max_retries,
                    capabilities_json,
                    req.scheduled_for.to_rfc3339(),
                ],
            )
            .await?;
        if affected > 0 {
            return Ok(true);
        }

        let Some(observed_hash) = req.content_hash else {
            return Ok(false);
        };

        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM queue_items \
             WHERE run_id = ?1 AND doc_id = ?2 AND source_name = ?3"
        );
        let mut rows = self
            .conn
            .query(&sql, params![req.run_id, req.doc_id, req.source_name])
            .await?;
        let Some(row) = rows.next().await? else {
            return Ok(false);
        };
        let existing = map_row(&row)?;
        if existing.status != QueueItemStatus::Completed {
            return Ok(false);
        }
        if existing.content_hash.as_deref() == Some(observed_hash) {
            return Ok(false);
        }

        let reopened = self
            .conn
            .execute(
                "UPDATE queue_items SET status = 'pending', worker_id = NULL, claimed_at = NULL, \
                 started_at = NULL, completed_at = NULL, retry_count = 0, scheduled_for = ?1 \
                 WHERE queue_id = ?2 AND status = 'completed'",
                params![req.scheduled_for.to_rfc3339(), existing.queue_id],
            )
            .await?;
        Ok(reopened > 0)
    }

    /// Claims the highest-priority, earliest-queued claimable item whose
    /// capability requirements `worker_capabilities` satisfies. Scans a
    /// bounded candidate window rather than every pending row, then wins
    /// the race with a guarded per-row `UPDATE`.
    #[instrument(skip(self, worker_capabilities))]
    pub async fn claim_next(
        &self,
        run_id: &str,
        worker_id: &str,
        worker_capabilities: &BTreeSet<String>,
    ) -> Result<Option<QueueItem>, StoreError> {
        let now = Utc::now();
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM queue_items \
             WHERE run_id = ?1 AND status IN ('pending', 'retry') AND scheduled_for <= ?2 \
             ORDER BY priority DESC, scheduled_for ASC, queue_id ASC LIMIT 50"
        );
        let mut rows = self.conn.query(&sql, params![run_id, now.to_rfc3339()]).await?;

        let mut candidates = Vec::new();
        while let Some(row) = rows.next().await? {
            candidates.push(map_row(&row)?);
        }

        for candidate in candidates {
            if !candidate.required_capabilities.is_subset(worker_capabilities) {
                continue;
            }
            let affected = self
                .conn
                .execute(
                    "UPDATE queue_items SET status = 'processing', worker_id = ?1, \
                     claimed_at = ?2, started_at = ?2 \
                     WHERE queue_id = ?3 AND status IN ('pending', 'retry')",
                    params![worker_id, now.to_rfc3339(), candidate.queue_id],
                )
                .await?;
            if affected > 0 {
                let mut claimed = candidate;
                claimed.status = QueueItemStatus::Processing;
                claimed.worker_id = Some(worker_id.to_string());
                claimed.claimed_at = Some(now);
                claimed.started_at = Some(now);
                return Ok(Some(claimed));
            }
            // Another worker won the race for this row; try the next candidate.
        }
        Ok(None)
    }

    #[instrument(skip(self))]
    pub async fn complete_item(
        &self,
        queue_id: i64,
        worker_id: &str,
        content_hash: &str,
    ) -> Result<(), StoreError> {
        let affected = self
            .conn
            .execute(
                "UPDATE queue_items SET status = 'completed', completed_at = ?1, content_hash = ?2 \
                 WHERE queue_id = ?3 AND status = 'processing' AND worker_id = ?4",
                params![Utc::now().to_rfc3339(), content_hash, queue_id, worker_id],
            )
            .await?;
        if affected == 0 {
            warn!(queue_id, worker_id, "complete_item guard missed, item was not processing by this worker");
            return Err(StoreError::Conflict(format!("queue item {queue_id} is not processing by {worker_id}")));
        }
        Ok(())
    }

    /// Marks an item failed, scheduling a retry with exponential backoff
    /// unless `max_retries` has been exhausted, in which case the item
    /// becomes permanently `failed`. Priority is preserved across retries.
    #[instrument(skip(self, error_message, error_details))]
    pub async fn fail_item(
        &self,
        queue_id: i64,
        error_message: &str,
        error_details: Option<&str>,
        backoff_base_seconds: i64,
        backoff_cap_seconds: i64,
    ) -> Result<QueueItemStatus, StoreError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM queue_items WHERE queue_id = ?1");
        let mut rows = self.conn.query(&sql, params![queue_id]).await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("queue item {queue_id}")))?;
        let item = map_row(&row)?;

        let now = Utc::now();
        let next_status = if item.retry_count + 1 > item.max_retries {
            QueueItemStatus::Failed
        } else {
            QueueItemStatus::Retry
        };

        let backoff = QueueItem::backoff(item.retry_count, backoff_base_seconds, backoff_cap_seconds);
        let scheduled_for = now + chrono::Duration::seconds(backoff);

        let affected = self
            .conn
            .execute(
                "UPDATE queue_items SET status = ?1, failed_at = ?2, retry_count = retry_count + 1, \
                 error_message = ?3, error_details = ?4, scheduled_for = ?5, worker_id = NULL \
                 WHERE queue_id = ?6 AND status = 'processing'",
                params![
                    next_status.as_str(),
                    now.to_rfc3339(),
                    error_message,
                    error_details,
                    scheduled_for.to_rfc3339(),
                    queue_id
                ],
            )
            .await?;
        if affected == 0 {
            warn!(queue_id, "fail_item guard missed, item was not processing");
            return Err(StoreError::Conflict(format!("queue item {queue_id} is not processing")));
        }
        Ok(next_status)
    }

    /// Returns claims abandoned past `claim_timeout_seconds` to `pending`
    /// and increments `retry_count`; a row whose incremented count would
    /// exceed `max_retries` becomes `failed` instead. Run periodically by
    /// the reaper.
    #[instrument(skip(self))]
    pub async fn reclaim_stale(&self, run_id: &str, claim_timeout_seconds: i64) -> Result<u64, StoreError> {
        let threshold = Utc::now() - chrono::Duration::seconds(claim_timeout_seconds);
        let now = Utc::now().to_rfc3339();
        let affected = self
            .conn
            .execute(
                "UPDATE queue_items SET \
                 status = CASE WHEN retry_count + 1 > max_retries THEN 'failed' ELSE 'pending' END, \
                 retry_count = retry_count + 1, \
                 worker_id = NULL, claimed_at = NULL, started_at = NULL, \
                 failed_at = CASE WHEN retry_count + 1 > max_retries THEN ?1 ELSE failed_at END \
                 WHERE run_id = ?2 AND status = 'processing' AND claimed_at < ?3",
                params![now, run_id, threshold.to_rfc3339()],
            )
            .await?;
        Ok(affected)
    }

    #[instrument(skip(self))]
    pub async fn summarize_queue(&self, run_id: &str) -> Result<QueueSummary, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT status, COUNT(*) FROM queue_items WHERE run_id = ?1 GROUP BY status",
                params![run_id],
            )
            .await?;

        let mut summary = QueueSummary::default();
        while let Some(row) = rows.next().await? {
            let status: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            match QueueItemStatus::from_str(&status) {
                Some(QueueItemStatus::Pending) => summary.pending = count,
                Some(QueueItemStatus::Processing) => summary.processing = count,
                Some(QueueItemStatus::Completed) => summary.completed = count,
                Some(QueueItemStatus::Failed) => summary.failed = count,
                Some(QueueItemStatus::Retry) => summary.retry = count,
                None => warn!(run_id, status, "unrecognized queue item status"),
            }
        }
        Ok(summary)
    }
}

fn map_row(row: &Row) -> Result<QueueItem, StoreError> {
    let source_type_raw: String = row.get(4)?;
    let status_raw: String = row.get(5)?;
    let capabilities_json: String = row.get(23)?;
    let required_capabilities: BTreeSet<String> = serde_json::from_str(&capabilities_json)
        .map_err(|e| StoreError::Mapping(format!("capabilities deserialize: {e}")))?;
    let scheduled_for_raw: String = row.get(22)?;

    Ok(QueueItem {
        queue_id: row.get(0)?,
        run_id: row.get(1)?,
        doc_id: row.get(2)?,
        source_name: row.get(3)?,
        source_type: SourceType::from_str(&source_type_raw)
            .ok_or_else(|| StoreError::Mapping(format!("unknown source_type {source_type_raw:?}")))?,
        status: QueueItemStatus::from_str(&status_raw)
            .ok_or_else(|| StoreError::Mapping(format!("unknown queue status {status_raw:?}")))?,
        worker_id: row.get(6)?,
        claimed_at: parse_optional_timestamp(row.get(7)?)?,
        started_at: parse_optional_timestamp(row.get(8)?)?,
        completed_at: parse_optional_timestamp(row.get(9)?)?,
        failed_at: parse_optional_timestamp(row.get(10)?)?,
        retry_count: row.get(11)?,
        max_retries: row.get(12)?,
        error_message: row.get(13)?,
        error_details: row.get(14)?,
        parent_doc_id: row.get(15)?,
        link_depth: row.get(16)?,
        max_link_depth: row.get(17)?,
        content_hash: row.get(18)?,
        last_modified: parse_optional_timestamp(row.get(19)?)?,
        file_size: row.get(20)?,
        priority: row.get(21)?,
        scheduled_for: crate::parse_timestamp(&scheduled_for_raw)?,
        required_capabilities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::StoreClient;

    #[test]
    fn backoff_sequence_matches_exponential_policy() {
        assert_eq!(QueueItem::backoff(0, 30, 900), 30);
        assert_eq!(QueueItem::backoff(1, 30, 900), 60);
        assert_eq!(QueueItem::backoff(2, 30, 900), 120);
        assert_eq!(QueueItem::backoff(10, 30, 900), 900);
    }

    fn sample_request<'a>(doc_id: &'a str, caps: &'a BTreeSet<String>) -> EnqueueRequest<'a> {
        EnqueueRequest {
            run_id: "run-1",
            doc_id,
            source_name: "docs",
            source_type: SourceType::Configured,
            parent_doc_id: None,
            link_depth: 0,
            max_link_depth: 3,
            priority: 0,
            max_retries: 3,
            required_capabilities: caps,
            scheduled_for: Utc::now(),
            content_hash: None,
        }
    }

    #[tokio::test]
    async fn claim_contention_only_one_worker_wins() {
        let store = StoreClient::connect(":memory:", None).await.unwrap();
        let caps = BTreeSet::new();

        let seeder = QueueRepository::new(store.connection().unwrap());
        let inserted = seeder.enqueue_document(sample_request("doc-1", &caps)).await.unwrap();
        assert!(inserted);

        let worker_a = QueueRepository::new(store.connection().unwrap());
        let worker_b = QueueRepository::new(store.connection().unwrap());

        let (claimed_a, claimed_b) = tokio::join!(
            worker_a.claim_next("run-1", "worker-a", &caps),
            worker_b.claim_next("run-1", "worker-b", &caps),
        );
        let claimed_a = claimed_a.unwrap();
        let claimed_b = claimed_b.unwrap();

        let winners = [&claimed_a, &claimed_b].into_iter().filter(|c| c.is_some()).count();
        assert_eq!(winners, 1, "exactly one claimant should win the race for the single row");
    }

    #[tokio::test]
    async fn reclaim_stale_increments_retry_count_and_reopens_to_pending() {
        let store = StoreClient::connect(":memory:", None).await.unwrap();
        let caps = BTreeSet::new();

        let queue = QueueRepository::new(store.connection().unwrap());
        queue.enqueue_document(sample_request("doc-1", &caps)).await.unwrap();
        let claimed = queue.claim_next("run-1", "worker-a", &caps).await.unwrap().unwrap();

        let stale_claimed_at = (Utc::now() - chrono::Duration::seconds(3600)).to_rfc3339();
        store
            .connection()
            .unwrap()
            .execute(
                "UPDATE queue_items SET claimed_at = ?1 WHERE queue_id = ?2",
                params![stale_claimed_at, claimed.queue_id],
            )
            .await
            .unwrap();

        let affected = queue.reclaim_stale("run-1", 60).await.unwrap();
        assert_eq!(affected, 1);

        let reclaimed = queue.claim_next("run-1", "worker-b", &caps).await.unwrap().unwrap();
        assert_eq!(reclaimed.retry_count, 1);
        assert_eq!(reclaimed.queue_id, claimed.queue_id);
    }

    #[tokio::test]
    async fn reclaim_stale_marks_failed_once_retries_exhausted() {
        let store = StoreClient::connect(":memory:", None).await.unwrap();
        let caps = BTreeSet::new();

        let queue = QueueRepository::new(store.connection().unwrap());
        let mut req = sample_request("doc-1", &caps);
        req.max_retries = 0;
        queue.enqueue_document(req).await.unwrap();
        let claimed = queue.claim_next("run-1", "worker-a", &caps).await.unwrap().unwrap();

        let stale_claimed_at = (Utc::now() - chrono::Duration::seconds(3600)).to_rfc3339();
        store
            .connection()
            .unwrap()
            .execute(
                "UPDATE queue_items SET claimed_at = ?1 WHERE queue_id = ?2",
                params![stale_claimed_at, claimed.queue_id],
            )
            .await
            .unwrap();

        let affected = queue.reclaim_stale("run-1", 60).await.unwrap();
        assert_eq!(affected, 1);

        // A failed row is no longer claimable; re-running claim_next must not find it.
        assert!(queue.claim_next("run-1", "worker-b", &caps).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fail_item_exhausts_after_exactly_max_retries_attempts() {
        let store = StoreClient::connect(":memory:", None).await.unwrap();
        let caps = BTreeSet::new();

        let queue = QueueRepository::new(store.connection().unwrap());
        let mut req = sample_request("doc-1", &caps);
        req.max_retries = 2;
        queue.enqueue_document(req).await.unwrap();

        for attempt in 0..2 {
            let claimed = queue.claim_next("run-1", "worker-a", &caps).await.unwrap().unwrap();
            let status = queue.fail_item(claimed.queue_id, "boom", None, 0, 0).await.unwrap();
            assert_eq!(status, QueueItemStatus::Retry, "attempt {attempt} should retry, not fail");
            store
                .connection()
                .unwrap()
                .execute(
                    "UPDATE queue_items SET scheduled_for = ?1 WHERE queue_id = ?2",
                    params![Utc::now().to_rfc3339(), claimed.queue_id],
                )
                .await
                .unwrap();
        }

        let claimed = queue.claim_next("run-1", "worker-a", &caps).await.unwrap().unwrap();
        let status = queue.fail_item(claimed.queue_id, "boom", None, 0, 0).await.unwrap();
        assert_eq!(status, QueueItemStatus::Failed, "third attempt exhausts max_retries = 2");
    }

    #[tokio::test]
    async fn enqueue_document_reopens_completed_row_when_content_hash_changes() {
        let store = StoreClient::connect(":memory:", None).await.unwrap();
        let caps = BTreeSet::new();

        let queue = QueueRepository::new(store.connection().unwrap());
        queue.enqueue_document(sample_request("doc-1", &caps)).await.unwrap();
        let claimed = queue.claim_next("run-1", "worker-a", &caps).await.unwrap().unwrap();
        queue.complete_item(claimed.queue_id, "worker-a", "hash-v1").await.unwrap();

        let mut same_hash = sample_request("doc-1", &caps);
        same_hash.content_hash = Some("hash-v1");
        assert!(!queue.enqueue_document(same_hash).await.unwrap(), "matching hash is a no-op");

        let mut changed_hash = sample_request("doc-1", &caps);
        changed_hash.content_hash = Some("hash-v2");
        assert!(queue.enqueue_document(changed_hash).await.unwrap(), "changed hash reopens the row");

        let reclaimed = queue.claim_next("run-1", "worker-b", &caps).await.unwrap().unwrap();
        assert_eq!(reclaimed.queue_id, claimed.queue_id);
        assert_eq!(reclaimed.retry_count, 0);
    }
}
