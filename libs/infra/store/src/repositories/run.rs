// [libs/infra/store/src/repositories/run.rs]
//! `Run` persistence.

use crate::errors::StoreError;
use crate::{parse_optional_timestamp, parse_timestamp};
use chrono::Utc;
use ingest_domain_models::{ConfigSnapshot, Run, RunStatus};
use libsql::{params, Connection, Row};
use tracing::{instrument, warn};

const SELECT_COLUMNS: &str = "run_id, config_hash, config_snapshot, status, created_at, \
     first_worker_at, last_activity_at, processing_completed_at, post_processing_started_at, \
     post_processing_completed_at, completed_at, worker_count, documents_queued, \
     documents_processed, documents_failed, documents_retried, leader_worker_id, \
     leader_elected_at, leader_heartbeat, leader_lease_expires, post_processor_worker_id, \
     post_processing_lock_acquired_at";

pub struct RunRepository {
    conn: Connection,
}

impl RunRepository {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Creates the run row if no row with this `run_id` exists yet, then
    /// returns the (possibly pre-existing) row. Two workers racing to
    /// create the same run both converge on one row.
    #[instrument(skip(self, config_snapshot))]
    pub async fn create_or_attach_run(
        &self,
        run_id: &str,
        config_hash: &str,
        config_snapshot: &ConfigSnapshot,
    ) -> Result<Run, StoreError> {
        let now = Utc::now();
        let snapshot_json = serde_json::to_string(config_snapshot)
            .map_err(|e| StoreError::Mapping(format!("config_snapshot serialize: {e}")))?;

        self.conn
            .execute(
                "INSERT OR IGNORE INTO runs (run_id, config_hash, config_snapshot, status, \
                 created_at, last_activity_at) VALUES (?1, ?2, ?3, 'active', ?4, ?4)",
                params![run_id, config_hash, snapshot_json, now.to_rfc3339()],
            )
            .await?;

        self.get_run(run_id).await
    }

    #[instrument(skip(self))]
    pub async fn get_run(&self, run_id: &str) -> Result<Run, StoreError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM runs WHERE run_id = ?1");
        let mut rows = self.conn.query(&sql, params![run_id]).await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("run {run_id}")))?;
        map_row(&row)
    }

    /// Increments `worker_count` and sets `first_worker_at` once, on the
    /// first worker to join.
    #[instrument(skip(self))]
    pub async fn record_worker_joined(&self, run_id: &str) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE runs SET worker_count = worker_count + 1, \
                 first_worker_at = COALESCE(first_worker_at, ?1), last_activity_at = ?1 \
                 WHERE run_id = ?2",
                params![now, run_id],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn touch_activity(&self, run_id: &str) -> Result<(), StoreError> {
        self.conn
            .execute(
                "UPDATE runs SET last_activity_at = ?1 WHERE run_id = ?2",
                params![Utc::now().to_rfc3339(), run_id],
            )
            .await?;
        Ok(())
    }

    /// Guarded run status transition: the `WHERE status = ?`
    /// clause makes double-transition races a no-op for the loser.
    #[instrument(skip(self))]
    pub async fn transition_run(
        &self,
        run_id: &str,
        from: RunStatus,
        to: RunStatus,
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let extra_column = match to {
            RunStatus::ProcessingComplete => "processing_completed_at",
            RunStatus::PostProcessing => "post_processing_started_at",
            RunStatus::Completed => "completed_at",
            RunStatus::Failed | RunStatus::Abandoned => "completed_at",
            RunStatus::Active => "last_activity_at",
        };
        let sql = format!(
            "UPDATE runs SET status = ?1, {extra_column} = ?2, last_activity_at = ?2 \
             WHERE run_id = ?3 AND status = ?4"
        );
        let affected = self
            .conn
            .execute(&sql, params![to.as_str(), now, run_id, from.as_str()])
            .await?;

        if affected == 0 {
            warn!(run_id, from = from.as_str(), to = to.as_str(), "run transition guard missed");
            return Err(StoreError::Conflict(format!(
                "run {run_id} is not in status {}",
                from.as_str()
            )));
        }
        Ok(())
    }

    /// Attempts to become (or remain) leader: succeeds if no leader is
    /// currently recorded, the lease has expired, or the caller already
    /// holds the lease.
    #[instrument(skip(self))]
    pub async fn attempt_leader_election(
        &self,
        run_id: &str,
        worker_id: &str,
        lease_seconds: i64,
    ) -> Result<bool, StoreError> {
        let now = Utc::now();
        let lease_expires = now + chrono::Duration::seconds(lease_seconds);
        let affected = self
            .conn
            .execute(
                "UPDATE runs SET leader_worker_id = ?1, leader_elected_at = COALESCE(\
                 CASE WHEN leader_worker_id = ?1 THEN leader_elected_at ELSE NULL END, ?2), \
                 leader_heartbeat = ?2, leader_lease_expires = ?3 \
                 WHERE run_id = ?4 AND (leader_worker_id IS NULL OR leader_worker_id = ?1 \
                 OR leader_lease_expires < ?2)",
                params![
                    worker_id,
                    now.to_rfc3339(),
                    lease_expires.to_rfc3339(),
                    run_id
                ],
            )
            .await?;
        Ok(affected > 0)
    }

    /// Renews an already-held leader lease; fails silently (returns
    /// `false`) if leadership was lost in the meantime.
    #[instrument(skip(self))]
    pub async fn renew_leader_lease(
        &self,
        run_id: &str,
        worker_id: &str,
        lease_seconds: i64,
    ) -> Result<bool, StoreError> {
        let now = Utc::now();
        let lease_expires = now + chrono::Duration::seconds(lease_seconds);
        let affected = self
            .conn
            .execute(
                "UPDATE runs SET leader_heartbeat = ?1, leader_lease_expires = ?2 \
                 WHERE run_id = ?3 AND leader_worker_id = ?4",
                params![now.to_rfc3339(), lease_expires.to_rfc3339(), run_id, worker_id],
            )
            .await?;
        Ok(affected > 0)
    }

    #[instrument(skip(self))]
    pub async fn increment_document_counters(
        &self,
        run_id: &str,
        queued: i64,
        processed: i64,
        failed: i64,
        retried: i64,
    ) -> Result<(), StoreError> {
        self.conn
            .execute(
                "UPDATE runs SET documents_queued = documents_queued + ?1, \
                 documents_processed = documents_processed + ?2, \
                 documents_failed = documents_failed + ?3, \
                 documents_retried = documents_retried + ?4 \
                 WHERE run_id = ?5",
                params![queued, processed, failed, retried, run_id],
            )
            .await?;
        Ok(())
    }

    /// Marks the acquiring worker as the post-processor for this run:
    /// guarded so only the first caller during the `post_processing`
    /// phase wins the lock.
    #[instrument(skip(self))]
    pub async fn acquire_post_processing_lock(
        &self,
        run_id: &str,
        worker_id: &str,
    ) -> Result<bool, StoreError> {
        let now = Utc::now().to_rfc3339();
        let affected = self
            .conn
            .execute(
                "UPDATE runs SET post_processor_worker_id = ?1, post_processing_lock_acquired_at = ?2 \
                 WHERE run_id = ?3 AND status = 'post_processing' AND post_processor_worker_id IS NULL",
                params![worker_id, now, run_id],
            )
            .await?;
        Ok(affected > 0)
    }
}

fn map_row(row: &Row) -> Result<Run, StoreError> {
    let config_snapshot_json: String = row.get(2)?;
    let config_snapshot: ConfigSnapshot = serde_json::from_str(&config_snapshot_json)
        .map_err(|e| StoreError::Mapping(format!("config_snapshot deserialize: {e}")))?;
    let status_raw: String = row.get(3)?;
    let status = RunStatus::from_str(&status_raw)
        .ok_or_else(|| StoreError::Mapping(format!("unknown run status {status_raw:?}")))?;

    let created_at: String = row.get(4)?;
    let last_activity_at: String = row.get(6)?;

    Ok(Run {
        run_id: row.get(0)?,
        config_hash: row.get(1)?,
        config_snapshot,
        status,
        created_at: parse_timestamp(&created_at)?,
        first_worker_at: parse_optional_timestamp(row.get(5)?)?,
        last_activity_at: parse_timestamp(&last_activity_at)?,
        processing_completed_at: parse_optional_timestamp(row.get(7)?)?,
        post_processing_started_at: parse_optional_timestamp(row.get(8)?)?,
        post_processing_completed_at: parse_optional_timestamp(row.get(9)?)?,
        completed_at: parse_optional_timestamp(row.get(10)?)?,
        worker_count: row.get(11)?,
        documents_queued: row.get(12)?,
        documents_processed: row.get(13)?,
        documents_failed: row.get(14)?,
        documents_retried: row.get(15)?,
        leader_worker_id: row.get(16)?,
        leader_elected_at: parse_optional_timestamp(row.get(17)?)?,
        leader_heartbeat: parse_optional_timestamp(row.get(18)?)?,
        leader_lease_expires: parse_optional_timestamp(row.get(19)?)?,
        post_processor_worker_id: row.get(20)?,
        post_processing_lock_acquired_at: parse_optional_timestamp(row.get(21)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::StoreClient;
    use ingest_domain_models::{EmbeddingConfig, OntologyConfig, SourceConfig, StorageTarget};

    fn sample_snapshot() -> ConfigSnapshot {
        ConfigSnapshot {
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
        }
    }

    #[tokio::test]
    async fn transition_run_is_guarded_against_a_concurrent_double_transition() {
        let store = StoreClient::connect(":memory:", None).await.unwrap();
        let runs_a = RunRepository::new(store.connection().unwrap());
        let runs_b = RunRepository::new(store.connection().unwrap());

        runs_a
            .create_or_attach_run("run-1", "hash-1", &sample_snapshot())
            .await
            .unwrap();

        let (first, second) = tokio::join!(
            runs_a.transition_run("run-1", RunStatus::Active, RunStatus::ProcessingComplete),
            runs_b.transition_run("run-1", RunStatus::Active, RunStatus::ProcessingComplete),
        );

        let outcomes = [first.is_ok(), second.is_ok()];
        assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1, "only one transition should win");
        assert!(
            matches!(first, Err(StoreError::Conflict(_))) || matches!(second, Err(StoreError::Conflict(_))),
            "the loser must observe a Conflict"
        );

        let run = runs_a.get_run("run-1").await.unwrap();
        assert_eq!(run.status, RunStatus::ProcessingComplete);
    }

    #[tokio::test]
    async fn leader_election_is_guarded_against_a_concurrent_challenger() {
        let store = StoreClient::connect(":memory:", None).await.unwrap();
        let runs = RunRepository::new(store.connection().unwrap());
        runs.create_or_attach_run("run-1", "hash-1", &sample_snapshot()).await.unwrap();

        assert!(runs.attempt_leader_election("run-1", "worker-a", 300).await.unwrap());
        // A challenger cannot take over while the incumbent's lease is live.
        assert!(!runs.attempt_leader_election("run-1", "worker-b", 300).await.unwrap());
        // The incumbent renews successfully.
        assert!(runs.attempt_leader_election("run-1", "worker-a", 300).await.unwrap());
    }
}
