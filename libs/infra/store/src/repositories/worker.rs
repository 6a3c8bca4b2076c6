// [libs/infra/store/src/repositories/worker.rs]
//! `Worker` persistence: registration, heartbeats and
//! the timeout sweep the reaper uses to mark dead workers.
//!
//! Uses an `INSERT ... ON CONFLICT DO UPDATE` upsert for registration,
//! applied here to a single worker's own row per call instead of a
//! batch.

use crate::errors::StoreError;
use crate::parse_optional_timestamp;
use chrono::Utc;
use ingest_domain_models::{Worker, WorkerStatus};
use libsql::{params, Connection, Row};
use std::collections::BTreeSet;
use tracing::instrument;

const SELECT_COLUMNS: &str = "run_id, worker_id, joined_at, last_heartbeat, left_at, status, \
     documents_claimed, documents_processed, documents_failed, processing_time_seconds, \
     hostname, process_id, version, capabilities";

pub struct WorkerRepository {
    conn: Connection,
}

impl WorkerRepository {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    #[instrument(skip(self, capabilities))]
    pub async fn register_worker(
        &self,
        run_id: &str,
        worker_id: &str,
        hostname: &str,
        process_id: i64,
        version: &str,
        capabilities: &BTreeSet<String>,
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let capabilities_json = serde_json::to_string(capabilities)
            .map_err(|e| StoreError::Mapping(format!("capabilities serialize: {e}")))?;

        self.conn
            .execute(
                "INSERT INTO workers (run_id, worker_id, joined_at, last_heartbeat, status, \
                 hostname, process_id, version, capabilities) \
                 VALUES (?1, ?2, ?3, ?3, 'active', ?4, ?5, ?6, ?7) \
                 ON CONFLICT(run_id, worker_id) DO UPDATE SET \
                 last_heartbeat = ?3, left_at = NULL, status = 'active', \
                 hostname = ?4, process_id = ?5, version = ?6, capabilities = ?7",
                params![run_id, worker_id, now, hostname, process_id, version, capabilities_json],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn heartbeat_worker(&self, run_id: &str, worker_id: &str) -> Result<(), StoreError> {
        let affected = self
            .conn
            .execute(
                "UPDATE workers SET last_heartbeat = ?1 WHERE run_id = ?2 AND worker_id = ?3",
                params![Utc::now().to_rfc3339(), run_id, worker_id],
            )
            .await?;
        if affected == 0 {
            return Err(StoreError::NotFound(format!("worker {worker_id} in run {run_id}")));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn record_document_outcome(
        &self,
        run_id: &str,
        worker_id: &str,
        claimed: i64,
        processed: i64,
        failed: i64,
        processing_seconds: f64,
    ) -> Result<(), StoreError> {
        self.conn
            .execute(
                "UPDATE workers SET documents_claimed = documents_claimed + ?1, \
                 documents_processed = documents_processed + ?2, \
                 documents_failed = documents_failed + ?3, \
                 processing_time_seconds = processing_time_seconds + ?4 \
                 WHERE run_id = ?5 AND worker_id = ?6",
                params![claimed, processed, failed, processing_seconds, run_id, worker_id],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn mark_worker_left(&self, run_id: &str, worker_id: &str) -> Result<(), StoreError> {
        self.conn
            .execute(
                "UPDATE workers SET status = 'stopped', left_at = ?1 \
                 WHERE run_id = ?2 AND worker_id = ?3",
                params![Utc::now().to_rfc3339(), run_id, worker_id],
            )
            .await?;
        Ok(())
    }

    /// Marks workers whose heartbeat is older than `timeout_seconds` as
    /// `failed`; run by the reaper alongside queue-item reclamation.
    #[instrument(skip(self))]
    pub async fn mark_timed_out_workers(
        &self,
        run_id: &str,
        timeout_seconds: i64,
    ) -> Result<u64, StoreError> {
        let threshold = Utc::now() - chrono::Duration::seconds(timeout_seconds);
        let affected = self
            .conn
            .execute(
                "UPDATE workers SET status = 'failed', left_at = ?1 \
                 WHERE run_id = ?2 AND status IN ('active', 'idle', 'processing') \
                 AND last_heartbeat < ?3",
                params![Utc::now().to_rfc3339(), run_id, threshold.to_rfc3339()],
            )
            .await?;
        Ok(affected)
    }

    #[instrument(skip(self))]
    pub async fn get_worker(&self, run_id: &str, worker_id: &str) -> Result<Worker, StoreError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM workers WHERE run_id = ?1 AND worker_id = ?2");
        let mut rows = self.conn.query(&sql, params![run_id, worker_id]).await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("worker {worker_id} in run {run_id}")))?;
        map_row(&row)
    }
}

fn map_row(row: &Row) -> Result<Worker, StoreError> {
    let status_raw: String = row.get(5)?;
    let capabilities_json: String = row.get(13)?;
    let capabilities: BTreeSet<String> = serde_json::from_str(&capabilities_json)
        .map_err(|e| StoreError::Mapping(format!("capabilities deserialize: {e}")))?;
    let joined_at: String = row.get(2)?;
    let last_heartbeat: String = row.get(3)?;

    Ok(Worker {
        run_id: row.get(0)?,
        worker_id: row.get(1)?,
        joined_at: crate::parse_timestamp(&joined_at)?,
        last_heartbeat: crate::parse_timestamp(&last_heartbeat)?,
        left_at: parse_optional_timestamp(row.get(4)?)?,
        status: WorkerStatus::from_str(&status_raw)
            .ok_or_else(|| StoreError::Mapping(format!("unknown worker status {status_raw:?}")))?,
        documents_claimed: row.get(6)?,
        documents_processed: row.get(7)?,
        documents_failed: row.get(8)?,
        processing_time_seconds: row.get(9)?,
        hostname: row.get(10)?,
        process_id: row.get(11)?,
        version: row.get(12)?,
        capabilities,
    })
}
