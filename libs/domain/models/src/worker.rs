// [libs/domain/models/src/worker.rs]
//! The `Worker` entity — one row per `(run_id, worker_id)` pairing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Active,
    Idle,
    Processing,
    Stopped,
    Failed,
}

impl WorkerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerStatus::Active => "active",
            WorkerStatus::Idle => "idle",
            WorkerStatus::Processing => "processing",
            WorkerStatus::Stopped => "stopped",
            WorkerStatus::Failed => "failed",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        Some(match value {
            "active" => WorkerStatus::Active,
            "idle" => WorkerStatus::Idle,
            "processing" => WorkerStatus::Processing,
            "stopped" => WorkerStatus::Stopped,
            "failed" => WorkerStatus::Failed,
            _ => return None,
        })
    }
}

/// A worker's registration and counters within one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub run_id: String,
    pub worker_id: String,
    pub joined_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
    pub status: WorkerStatus,

    pub documents_claimed: i64,
    pub documents_processed: i64,
    pub documents_failed: i64,
    pub processing_time_seconds: f64,

    pub hostname: String,
    pub process_id: i64,
    pub version: String,
    pub capabilities: BTreeSet<String>,
}
