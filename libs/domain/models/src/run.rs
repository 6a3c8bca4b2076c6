// [libs/domain/models/src/run.rs]
//! The `Run` entity — one per distinct configuration fingerprint.

use crate::config_snapshot::ConfigSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a run. Terminal statuses
/// (`Completed`, `Failed`, `Abandoned`) are absorbing: once written, a run
/// row never transitions out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Active,
    ProcessingComplete,
    PostProcessing,
    Completed,
    Failed,
    Abandoned,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Active => "active",
            RunStatus::ProcessingComplete => "processing_complete",
            RunStatus::PostProcessing => "post_processing",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Abandoned => "abandoned",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        Some(match value {
            "active" => RunStatus::Active,
            "processing_complete" => RunStatus::ProcessingComplete,
            "post_processing" => RunStatus::PostProcessing,
            "completed" => RunStatus::Completed,
            "failed" => RunStatus::Failed,
            "abandoned" => RunStatus::Abandoned,
            _ => return None,
        })
    }

    /// Terminal statuses are absorbing.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed | RunStatus::Abandoned)
    }
}

/// One ingestion batch, identified by a config fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// 16-hex prefix of the SHA-256 config fingerprint. Primary key.
    pub run_id: String,
    /// Full 64-hex fingerprint; unique.
    pub config_hash: String,
    pub config_snapshot: ConfigSnapshot,
    pub status: RunStatus,

    pub created_at: DateTime<Utc>,
    pub first_worker_at: Option<DateTime<Utc>>,
    pub last_activity_at: DateTime<Utc>,
    pub processing_completed_at: Option<DateTime<Utc>>,
    pub post_processing_started_at: Option<DateTime<Utc>>,
    pub post_processing_completed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    pub worker_count: i64,
    pub documents_queued: i64,
    pub documents_processed: i64,
    pub documents_failed: i64,
    pub documents_retried: i64,

    pub leader_worker_id: Option<String>,
    pub leader_elected_at: Option<DateTime<Utc>>,
    pub leader_heartbeat: Option<DateTime<Utc>>,
    pub leader_lease_expires: Option<DateTime<Utc>>,

    /// Set together with the `processing_complete -> post_processing`
    /// transition; `None` before that phase starts.
    pub post_processor_worker_id: Option<String>,
    pub post_processing_lock_acquired_at: Option<DateTime<Utc>>,
}

/// Aggregate queue counts returned by `summarize_queue`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueSummary {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub retry: i64,
}

impl QueueSummary {
    /// True once no item is pending, processing, or awaiting retry.
    pub fn is_drained(&self) -> bool {
        self.pending == 0 && self.processing == 0 && self.retry == 0
    }
}
