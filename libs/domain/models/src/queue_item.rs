// [libs/domain/models/src/queue_item.rs]
//! The `QueueItem` entity — one per `(run_id, doc_id, source_name)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Configured,
    Linked,
    Discovered,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Configured => "configured",
            SourceType::Linked => "linked",
            SourceType::Discovered => "discovered",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        Some(match value {
            "configured" => SourceType::Configured,
            "linked" => SourceType::Linked,
            "discovered" => SourceType::Discovered,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueItemStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Retry,
}

impl QueueItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QueueItemStatus::Pending => "pending",
            QueueItemStatus::Processing => "processing",
            QueueItemStatus::Completed => "completed",
            QueueItemStatus::Failed => "failed",
            QueueItemStatus::Retry => "retry",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        Some(match value {
            "pending" => QueueItemStatus::Pending,
            "processing" => QueueItemStatus::Processing,
            "completed" => QueueItemStatus::Completed,
            "failed" => QueueItemStatus::Failed,
            "retry" => QueueItemStatus::Retry,
            _ => return None,
        })
    }
}

/// One document claimable unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub queue_id: i64,
    pub run_id: String,
    pub doc_id: String,
    pub source_name: String,
    pub source_type: SourceType,
    pub status: QueueItemStatus,

    pub worker_id: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,

    pub retry_count: i64,
    pub max_retries: i64,
    pub error_message: Option<String>,
    pub error_details: Option<String>,

    pub parent_doc_id: Option<String>,
    pub link_depth: i64,
    pub max_link_depth: i64,

    pub content_hash: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub file_size: Option<i64>,

    pub priority: i64,
    pub scheduled_for: DateTime<Utc>,

    /// Capability tags a claiming worker must offer. Empty means any
    /// worker may claim it.
    pub required_capabilities: BTreeSet<String>,
}

impl QueueItem {
    /// `base · 2^n` capped at `cap`, the default retry backoff policy.
    /// `n` is the retry count *before* the increment caused
    /// by this failure (i.e. the previous `retry_count`).
    pub fn backoff(retry_count: i64, base_seconds: i64, cap_seconds: i64) -> i64 {
        let n = retry_count.max(0) as u32;
        let multiplier = 1i64.checked_shl(n).unwrap_or(i64::MAX);
        base_seconds.saturating_mul(multiplier).min(cap_seconds)
    }
}
