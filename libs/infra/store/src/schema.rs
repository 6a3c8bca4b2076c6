// [libs/infra/store/src/schema.rs]
//! Idempotent schema application: table-then-evolve-then-index
//! staging, so re-running this on an already-migrated database is
//! always safe.

use crate::errors::StoreError;
use libsql::Connection;
use tracing::{debug, instrument, warn};

const TABLES: &[(&str, &str)] = &[
    (
        "runs",
        r#"
        CREATE TABLE IF NOT EXISTS runs (
            run_id TEXT PRIMARY KEY,
            config_hash TEXT NOT NULL UNIQUE,
            config_snapshot TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            created_at TEXT NOT NULL,
            first_worker_at TEXT,
            last_activity_at TEXT NOT NULL,
            processing_completed_at TEXT,
            post_processing_started_at TEXT,
            post_processing_completed_at TEXT,
            completed_at TEXT,
            worker_count INTEGER NOT NULL DEFAULT 0,
            documents_queued INTEGER NOT NULL DEFAULT 0,
            documents_processed INTEGER NOT NULL DEFAULT 0,
            documents_failed INTEGER NOT NULL DEFAULT 0,
            documents_retried INTEGER NOT NULL DEFAULT 0,
            leader_worker_id TEXT,
            leader_elected_at TEXT,
            leader_heartbeat TEXT,
            leader_lease_expires TEXT,
            post_processor_worker_id TEXT,
            post_processing_lock_acquired_at TEXT
        );
        "#,
    ),
    (
        "queue_items",
        r#"
        CREATE TABLE IF NOT EXISTS queue_items (
            queue_id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            doc_id TEXT NOT NULL,
            source_name TEXT NOT NULL,
            source_type TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            worker_id TEXT,
            claimed_at TEXT,
            started_at TEXT,
            completed_at TEXT,
            failed_at TEXT,
            retry_count INTEGER NOT NULL DEFAULT 0,
            max_retries INTEGER NOT NULL DEFAULT 3,
            error_message TEXT,
            error_details TEXT,
            parent_doc_id TEXT,
            link_depth INTEGER NOT NULL DEFAULT 0,
            max_link_depth INTEGER NOT NULL DEFAULT 0,
            content_hash TEXT,
            last_modified TEXT,
            file_size INTEGER,
            priority INTEGER NOT NULL DEFAULT 0,
            scheduled_for TEXT NOT NULL,
            required_capabilities TEXT NOT NULL DEFAULT '[]',
            UNIQUE(run_id, doc_id, source_name)
        );
        "#,
    ),
    (
        "workers",
        r#"
        CREATE TABLE IF NOT EXISTS workers (
            run_id TEXT NOT NULL,
            worker_id TEXT NOT NULL,
            joined_at TEXT NOT NULL,
            last_heartbeat TEXT NOT NULL,
            left_at TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            documents_claimed INTEGER NOT NULL DEFAULT 0,
            documents_processed INTEGER NOT NULL DEFAULT 0,
            documents_failed INTEGER NOT NULL DEFAULT 0,
            processing_time_seconds REAL NOT NULL DEFAULT 0.0,
            hostname TEXT NOT NULL DEFAULT '',
            process_id INTEGER NOT NULL DEFAULT 0,
            version TEXT NOT NULL DEFAULT '',
            capabilities TEXT NOT NULL DEFAULT '[]',
            PRIMARY KEY (run_id, worker_id)
        );
        "#,
    ),
    (
        "document_dependencies",
        r#"
        CREATE TABLE IF NOT EXISTS document_dependencies (
            run_id TEXT NOT NULL,
            parent_doc_id TEXT NOT NULL,
            child_doc_id TEXT NOT NULL,
            source_name TEXT NOT NULL,
            link_type TEXT NOT NULL,
            link_depth INTEGER NOT NULL DEFAULT 0,
            discovered_at TEXT NOT NULL,
            discovered_by_worker TEXT NOT NULL,
            PRIMARY KEY (run_id, parent_doc_id, child_doc_id, source_name)
        );
        "#,
    ),
];

/// Columns added after the initial release; tolerant of "duplicate
/// column name" so this list only ever grows.
const EVOLUTIONARY_COLUMNS: &[(&str, &str)] = &[];

const INDEXES: &[(&str, &str)] = &[
    (
        "idx_queue_items_claimable",
        "CREATE INDEX IF NOT EXISTS idx_queue_items_claimable ON queue_items(run_id, status, scheduled_for, priority);",
    ),
    (
        "idx_queue_items_run_status",
        "CREATE INDEX IF NOT EXISTS idx_queue_items_run_status ON queue_items(run_id, status);",
    ),
    (
        "idx_workers_heartbeat",
        "CREATE INDEX IF NOT EXISTS idx_workers_heartbeat ON workers(run_id, status, last_heartbeat);",
    ),
    (
        "idx_dependencies_child",
        "CREATE INDEX IF NOT EXISTS idx_dependencies_child ON document_dependencies(run_id, child_doc_id);",
    ),
];

#[instrument(skip(conn))]
pub async fn apply_schema(conn: &Connection) -> Result<(), StoreError> {
    for (name, sql) in TABLES {
        debug!(table = name, "creating table if absent");
        conn.execute(sql, ()).await?;
    }

    for (name, sql) in EVOLUTIONARY_COLUMNS {
        match conn.execute(sql, ()).await {
            Ok(_) => debug!(column = name, "added evolutionary column"),
            Err(e) if e.to_string().contains("duplicate column name") => {
                debug!(column = name, "evolutionary column already present");
            }
            Err(e) => warn!(column = name, error = %e, "evolutionary column migration skipped"),
        }
    }

    for (name, sql) in INDEXES {
        debug!(index = name, "creating index if absent");
        conn.execute(sql, ()).await?;
    }

    Ok(())
}
