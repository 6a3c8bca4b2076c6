// [libs/infra/store/src/lib.rs]
//! Coordination Store: the libSQL-backed persistence adapter every
//! worker and the coordinator binary share.
//!
//! A thin `StoreClient` for connection management, an idempotent
//! `schema` module, and one repository per entity that takes raw
//! `libsql::Connection`s and never leaks a `libsql::Row` past its own
//! module.

pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;

pub use client::StoreClient;
pub use errors::StoreError;
pub use repositories::{DependencyRepository, QueueRepository, RunRepository, WorkerRepository};

use chrono::{DateTime, Utc};

/// Parses a stored RFC 3339 timestamp, treating a malformed value as a
/// mapping failure rather than panicking.
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Mapping(format!("bad timestamp {raw:?}: {e}")))
}

pub(crate) fn parse_optional_timestamp(raw: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    raw.map(|s| parse_timestamp(&s)).transpose()
}
