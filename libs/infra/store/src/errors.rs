// [libs/infra/store/src/errors.rs]
//! Error catalog for the Coordination Store.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store connection failed: {0}")]
    Connection(String),

    #[error("store query failed: {0}")]
    Query(#[from] libsql::Error),

    #[error("row mapping failed: {0}")]
    Mapping(String),

    /// A record the caller expected to exist was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// An optimistic-update guard (`WHERE status = ...`) matched zero
    /// rows: another worker already changed the row's state.
    #[error("conflicting state transition: {0}")]
    Conflict(String),
}
