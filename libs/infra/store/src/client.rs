// [libs/infra/store/src/client.rs]
//! Connection management for the Coordination Store.
//!
//! Detects remote vs. local vs. in-memory URLs, applies the schema
//! once at startup, and hands out a fresh `libsql::Connection` per
//! logical operation (libSQL connections are cheap and not meant to be
//! pooled by hand).

use crate::errors::StoreError;
use crate::schema::apply_schema;
use libsql::{Builder, Connection, Database};
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct StoreClient {
    database: Arc<Database>,
    /// Keeps an in-memory database alive for the process lifetime; a
    /// `:memory:` database is dropped the instant its last connection
    /// closes, which would otherwise happen between requests.
    _memory_anchor: Option<Arc<Connection>>,
}

impl StoreClient {
    #[instrument(skip(auth_token))]
    pub async fn connect(url: &str, auth_token: Option<String>) -> Result<Self, StoreError> {
        if url.is_empty() {
            return Err(StoreError::Connection("COORD_DB_URL is empty".to_string()));
        }

        let is_remote = url.starts_with("libsql://") || url.starts_with("https://");
        let is_memory = url.contains(":memory:");

        info!(url, is_remote, is_memory, "connecting to coordination store");

        let database = if is_remote {
            let token = auth_token
                .ok_or_else(|| StoreError::Connection("remote store requires an auth token".to_string()))?;
            Builder::new_remote(url.to_string(), token).build().await
        } else {
            Builder::new_local(url).build().await
        }
        .map_err(|e| StoreError::Connection(e.to_string()))?;

        let database = Arc::new(database);
        let mut anchor = None;

        if is_memory {
            let conn = database.connect().map_err(|e| StoreError::Connection(e.to_string()))?;
            apply_schema(&conn).await?;
            anchor = Some(Arc::new(conn));
        } else {
            let conn = database.connect().map_err(|e| StoreError::Connection(e.to_string()))?;
            apply_schema(&conn).await?;
        }

        Ok(Self {
            database,
            _memory_anchor: anchor,
        })
    }

    pub fn connection(&self) -> Result<Connection, StoreError> {
        self.database.connect().map_err(|e| StoreError::Connection(e.to_string()))
    }
}
