// [libs/infra/store/src/repositories/dependency.rs]
//! `DocumentDependency` persistence: the link graph's edge table. An
//! arena of rows, not a materialized in-memory graph — reachability
//! queries walk rows when needed instead of following pointers.

use crate::errors::StoreError;
use ingest_domain_models::{DocumentDependency, LinkType};
use libsql::{params, Connection, Row};
use tracing::instrument;

pub struct DependencyRepository {
    conn: Connection,
}

impl DependencyRepository {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Idempotent on the `(run_id, parent_doc_id, child_doc_id,
    /// source_name)` primary key: rediscovering the same link twice is a
    /// no-op.
    #[instrument(skip(self))]
    pub async fn record_dependency(&self, dep: &DocumentDependency) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO document_dependencies \
                 (run_id, parent_doc_id, child_doc_id, source_name, link_type, link_depth, \
                  discovered_at, discovered_by_worker) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    dep.run_id.as_str(),
                    dep.parent_doc_id.as_str(),
                    dep.child_doc_id.as_str(),
                    dep.source_name.as_str(),
                    dep.link_type.as_str(),
                    dep.link_depth,
                    dep.discovered_at.to_rfc3339(),
                    dep.discovered_by_worker.as_str(),
                ],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_children(
        &self,
        run_id: &str,
        parent_doc_id: &str,
    ) -> Result<Vec<DocumentDependency>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT run_id, parent_doc_id, child_doc_id, source_name, link_type, link_depth, \
                 discovered_at, discovered_by_worker FROM document_dependencies \
                 WHERE run_id = ?1 AND parent_doc_id = ?2",
                params![run_id, parent_doc_id],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(&row)?);
        }
        Ok(out)
    }
}

fn map_row(row: &Row) -> Result<DocumentDependency, StoreError> {
    let link_type_raw: String = row.get(4)?;
    let discovered_at_raw: String = row.get(6)?;
    Ok(DocumentDependency {
        run_id: row.get(0)?,
        parent_doc_id: row.get(1)?,
        child_doc_id: row.get(2)?,
        source_name: row.get(3)?,
        link_type: LinkType::from_str(&link_type_raw)
            .ok_or_else(|| StoreError::Mapping(format!("unknown link_type {link_type_raw:?}")))?,
        link_depth: row.get(5)?,
        discovered_at: crate::parse_timestamp(&discovered_at_raw)?,
        discovered_by_worker: row.get(7)?,
    })
}
