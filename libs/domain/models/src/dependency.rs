// [libs/domain/models/src/dependency.rs]
//! The `DocumentDependency` entity — an edge in the link graph.
//!
//! This is an arena of edges keyed by primary key, not an in-memory
//! cyclic pointer graph: reachability, when
//! needed, is computed externally by walking rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    Explicit,
    Discovered,
    Inferred,
}

impl LinkType {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkType::Explicit => "explicit",
            LinkType::Discovered => "discovered",
            LinkType::Inferred => "inferred",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        Some(match value {
            "explicit" => LinkType::Explicit,
            "discovered" => LinkType::Discovered,
            "inferred" => LinkType::Inferred,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentDependency {
    pub run_id: String,
    pub parent_doc_id: String,
    pub child_doc_id: String,
    pub source_name: String,
    pub link_type: LinkType,
    pub link_depth: i64,
    pub discovered_at: DateTime<Utc>,
    pub discovered_by_worker: String,
}
