// [libs/domain/models/src/config_snapshot.rs]
//! `ConfigSnapshot` — the fingerprinted inputs that justify run identity,
//! plus `OperationalConfig`, the sibling structure for fields the
//! fingerprint deliberately excludes.

use serde::{Deserialize, Serialize};

/// Identity of one content source: `(name, type, canonical_parameters)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    pub name: String,
    pub source_type: String,
    /// Arbitrary per-source parameters; the fingerprint crate sorts keys
    /// and normalizes scalars recursively before hashing.
    #[serde(default)]
    pub canonical_parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub dimensions: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct OntologyConfig {
    pub identifiers: Vec<String>,
    pub versions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct StorageTarget {
    pub kind: String,
    pub identity: String,
}

/// The part of configuration that defines the produced artifact set, and
/// therefore participates in the `run_id` fingerprint.
/// Immutable after the owning `Run` is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigSnapshot {
    pub sources: Vec<SourceConfig>,
    pub embedding: EmbeddingConfig,
    pub ontology: OntologyConfig,
    pub relationship_detection_enabled: bool,
    pub storage_target: StorageTarget,
}

/// Fields that affect *how* ingestion runs but never *what* it produces
/// — excluded from the fingerprint by the canonicalization rule that
/// only the snapshot above participates in hashing. Never touches the
/// hasher in `ingest-core-fingerprint`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationalConfig {
    pub log_level: Option<String>,
    pub worker_count: Option<u32>,
    pub timeouts: Option<serde_json::Value>,
    pub ui: Option<serde_json::Value>,
}

/// The full structured configuration a worker is started with: the part
/// that is fingerprinted, plus the part that is not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    pub snapshot: ConfigSnapshot,
    #[serde(default)]
    pub operational: OperationalConfig,
}
