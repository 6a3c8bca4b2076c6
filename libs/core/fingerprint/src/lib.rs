// [libs/core/fingerprint/src/lib.rs]
//! Config Fingerprint.
//!
//! Given a structured [`ConfigSnapshot`], derives a deterministic 64-hex
//! `config_hash` and its 16-hex `run_id`. Two workers that compute the
//! same `config_hash` rendezvous on the same `Run`; they must therefore
//! agree on every canonicalization step, so all of the interesting
//! logic lives in [`canonical`].

pub mod canonical;

use ingest_domain_models::ConfigSnapshot;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Failure to fingerprint a configuration.
#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("config invalid: no content sources configured")]
    NoSources,
    #[error("config invalid: storage target identity is empty")]
    MissingStorageTarget,
}

/// The derived identity of a configuration: a 64-hex `config_hash` and the
/// 16-hex `run_id` prefix used as the `Run` primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub config_hash: String,
    pub run_id: String,
}

/// Computes the fingerprint of `snapshot`.
///
/// Fails with [`FingerprintError`] if required fields (sources, storage
/// target) are absent; otherwise total over well-formed configs.
pub fn fingerprint(snapshot: &ConfigSnapshot) -> Result<Fingerprint, FingerprintError> {
    if snapshot.sources.is_empty() {
        return Err(FingerprintError::NoSources);
    }
    if snapshot.storage_target.identity.trim().is_empty() {
        return Err(FingerprintError::MissingStorageTarget);
    }

    let value = serde_json::to_value(snapshot).expect("ConfigSnapshot always serializes to JSON");
    let canonical_value = canonical::canonicalize(&value);
    let canonical_bytes = canonical::to_canonical_bytes(&canonical_value);

    let mut hasher = Sha256::new();
    hasher.update(&canonical_bytes);
    let digest = hasher.finalize();
    let config_hash = hex::encode(digest);
    let run_id = config_hash[..16].to_string();

    Ok(Fingerprint { config_hash, run_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_domain_models::{EmbeddingConfig, OntologyConfig, SourceConfig, StorageTarget};

    fn sample(name: &str) -> ConfigSnapshot {
        ConfigSnapshot {
            sources: vec![SourceConfig {
                name: name.to_string(),
                source_type: "filesystem".to_string(),
                canonical_parameters: serde_json::json!({"root": "/docs"}),
            }],
            embedding: EmbeddingConfig {
                provider: "openai".to_string(),
                model: "text-embedding-3-large".to_string(),
                dimensions: 3072,
            },
            ontology: OntologyConfig {
                identifiers: vec!["core".to_string()],
                versions: vec!["1.0".to_string()],
            },
            relationship_detection_enabled: true,
            storage_target: StorageTarget {
                kind: "postgres".to_string(),
                identity: "prod-artifacts".to_string(),
            },
        }
    }

    #[test]
    fn identical_configs_produce_identical_run_ids() {
        let a = fingerprint(&sample("docs")).unwrap();
        let b = fingerprint(&sample("docs")).unwrap();
        assert_eq!(a.run_id, b.run_id);
        assert_eq!(a.config_hash, b.config_hash);
        assert_eq!(a.run_id.len(), 16);
        assert_eq!(a.config_hash.len(), 64);
    }

    #[test]
    fn different_configs_produce_different_run_ids() {
        let a = fingerprint(&sample("docs-a")).unwrap();
        let b = fingerprint(&sample("docs-b")).unwrap();
        assert_ne!(a.run_id, b.run_id);
    }

    #[test]
    fn empty_sources_is_config_invalid() {
        let mut snapshot = sample("docs");
        snapshot.sources.clear();
        assert!(matches!(fingerprint(&snapshot), Err(FingerprintError::NoSources)));
    }

    #[test]
    fn empty_storage_identity_is_config_invalid() {
        let mut snapshot = sample("docs");
        snapshot.storage_target.identity.clear();
        assert!(matches!(fingerprint(&snapshot), Err(FingerprintError::MissingStorageTarget)));
    }

    #[test]
    fn field_order_does_not_affect_fingerprint() {
        // Serialized struct field order is fixed by Rust, but canonicalization
        // must still be stable if the snapshot arrived via a map-based format
        // (TOML/JSON) with different key order; simulate that by round-tripping
        // through an object with keys inserted in reverse.
        let snapshot = sample("docs");
        let value = serde_json::to_value(&snapshot).unwrap();
        let reversed = if let serde_json::Value::Object(map) = &value {
            let mut reversed = serde_json::Map::new();
            for (k, v) in map.iter().rev() {
                reversed.insert(k.clone(), v.clone());
            }
            serde_json::Value::Object(reversed)
        } else {
            unreachable!()
        };
        let canon_a = canonical::to_canonical_bytes(&canonical::canonicalize(&value));
        let canon_b = canonical::to_canonical_bytes(&canonical::canonicalize(&reversed));
        assert_eq!(canon_a, canon_b);
    }
}
