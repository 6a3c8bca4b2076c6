// [apps/coordinator/src/config.rs]
//! Configuration loading: the ingestion config (sources, embedding,
//! ontology, storage target — everything that participates in the
//! `run_id` fingerprint) is read from a TOML file; the coordinator's
//! own runtime knobs (store URL, timeouts, worker identity) come from
//! environment variables with built-in defaults, since they affect *how*
//! ingestion runs rather than *what* it produces and have no business
//! sitting in a file that gets hashed.

use ingest_domain_models::IngestionConfig;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

pub fn load_ingestion_config(path: &Path) -> Result<IngestionConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Runtime knobs that never participate in the fingerprint. Each has a
/// conservative default and an environment-variable override.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub db_url: String,
    pub db_auth_token: Option<String>,
    pub worker_id: String,
    pub claim_timeout_sec: i64,
    pub worker_timeout_sec: i64,
    pub leader_lease_sec: i64,
    pub poll_interval_ms: u64,
    pub reaper_interval_sec: u64,
    pub backoff_base_sec: i64,
    pub backoff_cap_sec: i64,
    /// Default `max_link_depth` for documents discovered via links, when
    /// a source does not specify its own.
    pub default_max_link_depth: i64,
    pub default_max_retries: i64,
}

impl RuntimeSettings {
    /// Reads every field from its environment variable, falling back to
    /// stated defaults when unset.
    pub fn from_env() -> Self {
        Self {
            db_url: env_or("COORD_DB_URL", "file:coordinator.db"),
            db_auth_token: std::env::var("COORD_DB_AUTH_TOKEN").ok(),
            worker_id: std::env::var("WORKER_ID").unwrap_or_else(|_| uuid::Uuid::new_v4().to_string()),
            claim_timeout_sec: env_or_parse("CLAIM_TIMEOUT_SEC", 300),
            worker_timeout_sec: env_or_parse("WORKER_TIMEOUT_SEC", 120),
            leader_lease_sec: env_or_parse("LEADER_LEASE_SEC", 30),
            poll_interval_ms: env_or_parse("POLL_INTERVAL_MS", 1000),
            reaper_interval_sec: env_or_parse("REAPER_INTERVAL_SEC", 60),
            backoff_base_sec: env_or_parse("BACKOFF_BASE_SEC", 30),
            backoff_cap_sec: env_or_parse("BACKOFF_CAP_SEC", 900),
            default_max_link_depth: env_or_parse("MAX_LINK_DEPTH", 3),
            default_max_retries: env_or_parse("MAX_RETRIES", 3),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_ingestion_config_parses_minimal_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [snapshot]
            relationship_detection_enabled = true

            [[snapshot.sources]]
            name = "docs"
            source_type = "filesystem"

            [snapshot.embedding]
            provider = "openai"
            model = "text-embedding-3-large"
            dimensions = 3072

            [snapshot.ontology]
            identifiers = ["core"]
            versions = ["1.0"]

            [snapshot.storage_target]
            kind = "postgres"
            identity = "prod-artifacts"
            "#,
        )
        .unwrap();

        let config = load_ingestion_config(&path).unwrap();
        assert_eq!(config.snapshot.sources.len(), 1);
        assert_eq!(config.snapshot.sources[0].name, "docs");
    }

    #[test]
    fn missing_config_file_is_read_error() {
        let err = load_ingestion_config(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
