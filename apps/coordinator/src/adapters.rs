// [apps/coordinator/src/adapters.rs]
//! Built-in reference collaborator adapters.
//!
//! Parsing, embedding and entity extraction algorithms are explicit
//! non-goals of this coordinator; a production deployment supplies its
//! own [`DocumentPipeline`] and [`ArtifactStore`]. What follows are the
//! minimal adapters needed to exercise the coordinator end-to-end
//! against a local directory: a filesystem [`ContentSource`] and a
//! pass-through pipeline/store that do no real content understanding.

use chrono::{DateTime, Utc};
use ingest_core_collaborators::{
    ArtifactStore, ArtifactStoreError, ContentSource, DetectionSummary, DetectorError, DocumentMetadata,
    DocumentPipeline, FetchedDocument, PipelineError, ProcessedDocument, RelationshipDetector, SourceError,
    serde_json_like::{Element, Entity},
};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tracing::info;
use walkdir_like::walk_files;

/// Reads documents from a local directory tree; `doc_id` is the path
/// relative to `root`.
pub struct FilesystemSource {
    name: String,
    root: PathBuf,
}

impl FilesystemSource {
    pub fn new(name: impl Into<String>, root: PathBuf) -> Self {
        Self { name: name.into(), root }
    }
}

#[async_trait::async_trait]
impl ContentSource for FilesystemSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_type(&self) -> &str {
        "filesystem"
    }

    async fn enumerate(&self) -> Result<Vec<DocumentMetadata>, SourceError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || walk_files(&root))
            .await
            .map_err(|e| SourceError::Transient(e.to_string()))?
            .map_err(SourceError::Permanent)
    }

    async fn fetch(&self, doc_id: &str) -> Result<FetchedDocument, SourceError> {
        let path = self.root.join(doc_id);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| SourceError::Permanent(format!("{}: {e}", path.display())))?;
        let meta = tokio::fs::metadata(&path).await.ok();

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let content_hash = hex::encode(hasher.finalize());

        let last_modified: Option<DateTime<Utc>> = meta
            .as_ref()
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from);

        Ok(FetchedDocument {
            size: bytes.len() as u64,
            bytes,
            content_hash,
            last_modified,
        })
    }
}

/// Produces one element carrying the document's hash and no entities or
/// links. Stands in for a real parsing/embedding pipeline, just enough
/// to drive the coordinator's lifecycle.
pub struct PassthroughPipeline;

#[async_trait::async_trait]
impl DocumentPipeline for PassthroughPipeline {
    async fn process(
        &self,
        doc_id: &str,
        bytes: &[u8],
        _metadata: &DocumentMetadata,
    ) -> Result<ProcessedDocument, PipelineError> {
        if bytes.is_empty() {
            return Err(PipelineError::Permanent(format!("{doc_id} has no content")));
        }
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let content_hash = hex::encode(hasher.finalize());

        Ok(ProcessedDocument {
            elements: vec![Element {
                element_id: format!("{doc_id}#0"),
                payload: content_hash.clone(),
            }],
            entities: Vec::<Entity>::new(),
            outbound_links: Vec::new(),
            content_hash,
        })
    }
}

/// Logs artifact counts instead of persisting to a real store. A real
/// deployment's artifact schema is out of scope here.
pub struct LoggingArtifactStore;

#[async_trait::async_trait]
impl ArtifactStore for LoggingArtifactStore {
    async fn put_elements(&self, doc_id: &str, elements: &[Element]) -> Result<(), ArtifactStoreError> {
        info!(doc_id, count = elements.len(), "put_elements");
        Ok(())
    }

    async fn put_entities(&self, doc_id: &str, entities: &[Entity]) -> Result<(), ArtifactStoreError> {
        info!(doc_id, count = entities.len(), "put_entities");
        Ok(())
    }

    async fn put_relationships(&self, run_id: &str, count: u64) -> Result<(), ArtifactStoreError> {
        info!(run_id, count, "put_relationships");
        Ok(())
    }
}

/// No-op relationship detector for runs with no post-processing stage
/// wired in; never invoked when `relationship_detection_enabled` is
/// false.
pub struct NoopRelationshipDetector;

#[async_trait::async_trait]
impl RelationshipDetector for NoopRelationshipDetector {
    async fn detect(&self, run_id: &str) -> Result<DetectionSummary, DetectorError> {
        info!(run_id, "no-op relationship detection");
        Ok(DetectionSummary::default())
    }
}

/// Tiny recursive directory walk, kept local so this reference adapter
/// does not need a dedicated walking crate for one call site.
mod walkdir_like {
    use std::path::Path;

    pub fn walk_files(root: &Path) -> Result<Vec<super::DocumentMetadata>, String> {
        let mut out = Vec::new();
        visit(root, root, &mut out)?;
        Ok(out)
    }

    fn visit(root: &Path, dir: &Path, out: &mut Vec<super::DocumentMetadata>) -> Result<(), String> {
        let entries = std::fs::read_dir(dir).map_err(|e| format!("{}: {e}", dir.display()))?;
        for entry in entries {
            let entry = entry.map_err(|e| e.to_string())?;
            let path = entry.path();
            if path.is_dir() {
                visit(root, &path, out)?;
            } else {
                let relative = path.strip_prefix(root).unwrap_or(&path);
                let meta = entry.metadata().ok();
                out.push(super::DocumentMetadata {
                    doc_id: relative.to_string_lossy().replace('\\', "/"),
                    last_modified: None,
                    file_size: meta.map(|m| m.len()),
                    extra: std::collections::BTreeMap::new(),
                });
            }
        }
        Ok(())
    }
}
