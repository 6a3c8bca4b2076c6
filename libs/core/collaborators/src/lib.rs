// [libs/core/collaborators/src/lib.rs]
//! External collaborator contracts.
//!
//! The core treats content sources, the document pipeline, the
//! relationship detector and the artifact store as pure functions over a
//! document: parsing, embedding, ontology/entity extraction and any
//! specific artifact schema are explicit non-goals. This crate
//! only defines the trait boundary; concrete adapters (a real file-system
//! source, a real embedding pipeline) live outside this repository and
//! are injected by the binary that wires a run together — there is no
//! dynamic plugin discovery.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

/// Metadata describing one document as enumerated by a [`ContentSource`],
/// prior to fetching its bytes.
#[derive(Debug, Clone)]
pub struct DocumentMetadata {
    pub doc_id: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub file_size: Option<u64>,
    pub extra: BTreeMap<String, String>,
}

/// The bytes and change-detection fingerprint of one fetched document.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub bytes: Vec<u8>,
    pub content_hash: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: u64,
}

#[derive(Debug, Error)]
pub enum SourceError {
    /// Maps to `TransientSourceError`: fetch failed but may
    /// succeed on retry (network blip, rate limit).
    #[error("transient source error: {0}")]
    Transient(String),
    /// Maps to `PermanentSourceError`: not found, unauthorized,
    /// or malformed beyond recovery.
    #[error("permanent source error: {0}")]
    Permanent(String),
}

/// A named, typed origin of documents.
///
/// A source's identity is `(name, type, canonical_parameters)`; two
/// `ContentSource` instances with the same identity are interchangeable
/// for fingerprinting purposes.
#[async_trait]
pub trait ContentSource: Send + Sync {
    fn name(&self) -> &str;
    fn source_type(&self) -> &str;

    /// Enumerates every document this source currently offers. Stable
    /// and finite; a source with unbounded content should paginate
    /// internally and still return a finite snapshot per call.
    async fn enumerate(&self) -> Result<Vec<DocumentMetadata>, SourceError>;

    /// Fetches one document's bytes and change-detection fingerprint.
    async fn fetch(&self, doc_id: &str) -> Result<FetchedDocument, SourceError>;
}

/// One outbound link discovered while processing a document.
#[derive(Debug, Clone)]
pub struct OutboundLink {
    pub child_doc_id: String,
    pub source_name: String,
}

/// The artifacts and discovered links produced by processing one
/// document.
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub elements: Vec<serde_json_like::Element>,
    pub entities: Vec<serde_json_like::Entity>,
    pub outbound_links: Vec<OutboundLink>,
    pub content_hash: String,
}

/// Minimal structural stand-ins for the artifact shapes this core never
/// interprets — only routes to the [`ArtifactStore`]. A real pipeline
/// would produce richer, domain-specific structures; the core's contract
/// with it is limited to "some elements, some entities, some links, a
/// hash".
pub mod serde_json_like {
    #[derive(Debug, Clone)]
    pub struct Element {
        pub element_id: String,
        pub payload: String,
    }

    #[derive(Debug, Clone)]
    pub struct Entity {
        pub entity_id: String,
        pub payload: String,
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Treated as transient unless the pipeline reports permanent.
    #[error("transient pipeline error: {0}")]
    Transient(String),
    #[error("permanent pipeline error: {0}")]
    Permanent(String),
}

/// Parses, embeds, and extracts from one document.
///
/// Must be idempotent: repeated calls with identical inputs produce
/// identical artifact writes, deduplicated by the artifact store.
#[async_trait]
pub trait DocumentPipeline: Send + Sync {
    async fn process(
        &self,
        doc_id: &str,
        bytes: &[u8],
        metadata: &DocumentMetadata,
    ) -> Result<ProcessedDocument, PipelineError>;
}

/// Summary returned by one [`RelationshipDetector::detect`] invocation.
#[derive(Debug, Clone, Default)]
pub struct DetectionSummary {
    pub relationships_written: u64,
}

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("relationship detection failed: {0}")]
    Fatal(String),
}

/// The post-processing collaborator.
///
/// Must be idempotent and interruption-safe: partial progress from a
/// crashed post-processing phase is fine, repeated full invocations
/// converge to the same result.
#[async_trait]
pub trait RelationshipDetector: Send + Sync {
    async fn detect(&self, run_id: &str) -> Result<DetectionSummary, DetectorError>;
}

#[derive(Debug, Error)]
#[error("artifact store error: {0}")]
pub struct ArtifactStoreError(pub String);

/// The artifact store: idempotent on `(doc_id, element_id)` /
/// `(doc_id, entity_id)` primary keys, tolerating concurrent duplicate
/// writes from retried workers.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put_elements(
        &self,
        doc_id: &str,
        elements: &[serde_json_like::Element],
    ) -> Result<(), ArtifactStoreError>;

    async fn put_entities(
        &self,
        doc_id: &str,
        entities: &[serde_json_like::Entity],
    ) -> Result<(), ArtifactStoreError>;

    async fn put_relationships(&self, run_id: &str, count: u64) -> Result<(), ArtifactStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeSource {
        docs: Vec<(String, Vec<u8>)>,
    }

    #[async_trait]
    impl ContentSource for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        fn source_type(&self) -> &str {
            "memory"
        }

        async fn enumerate(&self) -> Result<Vec<DocumentMetadata>, SourceError> {
            Ok(self
                .docs
                .iter()
                .map(|(id, _)| DocumentMetadata {
                    doc_id: id.clone(),
                    last_modified: None,
                    file_size: None,
                    extra: BTreeMap::new(),
                })
                .collect())
        }

        async fn fetch(&self, doc_id: &str) -> Result<FetchedDocument, SourceError> {
            let (_, bytes) = self
                .docs
                .iter()
                .find(|(id, _)| id == doc_id)
                .ok_or_else(|| SourceError::Permanent(format!("no such doc: {doc_id}")))?;
            Ok(FetchedDocument {
                bytes: bytes.clone(),
                content_hash: format!("hash-{doc_id}"),
                last_modified: None,
                size: bytes.len() as u64,
            })
        }
    }

    struct FakePipeline;

    #[async_trait]
    impl DocumentPipeline for FakePipeline {
        async fn process(
            &self,
            doc_id: &str,
            bytes: &[u8],
            _metadata: &DocumentMetadata,
        ) -> Result<ProcessedDocument, PipelineError> {
            if bytes.is_empty() {
                return Err(PipelineError::Permanent("empty document".to_string()));
            }
            Ok(ProcessedDocument {
                elements: vec![serde_json_like::Element {
                    element_id: format!("{doc_id}-e1"),
                    payload: "stub".to_string(),
                }],
                entities: vec![],
                outbound_links: vec![],
                content_hash: format!("hash-{doc_id}"),
            })
        }
    }

    struct FakeStore {
        puts: Mutex<u64>,
    }

    #[async_trait]
    impl ArtifactStore for FakeStore {
        async fn put_elements(
            &self,
            _doc_id: &str,
            elements: &[serde_json_like::Element],
        ) -> Result<(), ArtifactStoreError> {
            *self.puts.lock().unwrap() += elements.len() as u64;
            Ok(())
        }

        async fn put_entities(
            &self,
            _doc_id: &str,
            _entities: &[serde_json_like::Entity],
        ) -> Result<(), ArtifactStoreError> {
            Ok(())
        }

        async fn put_relationships(&self, _run_id: &str, _count: u64) -> Result<(), ArtifactStoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn pipeline_round_trip_via_store() {
        let source = FakeSource {
            docs: vec![("doc-1".to_string(), b"hello".to_vec())],
        };
        let pipeline = FakePipeline;
        let store = FakeStore { puts: Mutex::new(0) };

        let listed = source.enumerate().await.unwrap();
        assert_eq!(listed.len(), 1);

        let fetched = source.fetch(&listed[0].doc_id).await.unwrap();
        let processed = pipeline
            .process(&listed[0].doc_id, &fetched.bytes, &listed[0])
            .await
            .unwrap();
        store
            .put_elements(&listed[0].doc_id, &processed.elements)
            .await
            .unwrap();

        assert_eq!(*store.puts.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_document_is_permanent_pipeline_error() {
        let pipeline = FakePipeline;
        let metadata = DocumentMetadata {
            doc_id: "doc-empty".to_string(),
            last_modified: None,
            file_size: None,
            extra: BTreeMap::new(),
        };
        let err = pipeline.process("doc-empty", &[], &metadata).await.unwrap_err();
        assert!(matches!(err, PipelineError::Permanent(_)));
    }

    #[tokio::test]
    async fn fetch_unknown_doc_is_permanent_source_error() {
        let source = FakeSource { docs: vec![] };
        let err = source.fetch("missing").await.unwrap_err();
        assert!(matches!(err, SourceError::Permanent(_)));
    }
}
