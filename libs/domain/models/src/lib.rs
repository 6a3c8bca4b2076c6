// [libs/domain/models/src/lib.rs]
//! Domain model single source of truth for the ingestion coordinator.
//!
//! Every type here is a plain data definition — no I/O, no SQL. The
//! persistence adapter (`ingest-infra-store`) maps rows to and from
//! these structs; nothing else should reach for a raw DB row.

pub mod config_snapshot;
pub mod dependency;
pub mod queue_item;
pub mod run;
pub mod worker;

pub use config_snapshot::{ConfigSnapshot, EmbeddingConfig, OntologyConfig, SourceConfig, StorageTarget};
pub use dependency::{DocumentDependency, LinkType};
pub use queue_item::{QueueItem, QueueItemStatus, SourceType};
pub use run::{Run, RunStatus};
pub use worker::{Worker, WorkerStatus};
