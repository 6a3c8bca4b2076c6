// [libs/infra/store/src/repositories/mod.rs]
//! One repository per entity, each wrapping a single
//! `libsql::Connection` — no repository holds its own pool, so callers
//! are free to open a fresh connection per request or per worker loop
//! iteration.

pub mod dependency;
pub mod queue;
pub mod run;
pub mod worker;

pub use dependency::DependencyRepository;
pub use queue::QueueRepository;
pub use run::RunRepository;
pub use worker::WorkerRepository;
