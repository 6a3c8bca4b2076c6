// [apps/coordinator/src/errors.rs]
//! Top-level error taxonomy and process exit codes.
//!
//! A worker process's exit code tells the operator (or the supervising
//! process manager) what kind of failure it was without needing to
//! parse logs: `0` clean, `2` transient (restart and it'll likely
//! recover), `3` permanent (config or source problem, restarting won't
//! help), `4` the run itself reached a terminal state.

use ingest_core_collaborators::{DetectorError, PipelineError, SourceError};
use ingest_core_fingerprint::FingerprintError;
use ingest_infra_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("config invalid: {0}")]
    ConfigInvalid(String),

    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),

    #[error("transient store error: {0}")]
    TransientStore(#[from] StoreError),

    #[error("transient source error: {0}")]
    TransientSource(String),

    #[error("permanent source error: {0}")]
    PermanentSource(String),

    #[error("pipeline error: {0}")]
    Pipeline(String),

    #[error("relationship detection failed: {0}")]
    Detection(String),

    #[error("run {0} has reached a terminal state")]
    RunTerminal(String),
}

impl CoordinatorError {
    /// Process exit code per the failure taxonomy.
    pub fn exit_code(&self) -> i32 {
        match self {
            CoordinatorError::ConfigInvalid(_) | CoordinatorError::Fingerprint(_) => 3,
            CoordinatorError::TransientStore(_) | CoordinatorError::TransientSource(_) => 2,
            CoordinatorError::PermanentSource(_) | CoordinatorError::Pipeline(_) => 3,
            CoordinatorError::Detection(_) => 2,
            CoordinatorError::RunTerminal(_) => 4,
        }
    }
}

impl From<SourceError> for CoordinatorError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::Transient(msg) => CoordinatorError::TransientSource(msg),
            SourceError::Permanent(msg) => CoordinatorError::PermanentSource(msg),
        }
    }
}

impl From<PipelineError> for CoordinatorError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Transient(msg) => CoordinatorError::TransientSource(msg),
            PipelineError::Permanent(msg) => CoordinatorError::Pipeline(msg),
        }
    }
}

impl From<DetectorError> for CoordinatorError {
    fn from(e: DetectorError) -> Self {
        match e {
            DetectorError::Fatal(msg) => CoordinatorError::Detection(msg),
        }
    }
}
