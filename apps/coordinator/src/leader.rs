// [apps/coordinator/src/leader.rs]
//! Leader election: a lease-based election where any worker may
//! attempt to become leader, and only the leader is allowed to drive
//! post-processing.

use ingest_infra_store::{RunRepository, StoreError};
use tracing::{debug, instrument};

pub struct LeaderElector {
    run_id: String,
    worker_id: String,
    lease_seconds: i64,
}

impl LeaderElector {
    pub fn new(run_id: impl Into<String>, worker_id: impl Into<String>, lease_seconds: i64) -> Self {
        Self {
            run_id: run_id.into(),
            worker_id: worker_id.into(),
            lease_seconds,
        }
    }

    /// Attempts to become (or remain) leader; a worker should call this
    /// once per poll loop iteration and only drive post-processing while
    /// it returns `true`.
    #[instrument(skip(self, runs))]
    pub async fn attempt(&self, runs: &RunRepository) -> Result<bool, StoreError> {
        let acquired = runs
            .attempt_leader_election(&self.run_id, &self.worker_id, self.lease_seconds)
            .await?;
        debug!(run_id = %self.run_id, worker_id = %self.worker_id, acquired, "leader election attempt");
        Ok(acquired)
    }

    /// Renews an already-held lease without re-running election logic.
    #[instrument(skip(self, runs))]
    pub async fn renew(&self, runs: &RunRepository) -> Result<bool, StoreError> {
        runs.renew_leader_lease(&self.run_id, &self.worker_id, self.lease_seconds).await
    }
}
