// [apps/coordinator/src/reaper.rs]
//! Stale-work reaper: periodically returns abandoned claims to
//! `pending` and marks workers that stopped heartbeating as `failed`,
//! sweeping stale records on a fixed interval.

use ingest_infra_store::{QueueRepository, StoreClient, WorkerRepository};
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, instrument, warn};

pub struct ReaperConfig {
    pub run_id: String,
    pub claim_timeout_sec: i64,
    pub worker_timeout_sec: i64,
    pub tick_interval_sec: u64,
}

/// Runs the reaper sweep forever on a fixed tick. Intended to be spawned
/// as its own task by whichever worker currently holds leadership, or by
/// every worker — reclamation is idempotent, so redundant sweeps from
/// multiple workers are harmless.
#[instrument(skip(store, config))]
pub async fn run_reaper_loop(store: StoreClient, config: ReaperConfig) {
    let mut ticker = interval(Duration::from_secs(config.tick_interval_sec));
    info!(run_id = %config.run_id, "reaper loop started");

    loop {
        ticker.tick().await;
        if let Err(e) = sweep_once(&store, &config).await {
            warn!(run_id = %config.run_id, error = %e, "reaper sweep failed, will retry next tick");
        }
    }
}

async fn sweep_once(store: &StoreClient, config: &ReaperConfig) -> Result<(), ingest_infra_store::StoreError> {
    let conn = store.connection()?;
    let queue = QueueRepository::new(conn);
    let reclaimed = queue.reclaim_stale(&config.run_id, config.claim_timeout_sec).await?;
    if reclaimed > 0 {
        info!(run_id = %config.run_id, reclaimed, "reclaimed stale queue items");
    }

    let conn = store.connection()?;
    let workers = WorkerRepository::new(conn);
    let timed_out = workers.mark_timed_out_workers(&config.run_id, config.worker_timeout_sec).await?;
    if timed_out > 0 {
        warn!(run_id = %config.run_id, timed_out, "marked workers as failed after heartbeat timeout");
    }

    Ok(())
}
