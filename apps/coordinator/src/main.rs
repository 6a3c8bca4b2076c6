// [apps/coordinator/src/main.rs]
//! Coordinator binary entry point: parses the CLI, wires a worker loop
//! together with its adapters, and reports failures via the exit-code
//! taxonomy in `errors.rs`.

use clap::Parser;
use ingest_coordinator::adapters::{FilesystemSource, LoggingArtifactStore, NoopRelationshipDetector, PassthroughPipeline};
use ingest_coordinator::cli::{Cli, Command};
use ingest_coordinator::config::{load_ingestion_config, RuntimeSettings};
use ingest_coordinator::errors::CoordinatorError;
use ingest_coordinator::reaper::{run_reaper_loop, ReaperConfig};
use ingest_coordinator::worker_loop::WorkerLoop;
use ingest_core_collaborators::ContentSource;
use ingest_infra_store::{QueueRepository, RunRepository, StoreClient};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    ingest_shared_telemetry::init_tracing("ingest-coordinator");

    let cli = Cli::parse();
    let result = run(cli).await;

    if let Err(e) = result {
        error!(error = %e, exit_code = e.exit_code(), "coordinator exiting with error");
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<(), CoordinatorError> {
    match cli.command {
        Command::Worker { config } => run_worker(config).await,
        Command::RunStatus { run_id, db_url } => run_status(run_id, db_url).await,
        Command::RunCancel { run_id, db_url } => run_cancel(run_id, db_url).await,
    }
}

async fn run_worker(config_path: PathBuf) -> Result<(), CoordinatorError> {
    let settings = RuntimeSettings::from_env();
    let ingestion_config = load_ingestion_config(&config_path)
        .map_err(|e| CoordinatorError::ConfigInvalid(e.to_string()))?;

    let store = StoreClient::connect(&settings.db_url, settings.db_auth_token.clone())
        .await
        .map_err(CoordinatorError::TransientStore)?;

    let mut sources: HashMap<String, Box<dyn ContentSource>> = HashMap::new();
    for source_config in &ingestion_config.snapshot.sources {
        let root = source_config
            .canonical_parameters
            .get("root")
            .and_then(|v| v.as_str())
            .unwrap_or(".")
            .to_string();
        sources.insert(
            source_config.name.clone(),
            Box::new(FilesystemSource::new(source_config.name.clone(), PathBuf::from(root))),
        );
    }

    let detector: Option<Box<dyn ingest_core_collaborators::RelationshipDetector>> =
        if ingestion_config.snapshot.relationship_detection_enabled {
            Some(Box::new(NoopRelationshipDetector))
        } else {
            None
        };

    let mut worker_loop = WorkerLoop {
        store: store.clone(),
        settings: settings.clone(),
        sources,
        pipeline: Box::new(PassthroughPipeline),
        artifacts: Box::new(LoggingArtifactStore),
        detector,
        capabilities: BTreeSet::new(),
    };

    let fingerprint = ingest_core_fingerprint::fingerprint(&ingestion_config.snapshot)?;
    let reaper_handle = tokio::spawn(run_reaper_loop(
        store.clone(),
        ReaperConfig {
            run_id: fingerprint.run_id.clone(),
            claim_timeout_sec: settings.claim_timeout_sec,
            worker_timeout_sec: settings.worker_timeout_sec,
            tick_interval_sec: settings.reaper_interval_sec,
        },
    ));

    let outcome = worker_loop.run(&ingestion_config).await;
    reaper_handle.abort();
    outcome
}

async fn run_status(run_id: String, db_url: String) -> Result<(), CoordinatorError> {
    let store = StoreClient::connect(&db_url, None).await.map_err(CoordinatorError::TransientStore)?;
    let conn = store.connection().map_err(CoordinatorError::TransientStore)?;
    let runs = RunRepository::new(conn);
    let run = runs.get_run(&run_id).await?;

    let conn = store.connection().map_err(CoordinatorError::TransientStore)?;
    let queue = QueueRepository::new(conn);
    let summary = queue.summarize_queue(&run_id).await?;

    info!(
        run_id,
        status = run.status.as_str(),
        pending = summary.pending,
        processing = summary.processing,
        completed = summary.completed,
        failed = summary.failed,
        retry = summary.retry,
        "run status"
    );
    Ok(())
}

async fn run_cancel(run_id: String, db_url: String) -> Result<(), CoordinatorError> {
    let store = StoreClient::connect(&db_url, None).await.map_err(CoordinatorError::TransientStore)?;
    let conn = store.connection().map_err(CoordinatorError::TransientStore)?;
    let runs = RunRepository::new(conn);
    let run = runs.get_run(&run_id).await?;

    if run.status.is_terminal() {
        info!(run_id, status = run.status.as_str(), "run is already terminal, nothing to cancel");
        return Ok(());
    }

    runs.transition_run(&run_id, run.status, ingest_domain_models::RunStatus::Abandoned).await?;
    info!(run_id, "run abandoned");
    Ok(())
}
