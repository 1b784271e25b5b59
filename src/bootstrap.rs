//! Process bootstrap: connect, snapshot, load, then schedule forever.

use anyhow::{Context, Result};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

use crate::catalog::{RecordStore, SnapshotWriter, SqliteRecordStore};
use crate::config::PipelineConfig;
use crate::generator::LLMProvider;
use crate::pipeline::{CycleController, PipelineOptions, Scheduler, SchedulerStats};

/// Open the SQLite catalog and the configured provider, then run the pipeline
/// until `shutdown` resolves. Any store failure here is fatal.
pub async fn run<F>(config: &PipelineConfig, shutdown: F) -> Result<SchedulerStats>
where
    F: Future<Output = ()>,
{
    let store = SqliteRecordStore::open(&config.db_path)
        .await
        .context("Failed to connect to record store")?;
    let provider = config.build_provider()?;

    let stats = run_pipeline(
        Arc::new(store),
        provider,
        config.options(),
        &config.snapshot_path,
        shutdown,
    )
    .await?;

    info!("Record store at {:?} closed", config.db_path);
    Ok(stats)
}

/// Snapshot, initial cache load, then the scheduler (whose first tick is the
/// initial cycle). The store handle is dropped when this returns.
pub async fn run_pipeline<F>(
    store: Arc<dyn RecordStore>,
    provider: Arc<dyn LLMProvider>,
    options: PipelineOptions,
    snapshot_path: &Path,
    shutdown: F,
) -> Result<SchedulerStats>
where
    F: Future<Output = ()>,
{
    let total = store.count().await.context("Record store is not reachable")?;
    info!("Connected to record store ({} records)", total);

    let snapshot = SnapshotWriter::new(snapshot_path).with_batch_size(options.batch_size);
    if let Err(e) = snapshot.write_snapshot(store.as_ref()).await {
        error!("Snapshot failed, continuing without a fresh backup: {:#}", e);
    }

    let period = options.interval;
    let controller = Arc::new(CycleController::new(store, provider, options));
    controller.load().await.context("Initial cache load failed")?;

    let stats = Scheduler::new(controller, period).run_until(shutdown).await;
    Ok(stats)
}
