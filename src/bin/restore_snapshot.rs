//! Manual recovery: load a caption snapshot back into the SQLite catalog.
//!
//! Usage: restore_snapshot [snapshot.json] [catalog.db]
//! Defaults come from CAPTION_SNAPSHOT_PATH / CAPTION_DB_PATH.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tracing::info;

use caption_refresh::catalog::{read_snapshot, RecordStore, SqliteRecordStore};
use caption_refresh::config::PipelineConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = PipelineConfig::from_env()?;
    let mut args = std::env::args().skip(1);
    let snapshot_path = args.next().map(PathBuf::from).unwrap_or(config.snapshot_path);
    let db_path = args.next().map(PathBuf::from).unwrap_or(config.db_path);

    if !snapshot_path.exists() {
        bail!("Snapshot file not found at {:?}", snapshot_path);
    }

    let records = read_snapshot(&snapshot_path).await?;
    info!("Read {} records from {:?}", records.len(), snapshot_path);

    let store = SqliteRecordStore::open(&db_path)
        .await
        .context("Failed to open record store")?;

    for (i, record) in records.into_iter().enumerate() {
        if i % 100 == 0 {
            info!("Restoring record {}", i);
        }
        store.upsert(record).await?;
    }

    info!("Restore complete, store now holds {} records", store.count().await?);
    Ok(())
}
