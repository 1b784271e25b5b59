//! Snapshot Writer - durable JSON copy of the catalog taken before any caption
//! is rewritten. Forward-only: the pipeline never reads it back; restoring is a
//! manual step (see the `restore_snapshot` binary).

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use super::{fetch_all, Record, RecordStore};

pub struct SnapshotWriter {
    path: PathBuf,
    batch_size: usize,
}

impl SnapshotWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            batch_size: 500,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    /// Fetch every record and overwrite the snapshot file with them.
    /// Returns the number of records written.
    pub async fn write_snapshot(&self, store: &dyn RecordStore) -> Result<usize> {
        let records = fetch_all(store, self.batch_size)
            .await
            .context("Failed to fetch records for snapshot")?;

        let json = serde_json::to_string_pretty(&records)
            .context("Failed to serialize snapshot")?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await
                    .with_context(|| format!("Failed to create snapshot directory {:?}", parent))?;
            }
        }

        // The previous snapshot stays in place until the new one is complete
        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, json).await
            .with_context(|| format!("Failed to write snapshot file {:?}", tmp_path))?;
        if let Err(e) = fs::rename(&tmp_path, &self.path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e).with_context(|| format!("Failed to replace snapshot file {:?}", self.path));
        }

        info!("Snapshot of {} records written to {:?}", records.len(), self.path);
        Ok(records.len())
    }
}

/// Read a snapshot file back. Only used by manual recovery tooling.
pub async fn read_snapshot(path: impl AsRef<Path>) -> Result<Vec<Record>> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).await
        .with_context(|| format!("Failed to read snapshot file {:?}", path))?;

    let records = serde_json::from_str(&json)
        .context("Failed to deserialize snapshot")?;

    Ok(records)
}
