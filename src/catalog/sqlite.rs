//! SQLite Record Store
//!
//! Concrete `RecordStore` backed by a single SQLite connection that is opened
//! once and shared across cycles. Blocking calls run on the tokio blocking pool.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::task;
use tracing::info;

use super::{Record, RecordStore, StoreError};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS records (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        language TEXT NOT NULL DEFAULT '',
        quality TEXT NOT NULL DEFAULT '',
        format TEXT NOT NULL DEFAULT '',
        codec TEXT NOT NULL DEFAULT '',
        file_type TEXT NOT NULL DEFAULT '',
        size INTEGER NOT NULL DEFAULT 0,
        caption TEXT NOT NULL DEFAULT '',
        updated_at TEXT NOT NULL
    );
"#;

const SELECT_COLUMNS: &str =
    "SELECT id, title, language, quality, format, codec, file_type, size, caption FROM records";

#[derive(Clone)]
pub struct SqliteRecordStore {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// Open (or create) the catalog database and make sure the schema exists.
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = db_path.as_ref().to_path_buf();
        let path_clone = path.clone();

        let conn = task::spawn_blocking(move || {
            let conn = Connection::open(&path_clone)
                .map_err(|e| StoreError::Connection(format!("{}: {}", path_clone.display(), e)))?;
            conn.execute_batch(SCHEMA)?;
            Ok::<_, StoreError>(conn)
        })
        .await??;

        info!("Record store opened at {:?}", path);
        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert a record or replace every field of an existing one.
    /// Used for seeding and snapshot restore; the pipeline never calls it.
    pub async fn upsert(&self, record: Record) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO records (id, title, language, quality, format, codec, file_type, size, caption, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    language = excluded.language,
                    quality = excluded.quality,
                    format = excluded.format,
                    codec = excluded.codec,
                    file_type = excluded.file_type,
                    size = excluded.size,
                    caption = excluded.caption,
                    updated_at = excluded.updated_at",
                params![
                    &record.id,
                    &record.title,
                    &record.language,
                    &record.quality,
                    &record.format,
                    &record.codec,
                    &record.file_type,
                    record.size as i64,
                    &record.caption,
                    &now
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Connection("connection mutex poisoned".to_string()))?;
            f(&mut guard)
        })
        .await?
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<Record> {
    let size: i64 = row.get(7)?;
    Ok(Record {
        id: row.get(0)?,
        title: row.get(1)?,
        language: row.get(2)?,
        quality: row.get(3)?,
        format: row.get(4)?,
        codec: row.get(5)?,
        file_type: row.get(6)?,
        size: size.max(0) as u64,
        caption: row.get(8)?,
    })
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn count(&self) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
        .await
    }

    async fn fetch_page(&self, offset: u64, limit: usize) -> Result<Vec<Record>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!("{} ORDER BY seq ASC LIMIT ?1 OFFSET ?2", SELECT_COLUMNS))?;
            let rows = stmt.query_map(params![limit as i64, offset as i64], row_to_record)?;
            let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<Record>, StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let record = conn
                .query_row(&format!("{} WHERE id = ?1", SELECT_COLUMNS), params![&id], row_to_record)
                .optional()?;
            Ok(record)
        })
        .await
    }

    async fn update_caption(&self, id: &str, caption: &str) -> Result<Option<Record>, StoreError> {
        let id = id.to_string();
        let caption = caption.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let now = Utc::now().to_rfc3339();

            let changed = tx.execute(
                "UPDATE records SET caption = ?1, updated_at = ?2 WHERE id = ?3",
                params![&caption, &now, &id],
            )?;
            if changed == 0 {
                return Ok(None);
            }

            let record = tx.query_row(&format!("{} WHERE id = ?1", SELECT_COLUMNS), params![&id], row_to_record)?;
            tx.commit()?;
            Ok(Some(record))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn movie(id: &str) -> Record {
        Record {
            id: id.to_string(),
            title: format!("Movie {}", id),
            language: "English".to_string(),
            quality: "1080p".to_string(),
            format: "WEB-DL".to_string(),
            codec: "x264".to_string(),
            file_type: "mkv".to_string(),
            size: 1_572_864,
            caption: "old".to_string(),
        }
    }

    #[tokio::test]
    async fn test_id_lookups_use_the_unique_index_only() -> anyhow::Result<()> {
        let temp_file = NamedTempFile::new()?;
        let store = SqliteRecordStore::open(temp_file.path()).await?;

        let indexes: Vec<String> = store
            .with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'records' ORDER BY name",
                )?;
                let names = stmt.query_map([], |row| row.get(0))?.collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await?;

        // Only the implicit index backing UNIQUE(id)
        assert_eq!(indexes.len(), 1);
        assert!(indexes[0].starts_with("sqlite_autoindex_records"));
        Ok(())
    }

    #[tokio::test]
    async fn test_store_workflow() -> anyhow::Result<()> {
        let temp_file = NamedTempFile::new()?;
        let store = SqliteRecordStore::open(temp_file.path()).await?;

        store.upsert(movie("a")).await?;
        store.upsert(movie("b")).await?;
        store.upsert(movie("c")).await?;
        assert_eq!(store.count().await?, 3);

        let page = store.fetch_page(1, 5).await?;
        assert_eq!(page.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["b", "c"]);

        let fetched = store.fetch_by_id("a").await?.expect("record a");
        assert_eq!(fetched, movie("a"));
        assert!(store.fetch_by_id("zzz").await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_update_caption_returns_updated_record() -> anyhow::Result<()> {
        let temp_file = NamedTempFile::new()?;
        let store = SqliteRecordStore::open(temp_file.path()).await?;
        store.upsert(movie("a")).await?;

        let updated = store.update_caption("a", "NEW CAPTION").await?.expect("updated");
        assert_eq!(updated.caption, "NEW CAPTION");
        assert_eq!(updated.title, "Movie a");
        assert_eq!(store.fetch_by_id("a").await?.unwrap().caption, "NEW CAPTION");

        Ok(())
    }

    #[tokio::test]
    async fn test_update_caption_is_idempotent() -> anyhow::Result<()> {
        let temp_file = NamedTempFile::new()?;
        let store = SqliteRecordStore::open(temp_file.path()).await?;
        store.upsert(movie("a")).await?;

        let first = store.update_caption("a", "same").await?;
        let second = store.update_caption("a", "same").await?;

        assert_eq!(first, second);
        assert_eq!(store.count().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_caption_missing_record() -> anyhow::Result<()> {
        let temp_file = NamedTempFile::new()?;
        let store = SqliteRecordStore::open(temp_file.path()).await?;

        assert!(store.update_caption("ghost", "text").await?.is_none());
        assert_eq!(store.count().await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_upsert_keeps_insertion_order() -> anyhow::Result<()> {
        let temp_file = NamedTempFile::new()?;
        let store = SqliteRecordStore::open(temp_file.path()).await?;
        store.upsert(movie("a")).await?;
        store.upsert(movie("b")).await?;
        store.upsert(movie("a").with_caption("replaced")).await?;

        let all = store.fetch_page(0, 10).await?;
        assert_eq!(all[0].id, "a");
        assert_eq!(all[0].caption, "replaced");
        assert_eq!(all[1].id, "b");
        Ok(())
    }

    #[tokio::test]
    async fn test_open_fails_for_unreachable_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("missing").join("nested").join("catalog.db");

        let result = SqliteRecordStore::open(&path).await;
        assert!(matches!(result, Err(StoreError::Connection(_))));
    }
}
