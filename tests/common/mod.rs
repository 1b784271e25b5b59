#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::time::Duration;

use caption_refresh::catalog::{Record, RecordStore, StoreError};
use caption_refresh::generator::LLMProvider;

/// In-memory store that records every call made against it.
#[derive(Default)]
pub struct MockStore {
    records: Mutex<Vec<Record>>,
    pub update_calls: Mutex<Vec<(String, String)>>,
    pub fetch_by_id_calls: Mutex<Vec<String>>,
    pub page_calls: AtomicUsize,
    failing_ids: Mutex<HashSet<String>>,
    stalled_ids: Mutex<HashSet<String>>,
    reads_failing: AtomicBool,
}

impl MockStore {
    pub fn with_records(records: Vec<Record>) -> Self {
        let store = Self::default();
        *store.records.lock().unwrap() = records;
        store
    }

    pub fn push(&self, record: Record) {
        self.records.lock().unwrap().push(record);
    }

    /// While set, `count` and `fetch_page` fail as if the connection dropped.
    pub fn set_reads_failing(&self, failing: bool) {
        self.reads_failing.store(failing, Ordering::SeqCst);
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.reads_failing.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("connection refused".to_string()));
        }
        Ok(())
    }

    pub fn remove(&self, id: &str) {
        self.records.lock().unwrap().retain(|r| r.id != id);
    }

    /// Updates for `id` fail as if the connection dropped.
    pub fn fail_updates_for(&self, id: &str) {
        self.failing_ids.lock().unwrap().insert(id.to_string());
    }

    /// Updates for `id` hang for an hour.
    pub fn stall_updates_for(&self, id: &str) {
        self.stalled_ids.lock().unwrap().insert(id.to_string());
    }

    pub fn caption_of(&self, id: &str) -> Option<String> {
        self.records.lock().unwrap().iter().find(|r| r.id == id).map(|r| r.caption.clone())
    }

    pub fn updated_ids(&self) -> Vec<String> {
        self.update_calls.lock().unwrap().iter().map(|(id, _)| id.clone()).collect()
    }
}

#[async_trait]
impl RecordStore for MockStore {
    async fn count(&self) -> Result<u64, StoreError> {
        self.check_reads()?;
        Ok(self.records.lock().unwrap().len() as u64)
    }

    async fn fetch_page(&self, offset: u64, limit: usize) -> Result<Vec<Record>, StoreError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;
        let records = self.records.lock().unwrap();
        Ok(records.iter().skip(offset as usize).take(limit).cloned().collect())
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<Record>, StoreError> {
        self.fetch_by_id_calls.lock().unwrap().push(id.to_string());
        Ok(self.records.lock().unwrap().iter().find(|r| r.id == id).cloned())
    }

    async fn update_caption(&self, id: &str, caption: &str) -> Result<Option<Record>, StoreError> {
        self.update_calls.lock().unwrap().push((id.to_string(), caption.to_string()));

        if self.failing_ids.lock().unwrap().contains(id) {
            return Err(StoreError::Connection("connection reset by peer".to_string()));
        }
        let stalled = self.stalled_ids.lock().unwrap().contains(id);
        if stalled {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        let mut records = self.records.lock().unwrap();
        Ok(records.iter_mut().find(|r| r.id == id).map(|r| {
            r.caption = caption.to_string();
            r.clone()
        }))
    }
}

/// Replies by looking for a needle in the prompt; falls back to a default.
pub struct ScriptedProvider {
    default_reply: String,
    script: Vec<(String, Result<String, String>)>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(default_reply: &str) -> Self {
        Self {
            default_reply: default_reply.to_string(),
            script: Vec::new(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn reply_when(mut self, needle: &str, reply: &str) -> Self {
        self.script.push((needle.to_string(), Ok(reply.to_string())));
        self
    }

    pub fn fail_when(mut self, needle: &str, error: &str) -> Self {
        self.script.push((needle.to_string(), Err(error.to_string())));
        self
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn generate(&self, _model: &str, prompt: String, _system: Option<String>) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.clone());

        for (needle, reply) in &self.script {
            if prompt.contains(needle.as_str()) {
                return match reply {
                    Ok(text) => Ok(text.clone()),
                    Err(e) => Err(anyhow::anyhow!(e.clone())),
                };
            }
        }
        Ok(self.default_reply.clone())
    }
}

/// A record whose default-template prompt contains `<<id>>`.
pub fn record(id: &str, caption: &str) -> Record {
    Record {
        id: id.to_string(),
        title: format!("<<{}>>", id),
        language: "English".to_string(),
        quality: "720p".to_string(),
        format: "BluRay".to_string(),
        codec: "x265".to_string(),
        file_type: "mp4".to_string(),
        size: 734_003_200,
        caption: caption.to_string(),
    }
}

pub fn needle(id: &str) -> String {
    format!("<<{}>>", id)
}
