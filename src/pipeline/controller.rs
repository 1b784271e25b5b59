//! Regeneration Cycle Controller
//!
//! Drives one pass over the working cache: generate a caption for each cached
//! record, persist it, refresh the cache entry, then pace before the next one.
//! Records are processed strictly one at a time.
//!
//! Error policy:
//! - cache miss, empty generation, vanished record, update timeout: recorded
//!   as an outcome for that record, the loop continues
//! - a store error: the rest of the cycle is abandoned and the error returned
//!
//! A stop request ends the cycle at the next record boundary (or cuts the
//! pacing delay short) and returns the partial summary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::outcome::{CycleOutcome, CycleSummary, OutcomeStatus};
use super::PipelineOptions;
use crate::cache::WorkingCache;
use crate::catalog::{fetch_all, RecordStore, StoreError};
use crate::generator::{CaptionGenerator, LLMProvider};
use crate::utils::truncate_for_log;

/// Holds the controller's single run slot until dropped.
pub struct RunGuard {
    slot: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.slot.store(false, Ordering::Release);
    }
}

pub struct CycleController {
    store: Arc<dyn RecordStore>,
    cache: WorkingCache,
    generator: CaptionGenerator,
    options: PipelineOptions,
    slot: Arc<AtomicBool>,
    stop: watch::Sender<bool>,
}

impl CycleController {
    pub fn new(store: Arc<dyn RecordStore>, provider: Arc<dyn LLMProvider>, options: PipelineOptions) -> Self {
        let cache = WorkingCache::new(options.ttl).with_max_entries(options.max_entries);
        let generator = CaptionGenerator::new(provider, options.model.clone())
            .with_persona(options.persona.clone())
            .with_template(options.prompt_template.clone())
            .with_timeout(options.call_timeout);

        Self {
            store,
            cache,
            generator,
            options,
            slot: Arc::new(AtomicBool::new(false)),
            stop: watch::Sender::new(false),
        }
    }

    pub fn cache(&self) -> &WorkingCache {
        &self.cache
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn is_running(&self) -> bool {
        self.slot.load(Ordering::Acquire)
    }

    /// Ask the active cycle, and any later one, to stop at the next record
    /// boundary. Sticky for the life of the controller.
    pub fn request_stop(&self) {
        self.stop.send_replace(true);
    }

    pub fn stop_requested(&self) -> bool {
        *self.stop.borrow()
    }

    /// Claim the run slot, or `None` if a cycle is already active.
    pub fn try_acquire(&self) -> Option<RunGuard> {
        self.slot
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard { slot: self.slot.clone() })
    }

    /// Bulk-load the whole store into the working cache, page by page.
    pub async fn load(&self) -> Result<usize, StoreError> {
        let records = fetch_all(self.store.as_ref(), self.options.batch_size).await?;
        let count = records.len();
        self.cache.load(records).await;
        info!("Working cache loaded with {} records", count);
        Ok(count)
    }

    /// Run a cycle unless one is already active. Returns `None` when the
    /// request was dropped.
    pub async fn try_run_cycle(&self, reload: bool) -> Option<Result<CycleSummary, StoreError>> {
        let Some(guard) = self.try_acquire() else {
            warn!("Regeneration cycle already running, dropping run request");
            return None;
        };
        Some(self.run_guarded(guard, reload).await)
    }

    /// Run a cycle under an already acquired slot, reloading the cache first
    /// when asked to. The slot is released when this returns.
    pub async fn run_guarded(&self, guard: RunGuard, reload: bool) -> Result<CycleSummary, StoreError> {
        let _guard = guard;
        if reload {
            if let Err(e) = self.load().await {
                error!("Cache reload failed, skipping this cycle: {}", e);
                return Err(e);
            }
        }
        self.run_cycle().await
    }

    /// One full pass over the keys present in the cache right now.
    pub async fn run_cycle(&self) -> Result<CycleSummary, StoreError> {
        let cycle_id = Uuid::new_v4();
        self.run_cycle_inner(cycle_id)
            .instrument(info_span!("cycle", id = %cycle_id))
            .await
    }

    async fn run_cycle_inner(&self, cycle_id: Uuid) -> Result<CycleSummary, StoreError> {
        let keys = self.cache.keys().await;
        let mut summary = CycleSummary::new(cycle_id, keys.len());
        let mut stop = self.stop.subscribe();
        info!("Regeneration cycle started over {} cached records", keys.len());

        for (idx, id) in keys.iter().enumerate() {
            let stop_now = *stop.borrow();
            if stop_now {
                summary.finish();
                warn!("Stop requested, regeneration cycle interrupted ({})", summary);
                return Ok(summary);
            }

            let outcome = match self.process(id).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    summary.finish();
                    error!("Record store failure at record {}, aborting cycle ({}): {}", id, summary, e);
                    return Err(e);
                }
            };

            let called_service = outcome.status != OutcomeStatus::SkippedMissingFromCache;
            summary.record(outcome);

            if called_service && idx + 1 < keys.len() {
                tokio::select! {
                    _ = sleep(self.options.record_delay) => {}
                    _ = stopped(&mut stop) => {}
                }
            }
        }

        summary.finish();
        info!("Regeneration cycle finished: {}", summary);
        Ok(summary)
    }

    async fn process(&self, id: &str) -> Result<CycleOutcome, StoreError> {
        let Some(record) = self.cache.get(id).await else {
            info!("Record {} missing from cache, skipping", id);
            return Ok(CycleOutcome::new(id, OutcomeStatus::SkippedMissingFromCache));
        };

        let Some(caption) = self.generator.generate(&record).await else {
            warn!("Skipping record {}: no caption generated", id);
            return Ok(CycleOutcome::new(id, OutcomeStatus::SkippedEmptyGeneration));
        };

        match timeout(self.options.call_timeout, self.store.update_caption(id, &caption)).await {
            Err(_) => {
                warn!("Caption update for record {} timed out after {:?}", id, self.options.call_timeout);
                Ok(CycleOutcome::failed(id, format!("store update timed out after {:?}", self.options.call_timeout)))
            }
            Ok(Err(e)) => Err(e),
            Ok(Ok(None)) => {
                warn!("Record {} no longer exists in the store", id);
                Ok(CycleOutcome::failed(id, "record not found in store"))
            }
            Ok(Ok(Some(updated))) => {
                info!("Updated caption for record {}: {}", id, truncate_for_log(&updated.caption, 80));
                self.cache.put(id, updated).await;
                Ok(CycleOutcome::new(id, OutcomeStatus::Updated))
            }
        }
    }
}

/// Resolves once a stop has been requested.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    if stop.wait_for(|requested| *requested).await.is_err() {
        std::future::pending::<()>().await;
    }
}
