//! Pipeline Module
//!
//! The incremental regeneration pipeline: a cycle controller that walks the
//! working cache and a scheduler that re-runs it forever.

pub mod controller;
pub mod outcome;
pub mod scheduler;

pub use controller::{CycleController, RunGuard};
pub use outcome::{CycleOutcome, CycleSummary, OutcomeStatus};
pub use scheduler::{Scheduler, SchedulerStats};

use tokio::time::Duration;

use crate::cache::{DEFAULT_MAX_ENTRIES, DEFAULT_TTL};
use crate::generator::caption::DEFAULT_CALL_TIMEOUT;
use crate::generator::{PromptTemplate, DEFAULT_MODEL, DEFAULT_PERSONA};

/// Everything that tunes a regeneration run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Lifetime of a working cache entry
    pub ttl: Duration,
    /// Pause between records, protecting the generation service from bursts
    pub record_delay: Duration,
    /// Page size used when bulk-loading from the store
    pub batch_size: usize,
    pub model: String,
    /// System instruction sent with every prompt
    pub persona: String,
    pub prompt_template: PromptTemplate,
    /// Upper bound on each generation call and each caption update
    pub call_timeout: Duration,
    pub max_entries: usize,
    /// Refresh the cache from the store before every scheduled cycle after the first
    pub reload_each_cycle: bool,
    /// Scheduler period
    pub interval: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            record_delay: Duration::from_millis(1500),
            batch_size: 100,
            model: DEFAULT_MODEL.to_string(),
            persona: DEFAULT_PERSONA.to_string(),
            prompt_template: PromptTemplate::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            max_entries: DEFAULT_MAX_ENTRIES,
            reload_each_cycle: true,
            interval: Duration::from_secs(60 * 60),
        }
    }
}
