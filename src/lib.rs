//! Caption Refresh
//!
//! Periodically regenerates the caption of every record in a media catalog
//! through an external text-generation service:
//! - Record store contract with a SQLite adapter and JSON snapshots
//! - TTL-bounded working cache
//! - Caption generator over Ollama or OpenAI-compatible providers
//! - Paced, single-worker regeneration cycles on a fixed schedule

pub mod bootstrap;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod generator;
pub mod pipeline;
pub mod utils;

// Re-exports for convenience
pub use cache::WorkingCache;
pub use catalog::{Record, RecordStore, SqliteRecordStore, StoreError};
pub use config::PipelineConfig;
pub use generator::{CaptionGenerator, LLMProvider};
pub use pipeline::{CycleController, CycleSummary, PipelineOptions, Scheduler};
