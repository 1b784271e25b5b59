//! Configuration
//!
//! Read from the environment (and a `.env` file, loaded by `main`). Every
//! variable is optional; a value that is present but unparsable is an error.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::time::Duration;

use crate::generator::{LLMProvider, OllamaProvider, OpenAICompatibleProvider, PromptTemplate, DEFAULT_MODEL, DEFAULT_PERSONA};
use crate::pipeline::PipelineOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Ollama,
    OpenAI,
}

impl ProviderKind {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "http://localhost:11434",
            ProviderKind::OpenAI => "https://api.openai.com/v1",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(ProviderKind::Ollama),
            "openai" | "openai-compatible" => Ok(ProviderKind::OpenAI),
            other => bail!("unknown provider '{}', expected 'ollama' or 'openai'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub db_path: PathBuf,
    pub snapshot_path: PathBuf,
    pub provider: ProviderKind,
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub persona: String,
    /// Custom prompt template, read from `CAPTION_PROMPT_FILE`
    pub prompt_template: Option<String>,
    pub interval: Duration,
    pub ttl: Duration,
    pub record_delay: Duration,
    pub batch_size: usize,
    pub call_timeout: Duration,
    pub max_entries: usize,
    pub reload_each_cycle: bool,
    pub log_dir: Option<PathBuf>,
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid value '{}' for {}: {}", raw, key, e)),
        None => Ok(default),
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let provider: ProviderKind = parse_or(&lookup, "CAPTION_PROVIDER", ProviderKind::OpenAI)?;

        let prompt_template = match lookup("CAPTION_PROMPT_FILE") {
            Some(path) => Some(
                std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read prompt template {}", path))?,
            ),
            None => None,
        };

        let config = Self {
            db_path: lookup("CAPTION_DB_PATH").unwrap_or_else(|| "catalog.db".to_string()).into(),
            snapshot_path: lookup("CAPTION_SNAPSHOT_PATH")
                .unwrap_or_else(|| "captions_snapshot.json".to_string())
                .into(),
            provider,
            api_base: lookup("CAPTION_API_BASE").unwrap_or_else(|| provider.default_base_url().to_string()),
            api_key: lookup("CAPTION_API_KEY").filter(|key| !key.is_empty()),
            model: lookup("CAPTION_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            persona: lookup("CAPTION_PERSONA").unwrap_or_else(|| DEFAULT_PERSONA.to_string()),
            prompt_template,
            interval: Duration::from_secs(parse_or(&lookup, "CAPTION_INTERVAL_SECS", 3600)?),
            ttl: Duration::from_secs(parse_or(&lookup, "CAPTION_TTL_SECS", 86_400)?),
            record_delay: Duration::from_millis(parse_or(&lookup, "CAPTION_RECORD_DELAY_MS", 1500)?),
            batch_size: parse_or(&lookup, "CAPTION_BATCH_SIZE", 100)?,
            call_timeout: Duration::from_secs(parse_or(&lookup, "CAPTION_CALL_TIMEOUT_SECS", 60)?),
            max_entries: parse_or(&lookup, "CAPTION_MAX_ENTRIES", 100_000)?,
            reload_each_cycle: parse_or(&lookup, "CAPTION_RELOAD_EACH_CYCLE", true)?,
            log_dir: lookup("CAPTION_LOG_DIR").map(PathBuf::from),
        };

        if config.interval.is_zero() {
            bail!("CAPTION_INTERVAL_SECS must be greater than zero");
        }
        if config.batch_size == 0 {
            bail!("CAPTION_BATCH_SIZE must be greater than zero");
        }
        if config.max_entries == 0 {
            bail!("CAPTION_MAX_ENTRIES must be greater than zero");
        }
        if config.call_timeout.is_zero() {
            bail!("CAPTION_CALL_TIMEOUT_SECS must be greater than zero");
        }
        if config.record_delay.is_zero() {
            bail!("CAPTION_RECORD_DELAY_MS must be greater than zero");
        }

        Ok(config)
    }

    pub fn options(&self) -> PipelineOptions {
        PipelineOptions {
            ttl: self.ttl,
            record_delay: self.record_delay,
            batch_size: self.batch_size,
            model: self.model.clone(),
            persona: self.persona.clone(),
            prompt_template: self
                .prompt_template
                .as_ref()
                .map(PromptTemplate::new)
                .unwrap_or_default(),
            call_timeout: self.call_timeout,
            max_entries: self.max_entries,
            reload_each_cycle: self.reload_each_cycle,
            interval: self.interval,
        }
    }

    pub fn build_provider(&self) -> Result<Arc<dyn LLMProvider>> {
        let provider: Arc<dyn LLMProvider> = match self.provider {
            ProviderKind::Ollama => Arc::new(OllamaProvider::from_url(&self.api_base)?),
            ProviderKind::OpenAI => Arc::new(OpenAICompatibleProvider::new(self.api_base.clone(), self.api_key.clone())),
        };
        Ok(provider)
    }
}
