//! Caption Generator
//!
//! Renders a deterministic prompt from a record, asks the provider for a new
//! caption and normalizes the answer. Failures never escape: the caller only
//! sees `Some(caption)` or `None`.

use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, warn};

use super::LLMProvider;
use crate::catalog::Record;
use crate::utils::truncate::{truncate_for_log, truncate_middle};

pub const DEFAULT_MODEL: &str = "gpt-4-turbo-2024-04-09";
pub const DEFAULT_PERSONA: &str = "You are a movie/series data provider website.";
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

pub const DEFAULT_TEMPLATE: &str = "{caption}

Create a visually appealing video caption using the following format:
- First line: only the movie/series name in bold, no extra words or symbols.
━━━━━━━━━━━━━━━━━━━━━━━━━━
Language: {language} | Quality: {quality} | Format: {format} | Codec: {codec} | Size: {size_mb} MB | File Type: {file_type}
━━━━━━━━━━━━━━━━━━━━━━━━━━

Title: {title}

Use proper spacing, fancy icons, and a clean, visually appealing design suitable for Telegram. \
Do not use '*' characters. Do not add any extra words or unnecessary details.";

/// Render bytes as megabytes with two decimals.
pub fn size_mb(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / (1024.0 * 1024.0))
}

/// Trim the raw provider answer; an empty result is no caption at all.
pub fn normalize_caption(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Prompt text with `{field}` placeholders.
///
/// Supported: `caption`, `title`, `language`, `quality`, `format`, `codec`,
/// `file_type`, `size_mb`. Unknown placeholders are left untouched, and
/// substituted values are never re-scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self { template: template.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    fn lookup(record: &Record, name: &str) -> Option<String> {
        let value = match name {
            "caption" => record.caption.clone(),
            "title" => record.title.clone(),
            "language" => record.language.clone(),
            "quality" => record.quality.clone(),
            "format" => record.format.clone(),
            "codec" => record.codec.clone(),
            "file_type" => record.file_type.clone(),
            "size_mb" => size_mb(record.size),
            _ => return None,
        };
        Some(value)
    }

    pub fn render(&self, record: &Record) -> String {
        let mut out = String::with_capacity(self.template.len() + record.caption.len());
        let mut rest = self.template.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];

            match after.find('}') {
                Some(close) => {
                    let name = &after[..close];
                    match Self::lookup(record, name) {
                        Some(value) => out.push_str(&value),
                        None => {
                            out.push('{');
                            out.push_str(name);
                            out.push('}');
                        }
                    }
                    rest = &after[close + 1..];
                }
                None => {
                    out.push_str(&rest[open..]);
                    rest = "";
                }
            }
        }

        out.push_str(rest);
        out
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

pub struct CaptionGenerator {
    provider: Arc<dyn LLMProvider>,
    model: String,
    persona: String,
    template: PromptTemplate,
    call_timeout: Duration,
}

impl CaptionGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            persona: DEFAULT_PERSONA.to_string(),
            template: PromptTemplate::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn with_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn build_prompt(&self, record: &Record) -> String {
        self.template.render(record)
    }

    /// One attempt at a new caption for `record`. `None` on any failure.
    pub async fn generate(&self, record: &Record) -> Option<String> {
        let prompt = self.build_prompt(record);
        debug!("Prompt for record {}: {}", record.id, truncate_middle(&prompt, 400));
        let call = self.provider.generate(&self.model, prompt, Some(self.persona.clone()));

        match timeout(self.call_timeout, call).await {
            Ok(Ok(raw)) => {
                let caption = normalize_caption(&raw);
                match &caption {
                    Some(text) => debug!("Generated caption for record {}: {}", record.id, truncate_for_log(text, 120)),
                    None => warn!("No valid caption generated for record {}", record.id),
                }
                caption
            }
            Ok(Err(e)) => {
                error!("Error generating caption for record {}: {:#}", record.id, e);
                None
            }
            Err(_) => {
                error!("Caption generation for record {} timed out after {:?}", record.id, self.call_timeout);
                None
            }
        }
    }
}
