//! Generator Module
//!
//! Provider backends for the external text-generation service and the
//! caption generator that drives them.

mod provider;
pub mod caption;

pub use provider::{LLMProvider, OllamaProvider, OpenAICompatibleProvider};
pub use caption::{normalize_caption, size_mb, CaptionGenerator, PromptTemplate, DEFAULT_MODEL, DEFAULT_PERSONA};
