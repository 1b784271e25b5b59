use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Boundary to the external text-generation service: one call with a model
/// id, a user prompt and an optional persona, returning plain text.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn generate(&self, model: &str, prompt: String, system: Option<String>) -> Result<String>;
}

/// Local Ollama server speaking its native chat API.
pub struct OllamaProvider {
    client: ollama_rs::Ollama,
}

impl OllamaProvider {
    pub fn new(client: ollama_rs::Ollama) -> Self {
        Self { client }
    }

    /// Provider for an Ollama server at `base_url` (e.g. `http://localhost:11434`).
    pub fn from_url(base_url: &str) -> Result<Self> {
        let url = reqwest::Url::parse(base_url)
            .with_context(|| format!("Invalid Ollama URL '{}'", base_url))?;
        let host = format!("{}://{}", url.scheme(), url.host_str().unwrap_or("localhost"));
        let port = url.port_or_known_default().unwrap_or(11434);

        let client = ollama_rs::Ollama::builder().host(host).port(port).build();
        Ok(Self::new(client))
    }
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    async fn generate(&self, model: &str, prompt: String, system: Option<String>) -> Result<String> {
        use ollama_rs::generation::chat::{request::ChatMessageRequest, ChatMessage};

        let messages: Vec<ChatMessage> = system
            .map(ChatMessage::system)
            .into_iter()
            .chain(std::iter::once(ChatMessage::user(prompt)))
            .collect();

        let response = self
            .client
            .send_chat_messages(ChatMessageRequest::new(model.to_string(), messages))
            .await
            .with_context(|| format!("Ollama chat request for model '{}' failed", model))?;

        Ok(response.message.content)
    }
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Pull the first choice's text out of a `/chat/completions` body.
/// Anything other than a text message is an error.
fn extract_content(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body)
        .context("Malformed chat completion response")?;

    response.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .context("No text content in chat completion response")
}

/// Any server speaking the OpenAI `/chat/completions` protocol.
pub struct OpenAICompatibleProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    temperature: f32,
}

impl OpenAICompatibleProvider {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
            temperature: 0.7,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatibleProvider {
    async fn generate(&self, model: &str, prompt: String, system: Option<String>) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(ref sys) = system {
            messages.push(WireMessage { role: "system", content: sys });
        }
        messages.push(WireMessage { role: "user", content: &prompt });

        let body = ChatRequest {
            model,
            messages,
            temperature: self.temperature,
        };

        let mut request = self.client.post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .json(&body);

        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let res = request.send().await?.error_for_status()?;
        let text = res.text().await?;
        extract_content(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_content() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": "Dune (2021)"}}]}"#;
        assert_eq!(extract_content(body).unwrap(), "Dune (2021)");
    }

    #[test]
    fn test_extract_content_rejects_non_text() {
        assert!(extract_content(r#"{"choices": []}"#).is_err());
        assert!(extract_content(r#"{"choices": [{"message": {"content": null}}]}"#).is_err());
        assert!(extract_content("<html>bad gateway</html>").is_err());
    }

    #[test]
    fn test_ollama_from_url() {
        assert!(OllamaProvider::from_url("http://localhost:11434").is_ok());
        assert!(OllamaProvider::from_url("https://ollama.internal").is_ok());
        assert!(OllamaProvider::from_url("not a url").is_err());
    }
}
