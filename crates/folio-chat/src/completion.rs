//! Text completion backends.
//!
//! - `OllamaCompletion` calls an Ollama-compatible `/api/generate` endpoint.
//! - `MockCompletion` returns a canned reply and records every prompt.

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use folio_core::config::ChatConfig;

use crate::error::ChatError;

/// Turns a prompt into generated text.
pub trait CompletionService: Send + Sync {
    fn complete(
        &self,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<String, ChatError>> + Send;
}

/// Boxed future returned by [`DynCompletionService::complete_boxed`].
pub type CompletionFuture<'a> =
    Pin<Box<dyn std::future::Future<Output = Result<String, ChatError>> + Send + 'a>>;

/// Object-safe version of [`CompletionService`].
pub trait DynCompletionService: Send + Sync {
    fn complete_boxed<'a>(&'a self, prompt: &'a str) -> CompletionFuture<'a>;
}

impl<T: CompletionService> DynCompletionService for T {
    fn complete_boxed<'a>(&'a self, prompt: &'a str) -> CompletionFuture<'a> {
        Box::pin(self.complete(prompt))
    }
}

/// Shared handle to a completion backend.
pub type SharedCompletion = Arc<dyn DynCompletionService>;

// ---------------------------------------------------------------------------
// OllamaCompletion
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Completion service backed by Ollama's non-streaming generate API.
#[derive(Debug, Clone)]
pub struct OllamaCompletion {
    client: Client,
    url: String,
    model: String,
    temperature: f32,
}

impl OllamaCompletion {
    pub fn new(config: &ChatConfig) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ChatError::Completion(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: format!("{}/api/generate", config.endpoint.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl CompletionService for OllamaCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, ChatError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Completion(format!("request to {} failed: {e}", self.url)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ChatError::Completion(format!("backend returned {status}: {text}")));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Completion(format!("invalid backend response: {e}")))?;

        debug!(model = %self.model, chars = parsed.response.len(), "Completion received");
        Ok(parsed.response)
    }
}

// ---------------------------------------------------------------------------
// MockCompletion
// ---------------------------------------------------------------------------

/// Completion service for tests and offline runs.
///
/// Replies with a fixed text (or always fails) and keeps every prompt it
/// was given.
#[derive(Debug, Default)]
pub struct MockCompletion {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl MockCompletion {
    /// Always answers with `reply`.
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always fails with a completion error.
    pub fn failing() -> Self {
        Self::default()
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl CompletionService for MockCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, ChatError> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());
        self.reply
            .clone()
            .ok_or_else(|| ChatError::Completion("mock completion unavailable".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_prompts() {
        let mock = MockCompletion::replying("canned");
        assert_eq!(mock.complete("first").await.unwrap(), "canned");
        assert_eq!(mock.complete("second").await.unwrap(), "canned");
        assert_eq!(mock.prompts(), vec!["first", "second"]);
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_mock_failing() {
        let mock = MockCompletion::failing();
        assert!(matches!(mock.complete("x").await, Err(ChatError::Completion(_))));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn test_dyn_dispatch() {
        let shared: SharedCompletion = Arc::new(MockCompletion::replying("boxed"));
        assert_eq!(shared.complete_boxed("hi").await.unwrap(), "boxed");
    }

    #[test]
    fn test_ollama_url_from_config() {
        let config = ChatConfig {
            endpoint: "http://localhost:11434/".to_string(),
            ..ChatConfig::default()
        };
        let ollama = OllamaCompletion::new(&config).unwrap();
        assert_eq!(ollama.url(), "http://localhost:11434/api/generate");
    }

    #[test]
    fn test_generate_request_shape() {
        let body = GenerateRequest {
            model: "llama3",
            prompt: "hello",
            stream: false,
            options: GenerateOptions { temperature: 0.5 },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "llama3",
                "prompt": "hello",
                "stream": false,
                "options": { "temperature": 0.5 }
            })
        );
    }

    #[tokio::test]
    async fn test_ollama_unreachable_is_completion_error() {
        let config = ChatConfig {
            endpoint: "http://127.0.0.1:1".to_string(),
            request_timeout_secs: 2,
            ..ChatConfig::default()
        };
        let ollama = OllamaCompletion::new(&config).unwrap();
        assert!(matches!(
            ollama.complete("hello").await,
            Err(ChatError::Completion(_))
        ));
    }
}
