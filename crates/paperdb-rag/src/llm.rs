//! Chat completions through an OpenAI-compatible `/chat/completions` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use paperdb_core::config::Settings;
use paperdb_core::traits::{CompletionParams, Completer};
use paperdb_core::{Error, Result};

const PROVIDER: &str = "openai";

#[derive(Debug, Clone)]
pub struct OpenAiCompleter {
    client: Client,
    endpoint: String,
    model: String,
}

impl OpenAiCompleter {
    pub fn new(api_key: Option<&str>, base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        if model.trim().is_empty() {
            return Err(Error::Config("completion.model is empty".into()));
        }
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key.map(str::trim).filter(|k| !k.is_empty()) {
            let auth = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|_| Error::Config("invalid OpenAI API key".into()))?;
            headers.insert(AUTHORIZATION, auth);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::provider(PROVIDER, e))?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.to_string(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            settings.openai.api_key.as_deref(),
            &settings.openai.base_url,
            &settings.completion.model,
            Duration::from_secs(settings.openai.timeout_secs),
        )
    }
}

#[async_trait]
impl Completer for OpenAiCompleter {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, params: CompletionParams) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            messages: vec![ChatMessage { role: "user", content: prompt }],
        };
        debug!(model = %self.model, chars = prompt.len(), "chat completion");
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, e))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(Error::provider(PROVIDER, format!("completion failed ({status}): {text}")));
        }
        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("failed to parse response: {e}")))?;
        let answer = parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .unwrap_or_default();
        if answer.trim().is_empty() {
            return Err(Error::provider(PROVIDER, "empty completion"));
        }
        Ok(answer)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}
