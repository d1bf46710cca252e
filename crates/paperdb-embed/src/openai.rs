//! Embeddings through an OpenAI-compatible `/embeddings` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use paperdb_core::traits::Embedder;
use paperdb_core::{Error, Result};

const PROVIDER: &str = "openai";

/// Native output size of the models we know about.
pub fn native_dim(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

/// Only the `text-embedding-3` family accepts a shortened output size.
fn supports_dimensions(model: &str) -> bool {
    model.starts_with("text-embedding-3")
}

#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dim: usize,
    batch_size: usize,
}

impl OpenAiEmbedder {
    pub fn new(
        api_key: Option<&str>,
        base_url: &str,
        model: &str,
        dim: usize,
        timeout: Duration,
        batch_size: usize,
    ) -> Result<Self> {
        if model.trim().is_empty() {
            return Err(Error::Config("embedding.model is empty".into()));
        }
        match native_dim(model) {
            Some(native) if dim > native => {
                return Err(Error::Config(format!(
                    "{model} produces at most {native} dimensions, store expects {dim}"
                )));
            }
            Some(native) if dim != native && !supports_dimensions(model) => {
                return Err(Error::Config(format!(
                    "{model} always produces {native} dimensions, store expects {dim}"
                )));
            }
            _ => {}
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
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            dim,
            batch_size: batch_size.max(1),
        })
    }

    fn requested_dimensions(&self) -> Option<usize> {
        match native_dim(&self.model) {
            Some(native) if native == self.dim => None,
            _ if supports_dimensions(&self.model) => Some(self.dim),
            _ => None,
        }
    }

    async fn embed_one_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
            dimensions: self.requested_dimensions(),
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, e))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(Error::provider(
                PROVIDER,
                format!("embeddings request failed ({status}): {body}"),
            ));
        }
        let mut parsed: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("failed to parse response: {e}")))?;
        parsed.data.sort_by_key(|entry| entry.index);
        if parsed.data.len() != inputs.len() {
            return Err(Error::provider(
                PROVIDER,
                format!("returned {} embeddings for {} inputs", parsed.data.len(), inputs.len()),
            ));
        }
        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            debug!(model = %self.model, batch = batch.len(), "requesting embeddings");
            out.extend(self.embed_one_batch(batch).await?);
        }
        Ok(out)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
