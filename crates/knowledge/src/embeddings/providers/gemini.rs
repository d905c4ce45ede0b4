//! Gemini embedding provider.
//!
//! Calls `models/{model}:embedContent` with a retrieval task type and an
//! explicit `outputDimensionality`.

use crate::embeddings::provider::{EmbeddingProvider, TaskIntent};
use lexrag_core::{AppError, AppResult, Stage};
use lexrag_llm::errors::{classify_http_failure, classify_transport_error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "text-embedding-004";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest {
    model: String,
    content: Content,
    task_type: &'static str,
    output_dimensionality: usize,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

/// Gemini text-embedding provider.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(
        endpoint: Option<&str>,
        api_key: &str,
        model: Option<&str>,
        timeout: Option<Duration>,
    ) -> AppResult<Self> {
        if api_key.trim().is_empty() {
            return Err(AppError::Config("Gemini API key is empty".to_string()));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            AppError::Config(format!("Failed to create HTTP client for Gemini: {}", e))
        })?;

        Ok(Self {
            client,
            base_url: endpoint
                .unwrap_or(DEFAULT_GEMINI_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.to_string(),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:embedContent", self.base_url, self.model)
    }

    fn build_request(&self, text: &str, intent: TaskIntent, dimensions: usize) -> EmbedContentRequest {
        EmbedContentRequest {
            model: format!("models/{}", self.model),
            content: Content {
                parts: vec![Part {
                    text: text.to_string(),
                }],
            },
            task_type: match intent {
                TaskIntent::Query => "RETRIEVAL_QUERY",
                TaskIntent::Document => "RETRIEVAL_DOCUMENT",
            },
            output_dimensionality: dimensions,
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for GeminiProvider {
    fn provider_name(&self) -> &str {
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, text), fields(text_len = text.len(), model = %self.model, ?intent))]
    async fn embed(&self, text: &str, intent: TaskIntent, dimensions: usize) -> AppResult<Vec<f32>> {
        let request = self.build_request(text, intent, dimensions);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport_error(Stage::Embedding, &e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(classify_http_failure(Stage::Embedding, status, &error_text));
        }

        let body: EmbedContentResponse = response
            .json()
            .await
            .map_err(|e| AppError::Embedding(format!("Failed to parse Gemini response: {}", e)))?;

        debug!("Received {} dimensional embedding", body.embedding.values.len());
        Ok(body.embedding.values)
    }
}
