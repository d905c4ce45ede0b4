//! Gemini generative model provider.
//!
//! Talks to the Generative Language REST API (`models/{model}:generateContent`).
//! Conversation history maps onto `contents` with `user`/`model` roles and
//! the system prompt onto `systemInstruction`. Grounding metadata (web
//! sources, search queries) is surfaced when the API returns it.

use crate::client::{
    ChatRole, GroundingMetadata, LlmClient, LlmRequest, LlmResponse, LlmUsage, WebCitation,
};
use crate::errors::{classify_http_failure, classify_transport_error};
use lexrag_core::{AppError, AppResult, Stage};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Public Generative Language API endpoint.
pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";

const API_VERSION: &str = "v1beta";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Content,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    grounding_metadata: Option<RawGroundingMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
    #[serde(default)]
    web_search_queries: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
struct WebChunk {
    #[serde(default)]
    uri: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

/// Gemini LLM client.
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a client against the public endpoint.
    pub fn new(api_key: impl Into<String>) -> AppResult<Self> {
        Self::with_base_url(DEFAULT_GEMINI_URL, api_key, None)
    }

    /// Create a client with a custom endpoint and optional request timeout.
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Option<Duration>,
    ) -> AppResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AppError::Config("Gemini API key is empty".to_string()));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/{}/models/{}:generateContent",
            self.base_url, API_VERSION, model
        )
    }

    fn to_gemini_request(&self, request: &LlmRequest) -> GenerateRequest {
        let mut contents: Vec<Content> = request
            .history
            .iter()
            .map(|turn| Content {
                role: Some(
                    match turn.role {
                        ChatRole::User => "user",
                        ChatRole::Model => "model",
                    }
                    .to_string(),
                ),
                parts: vec![Part {
                    text: turn.content.clone(),
                }],
            })
            .collect();

        contents.push(Content {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: request.prompt.clone(),
            }],
        });

        GenerateRequest {
            system_instruction: request.system.as_ref().map(|system| Content {
                role: None,
                parts: vec![Part {
                    text: system.clone(),
                }],
            }),
            contents,
            generation_config: GenerationConfig {
                temperature: request.temperature,
                top_p: request.top_p,
                max_output_tokens: request.max_tokens,
            },
        }
    }

    fn convert_response(&self, model: &str, response: GenerateResponse) -> AppResult<LlmResponse> {
        let candidate = response.candidates.into_iter().next().ok_or_else(|| {
            AppError::GenerationFailed("Gemini returned no candidates".to_string())
        })?;

        let content: String = candidate
            .content
            .parts
            .iter()
            .map(|part| part.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        if content.trim().is_empty() {
            return Err(AppError::GenerationFailed(format!(
                "Gemini returned an empty answer (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        let grounding = candidate
            .grounding_metadata
            .map(|raw| GroundingMetadata {
                web_citations: raw
                    .grounding_chunks
                    .into_iter()
                    .filter_map(|chunk| chunk.web)
                    .map(|web| WebCitation {
                        title: web.title,
                        uri: web.uri,
                    })
                    .collect(),
                search_queries: raw.web_search_queries,
            })
            .filter(|metadata| !metadata.is_empty());

        let usage = response
            .usage_metadata
            .map(|u| LlmUsage::new(u.prompt_token_count, u.candidates_token_count))
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            model: response.model_version.unwrap_or_else(|| model.to_string()),
            usage,
            grounding,
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for GeminiClient {
    fn provider_name(&self) -> &str {
        "gemini"
    }

    #[instrument(skip(self, request), fields(model = %request.model, history = request.history.len()))]
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let body = self.to_gemini_request(request);
        debug!("Sending generateContent request ({} contents)", body.contents.len());

        let response = self
            .client
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport_error(Stage::Generation, &e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(classify_http_failure(Stage::Generation, status, &error_text));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AppError::GenerationFailed(format!("Failed to parse Gemini response: {}", e)))?;

        let converted = self.convert_response(&request.model, parsed)?;
        info!(
            "Received completion from Gemini ({} completion tokens)",
            converted.usage.completion_tokens
        );

        Ok(converted)
    }
}
