//! Grounded answer generation.
//!
//! Sends the question, the labelled context and prior turns to the LLM.
//! A rate-limited call is answered locally with an extractive fallback
//! built from the top retrieved sources; any other failure propagates.

use crate::config::GenerationConfig;
use crate::context::{format_chunks_for_context, join_context, result_label};
use crate::types::RetrievalResult;
use lexrag_core::{AppError, AppResult, Stage};
use lexrag_llm::{ChatTurn, GroundingMetadata, LlmClient, LlmRequest};
use lexrag_prompt::{build_prompt, PromptDefinition};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Output of one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedAnswer {
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grounding_metadata: Option<GroundingMetadata>,
    pub fallback_used: bool,
    pub model: String,
}

/// Calls the LLM with a grounded-answer prompt.
#[derive(Clone)]
pub struct AnswerGenerator {
    client: Arc<dyn LlmClient>,
    prompt: PromptDefinition,
    model: String,
    config: GenerationConfig,
    timeout: Option<Duration>,
}

impl AnswerGenerator {
    pub fn new(
        client: Arc<dyn LlmClient>,
        prompt: PromptDefinition,
        model: impl Into<String>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            client,
            prompt,
            model: config.model.clone().unwrap_or_else(|| model.into()),
            config,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Answer `query` from `sources`.
    pub async fn generate(
        &self,
        query: &str,
        sources: &[RetrievalResult],
        history: &[ChatTurn],
    ) -> AppResult<GeneratedAnswer> {
        self.run(query, sources, history, None).await
    }

    /// Answer again, telling the model why the previous draft was rejected.
    pub async fn regenerate(
        &self,
        query: &str,
        sources: &[RetrievalResult],
        history: &[ChatTurn],
        issues: &[String],
    ) -> AppResult<GeneratedAnswer> {
        let notes = issues
            .iter()
            .map(|issue| format!("- {}", issue))
            .collect::<Vec<_>>()
            .join("\n");
        self.run(query, sources, history, Some(notes)).await
    }

    async fn run(
        &self,
        query: &str,
        sources: &[RetrievalResult],
        history: &[ChatTurn],
        repair_notes: Option<String>,
    ) -> AppResult<GeneratedAnswer> {
        let request = self.build_request(query, sources, history, repair_notes)?;

        let call = self.client.complete(&request);
        let outcome = match self.timeout {
            Some(deadline) => tokio::time::timeout(deadline, call)
                .await
                .map_err(|_| AppError::Timeout {
                    stage: Stage::Generation,
                })?,
            None => call.await,
        };

        match outcome {
            Ok(response) => {
                tracing::info!(
                    "Answer generated by {} ({} completion tokens)",
                    response.model,
                    response.usage.completion_tokens
                );
                Ok(GeneratedAnswer {
                    answer: response.content,
                    grounding_metadata: response.grounding.filter(|g| !g.is_empty()),
                    fallback_used: false,
                    model: response.model,
                })
            }
            Err(e) if e.is_rate_limited() => {
                tracing::warn!("Generation rate limited, answering from sources: {}", e);
                Ok(GeneratedAnswer {
                    answer: fallback_answer(
                        sources,
                        self.config.fallback_sources,
                        self.config.fallback_preview_chars,
                    ),
                    grounding_metadata: None,
                    fallback_used: true,
                    model: self.model.clone(),
                })
            }
            Err(e) => Err(e),
        }
    }

    fn build_request(
        &self,
        query: &str,
        sources: &[RetrievalResult],
        history: &[ChatTurn],
        repair_notes: Option<String>,
    ) -> AppResult<LlmRequest> {
        let mut variables = HashMap::new();
        variables.insert("question".to_string(), query.trim().to_string());
        variables.insert(
            "context".to_string(),
            join_context(&format_chunks_for_context(sources)),
        );
        if let Some(notes) = repair_notes {
            variables.insert("repairNotes".to_string(), notes);
        }

        let built = build_prompt(&self.prompt, variables)?;

        let mut request = LlmRequest::new(built.user, &self.model)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens)
            .with_history(history.to_vec());
        if let Some(system) = built.system {
            request = request.with_system(system);
        }
        Ok(request)
    }
}

/// Extractive answer quoting the first `max_sources` results.
///
/// Each entry carries the result's citation label and a whitespace-collapsed
/// preview of at most `preview_chars` characters.
pub fn fallback_answer(
    sources: &[RetrievalResult],
    max_sources: usize,
    preview_chars: usize,
) -> String {
    let selected: Vec<&RetrievalResult> = sources.iter().take(max_sources).collect();
    if selected.is_empty() {
        return "## Sources\n\nNo indexed documents matched the question.".to_string();
    }

    let mut answer = String::from(
        "## Relevant sources\n\nThe answer service is over its usage quota. \
         These are the passages that best match the question:\n",
    );

    for (i, result) in selected.iter().enumerate() {
        answer.push_str(&format!(
            "\n{}. {}\n{}\n",
            i + 1,
            result_label(result),
            preview(&result.text, preview_chars)
        ));
    }

    answer
}

fn preview(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }

    let cut: String = collapsed.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentCategory;
    use lexrag_llm::{MockClient, ScriptedReply};
    use lexrag_prompt::default_grounded_answer;

    fn result(name: &str, page: u32, text: &str) -> RetrievalResult {
        RetrievalResult {
            chunk_id: format!("{}-{}", name, page),
            document_id: name.to_string(),
            sequence_index: page,
            text: text.to_string(),
            similarity: 0.9,
            document_name: name.to_string(),
            category: DocumentCategory::Legislation,
            page_number: Some(page),
        }
    }

    fn sources() -> Vec<RetrievalResult> {
        vec![
            result("Civil Code", 10, "The seller must deliver the goods."),
            result("Civil Code", 11, "The buyer must pay the price."),
            result("Sales Act", 3, "Risk passes on delivery."),
            result("Ruling 4/2019", 2, "Late payment accrues interest."),
        ]
    }

    fn generator(client: Arc<MockClient>) -> AnswerGenerator {
        AnswerGenerator::new(
            client,
            default_grounded_answer().unwrap(),
            "gemini-2.0-flash",
            GenerationConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_generate_sends_context_and_history() {
        let client = Arc::new(MockClient::new());
        let generator = generator(client.clone());
        let history = vec![
            ChatTurn::user("What is a sale?"),
            ChatTurn::model("A contract transferring ownership."),
        ];

        let answer = generator
            .generate("Who bears the risk?", &sources(), &history)
            .await
            .unwrap();

        assert!(!answer.fallback_used);
        assert!(answer.answer.contains("[Source: Sales Act, page 3]"));

        let requests = client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "gemini-2.0-flash");
        assert_eq!(requests[0].history, history);
        assert!(requests[0].prompt.contains("Question: Who bears the risk?"));
        assert!(requests[0].prompt.contains("[Source: Ruling 4/2019, page 2]"));
        assert!(requests[0].system.as_deref().unwrap().contains("[Source:"));
    }

    #[tokio::test]
    async fn test_rate_limit_returns_top_three_sources() {
        let client = Arc::new(MockClient::scripted(vec![ScriptedReply::RateLimited]));
        let answer = generator(client)
            .generate("Who bears the risk?", &sources(), &[])
            .await
            .unwrap();

        assert!(answer.fallback_used);
        assert!(answer.answer.contains("[Source: Civil Code, page 10]"));
        assert!(answer.answer.contains("[Source: Civil Code, page 11]"));
        assert!(answer.answer.contains("[Source: Sales Act, page 3]"));
        assert!(!answer.answer.contains("Ruling 4/2019"));
        assert_eq!(answer.answer.matches("[Source:").count(), 3);
    }

    #[tokio::test]
    async fn test_other_failures_propagate() {
        let client = Arc::new(MockClient::scripted(vec![ScriptedReply::Fail(
            "safety block".to_string(),
        )]));
        let err = generator(client)
            .generate("q", &sources(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::GenerationFailed(_)));
    }

    #[tokio::test]
    async fn test_regenerate_includes_issues() {
        let client = Arc::new(MockClient::new());
        generator(client.clone())
            .regenerate(
                "q",
                &sources(),
                &[],
                &["Insufficient citations: found 1, required 3".to_string()],
            )
            .await
            .unwrap();

        let prompt = &client.requests()[0].prompt;
        assert!(prompt.contains("rejected"));
        assert!(prompt.contains("- Insufficient citations: found 1, required 3"));
    }

    #[test]
    fn test_model_override_from_config() {
        let config = GenerationConfig {
            model: Some("gemini-1.5-pro".to_string()),
            ..GenerationConfig::default()
        };
        let generator = AnswerGenerator::new(
            Arc::new(MockClient::new()),
            default_grounded_answer().unwrap(),
            "gemini-2.0-flash",
            config,
        );
        assert_eq!(generator.model(), "gemini-1.5-pro");
    }

    #[test]
    fn test_fallback_preview_is_bounded() {
        let long = "word ".repeat(200);
        let answer = fallback_answer(&[result("Code", 1, &long)], 3, 300);
        let body = answer.lines().last().unwrap();
        assert!(body.ends_with("..."));
        assert!(body.chars().count() <= 303);

        let short = fallback_answer(&[result("Code", 1, "Line one.\n\n  Line two.")], 3, 300);
        assert!(short.contains("Line one. Line two.\n"));
    }

    #[test]
    fn test_fallback_without_sources() {
        assert!(fallback_answer(&[], 3, 300).contains("No indexed documents"));
    }
}
