//! Offline LLM client.
//!
//! By default it answers from the `[Source: ...]` labels present in the
//! prompt, producing a sectioned answer that cites each labelled source
//! once. Tests can script a queue of replies instead, including rate-limit
//! and hard failures.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use lexrag_core::{AppError, AppResult};
use std::collections::VecDeque;
use std::sync::Mutex;

const SOURCE_LABEL_OPEN: &str = "[Source: ";

/// One scripted outcome for [`MockClient`].
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    RateLimited,
    Fail(String),
}

/// Deterministic client that never leaves the process.
#[derive(Debug, Default)]
pub struct MockClient {
    script: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replies are consumed in order; once exhausted the client falls back
    /// to label-based answers.
    pub fn scripted(replies: Vec<ScriptedReply>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn next_reply(&self) -> Option<ScriptedReply> {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
    }
}

/// Distinct `[Source: ...]` labels in order of first appearance.
pub fn source_labels(prompt: &str) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    let mut rest = prompt;

    while let Some(start) = rest.find(SOURCE_LABEL_OPEN) {
        let tail = &rest[start..];
        let Some(end) = tail.find(']') else {
            break;
        };
        let label = &tail[..=end];
        if !labels.iter().any(|existing| existing == label) {
            labels.push(label.to_string());
        }
        rest = &tail[end + 1..];
    }

    labels
}

fn answer_from_labels(prompt: &str) -> String {
    let labels = source_labels(prompt);
    if labels.is_empty() {
        return "## Result\n\nThe supplied material contains no labelled sources to cite."
            .to_string();
    }

    let mut answer = String::from("## Summary\n\n");
    for (i, label) in labels.iter().enumerate() {
        answer.push_str(&format!(
            "{}. Point {} is established by the cited provision {}.\n",
            i + 1,
            i + 1,
            label
        ));
    }
    answer.push_str("\n## Sources reviewed\n\n");
    answer.push_str(&format!("{} labelled excerpts were reviewed.\n", labels.len()));
    answer
}

#[async_trait::async_trait]
impl LlmClient for MockClient {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());

        let content = match self.next_reply() {
            Some(ScriptedReply::Text(text)) => text,
            Some(ScriptedReply::RateLimited) => {
                return Err(AppError::GenerationRateLimited(
                    "RESOURCE_EXHAUSTED: quota exceeded".to_string(),
                ))
            }
            Some(ScriptedReply::Fail(message)) => return Err(AppError::GenerationFailed(message)),
            None => answer_from_labels(&request.prompt),
        };

        let prompt_tokens = (request.prompt.len() / 4) as u32;
        let completion_tokens = (content.len() / 4) as u32;

        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::new(prompt_tokens, completion_tokens),
            grounding: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_labels_are_deduplicated_in_order() {
        let prompt = "[Source: Civil Code, page 3]\nx\n[Source: Labor Act]\ny\n[Source: Civil Code, page 3]";
        assert_eq!(
            source_labels(prompt),
            vec![
                "[Source: Civil Code, page 3]".to_string(),
                "[Source: Labor Act]".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_default_answer_cites_every_label() {
        let client = MockClient::new();
        let prompt = "[Source: A, page 1]\na\n[Source: B, page 2]\nb\n[Source: C, page 9]\nc";
        let response = client
            .complete(&LlmRequest::new(prompt, "mock"))
            .await
            .unwrap();

        assert!(response.content.contains("## Summary"));
        for label in ["[Source: A, page 1]", "[Source: B, page 2]", "[Source: C, page 9]"] {
            assert!(response.content.contains(label));
        }
    }

    #[tokio::test]
    async fn test_scripted_replies_in_order() {
        let client = MockClient::scripted(vec![
            ScriptedReply::RateLimited,
            ScriptedReply::Fail("boom".to_string()),
            ScriptedReply::Text("done".to_string()),
        ]);
        let request = LlmRequest::new("q", "mock");

        let err = client.complete(&request).await.unwrap_err();
        assert!(err.is_rate_limited());

        let err = client.complete(&request).await.unwrap_err();
        assert!(matches!(err, AppError::GenerationFailed(_)));

        assert_eq!(client.complete(&request).await.unwrap().content, "done");
        assert_eq!(client.requests().len(), 3);
    }
}
