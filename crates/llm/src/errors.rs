//! Boundary classification of external-service failures.
//!
//! Every HTTP provider (generation and embedding) funnels its failures
//! through these helpers so that quota signals, timeouts and hard failures
//! map to the same `AppError` kinds regardless of vendor.

use lexrag_core::{AppError, Stage};
use reqwest::StatusCode;

/// Body fragments that vendors use for quota exhaustion.
const RATE_LIMIT_MARKERS: [&str; 5] = [
    "resource_exhausted",
    "quota",
    "rate limit",
    "rate_limit",
    "too many requests",
];

/// Whether a failed response signals a rate limit or exhausted quota.
pub fn is_rate_limit_signal(status: Option<StatusCode>, body: &str) -> bool {
    if status == Some(StatusCode::TOO_MANY_REQUESTS) {
        return true;
    }

    let lower = body.to_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Classify a non-success HTTP response for the given stage.
pub fn classify_http_failure(stage: Stage, status: StatusCode, body: &str) -> AppError {
    let detail = format!("HTTP {}: {}", status, truncate(body, 300));

    if is_rate_limit_signal(Some(status), body) {
        return match stage {
            Stage::Embedding => AppError::EmbeddingRateLimited(detail),
            Stage::Generation => AppError::GenerationRateLimited(detail),
            Stage::Retrieval => AppError::RetrievalUnavailable(detail),
        };
    }

    if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
        return AppError::Timeout { stage };
    }

    hard_failure(stage, detail)
}

/// Classify a transport-level failure (connect, timeout, decode).
pub fn classify_transport_error(stage: Stage, err: &reqwest::Error) -> AppError {
    if err.is_timeout() {
        return AppError::Timeout { stage };
    }

    if let Some(status) = err.status() {
        return classify_http_failure(stage, status, &err.to_string());
    }

    hard_failure(stage, err.to_string())
}

fn hard_failure(stage: Stage, detail: String) -> AppError {
    match stage {
        Stage::Embedding => AppError::Embedding(detail),
        Stage::Generation => AppError::GenerationFailed(detail),
        Stage::Retrieval => AppError::RetrievalUnavailable(detail),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
