//! Offline embedding provider using trigram-based content-aware vectors.

use crate::embeddings::provider::{EmbeddingProvider, TaskIntent};
use lexrag_core::{AppError, AppResult};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

const STOP_WORDS: [&str; 32] = [
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them",
];

#[derive(Debug, Clone)]
enum Behavior {
    Trigram,
    /// Ignore the requested dimensionality
    FixedLength(usize),
    /// Fail texts containing the marker
    FailWhenContains(String),
    RateLimited,
}

/// Deterministic provider for tests and offline use.
///
/// Vectors are built from character trigrams and word frequencies, so
/// texts sharing vocabulary land close together. Not semantically
/// accurate, but stable and content-dependent.
#[derive(Debug)]
pub struct MockProvider {
    behavior: Behavior,
    calls: AtomicUsize,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self::with_behavior(Behavior::Trigram)
    }

    /// Always returns vectors of `length`, whatever was requested.
    pub fn with_fixed_length(length: usize) -> Self {
        Self::with_behavior(Behavior::FixedLength(length))
    }

    /// Fails with `AppError::Embedding` for texts containing `marker`.
    pub fn failing_on(marker: impl Into<String>) -> Self {
        Self::with_behavior(Behavior::FailWhenContains(marker.into()))
    }

    /// Every call reports an exhausted quota.
    pub fn rate_limited() -> Self {
        Self::with_behavior(Behavior::RateLimited)
    }

    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of embed calls received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Trigram embedding normalised to unit length.
    pub fn trigram_embedding(text: &str, dimensions: usize) -> Vec<f32> {
        let mut embedding = vec![0.0; dimensions];
        if dimensions == 0 {
            return embedding;
        }

        let stop_words: HashSet<&str> = STOP_WORDS.into_iter().collect();
        let lower = text.to_lowercase();

        let mut word_freq: HashMap<&str, u32> = HashMap::new();
        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 2 && !stop_words.contains(w))
        {
            *word_freq.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in &word_freq {
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram_hash = window.iter().fold(0u64, |acc, c| {
                    acc.wrapping_mul(37).wrapping_add(*c as u64)
                });
                embedding[(trigram_hash as usize) % dimensions] += (*freq as f32).sqrt();
            }

            let word_hash = word
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            embedding[(word_hash as usize) % dimensions] += *freq as f32;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    async fn embed(
        &self,
        text: &str,
        _intent: TaskIntent,
        dimensions: usize,
    ) -> AppResult<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            Behavior::Trigram => Ok(Self::trigram_embedding(text, dimensions)),
            Behavior::FixedLength(length) => Ok(Self::trigram_embedding(text, *length)),
            Behavior::FailWhenContains(marker) if text.contains(marker.as_str()) => Err(
                AppError::Embedding(format!("mock failure for text containing '{}'", marker)),
            ),
            Behavior::FailWhenContains(_) => Ok(Self::trigram_embedding(text, dimensions)),
            Behavior::RateLimited => Err(AppError::EmbeddingRateLimited(
                "RESOURCE_EXHAUSTED: quota exceeded".to_string(),
            )),
        }
    }
}
