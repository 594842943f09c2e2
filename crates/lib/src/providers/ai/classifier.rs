//! # LLM-backed Classification
//!
//! Turns any [`AiProvider`] into a [`Classifier`] by constraining the prompt to
//! a closed label set and mapping the free-text reply back onto one label.

use super::{AiProvider, Classifier};
use crate::{
    errors::ProviderError,
    prompts::{CLASSIFICATION_LABELS_INSTRUCTION, CLASSIFICATION_SYSTEM_PROMPT},
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// A classifier that asks a language model to pick a label.
#[derive(Clone, Debug)]
pub struct LlmClassifier {
    provider: Arc<dyn AiProvider>,
    system_prompt: String,
}

impl LlmClassifier {
    pub fn new(provider: Arc<dyn AiProvider>) -> Self {
        Self::with_system_prompt(provider, CLASSIFICATION_SYSTEM_PROMPT)
    }

    pub fn with_system_prompt(provider: Arc<dyn AiProvider>, system_prompt: &str) -> Self {
        Self {
            provider,
            system_prompt: system_prompt.to_string(),
        }
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify(&self, text: &str, labels: &[&str]) -> Result<String, ProviderError> {
        let system_prompt = format!(
            "{}\n{}",
            self.system_prompt,
            CLASSIFICATION_LABELS_INSTRUCTION.replace("{labels}", &labels.join(", "))
        );

        let raw_response = self.provider.generate(&system_prompt, text).await?;
        debug!("<-- Classification from AI: {}", raw_response);

        parse_label(&raw_response, labels).ok_or_else(|| ProviderError::InvalidLabel {
            got: raw_response.trim().to_string(),
            expected: labels.iter().map(|l| l.to_string()).collect(),
        })
    }
}

/// Maps a model reply onto exactly one of `labels`.
///
/// Accepts a bare label with stray quotes or punctuation, a JSON string, or a
/// JSON object carrying the label under `label`, `result`, or `classification`.
/// Free-text sentences are rejected, even when they mention a label.
fn parse_label(response: &str, labels: &[&str]) -> Option<String> {
    let cleaned = response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let candidate = match serde_json::from_str::<Value>(cleaned) {
        Ok(Value::String(s)) => s,
        Ok(Value::Object(map)) => ["label", "result", "classification"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_default(),
        _ => cleaned.to_string(),
    };

    let normalized = candidate
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    labels
        .iter()
        .find(|l| l.to_lowercase() == normalized)
        .map(|l| l.to_string())
}
