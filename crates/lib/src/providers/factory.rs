//! # Provider Factory
//!
//! Builds provider instances from a [`ProviderConfig`], so every host wires the
//! same providers the same way.

use crate::{
    errors::ProviderError,
    providers::ai::{gemini::GeminiProvider, local::LocalAiProvider, AiProvider, ChatModel},
    types::ProviderConfig,
};
use std::sync::Arc;
use tracing::info;

enum BuiltProvider {
    Gemini(GeminiProvider),
    Local(LocalAiProvider),
}

/// Creates a text generation provider for the configured backend.
///
/// - `gemini`: needs `api_key`; `api_url` defaults to the model's `generateContent` endpoint.
/// - `local`: any OpenAI-compatible chat completions endpoint; needs `api_url`.
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn AiProvider>, ProviderError> {
    let provider: Arc<dyn AiProvider> = match build(config)? {
        BuiltProvider::Gemini(p) => Arc::new(p),
        BuiltProvider::Local(p) => Arc::new(p),
    };
    Ok(provider)
}

/// Creates a conversation-level chat model for the configured backend.
pub fn create_chat_model(config: &ProviderConfig) -> Result<Arc<dyn ChatModel>, ProviderError> {
    let model: Arc<dyn ChatModel> = match build(config)? {
        BuiltProvider::Gemini(p) => Arc::new(p),
        BuiltProvider::Local(p) => Arc::new(p),
    };
    Ok(model)
}

fn build(config: &ProviderConfig) -> Result<BuiltProvider, ProviderError> {
    info!(
        "Creating '{}' provider for model '{}'",
        config.provider, config.model_name
    );

    match config.provider.as_str() {
        "gemini" => {
            let api_key = config
                .api_key
                .clone()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| ProviderError::MissingApiKey("gemini".to_string()))?;
            let api_url = config
                .api_url
                .clone()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| GeminiProvider::url_for_model(&config.model_name));
            Ok(BuiltProvider::Gemini(GeminiProvider::new(api_url, api_key)?))
        }
        "local" => {
            let api_url = config
                .api_url
                .clone()
                .filter(|u| !u.is_empty())
                .ok_or_else(|| {
                    ProviderError::UnsupportedProvider(
                        "the 'local' provider requires an api_url".to_string(),
                    )
                })?;
            Ok(BuiltProvider::Local(LocalAiProvider::new(
                api_url,
                config.api_key.clone().filter(|k| !k.is_empty()),
                Some(config.model_name.clone()),
            )?))
        }
        other => Err(ProviderError::UnsupportedProvider(other.to_string())),
    }
}
