pub mod classifier;
pub mod embedding;
pub mod gemini;
pub mod local;

use crate::{errors::ProviderError, types::Message};
use async_trait::async_trait;
use dyn_clone::DynClone;
pub use classifier::LlmClassifier;
pub use embedding::{EmbeddingProvider, HttpEmbeddingProvider};
use std::fmt::Debug;

/// A trait for interacting with a text generation provider.
#[async_trait]
pub trait AiProvider: Send + Sync + Debug + DynClone {
    /// Generates a response from a given system and user prompt.
    async fn generate(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, ProviderError>;
}

dyn_clone::clone_trait_object!(AiProvider);

/// Classifies a piece of text into one of a closed set of labels.
///
/// Implementations must return exactly one of `labels`, or an error.
#[async_trait]
pub trait Classifier: Send + Sync + Debug {
    async fn classify(&self, text: &str, labels: &[&str]) -> Result<String, ProviderError>;
}

/// A chat model that completes a whole conversation.
#[async_trait]
pub trait ChatModel: Send + Sync + Debug {
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[Message],
    ) -> Result<String, ProviderError>;
}
