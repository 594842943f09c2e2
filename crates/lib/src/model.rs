//! # Augmented Chat Model
//!
//! Wraps a [`ChatModel`] so that every completion first goes through the
//! [`RagPipeline`]. Augmentation is best-effort; a failure of the wrapped model
//! itself is returned to the caller.

use crate::{
    errors::ProviderError,
    pipeline::{Outcome, RagPipeline},
    prompts::CHAT_SYSTEM_PROMPT,
    providers::ai::ChatModel,
    types::RequestContext,
};
use std::sync::Arc;
use tracing::info;

/// The model's reply and what the pipeline did to the request.
#[derive(Debug)]
pub struct Completion {
    pub text: String,
    pub outcome: Outcome,
    /// The request as it was sent to the model.
    pub context: RequestContext,
}

#[derive(Debug, Clone)]
pub struct AugmentedModel {
    model: Arc<dyn ChatModel>,
    pipeline: Arc<RagPipeline>,
    system_prompt: String,
}

impl AugmentedModel {
    pub fn new(model: Arc<dyn ChatModel>, pipeline: Arc<RagPipeline>) -> Self {
        Self {
            model,
            pipeline,
            system_prompt: CHAT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: &str) -> Self {
        self.system_prompt = system_prompt.to_string();
        self
    }

    pub async fn complete(&self, context: RequestContext) -> Result<Completion, ProviderError> {
        let result = self.pipeline.run(context).await;
        info!(
            augmented = result.outcome.is_augmented(),
            "Sending {} messages to the chat model.",
            result.context.prompt.len()
        );

        let text = self
            .model
            .complete(&self.system_prompt, &result.context.prompt)
            .await?;

        Ok(Completion {
            text,
            outcome: result.outcome,
            context: result.context,
        })
    }
}
