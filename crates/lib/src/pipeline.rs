//! # Prompt Augmentation Pipeline
//!
//! Rewrites an outgoing chat request before it reaches the language model:
//!
//! 1.  **Selector Extraction**: the request metadata must name a document
//!     collection (`files.chatId`), otherwise nothing happens.
//! 2.  **Intent Classification**: the latest user turn is labelled `question`,
//!     `statement`, or `other`. Only questions go on.
//! 3.  **Query Synthesis**: a model writes a hypothetical answer to the
//!     question, and that answer (not the question) is embedded.
//! 4.  **Retrieval & Splicing**: the nearest passages of the collection are
//!     appended to the user turn, after a short label part.
//!
//! Every stage can bail out, and any failure of an external call (error,
//! timeout, malformed reply) does too. Bailing out always returns the request
//! exactly as it came in.

use crate::{
    errors::ProviderError,
    prompts::{CONTEXT_LABEL, HYPOTHETICAL_ANSWER_SYSTEM_PROMPT},
    providers::{
        ai::{AiProvider, Classifier, EmbeddingProvider},
        db::VectorStore,
    },
    selector::{DocumentSelector, Selection},
    types::{Classification, ContentPart, Message, OwnerFilter, RequestContext, RetrievedChunk, Role},
};
use std::{fmt, future::Future, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.10;
pub const DEFAULT_MATCH_COUNT: usize = 10;
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Tunables for a pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Minimum similarity a passage needs to be returned.
    pub match_threshold: f32,
    /// Maximum number of passages spliced into the prompt.
    pub match_count: usize,
    /// Upper bound on each external call.
    pub call_timeout: Duration,
    pub hypothetical_answer_system_prompt: String,
    /// The text part placed between the question and the passages.
    pub context_label: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            match_count: DEFAULT_MATCH_COUNT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            hypothetical_answer_system_prompt: HYPOTHETICAL_ANSWER_SYSTEM_PROMPT.to_string(),
            context_label: CONTEXT_LABEL.to_string(),
        }
    }
}

/// The external call a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Classify,
    Generate,
    Embed,
    Retrieve,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Classify => "classification",
            Stage::Generate => "hypothetical answer generation",
            Stage::Embed => "embedding",
            Stage::Retrieve => "retrieval",
        })
    }
}

#[derive(Error, Debug)]
#[error("{stage} failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: ProviderError,
}

/// Why a request left the pipeline unchanged.
#[derive(Debug)]
pub enum SkipReason {
    /// The metadata carries no document selector.
    ValidationMiss,
    /// There is no message, or the last one is not from the user.
    PreconditionMiss,
    NotAQuestion(Classification),
    UpstreamFailure(StageError),
}

impl From<StageError> for SkipReason {
    fn from(err: StageError) -> Self {
        SkipReason::UpstreamFailure(err)
    }
}

#[derive(Debug)]
pub enum Outcome {
    /// The last user turn gained a label part and `chunks` passages.
    Augmented { chunks: usize },
    Passthrough(SkipReason),
}

impl Outcome {
    pub fn is_augmented(&self) -> bool {
        matches!(self, Outcome::Augmented { .. })
    }
}

/// The (possibly rewritten) request together with how it was handled.
#[derive(Debug)]
pub struct PipelineResult {
    pub context: RequestContext,
    pub outcome: Outcome,
}

impl PipelineResult {
    fn passthrough(context: RequestContext, reason: SkipReason) -> Self {
        Self {
            context,
            outcome: Outcome::Passthrough(reason),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BuildError {
    #[error("pipeline is missing its {0}")]
    Missing(&'static str),
}

/// The retrieval-augmentation pipeline. Cheap to share behind an `Arc`; each
/// call works on its own copy of the request.
#[derive(Debug, Clone)]
pub struct RagPipeline {
    classifier: Arc<dyn Classifier>,
    generator: Arc<dyn AiProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    options: PipelineOptions,
}

impl RagPipeline {
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Runs the pipeline and returns only the resulting request.
    pub async fn transform(&self, context: RequestContext) -> RequestContext {
        self.run(context).await.context
    }

    /// Runs the pipeline. Never fails: every abort path hands back the input.
    pub async fn run(&self, context: RequestContext) -> PipelineResult {
        let selector = match Selection::from_metadata(&context.provider_metadata) {
            Selection::Selected(selector) => selector,
            Selection::Invalid => {
                debug!("No document selector in request metadata, passing through.");
                return PipelineResult::passthrough(context, SkipReason::ValidationMiss);
            }
        };

        let question = match context.prompt.last() {
            Some(message) if message.role == Role::User => message.text(),
            _ => {
                debug!("Last message is missing or not from the user, passing through.");
                return PipelineResult::passthrough(context, SkipReason::PreconditionMiss);
            }
        };
        debug!(question = %question, chat_id = %selector.chat_id, "Latest user message");

        let chunks = match self.retrieve(&question, &selector).await {
            Ok(chunks) => chunks,
            Err(reason) => {
                match &reason {
                    SkipReason::UpstreamFailure(err) => {
                        warn!(stage = %err.stage, "Augmentation skipped: {err}")
                    }
                    SkipReason::NotAQuestion(label) => {
                        info!("Message classified as '{label}', passing through.")
                    }
                    _ => {}
                }
                return PipelineResult::passthrough(context, reason);
            }
        };

        info!(
            "Augmenting prompt with {} passages for collection '{}'.",
            chunks.len(),
            selector.chat_id
        );
        let prompt = splice_context(&context.prompt, &self.options.context_label, &chunks);
        PipelineResult {
            context: RequestContext { prompt, ..context },
            outcome: Outcome::Augmented {
                chunks: chunks.len(),
            },
        }
    }

    /// Classify, synthesize, embed, and query, strictly in that order.
    async fn retrieve(
        &self,
        question: &str,
        selector: &DocumentSelector,
    ) -> Result<Vec<RetrievedChunk>, SkipReason> {
        let label = self
            .bounded(
                Stage::Classify,
                self.classifier.classify(question, &Classification::LABELS),
            )
            .await?;
        let classification = Classification::from_label(&label).ok_or_else(|| StageError {
            stage: Stage::Classify,
            source: ProviderError::InvalidLabel {
                got: label.clone(),
                expected: Classification::LABELS.iter().map(|l| l.to_string()).collect(),
            },
        })?;
        debug!(classification = %classification, "Classified latest user message");
        if classification != Classification::Question {
            return Err(SkipReason::NotAQuestion(classification));
        }

        let hypothetical_answer = self
            .bounded(
                Stage::Generate,
                self.generator
                    .generate(&self.options.hypothetical_answer_system_prompt, question),
            )
            .await?;
        debug!(hypothetical_answer = %hypothetical_answer, "Generated hypothetical answer");

        let vector = self
            .bounded(Stage::Embed, self.embedder.embed(&hypothetical_answer))
            .await?;
        if vector.is_empty() {
            return Err(StageError {
                stage: Stage::Embed,
                source: ProviderError::MalformedEmbedding("empty vector".to_string()),
            }
            .into());
        }

        let filter = OwnerFilter::new(selector.chat_id.as_str());
        let chunks = self
            .bounded(
                Stage::Retrieve,
                self.store.query(
                    &vector,
                    &filter,
                    self.options.match_threshold,
                    self.options.match_count,
                ),
            )
            .await?;
        debug!(chunks = ?chunks, "Retrieved relevant chunks");

        Ok(chunks)
    }

    /// Awaits one external call under the configured timeout.
    async fn bounded<T, F>(&self, stage: Stage, call: F) -> Result<T, StageError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        match tokio::time::timeout(self.options.call_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(StageError { stage, source }),
            Err(_) => Err(StageError {
                stage,
                source: ProviderError::Timeout(self.options.call_timeout),
            }),
        }
    }
}

/// Returns a new sequence whose last message carries its original parts,
/// then `label`, then one text part per chunk in the given order.
///
/// Every earlier message is cloned unchanged. An empty sequence stays empty.
pub fn splice_context(messages: &[Message], label: &str, chunks: &[RetrievedChunk]) -> Vec<Message> {
    let Some((last, head)) = messages.split_last() else {
        return Vec::new();
    };

    let content: Vec<ContentPart> = last
        .content
        .iter()
        .cloned()
        .chain(std::iter::once(ContentPart::text(label)))
        .chain(chunks.iter().map(|c| ContentPart::text(c.content.as_str())))
        .collect();

    head.iter()
        .cloned()
        .chain(std::iter::once(Message::new(last.role, content)))
        .collect()
}

/// Builds a [`RagPipeline`]. All four services are required.
#[derive(Default)]
pub struct RagPipelineBuilder {
    classifier: Option<Arc<dyn Classifier>>,
    generator: Option<Arc<dyn AiProvider>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    store: Option<Arc<dyn VectorStore>>,
    options: PipelineOptions,
}

impl RagPipelineBuilder {
    pub fn classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// The provider that writes the hypothetical answer.
    pub fn generator(mut self, generator: Arc<dyn AiProvider>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Result<RagPipeline, BuildError> {
        Ok(RagPipeline {
            classifier: self.classifier.ok_or(BuildError::Missing("classifier"))?,
            generator: self.generator.ok_or(BuildError::Missing("generator"))?,
            embedder: self.embedder.ok_or(BuildError::Missing("embedder"))?,
            store: self.store.ok_or(BuildError::Missing("vector store"))?,
            options: self.options,
        })
    }
}
