//! # Document-Grounded Prompt Augmentation
//!
//! This crate enriches a chat request with passages from a user's own
//! documents before it reaches a language model. A request passes through
//! four stages:
//!
//! 1. **Selection:** the provider metadata must name the chat whose documents
//!    may be searched.
//! 2. **Intent:** the latest user message is classified as a question,
//!    statement, or other. Only questions continue.
//! 3. **Query synthesis:** a model drafts a hypothetical answer, which is
//!    embedded as the search vector.
//! 4. **Retrieval and splicing:** owner-scoped passages are fetched from the
//!    vector store and appended to the last message.
//!
//! Every stage is best-effort. Any miss or failure hands the request on
//! unchanged; see [`pipeline::Outcome`] for what happened.

pub mod errors;
pub mod ingest;
pub mod model;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod selector;
pub mod types;

pub use errors::ProviderError;
pub use model::{AugmentedModel, Completion};
pub use pipeline::{
    splice_context, Outcome, PipelineOptions, PipelineResult, RagPipeline, SkipReason, Stage,
    StageError,
};
pub use selector::{DocumentSelector, Selection};
pub use types::{
    Classification, ContentPart, Message, OwnerFilter, ProviderConfig, RequestContext,
    RetrievedChunk, Role,
};
