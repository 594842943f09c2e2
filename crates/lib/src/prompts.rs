//! # Default Prompt Templates
//!
//! The prompts used by the pipeline stages and the wrapped chat model. Hosts can
//! override each of them through configuration.

/// System prompt for the intent classification call.
pub const CLASSIFICATION_SYSTEM_PROMPT: &str =
    "classify the user message as a question, statement, or other";

/// Appended to the classification system prompt. Placeholder: `{labels}`.
pub const CLASSIFICATION_LABELS_INSTRUCTION: &str =
    "Respond with exactly one of the following labels and nothing else: {labels}.";

/// System prompt for the hypothetical answer. The model must answer, not rephrase.
pub const HYPOTHETICAL_ANSWER_SYSTEM_PROMPT: &str = "Answer the users question:";

/// The label part inserted ahead of the retrieved passages.
pub const CONTEXT_LABEL: &str =
    "Here is some relevant information that you can use to answer the question:";

/// System prompt for the final chat completion.
pub const CHAT_SYSTEM_PROMPT: &str =
    "You are a File AI Assistant! keep your responses concise and helpful.";
