use std::time::Duration;
use thiserror::Error;

/// Errors raised by the external services the pipeline talks to.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Failed to build Reqwest client: {0}")]
    ReqwestClientBuild(reqwest::Error),
    #[error("Failed to send request to AI provider: {0}")]
    AiRequest(reqwest::Error),
    #[error("Failed to deserialize AI provider response: {0}")]
    AiDeserialization(reqwest::Error),
    #[error("AI provider returned an error: {0}")]
    AiApi(String),
    #[error("API key is missing for provider '{0}'")]
    MissingApiKey(String),
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),
    #[error("Classifier returned '{got}', expected one of {expected:?}")]
    InvalidLabel { got: String, expected: Vec<String> },
    #[error("Embedding is malformed: {0}")]
    MalformedEmbedding(String),
    #[error("Vector store request failed: {0}")]
    VectorStoreRequest(reqwest::Error),
    #[error("Vector store returned an error: {0}")]
    VectorStore(String),
    #[error("Call timed out after {0:?}")]
    Timeout(Duration),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
