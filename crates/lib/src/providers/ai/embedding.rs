//! # Embeddings Provider
//!
//! Vector embeddings over HTTP. One client speaks three request shapes, picked
//! from the API URL: Gemini (`generativelanguage.googleapis.com`), Cohere
//! (`cohere`), and OpenAI-compatible for everything else.

use crate::errors::ProviderError;
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::debug;

/// Turns text into a fixed-dimension vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + Debug {
    /// Embeds text that will be used as a search query.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Embeds a passage that will be stored and searched against.
    async fn embed_document(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed(text).await
    }
}

// --- OpenAI-compatible request and response structures ---

#[derive(Serialize, Debug)]
struct OpenAIEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize, Debug)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingData>,
}

#[derive(Deserialize, Debug)]
struct OpenAIEmbeddingData {
    embedding: Vec<f32>,
}

// --- Gemini-specific request and response structures ---

#[derive(Serialize, Debug)]
struct GeminiEmbeddingRequest<'a> {
    model: String,
    content: GeminiEmbeddingContent<'a>,
}

#[derive(Serialize, Debug)]
struct GeminiEmbeddingContent<'a> {
    parts: Vec<GeminiEmbeddingPart<'a>>,
}

#[derive(Serialize, Debug)]
struct GeminiEmbeddingPart<'a> {
    text: &'a str,
}

#[derive(Deserialize, Debug)]
struct GeminiEmbeddingResponse {
    embedding: GeminiEmbeddingValue,
}

#[derive(Deserialize, Debug)]
struct GeminiEmbeddingValue {
    values: Vec<f32>,
}

// --- Cohere request and response structures ---

#[derive(Serialize, Debug)]
struct CohereEmbeddingRequest<'a> {
    model: &'a str,
    texts: Vec<&'a str>,
    input_type: &'a str,
}

#[derive(Deserialize, Debug)]
struct CohereEmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApiFlavor {
    OpenAi,
    Gemini,
    Cohere,
}

impl ApiFlavor {
    fn from_url(api_url: &str) -> Self {
        if api_url.contains("generativelanguage.googleapis.com") {
            ApiFlavor::Gemini
        } else if api_url.contains("cohere") {
            ApiFlavor::Cohere
        } else {
            ApiFlavor::OpenAi
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum InputKind {
    Query,
    Document,
}

/// An embedding client for OpenAI-compatible, Gemini, and Cohere endpoints.
#[derive(Clone, Debug)]
pub struct HttpEmbeddingProvider {
    client: ReqwestClient,
    api_url: String,
    model: String,
    api_key: Option<String>,
    dimensions: Option<usize>,
    flavor: ApiFlavor,
}

impl HttpEmbeddingProvider {
    pub fn new(
        api_url: String,
        model: String,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        let client = ReqwestClient::builder()
            .build()
            .map_err(ProviderError::ReqwestClientBuild)?;
        let flavor = ApiFlavor::from_url(&api_url);
        Ok(Self {
            client,
            api_url,
            model,
            api_key,
            dimensions: None,
            flavor,
        })
    }

    /// Rejects vectors whose length differs from `dimensions`.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    async fn request(&self, input: &str, kind: InputKind) -> Result<Vec<f32>, ProviderError> {
        let mut request_builder = self.client.post(&self.api_url);

        // --- 1. Construct the appropriate request body and apply auth ---
        request_builder = match self.flavor {
            ApiFlavor::Gemini => {
                let gemini_model_name = if self.model.starts_with("models/") {
                    self.model.clone()
                } else {
                    format!("models/{}", self.model)
                };
                let request_body = GeminiEmbeddingRequest {
                    model: gemini_model_name,
                    content: GeminiEmbeddingContent {
                        parts: vec![GeminiEmbeddingPart { text: input }],
                    },
                };
                debug!(payload = ?request_body, "--> Sending request to Gemini Embeddings API");
                let builder = request_builder.json(&request_body);
                match &self.api_key {
                    Some(key) => builder.header("x-goog-api-key", key),
                    None => builder,
                }
            }
            ApiFlavor::Cohere => {
                let request_body = CohereEmbeddingRequest {
                    model: &self.model,
                    texts: vec![input],
                    input_type: match kind {
                        InputKind::Query => "search_query",
                        InputKind::Document => "search_document",
                    },
                };
                debug!(payload = ?request_body, "--> Sending request to Cohere Embed API");
                let builder = request_builder.json(&request_body);
                match &self.api_key {
                    Some(key) => builder.bearer_auth(key),
                    None => builder,
                }
            }
            ApiFlavor::OpenAi => {
                let request_body = OpenAIEmbeddingRequest {
                    model: &self.model,
                    input,
                };
                debug!(payload = ?request_body, "--> Sending request to OpenAI-compatible Embeddings API");
                let builder = request_builder.json(&request_body);
                match &self.api_key {
                    Some(key) => builder.bearer_auth(key),
                    None => builder,
                }
            }
        };

        // --- 2. Send the request and handle the response ---
        let response = request_builder
            .send()
            .await
            .map_err(ProviderError::AiRequest)?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::AiApi(error_text));
        }

        let vector = match self.flavor {
            ApiFlavor::Gemini => {
                let gemini_response: GeminiEmbeddingResponse = response
                    .json()
                    .await
                    .map_err(ProviderError::AiDeserialization)?;
                gemini_response.embedding.values
            }
            ApiFlavor::Cohere => {
                let cohere_response: CohereEmbeddingResponse = response
                    .json()
                    .await
                    .map_err(ProviderError::AiDeserialization)?;
                cohere_response
                    .embeddings
                    .into_iter()
                    .next()
                    .unwrap_or_default()
            }
            ApiFlavor::OpenAi => {
                let openai_response: OpenAIEmbeddingResponse = response
                    .json()
                    .await
                    .map_err(ProviderError::AiDeserialization)?;
                openai_response
                    .data
                    .into_iter()
                    .next()
                    .map(|d| d.embedding)
                    .unwrap_or_default()
            }
        };

        self.check(vector)
    }

    fn check(&self, vector: Vec<f32>) -> Result<Vec<f32>, ProviderError> {
        if vector.is_empty() {
            return Err(ProviderError::MalformedEmbedding(
                "API returned no embedding".to_string(),
            ));
        }
        match self.dimensions {
            Some(expected) if expected != vector.len() => {
                Err(ProviderError::MalformedEmbedding(format!(
                    "expected {expected} dimensions, got {}",
                    vector.len()
                )))
            }
            _ => Ok(vector),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.request(text, InputKind::Query).await
    }

    async fn embed_document(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.request(text, InputKind::Document).await
    }
}
