#![allow(dead_code)]
//! # Common Test Utilities
//!
//! Scripted stand-ins for the four external services, each recording how it
//! was called so tests can assert on call order and arguments.

use async_trait::async_trait;
use docrag::{
    providers::{
        ai::{AiProvider, ChatModel, Classifier, EmbeddingProvider},
        db::{DocumentSink, NewDocument, VectorStore},
    },
    Message, OwnerFilter, ProviderError, RetrievedChunk,
};
use dotenvy::dotenv;
use serde_json::json;
use std::sync::{Arc, Once, RwLock};
use std::time::Duration;

static INIT: Once = Once::new();

/// Initializes the tracing subscriber and loads .env for tests.
pub fn setup_tracing() {
    INIT.call_once(|| {
        dotenv().ok();
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A shared, ordered log of which service was called.
pub type CallLog = Arc<RwLock<Vec<&'static str>>>;

pub fn new_call_log() -> CallLog {
    Arc::new(RwLock::new(Vec::new()))
}

fn failure(what: &str) -> ProviderError {
    ProviderError::AiApi(format!("{what} is down"))
}

// --- Classifier ---

#[derive(Debug)]
pub struct MockClassifier {
    pub label: String,
    pub fail: bool,
    pub delay: Option<Duration>,
    pub calls: Arc<RwLock<Vec<(String, Vec<String>)>>>,
    pub log: CallLog,
}

impl MockClassifier {
    pub fn new(label: &str, log: CallLog) -> Self {
        Self {
            label: label.to_string(),
            fail: false,
            delay: None,
            calls: Arc::new(RwLock::new(Vec::new())),
            log,
        }
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    async fn classify(&self, text: &str, labels: &[&str]) -> Result<String, ProviderError> {
        self.log.write().unwrap().push("classify");
        self.calls.write().unwrap().push((
            text.to_string(),
            labels.iter().map(|l| l.to_string()).collect(),
        ));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(failure("classifier"));
        }
        Ok(self.label.clone())
    }
}

// --- Text generation ---

#[derive(Clone, Debug)]
pub struct MockAiProvider {
    pub response: String,
    pub fail: bool,
    pub call_history: Arc<RwLock<Vec<(String, String)>>>,
    pub log: CallLog,
}

impl MockAiProvider {
    pub fn new(response: &str, log: CallLog) -> Self {
        Self {
            response: response.to_string(),
            fail: false,
            call_history: Arc::new(RwLock::new(Vec::new())),
            log,
        }
    }
}

#[async_trait]
impl AiProvider for MockAiProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ProviderError> {
        self.log.write().unwrap().push("generate");
        self.call_history
            .write()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));
        if self.fail {
            return Err(failure("generator"));
        }
        Ok(self.response.clone())
    }
}

// --- Embeddings ---

#[derive(Debug)]
pub struct MockEmbedder {
    pub vector: Vec<f32>,
    pub fail: bool,
    pub inputs: Arc<RwLock<Vec<String>>>,
    pub log: CallLog,
}

impl MockEmbedder {
    pub fn new(vector: Vec<f32>, log: CallLog) -> Self {
        Self {
            vector,
            fail: false,
            inputs: Arc::new(RwLock::new(Vec::new())),
            log,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.log.write().unwrap().push("embed");
        self.inputs.write().unwrap().push(text.to_string());
        if self.fail {
            return Err(failure("embedder"));
        }
        Ok(self.vector.clone())
    }
}

/// Embeds by word count so different chunks get different vectors.
#[derive(Debug, Default)]
pub struct WordCountEmbedder {
    pub documents: Arc<RwLock<Vec<String>>>,
    pub fail_on: Option<String>,
}

#[async_trait]
impl EmbeddingProvider for WordCountEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        Ok(vec![text.split_whitespace().count() as f32, 1.0])
    }

    async fn embed_document(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        if self.fail_on.as_deref().is_some_and(|needle| text.contains(needle)) {
            return Err(failure("embedder"));
        }
        self.documents.write().unwrap().push(text.to_string());
        self.embed(text).await
    }
}

// --- Vector store ---

#[derive(Debug)]
pub struct MockVectorStore {
    pub chunks: Vec<RetrievedChunk>,
    pub fail: bool,
    pub queries: Arc<RwLock<Vec<(Vec<f32>, OwnerFilter, f32, usize)>>>,
    pub inserted: Arc<RwLock<Vec<NewDocument>>>,
    pub log: CallLog,
}

impl MockVectorStore {
    pub fn new(chunks: Vec<RetrievedChunk>, log: CallLog) -> Self {
        Self {
            chunks,
            fail: false,
            queries: Arc::new(RwLock::new(Vec::new())),
            inserted: Arc::new(RwLock::new(Vec::new())),
            log,
        }
    }
}

#[async_trait]
impl VectorStore for MockVectorStore {
    async fn query(
        &self,
        vector: &[f32],
        filter: &OwnerFilter,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>, ProviderError> {
        self.log.write().unwrap().push("retrieve");
        self.queries
            .write()
            .unwrap()
            .push((vector.to_vec(), filter.clone(), threshold, limit));
        if self.fail {
            return Err(ProviderError::VectorStore("store is down".to_string()));
        }
        Ok(self.chunks.clone())
    }
}

#[async_trait]
impl DocumentSink for MockVectorStore {
    async fn insert_documents(&self, documents: Vec<NewDocument>) -> Result<usize, ProviderError> {
        if self.fail {
            return Err(ProviderError::VectorStore("store is down".to_string()));
        }
        let count = documents.len();
        self.inserted.write().unwrap().extend(documents);
        Ok(count)
    }
}

// --- Chat model ---

#[derive(Debug)]
pub struct MockChatModel {
    pub reply: String,
    pub fail: bool,
    pub calls: Arc<RwLock<Vec<(String, Vec<Message>)>>>,
}

impl MockChatModel {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            fail: false,
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[Message],
    ) -> Result<String, ProviderError> {
        self.calls
            .write()
            .unwrap()
            .push((system_prompt.to_string(), messages.to_vec()));
        if self.fail {
            return Err(failure("chat model"));
        }
        Ok(self.reply.clone())
    }
}

pub fn chunk(content: &str, similarity: f32) -> RetrievedChunk {
    RetrievedChunk {
        id: None,
        content: content.to_string(),
        similarity,
        metadata: json!({}),
        owner_id: Some("c-42".to_string()),
    }
}
