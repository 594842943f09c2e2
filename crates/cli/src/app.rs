//! # Service Wiring
//!
//! Turns an [`AppConfig`] into the library's services and runs the three
//! subcommands on top of them.

use crate::config::{
    AppConfig, VectorStoreKind, CHAT_TASK, CLASSIFICATION_TASK, HYPOTHETICAL_ANSWER_TASK,
};
use anyhow::{anyhow, Context, Result};
use docrag::{
    ingest::{ingest_text, IngestOptions},
    providers::{
        ai::{AiProvider, ChatModel, EmbeddingProvider, HttpEmbeddingProvider, LlmClassifier},
        db::{DocumentSink, InMemoryVectorStore, SupabaseVectorStore, VectorStore},
        factory::{create_chat_model, create_provider},
    },
    AugmentedModel, PipelineOptions, ProviderConfig, RagPipeline, RequestContext,
};
use serde_json::json;
use std::{io::Read, sync::Arc, time::Duration};
use tracing::info;

/// A task with its provider and prompt resolved.
#[derive(Clone, Debug)]
pub struct ResolvedTask<'a> {
    pub provider: &'a ProviderConfig,
    pub system_prompt: &'a str,
}

/// Looks up a task and the provider it names.
pub fn resolve_task<'a>(config: &'a AppConfig, name: &str) -> Result<ResolvedTask<'a>> {
    let task = config
        .tasks
        .get(name)
        .ok_or_else(|| anyhow!("Task '{name}' is not configured"))?;
    let provider_name = task
        .provider
        .as_deref()
        .ok_or_else(|| anyhow!("Task '{name}' is missing required 'provider' field"))?;
    let provider = config.providers.get(provider_name).ok_or_else(|| {
        anyhow!("Task '{name}' uses provider '{provider_name}', which is not configured")
    })?;
    let system_prompt = task
        .system_prompt
        .as_deref()
        .ok_or_else(|| anyhow!("Task '{name}' is missing required 'system_prompt' field"))?;
    Ok(ResolvedTask {
        provider,
        system_prompt,
    })
}

/// The configured vector store, usable both for search and for inserts.
#[derive(Clone, Debug)]
pub enum Store {
    Supabase(Arc<SupabaseVectorStore>),
    Memory(Arc<InMemoryVectorStore>),
}

impl Store {
    pub fn vector_store(&self) -> Arc<dyn VectorStore> {
        match self {
            Store::Supabase(store) => store.clone(),
            Store::Memory(store) => store.clone(),
        }
    }

    pub fn sink(&self) -> Arc<dyn DocumentSink> {
        match self {
            Store::Supabase(store) => store.clone(),
            Store::Memory(store) => store.clone(),
        }
    }
}

pub async fn build_store(config: &AppConfig) -> Result<Store> {
    let store_config = &config.vector_store;
    match store_config.kind {
        VectorStoreKind::Supabase => {
            let url = store_config
                .url
                .clone()
                .filter(|u| !u.is_empty())
                .ok_or_else(|| anyhow!("vector_store.url is required for the supabase store"))?;
            let api_key = store_config
                .api_key
                .clone()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| {
                    anyhow!("vector_store.api_key is required for the supabase store")
                })?;
            let mut store = SupabaseVectorStore::new(url, api_key)?;
            if let Some(function) = &store_config.match_function {
                store = store.with_match_function(function);
            }
            if let Some(table) = &store_config.table {
                store = store.with_table(table);
            }
            info!("Using Supabase vector store.");
            Ok(Store::Supabase(Arc::new(store)))
        }
        VectorStoreKind::Memory => {
            if let Some(parent) = std::path::Path::new(&store_config.path).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            let store = InMemoryVectorStore::open_or_create(&store_config.path).await?;
            Ok(Store::Memory(Arc::new(store)))
        }
    }
}

pub fn build_embedder(config: &AppConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let embedding = &config.embedding;
    let mut embedder = HttpEmbeddingProvider::new(
        embedding.api_url.clone(),
        embedding.model_name.clone(),
        embedding.api_key.clone().filter(|k| !k.is_empty()),
    )?;
    if let Some(dimensions) = embedding.dimensions {
        embedder = embedder.with_dimensions(dimensions);
    }
    Ok(Arc::new(embedder))
}

pub fn build_pipeline(config: &AppConfig, store: &Store) -> Result<RagPipeline> {
    let classification = resolve_task(config, CLASSIFICATION_TASK)?;
    let hypothetical_answer = resolve_task(config, HYPOTHETICAL_ANSWER_TASK)?;

    let classifier_provider: Arc<dyn AiProvider> = create_provider(classification.provider)?;
    let classifier =
        LlmClassifier::with_system_prompt(classifier_provider, classification.system_prompt);
    let generator = create_provider(hypothetical_answer.provider)?;

    let options = PipelineOptions {
        match_threshold: config.retrieval.match_threshold,
        match_count: config.retrieval.match_count,
        call_timeout: Duration::from_secs(config.retrieval.timeout_secs),
        hypothetical_answer_system_prompt: hypothetical_answer.system_prompt.to_string(),
        context_label: config.retrieval.context_label.clone(),
    };

    Ok(RagPipeline::builder()
        .classifier(Arc::new(classifier))
        .generator(generator)
        .embedder(build_embedder(config)?)
        .vector_store(store.vector_store())
        .options(options)
        .build()?)
}

pub fn build_model(config: &AppConfig, pipeline: RagPipeline) -> Result<AugmentedModel> {
    let chat = resolve_task(config, CHAT_TASK)?;
    let model: Arc<dyn ChatModel> = create_chat_model(chat.provider)?;
    Ok(AugmentedModel::new(model, Arc::new(pipeline)).with_system_prompt(chat.system_prompt))
}

/// Reads a request envelope from a file, or from stdin when `source` is `-`.
pub async fn read_request(source: &str) -> Result<RequestContext> {
    let raw = if source == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("Failed to read request file '{source}'"))?
    };
    serde_json::from_str(&raw).context("Request is not a valid RequestContext")
}

pub async fn run_augment(config: &AppConfig, source: &str) -> Result<String> {
    let request = read_request(source).await?;
    let store = build_store(config).await?;
    let pipeline = build_pipeline(config, &store)?;

    let result = pipeline.run(request).await;
    info!(outcome = ?result.outcome, "Pipeline finished.");
    Ok(serde_json::to_string_pretty(&result.context)?)
}

pub async fn run_chat(config: &AppConfig, source: &str) -> Result<String> {
    let request = read_request(source).await?;
    let store = build_store(config).await?;
    let model = build_model(config, build_pipeline(config, &store)?)?;

    let completion = model.complete(request).await?;
    info!(outcome = ?completion.outcome, "Chat completed.");
    Ok(completion.text)
}

pub async fn run_ingest(config: &AppConfig, owner_id: &str, file: &str) -> Result<String> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read '{file}'"))?;
    let store = build_store(config).await?;
    let embedder = build_embedder(config)?;
    let options = IngestOptions {
        chunk_size: config.ingest.chunk_size,
        chunk_overlap: config.ingest.chunk_overlap,
        ..Default::default()
    };

    let result = ingest_text(
        embedder.as_ref(),
        store.sink().as_ref(),
        owner_id,
        &text,
        json!({ "file": file }),
        options,
    )
    .await?;
    Ok(format!(
        "Ingested {} chunks from '{file}' for '{}'.",
        result.documents_added, result.owner_id
    ))
}
