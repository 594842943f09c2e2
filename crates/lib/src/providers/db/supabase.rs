//! # Supabase (PostgREST) Vector Store
//!
//! Similarity search goes through a Postgres function exposed as an RPC
//! (`match_documents` by default) and inserts go straight to the documents
//! table. Both use the project URL and a service key.

use super::{DocumentSink, NewDocument, VectorStore};
use crate::{
    errors::ProviderError,
    types::{OwnerFilter, RetrievedChunk},
};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::Serialize;
use tracing::debug;

pub const DEFAULT_MATCH_FUNCTION: &str = "match_documents";
pub const DEFAULT_DOCUMENTS_TABLE: &str = "documents";

#[derive(Serialize, Debug)]
struct MatchDocumentsRequest<'a> {
    query_embedding: &'a [f32],
    match_threshold: f32,
    match_count: usize,
    user_id_param: &'a str,
}

#[derive(Clone, Debug)]
pub struct SupabaseVectorStore {
    client: ReqwestClient,
    base_url: String,
    api_key: String,
    match_function: String,
    table: String,
}

impl SupabaseVectorStore {
    pub fn new(base_url: String, api_key: String) -> Result<Self, ProviderError> {
        let client = ReqwestClient::builder()
            .build()
            .map_err(ProviderError::ReqwestClientBuild)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            match_function: DEFAULT_MATCH_FUNCTION.to_string(),
            table: DEFAULT_DOCUMENTS_TABLE.to_string(),
        })
    }

    pub fn with_match_function(mut self, name: &str) -> Self {
        self.match_function = name.to_string();
        self
    }

    pub fn with_table(mut self, table: &str) -> Self {
        self.table = table.to_string();
        self
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::VectorStore(format!("{status}: {body}")))
    }
}

#[async_trait]
impl VectorStore for SupabaseVectorStore {
    async fn query(
        &self,
        vector: &[f32],
        filter: &OwnerFilter,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>, ProviderError> {
        let url = format!("{}/rest/v1/rpc/{}", self.base_url, self.match_function);
        let body = MatchDocumentsRequest {
            query_embedding: vector,
            match_threshold: threshold,
            match_count: limit,
            user_id_param: &filter.owner_id,
        };
        debug!(
            "--> Calling '{}' for owner '{}' (threshold {}, limit {})",
            self.match_function, filter.owner_id, threshold, limit
        );

        let response = self
            .authorized(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::VectorStoreRequest)?;
        let response = Self::check_status(response).await?;

        response
            .json::<Vec<RetrievedChunk>>()
            .await
            .map_err(ProviderError::VectorStoreRequest)
    }
}

#[async_trait]
impl DocumentSink for SupabaseVectorStore {
    async fn insert_documents(&self, documents: Vec<NewDocument>) -> Result<usize, ProviderError> {
        if documents.is_empty() {
            return Ok(0);
        }
        let url = format!("{}/rest/v1/{}", self.base_url, self.table);
        let count = documents.len();

        let response = self
            .authorized(self.client.post(&url))
            .header("Prefer", "return=minimal")
            .json(&documents)
            .send()
            .await
            .map_err(ProviderError::VectorStoreRequest)?;
        Self::check_status(response).await?;

        debug!("<-- Inserted {count} documents into '{}'", self.table);
        Ok(count)
    }
}
