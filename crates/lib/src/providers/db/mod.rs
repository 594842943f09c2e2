pub mod memory;
pub mod supabase;

use crate::{
    errors::ProviderError,
    types::{OwnerFilter, RetrievedChunk},
};
use async_trait::async_trait;
pub use memory::InMemoryVectorStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
pub use supabase::SupabaseVectorStore;

/// A similarity-search backend.
#[async_trait]
pub trait VectorStore: Send + Sync + Debug {
    /// Returns the passages of `filter.owner_id` whose similarity to `vector`
    /// exceeds `threshold`, best first, at most `limit` of them.
    async fn query(
        &self,
        vector: &[f32],
        filter: &OwnerFilter,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>, ProviderError>;
}

/// An embedded passage ready to be stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    pub content: String,
    pub metadata: Value,
    pub user_id: String,
    pub embedding: Vec<f32>,
}

/// A backend that accepts new passages.
#[async_trait]
pub trait DocumentSink: Send + Sync + Debug {
    /// Stores the documents and returns how many were written.
    async fn insert_documents(&self, documents: Vec<NewDocument>) -> Result<usize, ProviderError>;
}
