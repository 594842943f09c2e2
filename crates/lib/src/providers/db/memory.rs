//! # In-Memory Vector Store
//!
//! A cosine-similarity store held in memory, with an optional JSON snapshot on
//! disk so that separate processes can share what was ingested.

use super::{DocumentSink, NewDocument, VectorStore};
use crate::{
    errors::ProviderError,
    types::{OwnerFilter, RetrievedChunk},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    id: u64,
    #[serde(flatten)]
    document: NewDocument,
}

#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    entries: RwLock<Vec<StoredEntry>>,
    persist_path: Option<PathBuf>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the snapshot at `path` if it exists. Inserts are written back to it.
    pub async fn open_or_create(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let persist_path = path.as_ref().to_path_buf();
        let entries = if tokio::fs::try_exists(&persist_path).await? {
            let data = tokio::fs::read_to_string(&persist_path).await?;
            serde_json::from_str(&data)?
        } else {
            Vec::new()
        };
        info!(
            "Opened vector store snapshot '{}' with {} entries.",
            persist_path.display(),
            entries.len()
        );
        Ok(Self {
            entries: RwLock::new(entries),
            persist_path: Some(persist_path),
        })
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn query(
        &self,
        vector: &[f32],
        filter: &OwnerFilter,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<RetrievedChunk>, ProviderError> {
        let entries = self.entries.read().await;

        let mut scored: Vec<(f32, &StoredEntry)> = entries
            .iter()
            .filter(|e| e.document.user_id == filter.owner_id)
            .map(|e| (cosine_similarity(vector, &e.document.embedding), e))
            .filter(|(score, _)| *score > threshold)
            .collect();

        // Sort descending by score
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        debug!(
            "In-memory query for owner '{}' matched {} entries.",
            filter.owner_id,
            scored.len()
        );

        Ok(scored
            .into_iter()
            .map(|(similarity, e)| RetrievedChunk {
                id: Some(Value::from(e.id)),
                content: e.document.content.clone(),
                similarity,
                metadata: e.document.metadata.clone(),
                owner_id: Some(e.document.user_id.clone()),
            })
            .collect())
    }
}

#[async_trait]
impl DocumentSink for InMemoryVectorStore {
    /// Entries only become visible once the snapshot (if any) is written.
    async fn insert_documents(&self, documents: Vec<NewDocument>) -> Result<usize, ProviderError> {
        let mut entries = self.entries.write().await;
        let count = documents.len();
        let first_id = entries.iter().map(|e| e.id + 1).max().unwrap_or(0);

        let mut updated = entries.clone();
        updated.extend(
            documents
                .into_iter()
                .zip(first_id..)
                .map(|(document, id)| StoredEntry { id, document }),
        );

        if let Some(path) = &self.persist_path {
            write_snapshot(path, &updated).await?;
        }

        *entries = updated;
        Ok(count)
    }
}

/// Writes to a sibling temp file and renames it over `path`, so a failed or
/// interrupted write leaves the previous snapshot intact.
async fn write_snapshot(path: &Path, entries: &[StoredEntry]) -> Result<(), ProviderError> {
    let data = serde_json::to_string(entries)?;
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, data).await?;
    if let Err(err) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(err.into());
    }
    Ok(())
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
