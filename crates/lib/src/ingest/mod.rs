//! # Document Ingestion
//!
//! Turns raw text into owner-scoped, embedded chunks and writes them to a
//! [`DocumentSink`](crate::providers::db::DocumentSink), so the retrieval
//! stage of the pipeline has something to find.

pub mod document;
pub mod text;

pub use document::ingest_text;
pub use text::{chunk_text, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};

use crate::errors::ProviderError;
use thiserror::Error;

/// Errors raised while chunking, embedding, or storing a document.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("The document has no text content")]
    EmptyContent,

    #[error("Invalid chunking: overlap {chunk_overlap} must be smaller than size {chunk_size}")]
    InvalidChunking {
        chunk_size: usize,
        chunk_overlap: usize,
    },

    #[error("Document metadata must be a JSON object")]
    InvalidMetadata,

    #[error("Failed to embed a chunk: {0}")]
    Embedding(#[source] ProviderError),

    #[error("Failed to store the chunks: {0}")]
    Store(#[source] ProviderError),
}

/// How a document is cut up and how many chunks are embedded at once.
#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub concurrency: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            concurrency: 4,
        }
    }
}

/// Summary of a finished ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionResult {
    /// The owner the new documents belong to.
    pub owner_id: String,
    /// The number of chunks written to the store.
    pub documents_added: usize,
}
