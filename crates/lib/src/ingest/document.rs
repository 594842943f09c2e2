use super::{text::chunk_text, IngestError, IngestOptions, IngestionResult};
use crate::providers::{
    ai::EmbeddingProvider,
    db::{DocumentSink, NewDocument},
};
use futures::{stream, StreamExt, TryStreamExt};
use serde_json::{Map, Value};
use tracing::{debug, info};

/// Chunks `text`, embeds every chunk, and stores the chunks under `owner_id`.
///
/// Each stored document carries the caller's `metadata` plus its
/// `chunk_index`. Nothing is written unless every chunk embedded successfully.
pub async fn ingest_text(
    embedder: &dyn EmbeddingProvider,
    sink: &dyn DocumentSink,
    owner_id: &str,
    text: &str,
    metadata: Value,
    options: IngestOptions,
) -> Result<IngestionResult, IngestError> {
    let base_metadata = match metadata {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        _ => return Err(IngestError::InvalidMetadata),
    };

    let chunks = chunk_text(text, options.chunk_size, options.chunk_overlap)?;
    info!("Ingesting {} chunks for owner '{owner_id}'", chunks.len());

    let embeddings: Vec<Vec<f32>> = stream::iter(chunks.iter())
        .map(|chunk| embedder.embed_document(chunk))
        .buffered(options.concurrency.max(1))
        .try_collect()
        .await
        .map_err(IngestError::Embedding)?;
    debug!("Embedded {} chunks", embeddings.len());

    let documents: Vec<NewDocument> = chunks
        .into_iter()
        .zip(embeddings)
        .enumerate()
        .map(|(index, (content, embedding))| {
            let mut metadata = base_metadata.clone();
            metadata.insert("chunk_index".to_string(), Value::from(index));
            NewDocument {
                content,
                metadata: Value::Object(metadata),
                user_id: owner_id.to_string(),
                embedding,
            }
        })
        .collect();

    let documents_added = sink
        .insert_documents(documents)
        .await
        .map_err(IngestError::Store)?;
    info!("Stored {documents_added} documents for owner '{owner_id}'");

    Ok(IngestionResult {
        owner_id: owner_id.to_string(),
        documents_added,
    })
}
