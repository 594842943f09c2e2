//! # Selector Extraction
//!
//! Reads the document-collection identifier out of the request metadata. The
//! expected shape is `{ "files": { "chatId": "<id>" } }`; anything else means
//! the request is not scoped to a collection and the pipeline stays out of the
//! way.

use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
struct SelectionMetadata {
    files: FilesSelection,
}

#[derive(Deserialize)]
struct FilesSelection {
    #[serde(rename = "chatId")]
    chat_id: String,
}

/// The collection a request's retrieval is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSelector {
    pub chat_id: String,
}

/// The result of validating request metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Selected(DocumentSelector),
    /// The metadata is absent or does not have the expected shape.
    Invalid,
}

impl Selection {
    pub fn from_metadata(metadata: &Value) -> Self {
        match SelectionMetadata::deserialize(metadata) {
            Ok(parsed) => Selection::Selected(DocumentSelector {
                chat_id: parsed.files.chat_id,
            }),
            Err(_) => Selection::Invalid,
        }
    }
}
