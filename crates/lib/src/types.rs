//! # Core Types
//!
//! The message and request envelope types that flow through the pipeline,
//! plus the small value types produced along the way.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// The payload of a `text` content part.
///
/// Fields other than `text` are kept in `extra` so they survive a round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct TextPart {
    pub text: String,
    pub extra: Map<String, Value>,
}

/// One typed part of a message's content.
///
/// Only `text` parts are interpreted. Every other part type is carried as raw
/// JSON and written back exactly as it was read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum ContentPart {
    Text(TextPart),
    Other(Value),
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text(TextPart {
            text: text.into(),
            extra: Map::new(),
        })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text(part) => Some(&part.text),
            ContentPart::Other(_) => None,
        }
    }
}

impl From<Value> for ContentPart {
    fn from(value: Value) -> Self {
        let is_text = value.get("type").and_then(Value::as_str) == Some("text")
            && value.get("text").is_some_and(Value::is_string);
        match value {
            Value::Object(mut map) if is_text => {
                map.remove("type");
                let text = match map.remove("text") {
                    Some(Value::String(s)) => s,
                    _ => String::new(),
                };
                ContentPart::Text(TextPart { text, extra: map })
            }
            other => ContentPart::Other(other),
        }
    }
}

impl From<ContentPart> for Value {
    fn from(part: ContentPart) -> Self {
        match part {
            ContentPart::Text(TextPart { text, extra }) => {
                let mut map = Map::with_capacity(extra.len() + 2);
                map.insert("type".to_string(), Value::String("text".to_string()));
                map.insert("text".to_string(), Value::String(text));
                map.extend(extra);
                Value::Object(map)
            }
            ContentPart::Other(value) => value,
        }
    }
}

/// A single turn in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(deserialize_with = "deserialize_content")]
    pub content: Vec<ContentPart>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ContentRepr {
    Plain(String),
    Parts(Vec<ContentPart>),
}

/// Accepts either a list of parts or a bare string, which becomes one text part.
fn deserialize_content<'de, D>(deserializer: D) -> Result<Vec<ContentPart>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match ContentRepr::deserialize(deserializer)? {
        ContentRepr::Plain(text) => vec![ContentPart::text(text)],
        ContentRepr::Parts(parts) => parts,
    })
}

impl Message {
    pub fn new(role: Role, content: Vec<ContentPart>) -> Self {
        Self { role, content }
    }

    /// A message with a single text part.
    pub fn from_text(role: Role, text: impl Into<String>) -> Self {
        Self::new(role, vec![ContentPart::text(text)])
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::from_text(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::from_text(Role::Assistant, text)
    }

    /// The text of every text part, joined by newlines. Other parts are skipped.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentPart::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The per-request envelope handed to the pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    /// The full message sequence that will be sent to the model.
    pub prompt: Vec<Message>,
    /// Opaque caller-supplied metadata.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub provider_metadata: Value,
    /// Any other fields of the envelope; never inspected.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RequestContext {
    pub fn new(prompt: Vec<Message>, provider_metadata: Value) -> Self {
        Self {
            prompt,
            provider_metadata,
            extra: Map::new(),
        }
    }

    /// Builds the envelope a chat handler produces for a conversation scoped
    /// to one document collection.
    pub fn for_chat(prompt: Vec<Message>, chat_id: &str) -> Self {
        Self::new(
            prompt,
            serde_json::json!({ "files": { "chatId": chat_id } }),
        )
    }
}

/// The intent of the latest user turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Question,
    Statement,
    Other,
}

impl Classification {
    /// The closed label set offered to the classifier.
    pub const LABELS: [&'static str; 3] = ["question", "statement", "other"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Question => "question",
            Classification::Statement => "statement",
            Classification::Other => "other",
        }
    }

    /// Maps an exact label back to its variant.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "question" => Some(Classification::Question),
            "statement" => Some(Classification::Statement),
            "other" => Some(Classification::Other),
            _ => None,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A passage returned by a vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub content: String,
    #[serde(default)]
    pub similarity: f32,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default, alias = "user_id", skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

/// Restricts a similarity search to one document collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerFilter {
    pub owner_id: String,
}

impl OwnerFilter {
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
        }
    }
}

/// A reusable configuration for a specific AI provider instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// The type of provider ("local" for OpenAI-compatible APIs, or "gemini").
    pub provider: String,
    /// The API URL. Optional for Gemini, where it is derived from the model.
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    pub model_name: String,
}
