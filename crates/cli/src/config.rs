//! # Application Configuration
//!
//! Loads the `docrag` configuration in layers: built-in task defaults, then a
//! YAML file with `${VAR}` substitution, then `DOCRAG_...` environment
//! overrides (`DOCRAG_RETRIEVAL__MATCH_COUNT=5`).

use config::{
    Config as ConfigBuilder, Environment, File, FileFormat, Value as ConfigValue,
    ValueKind as ConfigValueKind,
};
use docrag::{
    ingest::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE},
    pipeline::{DEFAULT_CALL_TIMEOUT, DEFAULT_MATCH_COUNT, DEFAULT_MATCH_THRESHOLD},
    prompts::{CHAT_SYSTEM_PROMPT, CLASSIFICATION_SYSTEM_PROMPT, CONTEXT_LABEL, HYPOTHETICAL_ANSWER_SYSTEM_PROMPT},
    ProviderConfig,
};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use tracing::info;

pub const CLASSIFICATION_TASK: &str = "classification";
pub const HYPOTHETICAL_ANSWER_TASK: &str = "hypothetical_answer";
pub const CHAT_TASK: &str = "chat";

/// The provider name the built-in tasks point at.
pub const DEFAULT_PROVIDER: &str = "default";

/// A custom error type for configuration issues.
#[derive(Debug)]
pub enum ConfigError {
    /// Indicates an error from the underlying `config` crate.
    General(String),
    /// Indicates a required configuration file was not found.
    NotFound(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::General(msg) => write!(f, "Configuration error: {msg}"),
            ConfigError::NotFound(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::General(err.to_string())
    }
}

/// The root configuration structure, mapping directly to `config.yml`.
#[derive(Debug, Deserialize, Clone)]
#[allow(dead_code)]
pub struct AppConfig {
    /// Named, reusable AI provider configurations.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    /// The provider and system prompt for each model-backed step.
    pub tasks: HashMap<String, TaskConfig>,
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Defines the provider and prompt for a specific task.
#[derive(Debug, Deserialize, Clone, Default)]
#[allow(dead_code)]
pub struct TaskConfig {
    /// The key of the provider to use from the `providers` map.
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

/// Configuration for the embedding model provider.
#[derive(Debug, Deserialize, Clone)]
#[allow(dead_code)]
pub struct EmbeddingConfig {
    pub api_url: String,
    pub model_name: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// When set, vectors of any other length are rejected.
    #[serde(default)]
    pub dimensions: Option<usize>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreKind {
    Supabase,
    #[default]
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
#[allow(dead_code)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub kind: VectorStoreKind,
    /// The Supabase project URL.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub match_function: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    /// Snapshot file for the in-memory store.
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            kind: VectorStoreKind::default(),
            url: None,
            api_key: None,
            match_function: None,
            table: None,
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> String {
    "db/docrag-store.json".to_string()
}

#[derive(Debug, Deserialize, Clone)]
#[allow(dead_code)]
pub struct RetrievalConfig {
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f32,
    #[serde(default = "default_match_count")]
    pub match_count: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_context_label")]
    pub context_label: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            match_threshold: default_match_threshold(),
            match_count: default_match_count(),
            timeout_secs: default_timeout_secs(),
            context_label: default_context_label(),
        }
    }
}

fn default_match_threshold() -> f32 {
    DEFAULT_MATCH_THRESHOLD
}

fn default_match_count() -> usize {
    DEFAULT_MATCH_COUNT
}

fn default_timeout_secs() -> u64 {
    DEFAULT_CALL_TIMEOUT.as_secs()
}

fn default_context_label() -> String {
    CONTEXT_LABEL.to_string()
}

#[derive(Debug, Deserialize, Clone)]
#[allow(dead_code)]
pub struct IngestConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

/// The built-in tasks, used as the base configuration layer.
fn build_default_tasks() -> HashMap<String, ConfigValue> {
    [
        (CLASSIFICATION_TASK, CLASSIFICATION_SYSTEM_PROMPT),
        (HYPOTHETICAL_ANSWER_TASK, HYPOTHETICAL_ANSWER_SYSTEM_PROMPT),
        (CHAT_TASK, CHAT_SYSTEM_PROMPT),
    ]
    .into_iter()
    .map(|(name, system_prompt)| {
        let mut table = HashMap::new();
        table.insert("provider".to_string(), ConfigValue::from(DEFAULT_PROVIDER));
        table.insert("system_prompt".to_string(), ConfigValue::from(system_prompt));
        (
            name.to_string(),
            ConfigValue::new(None, ConfigValueKind::Table(table)),
        )
    })
    .collect()
}

/// Reads a file and substitutes `${VAR}` with the environment variable's
/// value. Returns `Ok(None)` if the file does not exist.
pub fn read_and_substitute(path: &str) -> Result<Option<String>, ConfigError> {
    if !std::path::Path::new(path).exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::General(format!("Failed to read config file '{path}': {e}")))?;

    let re = Regex::new(r"\$\{(?P<var>[A-Z0-9_]+)\}")
        .map_err(|e| ConfigError::General(e.to_string()))?;
    let expanded_content = re.replace_all(&content, |caps: &regex::Captures| {
        env::var(&caps["var"]).unwrap_or_default()
    });

    Ok(Some(expanded_content.to_string()))
}

/// Loads the configuration.
///
/// An explicit `config_path` must exist. Otherwise `config.yml` in the working
/// directory is used when present, and the environment alone when it is not.
pub fn get_config(config_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = ConfigBuilder::builder()
        // Layer 1: Programmatic defaults from the library.
        .set_default("tasks", build_default_tasks())?;

    // Layer 2: YAML file.
    let path = config_path.unwrap_or("config.yml");
    match read_and_substitute(path)? {
        Some(content) => {
            info!("Loading configuration from '{path}'.");
            builder = builder.add_source(File::from_str(&content, FileFormat::Yaml));
        }
        None if config_path.is_some() => {
            return Err(ConfigError::NotFound(format!(
                "Config file not found at '{path}'."
            )));
        }
        None => info!("No '{path}' found, using defaults and environment only."),
    }

    // Layer 3: DOCRAG_ prefixed environment variables.
    let settings = builder
        .add_source(
            Environment::with_prefix("DOCRAG")
                .prefix_separator("_")
                .try_parsing(true)
                .separator("__"),
        )
        .build()?;

    let config: AppConfig = settings.try_deserialize()?;
    if config.retrieval.timeout_secs == 0 {
        return Err(ConfigError::General(
            "retrieval.timeout_secs must be at least 1".to_string(),
        ));
    }
    Ok(config)
}
