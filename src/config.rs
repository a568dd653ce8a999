//! Configuration module for the retrieval pipeline.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file (`.bookrag/settings.toml`)
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `BOOKRAG_` and use double underscores
//! to separate nested levels:
//! - `BOOKRAG_RETRIEVAL__TOP_K=5` sets `retrieval.top_k`
//! - `BOOKRAG_VECTOR_STORE__URL=http://qdrant:6333` sets `vector_store.url`
//! - `BOOKRAG_EMBEDDING__BATCH_SIZE=50` sets `embedding.batch_size`
//!
//! API keys may also come from `OPENAI_API_KEY` and `QDRANT_API_KEY`.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::documents::{ChunkingConfig, CorpusConfig};

/// Directory holding the settings file and local state.
pub const CONFIG_DIR: &str = ".bookrag";

const ENV_PREFIX: &str = "BOOKRAG_";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Workspace root directory (where .bookrag is located)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    #[serde(default)]
    pub corpus: CorpusConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Backoff for provider and store calls (indexing and retrieval)
    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub citations: CitationConfig,

    #[serde(default)]
    pub language: LanguageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which embedding backend to use.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// OpenAI-compatible `/embeddings` endpoint.
    #[default]
    OpenAi,
    /// Deterministic feature hashing. Offline, no model download.
    Hashing,
    /// Local ONNX model via fastembed (`local-models` feature).
    FastEmbed,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProviderKind,

    /// Model name sent to the provider
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,

    /// API key; falls back to `OPENAI_API_KEY`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Vector dimension produced by the model
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Texts per embedding request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Per-request timeout in seconds
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

/// Which vector store backend to use.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreKind {
    /// Qdrant over its REST API.
    #[default]
    Qdrant,
    /// In-process store persisted as a JSON snapshot.
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub backend: VectorStoreKind,

    /// Qdrant REST endpoint
    #[serde(default = "default_qdrant_url")]
    pub url: String,

    /// API key; falls back to `QDRANT_API_KEY`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Collection holding chunk vectors
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Snapshot file for the memory backend
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    /// Per-request timeout in seconds
    #[serde(default = "default_store_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexingConfig {
    /// Maximum in-flight embedding requests
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetrievalConfig {
    /// Chunks returned per query (5-10)
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Below this many requested-language results, fill from the default language
    #[serde(default = "default_min_language_results")]
    pub min_language_results: usize,

    /// Chunks before the anchor in a selection window
    #[serde(default = "default_window_before")]
    pub window_before: usize,

    /// Exclusive upper offset after the anchor: window is `[i - before, i + after)`
    #[serde(default = "default_window_after")]
    pub window_after: usize,

    /// Candidates fetched from the anchor document when locating a selection
    #[serde(default = "default_anchor_candidates")]
    pub anchor_candidates: usize,

    /// Best-scoring candidate is accepted as anchor at or above this score
    #[serde(default = "default_anchor_min_score")]
    pub anchor_min_score: f32,

    /// Overall budget for one retrieval in seconds
    #[serde(default = "default_retrieval_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CitationConfig {
    /// Citations per answer (capped at 5)
    #[serde(default = "default_max_citations")]
    pub max_citations: usize,

    /// Snippet length in characters before the truncation marker
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LanguageConfig {
    /// Fallback language for retrieval
    #[serde(default = "default_language")]
    pub default: String,

    /// Languages the corpus carries
    #[serde(default = "default_supported_languages")]
    pub supported: Vec<String>,

    /// Detection confidence needed to trust a detected language
    #[serde(default = "default_detection_threshold")]
    pub detection_confidence_threshold: f32,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level: error, warn, info, debug, trace
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides (loader, chunker, indexer, retrieval, store, embedding)
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_embedding_dimension() -> usize {
    1536
}
fn default_batch_size() -> usize {
    100
}
fn default_embedding_timeout_secs() -> u64 {
    30
}
fn default_qdrant_url() -> String {
    "http://localhost:6333".to_string()
}
fn default_collection() -> String {
    "book_chunks".to_string()
}
fn default_snapshot_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("vectors.json")
}
fn default_store_timeout_secs() -> u64 {
    10
}
fn default_concurrency() -> usize {
    5
}
fn default_max_attempts() -> u32 {
    5
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    16_000
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_top_k() -> usize {
    10
}
fn default_min_language_results() -> usize {
    3
}
fn default_window_before() -> usize {
    2
}
fn default_window_after() -> usize {
    3
}
fn default_anchor_candidates() -> usize {
    20
}
fn default_anchor_min_score() -> f32 {
    0.3
}
fn default_retrieval_timeout_secs() -> u64 {
    20
}
fn default_max_citations() -> usize {
    5
}
fn default_snippet_chars() -> usize {
    150
}
fn default_language() -> String {
    "en".to_string()
}
fn default_supported_languages() -> Vec<String> {
    vec!["en".to_string(), "ur".to_string(), "ja".to_string()]
}
fn default_detection_threshold() -> f32 {
    0.5
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            workspace_root: None,
            corpus: CorpusConfig::default(),
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            vector_store: VectorStoreConfig::default(),
            indexing: IndexingConfig::default(),
            retry: RetryConfig::default(),
            retrieval: RetrievalConfig::default(),
            citations: CitationConfig::default(),
            language: LanguageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::default(),
            model: default_embedding_model(),
            base_url: default_embedding_base_url(),
            api_key: None,
            dimension: default_embedding_dimension(),
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    /// Configured key, else `OPENAI_API_KEY`.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: VectorStoreKind::default(),
            url: default_qdrant_url(),
            api_key: None,
            collection: default_collection(),
            snapshot_path: default_snapshot_path(),
            timeout_secs: default_store_timeout_secs(),
        }
    }
}

impl VectorStoreConfig {
    /// Configured key, else `QDRANT_API_KEY`.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("QDRANT_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_language_results: default_min_language_results(),
            window_before: default_window_before(),
            window_after: default_window_after(),
            anchor_candidates: default_anchor_candidates(),
            anchor_min_score: default_anchor_min_score(),
            timeout_secs: default_retrieval_timeout_secs(),
        }
    }
}

impl RetrievalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CitationConfig {
    fn default() -> Self {
        Self {
            max_citations: default_max_citations(),
            snippet_chars: default_snippet_chars(),
        }
    }
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            default: default_language(),
            supported: default_supported_languages(),
            detection_confidence_threshold: default_detection_threshold(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));

        Self::figment(&config_path)
            .extract()
            .map_err(Box::new)
            .map(|mut settings: Settings| {
                if settings.workspace_root.is_none() {
                    settings.workspace_root = Self::workspace_root();
                }
                settings
            })
    }

    /// Load configuration from a specific file (env overrides still apply)
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(path.as_ref()).extract().map_err(Box::new)
    }

    fn figment(config_path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            // Double underscore separates nested levels; single underscores stay in field names
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
    }

    /// Validate cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        self.chunking.validate()?;

        if !(5..=10).contains(&self.retrieval.top_k) {
            return Err(format!(
                "retrieval.top_k ({}) must be between 5 and 10",
                self.retrieval.top_k
            ));
        }
        if self.retrieval.window_after == 0 {
            return Err("retrieval.window_after must be at least 1 to include the anchor".into());
        }
        if self.citations.max_citations > 5 {
            return Err(format!(
                "citations.max_citations ({}) must not exceed 5",
                self.citations.max_citations
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err("embedding.batch_size must be greater than zero".into());
        }
        if self.indexing.concurrency == 0 {
            return Err("indexing.concurrency must be greater than zero".into());
        }
        if self.retry.max_attempts == 0 {
            return Err("retry.max_attempts must be at least 1".into());
        }
        if !self.language.supported.contains(&self.language.default) {
            return Err(format!(
                "language.default '{}' is not in language.supported",
                self.language.default
            ));
        }

        Ok(())
    }

    /// Find the workspace config by looking for a .bookrag directory
    /// from the current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        Self::workspace_root().map(|root| root.join(CONFIG_DIR).join("settings.toml"))
    }

    /// Get the workspace root directory (where .bookrag is located)
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .find(|ancestor| ancestor.join(CONFIG_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file under `dir/.bookrag/`
    pub fn init_config_file(
        dir: impl AsRef<Path>,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = dir.as_ref().join(CONFIG_DIR).join("settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        Settings::default().save(&config_path)?;
        Ok(config_path)
    }
}
