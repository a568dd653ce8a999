//! Configuration types for corpus discovery and chunking.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the corpus lives and which files belong to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    /// Corpus root directory.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Glob patterns (relative to root) for files to load.
    #[serde(default = "default_patterns")]
    pub patterns: Vec<String>,

    /// Glob patterns (relative to root) for files to skip even when they match.
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// Language assigned when neither front matter nor the path name one.
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Module assigned when the path carries no `module-<n>` segment.
    #[serde(default = "default_module")]
    pub default_module: String,
}

fn default_root() -> PathBuf {
    PathBuf::from("docs")
}

fn default_patterns() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.mdx".to_string()]
}

fn default_exclude_patterns() -> Vec<String> {
    vec!["**/node_modules/**".to_string(), "**/build/**".to_string()]
}

pub(crate) fn default_language() -> String {
    "en".to_string()
}

fn default_module() -> String {
    "intro".to_string()
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            patterns: default_patterns(),
            exclude_patterns: default_exclude_patterns(),
            default_language: default_language(),
            default_module: default_module(),
        }
    }
}

/// Configuration for document chunking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum tokens per chunk. Larger sections are sub-split.
    #[serde(default = "default_max_chunk_tokens")]
    pub max_chunk_tokens: usize,

    /// Tokens of trailing context repeated at the start of the next sub-chunk.
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,

    /// Heading path used for text that precedes the first heading.
    #[serde(default = "default_intro_heading")]
    pub intro_heading: String,
}

fn default_max_chunk_tokens() -> usize {
    500
}

fn default_overlap_tokens() -> usize {
    50
}

fn default_intro_heading() -> String {
    "Introduction".to_string()
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_tokens: default_max_chunk_tokens(),
            overlap_tokens: default_overlap_tokens(),
            intro_heading: default_intro_heading(),
        }
    }
}

impl ChunkingConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_chunk_tokens == 0 {
            return Err("max_chunk_tokens must be greater than zero".to_string());
        }

        if self.overlap_tokens >= self.max_chunk_tokens {
            return Err(format!(
                "overlap_tokens ({}) must be less than max_chunk_tokens ({})",
                self.overlap_tokens, self.max_chunk_tokens
            ));
        }

        Ok(())
    }
}
