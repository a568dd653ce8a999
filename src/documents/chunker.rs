//! Document chunking strategies.
//!
//! Provides the `Chunker` trait and the heading-aware implementation used by
//! the indexer.

use unicode_segmentation::UnicodeSegmentation;

use super::config::ChunkingConfig;
use super::types::{Chunk, Document};

/// Counts tokens for chunk budgeting.
pub trait TokenCounter: Send + Sync {
    /// Number of tokens in `text`.
    fn count(&self, text: &str) -> usize;

    /// Byte offset where the last `tokens` tokens of `text` begin.
    ///
    /// Returns 0 when `text` holds `tokens` tokens or fewer.
    fn tail_start(&self, text: &str, tokens: usize) -> usize;
}

/// UAX #29 word-boundary counter: every word and punctuation mark is a token.
#[derive(Debug, Default, Clone, Copy)]
pub struct WordBoundaryCounter;

fn is_token(segment: &str) -> bool {
    !segment.chars().all(char::is_whitespace)
}

impl TokenCounter for WordBoundaryCounter {
    fn count(&self, text: &str) -> usize {
        text.split_word_bounds().filter(|s| is_token(s)).count()
    }

    fn tail_start(&self, text: &str, tokens: usize) -> usize {
        if tokens == 0 {
            return text.len();
        }
        let starts: Vec<usize> = text
            .split_word_bound_indices()
            .filter(|(_, s)| is_token(s))
            .map(|(i, _)| i)
            .collect();
        if starts.len() <= tokens {
            0
        } else {
            starts[starts.len() - tokens]
        }
    }
}

/// Trait for document chunking strategies.
pub trait Chunker: Send + Sync {
    /// Split a document into ordered chunks with consecutive indices from 0.
    fn chunk(&self, doc: &Document) -> Vec<Chunk>;
}

/// Heading-aware chunker.
///
/// Algorithm:
/// 1. Partition the body at every heading; text before the first heading
///    becomes the intro section
/// 2. Sections within the token budget become one chunk each
/// 3. Larger sections are packed sentence by sentence up to the budget,
///    each new piece starting with the tail of the previous one
/// 4. A single sentence over budget is emitted whole
#[derive(Debug, Clone)]
pub struct HeadingChunker<C = WordBoundaryCounter> {
    config: ChunkingConfig,
    counter: C,
}

impl HeadingChunker<WordBoundaryCounter> {
    pub fn new(config: ChunkingConfig) -> Self {
        Self::with_counter(config, WordBoundaryCounter)
    }
}

impl<C: TokenCounter> HeadingChunker<C> {
    pub fn with_counter(config: ChunkingConfig, counter: C) -> Self {
        Self { config, counter }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Split one section body into chunk texts.
    fn split_section(&self, text: &str) -> Vec<String> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }

        let max = self.config.max_chunk_tokens;
        if self.counter.count(text) <= max {
            return vec![text.to_string()];
        }

        let mut pieces: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut current_tokens = 0;

        for sentence in text.split_sentence_bounds() {
            let tokens = self.counter.count(sentence);
            if tokens == 0 {
                current.push_str(sentence);
                continue;
            }

            if current_tokens + tokens <= max {
                current.push_str(sentence);
                current_tokens += tokens;
                continue;
            }

            let flushed = std::mem::take(&mut current);
            push_trimmed(&mut pieces, &flushed);
            current_tokens = 0;

            if tokens > max {
                tracing::debug!(
                    target: "chunker",
                    "keeping oversized sentence whole ({tokens} > {max} tokens)"
                );
                push_trimmed(&mut pieces, sentence);
                continue;
            }

            if let Some((overlap, overlap_tokens)) = self.overlap_from(pieces.last()) {
                if overlap_tokens + tokens <= max {
                    current.push_str(overlap);
                    current.push(' ');
                    current_tokens = overlap_tokens;
                }
            }
            current.push_str(sentence);
            current_tokens += tokens;
        }

        push_trimmed(&mut pieces, &current);
        pieces
    }

    /// Trailing context of the previous piece to repeat at the start of the next.
    fn overlap_from<'a>(&self, previous: Option<&'a String>) -> Option<(&'a str, usize)> {
        let overlap = self.config.overlap_tokens;
        let previous = previous?;
        if overlap == 0 || self.counter.count(previous) <= overlap {
            return None;
        }
        let start = self.counter.tail_start(previous, overlap);
        let tail = previous[start..].trim();
        Some((tail, self.counter.count(tail)))
    }
}

fn push_trimmed(pieces: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        pieces.push(trimmed.to_string());
    }
}

/// A heading section: breadcrumb plus body slice.
struct Section<'a> {
    heading_path: String,
    text: &'a str,
}

fn sections<'a>(doc: &'a Document, intro_heading: &str) -> Vec<Section<'a>> {
    let body = doc.raw_text.as_str();
    let mut out = Vec::with_capacity(doc.heading_tree.len() + 1);

    let first_start = doc.heading_tree.first().map_or(body.len(), |h| h.start);
    if let Some(text) = body.get(..first_start) {
        out.push(Section {
            heading_path: intro_heading.to_string(),
            text,
        });
    }

    let mut stack: Vec<(u8, &str)> = Vec::new();
    for (i, heading) in doc.heading_tree.iter().enumerate() {
        while stack.last().is_some_and(|(level, _)| *level >= heading.level) {
            stack.pop();
        }
        stack.push((heading.level, heading.text.as_str()));

        let end = doc
            .heading_tree
            .get(i + 1)
            .map_or(body.len(), |next| next.start);
        let Some(text) = body.get(heading.end..end) else {
            tracing::warn!(
                target: "chunker",
                "heading '{}' in {} has out-of-range offsets",
                heading.text,
                doc.path
            );
            continue;
        };

        out.push(Section {
            heading_path: stack
                .iter()
                .map(|(_, text)| *text)
                .collect::<Vec<_>>()
                .join(" > "),
            text,
        });
    }

    out
}

impl<C: TokenCounter> Chunker for HeadingChunker<C> {
    fn chunk(&self, doc: &Document) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for section in sections(doc, &self.config.intro_heading) {
            for text in self.split_section(section.text) {
                let token_count = self.counter.count(&text);
                chunks.push(Chunk {
                    document_path: doc.path.clone(),
                    chunk_index: chunks.len(),
                    heading_path: section.heading_path.clone(),
                    text,
                    token_count,
                    language: doc.language.clone(),
                    module: doc.module.clone(),
                    title: doc.title.clone(),
                    url_path: doc.url_path.clone(),
                });
            }
        }

        tracing::debug!(target: "chunker", "{}: {} chunks", doc.path, chunks.len());
        chunks
    }
}
