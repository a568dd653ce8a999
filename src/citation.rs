//! Citations for answers: where each supporting passage came from.

use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::CitationConfig;
use crate::retrieval::RetrievedChunk;

/// Upper bound on citations per answer regardless of configuration.
pub const MAX_CITATIONS: usize = 5;

/// Appended to every truncated snippet.
pub const TRUNCATION_MARKER: &str = "...";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub document_path: String,
    pub heading_path: String,
    pub snippet: String,
    pub url_path: String,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct CitationBuilder {
    max_citations: usize,
    snippet_chars: usize,
}

impl Default for CitationBuilder {
    fn default() -> Self {
        Self::from_config(&CitationConfig::default())
    }
}

impl CitationBuilder {
    pub fn new(max_citations: usize, snippet_chars: usize) -> Self {
        Self {
            max_citations: max_citations.min(MAX_CITATIONS),
            snippet_chars: snippet_chars.max(1),
        }
    }

    pub fn from_config(config: &CitationConfig) -> Self {
        Self::new(config.max_citations, config.snippet_chars)
    }

    pub fn max_citations(&self) -> usize {
        self.max_citations
    }

    /// Citations for the best-scoring chunks, highest score first.
    ///
    /// Heading and document paths are copied verbatim from the chunk.
    pub fn build(&self, chunks: &[RetrievedChunk]) -> Vec<Citation> {
        let mut ranked: Vec<&RetrievedChunk> = chunks.iter().collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

        ranked
            .into_iter()
            .take(self.max_citations)
            .map(|hit| Citation {
                document_path: hit.chunk.document_path.clone(),
                heading_path: hit.chunk.heading_path.clone(),
                snippet: snippet(&hit.chunk.text, self.snippet_chars),
                url_path: hit.chunk.url_path.clone(),
                score: hit.score,
            })
            .collect()
    }
}

/// Shorten `text` to at most `max_chars` characters plus the marker.
///
/// Prefers ending on a sentence boundary in the second half of the window,
/// then on a word boundary, then a hard cut.
pub fn snippet(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    let cut = match text.char_indices().nth(max_chars) {
        Some((byte, _)) => byte,
        None => return text.to_string(),
    };
    let half = cut / 2;

    let sentence_end = text
        .split_sentence_bound_indices()
        .filter_map(|(start, sentence)| {
            let trimmed = sentence.trim_end();
            let end = start + trimmed.len();
            let terminal = trimmed
                .chars()
                .last()
                .is_some_and(|c| matches!(c, '.' | '!' | '?' | '。' | '！' | '？' | '۔'));
            (terminal && end > half && end <= cut).then_some(end)
        })
        .last();

    let end = sentence_end.unwrap_or_else(|| {
        text.split_word_bound_indices()
            .filter(|(start, word)| *start <= cut && word.trim().is_empty())
            .map(|(start, _)| start)
            .last()
            .filter(|&start| start > 0)
            .unwrap_or(cut)
    });

    format!("{}{TRUNCATION_MARKER}", text[..end].trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::Chunk;

    fn hit(index: usize, score: f32, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            chunk: Chunk {
                document_path: "module-1/nodes.md".into(),
                chunk_index: index,
                heading_path: "Nodes > Lifecycle".into(),
                text: text.into(),
                token_count: 0,
                language: "en".into(),
                module: "module-1".into(),
                title: "Nodes".into(),
                url_path: "module-1/nodes".into(),
            },
            score,
        }
    }

    #[test]
    fn test_short_text_untouched() {
        assert_eq!(snippet("A node is a process.", 150), "A node is a process.");
    }

    #[test]
    fn test_cut_at_sentence_end() {
        let text = "Nodes are processes that perform computation. They talk over topics and \
                    services, and each one should do a single job well in the graph.";
        let s = snippet(text, 80);
        assert_eq!(s, "Nodes are processes that perform computation....");
    }

    #[test]
    fn test_cut_at_word_boundary() {
        let text = "word ".repeat(60);
        let s = snippet(&text, 22);
        assert_eq!(s, "word word word word...");
        assert!(s.chars().count() <= 22 + TRUNCATION_MARKER.len());
    }

    #[test]
    fn test_hard_cut_without_spaces() {
        let s = snippet(&"x".repeat(40), 10);
        assert_eq!(s, format!("{}...", "x".repeat(10)));
    }

    #[test]
    fn test_multibyte_text() {
        let text = "یہ ایک طویل جملہ ہے جو کئی الفاظ پر مشتمل ہے اور اسے کاٹنا ضروری ہے";
        let s = snippet(text, 20);
        assert!(s.ends_with(TRUNCATION_MARKER));
        assert!(s.chars().count() <= 20 + TRUNCATION_MARKER.len());
    }

    #[test]
    fn test_at_most_five_by_score() {
        let builder = CitationBuilder::new(9, 150);
        assert_eq!(builder.max_citations(), MAX_CITATIONS);

        let hits: Vec<_> = (0..8).map(|i| hit(i, i as f32 / 10.0, "text")).collect();
        let citations = builder.build(&hits);
        assert_eq!(citations.len(), 5);
        assert_eq!(citations[0].score, 0.7);
        assert_eq!(citations[0].heading_path, "Nodes > Lifecycle");
    }

    #[test]
    fn test_no_chunks_no_citations() {
        assert!(CitationBuilder::default().build(&[]).is_empty());
    }
}
