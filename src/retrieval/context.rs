//! Prompt context assembly for the answer generator.

use super::query::{RetrievalMode, RetrievalOutcome, RetrievedChunk};

/// Numbered source blocks separated by blank lines.
pub fn format_sources(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "[Source {}]\nDocument: {}\nSection: {}\nContent: {}\n---",
                i + 1,
                hit.chunk.document_path,
                hit.chunk.heading_path,
                hit.chunk.text.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Context for one answer. Selection queries lead with the reader's selection.
pub fn build_context(outcome: &RetrievalOutcome, selection_text: Option<&str>) -> String {
    let sources = format_sources(&outcome.chunks);
    let selection = selection_text.map(str::trim).filter(|s| !s.is_empty());

    match (outcome.mode, selection) {
        (RetrievalMode::Selection, Some(selection)) => {
            format!("SELECTED TEXT:\n\n{selection}\n\nRELEVANT SECTIONS:\n\n{sources}")
        }
        _ => sources,
    }
}
