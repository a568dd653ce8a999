//! JSON request and response shapes for the query boundary.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::engine::RetrievalEngine;
use super::error::RetrievalError;
use super::query::{RetrievalMode, RetrievalOutcome, RetrievalQuery};
use crate::citation::{Citation, CitationBuilder};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    #[serde(default)]
    pub mode: RetrievalMode,
    #[serde(alias = "question")]
    pub query_text: String,
    #[serde(default, alias = "selectedText", skip_serializing_if = "Option::is_none")]
    pub selection_text: Option<String>,
    #[serde(default, alias = "docPath", skip_serializing_if = "Option::is_none")]
    pub anchor_document_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_language: Option<String>,
}

impl From<QueryRequest> for RetrievalQuery {
    fn from(req: QueryRequest) -> Self {
        RetrievalQuery {
            mode: req.mode,
            query_text: req.query_text,
            selection_text: req.selection_text,
            anchor_document_path: req.anchor_document_path,
            requested_language: req.requested_language,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseChunk {
    pub document_path: String,
    pub heading_path: String,
    pub text: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub chunks: Vec<ResponseChunk>,
    pub fallback_applied: bool,
    pub selection_fallback_applied: bool,
    pub citations: Vec<Citation>,
}

impl QueryResponse {
    pub fn new(outcome: &RetrievalOutcome, citations: Vec<Citation>) -> Self {
        Self {
            chunks: outcome
                .chunks
                .iter()
                .map(|hit| ResponseChunk {
                    document_path: hit.chunk.document_path.clone(),
                    heading_path: hit.chunk.heading_path.clone(),
                    text: hit.chunk.text.clone(),
                    score: hit.score,
                })
                .collect(),
            fallback_applied: outcome.fallback_applied,
            selection_fallback_applied: outcome.selection_fallback_applied,
            citations,
        }
    }
}

/// Answer one wire request: retrieve, then cite.
pub async fn respond(
    engine: &RetrievalEngine,
    citations: &CitationBuilder,
    request: QueryRequest,
    cancel: &CancellationToken,
) -> Result<QueryResponse, RetrievalError> {
    let query = RetrievalQuery::from(request);
    let outcome = engine.retrieve_with_cancel(&query, cancel).await?;
    Ok(QueryResponse::new(&outcome, citations.build(&outcome.chunks)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_accepts_wire_names() {
        let req: QueryRequest = serde_json::from_value(json!({
            "mode": "selection",
            "queryText": "explain this",
            "selectionText": "publish a message",
            "anchorDocumentPath": "module-1/topics.md",
            "requestedLanguage": "ur"
        }))
        .unwrap();
        let query = RetrievalQuery::from(req);
        assert_eq!(query.mode, RetrievalMode::Selection);
        assert_eq!(query.anchor_document_path.as_deref(), Some("module-1/topics.md"));
        assert_eq!(query.requested_language.as_deref(), Some("ur"));
    }

    #[test]
    fn test_request_defaults_to_whole_book() {
        let req: QueryRequest =
            serde_json::from_value(json!({ "question": "what is a node?" })).unwrap();
        assert_eq!(req.mode, RetrievalMode::WholeBook);
        assert_eq!(req.query_text, "what is a node?");
        assert!(req.selection_text.is_none());
    }

    #[test]
    fn test_response_field_names() {
        let response = QueryResponse::new(&RetrievalOutcome::default(), Vec::new());
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["fallbackApplied"], false);
        assert_eq!(value["selectionFallbackApplied"], false);
        assert!(value["chunks"].as_array().unwrap().is_empty());
        assert!(value["citations"].as_array().unwrap().is_empty());
    }
}
