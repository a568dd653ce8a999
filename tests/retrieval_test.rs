//! Retrieval scenarios against an in-memory store.

use async_trait::async_trait;
use bookrag::citation::CitationBuilder;
use bookrag::documents::TranslationSource;
use bookrag::embedding::{EmbeddingProvider, HashingEmbedder};
use bookrag::retrieval::{
    FallbackNotice, QueryRequest, RetrievalEngine, RetrievalError, RetrievalMode,
    RetrievalQuery, build_context, respond,
};
use bookrag::retry::RetryPolicy;
use bookrag::store::{
    ChunkPayload, ContentType, EmbeddingRecord, MemoryStore, ScoredChunk, SearchFilter,
    StoreError, StoreResult, VectorStore,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const TOPICS: [&str; 10] = [
    "Nodes are the basic unit of computation in a robot graph.",
    "Topics carry streams of messages between publishers and subscribers.",
    "Services provide request and response interactions between nodes.",
    "Actions model long running goals with feedback and cancellation.",
    "Parameters configure node behaviour at startup and at runtime.",
    "Launch files start many nodes together with shared configuration.",
    "Quality of service settings control reliability and history depth.",
    "The transform tree tracks coordinate frames over time.",
    "Simulation lets you test controllers before touching hardware.",
    "Bags record topic data for later playback and analysis.",
];

fn payload(path: &str, index: usize, language: &str, text: &str) -> ChunkPayload {
    ChunkPayload {
        document_path: path.to_string(),
        chunk_index: index,
        heading_path: format!("Chapter > Section {index}"),
        text: text.to_string(),
        token_count: text.split_whitespace().count(),
        language: language.to_string(),
        original_language: "en".to_string(),
        translation_source: if language == "en" {
            TranslationSource::Original
        } else {
            TranslationSource::Human
        },
        translation_quality: None,
        content_type: ContentType::Docs,
        module: "module-1".to_string(),
        title: "Chapter".to_string(),
        url_path: path.trim_end_matches(".md").to_string(),
        content_hash: String::new(),
    }
}

async fn store_with(
    embedder: &HashingEmbedder,
    chunks: impl IntoIterator<Item = (String, usize, &'static str, String)>,
) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let records = chunks
        .into_iter()
        .map(|(path, index, lang, text)| {
            EmbeddingRecord::new(embedder.embed_text(&text), payload(&path, index, lang, &text))
        })
        .collect();
    store.upsert(records).await.unwrap();
    store
}

/// Ten English chunks in one document.
async fn english_book(embedder: &HashingEmbedder) -> Arc<MemoryStore> {
    store_with(
        embedder,
        TOPICS
            .iter()
            .enumerate()
            .map(|(i, t)| ("module-1/basics.md".to_string(), i, "en", t.to_string())),
    )
    .await
}

fn engine(embedder: Arc<HashingEmbedder>, store: Arc<dyn VectorStore>) -> RetrievalEngine {
    RetrievalEngine::new(embedder, store).with_retry(RetryPolicy::no_retry())
}

#[tokio::test]
async fn test_urdu_query_falls_back_to_english() {
    let embedder = Arc::new(HashingEmbedder::new(128));
    let store = english_book(&embedder).await;
    let engine = engine(embedder, store);

    let query = RetrievalQuery::whole_book("how do topics work?").with_language("ur");
    let outcome = engine.retrieve(&query).await.unwrap();

    assert!(outcome.fallback_applied);
    assert!(!outcome.selection_fallback_applied);
    assert_eq!(outcome.chunks.len(), 10);
    assert!(outcome.chunks.iter().all(|c| c.chunk.language == "en"));
    assert!(matches!(
        outcome.notices[0],
        FallbackNotice::LanguageFilled {
            requested_hits: 0,
            ..
        }
    ));
}

#[tokio::test]
async fn test_whole_book_returns_weak_matches_too() {
    let embedder = Arc::new(HashingEmbedder::new(128));
    let store = english_book(&embedder).await;
    let engine = engine(embedder, store);

    // Nothing in the book is about cooking; results still come back.
    let outcome = engine
        .retrieve(&RetrievalQuery::whole_book("best pasta recipe"))
        .await
        .unwrap();
    assert_eq!(outcome.chunks.len(), 10);
    assert!(!outcome.fallback_applied);

    let scores: Vec<f32> = outcome.chunks.iter().map(|c| c.score).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn test_selection_window_around_anchor() {
    let embedder = Arc::new(HashingEmbedder::new(128));
    let store = english_book(&embedder).await;
    let engine = engine(embedder, store);

    let query = RetrievalQuery::selection(
        "explain this",
        "Launch files start many nodes together",
        "module-1/basics.md",
    );
    let outcome = engine.retrieve(&query).await.unwrap();

    let indices: Vec<usize> = outcome.chunks.iter().map(|c| c.chunk.chunk_index).collect();
    assert_eq!(indices, vec![3, 4, 5, 6, 7]);
    assert!(!outcome.selection_fallback_applied);
    assert!(!outcome.fallback_applied);

    let anchor = outcome.anchor.unwrap();
    assert_eq!(anchor.chunk_index, 5);
    assert!(anchor.exact_match);
}

#[tokio::test]
async fn test_selection_tolerates_markup_and_spacing() {
    let embedder = Arc::new(HashingEmbedder::new(128));
    let store = store_with(
        &embedder,
        [
            ("a.md".to_string(), 0, "en", "Intro.".to_string()),
            (
                "a.md".to_string(),
                1,
                "en",
                "A **topic** is a named\nbus for `messages`.".to_string(),
            ),
        ],
    )
    .await;
    let engine = engine(embedder, store);

    let query = RetrievalQuery::selection("?", "a topic is a named bus", "a.md");
    let outcome = engine.retrieve(&query).await.unwrap();
    assert_eq!(outcome.anchor.unwrap().chunk_index, 1);
}

#[tokio::test]
async fn test_unknown_anchor_document_falls_back_to_whole_book() {
    let embedder = Arc::new(HashingEmbedder::new(128));
    let store = english_book(&embedder).await;
    let engine = engine(embedder, store);

    let query = RetrievalQuery::selection(
        "how do services work?",
        "Services provide request and response",
        "module-9/missing.md",
    );
    let outcome = engine.retrieve(&query).await.unwrap();

    assert!(outcome.selection_fallback_applied);
    assert_eq!(outcome.mode, RetrievalMode::WholeBook);
    assert_eq!(outcome.chunks.len(), 10);
    assert!(outcome.anchor.is_none());

    // Context for the effective mode: no selected-text header
    let context = build_context(&outcome, query.selection_text.as_deref());
    assert!(context.starts_with("[Source 1]"));
    assert!(matches!(
        &outcome.notices[0],
        FallbackNotice::AnchorNotFound { document_path: Some(p), .. } if p == "module-9/missing.md"
    ));
}

#[tokio::test]
async fn test_mixed_language_results_put_requested_first() {
    let embedder = Arc::new(HashingEmbedder::new(128));
    let mut chunks: Vec<_> = TOPICS
        .iter()
        .enumerate()
        .map(|(i, t)| ("module-1/basics.md".to_string(), i, "en", t.to_string()))
        .collect();
    chunks.push((
        "i18n/ur/module-1/basics.md".to_string(),
        0,
        "ur",
        "ٹاپکس پیغامات لے جاتے ہیں۔".to_string(),
    ));
    let store = store_with(&embedder, chunks).await;
    let engine = engine(embedder, store);

    let outcome = engine
        .retrieve(&RetrievalQuery::whole_book("topics").with_language("ur"))
        .await
        .unwrap();

    assert!(outcome.fallback_applied);
    assert_eq!(outcome.chunks.len(), 10);
    assert_eq!(outcome.chunks[0].chunk.language, "ur");
    let ids: std::collections::HashSet<_> = outcome
        .chunks
        .iter()
        .map(|c| (c.chunk.document_path.clone(), c.chunk.chunk_index))
        .collect();
    assert_eq!(ids.len(), 10);
}

/// Every call fails or stalls.
struct BrokenStore {
    stall: bool,
}

#[async_trait]
impl VectorStore for BrokenStore {
    fn name(&self) -> &str {
        "broken"
    }

    async fn ensure_collection(&self, _dimension: usize) -> StoreResult<()> {
        Ok(())
    }

    async fn upsert(&self, _records: Vec<EmbeddingRecord>) -> StoreResult<usize> {
        Err(StoreError::Connection("connection refused".into()))
    }

    async fn search(
        &self,
        _vector: &[f32],
        _filter: &SearchFilter,
        _limit: usize,
    ) -> StoreResult<Vec<ScoredChunk>> {
        if self.stall {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Err(StoreError::Connection("connection refused".into()))
    }

    async fn prune_document(&self, _document_path: &str, _keep: usize) -> StoreResult<()> {
        Err(StoreError::Connection("connection refused".into()))
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(0)
    }
}

#[tokio::test]
async fn test_store_outage_is_an_error_not_empty_results() {
    let engine = engine(
        Arc::new(HashingEmbedder::new(32)),
        Arc::new(BrokenStore { stall: false }),
    );

    let err = engine
        .retrieve(&RetrievalQuery::whole_book("what is a node?").with_language("ur"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RetrievalError::Store(StoreError::Connection(_))
    ));

    // Selection mode reports the outage too instead of falling back
    let err = engine
        .retrieve(&RetrievalQuery::selection("q", "a node", "a.md"))
        .await
        .unwrap_err();
    assert!(matches!(err, RetrievalError::Store(_)));
}

#[tokio::test(start_paused = true)]
async fn test_stalled_store_times_out() {
    let engine = engine(
        Arc::new(HashingEmbedder::new(32)),
        Arc::new(BrokenStore { stall: true }),
    )
    .with_timeouts(Duration::from_secs(5), Duration::from_secs(2));

    let err = engine
        .retrieve(&RetrievalQuery::whole_book("what is a node?"))
        .await
        .unwrap_err();
    assert!(matches!(err, RetrievalError::Timeout(d) if d == Duration::from_secs(2)));
}

#[tokio::test]
async fn test_cancelled_query() {
    let engine = engine(
        Arc::new(HashingEmbedder::new(32)),
        Arc::new(BrokenStore { stall: true }),
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = engine
        .retrieve_with_cancel(&RetrievalQuery::whole_book("what is a node?"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, RetrievalError::Cancelled));
}

#[tokio::test]
async fn test_wire_request_to_response_with_citations() {
    let embedder = Arc::new(HashingEmbedder::new(128));
    let store = english_book(&embedder).await;
    let engine = engine(embedder.clone(), store);
    assert_eq!(embedder.dimension(), 128);

    let request: QueryRequest = serde_json::from_value(serde_json::json!({
        "mode": "whole-book",
        "queryText": "what are actions?",
        "requestedLanguage": "en"
    }))
    .unwrap();

    let response = respond(
        &engine,
        &CitationBuilder::default(),
        request,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(response.chunks.len(), 10);
    assert!(!response.fallback_applied);
    assert_eq!(response.citations.len(), 5);
    assert!(
        response
            .citations
            .iter()
            .all(|c| c.heading_path.starts_with("Chapter > Section"))
    );

    let json = serde_json::to_value(&response).unwrap();
    assert!(json["chunks"][0]["documentPath"].is_string());
    assert!(json["citations"][0]["snippet"].is_string());
}
