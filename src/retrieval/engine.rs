//! Query execution.
//!
//! Whole-book queries run a language-filtered similarity search and fill from
//! the default language when the requested one is thin. Selection queries
//! locate an anchor chunk inside one document and return the chunks around it;
//! anything that prevents anchoring degrades to a whole-book query.

use indexmap::IndexMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::error::RetrievalError;
use super::language::LanguagePolicy;
use super::query::{
    Anchor, FallbackNotice, RetrievalMode, RetrievalOutcome, RetrievalQuery, RetrievedChunk,
};
use crate::config::{RetrievalConfig, Settings};
use crate::documents::normalize_language;
use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::retry::RetryPolicy;
use crate::store::{ScoredChunk, SearchFilter, StoreError, VectorStore};

enum AnchorLookup {
    Found {
        index: usize,
        score: f32,
        exact: bool,
        vector: Vec<f32>,
    },
    Missing(String),
}

pub struct RetrievalEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    config: RetrievalConfig,
    languages: LanguagePolicy,
    retry: RetryPolicy,
    embed_timeout: Duration,
    store_timeout: Duration,
}

impl RetrievalEngine {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            config: RetrievalConfig::default(),
            languages: LanguagePolicy::default(),
            retry: RetryPolicy::default(),
            embed_timeout: Duration::from_secs(30),
            store_timeout: Duration::from_secs(10),
        }
    }

    pub fn from_settings(
        settings: &Settings,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self::new(embedder, store)
            .with_config(settings.retrieval.clone())
            .with_language_policy(LanguagePolicy::from_config(&settings.language))
            .with_retry(RetryPolicy::from_config(&settings.retry))
            .with_timeouts(settings.embedding.timeout(), settings.vector_store.timeout())
    }

    pub fn with_config(mut self, config: RetrievalConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_language_policy(mut self, languages: LanguagePolicy) -> Self {
        self.languages = languages;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeouts(mut self, embed: Duration, store: Duration) -> Self {
        self.embed_timeout = embed;
        self.store_timeout = store;
        self
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn languages(&self) -> &LanguagePolicy {
        &self.languages
    }

    pub async fn retrieve(&self, query: &RetrievalQuery) -> Result<RetrievalOutcome, RetrievalError> {
        self.retrieve_with_cancel(query, &CancellationToken::new())
            .await
    }

    /// Run a query under the configured overall timeout.
    ///
    /// Cancelling the token drops all in-flight provider and store calls.
    pub async fn retrieve_with_cancel(
        &self,
        query: &RetrievalQuery,
        cancel: &CancellationToken,
    ) -> Result<RetrievalOutcome, RetrievalError> {
        query.validate()?;
        let budget = self.config.timeout();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(target: "retrieval", "query cancelled");
                Err(RetrievalError::Cancelled)
            }
            result = tokio::time::timeout(budget, self.execute(query)) => {
                result.map_err(|_| RetrievalError::Timeout(budget))?
            }
        }
    }

    async fn execute(&self, query: &RetrievalQuery) -> Result<RetrievalOutcome, RetrievalError> {
        let started = Instant::now();
        let language = query
            .requested_language
            .as_deref()
            .map(normalize_language)
            .filter(|code| !code.is_empty());

        let mut outcome = RetrievalOutcome {
            mode: query.mode,
            ..Default::default()
        };

        match query.mode {
            RetrievalMode::WholeBook => {
                let vector = self.embed_query(&query.query_text).await?;
                self.whole_book(&vector, language.as_deref(), &mut outcome)
                    .await?;
            }
            RetrievalMode::Selection => {
                self.selection(query, language.as_deref(), &mut outcome)
                    .await?;
            }
        }

        crate::debug_event!(
            "retrieval",
            "query done",
            "{} mode, {} chunks, fallback={}, selection_fallback={} in {:.1?}",
            query.mode,
            outcome.chunks.len(),
            outcome.fallback_applied,
            outcome.selection_fallback_applied,
            started.elapsed()
        );
        Ok(outcome)
    }

    /// Language-filtered search with default-language fill.
    async fn whole_book(
        &self,
        vector: &[f32],
        language: Option<&str>,
        outcome: &mut RetrievalOutcome,
    ) -> Result<(), RetrievalError> {
        let top_k = self.config.top_k.max(1);
        let default = self.languages.default_language().to_string();

        let Some(requested) = language else {
            let hits = self.search(vector, &SearchFilter::new(), top_k).await?;
            outcome.chunks = hits.into_iter().map(into_retrieved).collect();
            return Ok(());
        };

        if !self.languages.is_supported(requested) {
            tracing::info!(
                target: "retrieval",
                "language '{requested}' not supported, using '{default}'"
            );
            let hits = self
                .search(vector, &SearchFilter::new().language(&default), top_k)
                .await?;
            outcome.fallback_applied = true;
            outcome.notices.push(FallbackNotice::LanguageUnsupported {
                requested: requested.to_string(),
                used: default,
            });
            outcome.chunks = hits.into_iter().map(into_retrieved).collect();
            return Ok(());
        }

        let primary = self
            .search(vector, &SearchFilter::new().language(requested), top_k)
            .await?;

        if primary.len() >= self.config.min_language_results || self.languages.is_default(requested)
        {
            outcome.chunks = primary.into_iter().map(into_retrieved).collect();
            return Ok(());
        }

        let requested_hits = primary.len();
        tracing::info!(
            target: "retrieval",
            "{requested_hits} '{requested}' results (< {}), filling from '{default}'",
            self.config.min_language_results
        );

        // Fetch a full page so duplicates cannot shrink the fill.
        let secondary = self
            .search(vector, &SearchFilter::new().language(&default), top_k)
            .await?;

        let mut merged: IndexMap<Uuid, ScoredChunk> = IndexMap::with_capacity(top_k);
        for hit in primary.into_iter().chain(secondary) {
            if merged.len() == top_k {
                break;
            }
            merged.entry(hit.id).or_insert(hit);
        }

        outcome.fallback_applied = true;
        outcome.notices.push(FallbackNotice::LanguageFilled {
            requested: requested.to_string(),
            used: default,
            requested_hits,
        });
        outcome.chunks = merged.into_values().map(into_retrieved).collect();
        Ok(())
    }

    async fn selection(
        &self,
        query: &RetrievalQuery,
        language: Option<&str>,
        outcome: &mut RetrievalOutcome,
    ) -> Result<(), RetrievalError> {
        let document_path = query
            .anchor_document_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());

        let lookup = match document_path {
            Some(path) => self.locate_anchor(path, query.selection_text.as_deref()).await?,
            None => AnchorLookup::Missing("no anchor document given".to_string()),
        };

        let (index, score, exact, vector) = match lookup {
            AnchorLookup::Found {
                index,
                score,
                exact,
                vector,
            } => (index, score, exact, vector),
            AnchorLookup::Missing(reason) => {
                tracing::info!(
                    target: "retrieval",
                    "selection fallback to whole-book: {reason}"
                );
                outcome.mode = RetrievalMode::WholeBook;
                outcome.selection_fallback_applied = true;
                outcome.notices.push(FallbackNotice::AnchorNotFound {
                    document_path: document_path.map(str::to_string),
                    reason,
                });
                let vector = self.embed_query(&query.query_text).await?;
                return self.whole_book(&vector, language, outcome).await;
            }
        };

        // Anchor was found, so the path is present.
        let path = document_path.unwrap_or_default();
        let window = index.saturating_sub(self.config.window_before)..index + self.config.window_after;
        let filter = SearchFilter::new()
            .document(path)
            .chunk_range(window.clone());

        let mut hits = self.search(&vector, &filter, window.len()).await?;
        hits.sort_by_key(|hit| hit.payload.chunk_index);

        let returned = match (hits.first(), hits.last()) {
            (Some(first), Some(last)) => first.payload.chunk_index..last.payload.chunk_index + 1,
            _ => index..index + 1,
        };
        tracing::debug!(
            target: "retrieval",
            "anchor {path}#{index} (score {score:.3}, exact={exact}), window {returned:?}"
        );

        outcome.anchor = Some(Anchor {
            document_path: path.to_string(),
            chunk_index: index,
            score,
            exact_match: exact,
            window: returned,
        });
        outcome.chunks = hits.into_iter().map(into_retrieved).collect();
        Ok(())
    }

    /// Find the chunk a selection came from.
    ///
    /// Candidates are the document's chunks ranked by similarity to the
    /// selection. The first one containing the selection wins; otherwise the
    /// best one, if it clears `anchor_min_score`.
    async fn locate_anchor(
        &self,
        document_path: &str,
        selection: Option<&str>,
    ) -> Result<AnchorLookup, RetrievalError> {
        let Some(selection) = selection.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(AnchorLookup::Missing("selection text is empty".to_string()));
        };

        let vector = self.embed_query(selection).await?;
        let candidates = self
            .search(
                &vector,
                &SearchFilter::new().document(document_path),
                self.config.anchor_candidates.max(1),
            )
            .await?;

        if candidates.is_empty() {
            return Ok(AnchorLookup::Missing(format!(
                "no indexed chunks for '{document_path}'"
            )));
        }

        let needle = normalize_for_match(selection);
        let contained = candidates
            .iter()
            .find(|c| !needle.is_empty() && normalize_for_match(&c.payload.text).contains(&needle));

        let (hit, exact) = match contained {
            Some(hit) => (hit, true),
            None => match candidates.first() {
                Some(best) if best.score >= self.config.anchor_min_score => (best, false),
                Some(best) => {
                    return Ok(AnchorLookup::Missing(format!(
                        "best candidate score {:.3} below {:.3}",
                        best.score, self.config.anchor_min_score
                    )));
                }
                None => return Ok(AnchorLookup::Missing("no candidates".to_string())),
            },
        };

        Ok(AnchorLookup::Found {
            index: hit.payload.chunk_index,
            score: hit.score,
            exact,
            vector,
        })
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let timeout = self.embed_timeout;
        self.retry
            .run("embed query", || async move {
                tokio::time::timeout(timeout, self.embedder.embed(text))
                    .await
                    .map_err(|_| EmbeddingError::Timeout(timeout))?
            })
            .await
            .map_err(|e| match e {
                EmbeddingError::Timeout(d) => RetrievalError::Timeout(d),
                other => RetrievalError::Embedding(other),
            })
    }

    async fn search(
        &self,
        vector: &[f32],
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let timeout = self.store_timeout;
        self.retry
            .run("search", || async move {
                tokio::time::timeout(timeout, self.store.search(vector, filter, limit))
                    .await
                    .map_err(|_| StoreError::Timeout(timeout))?
            })
            .await
            .map_err(|e| match e {
                StoreError::Timeout(d) => RetrievalError::Timeout(d),
                other => RetrievalError::Store(other),
            })
    }
}

fn into_retrieved(hit: ScoredChunk) -> RetrievedChunk {
    RetrievedChunk {
        chunk: hit.payload.to_chunk(),
        score: hit.score,
    }
}

/// Lowercase, drop inline markdown markers, collapse whitespace.
fn normalize_for_match(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|c| !matches!(c, '*' | '_' | '`' | '#'))
        .flat_map(char::to_lowercase)
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::TranslationSource;
    use crate::embedding::HashingEmbedder;
    use crate::store::{ChunkPayload, ContentType, EmbeddingRecord, MemoryStore};

    fn payload(path: &str, index: usize, language: &str, text: &str) -> ChunkPayload {
        ChunkPayload {
            document_path: path.to_string(),
            chunk_index: index,
            heading_path: format!("Part {index}"),
            text: text.to_string(),
            token_count: text.split_whitespace().count(),
            language: language.to_string(),
            original_language: "en".to_string(),
            translation_source: TranslationSource::Original,
            translation_quality: None,
            content_type: ContentType::Docs,
            module: "module-1".to_string(),
            title: path.to_string(),
            url_path: path.trim_end_matches(".md").to_string(),
            content_hash: String::new(),
        }
    }

    async fn seeded(records: &[(&str, usize, &str, String)]) -> (Arc<HashingEmbedder>, Arc<MemoryStore>) {
        let embedder = Arc::new(HashingEmbedder::new(64));
        let store = Arc::new(MemoryStore::new());
        let batch = records
            .iter()
            .map(|(path, index, lang, text)| {
                EmbeddingRecord::new(embedder.embed_text(text), payload(path, *index, lang, text))
            })
            .collect();
        store.upsert(batch).await.unwrap();
        (embedder, store)
    }

    fn engine(embedder: Arc<HashingEmbedder>, store: Arc<MemoryStore>) -> RetrievalEngine {
        RetrievalEngine::new(embedder, store).with_retry(RetryPolicy::no_retry())
    }

    #[test]
    fn test_normalize_for_match() {
        assert_eq!(
            normalize_for_match("The **ROS 2**   graph\n uses `topics`"),
            "the ros 2 graph uses topics"
        );
    }

    #[tokio::test]
    async fn test_window_clipped_at_document_start() {
        let records: Vec<_> = (0..6)
            .map(|i| ("a.md", i, "en", format!("Paragraph {i} covers topic number {i}.")))
            .collect();
        let (embedder, store) = seeded(&records).await;
        let engine = engine(embedder, store);

        let query = RetrievalQuery::selection("explain", "covers topic number 0", "a.md");
        let outcome = engine.retrieve(&query).await.unwrap();

        let indices: Vec<usize> = outcome.chunks.iter().map(|c| c.chunk.chunk_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(!outcome.selection_fallback_applied);
        let anchor = outcome.anchor.unwrap();
        assert!(anchor.exact_match);
        assert_eq!(anchor.window, 0..3);
    }

    #[tokio::test]
    async fn test_window_clipped_at_document_end() {
        let records: Vec<_> = (0..6)
            .map(|i| ("a.md", i, "en", format!("Paragraph {i} covers topic number {i}.")))
            .collect();
        let (embedder, store) = seeded(&records).await;
        let engine = engine(embedder, store);

        let query = RetrievalQuery::selection("explain", "Paragraph 5 covers", "a.md");
        let outcome = engine.retrieve(&query).await.unwrap();

        let indices: Vec<usize> = outcome.chunks.iter().map(|c| c.chunk.chunk_index).collect();
        assert_eq!(indices, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn test_empty_selection_falls_back() {
        let records = vec![("a.md", 0, "en", "Topics carry messages.".to_string())];
        let (embedder, store) = seeded(&records).await;
        let engine = engine(embedder, store);

        let query = RetrievalQuery::selection("what are topics", "   ", "a.md");
        let outcome = engine.retrieve(&query).await.unwrap();

        assert!(outcome.selection_fallback_applied);
        assert_eq!(outcome.mode, RetrievalMode::WholeBook);
        assert_eq!(outcome.chunks.len(), 1);
        assert!(matches!(
            outcome.notices[0],
            FallbackNotice::AnchorNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_unsupported_language_uses_default() {
        let records: Vec<_> = (0..4)
            .map(|i| ("a.md", i, "en", format!("English text {i}.")))
            .collect();
        let (embedder, store) = seeded(&records).await;
        let engine = engine(embedder, store);

        let query = RetrievalQuery::whole_book("text").with_language("fr");
        let outcome = engine.retrieve(&query).await.unwrap();

        assert!(outcome.fallback_applied);
        assert_eq!(outcome.chunks.len(), 4);
        assert_eq!(
            outcome.notices,
            vec![FallbackNotice::LanguageUnsupported {
                requested: "fr".into(),
                used: "en".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_enough_requested_language_results_no_fallback() {
        let mut records: Vec<_> = (0..3)
            .map(|i| ("ur/a.md", i, "ur", format!("Urdu text {i}.")))
            .collect();
        records.extend((0..5).map(|i| ("a.md", i, "en", format!("English text {i}."))));
        let (embedder, store) = seeded(&records).await;
        let engine = engine(embedder, store);

        let query = RetrievalQuery::whole_book("text").with_language("ur");
        let outcome = engine.retrieve(&query).await.unwrap();

        assert!(!outcome.fallback_applied);
        assert_eq!(outcome.chunks.len(), 3);
        assert!(outcome.chunks.iter().all(|c| c.chunk.language == "ur"));
    }

    #[tokio::test]
    async fn test_sparse_language_is_filled_requested_first() {
        let mut records = vec![("ur/a.md", 0, "ur", "Urdu text zero.".to_string())];
        records.extend((0..12).map(|i| ("a.md", i, "en", format!("English text {i}."))));
        let (embedder, store) = seeded(&records).await;
        let engine = engine(embedder, store);

        let query = RetrievalQuery::whole_book("text").with_language("ur-PK");
        let outcome = engine.retrieve(&query).await.unwrap();

        assert!(outcome.fallback_applied);
        assert_eq!(outcome.chunks.len(), 10);
        assert_eq!(outcome.chunks[0].chunk.language, "ur");
        assert!(outcome.chunks[1..].iter().all(|c| c.chunk.language == "en"));
    }

    #[tokio::test]
    async fn test_invalid_query_rejected() {
        let (embedder, store) = seeded(&[]).await;
        let engine = engine(embedder, store);
        let err = engine
            .retrieve(&RetrievalQuery::whole_book(""))
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidQuery(_)));
    }
}
