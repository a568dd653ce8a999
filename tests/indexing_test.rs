//! End-to-end indexing over a scratch corpus.

use async_trait::async_trait;
use bookrag::documents::{ChunkingConfig, ContentLoader, CorpusConfig, HeadingChunker};
use bookrag::embedding::{EmbeddingError, EmbeddingProvider, EmbeddingResult, HashingEmbedder};
use bookrag::indexing::{EmbeddingIndexer, IndexOptions, index_corpus};
use bookrag::retrieval::{RetrievalEngine, RetrievalQuery};
use bookrag::retry::RetryPolicy;
use bookrag::store::{MemoryStore, VectorStore, record_id};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn corpus() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(
        root,
        "docs/module-1/nodes.md",
        "---\ntitle: Nodes\n---\n\nA node is a process.\n\n## Lifecycle\n\nNodes start.\n\n## Parameters\n\nNodes read parameters.\n",
    );
    write(
        root,
        "docs/module-1/topics.mdx",
        "# Topics\n\nTopics carry messages between nodes.\n\n## QoS\n\nReliability settings.\n",
    );
    write(
        root,
        "docs/i18n/ur/module-1/nodes.md",
        "---\ntitle: نوڈز\noriginal_language: en\n---\n\nنوڈ ایک پروسیس ہے۔\n",
    );
    write(root, "docs/node_modules/pkg/readme.md", "# Ignored\n\nVendored.\n");
    write(root, "docs/notes.txt", "not markdown");
    dir
}

fn loader(dir: &TempDir) -> ContentLoader {
    ContentLoader::with_root(dir.path().join("docs"), &CorpusConfig::default()).unwrap()
}

fn indexer(embedder: Arc<dyn EmbeddingProvider>, store: Arc<MemoryStore>) -> EmbeddingIndexer {
    EmbeddingIndexer::new(embedder, store)
        .with_chunker(Arc::new(HeadingChunker::new(ChunkingConfig::default())))
        .with_retry(RetryPolicy::no_retry())
}

#[tokio::test]
async fn test_reindex_keeps_record_keys() {
    let dir = corpus();
    let snapshot = dir.path().join(".bookrag/vectors.json");
    let store = Arc::new(MemoryStore::open(&snapshot).unwrap());
    let indexer = indexer(Arc::new(HashingEmbedder::new(64)), store.clone());
    let cancel = CancellationToken::new();

    let first = index_corpus(loader(&dir), &indexer, &IndexOptions::default(), &cancel)
        .await
        .unwrap();
    assert_eq!(first.documents_processed, 3);
    assert_eq!(first.chunks_processed, 6);
    assert_eq!(first.chunks_upserted, 6);
    assert_eq!(first.store_count, Some(6));
    assert!(snapshot.exists());

    let mut keys_before = store.ids();
    keys_before.sort();

    let second = index_corpus(loader(&dir), &indexer, &IndexOptions::default(), &cancel)
        .await
        .unwrap();
    assert_eq!(second.store_count, Some(6));

    let mut keys_after = store.ids();
    keys_after.sort();
    assert_eq!(keys_before, keys_after);
    assert!(keys_after.contains(&record_id("module-1/nodes.md", 0)));
    assert!(keys_after.contains(&record_id("i18n/ur/module-1/nodes.md", 0)));

    // Snapshot reloads to the same records
    let reopened = MemoryStore::open(&snapshot).unwrap();
    assert_eq!(reopened.count().await.unwrap(), 6);
}

#[tokio::test]
async fn test_payload_carries_language_and_module() {
    let dir = corpus();
    let store = Arc::new(MemoryStore::new());
    let indexer = indexer(Arc::new(HashingEmbedder::new(32)), store.clone());

    index_corpus(
        loader(&dir),
        &indexer,
        &IndexOptions::default(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let urdu = store
        .get(&record_id("i18n/ur/module-1/nodes.md", 0))
        .unwrap();
    assert_eq!(urdu.payload.language, "ur");
    assert_eq!(urdu.payload.original_language, "en");
    assert_eq!(urdu.payload.module, "module-1");
    assert_eq!(urdu.payload.url_path, "module-1/nodes");

    let lifecycle = store.get(&record_id("module-1/nodes.md", 1)).unwrap();
    assert_eq!(lifecycle.payload.heading_path, "Lifecycle");
    assert_eq!(lifecycle.payload.language, "en");
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let dir = corpus();
    let store = Arc::new(MemoryStore::new());
    let indexer = indexer(Arc::new(HashingEmbedder::new(32)), store.clone());

    let options = IndexOptions {
        dry_run: true,
        limit: Some(2),
    };
    let summary = index_corpus(loader(&dir), &indexer, &options, &CancellationToken::new())
        .await
        .unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.documents_processed, 2);
    assert!(summary.chunks_processed > 0);
    assert_eq!(summary.store_count, None);
    assert_eq!(store.count().await.unwrap(), 0);
}

/// Rate-limits the first `failures` calls, then succeeds.
struct Flaky {
    inner: HashingEmbedder,
    failures: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for Flaky {
    fn model_name(&self) -> &str {
        "flaky"
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(EmbeddingError::RateLimited {
                status: 429,
                retry_after: Some(Duration::from_secs(1)),
            });
        }
        self.inner.embed_batch(texts).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_rate_limits_are_retried() {
    let dir = corpus();
    let store = Arc::new(MemoryStore::new());
    let embedder = Arc::new(Flaky {
        inner: HashingEmbedder::new(32),
        failures: 2,
        calls: AtomicUsize::new(0),
    });
    let indexer = indexer(embedder.clone(), store.clone())
        .with_concurrency(1)
        .with_retry(RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(4),
            multiplier: 2.0,
        });

    let summary = index_corpus(
        loader(&dir),
        &indexer,
        &IndexOptions::default(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(summary.chunks_failed, 0);
    assert_eq!(summary.chunks_upserted, 6);
    // Three documents, one batch each, plus two rate-limited attempts
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_exhausted_retries_fail_only_that_batch() {
    let dir = corpus();
    let store = Arc::new(MemoryStore::new());
    let embedder = Arc::new(Flaky {
        inner: HashingEmbedder::new(32),
        failures: 1,
        calls: AtomicUsize::new(0),
    });
    let indexer = indexer(embedder, store.clone()).with_concurrency(1);

    let summary = index_corpus(
        loader(&dir),
        &indexer,
        &IndexOptions::default(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(summary.documents_failed, 1);
    assert_eq!(summary.failures.len(), 1);
    assert!(summary.chunks_upserted > 0);
    assert!(!summary.all_failed());
    assert_eq!(
        store.count().await.unwrap(),
        summary.chunks_upserted
    );
}

#[tokio::test]
async fn test_regional_language_tag_matches_plain_query() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "docs/module-1/topics.md",
        "---\nlanguage: ur-PK\n---\n\nٹاپکس پیغامات لے جاتے ہیں۔\n",
    );
    write(
        dir.path(),
        "docs/module-1/nodes.md",
        "A node is a process.\n",
    );

    let embedder = Arc::new(HashingEmbedder::new(64));
    let store = Arc::new(MemoryStore::new());
    index_corpus(
        loader(&dir),
        &indexer(embedder.clone(), store.clone()),
        &IndexOptions::default(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let stored = store.get(&record_id("module-1/topics.md", 0)).unwrap();
    assert_eq!(stored.payload.language, "ur");

    let engine = RetrievalEngine::new(embedder, store).with_retry(RetryPolicy::no_retry());
    let outcome = engine
        .retrieve(&RetrievalQuery::whole_book("topics").with_language("ur"))
        .await
        .unwrap();
    assert_eq!(outcome.chunks[0].chunk.language, "ur");
    assert_eq!(outcome.chunks.len(), 2);
}
