pub mod citation;
pub mod cli;
pub mod config;
pub mod documents;
pub mod embedding;
pub mod indexing;
pub mod logging;
pub mod retrieval;
pub mod retry;
pub mod store;

pub use citation::{Citation, CitationBuilder};
pub use config::Settings;
pub use documents::{Chunk, ContentLoader, Document, HeadingChunker};
pub use embedding::{EmbeddingError, EmbeddingProvider};
pub use indexing::{EmbeddingIndexer, IndexSummary, index_corpus};
pub use retrieval::{RetrievalEngine, RetrievalError, RetrievalOutcome, RetrievalQuery};
pub use store::{StoreError, VectorStore};
