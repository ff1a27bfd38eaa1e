//! Document-repository search pipeline: classification, duplicate-version
//! resolution, structure-aware chunking, batch indexing, and hybrid
//! keyword/semantic retrieval with reranking. External systems (vector
//! store, document source, embeddings) sit behind async ports in
//! [`traits`].

pub mod chunker;
pub mod classifier;
pub mod embeddings;
pub mod error;
pub mod extract;
pub mod jobs;
pub mod models;
pub mod orchestrator;
pub mod prioritizer;
pub mod reranker;
pub mod retriever;
pub mod sources;
pub mod stores;
pub mod traits;

#[cfg(test)]
pub(crate) mod testutil;

pub use chunker::{Chunker, RegexStructureDetector, SectionSpan, StructureDetector};
pub use classifier::{classify, detect_query_language};
pub use embeddings::{HashingEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{IndexError, SearchError};
pub use extract::{
    correct_content_type, is_supported_content_type, DefaultExtractor, TextExtractor,
};
pub use jobs::{InMemoryJobStore, JobStore};
pub use models::{
    unit_id, Chunk, ChunkKind, Classification, IndexedUnit, IndexingJob, IndexingOptions,
    JobStatus, Language, PathCategory, RankedResult, ScoredUnit, SearchFilters, SearchType,
    SourceDocument, VersionInfo,
};
pub use orchestrator::Orchestrator;
pub use prioritizer::{normalize_base_name, prioritize};
pub use reranker::rerank;
pub use retriever::{analyze_query, HybridRetriever};
pub use sources::FsDocumentSource;
pub use stores::{InMemoryVectorStore, QdrantVectorStore};
pub use traits::{
    CollectionStats, DocumentSource, EmbeddingProvider, HealthStatus, SearchOptions, Site,
    VectorStore,
};
