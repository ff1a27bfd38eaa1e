//! Ports consumed by the pipeline: vector store, document source, and
//! embedding provider. Implementations must be `Send + Sync`.

use async_trait::async_trait;

use crate::error::{IndexError, SearchError};
use crate::models::{IndexedUnit, ScoredUnit, SearchFilters, SourceDocument};

/// One site (container) in the remote document repository.
#[derive(Debug, Clone)]
pub struct Site {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Semantic search when set; pure metadata-filtered scan when empty.
    pub query: Option<String>,
    pub k: usize,
    pub filters: SearchFilters,
}

#[derive(Debug, Clone)]
pub struct CollectionStats {
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub details: String,
}

/// Vector database capability. Writes are keyed by deterministic unit ids,
/// so re-indexing the same document is an idempotent upsert; transient
/// failures are retried with exponential backoff before surfacing.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Ensure the backing collection exists with the configured
    /// dimensionality.
    async fn initialize(&self) -> Result<(), SearchError>;

    /// Embed and upsert `units`, sub-batching by item count and character
    /// budget, truncating oversized inputs, skipping empty ones.
    async fn add_documents(&self, units: &[IndexedUnit]) -> Result<(), SearchError>;

    async fn search(&self, options: &SearchOptions) -> Result<Vec<ScoredUnit>, SearchError>;

    /// Wider candidate pool with a low score threshold; feeds the
    /// keyword-search path.
    async fn search_broad(&self, query: &str, limit: usize)
        -> Result<Vec<ScoredUnit>, SearchError>;

    async fn delete_documents(&self, ids: &[String]) -> Result<(), SearchError>;

    async fn update_document(
        &self,
        id: &str,
        content: &str,
        unit: &IndexedUnit,
    ) -> Result<(), SearchError>;

    async fn collection_stats(&self) -> Result<CollectionStats, SearchError>;

    async fn clear_collection(&self) -> Result<(), SearchError>;

    async fn health_check(&self) -> HealthStatus;
}

/// Remote document repository.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn list_sites(&self) -> Result<Vec<Site>, IndexError>;

    async fn get_site(&self, site_id: &str) -> Result<Site, IndexError>;

    async fn list_documents(
        &self,
        site_id: &str,
        folder_path: &str,
        recursive: bool,
    ) -> Result<Vec<SourceDocument>, IndexError>;

    async fn download_document(
        &self,
        drive_id: &str,
        document_id: &str,
    ) -> Result<Vec<u8>, IndexError>;
}

/// Embedding provider, bounded by a maximum input and request budget.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError>;

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError>;
}
