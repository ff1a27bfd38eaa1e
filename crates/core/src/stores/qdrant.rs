//! HTTP Qdrant implementation of the [`VectorStore`] port.
//!
//! Writes are upserts keyed by the deterministic unit id. Transient
//! failures (connection errors, 429, 5xx) are retried with exponential
//! backoff up to a fixed attempt cap before surfacing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use crate::error::SearchError;
use crate::models::{IndexedUnit, ScoredUnit, SearchFilters};
use crate::traits::{
    CollectionStats, EmbeddingProvider, HealthStatus, SearchOptions, VectorStore,
};

/// Maximum units embedded and upserted per request.
const MAX_BATCH_ITEMS: usize = 64;
/// Character budget per upsert request, a proxy for the embedding
/// provider's token budget.
const MAX_BATCH_CHARS: usize = 60_000;
/// Oversized chunk content is truncated to this many characters before
/// embedding.
const MAX_UNIT_CHARS: usize = 8_000;
/// Low score floor for the broad candidate pool.
const BROAD_SCORE_THRESHOLD: f64 = 0.05;

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_MS: u64 = 250;

pub struct QdrantVectorStore {
    base: Url,
    collection: String,
    client: Client,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl QdrantVectorStore {
    pub fn new(
        endpoint: &str,
        collection: impl Into<String>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, SearchError> {
        Ok(Self {
            base: Url::parse(endpoint)?,
            collection: collection.into(),
            client: Client::new(),
            embedder,
        })
    }

    fn collection_url(&self, suffix: &str) -> Result<Url, SearchError> {
        Ok(self
            .base
            .join(&format!("collections/{}{suffix}", self.collection))?)
    }

    async fn request(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<Value, SearchError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;

            let mut builder = self.client.request(method.clone(), url.clone());
            if let Some(body) = body {
                builder = builder.json(body);
            }

            match builder.send().await {
                Ok(response) if response.status().is_success() => {
                    return Ok(response.json().await?);
                }
                Ok(response)
                    if response.status().is_server_error()
                        || response.status().as_u16() == 429 =>
                {
                    if attempt >= RETRY_ATTEMPTS {
                        return Err(SearchError::BackendResponse {
                            backend: "qdrant".to_string(),
                            details: response.status().to_string(),
                        });
                    }
                    warn!(status = %response.status(), attempt, "retrying qdrant request");
                }
                Ok(response) => {
                    return Err(SearchError::BackendResponse {
                        backend: "qdrant".to_string(),
                        details: response.status().to_string(),
                    });
                }
                Err(error) => {
                    if attempt >= RETRY_ATTEMPTS {
                        return Err(error.into());
                    }
                    warn!(error = %error, attempt, "retrying qdrant request");
                }
            }

            let backoff = RETRY_BASE_MS * 2u64.pow(attempt - 1);
            tokio::time::sleep(Duration::from_millis(backoff)).await;
        }
    }

    /// Embedding failures are transient like HTTP ones and get the same
    /// bounded backoff before surfacing.
    async fn embed_with_retry(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.embedder.embed(text).await {
                Ok(vector) => return Ok(vector),
                Err(error) if attempt >= RETRY_ATTEMPTS => {
                    return Err(SearchError::Request(error.to_string()));
                }
                Err(error) => warn!(error = %error, attempt, "retrying embedding request"),
            }
            let backoff = RETRY_BASE_MS * 2u64.pow(attempt - 1);
            tokio::time::sleep(Duration::from_millis(backoff)).await;
        }
    }

    async fn embed_many_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.embedder.embed_many(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(error) if attempt >= RETRY_ATTEMPTS => {
                    return Err(SearchError::Request(error.to_string()));
                }
                Err(error) => warn!(error = %error, attempt, "retrying embedding request"),
            }
            let backoff = RETRY_BASE_MS * 2u64.pow(attempt - 1);
            tokio::time::sleep(Duration::from_millis(backoff)).await;
        }
    }

    async fn upsert_points(&self, points: Vec<Value>) -> Result<(), SearchError> {
        if points.is_empty() {
            return Ok(());
        }
        let url = self.collection_url("/points?wait=true")?;
        self.request(Method::PUT, url, Some(&json!({ "points": points })))
            .await?;
        Ok(())
    }

    fn parse_hits(parsed: &Value, pointer: &str) -> Vec<ScoredUnit> {
        parsed
            .pointer(pointer)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|hit| {
                let unit: IndexedUnit =
                    serde_json::from_value(hit.pointer("/payload")?.clone()).ok()?;
                let score = hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0);
                Some(ScoredUnit { unit, score })
            })
            .collect()
    }
}

/// Truncate content to the per-unit character cap, on a char boundary.
pub(crate) fn truncate_content(content: &str) -> String {
    content.chars().take(MAX_UNIT_CHARS).collect()
}

/// Split units into sub-batches respecting the item cap and the per-request
/// character budget; empty-after-trim units are dropped.
pub(crate) fn split_batches(units: &[IndexedUnit]) -> Vec<Vec<&IndexedUnit>> {
    let mut batches = Vec::new();
    let mut current: Vec<&IndexedUnit> = Vec::new();
    let mut current_chars = 0usize;

    for unit in units {
        if unit.chunk.content.trim().is_empty() {
            continue;
        }
        let chars = unit.chunk.content.chars().count().min(MAX_UNIT_CHARS);

        if !current.is_empty()
            && (current.len() >= MAX_BATCH_ITEMS || current_chars + chars > MAX_BATCH_CHARS)
        {
            batches.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        current.push(unit);
        current_chars += chars;
    }

    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Build a Qdrant filter from the pipeline's metadata constraints. The
/// authoritative scope admits translations, so it lands in a `should`
/// clause rather than `must`.
pub(crate) fn build_filter(filters: &SearchFilters) -> Option<Value> {
    let mut must = Vec::new();
    let mut should = Vec::new();

    if filters.authoritative_only {
        should.push(json!({ "key": "is_authoritative", "match": { "value": true } }));
        should.push(json!({ "key": "is_translation", "match": { "value": true } }));
    }
    if filters.latest_only {
        must.push(json!({ "key": "is_latest", "match": { "value": true } }));
    }
    if let Some(category) = filters.category {
        must.push(json!({
            "key": "path_category",
            "match": { "value": serde_json::to_value(category).ok()? }
        }));
    }
    if let Some(document_id) = &filters.document_id {
        must.push(json!({ "key": "document_id", "match": { "value": document_id } }));
    }
    if let Some(language) = filters.language {
        must.push(json!({
            "key": "language",
            "match": { "value": serde_json::to_value(language).ok()? }
        }));
    }

    if must.is_empty() && should.is_empty() {
        return None;
    }

    let mut filter = serde_json::Map::new();
    if !must.is_empty() {
        filter.insert("must".into(), Value::Array(must));
    }
    if !should.is_empty() {
        filter.insert("should".into(), Value::Array(should));
    }
    Some(Value::Object(filter))
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn initialize(&self) -> Result<(), SearchError> {
        let url = self.collection_url("")?;
        if self.request(Method::GET, url.clone(), None).await.is_ok() {
            return Ok(());
        }

        debug!(collection = %self.collection, "creating qdrant collection");
        self.request(
            Method::PUT,
            url,
            Some(&json!({
                "vectors": {
                    "size": self.embedder.dimensions(),
                    "distance": "Cosine",
                }
            })),
        )
        .await?;
        Ok(())
    }

    async fn add_documents(&self, units: &[IndexedUnit]) -> Result<(), SearchError> {
        for batch in split_batches(units) {
            let texts: Vec<String> = batch
                .iter()
                .map(|unit| truncate_content(&unit.chunk.content))
                .collect();

            let embeddings = self.embed_many_with_retry(&texts).await?;

            let points: Vec<Value> = batch
                .iter()
                .zip(texts.iter().zip(embeddings.iter()))
                .map(|(unit, (text, embedding))| {
                    let mut stored = (*unit).clone();
                    stored.chunk.content = text.clone();
                    Ok(json!({
                        "id": stored.id,
                        "vector": embedding,
                        "payload": serde_json::to_value(&stored)?,
                    }))
                })
                .collect::<Result<Vec<_>, SearchError>>()?;

            self.upsert_points(points).await?;
        }
        Ok(())
    }

    async fn search(&self, options: &SearchOptions) -> Result<Vec<ScoredUnit>, SearchError> {
        let limit = options.k.min(1_000);
        let filter = build_filter(&options.filters);

        match options.query.as_deref().filter(|q| !q.trim().is_empty()) {
            Some(query) => {
                let vector = self.embed_with_retry(query).await?;

                let mut body = json!({
                    "vector": vector,
                    "limit": limit,
                    "with_payload": true,
                });
                if let Some(filter) = filter {
                    body["filter"] = filter;
                }

                let url = self.collection_url("/points/search")?;
                let parsed = self.request(Method::POST, url, Some(&body)).await?;
                Ok(Self::parse_hits(&parsed, "/result"))
            }
            None => {
                let mut body = json!({
                    "limit": limit,
                    "with_payload": true,
                });
                if let Some(filter) = filter {
                    body["filter"] = filter;
                }

                let url = self.collection_url("/points/scroll")?;
                let parsed = self.request(Method::POST, url, Some(&body)).await?;
                Ok(Self::parse_hits(&parsed, "/result/points"))
            }
        }
    }

    async fn search_broad(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScoredUnit>, SearchError> {
        let vector = self.embed_with_retry(query).await?;

        let body = json!({
            "vector": vector,
            "limit": limit.min(1_000),
            "with_payload": true,
            "score_threshold": BROAD_SCORE_THRESHOLD,
        });

        let url = self.collection_url("/points/search")?;
        let parsed = self.request(Method::POST, url, Some(&body)).await?;
        Ok(Self::parse_hits(&parsed, "/result"))
    }

    async fn delete_documents(&self, ids: &[String]) -> Result<(), SearchError> {
        if ids.is_empty() {
            return Ok(());
        }
        let url = self.collection_url("/points/delete?wait=true")?;
        self.request(Method::POST, url, Some(&json!({ "points": ids })))
            .await?;
        Ok(())
    }

    async fn update_document(
        &self,
        id: &str,
        content: &str,
        unit: &IndexedUnit,
    ) -> Result<(), SearchError> {
        let text = truncate_content(content);
        let embedding = self.embed_with_retry(&text).await?;

        let mut stored = unit.clone();
        stored.chunk.content = text;

        self.upsert_points(vec![json!({
            "id": id,
            "vector": embedding,
            "payload": serde_json::to_value(&stored)?,
        })])
        .await
    }

    async fn collection_stats(&self) -> Result<CollectionStats, SearchError> {
        let url = self.collection_url("")?;
        let parsed = self.request(Method::GET, url, None).await?;
        let count = parsed
            .pointer("/result/points_count")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;
        Ok(CollectionStats { count })
    }

    async fn clear_collection(&self) -> Result<(), SearchError> {
        let url = self.collection_url("")?;
        self.request(Method::DELETE, url, None).await?;
        self.initialize().await
    }

    async fn health_check(&self) -> HealthStatus {
        let url = match self.collection_url("") {
            Ok(url) => url,
            Err(error) => {
                return HealthStatus {
                    healthy: false,
                    details: error.to_string(),
                }
            }
        };

        match self.request(Method::GET, url, None).await {
            Ok(parsed) => HealthStatus {
                healthy: true,
                details: format!(
                    "qdrant collection '{}', {} points",
                    self.collection,
                    parsed
                        .pointer("/result/points_count")
                        .and_then(Value::as_u64)
                        .unwrap_or(0)
                ),
            },
            Err(error) => HealthStatus {
                healthy: false,
                details: error.to_string(),
            },
        }
    }
}
