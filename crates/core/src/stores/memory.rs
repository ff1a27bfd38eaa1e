//! In-memory [`VectorStore`] used for tests and offline runs. Brute-force
//! cosine similarity over all stored vectors behind a `std::sync::RwLock`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::SearchError;
use crate::models::{IndexedUnit, ScoredUnit, SearchFilters};
use crate::traits::{
    CollectionStats, EmbeddingProvider, HealthStatus, SearchOptions, VectorStore,
};

struct StoredUnit {
    unit: IndexedUnit,
    vector: Vec<f32>,
}

pub struct InMemoryVectorStore {
    units: RwLock<HashMap<String, StoredUnit>>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl InMemoryVectorStore {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            units: RwLock::new(HashMap::new()),
            embedder,
        }
    }

    async fn scored_scan(
        &self,
        query: &str,
        limit: usize,
        filters: &SearchFilters,
        min_score: f64,
    ) -> Result<Vec<ScoredUnit>, SearchError> {
        let query_vector = self
            .embedder
            .embed(query)
            .await
            .map_err(|error| SearchError::Request(error.to_string()))?;

        let units = self.units.read().unwrap();
        let mut hits: Vec<ScoredUnit> = units
            .values()
            .filter(|stored| filters.matches(&stored.unit))
            .map(|stored| ScoredUnit {
                unit: stored.unit.clone(),
                score: f64::from(cosine_sim(&query_vector, &stored.vector)),
            })
            .filter(|hit| hit.score >= min_score)
            .collect();

        hits.sort_by(|left, right| right.score.total_cmp(&left.score));
        hits.truncate(limit);
        Ok(hits)
    }
}

fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn initialize(&self) -> Result<(), SearchError> {
        Ok(())
    }

    async fn add_documents(&self, units: &[IndexedUnit]) -> Result<(), SearchError> {
        for unit in units {
            if unit.chunk.content.trim().is_empty() {
                continue;
            }
            let vector = self
                .embedder
                .embed(&unit.chunk.content)
                .await
                .map_err(|error| SearchError::Request(error.to_string()))?;

            self.units.write().unwrap().insert(
                unit.id.to_string(),
                StoredUnit {
                    unit: unit.clone(),
                    vector,
                },
            );
        }
        Ok(())
    }

    async fn search(&self, options: &SearchOptions) -> Result<Vec<ScoredUnit>, SearchError> {
        match options.query.as_deref().filter(|q| !q.trim().is_empty()) {
            Some(query) => self.scored_scan(query, options.k, &options.filters, 0.0).await,
            None => {
                let units = self.units.read().unwrap();
                let mut hits: Vec<ScoredUnit> = units
                    .values()
                    .filter(|stored| options.filters.matches(&stored.unit))
                    .map(|stored| ScoredUnit {
                        unit: stored.unit.clone(),
                        score: 0.0,
                    })
                    .collect();
                hits.truncate(options.k);
                Ok(hits)
            }
        }
    }

    async fn search_broad(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScoredUnit>, SearchError> {
        self.scored_scan(query, limit, &SearchFilters::default(), -1.0)
            .await
    }

    async fn delete_documents(&self, ids: &[String]) -> Result<(), SearchError> {
        let mut units = self.units.write().unwrap();
        for id in ids {
            units.remove(id);
        }
        Ok(())
    }

    async fn update_document(
        &self,
        id: &str,
        content: &str,
        unit: &IndexedUnit,
    ) -> Result<(), SearchError> {
        let vector = self
            .embedder
            .embed(content)
            .await
            .map_err(|error| SearchError::Request(error.to_string()))?;

        let mut updated = unit.clone();
        updated.chunk.content = content.to_string();

        self.units.write().unwrap().insert(
            id.to_string(),
            StoredUnit {
                unit: updated,
                vector,
            },
        );
        Ok(())
    }

    async fn collection_stats(&self) -> Result<CollectionStats, SearchError> {
        Ok(CollectionStats {
            count: self.units.read().unwrap().len(),
        })
    }

    async fn clear_collection(&self) -> Result<(), SearchError> {
        self.units.write().unwrap().clear();
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        HealthStatus {
            healthy: true,
            details: format!("in-memory, {} units", self.units.read().unwrap().len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbedder;
    use crate::models::Language;
    use crate::testutil::sample_unit as unit;

    fn store() -> InMemoryVectorStore {
        InMemoryVectorStore::new(Arc::new(HashingEmbedder::default()))
    }

    #[tokio::test]
    async fn re_adding_the_same_unit_does_not_grow_the_collection() {
        let store = store();
        let units = vec![unit("doc-1", 0, "styret velges av generalforsamlingen")];

        store.add_documents(&units).await.unwrap();
        let first = store.collection_stats().await.unwrap().count;

        store.add_documents(&units).await.unwrap();
        let second = store.collection_stats().await.unwrap().count;

        assert_eq!(first, 1);
        assert_eq!(first, second, "deterministic ids must make upserts idempotent");
    }

    #[tokio::test]
    async fn empty_content_is_skipped() {
        let store = store();
        store
            .add_documents(&[unit("doc-1", 0, "   ")])
            .await
            .unwrap();
        assert_eq!(store.collection_stats().await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn semantic_search_ranks_similar_content_first() {
        let store = store();
        store
            .add_documents(&[
                unit("doc-1", 0, "styret velges av generalforsamlingen hvert år"),
                unit("doc-2", 0, "budsjettet vedtas i desember av økonomiansvarlig"),
            ])
            .await
            .unwrap();

        let hits = store
            .search(&SearchOptions {
                query: Some("hvem velger styret".into()),
                k: 2,
                filters: SearchFilters::default(),
            })
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].unit.document_id, "doc-1");
    }

    #[tokio::test]
    async fn empty_query_is_a_metadata_scan() {
        let store = store();
        let mut translation = unit("doc-2", 0, "the board is elected by the assembly");
        translation.is_authoritative = false;
        translation.is_translation = true;
        translation.language = Language::English;

        store
            .add_documents(&[unit("doc-1", 0, "styret velges av generalforsamlingen"), translation])
            .await
            .unwrap();

        let hits = store
            .search(&SearchOptions {
                query: None,
                k: 10,
                filters: SearchFilters {
                    document_id: Some("doc-1".into()),
                    ..Default::default()
                },
            })
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].unit.document_id, "doc-1");
    }

    #[tokio::test]
    async fn delete_and_clear_remove_units() {
        let store = store();
        let first = unit("doc-1", 0, "styret velges av generalforsamlingen");
        let second = unit("doc-2", 0, "vedtektene endres med to tredjedels flertall");
        store.add_documents(&[first.clone(), second]).await.unwrap();

        store
            .delete_documents(&[first.id.to_string()])
            .await
            .unwrap();
        assert_eq!(store.collection_stats().await.unwrap().count, 1);

        store.clear_collection().await.unwrap();
        assert_eq!(store.collection_stats().await.unwrap().count, 0);
    }
}
