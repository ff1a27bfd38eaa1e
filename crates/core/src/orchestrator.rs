//! Indexing job lifecycle: list candidate documents, filter unsupported
//! types, prioritize, batch-process with bounded fan-out, write to the
//! vector store, track progress and failures.
//!
//! Jobs run `pending -> processing -> {completed | failed}` with no retry
//! and no cancellation once started, matching the source system. A single
//! document's failure is counted and logged but never aborts the job.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::chunker::Chunker;
use crate::classifier::classify;
use crate::error::{IndexError, Result};
use crate::extract::{correct_content_type, is_supported_content_type, TextExtractor};
use crate::jobs::JobStore;
use crate::models::{
    unit_id, Classification, IndexedUnit, IndexingJob, IndexingOptions, JobStatus, SearchFilters,
    SourceDocument,
};
use crate::prioritizer::prioritize;
use crate::traits::{CollectionStats, DocumentSource, SearchOptions, VectorStore};

/// Sample length handed to the classifier for content-based language
/// detection.
const CLASSIFY_SAMPLE_CHARS: usize = 5_000;

pub struct Orchestrator {
    source: Arc<dyn DocumentSource>,
    store: Arc<dyn VectorStore>,
    extractor: Arc<dyn TextExtractor>,
    jobs: Arc<dyn JobStore>,
    chunker: Arc<Chunker>,
    options: IndexingOptions,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        store: Arc<dyn VectorStore>,
        extractor: Arc<dyn TextExtractor>,
        jobs: Arc<dyn JobStore>,
        options: IndexingOptions,
    ) -> Self {
        Self {
            source,
            store,
            extractor,
            jobs,
            chunker: Arc::new(Chunker::default()),
            options,
        }
    }

    /// Register a new pending job and return its id.
    pub fn create_job(&self, site_id: &str, folder_path: &str, recursive: bool) -> String {
        let job = IndexingJob::new(site_id, folder_path, recursive);
        let id = job.id.clone();
        self.jobs.put(job);
        id
    }

    pub fn get_job(&self, job_id: &str) -> Option<IndexingJob> {
        self.jobs.get(job_id)
    }

    pub fn list_jobs(&self) -> Vec<IndexingJob> {
        self.jobs.list()
    }

    /// Drive one job to a terminal state. There is no cancellation or
    /// timeout once processing starts; that is a known limitation carried
    /// over from the source system.
    pub async fn run_job(self: &Arc<Self>, job_id: &str) -> Result<IndexingJob> {
        let mut job = self
            .jobs
            .get(job_id)
            .ok_or_else(|| IndexError::NotFound(format!("job {job_id}")))?;

        if job.status.is_terminal() {
            return Ok(job);
        }

        job.status = JobStatus::Processing;
        self.jobs.put(job.clone());

        match self.execute(&mut job).await {
            Ok(()) => {
                job.status = JobStatus::Completed;
            }
            Err(error) => {
                warn!(job_id = %job.id, error = %error, "indexing job failed");
                job.status = JobStatus::Failed;
                job.error = Some(error.to_string());
            }
        }
        job.finished_at = Some(chrono::Utc::now());
        self.jobs.put(job.clone());
        Ok(job)
    }

    async fn execute(self: &Arc<Self>, job: &mut IndexingJob) -> Result<()> {
        self.store
            .initialize()
            .await
            .map_err(|error| IndexError::VectorStore(error.to_string()))?;

        let listed = self
            .source
            .list_documents(&job.site_id, &job.folder_path, job.recursive)
            .await?;

        let supported: Vec<SourceDocument> = listed
            .into_iter()
            .filter(|document| {
                let corrected = correct_content_type(&document.name, &document.content_type);
                is_supported_content_type(&corrected)
            })
            .collect();

        let documents = prioritize(supported);
        job.total_documents = documents.len() as u32;
        self.jobs.put(job.clone());

        info!(
            job_id = %job.id,
            site_id = %job.site_id,
            folder = %job.folder_path,
            total = job.total_documents,
            "starting indexing job"
        );

        for batch in documents.chunks(self.options.batch_size.max(1)) {
            let mut handles = Vec::with_capacity(batch.len());
            for document in batch {
                let this = Arc::clone(self);
                let document = document.clone();
                let job_id = job.id.clone();
                handles.push(tokio::spawn(async move {
                    let name = document.name.clone();
                    let outcome = this.process_document(&document, &job_id).await;
                    (name, outcome)
                }));
            }

            for handle in handles {
                match handle.await {
                    Ok((name, Ok(units))) => {
                        job.processed_documents += 1;
                        info!(job_id = %job.id, document = %name, units, "document indexed");
                    }
                    Ok((name, Err(error))) => {
                        job.failed_documents += 1;
                        warn!(job_id = %job.id, document = %name, error = %error, "document failed");
                    }
                    Err(join_error) => {
                        job.failed_documents += 1;
                        warn!(job_id = %job.id, error = %join_error, "document task panicked");
                    }
                }
            }
            self.jobs.put(job.clone());

            // Backpressure toward the source repository's rate limits.
            if self.options.batch_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.options.batch_delay_ms)).await;
            }
        }

        Ok(())
    }

    /// Full per-document pipeline: support re-check, download, extract,
    /// classify, chunk, enrich, write.
    async fn process_document(&self, document: &SourceDocument, job_id: &str) -> Result<usize> {
        let content_type = correct_content_type(&document.name, &document.content_type);
        if !is_supported_content_type(&content_type) {
            return Err(IndexError::UnsupportedContentType(content_type));
        }

        let bytes = self
            .source
            .download_document(&document.drive_id, &document.id)
            .await?;

        let text = self.extractor.extract(&bytes, &content_type)?;
        let sample: String = text.chars().take(CLASSIFY_SAMPLE_CHARS).collect();
        let classification = classify(&document.name, &document.folder_path, Some(&sample));

        let chunks = self.chunker.chunk(&text);
        if chunks.is_empty() {
            return Err(IndexError::Extraction(format!(
                "no indexable content in {}",
                document.name
            )));
        }

        let units = build_units(document, &classification, chunks, &content_type, job_id);
        self.store
            .add_documents(&units)
            .await
            .map_err(|error| IndexError::VectorStore(error.to_string()))?;

        Ok(units.len())
    }

    /// Re-resolve and reprocess one document. The container is re-listed in
    /// full because the source port has no point lookup; the O(n) rescan is
    /// an accepted cost.
    pub async fn reindex_document(
        self: &Arc<Self>,
        site_id: &str,
        folder_path: &str,
        document_id: &str,
    ) -> Result<usize> {
        let listed = self
            .source
            .list_documents(site_id, folder_path, true)
            .await?;

        let document = listed
            .into_iter()
            .find(|candidate| candidate.id == document_id)
            .ok_or_else(|| IndexError::NotFound(format!("document {document_id}")))?;

        let existing = self
            .store
            .search(&SearchOptions {
                query: None,
                k: usize::MAX,
                filters: SearchFilters {
                    document_id: Some(document_id.to_string()),
                    ..Default::default()
                },
            })
            .await
            .map_err(|error| IndexError::VectorStore(error.to_string()))?;

        if !existing.is_empty() {
            let ids: Vec<String> = existing
                .iter()
                .map(|hit| hit.unit.id.to_string())
                .collect();
            self.store
                .delete_documents(&ids)
                .await
                .map_err(|error| IndexError::VectorStore(error.to_string()))?;
        }

        let job_id = format!("reindex-{}", Uuid::new_v4());
        self.process_document(&document, &job_id).await
    }

    pub async fn clear_index(&self) -> Result<()> {
        self.store
            .clear_collection()
            .await
            .map_err(|error| IndexError::VectorStore(error.to_string()))
    }

    pub async fn collection_stats(&self) -> Result<CollectionStats> {
        self.store
            .collection_stats()
            .await
            .map_err(|error| IndexError::VectorStore(error.to_string()))
    }
}

/// Attach full provenance metadata to every chunk of one document.
pub fn build_units(
    document: &SourceDocument,
    classification: &Classification,
    chunks: Vec<crate::models::Chunk>,
    content_type: &str,
    job_id: &str,
) -> Vec<IndexedUnit> {
    chunks
        .into_iter()
        .map(|chunk| IndexedUnit {
            id: unit_id(&document.id, chunk.chunk_index),
            chunk,
            document_id: document.id.clone(),
            document_name: document.name.clone(),
            site_id: document.site_id.clone(),
            drive_id: document.drive_id.clone(),
            content_type: content_type.to_string(),
            language: classification.language,
            version_raw: classification.version.raw.clone(),
            is_authoritative: classification.authority.is_authoritative,
            is_latest: classification.authority.is_latest,
            is_translation: classification.authority.is_translation,
            priority: classification.authority.priority,
            path_category: classification.path.category,
            web_url: document.web_url.clone(),
            source_url: document.download_url.clone(),
            modified_at: document.modified_at,
            job_id: job_id.to_string(),
        })
        .collect()
}
