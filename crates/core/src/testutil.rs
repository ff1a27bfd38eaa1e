//! Shared fixtures for unit tests: sample documents, indexed units, and a
//! canned document source.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::IndexError;
use crate::models::{unit_id, Chunk, ChunkKind, IndexedUnit, Language, PathCategory, SourceDocument};
use crate::traits::{DocumentSource, Site};

pub(crate) fn sample_document(name: &str, folder: &str) -> SourceDocument {
    SourceDocument {
        id: format!("id-{name}"),
        drive_id: "drive-1".into(),
        site_id: "site-1".into(),
        name: name.into(),
        folder_path: folder.into(),
        content_type: "text/plain".into(),
        size: 1_024,
        created_at: Utc::now(),
        modified_at: Utc::now(),
        author: Some("BISO".into()),
        web_url: format!("https://example.org/view/{name}"),
        download_url: format!("https://example.org/raw/{name}"),
    }
}

pub(crate) fn sample_unit(document_id: &str, chunk_index: u32, content: &str) -> IndexedUnit {
    IndexedUnit {
        id: unit_id(document_id, chunk_index),
        chunk: Chunk {
            content: content.to_string(),
            chunk_index,
            kind: ChunkKind::Semantic,
            section_number: None,
            section_title: None,
            start_char: 0,
            end_char: content.len(),
        },
        document_id: document_id.to_string(),
        document_name: format!("{document_id}.pdf"),
        site_id: "site-1".into(),
        drive_id: "drive-1".into(),
        content_type: "application/pdf".into(),
        language: Language::Norwegian,
        version_raw: Some("v7.1".into()),
        is_authoritative: true,
        is_latest: true,
        is_translation: false,
        priority: 700_158,
        path_category: PathCategory::Statutes,
        web_url: format!("https://example.org/view/{document_id}"),
        source_url: format!("https://example.org/raw/{document_id}"),
        modified_at: Utc::now(),
        job_id: "job-1".into(),
    }
}

/// Canned [`DocumentSource`] backed by an in-memory listing.
pub(crate) struct FakeDocumentSource {
    pub documents: Vec<SourceDocument>,
    pub bytes: HashMap<String, Vec<u8>>,
}

impl FakeDocumentSource {
    pub fn new(documents: Vec<SourceDocument>) -> Self {
        let bytes = documents
            .iter()
            .map(|document| {
                (
                    document.id.clone(),
                    format!(
                        "§ 1 Formål\nDette dokumentet heter {} og beskriver formålet med \
                         organisasjonen i tilstrekkelig detalj for indeksering.\n",
                        document.name
                    )
                    .into_bytes(),
                )
            })
            .collect();
        Self { documents, bytes }
    }
}

#[async_trait]
impl DocumentSource for FakeDocumentSource {
    async fn list_sites(&self) -> Result<Vec<Site>, IndexError> {
        Ok(vec![Site {
            id: "site-1".into(),
            name: "Test site".into(),
        }])
    }

    async fn get_site(&self, site_id: &str) -> Result<Site, IndexError> {
        if site_id == "site-1" {
            Ok(Site {
                id: "site-1".into(),
                name: "Test site".into(),
            })
        } else {
            Err(IndexError::NotFound(format!("site {site_id}")))
        }
    }

    async fn list_documents(
        &self,
        _site_id: &str,
        folder_path: &str,
        recursive: bool,
    ) -> Result<Vec<SourceDocument>, IndexError> {
        Ok(self
            .documents
            .iter()
            .filter(|document| {
                if recursive {
                    document.folder_path.starts_with(folder_path)
                } else {
                    document.folder_path == folder_path
                }
            })
            .cloned()
            .collect())
    }

    async fn download_document(
        &self,
        _drive_id: &str,
        document_id: &str,
    ) -> Result<Vec<u8>, IndexError> {
        self.bytes
            .get(document_id)
            .cloned()
            .ok_or_else(|| IndexError::NotFound(format!("document {document_id}")))
    }
}
