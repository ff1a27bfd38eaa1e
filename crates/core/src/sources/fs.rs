//! Filesystem [`DocumentSource`]: a local directory tree stands in for one
//! repository site, with subfolders as folder paths. Useful for local
//! mirrors and tests; the production deployment points this port at the
//! remote repository instead.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::IndexError;
use crate::extract::correct_content_type;
use crate::models::SourceDocument;
use crate::traits::{DocumentSource, Site};

pub struct FsDocumentSource {
    root: PathBuf,
    site_id: String,
}

impl FsDocumentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let site_id = format!("fs-{}", short_digest(&root.to_string_lossy()));
        Self { root, site_id }
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    fn scan(&self, folder_path: &str, recursive: bool) -> Result<Vec<SourceDocument>, IndexError> {
        let folder = self.root.join(folder_path.trim_start_matches('/'));
        if !folder.is_dir() {
            return Err(IndexError::NotFound(format!(
                "folder {} under {}",
                folder_path,
                self.root.display()
            )));
        }

        let max_depth = if recursive { usize::MAX } else { 1 };
        let mut documents = Vec::new();

        for entry in WalkDir::new(&folder)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|item| item.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            documents.push(self.describe(entry.path())?);
        }

        documents.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(documents)
    }

    fn describe(&self, path: &Path) -> Result<SourceDocument, IndexError> {
        let metadata = std::fs::metadata(path)?;
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                IndexError::InvalidArgument(format!("path missing filename: {}", path.display()))
            })?
            .to_string();

        let folder_path = format!(
            "/{}",
            relative
                .parent()
                .map(|parent| parent.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default()
        );

        let modified_at: DateTime<Utc> = metadata
            .modified()
            .map(DateTime::from)
            .unwrap_or_else(|_| Utc::now());
        let created_at: DateTime<Utc> = metadata
            .created()
            .map(DateTime::from)
            .unwrap_or(modified_at);

        let url = format!("file://{}", path.to_string_lossy());

        Ok(SourceDocument {
            id: short_digest(&relative.to_string_lossy()),
            drive_id: self.site_id.clone(),
            site_id: self.site_id.clone(),
            name: name.clone(),
            folder_path,
            content_type: correct_content_type(&name, ""),
            size: metadata.len(),
            created_at,
            modified_at,
            author: None,
            web_url: url.clone(),
            download_url: url,
        })
    }
}

fn short_digest(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    format!("{digest:x}")[..16].to_string()
}

#[async_trait]
impl DocumentSource for FsDocumentSource {
    async fn list_sites(&self) -> Result<Vec<Site>, IndexError> {
        Ok(vec![Site {
            id: self.site_id.clone(),
            name: self.root.to_string_lossy().to_string(),
        }])
    }

    async fn get_site(&self, site_id: &str) -> Result<Site, IndexError> {
        if site_id == self.site_id {
            Ok(Site {
                id: self.site_id.clone(),
                name: self.root.to_string_lossy().to_string(),
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
        self.scan(folder_path, recursive)
    }

    async fn download_document(
        &self,
        _drive_id: &str,
        document_id: &str,
    ) -> Result<Vec<u8>, IndexError> {
        // The port has no point lookup; resolve the id by rescanning.
        for entry in WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|item| item.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
            if short_digest(&relative.to_string_lossy()) == document_id {
                return Ok(std::fs::read(entry.path())?);
            }
        }
        Err(IndexError::NotFound(format!("document {document_id}")))
    }
}
