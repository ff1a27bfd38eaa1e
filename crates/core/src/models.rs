use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for deterministic vector-store identifiers. Hashing
/// `{document_id}_chunk_{chunk_index}` into this namespace makes every
/// re-index of the same chunk an idempotent upsert.
pub const UNIT_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x5b, 0x1e, 0x9a, 0x7c, 0x44, 0x2d, 0x4f, 0x1b, 0x8e, 0x63, 0x0a, 0xd1, 0x27, 0x9f, 0x55,
    0x36,
]);

/// Immutable snapshot of one repository object at ingestion time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub id: String,
    pub drive_id: String,
    pub site_id: String,
    pub name: String,
    pub folder_path: String,
    pub content_type: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub author: Option<String>,
    /// Stable public viewer URL for the document.
    pub web_url: String,
    /// Original source URL inside the repository.
    pub download_url: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Norwegian,
    English,
    Mixed,
    Unknown,
}

impl Language {
    /// Rank used to break version ties: the statutory authority language
    /// first, then translations.
    pub fn authority_rank(self) -> u8 {
        match self {
            Language::Norwegian => 3,
            Language::English => 2,
            Language::Mixed => 1,
            Language::Unknown => 0,
        }
    }
}

/// Dotted version number parsed from a file name, e.g. "v7.1".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionInfo {
    pub raw: Option<String>,
    pub major: u32,
    pub minor: u32,
}

impl VersionInfo {
    pub fn lowest() -> Self {
        Self {
            raw: None,
            major: 1,
            minor: 0,
        }
    }

    /// Numeric major-then-minor comparison, never lexicographic.
    pub fn ordinal(&self) -> u64 {
        u64::from(self.major) * 1_000 + u64::from(self.minor)
    }
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self::lowest()
    }
}

impl PartialOrd for VersionInfo {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionInfo {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.major, self.minor).cmp(&(other.major, other.minor))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Authority {
    pub is_authoritative: bool,
    pub is_latest: bool,
    pub is_translation: bool,
    /// Combined score: version ordinal dominates, language bonus breaks
    /// ties, boolean flags nudge.
    pub priority: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PathCategory {
    Statutes,
    LocalLaws,
    Meeting,
    General,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathInfo {
    pub category: PathCategory,
    pub is_in_language_folder: bool,
    pub language_folder: Option<Language>,
}

/// Derived per-document classification; never persisted apart from the
/// indexed chunks that carry its fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub language: Language,
    pub version: VersionInfo,
    pub authority: Authority,
    pub path: PathInfo,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Structured,
    StructuredPart,
    Semantic,
}

impl ChunkKind {
    pub fn is_structured(self) -> bool {
        matches!(self, ChunkKind::Structured | ChunkKind::StructuredPart)
    }
}

/// One retrieval unit produced by the chunker. Content may overlap between
/// neighbours by design; `chunk_index` never does.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub chunk_index: u32,
    pub kind: ChunkKind,
    pub section_number: Option<String>,
    pub section_title: Option<String>,
    pub start_char: usize,
    pub end_char: usize,
}

/// A chunk plus full provenance, keyed by a deterministic identifier. This
/// is the record actually written to the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedUnit {
    pub id: Uuid,
    pub chunk: Chunk,
    pub document_id: String,
    pub document_name: String,
    pub site_id: String,
    pub drive_id: String,
    pub content_type: String,
    pub language: Language,
    pub version_raw: Option<String>,
    pub is_authoritative: bool,
    pub is_latest: bool,
    pub is_translation: bool,
    pub priority: i64,
    pub path_category: PathCategory,
    pub web_url: String,
    pub source_url: String,
    pub modified_at: DateTime<Utc>,
    pub job_id: String,
}

/// Deterministic vector-store identifier for one chunk of one document.
pub fn unit_id(document_id: &str, chunk_index: u32) -> Uuid {
    let key = format!("{document_id}_chunk_{chunk_index}");
    Uuid::new_v5(&UNIT_ID_NAMESPACE, key.as_bytes())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// One indexing run over a site folder. Owned and mutated only by the
/// orchestrator; terminal once completed or failed. Held in an in-memory
/// registry for the life of the process, with no durability guarantee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingJob {
    pub id: String,
    pub status: JobStatus,
    pub site_id: String,
    pub folder_path: String,
    pub recursive: bool,
    pub total_documents: u32,
    pub processed_documents: u32,
    pub failed_documents: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl IndexingJob {
    pub fn new(site_id: &str, folder_path: &str, recursive: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            status: JobStatus::Pending,
            site_id: site_id.to_string(),
            folder_path: folder_path.to_string(),
            recursive,
            total_documents: 0,
            processed_documents: 0,
            failed_documents: 0,
            started_at: Utc::now(),
            finished_at: None,
            error: None,
        }
    }
}

/// Metadata constraints applied to a vector-store search.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SearchFilters {
    pub authoritative_only: bool,
    pub latest_only: bool,
    pub category: Option<PathCategory>,
    pub document_id: Option<String>,
    pub language: Option<Language>,
}

impl SearchFilters {
    /// Whether `unit` is eligible under these filters. The authoritative
    /// scope admits translations: they are the second survivor class the
    /// prioritizer lets into the index.
    pub fn matches(&self, unit: &IndexedUnit) -> bool {
        if self.authoritative_only && !unit.is_authoritative && !unit.is_translation {
            return false;
        }
        if self.latest_only && !unit.is_latest {
            return false;
        }
        if let Some(category) = self.category {
            if unit.path_category != category {
                return false;
            }
        }
        if let Some(document_id) = &self.document_id {
            if &unit.document_id != document_id {
                return false;
            }
        }
        if let Some(language) = self.language {
            if unit.language != language {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Keyword,
    Semantic,
    Hybrid,
}

/// A scored unit as returned by the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredUnit {
    pub unit: IndexedUnit,
    pub score: f64,
}

/// Final result of the hybrid retrieve-and-rerank pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    pub unit: IndexedUnit,
    pub score: f64,
    pub search_type: SearchType,
}

#[derive(Debug, Clone)]
pub struct IndexingOptions {
    pub batch_size: usize,
    pub batch_delay_ms: u64,
}

impl Default for IndexingOptions {
    fn default() -> Self {
        Self {
            batch_size: 5,
            batch_delay_ms: 1_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_comparison_is_numeric_not_lexicographic() {
        let v7_1 = VersionInfo {
            raw: Some("v7.1".into()),
            major: 7,
            minor: 1,
        };
        let v7_0 = VersionInfo {
            raw: Some("v7.0".into()),
            major: 7,
            minor: 0,
        };
        let v6_3 = VersionInfo {
            raw: Some("v6.3".into()),
            major: 6,
            minor: 3,
        };
        let v10_0 = VersionInfo {
            raw: Some("v10.0".into()),
            major: 10,
            minor: 0,
        };

        assert!(v7_1 > v7_0);
        assert!(v7_0 > v6_3);
        assert!(v10_0 > v7_1, "10 must beat 7 despite '1' < '7' as text");
    }

    #[test]
    fn unit_id_is_deterministic_across_calls() {
        let first = unit_id("doc-abc", 3);
        let second = unit_id("doc-abc", 3);
        let other = unit_id("doc-abc", 4);

        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[test]
    fn new_jobs_start_pending_and_non_terminal() {
        let job = IndexingJob::new("site-1", "/Documents", true);
        assert_eq!(job.status, JobStatus::Pending);
        assert!(!job.status.is_terminal());
        assert_eq!(job.processed_documents, 0);
    }
}
