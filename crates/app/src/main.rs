use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use doc_search_core::{
    rerank, DefaultExtractor, FsDocumentSource, HashingEmbedder, HybridRetriever,
    InMemoryJobStore, IndexingOptions, Orchestrator, PathCategory, QdrantVectorStore,
    SearchFilters, VectorStore,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "doc-search", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Local mirror of the document repository.
    #[arg(long, env = "DOC_SEARCH_ROOT", default_value = ".")]
    root: String,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant collection
    #[arg(long, default_value = "doc_chunks")]
    qdrant_collection: String,
}

#[derive(Subcommand)]
enum Command {
    /// Index a repository folder: list, deduplicate, chunk, and upsert.
    Index {
        /// Folder path inside the repository, e.g. "/Styringsdokumenter".
        #[arg(long, default_value = "/")]
        folder: String,
        /// Only the top folder level, no descent into subfolders.
        #[arg(long, default_value_t = false)]
        flat: bool,
        /// Documents processed concurrently per batch.
        #[arg(long, default_value = "5")]
        batch_size: usize,
        /// Delay between batches in milliseconds.
        #[arg(long, default_value = "1000")]
        batch_delay_ms: u64,
    },
    /// Hybrid search over the indexed collection.
    Search {
        /// Search query, e.g. "§ 6.3 vedtektene".
        #[arg(long)]
        query: String,
        /// Number of results to return.
        #[arg(long, default_value = "10")]
        top_k: usize,
        /// Restrict to a category: statutes | local_laws | meeting | general.
        #[arg(long)]
        category: Option<String>,
    },
    /// Delete and reprocess one document by id.
    Reindex {
        #[arg(long)]
        folder: String,
        #[arg(long)]
        document_id: String,
    },
    /// Collection statistics.
    Stats,
    /// Remove every indexed unit.
    Clear,
    /// Vector store health check.
    Health,
}

fn parse_category(value: &str) -> Option<PathCategory> {
    match value {
        "statutes" => Some(PathCategory::Statutes),
        "local_laws" => Some(PathCategory::LocalLaws),
        "meeting" => Some(PathCategory::Meeting),
        "general" => Some(PathCategory::General),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let embedder = Arc::new(HashingEmbedder::default());
    let store = Arc::new(
        QdrantVectorStore::new(&cli.qdrant_url, cli.qdrant_collection.as_str(), embedder.clone())
            .map_err(|error| anyhow::anyhow!(error.to_string()))?,
    );
    let source = Arc::new(FsDocumentSource::new(&cli.root));

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "doc-search boot"
    );

    match cli.command {
        Command::Index {
            folder,
            flat,
            batch_size,
            batch_delay_ms,
        } => {
            let site_id = source.site_id().to_string();
            let orchestrator = Arc::new(Orchestrator::new(
                source,
                store,
                Arc::new(DefaultExtractor),
                Arc::new(InMemoryJobStore::new()),
                IndexingOptions {
                    batch_size,
                    batch_delay_ms,
                },
            ));

            let job_id = orchestrator.create_job(&site_id, &folder, !flat);
            let job = orchestrator
                .run_job(&job_id)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            if job.failed_documents > 0 {
                warn!(failed = job.failed_documents, "some documents failed");
            }
            println!(
                "job {} finished: status={:?} total={} processed={} failed={}",
                job.id,
                job.status,
                job.total_documents,
                job.processed_documents,
                job.failed_documents
            );
            if let Some(error) = job.error {
                println!("error: {error}");
            }
        }
        Command::Search {
            query,
            top_k,
            category,
        } => {
            let filters = category.as_deref().and_then(parse_category).map(|category| {
                SearchFilters {
                    category: Some(category),
                    ..Default::default()
                }
            });

            let retriever = HybridRetriever::new(store);
            let mut results = retriever
                .search(&query, top_k, filters)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            rerank(&mut results, &query);

            println!("query: {query}");
            for result in results {
                println!(
                    "[{:?}] score={:.4} {} ({:?})",
                    result.search_type, result.score, result.unit.document_name, result.unit.language
                );
                if let Some(section) = &result.unit.chunk.section_number {
                    println!("  section: {section} {}", result.unit.chunk.section_title.as_deref().unwrap_or(""));
                }
                println!("  viewer: {}", result.unit.web_url);
                println!("  source: {}", result.unit.source_url);
                println!("  modified: {}", result.unit.modified_at.to_rfc3339());
                let preview: String = result.unit.chunk.content.chars().take(240).collect();
                println!("  {preview}");
            }
        }
        Command::Reindex {
            folder,
            document_id,
        } => {
            let site_id = source.site_id().to_string();
            let orchestrator = Arc::new(Orchestrator::new(
                source,
                store,
                Arc::new(DefaultExtractor),
                Arc::new(InMemoryJobStore::new()),
                IndexingOptions::default(),
            ));

            let units = orchestrator
                .reindex_document(&site_id, &folder, &document_id)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!("reindexed {document_id}: {units} units");
        }
        Command::Stats => {
            let stats = store
                .collection_stats()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!("indexed units: {}", stats.count);
        }
        Command::Clear => {
            store
                .clear_collection()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!("collection cleared");
        }
        Command::Health => {
            let health = store.health_check().await;
            println!(
                "healthy={} details={}",
                health.healthy, health.details
            );
        }
    }

    Ok(())
}
