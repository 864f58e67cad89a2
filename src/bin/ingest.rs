use clap::Parser;
use geokg::graph::{Extractor, KnowledgeGraph};
use geokg::ingest::{
    classify_files, delete_documents, discover_markdown, document_id_for, extract_document,
    find_deleted_documents, FileMetadata,
};
use geokg::store::{DocumentRecord, GraphStore};
use geokg::Config;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use anyhow::Result;
use tokio::task::JoinSet;

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Extract the docs folder into the graph store (incremental by default)")]
struct Args {
    /// Re-extract every document, ignoring stored hashes
    #[arg(short, long)]
    force: bool,

    /// Remove stored documents that no longer exist on disk
    #[arg(short, long)]
    cleanup: bool,

    /// Write the merged graph of the whole store to this JSON file
    #[arg(long)]
    merged_output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.geokg.log_level.as_str()),
    )
    .init();

    log::info!("Docs root: {}", config.docs_folder().display());
    log::info!("Database path: {}", config.db_path().display());

    let store = GraphStore::open(config.db_path(), Path::new("migrations")).await?;
    let extractor = Arc::new(Extractor::from_config(&config.extraction)?);

    let files = discover_markdown(config.docs_folder())?;
    if files.is_empty() {
        log::warn!("No Markdown files found. Check docs_folder in config.toml.");
    }

    let classification = classify_files(&files, &store.document_hashes().await?)?;
    let num_new = classification.new_files.len();
    let num_modified = classification.modified_files.len();
    let num_unchanged = classification.unchanged_files.len();

    let files_to_process: Vec<FileMetadata> = if args.force {
        log::info!("Mode: full re-extraction (all files)");
        files.clone()
    } else {
        log::info!(
            "Classification: new={}, modified={}, unchanged (skip)={}",
            num_new,
            num_modified,
            num_unchanged
        );
        classification.pending().cloned().collect()
    };

    let start = Instant::now();
    let total = files_to_process.len();

    // Extraction is CPU-bound; each document runs on the blocking pool.
    let mut tasks = JoinSet::new();
    for file in files_to_process {
        let extractor = Arc::clone(&extractor);
        tasks.spawn_blocking(move || {
            let result = extract_document(&extractor, &file);
            (file.relative_path, result)
        });
    }

    let mut saved = 0usize;
    let mut errors = 0usize;
    let mut entity_count = 0usize;
    let mut relation_count = 0usize;

    while let Some(joined) = tasks.join_next().await {
        let (path, result) = match joined {
            Ok(done) => done,
            Err(e) => {
                errors += 1;
                log::error!("Extraction task failed: {}", e);
                continue;
            }
        };

        match save(&store, result).await {
            Ok((entities, relations)) => {
                saved += 1;
                entity_count += entities;
                relation_count += relations;
                log::info!("[{}/{}] ✓ {} ({} entities, {} relations)", saved, total, path, entities, relations);
            }
            Err(e) => {
                errors += 1;
                log::error!("✗ {}: {}", path, e);
            }
        }
    }

    let on_disk: HashSet<String> = files.iter().map(|f| document_id_for(&f.relative_path)).collect();
    let deleted = find_deleted_documents(&store, &on_disk).await?;
    let deleted_count = if deleted.is_empty() {
        0
    } else if args.cleanup {
        delete_documents(&store, &deleted).await?
    } else {
        log::info!(
            "Found {} stored documents that no longer exist on disk (use --cleanup to remove)",
            deleted.len()
        );
        0
    };

    if let Some(path) = &args.merged_output {
        let merged = store.load_merged().await?;
        std::fs::write(path, serde_json::to_string_pretty(&merged)?)?;
        log::info!(
            "Merged graph written to {} ({} entities, {} relations)",
            path.display(),
            merged.statistics().total_entities,
            merged.statistics().total_relations
        );
    }

    log::info!("=== Ingestion Complete ===");
    log::info!("Files discovered: {}", files.len());
    log::info!("  New: {}", num_new);
    log::info!("  Modified: {}", num_modified);
    log::info!("  Unchanged (skipped): {}", num_unchanged);
    log::info!("Documents extracted: {} (errors: {})", saved, errors);
    log::info!("Entities: {}, relations: {}", entity_count, relation_count);
    log::info!("Time: {:?}", start.elapsed());
    if deleted_count > 0 {
        log::info!("Documents cleaned up (deleted from disk): {}", deleted_count);
    }
    if errors > 0 {
        log::warn!("Some documents failed to ingest. Check logs above for details.");
    }

    Ok(())
}

async fn save(
    store: &GraphStore,
    extracted: geokg::Result<(DocumentRecord, KnowledgeGraph)>,
) -> geokg::Result<(usize, usize)> {
    let (document, graph) = extracted?;
    let counts = (graph.entities().len(), graph.relations().len());
    store.save_graph(document, graph).await?;
    Ok(counts)
}
