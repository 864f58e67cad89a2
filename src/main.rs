use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use geokg::graph::{merge_graphs, outline, Extractor, KnowledgeGraph};
use geokg::ingest::document_record;
use geokg::Config;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "geokg", version, about = "Rule-based knowledge graph extraction for geology texts")]
struct Cli {
    /// TOML rule set replacing the built-in geology rules
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    /// Write JSON here instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract the knowledge graph of one Markdown file, using [extraction] from the config file when present
    Extract { file: PathBuf },
    /// Merge previously extracted graph JSON files
    Merge {
        #[arg(required = true)]
        graphs: Vec<PathBuf>,
    },
    /// Build the heading-outline graph of one Markdown file
    Outline { file: PathBuf },
    /// Character, heading and paragraph counts of one Markdown file
    Analyze { file: PathBuf },
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn emit<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let cli = Cli::parse();
    let output = cli.output.as_deref();

    match cli.command {
        Command::Extract { file } => {
            let mut config = Config::extraction_from(&Config::config_path())?;
            if let Some(rules) = cli.rules.clone() {
                config.rules_path = Some(rules);
            }
            let extractor = Extractor::from_config(&config)?;

            let content = read_text(&file)?;
            let document = document_record(&file.to_string_lossy(), &content);
            let graph = extractor.build_graph(&content, &document.source_info());

            let stats = graph.statistics();
            log::info!(
                "{}: {} entities, {} relations",
                document.document_id,
                stats.total_entities,
                stats.total_relations
            );
            emit(&graph, output)?;
        }
        Command::Merge { graphs } => {
            let mut loaded = Vec::with_capacity(graphs.len());
            for path in &graphs {
                let graph: KnowledgeGraph = serde_json::from_str(&read_text(path)?)
                    .with_context(|| format!("Invalid graph JSON in {}", path.display()))?;
                loaded.push(graph);
            }

            let merged = merge_graphs(&loaded);
            log::info!(
                "Merged {} graphs: {} entities, {} relations",
                loaded.len(),
                merged.statistics().total_entities,
                merged.statistics().total_relations
            );
            emit(&merged, output)?;
        }
        Command::Outline { file } => {
            let graph = outline::build_outline(&read_text(&file)?);
            emit(&graph, output)?;
        }
        Command::Analyze { file } => {
            let stats = outline::analyze_text(&read_text(&file)?);
            emit(&stats, output)?;
        }
    }

    Ok(())
}
