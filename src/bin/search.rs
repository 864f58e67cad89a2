use anyhow::Result;
use clap::{Parser, Subcommand};
use geokg::store::{EntityQuery, GraphStore};
use geokg::{Config, EntityType, RelationType};
use std::path::Path;

#[derive(Parser, Debug)]
#[command(name = "search")]
#[command(about = "Query the graph store")]
struct Args {
    /// Print JSON instead of a table
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find entities by name or description substring
    Entities {
        text: Option<String>,
        #[arg(long = "type")]
        entity_type: Option<EntityType>,
        #[arg(long)]
        document: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Relations touching an entity, in either direction
    Relations {
        entity_id: String,
        #[arg(long = "type")]
        types: Vec<RelationType>,
    },
    /// Shortest path between two entities
    Path {
        source_id: String,
        target_id: String,
        #[arg(long)]
        max_depth: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "warn")).init();

    let args = Args::parse();
    let config = Config::load()?;
    let store = GraphStore::open(config.db_path(), Path::new("migrations")).await?;

    match args.command {
        Command::Entities {
            text,
            entity_type,
            document,
            limit,
        } => {
            let entities = store
                .search_entities(EntityQuery {
                    text,
                    entity_type,
                    document_id: document,
                    limit: limit.unwrap_or(config.store.search_limit),
                })
                .await?;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&entities)?);
                return Ok(());
            }
            if entities.is_empty() {
                println!("No matching entities.");
                return Ok(());
            }
            println!("{:<40} {:<24} {:<22} {:>6}", "ID", "Name", "Type", "Conf");
            println!("{:-<96}", "");
            for e in &entities {
                println!("{:<40} {:<24} {:<22} {:>6.2}", e.id, e.name, e.entity_type, e.confidence);
            }
            println!("\n{} entities", entities.len());
        }
        Command::Relations { entity_id, types } => {
            let relations = store.entity_relations(&entity_id, &types).await?;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&relations)?);
                return Ok(());
            }
            for r in &relations {
                let source = store.get_entity(&r.source_entity_id).await?;
                let target = store.get_entity(&r.target_entity_id).await?;
                println!(
                    "{} -[{} {:.2}]-> {}",
                    source.map(|e| e.name).unwrap_or_else(|| r.source_entity_id.clone()),
                    r.relation_type,
                    r.confidence,
                    target.map(|e| e.name).unwrap_or_else(|| r.target_entity_id.clone()),
                );
                if let Some(text) = &r.source_text {
                    println!("    {}", text);
                }
            }
            println!("\n{} relations", relations.len());
        }
        Command::Path {
            source_id,
            target_id,
            max_depth,
        } => {
            let max_depth = max_depth.unwrap_or(config.store.max_path_depth);
            let path = store.find_path(&source_id, &target_id, max_depth).await?;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&path)?);
                return Ok(());
            }
            match path {
                Some(path) => {
                    let names: Vec<&str> = path.entities.iter().map(|e| e.name.as_str()).collect();
                    println!("{}", names.join(" - "));
                    for r in &path.relations {
                        println!("  {} {} {}", r.source_entity_id, r.relation_type, r.target_entity_id);
                    }
                    println!("\n{} hops", path.hops());
                }
                None => println!("No path within {} hops.", max_depth),
            }
        }
    }

    Ok(())
}
