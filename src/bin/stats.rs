use clap::Parser;
use geokg::store::GraphStore;
use geokg::Config;
use std::path::Path;

#[derive(Parser, Debug)]
#[command(name = "stats")]
#[command(about = "Graph store statistics")]
struct Args {
    /// Restrict counts to one document id
    #[arg(long)]
    document: Option<String>,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let config = Config::load()?;
    let store = GraphStore::open(config.db_path(), Path::new("migrations")).await?;

    let stats = store.statistics(args.document.as_deref()).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    match &args.document {
        Some(id) => println!("\n=== GeoKG Statistics: {} ===\n", id),
        None => println!("\n=== GeoKG Statistics ===\n"),
    }
    println!("Documents: {}", stats.documents_count);
    println!("Entities:  {}", stats.total_entities);
    println!("Relations: {}", stats.total_relations);

    if !stats.entity_types.is_empty() {
        println!("\nEntities by type:");
        println!("{:-<40}", "");
        for (entity_type, count) in &stats.entity_types {
            println!("{:<28} {:>10}", entity_type, count);
        }
    }

    if !stats.relation_types.is_empty() {
        println!("\nRelations by type:");
        println!("{:-<40}", "");
        for (relation_type, count) in &stats.relation_types {
            println!("{:<28} {:>10}", relation_type, count);
        }
    }

    if args.document.is_none() {
        let documents = store.documents().await?;
        if !documents.is_empty() {
            println!("\nDocuments:");
            println!("{:-<40}", "");
            for doc in &documents {
                println!("{}  {}", &doc.content_hash[..12.min(doc.content_hash.len())], doc.document_id);
            }
        }
    }

    println!();
    Ok(())
}
