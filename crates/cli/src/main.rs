//! modelview command-line entry point.
//!
//! Fetches shared 3D model bundles into the local asset cache and inspects
//! what is cached. Logging goes to stderr so command output stays clean.

use anyhow::Result;
use clap::{Parser, Subcommand};
use modelview_client::{ApiClient, ApiConfig, fetch_and_cache};
use modelview_core::{AppConfig, CacheDb, ModelCache};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "modelview", version, about = "Local asset cache for shared 3D model bundles")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download a model bundle by share token and cache it
    Fetch { token: String },
    /// Show a cached bundle's metadata
    Show { token: String },
    /// Remove every cached bundle
    Clear,
    /// Print entry count, total size, and hit/miss counters
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load()?;

    tracing::info!(db_path = %config.db_path.display(), capacity = config.capacity_bytes, "opening asset cache");

    let db = CacheDb::open(&config.db_path).await?;
    let cache = ModelCache::new(db, config.capacity_bytes);

    match cli.command {
        Command::Fetch { token } => {
            let api = ApiClient::new(ApiConfig {
                base_url: config.api_base_url.clone(),
                user_agent: config.user_agent.clone(),
                max_bytes: config.max_fetch_bytes,
                timeout: config.timeout(),
            })?;

            let size = fetch_and_cache(&api, &cache, &token).await?;
            // The save's own sweep is detached; run one inline so the budget
            // holds before the process exits.
            cache.sweep().await?;
            println!("cached {} ({} bytes)", token, size);
        }
        Command::Show { token } => match cache.get(&token).await? {
            Some(bundle) => {
                println!("token:      {}", bundle.token);
                println!("geometry:   {} bytes", bundle.geometry.len());
                println!("material:   {} bytes", bundle.material.len());
                println!("textures:   {}", bundle.textures.len());
                let mut names: Vec<&String> = bundle.textures.keys().collect();
                names.sort();
                for name in names {
                    println!("  {} ({} bytes)", name, bundle.textures[name].len());
                }
                println!("total:      {} bytes", bundle.size_bytes);
            }
            None => println!("not cached: {}", token),
        },
        Command::Clear => {
            cache.clear().await?;
            println!("cache cleared");
        }
        Command::Stats => {
            let stats = cache.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            println!("capacity: {} bytes", cache.capacity_bytes());
        }
    }

    Ok(())
}
