use anyhow::{Context, Result};
use audio_hub::logging::init_logging;
use audio_hub::{
    AdapterRegistry, Config, ConfigOverrides, FileDefinitionRepository, MetaSearchClient,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Parser)]
#[command(name = "audio-hub", version)]
#[command(about = "Search and browse audiobook providers through one query model", long_about = None)]
struct Cli {
    /// Path to configuration file (TOML format)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Provider definitions file (TOML or JSON)
    #[arg(short, long, value_name = "FILE", global = true)]
    definitions: Option<PathBuf>,

    /// Upstream call timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    /// Log format (text, json)
    #[arg(long, value_name = "FORMAT", global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List enabled providers
    Providers,
    /// Search every enabled provider, or just one
    Search {
        keyword: String,
        #[arg(short, long)]
        provider: Option<String>,
    },
    /// List one page of a book's chapters
    Chapters {
        provider: String,
        book_id: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 50)]
        size: u32,
    },
    /// Resolve the playable URL of a chapter
    AudioUrl {
        provider: String,
        chapter_id: String,
        #[arg(long)]
        book_id: Option<String>,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let overrides = ConfigOverrides {
        definitions_path: cli.definitions.clone(),
        timeout_secs: cli.timeout,
        log_level: cli.log_level.clone(),
        log_format: cli.log_format.clone(),
    };
    let config = Config::load(cli.config.as_deref(), &overrides)
        .context("Failed to load configuration")?;
    init_logging(&config.logging)?;
    debug!("Loaded configuration: {:?}", config);

    let http = config.http_client_config();
    let client = http.build_client()?;
    let store = Arc::new(FileDefinitionRepository::new(
        config.providers.definitions_path.clone(),
    ));
    let registry = Arc::new(AdapterRegistry::new(store, client, http.timeout));
    let hub = MetaSearchClient::new(registry, config.meta_search_config());

    match cli.command {
        Command::Providers => print_json(&hub.registry().enabled_providers().await?),
        Command::Search { keyword, provider: None } => print_json(&hub.search(&keyword).await?),
        Command::Search {
            keyword,
            provider: Some(provider),
        } => print_json(&hub.search_provider(&provider, &keyword).await?),
        Command::Chapters {
            provider,
            book_id,
            page,
            size,
        } => print_json(&hub.list_chapters(&provider, &book_id, page, size).await?),
        Command::AudioUrl {
            provider,
            chapter_id,
            book_id,
        } => print_json(
            &hub.resolve_audio_url(&provider, book_id.as_deref(), &chapter_id)
                .await?,
        ),
    }
}
