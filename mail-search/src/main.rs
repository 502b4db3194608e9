//! mail-search: hybrid email search service
//!
//! # Usage
//!
//! ```bash
//! # Run the HTTP API
//! mail-search --config mail-search.toml serve
//!
//! # One-off search, printed as JSON
//! mail-search search "invoices from december 2024" --account 1
//!
//! # Embed stored messages that have no vector yet
//! mail-search sync --account 1 --limit 500
//! ```

use clap::{Parser, Subcommand};
use mail_search::api::{ApiServer, AppState};
use mail_search::config::LoggingConfig;
use mail_search::Config;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "mail-search")]
#[command(version, about = "Hybrid keyword + semantic email search", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file (development defaults otherwise)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve,
    /// Run a single search and print the report
    Search {
        /// Natural-language query
        query: String,
        /// Account to search
        #[arg(short, long)]
        account: i64,
        /// Maximum number of results
        #[arg(short, long)]
        max: Option<usize>,
        /// Embed pending messages before searching
        #[arg(long)]
        sync: bool,
    },
    /// Embed messages that have no vector yet
    Sync {
        /// Account to sync
        #[arg(short, long)]
        account: i64,
        /// Maximum number of messages to embed
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
    },
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("mail_search={0},tower_http={0}", logging.level).into());
    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_env_overrides();
    config.validate()?;

    init_logging(&config.logging);
    info!("Starting mail-search v{}", env!("CARGO_PKG_VERSION"));
    match &cli.config {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => info!("No config file specified, using development defaults"),
    }

    let state = AppState::from_config(&config).await?;

    match cli.command {
        Commands::Serve => {
            let server = ApiServer::new(state, config.server.listen_addr.clone());
            server.run().await?;
        }
        Commands::Search {
            query,
            account,
            max,
            sync,
        } => {
            if query.chars().count() > config.search.max_query_length {
                anyhow::bail!("query exceeds {} characters", config.search.max_query_length);
            }
            if sync {
                state.sync.sync_account(account, config.search.max_results_limit * 10).await?;
            }

            let max_results = config.search.clamp_max_results(max);
            let report = state.workflow.search_emails(&query, account, max_results).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Sync { account, limit } => {
            let report = state.sync.sync_account(account, limit).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
