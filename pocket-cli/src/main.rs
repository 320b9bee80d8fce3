//! Pocket CLI
//!
//! Command-line client for Pocket.
//!
//! # Usage
//!
//! ```bash
//! # List the ten oldest unread items
//! pocket list
//!
//! # Save a URL
//! pocket add https://example.com/article --title "An article" --tags rust,cli
//!
//! # Archive an item
//! pocket archive 229279689
//! ```
//!
//! The first run asks for a consumer key and prints an authorization URL.
//! Both are cached in the configuration directory for later runs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pocket_core::{
    AuthFlow, ConsumerKey, CredentialSource, CredentialStore, ItemClient, PocketAuthClient,
    PocketConfig,
};
use std::future::Future;
use std::path::PathBuf;
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod commands;

use commands::CommandContext;

#[derive(Parser)]
#[command(name = "pocket")]
#[command(about = "A Pocket command line client")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration directory (defaults to the platform config dir)
    #[arg(long, global = true, env = "POCKET_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show items
    #[command(visible_alias = "l")]
    List {
        /// Output template, e.g. "{item_id} {title}"
        #[arg(short, long)]
        format: Option<String>,

        /// Filter items by domain
        #[arg(short, long)]
        domain: Option<String>,

        /// Search query
        #[arg(short, long)]
        search: Option<String>,

        /// Number of items to return
        #[arg(short, long, default_value_t = pocket_core::items::DEFAULT_COUNT)]
        count: u32,

        /// Filter items by tag
        #[arg(short, long)]
        tag: Option<String>,
    },

    /// Add item
    #[command(visible_alias = "a")]
    Add {
        /// URL to save
        url: String,

        /// A manually specified title for the article
        #[arg(short, long)]
        title: Option<String>,

        /// A comma-separated list of tags
        #[arg(long)]
        tags: Option<String>,
    },

    /// Archive item
    Archive {
        /// Numeric item id
        item_id: String,
    },

    /// Authorize this client and show the authorized user
    Login,
}

/// Exit status after Ctrl-C, as a shell reports SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = PocketConfig::load(cli.config_dir.as_deref())
        .context("Failed to load configuration")?;
    init_logging(&config, cli.verbose);
    debug!("Using configuration directory {:?}", config.config_dir);

    // Blocking stdin read; stays outside the Ctrl-C race so SIGINT still ends it.
    let store = CredentialStore::new(&config);
    let consumer_key = store
        .load_consumer_key_interactive()
        .context("Failed to obtain a consumer key")?;

    match until_interrupted(run(cli.command, &config, store, consumer_key), interrupt()).await {
        Some(result) => result,
        None => {
            eprintln!("Interrupted");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    }
}

async fn run(
    command: Commands,
    config: &PocketConfig,
    store: CredentialStore,
    consumer_key: ConsumerKey,
) -> Result<()> {
    let ctx = authenticate(config, store, consumer_key).await?;

    if announces_authorization(&command, ctx.source) {
        eprintln!("Authorized as {}", ctx.client.username());
    }

    match command {
        Commands::List { format, domain, search, count, tag } => {
            let options = pocket_core::RetrieveOptions {
                count: Some(count),
                domain,
                search,
                tag,
            };
            commands::list(&ctx, options, format.as_deref(), &mut std::io::stdout()).await
        }
        Commands::Add { url, title, tags } => {
            commands::add(&ctx, url, title, tags).await
        }
        Commands::Archive { item_id } => {
            commands::archive(&ctx, &item_id, &mut std::io::stdout()).await
        }
        Commands::Login => commands::login(&ctx, &mut std::io::stdout()),
    }
}

/// A fresh authorization is noted on stderr, except for `login`, which
/// reports the user itself.
fn announces_authorization(command: &Commands, source: CredentialSource) -> bool {
    source == CredentialSource::Authorized && !matches!(command, Commands::Login)
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Run `work` unless `interrupted` resolves first, in which case `work` is
/// dropped and `None` is returned.
async fn until_interrupted<T>(
    work: impl Future<Output = T>,
    interrupted: impl Future<Output = ()>,
) -> Option<T> {
    tokio::select! {
        output = work => Some(output),
        () = interrupted => None,
    }
}

fn init_logging(config: &PocketConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Obtain a credential and build the authenticated context every command needs.
async fn authenticate(
    config: &PocketConfig,
    store: CredentialStore,
    consumer_key: ConsumerKey,
) -> Result<CommandContext> {
    let api = PocketAuthClient::new(&config.api_base_url)
        .context("Invalid API base URL")?;
    let flow = AuthFlow::new(config, store, api);

    let outcome = flow
        .acquire(&consumer_key)
        .await
        .context("Failed to authorize with Pocket")?;

    if let Some(e) = &outcome.persist_warning {
        warn!("Authorization not saved: {}", e);
        eprintln!(
            "Warning: could not save the authorization ({}); you will need to authorize again next time.",
            e
        );
    }

    let client = ItemClient::new(&config.api_base_url, consumer_key, outcome.authorization)
        .context("Invalid API base URL")?;

    Ok(CommandContext {
        client,
        source: outcome.source,
    })
}
