//! cryptarch: diagnostic CLI for the proxy client core
//!
//! Runs single gateway calls and manifest loads against a proxy, printing
//! what came back.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use cryptarch::config::Config;
use cryptarch::{CryptarchClient, DefinitionTable, RequestOptions};

/// Cryptarch CLI
#[derive(Parser)]
#[command(name = "cryptarch")]
#[command(version = cryptarch::PKG_VERSION)]
#[command(about = "Destiny 2 proxy client: cached API calls and manifest loading")]
struct Args {
    /// Config file (default: ~/.cryptarch/config.toml, then /etc/cryptarch/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Proxy base URL (overrides the config file)
    #[arg(short, long, env = "CRYPTARCH_BASE_URL")]
    base_url: Option<String>,

    /// Session cookie forwarded to the proxy (`name=value`)
    #[arg(long, env = "CRYPTARCH_SESSION", hide_env_values = true)]
    session: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check the session
    Session,

    /// Load the essential manifest tier
    Essentials,

    /// Load the analysis manifest tier (after the essential tier)
    Analysis,

    /// Derive an item chunk
    Chunk {
        /// weapons, armor, consumables or cosmetics
        category: String,
    },

    /// Look up one definition
    Definition {
        /// Table name, e.g. DestinyStatDefinition
        table: String,
        /// Definition hash
        hash: u32,
    },

    /// GET an arbitrary proxy endpoint
    Get {
        /// Endpoint path, e.g. /api/destiny/profile
        endpoint: String,
        /// Query parameters as key=value
        #[arg(short, long = "query", value_parser = parse_query)]
        query: Vec<(String, String)>,
        /// Cache TTL in seconds
        #[arg(long)]
        ttl: Option<u64>,
    },

    /// Current milestones
    Milestones,

    /// News feed
    News {
        /// Page number
        #[arg(short, long)]
        page: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?.with_base_url(args.base_url);
    let mut builder = config.to_builder()?;
    if let Some(session) = args.session {
        builder = builder.session_cookie(session);
    }
    let client = builder.build()?;

    run(&client, args.command).await
}

async fn run(client: &CryptarchClient, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    let gateway = client.gateway();
    let store = client.store();

    match command {
        Command::Session => {
            let status = gateway.session().await?;
            if !status.authenticated {
                println!("not authenticated");
                return Ok(());
            }
            println!("authenticated");
            if let Some(user) = status.user {
                println!("membership id:   {}", user.membership_id);
                if let Some(name) = user.display_name {
                    println!("display name:    {name}");
                }
                if let Some(kind) = user.membership_type {
                    println!("membership type: {kind}");
                }
            }
        }

        Command::Essentials => {
            let data = store.load_essentials().await?;
            print_tables(&[
                data.stats(),
                data.damage_types(),
                data.classes(),
                data.energy_types(),
            ]);
            print_failed(data.tables.failed());
        }

        Command::Analysis => {
            let data = store.load_analysis_data().await;
            print_tables(&[
                data.items(),
                data.perks(),
                data.plug_sets(),
                data.socket_types(),
            ]);
            print_failed(data.tables.failed());
        }

        Command::Chunk { category } => {
            let chunk = store.load_item_chunk(&category).await?;
            println!("{}: {} items", chunk.category(), chunk.len());
            let mut names: Vec<&str> = chunk.iter().filter_map(|(_, def)| def.name()).collect();
            names.sort_unstable();
            names.dedup();
            for name in names.iter().take(20) {
                println!("  {name}");
            }
            if names.len() > 20 {
                println!("  ... ({} more)", names.len() - 20);
            }
        }

        Command::Definition { table, hash } => {
            store.load_table(&table).await?;
            match store.get_definition(&table, hash) {
                Some(definition) => println!("{}", serde_json::to_string_pretty(&*definition)?),
                None => println!("{table}: no definition for {hash}"),
            }
        }

        Command::Get {
            endpoint,
            query,
            ttl,
        } => {
            let mut options = RequestOptions::get();
            for (key, value) in query {
                options = options.query(key, value);
            }
            if let Some(secs) = ttl {
                options = options.cache_ttl(Duration::from_secs(secs));
            }
            let payload = gateway.request(&endpoint, &options).await?;
            println!("{}", serde_json::to_string_pretty(&*payload)?);
        }

        Command::Milestones => {
            let payload = gateway.milestones().await?;
            println!("{}", serde_json::to_string_pretty(&*payload)?);
        }

        Command::News { page } => {
            let payload = gateway.news(page).await?;
            println!("{}", serde_json::to_string_pretty(&*payload)?);
        }
    }

    Ok(())
}

fn parse_query(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))
}

fn print_tables(tables: &[std::sync::Arc<DefinitionTable>]) {
    for table in tables {
        println!("{:<32} {:>7} definitions", table.name(), table.len());
    }
}

fn print_failed(failed: &[String]) {
    if !failed.is_empty() {
        println!("\nunavailable: {}", failed.join(", "));
    }
}
