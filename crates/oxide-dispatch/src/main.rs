//! oxide-routes CLI
//!
//! Inspects and clears the persisted state of an oxide-dispatch application:
//! the route cache and the rate-limit records.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use oxide_dispatch::{CachedTable, FileStore, RouteCache};

/// Route cache and rate-limit maintenance.
#[derive(Parser)]
#[command(name = "oxide-routes")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Route cache file.
    #[arg(short, long, env = "ROUTE_CACHE", default_value = "var/cache/routes.json")]
    cache: PathBuf,

    /// Directory holding rate-limit records.
    #[arg(short, long, env = "RATE_LIMIT_DIR", default_value = "var/rate_limits")]
    limits_dir: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List cached routes.
    List,

    /// Generate the URL of a named route.
    Url {
        /// Route name.
        name: String,

        /// Placeholder values as key=value.
        params: Vec<String>,
    },

    /// Delete the route cache.
    Clear,

    /// Manage rate-limit records.
    Limits {
        #[command(subcommand)]
        command: LimitsCommands,
    },
}

#[derive(Subcommand)]
enum LimitsCommands {
    /// Delete all rate-limit records.
    Clear,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cache = RouteCache::new(&cli.cache);

    match cli.command {
        Commands::List => {
            let table = load(&cache)?;
            print_routes(&table);
        }

        Commands::Url { name, params } => {
            let table = load(&cache)?;
            let params = params
                .iter()
                .map(|pair| {
                    pair.split_once('=')
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .with_context(|| format!("expected key=value, got '{pair}'"))
                })
                .collect::<anyhow::Result<HashMap<_, _>>>()?;
            println!("{}", table.resolve_url(&name, &params, &HashMap::new())?);
        }

        Commands::Clear => {
            if !cache.clear()? {
                info!("No route cache at {}.", cache.path().display());
            }
        }

        Commands::Limits {
            command: LimitsCommands::Clear,
        } => {
            let removed = FileStore::new(&cli.limits_dir).clear()?;
            info!("Removed {} rate-limit record(s).", removed);
        }
    }

    Ok(())
}

fn load(cache: &RouteCache) -> anyhow::Result<CachedTable> {
    match cache.load()? {
        Some(table) => Ok(table),
        None => bail!("no route cache at {}", cache.path().display()),
    }
}

fn print_routes(table: &CachedTable) {
    println!(
        "\nRoutes (cached {}):",
        table.generated_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!("{:-<100}", "");
    println!(
        "{:<8} {:<36} {:<24} {:<30} MIDDLEWARE",
        "METHOD", "PATTERN", "NAME", "HANDLER"
    );
    for route in table.routes() {
        let pattern = match &route.subdomain {
            Some(subdomain) => format!("{}{}", subdomain.pattern, route.pattern),
            None => route.pattern.clone(),
        };
        println!(
            "{:<8} {:<36} {:<24} {:<30} {}",
            route.method.as_str(),
            pattern,
            route.name.as_deref().unwrap_or("-"),
            route.handler.to_string(),
            route.middleware.join(", ")
        );
    }
    println!();
}
