//! ShardCache CLI
//!
//! Drives a [`CacheAsideStore`] over the configured backends. Records are
//! printed to stdout as JSON; logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use shardcache_common::config::BackendKind;
use shardcache_common::{Config, Person};
use shardcache_placement::ShardRouter;
use shardcache_store::{CacheAsideStore, RecordCodec, open_cache, open_session};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "shardcache-cli")]
#[command(about = "Sharded Person store with a cache-aside layer")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "SHARDCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Number of shards (overrides the config file)
    #[arg(long)]
    shards: Option<usize>,

    /// Data directory for the shard databases (overrides the config file).
    /// The cache file moves too unless `cache.path` is set explicitly.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level (overrides the config file)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drop and recreate the table on every shard
    Init,
    /// Insert a record
    Insert {
        login: String,
        first_name: String,
        last_name: String,
        age: i64,
    },
    /// Read a record from its shard
    Get { login: String },
    /// Read a record from the cache only
    GetCached { login: String },
    /// Read a record from its shard and write it to the cache
    Cache { login: String },
    /// Find records by first and last name prefix across all shards
    Find {
        first_name_prefix: String,
        last_name_prefix: String,
    },
    /// List every record
    All,
    /// Copy every record into the cache
    WarmUp,
    /// Show the number of cache entries
    CacheSize,
    /// Show which shard owns a login
    Route { login: String },
    /// Run an example session against in-memory backends
    Demo,
}

fn init_logging(level: &str, format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.to_string().into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

fn print_person(person: &Person) -> Result<()> {
    let record = serde_json::Value::Object(RecordCodec::encode(person));
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn print_people(people: &[Person]) -> Result<()> {
    let records: Vec<_> = people
        .iter()
        .map(|p| serde_json::Value::Object(RecordCodec::encode(p)))
        .collect();
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

fn build_store(config: &Config) -> Result<CacheAsideStore> {
    let router = ShardRouter::new(config.store.shards)?;
    let session = open_session(&config.store)?;
    let cache = open_cache(&config.cache)?;
    Ok(CacheAsideStore::new(router, session, cache)?)
}

async fn run_demo(config: &Config) -> Result<()> {
    let mut config = config.clone();
    config.store.backend = BackendKind::Memory;
    config.cache.backend = BackendKind::Memory;
    let store = build_store(&config)?;

    store.create_schema().await?;
    let alice = Person::new("alice", "Alice", "Smith", 30);
    store.insert(&alice).await?;
    info!("alice routes to shard {}", store.router().shard_index("alice"));

    println!("get_by_key(alice):");
    print_person(&store.get_by_key("alice").await?)?;

    match store.get_by_key_from_cache("alice").await {
        Err(e) if e.is_not_found() => println!("get_by_key_from_cache(alice): not cached"),
        other => {
            other?;
        }
    }

    store.populate_cache(&alice).await?;
    println!("get_by_key_from_cache(alice) after populate:");
    print_person(&store.get_by_key_from_cache("alice").await?)?;
    println!("cache size: {}", store.cache_size().await?);

    store
        .insert(&Person::new("alan", "Alan", "Smithers", 45))
        .await?;
    store
        .insert(&Person::new("albert", "Albert", "Jones", 52))
        .await?;
    println!("find_by_name_prefix(Al, Sm):");
    print_people(&store.find_by_name_prefix("Al", "Sm").await?)?;
    Ok(())
}

/// Load the configuration and apply command line overrides.
fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = Config::load(args.config.as_deref())
        .with_context(|| "Failed to load configuration")?;
    if let Some(shards) = args.shards {
        config.store.shards = shards;
    }
    if let Some(data_dir) = &args.data_dir {
        config.set_data_dir(data_dir.clone());
    }
    if let Some(level) = &args.log_level {
        config.logging.level.clone_from(level);
    }
    config.validate()?;
    Ok(config)
}

async fn dispatch(config: &Config, command: Commands) -> Result<()> {
    match command {
        Commands::Demo => run_demo(config).await,
        Commands::Route { login } => print_route(&ShardRouter::new(config.store.shards)?, &login),
        command => run(&build_store(config)?, command).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = resolve_config(&args)?;
    init_logging(&config.logging.level, args.log_format);
    dispatch(&config, args.command).await
}

fn print_route(router: &ShardRouter, login: &str) -> Result<()> {
    let hint = router.hint_for(login);
    let route = serde_json::json!({
        "login": login,
        "shard": hint.shard(),
        "hint": hint.to_string(),
        "shards": router.shard_count(),
    });
    println!("{}", serde_json::to_string_pretty(&route)?);
    Ok(())
}

async fn run(store: &CacheAsideStore, command: Commands) -> Result<()> {
    match command {
        Commands::Init => {
            store.create_schema().await?;
            println!(
                "Schema created on {} shards",
                store.router().shard_count()
            );
        }
        Commands::Insert {
            login,
            first_name,
            last_name,
            age,
        } => {
            let person = Person::new(login, first_name, last_name, age);
            store.insert(&person).await?;
            print_person(&person)?;
        }
        Commands::Get { login } => print_person(&store.get_by_key(&login).await?)?,
        Commands::GetCached { login } => {
            print_person(&store.get_by_key_from_cache(&login).await?)?;
        }
        Commands::Cache { login } => {
            let person = store.get_by_key(&login).await?;
            store.populate_cache(&person).await?;
            print_person(&person)?;
        }
        Commands::Find {
            first_name_prefix,
            last_name_prefix,
        } => {
            let people = store
                .find_by_name_prefix(&first_name_prefix, &last_name_prefix)
                .await?;
            print_people(&people)?;
        }
        Commands::All => print_people(&store.read_all().await?)?,
        Commands::WarmUp => {
            let count = store.warm_up_cache().await?;
            println!("Cached {count} records");
        }
        Commands::CacheSize => println!("{}", store.cache_size().await?),
        Commands::Route { login } => print_route(store.router(), &login)?,
        Commands::Demo => unreachable!("demo is dispatched before backends are opened"),
    }
    Ok(())
}
