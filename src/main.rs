// ABOUTME: CLI entry point for sqlite-to-postgres
// ABOUTME: Loads configuration, sets up logging, and routes to the load or verify command

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sqlite_to_postgres::commands;
use sqlite_to_postgres::config::{EtlConfig, DEFAULT_LOG_FILE};
use sqlite_to_postgres::models::TableKind;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sqlite-to-postgres")]
#[command(about = "Copy SQLite tables into PostgreSQL in chunked, idempotent batches", long_about = None)]
#[command(version)]
struct Cli {
    /// Defaults to `load` when omitted
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Clone, Default)]
struct RunArgs {
    /// Path to a TOML config file (environment variables still override it)
    #[arg(long)]
    config: Option<PathBuf>,
    /// SQLite database to read from
    #[arg(long)]
    source: Option<PathBuf>,
    /// Tables to copy, in order (comma-separated)
    #[arg(long, value_delimiter = ',')]
    tables: Option<Vec<TableKind>>,
    /// Rows fetched from the source per page
    #[arg(long)]
    chunk_size: Option<usize>,
    /// Rows written to the destination per batch
    #[arg(long)]
    batch_size: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy every configured table into the destination, skipping existing ids
    Load(RunArgs),
    /// Compare source and destination row counts per table
    Verify(RunArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; real environment variables still apply
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Commands::Load(RunArgs::default()));

    let args = match &command {
        Commands::Load(args) | Commands::Verify(args) => args,
    };
    let config = configure(args)?;

    match command {
        Commands::Load(_) => {
            commands::run(&config).await?;
        }
        Commands::Verify(_) => {
            commands::verify(&config).await?;
        }
    }
    Ok(())
}

/// Build and validate the configuration with logging already in place
///
/// When the configuration can't be loaded at all, logging falls back to
/// `LOG_FILE` or the default log path so the failure still reaches the file.
fn configure(args: &RunArgs) -> anyhow::Result<EtlConfig> {
    let config = match build_config(args) {
        Ok(config) => config,
        Err(e) => {
            init_logging(&fallback_log_file(|key| std::env::var(key).ok()))?;
            tracing::error!("✗ Failed to load configuration: {:#}", e);
            return Err(e);
        }
    };

    init_logging(&config.log_file)?;
    if let Err(e) = config.validate() {
        tracing::error!("✗ Invalid configuration: {:#}", e);
        return Err(e);
    }
    Ok(config)
}

fn fallback_log_file<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    lookup("LOG_FILE")
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
}

fn build_config(args: &RunArgs) -> anyhow::Result<EtlConfig> {
    let mut config = EtlConfig::load(args.config.as_deref())?;

    if let Some(source) = &args.source {
        config.source_db_path = source.clone();
    }
    if let Some(tables) = &args.tables {
        config.tables = tables.clone();
    }
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = Some(batch_size);
    }

    Ok(config)
}

/// Log to the terminal and to a fresh log file - default to INFO level if RUST_LOG not set
fn init_logging(log_file: &Path) -> anyhow::Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let file = std::fs::File::create(log_file)
        .with_context(|| format!("Failed to create log file {}", log_file.display()))?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file)),
        )
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_log_file_prefers_environment() {
        assert_eq!(
            fallback_log_file(|_| Some("etl.log".to_string())),
            PathBuf::from("etl.log")
        );
        assert_eq!(fallback_log_file(|_| None), PathBuf::from(DEFAULT_LOG_FILE));
        assert_eq!(
            fallback_log_file(|_| Some(String::new())),
            PathBuf::from(DEFAULT_LOG_FILE)
        );
    }

    #[test]
    fn test_invalid_settings_survive_building_for_later_logging() {
        let args = RunArgs {
            source: Some(PathBuf::from("db.sqlite")),
            chunk_size: Some(0),
            ..RunArgs::default()
        };

        let config = build_config(&args).unwrap();
        assert_eq!(config.chunk_size, 0);
        assert!(config.validate().is_err());
    }
}
