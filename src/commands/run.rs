// ABOUTME: Pipeline driver that copies every configured table in order
// ABOUTME: Wires the SQLite reader into the PostgreSQL writer, one table at a time

use crate::config::EtlConfig;
use crate::error::EtlError;
use crate::models::{
    Filmwork, Genre, GenreFilmwork, Person, PersonFilmwork, Record, TableKind,
};
use crate::postgres::{self, LoadStats};
use crate::sqlite;
use anyhow::Result;

/// Outcome of loading one table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableReport {
    pub table: TableKind,
    pub stats: LoadStats,
}

/// Copy every configured table from the source into the destination
///
/// Tables are processed strictly in configuration order. Each table gets its
/// own destination connection, closed once that table is done. The first
/// failing table stops the run; batches it already committed stay in place.
///
/// # Examples
///
/// ```no_run
/// # use anyhow::Result;
/// # use sqlite_to_postgres::{commands, config::EtlConfig};
/// # async fn example() -> Result<()> {
/// let config = EtlConfig::load(None)?;
/// let reports = commands::run(&config).await?;
/// println!("Loaded {} tables", reports.len());
/// # Ok(())
/// # }
/// ```
pub async fn run(config: &EtlConfig) -> Result<Vec<TableReport>> {
    config.validate()?;

    tracing::info!(
        "Loading {} table(s) from {} into {}",
        config.tables.len(),
        config.source_db_path.display(),
        config.destination.describe()
    );
    tracing::info!(
        "Reading pages of {} rows, writing batches of {} rows",
        config.chunk_size,
        config.effective_batch_size()
    );

    let mut reports = Vec::with_capacity(config.tables.len());

    for &table in &config.tables {
        tracing::info!("Loading table '{}'...", table);

        let result = match table {
            TableKind::Genre => load_one::<Genre>(config).await,
            TableKind::Person => load_one::<Person>(config).await,
            TableKind::FilmWork => load_one::<Filmwork>(config).await,
            TableKind::GenreFilmWork => load_one::<GenreFilmwork>(config).await,
            TableKind::PersonFilmWork => load_one::<PersonFilmwork>(config).await,
        };

        let stats = match result {
            Ok(stats) => stats,
            Err(e) => {
                tracing::error!(
                    "✗ Failed to load table '{}' from {}: {:#}",
                    table,
                    config.source_db_path.display(),
                    e
                );
                return Err(e.context(format!("Failed to load table '{}'", table)));
            }
        };

        tracing::info!(
            "✓ Loaded '{}': {} rows read, {} inserted, {} already present, {} batches",
            table,
            stats.rows_read,
            stats.rows_inserted,
            stats.rows_skipped(),
            stats.batches
        );
        reports.push(TableReport { table, stats });
    }

    tracing::info!("✅ Load complete");
    Ok(reports)
}

async fn load_one<R: Record>(config: &EtlConfig) -> Result<LoadStats> {
    let mut client = postgres::connect_with_retry(&config.destination)
        .await
        .map_err(|e| EtlError::destination_io(R::TABLE, e))?;

    let records = sqlite::extract::<R>(&config.source_db_path, R::TABLE, config.chunk_size);
    let stats = postgres::load_table(
        &mut client,
        records,
        &config.destination.schema,
        R::TABLE,
        config.effective_batch_size(),
    )
    .await?;

    Ok(stats)
}
