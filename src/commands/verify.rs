// ABOUTME: Verify command implementation - compare row counts per table
// ABOUTME: Reports tables whose destination holds fewer rows than the source

use crate::config::EtlConfig;
use crate::models::TableKind;
use crate::{postgres, sqlite};
use anyhow::{Context, Result};

/// Row counts for one table on both sides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableCount {
    pub table: TableKind,
    pub source_rows: u64,
    pub destination_rows: u64,
}

impl TableCount {
    /// Every source row can have a counterpart at the destination.
    ///
    /// The destination may hold extra rows that never came from this source.
    pub fn is_complete(&self) -> bool {
        self.destination_rows >= self.source_rows
    }
}

/// Compare source and destination row counts for every configured table
///
/// # Errors
///
/// Fails when either store can't be queried, or when any table has fewer rows
/// at the destination than at the source.
pub async fn verify(config: &EtlConfig) -> Result<Vec<TableCount>> {
    config.validate()?;

    tracing::info!("Verifying {} table(s)...", config.tables.len());

    let client = postgres::connect_with_retry(&config.destination)
        .await
        .context("Failed to connect to destination database")?;

    let mut counts = Vec::with_capacity(config.tables.len());
    let mut incomplete = 0;

    for &table in &config.tables {
        let path = config.source_db_path.clone();
        let source_rows =
            tokio::task::spawn_blocking(move || sqlite::count_rows(&path, table.table_name()))
                .await
                .context("Source count task failed")?
                .with_context(|| format!("Failed to count source rows of '{}'", table))?;

        let destination_rows =
            postgres::count_rows(&client, &config.destination.schema, table.table_name()).await?;

        let count = TableCount {
            table,
            source_rows,
            destination_rows,
        };

        if count.is_complete() {
            tracing::info!(
                "  ✓ {}: {} source rows, {} destination rows",
                table,
                source_rows,
                destination_rows
            );
        } else {
            tracing::error!(
                "  ✗ {}: {} source rows but only {} destination rows",
                table,
                source_rows,
                destination_rows
            );
            incomplete += 1;
        }
        counts.push(count);
    }

    if incomplete > 0 {
        anyhow::bail!("{} table(s) are missing rows at the destination", incomplete);
    }

    tracing::info!("✓ All {} table(s) verified", counts.len());
    Ok(counts)
}
