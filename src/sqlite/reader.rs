// ABOUTME: Ordered, paged extraction of typed records from a SQLite table
// ABOUTME: Runs the blocking scan off the async runtime and streams bounded pages

use super::open_source;
use crate::error::EtlError;
use crate::models::{RawRow, Record};
use crate::utils::validate_identifier;
use futures::stream::{self, Stream, TryStreamExt};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

type PageResult<R> = Result<Vec<R>, EtlError>;

enum ScanState<R> {
    Idle {
        path: PathBuf,
        table: String,
        page_size: usize,
    },
    Running {
        table: String,
        pages: mpsc::Receiver<PageResult<R>>,
        scan: Option<JoinHandle<()>>,
    },
}

/// Stream a table's records in pages of at most `page_size`, ordered by `id`
///
/// Nothing is opened until the stream is first polled. Each call scans the
/// table from the beginning over a fresh read-only connection, which is closed
/// when the scan ends, fails, or the stream is dropped. At most one page is
/// buffered ahead of the consumer.
///
/// A row that cannot be mapped ends the stream with [`EtlError::MalformedRow`];
/// the page it belonged to is never emitted. A scan that dies without
/// finishing ends it with [`EtlError::ScanAborted`].
///
/// # Examples
///
/// ```no_run
/// # use sqlite_to_postgres::models::Genre;
/// # use sqlite_to_postgres::sqlite::extract_pages;
/// # use futures::TryStreamExt;
/// # async fn example() -> Result<(), sqlite_to_postgres::error::EtlError> {
/// let pages: Vec<Vec<Genre>> = extract_pages("db.sqlite", "genre", 50).try_collect().await?;
/// # Ok(())
/// # }
/// ```
pub fn extract_pages<R: Record>(
    path: impl Into<PathBuf>,
    table: impl Into<String>,
    page_size: usize,
) -> impl Stream<Item = PageResult<R>> {
    let state = ScanState::Idle {
        path: path.into(),
        table: table.into(),
        page_size,
    };

    stream::unfold(state, |state| async move {
        let (table, mut pages, mut scan) = match state {
            ScanState::Idle {
                path,
                table,
                page_size,
            } => {
                let (pages, scan) = start_scan::<R>(path, table.clone(), page_size);
                (table, pages, Some(scan))
            }
            ScanState::Running { table, pages, scan } => (table, pages, scan),
        };

        let item = match pages.recv().await {
            Some(page) => page,
            // channel closed: either the scan finished or it panicked
            None => match scan.take()?.await {
                Ok(()) => return None,
                Err(e) => {
                    tracing::error!("Scan of '{}' aborted: {}", table, e);
                    Err(EtlError::ScanAborted {
                        table: table.clone(),
                        source: e,
                    })
                }
            },
        };
        Some((item, ScanState::Running { table, pages, scan }))
    })
}

/// Same scan as [`extract_pages`], flattened into individual records
pub fn extract<R: Record>(
    path: impl Into<PathBuf>,
    table: impl Into<String>,
    page_size: usize,
) -> impl Stream<Item = Result<R, EtlError>> {
    extract_pages::<R>(path, table, page_size)
        .map_ok(|page| stream::iter(page.into_iter().map(Ok::<R, EtlError>)))
        .try_flatten()
}

fn start_scan<R: Record>(
    path: PathBuf,
    table: String,
    page_size: usize,
) -> (mpsc::Receiver<PageResult<R>>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(1);

    let scan = tokio::task::spawn_blocking(move || {
        if let Err(e) = scan_table::<R>(&path, &table, page_size, &tx) {
            // consumer may already be gone
            let _ = tx.blocking_send(Err(e));
        }
    });

    (rx, scan)
}

fn scan_table<R: Record>(
    path: &Path,
    table: &str,
    page_size: usize,
    pages: &mpsc::Sender<PageResult<R>>,
) -> Result<(), EtlError> {
    if page_size == 0 {
        return Err(EtlError::Config(
            "page size must be greater than zero".to_string(),
        ));
    }
    validate_identifier(table).map_err(|e| EtlError::Config(e.to_string()))?;

    let conn = open_source(path)?;
    let io_err = |e: rusqlite::Error| {
        tracing::error!(
            "Failed to read table '{}' from {}: {}",
            table,
            path.display(),
            e
        );
        EtlError::source_io(path, e)
    };

    let mut stmt = conn
        .prepare(&format!("SELECT * FROM {} ORDER BY id", table))
        .map_err(io_err)?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();
    let mut rows = stmt.query([]).map_err(io_err)?;

    tracing::debug!(
        "Scanning '{}' from {} in pages of {}",
        table,
        path.display(),
        page_size
    );

    let mut page = Vec::with_capacity(page_size);
    let mut page_count = 0usize;
    let mut row_count = 0usize;

    while let Some(row) = rows.next().map_err(io_err)? {
        let raw = RawRow::from_sqlite(&columns, row).map_err(io_err)?;
        let record = R::from_row(&raw).map_err(|e| {
            tracing::error!(
                "Malformed row #{} in '{}' from {}: {}",
                row_count + 1,
                table,
                path.display(),
                e
            );
            EtlError::malformed(table, e)
        })?;
        page.push(record);
        row_count += 1;

        if page.len() == page_size {
            page_count += 1;
            let full = std::mem::replace(&mut page, Vec::with_capacity(page_size));
            if !send_page(pages, full, table, page_count) {
                return Ok(());
            }
        }
    }

    if !page.is_empty() {
        page_count += 1;
        send_page(pages, page, table, page_count);
    }

    tracing::debug!(
        "Finished scanning '{}': {} rows in {} pages",
        table,
        row_count,
        page_count
    );

    Ok(())
}

/// Hand a page to the consumer; false once the consumer has hung up
fn send_page<R>(
    pages: &mpsc::Sender<PageResult<R>>,
    page: Vec<R>,
    table: &str,
    page_number: usize,
) -> bool {
    tracing::debug!(
        "Read page {} of '{}' ({} rows)",
        page_number,
        table,
        page.len()
    );
    if pages.blocking_send(Ok(page)).is_err() {
        tracing::debug!("Consumer of '{}' went away, stopping scan", table);
        return false;
    }
    true
}
