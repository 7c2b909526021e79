// ABOUTME: PostgreSQL connection utilities for the destination store
// ABOUTME: Handles TLS setup, friendly connection errors, and retry on open

use crate::config::DestinationConfig;
use crate::utils;
use anyhow::{Context, Result};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use std::time::Duration;
use tokio_postgres::Client;

/// Connect to the destination database with TLS support
///
/// TLS is negotiated when the server offers it and skipped otherwise. The
/// connection task runs on the tokio runtime until the returned client is
/// dropped.
pub async fn connect(destination: &DestinationConfig) -> Result<Client> {
    let config = destination.pg_config()?;

    let tls_connector = TlsConnector::builder()
        .danger_accept_invalid_certs(false)
        .build()
        .context("Failed to build TLS connector")?;
    let tls = MakeTlsConnector::new(tls_connector);

    let (client, connection) = config
        .connect(tls)
        .await
        .map_err(|e| describe_connect_error(&e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("Connection error: {}", e);
        }
    });

    Ok(client)
}

/// Connect with automatic retry for transient failures
///
/// Only opening the connection is retried; statements are never replayed.
pub async fn connect_with_retry(destination: &DestinationConfig) -> Result<Client> {
    utils::retry_with_backoff(
        || connect(destination),
        destination.connect_retries,
        Duration::from_secs(1),
    )
    .await
    .with_context(|| format!("Failed to connect to {} after retries", destination.describe()))
}

fn describe_connect_error(error_msg: &str) -> anyhow::Error {
    if error_msg.contains("password authentication failed") {
        anyhow::anyhow!(
            "Authentication failed: Invalid username or password.\n\
             Please verify your database credentials."
        )
    } else if error_msg.contains("database") && error_msg.contains("does not exist") {
        anyhow::anyhow!(
            "Database does not exist: {}\n\
             Please create the database first or check the connection settings.",
            error_msg
        )
    } else if error_msg.contains("Connection refused") || error_msg.contains("could not connect")
    {
        anyhow::anyhow!(
            "Connection refused: Unable to reach database server.\n\
             Please check:\n\
             - The host and port are correct\n\
             - The database server is running\n\
             - Firewall rules allow connections\n\
             Error: {}",
            error_msg
        )
    } else if error_msg.contains("timeout") || error_msg.contains("timed out") {
        anyhow::anyhow!(
            "Connection timeout: Database server did not respond in time.\n\
             Error: {}",
            error_msg
        )
    } else if error_msg.contains("SSL") || error_msg.contains("TLS") {
        anyhow::anyhow!(
            "TLS/SSL error: Failed to establish secure connection.\n\
             Error: {}",
            error_msg
        )
    } else if error_msg.contains("no pg_hba.conf entry") {
        anyhow::anyhow!(
            "Access denied: No pg_hba.conf entry for host.\n\
             The database server is not configured to accept connections from your host.\n\
             Error: {}",
            error_msg
        )
    } else {
        anyhow::anyhow!("Failed to connect to database: {}", error_msg)
    }
}
