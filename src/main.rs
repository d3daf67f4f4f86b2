//! rpg-inventory-store operator entry point.
//!
//! Loads configuration, bootstraps the MySQL schema when the relational
//! backend is enabled, and reports how many snapshots each table holds.

use tracing_subscriber::EnvFilter;

use rpg_inventory_store::config::StoreConfig;
use rpg_inventory_store::domain::{StoreEvent, Table};
use rpg_inventory_store::persistence::StoreClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    // Load configuration
    let config = StoreConfig::from_env()?;
    if !config.mysql_enabled {
        tracing::info!(
            dir = %config.snapshot_dir.display(),
            "MySQL disabled, snapshots are stored as files"
        );
        return Ok(());
    }

    let client = StoreClient::from_config(&config);
    let mut events = client.events().subscribe();
    tracing::info!(
        host = %config.mysql_host,
        port = config.mysql_port,
        database = %config.mysql_database,
        "starting relational store"
    );

    if !client.start().await {
        if let Ok(StoreEvent::Disabled { reason, .. }) = events.try_recv() {
            return Err(format!("relational store disabled: {reason}").into());
        }
        return Err("relational store unavailable".into());
    }

    for table in Table::ALL {
        match client.read_all(table).await {
            Ok(rows) => tracing::info!(%table, rows = rows.len(), "table ready"),
            Err(err) => tracing::warn!(%table, error = %err, "failed to read table"),
        }
    }

    client.stop().await;
    Ok(())
}
