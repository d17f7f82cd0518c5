//! SQLite persistence for the sale ledger.
//!
//! One append-only table; every completed exit lands here so PnL history
//! survives restarts.

pub mod sale_ledger;

use crate::domain::errors::LedgerError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

pub type DbPool = SqlitePool;

/// Open (creating if missing) the ledger database and ensure its schema.
pub async fn init_database(database_url: &str) -> Result<DbPool, LedgerError> {
    info!(database_url, "initializing sale ledger");

    if let Some(db_path) = database_url
        .strip_prefix("sqlite://")
        .map(|p| p.split('?').next().unwrap_or(p))
    {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LedgerError::Connection(e.to_string()))?;
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| LedgerError::Connection(e.to_string()))?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| LedgerError::Connection(e.to_string()))?;

    ensure_schema(&pool).await?;
    Ok(pool)
}

pub(crate) async fn ensure_schema(pool: &DbPool) -> Result<(), LedgerError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sales (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            executed_at DATETIME NOT NULL,
            symbol TEXT NOT NULL,
            quantity REAL NOT NULL,
            entry_cost REAL NOT NULL,
            proceeds REAL NOT NULL,
            fees REAL NOT NULL,
            pnl REAL NOT NULL,
            pnl_pct REAL NOT NULL,
            reason TEXT NOT NULL,
            synced INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| LedgerError::Query(e.to_string()))?;
    Ok(())
}
