use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::Config;

/// Open (creating if needed) the metadata database.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = config.index.db_path();

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Open the metadata database only if it already exists.
///
/// Read paths use this so that querying before the first build never
/// creates files on disk.
pub async fn open_existing(config: &Config) -> Result<Option<SqlitePool>> {
    let db_path = config.index.db_path();
    if !db_path.exists() {
        return Ok(None);
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(false);

    let pool = SqlitePoolOptions::new()
        .max_connections(2)
        .connect_with(options)
        .await?;

    let has_table: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='sessions'",
    )
    .fetch_one(&pool)
    .await?;

    if !has_table {
        pool.close().await;
        return Ok(None);
    }

    Ok(Some(pool))
}
