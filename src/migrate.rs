use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the database file and schema (CLI `init`).
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    ensure_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Idempotent schema creation; safe to call on every build.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    // Composite fields (tool counts, summaries) are JSON blobs rather than child tables.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            session_id TEXT PRIMARY KEY,
            project_path TEXT,
            project_name TEXT,
            start_time TEXT,
            end_time TEXT,
            git_branch TEXT,
            message_count INTEGER NOT NULL DEFAULT 0,
            user_count INTEGER NOT NULL DEFAULT 0,
            assistant_count INTEGER NOT NULL DEFAULT 0,
            tool_use_count INTEGER NOT NULL DEFAULT 0,
            tool_result_count INTEGER NOT NULL DEFAULT 0,
            thinking_count INTEGER NOT NULL DEFAULT 0,
            summary_count INTEGER NOT NULL DEFAULT 0,
            tools_json TEXT NOT NULL DEFAULT '{}',
            summaries_json TEXT NOT NULL DEFAULT '[]',
            first_user_message TEXT,
            embed_text TEXT NOT NULL DEFAULT '',
            file_path TEXT NOT NULL,
            file_hash TEXT NOT NULL,
            indexed_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_project ON sessions(project_path)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_project_name ON sessions(project_name)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_start ON sessions(start_time DESC)")
        .execute(pool)
        .await?;

    Ok(())
}
