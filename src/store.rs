//! Row-level access to the `sessions` table.
//!
//! One row per session, replaced wholesale on every re-index. Composite
//! fields (tool counts, summaries) are stored as JSON text and decoded
//! here; timestamps are RFC 3339 text from [`format_ts`].

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::models::{
    format_ts, parse_ts, IndexedSession, ListOrder, MessageCounts, SessionSummary,
};

const SESSION_COLUMNS: &str = "session_id, project_path, project_name, start_time, end_time, \
     git_branch, user_count, assistant_count, tool_use_count, tool_result_count, thinking_count, \
     summary_count, tools_json, summaries_json, first_user_message, embed_text, file_path, \
     file_hash, indexed_at";

/// Insert or fully replace the row for `summary.session_id`.
pub async fn upsert_session(
    conn: &mut SqliteConnection,
    summary: &SessionSummary,
    file_hash: &str,
    indexed_at: DateTime<Utc>,
    embed_text: &str,
) -> Result<()> {
    let tools_json = serde_json::to_string(&summary.tools)?;
    let summaries_json = serde_json::to_string(&summary.summaries)?;
    let counts = &summary.counts;

    sqlx::query(
        r#"
        INSERT INTO sessions (
            session_id, project_path, project_name, start_time, end_time, git_branch,
            message_count, user_count, assistant_count, tool_use_count, tool_result_count,
            thinking_count, summary_count, tools_json, summaries_json, first_user_message,
            embed_text, file_path, file_hash, indexed_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(session_id) DO UPDATE SET
            project_path = excluded.project_path,
            project_name = excluded.project_name,
            start_time = excluded.start_time,
            end_time = excluded.end_time,
            git_branch = excluded.git_branch,
            message_count = excluded.message_count,
            user_count = excluded.user_count,
            assistant_count = excluded.assistant_count,
            tool_use_count = excluded.tool_use_count,
            tool_result_count = excluded.tool_result_count,
            thinking_count = excluded.thinking_count,
            summary_count = excluded.summary_count,
            tools_json = excluded.tools_json,
            summaries_json = excluded.summaries_json,
            first_user_message = excluded.first_user_message,
            embed_text = excluded.embed_text,
            file_path = excluded.file_path,
            file_hash = excluded.file_hash,
            indexed_at = excluded.indexed_at
        "#,
    )
    .bind(&summary.session_id)
    .bind(&summary.project_path)
    .bind(&summary.project_name)
    .bind(summary.start_time.as_ref().map(format_ts))
    .bind(summary.end_time.as_ref().map(format_ts))
    .bind(&summary.git_branch)
    .bind(summary.message_count())
    .bind(counts.user)
    .bind(counts.assistant)
    .bind(counts.tool_use)
    .bind(counts.tool_result)
    .bind(counts.thinking)
    .bind(counts.summary)
    .bind(tools_json)
    .bind(summaries_json)
    .bind(&summary.first_user_message)
    .bind(embed_text)
    .bind(summary.file_path.to_string_lossy().to_string())
    .bind(file_hash)
    .bind(format_ts(&indexed_at))
    .execute(&mut *conn)
    .await
    .with_context(|| format!("Failed to upsert session {}", summary.session_id))?;

    Ok(())
}

/// Point lookup by session id.
pub async fn get_session(pool: &SqlitePool, session_id: &str) -> Result<Option<IndexedSession>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM sessions WHERE session_id = ?",
        SESSION_COLUMNS
    ))
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    row.map(|r| decode_row(&r)).transpose()
}

/// Sessions ordered descending by `order`, optionally restricted to project
/// names containing `project` (case-insensitive).
pub async fn list_sessions(
    pool: &SqlitePool,
    project: Option<&str>,
    order: ListOrder,
    limit: usize,
) -> Result<Vec<IndexedSession>> {
    // The ORDER BY column comes from a closed enum, never from input.
    let sql = format!(
        "SELECT {} FROM sessions \
         WHERE (?1 IS NULL OR instr(lower(coalesce(project_name, '')), lower(?1)) > 0) \
         ORDER BY {} DESC, session_id ASC LIMIT ?2",
        SESSION_COLUMNS,
        order.column()
    );

    let rows = sqlx::query(&sql)
        .bind(project)
        .bind(limit as i64)
        .fetch_all(pool)
        .await?;

    rows.iter().map(decode_row).collect()
}

/// `file_path → file_hash` for every indexed session.
pub async fn load_fingerprints(pool: &SqlitePool) -> Result<HashMap<String, String>> {
    let rows = sqlx::query("SELECT file_path, file_hash FROM sessions")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|r| (r.get("file_path"), r.get("file_hash")))
        .collect())
}

/// `session_id → embed_text` for every row (text may be empty).
pub async fn embed_texts(pool: &SqlitePool) -> Result<HashMap<String, String>> {
    let rows = sqlx::query("SELECT session_id, embed_text FROM sessions")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|r| (r.get("session_id"), r.get("embed_text")))
        .collect())
}

/// `(session_id, file_path)` for every row.
pub async fn session_paths(pool: &SqlitePool) -> Result<Vec<(String, PathBuf)>> {
    let rows = sqlx::query("SELECT session_id, file_path FROM sessions ORDER BY session_id")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|r| {
            let path: String = r.get("file_path");
            (r.get("session_id"), PathBuf::from(path))
        })
        .collect())
}

/// Delete rows by id. Returns the number of rows removed.
pub async fn delete_sessions(conn: &mut SqliteConnection, session_ids: &[String]) -> Result<u64> {
    let mut removed = 0;
    for id in session_ids {
        removed += sqlx::query("DELETE FROM sessions WHERE session_id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?
            .rows_affected();
    }
    Ok(removed)
}

pub async fn count_sessions(pool: &SqlitePool) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
        .fetch_one(pool)
        .await?)
}

fn decode_row(row: &SqliteRow) -> Result<IndexedSession> {
    let session_id: String = row.get("session_id");
    let tools_json: String = row.get("tools_json");
    let summaries_json: String = row.get("summaries_json");
    let start_time: Option<String> = row.get("start_time");
    let end_time: Option<String> = row.get("end_time");
    let indexed_at: String = row.get("indexed_at");
    let file_path: String = row.get("file_path");

    let tools = serde_json::from_str(&tools_json)
        .with_context(|| format!("Invalid tools_json for session {}", session_id))?;
    let summaries = serde_json::from_str(&summaries_json)
        .with_context(|| format!("Invalid summaries_json for session {}", session_id))?;
    let indexed_at = parse_ts(&indexed_at)
        .with_context(|| format!("Invalid indexed_at for session {}", session_id))?;

    Ok(IndexedSession {
        summary: SessionSummary {
            project_path: row.get("project_path"),
            project_name: row.get("project_name"),
            start_time: start_time.as_deref().and_then(parse_ts),
            end_time: end_time.as_deref().and_then(parse_ts),
            git_branch: row.get("git_branch"),
            counts: MessageCounts {
                user: row.get("user_count"),
                assistant: row.get("assistant_count"),
                tool_use: row.get("tool_use_count"),
                tool_result: row.get("tool_result_count"),
                thinking: row.get("thinking_count"),
                summary: row.get("summary_count"),
            },
            tools,
            summaries,
            first_user_message: row.get("first_user_message"),
            file_path: PathBuf::from(file_path),
            session_id,
        },
        file_hash: row.get("file_hash"),
        indexed_at,
        embed_text: row.get("embed_text"),
    })
}
