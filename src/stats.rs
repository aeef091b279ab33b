//! Index statistics and health overview.
//!
//! Provides a quick summary of what's indexed: session counts, embedding
//! coverage, and per-project breakdowns. The two drift counters
//! (`orphan_vectors`, `missing_vectors`) are zero after a successful build
//! with a working embedder.

use anyhow::Result;
use serde::Serialize;
use sqlx::Row;
use std::collections::HashMap;

use crate::config::Config;
use crate::db;
use crate::store;
use crate::vectors::EmbeddingStore;

#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexStats {
    pub db_path: String,
    pub db_bytes: u64,
    pub embeddings_path: String,
    pub embeddings_bytes: u64,
    pub model: Option<String>,
    pub sessions: i64,
    /// Sessions with non-empty embedding text.
    pub embeddable: i64,
    pub vectors: usize,
    /// Vectors with no session row.
    pub orphan_vectors: usize,
    /// Sessions with embedding text but no vector.
    pub missing_vectors: usize,
    pub projects: Vec<ProjectStats>,
}

/// Per-project breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectStats {
    pub project: String,
    pub sessions: i64,
    pub messages: i64,
    pub last_start: Option<String>,
}

/// Gather counts from both stores. A missing index reports zeros.
pub async fn stats(config: &Config) -> Result<IndexStats> {
    let db_path = config.index.db_path();
    let embeddings_path = config.index.embeddings_path();

    let mut out = IndexStats {
        db_bytes: file_size(&db_path),
        embeddings_bytes: file_size(&embeddings_path),
        db_path: db_path.display().to_string(),
        embeddings_path: embeddings_path.display().to_string(),
        ..Default::default()
    };

    let vectors = EmbeddingStore::load(&embeddings_path)?;
    out.model = vectors.model.clone();
    out.vectors = vectors.len();

    let Some(pool) = db::open_existing(config).await? else {
        out.orphan_vectors = vectors.len();
        return Ok(out);
    };

    out.sessions = store::count_sessions(&pool).await?;

    let texts: HashMap<String, String> = store::embed_texts(&pool).await?;
    out.embeddable = texts.values().filter(|t| !t.is_empty()).count() as i64;
    out.orphan_vectors = vectors.ids().filter(|id| !texts.contains_key(*id)).count();
    out.missing_vectors = texts
        .iter()
        .filter(|(id, text)| !text.is_empty() && !vectors.contains(id))
        .count();

    let rows = sqlx::query(
        r#"
        SELECT
            COALESCE(project_name, '(unknown)') AS project,
            COUNT(*) AS sessions,
            COALESCE(SUM(message_count), 0) AS messages,
            MAX(start_time) AS last_start
        FROM sessions
        GROUP BY COALESCE(project_name, '(unknown)')
        ORDER BY sessions DESC, project ASC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    out.projects = rows
        .iter()
        .map(|row| ProjectStats {
            project: row.get("project"),
            sessions: row.get("sessions"),
            messages: row.get("messages"),
            last_start: row.get("last_start"),
        })
        .collect();

    pool.close().await;
    Ok(out)
}

fn file_size(path: &std::path::Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Run the stats command: gather counts and print a summary.
pub async fn run_stats(config: &Config, json: bool) -> Result<()> {
    let s = stats(config).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&s)?);
        return Ok(());
    }

    println!("Session Index — Stats");
    println!("=====================");
    println!();
    println!("  Database:    {} ({})", s.db_path, format_bytes(s.db_bytes));
    println!(
        "  Embeddings:  {} ({})",
        s.embeddings_path,
        format_bytes(s.embeddings_bytes)
    );
    println!("  Model:       {}", s.model.as_deref().unwrap_or("-"));
    println!();
    println!("  Sessions:    {}", s.sessions);
    println!(
        "  Embedded:    {} / {} ({}%)",
        s.vectors - s.orphan_vectors,
        s.embeddable,
        if s.embeddable > 0 {
            ((s.vectors - s.orphan_vectors) as i64 * 100) / s.embeddable
        } else {
            0
        }
    );
    if s.orphan_vectors > 0 || s.missing_vectors > 0 {
        println!(
            "  Drift:       {} orphan vectors, {} missing vectors (run sync to repair)",
            s.orphan_vectors, s.missing_vectors
        );
    }

    if !s.projects.is_empty() {
        println!();
        println!("  By project:");
        println!(
            "  {:<28} {:>8} {:>9}   {}",
            "PROJECT", "SESSIONS", "MESSAGES", "LAST STARTED"
        );
        println!("  {}", "-".repeat(72));
        for p in &s.projects {
            println!(
                "  {:<28} {:>8} {:>9}   {}",
                p.project,
                p.sessions,
                p.messages,
                p.last_start
                    .as_deref()
                    .map(|t| t.chars().take(16).collect::<String>().replace('T', " "))
                    .unwrap_or_else(|| "never".to_string())
            );
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
