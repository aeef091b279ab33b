//! Session metadata lookup by id.
//!
//! Used by both the `sessions meta` CLI command and `POST /tools/meta`.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::db;
use crate::models::SessionMeta;
use crate::store;

/// Full metadata for one session, or `None` if it is not indexed.
pub async fn meta(config: &Config, session_id: &str) -> Result<Option<SessionMeta>> {
    let Some(pool) = db::open_existing(config).await? else {
        return Ok(None);
    };
    let row = store::get_session(&pool, session_id).await?;
    pool.close().await;

    Ok(row.map(SessionMeta::from))
}

/// CLI entry point: prints one session's metadata to stdout.
pub async fn run_meta(config: &Config, session_id: &str, json: bool) -> Result<()> {
    let Some(meta) = meta(config, session_id).await? else {
        bail!("session not found: {}", session_id);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&meta)?);
        return Ok(());
    }

    println!("--- Session ---");
    println!("id:           {}", meta.session_id);
    println!("project:      {}", meta.project.as_deref().unwrap_or("(unknown)"));
    if let Some(ref path) = meta.project_path {
        println!("project_path: {}", path);
    }
    if let Some(ref branch) = meta.git_branch {
        println!("git_branch:   {}", branch);
    }
    println!("start_time:   {}", meta.start_time.as_deref().unwrap_or("-"));
    println!("end_time:     {}", meta.end_time.as_deref().unwrap_or("-"));
    let c = &meta.message_counts;
    println!(
        "messages:     {} (user {}, assistant {}, tool_use {}, tool_result {}, thinking {})",
        meta.message_count, c.user, c.assistant, c.tool_use, c.tool_result, c.thinking
    );
    println!("file:         {}", meta.file_path);
    println!("indexed_at:   {}", meta.indexed_at);
    println!();

    if !meta.summaries.is_empty() {
        println!("--- Summaries ({}) ---", meta.summaries.len());
        for summary in &meta.summaries {
            println!("- {}", summary);
        }
        println!();
    }

    if !meta.tools_used.is_empty() {
        let mut tools: Vec<(&String, &i64)> = meta.tools_used.iter().collect();
        tools.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        println!("--- Tools ---");
        for (name, count) in tools {
            println!("{:<20} {}", name, count);
        }
        println!();
    }

    if let Some(ref first) = meta.first_message {
        println!("--- First message ---");
        println!("{}", first);
    }

    Ok(())
}
