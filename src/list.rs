//! Session listing, newest first by default.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::models::{format_ts, truncate_chars, ListOrder, SessionListing};
use crate::store;

const LISTING_FIRST_MESSAGE_CHARS: usize = 150;

/// Indexed sessions ordered descending by `order`, optionally restricted to
/// projects whose name contains `project` (case-insensitive).
pub async fn list(
    config: &Config,
    project: Option<&str>,
    limit: usize,
    order: ListOrder,
) -> Result<Vec<SessionListing>> {
    let Some(pool) = db::open_existing(config).await? else {
        return Ok(Vec::new());
    };
    let project = project.map(str::trim).filter(|p| !p.is_empty());
    let rows = store::list_sessions(&pool, project, order, limit).await?;
    pool.close().await;

    Ok(rows
        .into_iter()
        .map(|row| {
            let s = row.summary;
            SessionListing {
                message_count: s.message_count(),
                session_id: s.session_id,
                project: s.project_name,
                start_time: s.start_time.as_ref().map(format_ts),
                summary: s.summaries.into_iter().next(),
                first_message: s
                    .first_user_message
                    .map(|m| truncate_chars(&m, LISTING_FIRST_MESSAGE_CHARS)),
            }
        })
        .collect())
}

/// CLI entry point: prints a session table to stdout.
pub async fn run_list(
    config: &Config,
    project: Option<&str>,
    limit: usize,
    order: ListOrder,
    json: bool,
) -> Result<()> {
    let sessions = list(config, project, limit, order).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("No sessions indexed.");
        return Ok(());
    }

    println!(
        "{:<38} {:<20} {:<17} {:>5}  {}",
        "SESSION", "PROJECT", "STARTED", "MSGS", "SUMMARY"
    );
    for s in &sessions {
        let started = s
            .start_time
            .as_deref()
            .map(|t| t.chars().take(16).collect::<String>().replace('T', " "))
            .unwrap_or_else(|| "-".to_string());
        let label = s
            .summary
            .as_deref()
            .or(s.first_message.as_deref())
            .unwrap_or("")
            .replace('\n', " ");
        println!(
            "{:<38} {:<20} {:<17} {:>5}  {}",
            s.session_id,
            s.project.as_deref().unwrap_or("-"),
            started,
            s.message_count,
            truncate_chars(&label, 80)
        );
    }

    Ok(())
}
