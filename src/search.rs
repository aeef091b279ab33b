//! Semantic session search.
//!
//! Embeds the query with the same embedder that built the index, scores
//! every stored vector by cosine similarity, and joins the best candidates
//! against the `sessions` table. The project filter is applied after the
//! join, so the engine over-fetches `limit × search.overfetch` candidates
//! to leave room for rows the filter drops.

use anyhow::{bail, Result};
use std::cmp::Ordering;

use crate::config::Config;
use crate::db;
use crate::embedding::{cosine_similarity, embed_query, Embedder};
use crate::models::{format_ts, truncate_chars, SearchHit};
use crate::store;
use crate::vectors::EmbeddingStore;

const HIT_FIRST_MESSAGE_CHARS: usize = 200;

/// Rank indexed sessions by similarity to `query`.
///
/// Returns an empty list when there is nothing to search: no index yet,
/// no vectors, a blank query, or `limit == 0`.
pub async fn search(
    config: &Config,
    embedder: &dyn Embedder,
    query: &str,
    limit: usize,
    project: Option<&str>,
) -> Result<Vec<SearchHit>> {
    if query.trim().is_empty() || limit == 0 {
        return Ok(Vec::new());
    }

    let Some(pool) = db::open_existing(config).await? else {
        return Ok(Vec::new());
    };

    let vectors = EmbeddingStore::load(&config.index.embeddings_path())?;
    if vectors.is_empty() {
        pool.close().await;
        return Ok(Vec::new());
    }

    if let Some(stored) = vectors.model.as_deref() {
        if stored != embedder.model_name() {
            tracing::warn!(
                stored,
                current = embedder.model_name(),
                "query embedder differs from the index model; scores may be meaningless"
            );
        }
    }

    let query_vec = embed_query(embedder, query).await?;
    if query_vec.len() != vectors.dims {
        pool.close().await;
        bail!(
            "query embedding has {} dimensions but the index holds {}-dimensional vectors; \
             run sync --force with the current embedding model",
            query_vec.len(),
            vectors.dims
        );
    }

    let mut scored: Vec<(&str, f32)> = vectors
        .iter()
        .map(|(id, v)| (id, cosine_similarity(&query_vec, v)))
        .collect();
    // Stable: equal scores keep store order.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(limit.saturating_mul(config.search.overfetch));

    let project_filter = project
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty());

    let mut hits = Vec::with_capacity(limit);
    for (session_id, score) in scored {
        let Some(row) = store::get_session(&pool, session_id).await? else {
            continue;
        };
        let s = row.summary;

        if let Some(ref needle) = project_filter {
            let matches = s
                .project_name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains(needle.as_str()));
            if !matches {
                continue;
            }
        }

        hits.push(SearchHit {
            message_count: s.message_count(),
            session_id: s.session_id,
            project: s.project_name,
            score: round3(score),
            summary: s.summaries.into_iter().next(),
            first_message: s
                .first_user_message
                .map(|m| truncate_chars(&m, HIT_FIRST_MESSAGE_CHARS)),
            start_time: s.start_time.as_ref().map(format_ts),
        });

        if hits.len() >= limit {
            break;
        }
    }

    pool.close().await;
    Ok(hits)
}

fn round3(score: f32) -> f32 {
    (score * 1000.0).round() / 1000.0
}

/// CLI entry point: runs a search and prints results to stdout.
pub async fn run_search(
    config: &Config,
    embedder: &dyn Embedder,
    query: &str,
    limit: Option<usize>,
    project: Option<&str>,
    json: bool,
) -> Result<()> {
    let limit = limit.unwrap_or(config.search.default_limit);
    let hits = search(config, embedder, query, limit, project).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        let date = hit
            .start_time
            .as_deref()
            .map(|t| t.chars().take(10).collect::<String>())
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{}. [{:.3}] {} / {}",
            i + 1,
            hit.score,
            hit.project.as_deref().unwrap_or("(unknown)"),
            hit.summary.as_deref().unwrap_or("(no summary)")
        );
        println!("    started: {}  messages: {}", date, hit.message_count);
        if let Some(ref first) = hit.first_message {
            println!("    first: \"{}\"", first.replace('\n', " ").trim());
        }
        println!("    id: {}", hit.session_id);
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_round_to_three_places() {
        assert_eq!(round3(0.123456), 0.123);
        assert_eq!(round3(0.9999), 1.0);
        assert_eq!(round3(-0.5004), -0.5);
    }
}
