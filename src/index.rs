//! Incremental index build.
//!
//! Coordinates the full sync flow: scan → fingerprint → parse → upsert →
//! embed. Unchanged files (same content hash as the stored row) are skipped.
//! All row writes of one build share a single transaction; the embedding
//! store is loaded once, merged, and saved once after that commit.
//!
//! Failure handling:
//! - A file that cannot be read or parsed is counted in `errors` and keeps
//!   its previous row.
//! - Embedding failures are counted in `embeddings_failed`, never fatal.
//!   Rows remember their embedding text, so the next build finds the
//!   missing vectors and retries them.
//! - Two logs with the same file stem would fight over one row. The first
//!   by path wins; the others are counted in `errors`.
//! - Vectors from a different model never join the store. Without
//!   `force`, pending texts stay unembedded until a forced rebuild.

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};

use crate::config::Config;
use crate::db;
use crate::embedding::Embedder;
use crate::migrate::ensure_schema;
use crate::parser::parse_and_fingerprint;
use crate::progress::{BuildProgressEvent, BuildProgressReporter};
use crate::scanner::{fingerprint, scan_logs};
use crate::store;
use crate::vectors::EmbeddingStore;

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Re-parse and re-embed every session regardless of fingerprints.
    pub force: bool,
    /// Log per-file failures at warn instead of debug.
    pub verbose: bool,
    /// Delete rows and vectors whose source log no longer exists.
    pub prune: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    pub total: u64,
    pub indexed: u64,
    pub skipped: u64,
    pub errors: u64,
    pub embeddings_generated: u64,
    pub embeddings_failed: u64,
    pub pruned: u64,
}

/// Bring the index up to date with the session logs on disk.
pub async fn build_index(
    config: &Config,
    embedder: &dyn Embedder,
    options: BuildOptions,
    progress: &dyn BuildProgressReporter,
) -> Result<BuildStats> {
    let pool = db::connect(config).await?;
    ensure_schema(&pool).await?;

    let result = build_with_pool(&pool, config, embedder, options, progress).await;

    pool.close().await;
    result
}

async fn build_with_pool(
    pool: &SqlitePool,
    config: &Config,
    embedder: &dyn Embedder,
    options: BuildOptions,
    progress: &dyn BuildProgressReporter,
) -> Result<BuildStats> {
    let mut stats = BuildStats::default();

    let fingerprints = if options.force {
        HashMap::new()
    } else {
        store::load_fingerprints(pool).await?
    };
    let previous_texts = store::embed_texts(pool).await?;

    progress.report(BuildProgressEvent::Scanning);
    let logs = scan_logs(&config.sources)?;
    stats.total = logs.len() as u64;

    // Sessions whose embedding text is new or changed in this build.
    let mut changed: HashSet<String> = HashSet::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let now = Utc::now();

    let mut tx = pool.begin().await?;
    for (i, log) in logs.iter().enumerate() {
        progress.report(BuildProgressEvent::Indexing {
            n: i as u64 + 1,
            total: stats.total,
        });

        if !seen.insert(log.session_id.as_str()) {
            stats.errors += 1;
            tracing::warn!(
                session_id = %log.session_id,
                path = %log.path.display(),
                "duplicate session id; keeping the first log by path"
            );
            continue;
        }

        let hash = match fingerprint(&log.path) {
            Ok(h) => h,
            Err(e) => {
                stats.errors += 1;
                report_file_error(options.verbose, &log.session_id, &e);
                continue;
            }
        };

        let path_key = log.path.to_string_lossy();
        if fingerprints.get(&*path_key) == Some(&hash) {
            stats.skipped += 1;
            continue;
        }

        // Store the hash of the bytes actually parsed, which may differ from
        // the pre-check if the log is being appended to.
        let (summary, hash) = match parse_and_fingerprint(&log.path, &config.parser) {
            Ok(parsed) => parsed,
            Err(e) => {
                stats.errors += 1;
                report_file_error(options.verbose, &log.session_id, &e);
                continue;
            }
        };

        let text = summary.embedding_text(config.parser.embed_text_chars);
        store::upsert_session(&mut tx, &summary, &hash, now, &text).await?;
        stats.indexed += 1;
        tracing::info!(
            session_id = %summary.session_id,
            project = summary.project_name.as_deref().unwrap_or(""),
            messages = summary.message_count(),
            "indexed session"
        );

        if options.force || previous_texts.get(&summary.session_id) != Some(&text) {
            changed.insert(summary.session_id);
        }
    }
    tx.commit().await?;

    let mut pruned_ids = HashSet::new();
    if options.prune {
        pruned_ids = prune_missing(pool).await?;
        stats.pruned = pruned_ids.len() as u64;
    }

    embed_pending(config, pool, embedder, options, &changed, &pruned_ids, progress, &mut stats)
        .await?;

    tracing::info!(
        total = stats.total,
        indexed = stats.indexed,
        skipped = stats.skipped,
        errors = stats.errors,
        embedded = stats.embeddings_generated,
        "index build finished"
    );

    Ok(stats)
}

fn report_file_error(verbose: bool, session_id: &str, err: &anyhow::Error) {
    if verbose {
        tracing::warn!(session_id, error = %format!("{:#}", err), "failed to index session");
    } else {
        tracing::debug!(session_id, error = %format!("{:#}", err), "failed to index session");
    }
}

/// Delete rows whose source file is gone. Returns the removed ids.
async fn prune_missing(pool: &SqlitePool) -> Result<HashSet<String>> {
    let missing: Vec<String> = store::session_paths(pool)
        .await?
        .into_iter()
        .filter(|(_, path)| !path.exists())
        .map(|(id, _)| id)
        .collect();

    if missing.is_empty() {
        return Ok(HashSet::new());
    }

    let mut tx = pool.begin().await?;
    store::delete_sessions(&mut tx, &missing).await?;
    tx.commit().await?;

    for id in &missing {
        tracing::info!(session_id = %id, "pruned session with missing log");
    }
    Ok(missing.into_iter().collect())
}

/// Reconcile the embedding store with the committed rows, then embed
/// everything that needs a vector.
#[allow(clippy::too_many_arguments)]
async fn embed_pending(
    config: &Config,
    pool: &SqlitePool,
    embedder: &dyn Embedder,
    options: BuildOptions,
    changed: &HashSet<String>,
    pruned: &HashSet<String>,
    progress: &dyn BuildProgressReporter,
    stats: &mut BuildStats,
) -> Result<()> {
    let path = config.index.embeddings_path();
    let mut vectors = match EmbeddingStore::load(&path) {
        Ok(v) => v,
        Err(e) => {
            // Every row with text gets re-queued below, so starting over is safe.
            tracing::warn!(error = %format!("{:#}", e), "discarding unreadable embedding store");
            EmbeddingStore::default()
        }
    };
    let mut dirty = false;

    let texts = store::embed_texts(pool).await?;

    // Vectors with no row, or whose row no longer has text, are stale.
    let stale: HashSet<String> = vectors
        .ids()
        .filter(|id| {
            pruned.contains(*id) || texts.get(*id).map_or(true, |t| t.is_empty())
        })
        .map(String::from)
        .collect();
    if !stale.is_empty() {
        vectors.remove(&stale);
        dirty = true;
    }

    let mut compatible = !config.embedding.is_enabled() || is_compatible(&vectors, embedder);
    if !compatible && options.force {
        tracing::warn!(
            stored = vectors.model.as_deref().unwrap_or(""),
            current = embedder.model_name(),
            "embedding model changed; rebuilding all vectors"
        );
        vectors = EmbeddingStore::default();
        dirty = true;
        compatible = true;
    }

    let mut queue: Vec<(&String, &String)> = texts
        .iter()
        .filter(|(id, text)| {
            !text.is_empty() && (changed.contains(*id) || !vectors.contains(id))
        })
        .collect();
    queue.sort();

    if !queue.is_empty() && !config.embedding.is_enabled() {
        tracing::debug!(pending = queue.len(), "embedding disabled; vectors not generated");
        queue.clear();
    }

    // Queued rows with a vector changed text. Drop the old vector now so a
    // failed or skipped embed leaves them queued for the next build.
    let outdated: HashSet<String> = queue
        .iter()
        .filter(|(id, _)| vectors.contains(id))
        .map(|(id, _)| (*id).clone())
        .collect();
    if vectors.remove(&outdated) > 0 {
        dirty = true;
    }

    if !compatible {
        tracing::warn!(
            stored = vectors.model.as_deref().unwrap_or(""),
            stored_dims = vectors.dims,
            current = embedder.model_name(),
            pending = queue.len(),
            "embedding model differs from the one that built the index; run sync --force"
        );
        stats.embeddings_failed += queue.len() as u64;
        queue.clear();
    }

    if !queue.is_empty() {
        progress.report(BuildProgressEvent::Embedding {
            count: queue.len() as u64,
        });

        let queued_texts: Vec<String> = queue.iter().map(|(_, t)| (*t).clone()).collect();
        match embedder.embed(&queued_texts).await {
            Ok(vecs) if vecs.len() != queue.len() => {
                stats.embeddings_failed += queue.len() as u64;
                tracing::warn!(
                    expected = queue.len(),
                    got = vecs.len(),
                    "embedder returned the wrong number of vectors"
                );
            }
            Ok(vecs) if !fits(&vectors, embedder, &vecs) => {
                stats.embeddings_failed += queue.len() as u64;
                tracing::warn!(
                    stored_dims = vectors.dims,
                    "embedder returned vectors of an unexpected width"
                );
            }
            Ok(vecs) => {
                stats.embeddings_generated = vecs.len() as u64;
                vectors.merge(queue.iter().map(|(id, _)| (*id).clone()).zip(vecs));
                vectors.model = Some(embedder.model_name().to_string());
                dirty = true;
            }
            Err(e) => {
                stats.embeddings_failed += queue.len() as u64;
                tracing::warn!(
                    count = queue.len(),
                    error = %format!("{:#}", e),
                    "embedding failed; will retry on next sync"
                );
            }
        }
    }

    if dirty {
        vectors.save(&path)?;
    }

    Ok(())
}

/// Whether `embedder` produces vectors comparable with those in `store`.
fn is_compatible(store: &EmbeddingStore, embedder: &dyn Embedder) -> bool {
    if store.is_empty() {
        return true;
    }
    let same_model = store
        .model
        .as_deref()
        .map_or(true, |stored| stored == embedder.model_name());
    let same_width = embedder.dims().map_or(true, |d| d == store.dims);
    same_model && same_width
}

fn fits(store: &EmbeddingStore, embedder: &dyn Embedder, vecs: &[Vec<f32>]) -> bool {
    store.accepts(vecs)
        && embedder
            .dims()
            .map_or(true, |d| vecs.iter().all(|v| v.len() == d))
}

/// CLI entry point: builds the index and prints a summary to stdout.
pub async fn run_sync(
    config: &Config,
    embedder: &dyn Embedder,
    options: BuildOptions,
    progress: &dyn BuildProgressReporter,
) -> Result<()> {
    let stats = build_index(config, embedder, options, progress).await?;

    println!("sync sessions");
    println!("  found: {}", stats.total);
    println!("  indexed: {}", stats.indexed);
    println!("  skipped (unchanged): {}", stats.skipped);
    println!("  errors: {}", stats.errors);
    if config.embedding.is_enabled() {
        println!("  embeddings generated: {}", stats.embeddings_generated);
        println!("  embeddings failed: {}", stats.embeddings_failed);
    }
    if options.prune {
        println!("  pruned: {}", stats.pruned);
    }
    println!("ok");

    Ok(())
}
