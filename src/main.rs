//! # Session Index CLI (`sessions`)
//!
//! The `sessions` binary indexes conversation session logs and answers
//! semantic search, metadata, listing, and message-read queries over them.
//!
//! ## Usage
//!
//! ```bash
//! sessions [--config ./sessions.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sessions init` | Create the SQLite database and schema |
//! | `sessions sync` | Incrementally index new and changed session logs |
//! | `sessions search "<query>"` | Semantic search over indexed sessions |
//! | `sessions meta <id>` | Full metadata for one session |
//! | `sessions read <id>` | Filtered, sliced turns of one session |
//! | `sessions list` | Recent sessions, optionally by project |
//! | `sessions stats` | Index size, embedding coverage, per-project counts |
//! | `sessions serve` | Start the JSON HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! sessions sync --verbose
//! sessions search "jwt validation bug" --project api --limit 5
//! sessions read 3f2a... --type user --type assistant --last 20
//! sessions list --order-by message_count
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use session_index::config::{self, Config};
use session_index::embedding::{self, Embedder};
use session_index::index::{self, BuildOptions};
use session_index::models::{ListOrder, TurnKind};
use session_index::progress::ProgressMode;
use session_index::reader::ReadOptions;
use session_index::{list, meta, migrate, reader, search, server, stats};

/// Session Index: incremental indexing and semantic search over
/// conversation session logs.
#[derive(Parser)]
#[command(name = "sessions", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `~/.claude/session-index/config.toml`. A missing file
    /// means built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema. Idempotent.
    Init,

    /// Index new and changed session logs.
    ///
    /// Unchanged logs (same content hash) are skipped. Embeddings for
    /// indexed sessions are generated in one batch at the end.
    Sync {
        /// Re-index and re-embed everything, ignoring stored hashes.
        #[arg(long)]
        force: bool,

        /// Log progress and per-file failures.
        #[arg(long, short)]
        verbose: bool,

        /// Remove sessions whose log file no longer exists.
        #[arg(long)]
        prune: bool,

        /// Progress on stderr. Defaults to `human` on a TTY, `off` otherwise.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Semantic search over indexed sessions.
    Search {
        /// Natural-language query.
        query: String,

        /// Maximum results.
        #[arg(long)]
        limit: Option<usize>,

        /// Only sessions whose project name contains this (case-insensitive).
        #[arg(long)]
        project: Option<String>,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Full metadata for one session.
    Meta {
        session_id: String,

        #[arg(long)]
        json: bool,
    },

    /// Read the turns of one session.
    ///
    /// `--first` wins over `--last`; either wins over `--offset`/`--limit`.
    Read {
        session_id: String,

        /// Turn types to include (repeatable).
        #[arg(long = "type", value_enum)]
        types: Vec<TurnKind>,

        /// Tool names to include for tool_use turns (repeatable).
        #[arg(long = "tool")]
        tools: Vec<String>,

        #[arg(long)]
        first: Option<usize>,

        #[arg(long)]
        last: Option<usize>,

        #[arg(long, default_value_t = 0)]
        offset: usize,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// List indexed sessions, newest first.
    List {
        /// Only sessions whose project name contains this (case-insensitive).
        #[arg(long)]
        project: Option<String>,

        #[arg(long, default_value_t = 20)]
        limit: usize,

        #[arg(long, value_enum, default_value_t = ListOrder::StartTime)]
        order_by: ListOrder,

        #[arg(long)]
        json: bool,
    },

    /// Show index statistics.
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Start the JSON HTTP server on `[server].bind`.
    Serve,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_embedder(cfg: &Config) -> anyhow::Result<Box<dyn Embedder>> {
    embedding::create_embedder(&cfg.embedding)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Sync { verbose: true, .. });
    init_tracing(verbose);

    let config_path = cli.config.unwrap_or_else(config::default_config_path);
    let cfg = config::load_config(&config_path)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized at {}", cfg.index.db_path().display());
        }
        Commands::Sync {
            force,
            verbose,
            prune,
            progress,
        } => {
            let embedder = load_embedder(&cfg)?;
            let reporter = progress
                .unwrap_or_else(ProgressMode::default_for_tty)
                .reporter();
            let options = BuildOptions {
                force,
                verbose,
                prune,
            };
            index::run_sync(&cfg, embedder.as_ref(), options, reporter.as_ref()).await?;
        }
        Commands::Search {
            query,
            limit,
            project,
            json,
        } => {
            let embedder = load_embedder(&cfg)?;
            search::run_search(
                &cfg,
                embedder.as_ref(),
                &query,
                limit,
                project.as_deref(),
                json,
            )
            .await?;
        }
        Commands::Meta { session_id, json } => {
            meta::run_meta(&cfg, &session_id, json).await?;
        }
        Commands::Read {
            session_id,
            types,
            tools,
            first,
            last,
            offset,
            limit,
            json,
        } => {
            let options = ReadOptions {
                types: (!types.is_empty()).then_some(types),
                tools: (!tools.is_empty()).then_some(tools),
                first,
                last,
                offset,
                limit,
            };
            reader::run_read(&cfg, &session_id, &options, json).await?;
        }
        Commands::List {
            project,
            limit,
            order_by,
            json,
        } => {
            list::run_list(&cfg, project.as_deref(), limit, order_by, json).await?;
        }
        Commands::Stats { json } => {
            stats::run_stats(&cfg, json).await?;
        }
        Commands::Serve => {
            let embedder: Arc<dyn Embedder> = Arc::from(load_embedder(&cfg)?);
            server::run_server(&cfg, embedder).await?;
        }
    }

    Ok(())
}
