//! # Session Index
//!
//! Incremental indexing and semantic search over append-only conversation
//! session logs.
//!
//! Each session log (`<projects>/<project>/<session>.jsonl`) is summarized
//! into one row of a SQLite table, and its summaries plus first user
//! message are embedded into a parallel vector store. Search ranks the
//! vectors by cosine similarity and joins back to the table; reading a
//! conversation re-streams the raw log.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │ Session     │──▶│ Index       │──▶│ sessions.db  │
//! │ logs (JSONL)│   │ Builder     │   │ embeddings   │
//! └──────┬──────┘   └─────────────┘   └──────┬───────┘
//!        │                                   │
//!        │          ┌────────────────────────┤
//!        ▼          ▼                        ▼
//!   ┌──────────────────┐              ┌──────────────┐
//!   │ Message Reader   │              │ Search       │
//!   └──────────────────┘              └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! sessions sync                        # index new and changed logs
//! sessions search "flaky websocket test"
//! sessions read <id> --type user --first 5
//! sessions serve                       # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`records`] | Typed view of one log line |
//! | [`scanner`] | Log discovery and fingerprinting |
//! | [`parser`] | Log → session summary |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`store`] | `sessions` table access |
//! | [`vectors`] | Persisted embedding store |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Incremental index build |
//! | [`search`] | Semantic search |
//! | [`reader`] | Message reads |
//! | [`meta`] | Session metadata lookup |
//! | [`list`] | Session listing |
//! | [`stats`] | Index statistics |
//! | [`progress`] | Build progress reporting |
//! | [`server`] | JSON HTTP server |

pub mod config;
pub mod db;
pub mod embedding;
pub mod index;
pub mod list;
pub mod meta;
pub mod migrate;
pub mod models;
pub mod parser;
pub mod progress;
pub mod reader;
pub mod records;
pub mod scanner;
pub mod search;
pub mod server;
pub mod stats;
pub mod store;
pub mod vectors;
