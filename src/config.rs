//! TOML configuration.
//!
//! Every section is optional. A missing config file yields [`Config::default`],
//! which points at the standard `~/.claude` layout.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub reader: ReaderConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Where session logs live and which files count as session logs.
#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    #[serde(default = "default_projects_dir")]
    pub projects_dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            projects_dir: default_projects_dir(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
        }
    }
}

fn claude_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".claude")
}

fn default_projects_dir() -> PathBuf {
    claude_home().join("projects")
}

fn default_include_globs() -> Vec<String> {
    vec!["*/*.jsonl".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
        }
    }
}

fn default_index_dir() -> PathBuf {
    claude_home().join("session-index")
}

impl IndexConfig {
    pub fn db_path(&self) -> PathBuf {
        self.dir.join("sessions.db")
    }

    pub fn embeddings_path(&self) -> PathBuf {
        self.dir.join("embeddings.bin")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ParserConfig {
    #[serde(default = "default_first_message_chars")]
    pub first_message_chars: usize,
    #[serde(default = "default_embed_text_chars")]
    pub embed_text_chars: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            first_message_chars: default_first_message_chars(),
            embed_text_chars: default_embed_text_chars(),
        }
    }
}

fn default_first_message_chars() -> usize {
    500
}
fn default_embed_text_chars() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReaderConfig {
    #[serde(default = "default_tool_result_chars")]
    pub tool_result_chars: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            tool_result_chars: default_tool_result_chars(),
        }
    }
}

fn default_tool_result_chars() -> usize {
    2000
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Candidates fetched per requested result, leaving room for post-filtering.
    #[serde(default = "default_overfetch")]
    pub overfetch: usize,
    #[serde(default = "default_search_limit")]
    pub default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            overfetch: default_overfetch(),
            default_limit: default_search_limit(),
        }
    }
}

fn default_overfetch() -> usize {
    2
}
fn default_search_limit() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

impl Config {
    /// Defaults rooted at explicit directories instead of `~/.claude`.
    pub fn with_dirs(projects_dir: impl Into<PathBuf>, index_dir: impl Into<PathBuf>) -> Self {
        let mut config = Config::default();
        config.sources.projects_dir = projects_dir.into();
        config.index.dir = index_dir.into();
        config
    }
}

/// `~/.claude/session-index/config.toml`, used when `--config` is not given.
pub fn default_config_path() -> PathBuf {
    default_index_dir().join("config.toml")
}

/// Load and validate a config file. A missing file is not an error.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.sources.projects_dir = expand_home(&config.sources.projects_dir);
    config.index.dir = expand_home(&config.index.dir);
    validate(&config)?;
    Ok(config)
}

/// Expand a leading `~/` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.search.overfetch == 0 {
        anyhow::bail!("search.overfetch must be >= 1");
    }
    if config.parser.embed_text_chars == 0 {
        anyhow::bail!("parser.embed_text_chars must be > 0");
    }
    if config.parser.first_message_chars == 0 {
        anyhow::bail!("parser.first_message_chars must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, local, openai, or ollama.",
            other
        ),
    }

    Ok(())
}
