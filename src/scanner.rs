//! Session log discovery and content fingerprinting.

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::SourcesConfig;

const FINGERPRINT_CHUNK: usize = 64 * 1024;

/// One session log on disk. The file stem is the session id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub session_id: String,
    pub path: PathBuf,
}

/// Enumerate all session logs under `projects_dir`, sorted by path.
///
/// A missing root is treated as "no sessions yet".
pub fn scan_logs(config: &SourcesConfig) -> Result<Vec<LogFile>> {
    let root = &config.projects_dir;
    if !root.exists() {
        return Ok(Vec::new());
    }

    let include_set = build_globset(&config.include_globs)?;
    let exclude_set = build_globset(&config.exclude_globs)?;

    let mut logs = Vec::new();

    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        let Some(stem) = path.file_stem() else {
            continue;
        };

        logs.push(LogFile {
            session_id: stem.to_string_lossy().to_string(),
            path: path.to_path_buf(),
        });
    }

    // Sort for deterministic ordering
    logs.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(logs)
}

/// SHA-256 of the full file contents, lowercase hex.
///
/// Streams in fixed-size chunks so file size is not bounded by memory.
pub fn fingerprint(path: &Path) -> Result<String> {
    let file =
        File::open(path).with_context(|| format!("Failed to open for hashing: {}", path.display()))?;
    let mut reader = HashingReader::new(file);
    let mut buf = vec![0u8; FINGERPRINT_CHUNK];

    while reader
        .read(&mut buf)
        .with_context(|| format!("Failed to read for hashing: {}", path.display()))?
        > 0
    {}

    Ok(reader.finish())
}

/// Read adapter that feeds every byte it yields into SHA-256.
///
/// Lets a consumer fingerprint exactly the bytes it read, in the same pass.
pub struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
}

impl<R: Read> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    /// Lowercase hex digest of everything read so far.
    pub fn finish(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

/// `*` never crosses a path separator, so `*/*.jsonl` means exactly one
/// project directory deep.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .with_context(|| format!("Invalid glob pattern: {}", pattern))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
