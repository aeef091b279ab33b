//! Index build progress reporting.
//!
//! Reports observable progress during `sessions sync` so users see what is
//! being scanned and how much is left. Progress is emitted on **stderr** so
//! stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for an index build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildProgressEvent {
    /// Walking the projects directory. Total unknown.
    Scanning,
    /// `n` log files processed out of `total`.
    Indexing { n: u64, total: u64 },
    /// A batch of `count` texts is being sent to the embedder.
    Embedding { count: u64 },
}

/// Reports build progress. Implementations write to stderr (human or JSON).
pub trait BuildProgressReporter: Send + Sync {
    fn report(&self, event: BuildProgressEvent);
}

/// Human-friendly progress on stderr: "sync  indexing  1,234 / 5,000 sessions".
pub struct StderrProgress;

impl BuildProgressReporter for StderrProgress {
    fn report(&self, event: BuildProgressEvent) {
        let line = human_line(&event);
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

fn human_line(event: &BuildProgressEvent) -> String {
    match event {
        BuildProgressEvent::Scanning => "sync  scanning...\n".to_string(),
        BuildProgressEvent::Indexing { n, total } => format!(
            "sync  indexing  {} / {} sessions\n",
            format_number(*n),
            format_number(*total)
        ),
        BuildProgressEvent::Embedding { count } => {
            format!("sync  embedding  {} sessions\n", format_number(*count))
        }
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl BuildProgressReporter for JsonProgress {
    fn report(&self, event: BuildProgressEvent) {
        if let Ok(line) = serde_json::to_string(&json_event(&event)) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

fn json_event(event: &BuildProgressEvent) -> serde_json::Value {
    match event {
        BuildProgressEvent::Scanning => serde_json::json!({
            "event": "progress",
            "phase": "scanning"
        }),
        BuildProgressEvent::Indexing { n, total } => serde_json::json!({
            "event": "progress",
            "phase": "indexing",
            "n": n,
            "total": total
        }),
        BuildProgressEvent::Embedding { count } => serde_json::json!({
            "event": "progress",
            "phase": "embedding",
            "count": count
        }),
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl BuildProgressReporter for NoProgress {
    fn report(&self, _event: BuildProgressEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn BuildProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
