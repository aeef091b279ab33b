//! Core data models used throughout the session index.
//!
//! These types describe the per-session summary records kept in SQLite,
//! the results returned by search/list/meta, and the transient
//! conversation turns produced by the reader.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

/// Tool name → number of invocations in a session.
pub type ToolCounts = BTreeMap<String, i64>;

/// Per-kind message counters for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCounts {
    pub user: i64,
    pub assistant: i64,
    pub tool_use: i64,
    pub tool_result: i64,
    pub thinking: i64,
    pub summary: i64,
}

/// Structured summary of one session log, as produced by the parser.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSummary {
    pub session_id: String,
    pub project_path: Option<String>,
    pub project_name: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub git_branch: Option<String>,
    pub counts: MessageCounts,
    pub tools: ToolCounts,
    pub summaries: Vec<String>,
    pub first_user_message: Option<String>,
    pub file_path: PathBuf,
}

impl SessionSummary {
    pub fn message_count(&self) -> i64 {
        self.counts.user + self.counts.assistant
    }

    /// Text fed to the embedding model: summaries in order, then the first
    /// user message, space-joined and truncated to `max_chars`.
    ///
    /// Empty when the session has neither.
    pub fn embedding_text(&self, max_chars: usize) -> String {
        let parts: Vec<&str> = self
            .summaries
            .iter()
            .map(|s| s.trim())
            .chain(self.first_user_message.as_deref().map(str::trim))
            .filter(|s| !s.is_empty())
            .collect();

        truncate_chars(&parts.join(" "), max_chars)
    }
}

/// A session row as stored in the metadata database.
#[derive(Debug, Clone)]
pub struct IndexedSession {
    pub summary: SessionSummary,
    pub file_hash: String,
    pub indexed_at: DateTime<Utc>,
    pub embed_text: String,
}

/// Full metadata for one session (the `meta` operation).
#[derive(Debug, Clone, Serialize)]
pub struct SessionMeta {
    pub session_id: String,
    pub project: Option<String>,
    pub project_path: Option<String>,
    pub git_branch: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub message_count: i64,
    pub message_counts: MessageCounts,
    pub summaries: Vec<String>,
    pub tools_used: ToolCounts,
    pub first_message: Option<String>,
    pub file_path: String,
    pub file_hash: String,
    pub indexed_at: String,
}

impl From<IndexedSession> for SessionMeta {
    fn from(row: IndexedSession) -> Self {
        let s = row.summary;
        SessionMeta {
            message_count: s.message_count(),
            session_id: s.session_id,
            project: s.project_name,
            project_path: s.project_path,
            git_branch: s.git_branch,
            start_time: s.start_time.as_ref().map(format_ts),
            end_time: s.end_time.as_ref().map(format_ts),
            message_counts: s.counts,
            summaries: s.summaries,
            tools_used: s.tools,
            first_message: s.first_user_message,
            file_path: s.file_path.display().to_string(),
            file_hash: row.file_hash,
            indexed_at: format_ts(&row.indexed_at),
        }
    }
}

/// One semantic search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub session_id: String,
    pub project: Option<String>,
    pub score: f32,
    pub summary: Option<String>,
    pub first_message: Option<String>,
    pub start_time: Option<String>,
    pub message_count: i64,
}

/// One row of a session listing.
#[derive(Debug, Clone, Serialize)]
pub struct SessionListing {
    pub session_id: String,
    pub project: Option<String>,
    pub start_time: Option<String>,
    pub message_count: i64,
    pub summary: Option<String>,
    pub first_message: Option<String>,
}

/// Sort key for session listings. Always descending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum ListOrder {
    #[default]
    StartTime,
    EndTime,
    MessageCount,
    IndexedAt,
}

impl ListOrder {
    pub fn column(&self) -> &'static str {
        match self {
            ListOrder::StartTime => "start_time",
            ListOrder::EndTime => "end_time",
            ListOrder::MessageCount => "message_count",
            ListOrder::IndexedAt => "indexed_at",
        }
    }
}

/// Kind of a conversation turn, used for read filtering.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum TurnKind {
    Summary,
    User,
    Assistant,
    Thinking,
    ToolUse,
    ToolResult,
}

impl FromStr for TurnKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "summary" => Ok(TurnKind::Summary),
            "user" => Ok(TurnKind::User),
            "assistant" => Ok(TurnKind::Assistant),
            "thinking" => Ok(TurnKind::Thinking),
            "tool_use" => Ok(TurnKind::ToolUse),
            "tool_result" => Ok(TurnKind::ToolResult),
            other => anyhow::bail!("invalid turn type: '{}'", other),
        }
    }
}

/// One event extracted from a session log at read time. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Turn {
    Summary {
        content: String,
    },
    User {
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
        content: String,
    },
    Assistant {
        content: String,
    },
    Thinking {
        content: String,
    },
    ToolUse {
        tool_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_use_id: Option<String>,
        input: serde_json::Value,
    },
    ToolResult {
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_use_id: Option<String>,
        content: String,
    },
}

impl Turn {
    pub fn kind(&self) -> TurnKind {
        match self {
            Turn::Summary { .. } => TurnKind::Summary,
            Turn::User { .. } => TurnKind::User,
            Turn::Assistant { .. } => TurnKind::Assistant,
            Turn::Thinking { .. } => TurnKind::Thinking,
            Turn::ToolUse { .. } => TurnKind::ToolUse,
            Turn::ToolResult { .. } => TurnKind::ToolResult,
        }
    }
}

/// RFC 3339 with fixed millisecond precision, so text order matches time order.
pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 timestamp; zone-less timestamps are taken as UTC.
pub fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Truncate to at most `max_chars` characters (not bytes).
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_text_from_single_summary() {
        let summary = SessionSummary {
            summaries: vec!["fix bug".to_string()],
            ..Default::default()
        };
        assert_eq!(summary.embedding_text(1000), "fix bug");
    }

    #[test]
    fn embedding_text_joins_summaries_then_first_message() {
        let summary = SessionSummary {
            summaries: vec!["Debug auth".to_string(), "Fix JWT".to_string()],
            first_user_message: Some("help me".to_string()),
            ..Default::default()
        };
        assert_eq!(summary.embedding_text(1000), "Debug auth Fix JWT help me");
        assert_eq!(summary.embedding_text(5), "Debug");
    }

    #[test]
    fn embedding_text_empty_without_text() {
        let summary = SessionSummary {
            summaries: vec!["".to_string()],
            ..Default::default()
        };
        assert_eq!(summary.embedding_text(1000), "");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn timestamps_format_with_fixed_precision() {
        let ts = parse_ts("2026-01-05T10:00:00Z").unwrap();
        assert_eq!(format_ts(&ts), "2026-01-05T10:00:00.000Z");
        assert!(parse_ts("yesterday").is_none());
        assert_eq!(parse_ts("2026-01-05T10:00:00.5"), parse_ts("2026-01-05T10:00:00.500Z"));
    }

    #[test]
    fn turn_serializes_with_type_tag() {
        let turn = Turn::ToolUse {
            tool_name: "Read".to_string(),
            tool_use_id: Some("t1".to_string()),
            input: serde_json::json!({"file_path": "/a"}),
        };
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["type"], "tool_use");
        assert_eq!(json["tool_name"], "Read");
        assert_eq!(turn.kind(), TurnKind::ToolUse);
    }

    #[test]
    fn turn_kind_parses_snake_case() {
        assert_eq!("tool_result".parse::<TurnKind>().unwrap(), TurnKind::ToolResult);
        assert!("tools".parse::<TurnKind>().is_err());
    }
}
