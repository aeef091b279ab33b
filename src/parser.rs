//! Session log → [`SessionSummary`].
//!
//! Streams the file one line at a time and folds every decodable record
//! into an accumulator. Parsing never fails on content: malformed lines are
//! skipped, and a file with no usable lines produces an all-empty summary.
//! Only I/O errors surface.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::config::ParserConfig;
use crate::models::{parse_ts, truncate_chars, SessionSummary};
use crate::records::{self, ContentBlock, LogRecord, MessageContent, UserRecord};
use crate::scanner::HashingReader;

/// Parse one session log file into its summary record.
pub fn parse_session_file(path: &Path, config: &ParserConfig) -> Result<SessionSummary> {
    let file =
        File::open(path).with_context(|| format!("Failed to open session log: {}", path.display()))?;
    parse_lines(BufReader::new(file), path, config)
}

/// Parse a session log and fingerprint the bytes that were parsed.
///
/// One read serves both, so a log appended to mid-build never gets a hash
/// that covers more or less than the stored summary.
pub fn parse_and_fingerprint(path: &Path, config: &ParserConfig) -> Result<(SessionSummary, String)> {
    let file =
        File::open(path).with_context(|| format!("Failed to open session log: {}", path.display()))?;
    let mut reader = BufReader::new(HashingReader::new(file));
    let summary = parse_lines(&mut reader, path, config)?;
    Ok((summary, reader.into_inner().finish()))
}

fn parse_lines<R: BufRead>(mut reader: R, path: &Path, config: &ParserConfig) -> Result<SessionSummary> {
    let session_id = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut acc = Accumulator::new(session_id, config.first_message_chars);
    let mut line = Vec::new();

    loop {
        line.clear();
        let n = reader
            .read_until(b'\n', &mut line)
            .with_context(|| format!("Failed to read session log: {}", path.display()))?;
        if n == 0 {
            break;
        }
        if let Some(record) = records::decode_line(&line) {
            acc.push(record);
        }
    }

    let mut summary = acc.finish();
    summary.file_path = path.to_path_buf();
    Ok(summary)
}

struct Accumulator {
    summary: SessionSummary,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    first_message_chars: usize,
}

impl Accumulator {
    fn new(session_id: String, first_message_chars: usize) -> Self {
        Self {
            summary: SessionSummary {
                session_id,
                ..Default::default()
            },
            start: None,
            end: None,
            first_message_chars,
        }
    }

    fn push(&mut self, record: LogRecord) {
        match record {
            LogRecord::Summary { summary } => {
                self.summary.summaries.push(summary.unwrap_or_default());
                self.summary.counts.summary += 1;
            }
            LogRecord::User(user) => self.push_user(user),
            LogRecord::Assistant(asst) => {
                self.summary.counts.assistant += 1;
                let Some(content) = asst.message.content else {
                    return;
                };
                for block in content.blocks() {
                    match block {
                        ContentBlock::ToolUse { name, .. } => {
                            self.summary.counts.tool_use += 1;
                            let name = name.clone().unwrap_or_else(|| "unknown".to_string());
                            *self.summary.tools.entry(name).or_insert(0) += 1;
                        }
                        ContentBlock::Thinking { .. } => self.summary.counts.thinking += 1,
                        _ => {}
                    }
                }
            }
            LogRecord::Other => {}
        }
    }

    fn push_user(&mut self, user: UserRecord) {
        self.summary.counts.user += 1;

        if let Some(ts) = user.timestamp.as_deref().and_then(parse_ts) {
            if self.start.map_or(true, |s| ts < s) {
                self.start = Some(ts);
            }
            if self.end.map_or(true, |e| ts > e) {
                self.end = Some(ts);
            }
        }

        // First non-empty value wins for both.
        if self.summary.git_branch.is_none() {
            self.summary.git_branch = records::non_blank(user.git_branch.as_ref()).map(String::from);
        }
        if self.summary.project_path.is_none() {
            self.summary.project_path = records::non_blank(user.cwd.as_ref()).map(String::from);
        }

        match &user.message.content {
            Some(MessageContent::Text(text)) => self.offer_first_message(text),
            Some(content @ MessageContent::Blocks(_)) => {
                for block in content.blocks() {
                    match block {
                        ContentBlock::ToolResult { .. } => self.summary.counts.tool_result += 1,
                        ContentBlock::Text { text: Some(text) } => self.offer_first_message(text),
                        _ => {}
                    }
                }
            }
            None => {}
        }
    }

    fn offer_first_message(&mut self, text: &str) {
        if self.summary.first_user_message.is_none() && !text.trim().is_empty() {
            self.summary.first_user_message = Some(truncate_chars(text, self.first_message_chars));
        }
    }

    fn finish(mut self) -> SessionSummary {
        self.summary.start_time = self.start;
        self.summary.end_time = self.end;
        self.summary.project_name = self.summary.project_path.as_deref().and_then(project_name);
        self.summary
    }
}

/// Display name for a project: the last component of its working directory.
fn project_name(project_path: &str) -> Option<String> {
    Path::new(project_path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_log(dir: &TempDir, name: &str, lines: &[&str]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        for line in lines {
            writeln!(f, "{}", line).unwrap();
        }
        path
    }

    fn parse(path: &Path) -> SessionSummary {
        parse_session_file(path, &ParserConfig::default()).unwrap()
    }

    #[test]
    fn user_and_assistant_text() {
        let dir = TempDir::new().unwrap();
        let path = write_log(
            &dir,
            "s1.jsonl",
            &[
                r#"{"type":"user","message":{"role":"user","content":"hello"},"timestamp":"2026-01-05T10:00:00Z"}"#,
                r#"{"type":"assistant","message":{"content":[{"type":"text","text":"hi"}]}}"#,
            ],
        );
        let s = parse(&path);
        assert_eq!(s.session_id, "s1");
        assert_eq!(s.counts.user, 1);
        assert_eq!(s.counts.assistant, 1);
        assert_eq!(s.counts.tool_use, 0);
        assert_eq!(s.first_user_message.as_deref(), Some("hello"));
        assert_eq!(s.message_count(), 2);
    }

    #[test]
    fn counts_tools_per_block() {
        let dir = TempDir::new().unwrap();
        let path = write_log(
            &dir,
            "s2.jsonl",
            &[r#"{"type":"assistant","message":{"content":[
                {"type":"tool_use","id":"a","name":"Read","input":{}},
                {"type":"tool_use","id":"b","name":"Read","input":{}},
                {"type":"thinking","thinking":"hmm"},
                {"type":"tool_use","id":"c","name":"Edit","input":{}}]}}"#
                .replace('\n', "")
                .as_str()],
        );
        let s = parse(&path);
        assert_eq!(s.counts.tool_use, 3);
        assert_eq!(s.counts.thinking, 1);
        assert_eq!(s.counts.assistant, 1);
        assert_eq!(s.tools.get("Read"), Some(&2));
        assert_eq!(s.tools.get("Edit"), Some(&1));
        assert_eq!(s.tools.len(), 2);
    }

    #[test]
    fn time_range_and_first_wins_fields() {
        let dir = TempDir::new().unwrap();
        let path = write_log(
            &dir,
            "s3.jsonl",
            &[
                r#"{"type":"summary","summary":"Debug authentication flow"}"#,
                r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t1","content":"ok"}]},"timestamp":"2026-01-05T10:05:00Z","cwd":"","gitBranch":""}"#,
                r#"{"type":"user","message":{"content":"Fix the JWT validation"},"timestamp":"2026-01-05T10:00:00Z","cwd":"/work/alpha","gitBranch":"main"}"#,
                r#"{"type":"user","message":{"content":"thanks"},"timestamp":"2026-01-05T10:09:00Z","cwd":"/work/beta","gitBranch":"dev"}"#,
            ],
        );
        let s = parse(&path);
        assert_eq!(s.start_time, parse_ts("2026-01-05T10:00:00Z"));
        assert_eq!(s.end_time, parse_ts("2026-01-05T10:09:00Z"));
        assert_eq!(s.git_branch.as_deref(), Some("main"));
        assert_eq!(s.project_path.as_deref(), Some("/work/alpha"));
        assert_eq!(s.project_name.as_deref(), Some("alpha"));
        assert_eq!(s.first_user_message.as_deref(), Some("Fix the JWT validation"));
        assert_eq!(s.counts.tool_result, 1);
        assert_eq!(s.counts.user, 3);
        assert_eq!(s.summaries, vec!["Debug authentication flow"]);
        assert_eq!(
            s.embedding_text(1000),
            "Debug authentication flow Fix the JWT validation"
        );
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = write_log(
            &dir,
            "s4.jsonl",
            &[
                "{{{ not json",
                r#"{"type":"user","message":{"content":"still counted"}}"#,
                "",
                r#"{"type":"user","timestamp":42}"#,
            ],
        );
        let s = parse(&path);
        assert_eq!(s.counts.user, 1);
        assert_eq!(s.first_user_message.as_deref(), Some("still counted"));
    }

    #[test]
    fn empty_file_yields_empty_record() {
        let dir = TempDir::new().unwrap();
        let path = write_log(&dir, "empty.jsonl", &[]);
        let s = parse(&path);
        assert_eq!(s.session_id, "empty");
        assert_eq!(s.counts, Default::default());
        assert!(s.start_time.is_none());
        assert!(s.project_name.is_none());
        assert!(s.first_user_message.is_none());
        assert_eq!(s.embedding_text(1000), "");
    }

    #[test]
    fn first_message_is_truncated() {
        let dir = TempDir::new().unwrap();
        let long = "x".repeat(800);
        let line = format!(r#"{{"type":"user","message":{{"content":"{}"}}}}"#, long);
        let path = write_log(&dir, "long.jsonl", &[&line]);
        let s = parse(&path);
        assert_eq!(s.first_user_message.map(|m| m.len()), Some(500));
    }

    #[test]
    fn non_utf8_lines_do_not_fail_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bin.jsonl");
        let mut f = File::create(&path).unwrap();
        f.write_all(b"\xff\xfe garbage\n").unwrap();
        f.write_all(br#"{"type":"summary","summary":"ok"}"#).unwrap();
        drop(f);
        let s = parse(&path);
        assert_eq!(s.summaries, vec!["ok"]);
    }

    #[test]
    fn fingerprint_covers_the_parsed_bytes() {
        let dir = TempDir::new().unwrap();
        let path = write_log(
            &dir,
            "fp.jsonl",
            &[
                r#"{"type":"summary","summary":"Planner work"}"#,
                r#"{"type":"user","message":{"content":"tune it"}}"#,
            ],
        );
        let (summary, hash) = parse_and_fingerprint(&path, &ParserConfig::default()).unwrap();
        assert_eq!(summary, parse(&path));
        assert_eq!(hash, crate::scanner::fingerprint(&path).unwrap());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(parse_session_file(&dir.path().join("nope.jsonl"), &ParserConfig::default()).is_err());
    }
}
