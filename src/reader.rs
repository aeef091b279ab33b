//! Message-level access to a session log.
//!
//! The index only stores summaries; reading a conversation re-streams the
//! raw log and projects each record into [`Turn`]s, then filters and
//! slices them. The index is consulted only to resolve id → file path.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::config::Config;
use crate::db;
use crate::models::{truncate_chars, Turn, TurnKind};
use crate::records::{self, ContentBlock, LogRecord, MessageContent};
use crate::store;

/// Filtering and slicing for [`read_session`].
///
/// `first` wins over `last`, and either wins over `offset`/`limit`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    /// Turn kinds to keep. `None` keeps all kinds.
    pub types: Option<Vec<TurnKind>>,
    /// Tool names to keep. Applies to `tool_use` turns only.
    pub tools: Option<Vec<String>>,
    pub first: Option<usize>,
    pub last: Option<usize>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl ReadOptions {
    fn keeps(&self, turn: &Turn) -> bool {
        if let Some(ref types) = self.types {
            if !types.contains(&turn.kind()) {
                return false;
            }
        }
        match (turn, &self.tools) {
            (Turn::ToolUse { tool_name, .. }, Some(tools)) => tools.iter().any(|t| t == tool_name),
            _ => true,
        }
    }

    fn window(&self) -> Window {
        if let Some(n) = self.first {
            Window::First { n, taken: Vec::new() }
        } else if let Some(n) = self.last {
            Window::Last { n, ring: VecDeque::new() }
        } else {
            Window::Range {
                skip: self.offset,
                limit: self.limit,
                taken: Vec::new(),
            }
        }
    }
}

/// Incremental slicer. `push` reports whether more input can still change the result.
enum Window {
    First { n: usize, taken: Vec<Turn> },
    Last { n: usize, ring: VecDeque<Turn> },
    Range { skip: usize, limit: Option<usize>, taken: Vec<Turn> },
}

impl Window {
    fn is_full(&self) -> bool {
        match self {
            Window::First { n, taken } => taken.len() >= *n,
            Window::Last { .. } => false,
            Window::Range { limit, taken, .. } => limit.is_some_and(|l| taken.len() >= l),
        }
    }

    fn push(&mut self, turn: Turn) -> bool {
        match self {
            Window::First { taken, .. } => taken.push(turn),
            Window::Last { n, ring } => {
                if *n > 0 {
                    if ring.len() == *n {
                        ring.pop_front();
                    }
                    ring.push_back(turn);
                }
            }
            Window::Range { skip, taken, .. } => {
                if *skip > 0 {
                    *skip -= 1;
                } else {
                    taken.push(turn);
                }
            }
        }
        !self.is_full()
    }

    fn into_turns(self) -> Vec<Turn> {
        match self {
            Window::First { taken, .. } | Window::Range { taken, .. } => taken,
            Window::Last { ring, .. } => ring.into(),
        }
    }
}

/// Turns of one session, filtered and sliced by `options`.
///
/// Unknown ids, a missing index, and a missing log file all yield an
/// empty list.
pub async fn read_session(config: &Config, session_id: &str, options: &ReadOptions) -> Result<Vec<Turn>> {
    let Some(pool) = db::open_existing(config).await? else {
        return Ok(Vec::new());
    };
    let row = store::get_session(&pool, session_id).await?;
    pool.close().await;

    let Some(row) = row else {
        return Ok(Vec::new());
    };
    let path = row.summary.file_path;
    if !path.exists() {
        return Ok(Vec::new());
    }

    read_turns(&path, options, config.reader.tool_result_chars)
}

/// Stream `path` into turns. Stops reading once the slice is settled.
pub fn read_turns(path: &Path, options: &ReadOptions, tool_result_chars: usize) -> Result<Vec<Turn>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open session log: {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let mut window = options.window();
    if window.is_full() {
        return Ok(Vec::new());
    }

    let mut line = Vec::new();
    let mut turns = Vec::new();
    'lines: loop {
        line.clear();
        let n = reader
            .read_until(b'\n', &mut line)
            .with_context(|| format!("Failed to read session log: {}", path.display()))?;
        if n == 0 {
            break;
        }
        let Some(record) = records::decode_line(&line) else {
            continue;
        };

        turns.clear();
        project(record, tool_result_chars, &mut turns);
        for turn in turns.drain(..) {
            if options.keeps(&turn) && !window.push(turn) {
                break 'lines;
            }
        }
    }

    Ok(window.into_turns())
}

/// Expand one record into zero or more turns, in block order.
fn project(record: LogRecord, tool_result_chars: usize, out: &mut Vec<Turn>) {
    match record {
        LogRecord::Summary { summary } => out.push(Turn::Summary {
            content: summary.unwrap_or_default(),
        }),
        LogRecord::User(user) => {
            let timestamp = user.timestamp;
            match user.message.content {
                Some(MessageContent::Text(content)) => out.push(Turn::User { timestamp, content }),
                Some(content @ MessageContent::Blocks(_)) => {
                    for block in content.blocks() {
                        match block {
                            ContentBlock::Text { text: Some(text) } => out.push(Turn::User {
                                timestamp: timestamp.clone(),
                                content: text.clone(),
                            }),
                            ContentBlock::ToolResult { tool_use_id, content } => {
                                out.push(Turn::ToolResult {
                                    timestamp: timestamp.clone(),
                                    tool_use_id: tool_use_id.clone(),
                                    content: truncate_chars(
                                        &records::tool_result_text(content),
                                        tool_result_chars,
                                    ),
                                })
                            }
                            _ => {}
                        }
                    }
                }
                None => {}
            }
        }
        LogRecord::Assistant(asst) => match asst.message.content {
            Some(MessageContent::Text(content)) => out.push(Turn::Assistant { content }),
            Some(content @ MessageContent::Blocks(_)) => {
                for block in content.blocks() {
                    match block {
                        ContentBlock::Text { text: Some(text) } => out.push(Turn::Assistant {
                            content: text.clone(),
                        }),
                        ContentBlock::Thinking {
                            thinking: Some(thinking),
                        } => out.push(Turn::Thinking {
                            content: thinking.clone(),
                        }),
                        ContentBlock::ToolUse { id, name, input } => out.push(Turn::ToolUse {
                            tool_name: name.clone().unwrap_or_else(|| "unknown".to_string()),
                            tool_use_id: id.clone(),
                            input: input.clone(),
                        }),
                        _ => {}
                    }
                }
            }
            None => {}
        },
        LogRecord::Other => {}
    }
}

/// CLI entry point: reads a session and prints its turns to stdout.
pub async fn run_read(config: &Config, session_id: &str, options: &ReadOptions, json: bool) -> Result<()> {
    let turns = read_session(config, session_id, options).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&turns)?);
        return Ok(());
    }

    if turns.is_empty() {
        println!("No messages.");
        return Ok(());
    }

    for turn in &turns {
        match turn {
            Turn::Summary { content } => println!("[summary] {}", content),
            Turn::User { timestamp, content } => match timestamp {
                Some(ts) => println!("[user {}] {}", ts, content),
                None => println!("[user] {}", content),
            },
            Turn::Assistant { content } => println!("[assistant] {}", content),
            Turn::Thinking { content } => println!("[thinking] {}", content),
            Turn::ToolUse { tool_name, input, .. } => println!("[tool_use {}] {}", tool_name, input),
            Turn::ToolResult { content, .. } => println!("[tool_result] {}", content),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const LOG: &[&str] = &[
        r#"{"type":"summary","summary":"Refactor parser"}"#,
        r#"{"type":"user","message":{"content":"please refactor"},"timestamp":"2026-01-05T10:00:00Z"}"#,
        r#"{"type":"assistant","message":{"content":[{"type":"thinking","thinking":"plan"},{"type":"text","text":"reading files"},{"type":"tool_use","id":"t1","name":"Read","input":{"file_path":"/a.rs"}}]}}"#,
        r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t1","content":"fn main() {}"}]},"timestamp":"2026-01-05T10:00:05Z"}"#,
        r#"not json at all"#,
        r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"t2","name":"Edit","input":{}}]}}"#,
        r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t2","content":[{"type":"text","text":"ok"}]}]}}"#,
        r#"{"type":"assistant","message":{"content":[{"type":"text","text":"done"}]}}"#,
    ];

    fn log_file(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("s.jsonl");
        let mut f = File::create(&path).unwrap();
        for line in LOG {
            writeln!(f, "{}", line).unwrap();
        }
        path
    }

    fn kinds(turns: &[Turn]) -> Vec<TurnKind> {
        turns.iter().map(Turn::kind).collect()
    }

    #[test]
    fn projects_all_turns_in_order() {
        let dir = TempDir::new().unwrap();
        let turns = read_turns(&log_file(&dir), &ReadOptions::default(), 2000).unwrap();
        assert_eq!(
            kinds(&turns),
            vec![
                TurnKind::Summary,
                TurnKind::User,
                TurnKind::Thinking,
                TurnKind::Assistant,
                TurnKind::ToolUse,
                TurnKind::ToolResult,
                TurnKind::ToolUse,
                TurnKind::ToolResult,
                TurnKind::Assistant,
            ]
        );
        assert_eq!(
            turns[1],
            Turn::User {
                timestamp: Some("2026-01-05T10:00:00Z".to_string()),
                content: "please refactor".to_string()
            }
        );
    }

    #[test]
    fn type_and_tool_filters() {
        let dir = TempDir::new().unwrap();
        let options = ReadOptions {
            types: Some(vec![TurnKind::ToolUse, TurnKind::ToolResult]),
            tools: Some(vec!["Edit".to_string()]),
            ..Default::default()
        };
        let turns = read_turns(&log_file(&dir), &options, 2000).unwrap();
        // The tool filter leaves tool results alone.
        assert_eq!(
            kinds(&turns),
            vec![TurnKind::ToolResult, TurnKind::ToolUse, TurnKind::ToolResult]
        );
        assert!(matches!(&turns[1], Turn::ToolUse { tool_name, .. } if tool_name == "Edit"));
    }

    #[test]
    fn first_beats_last_and_offset() {
        let dir = TempDir::new().unwrap();
        let path = log_file(&dir);
        let options = ReadOptions {
            first: Some(2),
            last: Some(1),
            offset: 5,
            limit: Some(1),
            ..Default::default()
        };
        let turns = read_turns(&path, &options, 2000).unwrap();
        assert_eq!(kinds(&turns), vec![TurnKind::Summary, TurnKind::User]);

        let options = ReadOptions {
            last: Some(2),
            offset: 1,
            ..Default::default()
        };
        let turns = read_turns(&path, &options, 2000).unwrap();
        assert_eq!(kinds(&turns), vec![TurnKind::ToolResult, TurnKind::Assistant]);
    }

    #[test]
    fn offset_and_limit() {
        let dir = TempDir::new().unwrap();
        let path = log_file(&dir);
        let options = ReadOptions {
            offset: 2,
            limit: Some(3),
            ..Default::default()
        };
        let turns = read_turns(&path, &options, 2000).unwrap();
        assert_eq!(
            kinds(&turns),
            vec![TurnKind::Thinking, TurnKind::Assistant, TurnKind::ToolUse]
        );

        let past_end = ReadOptions {
            offset: 100,
            ..Default::default()
        };
        assert!(read_turns(&path, &past_end, 2000).unwrap().is_empty());

        let zero = ReadOptions {
            first: Some(0),
            ..Default::default()
        };
        assert!(read_turns(&path, &zero, 2000).unwrap().is_empty());
    }

    #[test]
    fn tool_results_are_truncated_and_stringified() {
        let dir = TempDir::new().unwrap();
        let options = ReadOptions {
            types: Some(vec![TurnKind::ToolResult]),
            ..Default::default()
        };
        let turns = read_turns(&log_file(&dir), &options, 4).unwrap();
        assert_eq!(
            turns[0],
            Turn::ToolResult {
                timestamp: Some("2026-01-05T10:00:05Z".to_string()),
                tool_use_id: Some("t1".to_string()),
                content: "fn m".to_string(),
            }
        );
        assert!(matches!(&turns[1], Turn::ToolResult { content, .. } if content == "[{\"t"));
    }
}
