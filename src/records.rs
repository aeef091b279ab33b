//! Typed view of one session log line.
//!
//! Each JSONL line is a record tagged by `type`. Decoding is lenient:
//! missing fields default to absent, unknown record types and unknown
//! content blocks decode to catch-all variants instead of failing.

use serde::de::IgnoredAny;
use serde::Deserialize;

/// One line of a session log.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogRecord {
    Summary {
        #[serde(default)]
        summary: Option<String>,
    },
    User(UserRecord),
    Assistant(AssistantRecord),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(default)]
    pub message: Message,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub git_branch: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssistantRecord {
    #[serde(default)]
    pub message: Message,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub content: Option<MessageContent>,
}

/// `message.content` is either a plain string or an ordered list of blocks.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<LenientBlock>),
}

/// A content block, or anything else that happens to sit in the list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LenientBlock {
    Known(ContentBlock),
    Unknown(IgnoredAny),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        #[serde(default)]
        text: Option<String>,
    },
    Thinking {
        #[serde(default)]
        thinking: Option<String>,
    },
    ToolUse {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        input: serde_json::Value,
    },
    ToolResult {
        #[serde(default)]
        tool_use_id: Option<String>,
        #[serde(default)]
        content: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

impl MessageContent {
    /// Known blocks in order; a plain string content yields none.
    pub fn blocks(&self) -> impl Iterator<Item = &ContentBlock> {
        let blocks: &[LenientBlock] = match self {
            MessageContent::Text(_) => &[],
            MessageContent::Blocks(blocks) => blocks,
        };
        blocks.iter().filter_map(|b| match b {
            LenientBlock::Known(block) => Some(block),
            LenientBlock::Unknown(_) => None,
        })
    }
}

/// Decode one raw line. Blank or malformed lines yield `None`.
pub fn decode_line(line: &[u8]) -> Option<LogRecord> {
    let trimmed = line.trim_ascii();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_slice(trimmed).ok()
}

/// Render a `tool_result` content value as display text.
pub fn tool_result_text(content: &serde_json::Value) -> String {
    match content {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `Some(s)` only when `s` has non-whitespace content.
pub fn non_blank(s: Option<&String>) -> Option<&str> {
    s.map(String::as_str).filter(|s| !s.trim().is_empty())
}
