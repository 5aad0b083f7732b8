//! Canonical session model.
//!
//! Every platform adapter parses its native storage into these types and
//! every uploader/restorer consumes them, so nothing outside the adapter
//! boundary branches on platform identity.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum preview length in characters, before the ellipsis suffix.
pub const PREVIEW_MAX_CHARS: usize = 100;

/// The supported source platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "claude")]
    Claude,
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "q")]
    AmazonQ,
    #[serde(rename = "codex")]
    Codex,
}

impl Platform {
    /// Stable identifier used in flags, payloads, and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Claude => "claude",
            Platform::Gemini => "gemini",
            Platform::AmazonQ => "q",
            Platform::Codex => "codex",
        }
    }

    /// Human-readable name of the upstream tool.
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Claude => "Claude Code",
            Platform::Gemini => "Gemini CLI",
            Platform::AmazonQ => "Amazon Q CLI",
            Platform::Codex => "Codex CLI",
        }
    }

    /// All platforms in registration order.
    pub fn all() -> [Platform; 4] {
        [
            Platform::Claude,
            Platform::Gemini,
            Platform::AmazonQ,
            Platform::Codex,
        ]
    }

    pub fn from_id(id: &str) -> Option<Platform> {
        match id {
            "claude" => Some(Platform::Claude),
            "gemini" => Some(Platform::Gemini),
            "q" => Some(Platform::AmazonQ),
            "codex" => Some(Platform::Codex),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

/// A structured piece of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    ToolUse {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        name: String,
        input: Value,
    },
    ToolResult {
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_use_id: Option<String>,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

/// Message content: a plain string or a sequence of structured parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Flatten to plain text, ignoring tool invocations and results.
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// One entry in a canonical conversation. Source order is preserved exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Message {
    pub fn text(&self) -> String {
        self.content.text()
    }

    pub fn tool_call_count(&self) -> usize {
        match &self.content {
            MessageContent::Text(_) => 0,
            MessageContent::Parts(parts) => parts
                .iter()
                .filter(|p| matches!(p, ContentPart::ToolUse { .. }))
                .count(),
        }
    }
}

/// The conversation body. Which arm is populated is a function of the
/// platform, not a caller choice: `q` round-trips its nested turn history
/// raw because flattening loses fields the upstream tool needs on restore.
#[derive(Debug, Clone, PartialEq)]
pub enum Conversation {
    Messages(Vec<Message>),
    History(Vec<Value>),
}

impl Conversation {
    pub fn len(&self) -> usize {
        match self {
            Conversation::Messages(m) => m.len(),
            Conversation::History(h) => h.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The normalized unit every adapter produces and every uploader consumes.
#[derive(Debug, Clone)]
pub struct CanonicalSession {
    pub platform: Platform,
    pub conversation: Conversation,
    /// Native identifier, preserved for round-trip restore.
    pub session_id: Option<String>,
    /// Working directory the session was recorded in.
    pub cwd: Option<PathBuf>,
    /// Derived from the first real user message unless the caller overrides.
    pub title: Option<String>,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub is_private: bool,
    pub model_name: Option<String>,
    pub token_count: Option<u64>,
    /// Human-facing message count. Not necessarily `conversation.len()`:
    /// function-call/function-response records are excluded on some platforms.
    pub message_count: usize,
    /// Top-level native fields outside the turn history, preserved so
    /// `History` payloads can spread them wholesale.
    pub native_extras: Option<serde_json::Map<String, Value>>,
}

impl CanonicalSession {
    /// Skeleton with empty metadata; adapters fill in what they know.
    pub fn new(platform: Platform, conversation: Conversation) -> Self {
        let message_count = conversation.len();
        CanonicalSession {
            platform,
            conversation,
            session_id: None,
            cwd: None,
            title: None,
            summary: None,
            tags: Vec::new(),
            is_private: false,
            model_name: None,
            token_count: None,
            message_count,
            native_extras: None,
        }
    }
}

/// Where a session lives: a file, or a row in an external database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SessionLocator {
    File(PathBuf),
    DbRow { database: PathBuf, key: String },
}

impl fmt::Display for SessionLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionLocator::File(path) => write!(f, "{}", path.display()),
            SessionLocator::DbRow { database, key } => {
                write!(f, "{}#{key}", database.display())
            }
        }
    }
}

/// Lightweight listing projection. Built cheaply for directory scans of
/// many sessions; never holds full message bodies.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub locator: SessionLocator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_path: Option<PathBuf>,
    pub last_modified: DateTime<Utc>,
    pub message_count: usize,
    pub preview: String,
    pub platform: Platform,
}

/// Collapse all runs of whitespace (including newlines) to single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whitespace-collapsed preview, truncated to [`PREVIEW_MAX_CHARS`]
/// characters with an `...` suffix when truncated. Applied identically
/// regardless of source platform.
pub fn preview_text(text: &str) -> String {
    let collapsed = collapse_whitespace(text);
    if collapsed.chars().count() <= PREVIEW_MAX_CHARS {
        collapsed
    } else {
        let mut truncated: String = collapsed.chars().take(PREVIEW_MAX_CHARS).collect();
        truncated.push_str("...");
        truncated
    }
}

/// Preview of the first user message that is not a platform-injected
/// bootstrap/context message, per the platform's marker predicate.
pub fn first_real_user_preview<F>(messages: &[Message], is_bootstrap: F) -> String
where
    F: Fn(&str) -> bool,
{
    messages
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| m.text())
        .find(|text| !text.trim().is_empty() && !is_bootstrap(text))
        .map(|text| preview_text(&text))
        .unwrap_or_default()
}
