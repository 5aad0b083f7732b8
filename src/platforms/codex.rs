//! Codex CLI adapter: rollout JSONL files under `~/.codex/sessions/`.
//!
//! Sessions are nested in year/month/day directories:
//! `sessions/YYYY/MM/DD/rollout-<timestamp>-<uuid>.jsonl`. Two structural
//! generations exist. The current one wraps every record in a typed
//! envelope `{timestamp, type, payload}` (`session_meta`, `response_item`,
//! `event_msg`, ...); the older one writes a bare meta object first and
//! flat `{type: "message", ...}` items after it. Which decoding path to
//! use is decided from the first record's shape, never the filename.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::SyncError;
use crate::platforms::{mtime_to_datetime, Located, PlatformAdapter};
use crate::session::{
    first_real_user_preview, CanonicalSession, ContentPart, Conversation, Message,
    MessageContent, Platform, Role, SessionInfo, SessionLocator,
};

/// Wrappers Codex injects around synthetic context/instruction messages.
const BOOTSTRAP_MARKERS: [&str; 2] = ["<environment_context>", "<user_instructions>"];

/// Which structural generation a rollout file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Generation {
    /// Records are `{timestamp, type, payload}` envelopes.
    Envelope,
    /// A bare meta object followed by flat items.
    Flat,
}

/// Session-level fields pulled from the meta record.
#[derive(Debug, Default)]
struct RolloutMeta {
    id: Option<String>,
    cwd: Option<String>,
}

/// Adapter for Codex CLI rollout storage.
#[derive(Debug)]
pub struct CodexAdapter {
    sessions_dir: Option<PathBuf>,
}

impl CodexAdapter {
    pub fn new() -> Self {
        CodexAdapter {
            sessions_dir: dirs::home_dir().map(|h| h.join(".codex").join("sessions")),
        }
    }

    /// Adapter rooted at an explicit sessions directory. Used by tests.
    pub fn with_root(sessions_dir: PathBuf) -> Self {
        CodexAdapter {
            sessions_dir: Some(sessions_dir),
        }
    }

    /// All rollout files under the date tree, newest mtime first.
    fn rollout_files(&self) -> Vec<(PathBuf, std::time::SystemTime)> {
        let Some(root) = self.sessions_dir.as_ref() else {
            return Vec::new();
        };
        let mut files: Vec<(PathBuf, std::time::SystemTime)> = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_type().is_file()
                    && e.path().extension().and_then(|s| s.to_str()) == Some("jsonl")
            })
            .filter_map(|e| {
                let mtime = e.metadata().ok()?.modified().ok()?;
                Some((e.into_path(), mtime))
            })
            .collect();
        files.sort_by(|(path_a, mtime_a), (path_b, mtime_b)| {
            mtime_b.cmp(mtime_a).then_with(|| path_b.cmp(path_a))
        });
        files
    }

    fn read_records(path: &Path) -> Result<Vec<Value>> {
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let reader = BufReader::new(file);

        let mut records = Vec::new();
        for (line_num, line) in reader.lines().enumerate() {
            let Ok(line) = line else {
                continue;
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(&line) {
                Ok(value) => records.push(value),
                Err(e) => log::warn!(
                    "Skipping malformed line {} in {}: {e}",
                    line_num + 1,
                    path.display()
                ),
            }
        }
        Ok(records)
    }

    /// Decide the decoding path from the first record's shape.
    fn detect_generation(records: &[Value]) -> Option<Generation> {
        let first = records.first()?.as_object()?;
        if first.contains_key("payload") && first.contains_key("type") {
            Some(Generation::Envelope)
        } else {
            Some(Generation::Flat)
        }
    }

    fn decode(records: &[Value]) -> (RolloutMeta, Vec<Message>) {
        let mut meta = RolloutMeta::default();
        let mut messages = Vec::new();

        let Some(generation) = Self::detect_generation(records) else {
            return (meta, messages);
        };

        for record in records {
            match generation {
                Generation::Envelope => {
                    let record_type = record.get("type").and_then(Value::as_str);
                    let timestamp = record
                        .get("timestamp")
                        .and_then(Value::as_str)
                        .and_then(parse_rfc3339);
                    match record_type {
                        Some("session_meta") => {
                            if let Some(payload) = record.get("payload") {
                                merge_meta(&mut meta, payload);
                            }
                        }
                        Some("turn_context") => {
                            // Later turn contexts can update the cwd; keep
                            // the first observed value for session identity.
                            if meta.cwd.is_none() {
                                if let Some(payload) = record.get("payload") {
                                    merge_meta(&mut meta, payload);
                                }
                            }
                        }
                        Some("response_item") => {
                            if let Some(msg) =
                                record.get("payload").and_then(|p| item_to_message(p, timestamp))
                            {
                                messages.push(msg);
                            }
                        }
                        _ => {}
                    }
                }
                Generation::Flat => {
                    let obj = record.as_object();
                    let has_type = obj.map_or(false, |o| o.contains_key("type"));
                    if !has_type {
                        // The bare meta record leads the file.
                        merge_meta(&mut meta, record);
                    } else if let Some(msg) = item_to_message(record, None) {
                        messages.push(msg);
                    }
                }
            }
        }

        (meta, messages)
    }

    /// Read just enough of a rollout file to learn its working directory.
    fn head_cwd(path: &Path) -> Option<String> {
        let file = File::open(path).ok()?;
        let reader = BufReader::new(file);
        for line in reader.lines().map_while(|l| l.ok()).take(10) {
            let Ok(value) = serde_json::from_str::<Value>(&line) else {
                continue;
            };
            let candidate = value
                .get("payload")
                .and_then(|p| p.get("cwd"))
                .or_else(|| value.get("cwd"));
            if let Some(cwd) = candidate.and_then(Value::as_str) {
                return Some(cwd.to_string());
            }
        }
        None
    }

    fn info_from_file(&self, path: &Path) -> Result<SessionInfo> {
        let records = Self::read_records(path)?;
        if records.is_empty() {
            return Err(SyncError::NoSessionFound {
                platform: Platform::Codex.to_string(),
                scope: path.display().to_string(),
            }
            .into());
        }
        let (meta, messages) = Self::decode(&records);

        let mtime = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .with_context(|| format!("Failed to stat {}", path.display()))?;

        Ok(SessionInfo {
            id: meta.id.unwrap_or_else(|| {
                path.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            }),
            locator: SessionLocator::File(path.to_path_buf()),
            project_path: meta.cwd.map(PathBuf::from),
            last_modified: mtime_to_datetime(mtime),
            message_count: messages.len(),
            preview: first_real_user_preview(&messages, is_bootstrap_text),
            platform: Platform::Codex,
        })
    }
}

impl Default for CodexAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformAdapter for CodexAdapter {
    fn platform(&self) -> Platform {
        Platform::Codex
    }

    fn storage_root(&self) -> Option<PathBuf> {
        self.sessions_dir.clone()
    }

    fn locate_session(&self, dir: &Path) -> Result<Option<Located>> {
        let wanted = dir.to_string_lossy();
        for (path, _) in self.rollout_files() {
            if Self::head_cwd(&path).as_deref() == Some(wanted.as_ref()) {
                return Ok(Some(Located::Ready(SessionLocator::File(path))));
            }
        }
        Ok(None)
    }

    fn list_sessions(&self, project: Option<&Path>) -> Result<Vec<SessionInfo>> {
        let wanted = project.map(|p| p.to_string_lossy().to_string());
        let mut sessions = Vec::new();
        for (path, _) in self.rollout_files() {
            if let Some(wanted) = &wanted {
                // Cheap head check before a full read.
                if Self::head_cwd(&path).as_deref() != Some(wanted.as_str()) {
                    continue;
                }
            }
            match self.info_from_file(&path) {
                Ok(info) => sessions.push(info),
                Err(e) => log::warn!("Failed to read {}: {e}", path.display()),
            }
        }
        Ok(sessions)
    }

    fn parse_session(&self, locator: &SessionLocator) -> Result<CanonicalSession> {
        let SessionLocator::File(path) = locator else {
            anyhow::bail!("Codex sessions are file-backed, got {locator}");
        };

        let records = Self::read_records(path)?;
        if records.is_empty() {
            return Err(SyncError::NoSessionFound {
                platform: Platform::Codex.to_string(),
                scope: path.display().to_string(),
            }
            .into());
        }

        let (meta, messages) = Self::decode(&records);
        if messages.is_empty() {
            return Err(SyncError::NoSessionFound {
                platform: Platform::Codex.to_string(),
                scope: path.display().to_string(),
            }
            .into());
        }

        let message_count = messages.len();
        let title = {
            let preview = first_real_user_preview(&messages, is_bootstrap_text);
            if preview.is_empty() {
                None
            } else {
                Some(preview)
            }
        };

        let mut session =
            CanonicalSession::new(Platform::Codex, Conversation::Messages(messages));
        session.session_id = meta.id;
        session.cwd = meta.cwd.map(PathBuf::from);
        session.title = title;
        session.message_count = message_count;
        Ok(session)
    }

    fn probe(&self, path: &Path) -> bool {
        let Ok(file) = File::open(path) else {
            return false;
        };
        let reader = BufReader::new(file);
        let Some(first_line) = reader
            .lines()
            .map_while(|l| l.ok())
            .find(|l| !l.trim().is_empty())
        else {
            return false;
        };
        let Ok(value) = serde_json::from_str::<Value>(&first_line) else {
            return false;
        };
        let Some(obj) = value.as_object() else {
            return false;
        };

        let is_envelope = obj.contains_key("payload") && obj.contains_key("type");
        // Flat-generation meta: an id/timestamp header that is not a Claude
        // line (those carry sessionId/uuid).
        let is_flat_meta = obj.contains_key("id")
            && obj.contains_key("timestamp")
            && !obj.contains_key("sessionId")
            && !obj.contains_key("uuid");
        is_envelope || is_flat_meta
    }

    fn write_session(&self, session: &CanonicalSession, target_dir: &Path) -> Result<PathBuf> {
        let Conversation::Messages(messages) = &session.conversation else {
            anyhow::bail!("Cannot write a raw-history session as a Codex rollout");
        };

        let root = self
            .sessions_dir
            .as_ref()
            .context("Cannot determine the Codex sessions directory")?;

        let now = Utc::now();
        let day_dir = root.join(now.format("%Y/%m/%d").to_string());
        std::fs::create_dir_all(&day_dir)
            .with_context(|| format!("Failed to create {}", day_dir.display()))?;

        let session_id = uuid::Uuid::new_v4().to_string();
        let path = day_dir.join(format!(
            "rollout-{}-{session_id}.jsonl",
            now.format("%Y-%m-%dT%H-%M-%S")
        ));

        let now_iso = now.to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let mut file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;

        let meta = serde_json::json!({
            "timestamp": now_iso,
            "type": "session_meta",
            "payload": {
                "id": session_id,
                "timestamp": now_iso,
                "cwd": target_dir.to_string_lossy(),
                "originator": "agent-sync",
            }
        });
        writeln!(file, "{}", serde_json::to_string(&meta)?)?;

        for msg in messages {
            let timestamp = msg
                .timestamp
                .map(|ts| ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
                .unwrap_or_else(|| now_iso.clone());
            for payload in native_items(msg) {
                let record = serde_json::json!({
                    "timestamp": timestamp,
                    "type": "response_item",
                    "payload": payload,
                });
                writeln!(file, "{}", serde_json::to_string(&record)?)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
        }

        log::info!("Wrote {} messages to {}", messages.len(), path.display());
        Ok(path)
    }
}

/// Is this text a Codex-injected context/instruction wrapper?
pub fn is_bootstrap_text(text: &str) -> bool {
    let trimmed = text.trim_start();
    BOOTSTRAP_MARKERS.iter().any(|m| trimmed.starts_with(m))
}

fn parse_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn merge_meta(meta: &mut RolloutMeta, payload: &Value) {
    if meta.id.is_none() {
        meta.id = payload.get("id").and_then(Value::as_str).map(String::from);
    }
    if meta.cwd.is_none() {
        meta.cwd = payload.get("cwd").and_then(Value::as_str).map(String::from);
    }
}

/// Convert a response item (either generation uses the same item shapes)
/// into a canonical message, or `None` for non-conversational items.
fn item_to_message(item: &Value, timestamp: Option<DateTime<Utc>>) -> Option<Message> {
    match item.get("type").and_then(Value::as_str)? {
        "message" => {
            let role = match item.get("role").and_then(Value::as_str)? {
                "assistant" => Role::Assistant,
                "system" | "developer" => Role::System,
                _ => Role::User,
            };
            let parts: Vec<ContentPart> = item
                .get("content")
                .and_then(Value::as_array)?
                .iter()
                .filter_map(|block| {
                    let kind = block.get("type").and_then(Value::as_str)?;
                    if !matches!(kind, "input_text" | "output_text" | "text") {
                        return None;
                    }
                    Some(ContentPart::Text {
                        text: block.get("text").and_then(Value::as_str)?.to_string(),
                    })
                })
                .collect();
            Some(Message {
                role,
                content: MessageContent::Parts(parts),
                timestamp,
                model: None,
            })
        }
        "function_call" => {
            let arguments = item
                .get("arguments")
                .map(|a| match a {
                    // Arguments arrive JSON-encoded inside a string.
                    Value::String(s) => {
                        serde_json::from_str(s).unwrap_or(Value::String(s.clone()))
                    }
                    other => other.clone(),
                })
                .unwrap_or(Value::Null);
            Some(Message {
                role: Role::Assistant,
                content: MessageContent::Parts(vec![ContentPart::ToolUse {
                    id: item
                        .get("call_id")
                        .and_then(Value::as_str)
                        .map(String::from),
                    name: item
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown")
                        .to_string(),
                    input: arguments,
                }]),
                timestamp,
                model: None,
            })
        }
        "function_call_output" => Some(Message {
            role: Role::Tool,
            content: MessageContent::Parts(vec![ContentPart::ToolResult {
                tool_use_id: item
                    .get("call_id")
                    .and_then(Value::as_str)
                    .map(String::from),
                content: match item.get("output") {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                },
                is_error: false,
            }]),
            timestamp,
            model: None,
        }),
        _ => None,
    }
}

/// Serialize a canonical message back into response-item payloads.
fn native_items(msg: &Message) -> Vec<Value> {
    let role = match msg.role {
        Role::Assistant => "assistant",
        Role::System => "system",
        _ => "user",
    };
    let text_kind = if msg.role == Role::Assistant {
        "output_text"
    } else {
        "input_text"
    };

    let mut items = Vec::new();
    let mut text_blocks = Vec::new();

    let parts: Vec<ContentPart> = match &msg.content {
        MessageContent::Text(s) => vec![ContentPart::Text { text: s.clone() }],
        MessageContent::Parts(parts) => parts.clone(),
    };

    for part in parts {
        match part {
            ContentPart::Text { text } => {
                text_blocks.push(serde_json::json!({"type": text_kind, "text": text}));
            }
            ContentPart::ToolUse { id, name, input } => {
                items.push(serde_json::json!({
                    "type": "function_call",
                    "name": name,
                    "arguments": input.to_string(),
                    "call_id": id.unwrap_or_default(),
                }));
            }
            ContentPart::ToolResult {
                tool_use_id,
                content,
                ..
            } => {
                items.push(serde_json::json!({
                    "type": "function_call_output",
                    "call_id": tool_use_id.unwrap_or_default(),
                    "output": content,
                }));
            }
        }
    }

    if !text_blocks.is_empty() || items.is_empty() {
        items.insert(
            0,
            serde_json::json!({
                "type": "message",
                "role": role,
                "content": text_blocks,
            }),
        );
    }

    items
}
