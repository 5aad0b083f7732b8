//! Gemini CLI adapter: JSON checkpoint files under `~/.gemini/tmp/`.
//!
//! The Gemini CLI only persists a conversation when the user runs
//! `/chat save <tag>`, producing `checkpoint-<tag>.json` (or plain
//! `checkpoint.json`) inside a project directory named by the SHA-256 hash
//! of the working directory. A whole session is one JSON array of
//! `{role, parts}` records. Because saves are explicit, the most recent
//! checkpoint can be stale relative to the live conversation; the locator
//! reports that instead of silently proceeding.

use anyhow::{Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::error::SyncError;
use crate::platforms::{
    files_with_mtime, latest_by_mtime, mtime_to_datetime, Located, PlatformAdapter,
};
use crate::session::{
    first_real_user_preview, CanonicalSession, ContentPart, Conversation, Message,
    MessageContent, Platform, Role, SessionInfo, SessionLocator,
};

/// Checkpoints older than this trip the freshness gate.
pub const STALENESS_THRESHOLD: Duration = Duration::from_secs(10 * 60);

/// Opening phrase of the context preamble the CLI injects at session start.
const CONTEXT_MARKER: &str = "This is the Gemini CLI. We are setting up the context";

/// The preamble encodes the working directory in free text after this phrase.
const CWD_PATTERN: &str = "I'm currently working in the directory: ";

/// Adapter for Gemini CLI checkpoint storage.
#[derive(Debug)]
pub struct GeminiAdapter {
    tmp_dir: Option<PathBuf>,
}

impl GeminiAdapter {
    pub fn new() -> Self {
        GeminiAdapter {
            tmp_dir: dirs::home_dir().map(|h| h.join(".gemini").join("tmp")),
        }
    }

    /// Adapter rooted at an explicit tmp directory. Used by tests.
    pub fn with_root(tmp_dir: PathBuf) -> Self {
        GeminiAdapter {
            tmp_dir: Some(tmp_dir),
        }
    }

    /// Gemini's cwd → storage-directory scheme: lowercase hex SHA-256 of
    /// the absolute path string. One-way, so listings recover the project
    /// path from checkpoint content rather than the directory name.
    pub fn project_hash(cwd: &Path) -> String {
        let mut hasher = Sha256::new();
        hasher.update(cwd.to_string_lossy().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn project_dir_for(&self, cwd: &Path) -> Option<PathBuf> {
        self.tmp_dir
            .as_ref()
            .map(|root| root.join(Self::project_hash(cwd)))
    }

    fn checkpoint_candidates(dir: &Path) -> Vec<(PathBuf, SystemTime)> {
        files_with_mtime(dir, |p| {
            let name = p.file_name().and_then(|n| n.to_str()).unwrap_or("");
            name.starts_with("checkpoint") && name.ends_with(".json")
        })
    }

    /// Freshness decision for a selected candidate, measured at `now`.
    /// Pure so the 10-minute boundary is testable without mtime games.
    fn freshness_outcome(path: PathBuf, mtime: SystemTime, now: SystemTime) -> Located {
        let age = now.duration_since(mtime).unwrap_or_default();
        let locator = SessionLocator::File(path);
        if age > STALENESS_THRESHOLD {
            Located::Stale { locator, age }
        } else {
            Located::Ready(locator)
        }
    }

    fn read_records(path: &Path) -> Result<Vec<Value>> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        if contents.trim().is_empty() {
            return Err(SyncError::NoSessionFound {
                platform: Platform::Gemini.to_string(),
                scope: path.display().to_string(),
            }
            .into());
        }

        let value: Value = serde_json::from_str(&contents).map_err(|e| SyncError::FormatMismatch {
            path: path.to_path_buf(),
            expected: "Gemini checkpoint".to_string(),
            detail: format!("not valid JSON: {e}"),
        })?;

        match value {
            Value::Array(records) => Ok(records),
            other => Err(SyncError::FormatMismatch {
                path: path.to_path_buf(),
                expected: "Gemini checkpoint".to_string(),
                detail: format!(
                    "expected a top-level array of records, got {}",
                    json_kind(&other)
                ),
            }
            .into()),
        }
    }

    fn info_from_file(&self, path: &Path) -> Result<SessionInfo> {
        let records = Self::read_records(path)?;
        let messages = build_messages(&records);

        let mtime = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .with_context(|| format!("Failed to stat {}", path.display()))?;

        Ok(SessionInfo {
            id: checkpoint_tag(path),
            locator: SessionLocator::File(path.to_path_buf()),
            project_path: extract_cwd(&messages),
            last_modified: mtime_to_datetime(mtime),
            message_count: human_message_count(&messages),
            preview: first_real_user_preview(&messages, is_bootstrap_text),
            platform: Platform::Gemini,
        })
    }
}

impl Default for GeminiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformAdapter for GeminiAdapter {
    fn platform(&self) -> Platform {
        Platform::Gemini
    }

    fn storage_root(&self) -> Option<PathBuf> {
        self.tmp_dir.clone()
    }

    fn locate_session(&self, dir: &Path) -> Result<Option<Located>> {
        let Some(project_dir) = self.project_dir_for(dir) else {
            return Ok(None);
        };
        if !project_dir.is_dir() {
            return Ok(None);
        }

        let candidates = Self::checkpoint_candidates(&project_dir);
        Ok(latest_by_mtime(candidates)
            .map(|(path, mtime)| Self::freshness_outcome(path, mtime, SystemTime::now())))
    }

    fn list_sessions(&self, project: Option<&Path>) -> Result<Vec<SessionInfo>> {
        let Some(root) = self.tmp_dir.as_ref() else {
            return Ok(Vec::new());
        };

        let hash_dirs: Vec<PathBuf> = match project {
            Some(dir) => {
                let hash_dir = root.join(Self::project_hash(dir));
                if hash_dir.is_dir() {
                    vec![hash_dir]
                } else {
                    Vec::new()
                }
            }
            None => match std::fs::read_dir(root) {
                Ok(entries) => entries
                    .flatten()
                    .map(|e| e.path())
                    .filter(|p| p.is_dir())
                    .collect(),
                Err(_) => Vec::new(),
            },
        };

        let mut sessions = Vec::new();
        for dir in hash_dirs {
            for (path, _) in Self::checkpoint_candidates(&dir) {
                match self.info_from_file(&path) {
                    Ok(info) => sessions.push(info),
                    Err(e) => log::warn!("Failed to read {}: {e}", path.display()),
                }
            }
        }

        sessions.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(sessions)
    }

    fn parse_session(&self, locator: &SessionLocator) -> Result<CanonicalSession> {
        let SessionLocator::File(path) = locator else {
            anyhow::bail!("Gemini sessions are file-backed, got {locator}");
        };

        let records = Self::read_records(path)?;
        let messages = build_messages(&records);
        if messages.is_empty() {
            return Err(SyncError::NoSessionFound {
                platform: Platform::Gemini.to_string(),
                scope: path.display().to_string(),
            }
            .into());
        }

        let message_count = human_message_count(&messages);
        let cwd = extract_cwd(&messages);
        let title = {
            let preview = first_real_user_preview(&messages, is_bootstrap_text);
            if preview.is_empty() {
                None
            } else {
                Some(preview)
            }
        };

        let mut session =
            CanonicalSession::new(Platform::Gemini, Conversation::Messages(messages));
        session.session_id = Some(checkpoint_tag(path));
        session.cwd = cwd;
        session.title = title;
        session.message_count = message_count;
        Ok(session)
    }

    fn probe(&self, path: &Path) -> bool {
        let Ok(contents) = std::fs::read_to_string(path) else {
            return false;
        };
        let Ok(Value::Array(records)) = serde_json::from_str::<Value>(&contents) else {
            return false;
        };
        records.first().map_or(false, |first| {
            first
                .as_object()
                .map_or(false, |obj| obj.contains_key("role") && obj.contains_key("parts"))
        })
    }

    fn write_session(&self, session: &CanonicalSession, target_dir: &Path) -> Result<PathBuf> {
        let Conversation::Messages(messages) = &session.conversation else {
            anyhow::bail!("Cannot write a raw-history session as a Gemini checkpoint");
        };

        let root = self
            .tmp_dir
            .as_ref()
            .context("Cannot determine the Gemini tmp directory")?;

        let project_dir = root.join(Self::project_hash(target_dir));
        std::fs::create_dir_all(&project_dir)
            .with_context(|| format!("Failed to create {}", project_dir.display()))?;

        let tag = session
            .session_id
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or("restored");
        let path = project_dir.join(format!("checkpoint-{tag}.json"));

        let records: Vec<Value> = messages.iter().map(native_record).collect();
        let contents = serde_json::to_string_pretty(&Value::Array(records))?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        log::info!("Wrote {} records to {}", messages.len(), path.display());
        Ok(path)
    }
}

/// Is this text the CLI's injected context preamble?
pub fn is_bootstrap_text(text: &str) -> bool {
    text.trim_start().starts_with(CONTEXT_MARKER)
}

/// `checkpoint-foo.json` → `foo`; bare `checkpoint.json` → `default`.
fn checkpoint_tag(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("checkpoint");
    match stem.strip_prefix("checkpoint-") {
        Some(tag) if !tag.is_empty() => tag.to_string(),
        _ => "default".to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Convert checkpoint records to canonical messages, skipping records that
/// do not have the `{role, parts}` shape.
fn build_messages(records: &[Value]) -> Vec<Message> {
    records
        .iter()
        .filter_map(|record| {
            let obj = record.as_object()?;
            let role = match obj.get("role").and_then(Value::as_str)? {
                "model" => Role::Assistant,
                "user" => Role::User,
                _ => return None,
            };
            let parts = obj.get("parts").and_then(Value::as_array)?;

            let content: Vec<ContentPart> = parts
                .iter()
                .filter_map(|part| {
                    let part_obj = part.as_object()?;
                    if let Some(text) = part_obj.get("text").and_then(Value::as_str) {
                        return Some(ContentPart::Text {
                            text: text.to_string(),
                        });
                    }
                    if let Some(call) = part_obj.get("functionCall") {
                        return Some(ContentPart::ToolUse {
                            id: call.get("id").and_then(Value::as_str).map(String::from),
                            name: call
                                .get("name")
                                .and_then(Value::as_str)
                                .unwrap_or("unknown")
                                .to_string(),
                            input: call.get("args").cloned().unwrap_or(Value::Null),
                        });
                    }
                    if let Some(response) = part_obj.get("functionResponse") {
                        return Some(ContentPart::ToolResult {
                            tool_use_id: response
                                .get("id")
                                .and_then(Value::as_str)
                                .map(String::from),
                            content: response
                                .get("response")
                                .map(|r| r.to_string())
                                .unwrap_or_default(),
                            is_error: false,
                        });
                    }
                    None
                })
                .collect();

            Some(Message {
                role,
                content: MessageContent::Parts(content),
                timestamp: None,
                model: None,
            })
        })
        .collect()
}

/// Human-facing message count: records whose parts are exclusively
/// function calls/responses are machinery, not conversation.
fn human_message_count(messages: &[Message]) -> usize {
    messages
        .iter()
        .filter(|m| match &m.content {
            MessageContent::Text(text) => !text.is_empty(),
            MessageContent::Parts(parts) => parts
                .iter()
                .any(|p| matches!(p, ContentPart::Text { .. })),
        })
        .count()
}

/// Pull the working directory out of the injected context preamble.
fn extract_cwd(messages: &[Message]) -> Option<PathBuf> {
    messages
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| m.text())
        .find(|text| text.contains(CWD_PATTERN))
        .and_then(|text| {
            let start = text.find(CWD_PATTERN)? + CWD_PATTERN.len();
            let rest = &text[start..];
            let end = rest.find(['\n', '\r']).unwrap_or(rest.len());
            let path = rest[..end].trim().trim_end_matches('.');
            if path.is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            }
        })
}

/// Serialize a canonical message back into the native record shape.
fn native_record(msg: &Message) -> Value {
    let role = match msg.role {
        Role::Assistant => "model",
        _ => "user",
    };

    let parts: Vec<Value> = match &msg.content {
        MessageContent::Text(text) => vec![serde_json::json!({"text": text})],
        MessageContent::Parts(parts) => parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => serde_json::json!({"text": text}),
                ContentPart::ToolUse { name, input, .. } => serde_json::json!({
                    "functionCall": {"name": name, "args": input}
                }),
                ContentPart::ToolResult {
                    tool_use_id,
                    content,
                    ..
                } => {
                    let response: Value = serde_json::from_str(content)
                        .unwrap_or_else(|_| serde_json::json!({"output": content}));
                    let mut inner = serde_json::Map::new();
                    if let Some(id) = tool_use_id {
                        inner.insert("id".to_string(), Value::String(id.clone()));
                    }
                    inner.insert("response".to_string(), response);
                    serde_json::json!({"functionResponse": Value::Object(inner)})
                }
            })
            .collect(),
    };

    serde_json::json!({"role": role, "parts": parts})
}
