//! Claude Code adapter: line-delimited JSONL under `~/.claude/projects/`.
//!
//! Session files: `<dash-encoded-cwd>/<session-id>.jsonl`, one JSON object
//! per line. Session identity and working directory are read from the first
//! line; tool invocations are content blocks tagged `tool_use` inside a
//! message's content array.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::platforms::{
    files_with_mtime, latest_by_mtime, mtime_to_datetime, Located, PlatformAdapter,
};
use crate::session::{
    first_real_user_preview, CanonicalSession, ContentPart, Conversation, Message,
    MessageContent, Platform, Role, SessionInfo, SessionLocator,
};

/// Markers Claude Code injects at the start of synthetic context messages.
/// Messages beginning with one of these are not "real" user messages.
const BOOTSTRAP_MARKERS: [&str; 4] = [
    "Caveat: The messages below were generated",
    "<command-name>",
    "<local-command-stdout>",
    "<local-command-stderr>",
];

/// One line of a Claude Code transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptLine {
    #[serde(rename = "type")]
    pub entry_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    #[serde(rename = "parentUuid", skip_serializing_if = "Option::is_none")]
    pub parent_uuid: Option<String>,

    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,

    // Fields we don't interpret but must not drop on rewrite.
    #[serde(flatten)]
    pub extra: Value,
}

impl TranscriptLine {
    fn is_conversational(&self) -> bool {
        matches!(self.entry_type.as_str(), "user" | "assistant") && self.message.is_some()
    }
}

/// Adapter for Claude Code's JSONL storage.
#[derive(Debug)]
pub struct ClaudeAdapter {
    projects_dir: Option<PathBuf>,
}

impl ClaudeAdapter {
    pub fn new() -> Self {
        ClaudeAdapter {
            projects_dir: dirs::home_dir().map(|h| h.join(".claude").join("projects")),
        }
    }

    /// Adapter rooted at an explicit projects directory. Used by tests.
    pub fn with_root(projects_dir: PathBuf) -> Self {
        ClaudeAdapter {
            projects_dir: Some(projects_dir),
        }
    }

    /// Claude Code's own cwd → project-directory encoding: every character
    /// that is not ASCII alphanumeric becomes `-`. The scheme must match the
    /// upstream tool exactly or discovery silently fails.
    pub fn project_dir_key(cwd: &Path) -> String {
        cwd.to_string_lossy()
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '-' })
            .collect()
    }

    fn project_dir_for(&self, cwd: &Path) -> Option<PathBuf> {
        self.projects_dir
            .as_ref()
            .map(|root| root.join(Self::project_dir_key(cwd)))
    }

    /// Read a transcript, skipping malformed lines. Returns the valid lines
    /// and how many were skipped.
    fn read_lines(path: &Path) -> Result<(Vec<TranscriptLine>, usize)> {
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let reader = BufReader::new(file);

        let mut lines = Vec::new();
        let mut skipped = 0usize;

        for (line_num, line) in reader.lines().enumerate() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    log::warn!(
                        "Skipping unreadable line {} in {}: {e}",
                        line_num + 1,
                        path.display()
                    );
                    skipped += 1;
                    continue;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<TranscriptLine>(&line) {
                Ok(entry) => lines.push(entry),
                Err(e) => {
                    log::warn!(
                        "Skipping malformed line {} in {}: {e}",
                        line_num + 1,
                        path.display()
                    );
                    skipped += 1;
                }
            }
        }

        Ok((lines, skipped))
    }

    fn info_from_file(&self, path: &Path) -> Result<SessionInfo> {
        let (lines, _) = Self::read_lines(path)?;
        if lines.is_empty() {
            return Err(SyncError::NoSessionFound {
                platform: Platform::Claude.to_string(),
                scope: path.display().to_string(),
            }
            .into());
        }

        let messages = build_messages(&lines);
        let session_id = lines
            .iter()
            .find_map(|l| l.session_id.clone())
            .unwrap_or_else(|| {
                path.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
        let project_path = lines.iter().find_map(|l| l.cwd.as_deref()).map(PathBuf::from);

        let mtime = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .with_context(|| format!("Failed to stat {}", path.display()))?;

        Ok(SessionInfo {
            id: session_id,
            locator: SessionLocator::File(path.to_path_buf()),
            project_path,
            last_modified: mtime_to_datetime(mtime),
            message_count: messages.len(),
            preview: first_real_user_preview(&messages, is_bootstrap_text),
            platform: Platform::Claude,
        })
    }
}

impl Default for ClaudeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformAdapter for ClaudeAdapter {
    fn platform(&self) -> Platform {
        Platform::Claude
    }

    fn storage_root(&self) -> Option<PathBuf> {
        self.projects_dir.clone()
    }

    fn locate_session(&self, dir: &Path) -> Result<Option<Located>> {
        let Some(project_dir) = self.project_dir_for(dir) else {
            return Ok(None);
        };
        if !project_dir.is_dir() {
            return Ok(None);
        }

        let candidates = files_with_mtime(&project_dir, |p| {
            p.extension().and_then(|e| e.to_str()) == Some("jsonl")
        });

        Ok(latest_by_mtime(candidates)
            .map(|(path, _)| Located::Ready(SessionLocator::File(path))))
    }

    fn list_sessions(&self, project: Option<&Path>) -> Result<Vec<SessionInfo>> {
        let Some(root) = self.projects_dir.as_ref() else {
            return Ok(Vec::new());
        };

        let project_dirs: Vec<PathBuf> = match project {
            Some(dir) => {
                let project_dir = root.join(Self::project_dir_key(dir));
                if project_dir.is_dir() {
                    vec![project_dir]
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
        for dir in project_dirs {
            for (path, _) in files_with_mtime(&dir, |p| {
                p.extension().and_then(|e| e.to_str()) == Some("jsonl")
            }) {
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
            anyhow::bail!("Claude Code sessions are file-backed, got {locator}");
        };

        let (lines, skipped) = Self::read_lines(path)?;
        if lines.is_empty() {
            return Err(SyncError::NoSessionFound {
                platform: Platform::Claude.to_string(),
                scope: path.display().to_string(),
            }
            .into());
        }
        if skipped > 0 {
            log::debug!("{}: skipped {skipped} corrupt lines", path.display());
        }

        let messages = build_messages(&lines);
        let message_count = messages.len();

        let session_id = lines.iter().find_map(|l| l.session_id.clone());
        let cwd = lines
            .iter()
            .find_map(|l| l.cwd.as_deref())
            .map(PathBuf::from);
        let model_name = messages.iter().find_map(|m| m.model.clone());
        let token_count = total_output_tokens(&lines);
        let title = {
            let preview = first_real_user_preview(&messages, is_bootstrap_text);
            if preview.is_empty() {
                None
            } else {
                Some(preview)
            }
        };

        let mut session =
            CanonicalSession::new(Platform::Claude, Conversation::Messages(messages));
        session.session_id = session_id;
        session.cwd = cwd;
        session.title = title;
        session.model_name = model_name;
        session.token_count = token_count;
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

        // Claude lines carry a sessionId (first line always does), or at
        // least the type+uuid pair; Codex envelopes have `payload` instead.
        obj.contains_key("sessionId")
            || (obj.get("type").and_then(Value::as_str).is_some()
                && obj.contains_key("uuid")
                && !obj.contains_key("payload"))
    }

    fn write_session(&self, session: &CanonicalSession, target_dir: &Path) -> Result<PathBuf> {
        let Conversation::Messages(messages) = &session.conversation else {
            anyhow::bail!("Cannot write a raw-history session as a Claude Code transcript");
        };

        let root = self
            .projects_dir
            .as_ref()
            .context("Cannot determine the Claude Code projects directory")?;

        let new_session_id = uuid::Uuid::new_v4().to_string();
        let project_dir = root.join(Self::project_dir_key(target_dir));
        std::fs::create_dir_all(&project_dir)
            .with_context(|| format!("Failed to create {}", project_dir.display()))?;
        let path = project_dir.join(format!("{new_session_id}.jsonl"));

        let now_iso = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let mut file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;

        let mut prev_uuid: Option<String> = None;
        for msg in messages {
            let entry_uuid = uuid::Uuid::new_v4().to_string();
            let entry_type = match msg.role {
                Role::Assistant => "assistant",
                _ => "user",
            };
            let timestamp = msg
                .timestamp
                .map(|ts| ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
                .unwrap_or_else(|| now_iso.clone());

            let mut inner = serde_json::json!({
                "role": entry_type,
                "content": native_content(msg),
            });
            if let Some(model) = msg.model.as_deref().or(if msg.role == Role::Assistant {
                session.model_name.as_deref()
            } else {
                None
            }) {
                inner["model"] = Value::String(model.to_string());
            }

            let entry = serde_json::json!({
                "parentUuid": prev_uuid.as_deref().map(Value::from).unwrap_or(Value::Null),
                "isSidechain": false,
                "userType": "external",
                "cwd": target_dir.to_string_lossy(),
                "sessionId": new_session_id,
                "type": entry_type,
                "message": inner,
                "uuid": entry_uuid,
                "timestamp": timestamp,
            });

            writeln!(file, "{}", serde_json::to_string(&entry)?)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            prev_uuid = Some(entry_uuid);
        }

        log::info!(
            "Wrote {} messages to {}",
            messages.len(),
            path.display()
        );
        Ok(path)
    }
}

/// Sum the assistant-reported output token counts across the transcript.
fn total_output_tokens(lines: &[TranscriptLine]) -> Option<u64> {
    let total: u64 = lines
        .iter()
        .filter_map(|l| l.message.as_ref())
        .filter_map(|m| m.pointer("/usage/output_tokens"))
        .filter_map(Value::as_u64)
        .sum();
    if total > 0 {
        Some(total)
    } else {
        None
    }
}

/// Is this text a platform-injected bootstrap/context message?
pub fn is_bootstrap_text(text: &str) -> bool {
    let trimmed = text.trim_start();
    BOOTSTRAP_MARKERS.iter().any(|m| trimmed.starts_with(m))
}

fn build_messages(lines: &[TranscriptLine]) -> Vec<Message> {
    lines
        .iter()
        .filter(|l| l.is_conversational())
        .filter_map(|line| {
            let message = line.message.as_ref()?;
            let role = match message
                .get("role")
                .and_then(Value::as_str)
                .unwrap_or(&line.entry_type)
            {
                "assistant" => Role::Assistant,
                "system" => Role::System,
                _ => Role::User,
            };
            let content = parse_content(message.get("content"))?;
            Some(Message {
                role,
                content,
                timestamp: line.timestamp.as_deref().and_then(parse_rfc3339),
                model: message
                    .get("model")
                    .and_then(Value::as_str)
                    .map(String::from),
            })
        })
        .collect()
}

fn parse_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_content(content: Option<&Value>) -> Option<MessageContent> {
    match content? {
        Value::String(s) => Some(MessageContent::Text(s.clone())),
        Value::Array(blocks) => {
            let parts: Vec<ContentPart> = blocks.iter().filter_map(parse_block).collect();
            Some(MessageContent::Parts(parts))
        }
        _ => None,
    }
}

fn parse_block(block: &Value) -> Option<ContentPart> {
    let obj = block.as_object()?;
    match obj.get("type").and_then(Value::as_str)? {
        "text" => Some(ContentPart::Text {
            text: obj.get("text").and_then(Value::as_str)?.to_string(),
        }),
        "tool_use" => Some(ContentPart::ToolUse {
            id: obj.get("id").and_then(Value::as_str).map(String::from),
            name: obj
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            input: obj.get("input").cloned().unwrap_or(Value::Null),
        }),
        "tool_result" => {
            let content = match obj.get("content") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(|i| i.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("\n"),
                _ => String::new(),
            };
            Some(ContentPart::ToolResult {
                tool_use_id: obj
                    .get("tool_use_id")
                    .and_then(Value::as_str)
                    .map(String::from),
                content,
                is_error: obj
                    .get("is_error")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            })
        }
        // Other block kinds (thinking etc.) with embedded text still count
        // as text; anything else is dropped.
        _ => obj.get("text").and_then(Value::as_str).map(|text| {
            ContentPart::Text {
                text: text.to_string(),
            }
        }),
    }
}

/// Serialize a canonical message back into Claude Code's content shape:
/// plain strings for text-only user messages, block arrays otherwise.
fn native_content(msg: &Message) -> Value {
    match &msg.content {
        MessageContent::Text(s) => {
            if msg.role == Role::Assistant {
                serde_json::json!([{"type": "text", "text": s}])
            } else {
                Value::String(s.clone())
            }
        }
        MessageContent::Parts(parts) => {
            let blocks: Vec<Value> = parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => serde_json::json!({
                        "type": "text",
                        "text": text,
                    }),
                    ContentPart::ToolUse { id, name, input } => serde_json::json!({
                        "type": "tool_use",
                        "id": id.as_deref().unwrap_or(""),
                        "name": name,
                        "input": input,
                    }),
                    ContentPart::ToolResult {
                        tool_use_id,
                        content,
                        is_error,
                    } => serde_json::json!({
                        "type": "tool_result",
                        "tool_use_id": tool_use_id.as_deref().unwrap_or(""),
                        "content": content,
                        "is_error": is_error,
                    }),
                })
                .collect();
            Value::Array(blocks)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::TempDir;

    fn write_transcript(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    const BASIC: &str = r#"{"type":"user","sessionId":"s1","cwd":"/home/u/proj","uuid":"u1","timestamp":"2026-01-05T10:00:00Z","message":{"role":"user","content":"Fix the login bug"}}
{"type":"assistant","sessionId":"s1","uuid":"u2","timestamp":"2026-01-05T10:00:10Z","message":{"role":"assistant","model":"claude-sonnet-4","content":[{"type":"text","text":"Looking into it."},{"type":"tool_use","id":"t1","name":"Read","input":{"file_path":"login.rs"}}]}}"#;

    #[test]
    fn test_project_dir_key_encoding() {
        assert_eq!(
            ClaudeAdapter::project_dir_key(Path::new("/home/user/my_project.v2")),
            "-home-user-my-project-v2"
        );
        assert_eq!(ClaudeAdapter::project_dir_key(Path::new("/tmp")), "-tmp");
    }

    #[test]
    fn test_parse_basic_session() {
        let dir = TempDir::new().unwrap();
        let path = write_transcript(dir.path(), "s1.jsonl", BASIC);

        let adapter = ClaudeAdapter::with_root(dir.path().to_path_buf());
        let session = adapter
            .parse_session(&SessionLocator::File(path))
            .unwrap();

        assert_eq!(session.platform, Platform::Claude);
        assert_eq!(session.session_id.as_deref(), Some("s1"));
        assert_eq!(session.cwd, Some(PathBuf::from("/home/u/proj")));
        assert_eq!(session.message_count, 2);
        assert_eq!(session.model_name.as_deref(), Some("claude-sonnet-4"));
        assert_eq!(session.title.as_deref(), Some("Fix the login bug"));

        let Conversation::Messages(messages) = &session.conversation else {
            panic!("claude sessions must use the messages arm");
        };
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].tool_call_count(), 1);
    }

    #[test]
    fn test_corrupt_line_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        let content = format!("{BASIC}\nnot json at all\n");
        let path = write_transcript(dir.path(), "s1.jsonl", &content);

        let adapter = ClaudeAdapter::with_root(dir.path().to_path_buf());
        let session = adapter
            .parse_session(&SessionLocator::File(path))
            .unwrap();
        assert_eq!(session.message_count, 2);
    }

    #[test]
    fn test_zero_valid_lines_is_not_found() {
        let dir = TempDir::new().unwrap();
        let path = write_transcript(dir.path(), "bad.jsonl", "garbage\nmore garbage\n");

        let adapter = ClaudeAdapter::with_root(dir.path().to_path_buf());
        let err = adapter
            .parse_session(&SessionLocator::File(path))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SyncError>(),
            Some(SyncError::NoSessionFound { .. })
        ));
    }

    #[test]
    fn test_preview_skips_caveat_bootstrap() {
        let dir = TempDir::new().unwrap();
        let content = r#"{"type":"user","sessionId":"s2","uuid":"u1","message":{"role":"user","content":"Caveat: The messages below were generated by the user while running local commands."}}
{"type":"user","sessionId":"s2","uuid":"u2","message":{"role":"user","content":"<command-name>/clear</command-name>"}}
{"type":"user","sessionId":"s2","uuid":"u3","message":{"role":"user","content":"refactor the   parser\nmodule"}}"#;
        let path = write_transcript(dir.path(), "s2.jsonl", content);

        let adapter = ClaudeAdapter::with_root(dir.path().to_path_buf());
        let infos = {
            let info = adapter.info_from_file(&path).unwrap();
            vec![info]
        };
        assert_eq!(infos[0].preview, "refactor the parser module");
    }

    #[test]
    fn test_non_conversational_lines_excluded_from_count() {
        let dir = TempDir::new().unwrap();
        let content = r#"{"type":"summary","summary":"Earlier work","leafUuid":"x"}
{"type":"user","sessionId":"s3","uuid":"u1","message":{"role":"user","content":"hello"}}
{"type":"file-history-snapshot","messageId":"m","snapshot":{}}
{"type":"assistant","sessionId":"s3","uuid":"u2","message":{"role":"assistant","content":"hi"}}"#;
        let path = write_transcript(dir.path(), "s3.jsonl", content);

        let adapter = ClaudeAdapter::with_root(dir.path().to_path_buf());
        let session = adapter
            .parse_session(&SessionLocator::File(path))
            .unwrap();
        assert_eq!(session.message_count, 2);
    }

    #[test]
    fn test_locate_picks_latest_mtime() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        let project = Path::new("/home/u/proj");
        let project_dir = root.join(ClaudeAdapter::project_dir_key(project));
        std::fs::create_dir_all(&project_dir).unwrap();

        let older = write_transcript(&project_dir, "old.jsonl", BASIC);
        let newer = write_transcript(&project_dir, "new.jsonl", BASIC);
        // Push the newer file's mtime forward without relying on clock
        // granularity between two writes.
        let future = std::time::SystemTime::now() + std::time::Duration::from_secs(5);
        std::fs::OpenOptions::new()
            .append(true)
            .open(&newer)
            .unwrap()
            .set_modified(future)
            .unwrap();

        let adapter = ClaudeAdapter::with_root(root);
        let located = adapter.locate_session(project).unwrap().unwrap();
        let Located::Ready(SessionLocator::File(path)) = located else {
            panic!("claude locator never reports staleness");
        };
        assert_eq!(path, newer);
        assert_ne!(path, older);
    }

    #[test]
    fn test_locate_missing_project_is_none() {
        let dir = TempDir::new().unwrap();
        let adapter = ClaudeAdapter::with_root(dir.path().to_path_buf());
        assert!(adapter
            .locate_session(Path::new("/nope/never"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_probe_accepts_transcript_rejects_other() {
        let dir = TempDir::new().unwrap();
        let ours = write_transcript(dir.path(), "a.jsonl", BASIC);
        let not_ours = write_transcript(
            dir.path(),
            "b.jsonl",
            r#"{"timestamp":"2026-01-05T10:00:00Z","type":"session_meta","payload":{"id":"x"}}"#,
        );
        let garbage = write_transcript(dir.path(), "c.jsonl", "plain text");

        let adapter = ClaudeAdapter::with_root(dir.path().to_path_buf());
        assert!(adapter.probe(&ours));
        assert!(!adapter.probe(&not_ours));
        assert!(!adapter.probe(&garbage));
    }

    #[test]
    fn test_write_session_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = write_transcript(dir.path(), "s1.jsonl", BASIC);

        let adapter = ClaudeAdapter::with_root(dir.path().to_path_buf());
        let session = adapter
            .parse_session(&SessionLocator::File(path))
            .unwrap();

        let target = Path::new("/home/u/elsewhere");
        let written = adapter.write_session(&session, target).unwrap();
        assert!(written.starts_with(
            dir.path().join(ClaudeAdapter::project_dir_key(target))
        ));

        let reparsed = adapter
            .parse_session(&SessionLocator::File(written))
            .unwrap();
        assert_eq!(reparsed.message_count, session.message_count);
        assert_eq!(reparsed.cwd, Some(target.to_path_buf()));

        let (Conversation::Messages(a), Conversation::Messages(b)) =
            (&session.conversation, &reparsed.conversation)
        else {
            panic!("both sides must use the messages arm");
        };
        let roles_a: Vec<Role> = a.iter().map(|m| m.role).collect();
        let roles_b: Vec<Role> = b.iter().map(|m| m.role).collect();
        assert_eq!(roles_a, roles_b);
    }
}
