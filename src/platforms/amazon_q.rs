//! Amazon Q CLI adapter: conversations in an external SQLite database.
//!
//! The `q` CLI keeps one row per project directory in the `conversations`
//! table of `data.sqlite3` (key = absolute cwd, value = JSON blob). The
//! blob nests a turn history where each turn bundles a user object and an
//! assistant object; the assistant object is a tagged variant (`Response`
//! or `ToolUse`, the latter carrying nested tool invocation records). A
//! legacy sub-variant stores turns as 2-element arrays instead of named
//! fields; both are accepted, detected per turn.
//!
//! The database is owned by the `q` CLI and is only ever opened read-only
//! here. History is round-tripped raw rather than flattened: the nested
//! structure carries fields the upstream tool needs intact.

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::platforms::{mtime_to_datetime, Located, PlatformAdapter};
use crate::session::{
    preview_text, CanonicalSession, Conversation, Platform, SessionInfo, SessionLocator,
};

const CONVERSATIONS_TABLE: &str = "conversations";

/// Adapter for the Amazon Q CLI conversation store.
#[derive(Debug)]
pub struct AmazonQAdapter {
    db_path: Option<PathBuf>,
}

impl AmazonQAdapter {
    pub fn new() -> Self {
        AmazonQAdapter {
            db_path: dirs::data_local_dir().map(|d| d.join("amazon-q").join("data.sqlite3")),
        }
    }

    /// Adapter over an explicit database file. Used by tests.
    pub fn with_db(db_path: PathBuf) -> Self {
        AmazonQAdapter {
            db_path: Some(db_path),
        }
    }

    fn open_readonly(path: &Path) -> Result<Connection> {
        Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open {} read-only", path.display()))
    }

    fn has_conversations_table(conn: &Connection) -> bool {
        conn.prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1")
            .and_then(|mut stmt| stmt.exists([CONVERSATIONS_TABLE]))
            .unwrap_or(false)
    }

    fn fetch_row(conn: &Connection, key: &str) -> Result<Option<String>> {
        let mut stmt = conn
            .prepare("SELECT value FROM conversations WHERE key = ?1")
            .context("Failed to prepare conversation lookup")?;
        let mut rows = stmt.query([key]).context("Failed to query conversations")?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    fn parse_blob(&self, db_path: &Path, key: &str, blob: &str) -> Result<CanonicalSession> {
        let value: Value = serde_json::from_str(blob).map_err(|e| SyncError::FormatMismatch {
            path: db_path.to_path_buf(),
            expected: "Amazon Q conversation".to_string(),
            detail: format!("row for {key} is not valid JSON: {e}"),
        })?;

        let Value::Object(mut fields) = value else {
            return Err(SyncError::FormatMismatch {
                path: db_path.to_path_buf(),
                expected: "Amazon Q conversation".to_string(),
                detail: format!("row for {key} is not a JSON object"),
            }
            .into());
        };

        let history = match fields.remove("history") {
            Some(Value::Array(turns)) => turns,
            Some(_) => {
                return Err(SyncError::FormatMismatch {
                    path: db_path.to_path_buf(),
                    expected: "Amazon Q conversation".to_string(),
                    detail: "history field is not an array".to_string(),
                }
                .into())
            }
            None => Vec::new(),
        };

        if history.is_empty() {
            return Err(SyncError::NoSessionFound {
                platform: Platform::AmazonQ.to_string(),
                scope: key.to_string(),
            }
            .into());
        }

        let message_count = count_messages(&history);
        let session_id = fields
            .get("conversation_id")
            .and_then(Value::as_str)
            .map(String::from);
        let model_name = fields.get("model").and_then(Value::as_str).map(String::from);
        let title = first_prompt(&history).map(|p| preview_text(&p));

        let mut session =
            CanonicalSession::new(Platform::AmazonQ, Conversation::History(history));
        session.session_id = session_id;
        session.cwd = Some(PathBuf::from(key));
        session.title = title;
        session.model_name = model_name;
        session.message_count = message_count;
        session.native_extras = Some(fields);
        Ok(session)
    }

    fn info_from_row(&self, db_path: &Path, key: &str, blob: &str) -> Result<SessionInfo> {
        let session = self.parse_blob(db_path, key, blob)?;
        let mtime = std::fs::metadata(db_path)
            .and_then(|m| m.modified())
            .with_context(|| format!("Failed to stat {}", db_path.display()))?;

        let Conversation::History(history) = &session.conversation else {
            unreachable!("q sessions always use the history arm");
        };

        Ok(SessionInfo {
            id: session
                .session_id
                .clone()
                .unwrap_or_else(|| key.to_string()),
            locator: SessionLocator::DbRow {
                database: db_path.to_path_buf(),
                key: key.to_string(),
            },
            project_path: Some(PathBuf::from(key)),
            // Rows carry no timestamps; the database file's mtime is the
            // closest true modification time the storage offers.
            last_modified: mtime_to_datetime(mtime),
            message_count: session.message_count,
            preview: first_prompt(history)
                .map(|p| preview_text(&p))
                .unwrap_or_default(),
            platform: Platform::AmazonQ,
        })
    }
}

impl Default for AmazonQAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformAdapter for AmazonQAdapter {
    fn platform(&self) -> Platform {
        Platform::AmazonQ
    }

    fn storage_root(&self) -> Option<PathBuf> {
        self.db_path.clone()
    }

    fn locate_session(&self, dir: &Path) -> Result<Option<Located>> {
        let Some(db_path) = self.db_path.as_ref() else {
            return Ok(None);
        };
        if !db_path.is_file() {
            return Ok(None);
        }

        let conn = Self::open_readonly(db_path)?;
        if !Self::has_conversations_table(&conn) {
            return Ok(None);
        }

        let key = dir.to_string_lossy().to_string();
        Ok(Self::fetch_row(&conn, &key)?.map(|_| {
            Located::Ready(SessionLocator::DbRow {
                database: db_path.clone(),
                key,
            })
        }))
    }

    fn list_sessions(&self, project: Option<&Path>) -> Result<Vec<SessionInfo>> {
        let Some(db_path) = self.db_path.as_ref() else {
            return Ok(Vec::new());
        };
        if !db_path.is_file() {
            return Ok(Vec::new());
        }

        let conn = Self::open_readonly(db_path)?;
        if !Self::has_conversations_table(&conn) {
            return Ok(Vec::new());
        }

        let mut stmt = conn
            .prepare("SELECT key, value FROM conversations ORDER BY key")
            .context("Failed to prepare conversation scan")?;
        let rows: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .context("Failed to scan conversations")?
            .filter_map(|r| r.ok())
            .collect();

        let wanted = project.map(|p| p.to_string_lossy().to_string());
        let mut sessions = Vec::new();
        for (key, blob) in rows {
            if let Some(wanted) = &wanted {
                if &key != wanted {
                    continue;
                }
            }
            match self.info_from_row(db_path, &key, &blob) {
                Ok(info) => sessions.push(info),
                Err(e) => log::warn!("Skipping conversation row {key}: {e}"),
            }
        }
        Ok(sessions)
    }

    fn parse_session(&self, locator: &SessionLocator) -> Result<CanonicalSession> {
        let SessionLocator::DbRow { database, key } = locator else {
            anyhow::bail!("Amazon Q sessions live in the conversation database, got {locator}");
        };

        let conn = Self::open_readonly(database)?;
        let blob = Self::fetch_row(&conn, key)?.ok_or_else(|| SyncError::NoSessionFound {
            platform: Platform::AmazonQ.to_string(),
            scope: key.clone(),
        })?;

        self.parse_blob(database, key, &blob)
    }

    fn probe(&self, path: &Path) -> bool {
        // SQLite files open with a fixed 16-byte magic; anything else is
        // not this platform's store.
        let Ok(bytes) = std::fs::read(path) else {
            return false;
        };
        if !bytes.starts_with(b"SQLite format 3\0") {
            return false;
        }
        Self::open_readonly(path)
            .map(|conn| Self::has_conversations_table(&conn))
            .unwrap_or(false)
    }

    fn write_session(&self, _session: &CanonicalSession, _target_dir: &Path) -> Result<PathBuf> {
        // The conversation store is owned by the q CLI and opened read-only
        // here; inserting rows behind its back is not supported.
        anyhow::bail!(
            "Restoring into the Amazon Q conversation database is not supported; \
             the store is owned by the q CLI"
        )
    }
}

/// Split a turn into its user and assistant halves, accepting both the
/// named `{user, assistant}` shape and the legacy 2-element array.
fn turn_halves(turn: &Value) -> (Option<&Value>, Option<&Value>) {
    match turn {
        Value::Object(obj) => (obj.get("user"), obj.get("assistant")),
        Value::Array(pair) => (pair.first(), pair.get(1)),
        _ => (None, None),
    }
}

/// Messages in a turn history: each present user or assistant half counts
/// as one, regardless of which turn shape carried it.
fn count_messages(history: &[Value]) -> usize {
    history
        .iter()
        .map(|turn| {
            let (user, assistant) = turn_halves(turn);
            user.map_or(0, |_| 1) + assistant.map_or(0, |_| 1)
        })
        .sum()
}

/// The prompt text of a user half, when it is a real prompt (tool results
/// travel through the same slot and are not user-authored).
fn prompt_text(user: &Value) -> Option<String> {
    user.get("content")?
        .get("Prompt")?
        .get("prompt")?
        .as_str()
        .map(String::from)
}

fn first_prompt(history: &[Value]) -> Option<String> {
    history.iter().find_map(|turn| {
        let (user, _) = turn_halves(turn);
        user.and_then(prompt_text)
    })
}
