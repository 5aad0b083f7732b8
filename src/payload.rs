//! Upload payload construction and its inverse.
//!
//! Merges a canonical session with caller-supplied metadata into the wire
//! payload. Override precedence is always caller > session-derived >
//! computed default. Sessions carrying raw native history are spread
//! wholesale (all native fields preserved); message-list sessions produce
//! the flat wire shape.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::PathBuf;

use crate::session::{CanonicalSession, Conversation, Message, Platform};

/// Caller-supplied metadata overrides for an upload.
#[derive(Debug, Clone, Default)]
pub struct UploadOverrides {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_private: Option<bool>,
}

/// Build the upload payload for `session` with `overrides` applied.
pub fn build_upload_payload(session: &CanonicalSession, overrides: &UploadOverrides) -> Value {
    let mut payload = Map::new();

    match &session.conversation {
        Conversation::History(turns) => {
            // Spread every native top-level field first so nothing the
            // upstream tool needs is lost, then layer our metadata on top.
            if let Some(extras) = &session.native_extras {
                for (key, value) in extras {
                    payload.insert(key.clone(), value.clone());
                }
            }
            payload.insert("history".to_string(), Value::Array(turns.clone()));
        }
        Conversation::Messages(messages) => {
            let serialized: Vec<Value> = messages
                .iter()
                .map(|m| serde_json::to_value(m).unwrap_or(Value::Null))
                .collect();
            payload.insert("messages".to_string(), Value::Array(serialized));
            let tool_call_count: usize = messages.iter().map(|m| m.tool_call_count()).sum();
            payload.insert("toolCallCount".to_string(), tool_call_count.into());
            if let Some(token_count) = session.token_count {
                payload.insert("tokenCount".to_string(), token_count.into());
            }
            if let Some(session_id) = &session.session_id {
                payload.insert("sessionId".to_string(), session_id.clone().into());
            }
            if let Some(cwd) = &session.cwd {
                payload.insert("cwd".to_string(), cwd.to_string_lossy().into_owned().into());
            }
            if let Some(model) = &session.model_name {
                payload.insert("modelName".to_string(), model.clone().into());
            }
        }
    }

    payload.insert("platform".to_string(), session.platform.as_str().into());
    payload.insert("messageCount".to_string(), session.message_count.into());

    let title = overrides
        .title
        .clone()
        .or_else(|| session.title.clone())
        .unwrap_or_else(|| format!("{} session", session.platform.display_name()));
    payload.insert("title".to_string(), title.into());

    if let Some(summary) = overrides.summary.clone().or_else(|| session.summary.clone()) {
        payload.insert("summary".to_string(), summary.into());
    }

    let tags = overrides.tags.clone().unwrap_or_else(|| session.tags.clone());
    payload.insert(
        "tags".to_string(),
        Value::Array(tags.into_iter().map(Value::from).collect()),
    );

    let is_private = overrides.is_private.unwrap_or(session.is_private);
    payload.insert("isPrivate".to_string(), is_private.into());

    Value::Object(payload)
}

/// Reconstruct a canonical session from a downloaded payload.
pub fn session_from_payload(payload: &Value) -> Result<CanonicalSession> {
    let obj = payload
        .as_object()
        .context("Session payload is not a JSON object")?;

    let platform = obj
        .get("platform")
        .and_then(Value::as_str)
        .and_then(Platform::from_id)
        .context("Session payload has no recognizable platform field")?;

    let conversation = if let Some(history) = obj.get("history") {
        let turns = history
            .as_array()
            .context("Payload history field is not an array")?
            .clone();
        Conversation::History(turns)
    } else {
        let messages: Vec<Message> = obj
            .get("messages")
            .and_then(Value::as_array)
            .context("Session payload carries neither history nor messages")?
            .iter()
            .map(|m| serde_json::from_value(m.clone()))
            .collect::<std::result::Result<_, _>>()
            .context("Failed to decode payload messages")?;
        Conversation::Messages(messages)
    };

    let mut session = CanonicalSession::new(platform, conversation);
    session.session_id = obj
        .get("sessionId")
        .or_else(|| obj.get("conversation_id"))
        .and_then(Value::as_str)
        .map(String::from);
    session.cwd = obj
        .get("cwd")
        .and_then(Value::as_str)
        .map(PathBuf::from);
    session.title = obj.get("title").and_then(Value::as_str).map(String::from);
    session.summary = obj
        .get("summary")
        .and_then(Value::as_str)
        .map(String::from);
    session.tags = obj
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();
    session.is_private = obj
        .get("isPrivate")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    session.model_name = obj
        .get("modelName")
        .or_else(|| obj.get("model"))
        .and_then(Value::as_str)
        .map(String::from);
    session.token_count = obj.get("tokenCount").and_then(Value::as_u64);
    if let Some(count) = obj.get("messageCount").and_then(Value::as_u64) {
        session.message_count = count as usize;
    }

    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{MessageContent, Role};

    fn messages_session() -> CanonicalSession {
        let messages = vec![
            Message {
                role: Role::User,
                content: MessageContent::Text("add pagination".to_string()),
                timestamp: None,
                model: None,
            },
            Message {
                role: Role::Assistant,
                content: MessageContent::Text("Added.".to_string()),
                timestamp: None,
                model: Some("claude-sonnet-4".to_string()),
            },
        ];
        let mut session =
            CanonicalSession::new(Platform::Claude, Conversation::Messages(messages));
        session.session_id = Some("s-1".to_string());
        session.cwd = Some(PathBuf::from("/home/u/proj"));
        session.title = Some("add pagination".to_string());
        session.model_name = Some("claude-sonnet-4".to_string());
        session
    }

    fn history_session() -> CanonicalSession {
        let turns = vec![serde_json::json!({
            "user": {"content": {"Prompt": {"prompt": "hi"}}},
            "assistant": {"Response": {"message_id": "m1", "content": "hello"}}
        })];
        let mut session =
            CanonicalSession::new(Platform::AmazonQ, Conversation::History(turns));
        session.message_count = 2;
        let mut extras = Map::new();
        extras.insert("conversation_id".to_string(), "c-9".into());
        extras.insert("next_message".to_string(), Value::Null);
        extras.insert("model".to_string(), "claude-sonnet".into());
        session.native_extras = Some(extras);
        session.cwd = Some(PathBuf::from("/home/u/proj"));
        session
    }

    #[test]
    fn test_caller_overrides_beat_derived_values() {
        let session = messages_session();
        let overrides = UploadOverrides {
            title: Some("my custom title".to_string()),
            summary: Some("short recap".to_string()),
            tags: Some(vec!["rust".to_string()]),
            is_private: Some(true),
        };
        let payload = build_upload_payload(&session, &overrides);

        assert_eq!(payload["title"], "my custom title");
        assert_eq!(payload["summary"], "short recap");
        assert_eq!(payload["tags"][0], "rust");
        assert_eq!(payload["isPrivate"], true);
    }

    #[test]
    fn test_derived_title_used_without_override() {
        let session = messages_session();
        let payload = build_upload_payload(&session, &UploadOverrides::default());
        assert_eq!(payload["title"], "add pagination");
        assert_eq!(payload["isPrivate"], false);
    }

    #[test]
    fn test_default_title_when_nothing_derived() {
        let mut session = messages_session();
        session.title = None;
        let payload = build_upload_payload(&session, &UploadOverrides::default());
        assert_eq!(payload["title"], "Claude Code session");
    }

    #[test]
    fn test_flat_shape_for_message_sessions() {
        let session = messages_session();
        let payload = build_upload_payload(&session, &UploadOverrides::default());

        assert_eq!(payload["platform"], "claude");
        assert_eq!(payload["messageCount"], 2);
        assert_eq!(payload["sessionId"], "s-1");
        assert_eq!(payload["cwd"], "/home/u/proj");
        assert_eq!(payload["messages"].as_array().unwrap().len(), 2);
        assert_eq!(payload["toolCallCount"], 0);
        // Absent optionals stay absent rather than serializing null.
        assert!(payload.get("tokenCount").is_none());
        assert!(payload.get("summary").is_none());
    }

    #[test]
    fn test_history_sessions_spread_native_fields() {
        let session = history_session();
        let payload = build_upload_payload(&session, &UploadOverrides::default());

        assert_eq!(payload["platform"], "q");
        assert_eq!(payload["conversation_id"], "c-9");
        assert_eq!(payload["model"], "claude-sonnet");
        assert!(payload.as_object().unwrap().contains_key("next_message"));
        assert_eq!(payload["history"].as_array().unwrap().len(), 1);
        assert!(payload.get("messages").is_none());
    }

    #[test]
    fn test_payload_round_trip_for_messages() {
        let session = messages_session();
        let payload = build_upload_payload(&session, &UploadOverrides::default());
        let restored = session_from_payload(&payload).unwrap();

        assert_eq!(restored.platform, Platform::Claude);
        assert_eq!(restored.session_id.as_deref(), Some("s-1"));
        assert_eq!(restored.cwd, Some(PathBuf::from("/home/u/proj")));
        assert_eq!(restored.message_count, 2);

        let (Conversation::Messages(a), Conversation::Messages(b)) =
            (&session.conversation, &restored.conversation)
        else {
            panic!("both sides must use the messages arm");
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_payload_round_trip_for_history() {
        let session = history_session();
        let payload = build_upload_payload(&session, &UploadOverrides::default());
        let restored = session_from_payload(&payload).unwrap();

        assert_eq!(restored.platform, Platform::AmazonQ);
        assert_eq!(restored.session_id.as_deref(), Some("c-9"));
        let Conversation::History(turns) = &restored.conversation else {
            panic!("q payloads must restore to the history arm");
        };
        assert_eq!(turns.len(), 1);
    }

    #[test]
    fn test_unknown_platform_rejected() {
        let payload = serde_json::json!({"platform": "mystery", "messages": []});
        assert!(session_from_payload(&payload).is_err());
    }
}
