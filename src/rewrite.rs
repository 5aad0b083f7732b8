//! Context translation for the restore path.
//!
//! A restored session may land in a different directory than the one it
//! was recorded in. Every embedded reference to the original working
//! directory (structured fields and the text patterns inside bootstrap
//! messages alike) is rewritten to the target, uniformly across all
//! messages. The mismatch check returns a structured decision; prompting
//! the user is the caller's job.

use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::session::{CanonicalSession, ContentPart, Conversation, MessageContent};

/// Outcome of comparing the recorded directory against the restore target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextCheck {
    /// Final path segments match: likely the same project relocated.
    /// Translation proceeds without confirmation.
    SameProjectName,
    /// Different project names: referenced files and dependencies may be
    /// missing in the new location. The caller must confirm.
    DifferentProjectName { original: PathBuf, target: PathBuf },
    /// The session never recorded a working directory; nothing to compare.
    NoRecordedDirectory,
}

/// Compare the session's recorded directory with the restore target.
pub fn check_context(session: &CanonicalSession, target: &Path) -> ContextCheck {
    let Some(original) = session.cwd.as_deref() else {
        return ContextCheck::NoRecordedDirectory;
    };

    if original == target || original.file_name() == target.file_name() {
        ContextCheck::SameProjectName
    } else {
        ContextCheck::DifferentProjectName {
            original: original.to_path_buf(),
            target: target.to_path_buf(),
        }
    }
}

/// Rewrite every embedded reference to the recorded directory so the
/// restored session is usable from `target`.
pub fn translate_session(session: &mut CanonicalSession, target: &Path) {
    let original = session.cwd.clone();
    session.cwd = Some(target.to_path_buf());

    let Some(original) = original else {
        return;
    };
    if original == target {
        return;
    }

    let from = original.to_string_lossy().into_owned();
    let to = target.to_string_lossy().into_owned();

    match &mut session.conversation {
        Conversation::Messages(messages) => {
            for message in messages {
                rewrite_content(&mut message.content, &from, &to);
            }
        }
        Conversation::History(turns) => {
            for turn in turns {
                rewrite_value(turn, &from, &to);
            }
        }
    }

    if let Some(extras) = &mut session.native_extras {
        for value in extras.values_mut() {
            rewrite_value(value, &from, &to);
        }
    }
}

fn rewrite_content(content: &mut MessageContent, from: &str, to: &str) {
    match content {
        MessageContent::Text(text) => rewrite_text(text, from, to),
        MessageContent::Parts(parts) => {
            for part in parts {
                match part {
                    ContentPart::Text { text } => rewrite_text(text, from, to),
                    ContentPart::ToolUse { input, .. } => rewrite_value(input, from, to),
                    ContentPart::ToolResult { content, .. } => rewrite_text(content, from, to),
                }
            }
        }
    }
}

fn rewrite_text(text: &mut String, from: &str, to: &str) {
    if text.contains(from) {
        *text = text.replace(from, to);
    }
}

/// Recursively rewrite directory references inside a raw JSON value.
fn rewrite_value(value: &mut Value, from: &str, to: &str) {
    match value {
        Value::String(s) => {
            if s.contains(from) {
                *s = s.replace(from, to);
            }
        }
        Value::Array(items) => {
            for item in items {
                rewrite_value(item, from, to);
            }
        }
        Value::Object(fields) => {
            for field in fields.values_mut() {
                rewrite_value(field, from, to);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Message, Platform, Role};

    fn session_with_texts(cwd: &str, texts: &[&str]) -> CanonicalSession {
        let messages = texts
            .iter()
            .map(|t| Message {
                role: Role::User,
                content: MessageContent::Text(t.to_string()),
                timestamp: None,
                model: None,
            })
            .collect();
        let mut session =
            CanonicalSession::new(Platform::Claude, Conversation::Messages(messages));
        session.cwd = Some(PathBuf::from(cwd));
        session
    }

    #[test]
    fn test_same_project_name_needs_no_confirmation() {
        let session = session_with_texts("/a/b/project", &[]);
        assert_eq!(
            check_context(&session, Path::new("/x/y/project")),
            ContextCheck::SameProjectName
        );
    }

    #[test]
    fn test_different_project_name_needs_confirmation() {
        let session = session_with_texts("/a/b/project", &[]);
        match check_context(&session, Path::new("/x/y/other")) {
            ContextCheck::DifferentProjectName { original, target } => {
                assert_eq!(original, PathBuf::from("/a/b/project"));
                assert_eq!(target, PathBuf::from("/x/y/other"));
            }
            other => panic!("expected a mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_no_recorded_directory() {
        let mut session = session_with_texts("/a", &[]);
        session.cwd = None;
        assert_eq!(
            check_context(&session, Path::new("/x")),
            ContextCheck::NoRecordedDirectory
        );
    }

    #[test]
    fn test_translation_rewrites_every_message_not_just_first() {
        let mut session = session_with_texts(
            "/a/b/project",
            &[
                "I'm currently working in the directory: /a/b/project",
                "unrelated message",
                "see /a/b/project/src/main.rs for details",
            ],
        );
        translate_session(&mut session, Path::new("/x/y/project"));

        assert_eq!(session.cwd, Some(PathBuf::from("/x/y/project")));
        let Conversation::Messages(messages) = &session.conversation else {
            unreachable!();
        };
        assert_eq!(
            messages[0].text(),
            "I'm currently working in the directory: /x/y/project"
        );
        assert_eq!(messages[1].text(), "unrelated message");
        assert_eq!(
            messages[2].text(),
            "see /x/y/project/src/main.rs for details"
        );
    }

    #[test]
    fn test_translation_rewrites_tool_inputs_and_results() {
        let messages = vec![Message {
            role: Role::Assistant,
            content: MessageContent::Parts(vec![
                ContentPart::ToolUse {
                    id: None,
                    name: "read".to_string(),
                    input: serde_json::json!({"path": "/old/proj/src/lib.rs"}),
                },
                ContentPart::ToolResult {
                    tool_use_id: None,
                    content: "read /old/proj/src/lib.rs ok".to_string(),
                    is_error: false,
                },
            ]),
            timestamp: None,
            model: None,
        }];
        let mut session =
            CanonicalSession::new(Platform::Claude, Conversation::Messages(messages));
        session.cwd = Some(PathBuf::from("/old/proj"));

        translate_session(&mut session, Path::new("/new/proj"));

        let Conversation::Messages(messages) = &session.conversation else {
            unreachable!();
        };
        let MessageContent::Parts(parts) = &messages[0].content else {
            unreachable!();
        };
        let ContentPart::ToolUse { input, .. } = &parts[0] else {
            unreachable!();
        };
        assert_eq!(input["path"], "/new/proj/src/lib.rs");
        let ContentPart::ToolResult { content, .. } = &parts[1] else {
            unreachable!();
        };
        assert_eq!(content, "read /new/proj/src/lib.rs ok");
    }

    #[test]
    fn test_translation_rewrites_raw_history() {
        let turns = vec![serde_json::json!({
            "user": {
                "content": {"Prompt": {"prompt": "list files in /old/proj"}},
                "env_context": {"env_state": {"current_working_directory": "/old/proj"}}
            },
            "assistant": {"Response": {"message_id": "m", "content": "done"}}
        })];
        let mut session =
            CanonicalSession::new(Platform::AmazonQ, Conversation::History(turns));
        session.cwd = Some(PathBuf::from("/old/proj"));

        translate_session(&mut session, Path::new("/new/proj"));

        let Conversation::History(turns) = &session.conversation else {
            unreachable!();
        };
        assert_eq!(
            turns[0]["user"]["env_context"]["env_state"]["current_working_directory"],
            "/new/proj"
        );
        assert_eq!(
            turns[0]["user"]["content"]["Prompt"]["prompt"],
            "list files in /new/proj"
        );
    }

    #[test]
    fn test_translation_without_recorded_cwd_only_sets_target() {
        let mut session = session_with_texts("/ignored", &["text mentioning /ignored"]);
        session.cwd = None;
        translate_session(&mut session, Path::new("/target"));
        assert_eq!(session.cwd, Some(PathBuf::from("/target")));
        let Conversation::Messages(messages) = &session.conversation else {
            unreachable!();
        };
        // No original to rewrite from, so message text is untouched.
        assert_eq!(messages[0].text(), "text mentioning /ignored");
    }
}
