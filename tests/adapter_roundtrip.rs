//! Round-trip integration tests: parse a native session, translate it to a
//! new working directory, write it back in the native format, and reparse.
//! Message counts, role sequences, and non-path fields must survive; only
//! embedded directory references may change.

use std::path::Path;

use agent_sync::platforms::{ClaudeAdapter, GeminiAdapter, PlatformAdapter};
use agent_sync::rewrite::{check_context, translate_session, ContextCheck};
use agent_sync::session::{Conversation, Role, SessionLocator};
use tempfile::TempDir;

const CLAUDE_TRANSCRIPT: &str = r#"{"type":"user","sessionId":"s1","cwd":"/data/work/webapp","uuid":"u1","timestamp":"2026-03-01T08:00:00Z","message":{"role":"user","content":"tighten the csp headers"}}
{"type":"assistant","sessionId":"s1","uuid":"u2","timestamp":"2026-03-01T08:00:09Z","message":{"role":"assistant","model":"claude-sonnet-4","content":[{"type":"text","text":"Reading the middleware."},{"type":"tool_use","id":"t1","name":"Read","input":{"file_path":"/data/work/webapp/src/middleware.rs"}}]}}
{"type":"user","sessionId":"s1","uuid":"u3","timestamp":"2026-03-01T08:00:12Z","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"t1","content":"fn headers() {}","is_error":false}]}}
{"type":"assistant","sessionId":"s1","uuid":"u4","timestamp":"2026-03-01T08:00:20Z","message":{"role":"assistant","model":"claude-sonnet-4","content":[{"type":"text","text":"Done."}]}}"#;

const GEMINI_CHECKPOINT: &str = r#"[
  {"role":"user","parts":[{"text":"This is the Gemini CLI. We are setting up the context for our chat.\n  I'm currently working in the directory: /data/work/webapp\n  Here is the folder structure..."}]},
  {"role":"model","parts":[{"text":"Got it. Thanks for the context!"}]},
  {"role":"user","parts":[{"text":"tighten the csp headers"}]},
  {"role":"model","parts":[{"functionCall":{"name":"read_file","args":{"path":"/data/work/webapp/src/middleware.rs"}}}]},
  {"role":"user","parts":[{"functionResponse":{"name":"read_file","response":{"output":"fn headers() {}"}}}]},
  {"role":"model","parts":[{"text":"Done."}]}
]"#;

fn roles_of(session: &agent_sync::session::CanonicalSession) -> Vec<Role> {
    let Conversation::Messages(messages) = &session.conversation else {
        panic!("expected a message-list session");
    };
    messages.iter().map(|m| m.role).collect()
}

#[test]
fn claude_roundtrip_preserves_everything_but_paths() {
    let root = TempDir::new().unwrap();
    let adapter = ClaudeAdapter::with_root(root.path().to_path_buf());

    let original_dir = Path::new("/data/work/webapp");
    let project_dir = root
        .path()
        .join(ClaudeAdapter::project_dir_key(original_dir));
    std::fs::create_dir_all(&project_dir).unwrap();
    let source = project_dir.join("s1.jsonl");
    std::fs::write(&source, CLAUDE_TRANSCRIPT).unwrap();

    let session = adapter
        .parse_session(&SessionLocator::File(source))
        .unwrap();
    assert_eq!(session.cwd.as_deref(), Some(original_dir));

    // Same final path segment: no confirmation needed.
    let target = Path::new("/mnt/restored/webapp");
    assert_eq!(
        check_context(&session, target),
        ContextCheck::SameProjectName
    );

    let mut translated = session.clone();
    translate_session(&mut translated, target);
    let written = adapter.write_session(&translated, target).unwrap();

    let reparsed = adapter
        .parse_session(&SessionLocator::File(written))
        .unwrap();

    assert_eq!(reparsed.message_count, session.message_count);
    assert_eq!(roles_of(&reparsed), roles_of(&session));
    assert_eq!(reparsed.model_name, session.model_name);
    assert_eq!(reparsed.cwd.as_deref(), Some(target));

    // Directory references inside tool inputs moved with the session.
    let Conversation::Messages(messages) = &reparsed.conversation else {
        unreachable!();
    };
    let serialized = serde_json::to_string(messages).unwrap();
    assert!(!serialized.contains("/data/work/webapp"));
    assert!(serialized.contains("/mnt/restored/webapp"));
}

#[test]
fn gemini_roundtrip_preserves_record_structure() {
    let root = TempDir::new().unwrap();
    let adapter = GeminiAdapter::with_root(root.path().to_path_buf());

    let original_dir = Path::new("/data/work/webapp");
    let hash_dir = root
        .path()
        .join(GeminiAdapter::project_hash(original_dir));
    std::fs::create_dir_all(&hash_dir).unwrap();
    let source = hash_dir.join("checkpoint-csp.json");
    std::fs::write(&source, GEMINI_CHECKPOINT).unwrap();

    let session = adapter
        .parse_session(&SessionLocator::File(source))
        .unwrap();
    assert_eq!(session.cwd.as_deref(), Some(original_dir));
    assert_eq!(session.conversation.len(), 6);
    assert_eq!(session.message_count, 4);

    let target = Path::new("/mnt/restored/webapp");
    let mut translated = session.clone();
    translate_session(&mut translated, target);
    let written = adapter.write_session(&translated, target).unwrap();

    // Restored under the hash of the new directory, keeping the tag.
    assert!(written.starts_with(root.path().join(GeminiAdapter::project_hash(target))));

    let reparsed = adapter
        .parse_session(&SessionLocator::File(written))
        .unwrap();
    assert_eq!(reparsed.conversation.len(), session.conversation.len());
    assert_eq!(reparsed.message_count, session.message_count);
    assert_eq!(roles_of(&reparsed), roles_of(&session));

    // The context preamble now names the new directory.
    assert_eq!(reparsed.cwd.as_deref(), Some(target));
}

#[test]
fn mismatched_project_name_is_flagged_for_confirmation() {
    let root = TempDir::new().unwrap();
    let adapter = ClaudeAdapter::with_root(root.path().to_path_buf());

    let original_dir = Path::new("/data/work/webapp");
    let project_dir = root
        .path()
        .join(ClaudeAdapter::project_dir_key(original_dir));
    std::fs::create_dir_all(&project_dir).unwrap();
    let source = project_dir.join("s1.jsonl");
    std::fs::write(&source, CLAUDE_TRANSCRIPT).unwrap();

    let session = adapter
        .parse_session(&SessionLocator::File(source))
        .unwrap();

    match check_context(&session, Path::new("/mnt/restored/other-app")) {
        ContextCheck::DifferentProjectName { original, target } => {
            assert_eq!(original, original_dir);
            assert_eq!(target, Path::new("/mnt/restored/other-app"));
        }
        other => panic!("expected a mismatch, got {other:?}"),
    }
}
