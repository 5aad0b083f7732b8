//! Typed errors surfaced to the user.
//!
//! Internal propagation uses `anyhow`; these variants are the terminal
//! conditions a command can end in, each carrying enough context to act on.

use std::path::PathBuf;
use std::time::Duration;

/// Errors that agent-sync surfaces to the user.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// No session exists for the requested platform/scope. Distinct from a
    /// parse failure so callers can offer guidance instead of a stack trace.
    #[error("No {platform} session found for {scope}. Start a conversation with the {platform} CLI there first, or pass --file to upload a specific transcript.")]
    NoSessionFound { platform: String, scope: String },

    /// Content did not match the structural shape the adapter expects.
    #[error("{} does not look like a {expected} session: {detail}", path.display())]
    FormatMismatch {
        path: PathBuf,
        expected: String,
        detail: String,
    },

    /// A located candidate failed the freshness gate and was neither
    /// force-overridden nor confirmed.
    #[error("Checkpoint {} was saved {} ago and may not reflect the current conversation. Re-save it in the CLI or pass --force to upload anyway.", path.display(), format_age(*age))]
    StaleSession { path: PathBuf, age: Duration },

    /// Non-2xx API response. 4xx statuses are terminal; others have already
    /// been retried before this surfaces.
    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    /// No credential resolvable from the environment or the token file.
    #[error("Not logged in. Run `agent-sync login` first.")]
    AuthMissing,
}

/// Render a duration the way a human would say it ("4 minutes", "2 hours").
pub fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    if secs < 60 {
        format!("{secs} seconds")
    } else if secs < 3600 {
        let mins = secs / 60;
        format!("{mins} minute{}", if mins == 1 { "" } else { "s" })
    } else {
        let hours = secs / 3600;
        format!("{hours} hour{}", if hours == 1 { "" } else { "s" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_age_units() {
        assert_eq!(format_age(Duration::from_secs(30)), "30 seconds");
        assert_eq!(format_age(Duration::from_secs(60)), "1 minute");
        assert_eq!(format_age(Duration::from_secs(11 * 60)), "11 minutes");
        assert_eq!(format_age(Duration::from_secs(2 * 3600)), "2 hours");
    }

    #[test]
    fn test_stale_session_message_contains_age() {
        let err = SyncError::StaleSession {
            path: PathBuf::from("/tmp/checkpoint.json"),
            age: Duration::from_secs(14 * 60),
        };
        let msg = err.to_string();
        assert!(msg.contains("14 minutes"));
        assert!(msg.contains("--force"));
    }

    #[test]
    fn test_not_found_is_actionable() {
        let err = SyncError::NoSessionFound {
            platform: "gemini".to_string(),
            scope: "/home/user/project".to_string(),
        };
        assert!(err.to_string().contains("gemini"));
        assert!(err.to_string().contains("/home/user/project"));
    }
}
