//! Platform adapter layer.
//!
//! One [`PlatformAdapter`] per supported tool, registered in a
//! [`PlatformRegistry`]. Everything platform-specific (storage location,
//! native format parsing, session discovery, structural content detection,
//! restore writing) lives behind this trait; command code never branches
//! on platform identity.

pub mod amazon_q;
pub mod claude;
pub mod codex;
pub mod gemini;

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::session::{CanonicalSession, Platform, SessionInfo, SessionLocator};

pub use amazon_q::AmazonQAdapter;
pub use claude::ClaudeAdapter;
pub use codex::CodexAdapter;
pub use gemini::GeminiAdapter;

/// Outcome of locating the most recent session for a directory.
///
/// The locator never prompts: a candidate that fails a freshness gate is
/// reported as [`Located::Stale`] and the caller decides what to do with it
/// (prompt in a terminal, fail loudly in automation).
#[derive(Debug, Clone)]
pub enum Located {
    /// Candidate ready to parse.
    Ready(SessionLocator),
    /// Candidate exists but is older than the platform's freshness
    /// threshold. `age` is measured from the storage modification time.
    Stale { locator: SessionLocator, age: Duration },
}

impl Located {
    pub fn locator(&self) -> &SessionLocator {
        match self {
            Located::Ready(locator) => locator,
            Located::Stale { locator, .. } => locator,
        }
    }
}

/// Per-platform implementation of the locator/parser/display contract.
///
/// `Send + Sync` so "all platforms" scans can fan out across scoped threads.
pub trait PlatformAdapter: std::fmt::Debug + Send + Sync {
    fn platform(&self) -> Platform;

    /// Root of the platform's local storage (a directory, or the database
    /// file for database-backed platforms), if determinable on this machine.
    fn storage_root(&self) -> Option<PathBuf>;

    /// Whether the platform's storage exists on this machine.
    fn is_available(&self) -> bool {
        self.storage_root().map(|p| p.exists()).unwrap_or(false)
    }

    /// Find the most recent session recorded in `dir`, or `None`.
    fn locate_session(&self, dir: &Path) -> Result<Option<Located>>;

    /// List sessions, optionally restricted to one project directory.
    /// Built cheaply: metadata and previews only, no full message bodies.
    fn list_sessions(&self, project: Option<&Path>) -> Result<Vec<SessionInfo>>;

    /// Parse a located session into canonical form.
    fn parse_session(&self, locator: &SessionLocator) -> Result<CanonicalSession>;

    /// Structural probe for content-based detection: does `path` hold this
    /// platform's format? Must inspect content shape, never the extension.
    fn probe(&self, path: &Path) -> bool;

    /// Write `session` as a new native session for `target_dir`, returning
    /// the created path. Adapters for read-only stores return an error.
    fn write_session(&self, session: &CanonicalSession, target_dir: &Path) -> Result<PathBuf>;
}

/// Central dispatch over all known adapters.
///
/// Constructed explicitly and passed down so tests can substitute fakes;
/// there is no process-global instance.
pub struct PlatformRegistry {
    adapters: Vec<Box<dyn PlatformAdapter>>,
}

impl PlatformRegistry {
    /// Registry with the default adapters in registration order:
    /// claude, gemini, q, codex. Auto-detection probes in this order.
    pub fn new() -> Self {
        PlatformRegistry {
            adapters: vec![
                Box::new(ClaudeAdapter::new()),
                Box::new(GeminiAdapter::new()),
                Box::new(AmazonQAdapter::new()),
                Box::new(CodexAdapter::new()),
            ],
        }
    }

    /// Registry over an explicit adapter set. Used by tests.
    pub fn with_adapters(adapters: Vec<Box<dyn PlatformAdapter>>) -> Self {
        PlatformRegistry { adapters }
    }

    /// All registered adapters, in registration order.
    pub fn adapters(&self) -> impl Iterator<Item = &dyn PlatformAdapter> {
        self.adapters.iter().map(|a| a.as_ref())
    }

    /// Adapters whose storage exists on this machine.
    pub fn available(&self) -> Vec<&dyn PlatformAdapter> {
        self.adapters().filter(|a| a.is_available()).collect()
    }

    pub fn get(&self, platform: Platform) -> Option<&dyn PlatformAdapter> {
        self.adapters().find(|a| a.platform() == platform)
    }

    /// Resolve explicit platform flags to at most one adapter.
    ///
    /// Rejects two or more simultaneous flags before any I/O happens.
    pub fn resolve_flags(&self, flags: &[Platform]) -> Result<Option<&dyn PlatformAdapter>> {
        match flags {
            [] => Ok(None),
            [one] => self
                .get(*one)
                .map(Some)
                .ok_or_else(|| anyhow::anyhow!("No adapter registered for platform '{one}'")),
            many => {
                let names: Vec<&str> = many.iter().map(|p| p.as_str()).collect();
                anyhow::bail!(
                    "Only one platform flag may be given at a time (got: --{})",
                    names.join(", --")
                )
            }
        }
    }

    /// Content-based auto-detection: probe each adapter's structural
    /// validator in registration order and return the first that accepts
    /// the file's shape, or `None` for a file matching no platform.
    pub fn detect(&self, path: &Path) -> Option<&dyn PlatformAdapter> {
        self.adapters().find(|a| a.probe(path))
    }
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick the newest of `candidates` by modification time. Ties are broken
/// lexically by path, descending, so selection is deterministic.
pub(crate) fn latest_by_mtime(
    mut candidates: Vec<(PathBuf, SystemTime)>,
) -> Option<(PathBuf, SystemTime)> {
    candidates.sort_by(|(path_a, mtime_a), (path_b, mtime_b)| {
        mtime_b.cmp(mtime_a).then_with(|| path_b.cmp(path_a))
    });
    candidates.into_iter().next()
}

/// Collect `(path, mtime)` for direct children of `dir` that satisfy `keep`.
pub(crate) fn files_with_mtime<F>(dir: &Path, keep: F) -> Vec<(PathBuf, SystemTime)>
where
    F: Fn(&Path) -> bool,
{
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter_map(|entry| {
            let path = entry.path();
            if !path.is_file() || !keep(&path) {
                return None;
            }
            let mtime = entry.metadata().ok()?.modified().ok()?;
            Some((path, mtime))
        })
        .collect()
}

/// Convert a filesystem timestamp to the canonical `DateTime<Utc>`.
pub(crate) fn mtime_to_datetime(mtime: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(mtime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_latest_by_mtime_prefers_newer() {
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let candidates = vec![
            (PathBuf::from("/s/a.jsonl"), base),
            (PathBuf::from("/s/b.jsonl"), base + Duration::from_secs(60)),
        ];
        let (path, _) = latest_by_mtime(candidates).unwrap();
        assert_eq!(path, PathBuf::from("/s/b.jsonl"));
    }

    #[test]
    fn test_latest_by_mtime_tie_breaks_lexically_descending() {
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let candidates = vec![
            (PathBuf::from("/s/a.jsonl"), base),
            (PathBuf::from("/s/c.jsonl"), base),
            (PathBuf::from("/s/b.jsonl"), base),
        ];
        let (path, _) = latest_by_mtime(candidates).unwrap();
        assert_eq!(path, PathBuf::from("/s/c.jsonl"));
    }

    #[test]
    fn test_latest_by_mtime_empty() {
        assert!(latest_by_mtime(Vec::new()).is_none());
    }

    #[test]
    fn test_resolve_flags_rejects_multiple_without_io() {
        // Adapters rooted at paths that do not exist: if flag validation
        // touched storage, it would still succeed; the error must come
        // from the flag count alone.
        let registry = PlatformRegistry::new();
        let err = registry
            .resolve_flags(&[Platform::Claude, Platform::Gemini])
            .unwrap_err();
        assert!(err.to_string().contains("Only one platform flag"));
    }

    #[test]
    fn test_resolve_flags_single_and_empty() {
        let registry = PlatformRegistry::new();
        assert!(registry.resolve_flags(&[]).unwrap().is_none());
        let adapter = registry.resolve_flags(&[Platform::Codex]).unwrap().unwrap();
        assert_eq!(adapter.platform(), Platform::Codex);
    }

    #[test]
    fn test_registration_order() {
        let registry = PlatformRegistry::new();
        let order: Vec<Platform> = registry.adapters().map(|a| a.platform()).collect();
        assert_eq!(
            order,
            vec![
                Platform::Claude,
                Platform::Gemini,
                Platform::AmazonQ,
                Platform::Codex
            ]
        );
    }
}
