//! Credential token persistence.
//!
//! Resolution order: `AGENT_SYNC_TOKEN` environment variable, then the
//! token file in the config directory. A corrupt token file is treated as
//! absent (with a warning) rather than aborting the command.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::ConfigManager;

/// Environment variable taking precedence over the stored token.
pub const TOKEN_ENV_VAR: &str = "AGENT_SYNC_TOKEN";

#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    token: String,
    #[serde(rename = "storedAt")]
    stored_at: DateTime<Utc>,
}

/// File-backed token store with environment override.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new() -> Result<Self> {
        Ok(CredentialStore {
            path: ConfigManager::credentials_path()?,
        })
    }

    /// Store backed by an explicit file path. Used by tests.
    pub fn at(path: PathBuf) -> Self {
        CredentialStore { path }
    }

    /// Resolve the current token, or `None` when not logged in.
    pub fn token(&self) -> Option<String> {
        if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
            if !token.trim().is_empty() {
                return Some(token.trim().to_string());
            }
        }

        let contents = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<StoredToken>(&contents) {
            Ok(stored) => Some(stored.token),
            Err(e) => {
                log::warn!(
                    "Ignoring corrupt credential file {}: {e}",
                    self.path.display()
                );
                None
            }
        }
    }

    /// Persist a token with the current timestamp.
    pub fn store_token(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create directory: {}", parent.display())
            })?;
        }

        let stored = StoredToken {
            token: token.to_string(),
            stored_at: Utc::now(),
        };
        let contents =
            serde_json::to_string_pretty(&stored).context("Failed to serialize credentials")?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write credentials to {}", self.path.display()))?;
        Ok(())
    }

    /// Remove the stored token. Missing file is not an error.
    pub fn clear_token(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| {
                format!("Failed to remove credentials at {}", self.path.display())
            }),
        }
    }
}
