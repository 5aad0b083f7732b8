use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Environment variable overriding the configured API base URL.
pub const API_URL_ENV_VAR: &str = "AGENT_SYNC_API_URL";

const DEFAULT_API_BASE_URL: &str = "https://api.agentsync.dev";

/// Cross-platform configuration directory manager
pub struct ConfigManager;

impl ConfigManager {
    /// Get the main configuration directory path following platform conventions:
    /// - Linux: $XDG_CONFIG_HOME/agent-sync or ~/.config/agent-sync
    /// - macOS: ~/Library/Application Support/agent-sync
    /// - Windows: %APPDATA%\agent-sync
    pub fn config_dir() -> Result<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            // Follow XDG Base Directory Specification
            if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
                Ok(PathBuf::from(xdg_config).join("agent-sync"))
            } else {
                let home = dirs::home_dir().context("Failed to get home directory")?;
                Ok(home.join(".config").join("agent-sync"))
            }
        }

        #[cfg(target_os = "macos")]
        {
            let home = dirs::home_dir().context("Failed to get home directory")?;
            Ok(home
                .join("Library")
                .join("Application Support")
                .join("agent-sync"))
        }

        #[cfg(target_os = "windows")]
        {
            Ok(dirs::config_dir()
                .context("Failed to get Windows config directory")?
                .join("agent-sync"))
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        {
            let home = dirs::home_dir().context("Failed to get home directory")?;
            Ok(home.join(".agent-sync"))
        }
    }

    /// Get the settings file path (config.toml)
    pub fn settings_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Get the credential token file path
    pub fn credentials_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("credentials.json"))
    }

    /// Get the log file path
    pub fn log_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("agent-sync.log"))
    }

    /// Ensure the configuration directory exists
    pub fn ensure_config_dir() -> Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir).with_context(|| {
            format!("Failed to create config directory: {}", config_dir.display())
        })?;
        Ok(config_dir)
    }
}

/// Persisted settings. Currently just the remote service endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Base URL of the sharing service.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            api_base_url: default_api_base_url(),
        }
    }
}

impl SyncConfig {
    /// Load settings, applying the `AGENT_SYNC_API_URL` environment override.
    /// A missing settings file yields defaults; a corrupt one is an error.
    pub fn load() -> Result<Self> {
        let mut config = match Self::settings_file()? {
            Some(contents) => {
                toml::from_str(&contents).context("Failed to parse config.toml")?
            }
            None => SyncConfig::default(),
        };

        if let Ok(url) = std::env::var(API_URL_ENV_VAR) {
            if !url.trim().is_empty() {
                config.api_base_url = url.trim().trim_end_matches('/').to_string();
            }
        }

        Ok(config)
    }

    fn settings_file() -> Result<Option<String>> {
        let path = ConfigManager::settings_path()?;
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        Ok(Some(contents))
    }
}
