//! Push command handler
//!
//! Resolves which session the user meant (explicit platform flag, explicit
//! file with auto-detection, or "most recent for this directory"), applies
//! the staleness gate decision, and uploads the canonical session.

use anyhow::{Context, Result};
use colored::Colorize;
use inquire::Confirm;
use std::path::PathBuf;

use crate::api::{ApiClient, UploadReceipt};
use crate::error::{format_age, SyncError};
use crate::payload::{build_upload_payload, UploadOverrides};
use crate::platforms::{Located, PlatformAdapter, PlatformRegistry};
use crate::session::{Platform, SessionLocator};

use super::is_interactive;

/// Options for the `push` command.
#[derive(Debug, Default)]
pub struct PushOptions {
    pub platform: Option<Platform>,
    /// Directory whose latest session to upload (default: current).
    pub directory: Option<PathBuf>,
    /// Explicit transcript file; platform is auto-detected unless flagged.
    pub file: Option<PathBuf>,
    /// Skip the staleness gate.
    pub force: bool,
    pub overrides: UploadOverrides,
}

/// Resolve the adapter and candidate session for a push, without deciding
/// anything about staleness; that decision belongs to the caller.
pub fn resolve_candidate<'r>(
    registry: &'r PlatformRegistry,
    options: &PushOptions,
) -> Result<(&'r dyn PlatformAdapter, Located)> {
    if let Some(file) = &options.file {
        if !file.is_file() {
            anyhow::bail!("{} is not a file", file.display());
        }
        let adapter = match options.platform {
            Some(platform) => registry
                .get(platform)
                .with_context(|| format!("No adapter registered for platform '{platform}'"))?,
            None => registry.detect(file).with_context(|| {
                format!(
                    "Could not detect the platform of {} from its content; \
                     pass a platform flag to select one explicitly",
                    file.display()
                )
            })?,
        };
        return Ok((
            adapter,
            Located::Ready(SessionLocator::File(file.clone())),
        ));
    }

    let directory = match &options.directory {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let adapter = match options.platform {
        Some(platform) => registry
            .get(platform)
            .with_context(|| format!("No adapter registered for platform '{platform}'"))?,
        None => pick_default_adapter(registry)?,
    };

    let located = adapter
        .locate_session(&directory)?
        .ok_or_else(|| SyncError::NoSessionFound {
            platform: adapter.platform().to_string(),
            scope: directory.display().to_string(),
        })?;

    Ok((adapter, located))
}

/// With no platform flag, use the only available platform, or fall back
/// to Claude Code when several are installed.
fn pick_default_adapter(registry: &PlatformRegistry) -> Result<&dyn PlatformAdapter> {
    let available = registry.available();
    match available.as_slice() {
        [] => anyhow::bail!(
            "No supported CLI storage found on this machine. \
             Supported platforms: claude, gemini, q, codex."
        ),
        [only] => Ok(*only),
        _ => available
            .iter()
            .find(|a| a.platform() == Platform::Claude)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("Pass a platform flag to pick one explicitly")),
    }
}

/// Parse and upload a located session. Shared by the CLI and MCP paths.
pub fn upload_located(
    adapter: &dyn PlatformAdapter,
    client: &ApiClient,
    locator: &SessionLocator,
    overrides: &UploadOverrides,
) -> Result<UploadReceipt> {
    let session = adapter.parse_session(locator)?;
    let payload = build_upload_payload(&session, overrides);
    client.upload_session(&payload)
}

/// Handle the push command.
pub fn run(registry: &PlatformRegistry, client: &ApiClient, options: PushOptions) -> Result<()> {
    let (adapter, located) = resolve_candidate(registry, &options)?;

    let locator = match located {
        Located::Ready(locator) => locator,
        Located::Stale { locator, age } => {
            if options.force {
                locator
            } else if is_interactive() {
                println!(
                    "{} The latest {} checkpoint was saved {} ago.",
                    "WARNING:".yellow().bold(),
                    adapter.platform().display_name(),
                    format_age(age)
                );
                let proceed = Confirm::new("Upload it anyway?")
                    .with_default(false)
                    .with_help_message("It may not reflect your current conversation")
                    .prompt()
                    .unwrap_or(false);
                if !proceed {
                    println!("{}", "Push cancelled.".yellow());
                    return Ok(());
                }
                locator
            } else {
                // No terminal to ask: fail loudly rather than uploading
                // stale, misleading data from automation.
                let SessionLocator::File(path) = &locator else {
                    unreachable!("only file-backed checkpoints trip the staleness gate");
                };
                return Err(SyncError::StaleSession {
                    path: path.clone(),
                    age,
                }
                .into());
            }
        }
    };

    println!(
        "{} {} session from {}",
        "Uploading".cyan().bold(),
        adapter.platform().display_name(),
        locator.to_string().dimmed()
    );

    let receipt = upload_located(adapter, client, &locator, &options.overrides)?;
    crate::logger::log_to_file(&format!(
        "push: uploaded {} session {} as {}",
        adapter.platform(),
        locator,
        receipt.id
    ))
    .ok();

    println!(
        "{} Uploaded as {}",
        "SUCCESS:".green().bold(),
        receipt.id.bold()
    );
    if let Some(url) = receipt.url {
        println!("   {} {}", "Share:".dimmed(), url.underline());
    }
    Ok(())
}
