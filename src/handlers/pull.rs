//! Pull command handler
//!
//! Downloads an uploaded session, translates its embedded working-directory
//! references to the restore target, and writes a platform-native session
//! file the upstream tool can load back unmodified.

use anyhow::{Context, Result};
use colored::Colorize;
use inquire::Confirm;
use std::path::PathBuf;

use crate::api::ApiClient;
use crate::payload::session_from_payload;
use crate::platforms::PlatformRegistry;
use crate::rewrite::{check_context, translate_session, ContextCheck};

use super::is_interactive;

/// Options for the `pull` command.
#[derive(Debug)]
pub struct PullOptions {
    /// Service-assigned session id to restore.
    pub id: String,
    /// Restore target directory (default: current).
    pub directory: Option<PathBuf>,
    /// Accept a project-name mismatch without prompting. Required for
    /// mismatched pulls in non-interactive contexts.
    pub yes: bool,
}

/// Handle the pull command.
pub fn run(registry: &PlatformRegistry, client: &ApiClient, options: PullOptions) -> Result<()> {
    let target = match &options.directory {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    println!(
        "{} session {}",
        "Fetching".cyan().bold(),
        options.id.bold()
    );
    let payload = client.fetch_session(&options.id)?;
    let mut session = session_from_payload(&payload)
        .with_context(|| format!("Session {} has an unusable payload", options.id))?;

    let adapter = registry
        .get(session.platform)
        .with_context(|| format!("No adapter registered for platform '{}'", session.platform))?;

    match check_context(&session, &target) {
        ContextCheck::SameProjectName | ContextCheck::NoRecordedDirectory => {}
        ContextCheck::DifferentProjectName { original, target } => {
            if !options.yes {
                if is_interactive() {
                    println!(
                        "{} This session was recorded in {} but is being restored into {}.",
                        "WARNING:".yellow().bold(),
                        original.display().to_string().bold(),
                        target.display().to_string().bold()
                    );
                    println!(
                        "{}",
                        "Files and dependencies it references may be missing in the new location."
                            .dimmed()
                    );
                    let proceed = Confirm::new("Restore here anyway?")
                        .with_default(false)
                        .prompt()
                        .unwrap_or(false);
                    if !proceed {
                        println!("{}", "Pull cancelled.".yellow());
                        return Ok(());
                    }
                } else {
                    anyhow::bail!(
                        "Session was recorded in {} but the restore target is {}; \
                         pass --yes to restore into a differently-named project without a prompt",
                        original.display(),
                        target.display()
                    );
                }
            }
        }
    }

    translate_session(&mut session, &target);
    let written = adapter.write_session(&session, &target)?;
    crate::logger::log_to_file(&format!(
        "pull: restored {} as {} session at {}",
        options.id,
        session.platform,
        written.display()
    ))
    .ok();

    println!(
        "{} Restored {} session to {}",
        "SUCCESS:".green().bold(),
        session.platform.display_name(),
        written.display().to_string().bold()
    );
    Ok(())
}
