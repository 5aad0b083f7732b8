//! List command handler
//!
//! Scans every requested platform for sessions and renders them as a
//! colored table or JSON. Per-platform scans fan out on scoped threads and
//! fail independently: one broken storage tree never hides the others.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};

use crate::platforms::PlatformRegistry;
use crate::session::{Platform, SessionInfo};

/// Options for the `list` command.
#[derive(Debug, Default)]
pub struct ListOptions {
    pub platform: Option<Platform>,
    /// Scan all projects instead of just the current directory's.
    pub all_projects: bool,
    /// Directory to scope the scan to (defaults to the current directory).
    pub directory: Option<PathBuf>,
    pub json: bool,
}

/// Collect sessions across adapters, one scan per platform, concurrently.
/// Individual platform failures are logged and skipped.
pub fn collect_sessions(
    registry: &PlatformRegistry,
    platform: Option<Platform>,
    project: Option<&Path>,
) -> Vec<SessionInfo> {
    let adapters: Vec<_> = match platform {
        Some(platform) => registry.get(platform).into_iter().collect(),
        None => registry.available(),
    };

    let mut sessions = Vec::new();
    std::thread::scope(|scope| {
        let handles: Vec<_> = adapters
            .iter()
            .map(|adapter| {
                scope.spawn(move || (adapter.platform(), adapter.list_sessions(project)))
            })
            .collect();

        for handle in handles {
            match handle.join() {
                Ok((_, Ok(mut found))) => sessions.append(&mut found),
                Ok((platform, Err(e))) => {
                    log::warn!("Scanning {platform} sessions failed: {e}");
                }
                Err(_) => log::warn!("A platform scan panicked; skipping its results"),
            }
        }
    });

    sessions.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
    sessions
}

/// Handle the list command.
pub fn run(registry: &PlatformRegistry, options: ListOptions) -> Result<()> {
    let cwd;
    let project: Option<&Path> = if options.all_projects {
        None
    } else {
        match &options.directory {
            Some(dir) => Some(dir.as_path()),
            None => {
                cwd = std::env::current_dir().context("Failed to get current directory")?;
                Some(cwd.as_path())
            }
        }
    };

    let sessions = collect_sessions(registry, options.platform, project);

    if options.json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("{}", "No sessions found.".yellow());
        if let Some(project) = project {
            println!(
                "{}",
                format!(
                    "Searched for sessions recorded in {}; try --all-projects for a wider scan.",
                    project.display()
                )
                .dimmed()
            );
        }
        return Ok(());
    }

    println!("{}", "Sessions".cyan().bold());
    println!("{}", "=".repeat(80).cyan());

    for (idx, session) in sessions.iter().enumerate() {
        println!(
            "\n{} [{}] {}",
            format!("{}.", idx + 1).bold(),
            session.platform.to_string().blue(),
            if session.preview.is_empty() {
                "(no user message)".dimmed().to_string()
            } else {
                session.preview.clone()
            }
        );
        println!(
            "   {} {}",
            "Modified:".dimmed(),
            session.last_modified.format("%Y-%m-%d %H:%M:%S UTC")
        );
        println!("   {} {}", "Messages:".dimmed(), session.message_count);
        if let Some(project_path) = &session.project_path {
            println!("   {} {}", "Project:".dimmed(), project_path.display());
        }
        println!("   {} {}", "Source:".dimmed(), session.locator);
    }

    println!(
        "\n{} {} session(s)",
        "Total:".bold(),
        sessions.len()
    );
    Ok(())
}
