//! Platforms command handler
//!
//! Shows every registered adapter and whether its storage exists here.

use anyhow::Result;
use colored::Colorize;

use crate::platforms::PlatformRegistry;

/// Handle the platforms command.
pub fn run(registry: &PlatformRegistry) -> Result<()> {
    println!("{}", "Supported platforms".cyan().bold());
    println!("{}", "=".repeat(80).cyan());

    for adapter in registry.adapters() {
        let platform = adapter.platform();
        let status = if adapter.is_available() {
            "available".green()
        } else {
            "not found".dimmed()
        };

        println!(
            "\n{} ({}): {}",
            platform.display_name().bold(),
            platform.to_string().blue(),
            status
        );
        match adapter.storage_root() {
            Some(root) => println!("   {} {}", "Storage:".dimmed(), root.display()),
            None => println!(
                "   {} {}",
                "Storage:".dimmed(),
                "no home directory resolvable".dimmed()
            ),
        }
    }

    Ok(())
}
