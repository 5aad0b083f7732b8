//! Authentication command handlers
//!
//! Device-flow login against the sharing service, logout, and whoami.

use anyhow::{Context, Result};
use colored::Colorize;

use crate::api::ApiClient;
use crate::credentials::CredentialStore;

/// Handle the login command: run the device flow and persist the token.
pub fn handle_login(client: &ApiClient, store: &CredentialStore) -> Result<()> {
    let authorization = client
        .begin_device_login()
        .context("Failed to start the login flow")?;

    println!("{}", "Log in to agent-sync".cyan().bold());
    println!(
        "\nOpen {} and enter the code {}",
        authorization.verification_uri.underline(),
        authorization.user_code.bold()
    );
    println!("{}", "Waiting for the browser confirmation...".dimmed());

    let token = client.poll_device_token(&authorization.device_code)?;
    store.store_token(&token)?;

    println!("{} Logged in.", "SUCCESS:".green().bold());
    Ok(())
}

/// Handle the logout command.
pub fn handle_logout(store: &CredentialStore) -> Result<()> {
    store.clear_token()?;
    println!("{} Logged out.", "SUCCESS:".green().bold());
    Ok(())
}

/// Handle the whoami command.
pub fn handle_whoami(client: &ApiClient) -> Result<()> {
    let account = client.whoami()?;
    match (account.username, account.email) {
        (Some(username), Some(email)) => {
            println!("{} ({email})", username.bold());
        }
        (Some(username), None) => println!("{}", username.bold()),
        (None, Some(email)) => println!("{}", email.bold()),
        (None, None) => println!("{}", "Logged in (account has no profile details)".dimmed()),
    }
    Ok(())
}
