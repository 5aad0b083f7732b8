use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use agent_sync::api::ApiClient;
use agent_sync::config::SyncConfig;
use agent_sync::credentials::CredentialStore;
use agent_sync::handlers::{self, auth, list, platforms, pull, push};
use agent_sync::logger;
use agent_sync::mcp::McpServer;
use agent_sync::payload::UploadOverrides;
use agent_sync::platforms::PlatformRegistry;

#[derive(Parser)]
#[command(name = "agent-sync")]
#[command(about = "Upload and restore AI coding-assistant CLI sessions", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug, Default)]
struct PlatformFlags {
    /// Select the Claude Code adapter
    #[arg(long)]
    claude: bool,

    /// Select the Gemini CLI adapter
    #[arg(long)]
    gemini: bool,

    /// Select the Amazon Q CLI adapter
    #[arg(long)]
    q: bool,

    /// Select the Codex CLI adapter
    #[arg(long)]
    codex: bool,
}

impl PlatformFlags {
    fn collect(&self) -> Vec<agent_sync::session::Platform> {
        handlers::platform_flags(self.claude, self.gemini, self.q, self.codex)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List local sessions, newest first
    List {
        #[command(flatten)]
        platform: PlatformFlags,

        /// Scan every project instead of the current directory's sessions
        #[arg(long)]
        all_projects: bool,

        /// Project directory to scope the scan to
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Emit machine-readable JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Upload the most recent session for a directory
    Push {
        #[command(flatten)]
        platform: PlatformFlags,

        /// Directory whose latest session to upload (default: current)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Upload a specific transcript file (platform auto-detected)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Title shown on the shared session
        #[arg(short, long)]
        title: Option<String>,

        /// Short summary shown on the shared session
        #[arg(long)]
        summary: Option<String>,

        /// Comma-separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Option<Vec<String>>,

        /// Mark the shared session private
        #[arg(long)]
        private: bool,

        /// Upload even if the latest checkpoint is stale
        #[arg(long)]
        force: bool,
    },

    /// Download an uploaded session and restore it as a native session
    Pull {
        /// Session id assigned at upload time
        id: String,

        /// Restore target directory (default: current)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Accept a project-name mismatch without prompting
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Show every supported platform and whether its storage exists here
    Platforms,

    /// Log in to the sharing service via the device flow
    Login,

    /// Forget the stored credential
    Logout,

    /// Show the account the stored token belongs to
    Whoami,

    /// Serve the MCP tool surface over stdio
    Mcp,
}

fn main() -> Result<()> {
    logger::init_logger()?;

    let cli = Cli::parse();
    let config = SyncConfig::load()?;
    let store = CredentialStore::new()?;
    let registry = PlatformRegistry::new();

    match cli.command {
        Commands::List {
            platform,
            all_projects,
            dir,
            json,
        } => {
            let flags = platform.collect();
            let selected = registry.resolve_flags(&flags)?.map(|a| a.platform());
            list::run(
                &registry,
                list::ListOptions {
                    platform: selected,
                    all_projects,
                    directory: dir,
                    json,
                },
            )?;
        }

        Commands::Push {
            platform,
            dir,
            file,
            title,
            summary,
            tags,
            private,
            force,
        } => {
            let flags = platform.collect();
            let selected = registry.resolve_flags(&flags)?.map(|a| a.platform());
            let client = ApiClient::new(config.api_base_url.clone(), store.token())?;
            push::run(
                &registry,
                &client,
                push::PushOptions {
                    platform: selected,
                    directory: dir,
                    file,
                    force,
                    overrides: UploadOverrides {
                        title,
                        summary,
                        tags,
                        is_private: if private { Some(true) } else { None },
                    },
                },
            )?;
        }

        Commands::Pull { id, dir, yes } => {
            let client = ApiClient::new(config.api_base_url.clone(), store.token())?;
            pull::run(
                &registry,
                &client,
                pull::PullOptions {
                    id,
                    directory: dir,
                    yes,
                },
            )?;
        }

        Commands::Platforms => platforms::run(&registry)?,

        Commands::Login => {
            let client = ApiClient::new(config.api_base_url.clone(), None)?;
            auth::handle_login(&client, &store)?;
        }

        Commands::Logout => auth::handle_logout(&store)?,

        Commands::Whoami => {
            let client = ApiClient::new(config.api_base_url.clone(), store.token())?;
            auth::handle_whoami(&client)?;
        }

        Commands::Mcp => {
            let client = ApiClient::new(config.api_base_url.clone(), store.token())?;
            McpServer::new(&registry, &client).serve()?;
        }
    }

    Ok(())
}
