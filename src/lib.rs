//! # agent-sync
//!
//! A command-line tool for uploading and restoring AI coding-assistant CLI
//! sessions through a remote sharing service.
//!
//! ## Overview
//!
//! `agent-sync` discovers chat transcripts stored locally by four CLI tools
//! (Claude Code, Gemini CLI, Amazon Q, Codex), normalizes them into one
//! canonical representation, and pushes them to, or restores them from,
//! a sharing service over HTTP. Each tool keeps its history in its own
//! undocumented format: line-delimited JSON, JSON checkpoint files, a
//! SQLite key-value table, or timestamped directory trees of JSONL.
//!
//! ## Architecture
//!
//! Everything platform-specific lives behind the adapter layer; the rest
//! of the system never branches on platform identity:
//!
//! - Canonical session model and listing projections ([`session`])
//! - The adapter trait, per-platform adapters, and the registry
//!   ([`platforms`])
//! - Upload payload construction and its inverse ([`payload`])
//! - Working-directory translation on restore ([`rewrite`])
//! - The sharing-service client with retries and device-flow login
//!   ([`api`])
//! - Credential persistence ([`credentials`]), settings ([`config`]),
//!   logging ([`logger`]), and the user-facing error taxonomy ([`error`])
//! - CLI command handlers ([`handlers`]) and the MCP tool surface
//!   ([`mcp`])

/// Sharing-service HTTP client.
///
/// Wraps an injectable transport with bearer auth, bounded retries with
/// exponential backoff (non-4xx failures only), and the device-flow login
/// poll loop. Constructed explicitly and passed down so tests can inject
/// fake transports.
pub mod api;

/// Configuration directory management and persisted settings.
///
/// Locates the platform-conventional config directory (XDG on Linux,
/// Application Support on macOS, AppData on Windows) and loads the
/// TOML settings file, with an environment override for the API base URL.
pub mod config;

/// Credential token persistence.
///
/// Resolves the auth token from the environment first, then a JSON token
/// file in the config directory. Corrupt token files degrade to
/// "not logged in" instead of aborting.
pub mod credentials;

/// User-facing error taxonomy.
///
/// The five terminal error classes commands can end in: not-found,
/// format-mismatch, staleness-rejected, API error, and missing
/// authentication. Internal propagation stays on `anyhow`.
pub mod error;

/// CLI command handlers.
///
/// Thin orchestration per subcommand. Handlers own every interactive
/// prompt (staleness confirmation, context-mismatch confirmation) and all
/// terminal output; the core returns structured decisions for them.
pub mod handlers;

/// Logging configuration.
///
/// Console logging via `RUST_LOG` plus a persistent log file in the
/// config directory with size-based rotation.
pub mod logger;

/// MCP tool surface.
///
/// A stdio JSON-RPC server exposing `list_sessions`, `push_session`, and
/// `whoami`; handlers mirror the CLI flags and return structured error
/// results instead of exiting.
pub mod mcp;

/// Upload payload construction and its inverse.
///
/// Merges canonical sessions with caller overrides (caller > derived >
/// default), spreading raw native history wholesale for platforms that
/// cannot be flattened losslessly.
pub mod payload;

/// The platform adapter layer.
///
/// One adapter per supported tool: session location (including the
/// staleness gate), native format parsing across historical sub-variants,
/// cheap listing, structural content detection, and restore writing,
/// plus the registry that dispatches over them.
pub mod platforms;

/// Working-directory translation for the restore path.
///
/// Rewrites embedded references to the recorded working directory across
/// every message, and classifies whether the restore target looks like
/// the same project relocated or a different one.
pub mod rewrite;

/// Canonical session model.
///
/// The normalized conversation representation every adapter produces and
/// every uploader consumes, the lightweight listing projection, and the
/// shared preview rules.
pub mod session;
