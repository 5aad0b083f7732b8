//! MCP tool surface.
//!
//! A minimal JSON-RPC 2.0 server over stdin/stdout exposing three tools
//! whose input schemas mirror the CLI flags: `list_sessions`,
//! `push_session`, and `whoami`. Tool handlers are thin adapters over the
//! same operations the CLI uses; failures become structured `isError`
//! results so the calling agent can react instead of the process dying.

use anyhow::Result;
use serde_json::{json, Value};
use std::io::{BufRead, Write};
use std::path::PathBuf;

use crate::api::ApiClient;
use crate::error::SyncError;
use crate::handlers::{list, push};
use crate::payload::UploadOverrides;
use crate::platforms::{Located, PlatformRegistry};
use crate::session::Platform;

const PROTOCOL_VERSION: &str = "2024-11-05";

/// Stdio MCP server over an injected registry and API client.
pub struct McpServer<'a> {
    registry: &'a PlatformRegistry,
    client: &'a ApiClient,
}

impl<'a> McpServer<'a> {
    pub fn new(registry: &'a PlatformRegistry, client: &'a ApiClient) -> Self {
        McpServer { registry, client }
    }

    /// Serve until stdin closes.
    pub fn serve(&self) -> Result<()> {
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();

        for line in stdin.lock().lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(&line) {
                let mut out = stdout.lock();
                writeln!(out, "{}", serde_json::to_string(&response)?)?;
                out.flush()?;
            }
        }
        Ok(())
    }

    /// Handle one request line. Notifications produce no response.
    pub fn handle_line(&self, line: &str) -> Option<Value> {
        let request: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                return Some(error_response(Value::Null, -32700, &format!("parse error: {e}")))
            }
        };

        let id = request.get("id").cloned();
        let method = request.get("method").and_then(Value::as_str).unwrap_or("");
        let params = request.get("params").cloned().unwrap_or(Value::Null);

        // Requests without an id are notifications; process-and-drop.
        let id = id?;

        let result = match method {
            "initialize" => json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": "agent-sync",
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
            "ping" => json!({}),
            "tools/list" => json!({ "tools": tool_descriptors() }),
            "tools/call" => {
                let name = params.get("name").and_then(Value::as_str).unwrap_or("");
                let arguments = params.get("arguments").cloned().unwrap_or(json!({}));
                self.call_tool(name, &arguments)
            }
            other => {
                return Some(error_response(
                    id,
                    -32601,
                    &format!("method not found: {other}"),
                ))
            }
        };

        Some(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
    }

    /// Dispatch a tool call, folding any failure into an `isError` result.
    fn call_tool(&self, name: &str, arguments: &Value) -> Value {
        let outcome = match name {
            "list_sessions" => self.tool_list_sessions(arguments),
            "push_session" => self.tool_push_session(arguments),
            "whoami" => self.tool_whoami(),
            other => Err(anyhow::anyhow!("unknown tool: {other}")),
        };

        match outcome {
            Ok(text) => json!({
                "content": [{ "type": "text", "text": text }],
                "isError": false,
            }),
            Err(e) => json!({
                "content": [{ "type": "text", "text": format!("{e:#}") }],
                "isError": true,
            }),
        }
    }

    fn tool_list_sessions(&self, arguments: &Value) -> Result<String> {
        let platform = match arguments.get("platform").and_then(Value::as_str) {
            Some(id) => Some(
                Platform::from_id(id)
                    .ok_or_else(|| anyhow::anyhow!("unknown platform '{id}'"))?,
            ),
            None => None,
        };
        let directory = arguments
            .get("directory")
            .and_then(Value::as_str)
            .map(PathBuf::from);
        let all_projects = arguments
            .get("allProjects")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let project = if all_projects { None } else { directory };
        let sessions = list::collect_sessions(self.registry, platform, project.as_deref());
        Ok(serde_json::to_string_pretty(&sessions)?)
    }

    fn tool_push_session(&self, arguments: &Value) -> Result<String> {
        let platform = match arguments.get("platform").and_then(Value::as_str) {
            Some(id) => Some(
                Platform::from_id(id)
                    .ok_or_else(|| anyhow::anyhow!("unknown platform '{id}'"))?,
            ),
            None => None,
        };

        let options = push::PushOptions {
            platform,
            directory: arguments
                .get("directory")
                .and_then(Value::as_str)
                .map(PathBuf::from),
            file: arguments
                .get("file")
                .and_then(Value::as_str)
                .map(PathBuf::from),
            force: arguments
                .get("force")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            overrides: UploadOverrides {
                title: arguments
                    .get("title")
                    .and_then(Value::as_str)
                    .map(String::from),
                summary: arguments
                    .get("summary")
                    .and_then(Value::as_str)
                    .map(String::from),
                tags: arguments.get("tags").and_then(Value::as_array).map(|tags| {
                    tags.iter()
                        .filter_map(Value::as_str)
                        .map(String::from)
                        .collect()
                }),
                is_private: arguments.get("private").and_then(Value::as_bool),
            },
        };

        let (adapter, located) = push::resolve_candidate(self.registry, &options)?;
        let locator = match located {
            Located::Ready(locator) => locator,
            Located::Stale { locator, age } => {
                if options.force {
                    locator
                } else {
                    // MCP calls have no terminal to prompt on.
                    let crate::session::SessionLocator::File(path) = &locator else {
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

        let receipt = push::upload_located(adapter, self.client, &locator, &options.overrides)?;
        Ok(serde_json::to_string_pretty(&json!({
            "id": receipt.id,
            "url": receipt.url,
        }))?)
    }

    fn tool_whoami(&self) -> Result<String> {
        let account = self.client.whoami()?;
        Ok(serde_json::to_string_pretty(&json!({
            "email": account.email,
            "username": account.username,
        }))?)
    }
}

fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message },
    })
}

/// Tool descriptors; input schemas mirror the CLI flags.
fn tool_descriptors() -> Value {
    json!([
        {
            "name": "list_sessions",
            "description": "List local AI CLI sessions, newest first.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "platform": {
                        "type": "string",
                        "enum": ["claude", "gemini", "q", "codex"],
                        "description": "Restrict the scan to one platform"
                    },
                    "directory": {
                        "type": "string",
                        "description": "Project directory to scope the scan to"
                    },
                    "allProjects": {
                        "type": "boolean",
                        "description": "Scan every project instead of one directory"
                    }
                }
            }
        },
        {
            "name": "push_session",
            "description": "Upload the most recent session (or an explicit transcript file) to the sharing service.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "platform": {
                        "type": "string",
                        "enum": ["claude", "gemini", "q", "codex"]
                    },
                    "directory": { "type": "string" },
                    "file": { "type": "string" },
                    "title": { "type": "string" },
                    "summary": { "type": "string" },
                    "tags": { "type": "array", "items": { "type": "string" } },
                    "private": { "type": "boolean" },
                    "force": {
                        "type": "boolean",
                        "description": "Upload even if the latest checkpoint is stale"
                    }
                }
            }
        },
        {
            "name": "whoami",
            "description": "Show the account the stored token belongs to.",
            "inputSchema": { "type": "object", "properties": {} }
        }
    ])
}
