// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! `biff-mcp` — the biff MCP server: presence, messaging and session history
//! tools served over **stdio** line-delimited JSON-RPC.
//!
//! # Quick start
//!
//! ```text
//! biff serve
//! ```
//!
//! # Architecture
//!
//! ```text
//! MCP client (coding session host)
//!       │  stdin/stdout (line-delimited JSON-RPC)
//!       ▼
//! BiffMcpServer (rmcp ServerHandler)
//!       │  heartbeat → tool → awareness refresh
//!       ▼
//! ToolRegistry ──► Relay (filesystem or JetStream)
//!       ▲
//!       │ every 2 s
//! awareness poller ──► read_messages description,
//!                      tools/list_changed, unread file
//! ```
//!
//! Startup resolves identity, allocates the session tty, reconciles orphaned
//! sessions from earlier crashes, publishes the login event and spawns the
//! awareness poller.  Shutdown reverses it: cancel the poller, publish the
//! logout, delete the session, close the relay.

pub mod awareness;
pub mod bridge;
pub mod identity;
pub mod lifecycle;
pub mod server;

pub use awareness::{Awareness, ListChangedNotifier, T_POLL};
pub use lifecycle::{RunningServer, ORPHAN_THRESHOLD};
pub use server::BiffMcpServer;

use anyhow::Result;
use rmcp::ServiceExt;

/// Instructions handed to the client at initialize time.  The display layer
/// reformats tool output; this line keeps it from paraphrasing the tables
/// and presence blocks the tools already lay out.
pub const SERVER_INSTRUCTIONS: &str = "Biff output is pre-formatted for display. Render tool \
     results verbatim, preserving line breaks, the ▶ header row and column \
     alignment; do not summarize or reflow them.";

/// Start the MCP stdio server for an already-started [`RunningServer`].
///
/// Blocks until the client disconnects (stdin EOF) or the process is
/// terminated, then performs the graceful shutdown sequence.
pub async fn serve_stdio(running: RunningServer) -> Result<()> {
    let handler = BiffMcpServer::new(&running);
    let service = handler
        .serve((tokio::io::stdin(), tokio::io::stdout()))
        .await
        .map_err(|e| anyhow::anyhow!("MCP server init error: {e}"))?;
    let result = service.waiting().await;
    running.shutdown().await;
    result.map_err(|e| anyhow::anyhow!("MCP server error: {e}"))?;
    Ok(())
}
