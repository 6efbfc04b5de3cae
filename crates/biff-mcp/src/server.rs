// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! [`BiffMcpServer`] — the rmcp [`ServerHandler`] implementation.
//!
//! Wraps the biff [`ToolRegistry`] and implements `tools/list` and
//! `tools/call`; all other MCP lifecycle methods (initialize, shutdown,
//! ping) are handled by the default rmcp implementations.
//!
//! `call_tool` is where the per-call side effects of the whole server live:
//! the heartbeat runs before the tool's primary action, and one synchronous
//! awareness refresh runs after it.  The request's transport session is
//! captured on the way through so the background poller can emit
//! `tools/list_changed` without a request at hand.

use std::sync::Arc;

use async_trait::async_trait;
use rmcp::{
    handler::server::ServerHandler,
    model::{
        CallToolRequestParams, CallToolResult, ListToolsResult, PaginatedRequestParams,
        ServerCapabilities, ServerInfo,
    },
    service::{Peer, RequestContext, RoleServer},
    ErrorData as McpError,
};
use tracing::debug;
use uuid::Uuid;

use biff_relay::Relay;
use biff_tools::{ServerState, ToolCall, ToolRegistry};

use crate::awareness::{Awareness, ListChangedNotifier};
use crate::bridge::{output_to_call_result, schema_to_mcp_tool};
use crate::lifecycle::RunningServer;
use crate::SERVER_INSTRUCTIONS;

#[derive(Clone)]
pub struct BiffMcpServer {
    state: Arc<ServerState>,
    registry: Arc<ToolRegistry>,
    awareness: Arc<Awareness>,
}

impl BiffMcpServer {
    pub fn new(running: &RunningServer) -> Self {
        Self {
            state: running.state.clone(),
            registry: running.registry.clone(),
            awareness: running.awareness.clone(),
        }
    }
}

/// Adapter from a live rmcp peer to the awareness notification seam.
struct PeerNotifier(Peer<RoleServer>);

#[async_trait]
impl ListChangedNotifier for PeerNotifier {
    async fn notify_tools_list_changed(&self) -> Result<(), String> {
        self.0
            .notify_tool_list_changed()
            .await
            .map_err(|e| e.to_string())
    }
}

/// Tools capability with `listChanged` advertised — the awareness engine
/// mutates the `read_messages` description at runtime.
fn server_capabilities() -> ServerCapabilities {
    let mut capabilities = ServerCapabilities::builder().enable_tools().build();
    if let Some(tools) = capabilities.tools.as_mut() {
        tools.list_changed = Some(true);
    }
    capabilities
}

impl ServerHandler for BiffMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: server_capabilities(),
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
            ..ServerInfo::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let registry = self.registry.clone();
        async move {
            let tools = registry
                .schemas()
                .into_iter()
                .map(schema_to_mcp_tool)
                .collect();
            Ok(ListToolsResult {
                tools,
                next_cursor: None,
                meta: None,
            })
        }
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        // Cache the request's transport session for the poller.
        self.awareness
            .capture_notifier(Arc::new(PeerNotifier(context.peer.clone())))
            .await;

        // Heartbeat before the primary action; a failed heartbeat never
        // blocks the tool itself.
        if let Err(e) = self.state.relay.touch_session(&self.state.key).await {
            debug!(error = %e, "heartbeat skipped");
        }

        let args = request
            .arguments
            .map(|m| serde_json::Value::Object(m.into_iter().collect()))
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));
        let call = ToolCall {
            id: Uuid::new_v4().to_string(),
            name: request.name.to_string(),
            args,
        };
        let output = self.registry.execute(&call).await;

        // Happy-path refresh: description + unread file without waiting for
        // the next poll tick.
        self.awareness.refresh_after_tool().await;

        Ok(output_to_call_result(output))
    }
}

// ─── Unit tests ───────────────────────────────────────────────────────────────
//
// The parts testable without an active transport or RequestContext; the
// tool round-trips live in tests/integration.rs.
