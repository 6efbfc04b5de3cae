// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use biff_relay::Relay;

use crate::format::{fmt_idle, fmt_timestamp, render_table};
use crate::{ServerState, Tool, ToolCall, ToolOutput};

pub struct WhoTool {
    state: Arc<ServerState>,
}

impl WhoTool {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Tool for WhoTool {
    fn name(&self) -> &str {
        "who"
    }

    fn description(&self) -> String {
        "List live sessions in this repository: who is on, since when, and what \
         they are working on."
            .into()
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let sessions = match self.state.relay.list_sessions().await {
            Ok(s) => s,
            Err(_) => return ToolOutput::err(&call.id, "Relay unavailable."),
        };
        if sessions.is_empty() {
            return ToolOutput::ok(&call.id, "No one is logged in.");
        }

        let rows: Vec<Vec<String>> = sessions
            .iter()
            .map(|s| {
                vec![
                    format!("@{}", s.login),
                    s.key.tty.clone(),
                    s.host.clone(),
                    if s.messages_enabled { "y" } else { "n" }.to_string(),
                    fmt_timestamp(s.started_at),
                    fmt_idle(s.last_active),
                    s.plan.clone(),
                ]
            })
            .collect();

        let table = render_table(
            &["NAME", "TTY", "HOST", "MESG", "LOGIN@", "IDLE", "PLAN"],
            &rows,
        );
        ToolOutput::ok(&call.id, table)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use biff_model::{Identity, SessionKey, UserSession};

    use crate::builtin::testutil::{call, state};

    use super::*;

    #[tokio::test]
    async fn lists_own_session_with_name_and_plan() {
        let (_dir, state) = state().await;
        state.relay.set_plan(&state.key, "fixing auth").await.unwrap();

        let tool = WhoTool::new(state);
        let out = tool.execute(&call("who", json!({}))).await;
        assert!(!out.is_error);
        assert!(out.content.starts_with("▶ NAME"));
        let row = out.content.lines().nth(1).unwrap();
        assert!(row.contains("@kai"));
        assert!(row.contains("fixing auth"));
    }

    #[tokio::test]
    async fn shows_all_live_sessions() {
        let (_dir, state) = state().await;
        let other = UserSession::start(
            &Identity {
                login: "eric".into(),
                display_name: "Eric".into(),
            },
            SessionKey::new("eric", "cc001122"),
            "laptop".into(),
            "/work".into(),
        );
        state.relay.put_session(&other).await.unwrap();

        let tool = WhoTool::new(state);
        let out = tool.execute(&call("who", json!({}))).await;
        assert_eq!(out.content.lines().count(), 3, "{}", out.content);
        assert!(out.content.contains("@eric"));
        assert!(out.content.contains("@kai"));
    }

    #[tokio::test]
    async fn mesg_column_reflects_state() {
        let (_dir, state) = state().await;
        state.relay.set_mesg(&state.key, false).await.unwrap();
        let tool = WhoTool::new(state);
        let out = tool.execute(&call("who", json!({}))).await;
        let row = out.content.lines().nth(1).unwrap();
        assert!(row.contains(" n "), "{row}");
    }

    #[tokio::test]
    async fn removed_session_never_listed() {
        let (_dir, state) = state().await;
        state.relay.remove_session(&state.key).await.unwrap();
        let tool = WhoTool::new(state);
        let out = tool.execute(&call("who", json!({}))).await;
        assert_eq!(out.content, "No one is logged in.");
    }
}
