// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use biff_model::UserSession;
use biff_relay::Relay;

use crate::format::{fmt_idle, fmt_timestamp};
use crate::{ServerState, Tool, ToolCall, ToolOutput};

pub struct FingerTool {
    state: Arc<ServerState>,
}

impl FingerTool {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    fn render(session: &UserSession) -> String {
        let mut lines = vec![
            format!(
                "Login: {:<24} Name: {}",
                session.login, session.display_name
            ),
            format!("Host: {:<25} Directory: {}", session.host, session.cwd),
            format!(
                "On since {} on {}",
                fmt_timestamp(session.started_at),
                session.key.tty
            ),
            format!("Idle: {}", fmt_idle(session.last_active)),
            format!(
                "Messages: {}",
                if session.messages_enabled { "on" } else { "off" }
            ),
        ];
        if session.plan.is_empty() {
            lines.push("No plan.".to_string());
        } else {
            lines.push(format!("Plan: {}", session.plan));
        }
        lines.join("\n")
    }
}

#[async_trait]
impl Tool for FingerTool {
    fn name(&self) -> &str {
        "finger"
    }

    fn description(&self) -> String {
        "Show one teammate's presence: host, directory, on-since time, idle, \
         message status and plan."
            .into()
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "user": {
                    "type": "string",
                    "description": "Login to look up"
                }
            },
            "required": ["user"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(user) = call.args.get("user").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing 'user'");
        };
        let user = user.trim().trim_start_matches('@');

        match self.state.relay.get_session(user).await {
            Ok(Some(session)) => ToolOutput::ok(&call.id, Self::render(&session)),
            // Absence is an answer, not an error.
            Ok(None) => ToolOutput::ok(&call.id, "Never logged in."),
            Err(_) => ToolOutput::err(&call.id, "Relay unavailable."),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
