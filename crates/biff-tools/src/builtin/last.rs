// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use biff_model::{EventKind, LogoutReason};
use biff_relay::Relay;

use crate::format::{fmt_timestamp, render_table};
use crate::{ServerState, Tool, ToolCall, ToolOutput};

const DEFAULT_COUNT: u64 = 25;
const MAX_COUNT: u64 = 200;

pub struct LastTool {
    state: Arc<ServerState>,
}

impl LastTool {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Tool for LastTool {
    fn name(&self) -> &str {
        "last"
    }

    fn description(&self) -> String {
        "Show recent session history (logins and logouts), newest first.".into()
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "user": {
                    "type": "string",
                    "description": "Only show events for this login"
                },
                "count": {
                    "type": "integer",
                    "description": "Number of events (default 25, max 200)"
                }
            },
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let user = call
            .args
            .get("user")
            .and_then(|v| v.as_str())
            .map(|u| u.trim().trim_start_matches('@').to_string());
        let count = call
            .args
            .get("count")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_COUNT)
            .clamp(1, MAX_COUNT) as usize;

        let events = match self
            .state
            .relay
            .recent_events(user.as_deref(), count)
            .await
        {
            Ok(ev) => ev,
            Err(_) => return ToolOutput::err(&call.id, "Relay unavailable."),
        };
        if events.is_empty() {
            return ToolOutput::ok(&call.id, "No history.");
        }

        let rows: Vec<Vec<String>> = events
            .iter()
            .map(|ev| {
                vec![
                    ev.session.login.clone(),
                    match ev.kind {
                        EventKind::Login => "login",
                        EventKind::Logout => "logout",
                    }
                    .to_string(),
                    match ev.reason {
                        None => "-",
                        Some(LogoutReason::Normal) => "normal",
                        Some(LogoutReason::Orphan) => "orphan",
                        Some(LogoutReason::Ttl) => "ttl",
                    }
                    .to_string(),
                    fmt_timestamp(ev.timestamp),
                ]
            })
            .collect();
        let table = render_table(&["USER", "EVENT", "REASON", "TIME"], &rows);
        ToolOutput::ok(&call.id, table)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
