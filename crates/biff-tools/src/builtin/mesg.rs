// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use biff_relay::{Relay, RelayError};

use crate::{ServerState, Tool, ToolCall, ToolOutput};

pub struct MesgTool {
    state: Arc<ServerState>,
}

impl MesgTool {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Tool for MesgTool {
    fn name(&self) -> &str {
        "mesg"
    }

    fn description(&self) -> String {
        "Enable or disable message display for this session (BSD mesg). \
         Incoming messages still accumulate while disabled and appear on the \
         next read_messages."
            .into()
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "enabled": {
                    "type": "boolean",
                    "description": "true = messages on (is y), false = off (is n)"
                }
            },
            "required": ["enabled"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(enabled) = call.args.get("enabled").and_then(|v| v.as_bool()) else {
            return ToolOutput::err(&call.id, "missing 'enabled'");
        };

        match self.state.relay.set_mesg(&self.state.key, enabled).await {
            Ok(()) => ToolOutput::ok(&call.id, if enabled { "is y" } else { "is n" }),
            Err(RelayError::Unavailable(_)) => ToolOutput::err(&call.id, "Relay unavailable."),
            Err(e) => ToolOutput::err(&call.id, format!("mesg not changed: {e}")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
