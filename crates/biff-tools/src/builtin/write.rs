// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use biff_model::{Address, Message};
use biff_relay::Relay;

use crate::{ServerState, Tool, ToolCall, ToolError, ToolOutput};

const MAX_BODY_CHARS: usize = 4096;

pub struct WriteTool {
    state: Arc<ServerState>,
}

impl WriteTool {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    async fn send(&self, to: &str, body: &str) -> Result<Address, ToolError> {
        if body.trim().is_empty() {
            return Err(ToolError::EmptyMessage);
        }
        if body.chars().count() > MAX_BODY_CHARS {
            return Err(ToolError::InvalidInput(format!(
                "message exceeds {MAX_BODY_CHARS} chars"
            )));
        }
        let addr: Address = to
            .parse()
            .map_err(|e: biff_model::AddressParseError| ToolError::InvalidAddress(e.to_string()))?;

        let message = Message::new(self.state.key.clone(), addr.clone(), body);
        self.state.relay.deliver(&message).await?;
        Ok(addr)
    }
}

#[async_trait]
impl Tool for WriteTool {
    fn name(&self) -> &str {
        "write"
    }

    fn description(&self) -> String {
        let mut desc = String::from(
            "Send an ephemeral message to a teammate. Address 'user' reaches \
             whichever of their sessions reads first; 'user:tty' reaches one \
             specific session (tty as shown by who).",
        );
        let members = &self.state.config.team.members;
        if !members.is_empty() {
            desc.push_str(&format!(" Team: {}.", members.join(", ")));
        }
        desc
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "to": {
                    "type": "string",
                    "description": "Recipient: 'user' (broadcast) or 'user:tty' (targeted)"
                },
                "message": {
                    "type": "string",
                    "description": "Message body (1..4096 characters)"
                }
            },
            "required": ["to", "message"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(to) = call.args.get("to").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "Message failed: invalid input");
        };
        let Some(body) = call.args.get("message").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "Message failed: invalid input");
        };

        match self.send(to, body).await {
            Ok(Address::User { login }) => {
                ToolOutput::ok(&call.id, format!("Message sent to @{login}"))
            }
            Ok(Address::Session { key }) => {
                ToolOutput::ok(&call.id, format!("Message sent to {key}"))
            }
            Err(e) => ToolOutput::err(&call.id, format!("Message failed: {}", e.kind())),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
