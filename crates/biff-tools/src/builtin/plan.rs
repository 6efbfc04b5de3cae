// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use biff_relay::{Relay, RelayError};

use crate::{ServerState, Tool, ToolCall, ToolOutput};

const MAX_PLAN_CHARS: usize = 200;

pub struct PlanTool {
    state: Arc<ServerState>,
}

impl PlanTool {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Tool for PlanTool {
    fn name(&self) -> &str {
        "plan"
    }

    fn description(&self) -> String {
        "Set your plan — a one-line status teammates see in who and finger output.".into()
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "The plan text (max 200 characters)"
                }
            },
            "required": ["message"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(message) = call.args.get("message").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing 'message'");
        };
        let message = message.trim();
        if message.chars().count() > MAX_PLAN_CHARS {
            return ToolOutput::err(
                &call.id,
                format!("Plan too long (max {MAX_PLAN_CHARS} chars)."),
            );
        }

        match self.state.relay.set_plan(&self.state.key, message).await {
            Ok(()) => ToolOutput::ok(&call.id, format!("Plan set: {message}")),
            Err(RelayError::Unavailable(_)) => ToolOutput::err(&call.id, "Relay unavailable."),
            Err(e) => ToolOutput::err(&call.id, format!("Plan not set: {e}")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::builtin::testutil::{call, state};

    use super::*;

    #[tokio::test]
    async fn sets_plan_and_confirms() {
        let (_dir, state) = state().await;
        let tool = PlanTool::new(state.clone());
        let out = tool
            .execute(&call("plan", json!({"message": "fixing auth"})))
            .await;
        assert!(!out.is_error);
        assert_eq!(out.content, "Plan set: fixing auth");

        let stored = state.relay.get_session("kai").await.unwrap().unwrap();
        assert_eq!(stored.plan, "fixing auth");
    }

    #[tokio::test]
    async fn overlong_plan_is_rejected() {
        let (_dir, state) = state().await;
        let tool = PlanTool::new(state.clone());
        let long = "x".repeat(MAX_PLAN_CHARS + 1);
        let out = tool.execute(&call("plan", json!({"message": long}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("too long"));
        // Nothing was stored.
        let stored = state.relay.get_session("kai").await.unwrap().unwrap();
        assert_eq!(stored.plan, "");
    }

    #[tokio::test]
    async fn exactly_200_chars_is_accepted() {
        let (_dir, state) = state().await;
        let tool = PlanTool::new(state);
        let exact = "y".repeat(MAX_PLAN_CHARS);
        let out = tool.execute(&call("plan", json!({"message": exact}))).await;
        assert!(!out.is_error);
    }

    #[tokio::test]
    async fn missing_argument_errors() {
        let (_dir, state) = state().await;
        let tool = PlanTool::new(state);
        let out = tool.execute(&call("plan", json!({}))).await;
        assert!(out.is_error);
    }
}
