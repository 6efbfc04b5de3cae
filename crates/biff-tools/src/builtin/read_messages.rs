// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use biff_relay::Relay;

use crate::format::{fmt_time, render_table};
use crate::{ReadDescription, ServerState, Tool, ToolCall, ToolOutput};

/// Drains both inboxes of the current session and renders the result.
///
/// The description is the awareness engine's main surface: it is rewritten to
/// carry the unread count and a preview whenever messages are pending, so the
/// client re-fetching the tool list sees the nudge without any push channel.
pub struct ReadMessagesTool {
    state: Arc<ServerState>,
    description: ReadDescription,
}

impl ReadMessagesTool {
    pub fn new(state: Arc<ServerState>) -> Self {
        let description = state.read_description.clone();
        Self { state, description }
    }
}

#[async_trait]
impl Tool for ReadMessagesTool {
    fn name(&self) -> &str {
        "read_messages"
    }

    fn description(&self) -> String {
        self.description.get()
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let key = &self.state.key;
        let messages = match self.state.relay.drain_for(&key.login, &key.tty).await {
            Ok(m) => m,
            // Unread state is untouched: the drain failed, nothing was consumed.
            Err(_) => return ToolOutput::err(&call.id, "Relay unavailable."),
        };
        if messages.is_empty() {
            return ToolOutput::ok(&call.id, "No new messages.");
        }

        let rows: Vec<Vec<String>> = messages
            .iter()
            .map(|m| {
                vec![
                    fmt_time(m.sent_at),
                    key.login.clone(),
                    format!("from {}", m.from_session.login),
                    m.body.clone(),
                ]
            })
            .collect();
        let table = render_table(&["TIME", "TO", "FROM", "MESSAGE"], &rows);
        ToolOutput::ok(&call.id, table)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use biff_model::{Address, Message, SessionKey};

    use crate::builtin::testutil::{call, state};

    use super::*;

    fn from_eric(to: &str, body: &str) -> Message {
        Message::new(
            SessionKey::new("eric", "cc001122"),
            to.parse::<Address>().unwrap(),
            body,
        )
    }

    #[tokio::test]
    async fn empty_inbox_says_no_new_messages() {
        let (_dir, state) = state().await;
        let tool = ReadMessagesTool::new(state);
        let out = tool.execute(&call("read_messages", json!({}))).await;
        assert!(!out.is_error);
        assert_eq!(out.content, "No new messages.");
    }

    #[tokio::test]
    async fn renders_table_row_then_drains() {
        let (_dir, state) = state().await;
        state
            .relay
            .deliver(&from_eric("kai:aabb1122", "hi"))
            .await
            .unwrap();

        let tool = ReadMessagesTool::new(state);
        let out = tool.execute(&call("read_messages", json!({}))).await;
        assert!(out.content.starts_with("▶ TIME"));
        assert!(out.content.contains("kai"));
        assert!(out.content.contains("from eric"));
        assert!(out.content.contains("hi"));

        // POP semantics: second read finds nothing.
        let again = tool.execute(&call("read_messages", json!({}))).await;
        assert_eq!(again.content, "No new messages.");
    }

    #[tokio::test]
    async fn merges_broadcast_and_targeted_in_sent_order() {
        let (_dir, state) = state().await;
        let mut first = from_eric("kai", "first");
        let mut second = from_eric("kai:aabb1122", "second");
        first.sent_at = chrono::Utc::now() - chrono::Duration::seconds(5);
        second.sent_at = chrono::Utc::now();
        state.relay.deliver(&second).await.unwrap();
        state.relay.deliver(&first).await.unwrap();

        let tool = ReadMessagesTool::new(state);
        let out = tool.execute(&call("read_messages", json!({}))).await;
        let first_pos = out.content.find("first").unwrap();
        let second_pos = out.content.find("second").unwrap();
        assert!(first_pos < second_pos, "{}", out.content);
    }

    #[tokio::test]
    async fn mesg_off_still_reveals_on_demand() {
        let (_dir, state) = state().await;
        state.relay.set_mesg(&state.key, false).await.unwrap();
        state.relay.deliver(&from_eric("kai", "dnd")).await.unwrap();

        let tool = ReadMessagesTool::new(state);
        let out = tool.execute(&call("read_messages", json!({}))).await;
        assert!(out.content.contains("dnd"));
    }

    #[tokio::test]
    async fn description_follows_shared_state() {
        let (_dir, state) = state().await;
        let tool = ReadMessagesTool::new(state.clone());
        assert_eq!(tool.description(), crate::DEFAULT_READ_DESCRIPTION);

        state
            .read_description
            .set("Check messages (2 unread: hi…). Marks all as read.".into());
        assert!(tool.description().contains("2 unread"));
    }
}
