// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use biff_relay::RelayError;

/// A single tool invocation requested by the client.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Opaque identifier assigned by the transport (forwarded verbatim)
    pub id: String,
    pub name: String,
    /// Parsed JSON arguments
    pub args: Value,
}

/// The result of executing a tool: plain text plus an error flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub call_id: String,
    pub content: String,
    /// True when the tool failed non-fatally (the content is the error text).
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn err(call_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: msg.into(),
            is_error: true,
        }
    }
}

/// Everything that can go wrong inside a tool.  Handlers render these into
/// result strings; nothing here ever crosses the transport as an exception.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("empty message")]
    EmptyMessage,

    #[error("relay unavailable")]
    RelayUnavailable,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ToolError {
    /// Short kind label for `"Message failed: <kind>"` style results.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::InvalidInput(_) => "invalid input",
            ToolError::InvalidAddress(_) => "invalid address",
            ToolError::EmptyMessage => "empty message",
            ToolError::RelayUnavailable => "relay unavailable",
            ToolError::Internal(_) => "internal error",
        }
    }
}

impl From<RelayError> for ToolError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::Unavailable(_) => ToolError::RelayUnavailable,
            RelayError::InvalidAddress(a) => ToolError::InvalidAddress(a),
            RelayError::Internal(m) => ToolError::Internal(m),
        }
    }
}

/// Trait every biff tool implements.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    /// Returned fresh on every `tools/list`; the `read_messages` description
    /// is mutable, so this is `String` rather than `&str`.
    fn description(&self) -> String;
    /// JSON Schema for parameters
    fn parameters_schema(&self) -> Value;
    /// Execute the tool.  Errors should be wrapped in [`ToolOutput::err`].
    async fn execute(&self, call: &ToolCall) -> ToolOutput;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_output_is_not_error() {
        let out = ToolOutput::ok("1", "done");
        assert!(!out.is_error);
        assert_eq!(out.content, "done");
    }

    #[test]
    fn err_output_sets_flag() {
        let out = ToolOutput::err("1", "boom");
        assert!(out.is_error);
    }

    #[test]
    fn relay_unavailable_maps_to_tool_kind() {
        let err: ToolError = RelayError::Unavailable("down".into()).into();
        assert_eq!(err.kind(), "relay unavailable");
    }

    #[test]
    fn relay_invalid_address_preserves_detail() {
        let err: ToolError = RelayError::InvalidAddress("x!".into()).into();
        assert!(matches!(err, ToolError::InvalidAddress(a) if a == "x!"));
    }

    #[test]
    fn kind_labels_are_short_and_lowercase() {
        for err in [
            ToolError::InvalidInput("x".into()),
            ToolError::InvalidAddress("x".into()),
            ToolError::EmptyMessage,
            ToolError::RelayUnavailable,
            ToolError::Internal("x".into()),
        ] {
            let kind = err.kind();
            assert!(!kind.is_empty());
            assert_eq!(kind, kind.to_lowercase());
        }
    }
}
