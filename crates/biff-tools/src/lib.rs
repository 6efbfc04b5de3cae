// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! `biff-tools` — the seven tool operations biff exposes over MCP:
//!
//! | tool            | does |
//! |-----------------|------|
//! | `plan`          | set the one-line status shown by `who`/`finger` |
//! | `mesg`          | toggle message display (BSD `mesg` convention) |
//! | `who`           | table of live sessions in this repository |
//! | `finger`        | presence block for one login |
//! | `write`         | send an ephemeral message to `user` or `user:tty` |
//! | `read_messages` | drain and show pending messages |
//! | `last`          | login/logout history |
//!
//! Tools validate their arguments, call the configured [`biff_relay::Relay`]
//! and return pre-formatted text.  They never panic and never leak an error
//! into the transport: every failure becomes a short result string.

pub mod builtin;
mod format;
mod registry;
mod state;
mod tool;

pub use builtin::build_registry;
pub use format::{fmt_idle, fmt_time, fmt_timestamp, preview, render_table};
pub use registry::{ToolRegistry, ToolSchema};
pub use state::{ReadDescription, ServerState, DEFAULT_READ_DESCRIPTION};
pub use tool::{Tool, ToolCall, ToolError, ToolOutput};
