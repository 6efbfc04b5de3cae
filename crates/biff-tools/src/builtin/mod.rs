// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The seven built-in tools, one module each.

mod finger;
mod last;
mod mesg;
mod plan;
mod read_messages;
mod who;
mod write;

pub use finger::FingerTool;
pub use last::LastTool;
pub use mesg::MesgTool;
pub use plan::PlanTool;
pub use read_messages::ReadMessagesTool;
pub use who::WhoTool;
pub use write::WriteTool;

use std::sync::Arc;

use crate::{ServerState, ToolRegistry};

/// Register the full biff toolset against one server state.
pub fn build_registry(state: Arc<ServerState>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(PlanTool::new(state.clone()));
    registry.register(MesgTool::new(state.clone()));
    registry.register(WhoTool::new(state.clone()));
    registry.register(FingerTool::new(state.clone()));
    registry.register(WriteTool::new(state.clone()));
    registry.register(ReadMessagesTool::new(state.clone()));
    registry.register(LastTool::new(state));
    registry
}

// ─── Test fixtures ───────────────────────────────────────────────────────────
