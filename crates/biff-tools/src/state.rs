// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::{Arc, RwLock};

use biff_config::{Config, Paths};
use biff_model::{Identity, SessionKey};
use biff_relay::Relay;

/// Description shown for `read_messages` when nothing is pending.
pub const DEFAULT_READ_DESCRIPTION: &str = "Check messages.";

/// The live description of the `read_messages` tool.
///
/// Written by the awareness engine, read on every `tools/list`.  This is the
/// only mutable tool metadata in the process.
#[derive(Debug, Clone)]
pub struct ReadDescription(Arc<RwLock<String>>);

impl ReadDescription {
    pub fn new() -> Self {
        Self(Arc::new(RwLock::new(DEFAULT_READ_DESCRIPTION.to_string())))
    }

    pub fn get(&self) -> String {
        // A poisoned lock still holds valid text; recover rather than panic.
        self.0
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the description; returns true when the text actually changed.
    pub fn set(&self, text: String) -> bool {
        let mut guard = self.0.write().unwrap_or_else(|e| e.into_inner());
        if *guard == text {
            false
        } else {
            *guard = text;
            true
        }
    }
}

impl Default for ReadDescription {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a tool handler needs, constructed once in the startup path and
/// passed around as `Arc<ServerState>`.  There are no process-wide globals.
pub struct ServerState {
    pub identity: Identity,
    /// This process's session key (`login:tty`).
    pub key: SessionKey,
    pub host: String,
    pub cwd: String,
    /// Sanitized repository name scoping every relay resource.
    pub repo: String,
    pub config: Config,
    pub paths: Paths,
    pub relay: Arc<dyn Relay>,
    pub read_description: ReadDescription,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_description_is_plain() {
        let desc = ReadDescription::new();
        assert_eq!(desc.get(), DEFAULT_READ_DESCRIPTION);
    }

    #[test]
    fn set_reports_change() {
        let desc = ReadDescription::new();
        assert!(desc.set("Check messages (1 unread: hi). Marks all as read.".into()));
        assert!(!desc.set("Check messages (1 unread: hi). Marks all as read.".into()));
        assert!(desc.set(DEFAULT_READ_DESCRIPTION.into()));
    }

    #[test]
    fn clones_share_the_same_cell() {
        let a = ReadDescription::new();
        let b = a.clone();
        a.set("changed".into());
        assert_eq!(b.get(), "changed");
    }
}
