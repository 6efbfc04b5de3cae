// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who the current process is running as.
///
/// Resolved once at startup from the identity authority and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub login: String,
    pub display_name: String,
}

/// The composite address of one live session: `"{login}:{tty}"`.
///
/// `tty` is an 8-hex-char token allocated at process startup; it disambiguates
/// multiple concurrent sessions of the same login.  A bare `login` (no tty)
/// is the broadcast address and is represented by [`crate::Address::User`],
/// not by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub login: String,
    pub tty: String,
}

impl SessionKey {
    pub fn new(login: impl Into<String>, tty: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            tty: tty.into(),
        }
    }

    /// Allocate a fresh random tty token (8 lowercase hex chars).
    pub fn allocate(login: impl Into<String>) -> Self {
        let tty = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        Self::new(login, tty)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.login, self.tty)
    }
}

/// One live session as stored in the relay.
///
/// Created at server startup, refreshed (`last_active`) on every tool call,
/// mutated by the `plan` and `mesg` tools, removed on logout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    pub key: SessionKey,
    pub login: String,
    pub display_name: String,
    pub host: String,
    pub cwd: String,
    pub started_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub messages_enabled: bool,
    #[serde(default)]
    pub plan: String,
}

impl UserSession {
    /// Fresh session for `identity` under `key`, started now.
    pub fn start(identity: &Identity, key: SessionKey, host: String, cwd: String) -> Self {
        let now = Utc::now();
        Self {
            key,
            login: identity.login.clone(),
            display_name: identity.display_name.clone(),
            host,
            cwd,
            started_at: now,
            last_active: now,
            messages_enabled: true,
            plan: String::new(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
