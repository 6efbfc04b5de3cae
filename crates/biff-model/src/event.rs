// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::SessionKey;

/// What happened to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Login,
    Logout,
}

/// Why a session was logged out.  `Normal` is the graceful path; `Orphan` is
/// startup reconciliation after a crash; `Ttl` is store-side expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutReason {
    Normal,
    Orphan,
    Ttl,
}

/// One record in the append-only session-history log (the wtmp).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub kind: EventKind,
    pub session: SessionKey,
    pub host: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<LogoutReason>,
}

impl SessionEvent {
    pub fn login(session: SessionKey, host: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Login,
            session,
            host: host.into(),
            timestamp: Utc::now(),
            reason: None,
        }
    }

    pub fn logout(session: SessionKey, host: impl Into<String>, reason: LogoutReason) -> Self {
        Self {
            kind: EventKind::Logout,
            session,
            host: host.into(),
            timestamp: Utc::now(),
            reason: Some(reason),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
