// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Address, SessionKey};

/// One ephemeral message.  Immutable once created; consumed exactly once per
/// inbox (POP semantics — a drain removes it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub from_session: SessionKey,
    pub to: Address,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

impl Message {
    /// New message sent now.
    pub fn new(from_session: SessionKey, to: Address, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_session,
            to,
            body: body.into(),
            sent_at: Utc::now(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
