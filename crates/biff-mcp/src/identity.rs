// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Identity resolution.  Delegates to the host OS (the outside authority on
//! who is sitting at this session) with `BIFF_LOGIN` / `BIFF_NAME` overrides
//! as the test seam.

use biff_model::Identity;

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Resolve who this process runs as.  Called once at startup; the result is
/// immutable for the process lifetime.
pub fn resolve_identity() -> Identity {
    let login = env_nonempty("BIFF_LOGIN").unwrap_or_else(whoami::username);
    let display_name = env_nonempty("BIFF_NAME").unwrap_or_else(|| {
        let real = whoami::realname();
        if real.trim().is_empty() {
            login.clone()
        } else {
            real
        }
    });
    Identity {
        login,
        display_name,
    }
}

/// This machine's name, as recorded in session snapshots and wtmp events.
pub fn resolve_host() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "localhost".to_string())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
