// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

/// Errors surfaced by relay operations.  Never retried inside the relay;
/// callers decide what a failure means for them.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The backing store is unreachable (or an operation timed out).
    #[error("relay unavailable: {0}")]
    Unavailable(String),

    /// The user/tty form is malformed for this backend.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Anything else: corrupt records, missing sessions, backend quirks.
    #[error("relay error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for RelayError {
    fn from(e: std::io::Error) -> Self {
        RelayError::Unavailable(e.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Internal(e.to_string())
    }
}
