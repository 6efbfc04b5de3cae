// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! `biff-relay` — the storage/transport capability set behind the biff tools,
//! with two implementations:
//!
//! * [`LocalRelay`] — JSONL inboxes and JSON session snapshots in a per-repo
//!   directory.  Single host, immediate consistency.
//! * [`ClusterRelay`] — NATS JetStream: a KV bucket for sessions, a
//!   work-queue stream for inboxes, a second stream for the session-history
//!   log.  Multi-host, eventually consistent.
//!
//! [`connect`] is the only way the rest of biff obtains a relay: it selects
//! the implementation by the presence of `[relay] url` in config.
//!
//! Every operation is atomic on its own; none retries.  Failures surface as
//! [`RelayError`] and the caller decides what they mean.

mod cluster;
mod error;
mod local;

pub use cluster::ClusterRelay;
pub use error::RelayError;
pub use local::LocalRelay;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use biff_config::{Config, Paths};
use biff_model::{Message, SessionEvent, SessionKey, UserSession};

/// Upper bound on any single relay operation.  Expiry surfaces
/// [`RelayError::Unavailable`].
pub const OP_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a session snapshot stays live without a heartbeat.  The cluster
/// variant enforces this with KV max-age; the local variant ignores and
/// sweeps older snapshots when listing.
pub const SESSION_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// The capability set every backend provides.  Tool handlers and the
/// awareness engine consume exactly this trait; they never see the backend.
#[async_trait]
pub trait Relay: Send + Sync {
    /// Upsert the caller's session snapshot.
    async fn put_session(&self, session: &UserSession) -> Result<(), RelayError>;

    /// Refresh `last_active` to now.  A missing snapshot is a quiet no-op
    /// (it may have been swept; the next `put_session` restores it).
    async fn touch_session(&self, key: &SessionKey) -> Result<(), RelayError>;

    /// All live sessions in this repository.
    async fn list_sessions(&self) -> Result<Vec<UserSession>, RelayError>;

    /// Any live session of `login`; the newest `last_active` wins when the
    /// login has several.
    async fn get_session(&self, login: &str) -> Result<Option<UserSession>, RelayError>;

    async fn set_plan(&self, key: &SessionKey, plan: &str) -> Result<(), RelayError>;

    async fn set_mesg(&self, key: &SessionKey, enabled: bool) -> Result<(), RelayError>;

    /// Remove the session snapshot (graceful logout and orphan recovery).
    async fn remove_session(&self, key: &SessionKey) -> Result<(), RelayError>;

    /// Write the message to the broadcast inbox (`Address::User`) or the
    /// targeted inbox (`Address::Session`).  Never both.
    async fn deliver(&self, message: &Message) -> Result<(), RelayError>;

    /// Return and remove ALL pending messages for both the broadcast inbox
    /// of `login` and the targeted inbox of `login:tty`, merged and sorted
    /// by `sent_at` ascending.  Atomic per inbox: a message goes to at most
    /// one concurrent drainer.
    async fn drain_for(&self, login: &str, tty: &str) -> Result<Vec<Message>, RelayError>;

    /// Same merge as [`Relay::drain_for`], without removal.
    async fn peek_unread_count(&self, login: &str, tty: &str) -> Result<usize, RelayError>;

    /// Body of the oldest pending message, without removal.  Advisory — the
    /// awareness engine puts it in previews; `None` when nothing is pending
    /// or the backend cannot look without consuming.
    async fn peek_preview(&self, login: &str, tty: &str) -> Result<Option<String>, RelayError>;

    /// Append to the session-history log.
    async fn log_event(&self, event: &SessionEvent) -> Result<(), RelayError>;

    /// Newest events first, optionally filtered by login, at most `limit`.
    async fn recent_events(
        &self,
        login: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SessionEvent>, RelayError>;

    /// Release all backing resources.  Idempotent.
    async fn close(&self) -> Result<(), RelayError>;
}

/// Build the relay selected by config: `[relay] url` present → cluster,
/// absent → local under `{home}/.biff/repos/{repo}/`.
pub async fn connect(
    config: &Config,
    paths: &Paths,
    repo: &str,
    login: &str,
) -> Result<Arc<dyn Relay>, RelayError> {
    match &config.relay.url {
        Some(url) => {
            let auth = config
                .relay
                .auth()
                .map_err(|e| RelayError::Internal(e.to_string()))?;
            let relay = ClusterRelay::connect(url, auth, repo, login).await?;
            Ok(Arc::new(relay))
        }
        None => {
            let relay = LocalRelay::open(paths.repo_data_dir(repo))?;
            Ok(Arc::new(relay))
        }
    }
}
