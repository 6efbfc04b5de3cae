// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Server lifecycle — assembles all subsystems and tears them down.
//!
//! # Startup sequence
//!
//! [`RunningServer::start`] performs these steps in order:
//!
//! 1. Discover the repository (name scopes every relay resource).
//! 2. Load config and connect the relay it selects.
//! 3. Resolve identity and allocate a fresh random tty token.
//! 4. Reconcile orphans: any live session with this login on this host whose
//!    `last_active` is older than [`ORPHAN_THRESHOLD`] is logged out with
//!    `reason=orphan` and removed — recovery from crashes where no graceful
//!    shutdown ran.
//! 5. Store the new session snapshot and publish the login event.
//! 6. Build the tool registry and spawn the awareness poller.
//!
//! # Shutdown
//!
//! [`RunningServer::shutdown`]: cancel the poller (it exits within one poll
//! tick), publish `logout{normal}`, delete the session, close the relay.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use biff_config::Paths;
use biff_model::{LogoutReason, SessionEvent, SessionKey, UserSession};
use biff_relay::Relay;
use biff_tools::{build_registry, ReadDescription, ServerState, ToolRegistry};

use crate::awareness::Awareness;
use crate::identity::{resolve_host, resolve_identity};

/// A session on this host older than this without a heartbeat is presumed
/// crashed.  Small enough that stale sessions vanish at the next start, large
/// enough that two deliberate concurrent sessions never reap each other.
pub const ORPHAN_THRESHOLD: Duration = Duration::from_secs(5 * 60);

/// A fully started biff server: state, tools, awareness, background tasks.
pub struct RunningServer {
    pub state: Arc<ServerState>,
    pub registry: Arc<ToolRegistry>,
    pub awareness: Arc<Awareness>,
    cancel: CancellationToken,
    poller: tokio::task::JoinHandle<()>,
}

impl RunningServer {
    /// Run the startup sequence in the current working directory.
    pub async fn start() -> anyhow::Result<Self> {
        let cwd = std::env::current_dir()?;
        let paths = Paths::resolve()
            .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Self::start_in(paths, cwd).await
    }

    /// Startup with explicit roots (tests point these at tempdirs).
    pub async fn start_in(paths: Paths, cwd: std::path::PathBuf) -> anyhow::Result<Self> {
        let repo = biff_config::discover_repo(&cwd);
        let config = biff_config::load(repo.root.as_deref())?;
        let identity = resolve_identity();
        let host = resolve_host();
        let key = SessionKey::allocate(&identity.login);

        info!(login = %identity.login, repo = %repo.name, session = %key, "starting biff");

        let relay =
            biff_relay::connect(&config, &paths, &repo.name, &identity.login).await?;

        reconcile_orphans(relay.as_ref(), &identity.login, &host).await;

        let session = UserSession::start(
            &identity,
            key.clone(),
            host.clone(),
            cwd.to_string_lossy().into_owned(),
        );
        relay.put_session(&session).await?;
        relay
            .log_event(&SessionEvent::login(key.clone(), host.clone()))
            .await?;

        let state = Arc::new(ServerState {
            identity,
            key,
            host,
            cwd: session.cwd.clone(),
            repo: repo.name,
            config,
            paths,
            relay,
            read_description: ReadDescription::new(),
        });
        let registry = Arc::new(build_registry(state.clone()));
        let awareness = Awareness::new(state.clone());
        let cancel = CancellationToken::new();
        let poller = awareness.spawn_poller(cancel.clone());

        Ok(Self {
            state,
            registry,
            awareness,
            cancel,
            poller,
        })
    }

    /// Graceful shutdown.  Every step is best-effort: a dead relay must not
    /// keep the process from exiting.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.poller.await;

        let relay = &self.state.relay;
        let key = &self.state.key;
        if let Err(e) = relay
            .log_event(&SessionEvent::logout(
                key.clone(),
                self.state.host.clone(),
                LogoutReason::Normal,
            ))
            .await
        {
            warn!(error = %e, "logout event not recorded");
        }
        if let Err(e) = relay.remove_session(key).await {
            warn!(error = %e, "session entry not removed");
        }
        if let Err(e) = relay.close().await {
            warn!(error = %e, "relay close failed");
        }
        info!(session = %key, "biff stopped");
    }
}

/// Log out sessions this identity abandoned on this host (crashed processes
/// never ran their shutdown).  Relay trouble here only warns — a fresh start
/// must not fail because old state is unreadable.
async fn reconcile_orphans(relay: &dyn Relay, login: &str, host: &str) {
    let sessions = match relay.list_sessions().await {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "orphan reconciliation skipped");
            return;
        }
    };
    for session in sessions {
        if session.login != login || session.host != host {
            continue;
        }
        let age = Utc::now().signed_duration_since(session.last_active);
        if age.to_std().map(|d| d < ORPHAN_THRESHOLD).unwrap_or(true) {
            continue;
        }
        info!(session = %session.key, "logging out orphaned session");
        if let Err(e) = relay
            .log_event(&SessionEvent::logout(
                session.key.clone(),
                session.host.clone(),
                LogoutReason::Orphan,
            ))
            .await
        {
            warn!(session = %session.key, error = %e, "orphan logout event not recorded");
        }
        if let Err(e) = relay.remove_session(&session.key).await {
            warn!(session = %session.key, error = %e, "orphaned session not removed");
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
