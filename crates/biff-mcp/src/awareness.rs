// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! The awareness engine: turns unread-count changes into the three signals a
//! push-less host can actually observe.
//!
//! 1. The `read_messages` tool description — rewritten to carry the count
//!    and a preview, so the next `tools/list` shows the nudge.
//! 2. A `tools/list_changed` notification on the cached transport session,
//!    prompting the client to re-fetch the list.
//! 3. The per-repo unread file consumed by the status bar.
//!
//! The notification must travel whether the mutation happened inside a tool
//! call (request context at hand) or from the background poller (none).  The
//! engine therefore caches the most recent request-scoped notifier; the
//! poller reuses it.  Both paths are best-effort: failures are logged, never
//! propagated.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use biff_relay::Relay;
use biff_tools::{ServerState, DEFAULT_READ_DESCRIPTION};

/// Poll cadence of the background unread watcher.
pub const T_POLL: Duration = Duration::from_secs(2);

/// Preview length in the description and the unread file.
const PREVIEW_CHARS: usize = 48;

/// The transport-session handle the engine notifies through.  A trait seam
/// so the poller does not depend on a live rmcp peer (tests inject a fake).
#[async_trait]
pub trait ListChangedNotifier: Send + Sync {
    async fn notify_tools_list_changed(&self) -> Result<(), String>;
}

#[derive(Default)]
struct Inner {
    /// Most recent request-scoped notifier, captured on every tool call.
    notifier: Option<Arc<dyn ListChangedNotifier>>,
    last_count: Option<usize>,
}

pub struct Awareness {
    state: Arc<ServerState>,
    /// Serializes description mutation + notification: at most one in flight.
    inner: Mutex<Inner>,
}

impl Awareness {
    pub fn new(state: Arc<ServerState>) -> Arc<Self> {
        Arc::new(Self {
            state,
            inner: Mutex::new(Inner::default()),
        })
    }

    /// Remember the transport session of the current request so the poller
    /// can notify through it later.
    pub async fn capture_notifier(&self, notifier: Arc<dyn ListChangedNotifier>) {
        self.inner.lock().await.notifier = Some(notifier);
    }

    /// Synchronous refresh after a tool call.  Always rewrites the unread
    /// file; notifies only when the description actually changed.
    pub async fn refresh_after_tool(&self) {
        self.refresh(true).await;
    }

    /// One poller tick.  Touches the unread file only on change.
    pub async fn tick(&self) {
        self.refresh(false).await;
    }

    async fn refresh(&self, force_status_write: bool) {
        let key = &self.state.key;
        let count = match self
            .state
            .relay
            .peek_unread_count(&key.login, &key.tty)
            .await
        {
            Ok(c) => c,
            // A relay outage skips the tick; unread state stays as-is.
            Err(e) => {
                debug!(error = %e, "unread poll skipped");
                return;
            }
        };

        let mut inner = self.inner.lock().await;
        let count_changed = inner.last_count != Some(count);
        inner.last_count = Some(count);

        let preview = if count > 0 {
            self.state
                .relay
                .peek_preview(&key.login, &key.tty)
                .await
                .ok()
                .flatten()
                .map(|body| biff_tools::preview(&body, PREVIEW_CHARS))
        } else {
            None
        };

        if count_changed || force_status_write {
            self.write_unread_file(count, preview.as_deref());
        }

        let description = compose_description(count, preview.as_deref());
        if self.state.read_description.set(description) {
            if let Some(notifier) = inner.notifier.clone() {
                if let Err(e) = notifier.notify_tools_list_changed().await {
                    debug!(error = %e, "tools/list_changed notification not delivered");
                }
            }
        }
    }

    /// Atomically replace `{home}/.biff/unread/{repo}.json`.
    fn write_unread_file(&self, count: usize, preview: Option<&str>) {
        let path = self.state.paths.unread_file(&self.state.repo);
        let payload = serde_json::json!({ "count": count, "preview": preview });
        let result = (|| -> std::io::Result<()> {
            let dir = self.state.paths.unread_dir();
            std::fs::create_dir_all(&dir)?;
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(payload.to_string().as_bytes())?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })();
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "unread file not written");
        }
    }

    /// Spawn the background poller.  Exits within one tick of cancellation.
    pub fn spawn_poller(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(T_POLL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => engine.tick().await,
                }
            }
            debug!("awareness poller stopped");
        })
    }
}

fn compose_description(count: usize, preview: Option<&str>) -> String {
    match (count, preview) {
        (0, _) => DEFAULT_READ_DESCRIPTION.to_string(),
        (n, Some(p)) => format!("Check messages ({n} unread: {p}). Marks all as read."),
        (n, None) => format!("Check messages ({n} unread). Marks all as read."),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
