// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Bus relay over NATS JetStream for teams spread across hosts.
//!
//! Resource naming is deterministic and repository-scoped:
//!
//! ```text
//! KV bucket:      biff-{repo}-sessions
//! inbox stream:   BIFF_{repo}_INBOX    subjects biff.{repo}.inbox.>
//! wtmp stream:    BIFF_{repo}_WTMP     subjects biff.{repo}.wtmp.>
//! client name:    biff-{repo}-{login}
//! ```
//!
//! Subject addressing keeps the two inbox kinds apart by token count, so an
//! exact-match filter never crosses kinds:
//!
//! ```text
//! Session(u,t)  →  biff.{repo}.inbox.{u}.{t}     (4 tokens)
//! User(u)       →  biff.{repo}.inbox.{u}         (3 tokens)
//! ```
//!
//! Inbox draining uses durable pull consumers named after the inbox, not the
//! reader: every reader of `User(u)` shares the durable `user-{u}`, which is
//! what makes a broadcast message reach at most one of the login's sessions.
//! Acks are explicit with redelivery disabled (`max_deliver = 1`).
//!
//! Sessions are KV entries under a 30-day max-age; the bucket watcher task
//! translates store-initiated purges into `logout{ttl}` history events.

use std::collections::HashMap;
use std::future::Future;
use std::future::IntoFuture;
use std::time::Duration;

use async_nats::jetstream::{
    self,
    consumer::{pull, AckPolicy, DeliverPolicy, PullConsumer},
    kv,
    stream::{self, RetentionPolicy},
};
use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use biff_config::RelayAuth;
use biff_model::{Address, LogoutReason, Message, SessionEvent, SessionKey, UserSession};

use crate::{Relay, RelayError, OP_TIMEOUT, SESSION_TTL};

/// Cap on the exponential reconnect backoff.
const RECONNECT_CAP: Duration = Duration::from_secs(5);

/// Batch size for a single fetch round.
const FETCH_BATCH: usize = 512;

/// How long a fetch round waits on an idle inbox before returning empty.
const FETCH_WAIT: Duration = Duration::from_millis(500);

type ConsumerPair = (PullConsumer, PullConsumer);

pub struct ClusterRelay {
    client: async_nats::Client,
    js: jetstream::Context,
    kv: kv::Store,
    inbox_stream: stream::Stream,
    wtmp_stream: stream::Stream,
    repo: String,
    /// Cached (user durable, session durable) per drained inbox pair.
    consumers: Mutex<HashMap<(String, String), ConsumerPair>>,
    cancel: CancellationToken,
}

/// Reduce a login to the characters legal in subjects, durable names and KV
/// keys.  The tty token is already restricted to `[a-z0-9]` at parse time.
fn token(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Bound a bus call by [`OP_TIMEOUT`]; both errors and expiry surface as
/// [`RelayError::Unavailable`].
async fn io<T, E>(fut: impl Future<Output = Result<T, E>>) -> Result<T, RelayError>
where
    E: std::fmt::Display,
{
    match tokio::time::timeout(OP_TIMEOUT, fut).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(RelayError::Unavailable(e.to_string())),
        Err(_) => Err(RelayError::Unavailable("operation timed out".into())),
    }
}

impl ClusterRelay {
    /// Connect to the bus and materialize this repository's resources.
    ///
    /// The client reconnects indefinitely with exponential backoff capped at
    /// [`RECONNECT_CAP`]; operations issued during a disconnect window fail
    /// with [`RelayError::Unavailable`] rather than queueing.
    pub async fn connect(
        url: &str,
        auth: RelayAuth,
        repo: &str,
        login: &str,
    ) -> Result<Self, RelayError> {
        let mut options = async_nats::ConnectOptions::new()
            .name(format!("biff-{repo}-{login}"))
            .reconnect_delay_callback(|attempts| {
                let exp = Duration::from_millis(100u64 << attempts.min(8) as u32);
                exp.min(RECONNECT_CAP)
            })
            .event_callback(|event| async move {
                match event {
                    async_nats::Event::Connected => info!("relay bus connected"),
                    async_nats::Event::Disconnected => warn!("relay bus disconnected"),
                    async_nats::Event::ClientError(e) => error!(error = %e, "relay bus client error"),
                    other => debug!(event = %other, "relay bus event"),
                }
            });

        options = match auth {
            RelayAuth::None => options,
            RelayAuth::Token(t) => options.token(t),
            RelayAuth::NkeysSeed(path) => {
                let seed = std::fs::read_to_string(&path)
                    .map_err(|e| RelayError::Unavailable(format!("reading nkeys seed: {e}")))?;
                options.nkey(seed.trim().to_string())
            }
            RelayAuth::Credentials(path) => options
                .credentials_file(&path)
                .await
                .map_err(|e| RelayError::Unavailable(format!("reading credentials: {e}")))?,
        };

        let client = io(options.connect(url)).await?;
        let js = jetstream::new(client.clone());

        let bucket = format!("biff-{repo}-sessions");
        let kv = match io(js.get_key_value(&bucket)).await {
            Ok(store) => store,
            Err(_) => io(js.create_key_value(kv::Config {
                bucket: bucket.clone(),
                max_age: SESSION_TTL,
                ..Default::default()
            }))
            .await?,
        };

        let inbox_stream = io(js.get_or_create_stream(stream::Config {
            name: format!("BIFF_{repo}_INBOX"),
            subjects: vec![format!("biff.{repo}.inbox.>")],
            retention: RetentionPolicy::WorkQueue,
            max_age: SESSION_TTL,
            // Non-destructive preview reads (peek_preview) use direct get.
            allow_direct: true,
            ..Default::default()
        }))
        .await?;

        let wtmp_stream = io(js.get_or_create_stream(stream::Config {
            name: format!("BIFF_{repo}_WTMP"),
            subjects: vec![format!("biff.{repo}.wtmp.>")],
            max_age: SESSION_TTL,
            ..Default::default()
        }))
        .await?;

        let cancel = CancellationToken::new();
        spawn_ttl_watcher(
            kv.clone(),
            js.clone(),
            repo.to_string(),
            cancel.clone(),
        );

        Ok(Self {
            client,
            js,
            kv,
            inbox_stream,
            wtmp_stream,
            repo: repo.to_string(),
            consumers: Mutex::new(HashMap::new()),
            cancel,
        })
    }

    fn kv_key(key: &SessionKey) -> String {
        format!("{}.{}", token(&key.login), key.tty)
    }

    fn inbox_subject(&self, to: &Address) -> String {
        match to {
            Address::User { login } => {
                format!("biff.{}.inbox.{}", self.repo, token(login))
            }
            Address::Session { key } => {
                format!("biff.{}.inbox.{}.{}", self.repo, token(&key.login), key.tty)
            }
        }
    }

    fn wtmp_subject(&self, login: &str) -> String {
        format!("biff.{}.wtmp.{}", self.repo, token(login))
    }

    /// Durable consumers for the two inboxes of `login:tty`, cached per pair.
    ///
    /// Durable names derive from the inbox, so every reader of the same inbox
    /// shares one consumer and the bus hands each message to exactly one of
    /// them.
    async fn inbox_consumers(&self, login: &str, tty: &str) -> Result<ConsumerPair, RelayError> {
        let cache_key = (login.to_string(), tty.to_string());
        let mut cache = self.consumers.lock().await;
        if let Some(pair) = cache.get(&cache_key) {
            return Ok(pair.clone());
        }

        let user_durable = format!("user-{}", token(login));
        let sess_durable = format!("sess-{}-{}", token(login), tty);

        let user = io(self.inbox_stream.get_or_create_consumer(
            &user_durable,
            pull::Config {
                durable_name: Some(user_durable.clone()),
                filter_subject: self.inbox_subject(&Address::user(login)),
                ack_policy: AckPolicy::Explicit,
                deliver_policy: DeliverPolicy::All,
                max_deliver: 1,
                inactive_threshold: SESSION_TTL,
                ..Default::default()
            },
        ))
        .await?;

        let sess = io(self.inbox_stream.get_or_create_consumer(
            &sess_durable,
            pull::Config {
                durable_name: Some(sess_durable.clone()),
                filter_subject: self
                    .inbox_subject(&Address::session(SessionKey::new(login, tty))),
                ack_policy: AckPolicy::Explicit,
                deliver_policy: DeliverPolicy::All,
                max_deliver: 1,
                inactive_threshold: SESSION_TTL,
                ..Default::default()
            },
        ))
        .await?;

        let pair = (user, sess);
        cache.insert(cache_key, pair.clone());
        Ok(pair)
    }

    /// Fetch-and-ack everything currently pending on one consumer.
    async fn drain_consumer(consumer: &PullConsumer) -> Result<Vec<Message>, RelayError> {
        let mut out = Vec::new();
        loop {
            let mut batch = io(consumer
                .fetch()
                .max_messages(FETCH_BATCH)
                .expires(FETCH_WAIT)
                .messages())
            .await?;

            let mut received = 0usize;
            while let Some(item) = batch.next().await {
                let msg = item.map_err(|e| RelayError::Unavailable(e.to_string()))?;
                received += 1;
                match serde_json::from_slice::<Message>(&msg.payload) {
                    Ok(m) => out.push(m),
                    Err(e) => warn!(error = %e, "skipping corrupt inbox payload"),
                }
                msg.ack()
                    .await
                    .map_err(|e| RelayError::Unavailable(e.to_string()))?;
            }
            if received < FETCH_BATCH {
                break;
            }
        }
        Ok(out)
    }

    async fn read_session(&self, key: &str) -> Result<Option<UserSession>, RelayError> {
        match io(self.kv.get(key)).await? {
            None => Ok(None),
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        }
    }

    async fn write_session(&self, session: &UserSession) -> Result<(), RelayError> {
        let payload = serde_json::to_vec(session)?;
        io(self.kv.put(Self::kv_key(&session.key), payload.into())).await?;
        Ok(())
    }

    /// Read-modify-write one KV session entry; missing entries are reported
    /// as [`RelayError::Internal`].
    async fn update_session(
        &self,
        key: &SessionKey,
        mutate: impl FnOnce(&mut UserSession) + Send,
    ) -> Result<(), RelayError> {
        let kv_key = Self::kv_key(key);
        let mut session = self
            .read_session(&kv_key)
            .await?
            .ok_or_else(|| RelayError::Internal(format!("no such session: {key}")))?;
        mutate(&mut session);
        self.write_session(&session).await
    }

    fn is_live(session: &UserSession) -> bool {
        let age = Utc::now().signed_duration_since(session.last_active);
        age.to_std().map(|d| d < SESSION_TTL).unwrap_or(true)
    }
}

#[async_trait]
impl Relay for ClusterRelay {
    async fn put_session(&self, session: &UserSession) -> Result<(), RelayError> {
        self.write_session(session).await
    }

    async fn touch_session(&self, key: &SessionKey) -> Result<(), RelayError> {
        let kv_key = Self::kv_key(key);
        match self.read_session(&kv_key).await? {
            None => Ok(()),
            Some(mut session) => {
                session.last_active = Utc::now();
                self.write_session(&session).await
            }
        }
    }

    async fn list_sessions(&self) -> Result<Vec<UserSession>, RelayError> {
        let mut keys = io(self.kv.keys()).await?;
        let mut sessions = Vec::new();
        while let Some(item) = keys.next().await {
            let key = item.map_err(|e| RelayError::Unavailable(e.to_string()))?;
            match self.read_session(&key).await {
                Ok(Some(s)) if Self::is_live(&s) => sessions.push(s),
                Ok(_) => {}
                Err(e) => warn!(key, error = %e, "skipping unreadable session entry"),
            }
        }
        sessions.sort_by(|a, b| a.key.login.cmp(&b.key.login).then(a.key.tty.cmp(&b.key.tty)));
        Ok(sessions)
    }

    async fn get_session(&self, login: &str) -> Result<Option<UserSession>, RelayError> {
        let sessions = self.list_sessions().await?;
        Ok(sessions
            .into_iter()
            .filter(|s| s.login == login)
            .max_by_key(|s| s.last_active))
    }

    async fn set_plan(&self, key: &SessionKey, plan: &str) -> Result<(), RelayError> {
        let plan = plan.to_string();
        self.update_session(key, move |s| {
            s.plan = plan;
            s.last_active = Utc::now();
        })
        .await
    }

    async fn set_mesg(&self, key: &SessionKey, enabled: bool) -> Result<(), RelayError> {
        self.update_session(key, move |s| {
            s.messages_enabled = enabled;
            s.last_active = Utc::now();
        })
        .await
    }

    async fn remove_session(&self, key: &SessionKey) -> Result<(), RelayError> {
        // delete (not purge): the watcher reads purges as store-initiated
        // eviction and would log a spurious ttl logout otherwise.
        io(self.kv.delete(Self::kv_key(key))).await?;
        Ok(())
    }

    async fn deliver(&self, message: &Message) -> Result<(), RelayError> {
        let subject = self.inbox_subject(&message.to);
        let payload = serde_json::to_vec(message)?;
        let ack = io(self.js.publish(subject, payload.into())).await?;
        io(ack.into_future()).await?;
        Ok(())
    }

    async fn drain_for(&self, login: &str, tty: &str) -> Result<Vec<Message>, RelayError> {
        let (user, sess) = self.inbox_consumers(login, tty).await?;
        let mut messages = Self::drain_consumer(&user).await?;
        messages.extend(Self::drain_consumer(&sess).await?);
        messages.sort_by_key(|m| m.sent_at);
        Ok(messages)
    }

    async fn peek_unread_count(&self, login: &str, tty: &str) -> Result<usize, RelayError> {
        let (mut user, mut sess) = self.inbox_consumers(login, tty).await?;
        let user_pending = io(user.info()).await?.num_pending;
        let sess_pending = io(sess.info()).await?.num_pending;
        Ok((user_pending + sess_pending) as usize)
    }

    async fn peek_preview(&self, login: &str, tty: &str) -> Result<Option<String>, RelayError> {
        // Direct get never consumes; acked messages are already gone from the
        // work queue, so "first for subject" is the oldest pending one.
        let subjects = [
            self.inbox_subject(&Address::user(login)),
            self.inbox_subject(&Address::session(SessionKey::new(login, tty))),
        ];
        let mut oldest: Option<Message> = None;
        for subject in subjects {
            let raw = match tokio::time::timeout(
                OP_TIMEOUT,
                self.inbox_stream.direct_get_first_for_subject(&subject),
            )
            .await
            {
                Ok(Ok(raw)) => raw,
                // Empty subject or unsupported server: previews are advisory.
                Ok(Err(_)) | Err(_) => continue,
            };
            if let Ok(m) = serde_json::from_slice::<Message>(&raw.payload) {
                if oldest.as_ref().map(|o| m.sent_at < o.sent_at).unwrap_or(true) {
                    oldest = Some(m);
                }
            }
        }
        Ok(oldest.map(|m| m.body))
    }

    async fn log_event(&self, event: &SessionEvent) -> Result<(), RelayError> {
        let subject = self.wtmp_subject(&event.session.login);
        let payload = serde_json::to_vec(event)?;
        let ack = io(self.js.publish(subject, payload.into())).await?;
        io(ack.into_future()).await?;
        Ok(())
    }

    async fn recent_events(
        &self,
        login: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SessionEvent>, RelayError> {
        // Ephemeral reader over the whole retained log; no acks, no durable
        // state left behind.
        let mut consumer = io(self.wtmp_stream.create_consumer(pull::Config {
            deliver_policy: DeliverPolicy::All,
            ack_policy: AckPolicy::None,
            inactive_threshold: Duration::from_secs(30),
            ..Default::default()
        }))
        .await?;

        let mut pending = io(consumer.info()).await?.num_pending;

        let mut events = Vec::new();
        while pending > 0 {
            let mut batch = io(consumer
                .fetch()
                .max_messages(FETCH_BATCH)
                .expires(FETCH_WAIT)
                .messages())
            .await?;
            let mut received = 0u64;
            while let Some(item) = batch.next().await {
                let msg = item.map_err(|e| RelayError::Unavailable(e.to_string()))?;
                received += 1;
                match serde_json::from_slice::<SessionEvent>(&msg.payload) {
                    Ok(ev) => events.push(ev),
                    Err(e) => warn!(error = %e, "skipping corrupt wtmp payload"),
                }
            }
            if received == 0 {
                break;
            }
            pending = pending.saturating_sub(received);
        }

        if let Some(login) = login {
            events.retain(|ev| ev.session.login == login);
        }
        events.sort_by_key(|ev| std::cmp::Reverse(ev.timestamp));
        events.truncate(limit);
        Ok(events)
    }

    async fn close(&self) -> Result<(), RelayError> {
        self.cancel.cancel();
        io(self.client.drain()).await
    }
}

/// Watch the session bucket and turn store-initiated purges into
/// `logout{ttl}` history events.  Explicit logouts use delete markers and are
/// ignored here — their owners log the event themselves.
fn spawn_ttl_watcher(
    kv: kv::Store,
    js: jetstream::Context,
    repo: String,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let mut watch = match kv.watch_all().await {
            Ok(w) => w,
            Err(e) => {
                warn!(error = %e, "session bucket watcher failed to start");
                return;
            }
        };

        // Remember the last snapshot per key so an eviction can be attributed
        // to a host even though the purge entry carries no value.
        let mut hosts: HashMap<String, UserSession> = HashMap::new();

        loop {
            let entry = tokio::select! {
                _ = cancel.cancelled() => break,
                entry = watch.next() => entry,
            };
            let entry = match entry {
                Some(Ok(e)) => e,
                Some(Err(e)) => {
                    debug!(error = %e, "session bucket watch error");
                    continue;
                }
                None => break,
            };

            match entry.operation {
                kv::Operation::Put => {
                    if let Ok(s) = serde_json::from_slice::<UserSession>(&entry.value) {
                        hosts.insert(entry.key.clone(), s);
                    }
                }
                kv::Operation::Delete => {
                    hosts.remove(&entry.key);
                }
                kv::Operation::Purge => {
                    let Some(session) = hosts.remove(&entry.key) else {
                        continue;
                    };
                    let event = SessionEvent::logout(
                        session.key.clone(),
                        session.host.clone(),
                        LogoutReason::Ttl,
                    );
                    let subject =
                        format!("biff.{}.wtmp.{}", repo, token(&session.key.login));
                    let payload = match serde_json::to_vec(&event) {
                        Ok(p) => p,
                        Err(_) => continue,
                    };
                    match js.publish(subject, payload.into()).await {
                        Ok(ack) => {
                            if let Err(e) = ack.await {
                                warn!(error = %e, "ttl logout event not acked");
                            } else {
                                info!(session = %session.key, "session expired (ttl)");
                            }
                        }
                        Err(e) => warn!(error = %e, "ttl logout event publish failed"),
                    }
                }
            }
        }
        debug!("session bucket watcher stopped");
    });
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
//
// Pure naming/addressing logic only; everything that talks to a live bus is
// covered by the env-gated integration tests in tests/cluster_relay_tests.rs.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_passes_clean_logins() {
        assert_eq!(token("kai"), "kai");
        assert_eq!(token("build-bot_2"), "build-bot_2");
    }

    #[test]
    fn token_maps_subject_metacharacters() {
        assert_eq!(token("k.ai"), "k_ai");
        assert_eq!(token("k ai"), "k_ai");
        assert_eq!(token("k>i"), "k_i");
    }

    #[test]
    fn kv_key_is_login_dot_tty() {
        let key = SessionKey::new("kai", "aabb1122");
        assert_eq!(ClusterRelay::kv_key(&key), "kai.aabb1122");
    }

    #[test]
    fn kv_key_sanitizes_login() {
        let key = SessionKey::new("k.ai", "aabb1122");
        assert_eq!(ClusterRelay::kv_key(&key), "k_ai.aabb1122");
    }
}
