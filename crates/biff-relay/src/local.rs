// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Filesystem relay for the single-host case.  One directory per repository:
//!
//! ```text
//! {data_dir}/
//!   session-{login}-{tty}.json    session snapshot (temp-file + rename)
//!   inbox-{login}-{tty}.jsonl     targeted messages, one JSON object per line
//!   userinbox-{login}.jsonl       broadcast messages, same shape
//!   wtmp.jsonl                    session-history log
//! ```
//!
//! Concurrency: session snapshots are replaced atomically via rename, so
//! readers never observe a torn write.  Inboxes and the wtmp are append-only
//! JSONL guarded by OS advisory locks — a drain holds the exclusive lock
//! across read+truncate, which makes the per-file POP atomic under
//! multi-process access.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use fs4::fs_std::FileExt;
use tracing::{debug, warn};

use biff_model::{Message, SessionEvent, SessionKey, UserSession};

use crate::{Relay, RelayError, SESSION_TTL};

/// Rotate the wtmp once an append pushes it past this many lines…
const WTMP_MAX_LINES: usize = 10_000;
/// …keeping the newest this many.
const WTMP_KEEP_LINES: usize = 8_000;

pub struct LocalRelay {
    dir: PathBuf,
}

impl LocalRelay {
    /// Open (creating if needed) the relay directory.
    pub fn open(dir: PathBuf) -> Result<Self, RelayError> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn session_file(&self, key: &SessionKey) -> PathBuf {
        self.dir
            .join(format!("session-{}-{}.json", key.login, key.tty))
    }

    fn inbox_file(&self, login: &str, tty: &str) -> PathBuf {
        self.dir.join(format!("inbox-{login}-{tty}.jsonl"))
    }

    fn user_inbox_file(&self, login: &str) -> PathBuf {
        self.dir.join(format!("userinbox-{login}.jsonl"))
    }

    fn wtmp_file(&self) -> PathBuf {
        self.dir.join("wtmp.jsonl")
    }

    /// Replace `path` atomically: write to a temp file in the same directory,
    /// then rename over the target.
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), RelayError> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.persist(path)
            .map_err(|e| RelayError::Unavailable(e.to_string()))?;
        Ok(())
    }

    fn read_session(&self, path: &Path) -> Result<UserSession, RelayError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Read-modify-write one session snapshot.
    fn update_session(
        &self,
        key: &SessionKey,
        mutate: impl FnOnce(&mut UserSession),
    ) -> Result<(), RelayError> {
        let path = self.session_file(key);
        if !path.exists() {
            return Err(RelayError::Internal(format!("no such session: {key}")));
        }
        let mut session = self.read_session(&path)?;
        mutate(&mut session);
        self.write_atomic(&path, &serde_json::to_vec(&session)?)
    }

    /// Append one JSON line to `path` under an exclusive advisory lock.
    fn append_line(&self, path: &Path, line: &str) -> Result<(), RelayError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        file.lock_exclusive()?;
        let result = (|| -> Result<(), RelayError> {
            let mut w = &file;
            w.write_all(line.as_bytes())?;
            w.write_all(b"\n")?;
            Ok(())
        })();
        let _ = FileExt::unlock(&file);
        result
    }

    /// Read every parseable message line of `path`; unparseable lines are
    /// logged and skipped so one corrupt record cannot wedge an inbox.
    fn parse_messages(path: &Path, reader: impl Read) -> Vec<Message> {
        let mut out = Vec::new();
        for line in BufReader::new(reader).lines().map_while(Result::ok) {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Message>(&line) {
                Ok(m) => out.push(m),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping corrupt inbox line"),
            }
        }
        out
    }

    /// POP one inbox file: lock, read everything, truncate, unlock.
    fn drain_file(&self, path: &Path) -> Result<Vec<Message>, RelayError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        file.lock_exclusive()?;
        let result = (|| -> Result<Vec<Message>, RelayError> {
            let messages = Self::parse_messages(path, &file);
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            Ok(messages)
        })();
        let _ = FileExt::unlock(&file);
        result
    }

    /// Count pending messages without consuming them.
    fn peek_file(&self, path: &Path) -> Result<Vec<Message>, RelayError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(path)?;
        file.lock_shared()?;
        let messages = Self::parse_messages(path, &file);
        let _ = FileExt::unlock(&file);
        Ok(messages)
    }

    fn is_live(session: &UserSession) -> bool {
        let age = Utc::now().signed_duration_since(session.last_active);
        age.to_std().map(|d| d < SESSION_TTL).unwrap_or(true)
    }
}

#[async_trait]
impl Relay for LocalRelay {
    async fn put_session(&self, session: &UserSession) -> Result<(), RelayError> {
        self.write_atomic(
            &self.session_file(&session.key),
            &serde_json::to_vec(session)?,
        )
    }

    async fn touch_session(&self, key: &SessionKey) -> Result<(), RelayError> {
        if !self.session_file(key).exists() {
            return Ok(());
        }
        self.update_session(key, |s| s.last_active = Utc::now())
    }

    async fn list_sessions(&self) -> Result<Vec<UserSession>, RelayError> {
        let mut sessions = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !(name.starts_with("session-") && name.ends_with(".json")) {
                continue;
            }
            let session = match self.read_session(&entry.path()) {
                Ok(s) => s,
                Err(e) => {
                    warn!(file = %name, error = %e, "skipping unreadable session file");
                    continue;
                }
            };
            if Self::is_live(&session) {
                sessions.push(session);
            } else {
                debug!(file = %name, "sweeping stale session file");
                let _ = std::fs::remove_file(entry.path());
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
    }

    async fn set_mesg(&self, key: &SessionKey, enabled: bool) -> Result<(), RelayError> {
        self.update_session(key, move |s| {
            s.messages_enabled = enabled;
            s.last_active = Utc::now();
        })
    }

    async fn remove_session(&self, key: &SessionKey) -> Result<(), RelayError> {
        let path = self.session_file(key);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    async fn deliver(&self, message: &Message) -> Result<(), RelayError> {
        let path = match &message.to {
            biff_model::Address::User { login } => self.user_inbox_file(login),
            biff_model::Address::Session { key } => self.inbox_file(&key.login, &key.tty),
        };
        self.append_line(&path, &serde_json::to_string(message)?)
    }

    async fn drain_for(&self, login: &str, tty: &str) -> Result<Vec<Message>, RelayError> {
        let mut messages = self.drain_file(&self.user_inbox_file(login))?;
        messages.extend(self.drain_file(&self.inbox_file(login, tty))?);
        messages.sort_by_key(|m| m.sent_at);
        Ok(messages)
    }

    async fn peek_unread_count(&self, login: &str, tty: &str) -> Result<usize, RelayError> {
        let user = self.peek_file(&self.user_inbox_file(login))?;
        let sess = self.peek_file(&self.inbox_file(login, tty))?;
        Ok(user.len() + sess.len())
    }

    async fn peek_preview(&self, login: &str, tty: &str) -> Result<Option<String>, RelayError> {
        let mut pending = self.peek_file(&self.user_inbox_file(login))?;
        pending.extend(self.peek_file(&self.inbox_file(login, tty))?);
        Ok(pending
            .into_iter()
            .min_by_key(|m| m.sent_at)
            .map(|m| m.body))
    }

    async fn log_event(&self, event: &SessionEvent) -> Result<(), RelayError> {
        let path = self.wtmp_file();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        file.lock_exclusive()?;
        let result = (|| -> Result<(), RelayError> {
            let mut w = &file;
            w.write_all(serde_json::to_string(event)?.as_bytes())?;
            w.write_all(b"\n")?;

            // Retention: rewrite in place once the log grows past the cap.
            let mut text = String::new();
            let mut r = &file;
            r.seek(SeekFrom::Start(0))?;
            r.read_to_string(&mut text)?;
            let lines: Vec<&str> = text.lines().collect();
            if lines.len() > WTMP_MAX_LINES {
                let keep = &lines[lines.len() - WTMP_KEEP_LINES..];
                let mut w = &file;
                w.seek(SeekFrom::Start(0))?;
                file.set_len(0)?;
                for line in keep {
                    w.write_all(line.as_bytes())?;
                    w.write_all(b"\n")?;
                }
            }
            Ok(())
        })();
        let _ = FileExt::unlock(&file);
        result
    }

    async fn recent_events(
        &self,
        login: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SessionEvent>, RelayError> {
        let path = self.wtmp_file();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&path)?;
        file.lock_shared()?;
        let mut events = Vec::new();
        for line in BufReader::new(&file).lines().map_while(Result::ok) {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<SessionEvent>(&line) {
                Ok(ev) => events.push(ev),
                Err(e) => warn!(error = %e, "skipping corrupt wtmp line"),
            }
        }
        let _ = FileExt::unlock(&file);

        if let Some(login) = login {
            events.retain(|ev| ev.session.login == login);
        }
        events.sort_by_key(|ev| std::cmp::Reverse(ev.timestamp));
        events.truncate(limit);
        Ok(events)
    }

    async fn close(&self) -> Result<(), RelayError> {
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
