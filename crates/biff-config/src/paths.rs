// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

/// Filesystem layout under `{home}/.biff/`.
///
/// ```text
/// {home}/.biff/
///   repos/{repo}/                 local relay data dir
///     session-{login}-{tty}.json
///     inbox-{login}-{tty}.jsonl
///     userinbox-{login}.jsonl
///     wtmp.jsonl
///   unread/{repo}.json            status-line input
///   statusline.sh
/// ```
///
/// The base is overridable for tests; production callers use
/// [`Paths::resolve`].
#[derive(Debug, Clone)]
pub struct Paths {
    base: PathBuf,
}

impl Paths {
    /// Layout rooted at the real home directory.
    pub fn resolve() -> Option<Self> {
        dirs::home_dir().map(|home| Self::rooted_at(home.join(".biff")))
    }

    /// Layout rooted at an explicit base (tests point this at a tempdir).
    pub fn rooted_at(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &PathBuf {
        &self.base
    }

    /// Local relay data directory for one repository.
    pub fn repo_data_dir(&self, repo: &str) -> PathBuf {
        self.base.join("repos").join(repo)
    }

    /// Per-repo unread counter consumed by the status bar.
    pub fn unread_file(&self, repo: &str) -> PathBuf {
        self.base.join("unread").join(format!("{repo}.json"))
    }

    pub fn unread_dir(&self) -> PathBuf {
        self.base.join("unread")
    }

    pub fn statusline_script(&self) -> PathBuf {
        self.base.join("statusline.sh")
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
