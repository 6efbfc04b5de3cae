// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

/// Repo name used when the working directory is not inside a
/// version-controlled root.
pub const REPO_FALLBACK: &str = "_default";

/// A discovered repository: its root directory and the sanitized name every
/// relay resource is scoped by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repo {
    pub root: Option<PathBuf>,
    pub name: String,
}

/// Walk up from `cwd` to the first directory containing `.git` and derive
/// the repo name from that directory's basename.  Outside any repository the
/// name falls back to [`REPO_FALLBACK`] and there is no root.
pub fn discover_repo(cwd: &Path) -> Repo {
    let mut dir = Some(cwd);
    while let Some(d) = dir {
        if d.join(".git").exists() {
            let name = d
                .file_name()
                .map(|n| sanitize_repo_name(&n.to_string_lossy()))
                .unwrap_or_else(|| REPO_FALLBACK.to_string());
            return Repo {
                root: Some(d.to_path_buf()),
                name,
            };
        }
        dir = d.parent();
    }
    Repo {
        root: None,
        name: REPO_FALLBACK.to_string(),
    }
}

/// Reduce a repo name to the characters legal in every relay resource name
/// (bus subjects, stream names, KV bucket names, file names): alphanumerics,
/// dash and underscore.  Everything else maps to `_`; an empty result falls
/// back to [`REPO_FALLBACK`].
pub fn sanitize_repo_name(raw: &str) -> String {
    let name: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if name.is_empty() {
        REPO_FALLBACK.to_string()
    } else {
        name
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
