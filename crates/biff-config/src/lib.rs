// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! `biff-config` — per-repo configuration, repository discovery and the
//! filesystem layout shared by the local relay and the awareness engine.
//!
//! Config is TOML, searched repo-first:
//!
//! ```toml
//! [team]
//! members = ["kai", "eric"]
//!
//! [relay]
//! url = "nats://bus.example.com:4222"
//! token = "s3cr3t"          # or nkeys_seed = "/path" or user_credentials = "/path"
//! ```
//!
//! No `[relay] url` means the filesystem relay — the common single-host case
//! needs no config file at all.

mod loader;
mod paths;
mod repo;
mod schema;

pub use loader::{load, load_from, ConfigError};
pub use paths::Paths;
pub use repo::{discover_repo, sanitize_repo_name, Repo, REPO_FALLBACK};
pub use schema::{Config, RelayAuth, RelayConfig, TeamConfig};
