// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::Config;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("at most one of token, nkeys_seed, user_credentials may be set")]
    AmbiguousAuth,
}

/// Ordered list of config file locations, lowest priority first.
fn config_search_paths(repo_root: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/biff/config.toml"));
    }
    if let Some(root) = repo_root {
        paths.push(root.join(".biff.toml"));
    }
    paths
}

/// Load configuration for the repository rooted at `repo_root`.
///
/// The home-level file provides defaults (typically the relay URL and auth);
/// the repo-level `.biff.toml` overrides it field by field.  Missing files
/// are fine — the zero-config default is a local filesystem relay.
pub fn load(repo_root: Option<&Path>) -> Result<Config, ConfigError> {
    let mut merged = Config::default();
    for path in config_search_paths(repo_root) {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            merge(&mut merged, load_from(&path)?);
        }
    }
    Ok(merged)
}

/// Parse a single TOML config file.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Field-wise merge; `layer` wins wherever it sets a value.
fn merge(base: &mut Config, layer: Config) {
    if !layer.team.members.is_empty() {
        base.team.members = layer.team.members;
    }
    let r = layer.relay;
    if r.url.is_some() {
        base.relay.url = r.url;
    }
    if r.token.is_some() {
        base.relay.token = r.token;
    }
    if r.nkeys_seed.is_some() {
        base.relay.nkeys_seed = r.nkeys_seed;
    }
    if r.user_credentials.is_some() {
        base.relay.user_credentials = r.user_credentials;
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_config(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn load_from_parses_team_and_relay() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            ".biff.toml",
            "[team]\nmembers = [\"kai\"]\n\n[relay]\nurl = \"nats://bus:4222\"\n",
        );
        let cfg = load_from(&path).unwrap();
        assert_eq!(cfg.team.members, vec!["kai"]);
        assert_eq!(cfg.relay.url.as_deref(), Some("nats://bus:4222"));
    }

    #[test]
    fn load_from_missing_file_errors() {
        assert!(load_from(Path::new("/nonexistent/biff.toml")).is_err());
    }

    #[test]
    fn load_from_invalid_toml_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), ".biff.toml", "[relay\nurl=");
        assert!(matches!(
            load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn repo_layer_overrides_fields_it_sets() {
        let mut base: Config =
            toml::from_str("[relay]\nurl = \"nats://home:4222\"\ntoken = \"t\"\n").unwrap();
        let layer: Config = toml::from_str("[relay]\nurl = \"nats://repo:4222\"\n").unwrap();
        merge(&mut base, layer);
        assert_eq!(base.relay.url.as_deref(), Some("nats://repo:4222"));
        // token from the home layer survives
        assert_eq!(base.relay.token.as_deref(), Some("t"));
    }

    #[test]
    fn load_with_no_files_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load(Some(dir.path())).unwrap();
        assert!(cfg.relay.url.is_none());
    }

    #[test]
    fn load_picks_up_repo_file() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), ".biff.toml", "[team]\nmembers = [\"eric\"]\n");
        let cfg = load(Some(dir.path())).unwrap();
        assert_eq!(cfg.team.members, vec!["eric"]);
    }
}
