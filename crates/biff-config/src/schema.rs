// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub team: TeamConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

/// The roster of logins expected in this repository.  Purely informational:
/// addressing is open, the roster only feeds tool descriptions and `doctor`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamConfig {
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Bus URL, e.g. `nats://host:4222`.  Absent → local filesystem relay.
    pub url: Option<String>,
    /// Plain auth token.
    pub token: Option<String>,
    /// Absolute path to an nkeys seed file.
    pub nkeys_seed: Option<String>,
    /// Absolute path to a credentials file.
    pub user_credentials: Option<String>,
}

/// How the cluster relay authenticates.  At most one mechanism may be set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayAuth {
    None,
    Token(String),
    NkeysSeed(String),
    Credentials(String),
}

impl RelayConfig {
    /// Resolve the configured auth mechanism, rejecting ambiguous configs.
    pub fn auth(&self) -> Result<RelayAuth, crate::loader::ConfigError> {
        let set = [
            self.token.as_ref().map(|t| RelayAuth::Token(t.clone())),
            self.nkeys_seed.as_ref().map(|p| RelayAuth::NkeysSeed(p.clone())),
            self.user_credentials
                .as_ref()
                .map(|p| RelayAuth::Credentials(p.clone())),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();

        match set.len() {
            0 => Ok(RelayAuth::None),
            1 => Ok(set.into_iter().next().unwrap()),
            _ => Err(crate::loader::ConfigError::AmbiguousAuth),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_parses_to_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert!(cfg.team.members.is_empty());
        assert!(cfg.relay.url.is_none());
    }

    #[test]
    fn full_config_parses() {
        let cfg: Config = toml::from_str(
            r#"
            [team]
            members = ["kai", "eric"]

            [relay]
            url = "nats://bus:4222"
            token = "abc"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.team.members, vec!["kai", "eric"]);
        assert_eq!(cfg.relay.url.as_deref(), Some("nats://bus:4222"));
        assert_eq!(cfg.relay.auth().unwrap(), RelayAuth::Token("abc".into()));
    }

    #[test]
    fn no_auth_resolves_to_none() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.auth().unwrap(), RelayAuth::None);
    }

    #[test]
    fn two_auth_mechanisms_are_rejected() {
        let cfg = RelayConfig {
            url: Some("nats://bus:4222".into()),
            token: Some("abc".into()),
            nkeys_seed: Some("/seed".into()),
            user_credentials: None,
        };
        assert!(cfg.auth().is_err());
    }
}
