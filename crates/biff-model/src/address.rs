// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::SessionKey;

/// Where a message is addressed.
///
/// `"u"` parses to [`Address::User`] — the broadcast inbox of that login,
/// consumed by the first of the login's sessions to read.  `"u:t"` parses to
/// [`Address::Session`] — the targeted inbox of exactly one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Address {
    User { login: String },
    Session { key: SessionKey },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressParseError {
    #[error("empty address")]
    Empty,

    #[error("invalid login: {0:?}")]
    InvalidLogin(String),

    #[error("invalid tty: {0:?}")]
    InvalidTty(String),
}

fn valid_login(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

fn valid_tty(s: &str) -> bool {
    (1..=16).contains(&s.len())
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

impl Address {
    pub fn user(login: impl Into<String>) -> Self {
        Address::User { login: login.into() }
    }

    pub fn session(key: SessionKey) -> Self {
        Address::Session { key }
    }

    /// The login this address belongs to, regardless of kind.
    pub fn login(&self) -> &str {
        match self {
            Address::User { login } => login,
            Address::Session { key } => &key.login,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self, Address::User { .. })
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches('@');
        if s.is_empty() {
            return Err(AddressParseError::Empty);
        }
        match s.split_once(':') {
            None => {
                if !valid_login(s) {
                    return Err(AddressParseError::InvalidLogin(s.to_string()));
                }
                Ok(Address::user(s))
            }
            Some((login, tty)) => {
                if !valid_login(login) {
                    return Err(AddressParseError::InvalidLogin(login.to_string()));
                }
                if !valid_tty(tty) {
                    return Err(AddressParseError::InvalidTty(tty.to_string()));
                }
                Ok(Address::session(SessionKey::new(login, tty)))
            }
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::User { login } => write!(f, "{login}"),
            Address::Session { key } => write!(f, "{key}"),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_login_is_broadcast() {
        let addr: Address = "kai".parse().unwrap();
        assert_eq!(addr, Address::user("kai"));
        assert!(addr.is_broadcast());
    }

    #[test]
    fn login_colon_tty_is_targeted() {
        let addr: Address = "kai:aabb1122".parse().unwrap();
        assert_eq!(addr, Address::session(SessionKey::new("kai", "aabb1122")));
        assert!(!addr.is_broadcast());
    }

    #[test]
    fn leading_at_sign_is_stripped() {
        let addr: Address = "@kai".parse().unwrap();
        assert_eq!(addr, Address::user("kai"));
    }

    #[test]
    fn empty_is_rejected() {
        assert_eq!("".parse::<Address>(), Err(AddressParseError::Empty));
        assert_eq!("@".parse::<Address>(), Err(AddressParseError::Empty));
    }

    #[test]
    fn empty_tty_is_rejected() {
        assert!(matches!(
            "kai:".parse::<Address>(),
            Err(AddressParseError::InvalidTty(_))
        ));
    }

    #[test]
    fn uppercase_tty_is_rejected() {
        assert!(matches!(
            "kai:AABB1122".parse::<Address>(),
            Err(AddressParseError::InvalidTty(_))
        ));
    }

    #[test]
    fn login_with_spaces_is_rejected() {
        assert!(matches!(
            "k ai".parse::<Address>(),
            Err(AddressParseError::InvalidLogin(_))
        ));
    }

    #[test]
    fn subject_metacharacters_are_rejected() {
        // '.' separates bus subject tokens and '>' / '*' are wildcards; only
        // '.' is legal inside a login, never inside a tty.
        assert!("kai:a.b".parse::<Address>().is_err());
        assert!("k>i".parse::<Address>().is_err());
        assert!("k*i".parse::<Address>().is_err());
    }

    #[test]
    fn display_round_trips() {
        for s in ["kai", "kai:aabb1122"] {
            let addr: Address = s.parse().unwrap();
            assert_eq!(addr.to_string(), s);
        }
    }

    #[test]
    fn login_accessor_covers_both_kinds() {
        assert_eq!("kai".parse::<Address>().unwrap().login(), "kai");
        assert_eq!("kai:ab12".parse::<Address>().unwrap().login(), "kai");
    }
}
