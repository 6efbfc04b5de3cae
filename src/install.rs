// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! `biff install` / `biff install-statusline` — wire biff into the host.
//!
//! The host coding session discovers MCP servers through a JSON registration
//! file in the home directory; `install` adds (and `uninstall` removes) a
//! `biff` entry pointing at this binary's `serve` subcommand.  The status
//! line is a small shell script that sums the per-repo unread files the
//! awareness engine maintains.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use biff_config::Paths;
use biff_mcp::SERVER_INSTRUCTIONS;

/// Registration file consumed by the host client.
pub fn registration_file(home: &Path) -> PathBuf {
    home.join(".claude.json")
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().context("registration path has no parent")?;
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    use std::io::Write;
    tmp.write_all(bytes)?;
    tmp.persist(path)
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

fn read_registration(path: &Path) -> Result<serde_json::Value> {
    if !path.exists() {
        return Ok(serde_json::json!({}));
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Add the `biff` server entry to the host registration.
pub fn install(home: &Path) -> Result<()> {
    let path = registration_file(home);
    let mut root = read_registration(&path)?;
    let exe = std::env::current_exe().context("locating the biff binary")?;

    let servers = root
        .as_object_mut()
        .context("registration root is not an object")?
        .entry("mcpServers")
        .or_insert_with(|| serde_json::json!({}));
    servers
        .as_object_mut()
        .context("mcpServers is not an object")?
        .insert(
            "biff".to_string(),
            serde_json::json!({
                "command": exe.to_string_lossy(),
                "args": ["serve"],
                // Keeps the host from reflowing the pre-formatted tables.
                "instructions": SERVER_INSTRUCTIONS,
            }),
        );

    atomic_write(&path, serde_json::to_string_pretty(&root)?.as_bytes())?;
    println!("Registered biff in {}", path.display());
    Ok(())
}

/// Remove the `biff` entry, leaving everything else untouched.
pub fn uninstall(home: &Path) -> Result<()> {
    let path = registration_file(home);
    let mut root = read_registration(&path)?;
    let removed = root
        .get_mut("mcpServers")
        .and_then(|s| s.as_object_mut())
        .and_then(|s| s.remove("biff"))
        .is_some();
    if removed {
        atomic_write(&path, serde_json::to_string_pretty(&root)?.as_bytes())?;
        println!("Removed biff from {}", path.display());
    } else {
        println!("biff was not registered in {}", path.display());
    }
    Ok(())
}

/// Is the `biff` entry present?  Used by `doctor`.
pub fn is_installed(home: &Path) -> bool {
    read_registration(&registration_file(home))
        .ok()
        .and_then(|root| {
            root.get("mcpServers")
                .and_then(|s| s.get("biff"))
                .map(|_| ())
        })
        .is_some()
}

const STATUSLINE_SCRIPT: &str = r#"#!/bin/sh
# Sum unread biff messages across repositories for the status line.
total=0
for f in "$HOME/.biff/unread/"*.json; do
    [ -f "$f" ] || continue
    count=$(sed -n 's/.*"count":\([0-9]*\).*/\1/p' "$f")
    total=$((total + ${count:-0}))
done
if [ "$total" -gt 0 ]; then
    printf '%s unread' "$total"
fi
"#;

/// Write the status-line aggregator script.
pub fn install_statusline(paths: &Paths) -> Result<()> {
    let script = paths.statusline_script();
    std::fs::create_dir_all(paths.base())?;
    std::fs::create_dir_all(paths.unread_dir())?;
    std::fs::write(&script, STATUSLINE_SCRIPT)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))?;
    }
    println!("Installed {}", script.display());
    Ok(())
}

pub fn uninstall_statusline(paths: &Paths) -> Result<()> {
    let script = paths.statusline_script();
    if script.exists() {
        std::fs::remove_file(&script)?;
        println!("Removed {}", script.display());
    } else {
        println!("No status-line script at {}", script.display());
    }
    Ok(())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_then_uninstall_round_trips() {
        let home = tempfile::tempdir().unwrap();
        install(home.path()).unwrap();
        assert!(is_installed(home.path()));

        let text = std::fs::read_to_string(registration_file(home.path())).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["mcpServers"]["biff"]["args"][0], "serve");

        uninstall(home.path()).unwrap();
        assert!(!is_installed(home.path()));
    }

    #[test]
    fn install_preserves_other_servers() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(
            registration_file(home.path()),
            r#"{"mcpServers": {"other": {"command": "x"}}, "theme": "dark"}"#,
        )
        .unwrap();

        install(home.path()).unwrap();
        uninstall(home.path()).unwrap();

        let text = std::fs::read_to_string(registration_file(home.path())).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["mcpServers"]["other"]["command"], "x");
        assert_eq!(json["theme"], "dark");
    }

    #[test]
    fn uninstall_without_registration_is_quiet() {
        let home = tempfile::tempdir().unwrap();
        uninstall(home.path()).unwrap();
    }

    #[test]
    fn statusline_script_is_written_and_removed() {
        let home = tempfile::tempdir().unwrap();
        let paths = Paths::rooted_at(home.path().join(".biff"));
        install_statusline(&paths).unwrap();
        let script = paths.statusline_script();
        assert!(script.exists());
        let body = std::fs::read_to_string(&script).unwrap();
        assert!(body.starts_with("#!/bin/sh"));
        assert!(body.contains("unread"));

        uninstall_statusline(&paths).unwrap();
        assert!(!script.exists());
    }
}
