// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! `biff doctor` — six probes over the local installation.
//!
//! The first four are required and gate the exit code; the last two are
//! informational.  Output is one line per probe plus a closing verdict.

use std::path::Path;
use std::time::Duration;

use biff_config::Paths;
use biff_mcp::identity::resolve_identity;
use biff_relay::{ClusterRelay, Relay};

/// Relay probes get less patience than regular operations: doctor should
/// answer quickly even when the bus is black-holed.
const RELAY_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

struct Probe {
    name: &'static str,
    required: bool,
    ok: bool,
    detail: String,
}

fn report(probes: &[Probe]) -> bool {
    let mut ok = true;
    for p in probes {
        let mark = if p.ok { "ok" } else { "FAIL" };
        let tag = if p.required { "" } else { " (informational)" };
        println!("{:>4}  {}{} — {}", mark, p.name, tag, p.detail);
        if p.required && !p.ok {
            ok = false;
        }
    }
    ok
}

/// Run all six probes.  Returns `true` when every required probe passed.
pub async fn run(home: &Path, paths: &Paths, cwd: &Path) -> bool {
    let mut probes = Vec::new();

    // 1. Identity authority reachable.
    let identity = resolve_identity();
    probes.push(Probe {
        name: "identity",
        required: true,
        ok: !identity.login.trim().is_empty(),
        detail: format!("login '{}'", identity.login),
    });

    // 2. Transport registration present.
    let registered = crate::install::is_installed(home);
    probes.push(Probe {
        name: "registration",
        required: true,
        ok: registered,
        detail: if registered {
            format!("{}", crate::install::registration_file(home).display())
        } else {
            "run `biff install`".to_string()
        },
    });

    // 3. Plugin files present (the data dir the server and status bar share).
    let base_ok = paths.base().exists();
    probes.push(Probe {
        name: "plugin files",
        required: true,
        ok: base_ok,
        detail: if base_ok {
            format!("{}", paths.base().display())
        } else {
            format!("{} missing — run `biff install-statusline`", paths.base().display())
        },
    });

    // 4. Relay reachable.
    let repo = biff_config::discover_repo(cwd);
    let (relay_ok, relay_detail) = probe_relay(paths, &repo).await;
    probes.push(Probe {
        name: "relay",
        required: true,
        ok: relay_ok,
        detail: relay_detail,
    });

    // 5. Per-repo config present.
    let repo_config = repo.root.as_ref().map(|r| r.join(".biff.toml"));
    let cfg_ok = repo_config.as_ref().map(|p| p.is_file()).unwrap_or(false);
    probes.push(Probe {
        name: "repo config",
        required: false,
        ok: cfg_ok,
        detail: match &repo_config {
            Some(p) if cfg_ok => format!("{}", p.display()),
            Some(p) => format!("{} not found — run `biff init`", p.display()),
            None => "not inside a repository".to_string(),
        },
    });

    // 6. Status bar installed.
    let script = paths.statusline_script();
    let script_ok = script.is_file();
    probes.push(Probe {
        name: "status bar",
        required: false,
        ok: script_ok,
        detail: if script_ok {
            format!("{}", script.display())
        } else {
            "run `biff install-statusline`".to_string()
        },
    });

    let ok = report(&probes);
    if ok {
        println!("All required checks passed.");
    } else {
        println!("Required checks failed.");
    }
    ok
}

async fn probe_relay(paths: &Paths, repo: &biff_config::Repo) -> (bool, String) {
    let config = match biff_config::load(repo.root.as_deref()) {
        Ok(c) => c,
        Err(e) => return (false, format!("config: {e}")),
    };
    match &config.relay.url {
        None => {
            // Filesystem relay: reachable means the data dir is writable.
            match biff_relay::LocalRelay::open(paths.repo_data_dir(&repo.name)) {
                Ok(r) => (true, format!("local relay at {}", r.dir().display())),
                Err(e) => (false, format!("local relay: {e}")),
            }
        }
        Some(url) => {
            let auth = match config.relay.auth() {
                Ok(a) => a,
                Err(e) => return (false, format!("relay auth: {e}")),
            };
            let identity = resolve_identity();
            let connect = ClusterRelay::connect(url, auth, &repo.name, &identity.login);
            match tokio::time::timeout(RELAY_PROBE_TIMEOUT, connect).await {
                Ok(Ok(relay)) => {
                    let _ = relay.close().await;
                    (true, format!("bus relay at {url}"))
                }
                Ok(Err(e)) => (false, format!("bus relay: {e}")),
                Err(_) => (false, format!("bus relay: no answer from {url} within 3s")),
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
