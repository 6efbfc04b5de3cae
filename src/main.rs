// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;
mod doctor;
mod install;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use biff_config::Paths;
use biff_mcp::RunningServer;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The MCP transport owns stdout, so logs must never reach it.  Stay
    // silent unless the caller opts in via --verbose or BIFF_LOG (both go to
    // stderr).
    init_logging(cli.verbose);

    let home = dirs::home_dir().context("cannot determine home directory")?;
    let paths = Paths::rooted_at(home.join(".biff"));

    match cli.command {
        None | Some(Commands::Serve) => {
            let running = RunningServer::start().await?;
            biff_mcp::serve_stdio(running).await
        }
        Some(Commands::Install) => install::install(&home),
        Some(Commands::Uninstall) => install::uninstall(&home),
        Some(Commands::InstallStatusline) => install::install_statusline(&paths),
        Some(Commands::UninstallStatusline) => install::uninstall_statusline(&paths),
        Some(Commands::Doctor) => {
            let cwd = std::env::current_dir()?;
            if doctor::run(&home, &paths, &cwd).await {
                Ok(())
            } else {
                std::process::exit(1);
            }
        }
        Some(Commands::Init) => init_repo(),
    }
}

fn init_logging(verbose: bool) {
    let explicit = std::env::var("BIFF_LOG").ok();
    if !verbose && explicit.is_none() {
        return;
    }
    let filter = explicit
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

const CONFIG_TEMPLATE: &str = r#"# biff per-repo configuration.

[team]
members = []

# Uncomment to use a shared bus relay instead of the local filesystem.
# At most one of token / nkeys_seed / user_credentials may be set.
#
# [relay]
# url = "nats://bus.example.com:4222"
# token = "..."
# nkeys_seed = "/path/to/seed"
# user_credentials = "/path/to/creds"
"#;

fn init_repo() -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let repo = biff_config::discover_repo(&cwd);
    let root = repo
        .root
        .context("not inside a repository (no .git found upward from here)")?;
    let path = root.join(".biff.toml");
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    std::fs::write(&path, CONFIG_TEMPLATE)?;
    println!("Wrote {}", path.display());
    Ok(())
}
