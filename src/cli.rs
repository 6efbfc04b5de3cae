// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "biff",
    version,
    about = "Team presence and messaging beside your coding session"
)]
pub struct Cli {
    /// Log to stderr (the MCP transport owns stdout).
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the MCP stdio server (the default when no subcommand is given).
    Serve,

    /// Register biff with the host coding session.
    Install,

    /// Remove the host registration.
    Uninstall,

    /// Install the status-line script that aggregates unread counts.
    InstallStatusline,

    /// Remove the status-line script.
    UninstallStatusline,

    /// Check the local biff installation and relay reachability.
    Doctor,

    /// Write a starter .biff.toml into the repository root.
    Init,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn subcommands_use_kebab_case() {
        let cmd = Cli::command();
        let names: Vec<&str> = cmd.get_subcommands().map(|c| c.get_name()).collect();
        assert!(names.contains(&"serve"));
        assert!(names.contains(&"install-statusline"));
        assert!(names.contains(&"uninstall-statusline"));
        assert!(names.contains(&"doctor"));
    }

    #[test]
    fn no_subcommand_parses() {
        let cli = Cli::parse_from(["biff"]);
        assert!(cli.command.is_none());
    }
}
