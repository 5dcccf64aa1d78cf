// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};

/// API-compatibility gateway: translates OpenAI/Anthropic/Gemini chat
/// requests into a single upstream dialect over a pool of OAuth accounts.
#[derive(Parser, Debug)]
#[command(name = "chatgate", version, about)]
pub struct Cli {
    /// Path to the JSON config file. Falls back to `./chatgate.json`, then
    /// `~/.config/chatgate/config.json`, then built-in defaults.
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Path to the account pool file. Defaults to
    /// `~/.config/chatgate/accounts.json`.
    #[arg(long, global = true)]
    pub accounts: Option<PathBuf>,

    /// Path to a `.env`-style file of secrets. Real environment variables
    /// always take precedence over values loaded from this file.
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    /// Override the listen port from the config file.
    #[arg(long)]
    pub port: Option<u16>,

    /// Write tracing output to stderr at this verbosity instead of the
    /// default `info`-level filter driven by `RUST_LOG`.
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the gateway (the default when no subcommand is given).
    Serve,

    /// Print the resolved config (secrets redacted) and exit.
    ShowConfig,

    /// List accounts in the pool and their rotation state.
    Accounts,

    /// Print shell completions for the given shell to stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
}
