// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod cli;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(Commands::Completions { shell }) = cli.command {
        cli::print_completions(shell);
        return Ok(());
    }

    let config = chatgate_config::load(cli.config.as_deref()).await.context("loading config")?;
    let env_vars = match &cli.env_file {
        Some(path) => chatgate_config::load_env_file(path).await,
        None => chatgate_config::load_env_file(std::path::Path::new(".env")).await,
    };
    let secrets = chatgate_config::resolve_secrets(&env_vars);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(cli.accounts, cli.port, config, secrets).await,
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Accounts => show_accounts(cli.accounts, config, secrets).await,
        Commands::Completions { .. } => unreachable!("handled above"),
    }
}

fn default_accounts_path() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("chatgate").join("accounts.json")
}

async fn serve(
    accounts_path: Option<PathBuf>,
    port_override: Option<u16>,
    mut config: chatgate_config::FileConfig,
    secrets: chatgate_config::Secrets,
) -> anyhow::Result<()> {
    if let Some(port) = port_override {
        config.server.port = port;
    }
    let host = config.server.host.clone();
    let port = config.server.port;
    let accounts_path = accounts_path.unwrap_or_else(default_accounts_path);

    let state = chatgate_server::AppState::build(config, secrets, accounts_path)
        .context("wiring application state")?;

    match state.accounts.ensure_initialized().await {
        Ok(outcomes) => {
            for outcome in &outcomes {
                if let Err(err) = &outcome.result {
                    tracing::warn!(account_id = %outcome.account_id, %err, "account refresh failed at startup");
                }
            }
            tracing::info!(accounts = outcomes.len(), "credential pool initialized");
        }
        Err(err) => tracing::warn!(%err, "credential pool failed to initialize; serving with whatever is usable"),
    }

    let addr: std::net::SocketAddr = format!("{host}:{port}").parse().context("parsing listen address")?;
    chatgate_server::serve(state, addr, shutdown_signal()).await
}

async fn show_accounts(
    accounts_path: Option<PathBuf>,
    config: chatgate_config::FileConfig,
    secrets: chatgate_config::Secrets,
) -> anyhow::Result<()> {
    let accounts_path = accounts_path.unwrap_or_else(default_accounts_path);
    let state = chatgate_server::AppState::build(config, secrets, accounts_path)
        .context("wiring application state")?;
    state.accounts.ensure_initialized().await.ok();
    for account in state.accounts.snapshot().await {
        println!(
            "{:<40} {:<8} disabled={}",
            account.email,
            account.id,
            account.disabled,
        );
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };
    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received, draining in-flight requests");
}

fn init_logging(verbose: u8) {
    let default_filter = if verbose > 0 { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();
}
