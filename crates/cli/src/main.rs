// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `souq` — developer harness for the session core.
//!
//! Exercises the full credential lifecycle against a real identity
//! provider from a terminal: registration, confirmation, interactive
//! sign-in, status, silent renewal, and sign-out.

use std::sync::Once;

use clap::Parser;

use souq_session::AuthConfig;

mod browser;
mod command;

#[derive(Debug, Parser)]
#[command(name = "souq", about = "Developer harness for the souq session core")]
struct Cli {
    #[command(flatten)]
    config: AuthConfig,

    /// Log filter (tracing `EnvFilter` syntax).
    #[arg(long, default_value = "info", env = "SOUQ_LOG")]
    log_level: String,

    #[command(subcommand)]
    command: command::Command,
}

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times — only the first call has effect.
fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&cli.log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    ensure_crypto();

    let code = command::run(&cli.config, &cli.command).await;
    std::process::exit(code);
}
