//! # ledgerwire
//!
//! Gateway binary: loads settings, installs logging and metrics, starts the
//! development ledger and serves WebSocket sessions until Ctrl-C.

#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ledgerwire_core::backend::{KeyManager, Ledger};
use ledgerwire_node::cli::Cli;
use ledgerwire_server::backend::MemoryLedger;
use ledgerwire_server::server::{self, AppState};
use ledgerwire_settings::{load_settings, load_settings_from_path};
use mimalloc::MiMalloc;
use tokio::net::TcpListener;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let mut settings = match args.settings {
        Some(ref path) => load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => load_settings().context("Failed to load settings")?,
    };
    args.apply(&mut settings);

    ledgerwire_core::logging::init_subscriber(&settings.logging.level, settings.logging.json)
        .context("Failed to install log subscriber")?;

    let metrics = ledgerwire_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let ledger = MemoryLedger::new(&settings.backend.genesis_balance)
        .context("Invalid genesis balance")?;
    ledger.set_auto_commit(settings.backend.auto_commit);
    tracing::info!(
        address = %ledger.active_address(),
        auto_commit = settings.backend.auto_commit,
        "development ledger ready"
    );

    let addr = Cli::bind_addr(&settings);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    let state = AppState::new(Arc::new(ledger), settings).with_metrics(metrics);
    let shutdown = state.shutdown.clone();
    let serving = tokio::spawn(server::serve(listener, state));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    tracing::info!("Shutting down...");
    shutdown.cancel();

    serving
        .await
        .context("Server task panicked")?
        .context("Server failed")?;
    tracing::info!("Shutdown complete");
    Ok(())
}
