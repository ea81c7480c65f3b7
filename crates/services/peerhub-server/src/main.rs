//! Peerhub server binary entry point
//!
//! Runs the rendezvous relay with an in-process broker.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (127.0.0.1:8090)
//! peerhub-server
//!
//! # Custom address and JSON logs
//! peerhub-server --addr 0.0.0.0:8090 --log-format json
//!
//! # Probe a running instance through its saved listen address
//! peerhub-server check
//! ```
//!
//! `RUST_LOG` overrides `--log` when set. The bound listen address is
//! written to `.peerhub-addr` so the `check` subcommand can find the
//! running instance.

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use peerhub::{Config, Hub, MemoryBroker};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// File recording the bound listen address for the health probe
const ADDR_FILE: &str = ".peerhub-addr";

/// Rendezvous relay for signed peer-to-peer calls
#[derive(Parser)]
#[command(name = "peerhub-server", version)]
struct Args {
    /// Listen address
    #[arg(long, default_value = "127.0.0.1:8090")]
    addr: String,

    /// Log level filter (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Probe a running server through its saved listen address
    Check,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log.clone()));
    match args.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .thread_name("peerhub")
        .enable_all()
        .build()?;

    match args.command {
        Some(Command::Check) => runtime.block_on(check()),
        None => runtime.block_on(serve(args)),
    }
}

async fn serve(args: Args) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&args.addr)
        .await
        .with_context(|| format!("bind {}", args.addr))?;
    let addr = listener.local_addr()?;
    tokio::fs::write(ADDR_FILE, addr.to_string())
        .await
        .context("save listen address")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        %addr,
        "peerhub server starting"
    );

    let hub = Hub::new(Arc::new(MemoryBroker::new()), Config::default());
    hub.serve(listener).await.context("server error")?;

    info!("peerhub server shutdown complete");
    Ok(())
}

async fn check() -> anyhow::Result<()> {
    let addr = tokio::fs::read_to_string(ADDR_FILE)
        .await
        .context("read saved listen address")?;
    let url = format!("http://{}/health", addr.trim());
    let response = reqwest::get(&url).await.context("health request")?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!(%status, body = %body, "health check failed");
        std::process::exit(1);
    }
    Ok(())
}
