// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use clap::Parser;
use pihole_dns::{
    appliance::PiholeClient,
    constants::{
        DEFAULT_INSTANCE_TIMEOUT_SECS, DEFAULT_LISTEN_ADDR, DEFAULT_SWEEP_INTERVAL_SECS,
        PENDING_DELETION_TTL_SECS,
    },
    fanout::FanOutExecutor,
    registry::InstanceRegistry,
    server::{router, shutdown_signal},
    tokens::ConfirmationStore,
    tools::DnsTools,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Manage Pi-hole local DNS records across instances
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address the HTTP tool surface listens on
    #[arg(long, env = "PIHOLE_DNS_LISTEN_ADDR", default_value = DEFAULT_LISTEN_ADDR)]
    listen_addr: String,

    /// Ceiling for one operation on one instance
    #[arg(long, env = "PIHOLE_DNS_INSTANCE_TIMEOUT_SECS", default_value_t = DEFAULT_INSTANCE_TIMEOUT_SECS)]
    instance_timeout_secs: u64,

    /// Lifetime of a deletion confirmation token
    #[arg(long, env = "PIHOLE_DNS_TOKEN_TTL_SECS", default_value_t = PENDING_DELETION_TTL_SECS)]
    token_ttl_secs: u64,

    /// Interval between sweeps of expired pending deletions
    #[arg(long, env = "PIHOLE_DNS_SWEEP_INTERVAL_SECS", default_value_t = DEFAULT_SWEEP_INTERVAL_SECS)]
    sweep_interval_secs: u64,

    /// Accept self-signed Pi-hole certificates
    #[arg(long, env = "PIHOLE_DNS_ACCEPT_INVALID_CERTS")]
    accept_invalid_certs: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("pihole-dns")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    // Format: timestamp file:line LEVEL message
    //
    // Respects RUST_LOG (default INFO) and RUST_LOG_FORMAT=json|text
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Starting pihole-dns");
    debug!(?args, "Parsed command line");

    let registry = InstanceRegistry::from_env().context("Invalid Pi-hole configuration")?;
    info!(instances = ?registry.names(), "Loaded Pi-hole instances");

    let client = Arc::new(
        PiholeClient::new(args.accept_invalid_certs).context("Failed to build HTTP client")?,
    );
    let store = Arc::new(ConfirmationStore::new(Duration::from_secs(args.token_ttl_secs)));
    let executor = FanOutExecutor::new(Duration::from_secs(args.instance_timeout_secs));

    let tools = Arc::new(DnsTools::with_parts(
        registry,
        client.clone(),
        executor,
        Arc::clone(&store),
    ));

    let sweeper = tokio::spawn(sweep_expired(
        store,
        Duration::from_secs(args.sweep_interval_secs.max(1)),
    ));

    let listener = tokio::net::TcpListener::bind(&args.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen_addr))?;
    info!(addr = %args.listen_addr, "Listening for tool calls");

    axum::serve(listener, router(tools))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    client.logout_all().await;
    info!("Shutdown complete");
    Ok(())
}

/// Periodically drop expired pending deletions.
async fn sweep_expired(store: Arc<ConfirmationStore>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        let purged = store.purge_expired();
        if purged > 0 {
            debug!(purged, "Swept expired pending deletions");
        }
    }
}
