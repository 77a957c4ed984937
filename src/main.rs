//! Demo driver: simulated peers connecting and disconnecting from several
//! network threads, observed through the session event process.

use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use session_events::{Endpoint, SessionEventProcess, SessionEventsConfig, SessionState};

#[derive(Debug, Parser)]
#[command(name = "session-events", about = "Simulate session lifecycle events")]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of simulated peers (one network thread each)
    #[arg(long, default_value_t = 4)]
    peers: u8,

    /// Connect/disconnect cycles per peer
    #[arg(long, default_value_t = 3)]
    cycles: usize,

    /// Leave the last session of every peer open
    #[arg(long)]
    keep_open: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SessionEventsConfig::load(path)
            .await
            .with_context(|| format!("loading {}", path.display()))?,
        None => SessionEventsConfig::default(),
    };

    let process = Arc::new(SessionEventProcess::new(config)?);
    process.subscribe_named("observe", |endpoint: &Endpoint, state: SessionState| -> anyhow::Result<()> {
        info!("[observe] {} {}", state, endpoint);
        Ok(())
    });
    process.subscribe_named("blockwise", |endpoint: &Endpoint, state: SessionState| -> anyhow::Result<()> {
        if state == SessionState::Disconnected {
            info!("[blockwise] releasing buffers for {}", endpoint);
        }
        Ok(())
    });
    process.spawn()?;

    let mut diagnostics = process.diagnostics();
    let monitor = tokio::spawn(async move {
        loop {
            match diagnostics.recv().await {
                Ok(diagnostic) => info!("[diagnostic] {}", diagnostic),
                Err(RecvError::Lagged(missed)) => warn!("[diagnostic] missed {} diagnostics", missed),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let producers = (1..=args.peers).map(|peer| {
        let process = process.clone();
        let cycles = args.cycles;
        let keep_open = args.keep_open;
        tokio::task::spawn_blocking(move || {
            let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, peer)), 5683);
            let endpoint = Endpoint::tcp(addr);
            for cycle in 0..cycles {
                process.start(&endpoint);
                if !(keep_open && cycle + 1 == cycles) {
                    process.end(&endpoint);
                }
            }
        })
    });
    for result in futures::future::join_all(producers).await {
        result.context("network thread panicked")?;
    }

    process.flush().await?;
    let sessions = process.sessions().await?;
    println!("{}", serde_json::to_string_pretty(&sessions)?);

    let live = process.shutdown().await?;
    info!("{} sessions still connected at shutdown", live);

    monitor.abort();
    Ok(())
}
