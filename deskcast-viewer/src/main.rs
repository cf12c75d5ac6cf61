//! deskcast-viewer — entry point.
//!
//! ```text
//! deskcast-viewer                  Run in the foreground
//! deskcast-viewer --config <path>  Load a custom config TOML
//! deskcast-viewer --gen-config     Write default config to stdout
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use deskcast_core::{CastError, ClientSession, LatestFrameCache, SoftwareBitmap};
use deskcast_viewer::config::ViewerConfig;
use deskcast_viewer::http;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "deskcast-viewer", about = "deskcast frame-delta consumer and pull endpoint")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "deskcast-viewer.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&ViewerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config.
    let config = ViewerConfig::load(&cli.config);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("deskcast-viewer v{}", env!("CARGO_PKG_VERSION"));
    info!("producer: {}", config.network.server_addr);
    info!("frame endpoint: {}", config.http.listen_addr);

    let server_addr: SocketAddr = config.network.server_addr.parse()?;
    let http_addr: SocketAddr = config.http.listen_addr.parse()?;

    // One cache shared by the session loop and the HTTP endpoint. It
    // outlives sessions, so pollers keep getting the last good frame
    // across reconnects.
    let cache = LatestFrameCache::new();

    let http_listener = TcpListener::bind(http_addr).await?;
    let http_cache = cache.clone();
    tokio::spawn(async move {
        if let Err(e) = http::serve(http_listener, http_cache).await {
            error!("frame endpoint failed: {e}");
        }
    });

    tokio::select! {
        _ = session_loop(server_addr, cache, &config) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received — shutting down");
        }
    }

    Ok(())
}

/// Connect, consume until the session ends, reconnect with bounded
/// exponential backoff. Every session starts with a fresh bitmap, so a
/// producer-side resolution change heals on the next connect.
async fn session_loop(server_addr: SocketAddr, cache: LatestFrameCache, config: &ViewerConfig) {
    let mut backoff = Duration::from_millis(500);
    loop {
        match ClientSession::connect(
            server_addr,
            SoftwareBitmap::new(),
            cache.clone(),
            config.to_session_config(),
        )
        .await
        {
            Ok(mut session) => {
                match session.run().await {
                    Ok(()) => info!("producer closed the session"),
                    Err(CastError::DimensionMismatch { .. }) => {
                        warn!("canvas dimensions changed; reconnecting with a fresh bitmap");
                    }
                    Err(e) => warn!("session ended: {e}"),
                }
                info!(deltas = session.applied_deltas(), "session finished");
                backoff = Duration::from_millis(500);
            }
            Err(e) => {
                warn!("connect to {server_addr} failed: {e}");
                backoff = (backoff * 2).min(config.reconnect_max());
            }
        }

        tokio::time::sleep(backoff).await;
    }
}
