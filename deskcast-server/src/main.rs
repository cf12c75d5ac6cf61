//! deskcast-server — entry point.
//!
//! ```text
//! deskcast-server                  Run in the foreground
//! deskcast-server --config <path>  Load a custom config TOML
//! deskcast-server --gen-config     Write default config to stdout
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use deskcast_core::{SourceFactory, StreamServer, SyntheticSource};
use deskcast_server::config::ServerConfig;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "deskcast-server", about = "deskcast frame-delta streaming daemon")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "deskcast-server.toml")]
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
        let text = toml::to_string_pretty(&ServerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config.
    let config = ServerConfig::load(&cli.config);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("deskcast-server v{}", env!("CARGO_PKG_VERSION"));
    info!("listen address: {}", config.network.listen_addr);
    info!(
        "canvas: {}x{}",
        config.stream.canvas_width, config.stream.canvas_height
    );

    let listen_addr: SocketAddr = config.network.listen_addr.parse()?;
    let (width, height) = (config.stream.canvas_width, config.stream.canvas_height);
    let make_source: SourceFactory = Box::new(move || Box::new(SyntheticSource::new(width, height)));

    let server = StreamServer::bind(listen_addr, make_source, config.to_stream_config()).await?;
    let stop = server.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received — shutting down");
        stop.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    server.run().await?;

    Ok(())
}
