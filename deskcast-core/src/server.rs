//! Streaming server: the producer-side capture/encode/send loop.
//!
//! The accept loop spawns one independent task per consumer connection,
//! so a blocking capture or a slow consumer never stalls the others.
//! Each connection cycles through an explicit state machine:
//!
//! ```text
//! AwaitingDelta → Capturing → Encoding → Sending → AwaitingDelta
//!                                  (terminal: Closed)
//! ```
//!
//! The send is awaited before the next capture starts — at most one
//! in-flight send per connection, so a slow consumer bounds our memory
//! instead of growing it. When the source reports no change the loop
//! sleeps for the idle interval and retries; an explicit empty-delta
//! heartbeat still goes out at a low floor rate so the consumer can
//! tell a live-but-idle session from a stalled one.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use futures::SinkExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::FramedWrite;
use tracing::{debug, info, trace, warn};

use crate::codec::DeltaCodec;
use crate::delta::FrameDelta;
use crate::error::CastError;
use crate::source::{Capture, FrameSource, SourceFactory};

// ── StreamServerConfig ───────────────────────────────────────────

/// Tuning knobs for the per-connection send loop.
#[derive(Debug, Clone)]
pub struct StreamServerConfig {
    /// Re-poll interval while the source reports no change (10 Hz).
    pub idle_poll: Duration,
    /// Floor rate for explicit no-change heartbeats.
    pub heartbeat_interval: Duration,
    /// zstd level handed to the codec.
    pub compression_level: i32,
}

impl Default for StreamServerConfig {
    fn default() -> Self {
        Self {
            idle_poll: Duration::from_millis(100),
            heartbeat_interval: Duration::from_secs(5),
            compression_level: 1,
        }
    }
}

// ── ConnPhase ────────────────────────────────────────────────────

/// Where a connection's cycle currently is. Logged at trace level and
/// asserted in tests; the transitions are the backpressure invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnPhase {
    AwaitingDelta,
    Capturing,
    Encoding,
    Sending,
    Closed,
}

// ── StreamServer ─────────────────────────────────────────────────

/// TCP listener fanning out one capture/encode/send task per consumer.
pub struct StreamServer {
    listener: TcpListener,
    make_source: SourceFactory,
    config: StreamServerConfig,
    running: Arc<AtomicBool>,
}

impl StreamServer {
    /// Bind the listener. `make_source` builds a fresh [`FrameSource`]
    /// for every accepted connection.
    pub async fn bind(
        addr: SocketAddr,
        make_source: SourceFactory,
        config: StreamServerConfig,
    ) -> Result<Self, CastError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            make_source,
            config,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The bound address (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, CastError> {
        Ok(self.listener.local_addr()?)
    }

    /// Cloneable handle to stop the accept loop from another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Accept consumers until stopped. Each connection runs on its own
    /// task and outlives an accept-loop stop only until its socket
    /// closes.
    pub async fn run(&self) -> Result<(), CastError> {
        self.running.store(true, Ordering::SeqCst);
        info!(addr = %self.local_addr()?, "stream server listening");

        while self.running.load(Ordering::SeqCst) {
            let accept = tokio::select! {
                result = self.listener.accept() => result,
                _ = wait_for_stop(&self.running) => break,
            };

            let (stream, peer) = match accept {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept error: {e}");
                    continue;
                }
            };

            info!(%peer, "consumer connected");
            let source = (self.make_source)();
            let config = self.config.clone();
            tokio::spawn(async move {
                let phase = connection_loop(stream, source, config, peer).await;
                debug_assert_eq!(phase, ConnPhase::Closed);
                info!(%peer, "consumer session ended");
            });
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Signal the accept loop to stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

async fn wait_for_stop(running: &Arc<AtomicBool>) {
    while running.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

// ── Per-connection loop ──────────────────────────────────────────

/// Drive one consumer until the socket closes or capture fails.
/// Returns the terminal phase (always [`ConnPhase::Closed`]).
async fn connection_loop(
    stream: TcpStream,
    mut source: Box<dyn FrameSource>,
    config: StreamServerConfig,
    peer: SocketAddr,
) -> ConnPhase {
    let mut framed = FramedWrite::new(stream, DeltaCodec::with_level(config.compression_level));
    let (width, height) = source.canvas_size();
    let mut sequence: u32 = 0;
    let mut last_send = Instant::now();
    let mut phase = ConnPhase::AwaitingDelta;
    let mut enter = move |next: ConnPhase| {
        phase = next;
        trace!(%peer, ?phase, "connection phase");
    };

    loop {
        enter(ConnPhase::Capturing);
        let capture = match source.next_delta() {
            Ok(c) => c,
            Err(e) => {
                warn!(%peer, "capture failed, closing: {e}");
                break;
            }
        };

        let delta = match capture {
            Capture::Delta(mut delta) => {
                delta.sequence_id = sequence;
                delta
            }
            Capture::Unchanged => {
                if last_send.elapsed() < config.heartbeat_interval {
                    enter(ConnPhase::AwaitingDelta);
                    tokio::time::sleep(config.idle_poll).await;
                    continue;
                }
                FrameDelta::heartbeat(width, height, sequence)
            }
        };

        // Encoding happens inside the codec as part of the send; the
        // await completes only once the previous bytes are flushed, so
        // at most one send is ever in flight.
        enter(ConnPhase::Encoding);
        debug!(
            %peer,
            seq = delta.sequence_id,
            dirty = delta.dirty_regions.len(),
            moves = delta.move_regions.len(),
            "sending delta"
        );
        enter(ConnPhase::Sending);
        if let Err(e) = framed.send(delta).await {
            // Not retried here; reconnecting is the consumer's job.
            warn!(%peer, "send failed, closing: {e}");
            break;
        }
        sequence = sequence.wrapping_add(1);
        last_send = Instant::now();
        enter(ConnPhase::AwaitingDelta);
    }

    ConnPhase::Closed
}

// ── Tests ────────────────────────────────────────────────────────
