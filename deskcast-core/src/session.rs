//! Client session: consumes a delta stream and keeps the cache fresh.
//!
//! Reads chunks from the connection, lets [`DeltaCodec`] reassemble
//! message boundaries, applies each delta in arrival order through the
//! [`ReconstructionEngine`], and publishes snapshots. Purely
//! data-driven: the only suspension point is "wait for more bytes", so
//! cancelling is just dropping the session — all state is
//! connection-scoped.

use std::net::SocketAddr;
use std::time::Duration;

use futures::StreamExt;
use tokio::net::TcpStream;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

use crate::bitmap::BitmapProcessor;
use crate::cache::LatestFrameCache;
use crate::codec::DeltaCodec;
use crate::error::CastError;
use crate::reconstruct::ReconstructionEngine;

// ── SessionConfig ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// A producer that stays silent (no delta, no heartbeat) this long
    /// is considered stalled and the session ends with
    /// [`CastError::Timeout`].
    pub stall_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stall_timeout: Duration::from_secs(15),
        }
    }
}

// ── ClientSession ────────────────────────────────────────────────

/// One consumer-side session over one connection.
///
/// The bitmap lives exactly as long as the session; reconnecting
/// builds a fresh session (and thus a fresh bitmap), which is what a
/// mid-session dimension change requires.
pub struct ClientSession<P: BitmapProcessor> {
    framed: FramedRead<TcpStream, DeltaCodec>,
    engine: ReconstructionEngine<P>,
    config: SessionConfig,
    last_sequence: Option<u32>,
}

impl<P: BitmapProcessor> ClientSession<P> {
    /// Connect to a producer.
    pub async fn connect(
        addr: SocketAddr,
        processor: P,
        cache: LatestFrameCache,
        config: SessionConfig,
    ) -> Result<Self, CastError> {
        let stream = TcpStream::connect(addr).await?;
        info!(%addr, "connected to producer");
        Ok(Self::from_stream(stream, processor, cache, config))
    }

    /// Wrap an already-established stream (used by tests).
    pub fn from_stream(
        stream: TcpStream,
        processor: P,
        cache: LatestFrameCache,
        config: SessionConfig,
    ) -> Self {
        Self {
            framed: FramedRead::new(stream, DeltaCodec::new()),
            engine: ReconstructionEngine::new(processor, cache),
            config,
            last_sequence: None,
        }
    }

    /// Deltas applied so far (heartbeats included).
    pub fn applied_deltas(&self) -> u64 {
        self.engine.applied_deltas()
    }

    /// Run until EOF (clean close, `Ok`), stall timeout, or a fatal
    /// error. Corrupt individual messages are already skipped inside
    /// the codec and never surface here.
    pub async fn run(&mut self) -> Result<(), CastError> {
        loop {
            let next = tokio::time::timeout(self.config.stall_timeout, self.framed.next()).await;
            let item = match next {
                Err(_) => return Err(CastError::Timeout(self.config.stall_timeout)),
                Ok(None) => {
                    info!("producer closed the stream");
                    return Ok(());
                }
                Ok(Some(item)) => item,
            };

            let delta = item?;
            self.track_sequence(delta.sequence_id);
            debug!(
                seq = delta.sequence_id,
                dirty = delta.dirty_regions.len(),
                moves = delta.move_regions.len(),
                "applying delta"
            );
            self.engine.apply(&delta)?;
        }
    }

    /// The transport is ordered, so a gap means the producer skipped
    /// sequence numbers, not that messages were lost — worth a log
    /// line, never a reorder.
    fn track_sequence(&mut self, seq: u32) {
        if let Some(last) = self.last_sequence {
            let expected = last.wrapping_add(1);
            if seq != expected {
                warn!(expected, got = seq, "sequence gap");
            }
        }
        self.last_sequence = Some(seq);
    }
}

// ── Tests ────────────────────────────────────────────────────────
