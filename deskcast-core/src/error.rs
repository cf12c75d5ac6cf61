//! Domain-specific error types for the deskcast pipeline.
//!
//! All fallible operations return `Result<T, CastError>`.
//! No panics on invalid input — every error is typed, and the docs on
//! each variant say whether it is recoverable or fatal to the session.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the deskcast pipeline.
#[derive(Debug, Error)]
pub enum CastError {
    // ── Producer-side ────────────────────────────────────────────
    /// The frame source failed to capture. Fatal to the connection.
    #[error("capture failed: {0}")]
    Capture(String),

    // ── Wire / codec ─────────────────────────────────────────────
    /// A single wire message was malformed (bad length prefix,
    /// payload not matching declared geometry, failed decompression).
    /// Recoverable: the stream resynchronizes at the next length prefix.
    #[error("malformed message: {0}")]
    Codec(String),

    // ── Reconstruction ───────────────────────────────────────────
    /// A region fell outside the bitmap bounds. The engine clips and
    /// continues; this variant exists so the condition can be logged
    /// and tested, never to abort a delta.
    #[error("region out of bounds: {0}")]
    Geometry(String),

    /// The canvas dimensions changed mid-session. Fatal: the consumer
    /// must reconnect so a fresh bitmap of the new size is created.
    #[error("canvas changed from {had_width}x{had_height} to {got_width}x{got_height} mid-session")]
    DimensionMismatch {
        had_width: u32,
        had_height: u32,
        got_width: u32,
        got_height: u32,
    },

    // ── Connection ───────────────────────────────────────────────
    /// The TCP/IO layer reported an error. Fatal to the connection.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// No data arrived (not even a heartbeat) within the stall window.
    #[error("stalled: no data within {0:?}")]
    Timeout(Duration),

    /// An internal channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for CastError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        CastError::ChannelClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let e = CastError::Codec("short payload".into());
        assert!(e.to_string().contains("short payload"));

        let e = CastError::DimensionMismatch {
            had_width: 100,
            had_height: 100,
            got_width: 200,
            got_height: 150,
        };
        assert!(e.to_string().contains("100x100"));
        assert!(e.to_string().contains("200x150"));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: CastError = io_err.into();
        assert!(matches!(e, CastError::Transport(_)));
    }
}
