//! # deskcast-core
//!
//! Core library for deskcast: delta-based screen streaming from one
//! producer to many consumers over TCP.
//!
//! This crate contains:
//! - **Region model**: `Rectangle`, `DirtyRegion`, `MoveRegion` — the
//!   value types a frame delta is made of
//! - **Delta codec**: `FrameDelta` with its exact binary wire layout
//! - **Framing**: `DeltaCodec` — length-prefixed zstd framing and the
//!   chunk-boundary-independent stream reassembly engine
//! - **Source**: `FrameSource` capture boundary + `SyntheticSource`
//! - **Bitmap**: `BitmapProcessor` blit boundary + `SoftwareBitmap`
//! - **Server**: `StreamServer` — per-connection capture/encode/send
//!   loop with idle backoff and heartbeats
//! - **Session**: `ClientSession` — reassemble, reconstruct, publish
//! - **Cache**: `LatestFrameCache` — atomic single-slot snapshot store
//! - **Error**: `CastError` — typed, `thiserror`-based error hierarchy

pub mod bitmap;
pub mod cache;
pub mod codec;
pub mod delta;
pub mod error;
pub mod reconstruct;
pub mod region;
pub mod server;
pub mod session;
pub mod source;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use bitmap::{BitmapProcessor, SoftwareBitmap};
pub use cache::{FrameSnapshot, LatestFrameCache};
pub use codec::{DeltaCodec, LEN_PREFIX_SIZE, MAX_MESSAGE_SIZE};
pub use delta::FrameDelta;
pub use error::CastError;
pub use reconstruct::ReconstructionEngine;
pub use region::{BYTES_PER_PIXEL, DirtyRegion, MoveRegion, Point, Rectangle};
pub use server::{ConnPhase, StreamServer, StreamServerConfig};
pub use session::{ClientSession, SessionConfig};
pub use source::{Capture, FrameSource, SourceFactory, SyntheticSource};
