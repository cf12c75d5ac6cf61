//! # deskcast-server — Producer Daemon
//!
//! Long-running daemon that polls a frame source for deltas, encodes
//! them as length-prefixed zstd messages, and streams them over TCP to
//! every connected consumer. Each consumer gets its own source and its
//! own send loop, paced by backpressure.

pub mod config;
