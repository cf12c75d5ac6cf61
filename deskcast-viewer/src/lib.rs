//! # deskcast-viewer — Consumer Daemon
//!
//! Connects to a deskcast producer, reconstructs the remote canvas
//! from the delta stream, and serves the most recent complete frame
//! over a small HTTP pull endpoint (`GET /frame`).
//!
//! The latest-frame cache outlives individual producer sessions, so a
//! reconnect keeps serving the last good frame until fresh deltas
//! arrive.

pub mod config;
pub mod http;
