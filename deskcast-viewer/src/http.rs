//! Minimal HTTP/1.1 pull endpoint for the latest frame.
//!
//! One route: `GET /frame` returns the most recent complete canvas as
//! raw pixel bytes, with the dimensions in `X-Frame-Width` /
//! `X-Frame-Height` headers. The handler only ever reads the cache
//! slot, so a burst of pollers never touches the producer session.
//!
//! Deliberately not a full HTTP implementation: request heads are
//! parsed just enough to route, every response carries
//! `Connection: close`, and anything else gets 404/405.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use deskcast_core::{CastError, FrameSnapshot, LatestFrameCache};

/// Longest request head we accept before dropping the connection.
const MAX_HEAD_SIZE: usize = 8 * 1024;

/// Accept and serve HTTP pollers until the listener errors out.
pub async fn serve(listener: TcpListener, cache: LatestFrameCache) -> Result<(), CastError> {
    info!(addr = %listener.local_addr()?, "frame endpoint listening");
    loop {
        let (stream, peer) = listener.accept().await?;
        let cache = cache.clone();
        tokio::spawn(async move {
            if let Err(e) = handle(stream, cache).await {
                debug!(%peer, "http connection error: {e}");
            }
        });
    }
}

/// Serve a single request and close.
async fn handle(mut stream: TcpStream, cache: LatestFrameCache) -> std::io::Result<()> {
    let head = match read_head(&mut stream).await? {
        Some(head) => head,
        None => return Ok(()),
    };

    let mut parts = head.lines().next().unwrap_or("").split_whitespace();
    let (method, path) = (parts.next().unwrap_or(""), parts.next().unwrap_or(""));

    let response = match (method, path) {
        ("GET", "/frame") => match cache.read() {
            Some(snap) => frame_response(&snap),
            None => text_response(404, "Not Found", "no frame available\n"),
        },
        ("GET", _) => text_response(404, "Not Found", "not found\n"),
        _ => {
            warn!(method, path, "rejected request");
            text_response(405, "Method Not Allowed", "method not allowed\n")
        }
    };

    stream.write_all(&response).await?;
    stream.shutdown().await
}

/// Read up to the end of the request head (`\r\n\r\n`). Returns `None`
/// on a connection closed before a full head arrived.
async fn read_head(stream: &mut TcpStream) -> std::io::Result<Option<String>> {
    let mut buf = Vec::with_capacity(256);
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            return Ok(Some(String::from_utf8_lossy(&buf).into_owned()));
        }
        if buf.len() > MAX_HEAD_SIZE {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "request head too large",
            ));
        }
    }
}

fn frame_response(snap: &Arc<FrameSnapshot>) -> Vec<u8> {
    let mut out = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: application/octet-stream\r\n\
         Content-Length: {}\r\n\
         X-Frame-Width: {}\r\n\
         X-Frame-Height: {}\r\n\
         X-Frame-Sequence: {}\r\n\
         Connection: close\r\n\r\n",
        snap.data().len(),
        snap.width(),
        snap.height(),
        snap.sequence_id(),
    )
    .into_bytes();
    out.extend_from_slice(snap.data());
    out
}

fn text_response(code: u16, reason: &str, body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 {code} {reason}\r\n\
         Content-Type: text/plain\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n{body}",
        body.len(),
    )
    .into_bytes()
}

// ── Tests ────────────────────────────────────────────────────────
