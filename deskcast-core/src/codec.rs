//! Wire framing, compression, and stream reassembly.
//!
//! Every message on the stream is `[4-byte big-endian length][zstd
//! payload]`; the payload decompresses to an encoded [`FrameDelta`].
//! Compression always covers the whole encoded message — never raw
//! transport chunks — so a message split across many reads (or many
//! messages delivered in one read) reassembles identically.
//!
//! The [`Decoder`] impl is the reassembly engine. It never assumes a
//! chunk boundary is a message boundary: bytes accumulate in the
//! `BytesMut` buffer, and a message is sliced out only once the prefix
//! and the full declared length are present. Messages are yielded
//! strictly in arrival order.
//!
//! ## Corruption handling
//!
//! A message that is well-delimited but fails decompression or
//! decoding is discarded and counted; decoding resynchronizes at the
//! next length prefix and the connection survives. A length prefix
//! beyond [`MAX_MESSAGE_SIZE`] means the stream itself can no longer be
//! trusted, so that is fatal.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::delta::FrameDelta;
use crate::error::CastError;

/// Size of the length prefix on the wire.
pub const LEN_PREFIX_SIZE: usize = 4;

/// Upper bound on a single compressed message. Generous enough for a
/// full 8K BGRA frame, small enough to catch a desynchronized stream.
pub const MAX_MESSAGE_SIZE: usize = 256 * 1024 * 1024;

// ── DeltaCodec ───────────────────────────────────────────────────

/// Framed codec for [`FrameDelta`] messages, usable with
/// `tokio_util::codec::{Framed, FramedRead, FramedWrite}`.
pub struct DeltaCodec {
    /// zstd level used when encoding (1 = fast; the producer favours
    /// latency over ratio).
    compression_level: i32,
    /// Syntactically delimited messages discarded as corrupt.
    corrupt_messages: u64,
}

impl DeltaCodec {
    pub fn new() -> Self {
        Self::with_level(1)
    }

    pub fn with_level(compression_level: i32) -> Self {
        Self {
            compression_level,
            corrupt_messages: 0,
        }
    }

    /// Number of messages discarded due to corruption since creation.
    pub fn corrupt_messages(&self) -> u64 {
        self.corrupt_messages
    }

    /// Compress an encoded delta. Exposed for tests that build wire
    /// streams by hand.
    pub fn compress(&self, encoded: &[u8]) -> Result<Vec<u8>, CastError> {
        zstd::encode_all(encoded, self.compression_level)
            .map_err(|e| CastError::Codec(format!("zstd encode: {e}")))
    }

    fn decode_message(payload: &[u8]) -> Result<FrameDelta, CastError> {
        let raw = zstd::decode_all(payload)
            .map_err(|e| CastError::Codec(format!("zstd decode: {e}")))?;
        FrameDelta::decode(&raw)
    }
}

impl Default for DeltaCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder<FrameDelta> for DeltaCodec {
    type Error = CastError;

    fn encode(&mut self, item: FrameDelta, dst: &mut BytesMut) -> Result<(), CastError> {
        let compressed = self.compress(&item.encode())?;
        if compressed.len() > MAX_MESSAGE_SIZE {
            return Err(CastError::Codec(format!(
                "message of {} bytes exceeds cap {MAX_MESSAGE_SIZE}",
                compressed.len()
            )));
        }
        dst.reserve(LEN_PREFIX_SIZE + compressed.len());
        dst.put_u32(compressed.len() as u32);
        dst.extend_from_slice(&compressed);
        Ok(())
    }
}

impl Decoder for DeltaCodec {
    type Item = FrameDelta;
    type Error = CastError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<FrameDelta>, CastError> {
        loop {
            if src.len() < LEN_PREFIX_SIZE {
                return Ok(None);
            }
            let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
            if len > MAX_MESSAGE_SIZE {
                return Err(CastError::Codec(format!(
                    "declared length {len} exceeds cap {MAX_MESSAGE_SIZE}"
                )));
            }
            if src.len() < LEN_PREFIX_SIZE + len {
                // Wait for more bytes; reserve what we know is coming.
                src.reserve(LEN_PREFIX_SIZE + len - src.len());
                return Ok(None);
            }

            src.advance(LEN_PREFIX_SIZE);
            let payload = src.split_to(len);

            match Self::decode_message(&payload) {
                Ok(delta) => return Ok(Some(delta)),
                Err(e) => {
                    // Discard this message and resynchronize at the
                    // next length prefix.
                    self.corrupt_messages += 1;
                    warn!(bytes = payload.len(), "discarding corrupt message: {e}");
                }
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
