//! The frame delta and its byte-level wire codec.
//!
//! A [`FrameDelta`] is the unit of transmission: everything that changed
//! on the canvas since the previous frame. The encoding is a
//! self-describing binary layout, not a text format — pixel payloads are
//! length-prefixed raw bytes.
//!
//! ## Wire layout (all integers u32, big-endian)
//!
//! ```text
//! width, height, sequence_id, dirty_count
//! per dirty region:  left, top, width, height, payload_len, payload[payload_len]
//! move_count
//! per move region:   src_x, src_y, dest_left, dest_top, dest_right, dest_bottom
//! ```
//!
//! A delta with zero dirty and zero move regions is legal: it is the
//! producer's "alive but nothing changed" heartbeat and must survive the
//! round trip like any other message.

use crate::error::CastError;
use crate::region::{DirtyRegion, MoveRegion, Point, Rectangle};

// ── FrameDelta ───────────────────────────────────────────────────

/// All regions that changed between two captured frames, plus the
/// full-canvas dimensions (fixed for the life of a session).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameDelta {
    /// Virtual canvas width in pixels.
    pub width: u32,
    /// Virtual canvas height in pixels.
    pub height: u32,
    /// Per-connection monotonic message counter, assigned by the sender.
    pub sequence_id: u32,
    /// Rectangles with replacement pixels, in capture order.
    pub dirty_regions: Vec<DirtyRegion>,
    /// Block copies within the existing bitmap, in capture order.
    pub move_regions: Vec<MoveRegion>,
}

impl FrameDelta {
    /// An empty delta: the explicit no-change heartbeat.
    pub fn heartbeat(width: u32, height: u32, sequence_id: u32) -> Self {
        Self {
            width,
            height,
            sequence_id,
            dirty_regions: Vec::new(),
            move_regions: Vec::new(),
        }
    }

    /// True when the delta carries no regions at all.
    pub fn is_empty(&self) -> bool {
        self.dirty_regions.is_empty() && self.move_regions.is_empty()
    }

    /// Total pixel-payload bytes carried (informational, for stats).
    pub fn payload_bytes(&self) -> usize {
        self.dirty_regions.iter().map(|d| d.pixels().len()).sum()
    }

    /// Serialize to the wire layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(24 + self.payload_bytes());
        put_u32(&mut out, self.width);
        put_u32(&mut out, self.height);
        put_u32(&mut out, self.sequence_id);

        put_u32(&mut out, self.dirty_regions.len() as u32);
        for d in &self.dirty_regions {
            let r = d.rect();
            put_u32(&mut out, r.left());
            put_u32(&mut out, r.top());
            put_u32(&mut out, r.width());
            put_u32(&mut out, r.height());
            put_u32(&mut out, d.pixels().len() as u32);
            out.extend_from_slice(d.pixels());
        }

        put_u32(&mut out, self.move_regions.len() as u32);
        for m in &self.move_regions {
            put_u32(&mut out, m.source.x);
            put_u32(&mut out, m.source.y);
            put_u32(&mut out, m.dest.left());
            put_u32(&mut out, m.dest.top());
            put_u32(&mut out, m.dest.right());
            put_u32(&mut out, m.dest.bottom());
        }

        out
    }

    /// Deserialize from the wire layout.
    ///
    /// Every structural violation — truncation, a payload length that
    /// does not match the declared geometry, trailing garbage — is a
    /// [`CastError::Codec`] and aborts this message only.
    pub fn decode(buf: &[u8]) -> Result<Self, CastError> {
        let mut r = Reader::new(buf);

        let width = r.u32("width")?;
        let height = r.u32("height")?;
        let sequence_id = r.u32("sequence_id")?;

        let dirty_count = r.u32("dirty_count")? as usize;
        // 20 header bytes minimum per dirty region; reject counts the
        // remaining bytes cannot possibly hold before allocating.
        if dirty_count > r.remaining() / 20 {
            return Err(CastError::Codec(format!(
                "dirty_count {dirty_count} exceeds remaining {} bytes",
                r.remaining()
            )));
        }
        let mut dirty_regions = Vec::with_capacity(dirty_count);
        for _ in 0..dirty_count {
            let left = r.u32("dirty left")?;
            let top = r.u32("dirty top")?;
            let w = r.u32("dirty width")?;
            let h = r.u32("dirty height")?;
            let rect = Rectangle::from_ltwh(left, top, w, h)?;
            let payload_len = r.u32("payload_len")? as usize;
            if payload_len != DirtyRegion::expected_len(&rect) {
                return Err(CastError::Codec(format!(
                    "payload_len {payload_len} does not match geometry {w}x{h}"
                )));
            }
            let pixels = r.bytes(payload_len, "dirty payload")?.to_vec();
            dirty_regions.push(DirtyRegion::new(rect, pixels)?);
        }

        let move_count = r.u32("move_count")? as usize;
        if move_count > r.remaining() / 24 {
            return Err(CastError::Codec(format!(
                "move_count {move_count} exceeds remaining {} bytes",
                r.remaining()
            )));
        }
        let mut move_regions = Vec::with_capacity(move_count);
        for _ in 0..move_count {
            let src_x = r.u32("move src_x")?;
            let src_y = r.u32("move src_y")?;
            let dest_left = r.u32("move dest_left")?;
            let dest_top = r.u32("move dest_top")?;
            let dest_right = r.u32("move dest_right")?;
            let dest_bottom = r.u32("move dest_bottom")?;
            let dest = Rectangle::from_ltrb(dest_left, dest_top, dest_right, dest_bottom)?;
            move_regions.push(MoveRegion::new(Point::new(src_x, src_y), dest));
        }

        if r.remaining() != 0 {
            return Err(CastError::Codec(format!(
                "{} trailing bytes after delta",
                r.remaining()
            )));
        }

        Ok(Self {
            width,
            height,
            sequence_id,
            dirty_regions,
            move_regions,
        })
    }
}

// ── Byte helpers ─────────────────────────────────────────────────

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

/// Bounds-checked forward reader over the encoded buffer.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, CastError> {
        let bytes = self.bytes(4, field)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn bytes(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], CastError> {
        if self.remaining() < n {
            return Err(CastError::Codec(format!(
                "truncated at {field}: need {n} bytes, have {}",
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_delta() -> FrameDelta {
        let rect = Rectangle::from_ltwh(2, 3, 4, 2).unwrap();
        let pixels: Vec<u8> = (0..DirtyRegion::expected_len(&rect) as u32)
            .map(|i| i as u8)
            .collect();
        FrameDelta {
            width: 100,
            height: 80,
            sequence_id: 7,
            dirty_regions: vec![DirtyRegion::new(rect, pixels).unwrap()],
            move_regions: vec![MoveRegion::new(
                Point::new(10, 10),
                Rectangle::from_ltrb(20, 20, 30, 25).unwrap(),
            )],
        }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let delta = sample_delta();
        let decoded = FrameDelta::decode(&delta.encode()).unwrap();
        assert_eq!(decoded, delta);
    }

    #[test]
    fn empty_delta_is_a_valid_message() {
        let hb = FrameDelta::heartbeat(1920, 1080, 42);
        assert!(hb.is_empty());
        let bytes = hb.encode();
        // width + height + seq + dirty_count + move_count
        assert_eq!(bytes.len(), 20);
        let decoded = FrameDelta::decode(&bytes).unwrap();
        assert_eq!(decoded, hb);
    }

    #[test]
    fn truncated_buffer_rejected() {
        let bytes = sample_delta().encode();
        for cut in [0, 5, bytes.len() / 2, bytes.len() - 1] {
            assert!(
                FrameDelta::decode(&bytes[..cut]).is_err(),
                "cut at {cut} should fail"
            );
        }
    }

    #[test]
    fn payload_geometry_mismatch_rejected() {
        let mut bytes = sample_delta().encode();
        // Corrupt payload_len of the first dirty region (offset 16 + 16).
        bytes[32..36].copy_from_slice(&999u32.to_be_bytes());
        let err = FrameDelta::decode(&bytes).unwrap_err();
        assert!(matches!(err, CastError::Codec(_)));
    }

    #[test]
    fn trailing_garbage_rejected() {
        let mut bytes = sample_delta().encode();
        bytes.push(0xAA);
        assert!(FrameDelta::decode(&bytes).is_err());
    }

    #[test]
    fn dirty_origin_overflowing_coordinate_space_rejected() {
        // left = u32::MAX with a 1x1 size: left + width overflows, so
        // this must come back as a codec error, never a panic.
        let mut bytes = Vec::new();
        for v in [100u32, 100, 0, 1, u32::MAX, 0, 1, 1, 4] {
            bytes.extend_from_slice(&v.to_be_bytes());
        }
        bytes.extend_from_slice(&[0; 4]); // pixel payload
        bytes.extend_from_slice(&0u32.to_be_bytes()); // move_count
        let err = FrameDelta::decode(&bytes).unwrap_err();
        assert!(matches!(err, CastError::Codec(_)));
    }

    #[test]
    fn absurd_region_count_rejected_before_allocating() {
        let mut bytes = Vec::new();
        for v in [100u32, 100, 0, u32::MAX] {
            bytes.extend_from_slice(&v.to_be_bytes());
        }
        assert!(FrameDelta::decode(&bytes).is_err());
    }

    #[test]
    fn inverted_move_destination_rejected() {
        let mut hb = FrameDelta::heartbeat(100, 100, 0).encode();
        // Rewrite move_count to 1 and append an inverted dest rect.
        let len = hb.len();
        hb[len - 4..].copy_from_slice(&1u32.to_be_bytes());
        for v in [0u32, 0, 50, 50, 40, 60] {
            hb.extend_from_slice(&v.to_be_bytes());
        }
        assert!(FrameDelta::decode(&hb).is_err());
    }
}
