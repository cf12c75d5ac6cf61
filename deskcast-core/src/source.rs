//! Frame source adapter: the producer-side capture boundary.
//!
//! Platform capture (DXGI duplication, PipeWire, …) lives behind the
//! [`FrameSource`] trait; the streaming loop only ever sees "here is a
//! delta" or "nothing changed". Calls may block on native I/O, which is
//! why every connection owns its own source instance on its own task.

use crate::delta::FrameDelta;
use crate::error::CastError;
use crate::region::{BYTES_PER_PIXEL, DirtyRegion, Rectangle};

// ── Capture ──────────────────────────────────────────────────────

/// Result of one capture attempt.
#[derive(Debug, Clone)]
pub enum Capture {
    /// Something changed; the delta describes it.
    Delta(FrameDelta),
    /// The screen is identical to the previous capture.
    Unchanged,
}

// ── FrameSource ──────────────────────────────────────────────────

/// The narrow contract a capture backend implements.
pub trait FrameSource: Send {
    /// Capture the current delta against the previous frame.
    ///
    /// May block on native I/O. A [`CastError::Capture`] is fatal to
    /// the connection using this source.
    fn next_delta(&mut self) -> Result<Capture, CastError>;

    /// The fixed canvas dimensions for this session.
    fn canvas_size(&self) -> (u32, u32);
}

/// Builds a fresh source per accepted connection.
pub type SourceFactory = Box<dyn Fn() -> Box<dyn FrameSource> + Send + Sync>;

// ── SyntheticSource ──────────────────────────────────────────────

/// Deterministic test-pattern source: a full-canvas frame first, then a
/// small block walking across the canvas one step per capture.
///
/// Lets the whole pipeline run end-to-end on machines without a
/// platform capture backend, and gives tests reproducible pixel data.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    block: u32,
    tick: u64,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            block: 16.min(width).min(height),
            tick: 0,
        }
    }

    fn fill_value(&self) -> u8 {
        (self.tick % 251) as u8
    }
}

impl FrameSource for SyntheticSource {
    fn next_delta(&mut self) -> Result<Capture, CastError> {
        let rect = if self.tick == 0 {
            Rectangle::from_ltwh(0, 0, self.width, self.height)?
        } else {
            let cols = (self.width / self.block).max(1);
            let rows = (self.height / self.block).max(1);
            let step = self.tick % (cols as u64 * rows as u64);
            let x = (step % cols as u64) as u32 * self.block;
            let y = (step / cols as u64) as u32 * self.block;
            Rectangle::from_ltwh(x, y, self.block, self.block)?
        };

        let pixels = vec![self.fill_value(); rect.area() as usize * BYTES_PER_PIXEL];
        let delta = FrameDelta {
            width: self.width,
            height: self.height,
            sequence_id: 0, // assigned by the server loop
            dirty_regions: vec![DirtyRegion::new(rect, pixels)?],
            move_regions: Vec::new(),
        };

        self.tick += 1;
        Ok(Capture::Delta(delta))
    }

    fn canvas_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

// ── Tests ────────────────────────────────────────────────────────
