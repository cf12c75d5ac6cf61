//! Reconstruction engine: applies ordered deltas to the session bitmap.
//!
//! Ordering policy: all move regions first, in the order given, each
//! resolved against the current (possibly already-moved) bitmap state;
//! then all dirty regions, in order. Moves shift the prior frame's
//! content; dirty pixels are authoritative and paint on top. Overlaps
//! resolve last-write-wins in list order.
//!
//! Regions falling outside the bitmap are clipped to the valid area and
//! logged — partial visual correctness beats dropping the frame. A
//! change of canvas dimensions mid-session is fatal and forces the
//! consumer to reconnect.

use tracing::{debug, warn};

use crate::bitmap::BitmapProcessor;
use crate::cache::{FrameSnapshot, LatestFrameCache};
use crate::delta::FrameDelta;
use crate::error::CastError;
use crate::region::{BYTES_PER_PIXEL, DirtyRegion, MoveRegion, Point, Rectangle};

// ── ReconstructionEngine ─────────────────────────────────────────

/// Session-scoped engine owning the bitmap processor exclusively.
///
/// The bitmap is created lazily from the first delta's dimensions and
/// lives until the engine is dropped. After every applied delta the
/// canvas is snapshotted into the [`LatestFrameCache`].
pub struct ReconstructionEngine<P: BitmapProcessor> {
    processor: P,
    cache: LatestFrameCache,
    dimensions: Option<(u32, u32)>,
    applied_deltas: u64,
    clipped_regions: u64,
}

impl<P: BitmapProcessor> ReconstructionEngine<P> {
    pub fn new(processor: P, cache: LatestFrameCache) -> Self {
        Self {
            processor,
            cache,
            dimensions: None,
            applied_deltas: 0,
            clipped_regions: 0,
        }
    }

    /// Canvas dimensions, once the first delta has fixed them.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    /// Deltas applied (heartbeats included).
    pub fn applied_deltas(&self) -> u64 {
        self.applied_deltas
    }

    /// Regions that needed clipping or fell entirely out of bounds.
    pub fn clipped_regions(&self) -> u64 {
        self.clipped_regions
    }

    /// Apply one delta and publish the resulting snapshot.
    pub fn apply(&mut self, delta: &FrameDelta) -> Result<(), CastError> {
        let (width, height) = match self.dimensions {
            None => {
                debug!(width = delta.width, height = delta.height, "creating session bitmap");
                self.processor.create(delta.width, delta.height);
                self.dimensions = Some((delta.width, delta.height));
                (delta.width, delta.height)
            }
            Some((w, h)) if (w, h) != (delta.width, delta.height) => {
                return Err(CastError::DimensionMismatch {
                    had_width: w,
                    had_height: h,
                    got_width: delta.width,
                    got_height: delta.height,
                });
            }
            Some(dims) => dims,
        };
        let bounds = Rectangle::from_ltwh(0, 0, width, height)?;

        for mv in &delta.move_regions {
            match clip_move(mv, &bounds) {
                Some(clipped) => {
                    if clipped != *mv {
                        self.note_clip(&format!("move dest {:?}", mv.dest));
                    }
                    self.processor.apply_move(&clipped);
                }
                None => self.note_clip(&format!("move dest {:?} entirely outside", mv.dest)),
            }
        }

        for region in &delta.dirty_regions {
            match clip_dirty(region, &bounds) {
                Some(clipped) => {
                    if clipped.rect() != region.rect() {
                        self.note_clip(&format!("dirty rect {:?}", region.rect()));
                    }
                    self.processor.apply_dirty(&clipped);
                }
                None => {
                    self.note_clip(&format!("dirty rect {:?} entirely outside", region.rect()))
                }
            }
        }

        self.applied_deltas += 1;
        self.cache.publish(FrameSnapshot::new(
            width,
            height,
            delta.sequence_id,
            self.processor.buffer().to_vec(),
        ));
        Ok(())
    }

    fn note_clip(&mut self, what: &str) {
        self.clipped_regions += 1;
        let err = CastError::Geometry(what.to_string());
        warn!("clipping: {err}");
    }
}

// ── Clipping ─────────────────────────────────────────────────────

/// Clip a dirty region to `bounds`, slicing the payload to match.
/// `None` when the region lies entirely outside.
fn clip_dirty(region: &DirtyRegion, bounds: &Rectangle) -> Option<DirtyRegion> {
    let clipped = region.rect().intersect(bounds)?;
    if clipped == *region.rect() {
        return Some(region.clone());
    }

    let x_off = (clipped.left() - region.rect().left()) as usize * BYTES_PER_PIXEL;
    let y_off = clipped.top() - region.rect().top();
    let row_len = clipped.width() as usize * BYTES_PER_PIXEL;

    let mut pixels = Vec::with_capacity(row_len * clipped.height() as usize);
    for row in 0..clipped.height() {
        let src_row = region.row(y_off + row);
        pixels.extend_from_slice(&src_row[x_off..x_off + row_len]);
    }

    // Payload length matches the clipped geometry by construction.
    DirtyRegion::new(clipped, pixels).ok()
}

/// Clip a move region so both its destination and the block read from
/// its source stay within `bounds`.
fn clip_move(mv: &MoveRegion, bounds: &Rectangle) -> Option<MoveRegion> {
    let dest = mv.dest.intersect(bounds)?;

    // Shift the source by however much the destination lost on the
    // left/top so the copy still lines up. A source so far out that the
    // shift overflows can never intersect the bitmap.
    let src_x = mv.source.x.checked_add(dest.left() - mv.dest.left())?;
    let src_y = mv.source.y.checked_add(dest.top() - mv.dest.top())?;
    if src_x >= bounds.right() || src_y >= bounds.bottom() {
        return None;
    }

    let width = dest.width().min(bounds.right() - src_x);
    let height = dest.height().min(bounds.bottom() - src_y);
    if width == 0 || height == 0 {
        return None;
    }

    Some(MoveRegion::new(
        Point::new(src_x, src_y),
        Rectangle::from_ltwh(dest.left(), dest.top(), width, height).ok()?,
    ))
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::SoftwareBitmap;

    fn engine() -> ReconstructionEngine<SoftwareBitmap> {
        ReconstructionEngine::new(SoftwareBitmap::new(), LatestFrameCache::new())
    }

    fn dirty(left: u32, top: u32, w: u32, h: u32, fill: u8) -> DirtyRegion {
        let rect = Rectangle::from_ltwh(left, top, w, h).unwrap();
        DirtyRegion::new(rect, vec![fill; DirtyRegion::expected_len(&rect)]).unwrap()
    }

    fn delta_with(
        seq: u32,
        dirty_regions: Vec<DirtyRegion>,
        move_regions: Vec<MoveRegion>,
    ) -> FrameDelta {
        FrameDelta {
            width: 100,
            height: 100,
            sequence_id: seq,
            dirty_regions,
            move_regions,
        }
    }

    fn pixel(snap: &FrameSnapshot, x: u32, y: u32) -> u8 {
        snap.data()[(y as usize * snap.width() as usize + x as usize) * BYTES_PER_PIXEL]
    }

    #[test]
    fn first_delta_creates_bitmap_and_publishes() {
        let cache = LatestFrameCache::new();
        let mut eng = ReconstructionEngine::new(SoftwareBitmap::new(), cache.clone());

        eng.apply(&delta_with(1, vec![dirty(0, 0, 10, 10, 0x5A)], vec![]))
            .unwrap();

        let snap = cache.read().unwrap();
        assert_eq!((snap.width(), snap.height()), (100, 100));
        assert_eq!(snap.data().len(), 100 * 100 * 4);
        // Rows 0-9 / cols 0-9 carry the payload, the rest is default.
        assert_eq!(pixel(&snap, 0, 0), 0x5A);
        assert_eq!(pixel(&snap, 9, 9), 0x5A);
        assert_eq!(pixel(&snap, 10, 0), 0);
        assert_eq!(pixel(&snap, 0, 10), 0);
        assert_eq!(eng.dimensions(), Some((100, 100)));
    }

    #[test]
    fn empty_delta_leaves_bitmap_unchanged() {
        let cache = LatestFrameCache::new();
        let mut eng = ReconstructionEngine::new(SoftwareBitmap::new(), cache.clone());

        eng.apply(&delta_with(1, vec![dirty(5, 5, 4, 4, 0x33)], vec![]))
            .unwrap();
        let before = cache.read().unwrap().data().to_vec();

        eng.apply(&FrameDelta::heartbeat(100, 100, 2)).unwrap();
        let after = cache.read().unwrap();
        assert_eq!(after.data(), &before[..]);
        assert_eq!(after.sequence_id(), 2);
    }

    #[test]
    fn dirty_wins_over_move_at_same_destination() {
        let cache = LatestFrameCache::new();
        let mut eng = ReconstructionEngine::new(SoftwareBitmap::new(), cache.clone());

        // Paint block A.
        eng.apply(&delta_with(1, vec![dirty(0, 0, 10, 10, 0xAA)], vec![]))
            .unwrap();

        // One delta: move A→B and overwrite B with fresh pixels.
        let mv = MoveRegion::new(
            Point::new(0, 0),
            Rectangle::from_ltwh(40, 40, 10, 10).unwrap(),
        );
        eng.apply(&delta_with(
            2,
            vec![dirty(40, 40, 10, 10, 0xBB)],
            vec![mv],
        ))
        .unwrap();

        let snap = cache.read().unwrap();
        assert_eq!(pixel(&snap, 45, 45), 0xBB, "dirty must win at B");
    }

    #[test]
    fn moves_resolve_in_order_against_current_state() {
        let cache = LatestFrameCache::new();
        let mut eng = ReconstructionEngine::new(SoftwareBitmap::new(), cache.clone());

        eng.apply(&delta_with(1, vec![dirty(0, 0, 5, 5, 0x77)], vec![]))
            .unwrap();

        // First move A→B, then B→C: C must see A's content because the
        // second move reads the already-moved state.
        let a_to_b = MoveRegion::new(
            Point::new(0, 0),
            Rectangle::from_ltwh(20, 20, 5, 5).unwrap(),
        );
        let b_to_c = MoveRegion::new(
            Point::new(20, 20),
            Rectangle::from_ltwh(60, 60, 5, 5).unwrap(),
        );
        eng.apply(&delta_with(2, vec![], vec![a_to_b, b_to_c])).unwrap();

        let snap = cache.read().unwrap();
        assert_eq!(pixel(&snap, 62, 62), 0x77);
    }

    #[test]
    fn out_of_bounds_dirty_is_clipped_not_fatal() {
        let cache = LatestFrameCache::new();
        let mut eng = ReconstructionEngine::new(SoftwareBitmap::new(), cache.clone());

        eng.apply(&FrameDelta::heartbeat(100, 100, 0)).unwrap();
        // 10×10 region anchored at (95, 95): only a 5×5 corner fits.
        eng.apply(&delta_with(1, vec![dirty(95, 95, 10, 10, 0xEE)], vec![]))
            .unwrap();

        let snap = cache.read().unwrap();
        assert_eq!(pixel(&snap, 95, 95), 0xEE);
        assert_eq!(pixel(&snap, 99, 99), 0xEE);
        assert_eq!(eng.clipped_regions(), 1);
    }

    #[test]
    fn entirely_outside_region_is_skipped() {
        let mut eng = engine();
        eng.apply(&FrameDelta::heartbeat(100, 100, 0)).unwrap();
        eng.apply(&delta_with(1, vec![dirty(200, 200, 4, 4, 0xFF)], vec![]))
            .unwrap();
        assert_eq!(eng.clipped_regions(), 1);
        assert_eq!(eng.applied_deltas(), 2);
    }

    #[test]
    fn dimension_change_is_fatal() {
        let mut eng = engine();
        eng.apply(&FrameDelta::heartbeat(100, 100, 0)).unwrap();

        let err = eng.apply(&FrameDelta::heartbeat(200, 150, 1)).unwrap_err();
        assert!(matches!(err, CastError::DimensionMismatch { .. }));
    }

    #[test]
    fn clipped_move_still_copies_the_fitting_part() {
        let cache = LatestFrameCache::new();
        let mut eng = ReconstructionEngine::new(SoftwareBitmap::new(), cache.clone());

        eng.apply(&delta_with(1, vec![dirty(0, 0, 10, 10, 0x55)], vec![]))
            .unwrap();

        // Destination hangs off the right edge.
        let mv = MoveRegion::new(
            Point::new(0, 0),
            Rectangle::from_ltwh(95, 0, 10, 10).unwrap(),
        );
        eng.apply(&delta_with(2, vec![], vec![mv])).unwrap();

        let snap = cache.read().unwrap();
        assert_eq!(pixel(&snap, 95, 0), 0x55);
        assert_eq!(pixel(&snap, 99, 9), 0x55);
        assert_eq!(eng.clipped_regions(), 1);
    }

    #[test]
    fn move_source_shift_overflow_is_skipped_not_panicked() {
        // Clipping the destination on the left shifts the source right;
        // a source already at u32::MAX must fall out as "entirely
        // outside" instead of overflowing.
        let bounds = Rectangle::from_ltrb(10, 10, 110, 110).unwrap();
        let mv = MoveRegion::new(
            Point::new(u32::MAX, u32::MAX),
            Rectangle::from_ltwh(0, 0, 20, 20).unwrap(),
        );
        assert!(clip_move(&mv, &bounds).is_none());
    }

    #[test]
    fn far_out_move_source_is_skipped_by_the_engine() {
        let mut eng = engine();
        eng.apply(&FrameDelta::heartbeat(100, 100, 0)).unwrap();

        let mv = MoveRegion::new(
            Point::new(u32::MAX, 0),
            Rectangle::from_ltwh(10, 10, 5, 5).unwrap(),
        );
        eng.apply(&delta_with(1, vec![], vec![mv])).unwrap();
        assert_eq!(eng.clipped_regions(), 1);
    }
}
