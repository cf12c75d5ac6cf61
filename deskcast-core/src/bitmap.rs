//! Bitmap processor: the consumer-side blit boundary.
//!
//! The reconstruction engine drives a [`BitmapProcessor`] — the narrow
//! contract a native compositor backend would implement. The default
//! [`SoftwareBitmap`] does the row blits in plain memory, which is both
//! the reference behavior and fast enough for typical canvases.
//!
//! Callers guarantee regions are already clipped to the bitmap bounds
//! (the reconstruction engine owns clipping policy); the processor may
//! therefore index without bounds checks beyond debug assertions.

use crate::region::{BYTES_PER_PIXEL, DirtyRegion, MoveRegion};

// ── BitmapProcessor ──────────────────────────────────────────────

/// Synchronous blit operations against a session's persistent bitmap.
/// One instance per session; never shared across sessions.
pub trait BitmapProcessor: Send {
    /// Allocate (or reallocate) the canvas. Pixels start zeroed.
    fn create(&mut self, width: u32, height: u32);

    /// Overwrite `region.rect()` with the carried payload.
    fn apply_dirty(&mut self, region: &DirtyRegion);

    /// Copy the block currently at `region.source` to `region.dest`.
    /// Source and destination may overlap.
    fn apply_move(&mut self, region: &MoveRegion);

    /// The full canvas, tightly packed rows, `width * height * 4` bytes.
    fn buffer(&self) -> &[u8];

    /// Current canvas dimensions, `(0, 0)` before [`create`](Self::create).
    fn size(&self) -> (u32, u32);
}

// ── SoftwareBitmap ───────────────────────────────────────────────

/// In-memory reference implementation of [`BitmapProcessor`].
pub struct SoftwareBitmap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl SoftwareBitmap {
    pub fn new() -> Self {
        Self {
            width: 0,
            height: 0,
            data: Vec::new(),
        }
    }

    fn row_stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }
}

impl Default for SoftwareBitmap {
    fn default() -> Self {
        Self::new()
    }
}

impl BitmapProcessor for SoftwareBitmap {
    fn create(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.data = vec![0u8; width as usize * height as usize * BYTES_PER_PIXEL];
    }

    fn apply_dirty(&mut self, region: &DirtyRegion) {
        let rect = region.rect();
        debug_assert!(rect.right() <= self.width && rect.bottom() <= self.height);

        let stride = self.row_stride();
        let row_len = rect.width() as usize * BYTES_PER_PIXEL;
        let dst_x = rect.left() as usize * BYTES_PER_PIXEL;

        for row in 0..rect.height() {
            let dst_start = (rect.top() + row) as usize * stride + dst_x;
            self.data[dst_start..dst_start + row_len].copy_from_slice(region.row(row));
        }
    }

    fn apply_move(&mut self, region: &MoveRegion) {
        let dest = &region.dest;
        debug_assert!(dest.right() <= self.width && dest.bottom() <= self.height);
        debug_assert!(region.source.x + dest.width() <= self.width);
        debug_assert!(region.source.y + dest.height() <= self.height);

        let stride = self.row_stride();
        let row_len = dest.width() as usize * BYTES_PER_PIXEL;

        // Source and destination may overlap, so lift the source block
        // out before writing.
        let mut block = vec![0u8; row_len * dest.height() as usize];
        let src_x = region.source.x as usize * BYTES_PER_PIXEL;
        for row in 0..dest.height() as usize {
            let src_start = (region.source.y as usize + row) * stride + src_x;
            block[row * row_len..(row + 1) * row_len]
                .copy_from_slice(&self.data[src_start..src_start + row_len]);
        }

        let dst_x = dest.left() as usize * BYTES_PER_PIXEL;
        for row in 0..dest.height() as usize {
            let dst_start = (dest.top() as usize + row) * stride + dst_x;
            self.data[dst_start..dst_start + row_len]
                .copy_from_slice(&block[row * row_len..(row + 1) * row_len]);
        }
    }

    fn buffer(&self) -> &[u8] {
        &self.data
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::{Point, Rectangle};

    fn pixel(bmp: &SoftwareBitmap, x: u32, y: u32) -> u8 {
        bmp.data[(y as usize * bmp.width as usize + x as usize) * BYTES_PER_PIXEL]
    }

    #[test]
    fn create_zeroes_the_canvas() {
        let mut bmp = SoftwareBitmap::new();
        bmp.create(8, 8);
        assert_eq!(bmp.buffer().len(), 8 * 8 * 4);
        assert!(bmp.buffer().iter().all(|&b| b == 0));
        assert_eq!(bmp.size(), (8, 8));
    }

    #[test]
    fn dirty_overwrites_its_rectangle_only() {
        let mut bmp = SoftwareBitmap::new();
        bmp.create(8, 8);

        let rect = Rectangle::from_ltwh(2, 2, 3, 3).unwrap();
        let region = DirtyRegion::new(rect, vec![0xAB; 3 * 3 * 4]).unwrap();
        bmp.apply_dirty(&region);

        assert_eq!(pixel(&bmp, 2, 2), 0xAB);
        assert_eq!(pixel(&bmp, 4, 4), 0xAB);
        assert_eq!(pixel(&bmp, 1, 2), 0);
        assert_eq!(pixel(&bmp, 5, 4), 0);
    }

    #[test]
    fn move_copies_current_contents() {
        let mut bmp = SoftwareBitmap::new();
        bmp.create(8, 8);

        let src = Rectangle::from_ltwh(0, 0, 2, 2).unwrap();
        bmp.apply_dirty(&DirtyRegion::new(src, vec![0x11; 2 * 2 * 4]).unwrap());

        bmp.apply_move(&MoveRegion::new(
            Point::new(0, 0),
            Rectangle::from_ltwh(4, 4, 2, 2).unwrap(),
        ));

        assert_eq!(pixel(&bmp, 4, 4), 0x11);
        assert_eq!(pixel(&bmp, 5, 5), 0x11);
        // Source block untouched.
        assert_eq!(pixel(&bmp, 0, 0), 0x11);
    }

    #[test]
    fn overlapping_move_is_safe() {
        let mut bmp = SoftwareBitmap::new();
        bmp.create(8, 1);

        // Rows of distinct bytes at x = 0..4.
        for x in 0..4u32 {
            let r = Rectangle::from_ltwh(x, 0, 1, 1).unwrap();
            bmp.apply_dirty(&DirtyRegion::new(r, vec![x as u8 + 1; 4]).unwrap());
        }

        // Shift right by one; destination overlaps source.
        bmp.apply_move(&MoveRegion::new(
            Point::new(0, 0),
            Rectangle::from_ltwh(1, 0, 4, 1).unwrap(),
        ));

        for x in 0..4u32 {
            assert_eq!(pixel(&bmp, x + 1, 0), x as u8 + 1);
        }
    }
}
