//! Region model: the value types a frame delta is made of.
//!
//! These are **immutable once constructed**. `Rectangle` enforces its
//! edge ordering at construction; `DirtyRegion` enforces that the pixel
//! payload exactly matches its geometry, so everything downstream can
//! rely on `pixels.len() == width * height * BYTES_PER_PIXEL`.

use crate::error::CastError;

/// Bytes per pixel on the wire and in the reconstructed bitmap
/// (BGRA/RGBA, 4 channels).
pub const BYTES_PER_PIXEL: usize = 4;

// ── Point ────────────────────────────────────────────────────────

/// A pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

// ── Rectangle ────────────────────────────────────────────────────

/// An axis-aligned pixel rectangle.
///
/// Invariant: `right >= left` and `bottom >= top`. Width and height are
/// derived (`right - left`, `bottom - top`); a rectangle with zero width
/// or height is legal but covers no pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rectangle {
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
}

impl Rectangle {
    /// Build from edges, validating the edge ordering.
    pub fn from_ltrb(left: u32, top: u32, right: u32, bottom: u32) -> Result<Self, CastError> {
        if right < left || bottom < top {
            return Err(CastError::Codec(format!(
                "inverted rectangle: ({left},{top})-({right},{bottom})"
            )));
        }
        Ok(Self {
            left,
            top,
            right,
            bottom,
        })
    }

    /// Build from origin + size. Fails when the far edges do not fit in
    /// the coordinate space (origin and size are wire-supplied, so an
    /// overflowing sum is a protocol violation, not a panic).
    pub fn from_ltwh(left: u32, top: u32, width: u32, height: u32) -> Result<Self, CastError> {
        let (right, bottom) = left
            .checked_add(width)
            .zip(top.checked_add(height))
            .ok_or_else(|| {
                CastError::Codec(format!(
                    "rectangle {width}x{height} at ({left},{top}) overflows the coordinate space"
                ))
            })?;
        Ok(Self {
            left,
            top,
            right,
            bottom,
        })
    }

    pub fn left(&self) -> u32 {
        self.left
    }

    pub fn top(&self) -> u32 {
        self.top
    }

    pub fn right(&self) -> u32 {
        self.right
    }

    pub fn bottom(&self) -> u32 {
        self.bottom
    }

    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    /// Number of pixels covered.
    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// True when the rectangle covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.left == self.right || self.top == self.bottom
    }

    /// The overlapping rectangle, or `None` when disjoint or the
    /// overlap is degenerate.
    pub fn intersect(&self, other: &Rectangle) -> Option<Rectangle> {
        let left = self.left.max(other.left);
        let top = self.top.max(other.top);
        let right = self.right.min(other.right);
        let bottom = self.bottom.min(other.bottom);
        if right <= left || bottom <= top {
            return None;
        }
        Some(Rectangle {
            left,
            top,
            right,
            bottom,
        })
    }
}

// ── DirtyRegion ──────────────────────────────────────────────────

/// A rectangle with freshly captured replacement pixels.
///
/// Invariant: `pixels.len() == width * height * BYTES_PER_PIXEL`,
/// rows packed tightly top-to-bottom. A mismatch is a protocol
/// violation and is rejected at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirtyRegion {
    rect: Rectangle,
    pixels: Vec<u8>,
}

impl DirtyRegion {
    /// Payload byte count the geometry demands.
    pub fn expected_len(rect: &Rectangle) -> usize {
        rect.area() as usize * BYTES_PER_PIXEL
    }

    pub fn new(rect: Rectangle, pixels: Vec<u8>) -> Result<Self, CastError> {
        let expected = Self::expected_len(&rect);
        if pixels.len() != expected {
            return Err(CastError::Codec(format!(
                "dirty region payload is {} bytes, geometry {}x{} demands {}",
                pixels.len(),
                rect.width(),
                rect.height(),
                expected
            )));
        }
        Ok(Self { rect, pixels })
    }

    pub fn rect(&self) -> &Rectangle {
        &self.rect
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// One tightly-packed pixel row of the payload.
    ///
    /// # Panics
    ///
    /// Panics if `row >= height`.
    pub fn row(&self, row: u32) -> &[u8] {
        let row_len = self.rect.width() as usize * BYTES_PER_PIXEL;
        let start = row as usize * row_len;
        &self.pixels[start..start + row_len]
    }
}

// ── MoveRegion ───────────────────────────────────────────────────

/// A block copy within the existing bitmap (scroll / window-drag
/// optimization). Carries no pixel payload — bytes are read from the
/// bitmap's current contents at `source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveRegion {
    pub source: Point,
    pub dest: Rectangle,
}

impl MoveRegion {
    pub fn new(source: Point, dest: Rectangle) -> Self {
        Self { source, dest }
    }
}

// ── Tests ────────────────────────────────────────────────────────
