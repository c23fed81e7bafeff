//! Sliding-window tile boxes
//!
//! Boxes are produced in row-major order and only whole tiles are emitted;
//! a trailing strip narrower or shorter than one tile is dropped.

use std::fmt;

/// Half-open pixel rectangle `x0..x1` by `y0..y1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileBox {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl TileBox {
    pub fn new(x0: usize, y0: usize, x1: usize, y1: usize) -> Self {
        TileBox { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> usize {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> usize {
        self.y1.saturating_sub(self.y0)
    }

    /// True when the box lies inside a `height` x `width` grid
    pub fn fits(&self, height: usize, width: usize) -> bool {
        self.x0 < self.x1 && self.y0 < self.y1 && self.x1 <= width && self.y1 <= height
    }

    pub fn overlaps(&self, other: &TileBox) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }
}

impl fmt::Display for TileBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{},{})", self.x0, self.y0, self.x1, self.y1)
    }
}

/// Boxes covering a `height` x `width` grid with `tile_width` x `tile_height` tiles
///
/// A zero tile dimension yields no boxes.
pub fn tiles(height: usize, width: usize, tile_width: usize, tile_height: usize) -> Vec<TileBox> {
    if tile_width == 0 || tile_height == 0 {
        return Vec::new();
    }

    let mut boxes = Vec::with_capacity(tile_count(height, width, tile_width, tile_height));
    let mut y = 0;
    while y + tile_height <= height {
        let mut x = 0;
        while x + tile_width <= width {
            boxes.push(TileBox::new(x, y, x + tile_width, y + tile_height));
            x += tile_width;
        }
        y += tile_height;
    }
    boxes
}

/// Number of boxes `tiles` returns for the same arguments
pub fn tile_count(height: usize, width: usize, tile_width: usize, tile_height: usize) -> usize {
    if tile_width == 0 || tile_height == 0 {
        return 0;
    }
    (height / tile_height) * (width / tile_width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remainder_is_dropped() {
        let boxes = tiles(300, 300, 256, 256);
        assert_eq!(boxes, vec![TileBox::new(0, 0, 256, 256)]);
        assert_eq!(tile_count(300, 300, 256, 256), 1);
    }

    #[test]
    fn test_row_major_order() {
        let boxes = tiles(512, 512, 256, 256);
        assert_eq!(boxes, vec![
            TileBox::new(0, 0, 256, 256),
            TileBox::new(256, 0, 512, 256),
            TileBox::new(0, 256, 256, 512),
            TileBox::new(256, 256, 512, 512),
        ]);
    }

    #[test]
    fn test_boxes_fit_and_do_not_overlap() {
        for &(h, w, tw, th) in &[(100, 70, 16, 9), (37, 64, 37, 1), (10, 10, 3, 4), (5, 5, 5, 5)] {
            let boxes = tiles(h, w, tw, th);
            assert_eq!(boxes.len(), (h / th) * (w / tw));
            assert_eq!(boxes.len(), tile_count(h, w, tw, th));
            for (i, a) in boxes.iter().enumerate() {
                assert!(a.fits(h, w), "{} outside {}x{}", a, w, h);
                assert_eq!((a.width(), a.height()), (tw, th));
                for b in &boxes[i + 1..] {
                    assert!(!a.overlaps(b), "{} overlaps {}", a, b);
                }
            }
        }
    }

    #[test]
    fn test_degenerate_sizes() {
        assert!(tiles(100, 100, 0, 10).is_empty());
        assert!(tiles(100, 100, 101, 10).is_empty());
        assert!(tiles(0, 0, 1, 1).is_empty());
        assert_eq!(tile_count(100, 100, 10, 0), 0);
    }

    #[test]
    fn test_sequence_is_replayable() {
        assert_eq!(tiles(777, 513, 128, 64), tiles(777, 513, 128, 64));
    }
}
