//! Geometry primitives
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An x,y coordinate pair
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Point {
    /// An absolute x coordinate relative to the root window
    pub x: u32,
    /// An absolute y coordinate relative to the root window
    pub y: u32,
}

impl Point {
    /// Create a new Point.
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// An X window / screen position: top left corner + extent
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct Rect {
    /// The x-coordinate of the top left corner of this rect
    pub x: u32,
    /// The y-coordinate of the top left corner of this rect
    pub y: u32,
    /// The width of this rect
    pub w: u32,
    /// The height of this rect
    pub h: u32,
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}+{}+{}", self.w, self.h, self.x, self.y)
    }
}

impl Rect {
    /// Create a new Rect.
    pub const fn new(x: u32, y: u32, w: u32, h: u32) -> Rect {
        Rect { x, y, w, h }
    }

    /// Create a new [Rect] of the same size as `self` positioned centrally
    /// within `enclosing`.
    ///
    /// If `self` is larger than `enclosing` on either axis then that axis is
    /// pinned to the corresponding `enclosing` origin instead.
    pub fn centered_in(&self, enclosing: &Rect) -> Rect {
        Rect {
            x: enclosing.x + enclosing.w.saturating_sub(self.w) / 2,
            y: enclosing.y + enclosing.h.saturating_sub(self.h) / 2,
            w: self.w,
            h: self.h,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case(
        Rect::new(0, 0, 100, 50),
        Rect::new(0, 0, 1000, 750),
        Rect::new(450, 350, 100, 50);
        "fits"
    )]
    #[test_case(
        Rect::new(500, 0, 100, 50),
        Rect::new(200, 100, 1000, 750),
        Rect::new(650, 450, 100, 50);
        "fits with offset enclosing"
    )]
    #[test_case(
        Rect::new(0, 0, 2000, 50),
        Rect::new(0, 0, 1000, 750),
        Rect::new(0, 350, 2000, 50);
        "wider than enclosing"
    )]
    #[test]
    fn centered_in(inner: Rect, outer: Rect, expected: Rect) {
        assert_eq!(inner.centered_in(&outer), expected);
    }
}
