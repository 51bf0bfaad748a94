//! Canvas geometry.

/// Dimensions and palette of a canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasSpec {
    /// Number of columns.
    pub width: u16,
    /// Number of rows.
    pub height: u16,
    /// Number of palette entries; valid colors are `0..palette_size`.
    pub palette_size: u16,
}

impl CanvasSpec {
    /// Creates a canvas spec.
    pub const fn new(width: u16, height: u16, palette_size: u16) -> Self {
        Self {
            width,
            height,
            palette_size,
        }
    }

    /// Total number of pixels.
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        usize::from(self.width) * usize::from(self.height)
    }

    /// Linear index `y * width + x`, or `None` if out of range.
    #[must_use]
    pub fn index(&self, x: u16, y: u16) -> Option<usize> {
        (x < self.width && y < self.height)
            .then(|| usize::from(y) * usize::from(self.width) + usize::from(x))
    }

    /// Converts a parsed coordinate to an in-range one.
    #[must_use]
    pub fn checked_point(&self, x: i64, y: i64) -> Option<(u16, u16)> {
        let x = u16::try_from(x).ok().filter(|&x| x < self.width)?;
        let y = u16::try_from(y).ok().filter(|&y| y < self.height)?;
        Some((x, y))
    }

    /// Converts a parsed color to a palette index.
    #[must_use]
    pub fn checked_color(&self, color: i64) -> Option<u8> {
        let color = u8::try_from(color).ok()?;
        (u16::from(color) < self.palette_size).then_some(color)
    }

    /// Validates an inclusive rectangle: both corners in range and
    /// `x2 >= x1`, `y2 >= y1`.
    #[must_use]
    pub fn checked_rect(&self, x1: i64, y1: i64, x2: i64, y2: i64) -> Option<Rect> {
        if x2 < x1 || y2 < y1 {
            return None;
        }
        let (x1, y1) = self.checked_point(x1, y1)?;
        let (x2, y2) = self.checked_point(x2, y2)?;
        Some(Rect { x1, y1, x2, y2 })
    }
}

impl Default for CanvasSpec {
    fn default() -> Self {
        Self::new(750, 750, 40)
    }
}

/// An inclusive, validated rectangle of pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    /// Left column.
    pub x1: u16,
    /// Top row.
    pub y1: u16,
    /// Right column (inclusive).
    pub x2: u16,
    /// Bottom row (inclusive).
    pub y2: u16,
}

impl Rect {
    /// Number of pixels covered.
    #[must_use]
    pub fn area(&self) -> usize {
        (usize::from(self.x2 - self.x1) + 1) * (usize::from(self.y2 - self.y1) + 1)
    }

    /// Every covered coordinate, column by column.
    pub fn cells(&self) -> impl Iterator<Item = (u16, u16)> {
        let (y1, y2) = (self.y1, self.y2);
        (self.x1..=self.x2).flat_map(move |x| (y1..=y2).map(move |y| (x, y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_canvas() {
        let spec = CanvasSpec::default();
        assert_eq!(spec.pixel_count(), 750 * 750);
        assert_eq!(spec.index(5, 5), Some(5 * 750 + 5));
        assert_eq!(spec.index(750, 0), None);
    }

    #[test]
    fn point_bounds() {
        let spec = CanvasSpec::new(10, 20, 4);
        assert_eq!(spec.checked_point(9, 19), Some((9, 19)));
        assert_eq!(spec.checked_point(10, 0), None);
        assert_eq!(spec.checked_point(0, 20), None);
        assert_eq!(spec.checked_point(-1, 0), None);
        assert_eq!(spec.checked_point(999_999, 0), None);
    }

    #[test]
    fn color_bounds() {
        let spec = CanvasSpec::new(10, 10, 40);
        assert_eq!(spec.checked_color(39), Some(39));
        assert_eq!(spec.checked_color(40), None);
        assert_eq!(spec.checked_color(-3), None);
        assert_eq!(spec.checked_color(300), None);
    }

    #[test]
    fn rect_validation() {
        let spec = CanvasSpec::new(10, 10, 4);
        let rect = spec.checked_rect(0, 0, 9, 9).unwrap();
        assert_eq!(rect.area(), 100);
        assert_eq!(rect.cells().count(), 100);

        assert!(spec.checked_rect(5, 0, 4, 0).is_none());
        assert!(spec.checked_rect(0, 5, 0, 4).is_none());
        assert!(spec.checked_rect(0, 0, 10, 0).is_none());
    }

    #[test]
    fn single_cell_rect() {
        let rect = Rect {
            x1: 3,
            y1: 4,
            x2: 3,
            y2: 4,
        };
        assert_eq!(rect.cells().collect::<Vec<_>>(), vec![(3, 4)]);
    }
}
