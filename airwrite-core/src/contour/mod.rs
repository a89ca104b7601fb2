//! contour — boundary tracing over binary marker masks
//!
//! The tracing library reports each border together with its kind (outer or
//! hole) and its parent in the border hierarchy.  Nothing downstream needs the
//! hierarchy, so every adapter normalises its output into plain [`Contour`]s
//! before handing them to the locator.

use imageproc::contours::{find_contours, BorderType};
use serde::{Deserialize, Serialize};

use crate::segmentation::Mask;

// ── Geometry ─────────────────────────────────────────────────────────────────

/// Integer pixel coordinate, `x` to the right and `y` downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Per-axis absolute displacement to `other`.
    pub fn abs_delta(self, other: Point) -> (u32, u32) {
        (self.x.abs_diff(other.x), self.y.abs_diff(other.y))
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// Ordered boundary points of one connected region.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Contour {
    points: Vec<Point>,
}

impl Contour {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Enclosed area of the closed polygon through the contour points
    /// (shoelace formula).  Contours with fewer than three points enclose
    /// nothing.
    pub fn area(&self) -> f64 {
        if self.points.len() < 3 {
            return 0.0;
        }
        let n = self.points.len();
        let twice: i64 = (0..n)
            .map(|i| {
                let a = self.points[i];
                let b = self.points[(i + 1) % n];
                a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64
            })
            .sum();
        twice.abs() as f64 / 2.0
    }

    /// First point with the smallest `y` in traversal order.
    pub fn topmost(&self) -> Option<Point> {
        self.points
            .iter()
            .copied()
            .reduce(|best, p| if p.y < best.y { p } else { best })
    }
}

// ── Extraction ───────────────────────────────────────────────────────────────

/// Which borders an extractor reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContourMode {
    /// Every border: outer boundaries and the boundaries of holes.
    #[default]
    Tree,
    /// Only borders with no enclosing border.
    External,
}

/// The single capability the locator depends on.
pub trait ContourExtractor {
    fn extract_contours(&self, mask: &Mask) -> Vec<Contour>;
}

/// Suzuki–Abe border following, reporting the full hierarchy.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeTracer;

/// Border following restricted to outermost borders.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalTracer;

impl ContourExtractor for TreeTracer {
    fn extract_contours(&self, mask: &Mask) -> Vec<Contour> {
        find_contours::<i32>(mask)
            .into_iter()
            .map(normalize)
            .collect()
    }
}

impl ContourExtractor for ExternalTracer {
    fn extract_contours(&self, mask: &Mask) -> Vec<Contour> {
        find_contours::<i32>(mask)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .map(normalize)
            .collect()
    }
}

impl ContourMode {
    pub fn extractor(self) -> Box<dyn ContourExtractor> {
        match self {
            ContourMode::Tree => Box::new(TreeTracer),
            ContourMode::External => Box::new(ExternalTracer),
        }
    }
}

fn normalize(raw: imageproc::contours::Contour<i32>) -> Contour {
    Contour::new(raw.points.into_iter().map(|p| Point::new(p.x, p.y)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    /// Filled square with a square hole in the middle.
    fn ring_mask() -> GrayImage {
        let mut mask = GrayImage::new(40, 40);
        for y in 5..35 {
            for x in 5..35 {
                let in_hole = (15..25).contains(&x) && (15..25).contains(&y);
                if !in_hole {
                    mask.put_pixel(x, y, Luma([255]));
                }
            }
        }
        mask
    }

    #[test]
    fn test_tree_reports_holes() {
        let contours = TreeTracer.extract_contours(&ring_mask());
        assert_eq!(contours.len(), 2);
    }

    #[test]
    fn test_external_drops_holes() {
        let contours = ExternalTracer.extract_contours(&ring_mask());
        assert_eq!(contours.len(), 1);
        assert!(contours[0].points().iter().all(|p| p.x == 5
            || p.x == 34
            || p.y == 5
            || p.y == 34));
    }

    #[test]
    fn test_empty_mask_has_no_contours() {
        let mask = GrayImage::new(16, 16);
        assert!(TreeTracer.extract_contours(&mask).is_empty());
        assert!(ExternalTracer.extract_contours(&mask).is_empty());
    }

    #[test]
    fn test_shoelace_area() {
        let square = Contour::new(vec![
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
        ]);
        assert_eq!(square.area(), 100.0);

        let line = Contour::new(vec![Point::new(0, 0), Point::new(5, 5)]);
        assert_eq!(line.area(), 0.0);
    }

    #[test]
    fn test_topmost_prefers_first_in_traversal() {
        let c = Contour::new(vec![
            Point::new(4, 7),
            Point::new(9, 2),
            Point::new(1, 2),
            Point::new(3, 5),
        ]);
        assert_eq!(c.topmost(), Some(Point::new(9, 2)));
        assert_eq!(Contour::default().topmost(), None);
    }
}
