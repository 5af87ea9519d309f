//! Planar geometry for the driving simulation.
//!
//! World coordinates are standard Cartesian: +x right, +y up, angles in radians
//! counter-clockwise from +x.

use serde::{Deserialize, Serialize};

/// Tolerance for parallel lines and segment range checks.
const EPSILON: f64 = 1e-9;

/// A point in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// Create a point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[inline]
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Point `length` away along `angle`.
    #[inline]
    #[must_use]
    pub fn project(self, angle: f64, length: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(length.mul_add(cos, self.x), length.mul_add(sin, self.y))
    }
}

/// A line segment between two points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// First endpoint.
    pub start: Point,
    /// Second endpoint.
    pub end: Point,
}

impl Segment {
    /// Create a segment.
    #[must_use]
    pub const fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    /// Line through the segment as `a*x + b*y = c`.
    fn line(&self) -> (f64, f64, f64) {
        let a = self.end.y - self.start.y;
        let b = self.start.x - self.end.x;
        let c = a.mul_add(self.start.x, b * self.start.y);
        (a, b, c)
    }

    /// Whether `p` lies within this segment's x and y ranges.
    fn spans(&self, p: Point) -> bool {
        let within = |v: f64, a: f64, b: f64| v >= a.min(b) - EPSILON && v <= a.max(b) + EPSILON;
        within(p.x, self.start.x, self.end.x) && within(p.y, self.start.y, self.end.y)
    }

    /// Intersection point of two segments.
    ///
    /// Solves the two line equations, then requires the solution to lie within
    /// both segments' coordinate ranges on both axes. Parallel segments never
    /// intersect, collinear overlap included.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Point> {
        let (a1, b1, c1) = self.line();
        let (a2, b2, c2) = other.line();

        let det = a1.mul_add(b2, -(a2 * b1));
        if det.abs() < EPSILON {
            return None;
        }

        let p = Point::new(
            b2.mul_add(c1, -(b1 * c2)) / det,
            a1.mul_add(c2, -(a2 * c1)) / det,
        );
        (self.spans(p) && other.spans(p)).then_some(p)
    }

    /// Whether two segments intersect.
    #[inline]
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.intersection(other).is_some()
    }
}

/// A rectangle rotated about its center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedRect {
    /// Center point.
    pub center: Point,
    /// Rotation of the long axis, radians.
    pub heading: f64,
    /// Extent along the heading.
    pub length: f64,
    /// Extent across the heading.
    pub width: f64,
}

impl OrientedRect {
    /// Corners in counter-clockwise order, starting front-left.
    #[must_use]
    pub fn corners(&self) -> [Point; 4] {
        let (sin, cos) = self.heading.sin_cos();
        let (hl, hw) = (self.length / 2.0, self.width / 2.0);
        let at = |along: f64, across: f64| {
            Point::new(
                self.center.x + along * cos - across * sin,
                self.center.y + along * sin + across * cos,
            )
        };
        [at(hl, hw), at(-hl, hw), at(-hl, -hw), at(hl, -hw)]
    }

    /// The four edges.
    #[must_use]
    pub fn edges(&self) -> [Segment; 4] {
        let [a, b, c, d] = self.corners();
        [
            Segment::new(a, b),
            Segment::new(b, c),
            Segment::new(c, d),
            Segment::new(d, a),
        ]
    }

    /// Whether `p` lies inside or on the rectangle.
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        let (sin, cos) = self.heading.sin_cos();
        let (dx, dy) = (p.x - self.center.x, p.y - self.center.y);
        let along = dx * cos + dy * sin;
        let across = -dx * sin + dy * cos;
        along.abs() <= self.length / 2.0 + EPSILON && across.abs() <= self.width / 2.0 + EPSILON
    }

    /// Whether `segment` touches the rectangle: crosses an edge or lies inside.
    #[must_use]
    pub fn touches(&self, segment: &Segment) -> bool {
        self.edges().iter().any(|edge| edge.intersects(segment))
            || self.contains(segment.start)
            || self.contains(segment.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn seg(x1: f64, y1: f64, x2: f64, y2: f64) -> Segment {
        Segment::new(Point::new(x1, y1), Point::new(x2, y2))
    }

    #[test]
    fn test_crossing_segments() {
        let p = seg(0.0, 0.0, 10.0, 10.0)
            .intersection(&seg(0.0, 10.0, 10.0, 0.0))
            .unwrap();
        assert!((p.x - 5.0).abs() < 1e-12);
        assert!((p.y - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_lines_cross_outside_segments() {
        // Lines meet at (100, 0) but the second segment stops at y = 50.
        assert!(seg(0.0, 0.0, 500.0, 0.0)
            .intersection(&seg(100.0, 50.0, 100.0, 60.0))
            .is_none());
    }

    #[test]
    fn test_parallel_segments_never_intersect() {
        assert!(!seg(0.0, 0.0, 10.0, 0.0).intersects(&seg(0.0, 1.0, 10.0, 1.0)));
        // Collinear overlap counts as parallel.
        assert!(!seg(0.0, 0.0, 10.0, 0.0).intersects(&seg(5.0, 0.0, 15.0, 0.0)));
    }

    #[test]
    fn test_vertical_and_horizontal() {
        let p = seg(0.0, 0.0, 500.0, 0.0)
            .intersection(&seg(100.0, -10.0, 100.0, 10.0))
            .unwrap();
        assert!((p.x - 100.0).abs() < 1e-12);
        assert!(p.y.abs() < 1e-12);
    }

    #[test]
    fn test_rect_corners_follow_heading() {
        let rect = OrientedRect {
            center: Point::new(0.0, 0.0),
            heading: FRAC_PI_2,
            length: 70.0,
            width: 40.0,
        };
        // Facing +y, the front-left corner sits at (-20, 35).
        let [front_left, ..] = rect.corners();
        assert!((front_left.x + 20.0).abs() < 1e-9);
        assert!((front_left.y - 35.0).abs() < 1e-9);
    }

    #[test]
    fn test_rect_touches() {
        let rect = OrientedRect {
            center: Point::new(0.0, 0.0),
            heading: 0.0,
            length: 70.0,
            width: 40.0,
        };
        assert!(rect.touches(&seg(30.0, -100.0, 30.0, 100.0)));
        assert!(rect.touches(&seg(-5.0, 0.0, 5.0, 0.0)), "fully inside");
        assert!(!rect.touches(&seg(36.0, -100.0, 36.0, 100.0)));
    }
}
