//! Track boundaries.

use crate::geometry::{OrientedRect, Point, Segment};

/// An ordered set of boundary segments the car must not touch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    edges: Vec<Segment>,
}

impl Track {
    /// Create a track from boundary segments.
    #[must_use]
    pub fn new(edges: Vec<Segment>) -> Self {
        Self { edges }
    }

    /// Boundary segments in declared order.
    #[must_use]
    pub fn edges(&self) -> &[Segment] {
        &self.edges
    }

    /// Whether the track has no boundaries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Distance from `ray.start` to the nearest boundary crossing `ray`.
    #[must_use]
    pub fn nearest_hit(&self, ray: &Segment) -> Option<f64> {
        self.edges
            .iter()
            .filter_map(|edge| ray.intersection(edge))
            .map(|p: Point| ray.start.distance(p))
            .min_by(f64::total_cmp)
    }

    /// Whether any boundary touches `footprint`.
    #[must_use]
    pub fn collides(&self, footprint: &OrientedRect) -> bool {
        self.edges.iter().any(|edge| footprint.touches(edge))
    }
}

impl FromIterator<Segment> for Track {
    fn from_iter<I: IntoIterator<Item = Segment>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
