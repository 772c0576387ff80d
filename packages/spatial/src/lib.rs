#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Geodesic buffer construction.
//!
//! Derives a constant-real-world-distance polygon around a point on the
//! WGS84 ellipsoid. The geodesic math itself is the `geo` crate's
//! [`Geodesic`] engine; this crate only sweeps a ring of destination
//! points and closes it into a polygon.

use geo::{Destination, Geodesic, LineString, Point, Polygon};

/// Number of ring vertices swept per buffer. 72 gives a vertex every 5
/// degrees of bearing, visually smooth at neighborhood zoom levels.
const RING_VERTICES: usize = 72;

const METERS_PER_MILE: f64 = 1_609.344;

/// Distance unit accepted by [`geodesic_buffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    /// Statute miles.
    Miles,
    /// Kilometers.
    Kilometers,
    /// Meters.
    Meters,
}

impl LengthUnit {
    /// Converts a value in this unit to meters.
    #[must_use]
    pub fn to_meters(self, value: f64) -> f64 {
        match self {
            Self::Miles => value * METERS_PER_MILE,
            Self::Kilometers => value * 1_000.0,
            Self::Meters => value,
        }
    }
}

/// Builds a geodesic buffer polygon of `distance` around `center`.
///
/// The ring is swept clockwise from north in [`RING_VERTICES`] steps;
/// `geo` closes the exterior ring when the polygon is constructed. A
/// non-positive distance yields a degenerate ring collapsed onto the
/// center point.
#[must_use]
pub fn geodesic_buffer(center: Point<f64>, distance: f64, unit: LengthUnit) -> Polygon<f64> {
    let meters = unit.to_meters(distance).max(0.0);

    let ring: Vec<Point<f64>> = (0..RING_VERTICES)
        .map(|i| {
            let bearing = 360.0 * (i as f64) / (RING_VERTICES as f64);
            Geodesic.destination(center, bearing, meters)
        })
        .collect();

    Polygon::new(LineString::from(ring), vec![])
}

#[cfg(test)]
mod tests {
    use geo::{Contains, Distance};

    use super::*;

    #[test]
    fn converts_units_to_meters() {
        assert!((LengthUnit::Miles.to_meters(0.5) - 804.672).abs() < 1e-9);
        assert!((LengthUnit::Kilometers.to_meters(2.0) - 2_000.0).abs() < f64::EPSILON);
        assert!((LengthUnit::Meters.to_meters(37.0) - 37.0).abs() < f64::EPSILON);
    }

    #[test]
    fn buffer_contains_its_center() {
        let center = Point::new(-73.99, 40.73);
        let buffer = geodesic_buffer(center, 0.5, LengthUnit::Miles);
        assert!(buffer.contains(&center));
    }

    #[test]
    fn ring_vertices_sit_at_the_requested_distance() {
        let center = Point::new(-73.99, 40.73);
        let buffer = geodesic_buffer(center, 0.5, LengthUnit::Miles);

        for coord in buffer.exterior().points() {
            let meters = Geodesic.distance(center, coord);
            // Within a meter of the requested 804.672 m radius.
            assert!((meters - 804.672).abs() < 1.0, "vertex at {meters} m");
        }
    }

    #[test]
    fn contains_nearby_point_and_excludes_far_point() {
        let center = Point::new(-73.99, 40.73);
        let buffer = geodesic_buffer(center, 0.5, LengthUnit::Miles);

        // ~220 m east of center.
        let near = Point::new(-73.9874, 40.73);
        // ~4.2 km east of center.
        let far = Point::new(-73.94, 40.73);

        assert!(buffer.contains(&near));
        assert!(!buffer.contains(&far));
    }

    #[test]
    fn larger_radius_contains_smaller_buffer() {
        let center = Point::new(-73.99, 40.73);
        let small = geodesic_buffer(center, 0.25, LengthUnit::Miles);
        let large = geodesic_buffer(center, 1.0, LengthUnit::Miles);

        for point in small.exterior().points() {
            assert!(large.contains(&point));
        }
    }

    #[test]
    fn zero_distance_collapses_to_center() {
        let center = Point::new(-73.99, 40.73);
        let buffer = geodesic_buffer(center, 0.0, LengthUnit::Miles);
        for point in buffer.exterior().points() {
            assert!(Geodesic.distance(center, point) < 1e-6);
        }
    }
}
