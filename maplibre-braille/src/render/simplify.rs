//! Polyline simplification applied to projected screen geometry.

use cgmath::Point2;
use geo::{Coord, LineString, Simplify};

/// Maximum deviation in pixels of a simplified polyline.
pub const TOLERANCE: f64 = 0.5;

/// Reduces `points` with the Ramer-Douglas-Peucker algorithm. The end points are kept.
pub fn simplify(points: &[Point2<f64>], tolerance: f64) -> Vec<Point2<f64>> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let line: LineString<f64> = points
        .iter()
        .map(|point| Coord {
            x: point.x,
            y: point.y,
        })
        .collect();
    line.simplify(&tolerance)
        .into_inner()
        .into_iter()
        .map(|coord| Point2::new(coord.x, coord.y))
        .collect()
}
