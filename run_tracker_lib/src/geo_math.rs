use geo::{Distance, Haversine, Point};

use crate::coordinate::Coordinate;

/// Great-circle distance in meters between two coordinates on a spherical earth.
pub fn distance_meters(from: Coordinate, to: Coordinate) -> f64 {
    Haversine.distance(Point::from(from), Point::from(to))
}
