use chrono::{DateTime, Utc};
use geo::Point;
use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in degrees. Values are kept exactly as received.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl From<Coordinate> for Point {
    fn from(value: Coordinate) -> Self {
        Point::new(value.longitude, value.latitude)
    }
}

impl From<Point> for Coordinate {
    fn from(value: Point) -> Self {
        Coordinate::new(value.y(), value.x())
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from(value: [f64; 2]) -> Self {
        Coordinate::new(value[0], value[1])
    }
}

impl From<Coordinate> for [f64; 2] {
    fn from(value: Coordinate) -> Self {
        [value.latitude, value.longitude]
    }
}

/// A single fix delivered by the location provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    pub coordinate: Coordinate,
    pub timestamp: DateTime<Utc>,
}

impl LocationFix {
    pub fn new(coordinate: Coordinate, timestamp: DateTime<Utc>) -> Self {
        Self {
            coordinate,
            timestamp,
        }
    }
}

#[test]
fn point_axis_order() {
    let coordinate = Coordinate::new(55.6, 12.5);
    let point: Point = coordinate.into();
    assert_eq!(point.x(), 12.5);
    assert_eq!(point.y(), 55.6);
    assert_eq!(Coordinate::from(point), coordinate);
}
