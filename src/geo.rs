//! Geographic helpers.

use serde::{Deserialize, Serialize};

/// A WGS84 coordinate as stored for sensors and farms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

/// Center of a set of points, as the arithmetic mean of latitudes and longitudes.
///
/// Only used to pick a weather query location, so the flat-earth mean is
/// accurate enough. Returns `None` for an empty input.
pub fn find_center(points: &[Point]) -> Option<Point> {
    // ---
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (lat_sum, lng_sum) = points
        .iter()
        .fold((0.0, 0.0), |(lat, lng), p| (lat + p.lat, lng + p.lng));

    Some(Point {
        lat: lat_sum / n,
        lng: lng_sum / n,
    })
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_center_of_two_points() {
        // ---
        let points = [Point { lat: 0.0, lng: 0.0 }, Point { lat: 2.0, lng: 2.0 }];
        assert_eq!(find_center(&points), Some(Point { lat: 1.0, lng: 1.0 }));
    }

    #[test]
    fn test_center_of_nothing() {
        assert_eq!(find_center(&[]), None);
    }

    #[test]
    fn test_center_of_one_point_is_itself() {
        // ---
        let p = Point {
            lat: 49.25,
            lng: -123.1,
        };
        assert_eq!(find_center(&[p]), Some(p));
    }
}
