//! Great-circle distance used by the codec and the search loop.
//!
//! Distances are computed with the haversine formula from the `geo` crate on a
//! sphere of radius [`EARTH_RADIUS_METERS`]. Haversine stays numerically stable
//! for both very short and near-antipodal distances, which the ring search
//! relies on when comparing edge distances against result distances.

use geo::{Distance, Haversine, Point};
use std::cmp::Ordering;

/// Mean Earth radius (IUGG) in meters, the radius `geo::Haversine` uses.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Great-circle distance between two points in meters.
///
/// Points use `x` = longitude and `y` = latitude.
///
/// # Examples
///
/// ```rust
/// use geocell::{Point, spatial::distance};
///
/// let nyc = Point::new(-74.0060, 40.7128);
/// let la = Point::new(-118.2437, 34.0522);
///
/// let dist = distance(&nyc, &la);
/// assert!(dist > 3_900_000.0 && dist < 4_000_000.0);
/// assert_eq!(dist, distance(&la, &nyc));
/// ```
pub fn distance(a: &Point, b: &Point) -> f64 {
    Haversine.distance(*a, *b)
}

/// Total order over distances; NaN sorts last.
pub(crate) fn cmp_distance(a: f64, b: f64) -> Ordering {
    a.total_cmp(&b)
}
