use geo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// A latitude/longitude rectangle described by its four edges.
///
/// `north >= south` always holds. `east < west` is allowed and means the box
/// crosses the antimeridian (±180° longitude).
///
/// # Examples
///
/// ```
/// use geocell_types::bbox::BoundingBox;
///
/// let pacific = BoundingBox::new(10.0, -170.0, -10.0, 170.0);
/// assert!(pacific.crosses_antimeridian());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub east: f64,
    pub south: f64,
    pub west: f64,
}

impl BoundingBox {
    /// The whole latitude/longitude space.
    pub const WORLD: BoundingBox = BoundingBox {
        north: 90.0,
        east: 180.0,
        south: -90.0,
        west: -180.0,
    };

    /// Create a bounding box from its edges.
    ///
    /// # Panics
    ///
    /// Panics if `north < south`.
    pub fn new(north: f64, east: f64, south: f64, west: f64) -> Self {
        assert!(
            north >= south,
            "north ({}) must be >= south ({})",
            north,
            south
        );
        Self {
            north,
            east,
            south,
            west,
        }
    }

    /// Create a non-wrapping bounding box from a `geo::Rect`.
    pub fn from_rect(rect: Rect) -> Self {
        Self {
            north: rect.max().y,
            east: rect.max().x,
            south: rect.min().y,
            west: rect.min().x,
        }
    }

    /// The `geo::Rect` covering this box, or `None` when it wraps.
    pub fn to_rect(&self) -> Option<Rect> {
        if self.crosses_antimeridian() {
            return None;
        }
        Some(Rect::new(
            geo::coord! { x: self.west, y: self.south },
            geo::coord! { x: self.east, y: self.north },
        ))
    }

    /// North-east corner as a point.
    pub fn north_east(&self) -> Point {
        Point::new(self.east, self.north)
    }

    /// South-west corner as a point.
    pub fn south_west(&self) -> Point {
        Point::new(self.west, self.south)
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.east < self.west
    }

    /// Split a wrapping box into its western (`west..180`) and eastern
    /// (`-180..east`) halves. Returns `None` for a box that does not wrap.
    pub fn split_antimeridian(&self) -> Option<(BoundingBox, BoundingBox)> {
        if !self.crosses_antimeridian() {
            return None;
        }
        let western = BoundingBox::new(self.north, 180.0, self.south, self.west);
        let eastern = BoundingBox::new(self.north, self.east, self.south, -180.0);
        Some((western, eastern))
    }

    /// Latitude span in degrees.
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Longitude span in degrees, accounting for antimeridian wrap.
    pub fn width(&self) -> f64 {
        if self.crosses_antimeridian() {
            (180.0 - self.west) + (self.east + 180.0)
        } else {
            self.east - self.west
        }
    }

    /// Edge-inclusive containment test.
    pub fn contains_point(&self, point: &Point) -> bool {
        let (lon, lat) = (point.x(), point.y());
        if lat < self.south || lat > self.north {
            return false;
        }
        if self.crosses_antimeridian() {
            lon >= self.west || lon <= self.east
        } else {
            lon >= self.west && lon <= self.east
        }
    }

    /// Whether `other` lies entirely inside this box. Both must be non-wrapping.
    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        self.north >= other.north
            && self.south <= other.south
            && self.east >= other.east
            && self.west <= other.west
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corners() {
        let bbox = BoundingBox::new(40.8, -73.9, 40.7, -74.0);
        assert_eq!(bbox.north_east(), Point::new(-73.9, 40.8));
        assert_eq!(bbox.south_west(), Point::new(-74.0, 40.7));
    }

    #[test]
    fn test_wrapping_box() {
        let bbox = BoundingBox::new(10.0, -170.0, -10.0, 170.0);
        assert!(bbox.crosses_antimeridian());
        assert!(bbox.contains_point(&Point::new(179.0, 0.0)));
        assert!(bbox.contains_point(&Point::new(-175.0, 5.0)));
        assert!(!bbox.contains_point(&Point::new(0.0, 0.0)));
        assert!((bbox.width() - 20.0).abs() < 1e-9);
        assert!(bbox.to_rect().is_none());

        let (western, eastern) = bbox.split_antimeridian().unwrap();
        assert_eq!(western.west, 170.0);
        assert_eq!(western.east, 180.0);
        assert_eq!(eastern.west, -180.0);
        assert_eq!(eastern.east, -170.0);
    }

    #[test]
    fn test_rect_round_trip() {
        let bbox = BoundingBox::new(1.0, 2.0, -1.0, -2.0);
        let rect = bbox.to_rect().unwrap();
        assert_eq!(BoundingBox::from_rect(rect), bbox);
        assert!(bbox.split_antimeridian().is_none());
    }

    #[test]
    #[should_panic]
    fn test_inverted_latitudes_panic() {
        BoundingBox::new(-1.0, 0.0, 1.0, 0.0);
    }
}
