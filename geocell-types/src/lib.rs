//! # geocell-types
//!
//! Core geometry types shared by the geocell spatial index.
//!
//! - **`BoundingBox`**: a latitude/longitude rectangle that may wrap the antimeridian
//! - **`Direction`**: one of the eight compass moves used for cell adjacency
//!
//! Points are plain `geo::Point` values with `x` = longitude and `y` = latitude.
//!
//! ## Examples
//!
//! ```rust
//! use geocell_types::bbox::BoundingBox;
//! use geocell_types::Point;
//!
//! let manhattan = BoundingBox::new(40.80, -73.93, 40.70, -74.02);
//! assert!(manhattan.contains_point(&Point::new(-73.97, 40.75)));
//! ```

pub mod bbox;
pub mod direction;

pub use bbox::BoundingBox;
pub use direction::Direction;
pub use geo::Point;
