//! Geocell spatial indexing and expanding-ring proximity search.
//!
//! Points are encoded as hierarchical hex strings ("geocells") on a 4x4 grid
//! per level. Entities tagged with their cells at every resolution can be
//! found by any store that supports "tag in set" filters, so nearest-neighbor
//! and bounding-box queries run on top of an ordinary key-value database.
//!
//! ```rust
//! use geocell::{GeocellQuery, MemoryCellIndex, Point, proximity_search};
//!
//! let index = MemoryCellIndex::new();
//! index.insert("nyc", "city", Point::new(-74.0060, 40.7128), vec![])?;
//! index.insert("newark", "city", Point::new(-74.1724, 40.7357), vec![])?;
//! index.insert("la", "city", Point::new(-118.2437, 34.0522), vec![])?;
//!
//! let center = Point::new(-74.0, 40.7);
//! let nearby = proximity_search(&center, 2, 0.0, 50_000.0, &GeocellQuery::new("city"), &index, 13)?;
//! assert_eq!(nearby.len(), 2);
//! # Ok::<(), geocell::GeocellError>(())
//! ```

pub mod cell;
pub mod config;
pub mod error;
pub mod index;
pub mod planner;
pub mod search;
pub mod spatial;

pub use cell::MAX_RESOLUTION;
pub use config::SearchConfig;
pub use error::{GeocellError, Result};

pub use geo::Point;
pub use geocell_types::{BoundingBox, Direction};

pub use index::{IndexStats, MemoryCellIndex};
pub use planner::{
    BboxPlanner, CostFunction, DefaultCostFunction, MAX_FEASIBLE_BBOX_SEARCH_CELLS,
    best_bbox_search_cells,
};
pub use search::{
    EntityLocation, GeocellQuery, Located, ProximityQuery, QueryEngine, SearchCursor,
    SearchResults, bbox_search, proximity_search,
};
pub use spatial::{EARTH_RADIUS_METERS, distance};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{GeocellError, Result, SearchConfig};

    pub use geo::Point;

    pub use crate::{BoundingBox, Direction};

    pub use crate::{BboxPlanner, CostFunction, bbox_search};

    pub use crate::{GeocellQuery, Located, ProximityQuery, QueryEngine, proximity_search};

    pub use crate::MemoryCellIndex;
}
