//! Geocell encoding, decoding and grid arithmetic.
//!
//! A geocell is a hexadecimal string naming a rectangle in the
//! `[-90, 90] x [-180, 180]` latitude/longitude space. Each character splits
//! the current rectangle into a 4x4 grid and picks one sub-rectangle:
//!
//! ```text
//!              +---+---+---+---+ (90, 180)
//!              | a | b | e | f |
//!              +---+---+---+---+
//!              | 8 | 9 | c | d |
//!              +---+---+---+---+
//!              | 2 | 3 | 6 | 7 |
//!              +---+---+---+---+
//!              | 0 | 1 | 4 | 5 |
//!   (-90,-180) +---+---+---+---+
//! ```
//!
//! The same layout repeats at every level, so `"78a"` is the north-west corner
//! of the north-west corner of cell `7`. A cell's length is its resolution and
//! every prefix of a cell is one of its ancestors.
//!
//! This numbering is a storage format: cells written by other systems using
//! the same layout remain searchable.

use crate::error::{GeocellError, Result};
use crate::spatial::{cmp_distance, distance};
use geo::Point;
use geocell_types::{BoundingBox, Direction};

/// Maximum practical geocell resolution.
pub const MAX_RESOLUTION: usize = 13;

/// Cells per side of each subdivision.
pub const GRID_SIZE: usize = 4;

/// Geocell digit alphabet, in digit-value order.
pub const ALPHABET: &str = "0123456789abcdef";

/// Digits laid out by grid row (south to north) and column (west to east).
const GRID: [[u8; GRID_SIZE]; GRID_SIZE] = [*b"0145", *b"2367", *b"89cd", *b"abef"];

/// `(x, y)` grid position of each digit value.
const DIGIT_XY: [(usize, usize); 16] = [
    (0, 0),
    (1, 0),
    (0, 1),
    (1, 1),
    (2, 0),
    (3, 0),
    (2, 1),
    (3, 1),
    (0, 2),
    (1, 2),
    (0, 3),
    (1, 3),
    (2, 2),
    (3, 2),
    (2, 3),
    (3, 3),
];

fn subdiv_xy(digit: u8) -> Option<(usize, usize)> {
    let value = match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => return None,
    };
    Some(DIGIT_XY[value as usize])
}

fn subdiv_char(x: usize, y: usize) -> u8 {
    GRID[y][x]
}

/// Grid positions of every digit in `cell`, or an error on a foreign character.
fn cell_positions(cell: &str) -> Result<Vec<(usize, usize)>> {
    cell.bytes()
        .map(|b| subdiv_xy(b).ok_or_else(|| GeocellError::InvalidGeocell(cell.to_string())))
        .collect()
}

/// The `(x, y)` sub-rectangle of `bbox` in its 4x4 grid.
fn subdivide(bbox: &BoundingBox, x: usize, y: usize) -> BoundingBox {
    let lon_span = (bbox.east - bbox.west) / GRID_SIZE as f64;
    let lat_span = (bbox.north - bbox.south) / GRID_SIZE as f64;
    BoundingBox {
        north: bbox.south + lat_span * (y + 1) as f64,
        east: bbox.west + lon_span * (x + 1) as f64,
        south: bbox.south + lat_span * y as f64,
        west: bbox.west + lon_span * x as f64,
    }
}

fn check_resolution(resolution: usize) -> Result<()> {
    if resolution > MAX_RESOLUTION {
        return Err(GeocellError::InvalidResolution {
            resolution,
            min: 0,
            max: MAX_RESOLUTION,
        });
    }
    Ok(())
}

/// Whether `cell` is a well-formed geocell: 1 to 13 lowercase hex digits.
pub fn is_valid(cell: &str) -> bool {
    !cell.is_empty()
        && cell.len() <= MAX_RESOLUTION
        && cell.bytes().all(|b| subdiv_xy(b).is_some())
}

/// Compute the geocell containing `point` at `resolution`.
///
/// Resolution 0 yields the empty string, which stands for the whole world.
///
/// # Examples
///
/// ```rust
/// use geocell::{Point, cell};
///
/// // (0, 0) sits on the shared corner of cells 3, 6, 9 and c; ties go north-east.
/// assert_eq!(cell::compute(&Point::new(0.0, 0.0), 1)?, "c");
///
/// let nyc = Point::new(-74.0060, 40.7128);
/// let fine = cell::compute(&nyc, 13)?;
/// let coarse = cell::compute(&nyc, 5)?;
/// assert!(fine.starts_with(&coarse));
/// # Ok::<(), geocell::GeocellError>(())
/// ```
pub fn compute(point: &Point, resolution: usize) -> Result<String> {
    check_resolution(resolution)?;

    let (lon, lat) = (point.x(), point.y());
    if !lon.is_finite() || !lat.is_finite() {
        return Err(GeocellError::InvalidInput(format!(
            "Point coordinates must be finite, got: ({}, {})",
            lon, lat
        )));
    }

    let mut bbox = BoundingBox::WORLD;
    let mut cell = String::with_capacity(resolution);
    while cell.len() < resolution {
        let fx = GRID_SIZE as f64 * (lon - bbox.west) / (bbox.east - bbox.west);
        let fy = GRID_SIZE as f64 * (lat - bbox.south) / (bbox.north - bbox.south);
        // `as usize` saturates negative values at 0
        let x = (fx as usize).min(GRID_SIZE - 1);
        let y = (fy as usize).min(GRID_SIZE - 1);

        cell.push(subdiv_char(x, y) as char);
        bbox = subdivide(&bbox, x, y);
    }
    Ok(cell)
}

/// The geocells containing `point` at every resolution from 1 to
/// [`MAX_RESOLUTION`], coarsest first.
///
/// An entity must be tagged with all of these for proximity searches to find
/// it at any resolution.
pub fn generate_geocells(point: &Point) -> Result<Vec<String>> {
    let finest = compute(point, MAX_RESOLUTION)?;
    Ok((1..=MAX_RESOLUTION)
        .map(|resolution| finest[..resolution].to_string())
        .collect())
}

/// The rectangle covered by `cell`. The empty cell covers the world.
pub fn containing_box(cell: &str) -> Result<BoundingBox> {
    Ok(cell_positions(cell)?
        .into_iter()
        .fold(BoundingBox::WORLD, |bbox, (x, y)| subdivide(&bbox, x, y)))
}

/// Whether `point` falls inside `cell`.
pub fn contains_point(cell: &str, point: &Point) -> Result<bool> {
    if cell.len() > MAX_RESOLUTION {
        return Err(GeocellError::InvalidGeocell(cell.to_string()));
    }
    cell_positions(cell)?;
    Ok(compute(point, cell.len())? == cell)
}

/// The parent of `cell`, or `None` for the empty cell.
pub fn parent(cell: &str) -> Option<&str> {
    if cell.is_empty() {
        None
    } else {
        Some(&cell[..cell.len() - 1])
    }
}

/// The 16 children of `cell` in digit order.
pub fn children(cell: &str) -> Result<Vec<String>> {
    if cell.len() >= MAX_RESOLUTION {
        return Err(GeocellError::InvalidResolution {
            resolution: cell.len() + 1,
            min: 1,
            max: MAX_RESOLUTION,
        });
    }
    cell_positions(cell)?;
    Ok(ALPHABET.chars().map(|c| format!("{}{}", cell, c)).collect())
}

/// The same-resolution neighbor of `cell` in direction `dir`.
///
/// Moving past the north or south edge of the world yields `None`; moving past
/// the antimeridian wraps around to the other side.
///
/// # Errors
///
/// Returns [`GeocellError::InvalidGeocell`] for the empty cell, which has no
/// neighbors, or for a cell with characters outside the alphabet.
///
/// # Examples
///
/// ```rust
/// use geocell::{Direction, cell};
///
/// assert_eq!(cell::adjacent("0", Direction::EAST)?.as_deref(), Some("1"));
/// assert_eq!(cell::adjacent("1", Direction::EAST)?.as_deref(), Some("4"));
/// // Crossing a parent boundary carries into the parent digit.
/// assert_eq!(cell::adjacent("35", Direction::EAST)?.as_deref(), Some("60"));
/// // Wraps across the antimeridian, stops at the poles.
/// assert_eq!(cell::adjacent("5", Direction::EAST)?.as_deref(), Some("0"));
/// assert_eq!(cell::adjacent("a", Direction::NORTH)?, None);
/// # Ok::<(), geocell::GeocellError>(())
/// ```
pub fn adjacent(cell: &str, dir: Direction) -> Result<Option<String>> {
    if cell.is_empty() {
        return Err(GeocellError::InvalidGeocell(cell.to_string()));
    }
    let mut positions = cell_positions(cell)?;
    let (mut dx, mut dy) = (dir.dx, dir.dy);
    let last = GRID_SIZE - 1;

    for (x, y) in positions.iter_mut().rev() {
        if dx == 0 && dy == 0 {
            break;
        }

        // At the grid edge the digit wraps and the move carries into the parent.
        match dx {
            -1 if *x == 0 => *x = last,
            -1 => {
                *x -= 1;
                dx = 0;
            }
            1 if *x == last => *x = 0,
            1 => {
                *x += 1;
                dx = 0;
            }
            _ => {}
        }

        match dy {
            1 if *y == last => *y = 0,
            1 => {
                *y += 1;
                dy = 0;
            }
            -1 if *y == 0 => *y = last,
            -1 => {
                *y -= 1;
                dy = 0;
            }
            _ => {}
        }
    }

    // A leftover vertical carry means we walked off a pole.
    if dy != 0 {
        return Ok(None);
    }

    Ok(Some(
        positions
            .into_iter()
            .map(|(x, y)| subdiv_char(x, y) as char)
            .collect(),
    ))
}

/// Neighbors of `cell` in every direction of [`Direction::ALL`].
pub fn all_adjacents(cell: &str) -> Result<[Option<String>; 8]> {
    let mut result: [Option<String>; 8] = Default::default();
    for (slot, dir) in result.iter_mut().zip(Direction::ALL) {
        *slot = adjacent(cell, dir)?;
    }
    Ok(result)
}

/// Whether two cells lie in the same grid column (`column == true`) or the
/// same grid row (`column == false`), compared over their common length.
pub fn collinear(a: &str, b: &str, column: bool) -> Result<bool> {
    let pa = cell_positions(a)?;
    let pb = cell_positions(b)?;
    Ok(pa.iter().zip(pb.iter()).all(|((x1, y1), (x2, y2))| {
        if column { x1 == x2 } else { y1 == y2 }
    }))
}

/// Absolute `(column, row)` of `cell` in the `4^len x 4^len` grid of its resolution.
fn grid_coords(cell: &str) -> Result<(u64, u64)> {
    Ok(cell_positions(cell)?
        .into_iter()
        .fold((0u64, 0u64), |(col, row), (x, y)| {
            (col * GRID_SIZE as u64 + x as u64, row * GRID_SIZE as u64 + y as u64)
        }))
}

fn cell_at(col: u64, row: u64, resolution: usize) -> String {
    (0..resolution)
        .rev()
        .map(|level| {
            let shift = 2 * level as u64;
            let x = ((col >> shift) & 3) as usize;
            let y = ((row >> shift) & 3) as usize;
            subdiv_char(x, y) as char
        })
        .collect()
}

/// Column and row ranges spanned by two corner cells of one resolution.
fn corner_span(a: &str, b: &str) -> Result<((u64, u64), (u64, u64))> {
    if a.len() != b.len() {
        return Err(GeocellError::InvalidInput(format!(
            "Corner cells must share a resolution, got {:?} and {:?}",
            a, b
        )));
    }
    let (col_a, row_a) = grid_coords(a)?;
    let (col_b, row_b) = grid_coords(b)?;
    Ok((
        (col_a.min(col_b), col_a.max(col_b)),
        (row_a.min(row_b), row_a.max(row_b)),
    ))
}

/// Number of cells in the rectangle whose opposite corners are `a` and `b`.
///
/// Computed from the grid coordinates of the two corners; nothing is
/// enumerated.
pub fn interpolation_count(a: &str, b: &str) -> Result<u64> {
    let ((col_min, col_max), (row_min, row_max)) = corner_span(a, b)?;
    Ok((col_max - col_min + 1) * (row_max - row_min + 1))
}

/// Every cell in the rectangle whose opposite corners are `a` and `b`,
/// row by row from the south-west corner.
///
/// # Examples
///
/// ```rust
/// use geocell::cell;
///
/// let cells = cell::interpolate("3", "0")?;
/// assert_eq!(cells, vec!["0", "1", "2", "3"]);
/// assert_eq!(cell::interpolation_count("3", "0")?, 4);
/// # Ok::<(), geocell::GeocellError>(())
/// ```
pub fn interpolate(a: &str, b: &str) -> Result<Vec<String>> {
    let ((col_min, col_max), (row_min, row_max)) = corner_span(a, b)?;
    let resolution = a.len();
    let mut cells = Vec::with_capacity(((col_max - col_min + 1) * (row_max - row_min + 1)) as usize);
    for row in row_min..=row_max {
        for col in col_min..=col_max {
            cells.push(cell_at(col, row, resolution));
        }
    }
    Ok(cells)
}

/// Shortest distance in meters from `point` to the rectangle of `cell`.
///
/// For a point inside the rectangle this is the distance to the nearest edge.
pub fn point_distance(cell: &str, point: &Point) -> Result<f64> {
    let bbox = containing_box(cell)?;
    let (lon, lat) = (point.x(), point.y());

    let between_we = bbox.west <= lon && lon <= bbox.east;
    let between_ns = bbox.south <= lat && lat <= bbox.north;

    let to = |lon: f64, lat: f64| distance(point, &Point::new(lon, lat));

    let dist = match (between_we, between_ns) {
        (true, true) => to(lon, bbox.south)
            .min(to(lon, bbox.north))
            .min(to(bbox.east, lat))
            .min(to(bbox.west, lat)),
        (true, false) => to(lon, bbox.south).min(to(lon, bbox.north)),
        (false, true) => to(bbox.east, lat).min(to(bbox.west, lat)),
        (false, false) => to(bbox.east, bbox.south)
            .min(to(bbox.east, bbox.north))
            .min(to(bbox.west, bbox.south))
            .min(to(bbox.west, bbox.north)),
    };
    Ok(dist)
}

/// Distances from `center` to the edges and corners of the rectangle spanned
/// by `cells`, nearest first.
///
/// Edges are measured along the center's own meridian or parallel; corners
/// are measured to the corner point. Ties keep the order south, north, west,
/// east, then the corners.
pub fn distance_sorted_edges(cells: &[String], center: &Point) -> Result<Vec<(Direction, f64)>> {
    if cells.is_empty() {
        return Err(GeocellError::InvalidInput(
            "Edge distances need at least one cell".to_string(),
        ));
    }

    let mut north = f64::NEG_INFINITY;
    let mut east = f64::NEG_INFINITY;
    let mut south = f64::INFINITY;
    let mut west = f64::INFINITY;
    for cell in cells {
        let bbox = containing_box(cell)?;
        north = north.max(bbox.north);
        east = east.max(bbox.east);
        south = south.min(bbox.south);
        west = west.min(bbox.west);
    }

    let (lon, lat) = (center.x(), center.y());
    let to = |lon: f64, lat: f64| distance(center, &Point::new(lon, lat));

    let mut edges = vec![
        (Direction::SOUTH, to(lon, south)),
        (Direction::NORTH, to(lon, north)),
        (Direction::WEST, to(west, lat)),
        (Direction::EAST, to(east, lat)),
        (Direction::SOUTH_WEST, to(west, south)),
        (Direction::SOUTH_EAST, to(east, south)),
        (Direction::NORTH_WEST, to(west, north)),
        (Direction::NORTH_EAST, to(east, north)),
    ];
    edges.sort_by(|a, b| cmp_distance(a.1, b.1));
    Ok(edges)
}
