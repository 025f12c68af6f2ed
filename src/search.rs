//! Expanding-ring proximity search.
//!
//! The search starts from the finest cell containing the center and grows a
//! rectangle of same-resolution cells around it: one cell, then two, then a
//! 2x2 block, then the parents of that block, and so on up to the 16 top-level
//! cells. Each round queries the store only for cells it hasn't searched yet
//! and merges the hits into a bounded, distance-sorted result buffer.
//!
//! The ring geometry lives in [`RingState`], an immutable snapshot advanced by
//! a pure step function, so every transition can be tested without a store.

use crate::cell::{
    ALPHABET, MAX_RESOLUTION, adjacent, collinear, compute, containing_box,
    distance_sorted_edges, parent,
};
use crate::config::SearchConfig;
use crate::error::{GeocellError, Result};
use crate::planner::{BboxPlanner, CostFunction};
use crate::spatial::distance;
use geo::Point;
use geocell_types::{BoundingBox, Direction};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Anything with a position that a proximity search can rank.
pub trait Located {
    /// Location with `x` = longitude and `y` = latitude.
    fn location(&self) -> Point;
}

impl Located for Point {
    fn location(&self) -> Point {
        *self
    }
}

/// Base filter passed through to the store on every query.
///
/// The spatial layer only adds geocell membership on top of it. An empty
/// `entity_type` matches every type in the in-memory index.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GeocellQuery {
    pub entity_type: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl GeocellQuery {
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            labels: Vec::new(),
        }
    }

    /// Require entities to carry `label`.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }
}

/// The store a search runs against.
///
/// `query` returns the entities matching `base_query` that are tagged with at
/// least one of `cells`, in any order. Retries are the implementation's
/// business; an error aborts the search.
pub trait QueryEngine<T> {
    fn query(&self, base_query: &GeocellQuery, cells: &[String]) -> Result<Vec<T>>;
}

impl<T, E> QueryEngine<T> for &E
where
    E: QueryEngine<T> + ?Sized,
{
    fn query(&self, base_query: &GeocellQuery, cells: &[String]) -> Result<Vec<T>> {
        (**self).query(base_query, cells)
    }
}

impl<T, E> QueryEngine<T> for Arc<E>
where
    E: QueryEngine<T> + ?Sized,
{
    fn query(&self, base_query: &GeocellQuery, cells: &[String]) -> Result<Vec<T>> {
        (**self).query(base_query, cells)
    }
}

/// An entity paired with its distance from the search center in meters.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityLocation<T> {
    pub entity: T,
    pub distance: f64,
}

/// Outcome of a proximity search, nearest first.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResults<T> {
    pub results: Vec<EntityLocation<T>>,
    /// Resolution of the cells the search ended on.
    pub last_resolution: usize,
    /// Cells the search ended on.
    pub last_geocells: Vec<String>,
}

impl<T> SearchResults<T> {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn entities(&self) -> impl Iterator<Item = &T> + '_ {
        self.results.iter().map(|r| &r.entity)
    }

    pub fn into_entities(self) -> Vec<T> {
        self.results.into_iter().map(|r| r.entity).collect()
    }

    /// Cursor for fetching the page after this one, if there were any results.
    pub fn cursor(&self) -> Option<SearchCursor<T>>
    where
        T: Clone,
    {
        let last = self.results.last()?;
        let seen = self
            .results
            .iter()
            .filter(|r| r.distance == last.distance)
            .map(|r| r.entity.clone())
            .collect();
        Some(SearchCursor {
            geocells: self.last_geocells.clone(),
            distance: last.distance,
            seen,
        })
    }
}

/// Where a previous page of results stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCursor<T> {
    /// Cells to restart the ring from.
    pub geocells: Vec<String>,
    /// Distance of the farthest result already returned.
    pub distance: f64,
    /// Results already returned at exactly `distance`.
    pub seen: Vec<T>,
}

impl<T: PartialEq> SearchCursor<T> {
    /// Whether `entity` at `distance` was part of an earlier page.
    fn already_returned(&self, entity: &T, distance: f64) -> bool {
        distance < self.distance || (distance == self.distance && self.seen.contains(entity))
    }
}

/// Bounded, distance-sorted top-K buffer.
#[derive(Debug)]
struct ResultBuffer<T> {
    entries: Vec<EntityLocation<T>>,
    capacity: usize,
}

impl<T: PartialEq> ResultBuffer<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Insert `entity` at its sorted position, after any equal distances.
    ///
    /// Returns false if the same entity is already present at this distance
    /// or if it would land past the capacity.
    fn offer(&mut self, entity: T, distance: f64) -> bool {
        let start = self.entries.partition_point(|e| e.distance < distance);
        let end = self.entries.partition_point(|e| e.distance <= distance);

        if self.entries[start..end].iter().any(|e| e.entity == entity) {
            return false;
        }
        if end >= self.capacity {
            return false;
        }

        self.entries.insert(end, EntityLocation { entity, distance });
        self.entries.truncate(self.capacity);
        true
    }

    fn into_vec(self) -> Vec<EntityLocation<T>> {
        self.entries
    }
}

/// Geometry of one round of the expanding ring.
///
/// Invariants: `cells` is non-empty, all of one resolution, and forms a
/// rectangle (1, 2 or 4 cells, or the 16 top-level cells once exhausted).
#[derive(Debug, Clone, PartialEq)]
pub struct RingState {
    containing: String,
    cells: SmallVec<[String; 4]>,
    searched: FxHashSet<String>,
    next_bound: f64,
    exhausted: bool,
}

impl RingState {
    /// Initial ring: the cell containing `center` at `resolution`.
    pub fn start(center: &Point, resolution: usize) -> Result<Self> {
        check_search_resolution(resolution)?;
        let containing = compute(center, resolution)?;
        Ok(Self {
            cells: SmallVec::from_elem(containing.clone(), 1),
            containing,
            searched: FxHashSet::default(),
            next_bound: 0.0,
            exhausted: false,
        })
    }

    /// Ring restarted from the cells a previous search ended on.
    pub fn resume(cells: &[String]) -> Result<Self> {
        let first = cells.first().ok_or_else(|| {
            GeocellError::InvalidInput("Cannot resume a search without cells".to_string())
        })?;
        for cell in cells {
            if !crate::cell::is_valid(cell) {
                return Err(GeocellError::InvalidGeocell(cell.clone()));
            }
            if cell.len() != first.len() {
                return Err(GeocellError::InvalidInput(format!(
                    "Resume cells must share a resolution, got {:?}",
                    cells
                )));
            }
        }
        Ok(Self {
            containing: first.clone(),
            cells: cells.iter().cloned().collect(),
            searched: FxHashSet::default(),
            next_bound: 0.0,
            exhausted: false,
        })
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    pub fn resolution(&self) -> usize {
        self.cells.first().map_or(0, String::len)
    }

    /// Whether the ring has reached the 16 top-level cells.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Lower bound on the distance of any entity outside the searched region.
    pub fn closest_possible_distance(&self) -> f64 {
        self.next_bound
    }

    /// Current cells not searched in an earlier round, in ring order.
    pub fn pending(&self) -> Vec<String> {
        let mut pending: Vec<String> = Vec::with_capacity(self.cells.len());
        for cell in &self.cells {
            if !self.searched.contains(cell) && !pending.contains(cell) {
                pending.push(cell.clone());
            }
        }
        pending
    }

    /// Next ring after the current cells have been searched.
    ///
    /// `returned` is the number of entities the store produced for this round,
    /// before any distance filtering. An empty round or a full 2x2 block moves
    /// up to the parent resolution; otherwise the ring grows toward the
    /// nearest edge, then sideways into a 2x2 block.
    pub fn advance(&self, center: &Point, returned: usize) -> Result<RingState> {
        let edges = distance_sorted_edges(&self.cells, center)?;

        let mut searched = self.searched.clone();
        searched.extend(self.cells.iter().cloned());

        // A ring straddling ±180° has no single west and east edge.
        let next_bound = if self.wraps_antimeridian()? {
            0.0
        } else {
            edges.first().map_or(0.0, |(_, d)| *d)
        };

        let mut next = RingState {
            containing: self.containing.clone(),
            cells: self.cells.clone(),
            searched,
            next_bound,
            exhausted: false,
        };

        let grown = match self.cells.len() {
            _ if returned == 0 => false,
            1 => next.extend_nearest(&edges)?,
            2 => next.extend_perpendicular(&edges)?,
            _ => false,
        };
        if !grown {
            next.ascend();
        }

        log::trace!(
            "Ring {:?} -> {:?} (bound {:.1} m)",
            self.cells,
            next.cells,
            next.next_bound
        );
        Ok(next)
    }

    fn wraps_antimeridian(&self) -> Result<bool> {
        let mut touches_west = false;
        let mut touches_east = false;
        for cell in &self.cells {
            let bbox = containing_box(cell)?;
            touches_west |= bbox.west <= -180.0;
            touches_east |= bbox.east >= 180.0;
        }
        Ok(touches_west && touches_east && self.cells.len() < 16)
    }

    /// Add the first existing neighbor along the nearest edges.
    fn extend_nearest(&mut self, edges: &[(Direction, f64)]) -> Result<bool> {
        for (dir, _) in edges.iter().filter(|(d, _)| d.is_cardinal()) {
            if let Some(neighbor) = adjacent(&self.cells[0], *dir)? {
                if !self.cells.contains(&neighbor) {
                    self.cells.push(neighbor);
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Grow a pair into a 2x2 block on the side nearest the center.
    fn extend_perpendicular(&mut self, edges: &[(Direction, f64)]) -> Result<bool> {
        let stacked = collinear(&self.cells[0], &self.cells[1], true)?;
        let perpendicular = edges.iter().filter(|(d, _)| {
            if stacked {
                d.is_horizontal()
            } else {
                d.is_vertical()
            }
        });

        for (dir, _) in perpendicular {
            let neighbors = self
                .cells
                .iter()
                .map(|cell| adjacent(cell, *dir))
                .collect::<Result<Option<Vec<String>>>>()?;
            // A vertical move off a pole leaves the other side to try.
            if let Some(neighbors) = neighbors {
                self.cells.extend(neighbors);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Move the ring to the parents of its cells, or to the whole world.
    fn ascend(&mut self) {
        self.containing.pop();
        if self.containing.is_empty() {
            self.cells = ALPHABET.chars().map(String::from).collect();
            self.exhausted = true;
            return;
        }

        let mut parents: SmallVec<[String; 4]> = SmallVec::new();
        for cell in &self.cells {
            if let Some(p) = parent(cell).filter(|p| !p.is_empty()) {
                if !parents.iter().any(|q| q == p) {
                    parents.push(p.to_string());
                }
            }
        }
        self.cells = parents;
    }
}

fn check_search_resolution(resolution: usize) -> Result<()> {
    if !(1..=MAX_RESOLUTION).contains(&resolution) {
        return Err(GeocellError::InvalidResolution {
            resolution,
            min: 1,
            max: MAX_RESOLUTION,
        });
    }
    Ok(())
}

/// A configurable proximity search.
///
/// # Examples
///
/// ```rust
/// use geocell::{GeocellQuery, MemoryCellIndex, Point, ProximityQuery};
///
/// let index = MemoryCellIndex::new();
/// index.insert("a", "cafe", Point::new(-74.0060, 40.7128), Vec::<String>::new())?;
/// index.insert("b", "cafe", Point::new(-73.9857, 40.7484), Vec::<String>::new())?;
/// index.insert("c", "cafe", Point::new(-118.2437, 34.0522), Vec::<String>::new())?;
///
/// let results = ProximityQuery::new(Point::new(-74.0, 40.71))
///     .max_results(2)
///     .max_distance(10_000.0)
///     .execute(&index, &GeocellQuery::new("cafe"))?;
///
/// assert_eq!(results.len(), 2);
/// assert!(results.results[0].distance <= results.results[1].distance);
/// # Ok::<(), geocell::GeocellError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ProximityQuery<T> {
    center: Point,
    max_results: usize,
    min_distance: f64,
    max_distance: f64,
    max_resolution: usize,
    resume: Option<SearchCursor<T>>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<T: Located + PartialEq> ProximityQuery<T> {
    pub fn new(center: Point) -> Self {
        Self::with_config(center, &SearchConfig::default())
    }

    pub fn with_config(center: Point, config: &SearchConfig) -> Self {
        Self {
            center,
            max_results: config.default_max_results,
            min_distance: 0.0,
            max_distance: 0.0,
            max_resolution: config.max_resolution,
            resume: None,
            cancel: None,
        }
    }

    pub fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Inclusive lower distance bound in meters.
    pub fn min_distance(mut self, meters: f64) -> Self {
        self.min_distance = meters;
        self
    }

    /// Inclusive upper distance bound in meters; zero or negative means unbounded.
    pub fn max_distance(mut self, meters: f64) -> Self {
        self.max_distance = meters;
        self
    }

    /// Finest resolution to start from (1-13).
    pub fn max_resolution(mut self, resolution: usize) -> Self {
        self.max_resolution = resolution;
        self
    }

    /// Continue after the page described by `cursor`.
    pub fn resume_from(mut self, cursor: SearchCursor<T>) -> Self {
        self.resume = Some(cursor);
        self
    }

    /// Abort with [`GeocellError::Cancelled`] once `flag` is set. Checked
    /// before every store query.
    pub fn cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn accepts(&self, distance: f64) -> bool {
        distance >= self.min_distance && (self.max_distance <= 0.0 || distance <= self.max_distance)
    }

    /// Run the search against `engine`.
    pub fn execute<E>(&self, engine: &E, base_query: &GeocellQuery) -> Result<SearchResults<T>>
    where
        E: QueryEngine<T> + ?Sized,
    {
        check_search_resolution(self.max_resolution)?;
        if self.min_distance.is_nan() || self.max_distance.is_nan() {
            return Err(GeocellError::InvalidInput(
                "Distance bounds must not be NaN".to_string(),
            ));
        }

        let center = &self.center;
        let mut state = match &self.resume {
            Some(cursor) => RingState::resume(&cursor.geocells)?,
            None => RingState::start(center, self.max_resolution)?,
        };
        let mut buffer = ResultBuffer::with_capacity(self.max_results);

        loop {
            if let Some(flag) = &self.cancel {
                if flag.load(Ordering::Relaxed) {
                    log::debug!("Proximity search cancelled after {} results", buffer.len());
                    return Err(GeocellError::Cancelled);
                }
            }

            if buffer.is_full() {
                break;
            }
            if self.max_distance > 0.0 && state.closest_possible_distance() > self.max_distance {
                log::debug!(
                    "Nearest unsearched cell is {:.1} m away, beyond {:.1} m",
                    state.closest_possible_distance(),
                    self.max_distance
                );
                break;
            }

            let pending = state.pending();
            let entities = if pending.is_empty() {
                Vec::new()
            } else {
                engine.query(base_query, &pending)?
            };
            let returned = entities.len();
            log::debug!(
                "Fetched {} entities from {} cells at resolution {}",
                returned,
                pending.len(),
                state.resolution()
            );

            for entity in entities {
                let dist = distance(center, &entity.location());
                if !dist.is_finite() {
                    log::warn!("Skipping entity with non-finite location");
                    continue;
                }
                if !self.accepts(dist) {
                    continue;
                }
                if let Some(cursor) = &self.resume {
                    if cursor.already_returned(&entity, dist) {
                        continue;
                    }
                }
                buffer.offer(entity, dist);
            }

            if state.is_exhausted() || buffer.is_full() {
                break;
            }
            state = state.advance(center, returned)?;
        }

        log::debug!(
            "Proximity search finished with {} results at resolution {}",
            buffer.len(),
            state.resolution()
        );

        Ok(SearchResults {
            results: buffer.into_vec(),
            last_resolution: state.resolution(),
            last_geocells: state.cells().to_vec(),
        })
    }
}

/// Find the `max_results` entities nearest to `center` whose distance lies in
/// `[min_distance, max_distance]` (`max_distance <= 0` leaves it unbounded).
///
/// # Errors
///
/// [`GeocellError::InvalidResolution`] if `max_resolution` is outside 1-13,
/// and any error returned by `engine`, which aborts the search.
pub fn proximity_search<T, E>(
    center: &Point,
    max_results: usize,
    min_distance: f64,
    max_distance: f64,
    base_query: &GeocellQuery,
    engine: &E,
    max_resolution: usize,
) -> Result<SearchResults<T>>
where
    T: Located + PartialEq,
    E: QueryEngine<T> + ?Sized,
{
    ProximityQuery::new(*center)
        .max_results(max_results)
        .min_distance(min_distance)
        .max_distance(max_distance)
        .max_resolution(max_resolution)
        .execute(engine, base_query)
}

/// Entities inside `bbox`, found with a single query over the cells chosen by
/// `planner`. Each entity appears once, in store order.
pub fn bbox_search<T, E, C>(
    bbox: &BoundingBox,
    base_query: &GeocellQuery,
    engine: &E,
    planner: &BboxPlanner<C>,
) -> Result<Vec<T>>
where
    T: Located + PartialEq,
    E: QueryEngine<T> + ?Sized,
    C: CostFunction,
{
    let cells = planner.plan(bbox)?;
    let mut found: Vec<T> = Vec::new();
    for entity in engine.query(base_query, &cells)? {
        if bbox.contains_point(&entity.location()) && !found.contains(&entity) {
            found.push(entity);
        }
    }
    log::debug!(
        "Bounding box search over {} cells kept {} entities",
        cells.len(),
        found.len()
    );
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Debug, Clone, PartialEq)]
    struct Place {
        id: u32,
        at: Point,
    }

    impl Located for Place {
        fn location(&self) -> Point {
            self.at
        }
    }

    /// Returns every place regardless of cells and records each call.
    struct EverythingEngine {
        places: Vec<Place>,
        calls: RefCell<Vec<Vec<String>>>,
    }

    impl QueryEngine<Place> for EverythingEngine {
        fn query(&self, _base: &GeocellQuery, cells: &[String]) -> Result<Vec<Place>> {
            self.calls.borrow_mut().push(cells.to_vec());
            Ok(self.places.clone())
        }
    }

    struct FailingEngine;

    impl QueryEngine<Place> for FailingEngine {
        fn query(&self, _base: &GeocellQuery, _cells: &[String]) -> Result<Vec<Place>> {
            Err(GeocellError::query("store unavailable"))
        }
    }

    fn place(id: u32, lon: f64, lat: f64) -> Place {
        Place {
            id,
            at: Point::new(lon, lat),
        }
    }

    #[test]
    fn test_buffer_keeps_nearest_sorted() {
        let mut buffer = ResultBuffer::with_capacity(3);
        assert!(buffer.offer(1, 50.0));
        assert!(buffer.offer(2, 10.0));
        assert!(buffer.offer(3, 30.0));
        assert!(buffer.is_full());
        assert!(buffer.offer(4, 20.0));
        assert!(!buffer.offer(5, 99.0));

        let entries = buffer.into_vec();
        let order: Vec<_> = entries.iter().map(|e| e.entity).collect();
        assert_eq!(order, vec![2, 4, 3]);
    }

    #[test]
    fn test_buffer_ties_and_duplicates() {
        let mut buffer = ResultBuffer::with_capacity(5);
        assert!(buffer.offer("a", 10.0));
        assert!(buffer.offer("b", 10.0));
        assert!(!buffer.offer("a", 10.0));
        assert!(buffer.offer("a", 12.0));

        let order: Vec<_> = buffer.into_vec().into_iter().map(|e| e.entity).collect();
        assert_eq!(order, vec!["a", "b", "a"]);
    }

    #[test]
    fn test_buffer_zero_capacity() {
        let mut buffer = ResultBuffer::with_capacity(0);
        assert!(buffer.is_full());
        assert!(!buffer.offer(1, 1.0));
    }

    #[test]
    fn test_ring_start() -> Result<()> {
        let center = Point::new(-75.0, 37.0);
        let state = RingState::start(&center, 13)?;
        assert_eq!(state.cells().len(), 1);
        assert_eq!(state.resolution(), 13);
        assert_eq!(state.closest_possible_distance(), 0.0);
        assert_eq!(state.pending(), state.cells().to_vec());
        assert!(!state.is_exhausted());

        assert!(matches!(
            RingState::start(&center, 0),
            Err(GeocellError::InvalidResolution { resolution: 0, .. })
        ));
        assert!(RingState::start(&center, 14).is_err());
        Ok(())
    }

    #[test]
    fn test_ring_grows_one_two_four() -> Result<()> {
        let center = Point::new(-75.0, 37.0);
        let one = RingState::start(&center, 8)?;

        let two = one.advance(&center, 1)?;
        assert_eq!(two.cells().len(), 2);
        assert_eq!(two.resolution(), 8);
        assert_eq!(two.cells()[0], one.cells()[0]);
        assert_eq!(two.pending().len(), 1);
        assert!(two.closest_possible_distance() > 0.0);

        let four = two.advance(&center, 1)?;
        assert_eq!(four.cells().len(), 4);
        assert_eq!(four.pending().len(), 2);

        // The block is a 2x2 rectangle containing the center.
        let mut block = four.cells().to_vec();
        block.sort();
        let mut corners = block.clone();
        corners.sort_by(|a, b| {
            let (ba, bb) = (containing_box(a).unwrap(), containing_box(b).unwrap());
            (ba.south, ba.west).partial_cmp(&(bb.south, bb.west)).unwrap()
        });
        let mut expected = crate::cell::interpolate(&corners[0], &corners[3])?;
        expected.sort();
        assert_eq!(block, expected);

        let parents = four.advance(&center, 1)?;
        assert_eq!(parents.resolution(), 7);
        assert!((1..=4).contains(&parents.cells().len()));
        Ok(())
    }

    #[test]
    fn test_ring_ascends_on_empty_round() -> Result<()> {
        let center = Point::new(-75.0, 37.0);
        let state = RingState::start(&center, 5)?;
        let next = state.advance(&center, 0)?;
        assert_eq!(next.cells(), &[state.cells()[0][..4].to_string()]);
        assert!(next.searched.contains(&state.cells()[0]));
        Ok(())
    }

    #[test]
    fn test_ring_exhausts_to_top_level() -> Result<()> {
        let center = Point::new(-75.0, 37.0);
        let mut state = RingState::start(&center, 1)?;
        state = state.advance(&center, 0)?;
        assert!(state.is_exhausted());
        assert_eq!(state.cells().len(), 16);
        assert_eq!(state.resolution(), 1);
        // The starting cell was searched already.
        assert_eq!(state.pending().len(), 15);
        Ok(())
    }

    #[test]
    fn test_ring_near_pole_extends_sideways() -> Result<()> {
        let center = Point::new(10.0, 89.9999);
        let one = RingState::start(&center, 6)?;
        let two = one.advance(&center, 1)?;
        assert_eq!(two.cells().len(), 2);

        // North is off the map, so the ring has to grow along the pole.
        let four = two.advance(&center, 1)?;
        assert_eq!(four.cells().len(), 4);
        let distinct: FxHashSet<_> = four.cells().iter().collect();
        assert_eq!(distinct.len(), 4);
        Ok(())
    }

    #[test]
    fn test_ring_across_antimeridian_keeps_zero_bound() -> Result<()> {
        let center = Point::new(179.99999, 0.5);
        let mut state = RingState::start(&center, 6)?;
        for _ in 0..3 {
            state = state.advance(&center, 1)?;
            if state.wraps_antimeridian()? {
                break;
            }
        }
        assert!(state.wraps_antimeridian()?);
        let next = state.advance(&center, 1)?;
        assert_eq!(next.closest_possible_distance(), 0.0);
        Ok(())
    }

    #[test]
    fn test_resume_validation() {
        assert!(RingState::resume(&[]).is_err());
        assert!(RingState::resume(&["8f".to_string(), "8".to_string()]).is_err());
        assert!(RingState::resume(&["zz".to_string()]).is_err());
        let state = RingState::resume(&["8f".to_string(), "8e".to_string()]).unwrap();
        assert_eq!(state.resolution(), 2);
    }

    #[test]
    fn test_search_bounds_and_order() -> Result<()> {
        let center = Point::new(-75.0, 37.0);
        let engine = EverythingEngine {
            places: (0..20)
                .map(|i| place(i, -75.0 + i as f64 * 0.01, 37.0 + i as f64 * 0.005))
                .collect(),
            calls: RefCell::new(Vec::new()),
        };

        let results = ProximityQuery::new(center)
            .max_results(5)
            .min_distance(500.0)
            .max_distance(8_000.0)
            .execute(&engine, &GeocellQuery::new("place"))?;

        assert!(results.len() <= 5);
        assert!(!results.is_empty());
        assert!(results
            .results
            .windows(2)
            .all(|w| w[0].distance <= w[1].distance));
        for r in &results.results {
            assert!(r.distance >= 500.0 && r.distance <= 8_000.0);
        }
        // Place 0 sits on the center and is below the minimum.
        assert!(results.entities().all(|p| p.id != 0));
        Ok(())
    }

    #[test]
    fn test_search_never_requeries_cells() -> Result<()> {
        let center = Point::new(-75.0, 37.0);
        let engine = EverythingEngine {
            places: vec![place(1, 100.0, -40.0)],
            calls: RefCell::new(Vec::new()),
        };

        // The only place is on the other side of the world, so the ring keeps
        // growing until its nearest edge passes the distance limit.
        let results = ProximityQuery::new(center)
            .max_results(1)
            .max_distance(1_000.0)
            .execute(&engine, &GeocellQuery::new("place"))?;
        assert!(results.is_empty());

        let calls = engine.calls.borrow();
        let mut seen = FxHashSet::default();
        for call in calls.iter() {
            assert!(!call.is_empty());
            for cell in call {
                assert!(seen.insert(cell.clone()), "{} queried twice", cell);
            }
        }
        Ok(())
    }

    #[test]
    fn test_search_exhaustion_terminates() -> Result<()> {
        let center = Point::new(-75.0, 37.0);
        let engine = EverythingEngine {
            places: vec![place(1, -75.001, 37.001), place(2, 120.0, 10.0)],
            calls: RefCell::new(Vec::new()),
        };
        let results = proximity_search(
            &center,
            10,
            0.0,
            0.0,
            &GeocellQuery::new("place"),
            &engine,
            13,
        )?;
        assert_eq!(results.len(), 2);
        assert_eq!(results.last_resolution, 1);
        assert_eq!(results.last_geocells.len(), 16);
        Ok(())
    }

    #[test]
    fn test_search_propagates_engine_errors() {
        let result: Result<SearchResults<Place>> = proximity_search(
            &Point::new(0.0, 0.0),
            5,
            0.0,
            0.0,
            &GeocellQuery::new("place"),
            &FailingEngine,
            13,
        );
        assert!(matches!(result, Err(GeocellError::QueryEngine(_))));
    }

    #[test]
    fn test_search_rejects_invalid_resolution() {
        let engine = EverythingEngine {
            places: vec![],
            calls: RefCell::new(Vec::new()),
        };
        let result = proximity_search(
            &Point::new(0.0, 0.0),
            5,
            0.0,
            0.0,
            &GeocellQuery::new("place"),
            &engine,
            MAX_RESOLUTION + 1,
        );
        assert!(matches!(
            result,
            Err(GeocellError::InvalidResolution { resolution: 14, .. })
        ));
        assert!(engine.calls.borrow().is_empty());
    }

    #[test]
    fn test_cancelled_search() {
        let engine = EverythingEngine {
            places: vec![place(1, 0.0, 0.0)],
            calls: RefCell::new(Vec::new()),
        };
        let flag = Arc::new(AtomicBool::new(true));
        let result = ProximityQuery::new(Point::new(0.0, 0.0))
            .cancel_flag(flag)
            .execute(&engine, &GeocellQuery::new("place"));
        assert!(matches!(result, Err(GeocellError::Cancelled)));
        assert!(engine.calls.borrow().is_empty());
    }

    #[test]
    fn test_cursor_pages_forward() -> Result<()> {
        let center = Point::new(-75.0, 37.0);
        let engine = EverythingEngine {
            places: (1..=6)
                .map(|i| place(i, -75.0 + i as f64 * 0.01, 37.0))
                .collect(),
            calls: RefCell::new(Vec::new()),
        };
        let query = GeocellQuery::new("place");

        let first = ProximityQuery::new(center)
            .max_results(3)
            .execute(&engine, &query)?;
        let ids: Vec<_> = first.entities().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let cursor = first.cursor().unwrap();
        let second = ProximityQuery::new(center)
            .max_results(3)
            .resume_from(cursor)
            .execute(&engine, &query)?;
        let ids: Vec<_> = second.entities().map(|p| p.id).collect();
        assert_eq!(ids, vec![4, 5, 6]);
        Ok(())
    }

    #[test]
    fn test_bbox_search_filters_to_box() -> Result<()> {
        let engine = EverythingEngine {
            places: vec![
                place(1, -74.0, 40.75),
                place(2, -73.95, 40.78),
                place(3, -75.0, 40.75),
                place(1, -74.0, 40.75),
            ],
            calls: RefCell::new(Vec::new()),
        };
        let bbox = BoundingBox::new(40.80, -73.93, 40.70, -74.02);
        let found = bbox_search(&bbox, &GeocellQuery::new("place"), &engine, &BboxPlanner::new())?;
        let ids: Vec<_> = found.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(engine.calls.borrow().len(), 1);
        Ok(())
    }
}
