//! Geocell selection for bounding-box queries.
//!
//! A bounding box can be covered by few large cells (cheap to query, lots of
//! false positives) or many small ones (precise, expensive to query). The
//! planner walks resolutions from coarse to fine, scores each candidate cell
//! set with a [`CostFunction`] and keeps the cheapest.

use crate::cell::{MAX_RESOLUTION, compute, interpolate, interpolation_count};
use crate::config::SearchConfig;
use crate::error::Result;
use geocell_types::BoundingBox;

/// Default ceiling on the number of cells considered at one resolution.
pub const MAX_FEASIBLE_BBOX_SEARCH_CELLS: usize = 300;

/// Scores a candidate cell set of `num_cells` cells at `resolution`.
///
/// Lower is better. Any `Fn(usize, usize) -> f64` is a cost function.
pub trait CostFunction {
    fn cost(&self, num_cells: usize, resolution: usize) -> f64;
}

impl<F> CostFunction for F
where
    F: Fn(usize, usize) -> f64,
{
    fn cost(&self, num_cells: usize, resolution: usize) -> f64 {
        self(num_cells, resolution)
    }
}

/// Free up to `cell_limit` cells, prohibitive beyond.
///
/// Ties keep the planner moving to finer resolutions, so this picks the finest
/// resolution whose cover fits in `cell_limit` cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultCostFunction {
    cell_limit: usize,
}

impl DefaultCostFunction {
    pub const fn new(cell_limit: usize) -> Self {
        Self { cell_limit }
    }
}

impl Default for DefaultCostFunction {
    fn default() -> Self {
        Self::new(16)
    }
}

impl CostFunction for DefaultCostFunction {
    fn cost(&self, num_cells: usize, _resolution: usize) -> f64 {
        if num_cells > self.cell_limit {
            f64::MAX
        } else {
            0.0
        }
    }
}

/// Chooses the cell set to query for a bounding box.
///
/// # Examples
///
/// ```rust
/// use geocell::{BoundingBox, planner::BboxPlanner};
///
/// let planner = BboxPlanner::new();
/// let manhattan = BoundingBox::new(40.80, -73.93, 40.70, -74.02);
/// let cells = planner.plan(&manhattan)?;
///
/// assert!(!cells.is_empty());
/// assert!(cells.iter().all(|c| c.len() == cells[0].len()));
/// # Ok::<(), geocell::GeocellError>(())
/// ```
#[derive(Debug, Clone)]
pub struct BboxPlanner<C = DefaultCostFunction> {
    cost: C,
    max_cells: usize,
}

impl BboxPlanner {
    pub fn new() -> Self {
        Self {
            cost: DefaultCostFunction::default(),
            max_cells: MAX_FEASIBLE_BBOX_SEARCH_CELLS,
        }
    }

    pub fn with_config(config: &SearchConfig) -> Self {
        Self {
            cost: DefaultCostFunction::new(config.cost_cell_limit),
            max_cells: config.max_feasible_bbox_cells,
        }
    }
}

impl Default for BboxPlanner {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: CostFunction> BboxPlanner<C> {
    /// Replace the cost function, keeping the cell ceiling.
    pub fn with_cost_function<D: CostFunction>(self, cost: D) -> BboxPlanner<D> {
        BboxPlanner {
            cost,
            max_cells: self.max_cells,
        }
    }

    pub fn with_max_cells(mut self, max_cells: usize) -> Self {
        self.max_cells = max_cells;
        self
    }

    pub fn max_cells(&self) -> usize {
        self.max_cells
    }

    /// Plan the cells covering `bbox`.
    ///
    /// The result always has at least one cell. All cells share a resolution,
    /// except for a box crossing the antimeridian: it is split in two at ±180°
    /// and each half is planned on its own, so the halves may differ.
    pub fn plan(&self, bbox: &BoundingBox) -> Result<Vec<String>> {
        if let Some((western, eastern)) = bbox.split_antimeridian() {
            let mut cells = self.plan(&western)?;
            cells.extend(self.plan(&eastern)?);
            return Ok(cells);
        }

        let cell_ne = compute(&bbox.north_east(), MAX_RESOLUTION)?;
        let cell_sw = compute(&bbox.south_west(), MAX_RESOLUTION)?;

        // Both corners share every cell coarser than their common prefix, so
        // searching starts at the prefix length.
        let common_prefix = cell_ne
            .bytes()
            .zip(cell_sw.bytes())
            .take_while(|(a, b)| a == b)
            .count();
        let min_resolution = common_prefix.max(1);

        let mut min_cost = f64::MAX;
        let mut best: Vec<String> = Vec::new();
        let mut best_resolution = min_resolution;

        for resolution in min_resolution..=MAX_RESOLUTION {
            let ne = &cell_ne[..resolution];
            let sw = &cell_sw[..resolution];

            if interpolation_count(ne, sw)? > self.max_cells as u64 {
                continue;
            }

            let mut cells = interpolate(ne, sw)?;
            cells.sort();

            let cost = self.cost.cost(cells.len(), resolution);
            // Ties move on to the finer resolution unless both are prohibitive.
            if cost < min_cost || (cost == min_cost && cost < f64::MAX) {
                min_cost = cost;
                best = cells;
                best_resolution = resolution;
            } else {
                if best.is_empty() {
                    best = cells;
                    best_resolution = resolution;
                }
                // Cost is unimodal in resolution; once it rises it stays up.
                break;
            }
        }

        if best.is_empty() {
            // Nothing fit under the ceiling. The coarsest cover is still correct.
            log::warn!(
                "No cover of {:?} fits in {} cells; using resolution {}",
                bbox,
                self.max_cells,
                min_resolution
            );
            best = interpolate(&cell_ne[..min_resolution], &cell_sw[..min_resolution])?;
            best.sort();
            best_resolution = min_resolution;
        }

        log::debug!(
            "Planned {} cells at resolution {} for {:?}",
            best.len(),
            best_resolution,
            bbox
        );
        Ok(best)
    }
}

/// Plan the cells for `bbox` with the default ceiling and the given cost function.
pub fn best_bbox_search_cells<C: CostFunction>(bbox: &BoundingBox, cost: C) -> Result<Vec<String>> {
    BboxPlanner::new().with_cost_function(cost).plan(bbox)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::containing_box;

    fn union_box(cells: &[String]) -> BoundingBox {
        let mut union = containing_box(&cells[0]).unwrap();
        for cell in &cells[1..] {
            let bbox = containing_box(cell).unwrap();
            union.north = union.north.max(bbox.north);
            union.east = union.east.max(bbox.east);
            union.south = union.south.min(bbox.south);
            union.west = union.west.min(bbox.west);
        }
        union
    }

    #[test]
    fn test_default_cost_is_monotonic() {
        let cost = DefaultCostFunction::default();
        for resolution in 1..MAX_RESOLUTION {
            for cells in 1..400 {
                assert!(cost.cost(cells + 1, resolution) >= cost.cost(cells, resolution));
                assert!(cost.cost(cells, resolution + 1) >= cost.cost(cells, resolution));
            }
        }
        assert_eq!(cost.cost(16, 5), 0.0);
        assert_eq!(cost.cost(17, 5), f64::MAX);
    }

    #[test]
    fn test_plan_covers_box() -> Result<()> {
        let boxes = [
            BoundingBox::new(40.80, -73.93, 40.70, -74.02),
            BoundingBox::new(37.5, -74.5, 36.5, -75.5),
            BoundingBox::new(10.0, 10.0, -10.0, -10.0),
            BoundingBox::new(89.0, 179.0, 60.0, 100.0),
            BoundingBox::new(0.0001, 0.0001, 0.0, 0.0),
        ];
        let planner = BboxPlanner::new();
        for bbox in boxes {
            let cells = planner.plan(&bbox)?;
            assert!(!cells.is_empty());
            assert!(cells.len() <= 16);
            let resolution = cells[0].len();
            assert!(cells.iter().all(|c| c.len() == resolution));
            assert!(union_box(&cells).contains_box(&bbox), "{:?}", bbox);

            let mut sorted = cells.clone();
            sorted.sort();
            assert_eq!(sorted, cells);
        }
        Ok(())
    }

    #[test]
    fn test_small_box_uses_fine_cells() -> Result<()> {
        let bbox = BoundingBox::new(40.7130, -74.0058, 40.7126, -74.0062);
        let cells = BboxPlanner::new().plan(&bbox)?;
        assert!(cells[0].len() >= 8);
        Ok(())
    }

    #[test]
    fn test_world_box() -> Result<()> {
        let cells = BboxPlanner::new().plan(&BoundingBox::WORLD)?;
        assert_eq!(cells.len(), 16);
        assert!(cells.iter().all(|c| c.len() == 1));
        Ok(())
    }

    #[test]
    fn test_antimeridian_split() -> Result<()> {
        let bbox = BoundingBox::new(10.0, -170.0, -10.0, 170.0);
        let planner = BboxPlanner::new();
        let cells = planner.plan(&bbox)?;

        let (western, eastern) = bbox.split_antimeridian().unwrap();
        let west_cells = planner.plan(&western)?;
        let east_cells = planner.plan(&eastern)?;

        assert!(!west_cells.is_empty() && west_cells.len() <= MAX_FEASIBLE_BBOX_SEARCH_CELLS);
        assert!(!east_cells.is_empty() && east_cells.len() <= MAX_FEASIBLE_BBOX_SEARCH_CELLS);
        assert_eq!(cells.len(), west_cells.len() + east_cells.len());
        assert!(union_box(&west_cells).contains_box(&western));
        assert!(union_box(&east_cells).contains_box(&eastern));
        Ok(())
    }

    #[test]
    fn test_custom_cost_function() -> Result<()> {
        let bbox = BoundingBox::new(37.5, -74.5, 36.5, -75.5);

        // Only ever accept the coarsest candidate.
        let coarse = best_bbox_search_cells(&bbox, |_cells: usize, resolution: usize| {
            resolution as f64
        })?;
        let fine = best_bbox_search_cells(&bbox, DefaultCostFunction::new(64))?;

        assert!(coarse[0].len() <= fine[0].len());
        assert!(fine.len() <= 64);
        Ok(())
    }

    #[test]
    fn test_ceiling_fallback_never_empty() -> Result<()> {
        // A ceiling of one cell can't hold the 2x2 cover of the equator crossing.
        let bbox = BoundingBox::new(1.0, 1.0, -1.0, -1.0);
        let planner = BboxPlanner::new().with_max_cells(1);
        let cells = planner.plan(&bbox)?;
        assert!(!cells.is_empty());
        assert!(union_box(&cells).contains_box(&bbox));
        Ok(())
    }

    #[test]
    fn test_with_config() {
        let config = SearchConfig::default().with_max_feasible_bbox_cells(50);
        let planner = BboxPlanner::with_config(&config);
        assert_eq!(planner.max_cells(), 50);
    }
}
