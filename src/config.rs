//! Tuning knobs for geocell searches.
//!
//! `SearchConfig` is serializable so it can be loaded from JSON (or TOML with
//! the `toml` feature) alongside the rest of an application's settings.

use crate::cell::MAX_RESOLUTION;
use serde::de::Error;
use serde::{Deserialize, Serialize};

/// Search and planning configuration.
///
/// # Example
///
/// ```rust
/// use geocell::SearchConfig;
///
/// let json = r#"{
///     "max_resolution": 11,
///     "default_max_results": 25
/// }"#;
/// let config = SearchConfig::from_json(json).unwrap();
/// assert_eq!(config.max_resolution, 11);
/// assert_eq!(config.max_feasible_bbox_cells, 300);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Finest resolution a proximity search starts from (1-13, default: 13)
    #[serde(default = "SearchConfig::default_max_resolution")]
    pub max_resolution: usize,

    /// Ceiling on the number of cells the bounding-box planner will consider
    /// at a single resolution
    #[serde(default = "SearchConfig::default_max_feasible_bbox_cells")]
    pub max_feasible_bbox_cells: usize,

    /// Result limit used when a query doesn't set one
    #[serde(default = "SearchConfig::default_max_results")]
    pub default_max_results: usize,

    /// Cell count above which the default cost function rejects a cell set
    #[serde(default = "SearchConfig::default_cost_cell_limit")]
    pub cost_cell_limit: usize,
}

impl SearchConfig {
    const fn default_max_resolution() -> usize {
        MAX_RESOLUTION
    }

    const fn default_max_feasible_bbox_cells() -> usize {
        300
    }

    const fn default_max_results() -> usize {
        10
    }

    const fn default_cost_cell_limit() -> usize {
        16
    }

    pub fn with_max_resolution(mut self, resolution: usize) -> Self {
        assert!(
            (1..=MAX_RESOLUTION).contains(&resolution),
            "Max resolution must be between 1 and 13"
        );
        self.max_resolution = resolution;
        self
    }

    pub fn with_max_feasible_bbox_cells(mut self, cells: usize) -> Self {
        assert!(cells > 0, "Bounding box cell ceiling must be greater than zero");
        self.max_feasible_bbox_cells = cells;
        self
    }

    pub fn with_default_max_results(mut self, max_results: usize) -> Self {
        self.default_max_results = max_results;
        self
    }

    pub fn with_cost_cell_limit(mut self, cells: usize) -> Self {
        assert!(cells > 0, "Cost cell limit must be greater than zero");
        self.cost_cell_limit = cells;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=MAX_RESOLUTION).contains(&self.max_resolution) {
            return Err(format!(
                "Max resolution must be between 1 and {}",
                MAX_RESOLUTION
            ));
        }

        if self.max_feasible_bbox_cells == 0 {
            return Err("Bounding box cell ceiling must be greater than zero".to_string());
        }

        if self.cost_cell_limit == 0 {
            return Err("Cost cell limit must be greater than zero".to_string());
        }

        Ok(())
    }

    /// Load configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: SearchConfig = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(Error::custom(e));
        }
        Ok(config)
    }

    /// Save configuration as JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load configuration from TOML string (requires toml feature)
    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let config: SearchConfig = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    /// Save configuration as TOML string (requires toml feature)
    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_resolution: Self::default_max_resolution(),
            max_feasible_bbox_cells: Self::default_max_feasible_bbox_cells(),
            default_max_results: Self::default_max_results(),
            cost_cell_limit: Self::default_cost_cell_limit(),
        }
    }
}
