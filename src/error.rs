//! Error types for geocell operations.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GeocellError>;

/// Errors raised by the codec, the planner and the search loop.
#[derive(Debug, Error)]
pub enum GeocellError {
    /// Empty string or a character outside `0-9a-f`.
    #[error("Invalid geocell: {0:?}")]
    InvalidGeocell(String),

    #[error("Invalid resolution {resolution}: must be between {min} and {max}")]
    InvalidResolution {
        resolution: usize,
        min: usize,
        max: usize,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The external store failed; the search is aborted without partial results.
    #[error("Query engine error: {0}")]
    QueryEngine(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Search cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GeocellError {
    /// Wrap any store error so it can be returned from a `QueryEngine`.
    pub fn query<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        GeocellError::QueryEngine(err.into())
    }
}

impl From<serde_json::Error> for GeocellError {
    fn from(err: serde_json::Error) -> Self {
        GeocellError::Config(err.to_string())
    }
}

#[cfg(feature = "toml")]
impl From<toml::de::Error> for GeocellError {
    fn from(err: toml::de::Error) -> Self {
        GeocellError::Config(err.to_string())
    }
}
