//! Windowed traversal over parallel activity series.
//!
//! A [`WindowCursor`] walks any [`SeriesSource`] (a [`Route`] for instance) either in
//! fixed steps or by seeking forward on a monotonic series such as cumulative distance,
//! and aggregates the values covered since the previous stop.

use thiserror::Error;

pub mod cursor;
pub mod route;
pub mod series;
pub mod splits;

pub use cursor::{WindowCursor, NO_DATA};
pub use route::{Route, CITIES_SEPARATOR};
pub use series::{SeriesKey, SeriesSource};
pub use splits::{
    compute_splits, summarize, Segment, SplitMode, SplitParams, SplitSummary, DEFAULT_INTERVAL,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoopError {
    #[error("series not available: {0}")]
    UnknownSeries(SeriesKey),
    #[error("unknown series name: {0}")]
    UnknownSeriesName(String),
    #[error("target {target} must not be smaller than current value {current}")]
    InvalidTarget { target: f64, current: f64 },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("series {series} has {actual} points, expected {expected}")]
    MismatchedLength {
        series: SeriesKey,
        expected: usize,
        actual: usize,
    },
    #[error("insufficient data for split computation")]
    InsufficientData,
}

pub type Result<T> = std::result::Result<T, LoopError>;
