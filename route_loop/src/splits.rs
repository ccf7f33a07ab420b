//! Split tables: one [`Segment`] per stop of a [`WindowCursor`] walk.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::cursor::WindowCursor;
use crate::series::{SeriesKey, SeriesSource};
use crate::{LoopError, Result};

/// Default split length along distance, in the unit of the distance series.
pub const DEFAULT_INTERVAL: f64 = 1000.0;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SplitMode {
    /// Stop each time `series` has grown by `amount` (e.g. every 1000 m of distance).
    Interval { series: SeriesKey, amount: f64 },
    /// Stop every `step` recorded points.
    Points { step: usize },
}

impl Default for SplitMode {
    fn default() -> Self {
        SplitMode::Interval {
            series: SeriesKey::Distance,
            amount: DEFAULT_INTERVAL,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SplitParams {
    pub mode: SplitMode,
    /// Elevation changes between neighbouring points at or below this are ignored.
    pub gain_eps: f64,
}

impl Default for SplitParams {
    fn default() -> Self {
        Self {
            mode: SplitMode::default(),
            gain_eps: 0.0,
        }
    }
}

impl SplitParams {
    pub fn from_json(input: &str) -> Result<Self> {
        serde_json::from_str(input).map_err(|e| LoopError::InvalidArgument(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        match self.mode {
            SplitMode::Interval { amount, .. } if !(amount.is_finite() && amount > 0.0) => {
                return Err(LoopError::InvalidArgument(format!(
                    "split interval must be positive, got {amount}"
                )));
            }
            SplitMode::Points { step: 0 } => {
                return Err(LoopError::InvalidArgument("split step must be at least 1".into()));
            }
            _ => {}
        }
        if !(self.gain_eps.is_finite() && self.gain_eps >= 0.0) {
            return Err(LoopError::InvalidArgument(format!(
                "gain_eps must be non-negative, got {}",
                self.gain_eps
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub number: usize,
    pub start_index: usize,
    pub end_index: usize,
    pub points: usize,
    pub distance: f64,
    pub duration: f64,
    pub elevation_delta: f64,
    pub elevation_up: f64,
    pub elevation_down: f64,
    pub elevation_max: Option<f64>,
    pub elevation_avg: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct SplitSummary {
    pub segments: usize,
    pub distance: f64,
    pub duration: f64,
    pub elevation_up: f64,
    pub elevation_down: f64,
    pub elevation_max: Option<f64>,
    /// Segment number with the largest elevation change per distance.
    pub steepest: Option<usize>,
}

/// Walk `source` from its first to its last point and summarize every stop.
pub fn compute_splits<S: SeriesSource + ?Sized>(
    source: &S,
    params: &SplitParams,
) -> Result<Vec<Segment>> {
    params.validate()?;
    if source.count() < 2 {
        return Err(LoopError::InsufficientData);
    }

    let mut cursor = WindowCursor::new(source);
    let mut segments = Vec::new();

    match params.mode {
        SplitMode::Interval { series, amount } => {
            if !source.has(series) {
                return Err(LoopError::UnknownSeries(series));
            }
            while !cursor.at_end() {
                // Relative from the first point too: timestamps and partial recordings
                // do not start at zero.
                let target = cursor.current_value(series) + amount;
                cursor.seek_to(series, target)?;
                segments.push(segment_at(&cursor, segments.len() + 1, params.gain_eps));
            }
        }
        SplitMode::Points { step } => {
            cursor.set_step(step)?;
            loop {
                let more = cursor.advance();
                segments.push(segment_at(&cursor, segments.len() + 1, params.gain_eps));
                if !more {
                    break;
                }
            }
        }
    }

    debug!(
        points = source.count(),
        segments = segments.len(),
        "computed splits"
    );
    Ok(segments)
}

fn segment_at<S: SeriesSource + ?Sized>(
    cursor: &WindowCursor<'_, S>,
    number: usize,
    gain_eps: f64,
) -> Segment {
    let has_elevation = cursor.source().has(SeriesKey::Elevation);
    let (elevation_up, elevation_down) = if has_elevation {
        elevation_changes(cursor, gain_eps)
    } else {
        (0.0, 0.0)
    };

    let segment = Segment {
        number,
        start_index: cursor.window_start(),
        end_index: cursor.index(),
        points: cursor.window_len(),
        distance: cursor.delta(SeriesKey::Distance),
        duration: cursor.delta(SeriesKey::Time),
        elevation_delta: cursor.delta(SeriesKey::Elevation),
        elevation_up,
        elevation_down,
        elevation_max: cursor.try_max(SeriesKey::Elevation),
        elevation_avg: has_elevation.then(|| cursor.average(SeriesKey::Elevation)),
    };
    trace!(?segment, "segment");
    segment
}

fn elevation_changes<S: SeriesSource + ?Sized>(
    cursor: &WindowCursor<'_, S>,
    gain_eps: f64,
) -> (f64, f64) {
    let mut values = Vec::with_capacity(cursor.window_len() + 1);
    // Later windows begin one past the previous stop; include that stop so the
    // step into the window is counted.
    if cursor.window_start() > 0 {
        values.push(
            cursor
                .source()
                .value(cursor.last_index(), SeriesKey::Elevation),
        );
    }
    values.extend(cursor.slice(SeriesKey::Elevation));

    let mut up = 0.0;
    let mut down = 0.0;
    for w in values.windows(2) {
        let delta = w[1] - w[0];
        if delta > gain_eps {
            up += delta;
        } else if delta < -gain_eps {
            down -= delta;
        }
    }
    (up, down)
}

fn total(segments: &[Segment], field: impl Fn(&Segment) -> f64) -> f64 {
    segments.iter().map(field).fold(0.0, |acc, v| acc + v)
}

pub fn summarize(segments: &[Segment]) -> SplitSummary {
    let steepest = segments
        .iter()
        .filter(|s| s.distance > 0.0)
        .max_by_key(|s| OrderedFloat(s.elevation_delta / s.distance))
        .map(|s| s.number);

    let elevation_max = segments
        .iter()
        .filter_map(|s| s.elevation_max)
        .max_by_key(|&v| OrderedFloat(v));

    SplitSummary {
        segments: segments.len(),
        distance: total(segments, |s| s.distance),
        duration: total(segments, |s| s.duration),
        elevation_up: total(segments, |s| s.elevation_up),
        elevation_down: total(segments, |s| s.elevation_down),
        elevation_max,
        steepest,
    }
}
