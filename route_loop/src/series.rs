use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::LoopError;

/// Known per-point series of an activity.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SeriesKey {
    #[serde(rename = "distance")]
    Distance,
    #[serde(rename = "time")]
    Time,
    /// Corrected elevations when present, original elevations otherwise.
    #[serde(rename = "elevation")]
    Elevation,
    #[serde(rename = "elevation_original")]
    ElevationOriginal,
    #[serde(rename = "elevation_corrected")]
    ElevationCorrected,
    #[serde(rename = "lat", alias = "latitude")]
    Latitude,
    #[serde(rename = "lng", alias = "longitude")]
    Longitude,
}

impl SeriesKey {
    pub const ALL: [SeriesKey; 7] = [
        SeriesKey::Distance,
        SeriesKey::Time,
        SeriesKey::Elevation,
        SeriesKey::ElevationOriginal,
        SeriesKey::ElevationCorrected,
        SeriesKey::Latitude,
        SeriesKey::Longitude,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SeriesKey::Distance => "distance",
            SeriesKey::Time => "time",
            SeriesKey::Elevation => "elevation",
            SeriesKey::ElevationOriginal => "elevation_original",
            SeriesKey::ElevationCorrected => "elevation_corrected",
            SeriesKey::Latitude => "lat",
            SeriesKey::Longitude => "lng",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "distance" => Some(SeriesKey::Distance),
            "time" => Some(SeriesKey::Time),
            "elevation" => Some(SeriesKey::Elevation),
            "elevation_original" => Some(SeriesKey::ElevationOriginal),
            "elevation_corrected" => Some(SeriesKey::ElevationCorrected),
            "lat" | "latitude" => Some(SeriesKey::Latitude),
            "lng" | "longitude" => Some(SeriesKey::Longitude),
            _ => None,
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SeriesKey {
    type Err = LoopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SeriesKey::from_name(s).ok_or_else(|| LoopError::UnknownSeriesName(s.to_string()))
    }
}

/// Parallel, equal-length series that a [`crate::WindowCursor`] can walk over.
///
/// Every present series holds exactly `count()` values. `value` and `series` are only
/// called for series where `has` returned true; `value` additionally requires
/// `index < count()`.
pub trait SeriesSource {
    fn count(&self) -> usize;

    fn has(&self, key: SeriesKey) -> bool;

    fn value(&self, index: usize, key: SeriesKey) -> f64;

    fn series(&self, key: SeriesKey) -> &[f64];
}

impl<T: SeriesSource + ?Sized> SeriesSource for &T {
    fn count(&self) -> usize {
        (**self).count()
    }

    fn has(&self, key: SeriesKey) -> bool {
        (**self).has(key)
    }

    fn value(&self, index: usize, key: SeriesKey) -> f64 {
        (**self).value(index, key)
    }

    fn series(&self, key: SeriesKey) -> &[f64] {
        (**self).series(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_name() {
        for key in SeriesKey::ALL {
            assert_eq!(SeriesKey::from_name(key.name()), Some(key));
        }
        assert_eq!(SeriesKey::from_name(" Latitude "), Some(SeriesKey::Latitude));
        assert_eq!(SeriesKey::from_name("heartrate"), None);
    }

    #[test]
    fn from_str_reports_unknown_names() {
        let err = "cadence".parse::<SeriesKey>().unwrap_err();
        assert_eq!(err, LoopError::UnknownSeriesName("cadence".into()));
    }

    #[test]
    fn serde_uses_short_names() {
        let json = serde_json::to_string(&SeriesKey::Longitude).unwrap();
        assert_eq!(json, "\"lng\"");
        let key: SeriesKey = serde_json::from_str("\"latitude\"").unwrap();
        assert_eq!(key, SeriesKey::Latitude);
    }
}
