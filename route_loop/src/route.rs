use std::collections::BTreeMap;

use ndarray::Array1;

use crate::series::{SeriesKey, SeriesSource};
use crate::{LoopError, Result};

pub const CITIES_SEPARATOR: &str = " - ";

/// Recorded route with per-point series.
///
/// The point count is fixed by the first recorded (non-corrected) series inserted; every
/// other series must match it. Corrected elevations longer than the route are cut to
/// size since elevation services tend to pad their answers.
#[derive(Clone, Debug, Default)]
pub struct Route {
    name: String,
    cities: Vec<String>,
    points: usize,
    series: BTreeMap<SeriesKey, Array1<f64>>,
}

impl Route {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn from_columns(
        name: impl Into<String>,
        columns: Vec<(SeriesKey, Vec<f64>)>,
    ) -> Result<Self> {
        let mut route = Route::new(name);
        for (key, values) in columns {
            route.insert_series(key, values)?;
        }
        Ok(route)
    }

    pub fn with_series(mut self, key: SeriesKey, values: Vec<f64>) -> Result<Self> {
        self.insert_series(key, values)?;
        Ok(self)
    }

    pub fn with_cities(mut self, cities: &str) -> Self {
        self.cities = cities
            .split(CITIES_SEPARATOR)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        self
    }

    pub fn insert_series(&mut self, key: SeriesKey, mut values: Vec<f64>) -> Result<()> {
        // Plain elevation data is what the device recorded.
        let key = match key {
            SeriesKey::Elevation => SeriesKey::ElevationOriginal,
            other => other,
        };

        if values.is_empty() {
            self.series.remove(&key);
            if self.series.is_empty() {
                self.points = 0;
            }
            return Ok(());
        }

        match (key, self.recorded_points()) {
            (SeriesKey::ElevationCorrected, Some(points)) => {
                if values.len() < points {
                    return Err(LoopError::MismatchedLength {
                        series: key,
                        expected: points,
                        actual: values.len(),
                    });
                }
                values.truncate(points);
            }
            (SeriesKey::ElevationCorrected, None) => self.points = values.len(),
            (_, Some(points)) => {
                if values.len() != points {
                    return Err(LoopError::MismatchedLength {
                        series: key,
                        expected: points,
                        actual: values.len(),
                    });
                }
            }
            (_, None) => {
                self.fit_corrected_elevations(values.len())?;
                self.points = values.len();
            }
        }

        self.series.insert(key, Array1::from_vec(values));
        Ok(())
    }

    /// Point count fixed by recorded series; corrected elevations alone do not fix it.
    fn recorded_points(&self) -> Option<usize> {
        self.series
            .keys()
            .any(|&key| key != SeriesKey::ElevationCorrected)
            .then_some(self.points)
    }

    fn fit_corrected_elevations(&mut self, points: usize) -> Result<()> {
        let Some(corrected) = self.series.get_mut(&SeriesKey::ElevationCorrected) else {
            return Ok(());
        };
        if corrected.len() < points {
            return Err(LoopError::MismatchedLength {
                series: SeriesKey::ElevationCorrected,
                expected: points,
                actual: corrected.len(),
            });
        }
        if corrected.len() > points {
            *corrected = corrected.iter().take(points).copied().collect();
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cities(&self) -> &[String] {
        &self.cities
    }

    pub fn cities_as_string(&self) -> String {
        self.cities.join(CITIES_SEPARATOR)
    }

    pub fn has_position_data(&self) -> bool {
        self.has(SeriesKey::Latitude) && self.has(SeriesKey::Longitude)
    }

    pub fn has_original_elevations(&self) -> bool {
        self.series.contains_key(&SeriesKey::ElevationOriginal)
    }

    pub fn has_corrected_elevations(&self) -> bool {
        self.series.contains_key(&SeriesKey::ElevationCorrected)
    }

    pub fn has_elevations(&self) -> bool {
        self.has_original_elevations() || self.has_corrected_elevations()
    }

    /// Corrected elevations if available, otherwise the recorded ones.
    pub fn elevations(&self) -> &[f64] {
        self.series(SeriesKey::Elevation)
    }

    /// Series present on this route, elevation aliases included.
    pub fn available_series(&self) -> Vec<SeriesKey> {
        SeriesKey::ALL
            .into_iter()
            .filter(|&key| self.has(key))
            .collect()
    }

    fn resolve(&self, key: SeriesKey) -> Option<&Array1<f64>> {
        match key {
            SeriesKey::Elevation => self
                .series
                .get(&SeriesKey::ElevationCorrected)
                .or_else(|| self.series.get(&SeriesKey::ElevationOriginal)),
            other => self.series.get(&other),
        }
    }
}

impl SeriesSource for Route {
    fn count(&self) -> usize {
        self.points
    }

    fn has(&self, key: SeriesKey) -> bool {
        self.resolve(key).is_some()
    }

    fn value(&self, index: usize, key: SeriesKey) -> f64 {
        self.series(key)[index]
    }

    fn series(&self, key: SeriesKey) -> &[f64] {
        self.resolve(key)
            .and_then(|values| values.as_slice())
            .unwrap_or(&[])
    }
}
