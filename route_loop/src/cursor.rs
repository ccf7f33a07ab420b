//! Stop-to-stop traversal of a [`SeriesSource`].
//!
//! The cursor keeps two positions: `index`, where it currently stands, and `last_index`,
//! where the previous stop was. Aggregates cover the window between them. The first
//! window of a traversal includes index 0, every later window starts one past the
//! previous stop, so consecutive windows never share a point.

use std::ops::Range;

use crate::series::{SeriesKey, SeriesSource};
use crate::{LoopError, Result};

/// Returned by [`WindowCursor::max`] when there is nothing to take a maximum of.
pub const NO_DATA: f64 = f64::NEG_INFINITY;

#[derive(Clone, Debug)]
pub struct WindowCursor<'a, S: SeriesSource + ?Sized> {
    source: &'a S,
    index: usize,
    last_index: usize,
    step: usize,
    length: usize,
}

impl<'a, S: SeriesSource + ?Sized> WindowCursor<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            index: 0,
            last_index: 0,
            step: 1,
            length: source.count(),
        }
    }

    pub fn source(&self) -> &'a S {
        self.source
    }

    pub fn count(&self) -> usize {
        self.length
    }

    /// Move back to the first point. The step size is kept.
    pub fn reset(&mut self) {
        self.index = 0;
        self.last_index = 0;
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn set_step(&mut self, step: usize) -> Result<()> {
        if step == 0 {
            return Err(LoopError::InvalidArgument("step size must be at least 1".into()));
        }
        self.step = step;
        Ok(())
    }

    fn last_position(&self) -> usize {
        self.length.saturating_sub(1)
    }

    /// Advance by the step size, clamping at the last point.
    ///
    /// Returns `false` once the last point is reached. Calling it again afterwards keeps
    /// `index` on the last point and collapses the window to that single point.
    pub fn advance(&mut self) -> bool {
        self.last_index = self.index;
        self.index = self.index.saturating_add(self.step);

        if self.index >= self.last_position() {
            self.index = self.last_position();
            return false;
        }

        true
    }

    pub fn at_end(&self) -> bool {
        self.index >= self.last_position()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn last_index(&self) -> usize {
        self.last_index
    }

    /// Jump to `index`. Not bounds checked; callers keep `index < count()`.
    pub fn goto_index(&mut self, index: usize) {
        self.last_index = self.index;
        self.index = index;
    }

    pub fn goto_end(&mut self) {
        self.goto_index(self.last_position());
    }

    /// Move forward point by point until `key` reaches `target` or the end is hit.
    ///
    /// `key` has to be non-decreasing along the traversal (cumulative distance or time);
    /// this is not checked. Fails without moving if the series is missing or if
    /// `target` lies below the value at the current index.
    pub fn seek_to(&mut self, key: SeriesKey, target: f64) -> Result<()> {
        if !self.source.has(key) {
            return Err(LoopError::UnknownSeries(key));
        }

        let current = self.current_value(key);
        if target.is_nan() || target < current {
            return Err(LoopError::InvalidTarget { target, current });
        }

        self.last_index = self.index;

        while !self.at_end() {
            self.index += 1;
            if self.source.value(self.index, key) >= target {
                break;
            }
        }

        Ok(())
    }

    /// Seek `amount` further along `key`, measured from the current value.
    ///
    /// From the first point `amount` is used as an absolute target.
    pub fn seek_by(&mut self, key: SeriesKey, amount: f64) -> Result<()> {
        let target = if self.index == 0 {
            amount
        } else {
            self.current_value(key) + amount
        };
        self.seek_to(key, target)
    }

    pub fn current_value(&self, key: SeriesKey) -> f64 {
        if self.source.has(key) {
            return self.source.value(self.index, key);
        }

        0.0
    }

    /// Change of `key` between the previous stop and the current index.
    pub fn delta(&self, key: SeriesKey) -> f64 {
        if self.source.has(key) {
            return self.source.value(self.index, key) - self.source.value(self.last_index, key);
        }

        0.0
    }

    /// First index covered by the current window.
    pub fn window_start(&self) -> usize {
        if self.last_index == 0 {
            0
        } else {
            self.last_index + 1
        }
    }

    /// Number of points covered by the current window.
    pub fn window_len(&self) -> usize {
        (self.index + 1).saturating_sub(self.window_start())
    }

    // Empty when the series is missing.
    fn window_range(&self, key: SeriesKey) -> Range<usize> {
        let start = self.window_start();
        if self.source.has(key) {
            start..self.index + 1
        } else {
            start..start
        }
    }

    pub fn sum(&self, key: SeriesKey) -> f64 {
        self.window_range(key)
            .map(|i| self.source.value(i, key))
            .fold(0.0, |acc, v| acc + v)
    }

    /// Largest value in the window, or [`NO_DATA`] if the series is missing or the window empty.
    pub fn max(&self, key: SeriesKey) -> f64 {
        self.try_max(key).unwrap_or(NO_DATA)
    }

    pub fn try_max(&self, key: SeriesKey) -> Option<f64> {
        self.window_range(key)
            .map(|i| self.source.value(i, key))
            .fold(None, |best, value| match best {
                Some(b) if b >= value => Some(b),
                _ => Some(value),
            })
    }

    /// Mean over the window; `0.0` while the window is degenerate (`last_index >= index`).
    pub fn average(&self, key: SeriesKey) -> f64 {
        if self.last_index >= self.index {
            return 0.0;
        }

        let points = self.index - self.last_index + usize::from(self.last_index == 0);
        self.sum(key) / points as f64
    }

    /// Owned copy of the window's values.
    pub fn slice(&self, key: SeriesKey) -> Vec<f64> {
        if !self.source.has(key) {
            return Vec::new();
        }

        let start = self.window_start();
        self.source
            .series(key)
            .get(start..=self.index)
            .map(<[f64]>::to_vec)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::Route;

    fn distance_route() -> Route {
        let distance = vec![0.0, 1.0, 3.0, 6.0, 10.0];
        Route::from_columns("test", vec![(SeriesKey::Distance, distance)]).unwrap()
    }

    #[test]
    fn new_cursor_starts_at_zero_with_unit_step() {
        let route = distance_route();
        let cursor = WindowCursor::new(&route);
        assert_eq!(cursor.count(), 5);
        assert_eq!(cursor.index(), 0);
        assert_eq!(cursor.last_index(), 0);
        assert_eq!(cursor.step(), 1);
        assert!(!cursor.at_end());
    }

    #[test]
    fn unit_steps_visit_every_index() {
        let route = distance_route();
        let mut cursor = WindowCursor::new(&route);
        let mut visited = vec![cursor.index()];
        loop {
            let more = cursor.advance();
            visited.push(cursor.index());
            if !more {
                break;
            }
        }
        assert_eq!(visited, vec![0, 1, 2, 3, 4]);
        assert!(cursor.at_end());
    }

    #[test]
    fn large_step_clamps_to_last_index() {
        let route = distance_route();
        let mut cursor = WindowCursor::new(&route);
        cursor.set_step(3).unwrap();
        assert!(cursor.advance());
        assert_eq!(cursor.index(), 3);
        assert!(!cursor.advance());
        assert_eq!(cursor.index(), 4);

        cursor.reset();
        cursor.set_step(100).unwrap();
        assert!(!cursor.advance());
        assert_eq!(cursor.index(), 4);
    }

    #[test]
    fn advancing_past_the_end_collapses_the_window() {
        let route = distance_route();
        let mut cursor = WindowCursor::new(&route);
        cursor.goto_end();
        assert!(!cursor.advance());
        assert_eq!((cursor.index(), cursor.last_index()), (4, 4));
        assert!(!cursor.advance());
        assert_eq!((cursor.index(), cursor.last_index()), (4, 4));
        assert_eq!(cursor.window_len(), 0);
        assert_eq!(cursor.average(SeriesKey::Distance), 0.0);
    }

    #[test]
    fn reset_keeps_step() {
        let route = distance_route();
        let mut cursor = WindowCursor::new(&route);
        cursor.set_step(2).unwrap();
        cursor.advance();
        cursor.reset();
        assert_eq!((cursor.index(), cursor.last_index()), (0, 0));
        assert_eq!(cursor.step(), 2);
    }

    #[test]
    fn zero_step_is_rejected() {
        let route = distance_route();
        let mut cursor = WindowCursor::new(&route);
        cursor.set_step(4).unwrap();
        assert!(matches!(
            cursor.set_step(0),
            Err(LoopError::InvalidArgument(_))
        ));
        assert_eq!(cursor.step(), 4);
    }

    #[test]
    fn goto_index_records_previous_position() {
        let route = distance_route();
        let mut cursor = WindowCursor::new(&route);
        cursor.goto_index(2);
        cursor.goto_index(3);
        assert_eq!((cursor.index(), cursor.last_index()), (3, 2));
        assert_eq!(cursor.window_start(), 3);
        assert_eq!(cursor.slice(SeriesKey::Distance), vec![6.0]);
    }

    #[test]
    fn window_start_includes_zero_only_for_first_window() {
        let route = distance_route();
        let mut cursor = WindowCursor::new(&route);
        assert_eq!(cursor.window_start(), 0);
        cursor.advance();
        assert_eq!(cursor.window_start(), 0);
        cursor.advance();
        assert_eq!(cursor.last_index(), 1);
        assert_eq!(cursor.window_start(), 2);
    }

    #[test]
    fn aggregates_follow_window_edges() {
        let route = distance_route();
        let mut cursor = WindowCursor::new(&route);
        cursor.set_step(2).unwrap();

        cursor.advance();
        assert_eq!(cursor.slice(SeriesKey::Distance), vec![0.0, 1.0, 3.0]);
        assert!((cursor.sum(SeriesKey::Distance) - 4.0).abs() < 1e-9);
        assert!((cursor.average(SeriesKey::Distance) - 4.0 / 3.0).abs() < 1e-9);
        assert_eq!(cursor.max(SeriesKey::Distance), 3.0);

        cursor.advance();
        assert_eq!(cursor.slice(SeriesKey::Distance), vec![6.0, 10.0]);
        assert!((cursor.sum(SeriesKey::Distance) - 16.0).abs() < 1e-9);
        assert!((cursor.average(SeriesKey::Distance) - 8.0).abs() < 1e-9);
        assert_eq!(cursor.try_max(SeriesKey::Distance), Some(10.0));
        assert!((cursor.delta(SeriesKey::Distance) - 7.0).abs() < 1e-9);
    }

    #[test]
    fn missing_series_aggregates_are_neutral() {
        let route = distance_route();
        let mut cursor = WindowCursor::new(&route);
        cursor.advance();
        assert_eq!(cursor.current_value(SeriesKey::Elevation), 0.0);
        assert_eq!(cursor.delta(SeriesKey::Elevation), 0.0);
        assert_eq!(cursor.sum(SeriesKey::Elevation), 0.0);
        assert_eq!(cursor.average(SeriesKey::Elevation), 0.0);
        assert_eq!(cursor.max(SeriesKey::Elevation), NO_DATA);
        assert_eq!(cursor.try_max(SeriesKey::Elevation), None);
        assert!(cursor.slice(SeriesKey::Elevation).is_empty());
    }

    #[test]
    fn empty_windows_sum_to_positive_zero() {
        let route = distance_route();
        let mut cursor = WindowCursor::new(&route);
        cursor.goto_index(3);
        cursor.goto_index(1);
        assert_eq!(cursor.window_len(), 0);
        assert!(cursor.sum(SeriesKey::Distance).is_sign_positive());
        assert!(cursor.sum(SeriesKey::Time).is_sign_positive());
        assert_eq!(cursor.max(SeriesKey::Distance), NO_DATA);
        assert!(cursor.slice(SeriesKey::Distance).is_empty());
    }

    #[test]
    fn seek_to_stops_at_first_value_reaching_target() {
        let route = distance_route();
        let mut cursor = WindowCursor::new(&route);
        cursor.seek_to(SeriesKey::Distance, 4.0).unwrap();
        assert_eq!((cursor.index(), cursor.last_index()), (3, 0));

        cursor.seek_to(SeriesKey::Distance, 50.0).unwrap();
        assert_eq!((cursor.index(), cursor.last_index()), (4, 3));
        assert!(cursor.at_end());
    }

    #[test]
    fn seek_to_at_end_stays_in_bounds() {
        let route = distance_route();
        let mut cursor = WindowCursor::new(&route);
        cursor.goto_end();
        cursor.seek_to(SeriesKey::Distance, 10.0).unwrap();
        assert_eq!((cursor.index(), cursor.last_index()), (4, 4));
    }

    #[test]
    fn seek_to_rejects_missing_series_without_moving() {
        let route = distance_route();
        let mut cursor = WindowCursor::new(&route);
        cursor.advance();
        let err = cursor.seek_to(SeriesKey::Time, 5.0).unwrap_err();
        assert_eq!(err, LoopError::UnknownSeries(SeriesKey::Time));
        assert_eq!((cursor.index(), cursor.last_index()), (1, 0));
    }

    #[test]
    fn seek_to_rejects_nan_target() {
        let route = distance_route();
        let mut cursor = WindowCursor::new(&route);
        assert!(matches!(
            cursor.seek_to(SeriesKey::Distance, f64::NAN),
            Err(LoopError::InvalidTarget { .. })
        ));
        assert_eq!(cursor.index(), 0);
    }

    #[test]
    fn seek_by_is_relative_after_first_stop() {
        let route = distance_route();
        let mut cursor = WindowCursor::new(&route);
        cursor.seek_by(SeriesKey::Distance, 2.0).unwrap();
        assert_eq!(cursor.index(), 2);
        cursor.seek_by(SeriesKey::Distance, 2.0).unwrap();
        assert_eq!(cursor.index(), 3);
        assert_eq!(cursor.last_index(), 2);
    }

    #[test]
    fn empty_source_is_immediately_at_end() {
        let route = Route::new("empty");
        let mut cursor = WindowCursor::new(&route);
        assert!(cursor.at_end());
        assert!(!cursor.advance());
        assert_eq!(cursor.index(), 0);
    }
}
