//! Trailing rolling minimum over a time-indexed series

use crate::errors::{FtuError, Result};
use chrono::{Duration, NaiveDateTime};
use std::collections::VecDeque;

/// A trailing, time-based window `(t - length, t]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingWindow {
    /// Span of the window
    pub length: Duration,
    /// Present observations required for a value to be produced
    pub min_periods: usize,
}

impl Default for RollingWindow {
    fn default() -> Self {
        Self::days(365)
    }
}

impl RollingWindow {
    /// A window of `days` days requiring a single observation.
    pub fn days(days: i64) -> Self {
        Self {
            length: Duration::days(days),
            min_periods: 1,
        }
    }

    pub fn with_min_periods(mut self, min_periods: usize) -> Self {
        self.min_periods = min_periods;
        self
    }

    /// Rolling minimum of `values` indexed by non-decreasing `times`.
    ///
    /// Missing values are skipped. A position with fewer than `min_periods`
    /// present values in its window (and always one with none) is missing.
    pub fn min(&self, times: &[NaiveDateTime], values: &[Option<f64>]) -> Result<Vec<Option<f64>>> {
        if times.len() != values.len() {
            return Err(FtuError::invalid_input(format!(
                "{} timestamps for {} values",
                times.len(),
                values.len()
            )));
        }
        if times.windows(2).any(|w| w[1] < w[0]) {
            return Err(FtuError::invalid_input("timestamps must be non-decreasing"));
        }

        let required = self.min_periods.max(1);
        // indices of present values, increasing in value from front to back
        let mut candidates: VecDeque<usize> = VecDeque::new();
        let mut start = 0;
        let mut present = 0;
        let mut out = Vec::with_capacity(values.len());

        for (i, (&t, &value)) in times.iter().zip(values).enumerate() {
            if let Some(v) = value.filter(|v| !v.is_nan()) {
                while candidates
                    .back()
                    .is_some_and(|&j| values[j].is_some_and(|w| w >= v))
                {
                    candidates.pop_back();
                }
                candidates.push_back(i);
                present += 1;
            }

            let earliest = t - self.length;
            while start <= i && times[start] <= earliest {
                if values[start].is_some_and(|v| !v.is_nan()) {
                    present -= 1;
                }
                if candidates.front() == Some(&start) {
                    candidates.pop_front();
                }
                start += 1;
            }

            out.push(if present >= required {
                candidates.front().and_then(|&j| values[j])
            } else {
                None
            });
        }

        Ok(out)
    }
}
