//! Active-layer boundary selection from masked isotherm crossings
//!
//! The selection rule works on one analysis window (typically a year):
//!
//! 1. crossings above the ground surface are masked,
//! 2. the permafrost band is located and crossings below it are masked,
//! 3. a supra-permafrost talik is tested for by comparing the first and
//!    second crossings above the band middle,
//! 4. the first crossing above the band middle is taken, or the second one
//!    when a talik sits between the surface and the permafrost table.

use super::profile::permafrost_band;
use super::{nan_max, nan_min};
use crate::errors::{FtuError, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use std::ops::Range;

/// Offset below the permafrost middle used when picking the final crossing
pub const DEFAULT_CUTOFF_EPSILON: f64 = 0.01;

/// Isotherm crossings per time step; `None` marks a missing crossing
#[derive(Debug, Clone, PartialEq)]
pub struct IsothermSet {
    cells: Array2<Option<f64>>,
}

impl IsothermSet {
    /// Wraps a `(time, isotherm)` array of optional crossings.
    pub fn new(cells: Array2<Option<f64>>) -> Self {
        Self { cells }
    }

    /// Builds a set where NaN entries are missing.
    pub fn from_nan(values: ArrayView2<f64>) -> Self {
        Self::new(values.mapv(|v| if v.is_nan() { None } else { Some(v) }))
    }

    /// Builds a set where NaN entries and entries equal to `fill` are missing.
    pub fn from_fill(values: ArrayView2<f64>, fill: f64) -> Self {
        Self::new(values.mapv(|v| {
            if v.is_nan() || v == fill {
                None
            } else {
                Some(v)
            }
        }))
    }

    pub fn cells(&self) -> ArrayView2<'_, Option<f64>> {
        self.cells.view()
    }

    pub fn n_steps(&self) -> usize {
        self.cells.nrows()
    }

    pub fn n_isotherms(&self) -> usize {
        self.cells.ncols()
    }

    /// Copy of the rows in `steps`.
    pub fn slice_steps(&self, steps: Range<usize>) -> Self {
        Self::new(self.cells.slice(ndarray::s![steps, ..]).to_owned())
    }

    /// Masks every crossing for which `predicate(step, value)` holds.
    pub fn mask_where<F>(&mut self, predicate: F)
    where
        F: Fn(usize, f64) -> bool,
    {
        for (step, mut row) in self.cells.axis_iter_mut(Axis(0)).enumerate() {
            for cell in row.iter_mut() {
                if matches!(*cell, Some(v) if predicate(step, v)) {
                    *cell = None;
                }
            }
        }
    }

    /// Masks crossings above the ground surface of their time step.
    pub fn mask_above_surface(&mut self, surface: ArrayView1<f64>) {
        self.mask_where(|step, v| v > surface[step]);
    }

    /// Masks crossings below `floor`.
    pub fn mask_below(&mut self, floor: f64) {
        self.mask_where(|_, v| v < floor);
    }

    /// The 1-indexed `k`-th lowest crossing at or above `cutoff`, per time step.
    ///
    /// Steps with fewer than `k` such crossings yield `None`.
    pub fn kth_above(&self, k: usize, cutoff: f64) -> Result<Array1<Option<f64>>> {
        if k == 0 {
            return Err(FtuError::invalid_input("isotherm rank is 1-indexed"));
        }

        Ok(self
            .cells
            .axis_iter(Axis(0))
            .map(|row| {
                let mut above: Vec<f64> = row
                    .iter()
                    .flatten()
                    .copied()
                    .filter(|&v| v >= cutoff)
                    .collect();
                above.sort_by(f64::total_cmp);
                above.get(k - 1).copied()
            })
            .collect())
    }

    /// Per time step, whether no crossing lies at or above `cutoff`.
    pub fn no_isotherm_above(&self, cutoff: f64) -> Array1<bool> {
        self.cells
            .axis_iter(Axis(0))
            .map(|row| !row.iter().flatten().any(|&v| v >= cutoff))
            .collect()
    }
}

/// Which crossing above the permafrost middle marks the active layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsothermRank {
    /// Lowest crossing: the thaw front itself
    First,
    /// Second crossing: skips the shallow crossing caused by a talik
    Second,
}

impl IsothermRank {
    /// 1-indexed rank
    pub const fn k(self) -> usize {
        match self {
            Self::First => 1,
            Self::Second => 2,
        }
    }
}

/// Tests for a supra-permafrost talik above `pf_middle`.
///
/// A talik is asserted when, over the whole window, every second crossing
/// lies above every first crossing. The returned value is the midpoint between
/// the lowest second crossing and the highest first crossing.
pub fn talik_test(isotherms: &IsothermSet, pf_middle: f64) -> Result<Option<f64>> {
    let first = isotherms.kth_above(1, pf_middle)?;
    let second = isotherms.kth_above(2, pf_middle)?;

    match (nan_min(second), nan_max(first)) {
        (Some(lowest_second), Some(highest_first)) if lowest_second > highest_first => {
            Ok(Some(0.5 * (lowest_second + highest_first)))
        }
        _ => Ok(None),
    }
}

/// Chooses the crossing rank from the per-step emptiness flags and the talik test.
///
/// Either a step without any crossing above the permafrost middle or a missing
/// talik selects [`IsothermRank::First`].
pub fn select_rank(no_isotherm: ArrayView1<bool>, talik: Option<f64>) -> Result<IsothermRank> {
    if no_isotherm.iter().any(|&empty| empty) || talik.is_none() {
        return Ok(IsothermRank::First);
    }

    match talik {
        Some(boundary) if !boundary.is_nan() => Ok(IsothermRank::Second),
        _ => Err(FtuError::unsupported(
            "cannot identify any 'talik' nodes above permafrost",
        )),
    }
}

/// Inputs for one analysis window
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    /// `(time, level)` temperatures in Celsius
    pub temperature: ArrayView2<'a, f64>,
    /// Level positions
    pub heights: ArrayView1<'a, f64>,
    /// `(time, isotherm)` crossings
    pub isotherms: &'a IsothermSet,
    /// Ground surface height per time step
    pub surface: ArrayView1<'a, f64>,
}

impl<'a> Window<'a> {
    /// Bundles the window inputs after checking that their shapes agree.
    pub fn new(
        temperature: ArrayView2<'a, f64>,
        heights: ArrayView1<'a, f64>,
        isotherms: &'a IsothermSet,
        surface: ArrayView1<'a, f64>,
    ) -> Result<Self> {
        let steps = temperature.nrows();
        if temperature.ncols() != heights.len() {
            return Err(FtuError::invalid_input(format!(
                "temperature has {} levels but the height axis has {}",
                temperature.ncols(),
                heights.len()
            )));
        }
        if isotherms.n_steps() != steps || surface.len() != steps {
            return Err(FtuError::invalid_input(format!(
                "time steps disagree: temperature {}, isotherms {}, surface {}",
                steps,
                isotherms.n_steps(),
                surface.len()
            )));
        }

        Ok(Self {
            temperature,
            heights,
            isotherms,
            surface,
        })
    }

    /// Selected active-layer crossing for every time step of the window.
    pub fn select(&self, cutoff_epsilon: f64) -> Result<Array1<Option<f64>>> {
        let mut iso = self.isotherms.clone();
        iso.mask_above_surface(self.surface);

        let band = permafrost_band(self.temperature, self.heights)
            .ok_or_else(|| FtuError::unsupported("missing observations within permafrost"))?;
        let pf_middle = band.middle();

        iso.mask_below(band.bottom);
        let talik = talik_test(&iso, pf_middle)?;
        let rank = select_rank(iso.no_isotherm_above(pf_middle).view(), talik)?;
        log::debug!(
            "permafrost middle {:.3}, talik {:?}, taking isotherm #{}",
            pf_middle,
            talik,
            rank.k()
        );

        iso.kth_above(rank.k(), pf_middle - cutoff_epsilon)
    }
}

/// Lowest selected crossing over the window.
pub fn single_alt(window: &Window<'_>) -> Result<Option<f64>> {
    Ok(nan_min(window.select(DEFAULT_CUTOFF_EPSILON)?))
}

/// The selected crossing for every time step of the window.
pub fn continuous_alt(window: &Window<'_>) -> Result<Array1<Option<f64>>> {
    window.select(DEFAULT_CUTOFF_EPSILON)
}
