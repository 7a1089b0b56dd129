//! Temperature-profile helpers: units, vertical axes and the permafrost band

use crate::errors::{FtuError, Result};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

/// Offset between Kelvin and Celsius
pub const KELVIN_OFFSET: f64 = 273.15;

/// Profiles whose maximum exceeds this value are taken to be in Kelvin
pub const KELVIN_THRESHOLD: f64 = 100.0;

/// Returns the profile in Celsius.
///
/// If the largest non-NaN value is above [`KELVIN_THRESHOLD`] the whole array
/// is shifted by [`KELVIN_OFFSET`]; otherwise it is returned unchanged.
pub fn ensure_units_celsius(temperature: ArrayView2<f64>) -> Array2<f64> {
    let max = super::nan_max(temperature.iter().map(|&t| Some(t)));
    match max {
        Some(m) if m > KELVIN_THRESHOLD => temperature.mapv(|t| t - KELVIN_OFFSET),
        _ => temperature.to_owned(),
    }
}

/// Converts fixed observation depths to a time-varying height axis.
///
/// Returns a `(time, level)` array with `h[t, k] = surface[t] - depths[k]`.
pub fn depth_to_height(depths: ArrayView1<f64>, surface: ArrayView1<f64>) -> Array2<f64> {
    Array2::from_shape_fn((surface.len(), depths.len()), |(t, k)| {
        surface[t] - depths[k]
    })
}

/// Inverse of [`depth_to_height`]: `d[t, k] = surface[t] - h[t, k]`.
pub fn height_to_depth(heights: ArrayView2<f64>, surface: ArrayView1<f64>) -> Result<Array2<f64>> {
    if heights.nrows() != surface.len() {
        return Err(FtuError::invalid_input(format!(
            "height array has {} time steps but surface series has {}",
            heights.nrows(),
            surface.len()
        )));
    }

    Ok(Array2::from_shape_fn(heights.raw_dim(), |(t, k)| {
        surface[t] - heights[[t, k]]
    }))
}

/// Vertical extent of the levels that stay frozen for a whole window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PermafrostBand {
    /// Lowest frozen level
    pub bottom: f64,
    /// Highest frozen level
    pub top: f64,
}

impl PermafrostBand {
    /// Central permafrost position, halfway between the band extremes
    pub fn middle(&self) -> f64 {
        0.5 * (self.top + self.bottom)
    }
}

/// Levels whose temperature is at or below 0 °C at every time step.
///
/// NaN temperatures never count as frozen.
pub fn frozen_levels(temperature: ArrayView2<f64>, heights: ArrayView1<f64>) -> Vec<f64> {
    temperature
        .axis_iter(Axis(1))
        .zip(heights.iter())
        .filter(|(column, _)| column.iter().all(|&t| t <= 0.0))
        .map(|(_, &z)| z)
        .collect()
}

/// Finds the permafrost band of a window, if any level stays frozen throughout.
pub fn permafrost_band(
    temperature: ArrayView2<f64>,
    heights: ArrayView1<f64>,
) -> Option<PermafrostBand> {
    let frozen = frozen_levels(temperature, heights);
    let bottom = super::nan_min(frozen.iter().map(|&z| Some(z)))?;
    let top = super::nan_max(frozen.iter().map(|&z| Some(z)))?;
    Some(PermafrostBand { bottom, top })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array1};

    #[test]
    fn kelvin_profiles_are_shifted() {
        let t = array![[270.15, 275.15], [272.0, 280.0]];
        let c = ensure_units_celsius(t.view());
        for (out, inp) in c.iter().zip(t.iter()) {
            assert_eq!(*out, inp - KELVIN_OFFSET);
        }
    }

    #[test]
    fn celsius_profiles_are_untouched() {
        let t = array![[-3.0, 100.0], [f64::NAN, 4.0]];
        let c = ensure_units_celsius(t.view());
        assert_eq!(c[[0, 0]], -3.0);
        assert_eq!(c[[0, 1]], 100.0);
        assert!(c[[1, 0]].is_nan());
    }

    #[test]
    fn nan_does_not_trigger_kelvin_detection() {
        let t = array![[f64::NAN, 1.0]];
        assert_eq!(ensure_units_celsius(t.view())[[0, 1]], 1.0);
    }

    #[test]
    fn depth_height_round_trip_is_exact() {
        let depths = array![0.0, 0.25, 0.5, 1.0, 2.5, 10.0];
        let surface = Array1::from_elem(4, 12.0);
        let heights = depth_to_height(depths.view(), surface.view());
        assert_eq!(heights.dim(), (4, 6));
        assert_eq!(heights[[2, 3]], 11.0);

        let back = height_to_depth(heights.view(), surface.view()).unwrap();
        for row in back.rows() {
            assert_eq!(row, depths);
        }
    }

    #[test]
    fn height_to_depth_checks_lengths() {
        let heights = Array2::<f64>::zeros((3, 2));
        let surface = Array1::<f64>::zeros(2);
        assert!(matches!(
            height_to_depth(heights.view(), surface.view()),
            Err(FtuError::InvalidInput { .. })
        ));
    }

    #[test]
    fn fully_frozen_window_band_spans_all_levels() {
        let heights = array![-0.5, -1.0, -2.0, -4.0];
        let t = Array2::from_elem((10, 4), -1.2);
        let band = permafrost_band(t.view(), heights.view()).unwrap();
        assert_eq!(band.top, -0.5);
        assert_eq!(band.bottom, -4.0);
        assert_abs_diff_eq!(band.middle(), 0.5 * (-0.5 + -4.0));
    }

    #[test]
    fn band_excludes_levels_that_thaw_once() {
        let heights = array![-0.5, -1.0, -2.0];
        let mut t = Array2::from_elem((5, 3), -1.0);
        t[[3, 0]] = 2.0;
        let band = permafrost_band(t.view(), heights.view()).unwrap();
        assert_eq!(band.top, -1.0);
        assert_eq!(band.bottom, -2.0);
    }

    #[test]
    fn no_frozen_level_gives_no_band() {
        let heights = array![-0.5, -1.0];
        let t = array![[1.0, -1.0], [1.0, 0.5]];
        assert!(permafrost_band(t.view(), heights.view()).is_none());
    }
}
