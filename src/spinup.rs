//! Spin-up diagnostics: how temperature profiles evolve towards equilibrium

use crate::errors::{FtuError, Result};
use chrono::NaiveDateTime;
use ndarray::{Array1, ArrayView2, Axis};

/// One temperature profile picked from a spin-up run
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSample {
    pub time: NaiveDateTime,
    pub values: Array1<f64>,
}

/// Picks `n` evenly strided profiles from the last `percent` % of a run.
///
/// The stride is the number of remaining steps divided by `n`, so the samples
/// start at the first step of the tail.
pub fn sample_profiles(
    times: &[NaiveDateTime],
    values: ArrayView2<f64>,
    percent: u32,
    n: usize,
) -> Result<Vec<ProfileSample>> {
    if times.len() != values.nrows() {
        return Err(FtuError::invalid_input(format!(
            "{} timestamps for {} profiles",
            times.len(),
            values.nrows()
        )));
    }
    if percent > 100 {
        return Err(FtuError::invalid_input(format!(
            "percentage must be at most 100, got {}",
            percent
        )));
    }

    let skip = (100 - percent as usize) * (times.len() / 100);
    let remaining = times.len() - skip;
    if n == 0 || remaining < n {
        return Err(FtuError::invalid_input(format!(
            "cannot take {} profiles from {} time steps",
            n, remaining
        )));
    }

    let stride = remaining / n;
    Ok((0..n)
        .map(|i| {
            let step = skip + i * stride;
            ProfileSample {
                time: times[step],
                values: values.index_axis(Axis(0), step).to_owned(),
            }
        })
        .collect())
}

/// Temperature of the deepest level over time.
pub fn deepest_level(values: ArrayView2<f64>) -> Result<Array1<f64>> {
    match values.ncols() {
        0 => Err(FtuError::invalid_input("profile has no levels")),
        k => Ok(values.column(k - 1).to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use ndarray::Array2;

    fn run(n: usize) -> (Vec<NaiveDateTime>, Array2<f64>) {
        let start = NaiveDate::from_ymd_opt(1900, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let times = (0..n).map(|i| start + Duration::days(i as i64)).collect();
        let values = Array2::from_shape_fn((n, 3), |(t, k)| (t * 10 + k) as f64);
        (times, values)
    }

    #[test]
    fn samples_whole_run() {
        let (times, values) = run(200);
        let samples = sample_profiles(&times, values.view(), 100, 10).unwrap();
        assert_eq!(samples.len(), 10);
        assert_eq!(samples[0].time, times[0]);
        assert_eq!(samples[1].time, times[20]);
        assert_eq!(samples[9].values[0], 1800.0);
    }

    #[test]
    fn samples_tail_only() {
        let (times, values) = run(200);
        // last 10 % = 20 steps, stride 2
        let samples = sample_profiles(&times, values.view(), 10, 10).unwrap();
        assert_eq!(samples[0].time, times[180]);
        assert_eq!(samples[9].time, times[198]);
    }

    #[test]
    fn too_many_profiles_is_invalid() {
        let (times, values) = run(5);
        assert!(sample_profiles(&times, values.view(), 100, 6).is_err());
        assert!(sample_profiles(&times, values.view(), 100, 0).is_err());
    }

    #[test]
    fn deepest_level_is_last_column() {
        let (_, values) = run(4);
        assert_eq!(deepest_level(values.view()).unwrap().to_vec(), vec![2.0, 12.0, 22.0, 32.0]);
    }
}
