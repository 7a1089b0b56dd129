use approx::assert_relative_eq;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use ftu::isotherms::{
    extract_alt_isotherm, extract_alt_isotherm_depth, extract_alt_isotherm_with, ExtractorConfig,
    IsothermSet, RollingWindow,
};
use ndarray::{Array1, Array2};

const LEVELS: usize = 12;

fn daily(year: i32, n: usize) -> Vec<NaiveDateTime> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (0..n).map(|i| start + Duration::days(i as i64)).collect()
}

/// Heights -0.25, -0.5, ..., -3.0 below a surface at 0.
fn heights() -> Array1<f64> {
    Array1::from_iter((0..LEVELS).map(|k| -0.25 * (k + 1) as f64))
}

/// Depths 0.25, 0.5, ..., 3.0 below the surface.
fn depths() -> Array1<f64> {
    Array1::from_iter((0..LEVELS).map(|k| 0.25 * (k + 1) as f64))
}

/// Thawed above -2 m, frozen from -2.25 m down.
fn temperature(n: usize) -> Array2<f64> {
    let h = heights();
    Array2::from_shape_fn((n, LEVELS), |(_, k)| if h[k] < -2.0 { -1.0 } else { 2.0 })
}

/// One crossing per step: `first` for the first 365 steps, `second` after.
fn isotherms(n: usize, first: f64, second: f64) -> IsothermSet {
    let values = Array2::from_shape_fn((n, 1), |(t, _)| if t < 365 { first } else { second });
    IsothermSet::from_nan(values.view())
}

#[test]
fn two_years_follow_the_deepening_thaw_front() {
    let n = 730;
    let times = daily(2001, n);
    let series = extract_alt_isotherm(
        temperature(n).view(),
        &times,
        &isotherms(n, -1.0, -1.5),
        heights().view(),
        Array1::zeros(n).view(),
    )
    .expect("extraction failed");

    assert!(series.failures.is_empty());
    assert_eq!(series.len(), n);
    assert_relative_eq!(series.trace[0].unwrap(), -1.0);
    assert_relative_eq!(series.trace[729].unwrap(), -1.5);

    assert_relative_eq!(series.alt[0].unwrap(), -1.0);
    assert_relative_eq!(series.alt[364].unwrap(), -1.0);
    assert_relative_eq!(series.alt[365].unwrap(), -1.5);
    assert_relative_eq!(series.alt[729].unwrap(), -1.5);
}

#[test]
fn shallower_second_year_waits_for_the_window_to_pass() {
    let n = 730;
    let times = daily(2001, n);
    let series = extract_alt_isotherm(
        temperature(n).view(),
        &times,
        &isotherms(n, -1.5, -1.0),
        heights().view(),
        Array1::zeros(n).view(),
    )
    .unwrap();

    // (t - 365 days, t] still holds day 364 on day 728
    assert_relative_eq!(series.alt[728].unwrap(), -1.5);
    assert_relative_eq!(series.alt[729].unwrap(), -1.0);
}

#[test]
fn partial_trailing_year_stays_missing() {
    let n = 400;
    let times = daily(2001, n);
    let series = extract_alt_isotherm(
        temperature(n).view(),
        &times,
        &isotherms(n, -1.0, -1.0),
        heights().view(),
        Array1::zeros(n).view(),
    )
    .unwrap();

    assert!(series.trace[..365].iter().all(Option::is_some));
    assert!(series.trace[365..].iter().all(Option::is_none));
    // the rolling minimum still carries the last complete year forward
    assert_relative_eq!(series.alt[399].unwrap(), -1.0);
}

#[test]
fn thawed_year_is_recorded_and_left_missing() {
    let n = 730;
    let times = daily(2001, n);
    let mut temperature = temperature(n);
    for t in 365..n {
        temperature.row_mut(t).fill(3.0);
    }

    let series = extract_alt_isotherm(
        temperature.view(),
        &times,
        &isotherms(n, -1.0, -1.0),
        heights().view(),
        Array1::zeros(n).view(),
    )
    .unwrap();

    assert_eq!(series.failures.len(), 1);
    let failure = &series.failures[0];
    assert_eq!(failure.steps, 365..730);
    assert!(failure.label.contains("2002"));
    assert!(series.trace[365..].iter().all(Option::is_none));
    assert!(series.alt[729].is_none());
    assert_relative_eq!(series.alt[400].unwrap(), -1.0);
}

#[test]
fn kelvin_input_is_normalised() {
    let n = 365;
    let times = daily(2001, n);
    let kelvin = temperature(n).mapv(|t| t + 273.15);
    let series = extract_alt_isotherm(
        kelvin.view(),
        &times,
        &isotherms(n, -1.25, -1.25),
        heights().view(),
        Array1::zeros(n).view(),
    )
    .unwrap();

    assert!(series.failures.is_empty());
    assert_relative_eq!(series.alt[200].unwrap(), -1.25);
}

#[test]
fn custom_blocks_and_window() {
    let n = 730;
    let times = daily(2001, n);
    let config = ExtractorConfig {
        block_len: 73,
        rolling: RollingWindow::days(1),
        ..ExtractorConfig::default()
    };
    let series = extract_alt_isotherm_with(
        temperature(n).view(),
        &times,
        &isotherms(n, -1.5, -1.0),
        heights().view(),
        Array1::zeros(n).view(),
        &config,
    )
    .unwrap();

    // a one-day window leaves the trace unchanged
    assert_eq!(series.alt, series.trace);
    assert_relative_eq!(series.alt[729].unwrap(), -1.0);
}

#[test]
fn mismatched_inputs_are_rejected() {
    let times = daily(2001, 365);
    let result = extract_alt_isotherm(
        temperature(364).view(),
        &times,
        &isotherms(365, -1.0, -1.0),
        heights().view(),
        Array1::zeros(365).view(),
    );
    assert!(result.is_err());
}

#[test]
fn depth_variant_reports_thickness_below_surface() {
    let n = 730;
    let times = daily(2001, n);

    let series = extract_alt_isotherm_depth(
        temperature(n).view(),
        &times,
        &isotherms(n, -1.0, -1.5),
        depths().view(),
        Array1::zeros(n).view(),
    )
    .unwrap();

    assert!(series.failures.is_empty());
    assert_relative_eq!(series.alt[0].unwrap(), 1.0);
    assert_relative_eq!(series.alt[364].unwrap(), 1.0);
    assert_relative_eq!(series.alt[365].unwrap(), 1.5);
    assert_relative_eq!(series.alt[729].unwrap(), 1.5);
}

#[test]
fn depth_variant_processes_the_final_partial_year() {
    let n = 400;
    let times = daily(2001, n);

    let series = extract_alt_isotherm_depth(
        temperature(n).view(),
        &times,
        &isotherms(n, -1.0, -1.5),
        depths().view(),
        Array1::zeros(n).view(),
    )
    .unwrap();

    assert_relative_eq!(series.trace[399].unwrap(), -1.5);
    assert_relative_eq!(series.alt[399].unwrap(), 1.5);
}

#[test]
fn depth_variant_follows_a_rising_surface() {
    let n = 730;
    let times = daily(2001, n);
    let surface = Array1::from_shape_fn(n, |t| if t < 365 { 10.0 } else { 10.5 });
    let crossings = Array2::from_shape_fn((n, 1), |(t, _)| surface[t] - 1.0);

    let series = extract_alt_isotherm_depth(
        temperature(n).view(),
        &times,
        &IsothermSet::from_nan(crossings.view()),
        depths().view(),
        surface.view(),
    )
    .unwrap();

    assert!(series.failures.is_empty());
    assert_relative_eq!(series.trace[0].unwrap(), 9.0);
    assert_relative_eq!(series.trace[729].unwrap(), 9.5);

    assert_relative_eq!(series.alt[0].unwrap(), 1.0);
    assert_relative_eq!(series.alt[364].unwrap(), 1.0);
    // the rolling minimum still holds the first year's crossing height
    assert_relative_eq!(series.alt[365].unwrap(), 1.5);
    assert_relative_eq!(series.alt[729].unwrap(), 1.0);
}

#[test]
fn depth_variant_takes_the_axis_from_the_last_day_of_each_year() {
    let n = 365;
    let times = daily(2001, n);
    // the surface jumps on the last day, lifting the permafrost middle to 8.375
    let surface = Array1::from_shape_fn(n, |t| if t == n - 1 { 11.0 } else { 10.0 });
    let crossings = Array2::from_elem((n, 1), 8.2);

    let series = extract_alt_isotherm_depth(
        temperature(n).view(),
        &times,
        &IsothermSet::from_nan(crossings.view()),
        depths().view(),
        surface.view(),
    )
    .unwrap();

    // 8.2 lies below the middle of the year's band, so nothing is selected
    assert!(series.failures.is_empty());
    assert!(series.trace.iter().all(Option::is_none));
    assert!(series.alt.iter().all(Option::is_none));
}
