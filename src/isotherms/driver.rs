//! Yearly drivers turning multi-year simulations into an ALT series
//!
//! The series is cut into independent blocks (365-step blocks, or calendar
//! years for the depth variant). Each block is run through the selection rule
//! in parallel, failed blocks are recorded and left missing, and a trailing
//! rolling minimum is applied to the reassembled trace.

use super::profile::{depth_to_height, ensure_units_celsius};
use super::rolling::RollingWindow;
use super::selection::{IsothermSet, Window, DEFAULT_CUTOFF_EPSILON};
use crate::errors::{FtuError, Result};
use chrono::{Datelike, NaiveDateTime};
use log::{info, warn};
use ndarray::{s, Array1, ArrayView1, ArrayView2};
use rayon::prelude::*;
use std::ops::Range;

/// Number of time steps in one block of the step-based driver
pub const YEAR_BLOCK_LEN: usize = 365;

/// Tunables of the ALT drivers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractorConfig {
    /// Time steps per block for [`extract_alt_isotherm`]
    pub block_len: usize,
    /// Offset below the permafrost middle when picking the crossing
    pub cutoff_epsilon: f64,
    /// Rolling minimum applied to the assembled trace
    pub rolling: RollingWindow,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            block_len: YEAR_BLOCK_LEN,
            cutoff_epsilon: DEFAULT_CUTOFF_EPSILON,
            rolling: RollingWindow::default(),
        }
    }
}

/// A block whose active layer could not be determined
#[derive(Debug, Clone, PartialEq)]
pub struct BlockFailure {
    pub steps: Range<usize>,
    pub label: String,
    pub reason: String,
}

/// Output of the yearly drivers
#[derive(Debug, Clone)]
pub struct AltSeries {
    pub times: Vec<NaiveDateTime>,
    /// Selected isotherm crossing per time step, before the rolling minimum
    pub trace: Vec<Option<f64>>,
    /// Active-layer series after the rolling minimum
    pub alt: Vec<Option<f64>>,
    /// Blocks left missing, in time order
    pub failures: Vec<BlockFailure>,
}

impl AltSeries {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// ALT values with NaN for missing entries.
    pub fn alt_or_nan(&self) -> Vec<f64> {
        self.alt.iter().map(|v| v.unwrap_or(f64::NAN)).collect()
    }

    /// Trace values with NaN for missing entries.
    pub fn trace_or_nan(&self) -> Vec<f64> {
        self.trace.iter().map(|v| v.unwrap_or(f64::NAN)).collect()
    }
}

struct Block {
    steps: Range<usize>,
    label: String,
}

fn check_series(
    temperature: ArrayView2<f64>,
    times: &[NaiveDateTime],
    isotherms: &IsothermSet,
    surface: ArrayView1<f64>,
) -> Result<()> {
    let n = times.len();
    if temperature.nrows() != n || isotherms.n_steps() != n || surface.len() != n {
        return Err(FtuError::invalid_input(format!(
            "series lengths disagree: {} timestamps, temperature {}, isotherms {}, surface {}",
            n,
            temperature.nrows(),
            isotherms.n_steps(),
            surface.len()
        )));
    }
    if times.windows(2).any(|w| w[1] < w[0]) {
        return Err(FtuError::invalid_input("timestamps must be non-decreasing"));
    }
    Ok(())
}

/// Runs `select` on every block in parallel and reassembles the trace.
fn run_blocks<F>(
    n_steps: usize,
    blocks: Vec<Block>,
    select: F,
) -> Result<(Vec<Option<f64>>, Vec<BlockFailure>)>
where
    F: Fn(&Block) -> Result<Array1<Option<f64>>> + Sync,
{
    let outcomes: Vec<(Block, Result<Array1<Option<f64>>>)> = blocks
        .into_par_iter()
        .map(|block| {
            let outcome = select(&block);
            (block, outcome)
        })
        .collect();

    let mut trace = vec![None; n_steps];
    let mut failures = Vec::new();

    for (block, outcome) in outcomes {
        info!("{}", block.label);
        match outcome {
            Ok(selected) => {
                for (slot, value) in trace[block.steps.clone()].iter_mut().zip(selected.iter()) {
                    *slot = *value;
                }
            }
            Err(e) if e.is_window_failure() => {
                warn!("{}: {}", block.label, e);
                failures.push(BlockFailure {
                    steps: block.steps,
                    label: block.label,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    Ok((trace, failures))
}

/// ALT from a height axis, using 365-step blocks and default settings.
///
/// `heights` is the fixed level position axis and `isotherms` holds crossing
/// heights. Steps after the last complete block stay missing.
pub fn extract_alt_isotherm(
    temperature: ArrayView2<f64>,
    times: &[NaiveDateTime],
    isotherms: &IsothermSet,
    heights: ArrayView1<f64>,
    surface: ArrayView1<f64>,
) -> Result<AltSeries> {
    extract_alt_isotherm_with(
        temperature,
        times,
        isotherms,
        heights,
        surface,
        &ExtractorConfig::default(),
    )
}

/// [`extract_alt_isotherm`] with explicit settings.
pub fn extract_alt_isotherm_with(
    temperature: ArrayView2<f64>,
    times: &[NaiveDateTime],
    isotherms: &IsothermSet,
    heights: ArrayView1<f64>,
    surface: ArrayView1<f64>,
    config: &ExtractorConfig,
) -> Result<AltSeries> {
    check_series(temperature, times, isotherms, surface)?;
    if config.block_len == 0 {
        return Err(FtuError::invalid_input("block length must be positive"));
    }

    let temperature = ensure_units_celsius(temperature);
    let n = times.len();
    let blocks: Vec<Block> = (0..n / config.block_len)
        .map(|b| {
            let steps = b * config.block_len..(b + 1) * config.block_len;
            Block {
                label: format!("[{}] year {}", b, times[steps.start].year()),
                steps,
            }
        })
        .collect();

    let (trace, failures) = run_blocks(n, blocks, |block| {
        let steps = block.steps.clone();
        let iso = isotherms.slice_steps(steps.clone());
        let window = Window::new(
            temperature.slice(s![steps.clone(), ..]),
            heights,
            &iso,
            surface.slice(s![steps]),
        )?;
        window.select(config.cutoff_epsilon)
    })?;

    let alt = config.rolling.min(times, &trace)?;

    Ok(AltSeries {
        times: times.to_vec(),
        trace,
        alt,
        failures,
    })
}

/// Consecutive runs of timestamps sharing a calendar year.
fn calendar_years(times: &[NaiveDateTime]) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    for (i, t) in times.iter().enumerate() {
        let same_year = blocks
            .last()
            .is_some_and(|block| times[block.steps.start].year() == t.year());
        if same_year {
            if let Some(block) = blocks.last_mut() {
                block.steps.end = i + 1;
            }
        } else {
            blocks.push(Block {
                steps: i..i + 1,
                label: t.year().to_string(),
            });
        }
    }
    blocks
}

/// ALT from fixed observation depths, by calendar year and default settings.
///
/// Depths are turned into heights with the surface series; within a year the
/// axis of the year's last step is used. Isotherms are crossing heights, and
/// the result is reported as a depth below the surface.
pub fn extract_alt_isotherm_depth(
    temperature: ArrayView2<f64>,
    times: &[NaiveDateTime],
    isotherms: &IsothermSet,
    depths: ArrayView1<f64>,
    surface: ArrayView1<f64>,
) -> Result<AltSeries> {
    extract_alt_isotherm_depth_with(
        temperature,
        times,
        isotherms,
        depths,
        surface,
        &ExtractorConfig::default(),
    )
}

/// [`extract_alt_isotherm_depth`] with explicit settings.
///
/// `config.block_len` is unused: blocks are calendar years.
pub fn extract_alt_isotherm_depth_with(
    temperature: ArrayView2<f64>,
    times: &[NaiveDateTime],
    isotherms: &IsothermSet,
    depths: ArrayView1<f64>,
    surface: ArrayView1<f64>,
    config: &ExtractorConfig,
) -> Result<AltSeries> {
    check_series(temperature, times, isotherms, surface)?;

    let temperature = ensure_units_celsius(temperature);
    let heights = depth_to_height(depths, surface);

    let (mut trace, failures) = run_blocks(times.len(), calendar_years(times), |block| {
        let steps = block.steps.clone();
        let iso = isotherms.slice_steps(steps.clone());
        let window = Window::new(
            temperature.slice(s![steps.clone(), ..]),
            heights.row(steps.end - 1),
            &iso,
            surface.slice(s![steps]),
        )?;
        window.select(config.cutoff_epsilon)
    })?;

    // zero crossings are missing
    for value in trace.iter_mut() {
        if *value == Some(0.0) {
            *value = None;
        }
    }

    let rolled = config.rolling.min(times, &trace)?;
    let alt = rolled
        .iter()
        .zip(surface.iter())
        .map(|(h, &hs)| h.map(|h| hs - h))
        .collect();

    Ok(AltSeries {
        times: times.to_vec(),
        trace,
        alt,
        failures,
    })
}
