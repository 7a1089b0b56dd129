//! Isotherm-based active-layer-thickness (ALT) diagnostics
//!
//! This module derives the active-layer boundary from a time series of ground
//! temperature profiles and the isotherm crossings reported by FreeThaw, then
//! reduces the boundary trace to an annual minimum.
//!
//! All positions are expressed on a vertical axis where larger values are
//! higher up (heights). "Above" a position therefore means a greater value.
//!
//! # Organization
//!
//! - [`profile`]: unit normalisation, depth/height conversion, permafrost band
//! - [`selection`]: masked isotherm sets, talik test and the selection rule
//! - [`rolling`]: trailing time-based rolling minimum
//! - [`driver`]: yearly drivers assembling a full ALT series

pub mod driver;
pub mod profile;
pub mod rolling;
pub mod selection;

pub use driver::{
    extract_alt_isotherm, extract_alt_isotherm_depth, extract_alt_isotherm_depth_with,
    extract_alt_isotherm_with, AltSeries, BlockFailure, ExtractorConfig,
};
pub use profile::{
    depth_to_height, ensure_units_celsius, height_to_depth, permafrost_band, PermafrostBand,
};
pub use rolling::RollingWindow;
pub use selection::{
    continuous_alt, select_rank, single_alt, talik_test, IsothermRank, IsothermSet, Window,
};

/// Minimum over the present values, ignoring missing ones.
pub(crate) fn nan_min<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    values
        .into_iter()
        .flatten()
        .filter(|v| !v.is_nan())
        .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.min(v))))
}

/// Maximum over the present values, ignoring missing ones.
pub(crate) fn nan_max<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    values
        .into_iter()
        .flatten()
        .filter(|v| !v.is_nan())
        .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
}
