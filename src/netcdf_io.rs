//! NetCDF I/O for FreeThaw simulation output
//!
//! [`AllVariables`] loads the `_Sim` output files written by FreeThaw, where
//! profile variables live on a `(time, k)` grid padded with empty levels. The
//! valid levels of each time step are those with a non-zero, non-NaN
//! `height`. [`AltWriter`] stores a computed ALT series as a new NetCDF file.

use crate::errors::{FtuError, Result};
use crate::isotherms::AltSeries;
use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use ndarray::{Array1, Array2, ArrayD, ArrayView2, Axis, Ix1, Ix2, IxDyn};
use netcdf::{create, AttributeValue, File, Variable};
use std::path::{Path, PathBuf};
use std::{fmt, fs};

/// Fill value written for missing ALT entries
pub const FILL_VALUE: f64 = -9999.0;

/// A variable of a FreeThaw output file, by dimension layout
#[derive(Debug, Clone, PartialEq)]
pub enum FtuVariable {
    /// `(time, k)` values restricted to the valid levels
    Profile(Array2<f64>),
    /// `(k,)` values
    Levels(Array1<f64>),
    /// `(time,)` values
    Series(Array1<f64>),
}

impl FtuVariable {
    pub fn shape(&self) -> Vec<usize> {
        match self {
            FtuVariable::Profile(a) => a.shape().to_vec(),
            FtuVariable::Levels(a) | FtuVariable::Series(a) => a.shape().to_vec(),
        }
    }
}

/// Representation of a FreeThaw simulation output file
pub struct AllVariables {
    path: PathBuf,
    file: File,
    valid: Array2<bool>,
}

impl fmt::Debug for AllVariables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AllVariables ({})", self.path.display())
    }
}

impl AllVariables {
    /// Opens an output file and locates the valid levels from its `height` variable.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = netcdf::open(&path)?;
        let height = read_f64(&lookup(&file, "height")?)?.into_dimensionality::<Ix2>()?;
        let valid = valid_levels(height.view());

        log::debug!(
            "opened {} ({} time steps, {} levels)",
            path.display(),
            valid.nrows(),
            valid.ncols()
        );

        Ok(Self { path, file, valid })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `(time, k)` mask of valid levels
    pub fn valid_levels(&self) -> ArrayView2<'_, bool> {
        self.valid.view()
    }

    /// Names of all variables in the file
    pub fn variables(&self) -> Vec<String> {
        self.file.variables().map(|v| v.name()).collect()
    }

    /// Reads a variable according to its dimensions.
    ///
    /// `(time, k)` variables are restricted to the valid levels, which must be
    /// equally many at every time step.
    pub fn get(&self, name: &str) -> Result<FtuVariable> {
        let var = lookup(&self.file, name)?;
        let dims = dimension_names(&var);
        let dims: Vec<&str> = dims.iter().map(String::as_str).collect();
        let data = read_f64(&var)?;

        match dims.as_slice() {
            ["time", "k"] => {
                let data = data.into_dimensionality::<Ix2>()?;
                Ok(FtuVariable::Profile(subsample_valid(data.view(), self.valid.view())?))
            }
            ["k"] => Ok(FtuVariable::Levels(data.into_dimensionality::<Ix1>()?)),
            ["time"] => Ok(FtuVariable::Series(data.into_dimensionality::<Ix1>()?)),
            _ => Err(FtuError::InvalidDimensions {
                var: name.to_string(),
                dims: dims.iter().map(|d| d.to_string()).collect(),
            }),
        }
    }

    /// A `(time, k)` variable restricted to the valid levels.
    pub fn profile(&self, name: &str) -> Result<Array2<f64>> {
        match self.get(name)? {
            FtuVariable::Profile(a) => Ok(a),
            other => Err(FtuError::invalid_input(format!(
                "'{}' is not a (time, k) variable (shape {:?})",
                name,
                other.shape()
            ))),
        }
    }

    /// A `(time,)` variable.
    pub fn series(&self, name: &str) -> Result<Array1<f64>> {
        match self.get(name)? {
            FtuVariable::Series(a) => Ok(a),
            other => Err(FtuError::invalid_input(format!(
                "'{}' is not a (time,) variable (shape {:?})",
                name,
                other.shape()
            ))),
        }
    }

    /// Any two-dimensional variable, unfiltered (e.g. isotherm crossings).
    pub fn matrix(&self, name: &str) -> Result<Array2<f64>> {
        let var = lookup(&self.file, name)?;
        Ok(read_f64(&var)?.into_dimensionality::<Ix2>()?)
    }

    /// Decoded values of the `time` variable.
    pub fn time(&self) -> Result<Vec<NaiveDateTime>> {
        let var = lookup(&self.file, "time")?;
        let units = string_attribute(&var, "units").ok_or_else(|| FtuError::InvalidTimeUnits {
            units: String::new(),
        })?;
        let values = var.get_values::<f64, _>(..)?;
        decode_time(&values, &units)
    }
}

fn lookup<'f>(file: &'f File, name: &str) -> Result<Variable<'f>> {
    file.variable(name).ok_or_else(|| FtuError::VariableNotFound {
        var: name.to_string(),
    })
}

pub(crate) fn dimension_names(var: &Variable) -> Vec<String> {
    var.dimensions().iter().map(|d| d.name()).collect()
}

pub(crate) fn string_attribute(var: &Variable, name: &str) -> Option<String> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}

fn fill_value(var: &Variable) -> Option<f64> {
    match var.attribute("_FillValue")?.value().ok()? {
        AttributeValue::Float(v) => Some(f64::from(v)),
        AttributeValue::Double(v) => Some(v),
        AttributeValue::Short(v) => Some(f64::from(v)),
        AttributeValue::Int(v) => Some(f64::from(v)),
        _ => None,
    }
}

/// Reads a whole variable as `f64`, turning `_FillValue` entries into NaN.
pub(crate) fn read_f64(var: &Variable) -> Result<ArrayD<f64>> {
    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    let mut values = var.get_values::<f64, _>(..)?;
    if let Some(fill) = fill_value(var) {
        for v in values.iter_mut().filter(|v| **v == fill) {
            *v = f64::NAN;
        }
    }
    Ok(ArrayD::from_shape_vec(IxDyn(&shape), values)?)
}

/// Valid levels of a `(time, k)` height array: neither NaN nor zero.
pub fn valid_levels(height: ArrayView2<f64>) -> Array2<bool> {
    height.mapv(|h| !(h.is_nan() || h == 0.0))
}

/// Keeps the valid levels of every time step.
pub fn subsample_valid(data: ArrayView2<f64>, valid: ArrayView2<bool>) -> Result<Array2<f64>> {
    if data.dim() != valid.dim() {
        return Err(FtuError::invalid_input(format!(
            "data shape {:?} does not match validity mask {:?}",
            data.dim(),
            valid.dim()
        )));
    }

    let counts: Vec<usize> = valid
        .axis_iter(Axis(0))
        .map(|row| row.iter().filter(|&&v| v).count())
        .collect();
    let width = counts.iter().copied().max().unwrap_or(0);
    if counts.iter().any(|&c| c != width) {
        return Err(FtuError::invalid_input(
            "Not all time slices have the same number of valid points",
        ));
    }

    let values: Vec<f64> = data
        .iter()
        .zip(valid.iter())
        .filter(|(_, &ok)| ok)
        .map(|(&v, _)| v)
        .collect();
    Ok(Array2::from_shape_vec((data.nrows(), width), values)?)
}

/// Decodes CF-style time values (`<unit> since <reference>`).
pub fn decode_time(values: &[f64], units: &str) -> Result<Vec<NaiveDateTime>> {
    let invalid = || FtuError::InvalidTimeUnits {
        units: units.to_string(),
    };
    let (unit, reference) = units.trim().split_once(" since ").ok_or_else(invalid)?;

    let seconds_per_unit = match unit.trim().to_lowercase().as_str() {
        "seconds" | "second" | "secs" | "sec" | "s" => 1.0,
        "minutes" | "minute" | "mins" | "min" => 60.0,
        "hours" | "hour" | "hrs" | "hr" | "h" => 3600.0,
        "days" | "day" | "d" => 86400.0,
        _ => return Err(invalid()),
    };
    let origin = parse_reference(reference).ok_or_else(invalid)?;

    values
        .iter()
        .map(|&v| {
            if !v.is_finite() {
                return Err(invalid());
            }
            let millis = (v * seconds_per_unit * 1000.0).round() as i64;
            Duration::try_milliseconds(millis)
                .and_then(|delta| origin.checked_add_signed(delta))
                .ok_or_else(invalid)
        })
        .collect()
}

fn parse_reference(reference: &str) -> Option<NaiveDateTime> {
    let reference = reference
        .trim()
        .trim_end_matches("UTC")
        .trim_end_matches('Z')
        .trim();

    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(reference, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(reference, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Writes an [`AltSeries`] to a new NetCDF file
pub struct AltWriter<'a> {
    output_path: &'a Path,
}

impl<'a> AltWriter<'a> {
    pub fn new(output_path: &'a Path) -> Self {
        Self { output_path }
    }

    /// Writes `time`, `isotherm` (raw trace) and `alt` over a `time` dimension.
    pub fn write(&self, series: &AltSeries) -> Result<()> {
        if self.output_path.exists() {
            fs::remove_file(self.output_path)?;
        }

        let mut file = create(self.output_path)?;
        file.add_dimension("time", series.len())?;

        let origin = series
            .times
            .first()
            .map(|t| t.date().and_hms_opt(0, 0, 0).unwrap_or(*t))
            .unwrap_or_default();
        {
            let mut time_var = file.add_variable::<f64>("time", &["time"])?;
            time_var.put_attribute(
                "units",
                format!("days since {}", origin.format("%Y-%m-%d %H:%M:%S")),
            )?;
            time_var.put_attribute("calendar", "standard")?;
            time_var.put_attribute("long_name", "time")?;

            let days: Array1<f64> = series
                .times
                .iter()
                .map(|t| (*t - origin).num_seconds() as f64 / 86400.0)
                .collect();
            time_var.put(days.view(), ..)?;
        }

        let columns = [
            ("isotherm", "selected isotherm crossing", series.trace_or_nan()),
            ("alt", "active layer thickness", series.alt_or_nan()),
        ];
        for (name, long_name, values) in columns {
            let mut var = file.add_variable::<f64>(name, &["time"])?;
            var.put_attribute("_FillValue", FILL_VALUE)?;
            var.put_attribute("long_name", long_name)?;
            var.put_attribute("units", "m")?;

            let values: Array1<f64> = values
                .into_iter()
                .map(|v| if v.is_nan() { FILL_VALUE } else { v })
                .collect();
            var.put(values.view(), ..)?;
        }

        file.add_attribute(
            "failed_blocks",
            series
                .failures
                .iter()
                .map(|f| f.label.clone())
                .collect::<Vec<_>>()
                .join(", "),
        )?;
        file.add_attribute(
            "history",
            format!("Created by ftu on {}", Utc::now().to_rfc3339()),
        )?;

        Ok(())
    }
}

/// Writes an ALT series to `output_path`.
pub fn write_alt_to_netcdf(series: &AltSeries, output_path: &Path) -> Result<()> {
    AltWriter::new(output_path).write(series)
}
