//! FreeThaw grid files
//!
//! A grid file stores per-node parameters indirectly: `parameterID` gives,
//! for each node along `z`, the row of the `(parameter,)` variables that
//! applies. Nodes with `z == 0` are padding and are dropped.

use crate::errors::{FtuError, Result};
use crate::netcdf_io::{dimension_names, read_f64, string_attribute};
use ndarray::{Array1, Ix1};
use netcdf::{File, Variable};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Initial-condition reference temperature (K)
const FREEZING_POINT_K: f64 = 273.15;

/// Vertical coordinate of a grid profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileAxis {
    /// Node height `z`
    Z,
    /// Node depth `eta`, shown as `-|eta|`
    Eta,
}

impl ProfileAxis {
    pub const fn variable(self) -> &'static str {
        match self {
            ProfileAxis::Z => "z",
            ProfileAxis::Eta => "eta",
        }
    }
}

impl FromStr for ProfileAxis {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "z" => Ok(ProfileAxis::Z),
            "eta" => Ok(ProfileAxis::Eta),
            other => Err(format!("Invalid y-axis: {}", other)),
        }
    }
}

/// A parameter plotted against the grid's vertical axis
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub x_label: String,
    pub y_label: String,
    /// Vertical marker on the x axis, if any
    pub reference_line: Option<f64>,
}

/// Representation of a FreeThaw grid file
pub struct Grid {
    path: PathBuf,
    file: File,
    valid: Vec<bool>,
    vars: BTreeMap<String, Array1<f64>>,
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Grid ({})", self.path.display())
    }
}

impl Grid {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = netcdf::open(&path)?;
        let valid: Vec<bool> = read_1d(&file, "z")?.iter().map(|&z| z != 0.0).collect();

        let mut grid = Self {
            path,
            file,
            valid,
            vars: BTreeMap::new(),
        };
        grid.build_vars()?;
        Ok(grid)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Per-node flag, `false` for padding nodes
    pub fn valid_indices(&self) -> &[bool] {
        &self.valid
    }

    /// Parameter row of every valid node.
    pub fn pid(&self) -> Result<Vec<usize>> {
        let ids = self.select_valid(&read_1d(&self.file, "parameterID")?)?;
        ids.iter()
            .map(|&id| {
                if id >= 0.0 && id.fract() == 0.0 {
                    Ok(id as usize)
                } else {
                    Err(FtuError::invalid_input(format!("invalid parameterID {}", id)))
                }
            })
            .collect()
    }

    /// Variables defined over `(parameter,)`
    pub fn parameter_names(&self) -> Vec<String> {
        self.names_where(|dims, _| dims == ["parameter"])
    }

    /// Variables defined over `(z,)` or `(k,)`
    pub fn depth_names(&self) -> Vec<String> {
        self.names_where(|dims, _| dims == ["z"] || dims == ["k"])
    }

    /// One-dimensional variables over a dimension of length 1
    pub fn constant_names(&self) -> Vec<String> {
        self.names_where(|_, var| {
            let dims = var.dimensions();
            dims.len() == 1 && dims[0].len() == 1
        })
    }

    fn names_where<F>(&self, predicate: F) -> Vec<String>
    where
        F: Fn(&[String], &Variable) -> bool,
    {
        self.file
            .variables()
            .filter(|var| predicate(&dimension_names(var), var))
            .map(|var| var.name())
            .collect()
    }

    fn select_valid(&self, values: &Array1<f64>) -> Result<Array1<f64>> {
        if values.len() != self.valid.len() {
            return Err(FtuError::invalid_input(format!(
                "{} values for {} grid nodes",
                values.len(),
                self.valid.len()
            )));
        }
        Ok(values
            .iter()
            .zip(&self.valid)
            .filter(|(_, &ok)| ok)
            .map(|(&v, _)| v)
            .collect())
    }

    fn build_vars(&mut self) -> Result<()> {
        let pid = self.pid()?;
        for name in self.parameter_names() {
            let values = read_1d(&self.file, &name)?;
            let per_node = pid
                .iter()
                .map(|&i| {
                    values.get(i).copied().ok_or_else(|| {
                        FtuError::invalid_input(format!(
                            "parameterID {} out of range for '{}'",
                            i, name
                        ))
                    })
                })
                .collect::<Result<Array1<f64>>>()?;
            self.vars.insert(name, per_node);
        }

        for name in self.depth_names() {
            let values = self.select_valid(&read_1d(&self.file, &name)?)?;
            self.vars.insert(name, values);
        }

        for name in self.constant_names() {
            let values = read_1d(&self.file, &name)?;
            self.vars.insert(name, values);
        }

        Ok(())
    }

    /// A loaded grid variable.
    pub fn get(&self, name: &str) -> Result<&Array1<f64>> {
        self.vars.get(name).ok_or_else(|| FtuError::VariableNotFound {
            var: name.to_string(),
        })
    }

    /// Global attributes as `(name, value)` pairs.
    pub fn attributes(&self) -> Result<Vec<(String, String)>> {
        self.file
            .attributes()
            .map(|attr| -> Result<(String, String)> {
                Ok((attr.name().to_string(), format!("{:?}", attr.value()?)))
            })
            .collect()
    }

    /// `param` against the chosen vertical axis, with labelled units.
    pub fn profile(&self, param: &str, axis: ProfileAxis) -> Result<Profile> {
        let x = self.get(param)?.to_vec();
        let coordinate = self.get(axis.variable())?;
        let y = match axis {
            ProfileAxis::Z => coordinate.to_vec(),
            ProfileAxis::Eta => coordinate.iter().map(|e| -e.abs()).collect(),
        };

        Ok(Profile {
            x,
            y,
            x_label: self.label(param),
            y_label: self.label(axis.variable()),
            reference_line: (param == "ic").then_some(FREEZING_POINT_K),
        })
    }

    fn label(&self, name: &str) -> String {
        let units = self.file.variable(name).and_then(|var| {
            string_attribute(&var, "units").or_else(|| string_attribute(&var, "unit"))
        });
        match units {
            Some(units) => format!("{} [{}]", name, units),
            None => name.to_string(),
        }
    }
}

fn read_1d(file: &File, name: &str) -> Result<Array1<f64>> {
    let var = file.variable(name).ok_or_else(|| FtuError::VariableNotFound {
        var: name.to_string(),
    })?;
    Ok(read_f64(&var)?.into_dimensionality::<Ix1>()?)
}
