//! ftu: analysis utilities for FreeThaw permafrost simulations
//!
//! FreeThaw simulates the ground thermal regime of permafrost soils. This
//! library works on its inputs and outputs: it derives active layer thickness
//! (ALT) from isotherm crossings, loads simulation output and grid files
//! written as NetCDF, reads and writes the OMS tables consumed by the
//! simulation driver, and edits the driver's `.sim` scripts.
//!
//! ## Module Organization
//!
//! - [`isotherms`]: permafrost/talik detection and ALT extraction
//! - [`netcdf_io`]: simulation output loading and ALT output
//! - [`grid`]: FreeThaw grid files
//! - [`spinup`]: spin-up profile sampling
//! - [`oms_table`]: OMS data tables
//! - [`simfile`]: `.sim` script editing
//! - [`parallel`]: parallel processing configuration
//! - [`errors`]: centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ftu::prelude::*;
//!
//! let output = AllVariables::open("_Sim_complete.nc").unwrap();
//! let times = output.time().unwrap();
//! let temperature = output.profile("mean_temperature_in_ground").unwrap();
//! let heights = output.profile("height").unwrap().row(0).to_owned();
//! let isotherms = IsothermSet::from_nan(output.matrix("isotherm").unwrap().view());
//! let surface = output.series("surface_height").unwrap();
//!
//! let series = extract_alt_isotherm(
//!     temperature.view(),
//!     &times,
//!     &isotherms,
//!     heights.view(),
//!     surface.view(),
//! )
//! .unwrap();
//! println!("{} blocks without ALT", series.failures.len());
//! ```

pub mod errors;
pub mod grid;
pub mod isotherms;
pub mod netcdf_io;
pub mod oms_table;
pub mod parallel;
pub mod simfile;
pub mod spinup;

pub use errors::*;

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::errors::{FtuError, Result};
    pub use crate::grid::{Grid, ProfileAxis};
    pub use crate::isotherms::{
        continuous_alt, extract_alt_isotherm, extract_alt_isotherm_depth, single_alt, AltSeries,
        ExtractorConfig, IsothermSet, RollingWindow, Window,
    };
    pub use crate::netcdf_io::{write_alt_to_netcdf, AllVariables, FtuVariable};
    pub use crate::oms_table::{read_oms_table, write_oms, OmsTable};
    pub use crate::parallel::ParallelConfig;
    pub use crate::simfile::{FreeThawSim, SimValue};
}
