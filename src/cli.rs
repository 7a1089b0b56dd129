//! Defines command-line interface options using `clap` for the ftu application.

use clap::{Parser, Subcommand};
use ftu::grid::ProfileAxis;
use std::path::PathBuf;

/// Utilities for FreeThaw permafrost simulations
#[derive(Parser, Debug)]
#[command(
    version,
    name = "ftu",
    about = "Active layer diagnostics, OMS tables and .sim editing for FreeThaw"
)]
pub struct Args {
    /// Enable verbose output.
    #[arg(short, long, default_value_t = false, global = true)]
    pub verbose: bool,

    /// Number of threads to use for parallel processing. Defaults to Rayon's pool.
    #[arg(short = 't', long, global = true)]
    pub threads: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute active layer thickness from the isotherms of a simulation output file
    Alt(AltArgs),

    /// List the variables of a simulation output file
    Describe {
        /// Path to the NetCDF output file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print a parameter profile of a grid file
    Grid {
        /// Path to the NetCDF grid file
        #[arg(short, long)]
        file: PathBuf,

        /// Parameter to print
        #[arg(long)]
        param: String,

        /// Vertical axis, `z` or `eta`
        #[arg(long, default_value = "z")]
        axis: ProfileAxis,

        /// Also print the global attributes
        #[arg(long)]
        attrs: bool,
    },

    /// Sample temperature profiles from a spin-up run
    Spinup {
        /// Path to the NetCDF spin-up file
        #[arg(short, long)]
        file: PathBuf,

        /// Temperature variable
        #[arg(long, default_value = "mean_temperature_in_ground")]
        var: String,

        /// Percentage of the run to sample, counted from the end
        #[arg(long, default_value_t = 100)]
        percent: u32,

        /// Number of profiles
        #[arg(short = 'n', long, default_value_t = 10)]
        profiles: usize,
    },

    /// Export (time,) variables to an OMS table
    Oms {
        /// Path to the NetCDF output file
        #[arg(short, long)]
        file: PathBuf,

        /// Comma-separated variable names
        #[arg(long, value_delimiter = ',', required = true)]
        vars: Vec<String>,

        /// Table to write
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Edit a .sim simulation script
    Sim(SimArgs),
}

#[derive(clap::Args, Debug)]
pub struct AltArgs {
    /// Path to the NetCDF output file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Ground temperature variable, (time, k)
    #[arg(long, default_value = "mean_temperature_in_ground")]
    pub temperature_var: String,

    /// Isotherm crossing variable, (time, n)
    #[arg(long)]
    pub isotherm_var: String,

    /// Level position variable, (k,) or (time, k)
    #[arg(long, default_value = "height")]
    pub axis_var: String,

    /// Ground surface height variable, (time,)
    #[arg(long)]
    pub surface_var: String,

    /// Value marking missing isotherm crossings (NaN is always missing)
    #[arg(long)]
    pub isotherm_fill: Option<f64>,

    /// Levels are depths below the surface; blocks are calendar years
    #[arg(long)]
    pub depth: bool,

    /// Path to save the ALT series as NetCDF
    #[arg(long)]
    pub output_netcdf: Option<PathBuf>,

    /// Path to save the ALT series as an OMS table
    #[arg(long)]
    pub output_oms: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct SimArgs {
    /// Path to the .sim script
    #[arg(short, long)]
    pub file: PathBuf,

    /// Set a definition, formatted as <key>=<value>. Repeatable.
    #[arg(long = "set", value_parser = parse_assignment)]
    pub set: Vec<(String, String)>,

    /// Comment out the from-to line of a parameter. Repeatable.
    #[arg(long)]
    pub comment: Vec<String>,

    /// Re-enable the from-to line of a parameter. Repeatable.
    #[arg(long)]
    pub uncomment: Vec<String>,

    /// Where to write the edited script. If not set, prints to terminal.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

fn parse_assignment(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err("Invalid format: Expected '<key>=<value>'.".to_string()),
    }
}
