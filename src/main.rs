//! Entry point for the ftu application.
//! Handles CLI parsing, logging setup and dispatches the ALT, grid, spin-up,
//! OMS and .sim subcommands.

use chrono::Datelike;
use clap::Parser;
use ftu::grid::Grid;
use ftu::isotherms::{extract_alt_isotherm, extract_alt_isotherm_depth, AltSeries, IsothermSet};
use ftu::netcdf_io::{write_alt_to_netcdf, AllVariables, FtuVariable};
use ftu::oms_table::write_oms;
use ftu::parallel::ParallelConfig;
use ftu::simfile::{FreeThawSim, SimValue};
use ftu::spinup::{deepest_level, sample_profiles};
use ftu::{FtuError, Result};
use ndarray::{Array1, Array2, Axis};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::collections::BTreeMap;

mod cli;

use cli::{AltArgs, Args, Command, SimArgs};

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto)?;

    eprintln!(
        r#"
------------------------------------------------------------------
              ftu: FreeThaw permafrost utilities
------------------------------------------------------------------
"#
    );

    ParallelConfig::new(args.threads).setup_global_pool()?;

    match args.command {
        Command::Alt(alt) => run_alt(&alt)?,
        Command::Describe { file } => {
            let output = AllVariables::open(&file)?;
            println!("Successfully opened NetCDF file: {}", file.display());
            for name in output.variables() {
                match output.get(&name) {
                    Ok(var) => println!("  {} {:?}", name, var.shape()),
                    Err(e) => println!("  {} (skipped: {})", name, e),
                }
            }
        }
        Command::Grid {
            file,
            param,
            axis,
            attrs,
        } => {
            let grid = Grid::open(&file)?;
            if attrs {
                for (name, value) in grid.attributes()? {
                    println!("{}: {}", name, value);
                }
            }
            let profile = grid.profile(&param, axis)?;
            println!("{:>16} {:>16}", profile.y_label, profile.x_label);
            for (y, x) in profile.y.iter().zip(profile.x.iter()) {
                println!("{:>16.4} {:>16.4}", y, x);
            }
            if let Some(line) = profile.reference_line {
                println!("reference: {}", line);
            }
        }
        Command::Spinup {
            file,
            var,
            percent,
            profiles,
        } => {
            let output = AllVariables::open(&file)?;
            let times = output.time()?;
            let values = output.profile(&var)?;
            for sample in sample_profiles(&times, values.view(), percent, profiles)? {
                println!("{} {:?}", sample.time, sample.values.to_vec());
            }
            let deepest = deepest_level(values.view())?;
            if let (Some(first), Some(last)) = (deepest.first(), deepest.last()) {
                println!("Deepest level: {:.3} -> {:.3}", first, last);
            }
        }
        Command::Oms { file, vars, output } => {
            let source = AllVariables::open(&file)?;
            let times = source.time()?;
            let mut data = Array2::<f64>::zeros((times.len(), vars.len()));
            for (mut column, name) in data.axis_iter_mut(Axis(1)).zip(vars.iter()) {
                column.assign(&source.series(name)?);
            }
            write_oms(&output, &times, data.view())?;
            println!("✅ Saved {} to {}", vars.join(", "), output.display());
        }
        Command::Sim(sim) => run_sim(&sim)?,
    }

    Ok(())
}

fn run_alt(args: &AltArgs) -> Result<()> {
    let output = AllVariables::open(&args.file)?;
    println!("Successfully opened NetCDF file: {}", args.file.display());

    let times = output.time()?;
    let temperature = output.profile(&args.temperature_var)?;
    let axis = fixed_axis(&output, &args.axis_var)?;
    let surface = output.series(&args.surface_var)?;
    let raw = output.matrix(&args.isotherm_var)?;
    let isotherms = match args.isotherm_fill {
        Some(fill) => IsothermSet::from_fill(raw.view(), fill),
        None => IsothermSet::from_nan(raw.view()),
    };

    let series = if args.depth {
        extract_alt_isotherm_depth(
            temperature.view(),
            &times,
            &isotherms,
            axis.view(),
            surface.view(),
        )?
    } else {
        extract_alt_isotherm(
            temperature.view(),
            &times,
            &isotherms,
            axis.view(),
            surface.view(),
        )?
    };

    for failure in &series.failures {
        println!("⚠️  {} left missing: {}", failure.label, failure.reason);
    }

    let mut saved = false;
    if let Some(path) = &args.output_netcdf {
        write_alt_to_netcdf(&series, path)?;
        println!("✅ Saved result to {}", path.display());
        saved = true;
    }
    if let Some(path) = &args.output_oms {
        let data = Array2::from_shape_vec((series.len(), 1), series.alt_or_nan())?;
        write_oms(path, &series.times, data.view())?;
        println!("✅ Saved result to {}", path.display());
        saved = true;
    }
    if !saved {
        for (year, alt) in annual_minimum(&series) {
            match alt {
                Some(alt) => println!("{}: {:.3}", year, alt),
                None => println!("{}: missing", year),
            }
        }
    }
    Ok(())
}

/// Level positions shared by every time step.
fn fixed_axis(output: &AllVariables, name: &str) -> Result<Array1<f64>> {
    match output.get(name)? {
        FtuVariable::Levels(levels) => Ok(levels),
        FtuVariable::Profile(profile) if profile.nrows() > 0 => Ok(profile.row(0).to_owned()),
        other => Err(FtuError::invalid_input(format!(
            "'{}' cannot serve as a level axis (shape {:?})",
            name,
            other.shape()
        ))),
    }
}

fn annual_minimum(series: &AltSeries) -> BTreeMap<i32, Option<f64>> {
    let mut years: BTreeMap<i32, Option<f64>> = BTreeMap::new();
    for (time, alt) in series.times.iter().zip(series.alt.iter()) {
        let slot = years.entry(time.year()).or_insert(None);
        if let Some(alt) = alt {
            *slot = Some(slot.map_or(*alt, |m| m.min(*alt)));
        }
    }
    years
}

fn run_sim(args: &SimArgs) -> Result<()> {
    let mut sim = FreeThawSim::read(&args.file)?;

    for (key, value) in &args.set {
        sim.set_variable(key, SimValue::parse(value))?;
    }
    for parameter in &args.comment {
        if !sim.comment(parameter) {
            return Err(FtuError::SimKeyNotFound {
                key: parameter.clone(),
            });
        }
    }
    for parameter in &args.uncomment {
        if !sim.uncomment(parameter) {
            return Err(FtuError::SimKeyNotFound {
                key: parameter.clone(),
            });
        }
    }

    match &args.output {
        Some(path) => {
            sim.write(path)?;
            println!("✅ Saved script to {}", path.display());
        }
        None => print!("{}", sim.text()),
    }
    Ok(())
}
