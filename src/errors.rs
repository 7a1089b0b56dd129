//! Centralized error handling for ftu
//!
//! A single error enum covers the numerical core (unsupported windows,
//! malformed inputs) and the file-format glue (netCDF, OMS tables, `.sim`
//! scripts).

use std::fmt;

/// Main error type for ftu operations
#[derive(Debug)]
pub enum FtuError {
    /// The analysis window has no defined active layer (e.g. no permafrost band)
    UnsupportedWindow { reason: String },

    /// Malformed arguments or arrays passed to the core
    InvalidInput { message: String },

    /// NetCDF file operation errors
    NetCDFError(netcdf::Error),

    /// I/O operation errors
    IoError(std::io::Error),

    /// CSV errors while reading or writing OMS table rows
    CsvError(csv::Error),

    /// Variable not found in NetCDF file
    VariableNotFound { var: String },

    /// Variable is defined over dimensions the loader does not understand
    InvalidDimensions { var: String, dims: Vec<String> },

    /// Time axis could not be decoded
    InvalidTimeUnits { units: String },

    /// OMS table without any column definitions
    NoColumns,

    /// OMS table column missing or of the wrong type
    ColumnError { column: String, message: String },

    /// No definition with this key in a `.sim` script
    SimKeyNotFound { key: String },

    /// Array shape or dimension error
    ArrayError(ndarray::ShapeError),

    /// Thread pool configuration error
    ThreadPoolError(String),

    /// Generic error
    Generic(String),
}

impl FtuError {
    /// Shorthand for [`FtuError::InvalidInput`]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        FtuError::InvalidInput {
            message: message.into(),
        }
    }

    /// Shorthand for [`FtuError::UnsupportedWindow`]
    pub fn unsupported(reason: impl Into<String>) -> Self {
        FtuError::UnsupportedWindow {
            reason: reason.into(),
        }
    }

    /// Failures that the yearly drivers record per block instead of aborting
    pub fn is_window_failure(&self) -> bool {
        matches!(
            self,
            FtuError::UnsupportedWindow { .. } | FtuError::InvalidInput { .. }
        )
    }
}

impl fmt::Display for FtuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FtuError::UnsupportedWindow { reason } => write!(f, "Unsupported window: {}", reason),
            FtuError::InvalidInput { message } => write!(f, "Invalid input: {}", message),
            FtuError::NetCDFError(e) => write!(f, "NetCDF error: {}", e),
            FtuError::IoError(e) => write!(f, "I/O error: {}", e),
            FtuError::CsvError(e) => write!(f, "CSV error: {}", e),
            FtuError::VariableNotFound { var } => write!(f, "Variable '{}' not found in file", var),
            FtuError::InvalidDimensions { var, dims } => write!(
                f,
                "Variable '{}' has unsupported dimensions ({})",
                var,
                dims.join(", ")
            ),
            FtuError::InvalidTimeUnits { units } => {
                write!(f, "Cannot decode time units '{}'", units)
            }
            FtuError::NoColumns => write!(f, "No columns defined"),
            FtuError::ColumnError { column, message } => {
                write!(f, "Column '{}': {}", column, message)
            }
            FtuError::SimKeyNotFound { key } => {
                write!(f, "No definition for '{}' in simulation file", key)
            }
            FtuError::ArrayError(e) => write!(f, "Array error: {}", e),
            FtuError::ThreadPoolError(msg) => write!(f, "Thread pool error: {}", msg),
            FtuError::Generic(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for FtuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FtuError::NetCDFError(e) => Some(e),
            FtuError::IoError(e) => Some(e),
            FtuError::CsvError(e) => Some(e),
            FtuError::ArrayError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<netcdf::Error> for FtuError {
    fn from(error: netcdf::Error) -> Self {
        FtuError::NetCDFError(error)
    }
}

impl From<std::io::Error> for FtuError {
    fn from(error: std::io::Error) -> Self {
        FtuError::IoError(error)
    }
}

impl From<csv::Error> for FtuError {
    fn from(error: csv::Error) -> Self {
        FtuError::CsvError(error)
    }
}

impl From<ndarray::ShapeError> for FtuError {
    fn from(error: ndarray::ShapeError) -> Self {
        FtuError::ArrayError(error)
    }
}

impl From<String> for FtuError {
    fn from(error: String) -> Self {
        FtuError::Generic(error)
    }
}

impl From<&str> for FtuError {
    fn from(error: &str) -> Self {
        FtuError::Generic(error.to_string())
    }
}

/// Result type alias for ftu operations
pub type Result<T> = std::result::Result<T, FtuError>;
