//! OMS data tables, the CSV-like text format read by the simulation driver
//!
//! ```text
//! @Table, OMS Data Table
//! ID,,0,1
//! Type,Date,Real,Real
//! Format,yyyy-MM-dd HH:mm,,
//! @Header,timestamp,value_0,value_1
//! ,2000-01-01 00:00,1.5,-0.25
//! ```
//!
//! Every data row starts with an empty cell.

use crate::errors::{FtuError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use ndarray::ArrayView2;
use regex::Regex;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::LazyLock;

/// Table name used when a file does not declare one
pub const DEFAULT_HEADER: &str = "OMS Data Table";

/// Timestamp format written by [`write_oms`], in OMS notation
pub const OMS_DATE_FORMAT: &str = "yyyy-MM-dd HH:mm";

static TABLE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*@[tT](able)?,\s*(.*)$").expect("valid regex"));
static HEADER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@[Hh](eader)?").expect("valid regex"));

/// Column types understood by OMS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OmsType {
    Date,
    Real,
    Boolean,
    Integer,
    String,
}

impl OmsType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Date => "Date",
            Self::Real => "Real",
            Self::Boolean => "Boolean",
            Self::Integer => "Integer",
            Self::String => "String",
        }
    }
}

/// Value of a metadata line: one value, or several comma-separated ones
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    Single(String),
    List(Vec<String>),
}

impl MetadataValue {
    pub fn into_list(self) -> Vec<String> {
        match self {
            MetadataValue::Single(v) => vec![v],
            MetadataValue::List(v) => v,
        }
    }

    fn joined(&self) -> String {
        match self {
            MetadataValue::Single(v) => v.clone(),
            MetadataValue::List(v) => v.join(","),
        }
    }
}

/// An OMS table held as text cells
#[derive(Debug, Clone, PartialEq)]
pub struct OmsTable {
    header: String,
    metadata: Vec<(String, MetadataValue)>,
    columns: Vec<String>,
    dtypes: Vec<String>,
    formats: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl OmsTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            header: DEFAULT_HEADER.to_string(),
            metadata: Vec::new(),
            columns,
            dtypes: Vec::new(),
            formats: Vec::new(),
            rows,
        }
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: MetadataValue) -> Self {
        self.metadata.push((key.into(), value));
        self
    }

    pub fn with_dtypes(mut self, dtypes: Vec<String>) -> Self {
        self.dtypes = dtypes;
        self
    }

    pub fn with_formats(mut self, formats: Vec<String>) -> Self {
        self.formats = formats;
        self
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn metadata(&self) -> &[(String, MetadataValue)] {
        &self.metadata
    }

    /// First metadata entry named `key`.
    pub fn metadata_value(&self, key: &str) -> Option<&MetadataValue> {
        self.metadata.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn dtypes(&self) -> &[String] {
        &self.dtypes
    }

    pub fn formats(&self) -> &[String] {
        &self.formats
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| FtuError::ColumnError {
                column: name.to_string(),
                message: "no such column".to_string(),
            })
    }

    /// Raw cells of a column; short rows yield empty cells.
    pub fn column(&self, name: &str) -> Result<Vec<&str>> {
        let idx = self.column_index(name)?;
        Ok(self
            .rows
            .iter()
            .map(|row| row.get(idx).map_or("", String::as_str))
            .collect())
    }

    /// A numeric column; empty cells are missing.
    pub fn real_column(&self, name: &str) -> Result<Vec<Option<f64>>> {
        self.column(name)?
            .into_iter()
            .map(|cell| {
                let cell = cell.trim();
                if cell.is_empty() {
                    return Ok(None);
                }
                cell.parse::<f64>().map(Some).map_err(|e| FtuError::ColumnError {
                    column: name.to_string(),
                    message: format!("'{}' is not a number: {}", cell, e),
                })
            })
            .collect()
    }

    /// A date column parsed with the column's declared format.
    pub fn date_column(&self, name: &str) -> Result<Vec<NaiveDateTime>> {
        let idx = self.column_index(name)?;
        let format = self
            .formats
            .get(idx)
            .filter(|f| !f.is_empty())
            .map_or(OMS_DATE_FORMAT, String::as_str);
        let chrono_format = oms_to_chrono_format(format);

        self.column(name)?
            .into_iter()
            .map(|cell| {
                parse_timestamp(cell.trim(), &chrono_format).ok_or_else(|| FtuError::ColumnError {
                    column: name.to_string(),
                    message: format!("'{}' does not match date format '{}'", cell, format),
                })
            })
            .collect()
    }

    /// Writes the table in OMS format.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if self.columns.is_empty() {
            return Err(FtuError::NoColumns);
        }

        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "@Table, {}", self.header)?;
        for (key, value) in &self.metadata {
            writeln!(out, "{},{}", key, value.joined())?;
        }
        writeln!(out, "Type,{}", self.dtypes.join(","))?;
        writeln!(out, "Format,{}", self.formats.join(","))?;
        writeln!(out, "@Header,{}", self.columns.join(","))?;

        {
            let mut rows = csv::WriterBuilder::new()
                .has_headers(false)
                .flexible(true)
                .terminator(csv::Terminator::Any(b'\n'))
                .from_writer(&mut out);
            for row in &self.rows {
                rows.write_record(std::iter::once("").chain(row.iter().map(String::as_str)))?;
            }
            rows.flush()?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Translates an OMS (Java-style) date pattern to a chrono format string.
pub fn oms_to_chrono_format(format: &str) -> String {
    [
        ("yyyy", "%Y"),
        ("MM", "%m"),
        ("dd", "%d"),
        ("HH", "%H"),
        ("mm", "%M"),
        ("ss", "%S"),
    ]
    .iter()
    .fold(format.to_string(), |acc, (from, to)| acc.replace(from, to))
}

fn parse_timestamp(cell: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(cell, format).ok().or_else(|| {
        NaiveDate::parse_from_str(cell, format)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
}

fn parse_metadata_line(line: &str) -> (String, MetadataValue) {
    let mut parts = line.split(',').map(str::trim);
    let key = parts.next().unwrap_or_default().to_string();
    let values: Vec<String> = parts.map(str::to_string).collect();
    match <[String; 1]>::try_from(values) {
        Ok([value]) => (key, MetadataValue::Single(value)),
        Err(values) => (key, MetadataValue::List(values)),
    }
}

/// Reads an OMS table from a file.
pub fn read_oms_table<P: AsRef<Path>>(path: P) -> Result<OmsTable> {
    let text = fs::read_to_string(path)?;
    let mut lines = text.lines();

    let header = lines
        .next()
        .and_then(|line| TABLE_LINE.captures(line))
        .and_then(|caps| caps.get(2))
        .map_or_else(|| DEFAULT_HEADER.to_string(), |m| m.as_str().to_string());

    let mut metadata = Vec::new();
    let mut columns: Option<Vec<String>> = None;
    let mut data_start = None;
    let mut consumed = 1;

    for line in lines {
        if line.starts_with(',') {
            data_start = Some(consumed);
            break;
        }
        consumed += 1;
        if line.trim().is_empty() {
            continue;
        }
        if HEADER_LINE.is_match(line) {
            columns = Some(line.split(',').skip(1).map(|h| h.trim().to_string()).collect());
        } else {
            metadata.push(parse_metadata_line(line));
        }
    }

    let mut rows = Vec::new();
    if let Some(start) = data_start {
        let body = text.lines().skip(start).collect::<Vec<_>>().join("\n");
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(body.as_bytes());
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().skip(1).map(str::to_string).collect::<Vec<_>>());
        }
    }

    let columns = columns.unwrap_or_else(|| {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        (0..width).map(|i| format!("Column {}", i)).collect()
    });

    let mut take = |key: &str| -> Vec<String> {
        metadata
            .iter()
            .position(|(k, _)| k == key)
            .map(|i| metadata.remove(i).1.into_list())
            .unwrap_or_default()
    };
    let formats = take("Format");
    let dtypes = take("Type");

    log::debug!(
        "read OMS table '{}' with {} columns and {} rows",
        header,
        columns.len(),
        rows.len()
    );

    Ok(OmsTable {
        header,
        metadata,
        columns,
        dtypes,
        formats,
        rows,
    })
}

/// Formats a real value the way the driver's tables carry them; NaN is empty.
fn format_real(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        format!("{:?}", value)
    }
}

/// Writes a time series to an OMS table.
///
/// `data` is `(time, column)`; columns are named `value_<i>` and typed `Real`.
pub fn write_oms<P: AsRef<Path>>(
    path: P,
    dates: &[NaiveDateTime],
    data: ArrayView2<f64>,
) -> Result<()> {
    if dates.len() != data.nrows() {
        return Err(FtuError::invalid_input(format!(
            "{} dates for {} rows",
            dates.len(),
            data.nrows()
        )));
    }

    let n = data.ncols();
    let columns = std::iter::once("timestamp".to_string())
        .chain((0..n).map(|i| format!("value_{}", i)))
        .collect();
    let dtypes = std::iter::once(OmsType::Date)
        .chain(std::iter::repeat(OmsType::Real).take(n))
        .map(|t| t.as_str().to_string())
        .collect();
    let formats = std::iter::once(OMS_DATE_FORMAT.to_string())
        .chain(std::iter::repeat(String::new()).take(n))
        .collect();
    let ids = std::iter::once(String::new())
        .chain((0..n).map(|i| i.to_string()))
        .collect();

    let rows = dates
        .iter()
        .zip(data.rows())
        .map(|(date, row)| {
            std::iter::once(date.format("%Y-%m-%d %H:%M").to_string())
                .chain(row.iter().map(|&v| format_real(v)))
                .collect()
        })
        .collect();

    OmsTable::new(columns, rows)
        .with_metadata("ID", MetadataValue::List(ids))
        .with_dtypes(dtypes)
        .with_formats(formats)
        .write(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_oms_date_format() {
        assert_eq!(oms_to_chrono_format(OMS_DATE_FORMAT), "%Y-%m-%d %H:%M");
        assert_eq!(oms_to_chrono_format("dd/MM/yyyy HH:mm:ss"), "%d/%m/%Y %H:%M:%S");
    }

    #[test]
    fn metadata_lines_split_into_single_or_list() {
        assert_eq!(
            parse_metadata_line("Created, 2024-01-01"),
            ("Created".to_string(), MetadataValue::Single("2024-01-01".to_string()))
        );
        assert_eq!(
            parse_metadata_line("ID,,0,1"),
            (
                "ID".to_string(),
                MetadataValue::List(vec!["".to_string(), "0".to_string(), "1".to_string()])
            )
        );
    }

    #[test]
    fn reals_keep_a_decimal_point() {
        assert_eq!(format_real(1.0), "1.0");
        assert_eq!(format_real(-0.25), "-0.25");
        assert_eq!(format_real(f64::NAN), "");
    }

    #[test]
    fn table_line_regex_takes_name() {
        let caps = TABLE_LINE.captures("@T, my table").unwrap();
        assert_eq!(&caps[2], "my table");
        assert!(TABLE_LINE.captures("Table, nope").is_none());
    }
}
