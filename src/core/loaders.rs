//! Data loaders for the JSON entry list and CSV address sheets.
//!
//! This module provides parsers for:
//! - The persisted entry list (a JSON array of located entries)
//! - Address CSV sheets (one row per address, geocoded later during import)

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use thiserror::Error;

use super::entry::{parse_count, DisplayAttributes, LocatedEntry};
use super::geo::Position;
use crate::config::EntryDefaults;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON parsing error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing required columns: {0}")]
    MissingColumns(String),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Column names of the address sheet, in export order.
pub const CSV_COLUMNS: [&str; 7] = [
    "address",
    "tag",
    "circleColor",
    "dotColor",
    "radius",
    "numOfCars",
    "showCircle",
];

/// One address sheet row with every default already applied.
///
/// A row carries no coordinates; it becomes a [`LocatedEntry`] only once its
/// address has been geocoded.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRow {
    pub address: String,
    pub tag: String,
    pub circle_color: String,
    pub dot_color: String,
    pub radius: f64,
    pub count: Option<u64>,
    pub show_circle: bool,
}

impl CsvRow {
    /// Builds a row from raw cell values, defaulting blank or malformed cells.
    ///
    /// - `radius`: leading integer; missing, unparsable or zero → default radius
    /// - `numOfCars`: leading integer, otherwise no count
    /// - `showCircle`: hidden only when the cell is literally `false`
    pub fn from_cells(cells: &HashMap<&str, &str>, defaults: &EntryDefaults) -> Self {
        let cell = |name: &str| cells.get(name).copied().unwrap_or("");
        let or_default = |value: &str, default: &str| {
            if value.is_empty() {
                default.to_string()
            } else {
                value.to_string()
            }
        };

        let radius = match parse_count(cell("radius")) {
            Some(r) if r > 0 => r as f64,
            _ => defaults.radius_m,
        };

        Self {
            address: cell("address").trim().to_string(),
            tag: cell("tag").to_string(),
            circle_color: or_default(cell("circleColor"), &defaults.circle_color),
            dot_color: or_default(cell("dotColor"), &defaults.dot_color),
            radius,
            count: parse_count(cell("numOfCars")),
            show_circle: cell("showCircle") != "false",
        }
    }

    /// Attaches a resolved position, producing a storable entry.
    pub fn into_entry(self, position: Position) -> LocatedEntry {
        LocatedEntry {
            address: self.address,
            position,
            radius: self.radius,
            count: self.count,
            display: DisplayAttributes {
                tag: self.tag,
                circle_color: self.circle_color,
                dot_color: self.dot_color,
                show_circle: self.show_circle,
                ..Default::default()
            },
        }
    }
}

/// Load the persisted entry list from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a JSON array of entries.
pub fn load_entries_json<P: AsRef<Path>>(path: P) -> Result<Vec<LocatedEntry>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| LoaderError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Read address rows from any CSV source.
///
/// Headers are matched case-insensitively. Empty lines are skipped and short
/// rows are padded with blanks, so only a missing `address` header is an error.
pub fn read_csv_rows<R: Read>(source: R, defaults: &EntryDefaults) -> Result<Vec<CsvRow>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(source);

    // Map lowercase header name -> column index
    let headers = reader.headers()?.clone();
    let col_map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim().to_lowercase(), i))
        .collect();

    if !col_map.contains_key("address") {
        return Err(LoaderError::MissingColumns("address".to_string()));
    }

    let columns: Vec<(&str, Option<usize>)> = CSV_COLUMNS
        .iter()
        .map(|name| (*name, col_map.get(&name.to_lowercase()).copied()))
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        let cells: HashMap<&str, &str> = columns
            .iter()
            .filter_map(|(name, idx)| idx.and_then(|i| record.get(i)).map(|v| (*name, v)))
            .collect();
        rows.push(CsvRow::from_cells(&cells, defaults));
    }

    Ok(rows)
}

/// Read address rows from a CSV file.
pub fn load_csv_rows<P: AsRef<Path>>(path: P, defaults: &EntryDefaults) -> Result<Vec<CsvRow>> {
    let file = File::open(path.as_ref())?;
    read_csv_rows(BufReader::new(file), defaults)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn rows(csv: &str) -> Vec<CsvRow> {
        read_csv_rows(csv.as_bytes(), &EntryDefaults::default()).unwrap()
    }

    #[test]
    fn test_read_full_row() {
        let parsed = rows(
            "address,tag,circleColor,dotColor,radius,numOfCars,showCircle\n\
             10 Downing St,gov,blue,purple,1500,12,true\n",
        );
        assert_eq!(parsed.len(), 1);
        let row = &parsed[0];
        assert_eq!(row.address, "10 Downing St");
        assert_eq!(row.tag, "gov");
        assert_eq!(row.circle_color, "blue");
        assert_eq!(row.dot_color, "purple");
        assert_eq!(row.radius, 1500.0);
        assert_eq!(row.count, Some(12));
        assert!(row.show_circle);
    }

    #[test]
    fn test_blank_cells_take_defaults() {
        let parsed = rows("address,tag,circleColor,dotColor,radius,numOfCars,showCircle\nSomewhere,,,,,,\n");
        let row = &parsed[0];
        assert_eq!(row.tag, "");
        assert_eq!(row.circle_color, "red");
        assert_eq!(row.dot_color, "black");
        assert_eq!(row.radius, 5000.0);
        assert_eq!(row.count, None);
        assert!(row.show_circle);
    }

    #[test]
    fn test_malformed_numbers_are_defaulted() {
        let parsed = rows("address,radius,numOfCars\nA,wide,lots\nB,0,7 cars\nC,-20,\n");
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0].radius, 5000.0);
        assert_eq!(parsed[0].count, None);
        assert_eq!(parsed[1].radius, 5000.0);
        assert_eq!(parsed[1].count, Some(7));
        assert_eq!(parsed[2].radius, 5000.0);
    }

    #[test]
    fn test_show_circle_only_hidden_by_literal_false() {
        let parsed = rows("address,showCircle\nA,false\nB,FALSE\nC,0\nD,no\n");
        let flags: Vec<bool> = parsed.iter().map(|r| r.show_circle).collect();
        assert_eq!(flags, vec![false, true, true, true]);
    }

    #[test]
    fn test_missing_columns_and_empty_lines() {
        let parsed = rows("Address,numOfCars\nA,1\n\nB\n");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].address, "B");
        assert_eq!(parsed[1].count, None);
    }

    #[test]
    fn test_missing_address_header() {
        let result = read_csv_rows("tag,radius\nx,1\n".as_bytes(), &EntryDefaults::default());
        assert!(matches!(result, Err(LoaderError::MissingColumns(_))));
    }

    #[test]
    fn test_into_entry() {
        let row = rows("address,tag,numOfCars\nA,t,4\n").remove(0);
        let entry = row.into_entry(Position::new(1.0, 2.0));
        assert_eq!(entry.position, Position::new(1.0, 2.0));
        assert_eq!(entry.count, Some(4));
        assert_eq!(entry.display.tag, "t");
    }

    #[test]
    fn test_load_entries_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.json");
        let mut file = File::create(&path).unwrap();
        writeln!(
            file,
            r#"[{{"address":"A","coordinates":{{"lat":1.0,"lng":2.0}},"radius":100,"numOfCars":"3"}}]"#
        )
        .unwrap();

        let entries = load_entries_json(&path).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].count, Some(3));
    }

    #[test]
    fn test_load_entries_json_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_entries_json(&path), Err(LoaderError::Json { .. })));
        assert!(matches!(
            load_entries_json(temp_dir.path().join("missing.json")),
            Err(LoaderError::Io(_))
        ));
    }

    #[test]
    fn test_load_csv_rows_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sheet.csv");
        std::fs::write(&path, "address,numOfCars\nA,2\nB,5\n").unwrap();
        let parsed = load_csv_rows(&path, &EntryDefaults::default()).unwrap();
        assert_eq!(parsed.len(), 2);
    }
}
