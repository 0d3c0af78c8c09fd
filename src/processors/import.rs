//! Geocode address sheet rows into entries.
//!
//! Every row is looked up on the rayon pool. All outcomes are collected, in
//! row order, before anything is returned, so callers apply an import to the
//! store in one step instead of row by row.

use std::path::Path;

use rayon::prelude::*;

use crate::config::EntryDefaults;
use crate::core::entry::LocatedEntry;
use crate::core::loaders::{load_csv_rows, CsvRow, LoaderError};
use crate::geocode::Geocoder;

/// Outcome of geocoding a batch of rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    /// Resolved entries in sheet order
    pub entries: Vec<LocatedEntry>,
    /// Addresses that could not be resolved, in sheet order
    pub dropped: Vec<String>,
}

impl ImportReport {
    /// Number of rows the report was built from.
    pub fn rows_seen(&self) -> usize {
        self.entries.len() + self.dropped.len()
    }
}

/// Geocode `rows`, dropping any whose address is blank or unresolvable.
pub fn geocode_rows<G: Geocoder + ?Sized>(rows: Vec<CsvRow>, geocoder: &G) -> ImportReport {
    let outcomes: Vec<Result<LocatedEntry, String>> = rows
        .into_par_iter()
        .map(|row| {
            if row.address.is_empty() {
                return Err(row.address);
            }
            match geocoder.resolve(&row.address) {
                Some(position) => Ok(row.into_entry(position)),
                None => Err(row.address),
            }
        })
        .collect();

    let mut report = ImportReport::default();
    for outcome in outcomes {
        match outcome {
            Ok(entry) => report.entries.push(entry),
            Err(address) => report.dropped.push(address),
        }
    }

    if !report.dropped.is_empty() {
        log::warn!(
            "dropped {} of {} rows that could not be geocoded",
            report.dropped.len(),
            report.rows_seen()
        );
    }
    report
}

/// Read an address sheet and geocode every row.
///
/// # Errors
///
/// Returns an error only if the sheet itself cannot be read. Individual
/// geocoding failures are reported in [`ImportReport::dropped`].
pub fn import_csv<G: Geocoder + ?Sized>(
    path: &Path,
    defaults: &EntryDefaults,
    geocoder: &G,
) -> Result<ImportReport, LoaderError> {
    let rows = load_csv_rows(path, defaults)?;
    log::info!("{}: read {} rows", path.display(), rows.len());
    Ok(geocode_rows(rows, geocoder))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::Position;
    use crate::core::loaders::read_csv_rows;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn lookup(address: &str) -> Option<Position> {
        match address {
            "North Depot" => Some(Position::new(1.0, 1.0)),
            "South Depot" => Some(Position::new(-1.0, -1.0)),
            "East Depot" => Some(Position::new(0.0, 2.0)),
            _ => None,
        }
    }

    fn sheet_rows(csv: &str) -> Vec<CsvRow> {
        read_csv_rows(csv.as_bytes(), &EntryDefaults::default()).unwrap()
    }

    #[test]
    fn test_failed_rows_are_dropped_and_order_kept() {
        let rows = sheet_rows(
            "address,numOfCars\nNorth Depot,3\nNowhere,9\nSouth Depot,\n,4\nEast Depot,2\n",
        );
        let report = geocode_rows(rows, &lookup);

        let names: Vec<&str> = report.entries.iter().map(|e| e.address.as_str()).collect();
        assert_eq!(names, vec!["North Depot", "South Depot", "East Depot"]);
        assert_eq!(report.entries[0].position, Position::new(1.0, 1.0));
        assert_eq!(report.entries[0].count, Some(3));
        assert_eq!(report.entries[1].count, None);
        assert_eq!(report.dropped, vec!["Nowhere".to_string(), String::new()]);
        assert_eq!(report.rows_seen(), 5);
    }

    #[test]
    fn test_blank_address_is_never_looked_up() {
        let calls = AtomicUsize::new(0);
        let counting = |address: &str| {
            calls.fetch_add(1, Ordering::SeqCst);
            lookup(address)
        };
        let report = geocode_rows(sheet_rows("address,tag\n,x\n  ,y\nNorth Depot,z\n"), &counting);
        assert_eq!(report.entries.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_import_csv_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sheet.csv");
        std::fs::write(&path, "address,radius\nNorth Depot,800\nEast Depot,\n").unwrap();

        let report = import_csv(&path, &EntryDefaults::default(), &lookup).unwrap();
        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.entries[0].radius, 800.0);
        assert_eq!(report.entries[1].radius, 5000.0);
        assert!(report.dropped.is_empty());
    }

    #[test]
    fn test_import_csv_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = import_csv(&dir.path().join("absent.csv"), &EntryDefaults::default(), &lookup);
        assert!(result.is_err());
    }
}
