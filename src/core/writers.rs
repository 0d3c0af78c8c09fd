//! Data writers for the JSON entry list and CSV address sheets.
//!
//! - JSON: the persisted entry list, written atomically via a per-write temp file
//! - CSV: the address sheet export, one row per entry without coordinates

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use thiserror::Error;

use super::entry::{LocatedEntry, DEFAULT_RADIUS_M};
use super::loaders::CSV_COLUMNS;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// JSON encoding error.
    #[error("JSON encode error for '{path}': {source}")]
    JsonError {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Creates a buffered writer for the given path.
fn create_buffered_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(BufWriter::new(file))
}

/// Directory holding `path`, `.` for a bare file name.
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Write the entry list as a pretty-printed JSON array.
///
/// Each call writes to its own temp file next to `path` and renames it over
/// `path`, so a reader never observes a half-written file and concurrent
/// writers never share a temp file. The last rename wins.
///
/// # Errors
///
/// Returns an error if the directory, temp file or rename fails.
pub fn write_entries_json(path: &Path, entries: &[LocatedEntry]) -> Result<()> {
    ensure_parent_dirs(path)?;
    let dir = parent_dir(path);
    let path_str = path.display().to_string();

    let tmp = NamedTempFile::new_in(dir).map_err(|e| WriteError::CreateFile {
        path: dir.display().to_string(),
        source: e,
    })?;
    let mut writer = BufWriter::new(tmp);
    serde_json::to_writer_pretty(&mut writer, entries).map_err(|e| WriteError::JsonError {
        path: path_str.clone(),
        source: e,
    })?;
    let tmp = writer.into_inner().map_err(|e| WriteError::WriteFile {
        path: path_str.clone(),
        source: e.into_error(),
    })?;

    tmp.persist(path).map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e.error,
    })?;
    Ok(())
}

/// Create the data file as an empty JSON array if it does not exist yet.
///
/// Returns true if the file was created.
pub fn ensure_data_file(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    write_entries_json(path, &[])?;
    Ok(true)
}

/// Write entries as an address sheet to any writer.
///
/// Columns follow [`CSV_COLUMNS`]. A zero radius is exported as the default
/// radius and a missing count as an empty cell.
pub fn write_entries_csv_to<W: Write>(sink: W, entries: &[LocatedEntry]) -> csv::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(sink);
    csv_writer.write_record(CSV_COLUMNS)?;

    for entry in entries {
        let radius = if entry.radius == 0.0 {
            DEFAULT_RADIUS_M
        } else {
            entry.radius
        };
        csv_writer.write_record(&[
            entry.address.clone(),
            entry.display.tag.clone(),
            entry.display.circle_color.clone(),
            entry.display.dot_color.clone(),
            radius.to_string(),
            entry.count.map(|c| c.to_string()).unwrap_or_default(),
            entry.display.show_circle.to_string(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Write entries as an address sheet file.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_entries_csv(path: &Path, entries: &[LocatedEntry]) -> Result<()> {
    ensure_parent_dirs(path)?;
    let writer = create_buffered_writer(path)?;
    write_entries_csv_to(writer, entries).map_err(|e| WriteError::CsvError {
        path: path.display().to_string(),
        source: e,
    })
}
