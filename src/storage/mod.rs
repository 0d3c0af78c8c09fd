//! Whole-list persistence of the entry list.
//!
//! A repository only knows two operations: read everything and replace
//! everything. There is no versioning; the last writer wins.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::core::entry::LocatedEntry;
use crate::core::loaders::{load_entries_json, LoaderError};
use crate::core::writers::{ensure_data_file, write_entries_json, WriteError};

/// Errors raised by repositories.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("failed to read entries: {0}")]
    Load(#[from] LoaderError),

    #[error("failed to write entries: {0}")]
    Save(#[from] WriteError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server rejected the save: {0}")]
    Rejected(String),
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Whole-list read and write of entries.
pub trait EntryRepository {
    /// Read the complete entry list.
    fn load(&self) -> Result<Vec<LocatedEntry>>;

    /// Replace the complete entry list.
    fn save(&self, entries: &[LocatedEntry]) -> Result<()>;
}

/// Entry list stored as a JSON array in a flat file.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file as `[]` if it does not exist yet.
    pub fn ensure_exists(&self) -> Result<()> {
        if ensure_data_file(&self.path)? {
            log::info!("created empty data file {}", self.path.display());
        }
        Ok(())
    }
}

impl EntryRepository for JsonFileRepository {
    fn load(&self) -> Result<Vec<LocatedEntry>> {
        Ok(load_entries_json(&self.path)?)
    }

    fn save(&self, entries: &[LocatedEntry]) -> Result<()> {
        write_entries_json(&self.path, entries)?;
        log::debug!("saved {} entries to {}", entries.len(), self.path.display());
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    message: String,
}

/// Entry list held by a remote `/addresses` service.
pub struct HttpRepository {
    client: Client,
    url: String,
}

impl HttpRepository {
    /// Points at `{base_url}/addresses`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: addresses_url(base_url),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn addresses_url(base_url: &str) -> String {
    format!("{}/addresses", base_url.trim_end_matches('/'))
}

impl EntryRepository for HttpRepository {
    fn load(&self) -> Result<Vec<LocatedEntry>> {
        let entries = self.client.get(&self.url).send()?.error_for_status()?.json()?;
        Ok(entries)
    }

    fn save(&self, entries: &[LocatedEntry]) -> Result<()> {
        let response = self.client.post(&self.url).json(entries).send()?;
        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status();
        let message = response
            .json::<MessageBody>()
            .map(|body| body.message)
            .unwrap_or_else(|_| status.to_string());
        Err(RepositoryError::Rejected(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::Position;
    use tempfile::TempDir;

    #[test]
    fn test_file_repository_round_trip() {
        let dir = TempDir::new().unwrap();
        let repo = JsonFileRepository::new(dir.path().join("data.json"));

        repo.ensure_exists().unwrap();
        assert!(repo.load().unwrap().is_empty());

        let entries = vec![
            LocatedEntry::new("a", Position::new(1.0, 2.0)).with_count(2),
            LocatedEntry::new("b", Position::new(3.0, 4.0)),
        ];
        repo.save(&entries).unwrap();
        assert_eq!(repo.load().unwrap(), entries);

        // last writer wins
        repo.save(&entries[1..]).unwrap();
        assert_eq!(repo.load().unwrap().len(), 1);
    }

    #[test]
    fn test_file_repository_missing_file() {
        let dir = TempDir::new().unwrap();
        let repo = JsonFileRepository::new(dir.path().join("absent.json"));
        assert!(matches!(repo.load(), Err(RepositoryError::Load(_))));
    }

    #[test]
    fn test_addresses_url() {
        assert_eq!(addresses_url("http://localhost:5000"), "http://localhost:5000/addresses");
        assert_eq!(addresses_url("http://localhost:5000/"), "http://localhost:5000/addresses");
    }
}
