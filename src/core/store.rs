//! The ordered point store.

use thiserror::Error;

use super::entry::{EntryPatch, LocatedEntry};

/// Errors raised by store mutations.
#[derive(Error, Debug, PartialEq)]
pub enum StoreError {
    #[error("entry index {index} out of range (store holds {len} entries)")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Ordered collection of located entries.
///
/// Order is significant: hub clustering seeds groups in store order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointStore {
    entries: Vec<LocatedEntry>,
}

impl PointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<LocatedEntry>) -> Self {
        Self { entries }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn entries(&self) -> &[LocatedEntry] {
        &self.entries
    }

    /// Mutable access to all entries for bulk transforms.
    #[inline]
    pub fn entries_mut(&mut self) -> &mut [LocatedEntry] {
        &mut self.entries
    }

    pub fn get(&self, index: usize) -> Option<&LocatedEntry> {
        self.entries.get(index)
    }

    /// Appends an entry and returns its index.
    pub fn push(&mut self, entry: LocatedEntry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    /// Appends several entries, keeping their order.
    pub fn extend<I: IntoIterator<Item = LocatedEntry>>(&mut self, entries: I) {
        self.entries.extend(entries);
    }

    /// Applies `patch` to the entry at `index`.
    pub fn update(&mut self, index: usize, patch: &EntryPatch) -> Result<&LocatedEntry> {
        let len = self.entries.len();
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(StoreError::IndexOutOfRange { index, len })?;
        patch.apply_to(entry);
        Ok(entry)
    }

    /// Removes and returns the entry at `index`, shifting later entries down.
    pub fn remove(&mut self, index: usize) -> Result<LocatedEntry> {
        if index >= self.entries.len() {
            return Err(StoreError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        Ok(self.entries.remove(index))
    }

    /// Replaces the whole list, returning the previous one.
    pub fn replace_all(&mut self, entries: Vec<LocatedEntry>) -> Vec<LocatedEntry> {
        std::mem::replace(&mut self.entries, entries)
    }

    /// Consumes the store, returning its entries.
    pub fn into_entries(self) -> Vec<LocatedEntry> {
        self.entries
    }
}
