//! The map session: single owner of the point store and the hub settings.
//!
//! Every mutation goes through [`MapSession`] and ends with an explicit call
//! to [`MapSession::recompute`], so [`MapSession::hubs`] always reflects the
//! current store, threshold and radius override.

use crate::config::{HubConfig, ImportMode};
use crate::core::entry::{EntryPatch, LocatedEntry};
use crate::core::geo::Position;
use crate::core::store::{PointStore, Result};
use crate::processors::clustering::{compute_hubs, HubCluster};
use crate::processors::import::ImportReport;
use crate::processors::probe::{probe, ClickAggregate};
use crate::processors::radius::apply_radius_override;

/// Controller owning the store, the hub threshold and the radius override.
#[derive(Debug, Clone, Default)]
pub struct MapSession {
    store: PointStore,
    threshold: Option<f64>,
    radius_override: Option<f64>,
    hubs: Vec<HubCluster>,
}

impl MapSession {
    /// Creates an empty session with clustering disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session from persisted entries and the configured threshold.
    ///
    /// Stored radii are taken as they are. The configured radius override is
    /// a query-time setting and is left to the caller.
    pub fn with_entries(entries: Vec<LocatedEntry>, config: &HubConfig) -> Self {
        let mut session = Self {
            store: PointStore::from_entries(entries),
            threshold: config.threshold,
            radius_override: None,
            hubs: Vec::new(),
        };
        session.recompute();
        session
    }

    #[inline]
    pub fn entries(&self) -> &[LocatedEntry] {
        self.store.entries()
    }

    #[inline]
    pub fn store(&self) -> &PointStore {
        &self.store
    }

    #[inline]
    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    #[inline]
    pub fn radius_override(&self) -> Option<f64> {
        self.radius_override
    }

    /// Hubs computed after the most recent mutation.
    #[inline]
    pub fn hubs(&self) -> &[HubCluster] {
        &self.hubs
    }

    /// Recomputes hubs from the current store and threshold.
    pub fn recompute(&mut self) {
        self.hubs = compute_hubs(self.store.entries(), self.threshold);
    }

    /// Appends a geocoded entry and returns its index.
    pub fn add(&mut self, entry: LocatedEntry) -> usize {
        let index = self.store.push(entry);
        self.recompute();
        index
    }

    /// Applies independent field edits to one entry.
    pub fn edit(&mut self, index: usize, patch: &EntryPatch) -> Result<LocatedEntry> {
        let updated = self.store.update(index, patch)?.clone();
        self.recompute();
        Ok(updated)
    }

    /// Removes one entry.
    pub fn remove(&mut self, index: usize) -> Result<LocatedEntry> {
        let removed = self.store.remove(index)?;
        self.recompute();
        Ok(removed)
    }

    /// Replaces the whole list, as on load or a replacing import.
    pub fn replace_all(&mut self, entries: Vec<LocatedEntry>) -> Vec<LocatedEntry> {
        let previous = self.store.replace_all(entries);
        self.recompute();
        previous
    }

    /// Applies an import result in one step according to `mode`.
    pub fn apply_import(&mut self, report: ImportReport, mode: ImportMode) {
        match mode {
            ImportMode::Replace => {
                self.store.replace_all(report.entries);
            }
            ImportMode::Append => self.store.extend(report.entries),
        }
        self.recompute();
    }

    /// Sets or clears the hub threshold.
    pub fn set_threshold(&mut self, threshold: Option<f64>) {
        self.threshold = threshold;
        self.recompute();
    }

    /// Sets or clears the radius override.
    ///
    /// A finite, non-negative value is applied to every stored entry at once.
    /// Entries added later keep their own radius until the override is set
    /// again. Any other value is ignored and leaves the current override in
    /// place.
    pub fn set_radius_override(&mut self, radius: Option<f64>) {
        match radius {
            Some(r) if r.is_finite() && r >= 0.0 => {
                self.radius_override = Some(r);
                apply_radius_override(self.store.entries_mut(), r);
            }
            Some(r) => log::warn!("ignoring invalid radius override {}", r),
            None => self.radius_override = None,
        }
        self.recompute();
    }

    /// Total count covering `position`.
    pub fn probe(&self, position: Position) -> ClickAggregate {
        probe(self.store.entries(), position)
    }

    /// Consumes the session, returning its entries.
    pub fn into_entries(self) -> Vec<LocatedEntry> {
        self.store.into_entries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, lat: f64, lng: f64, count: u64) -> LocatedEntry {
        LocatedEntry::new(name, Position::new(lat, lng))
            .with_radius(2000.0)
            .with_count(count)
    }

    fn session_with_threshold(threshold: f64) -> MapSession {
        MapSession::with_entries(
            Vec::new(),
            &HubConfig {
                threshold: Some(threshold),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_hubs_follow_every_mutation() {
        let mut session = session_with_threshold(5.0);
        assert!(session.hubs().is_empty());

        session.add(entry("a", 0.0, 0.0, 3));
        assert!(session.hubs().is_empty());

        session.add(entry("b", 0.0, 0.01, 4));
        assert_eq!(session.hubs().len(), 1);
        assert_eq!(session.hubs()[0].total_count, 7);

        let patch = EntryPatch {
            count: Some(Some(1)),
            ..Default::default()
        };
        session.edit(1, &patch).unwrap();
        assert!(session.hubs().is_empty());

        session.set_threshold(Some(3.5));
        assert_eq!(session.hubs().len(), 1);

        session.remove(0).unwrap();
        assert!(session.hubs().is_empty());

        session.set_threshold(None);
        session.replace_all(vec![entry("c", 5.0, 5.0, 50)]);
        assert!(session.hubs().is_empty());
    }

    #[test]
    fn test_with_entries_computes_immediately() {
        let session = MapSession::with_entries(
            vec![entry("a", 0.0, 0.0, 3), entry("b", 0.0, 0.01, 4)],
            &HubConfig {
                threshold: Some(5.0),
                ..Default::default()
            },
        );
        assert_eq!(session.hubs().len(), 1);
    }

    #[test]
    fn test_with_entries_keeps_stored_radii() {
        let session = MapSession::with_entries(
            vec![entry("a", 0.0, 0.0, 3), entry("b", 0.0, 0.01, 4)],
            &HubConfig {
                threshold: Some(5.0),
                radius_override: Some(100.0),
                ..Default::default()
            },
        );
        assert!(session.entries().iter().all(|e| e.radius == 2000.0));
        assert_eq!(session.radius_override(), None);
        assert_eq!(session.hubs().len(), 1);
    }

    #[test]
    fn test_radius_override_changes_grouping() {
        let mut session = session_with_threshold(5.0);
        session.replace_all(vec![entry("a", 0.0, 0.0, 3), entry("b", 0.0, 0.01, 4)]);
        assert_eq!(session.hubs().len(), 1);

        // ~1112 m apart, no longer within reach
        session.set_radius_override(Some(500.0));
        assert!(session.entries().iter().all(|e| e.radius == 500.0));
        assert!(session.hubs().is_empty());

        // later additions keep their own radius
        session.add(entry("c", 3.0, 3.0, 1));
        assert_eq!(session.entries()[2].radius, 2000.0);

        session.set_radius_override(Some(f64::NAN));
        assert_eq!(session.radius_override(), Some(500.0));
        assert_eq!(session.entries()[2].radius, 2000.0);

        session.set_radius_override(None);
        assert_eq!(session.radius_override(), None);
        assert_eq!(session.entries()[0].radius, 500.0);
    }

    #[test]
    fn test_radius_override_on_empty_session() {
        let mut session = MapSession::new();
        session.set_radius_override(Some(750.0));
        assert!(session.entries().is_empty());
        assert!(session.hubs().is_empty());
    }

    #[test]
    fn test_apply_import_modes() {
        let mut session = session_with_threshold(5.0);
        session.add(entry("old", 10.0, 10.0, 1));

        let report = ImportReport {
            entries: vec![entry("a", 0.0, 0.0, 3), entry("b", 0.0, 0.01, 4)],
            dropped: vec!["nowhere".into()],
        };

        let mut appended = session.clone();
        appended.apply_import(report.clone(), ImportMode::Append);
        assert_eq!(appended.entries().len(), 3);
        assert_eq!(appended.hubs()[0].members, vec![1, 2]);

        session.apply_import(report, ImportMode::Replace);
        assert_eq!(session.entries().len(), 2);
        assert_eq!(session.entries()[0].address, "a");
        assert_eq!(session.hubs()[0].members, vec![0, 1]);
    }

    #[test]
    fn test_probe_and_errors() {
        let mut session = MapSession::new();
        session.add(entry("a", 0.0, 0.0, 3));
        assert_eq!(session.probe(Position::new(0.0, 0.0)).total_count, 3);
        assert!(session.remove(4).is_err());
        assert!(session.edit(4, &EntryPatch::default()).is_err());
    }
}
