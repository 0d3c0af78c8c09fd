//! Probe aggregation: total car count covering an arbitrary position.
//!
//! An entry covers the probe when the probe lies within the entry's own
//! radius, boundary included (`<=`). Hub clustering uses a strict `<`.

use serde::Serialize;

use crate::core::entry::LocatedEntry;
use crate::core::geo::Position;

/// Result of probing a position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClickAggregate {
    pub probe: Position,
    pub total_count: u64,
}

impl ClickAggregate {
    /// A zero total means there is nothing worth surfacing.
    #[inline]
    pub fn visible(&self) -> bool {
        self.total_count > 0
    }
}

/// Returns true if `probe` is within `entry.radius` meters of the entry.
#[inline]
pub fn covers(entry: &LocatedEntry, probe: &Position) -> bool {
    probe.distance_to(&entry.position) <= entry.radius
}

/// Sum the counts of all entries whose radius covers `probe`.
///
/// Missing counts contribute 0. The total saturates at `u64::MAX`.
pub fn aggregate_at(entries: &[LocatedEntry], probe: &Position) -> u64 {
    entries
        .iter()
        .filter(|entry| covers(entry, probe))
        .map(LocatedEntry::effective_count)
        .fold(0u64, u64::saturating_add)
}

/// Convenience wrapper returning the probe alongside its total.
pub fn probe(entries: &[LocatedEntry], probe: Position) -> ClickAggregate {
    ClickAggregate {
        probe,
        total_count: aggregate_at(entries, &probe),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(lat: f64, lng: f64, radius: f64, count: Option<u64>) -> LocatedEntry {
        let mut e = LocatedEntry::new("x", Position::new(lat, lng)).with_radius(radius);
        e.count = count;
        e
    }

    #[test]
    fn test_probe_at_center_is_included() {
        let entries = vec![entry(10.0, 20.0, 0.0, Some(5))];
        assert_eq!(aggregate_at(&entries, &Position::new(10.0, 20.0)), 5);
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let center = Position::new(0.0, 0.0);
        let probe_pos = Position::new(0.0, 0.01);
        let exact = probe_pos.distance_to(&center);

        let on_edge = vec![entry(0.0, 0.0, exact, Some(3))];
        assert_eq!(aggregate_at(&on_edge, &probe_pos), 3);

        let just_short = vec![entry(0.0, 0.0, exact - 0.001, Some(3))];
        assert_eq!(aggregate_at(&just_short, &probe_pos), 0);
    }

    #[test]
    fn test_overlapping_entries_sum() {
        let entries = vec![
            entry(0.0, 0.0, 2000.0, Some(3)),
            entry(0.0, 0.01, 2000.0, Some(4)),
            entry(0.0, 0.01, 2000.0, None),
            entry(5.0, 5.0, 2000.0, Some(100)),
        ];
        let result = probe(&entries, Position::new(0.0, 0.005));
        assert_eq!(result.total_count, 7);
        assert!(result.visible());
    }

    #[test]
    fn test_each_entry_uses_its_own_radius() {
        let entries = vec![
            entry(0.0, 0.0, 500.0, Some(3)),
            entry(0.0, 0.02, 5000.0, Some(4)),
        ];
        // ~1112 m from the first entry, ~1112 m from the second
        assert_eq!(aggregate_at(&entries, &Position::new(0.0, 0.01)), 4);
    }

    #[test]
    fn test_huge_counts_saturate() {
        let big = entry(0.0, 0.0, 1000.0, Some(u64::MAX));
        let entries = vec![big.clone(), big, entry(0.0, 0.0, 1000.0, Some(1))];
        assert_eq!(aggregate_at(&entries, &Position::new(0.0, 0.0)), u64::MAX);
    }

    #[test]
    fn test_nothing_in_range() {
        let entries = vec![entry(0.0, 0.0, 100.0, Some(3))];
        let result = probe(&entries, Position::new(1.0, 1.0));
        assert_eq!(result.total_count, 0);
        assert!(!result.visible());
        assert_eq!(aggregate_at(&[], &Position::new(0.0, 0.0)), 0);
    }
}
