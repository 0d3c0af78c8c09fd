//! Greedy hub clustering over located entries.
//!
//! A hub is a group of entries around a seed whose combined car count exceeds
//! a threshold. Groups are formed in a single pass over the store:
//!
//! 1. Seeds are visited in store order; entries already claimed by an emitted
//!    hub are skipped.
//! 2. Every other unclaimed entry strictly closer to the seed than the
//!    **seed's** radius joins the group. The candidate's own radius plays no
//!    part, so reach is asymmetric.
//! 3. If the group's summed count strictly exceeds the threshold, the hub is
//!    emitted and all members are claimed. Otherwise the group is dropped and
//!    its members stay available to later seeds.
//!
//! The result depends only on input order. Reordering the store can change
//! which seed absorbs which entry.
//!
//! # Example
//!
//! ```
//! use hub_mapper::core::{LocatedEntry, Position};
//! use hub_mapper::processors::clustering::compute_hubs;
//!
//! let entries = vec![
//!     LocatedEntry::new("a", Position::new(0.0, 0.0)).with_radius(2000.0).with_count(3),
//!     LocatedEntry::new("b", Position::new(0.0, 0.01)).with_count(4),
//! ];
//! let hubs = compute_hubs(&entries, Some(5.0));
//! assert_eq!(hubs.len(), 1);
//! assert_eq!(hubs[0].total_count, 7);
//! ```

use serde::Serialize;

use crate::core::entry::LocatedEntry;
use crate::core::geo::{centroid, Position};

/// A group of entries whose combined count exceeded the threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HubCluster {
    /// Unweighted mean of member latitudes and longitudes.
    pub centroid: Position,
    /// Store indices of the members, seed first.
    pub members: Vec<usize>,
    /// Sum of member counts, saturating at `u64::MAX`.
    pub total_count: u64,
}

impl HubCluster {
    /// Store index of the entry that seeded this hub.
    #[inline]
    pub fn seed(&self) -> usize {
        self.members[0]
    }
}

/// Returns the threshold if it enables clustering.
///
/// Absent, non-finite and non-positive thresholds all disable clustering.
#[inline]
pub fn active_threshold(threshold: Option<f64>) -> Option<f64> {
    threshold.filter(|t| t.is_finite() && *t > 0.0)
}

/// Partition entries into hubs whose summed count exceeds `threshold`.
///
/// # Arguments
///
/// * `entries` - Entries in store order
/// * `threshold` - Minimum combined count (exclusive); `None` disables clustering
///
/// # Returns
///
/// Emitted hubs in seed order. Empty when clustering is disabled or nothing
/// qualifies.
///
/// # Performance
///
/// O(n²) distance evaluations in the worst case. Lists are small.
pub fn compute_hubs(entries: &[LocatedEntry], threshold: Option<f64>) -> Vec<HubCluster> {
    let Some(threshold) = active_threshold(threshold) else {
        return Vec::new();
    };

    let n = entries.len();
    let mut claimed = vec![false; n];
    let mut hubs = Vec::new();

    for i in 0..n {
        if claimed[i] {
            continue;
        }
        let seed = &entries[i];

        let mut members = vec![i];
        for j in 0..n {
            if j == i || claimed[j] {
                continue;
            }
            if seed.position.distance_to(&entries[j].position) < seed.radius {
                members.push(j);
            }
        }

        let total_count = members
            .iter()
            .map(|&m| entries[m].effective_count())
            .fold(0u64, u64::saturating_add);
        if (total_count as f64) <= threshold {
            continue;
        }

        for &m in &members {
            claimed[m] = true;
        }
        let Some(center) = centroid(members.iter().map(|&m| &entries[m].position)) else {
            continue;
        };
        log::debug!(
            "hub seeded at #{} with {} members, count {}",
            i,
            members.len(),
            total_count
        );
        hubs.push(HubCluster {
            centroid: center,
            members,
            total_count,
        });
    }

    hubs
}
