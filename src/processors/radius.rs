//! Global radius override.

use crate::core::entry::LocatedEntry;

/// Parse an override field value.
///
/// Only finite, non-negative numbers are accepted; anything else means "no
/// override" and must leave entries untouched.
pub fn parse_radius_override(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|r| r.is_finite() && *r >= 0.0)
}

/// Replace every entry's radius with `radius`. No filtering is applied.
pub fn apply_radius_override(entries: &mut [LocatedEntry], radius: f64) {
    for entry in entries.iter_mut() {
        entry.radius = radius;
    }
    log::debug!("radius override {} m applied to {} entries", radius, entries.len());
}
