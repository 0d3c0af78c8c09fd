//! Located entries: one plotted address with its aggregation and display attributes.
//!
//! The serialized form uses the same keys the web front end stores
//! (`coordinates`, `numOfCars`, `circleColor`, ...), so a `data.json` written
//! by either side can be read by the other.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::geo::Position;

/// Radius in meters given to entries that do not specify one.
pub const DEFAULT_RADIUS_M: f64 = 5000.0;

/// Circle fill color given to entries that do not specify one.
pub const DEFAULT_CIRCLE_COLOR: &str = "red";

/// Marker dot color given to entries that do not specify one.
pub const DEFAULT_DOT_COLOR: &str = "black";

/// Presentation attributes. Never inspected by clustering or aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayAttributes {
    #[serde(default)]
    pub tag: String,

    #[serde(default = "default_circle_color")]
    pub circle_color: String,

    #[serde(default = "default_dot_color")]
    pub dot_color: String,

    #[serde(default = "default_show_circle")]
    pub show_circle: bool,

    /// Keys this crate does not know about, kept so they survive a save.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_circle_color() -> String {
    DEFAULT_CIRCLE_COLOR.to_string()
}

fn default_dot_color() -> String {
    DEFAULT_DOT_COLOR.to_string()
}

fn default_show_circle() -> bool {
    true
}

impl Default for DisplayAttributes {
    fn default() -> Self {
        Self {
            tag: String::new(),
            circle_color: default_circle_color(),
            dot_color: default_dot_color(),
            show_circle: default_show_circle(),
            extra: Map::new(),
        }
    }
}

/// One geocoded address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatedEntry {
    pub address: String,

    #[serde(rename = "coordinates")]
    pub position: Position,

    /// Influence radius in meters. `null` reads as the default radius.
    #[serde(default = "default_radius", deserialize_with = "deserialize_radius")]
    pub radius: f64,

    /// Number of cars at this address, if known.
    #[serde(rename = "numOfCars", default, deserialize_with = "deserialize_count")]
    pub count: Option<u64>,

    #[serde(flatten)]
    pub display: DisplayAttributes,
}

fn default_radius() -> f64 {
    DEFAULT_RADIUS_M
}

/// True for radii that can be stored and written back as JSON numbers.
#[inline]
pub fn is_valid_radius(radius: f64) -> bool {
    radius.is_finite() && radius >= 0.0
}

fn deserialize_radius<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(DEFAULT_RADIUS_M))
}

impl LocatedEntry {
    /// Creates an entry with default radius, no count and default display attributes.
    pub fn new(address: impl Into<String>, position: Position) -> Self {
        Self {
            address: address.into(),
            position,
            radius: DEFAULT_RADIUS_M,
            count: None,
            display: DisplayAttributes::default(),
        }
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.display.tag = tag.into();
        self
    }

    /// Count used for aggregation: missing counts contribute nothing.
    #[inline]
    pub fn effective_count(&self) -> u64 {
        self.count.unwrap_or(0)
    }
}

/// Independent optional edits to a stored entry.
///
/// Every `Some` field replaces the corresponding entry field; `None` leaves it
/// untouched. `count: Some(None)` clears a count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryPatch {
    pub address: Option<String>,
    pub position: Option<Position>,
    pub radius: Option<f64>,
    pub count: Option<Option<u64>>,
    pub tag: Option<String>,
    pub circle_color: Option<String>,
    pub dot_color: Option<String>,
    pub show_circle: Option<bool>,
}

impl EntryPatch {
    /// Returns true if the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies the patch in place.
    pub fn apply_to(&self, entry: &mut LocatedEntry) {
        if let Some(address) = &self.address {
            entry.address = address.clone();
        }
        if let Some(position) = self.position {
            entry.position = position;
        }
        match self.radius {
            Some(radius) if is_valid_radius(radius) => entry.radius = radius,
            Some(radius) => log::warn!("ignoring invalid radius {}", radius),
            None => {}
        }
        if let Some(count) = self.count {
            entry.count = count;
        }
        if let Some(tag) = &self.tag {
            entry.display.tag = tag.clone();
        }
        if let Some(color) = &self.circle_color {
            entry.display.circle_color = color.clone();
        }
        if let Some(color) = &self.dot_color {
            entry.display.dot_color = color.clone();
        }
        if let Some(show) = self.show_circle {
            entry.display.show_circle = show;
        }
    }
}

/// Parses a car count the way form inputs deliver it.
///
/// Leading whitespace and an optional `+` are skipped, then the leading run of
/// ASCII digits is read (`"12abc"` → 12). Empty, negative or digit-less input
/// yields `None`.
pub fn parse_count(text: &str) -> Option<u64> {
    let s = text.trim_start();
    let s = s.strip_prefix('+').unwrap_or(s);
    let digits_end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(s.len(), |(i, _)| i);
    if digits_end == 0 {
        return None;
    }
    s[..digits_end].parse().ok()
}

/// Accepts a count as a JSON number, numeric string, empty string or null.
fn deserialize_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f.trunc() as u64)
        }),
        Some(Value::String(s)) => parse_count(&s),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("12"), Some(12));
        assert_eq!(parse_count("  7 "), Some(7));
        assert_eq!(parse_count("+3"), Some(3));
        assert_eq!(parse_count("12abc"), Some(12));
        assert_eq!(parse_count("4.9"), Some(4));
        assert_eq!(parse_count(""), None);
        assert_eq!(parse_count("abc"), None);
        assert_eq!(parse_count("-5"), None);
    }

    #[test]
    fn test_deserialize_front_end_record() {
        let raw = json!({
            "address": "1 Main St",
            "coordinates": { "lat": 40.0, "lng": -75.0 },
            "radius": 2500,
            "circleColor": "blue",
            "dotColor": "purple",
            "tag": "depot",
            "numOfCars": "14",
            "showCircle": false
        });
        let entry: LocatedEntry = serde_json::from_value(raw).unwrap();
        assert_eq!(entry.address, "1 Main St");
        assert_eq!(entry.position, Position::new(40.0, -75.0));
        assert_eq!(entry.radius, 2500.0);
        assert_eq!(entry.count, Some(14));
        assert_eq!(entry.display.tag, "depot");
        assert_eq!(entry.display.circle_color, "blue");
        assert!(!entry.display.show_circle);
    }

    #[test]
    fn test_deserialize_count_variants() {
        let with = |count: Value| -> Option<u64> {
            let raw = json!({
                "address": "x",
                "coordinates": { "lat": 0.0, "lng": 0.0 },
                "numOfCars": count,
            });
            serde_json::from_value::<LocatedEntry>(raw).unwrap().count
        };
        assert_eq!(with(json!(9)), Some(9));
        assert_eq!(with(json!(2.7)), Some(2));
        assert_eq!(with(json!("")), None);
        assert_eq!(with(json!(null)), None);
        assert_eq!(with(json!("n/a")), None);
        assert_eq!(with(json!(-1)), None);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let raw = json!({ "address": "x", "coordinates": { "lat": 1.0, "lng": 2.0 } });
        let entry: LocatedEntry = serde_json::from_value(raw).unwrap();
        assert_eq!(entry.radius, DEFAULT_RADIUS_M);
        assert_eq!(entry.count, None);
        assert_eq!(entry.display, DisplayAttributes::default());
    }

    #[test]
    fn test_unknown_keys_survive_a_save() {
        let raw = json!({
            "address": "x",
            "coordinates": { "lat": 1.0, "lng": 2.0 },
            "region": "north"
        });
        let entry: LocatedEntry = serde_json::from_value(raw).unwrap();
        assert_eq!(entry.display.extra.get("region"), Some(&json!("north")));

        let back = serde_json::to_value(&entry).unwrap();
        assert_eq!(back["region"], json!("north"));
        assert_eq!(back["coordinates"]["lat"], json!(1.0));
    }

    #[test]
    fn test_patch_changes_only_given_fields() {
        let mut entry = LocatedEntry::new("a", Position::new(0.0, 0.0))
            .with_count(3)
            .with_tag("old");
        let patch = EntryPatch {
            radius: Some(1200.0),
            tag: Some("new".into()),
            ..Default::default()
        };
        patch.apply_to(&mut entry);
        assert_eq!(entry.radius, 1200.0);
        assert_eq!(entry.display.tag, "new");
        assert_eq!(entry.count, Some(3));

        EntryPatch {
            count: Some(None),
            ..Default::default()
        }
        .apply_to(&mut entry);
        assert_eq!(entry.count, None);
        assert!(EntryPatch::default().is_empty());
    }

    #[test]
    fn test_patch_ignores_unstorable_radius() {
        let mut entry = LocatedEntry::new("a", Position::new(0.0, 0.0)).with_radius(800.0);
        for radius in [f64::NAN, f64::INFINITY, -5.0] {
            EntryPatch {
                radius: Some(radius),
                ..Default::default()
            }
            .apply_to(&mut entry);
            assert_eq!(entry.radius, 800.0);
        }
    }

    #[test]
    fn test_null_radius_reads_as_default() {
        let broken = LocatedEntry::new("a", Position::new(0.0, 0.0)).with_radius(f64::NAN);
        let text = serde_json::to_string(&vec![broken]).unwrap();
        assert!(text.contains("\"radius\":null"));

        let back: Vec<LocatedEntry> = serde_json::from_str(&text).unwrap();
        assert_eq!(back[0].radius, DEFAULT_RADIUS_M);
    }
}
