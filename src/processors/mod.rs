//! Data processing modules.

pub mod clustering;
pub mod import;
pub mod probe;
pub mod radius;

// Re-export key types for convenience
pub use clustering::{active_threshold, compute_hubs, HubCluster};
pub use import::{geocode_rows, import_csv, ImportReport};
pub use probe::{aggregate_at, probe, ClickAggregate};
pub use radius::{apply_radius_override, parse_radius_override};
