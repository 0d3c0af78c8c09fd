//! Address plotting, hub clustering and probe aggregation.
//!
//! This crate provides tools for:
//! - Keeping an ordered list of geocoded addresses with radius, car count and display attributes
//! - Greedy hub clustering: groups of nearby entries whose combined count exceeds a threshold
//! - Probe aggregation: total count of all entries whose radius covers a position
//! - CSV import (with concurrent geocoding) and export
//! - Whole-list persistence to a JSON file or over HTTP, and an Actix Web service
//!
//! # Example
//!
//! ```
//! use hub_mapper::core::{LocatedEntry, Position};
//! use hub_mapper::processors::{aggregate_at, compute_hubs};
//!
//! let entries = vec![
//!     LocatedEntry::new("A", Position::new(0.0, 0.0)).with_radius(2000.0).with_count(3),
//!     LocatedEntry::new("B", Position::new(0.0, 0.01)).with_count(4),
//!     LocatedEntry::new("C", Position::new(10.0, 10.0)).with_count(100),
//! ];
//! assert_eq!(compute_hubs(&entries, Some(5.0)).len(), 2);
//! assert_eq!(aggregate_at(&entries, &Position::new(0.0, 0.0)), 7);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod geocode;
pub mod processors;
pub mod server;
pub mod session;
pub mod storage;

pub use config::{EntryDefaults, GeocoderConfig, HubConfig, ImportMode, MapperConfig, ServerConfig, StorageConfig};
pub use crate::core::{LocatedEntry, PointStore, Position};
pub use session::MapSession;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
