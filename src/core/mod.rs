//! Core data types and I/O operations.

pub mod entry;
pub mod geo;
pub mod loaders;
pub mod store;
pub mod writers;

pub use entry::{DisplayAttributes, EntryPatch, LocatedEntry};
pub use geo::Position;
pub use loaders::{load_csv_rows, load_entries_json, CsvRow, LoaderError};
pub use store::{PointStore, StoreError};
pub use writers::{ensure_data_file, write_entries_csv, write_entries_json, WriteError};
