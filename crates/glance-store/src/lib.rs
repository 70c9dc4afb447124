//! Local persistence for continuous glucose monitor readings.
//!
//! This crate keeps the full reading collection in a single SQLite file so
//! the last known readings survive restarts and can be shown before the
//! first network fetch completes.
//!
//! # Features
//!
//! - Whole-collection save with redundant-write suppression
//! - Missing file treated as an empty collection
//! - Schema versioning that refuses files from newer versions
//!
//! # Example
//!
//! ```no_run
//! use glance_store::ReadingStore;
//!
//! let mut store = ReadingStore::open_default();
//! let readings = store.load()?;
//! println!("{} readings on disk", readings.len());
//! # Ok::<(), glance_store::Error>(())
//! ```

mod error;
mod schema;
mod store;

pub use error::{Error, Result};
pub use schema::SCHEMA_VERSION;
pub use store::ReadingStore;

/// File name of the reading store.
pub const STORE_FILE_NAME: &str = "readings.db";

/// Default store path following platform conventions.
///
/// - Linux: `~/.local/share/glance/readings.db`
/// - macOS: `~/Library/Application Support/glance/readings.db`
/// - Windows: `C:\Users\<user>\AppData\Local\glance\readings.db`
pub fn default_store_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("glance")
        .join(STORE_FILE_NAME)
}
