//! Platform-agnostic types for continuous glucose monitor readings.
//!
//! This crate provides the shared data model used by the share client
//! (glance-core), the local store (glance-store) and any presentation layer.
//!
//! # Features
//!
//! - [`Reading`] and [`Trend`] with structural equality and chronological order
//! - Share service record format (`/Date(<ms>)/` timestamps, integer trends)
//! - Error types for data parsing
//!
//! # Example
//!
//! ```
//! use glance_types::{Reading, Trend};
//!
//! let json = r#"[{"Value": 112, "Trend": 4, "WT": "/Date(1462404576000)/"}]"#;
//! let readings: Vec<Reading> = serde_json::from_str(json).unwrap();
//! assert_eq!(readings[0].value(), 112);
//! assert_eq!(readings[0].trend(), Trend::Flat);
//! ```

pub mod error;
pub mod types;
pub mod wire;

pub use error::{ParseError, ParseResult};
pub use types::{PLACEHOLDER_VALUE, Reading, Trend};
