//! Reading acquisition and staleness tracking for share-service CGM data.
//!
//! This crate signs in to a glucose share service, fetches the latest
//! readings, merges them with what is already known, and derives the values
//! a glanceable display needs: the current value, its trend, the change since
//! the previous reading and how old it is.
//!
//! # Features
//!
//! - **Share client**: login, fetch and bounded re-authentication
//! - **Rate limiting**: minimum spacing between fetches, wait or serve cached
//! - **Poll scheduling**: one deferred poll timed to the next expected reading
//! - **Merge**: order-independent union of fetched and known readings
//! - **Persistence**: single-writer SQLite store with 24 hour retention on load
//! - **Derived values**: delta, staleness, range band and display strings
//! - **Test doubles**: fixed example provider and scripted mock provider
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use glance_core::{GlanceOptions, GlucoseMonitor, ShareClient, ShareServer};
//! use glance_store::ReadingStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = GlanceOptions::default();
//!     let client = ShareClient::from_options("user", "pass", ShareServer::Us, &options.polling)?;
//!
//!     let monitor = Arc::new(GlucoseMonitor::with_store(
//!         Arc::new(client),
//!         options,
//!         ReadingStore::open_default(),
//!     ));
//!     monitor.start().await?;
//!
//!     println!("{} {} {}", monitor.value_string(), monitor.trend_string(), monitor.delta_string());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod example;
pub mod merge;
pub mod metrics;
pub mod mock;
pub mod monitor;
pub mod options;
pub mod provider;
pub mod range;
pub mod scheduler;
pub mod share;
pub mod throttle;

mod persist;

pub use error::{Error, Result};
pub use example::ExampleProvider;
pub use merge::{RETENTION_WINDOW, merge, retain_window};
pub use metrics::GlanceMetrics;
pub use mock::{MockProvider, MockProviderBuilder};
pub use monitor::{GlucoseMonitor, PollFuture};
pub use options::{DisplayOptions, GlanceOptions, PollOptions};
pub use provider::GlucoseProvider;
pub use range::RangeBand;
pub use scheduler::{PollPlan, PollScheduler};
pub use share::{ShareClient, ShareClientBuilder, ShareServer};
pub use throttle::{FetchThrottle, RateLimitPolicy, ThrottleDecision};

// Re-export the data model for convenience
pub use glance_types::{Reading, Trend};
