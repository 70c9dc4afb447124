//! Command-line glance at continuous glucose monitor readings.
//!
//! The `glance` binary signs in to a glucose share service, fetches the
//! latest readings and prints the current value, its trend arrow, the change
//! since the previous reading and how old it is, colored by target range.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `check` | Fetch once and print the current reading |
//! | `watch` | Keep polling, print each new reading until Ctrl-C |
//! | `show` | Print the last stored reading, no network |
//! | `demo` | Placeholder display, then a fixed example reading |
//! | `config` | Print the config path, show it, or write defaults |
//!
//! # Configuration
//!
//! Settings live in `<config dir>/glance/config.toml`:
//!
//! ```toml
//! [account]
//! username = "alice"
//! server = "us"            # "us", "non_us", or a base URL
//!
//! [display]
//! below_range = 85
//! above_range = 250
//!
//! [polling]
//! rate_limit_policy = "wait_then_fetch"
//!
//! [storage]
//! enabled = true
//! ```
//!
//! Credentials can also come from `--username` / `--password` or the
//! `GLANCE_USERNAME` / `GLANCE_PASSWORD` environment variables. Logging is
//! controlled with `RUST_LOG`.

pub mod cli;
pub mod commands;
pub mod config;
pub mod format;
