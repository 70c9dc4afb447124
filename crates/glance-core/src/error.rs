//! Error types for glance-core.
//!
//! Every failure on the fetch path ends up as an [`Error`]. The monitor never
//! lets one escape [`check_for_new_readings`](crate::GlucoseMonitor::check_for_new_readings):
//! it invalidates the session, publishes the message as `last_error` and keeps
//! the last known readings on screen.
//!
//! | Error | Raised when |
//! |-------|-------------|
//! | [`Error::Http`] | The request never got a response (DNS, TLS, timeout) |
//! | [`Error::Login`] | The login endpoint refused the credentials or answered garbage |
//! | [`Error::Fetch`] | The readings endpoint failed or returned an undecodable batch |
//! | [`Error::Data`] | A request body could not be built |
//! | [`Error::Store`] | The local reading store could not be opened or decoded |
//! | [`Error::InvalidConfig`] | Options failed validation |
//! | [`Error::Task`] | The store writer went away |

use thiserror::Error;

/// Errors raised while acquiring or persisting glucose readings.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Transport failure talking to the share service.
    #[error("HTTP Error: {0}")]
    Http(#[from] reqwest::Error),

    /// Authentication failed. Carries the service's error code (for example
    /// `SSO_AuthenticatePasswordInvalid`) or the HTTP status.
    #[error("Login Error: {0}")]
    Login(String),

    /// Fetching readings failed.
    #[error("Fetch Error: {0}")]
    Fetch(String),

    /// A request payload could not be serialized.
    #[error("Data Error, Reason: {0}")]
    Data(String),

    /// Local reading store failure.
    #[error("Store Error: {0}")]
    Store(#[from] glance_store::Error),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A background worker stopped or panicked.
    #[error("Background task failed: {0}")]
    Task(String),
}

impl Error {
    /// Create a login error.
    pub fn login(code: impl Into<String>) -> Self {
        Self::Login(code.into())
    }

    /// Create a fetch error.
    pub fn fetch(reason: impl Into<String>) -> Self {
        Self::Fetch(reason.into())
    }

    /// Create a data error.
    pub fn data(reason: impl Into<String>) -> Self {
        Self::Data(reason.into())
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

impl From<glance_types::ParseError> for Error {
    fn from(err: glance_types::ParseError) -> Self {
        Error::Fetch(format!("Decode Failed: {err}"))
    }
}

/// Result type alias using glance-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
