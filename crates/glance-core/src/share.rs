//! HTTP client for the glucose share service.
//!
//! # Example
//!
//! ```no_run
//! use glance_core::{GlucoseProvider, ShareClient, ShareServer};
//!
//! # async fn example() -> glance_core::Result<()> {
//! let client = ShareClient::builder("username", "password")
//!     .server(ShareServer::Us)
//!     .build()?;
//!
//! let readings = client.fetch_latest_readings(2).await?;
//! if let Some(latest) = readings.first() {
//!     println!("{} {}", latest.value(), latest.trend().symbol());
//! }
//! # Ok(())
//! # }
//! ```

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use glance_types::Reading;

use crate::error::{Error, Result};
use crate::options::{DEFAULT_LOOKBACK_MINUTES, PollOptions};
use crate::provider::GlucoseProvider;
use crate::throttle::{DEFAULT_MIN_FETCH_INTERVAL, FetchThrottle, RateLimitPolicy, ThrottleDecision};

/// User agent of the official share app; the service rejects unknown clients.
pub const USER_AGENT: &str = "Dexcom Share/3.0.2.11 CFNetwork/711.2.23 Darwin/14.0.0";
/// Application id sent with every login.
pub const APPLICATION_ID: &str = "d89443d2-327c-4a6f-89e5-496bbb0317db";
pub const LOGIN_PATH: &str = "/ShareWebServices/Services/General/LoginPublisherAccountByName";
pub const LATEST_GLUCOSE_PATH: &str =
    "/ShareWebServices/Services/Publisher/ReadPublisherLatestGlucoseValues";
/// How many times a fetch may re-login after the service rejects the session.
pub const MAX_REAUTH_ATTEMPTS: u32 = 2;

/// Service error codes meaning the session token is no longer valid.
const SESSION_ERROR_CODES: &[&str] = &["SessionIdNotFound", "SessionNotValid"];

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Which share deployment to talk to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ShareServer {
    /// `https://share1.dexcom.com`
    #[default]
    Us,
    /// `https://shareous1.dexcom.com`
    NonUs,
    /// Any other base URL (self-hosted bridges, test servers).
    Custom(String),
}

impl ShareServer {
    pub fn base_url(&self) -> &str {
        match self {
            Self::Us => "https://share1.dexcom.com",
            Self::NonUs => "https://shareous1.dexcom.com",
            Self::Custom(url) => url,
        }
    }
}

impl std::fmt::Display for ShareServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Us => write!(f, "us"),
            Self::NonUs => write!(f, "non_us"),
            Self::Custom(url) => write!(f, "{url}"),
        }
    }
}

impl FromStr for ShareServer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "us" => Ok(Self::Us),
            "non_us" | "ous" | "international" => Ok(Self::NonUs),
            _ if s.starts_with("http://") || s.starts_with("https://") => {
                Ok(Self::Custom(s.trim().trim_end_matches('/').to_string()))
            }
            _ => Err(Error::invalid_config(format!(
                "unknown share server '{s}' (expected us, non_us or an http(s) URL)"
            ))),
        }
    }
}

impl TryFrom<String> for ShareServer {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ShareServer> for String {
    fn from(server: ShareServer) -> Self {
        server.to_string()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    account_name: &'a str,
    password: &'a str,
    application_id: &'a str,
}

/// Error body returned by the service on failure.
#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    #[serde(rename = "Code")]
    code: Option<String>,
    #[serde(rename = "Message")]
    message: Option<String>,
}

/// Pull the service's error code out of a failure body, falling back to the status.
fn error_code(status: StatusCode, body: &[u8]) -> String {
    let parsed = serde_json::from_slice::<ServiceErrorBody>(body).ok();
    if let Some(message) = parsed.as_ref().and_then(|b| b.message.as_deref()) {
        debug!("Share service said: {}", message);
    }
    parsed
        .and_then(|b| b.code)
        .unwrap_or_else(|| status.as_u16().to_string())
}

#[derive(Debug, Default)]
struct SessionState {
    token: Option<String>,
    throttle: FetchThrottle,
    last_fetched: Vec<Reading>,
}

enum FetchFailure {
    SessionExpired(String),
    Other(Error),
}

impl From<Error> for FetchFailure {
    fn from(err: Error) -> Self {
        Self::Other(err)
    }
}

impl From<reqwest::Error> for FetchFailure {
    fn from(err: reqwest::Error) -> Self {
        Self::Other(Error::Http(err))
    }
}

/// Live client for the share service.
///
/// All operations lock the session for their full duration, so at most one
/// login or fetch is in flight per client.
pub struct ShareClient {
    http: Client,
    base_url: String,
    username: String,
    password: String,
    lookback_minutes: u32,
    state: Mutex<SessionState>,
}

impl std::fmt::Debug for ShareClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("lookback_minutes", &self.lookback_minutes)
            .finish_non_exhaustive()
    }
}

impl ShareClient {
    pub fn builder(username: impl Into<String>, password: impl Into<String>) -> ShareClientBuilder {
        ShareClientBuilder::new(username, password)
    }

    /// Build a client with the polling settings from `options`.
    pub fn from_options(
        username: impl Into<String>,
        password: impl Into<String>,
        server: ShareServer,
        options: &PollOptions,
    ) -> Result<Self> {
        Self::builder(username, password)
            .server(server)
            .min_fetch_interval(options.min_fetch_interval)
            .rate_limit_policy(options.rate_limit_policy)
            .lookback_minutes(options.lookback_minutes)
            .build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether a session token is currently held.
    pub async fn is_authenticated(&self) -> bool {
        self.state.lock().await.token.is_some()
    }

    async fn login(&self, state: &mut SessionState) -> Result<String> {
        info!("Authenticating with share service at {}", self.base_url);

        let body = serde_json::to_vec(&LoginRequest {
            account_name: &self.username,
            password: &self.password,
            application_id: APPLICATION_ID,
        })
        .map_err(|e| Error::data(format!("Auth Data Encode Failed: {e}")))?;

        let url = format!("{}{}", self.base_url, LOGIN_PATH);
        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        if status != StatusCode::OK {
            let code = error_code(status, &bytes);
            warn!("Share login failed: {}", code);
            return Err(Error::Login(code));
        }

        let token: String = serde_json::from_slice(&bytes)
            .map_err(|e| Error::login(format!("Auth Decode Failed: {e}")))?;
        debug!("Share session established");
        state.token = Some(token.clone());
        Ok(token)
    }

    async fn request_readings(
        &self,
        token: &str,
        count: usize,
    ) -> std::result::Result<Vec<Reading>, FetchFailure> {
        let url = Url::parse_with_params(
            &format!("{}{}", self.base_url, LATEST_GLUCOSE_PATH),
            &[
                ("sessionId", token.to_string()),
                ("minutes", self.lookback_minutes.to_string()),
                ("maxCount", count.to_string()),
            ],
        )
        .map_err(|e| Error::fetch(format!("Fetch URL construction fail: {e}")))?;

        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        if status != StatusCode::OK {
            let code = error_code(status, &bytes);
            if SESSION_ERROR_CODES.contains(&code.as_str()) {
                return Err(FetchFailure::SessionExpired(code));
            }
            return Err(Error::fetch(code).into());
        }

        serde_json::from_slice::<Vec<Reading>>(&bytes)
            .map_err(|e| Error::fetch(format!("Decode Failed: {e}")).into())
    }
}

#[async_trait]
impl GlucoseProvider for ShareClient {
    async fn authenticate(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.login(&mut state).await.map(|_| ())
    }

    async fn fetch_latest_readings(&self, count: usize) -> Result<Vec<Reading>> {
        let mut state = self.state.lock().await;
        debug!("Fetching latest ({}) readings", count);

        if state.throttle.acquire().await == ThrottleDecision::UseCached {
            let mut cached = state.last_fetched.clone();
            cached.truncate(count);
            return Ok(cached);
        }
        state.throttle.record();

        let mut reauths = 0;
        loop {
            let token = match state.token.clone() {
                Some(token) => token,
                None => self.login(&mut state).await?,
            };

            match self.request_readings(&token, count).await {
                Ok(readings) => {
                    debug!("Fetched {} readings", readings.len());
                    state.last_fetched = readings.clone();
                    return Ok(readings);
                }
                Err(FetchFailure::SessionExpired(code)) if reauths < MAX_REAUTH_ATTEMPTS => {
                    reauths += 1;
                    warn!(
                        "Share session rejected ({}), re-authenticating (attempt {}/{})",
                        code, reauths, MAX_REAUTH_ATTEMPTS
                    );
                    state.token = None;
                }
                Err(FetchFailure::SessionExpired(code)) => {
                    state.token = None;
                    return Err(Error::fetch(code));
                }
                Err(FetchFailure::Other(err)) => return Err(err),
            }
        }
    }

    async fn invalidate_session(&self) {
        let mut state = self.state.lock().await;
        debug!("Invalidating share session");
        state.token = None;
        state.throttle.reset();
        state.last_fetched.clear();
    }
}

/// Builder for [`ShareClient`].
#[derive(Debug, Clone)]
pub struct ShareClientBuilder {
    username: String,
    password: String,
    server: ShareServer,
    min_fetch_interval: Duration,
    rate_limit_policy: RateLimitPolicy,
    lookback_minutes: u32,
    timeout: Duration,
}

impl ShareClientBuilder {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            server: ShareServer::default(),
            min_fetch_interval: DEFAULT_MIN_FETCH_INTERVAL,
            rate_limit_policy: RateLimitPolicy::default(),
            lookback_minutes: DEFAULT_LOOKBACK_MINUTES,
            timeout: REQUEST_TIMEOUT,
        }
    }

    #[must_use]
    pub fn server(mut self, server: ShareServer) -> Self {
        self.server = server;
        self
    }

    #[must_use]
    pub fn min_fetch_interval(mut self, interval: Duration) -> Self {
        self.min_fetch_interval = interval;
        self
    }

    #[must_use]
    pub fn rate_limit_policy(mut self, policy: RateLimitPolicy) -> Self {
        self.rate_limit_policy = policy;
        self
    }

    #[must_use]
    pub fn lookback_minutes(mut self, minutes: u32) -> Self {
        self.lookback_minutes = minutes;
        self
    }

    /// Per-request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<ShareClient> {
        // Normalize URL (remove trailing slash)
        let base_url = self.server.base_url().trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::invalid_config(format!(
                "URL must start with http:// or https://, got: {base_url}"
            )));
        }

        let http = Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(ShareClient {
            http,
            base_url,
            username: self.username,
            password: self.password,
            lookback_minutes: self.lookback_minutes,
            state: Mutex::new(SessionState {
                throttle: FetchThrottle::new(self.min_fetch_interval, self.rate_limit_policy),
                ..SessionState::default()
            }),
        })
    }
}
