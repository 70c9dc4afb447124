//! Output formatting for text and JSON.

use anyhow::Result;
use owo_colors::OwoColorize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

use glance_core::{DisplayOptions, GlanceMetrics, RangeBand, Reading};

/// Width of the staleness gauge in characters.
const GAUGE_WIDTH: usize = 10;

/// Formatting options for output.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    /// Disable colored output.
    pub no_color: bool,
}

impl FormatOptions {
    pub fn new(no_color: bool) -> Self {
        Self { no_color }
    }

    /// Color `text` for the given band. Stale values are dimmed instead.
    #[must_use]
    pub fn paint(&self, text: &str, band: RangeBand, stale: bool) -> String {
        if self.no_color {
            return text.to_string();
        }
        if stale {
            return text.dimmed().to_string();
        }
        match band {
            RangeBand::BelowRange => text.red().bold().to_string(),
            RangeBand::InRange => text.green().bold().to_string(),
            RangeBand::AboveRange => text.yellow().bold().to_string(),
        }
    }
}

/// One-line glance: value, trend glyph, delta, and age.
///
/// ```text
/// 112 ↘︎ -12   [###-------] 3 min, 5 sec
/// ```
#[must_use]
pub fn format_glance(metrics: &GlanceMetrics, opts: &FormatOptions) -> String {
    let stale = metrics.is_stale();
    let mut head = metrics.value_string();
    let trend = metrics.trend_string();
    if !trend.is_empty() {
        head.push(' ');
        head.push_str(trend);
    }
    let delta = metrics.delta_string();
    if !delta.is_empty() {
        head.push(' ');
        head.push_str(&delta);
    }

    let gauge = format_gauge(metrics.staleness_fraction(), GAUGE_WIDTH);
    let age = metrics.age_string();
    let age = if stale && !opts.no_color {
        age.red().to_string()
    } else {
        age
    };

    format!(
        "{}  {} {}",
        opts.paint(&head, metrics.band(), stale),
        gauge,
        age
    )
}

/// Fill a bar in proportion to `fraction` (clamped to `[0, 1]`).
///
/// ```
/// use glance_cli::format::format_gauge;
///
/// assert_eq!(format_gauge(0.5, 4), "[##--]");
/// ```
#[must_use]
pub fn format_gauge(fraction: f64, width: usize) -> String {
    let filled = (fraction.clamp(0.0, 1.0) * width as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

/// Newest-first reading list, one per line, with UTC times.
#[must_use]
pub fn format_history(readings: &[Reading], display: &DisplayOptions, opts: &FormatOptions) -> String {
    let time_format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let mut out = String::new();
    for reading in readings {
        let when = reading
            .timestamp()
            .format(time_format)
            .unwrap_or_else(|_| reading.unix_millis().to_string());
        let value = format!("{:>3}", reading.value());
        let band = RangeBand::for_value(reading.value(), display);
        out.push_str(&format!(
            "{}  {} {:<2} {}\n",
            when,
            opts.paint(&value, band, false),
            reading.trend().symbol(),
            reading.trend().description(),
        ));
    }
    out
}

/// Machine-readable view of the glance.
#[derive(Debug, Serialize)]
pub struct GlanceSnapshot {
    pub value: i32,
    pub trend: u8,
    pub trend_description: &'static str,
    pub delta: Option<i32>,
    pub band: RangeBand,
    pub timestamp: String,
    pub timestamp_ms: i64,
    pub age_secs: u64,
    pub stale: bool,
    pub staleness_fraction: f64,
    pub value_string: String,
    pub trend_string: &'static str,
    pub delta_string: String,
    pub age_string: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<Reading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl GlanceSnapshot {
    pub fn new(metrics: &GlanceMetrics) -> Self {
        let current = metrics.current_reading();
        Self {
            value: current.value(),
            trend: current.trend().code(),
            trend_description: current.trend().description(),
            delta: metrics.delta(),
            band: metrics.band(),
            timestamp: format_timestamp(current.timestamp()),
            timestamp_ms: current.unix_millis(),
            age_secs: metrics.age().as_secs(),
            stale: metrics.is_stale(),
            staleness_fraction: metrics.staleness_fraction(),
            value_string: metrics.value_string(),
            trend_string: metrics.trend_string(),
            delta_string: metrics.delta_string(),
            age_string: metrics.age_string(),
            history: Vec::new(),
            last_error: None,
        }
    }

    #[must_use]
    pub fn with_history(mut self, history: Vec<Reading>) -> Self {
        self.history = history;
        self
    }

    #[must_use]
    pub fn with_last_error(mut self, last_error: Option<String>) -> Self {
        self.last_error = last_error;
        self
    }
}

fn format_timestamp(timestamp: OffsetDateTime) -> String {
    timestamp.format(&Rfc3339).unwrap_or_default()
}

/// Pretty-printed JSON.
pub fn format_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
