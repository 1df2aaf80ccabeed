// src/config.rs

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::session::UtcOffsetMinutes;

pub const ENV_PREFIX: &str = "EXACTFLOW_";
pub const DEFAULT_BASE_URL: &str = "https://app.hibob.com";
pub const DEFAULT_START_CLOCK: &str = "09:00";
pub const DEFAULT_END_CLOCK: &str = "17:00";
pub const DEFAULT_OFFSET_MINUTES: i32 = 120;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// --- Value types ---

/// Wall-clock time written as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClockTime(NaiveTime);

impl ClockTime {
    pub fn parse(field: &'static str, value: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidClock {
            field,
            value: value.to_string(),
        };
        let trimmed = value.trim();
        // chrono accepts single-digit hours; the wire format needs two.
        if trimmed.len() != 5 {
            return Err(invalid());
        }
        NaiveTime::parse_from_str(trimmed, "%H:%M")
            .map(ClockTime)
            .map_err(|_| invalid())
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl Serialize for ClockTime {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkWindow {
    pub start: ClockTime,
    pub end: ClockTime,
}

impl WorkWindow {
    pub fn new(start: ClockTime, end: ClockTime) -> Result<Self, ConfigError> {
        if start >= end {
            return Err(ConfigError::EmptyWindow {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, ConfigError> {
        Self::new(
            ClockTime::parse("start_clock", start)?,
            ClockTime::parse("end_clock", end)?,
        )
    }
}

/// Weekday ordinals (0 = Sunday .. 6 = Saturday) never selected as candidates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SkipPolicy(BTreeSet<u8>);

impl SkipPolicy {
    pub fn none() -> Self {
        Self::default()
    }

    /// Builds a policy from raw entries, dropping anything that isn't an
    /// integer in [0, 6].
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ordinals = BTreeSet::new();
        for entry in entries {
            let raw = entry.as_ref().trim();
            if raw.is_empty() {
                continue;
            }
            match raw.parse::<i64>() {
                Ok(n) if (0..=6).contains(&n) => {
                    ordinals.insert(n as u8);
                }
                _ => warn!("Ignoring invalid skip-weekday entry '{}'", raw),
            }
        }
        SkipPolicy(ordinals)
    }

    pub fn from_ordinals<I: IntoIterator<Item = i64>>(ordinals: I) -> Self {
        Self::from_entries(ordinals.into_iter().map(|n| n.to_string()))
    }

    pub fn contains(&self, ordinal: u8) -> bool {
        self.0.contains(&ordinal)
    }

    pub fn ordinals(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionStrategy {
    MissingOnly,
    Explicit,
}

impl FromStr for SelectionStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "missing-only" | "missing_only" | "missing" => Ok(SelectionStrategy::MissingOnly),
            "explicit" | "explicit-list" | "list" => Ok(SelectionStrategy::Explicit),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionStrategy::MissingOnly => f.write_str("missing-only"),
            SelectionStrategy::Explicit => f.write_str("explicit"),
        }
    }
}

// --- Engine configuration ---

/// Everything a reconciliation run needs to know up front.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub window: WorkWindow,
    pub default_offset: UtcOffsetMinutes,
    pub skip_weekdays: SkipPolicy,
    pub strategy: SelectionStrategy,
    /// Raw inputs for the explicit strategy; normalized at run time.
    pub explicit_dates: Vec<String>,
    /// `None` means every write is in flight at once.
    pub concurrency_limit: Option<usize>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            window: WorkWindow::parse(DEFAULT_START_CLOCK, DEFAULT_END_CLOCK)
                .expect("default work window is valid"),
            default_offset: UtcOffsetMinutes::new(DEFAULT_OFFSET_MINUTES)
                .expect("default offset is in range"),
            skip_weekdays: SkipPolicy::from_ordinals([0, 6]),
            strategy: SelectionStrategy::MissingOnly,
            explicit_dates: Vec::new(),
            concurrency_limit: None,
        }
    }
}

// --- Environment configuration ---

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_start_clock() -> String {
    DEFAULT_START_CLOCK.to_string()
}
fn default_end_clock() -> String {
    DEFAULT_END_CLOCK.to_string()
}
fn default_offset() -> i32 {
    DEFAULT_OFFSET_MINUTES
}
fn default_skip_weekdays() -> Vec<String> {
    vec!["0".to_string(), "6".to_string()]
}
fn default_strategy() -> String {
    "missing-only".to_string()
}
fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

/// Settings read from `EXACTFLOW_*` environment variables (and `.env`).
#[derive(Debug, Deserialize, Clone)]
pub struct ExactflowConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub session_cookie: Option<String>,
    #[serde(default = "default_start_clock")]
    pub start_clock: String,
    #[serde(default = "default_end_clock")]
    pub end_clock: String,
    #[serde(default = "default_offset")]
    pub default_offset: i32,
    #[serde(default = "default_skip_weekdays")]
    pub skip_weekdays: Vec<String>,
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// `;`-separated, since some accepted date shapes contain commas.
    #[serde(default)]
    pub dates: Option<String>,
    #[serde(default)]
    pub concurrency_limit: Option<usize>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ExactflowConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenv::dotenv().ok();
        let config = envy::prefixed(ENV_PREFIX).from_env::<ExactflowConfig>()?;
        info!(
            "Configuration loaded from environment (base_url={}, strategy={})",
            config.base_url, config.strategy
        );
        Ok(config)
    }

    pub fn from_pairs<I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::prefixed(ENV_PREFIX).from_iter(pairs)?)
    }

    pub fn explicit_date_list(&self) -> Vec<String> {
        self.dates
            .as_deref()
            .map(split_date_list)
            .unwrap_or_default()
    }

    /// Validates the raw settings into the engine configuration.
    pub fn to_reconcile_config(&self) -> Result<ReconcileConfig, ConfigError> {
        self.to_reconcile_config_with(self.explicit_date_list())
    }

    /// Like `to_reconcile_config`, with `explicit_dates` in place of `DATES`.
    pub fn to_reconcile_config_with(
        &self,
        explicit_dates: Vec<String>,
    ) -> Result<ReconcileConfig, ConfigError> {
        let window = WorkWindow::parse(&self.start_clock, &self.end_clock)?;
        let default_offset = UtcOffsetMinutes::new(self.default_offset)?;
        let strategy = self.strategy.parse::<SelectionStrategy>()?;
        let config = ReconcileConfig {
            window,
            default_offset,
            skip_weekdays: SkipPolicy::from_entries(&self.skip_weekdays),
            strategy,
            explicit_dates,
            concurrency_limit: self.concurrency_limit,
        };
        config.validate()?;
        Ok(config)
    }
}

impl ReconcileConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency_limit == Some(0) {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.strategy == SelectionStrategy::Explicit && self.explicit_dates.is_empty() {
            return Err(ConfigError::NoExplicitDates);
        }
        Ok(())
    }
}

/// Splits a `;`- or newline-separated list. Separators at either end are
/// ignored; every inner entry is kept, blank or not, so that bad entries get
/// reported when the list is normalized.
pub fn split_date_list(raw: &str) -> Vec<String> {
    let inner = raw.trim_matches(|c: char| c == ';' || c.is_whitespace());
    if inner.is_empty() {
        return Vec::new();
    }
    inner
        .split([';', '\n'])
        .map(|s| s.trim().to_string())
        .collect()
}

pub fn read_dates_file(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::DatesFile {
        path: path.display().to_string(),
        source,
    })?;
    // Blank lines and `#` comments are file layout, not date entries.
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(split_date_list)
        .collect())
}
