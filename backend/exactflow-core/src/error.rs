// src/error.rs

use reqwest::StatusCode;
use thiserror::Error;

/// Longest diagnostic kept from a remote response body.
pub const MAX_DIAGNOSTIC_CHARS: usize = 300;

// --- Date normalization ---

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateError {
    #[error("Unparseable date input: '{input}'")]
    UnparseableDate { input: String },
}

// --- Remote attendance service ---

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON processing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Base URL cannot carry path segments: {0}")]
    InvalidBaseUrl(String),

    #[error("Invalid header value for '{name}'")]
    InvalidHeader { name: &'static str },

    // Non-2xx responses from the attendance API
    #[error("Attendance API error: Status={status}, Message='{message}'")]
    ApiError { status: StatusCode, message: String },

    #[error("Unexpected response shape: {0}")]
    UnexpectedResponse(String),
}

impl ServiceError {
    /// Short, single-line reason suitable for a per-day outcome.
    pub fn diagnostic(&self) -> String {
        let raw = match self {
            ServiceError::ApiError { status, message } if message.is_empty() => {
                status.to_string()
            }
            ServiceError::ApiError { status, message } => format!("{} {}", status, message),
            other => other.to_string(),
        };
        truncate_diagnostic(&raw)
    }
}

pub fn truncate_diagnostic(raw: &str) -> String {
    let single_line = raw.replace(['\r', '\n'], " ");
    let trimmed = single_line.trim();
    if trimmed.chars().count() <= MAX_DIAGNOSTIC_CHARS {
        trimmed.to_string()
    } else {
        let mut cut: String = trimmed.chars().take(MAX_DIAGNOSTIC_CHARS).collect();
        cut.push('…');
        cut
    }
}

// --- Configuration ---

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment configuration error: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid clock time '{value}' for {field} (expected HH:MM)")]
    InvalidClock { field: &'static str, value: String },

    #[error("Work window start {start} must be before end {end}")]
    EmptyWindow { start: String, end: String },

    #[error("UTC offset {0} minutes is outside [-720, 840]")]
    OffsetOutOfRange(i32),

    #[error("Unknown day-selection strategy '{0}' (expected 'missing-only' or 'explicit')")]
    UnknownStrategy(String),

    #[error("Concurrency limit must be at least 1")]
    ZeroConcurrency,

    #[error("Explicit strategy selected but no dates were supplied")]
    NoExplicitDates,

    #[error("Failed to read dates file {path}: {source}")]
    DatesFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// --- Run-level failures ---

// Only precondition failures live here. Per-day problems are recorded in the
// run result instead of being raised.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Identity unavailable: {0}")]
    IdentityUnavailable(String),

    #[error("Attendance summary unavailable: {0}")]
    SummaryUnavailable(String),
}
