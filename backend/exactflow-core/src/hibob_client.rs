// src/hibob_client.rs

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::collaborators::{EntryWriter, IdentityProvider, RefreshNotifier, SummaryProvider};
use crate::config::{ExactflowConfig, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::dates::CalendarDay;
use crate::error::{truncate_diagnostic, ServiceError};
use crate::session::{EmployeeId, UtcOffsetMinutes};
use crate::submission::WorkEntry;
use crate::summary::SummarySnapshot;

pub const HIBOB_ACCEPT: &str = "application/json, text/plain, */*";
pub const HIBOB_JSON_CONTENT_TYPE: &str = "application/json;charset=UTF-8";
pub const HEADER_REQUESTED_WITH: &str = "x-requested-with";
pub const HEADER_TIMEZONE_OFFSET: &str = "bob-timezoneoffset";

// --- HiBob API Data Structures ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HibobUser {
    pub id: serde_json::Value,
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,
}

impl HibobUser {
    /// The id arrives as a string or a number depending on the tenant.
    pub fn employee_id(&self) -> Option<EmployeeId> {
        match &self.id {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(EmployeeId::new(s.trim())),
            serde_json::Value::Number(n) => Some(EmployeeId::new(n.to_string())),
            _ => None,
        }
    }
}

/// One element of the attendance entries body; the endpoint takes a list
/// that replaces the day's entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntryPayload {
    pub id: Option<String>,
    pub start: String,
    pub end: String,
    pub entry_type: String,
    pub offset: i32,
}

impl From<&WorkEntry> for AttendanceEntryPayload {
    fn from(entry: &WorkEntry) -> Self {
        Self {
            id: None,
            start: entry.start_stamp(),
            end: entry.end_stamp(),
            entry_type: entry.kind.to_string(),
            offset: entry.offset.minutes(),
        }
    }
}

// Configuration for the HiBob client
#[derive(Clone, Debug)]
pub struct HibobConfig {
    pub base_url: String,
    /// Raw `Cookie` header of a logged-in browser session.
    pub session_cookie: Option<String>,
    pub request_timeout: Duration,
}

impl Default for HibobConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            session_cookie: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl From<&ExactflowConfig> for HibobConfig {
    fn from(config: &ExactflowConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            session_cookie: config.session_cookie.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

// HiBob attendance API client
#[derive(Clone)]
pub struct HibobClient {
    base_url: Url,
    http_client: Client,
}

impl HibobClient {
    pub fn new(config: HibobConfig) -> Result<Self, ServiceError> {
        let mut base_url = Url::parse(&config.base_url)?;
        // Url::join drops the last path segment unless the base ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(HIBOB_ACCEPT));
        headers.insert(
            HEADER_REQUESTED_WITH,
            HeaderValue::from_static("XMLHttpRequest"),
        );
        if let Some(cookie) = config.session_cookie.as_deref() {
            let mut value = HeaderValue::from_str(cookie.trim())
                .map_err(|_| ServiceError::InvalidHeader { name: "cookie" })?;
            value.set_sensitive(true);
            headers.insert(COOKIE, value);
        } else {
            warn!("No session cookie configured; HiBob will likely reject requests");
        }

        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            base_url,
            http_client,
        })
    }

    pub fn endpoint_url(&self, path: &str) -> Result<Url, ServiceError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// `api/attendance/employees/{id}/{tail..}`, with the id percent-encoded
    /// as a single path segment.
    fn employee_url(&self, employee: &EmployeeId, tail: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ServiceError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["api", "attendance", "employees"])
            .push(employee.as_str())
            .extend(tail);
        Ok(url)
    }

    /// Adds `bob-timezoneoffset` when the session offset is known.
    pub fn build_request(
        &self,
        method: Method,
        url: Url,
        offset: Option<UtcOffsetMinutes>,
    ) -> RequestBuilder {
        let request = self.http_client.request(method, url);
        match offset {
            Some(offset) => request.header(HEADER_TIMEZONE_OFFSET, offset.minutes().to_string()),
            None => request,
        }
    }

    // Sends the request and turns non-2xx statuses into ApiError.
    async fn send_checked(
        &self,
        request_builder: RequestBuilder,
        context_msg: &str,
    ) -> Result<Response, ServiceError> {
        let request = match request_builder.build() {
            Ok(req) => req,
            Err(e) => {
                error!("Request build failed for '{}': {}", context_msg, e);
                return Err(ServiceError::Request(e));
            }
        };
        let request_url = request.url().to_string();
        debug!("Sending request for '{}' to URL: {}", context_msg, request_url);

        let response = self.http_client.execute(request).await?;
        let status = response.status();
        debug!(
            "Received response for '{}' (URL: {}): Status={}",
            context_msg, request_url, status
        );

        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "(no body)".to_string());
        let message = truncate_diagnostic(&body);
        warn!(
            "Request for '{}' failed: Status={}, Body={}",
            context_msg, status, message
        );
        Err(ServiceError::ApiError { status, message })
    }

    pub async fn get_user(&self) -> Result<EmployeeId, ServiceError> {
        let url = self.endpoint_url("/api/user")?;
        let request = self.build_request(Method::GET, url, None);
        let response = self.send_checked(request, "get user").await?;
        let user: HibobUser = serde_json::from_slice(&response.bytes().await?)?;
        user.employee_id()
            .ok_or_else(|| ServiceError::UnexpectedResponse("user has no usable id".to_string()))
    }

    fn summary_url(&self, employee: &EmployeeId) -> Result<Url, ServiceError> {
        self.employee_url(employee, &["timesheets", "0", "summary"])
    }

    pub async fn get_timesheet_summary(
        &self,
        employee: &EmployeeId,
        offset: UtcOffsetMinutes,
    ) -> Result<SummarySnapshot, ServiceError> {
        let url = self.summary_url(employee)?;
        let request = self.build_request(Method::GET, url, Some(offset));
        let response = self.send_checked(request, "get timesheet summary").await?;
        let bytes = response.bytes().await?;
        let snapshot: SummarySnapshot = serde_json::from_slice(&bytes)?;
        info!(
            "Fetched timesheet summary for {} ({} day rows)",
            employee,
            snapshot.days.as_ref().map_or(0, Vec::len)
        );
        Ok(snapshot)
    }

    /// Replaces all entries on `day` with `entry`.
    pub async fn post_attendance_entries(
        &self,
        employee: &EmployeeId,
        day: CalendarDay,
        entry: &WorkEntry,
    ) -> Result<(), ServiceError> {
        let mut url = self.employee_url(employee, &["attendance", "entries"])?;
        url.query_pairs_mut()
            .append_pair("forDate", &day.to_string());

        let body = vec![AttendanceEntryPayload::from(entry)];
        let payload = serde_json::to_vec(&body)?;
        let request = self
            .build_request(Method::POST, url, Some(entry.offset))
            .header(CONTENT_TYPE, HIBOB_JSON_CONTENT_TYPE)
            .body(payload);

        let response = self.send_checked(request, "post attendance entries").await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        debug!("RESP {} for {}: {}", status, day, truncate_diagnostic(&text));
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for HibobClient {
    async fn fetch_identity(&self) -> Result<EmployeeId, ServiceError> {
        self.get_user().await
    }
}

#[async_trait]
impl SummaryProvider for HibobClient {
    async fn fetch_summary(
        &self,
        employee: &EmployeeId,
        offset: UtcOffsetMinutes,
    ) -> Result<SummarySnapshot, ServiceError> {
        self.get_timesheet_summary(employee, offset).await
    }
}

#[async_trait]
impl EntryWriter for HibobClient {
    async fn write_entry(
        &self,
        employee: &EmployeeId,
        day: CalendarDay,
        entry: &WorkEntry,
    ) -> Result<(), ServiceError> {
        self.post_attendance_entries(employee, day, entry).await
    }
}

#[async_trait]
impl RefreshNotifier for HibobClient {
    async fn touch(
        &self,
        employee: &EmployeeId,
        offset: UtcOffsetMinutes,
    ) -> Result<(), ServiceError> {
        let url = self.summary_url(employee)?;
        let request = self.build_request(Method::GET, url, Some(offset));
        self.send_checked(request, "refresh summary").await?;
        Ok(())
    }
}
