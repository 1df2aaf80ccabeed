// src/test_support.rs
//
// In-memory collaborators for engine tests.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::collaborators::{EntryWriter, IdentityProvider, RefreshNotifier, SummaryProvider};
use crate::dates::{normalize, CalendarDay};
use crate::error::ServiceError;
use crate::session::{EmployeeId, UtcOffsetMinutes};
use crate::submission::WorkEntry;
use crate::summary::SummarySnapshot;

pub fn day(s: &str) -> CalendarDay {
    normalize(s).unwrap()
}

pub fn api_error(status: StatusCode, message: &str) -> ServiceError {
    ServiceError::ApiError {
        status,
        message: message.to_string(),
    }
}

#[derive(Default)]
struct FakeState {
    identity: Option<String>,
    summary: Option<SummarySnapshot>,
    failing_days: HashSet<CalendarDay>,
    fail_all_writes: bool,
    fail_refresh: bool,
    write_delay: Option<Duration>,
    writes: Vec<(EmployeeId, CalendarDay, WorkEntry)>,
    identity_calls: usize,
    summary_calls: usize,
    refresh_calls: usize,
    events: Vec<String>,
    summary_offsets: Vec<UtcOffsetMinutes>,
    refresh_offsets: Vec<UtcOffsetMinutes>,
}

/// Plays all four collaborator roles and records what it was asked to do.
#[derive(Clone, Default)]
pub struct FakeAttendanceService {
    state: Arc<Mutex<FakeState>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl FakeAttendanceService {
    pub fn new(identity: &str) -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().identity = Some(identity.to_string());
        fake
    }

    pub fn without_identity() -> Self {
        Self::default()
    }

    pub fn with_summary(self, summary: SummarySnapshot) -> Self {
        self.state.lock().unwrap().summary = Some(summary);
        self
    }

    pub fn failing_on(self, days: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            for d in days {
                state.failing_days.insert(day(d));
            }
        }
        self
    }

    pub fn failing_all_writes(self) -> Self {
        self.state.lock().unwrap().fail_all_writes = true;
        self
    }

    pub fn failing_refresh(self) -> Self {
        self.state.lock().unwrap().fail_refresh = true;
        self
    }

    pub fn with_write_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().write_delay = Some(delay);
        self
    }

    pub fn written_days(&self) -> Vec<CalendarDay> {
        let mut days: Vec<CalendarDay> = self
            .state
            .lock()
            .unwrap()
            .writes
            .iter()
            .map(|(_, d, _)| *d)
            .collect();
        days.sort();
        days
    }

    pub fn writes(&self) -> Vec<(EmployeeId, CalendarDay, WorkEntry)> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn write_attempts(&self) -> usize {
        self.state.lock().unwrap().writes.len()
    }

    pub fn identity_calls(&self) -> usize {
        self.state.lock().unwrap().identity_calls
    }

    pub fn summary_calls(&self) -> usize {
        self.state.lock().unwrap().summary_calls
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.lock().unwrap().refresh_calls
    }

    pub fn summary_offsets(&self) -> Vec<UtcOffsetMinutes> {
        self.state.lock().unwrap().summary_offsets.clone()
    }

    pub fn refresh_offsets(&self) -> Vec<UtcOffsetMinutes> {
        self.state.lock().unwrap().refresh_offsets.clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeAttendanceService {
    async fn fetch_identity(&self) -> Result<EmployeeId, ServiceError> {
        let mut state = self.state.lock().unwrap();
        state.identity_calls += 1;
        state.events.push("identity".to_string());
        match &state.identity {
            Some(id) => Ok(EmployeeId::new(id.clone())),
            None => Err(api_error(StatusCode::UNAUTHORIZED, "not logged in")),
        }
    }
}

#[async_trait]
impl SummaryProvider for FakeAttendanceService {
    async fn fetch_summary(
        &self,
        _employee: &EmployeeId,
        offset: UtcOffsetMinutes,
    ) -> Result<SummarySnapshot, ServiceError> {
        let mut state = self.state.lock().unwrap();
        state.summary_calls += 1;
        state.summary_offsets.push(offset);
        state.events.push("summary".to_string());
        state
            .summary
            .clone()
            .ok_or_else(|| api_error(StatusCode::SERVICE_UNAVAILABLE, "summary down"))
    }
}

#[async_trait]
impl EntryWriter for FakeAttendanceService {
    async fn write_entry(
        &self,
        employee: &EmployeeId,
        day: CalendarDay,
        entry: &WorkEntry,
    ) -> Result<(), ServiceError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.state.lock().unwrap().write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let fails = {
            let mut state = self.state.lock().unwrap();
            state.writes.push((employee.clone(), day, entry.clone()));
            state.events.push(format!("write:{}", day));
            state.fail_all_writes || state.failing_days.contains(&day)
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if fails {
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, "boom"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RefreshNotifier for FakeAttendanceService {
    async fn touch(
        &self,
        _employee: &EmployeeId,
        offset: UtcOffsetMinutes,
    ) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap();
        state.refresh_calls += 1;
        state.refresh_offsets.push(offset);
        state.events.push("refresh".to_string());
        if state.fail_refresh {
            Err(api_error(StatusCode::BAD_GATEWAY, "refresh down"))
        } else {
            Ok(())
        }
    }
}
