// src/collaborators.rs
//
// Capabilities the reconciliation engine needs from the outside world. The
// HTTP implementation lives in `hibob_client`; tests use in-memory fakes.
// Calls made after the session is resolved carry the session's UTC offset.

use async_trait::async_trait;

use crate::dates::CalendarDay;
use crate::error::ServiceError;
use crate::session::{EmployeeId, UtcOffsetMinutes};
use crate::submission::WorkEntry;
use crate::summary::SummarySnapshot;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn fetch_identity(&self) -> Result<EmployeeId, ServiceError>;
}

#[async_trait]
pub trait SummaryProvider: Send + Sync {
    async fn fetch_summary(
        &self,
        employee: &EmployeeId,
        offset: UtcOffsetMinutes,
    ) -> Result<SummarySnapshot, ServiceError>;
}

/// Day-scoped upsert: a write replaces every existing entry for `day`.
#[async_trait]
pub trait EntryWriter: Send + Sync {
    async fn write_entry(
        &self,
        employee: &EmployeeId,
        day: CalendarDay,
        entry: &WorkEntry,
    ) -> Result<(), ServiceError>;
}

/// Best-effort nudge so dependent views pick up new entries.
#[async_trait]
pub trait RefreshNotifier: Send + Sync {
    async fn touch(
        &self,
        employee: &EmployeeId,
        offset: UtcOffsetMinutes,
    ) -> Result<(), ServiceError>;
}
