// src/lib.rs
//
// Attendance reconciliation: find days that should carry a work entry but
// don't, and write a standard one for each.

pub mod collaborators;
pub mod config;
pub mod dates;
pub mod error;
pub mod hibob_client;
pub mod reconcile;
pub mod report;
pub mod session;
pub mod submission;
pub mod summary;

#[cfg(test)]
mod test_support;


pub use collaborators::{EntryWriter, IdentityProvider, RefreshNotifier, SummaryProvider};
pub use config::{ExactflowConfig, ReconcileConfig, SelectionStrategy, SkipPolicy, WorkWindow};
pub use dates::{normalize, CalendarDay, DateInput};
pub use error::{ConfigError, DateError, ReconcileError, ServiceError};
pub use hibob_client::{HibobClient, HibobConfig};
pub use reconcile::{DaySelection, ReconciliationRun, RunPlan, RunReport, SkippedInput};
pub use report::ReportError;
pub use session::{EmployeeId, SessionContext, UtcOffsetMinutes};
pub use submission::{DayOutcome, RunResult, SubmissionOrchestrator, WorkEntry};
pub use summary::{select_missing_days, DaySummaryRow, SummarySnapshot};
