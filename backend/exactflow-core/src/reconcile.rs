// src/reconcile.rs

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::collaborators::{EntryWriter, IdentityProvider, RefreshNotifier, SummaryProvider};
use crate::config::{ReconcileConfig, SelectionStrategy};
use crate::dates::{normalize, CalendarDay};
use crate::error::ReconcileError;
use crate::session::{ambient_offset_minutes, EmployeeId, SessionContext, UtcOffsetMinutes};
use crate::submission::{RunResult, SubmissionOrchestrator};
use crate::summary::select_missing_days;

/// How a run decides which days to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaySelection {
    /// Literal date-like values supplied by the caller.
    Explicit(Vec<String>),
    /// Days the remote summary shows as payable but empty.
    MissingOnly,
}

impl DaySelection {
    pub fn from_config(config: &ReconcileConfig) -> Self {
        match config.strategy {
            SelectionStrategy::Explicit => DaySelection::Explicit(config.explicit_dates.clone()),
            SelectionStrategy::MissingOnly => DaySelection::MissingOnly,
        }
    }

    pub fn strategy(&self) -> SelectionStrategy {
        match self {
            DaySelection::Explicit(_) => SelectionStrategy::Explicit,
            DaySelection::MissingOnly => SelectionStrategy::MissingOnly,
        }
    }
}

/// An explicit-list input that could not be turned into a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedInput {
    pub input: String,
    pub reason: String,
}

/// Days a run would write, without having written anything.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunPlan {
    pub identity: EmployeeId,
    pub offset: UtcOffsetMinutes,
    pub strategy: SelectionStrategy,
    pub days: Vec<CalendarDay>,
    pub skipped_inputs: Vec<SkippedInput>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub identity: EmployeeId,
    pub offset: UtcOffsetMinutes,
    pub strategy: SelectionStrategy,
    pub skipped_inputs: Vec<SkippedInput>,
    pub result: RunResult,
}

pub struct ReconciliationRun {
    config: ReconcileConfig,
    identity: Arc<dyn IdentityProvider>,
    summary: Arc<dyn SummaryProvider>,
    writer: Arc<dyn EntryWriter>,
    notifier: Arc<dyn RefreshNotifier>,
    ambient_offset: i32,
}

impl ReconciliationRun {
    /// Builds a run against one service that provides every capability.
    pub fn new<S>(config: ReconcileConfig, service: Arc<S>) -> Self
    where
        S: IdentityProvider + SummaryProvider + EntryWriter + RefreshNotifier + 'static,
    {
        Self::from_parts(
            config,
            service.clone(),
            service.clone(),
            service.clone(),
            service,
        )
    }

    pub fn from_parts(
        config: ReconcileConfig,
        identity: Arc<dyn IdentityProvider>,
        summary: Arc<dyn SummaryProvider>,
        writer: Arc<dyn EntryWriter>,
        notifier: Arc<dyn RefreshNotifier>,
    ) -> Self {
        Self {
            config,
            identity,
            summary,
            writer,
            notifier,
            ambient_offset: ambient_offset_minutes(),
        }
    }

    /// Overrides the machine's local UTC offset (minutes east of UTC).
    pub fn with_ambient_offset(mut self, minutes: i32) -> Self {
        self.ambient_offset = minutes;
        self
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Resolves the session and selects days, without writing anything.
    pub async fn plan(
        &self,
        selection: &DaySelection,
        as_of: CalendarDay,
    ) -> Result<RunPlan, ReconcileError> {
        let session = SessionContext::resolve(
            self.identity.as_ref(),
            self.ambient_offset,
            self.config.default_offset,
        )
        .await?;
        self.select(session, selection, as_of).await
    }

    /// Full run: plan, then submit every selected day.
    pub async fn execute(
        &self,
        selection: &DaySelection,
        as_of: CalendarDay,
    ) -> Result<RunReport, ReconcileError> {
        let session = SessionContext::resolve(
            self.identity.as_ref(),
            self.ambient_offset,
            self.config.default_offset,
        )
        .await?;
        let plan = self.select(session.clone(), selection, as_of).await?;

        let orchestrator =
            SubmissionOrchestrator::new(Arc::clone(&self.writer), Arc::clone(&self.notifier))
                .with_concurrency_limit(self.config.concurrency_limit);
        let result = orchestrator
            .submit_all(&plan.days, &session, &self.config.window)
            .await;

        Ok(RunReport {
            identity: plan.identity,
            offset: plan.offset,
            strategy: plan.strategy,
            skipped_inputs: plan.skipped_inputs,
            result,
        })
    }

    async fn select(
        &self,
        session: SessionContext,
        selection: &DaySelection,
        as_of: CalendarDay,
    ) -> Result<RunPlan, ReconcileError> {
        let (days, skipped_inputs) = match selection {
            DaySelection::Explicit(inputs) => normalize_explicit(inputs),
            DaySelection::MissingOnly => {
                let snapshot = self
                    .summary
                    .fetch_summary(&session.identity, session.offset)
                    .await
                    .map_err(|e| ReconcileError::SummaryUnavailable(e.diagnostic()))?;
                let days = select_missing_days(&snapshot, &self.config.skip_weekdays, as_of)?;
                (days, Vec::new())
            }
        };

        info!(
            "Selected {} day(s) via {} strategy ({} input(s) skipped)",
            days.len(),
            selection.strategy(),
            skipped_inputs.len()
        );

        Ok(RunPlan {
            identity: session.identity,
            offset: session.offset,
            strategy: selection.strategy(),
            days,
            skipped_inputs,
        })
    }
}

/// Normalizes each input on its own; bad entries are recorded, not fatal.
pub fn normalize_explicit(inputs: &[String]) -> (Vec<CalendarDay>, Vec<SkippedInput>) {
    let mut days = Vec::with_capacity(inputs.len());
    let mut skipped = Vec::new();
    for raw in inputs {
        match normalize(raw) {
            Ok(day) => days.push(day),
            Err(e) => {
                warn!("Skip (bad date): {:?}: {}", raw, e);
                skipped.push(SkippedInput {
                    input: raw.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    (days, skipped)
}
