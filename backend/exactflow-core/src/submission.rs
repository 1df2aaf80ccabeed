// src/submission.rs

use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

use crate::collaborators::{EntryWriter, RefreshNotifier};
use crate::config::{ClockTime, WorkWindow};
use crate::dates::CalendarDay;
use crate::session::{SessionContext, UtcOffsetMinutes};

pub const ENTRY_KIND_WORK: &str = "work";

/// A corrective entry for one day, built right before it is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkEntry {
    pub day: CalendarDay,
    pub start_clock: ClockTime,
    pub end_clock: ClockTime,
    pub kind: &'static str,
    pub offset: UtcOffsetMinutes,
}

impl WorkEntry {
    pub fn new(day: CalendarDay, window: &WorkWindow, offset: UtcOffsetMinutes) -> Self {
        Self {
            day,
            start_clock: window.start,
            end_clock: window.end,
            kind: ENTRY_KIND_WORK,
            offset,
        }
    }

    /// `YYYY-MM-DDTHH:MM`
    pub fn start_stamp(&self) -> String {
        format!("{}T{}", self.day, self.start_clock)
    }

    pub fn end_stamp(&self) -> String {
        format!("{}T{}", self.day, self.end_clock)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayOutcome {
    Succeeded,
    Failed { reason: String },
}

impl DayOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DayOutcome::Succeeded)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            DayOutcome::Succeeded => None,
            DayOutcome::Failed { reason } => Some(reason),
        }
    }
}

impl Serialize for DayOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(None)?;
        match self {
            DayOutcome::Succeeded => map.serialize_entry("status", "success")?,
            DayOutcome::Failed { reason } => {
                map.serialize_entry("status", "failure")?;
                map.serialize_entry("reason", reason)?;
            }
        }
        map.end()
    }
}

/// Counts and per-day outcomes of one submission pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub attempted: Vec<CalendarDay>,
    pub succeeded: usize,
    pub failed: usize,
    pub per_day_outcome: BTreeMap<CalendarDay, DayOutcome>,
}

impl RunResult {
    fn with_attempted(attempted: Vec<CalendarDay>) -> Self {
        Self {
            attempted,
            ..Self::default()
        }
    }

    fn record(&mut self, day: CalendarDay, outcome: DayOutcome) {
        if self.per_day_outcome.contains_key(&day) {
            warn!("Ignoring second outcome reported for {}", day);
            return;
        }
        if outcome.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.per_day_outcome.insert(day, outcome);
    }

    pub fn failures(&self) -> impl Iterator<Item = (&CalendarDay, &str)> {
        self.per_day_outcome
            .iter()
            .filter_map(|(day, outcome)| outcome.reason().map(|r| (day, r)))
    }
}

/// Dispatches one write per day concurrently and aggregates the outcomes.
#[derive(Clone)]
pub struct SubmissionOrchestrator {
    writer: Arc<dyn EntryWriter>,
    notifier: Arc<dyn RefreshNotifier>,
    concurrency_limit: Option<usize>,
}

impl SubmissionOrchestrator {
    pub fn new(writer: Arc<dyn EntryWriter>, notifier: Arc<dyn RefreshNotifier>) -> Self {
        Self {
            writer,
            notifier,
            concurrency_limit: None,
        }
    }

    /// Caps the number of writes in flight. `None` (or 0) lifts the cap.
    pub fn with_concurrency_limit(mut self, limit: Option<usize>) -> Self {
        self.concurrency_limit = limit.filter(|n| *n > 0);
        self
    }

    /// Writes a `window` entry for every day in `days`.
    ///
    /// Every write runs to completion regardless of how the others fare. Once
    /// all of them are done a single refresh is sent; its result is only logged.
    pub async fn submit_all(
        &self,
        days: &[CalendarDay],
        session: &SessionContext,
        window: &WorkWindow,
    ) -> RunResult {
        let attempted = dedupe_preserving_order(days);
        let mut result = RunResult::with_attempted(attempted.clone());

        let permits = self
            .concurrency_limit
            .map(|limit| Arc::new(Semaphore::new(limit)));
        let (tx, mut rx) = mpsc::unbounded_channel::<(CalendarDay, DayOutcome)>();

        info!(
            "Submitting {} day(s) for employee {} (limit: {})",
            attempted.len(),
            session.identity,
            self.concurrency_limit
                .map_or_else(|| "unlimited".to_string(), |n| n.to_string())
        );

        for day in attempted.iter().copied() {
            let entry = WorkEntry::new(day, window, session.offset);
            let writer = Arc::clone(&self.writer);
            let employee = session.identity.clone();
            let permits = permits.clone();
            let tx = tx.clone();

            tokio::spawn(async move {
                let _permit = match permits {
                    Some(sem) => sem.acquire_owned().await.ok(),
                    None => None,
                };
                debug!("POST entry for {}: {:?}", day, entry);
                let outcome = match writer.write_entry(&employee, day, &entry).await {
                    Ok(()) => {
                        info!("Entry written for {}", day);
                        DayOutcome::Succeeded
                    }
                    Err(e) => {
                        let reason = e.diagnostic();
                        warn!("Entry for {} failed: {}", day, reason);
                        DayOutcome::Failed { reason }
                    }
                };
                // Receiver outlives every sender, so this can't fail in practice.
                let _ = tx.send((day, outcome));
            });
        }
        drop(tx);

        // Single writer: outcomes land here in completion order.
        while let Some((day, outcome)) = rx.recv().await {
            result.record(day, outcome);
        }

        // A task that died before reporting still counts as attempted.
        for day in &attempted {
            if !result.per_day_outcome.contains_key(day) {
                warn!("Submission task for {} ended without an outcome", day);
                result.record(
                    *day,
                    DayOutcome::Failed {
                        reason: "submission task aborted".to_string(),
                    },
                );
            }
        }

        self.refresh(session).await;

        info!(
            "Submission finished: {} attempted, {} succeeded, {} failed",
            result.attempted.len(),
            result.succeeded,
            result.failed
        );
        result
    }

    async fn refresh(&self, session: &SessionContext) {
        // Result is discarded; it never touches the RunResult.
        match self.notifier.touch(&session.identity, session.offset).await {
            Ok(()) => debug!("Summary refresh sent"),
            Err(e) => warn!("Summary refresh failed (ignored): {}", e.diagnostic()),
        }
    }
}

fn dedupe_preserving_order(days: &[CalendarDay]) -> Vec<CalendarDay> {
    let mut seen = HashSet::with_capacity(days.len());
    let mut unique = Vec::with_capacity(days.len());
    for day in days {
        if seen.insert(*day) {
            unique.push(*day);
        } else {
            warn!("Duplicate day {} dropped from submission list", day);
        }
    }
    unique
}
