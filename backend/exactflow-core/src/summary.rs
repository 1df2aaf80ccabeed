// src/summary.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::SkipPolicy;
use crate::dates::{normalize, CalendarDay};
use crate::error::ReconcileError;

// --- Wire format of the attendance summary ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSummaryDay {
    pub date: String,
    #[serde(default)]
    pub potential_hours: Option<Decimal>,
    #[serde(default)]
    pub worked_hours: Option<Decimal>,
}

/// Snapshot of the remote timesheet summary for one reporting window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarySnapshot {
    #[serde(default, alias = "dailyBreakdown", alias = "dailySummaries")]
    pub days: Option<Vec<RawSummaryDay>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySummaryRow {
    pub day: CalendarDay,
    pub potential_hours: Option<Decimal>,
    pub worked_hours: Option<Decimal>,
}

impl DaySummaryRow {
    /// A payable workday with nothing meaningful logged yet.
    pub fn is_missing_work(&self) -> bool {
        let payable = self
            .potential_hours
            .map_or(false, |h| h > Decimal::ZERO);
        let logged = self.worked_hours.map_or(false, |h| h > Decimal::ZERO);
        payable && !logged
    }
}

impl SummarySnapshot {
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Per-day rows in snapshot order. Rows whose date can't be normalized
    /// are dropped.
    pub fn rows(&self) -> Result<Vec<DaySummaryRow>, ReconcileError> {
        let days = self.days.as_ref().ok_or_else(|| {
            ReconcileError::SummaryUnavailable("snapshot has no daily breakdown".to_string())
        })?;

        let mut rows = Vec::with_capacity(days.len());
        for raw in days {
            match normalize(raw.date.as_str()) {
                Ok(day) => rows.push(DaySummaryRow {
                    day,
                    potential_hours: raw.potential_hours,
                    worked_hours: raw.worked_hours,
                }),
                Err(e) => warn!("Dropping summary row: {}", e),
            }
        }
        Ok(rows)
    }
}

/// Days in `summary` that still need a work entry, in snapshot order.
///
/// A day qualifies when it is not after `as_of`, its weekday isn't skipped,
/// it has positive potential hours and no positive worked hours.
pub fn select_missing_days(
    summary: &SummarySnapshot,
    skip: &SkipPolicy,
    as_of: CalendarDay,
) -> Result<Vec<CalendarDay>, ReconcileError> {
    let rows = summary.rows()?;
    let selected: Vec<CalendarDay> = rows
        .iter()
        .filter(|row| row.day <= as_of)
        .filter(|row| !skip.contains(row.day.weekday_ordinal()))
        .filter(|row| row.is_missing_work())
        .map(|row| row.day)
        .collect();

    debug!(
        "Selected {} of {} summary days as missing (as of {})",
        selected.len(),
        rows.len(),
        as_of
    );
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn day(s: &str) -> CalendarDay {
        normalize(s).unwrap()
    }

    fn row(date: &str, potential: Option<Decimal>, worked: Option<Decimal>) -> RawSummaryDay {
        RawSummaryDay {
            date: date.to_string(),
            potential_hours: potential,
            worked_hours: worked,
        }
    }

    fn snapshot(rows: Vec<RawSummaryDay>) -> SummarySnapshot {
        SummarySnapshot { days: Some(rows) }
    }

    #[test]
    fn test_reference_scenario() {
        let summary = snapshot(vec![
            row("2025-08-01", Some(dec!(8)), Some(dec!(8))),
            row("2025-08-02", Some(dec!(8)), Some(dec!(0))),
            row("2025-08-03", Some(dec!(0)), None),
        ]);
        let days = select_missing_days(&summary, &SkipPolicy::none(), day("2025-08-03")).unwrap();
        assert_eq!(days, vec![day("2025-08-02")]);
    }

    #[test]
    fn test_missing_breakdown_is_an_error_not_empty() {
        let summary = SummarySnapshot { days: None };
        let result = select_missing_days(&summary, &SkipPolicy::none(), day("2025-08-03"));
        assert!(matches!(result, Err(ReconcileError::SummaryUnavailable(_))));
    }

    #[test]
    fn test_empty_breakdown_is_nothing_to_do() {
        let summary = snapshot(Vec::new());
        let days = select_missing_days(&summary, &SkipPolicy::none(), day("2025-08-03")).unwrap();
        assert!(days.is_empty());
    }

    #[test]
    fn test_future_days_are_never_candidates() {
        let summary = snapshot(vec![
            row("2025-08-04", Some(dec!(8)), None),
            row("2025-08-05", Some(dec!(8)), None),
            row("2025-08-06", Some(dec!(8)), None),
        ]);
        let days = select_missing_days(&summary, &SkipPolicy::none(), day("2025-08-05")).unwrap();
        assert_eq!(days, vec![day("2025-08-04"), day("2025-08-05")]);
    }

    #[test]
    fn test_skip_policy_excludes_weekdays() {
        // 2025-08-08 is a Friday (5), 2025-08-09 a Saturday (6).
        let summary = snapshot(vec![
            row("2025-08-07", Some(dec!(8)), None),
            row("2025-08-08", Some(dec!(8)), None),
            row("2025-08-09", Some(dec!(8)), None),
        ]);
        let skip = SkipPolicy::from_ordinals([5, 6]);
        let days = select_missing_days(&summary, &skip, day("2025-08-31")).unwrap();
        assert_eq!(days, vec![day("2025-08-07")]);
    }

    #[test]
    fn test_worked_hours_edge_values() {
        let summary = snapshot(vec![
            row("2025-08-04", Some(dec!(8)), Some(dec!(-1))),
            row("2025-08-05", Some(dec!(8)), Some(dec!(0.25))),
            row("2025-08-06", Some(dec!(8)), None),
            row("2025-08-07", None, None),
            row("2025-08-08", Some(dec!(-8)), None),
        ]);
        let days = select_missing_days(&summary, &SkipPolicy::none(), day("2025-08-31")).unwrap();
        assert_eq!(days, vec![day("2025-08-04"), day("2025-08-06")]);
    }

    #[test]
    fn test_selection_matches_rule_for_every_row() {
        let mut rows = Vec::new();
        let potentials = [None, Some(dec!(0)), Some(dec!(4)), Some(dec!(8))];
        let worked = [None, Some(dec!(0)), Some(dec!(-2)), Some(dec!(3))];
        let mut d = day("2025-07-28").date();
        for p in potentials {
            for w in worked {
                rows.push(row(&d.to_string(), p, w));
                d = d.succ_opt().unwrap();
            }
        }
        let summary = snapshot(rows);
        let skip = SkipPolicy::from_ordinals([3]);
        let as_of = day("2025-08-10");

        let selected = select_missing_days(&summary, &skip, as_of).unwrap();
        for parsed in summary.rows().unwrap() {
            let expected = parsed.potential_hours.map_or(false, |p| p > Decimal::ZERO)
                && parsed.worked_hours.map_or(true, |w| w <= Decimal::ZERO)
                && !skip.contains(parsed.day.weekday_ordinal())
                && parsed.day <= as_of;
            assert_eq!(
                selected.contains(&parsed.day),
                expected,
                "mismatch for {:?}",
                parsed
            );
        }
        let mut sorted = selected.clone();
        sorted.sort();
        assert_eq!(selected, sorted, "output must keep snapshot order");
    }

    #[test]
    fn test_parses_wire_json_with_mixed_shapes() {
        let value = json!({
            "dailyBreakdown": [
                { "date": "Fri, Aug/01/2025", "potentialHours": 8, "workedHours": 8 },
                { "date": "Aug 04, 2025", "potentialHours": "8.0", "workedHours": null },
                { "date": "garbage", "potentialHours": 8 },
                { "date": "2025-08-05", "potentialHours": 8.5 }
            ]
        });
        let summary = SummarySnapshot::from_json(value).unwrap();
        let rows = summary.rows().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].potential_hours, Some(dec!(8.0)));
        assert_eq!(rows[1].worked_hours, None);
        assert_eq!(rows[2].potential_hours, Some(dec!(8.5)));

        let days = select_missing_days(&summary, &SkipPolicy::none(), day("2025-08-31")).unwrap();
        assert_eq!(days, vec![day("2025-08-04"), day("2025-08-05")]);
    }

    #[test]
    fn test_snapshot_without_days_key_parses_as_unavailable() {
        let summary = SummarySnapshot::from_json(json!({ "totals": { "worked": 0 } })).unwrap();
        assert!(summary.days.is_none());
        assert!(summary.rows().is_err());
    }
}
