// src/report.rs

use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

use crate::reconcile::{RunPlan, RunReport};

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV writing failed: {0}")]
    Csv(#[from] csv::Error),
}

fn io_context(path: &Path, source: std::io::Error) -> ReportError {
    ReportError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl RunReport {
    /// One line for humans, e.g. "Fixed 3 attendance entries (1 failed, 0 skipped)".
    pub fn summary_line(&self) -> String {
        let fixed = self.result.succeeded;
        format!(
            "Fixed {} attendance entr{} ({} failed, {} skipped)",
            fixed,
            if fixed == 1 { "y" } else { "ies" },
            self.result.failed,
            self.skipped_inputs.len()
        )
    }

    pub fn write_json(&self, path: &Path) -> Result<(), ReportError> {
        write_pretty_json(self, path)
    }

    /// One row per attempted day (`day,outcome,reason`), followed by a row per
    /// skipped input with outcome `skipped`.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ReportError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(["day", "outcome", "reason"])?;
        for day in &self.result.attempted {
            let day_text = day.to_string();
            match self.result.per_day_outcome.get(day) {
                Some(outcome) if outcome.is_success() => {
                    csv_writer.write_record([day_text.as_str(), "success", ""])?
                }
                Some(outcome) => csv_writer.write_record([
                    day_text.as_str(),
                    "failure",
                    outcome.reason().unwrap_or_default(),
                ])?,
                None => csv_writer.write_record([day_text.as_str(), "unknown", ""])?,
            }
        }
        for skipped in &self.skipped_inputs {
            csv_writer.write_record([skipped.input.as_str(), "skipped", skipped.reason.as_str()])?;
        }
        csv_writer.flush().map_err(|e| ReportError::Csv(e.into()))?;
        Ok(())
    }

    pub fn write_csv_file(&self, path: &Path) -> Result<(), ReportError> {
        let file = File::create(path).map_err(|e| io_context(path, e))?;
        self.write_csv(file)
    }
}

impl RunPlan {
    pub fn summary_line(&self) -> String {
        let listed: Vec<String> = self.days.iter().map(ToString::to_string).collect();
        format!(
            "Dry run: would write {} day(s) [{}] ({} skipped)",
            self.days.len(),
            listed.join(", "),
            self.skipped_inputs.len()
        )
    }

    pub fn write_json(&self, path: &Path) -> Result<(), ReportError> {
        write_pretty_json(self, path)
    }
}

fn write_pretty_json<T: Serialize>(value: &T, path: &Path) -> Result<(), ReportError> {
    let json = serde_json::to_string_pretty(value)?;
    let mut file = File::create(path).map_err(|e| io_context(path, e))?;
    file.write_all(json.as_bytes())
        .map_err(|e| io_context(path, e))?;
    Ok(())
}
