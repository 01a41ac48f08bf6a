//! Run Report Module
//!
//! Per-station results of one pass over the station list, plus the counts
//! an operator reads first. Serializable so the CLI can print it as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logging;
use crate::model::iso;
use crate::pipeline::{SkipReason, StationOutcome};

// ============================================================================
// Report types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: String,
    pub results: Vec<StationStatus>,
    pub summary: RunSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub stored: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Stored,
    Skipped,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationStatus {
    pub station_id: String,
    pub status: RunStatus,
    /// What was stored, why the station was skipped, or the failure cause.
    pub message: String,
    pub record_timestamp: Option<String>,
    pub image_ref: Option<String>,
}

impl StationStatus {
    fn from_outcome(station_id: &str, outcome: &StationOutcome) -> Self {
        let (status, message, record_timestamp, image_ref) = match outcome {
            StationOutcome::Stored(record) => (
                RunStatus::Stored,
                format!("Processed image {}", record.image_ref),
                Some(record.timestamp.clone()),
                Some(record.image_ref.clone()),
            ),
            StationOutcome::Skipped(SkipReason::Duplicate { fingerprint }) => (
                RunStatus::Skipped,
                format!("Duplicate image ({})", fingerprint),
                None,
                None,
            ),
            StationOutcome::Skipped(SkipReason::NoMeteoMatch { image_ref, timestamp }) => (
                RunStatus::Skipped,
                format!("No meteo data at {}", timestamp),
                Some(timestamp.clone()),
                Some(image_ref.clone()),
            ),
            StationOutcome::Failed(e) => (RunStatus::Error, e.to_string(), None, None),
        };
        Self { station_id: station_id.to_string(), status, message, record_timestamp, image_ref }
    }
}

impl RunReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self { started_at: iso(started_at), results: Vec::new(), summary: RunSummary::default() }
    }

    /// Records one station's outcome and updates the counts.
    pub fn push(&mut self, station_id: &str, outcome: &StationOutcome) {
        let status = StationStatus::from_outcome(station_id, outcome);
        self.summary.total += 1;
        match status.status {
            RunStatus::Stored => self.summary.stored += 1,
            RunStatus::Skipped => self.summary.skipped += 1,
            RunStatus::Error => self.summary.failed += 1,
        }
        self.results.push(status);
    }

    pub fn log_summary(&self) {
        logging::log_run_summary(
            self.summary.total,
            self.summary.stored,
            self.summary.skipped,
            self.summary.failed,
        );
    }

    /// True when at least one station failed.
    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }
}

pub fn print_summary(report: &RunReport) {
    println!("═══════════════════════════════════════════════════════════");
    println!("BUOYCAM INGEST SUMMARY ({})", report.started_at);
    println!("═══════════════════════════════════════════════════════════");
    for result in &report.results {
        let tag = match result.status {
            RunStatus::Stored => "✓",
            RunStatus::Skipped => "-",
            RunStatus::Error => "✗",
        };
        println!("  {} {:<8} {}", tag, result.station_id, result.message);
    }
    println!();
    println!(
        "Stored: {}/{}  Skipped: {}  Failed: {}",
        report.summary.stored, report.summary.total, report.summary.skipped, report.summary.failed
    );
    println!("═══════════════════════════════════════════════════════════");
}
