/// Structured logging for the buoy camera ingest service
///
/// Events go through `tracing`. Every service event carries the data source
/// it concerns and, where there is one, the station id, so a run's output
/// can be filtered per buoy. Supports console output (plain or JSON) and an
/// optional append-only log file for scheduled runs.

use std::fmt;
use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter, Layer, Registry};

use crate::config::LoggingSettings;
use crate::model::{FetchError, StationError};

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Buoycam image endpoint
    Image,
    /// Text detection
    Ocr,
    /// 5-day meteorological log endpoint
    Log,
    /// Blob store
    Store,
    /// Record store
    Table,
    System,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Image => write!(f, "IMAGE"),
            DataSource::Ocr => write!(f, "OCR"),
            DataSource::Log => write!(f, "LOG"),
            DataSource::Store => write!(f, "STORE"),
            DataSource::Table => write!(f, "TABLE"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - camera offline or station not reporting
    Expected,
    /// Unexpected failure - service degradation or configuration issue
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Classify a fetch failure against an NDBC endpoint.
pub fn classify_fetch_failure(err: &FetchError) -> FailureType {
    match err {
        // Buoys without a working camera answer 404
        FetchError::Http { status: 404, .. } => FailureType::Expected,
        FetchError::Http { status, .. } if *status >= 500 => FailureType::Unexpected,
        FetchError::Http { .. } => FailureType::Unknown,
        FetchError::Transport(_) => FailureType::Unexpected,
        FetchError::Other(_) => FailureType::Unknown,
    }
}

/// Classify a failure that ended a station's run.
pub fn classify_station_failure(err: &StationError) -> FailureType {
    match err {
        StationError::ImageFetch(e) => classify_fetch_failure(e),
        StationError::Upload(_) | StationError::Persist(_) => FailureType::Unexpected,
    }
}

// ---------------------------------------------------------------------------
// Initialisation
// ---------------------------------------------------------------------------

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `settings.level`. When `settings.file` is set every
/// event is also appended there without ANSI colours.
pub fn init_logger(settings: &LoggingSettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    if settings.json {
        layers.push(tracing_fmt::layer().json().boxed());
    } else {
        layers.push(tracing_fmt::layer().with_target(false).boxed());
    }

    if let Some(path) = &settings.file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        layers.push(
            tracing_fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Log a general informational message
pub fn info(source: DataSource, station_id: Option<&str>, message: &str) {
    tracing::info!(source = %source, station = station_id.unwrap_or("-"), "{}", message);
}

/// Log a warning message
pub fn warn(source: DataSource, station_id: Option<&str>, message: &str) {
    tracing::warn!(source = %source, station = station_id.unwrap_or("-"), "{}", message);
}

/// Log an error message
pub fn error(source: DataSource, station_id: Option<&str>, message: &str) {
    tracing::error!(source = %source, station = station_id.unwrap_or("-"), "{}", message);
}

/// Log a debug message
pub fn debug(source: DataSource, station_id: Option<&str>, message: &str) {
    tracing::debug!(source = %source, station = station_id.unwrap_or("-"), "{}", message);
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

fn failure_source(err: &StationError) -> DataSource {
    match err {
        StationError::ImageFetch(_) => DataSource::Image,
        StationError::Upload(_) => DataSource::Store,
        StationError::Persist(_) => DataSource::Table,
    }
}

/// Level a station failure is logged at.
pub fn failure_level(failure_type: &FailureType) -> Level {
    match failure_type {
        FailureType::Expected => Level::DEBUG,
        FailureType::Unexpected => Level::ERROR,
        FailureType::Unknown => Level::WARN,
    }
}

/// Log a station failure at a level chosen by its classification
pub fn log_station_failure(station_id: &str, err: &StationError) {
    let failure_type = classify_station_failure(err);
    let message = format!("station run failed [{}]: {}", failure_type, err);
    let source = failure_source(err);

    let level = failure_level(&failure_type);
    if level == Level::DEBUG {
        debug(source, Some(station_id), &message);
    } else if level == Level::ERROR {
        error(source, Some(station_id), &message);
    } else {
        warn(source, Some(station_id), &message);
    }
}

// ---------------------------------------------------------------------------
// Run Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of one pass over the station list
pub fn log_run_summary(total: usize, stored: usize, skipped: usize, failed: usize) {
    let message = format!(
        "Run complete: {}/{} stored, {} skipped, {} failed",
        stored, total, skipped, failed
    );

    if failed == 0 {
        info(DataSource::System, None, &message);
    } else if failed == total {
        error(DataSource::System, None, &message);
    } else {
        warn(DataSource::System, None, &message);
    }
}
