/// Core data types for the buoy camera ingest service.
///
/// This module defines the shared domain model imported by all other modules:
/// captured images, recognized text, parsed meteo rows, the persisted
/// observation record, and the error types raised at collaborator seams.
/// It contains no I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Formats and sentinels
// ---------------------------------------------------------------------------

/// Timestamp format printed into buoycam images, e.g. "11/18/2025 1610".
pub const LABEL_TIME_FORMAT: &str = "%m/%d/%Y %H%M";

/// Sortable ISO 8601 form used for record keys, e.g. "2025-11-18T16:10:00".
pub const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// NDBC log convention for "measurement not available".
pub const MISSING_SENTINEL: &str = "MM";

/// Formats an instant the way record keys and audit metadata expect it.
pub fn iso(instant: DateTime<Utc>) -> String {
    instant.format(ISO_FORMAT).to_string()
}

// ---------------------------------------------------------------------------
// Image types
// ---------------------------------------------------------------------------

/// Raw image bytes fetched from a station camera, stamped with the fetch time.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedImage {
    pub station_id: String,
    pub source_url: String,
    pub bytes: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}

/// Whether a text detection covers a whole line or a single word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TextKind {
    Line,
    Word,
}

/// One unit of recognized text returned by a text detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDetection {
    pub kind: TextKind,
    pub text: String,
    /// Detector confidence, 0–100.
    pub confidence: f32,
}

impl TextDetection {
    pub fn line(text: impl Into<String>, confidence: f32) -> Self {
        Self { kind: TextKind::Line, text: text.into(), confidence }
    }

    pub fn word(text: impl Into<String>, confidence: f32) -> Self {
        Self { kind: TextKind::Word, text: text.into(), confidence }
    }
}

/// Station id and timestamp read off the image overlay.
///
/// Both halves are `None` when no overlay line matched or when text
/// detection failed. Kept verbatim on the record for audit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageLabel {
    pub station: Option<String>,
    pub time: Option<String>,
}

impl ImageLabel {
    pub fn new(station: impl Into<String>, time: impl Into<String>) -> Self {
        Self { station: Some(station.into()), time: Some(time.into()) }
    }

    pub fn is_empty(&self) -> bool {
        self.station.is_none() && self.time.is_none()
    }
}

// ---------------------------------------------------------------------------
// Meteo types
// ---------------------------------------------------------------------------

/// Names of the 14 data columns that follow the timestamp in a 5-day log,
/// in column order.
pub const METEO_FIELD_NAMES: [&str; 14] = [
    "wind_dir",
    "wind_speed",
    "gust",
    "wave_height",
    "dpd",
    "apd",
    "mwd",
    "pressure",
    "air_temp",
    "water_temp",
    "dewpoint",
    "visibility",
    "ptdy",
    "tide",
];

/// Sensor values from one log row, kept as the raw strings from the file.
///
/// `None` means the log reported the `MM` sentinel. No numeric coercion is
/// applied so the original precision survives into the record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeteoFields {
    pub wind_dir: Option<String>,    // WDIR, degrees true
    pub wind_speed: Option<String>,  // WSPD, m/s
    pub gust: Option<String>,        // GST, m/s
    pub wave_height: Option<String>, // WVHT, m
    pub dpd: Option<String>,         // dominant wave period, s
    pub apd: Option<String>,         // average wave period, s
    pub mwd: Option<String>,         // mean wave direction, degrees
    pub pressure: Option<String>,    // PRES, hPa
    pub air_temp: Option<String>,    // ATMP, °C
    pub water_temp: Option<String>,  // WTMP, °C
    pub dewpoint: Option<String>,    // DEWP, °C
    pub visibility: Option<String>,  // VIS, nmi
    pub ptdy: Option<String>,        // pressure tendency, hPa
    pub tide: Option<String>,        // TIDE, ft
}

impl MeteoFields {
    /// Builds the field set from the 14 data tokens of a log row, mapping
    /// the `MM` sentinel to `None`. Returns `None` if fewer than 14 tokens
    /// are supplied; extra tokens are ignored.
    pub fn from_tokens(tokens: &[&str]) -> Option<Self> {
        if tokens.len() < METEO_FIELD_NAMES.len() {
            return None;
        }
        let value = |idx: usize| -> Option<String> {
            let token = tokens[idx];
            if token == MISSING_SENTINEL {
                None
            } else {
                Some(token.to_string())
            }
        };
        Some(Self {
            wind_dir: value(0),
            wind_speed: value(1),
            gust: value(2),
            wave_height: value(3),
            dpd: value(4),
            apd: value(5),
            mwd: value(6),
            pressure: value(7),
            air_temp: value(8),
            water_temp: value(9),
            dewpoint: value(10),
            visibility: value(11),
            ptdy: value(12),
            tide: value(13),
        })
    }

    /// Looks a value up by its column name, e.g. `"air_temp"`.
    pub fn get(&self, name: &str) -> Option<&str> {
        let value = match name {
            "wind_dir" => &self.wind_dir,
            "wind_speed" => &self.wind_speed,
            "gust" => &self.gust,
            "wave_height" => &self.wave_height,
            "dpd" => &self.dpd,
            "apd" => &self.apd,
            "mwd" => &self.mwd,
            "pressure" => &self.pressure,
            "air_temp" => &self.air_temp,
            "water_temp" => &self.water_temp,
            "dewpoint" => &self.dewpoint,
            "visibility" => &self.visibility,
            "ptdy" => &self.ptdy,
            "tide" => &self.tide,
            _ => return None,
        };
        value.as_deref()
    }
}

/// One parsed row of a station's 5-day meteorological log.
#[derive(Debug, Clone, PartialEq)]
pub struct MeteoRecord {
    pub timestamp: DateTime<Utc>,
    pub fields: MeteoFields,
}

// ---------------------------------------------------------------------------
// Persisted record
// ---------------------------------------------------------------------------

/// The combined image + meteo observation written to the record store.
///
/// `(station_id, timestamp)` is the natural key; writing the same pair again
/// replaces the earlier row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub station_id: String,
    /// ISO 8601 instant, the sort key within a station.
    pub timestamp: String,
    /// Blob store key of the archived image.
    pub image_ref: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meteo: Option<MeteoFields>,
    /// ISO instant of the log row the meteo block came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meteo_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rekognition_data: Option<ImageLabel>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors from fetching images or logs over HTTP.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Non-2xx response from the source.
    #[error("HTTP error {status} from {url}")]
    Http { status: u16, url: String },
    /// Connection, TLS, timeout or body read failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// Any other source-specific failure.
    #[error("fetch failed: {0}")]
    Other(String),
}


/// Errors raised by blob and record stores.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Postgres(#[from] postgres::Error),
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("invalid table name: {0}")]
    InvalidTableName(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by a text detector.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("failed to run text detector: {0}")]
    Io(#[from] std::io::Error),
    #[error("text detector failed: {0}")]
    Engine(String),
}

/// Failures that end one station's run. Other stations are unaffected.
#[derive(Debug, Error)]
pub enum StationError {
    #[error("image fetch failed: {0}")]
    ImageFetch(#[source] FetchError),
    #[error("image upload failed: {0}")]
    Upload(#[source] StorageError),
    #[error("record write failed: {0}")]
    Persist(#[source] StorageError),
}
