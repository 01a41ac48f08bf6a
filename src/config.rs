//! Service configuration.
//!
//! Settings come from a TOML file (default `buoycam.toml`) and are then
//! overridden by environment variables, with `.env` loaded first:
//!
//! ```toml
//! [pipeline]
//! bucket = "noaa-buoycams-data"
//! table = "noaa_buoycams_metadata"
//! stations = ["41009", "42036", "42003"]
//! force_process = false
//!
//! [sources]
//! timeout_secs = 30
//!
//! [storage]
//! blob_root = "./data"
//! database_url = "postgres://localhost/buoycams"
//!
//! [logging]
//! level = "info"
//! json = false
//! ```
//!
//! | Variable                | Overrides                  |
//! |-------------------------|----------------------------|
//! | `BUOYCAM_BUCKET`        | `pipeline.bucket`          |
//! | `BUOYCAM_TABLE`         | `pipeline.table`           |
//! | `BUOYCAM_STATIONS`      | `pipeline.stations` (CSV)  |
//! | `BUOYCAM_FORCE_PROCESS` | `pipeline.force_process`   |
//! | `BUOYCAM_BLOB_ROOT`     | `storage.blob_root`        |
//! | `DATABASE_URL`          | `storage.database_url`     |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::ingest::ndbc::DEFAULT_TIMEOUT_SECS;
use crate::stations::{normalize_station_ids, parse_station_list, DEFAULT_IMAGE_URL, DEFAULT_LOG_URL};

/// Config file read when no path is given, if present.
pub const DEFAULT_CONFIG_FILE: &str = "buoycam.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{0} is not set")]
    Missing(&'static str),
}

// ---------------------------------------------------------------------------
// File layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub pipeline: PipelineSettings,
    pub sources: SourceSettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub bucket: Option<String>,
    pub table: Option<String>,
    pub stations: Vec<String>,
    pub force_process: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Camera URL template; `{station}` is replaced by the station id.
    pub image_url: String,
    /// 5-day log URL template; `{station}` is replaced by the station id.
    pub log_url: String,
    pub timeout_secs: u64,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            image_url: DEFAULT_IMAGE_URL.to_string(),
            log_url: DEFAULT_LOG_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl SourceSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory holding one subdirectory per bucket.
    pub blob_root: PathBuf,
    pub database_url: Option<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self { blob_root: PathBuf::from("./data"), database_url: None }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
    /// Optional file that receives a copy of every event.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false, file: None }
    }
}

impl ServiceConfig {
    /// Parses a TOML document.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Reads `path`, or `buoycam.toml` when it exists, or starts from
    /// defaults; then applies `.env` and process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::read(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::read(Path::new(DEFAULT_CONFIG_FILE))?,
            None => Self::default(),
        };
        dotenv::dotenv().ok();
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    /// Applies overrides from `lookup`, which maps a variable name to its
    /// value. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(bucket) = get("BUOYCAM_BUCKET") {
            self.pipeline.bucket = Some(bucket);
        }
        if let Some(table) = get("BUOYCAM_TABLE") {
            self.pipeline.table = Some(table);
        }
        if let Some(stations) = get("BUOYCAM_STATIONS") {
            self.pipeline.stations = parse_station_list(&stations);
        }
        if let Some(force) = get("BUOYCAM_FORCE_PROCESS") {
            self.pipeline.force_process = force.trim().eq_ignore_ascii_case("true");
        }
        if let Some(root) = get("BUOYCAM_BLOB_ROOT") {
            self.storage.blob_root = PathBuf::from(root);
        }
        if let Some(url) = get("DATABASE_URL") {
            self.storage.database_url = Some(url);
        }
    }

    /// The orchestrator's view of the configuration.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            bucket: self.pipeline.bucket.clone().unwrap_or_default(),
            table: self.pipeline.table.clone().unwrap_or_default(),
            stations: normalize_station_ids(&self.pipeline.stations),
            force_process: self.pipeline.force_process,
            image_url: self.sources.image_url.clone(),
            log_url: self.sources.log_url.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator configuration
// ---------------------------------------------------------------------------

/// Everything the station pipeline reads from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub bucket: String,
    pub table: String,
    pub stations: Vec<String>,
    /// Process images even when they match the last stored capture.
    pub force_process: bool,
    pub image_url: String,
    pub log_url: String,
}

impl PipelineConfig {
    pub fn new(bucket: impl Into<String>, table: impl Into<String>, stations: &[&str]) -> Self {
        Self {
            bucket: bucket.into(),
            table: table.into(),
            stations: normalize_station_ids(stations),
            force_process: false,
            image_url: DEFAULT_IMAGE_URL.to_string(),
            log_url: DEFAULT_LOG_URL.to_string(),
        }
    }

    pub fn with_force_process(mut self, force: bool) -> Self {
        self.force_process = force;
        self
    }

    /// Checks the required settings, in the order an operator would fix them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.trim().is_empty() {
            return Err(ConfigError::Missing("bucket (BUOYCAM_BUCKET)"));
        }
        if self.table.trim().is_empty() {
            return Err(ConfigError::Missing("table (BUOYCAM_TABLE)"));
        }
        if normalize_station_ids(&self.stations).is_empty() {
            return Err(ConfigError::Missing("stations (BUOYCAM_STATIONS)"));
        }
        Ok(())
    }
}
