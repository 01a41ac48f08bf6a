//! Station pipeline orchestrator.
//!
//! One pass per station, strictly in sequence:
//!
//! 1. fetch the camera image (failure ends the station)
//! 2. compare with the last stored image, skipping duplicates
//! 3. read the caption label (best effort)
//! 4. archive the image with the label as metadata (failure ends the station)
//! 5. fetch and archive the 5-day log (best effort)
//! 6. parse the log and 7. match the row nearest the caption time
//! 8. upsert the observation record, only when a row matched
//!
//! A failing station is reported and the next one proceeds; nothing is
//! retried.

use chrono::{DateTime, Utc};

use crate::analysis::label::LabelExtractor;
use crate::analysis::matching::{find_matching_record, parse_label_time};
use crate::config::{ConfigError, PipelineConfig};
use crate::dedup;
use crate::ingest::meteo_log::MeteoLog;
use crate::ingest::{ImageSource, LogSource};
use crate::logging::{self, DataSource};
use crate::model::{iso, CapturedImage, ImageLabel, ObservationRecord, StationError};
use crate::ocr::TextDetector;
use crate::report::RunReport;
use crate::stations::{image_key, log_key, render_url};
use crate::storage::{BlobStore, ObjectMetadata, RecordStore};

/// Why a station produced no record without failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The fetched image is byte-identical to the last archived one.
    Duplicate { fingerprint: String },
    /// The image was archived but no log row fell within the match window.
    NoMeteoMatch { image_ref: String, timestamp: String },
}

/// Result of one station's run.
#[derive(Debug)]
pub enum StationOutcome {
    Stored(ObservationRecord),
    Skipped(SkipReason),
    Failed(StationError),
}

/// External capabilities the pipeline calls.
pub struct Collaborators {
    pub images: Box<dyn ImageSource>,
    pub logs: Box<dyn LogSource>,
    pub ocr: Box<dyn TextDetector>,
    pub blobs: Box<dyn BlobStore>,
    pub records: Box<dyn RecordStore>,
}

pub struct StationPipeline {
    config: PipelineConfig,
    collaborators: Collaborators,
    extractor: LabelExtractor,
}

impl StationPipeline {
    pub fn new(config: PipelineConfig, collaborators: Collaborators) -> Self {
        Self { config, collaborators, extractor: LabelExtractor::new() }
    }

    /// Processes every configured station, reading the clock per station.
    pub fn run(&self) -> Result<RunReport, ConfigError> {
        self.run_with_clock(Utc::now)
    }

    /// Processes every configured station at a fixed instant.
    pub fn run_at(&self, now: DateTime<Utc>) -> Result<RunReport, ConfigError> {
        self.run_with_clock(|| now)
    }

    fn run_with_clock<C>(&self, clock: C) -> Result<RunReport, ConfigError>
    where
        C: Fn() -> DateTime<Utc>,
    {
        self.config.validate()?;

        let mut report = RunReport::new(clock());
        for station_id in &self.config.stations {
            let station_id = station_id.trim();
            if station_id.is_empty() {
                continue;
            }
            let outcome = self.process_station(station_id, clock());
            report.push(station_id, &outcome);
        }
        report.log_summary();
        Ok(report)
    }

    /// Runs the full pipeline for one station. Never panics on collaborator
    /// failures; they come back as `StationOutcome::Failed`.
    pub fn process_station(&self, station_id: &str, now: DateTime<Utc>) -> StationOutcome {
        match self.try_process_station(station_id, now) {
            Ok(outcome) => outcome,
            Err(e) => {
                logging::log_station_failure(station_id, &e);
                StationOutcome::Failed(e)
            }
        }
    }

    fn try_process_station(&self, station_id: &str, now: DateTime<Utc>) -> Result<StationOutcome, StationError> {
        let image = self.fetch_image(station_id, now)?;

        if !self.config.force_process {
            let latest = dedup::latest_image_fingerprint(
                self.collaborators.blobs.as_ref(),
                &self.config.bucket,
                station_id,
                now,
            );
            if dedup::is_duplicate(&image.bytes, latest.as_deref()) {
                logging::info(DataSource::Image, Some(station_id), "Skipping duplicate image");
                return Ok(StationOutcome::Skipped(SkipReason::Duplicate {
                    fingerprint: dedup::fingerprint(&image.bytes),
                }));
            }
        }

        let label = self
            .extractor
            .extract(self.collaborators.ocr.as_ref(), &image.bytes, station_id);
        if label.is_empty() {
            logging::warn(DataSource::Ocr, Some(station_id), "No caption label found in image");
        }

        let image_ref = self.archive_image(&image, &label)?;
        let log_text = self.fetch_and_archive_log(station_id, now);

        let matched = match (label.time.as_deref(), log_text.as_deref()) {
            (Some(time), Some(text)) => find_matching_record(time, &MeteoLog::new(text)),
            _ => None,
        };

        let timestamp = record_timestamp(&label, image.fetched_at);
        let Some(meteo) = matched else {
            logging::info(
                DataSource::Table,
                Some(station_id),
                &format!("No meteo data found at {}, skipping record write", timestamp),
            );
            return Ok(StationOutcome::Skipped(SkipReason::NoMeteoMatch { image_ref, timestamp }));
        };

        let record = ObservationRecord {
            station_id: station_id.to_string(),
            timestamp,
            image_ref,
            created_at: iso(now),
            meteo: Some(meteo.fields),
            meteo_timestamp: Some(iso(meteo.timestamp)),
            rekognition_data: Some(label),
        };
        self.collaborators
            .records
            .put_record(&record)
            .map_err(StationError::Persist)?;
        logging::info(
            DataSource::Table,
            Some(station_id),
            &format!("Saved record at {} ({})", record.timestamp, record.image_ref),
        );

        Ok(StationOutcome::Stored(record))
    }

    fn fetch_image(&self, station_id: &str, now: DateTime<Utc>) -> Result<CapturedImage, StationError> {
        let source_url = render_url(&self.config.image_url, station_id);
        let bytes = self
            .collaborators
            .images
            .fetch_bytes(&source_url)
            .map_err(StationError::ImageFetch)?;
        logging::debug(
            DataSource::Image,
            Some(station_id),
            &format!("Fetched {} bytes from {}", bytes.len(), source_url),
        );
        Ok(CapturedImage { station_id: station_id.to_string(), source_url, bytes, fetched_at: now })
    }

    /// Stores the image under its date/time key with the caption attached.
    fn archive_image(&self, image: &CapturedImage, label: &ImageLabel) -> Result<String, StationError> {
        let key = image_key(&image.station_id, image.fetched_at);

        let mut metadata = ObjectMetadata::new();
        metadata.insert("station_id".to_string(), image.station_id.clone());
        metadata.insert("download_timestamp".to_string(), iso(image.fetched_at));
        metadata.insert("source_url".to_string(), image.source_url.clone());
        if let Some(station) = &label.station {
            metadata.insert("extracted_id".to_string(), station.clone());
        }
        if let Some(time) = &label.time {
            metadata.insert("extracted_time".to_string(), time.clone());
        }

        self.collaborators
            .blobs
            .put(&self.config.bucket, &key, &image.bytes, "image/jpeg", &metadata)
            .map_err(StationError::Upload)?;
        Ok(key)
    }

    /// Fetches the station log and archives a raw copy. Any failure yields
    /// `None` and the station carries on without meteo data.
    fn fetch_and_archive_log(&self, station_id: &str, now: DateTime<Utc>) -> Option<String> {
        let url = render_url(&self.config.log_url, station_id);
        let text = match self.collaborators.logs.fetch_text(&url) {
            Ok(text) => text,
            Err(e) => {
                logging::warn(
                    DataSource::Log,
                    Some(station_id),
                    &format!("Error downloading meteo log: {}", e),
                );
                return None;
            }
        };

        let key = log_key(station_id, now);
        if let Err(e) = self.collaborators.blobs.put(
            &self.config.bucket,
            &key,
            text.as_bytes(),
            "text/plain",
            &ObjectMetadata::new(),
        ) {
            logging::warn(
                DataSource::Store,
                Some(station_id),
                &format!("Error archiving meteo log: {}", e),
            );
            return None;
        }

        Some(text)
    }
}

/// Record sort key: the caption time in ISO form, or the fetch time when
/// the caption is missing or unparseable.
pub fn record_timestamp(label: &ImageLabel, fetched_at: DateTime<Utc>) -> String {
    label
        .time
        .as_deref()
        .and_then(parse_label_time)
        .map(iso)
        .unwrap_or_else(|| iso(fetched_at))
}
