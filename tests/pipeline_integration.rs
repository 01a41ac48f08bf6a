/// Offline integration tests for the station pipeline
///
/// Tests verify:
/// 1. A captioned image with a matching log row produces one record
/// 2. Duplicate captures are skipped without writing anything
/// 3. Failures stay contained to the station that raised them
/// 4. Best-effort steps (text detection, log fetch) degrade gracefully
///
/// Every collaborator is an in-memory double, so no network, tesseract or
/// database is needed.
///
/// Run with: cargo test --test pipeline_integration

use std::io;
use std::sync::{Arc, Mutex};

use buoycam_service::config::{ConfigError, PipelineConfig};
use buoycam_service::ingest::{ImageSource, LogSource};
use buoycam_service::model::{FetchError, ImageLabel, OcrError, StationError, TextDetection};
use buoycam_service::ocr::TextDetector;
use buoycam_service::pipeline::{Collaborators, SkipReason, StationOutcome, StationPipeline};
use buoycam_service::report::RunStatus;
use buoycam_service::storage::memory::{MemoryBlobStore, MemoryRecordStore};
use chrono::{DateTime, TimeZone, Utc};
use tracing_subscriber::fmt::MakeWriter;

// ---------------------------------------------------------------------------
// Test Doubles
// ---------------------------------------------------------------------------

const BUCKET: &str = "noaa-buoycams-data";
const TABLE: &str = "noaa_buoycams_metadata";
const JPEG: &[u8] = b"\xff\xd8\xff\xe0 buoycam frame \xff\xd9";

const FIVE_DAY_LOG: &str = "\
#YY  MM DD hh mm WDIR WSPD GST  WVHT   DPD   APD MWD   PRES  ATMP  WTMP  DEWP  VIS PTDY  TIDE
#yr  mo dy hr mn degT m/s  m/s     m   sec   sec degT   hPa  degC  degC  degC  nmi  hPa    ft
2025 11 18 16 10 170  5.0  6.0    MM    MM    MM  MM 1016.4  24.1  26.3  19.8   MM -0.9    MM
2025 11 18 16 00 160  4.0  5.0   0.8     7   4.6 110 1016.5  24.0  26.3  19.6   MM   MM    MM
2025 11 18 15 50 150  4.0  6.0    MM    MM    MM  MM 1016.6  23.9  26.3  19.5   MM   MM    MM
";

/// Serves the same image for every station except the unreachable ones.
struct StaticImages {
    body: Vec<u8>,
    unreachable: Vec<&'static str>,
}

impl ImageSource for StaticImages {
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if self.unreachable.iter().any(|id| url.contains(id)) {
            return Err(FetchError::Http { status: 404, url: url.to_string() });
        }
        Ok(self.body.clone())
    }
}

struct StaticLog(Option<&'static str>);

impl LogSource for StaticLog {
    fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        match self.0 {
            Some(text) => Ok(text.to_string()),
            None => Err(FetchError::Other(format!("connection reset fetching {}", url))),
        }
    }
}

/// Returns fixed LINE detections, or fails when `lines` is `None`.
struct FixedDetector(Option<Vec<&'static str>>);

impl TextDetector for FixedDetector {
    fn detect_text(&self, _image: &[u8]) -> Result<Vec<TextDetection>, OcrError> {
        match &self.0 {
            Some(lines) => Ok(lines.iter().map(|l| TextDetection::line(*l, 95.0)).collect()),
            None => Err(OcrError::Engine("tesseract exited with status 1".to_string())),
        }
    }
}

struct Harness {
    blobs: Arc<MemoryBlobStore>,
    records: Arc<MemoryRecordStore>,
}

impl Harness {
    fn new() -> Self {
        Self::with_stores(MemoryBlobStore::new(), MemoryRecordStore::new())
    }

    fn with_stores(blobs: MemoryBlobStore, records: MemoryRecordStore) -> Self {
        Self { blobs: Arc::new(blobs), records: Arc::new(records) }
    }

    fn pipeline(
        &self,
        config: PipelineConfig,
        images: StaticImages,
        log: StaticLog,
        detector: FixedDetector,
    ) -> StationPipeline {
        StationPipeline::new(
            config,
            Collaborators {
                images: Box::new(images),
                logs: Box::new(log),
                ocr: Box::new(detector),
                blobs: Box::new(self.blobs.clone()),
                records: Box::new(self.records.clone()),
            },
        )
    }

    /// Pipeline for one station with a readable caption and a full log.
    fn standard(&self, caption: &'static str) -> StationPipeline {
        self.pipeline(
            PipelineConfig::new(BUCKET, TABLE, &["41009"]),
            images(),
            StaticLog(Some(FIVE_DAY_LOG)),
            FixedDetector(Some(vec!["NOAA", caption])),
        )
    }
}

/// Collects formatted log output so tests can check event levels.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        self.0.lock().map(|buf| String::from_utf8_lossy(&buf).into_owned()).unwrap_or_default()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut inner) = self.0.lock() {
            inner.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn images() -> StaticImages {
    StaticImages { body: JPEG.to_vec(), unreachable: Vec::new() }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 18, 16, 15, 2).unwrap()
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[test]
fn test_captioned_image_with_log_row_is_stored() {
    let harness = Harness::new();
    let pipeline = harness.standard("Station ID: 41009 11/18/2025 1610 UTC");

    let outcome = pipeline.process_station("41009", now());
    let record = match outcome {
        StationOutcome::Stored(record) => record,
        other => panic!("expected a stored record, got {:?}", other),
    };

    assert_eq!(record.station_id, "41009");
    assert_eq!(record.timestamp, "2025-11-18T16:10:00");
    assert_eq!(record.image_ref, "images/41009/2025/11/18/20251118_161502.jpg");
    assert_eq!(record.created_at, "2025-11-18T16:15:02");
    assert_eq!(record.meteo_timestamp.as_deref(), Some("2025-11-18T16:10:00"));
    assert_eq!(record.rekognition_data, Some(ImageLabel::new("41009", "11/18/2025 1610")));

    let meteo = record.meteo.as_ref().expect("matched row should be attached");
    assert_eq!(meteo.wind_dir.as_deref(), Some("170"));
    assert_eq!(meteo.air_temp.as_deref(), Some("24.1"));
    assert_eq!(meteo.ptdy.as_deref(), Some("-0.9"));
    assert_eq!(meteo.wave_height, None);
    assert_eq!(meteo.tide, None);

    assert_eq!(harness.records.get("41009", "2025-11-18T16:10:00"), Some(record));
}

#[test]
fn test_image_and_log_are_archived_with_caption_metadata() {
    let harness = Harness::new();
    harness
        .standard("Station ID: 41009 11/18/2025 1610 UTC")
        .process_station("41009", now());

    let image = harness
        .blobs
        .get(BUCKET, "images/41009/2025/11/18/20251118_161502.jpg")
        .expect("image should be archived");
    assert_eq!(image.body, JPEG);
    assert_eq!(image.content_type, "image/jpeg");
    assert_eq!(image.metadata["station_id"], "41009");
    assert_eq!(image.metadata["download_timestamp"], "2025-11-18T16:15:02");
    assert_eq!(image.metadata["source_url"], "https://www.ndbc.noaa.gov/buoycam.php?station=41009");
    assert_eq!(image.metadata["extracted_id"], "41009");
    assert_eq!(image.metadata["extracted_time"], "11/18/2025 1610");

    let log = harness
        .blobs
        .get(BUCKET, "metadata/41009/2025/11/18/20251118_161502.txt")
        .expect("log should be archived");
    assert_eq!(log.body, FIVE_DAY_LOG.as_bytes());
    assert_eq!(log.content_type, "text/plain");
}

#[test]
fn test_off_cycle_row_keeps_caption_time_as_key() {
    const OFF_CYCLE_LOG: &str = "\
#YY  MM DD hh mm WDIR WSPD GST  WVHT   DPD   APD MWD   PRES  ATMP  WTMP  DEWP  VIS PTDY  TIDE
#yr  mo dy hr mn degT m/s  m/s     m   sec   sec degT   hPa  degC  degC  degC  nmi  hPa    ft
2025 11 18 16 05 180  7.0  9.0   1.2     8   5.1 120 1015.9  24.4  26.2  20.1   MM   MM    MM
";
    let harness = Harness::new();
    let pipeline = harness.pipeline(
        PipelineConfig::new(BUCKET, TABLE, &["41009"]),
        images(),
        StaticLog(Some(OFF_CYCLE_LOG)),
        FixedDetector(Some(vec!["Station ID: 41009 11/18/2025 1610 UTC"])),
    );

    match pipeline.process_station("41009", now()) {
        StationOutcome::Stored(record) => {
            assert_eq!(record.timestamp, "2025-11-18T16:10:00");
            assert_eq!(record.meteo_timestamp.as_deref(), Some("2025-11-18T16:05:00"));
            let meteo = record.meteo.unwrap();
            assert_eq!(meteo.wave_height.as_deref(), Some("1.2"));
            assert_eq!(meteo.visibility, None);
            assert_eq!(meteo.tide, None);
        }
        other => panic!("expected a stored record, got {:?}", other),
    }
}

#[test]
fn test_nearest_row_wins() {
    let harness = Harness::new();
    let outcome = harness
        .standard("Station ID: 41009 11/18/2025 1604 UTC")
        .process_station("41009", now());

    match outcome {
        StationOutcome::Stored(record) => {
            assert_eq!(record.timestamp, "2025-11-18T16:04:00");
            assert_eq!(record.meteo_timestamp.as_deref(), Some("2025-11-18T16:00:00"));
            assert_eq!(record.meteo.unwrap().wind_dir.as_deref(), Some("160"));
        }
        other => panic!("expected a stored record, got {:?}", other),
    }
}

#[test]
fn test_row_exactly_thirty_minutes_away_matches() {
    let harness = Harness::new();
    let outcome = harness
        .standard("Station ID: 41009 11/18/2025 1640 UTC")
        .process_station("41009", now());
    assert!(matches!(outcome, StationOutcome::Stored(_)));
}

// ---------------------------------------------------------------------------
// Skips
// ---------------------------------------------------------------------------

#[test]
fn test_no_row_within_window_archives_image_but_writes_no_record() {
    let harness = Harness::new();
    let outcome = harness
        .standard("Station ID: 41009 11/18/2025 1641 UTC")
        .process_station("41009", now());

    match outcome {
        StationOutcome::Skipped(SkipReason::NoMeteoMatch { image_ref, timestamp }) => {
            assert_eq!(image_ref, "images/41009/2025/11/18/20251118_161502.jpg");
            assert_eq!(timestamp, "2025-11-18T16:41:00");
        }
        other => panic!("expected a no-match skip, got {:?}", other),
    }
    assert_eq!(harness.records.write_count(), 0);
    assert_eq!(harness.blobs.put_count(), 2);
}

#[test]
fn test_duplicate_image_is_skipped_without_writes() {
    let harness = Harness::new();
    harness.blobs.seed(BUCKET, "images/41009/2025/11/18/20251118_150002.jpg", JPEG);

    let outcome = harness
        .standard("Station ID: 41009 11/18/2025 1610 UTC")
        .process_station("41009", now());

    assert!(matches!(outcome, StationOutcome::Skipped(SkipReason::Duplicate { .. })));
    assert_eq!(harness.blobs.put_count(), 0);
    assert_eq!(harness.records.write_count(), 0);
}

#[test]
fn test_changed_image_is_not_a_duplicate() {
    let harness = Harness::new();
    harness.blobs.seed(BUCKET, "images/41009/2025/11/18/20251118_150002.jpg", b"previous frame");

    let outcome = harness
        .standard("Station ID: 41009 11/18/2025 1610 UTC")
        .process_station("41009", now());
    assert!(matches!(outcome, StationOutcome::Stored(_)));
}

#[test]
fn test_force_process_bypasses_duplicate_check() {
    let harness = Harness::new();
    harness.blobs.seed(BUCKET, "images/41009/2025/11/18/20251118_150002.jpg", JPEG);

    let pipeline = harness.pipeline(
        PipelineConfig::new(BUCKET, TABLE, &["41009"]).with_force_process(true),
        images(),
        StaticLog(Some(FIVE_DAY_LOG)),
        FixedDetector(Some(vec!["Station ID: 41009 11/18/2025 1610 UTC"])),
    );

    assert!(matches!(pipeline.process_station("41009", now()), StationOutcome::Stored(_)));
    assert_eq!(harness.records.write_count(), 1);
}

// ---------------------------------------------------------------------------
// Degraded collaborators
// ---------------------------------------------------------------------------

#[test]
fn test_text_detection_failure_falls_back_to_fetch_time() {
    let harness = Harness::new();
    let pipeline = harness.pipeline(
        PipelineConfig::new(BUCKET, TABLE, &["41009"]),
        images(),
        StaticLog(Some(FIVE_DAY_LOG)),
        FixedDetector(None),
    );

    match pipeline.process_station("41009", now()) {
        StationOutcome::Skipped(SkipReason::NoMeteoMatch { timestamp, .. }) => {
            assert_eq!(timestamp, "2025-11-18T16:15:02");
        }
        other => panic!("expected a no-match skip, got {:?}", other),
    }

    let image = harness
        .blobs
        .get(BUCKET, "images/41009/2025/11/18/20251118_161502.jpg")
        .expect("image is archived even without a caption");
    assert!(!image.metadata.contains_key("extracted_id"));
    assert!(!image.metadata.contains_key("extracted_time"));
}

#[test]
fn test_log_fetch_failure_still_archives_image() {
    let harness = Harness::new();
    let pipeline = harness.pipeline(
        PipelineConfig::new(BUCKET, TABLE, &["41009"]),
        images(),
        StaticLog(None),
        FixedDetector(Some(vec!["Station ID: 41009 11/18/2025 1610 UTC"])),
    );

    let outcome = pipeline.process_station("41009", now());
    assert!(matches!(outcome, StationOutcome::Skipped(SkipReason::NoMeteoMatch { .. })));
    assert_eq!(harness.blobs.keys(BUCKET), vec!["images/41009/2025/11/18/20251118_161502.jpg"]);
    assert_eq!(harness.records.write_count(), 0);
}

#[test]
fn test_image_fetch_failure_is_contained_to_its_station() {
    let harness = Harness::new();
    let pipeline = harness.pipeline(
        PipelineConfig::new(BUCKET, TABLE, &["42036", "41009"]),
        StaticImages { body: JPEG.to_vec(), unreachable: vec!["42036"] },
        StaticLog(Some(FIVE_DAY_LOG)),
        FixedDetector(Some(vec!["Station ID: 41009 11/18/2025 1610 UTC"])),
    );

    let report = pipeline.run_at(now()).expect("config is valid");
    assert_eq!(report.summary.total, 2);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.stored, 1);
    assert_eq!(report.results[0].station_id, "42036");
    assert_eq!(report.results[0].status, RunStatus::Error);
    assert_eq!(report.results[1].status, RunStatus::Stored);
    assert!(harness.records.get("41009", "2025-11-18T16:10:00").is_some());
}

#[test]
fn test_image_fetch_failure_outcome_carries_cause() {
    let harness = Harness::new();
    let pipeline = harness.pipeline(
        PipelineConfig::new(BUCKET, TABLE, &["41009"]),
        StaticImages { body: JPEG.to_vec(), unreachable: vec!["41009"] },
        StaticLog(Some(FIVE_DAY_LOG)),
        FixedDetector(Some(Vec::new())),
    );

    match pipeline.process_station("41009", now()) {
        StationOutcome::Failed(StationError::ImageFetch(FetchError::Http { status, .. })) => {
            assert_eq!(status, 404);
        }
        other => panic!("expected an image fetch failure, got {:?}", other),
    }
    assert_eq!(harness.blobs.put_count(), 0);
}

// ---------------------------------------------------------------------------
// Run level
// ---------------------------------------------------------------------------

#[test]
fn test_missing_configuration_aborts_before_any_station() {
    let harness = Harness::new();
    let pipeline = harness.pipeline(
        PipelineConfig::new("", TABLE, &["41009"]),
        images(),
        StaticLog(Some(FIVE_DAY_LOG)),
        FixedDetector(Some(Vec::new())),
    );

    assert!(matches!(pipeline.run_at(now()), Err(ConfigError::Missing(_))));
    assert_eq!(harness.blobs.put_count(), 0);
}

#[test]
fn test_rerun_for_same_caption_overwrites_record() {
    let harness = Harness::new();
    let config = PipelineConfig::new(BUCKET, TABLE, &["41009"]).with_force_process(true);
    let pipeline = harness.pipeline(
        config,
        images(),
        StaticLog(Some(FIVE_DAY_LOG)),
        FixedDetector(Some(vec!["Station ID: 41009 11/18/2025 1610 UTC"])),
    );

    pipeline.run_at(now()).unwrap();
    let later = Utc.with_ymd_and_hms(2025, 11, 18, 16, 25, 0).unwrap();
    pipeline.run_at(later).unwrap();

    assert_eq!(harness.records.write_count(), 2);
    let records = harness.records.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].image_ref, "images/41009/2025/11/18/20251118_162500.jpg");
    assert_eq!(records[0].created_at, "2025-11-18T16:25:00");
}

// ---------------------------------------------------------------------------
// Storage failures
// ---------------------------------------------------------------------------

#[test]
fn test_image_upload_failure_ends_station_without_record() {
    let harness = Harness::with_stores(MemoryBlobStore::with_failing_puts("images/"), MemoryRecordStore::new());
    let outcome = harness
        .standard("Station ID: 41009 11/18/2025 1610 UTC")
        .process_station("41009", now());

    assert!(
        matches!(outcome, StationOutcome::Failed(StationError::Upload(_))),
        "expected an upload failure, got {:?}",
        outcome
    );
    assert_eq!(harness.blobs.put_count(), 0);
    assert_eq!(harness.records.write_count(), 0);
}

#[test]
fn test_record_store_failure_is_contained_to_each_station() {
    let harness = Harness::with_stores(MemoryBlobStore::new(), MemoryRecordStore::with_failing_writes());
    let pipeline = harness.pipeline(
        PipelineConfig::new(BUCKET, TABLE, &["41009", "42036"]).with_force_process(true),
        images(),
        StaticLog(Some(FIVE_DAY_LOG)),
        FixedDetector(Some(vec!["Station ID: 41009 11/18/2025 1610 UTC"])),
    );

    let report = pipeline.run_at(now()).expect("config is valid");
    assert_eq!(report.summary.total, 2);
    assert_eq!(report.summary.failed, 2);
    assert!(report.results.iter().all(|r| r.status == RunStatus::Error));
    assert!(report.results[0].message.contains("record write failed"));
    // the second station still ran: image and log archived for both
    assert_eq!(harness.blobs.put_count(), 4);
    assert!(harness.records.records().is_empty());

    match pipeline.process_station("41009", now()) {
        StationOutcome::Failed(StationError::Persist(_)) => {}
        other => panic!("expected a persist failure, got {:?}", other),
    }
}

#[test]
fn test_log_archive_failure_degrades_to_no_match() {
    let harness = Harness::with_stores(MemoryBlobStore::with_failing_puts("metadata/"), MemoryRecordStore::new());
    let outcome = harness
        .standard("Station ID: 41009 11/18/2025 1610 UTC")
        .process_station("41009", now());

    assert!(
        matches!(outcome, StationOutcome::Skipped(SkipReason::NoMeteoMatch { .. })),
        "expected a no-match skip, got {:?}",
        outcome
    );
    assert_eq!(harness.blobs.keys(BUCKET), vec!["images/41009/2025/11/18/20251118_161502.jpg"]);
    assert_eq!(harness.records.write_count(), 0);
}

#[test]
fn test_log_failures_are_warnings_not_errors() {
    let harness = Harness::new();
    let pipeline = harness.pipeline(
        PipelineConfig::new(BUCKET, TABLE, &["41009"]),
        images(),
        StaticLog(None),
        FixedDetector(Some(vec!["Station ID: 41009 11/18/2025 1610 UTC"])),
    );

    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    tracing::subscriber::with_default(subscriber, || pipeline.process_station("41009", now()));

    let text = logs.text();
    let line = text
        .lines()
        .find(|l| l.contains("Error downloading meteo log"))
        .expect("log fetch failure should be logged");
    assert!(line.contains("WARN"), "unexpected level in '{}'", line);
    assert!(!text.contains("ERROR"), "no event should be logged at error:\n{}", text);
}
