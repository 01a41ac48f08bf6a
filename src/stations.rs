/// Station ids, source URLs and the blob key layout.
///
/// Station ids are opaque strings supplied by configuration (NDBC buoy ids
/// such as "41009"). This module is the single place that knows how an id
/// turns into a camera URL, a log URL, or a storage key.
///
/// Storage keys embed the UTC date as a directory and the full fetch time as
/// the file name (`images/41009/2025/11/18/20251118_161502.jpg`), so within
/// one day's prefix lexicographic key order is chronological order.

use chrono::{DateTime, NaiveDate, Utc};

// ---------------------------------------------------------------------------
// Source URLs
// ---------------------------------------------------------------------------

/// Placeholder substituted with the station id in URL templates.
pub const STATION_PLACEHOLDER: &str = "{station}";

/// NDBC buoycam still image for a station.
pub const DEFAULT_IMAGE_URL: &str = "https://www.ndbc.noaa.gov/buoycam.php?station={station}";

/// NDBC 5-day realtime standard meteorological log for a station.
pub const DEFAULT_LOG_URL: &str = "https://www.ndbc.noaa.gov/data/5day2/{station}_5day.txt";

/// Substitutes the station id into a URL template.
pub fn render_url(template: &str, station_id: &str) -> String {
    template.replace(STATION_PLACEHOLDER, station_id)
}

// ---------------------------------------------------------------------------
// Station lists
// ---------------------------------------------------------------------------

/// Trims each id and drops empty entries, preserving order.
pub fn normalize_station_ids<S: AsRef<str>>(ids: &[S]) -> Vec<String> {
    ids.iter()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Parses a comma separated station list such as `"41009, 42036,42003"`.
pub fn parse_station_list(raw: &str) -> Vec<String> {
    let parts: Vec<&str> = raw.split(',').collect();
    normalize_station_ids(&parts)
}

// ---------------------------------------------------------------------------
// Blob key layout
// ---------------------------------------------------------------------------

const IMAGE_ROOT: &str = "images";
const LOG_ROOT: &str = "metadata";

fn date_prefix(root: &str, station_id: &str, date: NaiveDate) -> String {
    format!("{}/{}/{}/", root, station_id, date.format("%Y/%m/%d"))
}

fn timed_key(root: &str, station_id: &str, at: DateTime<Utc>, extension: &str) -> String {
    format!(
        "{}{}.{}",
        date_prefix(root, station_id, at.date_naive()),
        at.format("%Y%m%d_%H%M%S"),
        extension
    )
}

/// Prefix holding every image stored for a station on a UTC date.
pub fn image_prefix(station_id: &str, date: NaiveDate) -> String {
    date_prefix(IMAGE_ROOT, station_id, date)
}

/// Key for an image fetched at `at`.
pub fn image_key(station_id: &str, at: DateTime<Utc>) -> String {
    timed_key(IMAGE_ROOT, station_id, at, "jpg")
}

/// Key for the raw log text archived at `at`.
pub fn log_key(station_id: &str, at: DateTime<Utc>) -> String {
    timed_key(LOG_ROOT, station_id, at, "txt")
}
