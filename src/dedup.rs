/// Duplicate capture detection.
///
/// Buoycams refresh far less often than the ingest schedule runs, so most
/// fetches return the image already archived. The most recent stored image
/// is found through its date partition: today's prefix first, then
/// yesterday's (UTC), taking the last key since keys sort by capture time.
///
/// # Clock injection
/// `now` is a parameter rather than `Utc::now()` so the day boundary is
/// deterministic in tests.

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::stations::image_prefix;
use crate::storage::{content_hash, BlobStore};

/// MD5 hex of an image body, comparable with blob store etags.
pub fn fingerprint(bytes: &[u8]) -> String {
    content_hash(bytes)
}

/// Returns the etag of the newest image stored for the station today or
/// yesterday, or `None` when there is none.
///
/// Listing failures are logged and treated as "no prior image" so a storage
/// hiccup never blocks ingest.
pub fn latest_image_fingerprint(
    store: &dyn BlobStore,
    bucket: &str,
    station_id: &str,
    now: DateTime<Utc>,
) -> Option<String> {
    let today = now.date_naive();
    let yesterday = (now - Duration::days(1)).date_naive();

    for date in [today, yesterday] {
        let prefix = image_prefix(station_id, date);
        let objects = match store.list_by_prefix(bucket, &prefix) {
            Ok(objects) => objects,
            Err(e) => {
                warn!(station = station_id, prefix = %prefix, error = %e, "could not retrieve latest image hash");
                return None;
            }
        };
        if let Some(latest) = objects.into_iter().max_by(|a, b| a.key.cmp(&b.key)) {
            return Some(latest.etag.trim_matches('"').to_string());
        }
    }

    None
}

/// An image is a duplicate only when a prior fingerprint exists and matches.
pub fn is_duplicate(bytes: &[u8], latest: Option<&str>) -> bool {
    latest.is_some_and(|hash| hash == fingerprint(bytes))
}
