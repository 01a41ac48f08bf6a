/// Nearest-time join between an image label and log rows.
///
/// Buoy logs report every 10 minutes while camera captions carry their own
/// minute, so rows are matched by closeness rather than equality.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use crate::model::{MeteoRecord, LABEL_TIME_FORMAT};

/// A row further than this from the image time is never matched.
pub const MATCH_TOLERANCE_MINUTES: i64 = 30;

/// Parses a caption time such as "11/18/2025 1610" as a UTC instant.
pub fn parse_label_time(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text.trim(), LABEL_TIME_FORMAT)
        .ok()
        .map(|dt| dt.and_utc())
}

/// Returns the record closest to `target` among those at most `tolerance`
/// away (inclusive). On equal distance the earlier-iterated record is kept.
pub fn closest_within<I>(target: DateTime<Utc>, records: I, tolerance: Duration) -> Option<MeteoRecord>
where
    I: IntoIterator<Item = MeteoRecord>,
{
    let mut closest: Option<(Duration, MeteoRecord)> = None;

    for record in records {
        let diff = (record.timestamp - target).abs();
        if diff > tolerance {
            continue;
        }
        let closer = match &closest {
            Some((best, _)) => diff < *best,
            None => true,
        };
        if closer {
            closest = Some((diff, record));
        }
    }

    closest.map(|(_, record)| record)
}

/// Finds the log row matching a caption time, within the standard
/// 30 minute window. An unparseable caption time matches nothing.
pub fn find_matching_record<I>(label_time: &str, records: I) -> Option<MeteoRecord>
where
    I: IntoIterator<Item = MeteoRecord>,
{
    let target = parse_label_time(label_time)?;
    closest_within(target, records, Duration::minutes(MATCH_TOLERANCE_MINUTES))
}
