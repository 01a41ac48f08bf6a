/// Parser for NDBC 5-day standard meteorological logs.
///
/// The file starts with two header lines followed by whitespace separated
/// rows:
///
/// ```text
/// #YY  MM DD hh mm WDIR WSPD GST  WVHT   DPD   APD MWD   PRES  ATMP  WTMP  DEWP  VIS PTDY  TIDE
/// #yr  mo dy hr mn degT m/s  m/s     m   sec   sec degT   hPa  degC  degC  degC  nmi  hPa    ft
/// 2025 11 18 16 00 170  5.0  6.0    MM    MM    MM  MM 1016.4  24.1  26.3  19.8   MM -0.9    MM
/// ```
///
/// Rows that do not parse are skipped rather than reported; a single garbled
/// line should not cost the whole log.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

use crate::model::{MeteoFields, MeteoRecord};

/// Header lines at the top of every 5-day log.
pub const HEADER_LINES: usize = 2;

/// Five timestamp tokens plus fourteen data tokens.
pub const MIN_TOKENS: usize = 19;

const TIMESTAMP_FORMAT: &str = "%Y %m %d %H %M";

/// A borrowed log text that can be iterated for records any number of times.
#[derive(Debug, Clone, Copy)]
pub struct MeteoLog<'a> {
    text: &'a str,
}

impl<'a> MeteoLog<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text }
    }

    /// Lazily yields the parseable data rows, in file order.
    pub fn records(&self) -> MeteoRecords<'a> {
        MeteoRecords {
            lines: self.text.trim().lines().skip(HEADER_LINES),
        }
    }
}

impl<'a> IntoIterator for &MeteoLog<'a> {
    type Item = MeteoRecord;
    type IntoIter = MeteoRecords<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.records()
    }
}

/// Iterator over the data rows of a `MeteoLog`.
pub struct MeteoRecords<'a> {
    lines: std::iter::Skip<std::str::Lines<'a>>,
}

impl Iterator for MeteoRecords<'_> {
    type Item = MeteoRecord;

    fn next(&mut self) -> Option<Self::Item> {
        for line in self.lines.by_ref() {
            if let Some(record) = parse_meteo_line(line) {
                return Some(record);
            }
        }
        None
    }
}

/// Parses one data row. Returns `None` for short rows and bad timestamps.
pub fn parse_meteo_line(line: &str) -> Option<MeteoRecord> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < MIN_TOKENS {
        debug!(tokens = tokens.len(), line, "skipping short meteo row");
        return None;
    }

    let timestamp = match parse_row_timestamp(&tokens[..5]) {
        Some(ts) => ts,
        None => {
            debug!(line, "skipping meteo row with unparseable timestamp");
            return None;
        }
    };

    let fields = MeteoFields::from_tokens(&tokens[5..])?;
    Some(MeteoRecord { timestamp, fields })
}

fn parse_row_timestamp(parts: &[&str]) -> Option<DateTime<Utc>> {
    let joined = parts.join(" ");
    NaiveDateTime::parse_from_str(&joined, TIMESTAMP_FORMAT)
        .ok()
        .map(|dt| dt.and_utc())
}
