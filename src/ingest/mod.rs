/// Data acquisition from station sources.
///
/// Submodules:
/// - `ndbc`: blocking HTTP client for buoycam images and 5-day logs.
/// - `meteo_log`: parser for the 5-day standard meteorological log text.
///
/// The pipeline only sees the `ImageSource` and `LogSource` traits, so
/// tests and offline runs can substitute their own sources.

pub mod meteo_log;
pub mod ndbc;

use crate::model::FetchError;

/// Fetches a station's current camera image.
pub trait ImageSource {
    /// Returns the body of a 2xx response; anything else is an error.
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Fetches a station's raw meteorological log.
pub trait LogSource {
    /// Returns the body of a 2xx response; anything else is an error.
    fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}
