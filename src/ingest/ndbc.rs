/// NDBC (National Data Buoy Center) HTTP client
///
/// Retrieves buoycam still images and 5-day realtime standard meteorological
/// logs. Both endpoints are plain GETs; the station id is part of the URL.
///
/// Image: https://www.ndbc.noaa.gov/buoycam.php?station=41009
/// Log:   https://www.ndbc.noaa.gov/data/5day2/41009_5day.txt

use std::time::Duration;

use super::{ImageSource, LogSource};
use crate::model::FetchError;

/// Default per-request timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Blocking client shared by the image and log fetches of a run.
#[derive(Debug, Clone)]
pub struct NdbcClient {
    client: reqwest::blocking::Client,
}

impl NdbcClient {
    /// Builds a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("buoycam_service/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, FetchError> {
        let response = self.client.get(url).send()?;

        if !response.status().is_success() {
            return Err(FetchError::Http {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response)
    }
}

impl ImageSource for NdbcClient {
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let body = self.get(url)?.bytes()?;
        Ok(body.to_vec())
    }
}

impl LogSource for NdbcClient {
    fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        Ok(self.get(url)?.text()?)
    }
}


// ---------------------------------------------------------------------------
// Live endpoint checks
// ---------------------------------------------------------------------------
//
// These hit the real NDBC servers and are ignored by default.
//   cargo test -- --ignored ndbc_live
