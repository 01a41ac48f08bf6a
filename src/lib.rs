//! Buoy camera ingest service.
//!
//! Fetches each configured NDBC station's camera image, reads the caption
//! overlay, archives the image and the station's 5-day meteorological log,
//! and stores an observation record joining the image with the log row
//! nearest the caption time.

pub mod analysis;
pub mod config;
pub mod dedup;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod ocr;
pub mod pipeline;
pub mod report;
pub mod stations;
pub mod storage;
