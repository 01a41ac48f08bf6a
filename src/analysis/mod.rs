/// Interpretation of fetched data.
///
/// Submodules:
/// - `label`: reads the station/timestamp overlay from recognized image text.
/// - `matching`: picks the log row closest in time to an image.

pub mod label;
pub mod matching;
