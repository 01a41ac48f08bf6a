/// Buoycam overlay label extraction.
///
/// Every NDBC buoycam image carries a caption such as
/// `Station ID: 41009 11/18/2025 1610 UTC`. The caption is described here as
/// a small grammar of literal tokens and typed captures, compiled once into a
/// regular expression.

use regex::Regex;
use tracing::{debug, warn};

use crate::model::{ImageLabel, TextDetection, TextKind};
use crate::ocr::TextDetector;

/// One element of a label grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelToken {
    /// Exact, case-sensitive text.
    Literal(&'static str),
    /// Zero or more whitespace characters.
    OptionalSpace,
    /// One or more whitespace characters.
    Space,
    /// A run of word characters, captured under the given name.
    Word(&'static str),
    /// A `MM/DD/YYYY` date, captured under the given name.
    Date(&'static str),
    /// A four digit `HHMM` time, captured under the given name.
    Time(&'static str),
}

/// `Station ID: <word> <MM/DD/YYYY> <HHMM> UTC`
pub const BUOYCAM_LABEL: &[LabelToken] = &[
    LabelToken::Literal("Station"),
    LabelToken::OptionalSpace,
    LabelToken::Literal("ID:"),
    LabelToken::OptionalSpace,
    LabelToken::Word("station"),
    LabelToken::Space,
    LabelToken::Date("date"),
    LabelToken::Space,
    LabelToken::Time("time"),
    LabelToken::Space,
    LabelToken::Literal("UTC"),
];

/// Renders a grammar as a regex pattern with named capture groups.
pub fn grammar_pattern(grammar: &[LabelToken]) -> String {
    grammar
        .iter()
        .map(|token| match token {
            LabelToken::Literal(text) => regex::escape(text),
            LabelToken::OptionalSpace => r"\s*".to_string(),
            LabelToken::Space => r"\s+".to_string(),
            LabelToken::Word(name) => format!(r"(?P<{}>\w+)", name),
            LabelToken::Date(name) => format!(r"(?P<{}>[0-9]{{2}}/[0-9]{{2}}/[0-9]{{4}})", name),
            LabelToken::Time(name) => format!(r"(?P<{}>[0-9]{{4}})", name),
        })
        .collect()
}

/// Matches recognized text lines against the buoycam caption grammar.
#[derive(Debug, Clone)]
pub struct LabelExtractor {
    pattern: Regex,
}

impl Default for LabelExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelExtractor {
    /// Extractor for the standard buoycam caption.
    pub fn new() -> Self {
        Self::from_grammar(BUOYCAM_LABEL).expect("buoycam caption grammar compiles")
    }

    /// Builds an extractor for a custom grammar. The grammar must capture
    /// `station`, `date` and `time`.
    pub fn from_grammar(grammar: &[LabelToken]) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&grammar_pattern(grammar))?;
        Ok(Self { pattern })
    }

    /// Matches a single line of text, anywhere within it.
    ///
    /// Returns `(station, "MM/DD/YYYY HHMM")`.
    pub fn match_line(&self, text: &str) -> Option<(String, String)> {
        let caps = self.pattern.captures(text)?;
        let station = caps.name("station")?.as_str();
        let date = caps.name("date")?.as_str();
        let time = caps.name("time")?.as_str();
        Some((station.to_string(), format!("{} {}", date, time)))
    }

    /// Returns the first matching LINE detection. WORD detections are
    /// fragments of lines and are never scanned.
    pub fn extract_from_detections(&self, detections: &[TextDetection]) -> ImageLabel {
        detections
            .iter()
            .filter(|d| d.kind == TextKind::Line)
            .find_map(|d| self.match_line(&d.text))
            .map(|(station, time)| ImageLabel::new(station, time))
            .unwrap_or_default()
    }

    /// Runs text detection on an image and extracts its label.
    ///
    /// Detector failures degrade to an empty label; they never end the
    /// station's run.
    pub fn extract(&self, detector: &dyn TextDetector, image: &[u8], station_id: &str) -> ImageLabel {
        match detector.detect_text(image) {
            Ok(detections) => {
                let label = self.extract_from_detections(&detections);
                if label.is_empty() {
                    debug!(
                        station = station_id,
                        lines = detections.iter().filter(|d| d.kind == TextKind::Line).count(),
                        "no caption line matched"
                    );
                }
                label
            }
            Err(e) => {
                warn!(station = station_id, error = %e, "failed to extract text from image");
                ImageLabel::default()
            }
        }
    }
}
