//! Text detection on captured images.
//!
//! The pipeline depends only on [`TextDetector`]. The bundled backend runs
//! the `tesseract` command line tool in TSV mode, which reports one row per
//! recognized word with its block/paragraph/line position and confidence.
//! Words are regrouped into whole-line detections so callers see the same
//! LINE/WORD split a cloud text-detection service returns.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::model::{OcrError, TextDetection};

/// Recognizes text in an encoded image.
pub trait TextDetector {
    /// Returns LINE detections in reading order, followed by WORD detections.
    fn detect_text(&self, image: &[u8]) -> Result<Vec<TextDetection>, OcrError>;
}

/// `tesseract` CLI backend.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: PathBuf,
    language: String,
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

impl TesseractCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into(), language: "eng".to_string() }
    }
}

impl TextDetector for TesseractCli {
    fn detect_text(&self, image: &[u8]) -> Result<Vec<TextDetection>, OcrError> {
        let mut child = Command::new(&self.binary)
            .args(["stdin", "stdout", "-l", self.language.as_str(), "tsv"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(image) {
                // Tesseract closes stdin early on images it cannot decode
                drop(stdin);
                let _ = child.kill();
                let _ = child.wait();
                return Err(OcrError::Io(e));
            }
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(OcrError::Engine(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(parse_tsv(&String::from_utf8_lossy(&output.stdout)))
    }
}

// ---------------------------------------------------------------------------
// TSV parsing
// ---------------------------------------------------------------------------

/// Word level in tesseract's TSV `level` column.
const WORD_LEVEL: &str = "5";

/// Converts tesseract TSV output into line and word detections.
///
/// Columns: level, page_num, block_num, par_num, line_num, word_num,
/// left, top, width, height, conf, text. Rows with an empty text or a
/// negative confidence are layout rows and are skipped. Line confidence is
/// the mean of its words.
pub fn parse_tsv(tsv: &str) -> Vec<TextDetection> {
    let mut lines: Vec<((String, String, String, String), Vec<String>, Vec<f32>)> = Vec::new();
    let mut words = Vec::new();

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != WORD_LEVEL {
            continue;
        }
        let text = cols[11].trim();
        let confidence: f32 = match cols[10].trim().parse() {
            Ok(c) if c >= 0.0 => c,
            _ => continue,
        };
        if text.is_empty() {
            continue;
        }

        let position = (
            cols[1].to_string(),
            cols[2].to_string(),
            cols[3].to_string(),
            cols[4].to_string(),
        );
        let same_line = matches!(lines.last(), Some((last, _, _)) if *last == position);
        if !same_line {
            lines.push((position, Vec::new(), Vec::new()));
        }
        if let Some((_, texts, confs)) = lines.last_mut() {
            texts.push(text.to_string());
            confs.push(confidence);
        }
        words.push(TextDetection::word(text, confidence));
    }

    let mut detections: Vec<TextDetection> = lines
        .into_iter()
        .map(|(_, texts, confs)| {
            let mean = confs.iter().sum::<f32>() / confs.len() as f32;
            TextDetection::line(texts.join(" "), mean)
        })
        .collect();
    detections.extend(words);
    detections
}
