//! Tesseract OCR engine via subprocess.
//!
//! Pipes the image to `tesseract stdin stdout ... tsv` and rebuilds lines
//! from the word-level TSV output. Words below the configured confidence
//! are dropped before line assembly.

use super::OcrLine;
use crate::config::TesseractConfig;
use crate::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Tesseract subprocess engine.
pub struct TesseractOcr {
    binary: String,
    lang: String,
    min_confidence: f32,
}

impl TesseractOcr {
    pub fn new(config: &TesseractConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            lang: config.lang.clone(),
            min_confidence: config.min_confidence,
        }
    }

    fn ocr_error(&self, message: impl Into<String>) -> PipelineError {
        PipelineError::Ocr {
            engine: "tesseract".to_string(),
            message: message.into(),
        }
    }
}

/// A single word row from the TSV output.
struct Word {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
    conf: f32,
    text: String,
}

/// Parse tesseract TSV output into lines, filtering low-confidence words.
///
/// TSV columns: level page_num block_num par_num line_num word_num
/// left top width height conf text. Words are grouped into lines by
/// (block, paragraph, line) and ordered left-to-right.
fn parse_tsv(tsv: &str, min_confidence: f32) -> Vec<OcrLine> {
    let mut groups: BTreeMap<(u32, u32, u32), Vec<Word>> = BTreeMap::new();

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }
        let (Ok(block), Ok(par), Ok(line_num)) = (
            cols[2].parse::<u32>(),
            cols[3].parse::<u32>(),
            cols[4].parse::<u32>(),
        ) else {
            continue;
        };
        let (Ok(left), Ok(top), Ok(width), Ok(height)) = (
            cols[6].parse::<i32>(),
            cols[7].parse::<i32>(),
            cols[8].parse::<i32>(),
            cols[9].parse::<i32>(),
        ) else {
            continue;
        };
        let Ok(conf) = cols[10].parse::<f32>() else {
            continue;
        };
        let text = cols[11].trim();
        // conf -1 marks structural (non-word) rows
        if conf < 0.0 || conf < min_confidence || text.is_empty() {
            continue;
        }

        groups.entry((block, par, line_num)).or_default().push(Word {
            left,
            top,
            right: left + width,
            bottom: top + height,
            conf,
            text: text.to_string(),
        });
    }

    let mut lines = Vec::with_capacity(groups.len());
    for (_, mut words) in groups {
        words.sort_by_key(|w| w.left);
        let text = words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let xmin = words.iter().map(|w| w.left).min().unwrap_or(0);
        let ymin = words.iter().map(|w| w.top).min().unwrap_or(0);
        let xmax = words.iter().map(|w| w.right).max().unwrap_or(0);
        let ymax = words.iter().map(|w| w.bottom).max().unwrap_or(0);
        let confidence = words.iter().map(|w| w.conf).sum::<f32>() / words.len() as f32;

        lines.push(OcrLine {
            text,
            bbox: [xmin, ymin, xmax, ymax],
            confidence,
        });
    }
    lines
}

#[async_trait]
impl super::OcrEngine for TesseractOcr {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    async fn recognize(&self, image: &[u8]) -> PipelineResult<Vec<OcrLine>> {
        let mut child = Command::new(&self.binary)
            .args(["stdin", "stdout", "-l", &self.lang, "--psm", "6", "tsv"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.ocr_error(format!("failed to spawn {}: {e}", self.binary)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(image)
                .await
                .map_err(|e| self.ocr_error(format!("failed to write image to stdin: {e}")))?;
            // Close stdin so tesseract sees EOF
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.ocr_error(format!("tesseract did not complete: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.ocr_error(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let tsv = String::from_utf8_lossy(&output.stdout);
        let lines = parse_tsv(&tsv, self.min_confidence);
        tracing::debug!(
            "tesseract produced {} line(s) above confidence {}",
            lines.len(),
            self.min_confidence
        );
        Ok(lines)
    }
}
