//! Session result output.
//!
//! A session persists exactly one artifact: the downloadable JSON file
//! with the document type, extraction record, and review record.

use crate::types::SessionResult;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

/// A writer that serializes session results as JSON.
pub struct SessionWriter<W: Write> {
    writer: W,
    pretty: bool,
}

impl<W: Write> SessionWriter<W> {
    /// Create a new session writer.
    ///
    /// # Arguments
    ///
    /// * `writer` - The underlying writer (file, stdout, etc.)
    /// * `pretty` - Whether to pretty-print the JSON
    pub fn new(writer: W, pretty: bool) -> Self {
        Self { writer, pretty }
    }

    /// Write the session result followed by a trailing newline.
    pub fn write(&mut self, result: &SessionResult) -> io::Result<()> {
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, result).map_err(io::Error::other)?;
        } else {
            serde_json::to_writer(&mut self.writer, result).map_err(io::Error::other)?;
        }
        writeln!(self.writer)?;
        Ok(())
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Consume the writer and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Write a session result to a file path.
pub fn write_to_file(path: &Path, result: &SessionResult, pretty: bool) -> io::Result<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = SessionWriter::new(io::BufWriter::new(file), pretty);
    writer.write(result)?;
    writer.flush()
}

/// Convenience function to serialize an item to a JSON string.
pub fn to_json<T: Serialize>(item: &T, pretty: bool) -> Result<String, serde_json::Error> {
    if pretty {
        serde_json::to_string_pretty(item)
    } else {
        serde_json::to_string(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentType, ExtractionRecord, FieldReview, ReviewRecord};

    fn sample() -> SessionResult {
        let mut extraction = ExtractionRecord::new();
        extraction.insert("date".to_string(), Some("2025-05-01".to_string()));
        let mut review = ReviewRecord::new();
        review.insert("date".to_string(), FieldReview::pass());
        SessionResult {
            file_name: "scan.png".to_string(),
            document_type: DocumentType::new("invoice", vec!["date".to_string()]),
            extraction,
            review,
        }
    }

    #[test]
    fn test_write_compact() {
        let mut buffer = Vec::new();
        let mut writer = SessionWriter::new(&mut buffer, false);
        writer.write(&sample()).unwrap();

        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("\"file_name\":\"scan.png\""));
        assert!(output.ends_with('\n'));
    }

    #[test]
    fn test_write_pretty_roundtrips() {
        let mut buffer = Vec::new();
        let mut writer = SessionWriter::new(&mut buffer, true);
        writer.write(&sample()).unwrap();

        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains('\n'));
        let parsed: SessionResult = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        write_to_file(&path, &sample(), true).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: SessionResult = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.document_type.label, "invoice");
    }
}
