//! Core data types for the Docket document pipeline.
//!
//! These types follow the document through its session: the uploaded
//! image, the classified type with its suggested fields, the extracted
//! values, the per-field review verdicts, and the final downloadable
//! result.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An uploaded document image. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Document {
    /// Original file name (for display and for the session result)
    pub file_name: String,

    /// Raw image bytes as uploaded
    pub bytes: Vec<u8>,

    /// Sniffed format ("jpeg", "png", "webp", "gif")
    pub format: String,
}

impl Document {
    /// Create a document from raw bytes, sniffing the image format from
    /// the byte signature. Unknown formats fall back to "jpeg".
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let format = match image::guess_format(&bytes) {
            Ok(image::ImageFormat::Png) => "png",
            Ok(image::ImageFormat::Jpeg) => "jpeg",
            Ok(image::ImageFormat::WebP) => "webp",
            Ok(image::ImageFormat::Gif) => "gif",
            Ok(other) => {
                tracing::warn!("Unsupported image format {other:?}, treating as jpeg");
                "jpeg"
            }
            Err(_) => {
                tracing::warn!("Could not sniff image format, treating as jpeg");
                "jpeg"
            }
        };

        Self {
            file_name: file_name.into(),
            bytes,
            format: format.to_string(),
        }
    }
}

/// A classified document type: a label plus the suggested extraction fields.
///
/// Field order is the suggestion order from the classifier (or the user's
/// edited order); duplicates are removed on construction, first win.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentType {
    /// Lowercased type label ("invoice", "bank statement", "other", ...)
    pub label: String,

    /// Ordered, deduplicated field names suggested for extraction
    pub fields: Vec<String>,
}

impl DocumentType {
    /// Create a document type, normalizing the label and deduplicating
    /// the fields while preserving insertion order.
    pub fn new(label: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            label: label.into().trim().to_lowercase(),
            fields: dedup_fields(fields),
        }
    }
}

/// Deduplicate field names preserving first-seen order. Blank entries are
/// dropped; surrounding whitespace is trimmed.
pub fn dedup_fields(fields: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    fields
        .into_iter()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty() && seen.insert(f.clone()))
        .collect()
}

/// Mapping from confirmed field name to extracted value.
///
/// Every confirmed field appears as a key; `None` means the value was not
/// found in the document.
pub type ExtractionRecord = BTreeMap<String, Option<String>>;

/// Mapping from field name to review verdict. Keyed identically to the
/// extraction record it reviews.
pub type ReviewRecord = BTreeMap<String, FieldReview>;

/// Reviewer verdict for a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewStatus {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "FAIL")]
    Fail,
}

/// A single field's review: the verdict plus freeform feedback.
///
/// Feedback is expected to be non-empty for FAIL verdicts and may be empty
/// for PASS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldReview {
    pub status: ReviewStatus,
    pub feedback: String,
}

impl FieldReview {
    pub fn pass() -> Self {
        Self {
            status: ReviewStatus::Pass,
            feedback: String::new(),
        }
    }

    pub fn fail(feedback: impl Into<String>) -> Self {
        Self {
            status: ReviewStatus::Fail,
            feedback: feedback.into(),
        }
    }
}

/// The finalized output of a pipeline session: document type, extracted
/// values, and review verdicts. Serialized as the downloadable JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    /// Name of the processed file
    pub file_name: String,

    /// Classified type with the confirmed field list
    pub document_type: DocumentType,

    /// Field → extracted value (None when not found)
    pub extraction: ExtractionRecord,

    /// Field → review verdict; same key set as `extraction`
    pub review: ReviewRecord,
}
