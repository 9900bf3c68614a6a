//! Session state machine for the linear pipeline.
//!
//! A session owns one document and walks it through
//! UPLOADED → OCR_DONE → CLASSIFIED → FIELDS_CONFIRMED → EXTRACTED →
//! REVIEWED → FINALIZED. No transition may be skipped; field
//! confirmation is the only step driven by external input.

use super::{Classifier, Extractor, Reviewer};
use crate::error::{PipelineError, PipelineResult};
use crate::llm::ImageInput;
use crate::ocr::{self, OcrEngine};
use crate::types::{
    dedup_fields, Document, DocumentType, ExtractionRecord, ReviewRecord, SessionResult,
};
use std::fmt;

/// Pipeline progress for a single document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uploaded,
    OcrDone,
    Classified,
    FieldsConfirmed,
    Extracted,
    Reviewed,
    Finalized,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uploaded => "UPLOADED",
            SessionState::OcrDone => "OCR_DONE",
            SessionState::Classified => "CLASSIFIED",
            SessionState::FieldsConfirmed => "FIELDS_CONFIRMED",
            SessionState::Extracted => "EXTRACTED",
            SessionState::Reviewed => "REVIEWED",
            SessionState::Finalized => "FINALIZED",
        };
        f.write_str(name)
    }
}

/// A single document's trip through the pipeline.
///
/// The document and each stage's output are immutable once produced;
/// the session only ever moves forward.
pub struct DocumentSession {
    document: Document,
    image: ImageInput,
    attach_image: bool,
    state: SessionState,
    ocr_text: Option<String>,
    document_type: Option<DocumentType>,
    confirmed_fields: Option<Vec<String>>,
    extraction: Option<ExtractionRecord>,
    review: Option<ReviewRecord>,
}

impl DocumentSession {
    /// Start a session for an uploaded document.
    pub fn new(document: Document) -> Self {
        let image = ImageInput::from_document(&document);
        Self {
            document,
            image,
            attach_image: true,
            state: SessionState::Uploaded,
            ocr_text: None,
            document_type: None,
            confirmed_fields: None,
            extraction: None,
            review: None,
        }
    }

    /// Don't attach the document image to LLM calls (text-only servers).
    pub fn set_attach_image(&mut self, attach: bool) {
        self.attach_image = attach;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn ocr_text(&self) -> Option<&str> {
        self.ocr_text.as_deref()
    }

    pub fn document_type(&self) -> Option<&DocumentType> {
        self.document_type.as_ref()
    }

    pub fn confirmed_fields(&self) -> Option<&[String]> {
        self.confirmed_fields.as_deref()
    }

    pub fn extraction(&self) -> Option<&ExtractionRecord> {
        self.extraction.as_ref()
    }

    pub fn review_record(&self) -> Option<&ReviewRecord> {
        self.review.as_ref()
    }

    fn image_for_llm(&self) -> Option<&ImageInput> {
        self.attach_image.then_some(&self.image)
    }

    fn expect_state(&self, expected: SessionState, action: &str) -> PipelineResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(PipelineError::State {
                state: self.state.to_string(),
                action: action.to_string(),
            })
        }
    }

    /// Run OCR over the document. UPLOADED → OCR_DONE.
    pub async fn run_ocr(&mut self, engine: &dyn OcrEngine) -> PipelineResult<&str> {
        self.expect_state(SessionState::Uploaded, "run OCR")?;

        let text = ocr::extract_text(engine, &self.document.bytes).await?;
        tracing::info!(
            "OCR ({}) extracted {} character(s) from {}",
            engine.name(),
            text.len(),
            self.document.file_name
        );

        self.state = SessionState::OcrDone;
        Ok(self.ocr_text.insert(text).as_str())
    }

    /// Classify the document and collect suggested fields.
    /// OCR_DONE → CLASSIFIED.
    pub async fn classify(&mut self, classifier: &Classifier) -> PipelineResult<&DocumentType> {
        self.expect_state(SessionState::OcrDone, "classify")?;

        let ocr_text = self.ocr_text.clone().unwrap_or_default();
        let document_type = classifier
            .classify(&ocr_text, self.image_for_llm())
            .await?;
        tracing::info!(
            "Classified as \"{}\" with {} suggested field(s)",
            document_type.label,
            document_type.fields.len()
        );

        self.state = SessionState::Classified;
        Ok(self.document_type.insert(document_type))
    }

    /// Record the user's confirmed field list (possibly edited).
    /// CLASSIFIED → FIELDS_CONFIRMED.
    pub fn confirm_fields(&mut self, fields: Vec<String>) -> PipelineResult<&[String]> {
        self.expect_state(SessionState::Classified, "confirm fields")?;

        let fields = dedup_fields(fields);
        if fields.is_empty() {
            return Err(PipelineError::Input(
                "at least one field must be confirmed for extraction".to_string(),
            ));
        }

        self.state = SessionState::FieldsConfirmed;
        Ok(self.confirmed_fields.insert(fields).as_slice())
    }

    /// Extract the confirmed fields. FIELDS_CONFIRMED → EXTRACTED.
    pub async fn extract(&mut self, extractor: &Extractor) -> PipelineResult<&ExtractionRecord> {
        self.expect_state(SessionState::FieldsConfirmed, "extract")?;

        let fields = self.confirmed_fields.clone().unwrap_or_default();
        let ocr_text = self.ocr_text.clone().unwrap_or_default();
        let record = extractor
            .extract(&fields, &ocr_text, self.image_for_llm())
            .await?;
        tracing::info!(
            "Extracted {} of {} field(s)",
            record.values().filter(|v| v.is_some()).count(),
            record.len()
        );

        self.state = SessionState::Extracted;
        Ok(&*self.extraction.insert(record))
    }

    /// Review the extraction. EXTRACTED → REVIEWED.
    pub async fn review(&mut self, reviewer: &Reviewer) -> PipelineResult<&ReviewRecord> {
        self.expect_state(SessionState::Extracted, "review")?;

        let extraction = self.extraction.clone().unwrap_or_default();
        let ocr_text = self.ocr_text.clone().unwrap_or_default();
        let record = reviewer
            .review(&extraction, &ocr_text, self.image_for_llm())
            .await?;

        debug_assert!(
            record.keys().eq(extraction.keys()),
            "review record must cover exactly the extracted fields"
        );
        tracing::info!(
            "Review complete: {} PASS / {} FAIL",
            record
                .values()
                .filter(|v| v.status == crate::types::ReviewStatus::Pass)
                .count(),
            record
                .values()
                .filter(|v| v.status == crate::types::ReviewStatus::Fail)
                .count()
        );

        self.state = SessionState::Reviewed;
        Ok(&*self.review.insert(record))
    }

    /// Assemble the immutable session result. REVIEWED → FINALIZED.
    ///
    /// The result carries the confirmed field list (not the raw
    /// suggestions) as the document type's fields.
    pub fn finalize(&mut self) -> PipelineResult<SessionResult> {
        self.expect_state(SessionState::Reviewed, "finalize")?;

        let label = self
            .document_type
            .as_ref()
            .map(|dt| dt.label.clone())
            .unwrap_or_else(|| "unknown".to_string());
        let fields = self.confirmed_fields.clone().unwrap_or_default();

        let result = SessionResult {
            file_name: self.document.file_name.clone(),
            document_type: DocumentType::new(label, fields),
            extraction: self.extraction.clone().unwrap_or_default(),
            review: self.review.clone().unwrap_or_default(),
        };

        self.state = SessionState::Finalized;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelConfig, ReviewerMode};
    use crate::ocr::MockOcr;
    use crate::pipeline::testing::MockLlm;
    use crate::types::ReviewStatus;

    fn document() -> Document {
        Document::new("invoice.png", vec![0x89, 0x50, 0x4E, 0x47])
    }

    fn classifier(response: &str) -> Classifier {
        Classifier::new(Box::new(MockLlm::success(response)), ModelConfig::default())
    }

    fn extractor(response: &str) -> Extractor {
        Extractor::new(Box::new(MockLlm::success(response)), ModelConfig::default())
    }

    fn reviewer(response: &str) -> Reviewer {
        Reviewer::new(
            Box::new(MockLlm::success(response)),
            ModelConfig::default(),
            ReviewerMode::Multimodal,
        )
    }

    const CLASSIFY_RESPONSE: &str =
        r#"{"doc_type": "invoice", "fields": ["invoice_number", "date", "total"]}"#;
    const EXTRACT_RESPONSE: &str =
        r#"{"invoice_number": "INV-000123", "date": "2025-05-01", "total": "$1,234.56"}"#;
    const REVIEW_RESPONSE: &str = r#"{
        "invoice_number": {"status": "PASS", "feedback": ""},
        "date": {"status": "PASS", "feedback": ""},
        "total": {"status": "FAIL", "feedback": "Digit mismatch"}
    }"#;

    /// The invoice scenario: OCR → classify → confirm unchanged →
    /// extract → review → finalize, all three layers present.
    #[tokio::test]
    async fn invoice_scenario_end_to_end() {
        let mut session = DocumentSession::new(document());
        assert_eq!(session.state(), SessionState::Uploaded);

        let text = session.run_ocr(&MockOcr).await.unwrap().to_string();
        assert!(text.contains("INVOICE"));
        assert_eq!(session.state(), SessionState::OcrDone);

        let suggested = session
            .classify(&classifier(CLASSIFY_RESPONSE))
            .await
            .unwrap()
            .clone();
        assert_eq!(suggested.label, "invoice");
        assert_eq!(session.state(), SessionState::Classified);

        session.confirm_fields(suggested.fields.clone()).unwrap();
        assert_eq!(session.state(), SessionState::FieldsConfirmed);

        let extraction = session
            .extract(&extractor(EXTRACT_RESPONSE))
            .await
            .unwrap()
            .clone();
        assert_eq!(extraction.len(), 3);
        assert_eq!(
            extraction["invoice_number"],
            Some("INV-000123".to_string())
        );

        let review = session.review(&reviewer(REVIEW_RESPONSE)).await.unwrap();
        assert_eq!(review.len(), 3);
        assert_eq!(review["total"].status, ReviewStatus::Fail);

        let result = session.finalize().unwrap();
        assert_eq!(session.state(), SessionState::Finalized);
        assert_eq!(result.document_type.label, "invoice");
        assert_eq!(
            result.document_type.fields,
            vec!["invoice_number", "date", "total"]
        );

        // Key-set invariants across the three layers
        assert!(result.extraction.keys().eq(result.review.keys()));

        // And the downloadable JSON round-trips
        let json = serde_json::to_string(&result).unwrap();
        let parsed: SessionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result);
    }

    #[tokio::test]
    async fn transitions_cannot_be_skipped() {
        let mut session = DocumentSession::new(document());

        // Classify before OCR
        let err = session.classify(&classifier(CLASSIFY_RESPONSE)).await.unwrap_err();
        assert!(matches!(err, PipelineError::State { .. }));

        // Confirm before classify
        let err = session.confirm_fields(vec!["a".to_string()]).unwrap_err();
        assert!(matches!(err, PipelineError::State { .. }));

        // Extract before confirmation
        session.run_ocr(&MockOcr).await.unwrap();
        let err = session.extract(&extractor("{}")).await.unwrap_err();
        assert!(matches!(err, PipelineError::State { .. }));

        // Finalize before review
        let err = session.finalize().unwrap_err();
        assert!(matches!(err, PipelineError::State { .. }));
    }

    #[tokio::test]
    async fn stages_cannot_run_twice() {
        let mut session = DocumentSession::new(document());
        session.run_ocr(&MockOcr).await.unwrap();
        let err = session.run_ocr(&MockOcr).await.unwrap_err();
        assert!(matches!(err, PipelineError::State { .. }));
    }

    #[tokio::test]
    async fn confirm_fields_dedups_and_rejects_empty() {
        let mut session = DocumentSession::new(document());
        session.run_ocr(&MockOcr).await.unwrap();
        session.classify(&classifier(CLASSIFY_RESPONSE)).await.unwrap();

        let err = session.confirm_fields(vec!["  ".to_string()]).unwrap_err();
        assert!(matches!(err, PipelineError::Input(_)));

        // Still in CLASSIFIED; a valid confirmation succeeds
        let confirmed = session
            .confirm_fields(vec![
                "date".to_string(),
                "total".to_string(),
                "date".to_string(),
            ])
            .unwrap();
        assert_eq!(confirmed, ["date".to_string(), "total".to_string()]);
    }

    #[tokio::test]
    async fn user_edited_fields_flow_into_extraction() {
        let mut session = DocumentSession::new(document());
        session.run_ocr(&MockOcr).await.unwrap();
        session.classify(&classifier(CLASSIFY_RESPONSE)).await.unwrap();

        // User drops "total" and adds "vendor"
        session
            .confirm_fields(vec![
                "invoice_number".to_string(),
                "vendor".to_string(),
            ])
            .unwrap();

        let extraction = session
            .extract(&extractor(r#"{"invoice_number": "INV-1"}"#))
            .await
            .unwrap();

        let keys: Vec<&String> = extraction.keys().collect();
        assert_eq!(keys, ["invoice_number", "vendor"]);
        assert_eq!(extraction["vendor"], None);
    }

    #[tokio::test]
    async fn llm_failure_leaves_state_unchanged() {
        let mut session = DocumentSession::new(document());
        session.run_ocr(&MockOcr).await.unwrap();

        let failing = Classifier::new(
            Box::new(MockLlm::failing(Some(401), "unauthorized")),
            ModelConfig::default(),
        );
        let err = session.classify(&failing).await.unwrap_err();
        assert!(matches!(err, PipelineError::Llm { .. }));
        assert_eq!(session.state(), SessionState::OcrDone);

        // The stage can be re-triggered manually after the failure
        session.classify(&classifier(CLASSIFY_RESPONSE)).await.unwrap();
        assert_eq!(session.state(), SessionState::Classified);
    }

    #[tokio::test]
    async fn attach_image_flag_controls_llm_payload() {
        let mock = MockLlm::success(CLASSIFY_RESPONSE);
        let requests = mock.requests_handle();
        let classifier = Classifier::new(Box::new(mock), ModelConfig::default());

        let mut session = DocumentSession::new(document());
        session.set_attach_image(false);
        session.run_ocr(&MockOcr).await.unwrap();
        session.classify(&classifier).await.unwrap();

        assert!(!requests.lock().unwrap()[0].1);
    }
}
