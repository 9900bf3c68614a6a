//! Extraction review.
//!
//! Validates the extraction record against the document and produces a
//! PASS/FAIL verdict with feedback per field. Two operating modes, chosen
//! in config: text-only (reasons over OCR text and values) and multimodal
//! (also sees the image).

use super::parse;
use crate::config::{Config, ModelConfig, ReviewerMode};
use crate::error::{PipelineError, PipelineResult};
use crate::llm::{ChatRequest, ImageInput, LlmProvider, LlmProviderFactory};
use crate::types::{ExtractionRecord, FieldReview, ReviewRecord, ReviewStatus};
use serde_json::Value;
use std::collections::HashMap;

/// Extraction review stage.
pub struct Reviewer {
    provider: Box<dyn LlmProvider>,
    model: ModelConfig,
    mode: ReviewerMode,
}

impl Reviewer {
    pub fn new(provider: Box<dyn LlmProvider>, model: ModelConfig, mode: ReviewerMode) -> Self {
        Self {
            provider,
            model,
            mode,
        }
    }

    /// Build the reviewer wired in config, honoring `stages.reviewer_mode`.
    pub fn from_config(config: &Config) -> PipelineResult<Self> {
        let model = config
            .model_for_stage("reviewer")
            .map_err(|e| PipelineError::Llm {
                message: e.to_string(),
                status_code: None,
            })?
            .clone();
        let provider = LlmProviderFactory::create(&model)?;
        Ok(Self::new(provider, model, config.stages.reviewer_mode))
    }

    /// Review the extraction record against the document.
    ///
    /// The returned record has exactly one verdict per extracted field.
    pub async fn review(
        &self,
        extraction: &ExtractionRecord,
        ocr_text: &str,
        image: Option<&ImageInput>,
    ) -> PipelineResult<ReviewRecord> {
        if extraction.is_empty() {
            tracing::warn!("No extracted data provided for review");
            return Ok(ReviewRecord::new());
        }
        if ocr_text.is_empty() && image.is_none() {
            return Err(PipelineError::Input(
                "review needs OCR text or a document image".to_string(),
            ));
        }

        // Mode is a configuration choice: text mode never attaches the image
        let attached = match self.mode {
            ReviewerMode::Multimodal => image.cloned(),
            ReviewerMode::Text => None,
        };

        let prompt = build_prompt(extraction, ocr_text);
        let request = ChatRequest::new(prompt, attached, &self.model);

        tracing::debug!(
            "Reviewing {} field(s) via {} ({:?} mode)",
            extraction.len(),
            self.provider.name(),
            self.mode
        );
        let response = self.provider.complete(&request).await?;

        parse_response(&response.text, extraction)
    }
}

fn build_prompt(extraction: &ExtractionRecord, ocr_text: &str) -> String {
    let extracted_json = serde_json::to_string(extraction).unwrap_or_default();

    // Show the expected shape for the first couple of fields
    let example: serde_json::Map<String, Value> = extraction
        .keys()
        .take(2)
        .map(|field| {
            (
                field.clone(),
                serde_json::json!({"status": "PASS or FAIL", "feedback": "..."}),
            )
        })
        .collect();
    let json_format_example =
        serde_json::to_string(&Value::Object(example)).unwrap_or_default();

    let mut prompt = format!(
        "Please act as a meticulous reviewer. Your task is to validate the accuracy of \
         extracted data against the provided document information (primarily the image, \
         secondarily the OCR text).\n\
         \n\
         Extracted Data (JSON Format):\n\
         {extracted_json}\n"
    );

    if !ocr_text.is_empty() {
        prompt.push_str(&format!(
            "Reference OCR Text:\n\
             Remember words in OCR Text might be jumbled up, and the reading order of \
             neighboring text might not be correct. Keep that in mind and use your judgement \
             to decide if the word order is correct.\n\
             ---BEGIN OCR TEXT---\n\
             {ocr_text}\n\
             ---END OCR TEXT---\n\n"
        ));
    }

    prompt.push_str(&format!(
        "Instructions:\n\
         For each field in the Extracted Data:\n\
         1. Compare the extracted value against the primary document source (image if \
         provided, otherwise text) and determine if the extracted value is correct (PASS) \
         or incorrect (FAIL).\n\
         2. If the extracted value exists and is not blank, then check if it is present in \
         the document. If present then \"PASS\". If it is not present then \"FAIL\".\n\
         3. If the extracted value is blank or \"\" and it is not present in the document, \
         set the status to \"PASS\".\n\
         4. If the status is FAIL, provide brief, specific feedback explaining the error \
         (e.g., \"Value not found in image\", \"Incorrect date format\", \"Extracted \
         customer name instead of vendor\"). If PASS, feedback can be empty or \"\".\n\
         \n\
         IMPORTANT: Respond ONLY with a single JSON object. The keys of this object should \
         be the exact field names from the Extracted Data. The value for each key should be \
         another JSON object containing two keys: \"status\" (string: \"PASS\" or \"FAIL\") \
         and \"feedback\" (string).\n\
         \n\
         Do not give any explanation in the final content. Just the JSON response. Example \
         JSON Response Format:\n\
         {json_format_example}"
    ));

    prompt
}

/// Parse the review response, guaranteeing one verdict per extracted
/// field. A response with no JSON at all is a parse failure; individual
/// malformed or missing entries degrade to FAIL verdicts.
fn parse_response(
    response: &str,
    extraction: &ExtractionRecord,
) -> PipelineResult<ReviewRecord> {
    let json_str = parse::extract_json_object(response).ok_or_else(|| PipelineError::Parse {
        stage: "review".to_string(),
        message: "no JSON object found in review response".to_string(),
    })?;
    let parsed: Value = serde_json::from_str(&json_str).map_err(|e| PipelineError::Parse {
        stage: "review".to_string(),
        message: format!("review JSON did not parse: {e}"),
    })?;
    let Value::Object(map) = parsed else {
        return Err(PipelineError::Parse {
            stage: "review".to_string(),
            message: "review response was not a JSON object".to_string(),
        });
    };

    let lowered: HashMap<String, &Value> = map
        .iter()
        .map(|(k, v)| (k.trim().to_lowercase(), v))
        .collect();

    let mut record = ReviewRecord::new();
    for field in extraction.keys() {
        let entry = map
            .get(field)
            .or_else(|| lowered.get(&field.trim().to_lowercase()).copied());

        let verdict = match entry {
            Some(Value::Object(item)) => verdict_from_entry(item),
            Some(_) => FieldReview::fail("invalid review item format"),
            None => FieldReview::fail("field missing from review response"),
        };
        record.insert(field.clone(), verdict);
    }

    Ok(record)
}

fn verdict_from_entry(entry: &serde_json::Map<String, Value>) -> FieldReview {
    let status = entry
        .get("status")
        .and_then(|s| s.as_str())
        .unwrap_or("")
        .trim()
        .to_uppercase();
    let feedback = entry
        .get("feedback")
        .and_then(|s| s.as_str())
        .unwrap_or("")
        .trim()
        .to_string();

    match status.as_str() {
        "PASS" => FieldReview {
            status: ReviewStatus::Pass,
            feedback,
        },
        "FAIL" => FieldReview {
            status: ReviewStatus::Fail,
            feedback,
        },
        "" => FieldReview::fail("missing status in review response"),
        other => FieldReview::fail(format!("invalid status: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::MockLlm;

    fn reviewer(mock: MockLlm, mode: ReviewerMode) -> Reviewer {
        Reviewer::new(Box::new(mock), ModelConfig::default(), mode)
    }

    fn extraction(pairs: &[(&str, Option<&str>)]) -> ExtractionRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(String::from)))
            .collect()
    }

    #[tokio::test]
    async fn review_produces_verdict_per_field() {
        let mock = MockLlm::success(
            r#"{"date": {"status": "PASS", "feedback": ""},
                "total": {"status": "FAIL", "feedback": "Value not found in image"}}"#,
        );
        let extraction = extraction(&[("date", Some("2025-05-01")), ("total", Some("$9,999"))]);
        let record = reviewer(mock, ReviewerMode::Multimodal)
            .review(&extraction, "INVOICE", None)
            .await
            .unwrap();

        assert_eq!(record.len(), 2);
        assert_eq!(record["date"].status, ReviewStatus::Pass);
        assert_eq!(record["total"].status, ReviewStatus::Fail);
        assert_eq!(record["total"].feedback, "Value not found in image");
    }

    #[tokio::test]
    async fn review_key_set_matches_extraction_even_when_fields_missing() {
        let mock = MockLlm::success(r#"{"date": {"status": "PASS", "feedback": ""}}"#);
        let extraction = extraction(&[("date", Some("x")), ("vendor", Some("y"))]);
        let record = reviewer(mock, ReviewerMode::Text)
            .review(&extraction, "text", None)
            .await
            .unwrap();

        let review_keys: Vec<&String> = record.keys().collect();
        let extraction_keys: Vec<&String> = extraction.keys().collect();
        assert_eq!(review_keys, extraction_keys);
        assert_eq!(record["vendor"].status, ReviewStatus::Fail);
        assert!(record["vendor"].feedback.contains("missing"));
    }

    #[tokio::test]
    async fn review_coerces_invalid_status_to_fail() {
        let mock = MockLlm::success(r#"{"date": {"status": "MAYBE", "feedback": "hmm"}}"#);
        let extraction = extraction(&[("date", Some("x"))]);
        let record = reviewer(mock, ReviewerMode::Text)
            .review(&extraction, "text", None)
            .await
            .unwrap();
        assert_eq!(record["date"].status, ReviewStatus::Fail);
        assert!(record["date"].feedback.contains("MAYBE"));
    }

    #[tokio::test]
    async fn review_matches_field_names_case_insensitively() {
        let mock = MockLlm::success(r#"{"DATE": {"status": "pass", "feedback": ""}}"#);
        let extraction = extraction(&[("date", Some("x"))]);
        let record = reviewer(mock, ReviewerMode::Text)
            .review(&extraction, "text", None)
            .await
            .unwrap();
        assert_eq!(record["date"].status, ReviewStatus::Pass);
    }

    #[tokio::test]
    async fn review_without_json_is_parse_error() {
        let mock = MockLlm::success("Everything looks fine to me!");
        let extraction = extraction(&[("date", Some("x"))]);
        let err = reviewer(mock, ReviewerMode::Text)
            .review(&extraction, "text", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Parse { .. }));
    }

    #[tokio::test]
    async fn review_text_mode_never_attaches_image() {
        let mock = MockLlm::success(r#"{"date": {"status": "PASS", "feedback": ""}}"#);
        let requests = mock.requests_handle();
        let extraction = extraction(&[("date", Some("x"))]);
        let image = ImageInput::from_bytes(&[1, 2, 3], "png");
        reviewer(mock, ReviewerMode::Text)
            .review(&extraction, "text", Some(&image))
            .await
            .unwrap();
        assert!(!requests.lock().unwrap()[0].1, "text mode must not attach the image");
    }

    #[tokio::test]
    async fn review_multimodal_mode_attaches_image() {
        let mock = MockLlm::success(r#"{"date": {"status": "PASS", "feedback": ""}}"#);
        let requests = mock.requests_handle();
        let extraction = extraction(&[("date", Some("x"))]);
        let image = ImageInput::from_bytes(&[1, 2, 3], "png");
        reviewer(mock, ReviewerMode::Multimodal)
            .review(&extraction, "text", Some(&image))
            .await
            .unwrap();
        assert!(requests.lock().unwrap()[0].1);
    }

    #[tokio::test]
    async fn review_empty_extraction_yields_empty_record() {
        let mock = MockLlm::success("{}");
        let calls = mock.call_count_handle();
        let record = reviewer(mock, ReviewerMode::Text)
            .review(&ExtractionRecord::new(), "text", None)
            .await
            .unwrap();
        assert!(record.is_empty());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn review_prompt_embeds_extraction_and_rules() {
        let mock = MockLlm::success(r#"{"date": {"status": "PASS", "feedback": ""}}"#);
        let requests = mock.requests_handle();
        let extraction = extraction(&[("date", Some("2025-05-01"))]);
        reviewer(mock, ReviewerMode::Text)
            .review(&extraction, "INVOICE BODY", None)
            .await
            .unwrap();
        let (prompt, _) = requests.lock().unwrap()[0].clone();
        assert!(prompt.contains("\"date\":\"2025-05-01\""));
        assert!(prompt.contains("PASS"));
        assert!(prompt.contains("---BEGIN OCR TEXT---"));
    }
}
