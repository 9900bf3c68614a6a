//! Document classification and field suggestion.
//!
//! Maps OCR text (and optionally the document image) to a type label
//! plus an ordered list of suggested extraction fields. The LLM is asked
//! for a single JSON object; a line-oriented fallback and per-type
//! default field sets cover the common failure shapes without a second
//! round trip.

use super::parse;
use crate::config::{Config, ModelConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::llm::{ChatRequest, ImageInput, LlmProvider, LlmProviderFactory};
use crate::types::DocumentType;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static DOC_TYPE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)doc(?:ument)?\s*type:\s*(.+)").expect("doc type regex"));
static FIELDS_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)fields:\s*(.+)").expect("fields regex"));

/// Known document types and the fields worth extracting when the model
/// names the type but fails to suggest any.
fn default_fields(doc_type: &str) -> Option<&'static [&'static str]> {
    match doc_type {
        "invoice" => Some(&["Invoice #", "Date", "Total Amount", "Vendor"]),
        "bank statement" => Some(&[
            "Account Name",
            "Statement Date",
            "Closing Balance",
            "Account Number",
        ]),
        "claim form" => Some(&[
            "Claim ID",
            "Patient Name",
            "Date of Service",
            "Total Charges",
        ]),
        "contract" => Some(&["Effective Date", "Party A", "Party B", "Termination Clause"]),
        _ => None,
    }
}

/// Document classifier stage.
pub struct Classifier {
    provider: Box<dyn LlmProvider>,
    model: ModelConfig,
}

impl Classifier {
    pub fn new(provider: Box<dyn LlmProvider>, model: ModelConfig) -> Self {
        Self { provider, model }
    }

    /// Build the classifier wired in config.
    pub fn from_config(config: &Config) -> PipelineResult<Self> {
        let model = config
            .model_for_stage("classifier")
            .map_err(|e| PipelineError::Llm {
                message: e.to_string(),
                status_code: None,
            })?
            .clone();
        let provider = LlmProviderFactory::create(&model)?;
        Ok(Self::new(provider, model))
    }

    /// Classify the document and suggest extraction fields.
    ///
    /// Empty OCR text is allowed; the model classifies best-effort from
    /// the image (when attached) or returns "other".
    pub async fn classify(
        &self,
        ocr_text: &str,
        image: Option<&ImageInput>,
    ) -> PipelineResult<DocumentType> {
        let prompt = build_prompt(ocr_text);
        let request = ChatRequest::new(prompt, image.cloned(), &self.model);

        tracing::debug!("Sending classification prompt via {}", self.provider.name());
        let response = self.provider.complete(&request).await?;
        tracing::debug!(
            latency_ms = response.latency_ms,
            "Received classification response"
        );

        parse_response(&response.text)
    }
}

fn build_prompt(ocr_text: &str) -> String {
    let example = serde_json::json!({
        "doc_type": "invoice",
        "fields": [
            "buyer_name", "buyer_address", "currency", "invoice_amount",
            "invoice_date", "invoice_number", "payment_due_date",
            "seller_name", "seller_address", "subtotal", "total_due_amount",
            "total_tax"
        ]
    });

    format!(
        "Analyze the provided document.\n\
         OCR TEXT\n\
         ---------\n\
         {ocr_text}\n\
         ---------\n\
         1. Classify the document type (e.g., Invoice, Bank Statement, Claim Form, Contract, Other).\n\
         2. Suggest key fields and table headers relevant for this document type.\n\
         \n\
         IMPORTANT: Format your response ONLY as a single JSON object with keys \"doc_type\" \
         (string) and \"fields\" (list of strings). Do not include any text before or after \
         the JSON object.\n\
         Example JSON:\n\
         ```json\n\
         {}\n\
         ```\n\
         If the document type is unclear or doesn't fit common categories, use \"other\" for \
         the doc_type. Make sure 'fields' is always a list, even if empty.",
        serde_json::to_string_pretty(&example).unwrap_or_default()
    )
}

/// Parse the classification response: JSON first, line fallback second.
fn parse_response(response: &str) -> PipelineResult<DocumentType> {
    if let Some(json_str) = parse::extract_json_object(response) {
        if let Ok(value) = serde_json::from_str::<Value>(&json_str) {
            if let Some(doc_type) = document_type_from_value(&value) {
                return Ok(doc_type);
            }
            tracing::warn!("Classification JSON missing expected keys, trying fallback");
        } else {
            tracing::warn!("Classification JSON did not parse, trying fallback");
        }
    }

    fallback_parse(response).ok_or_else(|| PipelineError::Parse {
        stage: "classify".to_string(),
        message: "response contained neither a JSON object nor a Doc Type line".to_string(),
    })
}

fn document_type_from_value(value: &Value) -> Option<DocumentType> {
    let obj = value.as_object()?;
    let label = obj.get("doc_type")?.as_str()?;
    let fields = obj
        .get("fields")?
        .as_array()?
        .iter()
        .filter_map(|f| f.as_str())
        .map(str::to_string)
        .collect();

    let label = if label.trim().is_empty() {
        "unknown"
    } else {
        label
    };
    Some(DocumentType::new(label, fields))
}

/// Line-oriented fallback for responses like "Doc Type: invoice\nFields: a, b".
fn fallback_parse(response: &str) -> Option<DocumentType> {
    let label = DOC_TYPE_LINE
        .captures(response)?
        .get(1)?
        .as_str()
        .trim()
        .trim_matches('"')
        .to_lowercase();

    let mut fields: Vec<String> = Vec::new();
    if let Some(caps) = FIELDS_LINE.captures(response) {
        let raw = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        if raw.starts_with('[') {
            if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(raw) {
                fields = items
                    .iter()
                    .filter_map(|f| f.as_str())
                    .map(str::to_string)
                    .collect();
            }
        } else {
            fields = raw
                .split(',')
                .map(|f| f.trim().trim_matches('"').to_string())
                .filter(|f| !f.is_empty())
                .collect();
        }
    }

    if fields.is_empty() {
        if let Some(defaults) = default_fields(&label) {
            tracing::debug!("Using default fields for doc type {label}");
            fields = defaults.iter().map(|f| f.to_string()).collect();
        }
    }

    Some(DocumentType::new(label, fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::MockLlm;

    fn classifier(mock: MockLlm) -> Classifier {
        Classifier::new(Box::new(mock), ModelConfig::default())
    }

    #[tokio::test]
    async fn classify_parses_clean_json() {
        let mock = MockLlm::success(r#"{"doc_type": "Invoice", "fields": ["invoice_number", "date", "total"]}"#);
        let result = classifier(mock).classify("INVOICE\nTotal: $10", None).await.unwrap();
        assert_eq!(result.label, "invoice");
        assert_eq!(result.fields, vec!["invoice_number", "date", "total"]);
    }

    #[tokio::test]
    async fn classify_parses_fenced_json_and_dedups() {
        let mock = MockLlm::success(
            "Sure!\n```json\n{\"doc_type\": \"contract\", \"fields\": [\"Party A\", \"Party A\", \"Party B\"]}\n```",
        );
        let result = classifier(mock).classify("AGREEMENT", None).await.unwrap();
        assert_eq!(result.label, "contract");
        assert_eq!(result.fields, vec!["Party A", "Party B"]);
    }

    #[tokio::test]
    async fn classify_falls_back_to_line_format() {
        let mock = MockLlm::success("Doc Type: Invoice\nFields: Invoice #, Date, Total Amount");
        let result = classifier(mock).classify("INVOICE", None).await.unwrap();
        assert_eq!(result.label, "invoice");
        assert_eq!(result.fields, vec!["Invoice #", "Date", "Total Amount"]);
    }

    #[tokio::test]
    async fn classify_uses_default_fields_when_suggestions_missing() {
        let mock = MockLlm::success("Document Type: Invoice");
        let result = classifier(mock).classify("INVOICE", None).await.unwrap();
        assert_eq!(result.label, "invoice");
        assert_eq!(
            result.fields,
            vec!["Invoice #", "Date", "Total Amount", "Vendor"]
        );
    }

    #[tokio::test]
    async fn classify_unusable_response_is_parse_error() {
        let mock = MockLlm::success("I am not sure what this document is.");
        let err = classifier(mock).classify("???", None).await.unwrap_err();
        assert!(matches!(err, PipelineError::Parse { .. }));
    }

    #[tokio::test]
    async fn classify_empty_ocr_text_does_not_crash() {
        let mock = MockLlm::success(r#"{"doc_type": "other", "fields": []}"#);
        let result = classifier(mock).classify("", None).await.unwrap();
        assert_eq!(result.label, "other");
        assert!(result.fields.is_empty());
    }

    #[tokio::test]
    async fn classify_propagates_llm_failure() {
        let mock = MockLlm::failing(Some(503), "service unavailable");
        let err = classifier(mock).classify("INVOICE", None).await.unwrap_err();
        assert!(matches!(err, PipelineError::Llm { status_code: Some(503), .. }));
    }

    #[tokio::test]
    async fn classify_attaches_image_when_given() {
        let mock = MockLlm::success(r#"{"doc_type": "invoice", "fields": ["date"]}"#);
        let requests = mock.requests_handle();
        let image = ImageInput::from_bytes(&[1, 2, 3], "png");
        classifier(mock)
            .classify("INVOICE", Some(&image))
            .await
            .unwrap();
        let requests = requests.lock().unwrap();
        assert!(requests[0].1, "image should be attached to the request");
        assert!(requests[0].0.contains("OCR TEXT"));
    }
}
