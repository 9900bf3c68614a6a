//! Key-value extraction from documents.
//!
//! Given the confirmed field list, prompts the stage's LLM for a single
//! flat JSON object and normalizes the response so every requested field
//! appears in the output. Fields the model could not resolve come back
//! as `None`, never as missing keys.

use super::parse;
use crate::config::{Config, ModelConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::llm::{ChatRequest, ImageInput, LlmProvider, LlmProviderFactory};
use crate::types::ExtractionRecord;
use serde_json::Value;
use std::collections::HashMap;

/// Field extraction stage.
pub struct Extractor {
    provider: Box<dyn LlmProvider>,
    model: ModelConfig,
}

impl Extractor {
    pub fn new(provider: Box<dyn LlmProvider>, model: ModelConfig) -> Self {
        Self { provider, model }
    }

    /// Build the extractor wired in config.
    pub fn from_config(config: &Config) -> PipelineResult<Self> {
        let model = config
            .model_for_stage("extractor")
            .map_err(|e| PipelineError::Llm {
                message: e.to_string(),
                status_code: None,
            })?
            .clone();
        let provider = LlmProviderFactory::create(&model)?;
        Ok(Self::new(provider, model))
    }

    /// Extract the confirmed fields from the document.
    ///
    /// Requires OCR text, an image, or both. An empty field list yields
    /// an empty record.
    pub async fn extract(
        &self,
        fields: &[String],
        ocr_text: &str,
        image: Option<&ImageInput>,
    ) -> PipelineResult<ExtractionRecord> {
        if fields.is_empty() {
            tracing::warn!("No fields specified for extraction");
            return Ok(ExtractionRecord::new());
        }
        if ocr_text.is_empty() && image.is_none() {
            return Err(PipelineError::Input(
                "extraction needs OCR text or a document image".to_string(),
            ));
        }

        let prompt = build_prompt(fields, ocr_text);
        let request = ChatRequest::new(prompt, image.cloned(), &self.model);

        tracing::debug!(
            "Extracting {} field(s) via {}",
            fields.len(),
            self.provider.name()
        );
        let response = self.provider.complete(&request).await?;

        Ok(parse_response(&response.text, fields))
    }
}

fn build_prompt(fields: &[String], ocr_text: &str) -> String {
    let field_instructions = fields
        .iter()
        .enumerate()
        .map(|(i, field)| format!("{}. {field}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");

    let shape: serde_json::Map<String, Value> = fields
        .iter()
        .map(|f| (f.clone(), Value::String("...".to_string())))
        .collect();
    let json_format_example =
        serde_json::to_string(&Value::Object(shape)).unwrap_or_default();

    let mut prompt = format!(
        "Follow the below instructions and extract field(s) from the provided document. \
         If value is not present for a field then \"\" should be provided. If there are \
         more than 1 value for a field, give all the values as an array.\n\
         \n\
         Extract the following fields:\n\
         {field_instructions}\n\n"
    );

    if !ocr_text.is_empty() {
        prompt.push_str(&format!(
            "Following is the OCR text extracted from the document. It may contain missing \
             text, incorrect layout, or OCR errors. Use it as a reference alongside any \
             provided image:\n\
             ---BEGIN OCR TEXT---\n\
             {ocr_text}\n\
             ---END OCR TEXT---\n\n"
        ));
    }

    prompt.push_str(&format!(
        "The output should be formatted ONLY as a single flattened JSON object. Do not \
         give any additional explanation.\n\
         OUTPUT JSON FORMAT:\n\
         {json_format_example}"
    ));

    prompt
}

/// Parse the extraction response into a record covering every requested
/// field. Unparseable responses yield an all-`None` record rather than an
/// error; the reviewer stage will flag the damage.
fn parse_response(response: &str, fields: &[String]) -> ExtractionRecord {
    let mut record: ExtractionRecord = fields.iter().map(|f| (f.clone(), None)).collect();

    let Some(json_str) = parse::extract_json_object(response) else {
        tracing::warn!("No JSON object found in extraction response");
        return record;
    };
    let parsed: Value = match serde_json::from_str(&json_str) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Extraction JSON did not parse: {e}");
            return record;
        }
    };
    let Value::Object(map) = parsed else {
        tracing::warn!("Extraction response was not a JSON object");
        return record;
    };

    // Case-insensitive lookup: models like to re-case field names
    let lowered: HashMap<String, &Value> = map
        .iter()
        .map(|(k, v)| (k.trim().to_lowercase(), v))
        .collect();

    for field in fields {
        let value = map
            .get(field)
            .or_else(|| lowered.get(&field.trim().to_lowercase()).copied());
        if let Some(value) = value {
            record.insert(field.clone(), value_to_string(value));
        }
    }

    record
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        // Arrays/numbers come back verbatim as JSON text
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::MockLlm;

    fn extractor(mock: MockLlm) -> Extractor {
        Extractor::new(Box::new(mock), ModelConfig::default())
    }

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn extract_covers_every_requested_field() {
        let mock = MockLlm::success(r#"{"invoice_number": "INV-1", "date": "2025-05-01"}"#);
        let fields = fields(&["invoice_number", "date", "total"]);
        let record = extractor(mock)
            .extract(&fields, "INVOICE", None)
            .await
            .unwrap();

        let keys: Vec<&String> = record.keys().collect();
        let mut expected: Vec<&String> = fields.iter().collect();
        expected.sort();
        assert_eq!(keys, expected);
        assert_eq!(record["invoice_number"], Some("INV-1".to_string()));
        assert_eq!(record["total"], None);
    }

    #[tokio::test]
    async fn extract_matches_field_names_case_insensitively() {
        let mock = MockLlm::success(r#"{"Invoice Number": "INV-9"}"#);
        let fields = fields(&["invoice number"]);
        let record = extractor(mock)
            .extract(&fields, "INVOICE", None)
            .await
            .unwrap();
        assert_eq!(record["invoice number"], Some("INV-9".to_string()));
    }

    #[tokio::test]
    async fn extract_normalizes_null_and_empty_to_none() {
        let mock = MockLlm::success(r#"{"a": null, "b": "", "c": "value"}"#);
        let fields = fields(&["a", "b", "c"]);
        let record = extractor(mock)
            .extract(&fields, "text", None)
            .await
            .unwrap();
        assert_eq!(record["a"], None);
        assert_eq!(record["b"], None);
        assert_eq!(record["c"], Some("value".to_string()));
    }

    #[tokio::test]
    async fn extract_stringifies_array_values() {
        let mock = MockLlm::success(r#"{"line_items": ["Item A", "Item B"]}"#);
        let fields = fields(&["line_items"]);
        let record = extractor(mock)
            .extract(&fields, "text", None)
            .await
            .unwrap();
        assert_eq!(
            record["line_items"],
            Some(r#"["Item A","Item B"]"#.to_string())
        );
    }

    #[tokio::test]
    async fn extract_unparseable_response_yields_all_none() {
        let mock = MockLlm::success("I could not find anything useful.");
        let fields = fields(&["a", "b"]);
        let record = extractor(mock)
            .extract(&fields, "text", None)
            .await
            .unwrap();
        assert_eq!(record.len(), 2);
        assert!(record.values().all(|v| v.is_none()));
    }

    #[tokio::test]
    async fn extract_empty_field_list_yields_empty_record() {
        let mock = MockLlm::success("{}");
        let calls = mock.call_count_handle();
        let record = extractor(mock).extract(&[], "text", None).await.unwrap();
        assert!(record.is_empty());
        // No LLM call was made
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn extract_requires_some_document_input() {
        let mock = MockLlm::success("{}");
        let err = extractor(mock)
            .extract(&fields(&["a"]), "", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Input(_)));
    }

    #[tokio::test]
    async fn extract_prompt_numbers_fields_and_embeds_ocr() {
        let mock = MockLlm::success("{}");
        let requests = mock.requests_handle();
        extractor(mock)
            .extract(&fields(&["date", "total"]), "OCR BODY", None)
            .await
            .unwrap();
        let (prompt, _) = requests.lock().unwrap()[0].clone();
        assert!(prompt.contains("1. date"));
        assert!(prompt.contains("2. total"));
        assert!(prompt.contains("---BEGIN OCR TEXT---"));
        assert!(prompt.contains("OCR BODY"));
    }
}
