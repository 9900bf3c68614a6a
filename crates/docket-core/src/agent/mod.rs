//! Agentic orchestrator: an LLM decides the extract/review call order.
//!
//! The agent is handed two tools (`extractor_ai` and `reviewer_ai`)
//! and a system instruction describing the two-stage workflow. Control
//! flow belongs to the model; the loop only executes requested tool
//! calls, appends their results, and stops at a final answer or the step
//! bound. The records returned come from the tool executions themselves,
//! so the outcome is well-formed even when the model's closing summary
//! is not.

mod chat;

pub use chat::{AgentMessage, AssistantTurn, OpenAiToolChat, ToolCallRequest, ToolChat, ToolSpec};

use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::llm::ImageInput;
use crate::pipeline::{Extractor, Reviewer};
use crate::types::{ExtractionRecord, ReviewRecord};
use serde_json::Value;

const SYSTEM_INSTRUCTION: &str = "You are a Document AI Agent. Your goal is to extract \
information from a document and have it reviewed. The user provides the document's OCR \
text and a list of fields to extract (as a JSON string array). The document image is \
already available to the tools.\n\
Follow these steps:\n\
0. Decide which stage this turn is in: extraction or review. If it is the first turn, \
it is the extraction stage. If there is extracted JSON output from the previous turn, it \
is the review stage. Only call one tool at a time.\n\
1. In the extraction stage, call the `extractor_ai` tool, passing `fields_to_extract` as \
a JSON string array, e.g. '[\"field1\", \"field2\"]'.\n\
2. In the review stage, call the `reviewer_ai` tool, passing the JSON output of \
`extractor_ai` as `extracted_json_str`.\n\
3. Finally, combine the extracted data and the review results into the final output:\n\
FINAL_OUTPUT_JSON: { key: { value: <>, status: PASS/FAIL } }\n\
Present the final JSON to the user. Do not print anything else after the \
FINAL_OUTPUT_JSON.";

/// Limits for the agent loop.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Max chain length, prevents infinite tool loops
    pub max_steps: usize,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self { max_steps: 8 }
    }
}

/// Result of an agent run: the records produced by the tools.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub extraction: ExtractionRecord,
    pub review: ReviewRecord,
    /// Number of model turns consumed
    pub steps: usize,
}

/// The agentic document orchestrator.
pub struct DocumentAgent {
    chat: Box<dyn ToolChat>,
    extractor: Extractor,
    reviewer: Reviewer,
    options: AgentOptions,
}

impl DocumentAgent {
    pub fn new(
        chat: Box<dyn ToolChat>,
        extractor: Extractor,
        reviewer: Reviewer,
        options: AgentOptions,
    ) -> Self {
        Self {
            chat,
            extractor,
            reviewer,
            options,
        }
    }

    /// Build the agent wired in config. The agent stage must point at an
    /// OpenAI-compatible model (tool calls ride that wire format).
    pub fn from_config(config: &Config) -> PipelineResult<Self> {
        let model = config
            .model_for_stage("agent")
            .map_err(|e| PipelineError::Llm {
                message: e.to_string(),
                status_code: None,
            })?;
        if model.provider != "openai" {
            return Err(PipelineError::Llm {
                message: format!(
                    "agent stage requires an openai-compatible model, got provider \"{}\"",
                    model.provider
                ),
                status_code: None,
            });
        }
        Ok(Self::new(
            Box::new(OpenAiToolChat::new(model)?),
            Extractor::from_config(config)?,
            Reviewer::from_config(config)?,
            AgentOptions::default(),
        ))
    }

    /// Run the agent over a document until both tools have produced
    /// records and the model emits its final output (or the step bound
    /// is reached with both records in hand).
    pub async fn run(
        &self,
        fields: &[String],
        ocr_text: &str,
        image: Option<&ImageInput>,
    ) -> PipelineResult<AgentOutcome> {
        if fields.is_empty() {
            return Err(PipelineError::Input(
                "the agent needs at least one field to extract".to_string(),
            ));
        }

        let fields_json = serde_json::to_string(fields).unwrap_or_default();
        let mut messages = vec![
            AgentMessage::system(SYSTEM_INSTRUCTION),
            AgentMessage::user(format!(
                "Extract the fields {fields_json} from the document and review the result.\n\
                 ---BEGIN OCR TEXT---\n\
                 {ocr_text}\n\
                 ---END OCR TEXT---"
            )),
        ];
        let tools = tool_specs();

        let mut extraction: Option<ExtractionRecord> = None;
        let mut review: Option<ReviewRecord> = None;
        let mut steps = 0;

        while steps < self.options.max_steps {
            steps += 1;
            let turn = self.chat.chat(&messages, &tools).await?;

            if turn.tool_calls.is_empty() {
                let content = turn.content.unwrap_or_default();
                tracing::debug!("Agent final answer after {steps} step(s)");
                if let Some(final_json) = parse_final_output(&content) {
                    tracing::debug!("Agent reported {} field(s) in final output", final_json.len());
                } else {
                    tracing::warn!("Agent final answer carried no FINAL_OUTPUT_JSON block");
                }
                break;
            }

            messages.push(AgentMessage::assistant_tool_calls(turn.tool_calls.clone()));
            for call in &turn.tool_calls {
                tracing::info!("Agent invoked tool {}", call.name);
                let result = self
                    .execute_tool(call, fields, ocr_text, image, &mut extraction, &mut review)
                    .await;
                messages.push(AgentMessage::tool_result(&call.id, result));
            }
        }

        match (extraction, review) {
            (Some(extraction), Some(review)) => Ok(AgentOutcome {
                extraction,
                review,
                steps,
            }),
            (extraction, review) => Err(PipelineError::Llm {
                message: format!(
                    "agent stopped after {steps} step(s) without completing the workflow \
                     (extractor ran: {}, reviewer ran: {})",
                    extraction.is_some(),
                    review.is_some()
                ),
                status_code: None,
            }),
        }
    }

    /// Execute one tool call and return its JSON result string for the
    /// transcript. Tool errors are reported back to the model rather than
    /// aborting the loop; it may recover by retrying with fixed
    /// arguments.
    async fn execute_tool(
        &self,
        call: &ToolCallRequest,
        fields: &[String],
        ocr_text: &str,
        image: Option<&ImageInput>,
        extraction: &mut Option<ExtractionRecord>,
        review: &mut Option<ReviewRecord>,
    ) -> String {
        match call.name.as_str() {
            "extractor_ai" => {
                let requested = parse_fields_argument(&call.arguments)
                    .unwrap_or_else(|| fields.to_vec());
                match self.extractor.extract(&requested, ocr_text, image).await {
                    Ok(record) => {
                        let json = serde_json::to_string(&record).unwrap_or_default();
                        *extraction = Some(record);
                        json
                    }
                    Err(e) => tool_error(&format!("extraction failed: {e}")),
                }
            }
            "reviewer_ai" => {
                let target = parse_extracted_argument(&call.arguments)
                    .or_else(|| extraction.clone())
                    .unwrap_or_default();
                if target.is_empty() {
                    return tool_error("no extracted data available to review");
                }
                match self.reviewer.review(&target, ocr_text, image).await {
                    Ok(record) => {
                        let json = serde_json::to_string(&record).unwrap_or_default();
                        *review = Some(record);
                        json
                    }
                    Err(e) => tool_error(&format!("review failed: {e}")),
                }
            }
            other => tool_error(&format!("unknown tool: {other}")),
        }
    }
}

fn tool_error(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}

/// Tool schemas offered to the model.
fn tool_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec::function(
            "extractor_ai",
            "Extracts key-value pairs from the document. The 'fields_to_extract' \
             should be a JSON string array, e.g., '[\"field1\", \"field2\"]'.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "fields_to_extract": {
                        "type": "string",
                        "description": "A JSON string array of fields to extract. Example: \"[\\\"invoice_number\\\", \\\"total_amount\\\"]\""
                    }
                },
                "required": ["fields_to_extract"]
            }),
        ),
        ToolSpec::function(
            "reviewer_ai",
            "Reviews the extracted JSON data against the document and returns a \
             review status for each field.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "extracted_json_str": {
                        "type": "string",
                        "description": "The JSON string of data extracted by the extractor_ai tool."
                    }
                },
                "required": ["extracted_json_str"]
            }),
        ),
    ]
}

/// Parse the `fields_to_extract` tool argument: a JSON object whose value
/// is itself a JSON-encoded string array.
fn parse_fields_argument(arguments: &str) -> Option<Vec<String>> {
    let args: Value = serde_json::from_str(arguments).ok()?;
    let raw = args.get("fields_to_extract")?.as_str()?;
    let fields: Vec<String> = serde_json::from_str(raw).ok()?;
    (!fields.is_empty()).then_some(fields)
}

/// Parse the `extracted_json_str` tool argument into an extraction record.
fn parse_extracted_argument(arguments: &str) -> Option<ExtractionRecord> {
    let args: Value = serde_json::from_str(arguments).ok()?;
    let raw = args.get("extracted_json_str")?.as_str()?;
    serde_json::from_str(raw).ok()
}

/// Pull the JSON object out of a `FINAL_OUTPUT_JSON: {...}` closing line.
fn parse_final_output(content: &str) -> Option<serde_json::Map<String, Value>> {
    let tail = content.split("FINAL_OUTPUT_JSON").nth(1)?;
    let json = crate::pipeline::parse::extract_json_object(tail)?;
    match serde_json::from_str(&json).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
