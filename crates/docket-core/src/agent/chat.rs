//! Tool-calling chat transport for the agent.
//!
//! Wraps the OpenAI-compatible chat-completions wire format with tool
//! definitions. The transport is a trait so the loop can be driven by a
//! scripted endpoint in tests.

use crate::config::ModelConfig;
use crate::error::PipelineError;
use crate::llm::provider::resolve_env_var;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One transcript message in the agent conversation.
#[derive(Debug, Clone, Serialize)]
pub struct AgentMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl AgentMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// The assistant turn that requested the given tool calls.
    pub fn assistant_tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: None,
            tool_calls: Some(calls.into_iter().map(WireToolCall::from).collect()),
            tool_call_id: None,
        }
    }

    /// A tool result message answering the call with the given id.
    pub fn tool_result(call_id: &str, content: String) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content),
            tool_calls: None,
            tool_call_id: Some(call_id.to_string()),
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    /// JSON-encoded arguments, exactly as the model produced them
    pub arguments: String,
}

/// A tool offered to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionSpec,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolSpec {
    pub fn function(
        name: &str,
        description: &str,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            kind: "function".to_string(),
            function: FunctionSpec {
                name: name.to_string(),
                description: description.to_string(),
                parameters,
            },
        }
    }
}

/// One assistant turn: either a final text answer or tool calls.
#[derive(Debug, Clone)]
pub struct AssistantTurn {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl AssistantTurn {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tools(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: None,
            tool_calls,
        }
    }
}

/// Chat transport the agent loop drives.
#[async_trait]
pub trait ToolChat: Send + Sync {
    async fn chat(
        &self,
        messages: &[AgentMessage],
        tools: &[ToolSpec],
    ) -> Result<AssistantTurn, PipelineError>;
}

// --- Wire types ---

#[derive(Serialize)]
struct ToolChatRequest<'a> {
    model: &'a str,
    messages: &'a [AgentMessage],
    tools: &'a [ToolSpec],
    tool_choice: &'a str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: WireFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFunctionCall {
    pub name: String,
    pub arguments: String,
}

impl From<ToolCallRequest> for WireToolCall {
    fn from(call: ToolCallRequest) -> Self {
        Self {
            id: call.id,
            kind: "function".to_string(),
            function: WireFunctionCall {
                name: call.name,
                arguments: call.arguments,
            },
        }
    }
}

#[derive(Deserialize)]
struct ToolChatResponse {
    choices: Vec<ToolChoice>,
}

#[derive(Deserialize)]
struct ToolChoice {
    message: ToolChoiceMessage,
}

#[derive(Deserialize)]
struct ToolChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

/// OpenAI-compatible tool-calling transport.
pub struct OpenAiToolChat {
    api_key: String,
    model: String,
    client: reqwest::Client,
    endpoint: String,
    max_tokens: u32,
    temperature: f32,
    timeout_secs: u64,
}

impl OpenAiToolChat {
    pub fn new(model: &ModelConfig) -> Result<Self, PipelineError> {
        let api_key = resolve_env_var(&model.api_key).ok_or_else(|| PipelineError::Llm {
            message: format!(
                "API key for agent model {} not set (is {} exported?)",
                model.model, model.api_key
            ),
            status_code: None,
        })?;
        Ok(Self {
            api_key,
            model: model.model.clone(),
            client: reqwest::Client::new(),
            endpoint: format!(
                "{}/chat/completions",
                model.base_url.trim_end_matches('/')
            ),
            max_tokens: model.max_tokens,
            temperature: model.temperature,
            timeout_secs: model.timeout_secs,
        })
    }
}

#[async_trait]
impl ToolChat for OpenAiToolChat {
    async fn chat(
        &self,
        messages: &[AgentMessage],
        tools: &[ToolSpec],
    ) -> Result<AssistantTurn, PipelineError> {
        let body = ToolChatRequest {
            model: &self.model,
            messages,
            tools,
            tool_choice: "auto",
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .timeout(Duration::from_secs(self.timeout_secs))
            .send()
            .await
            .map_err(|e| PipelineError::Llm {
                message: format!("Agent chat request failed: {e}"),
                status_code: None,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Llm {
                message: format!("Agent chat HTTP {status}: {text}"),
                status_code: Some(status.as_u16()),
            });
        }

        let chat_resp: ToolChatResponse = resp.json().await.map_err(|e| PipelineError::Llm {
            message: format!("Failed to parse agent chat response: {e}"),
            status_code: None,
        })?;

        let message = chat_resp
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| PipelineError::Llm {
                message: "Agent endpoint returned empty choices array".to_string(),
                status_code: None,
            })?;

        Ok(AssistantTurn {
            content: message.content,
            tool_calls: message
                .tool_calls
                .into_iter()
                .map(|c| ToolCallRequest {
                    id: c.id,
                    name: c.function.name,
                    arguments: c.function.arguments,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_result_message_carries_call_id() {
        let msg = AgentMessage::tool_result("call-1", "{\"ok\": true}".to_string());
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"role\":\"tool\""));
        assert!(json.contains("\"tool_call_id\":\"call-1\""));
        // Absent fields are skipped entirely
        assert!(!json.contains("tool_calls"));
    }

    #[test]
    fn assistant_tool_call_message_serializes_function_shape() {
        let msg = AgentMessage::assistant_tool_calls(vec![ToolCallRequest {
            id: "call-9".to_string(),
            name: "extractor_ai".to_string(),
            arguments: "{}".to_string(),
        }]);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"function\""));
        assert!(json.contains("\"name\":\"extractor_ai\""));
        assert!(!json.contains("\"content\""));
    }

    #[test]
    fn response_message_parses_tool_calls() {
        let json = r#"{
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "abc",
                        "type": "function",
                        "function": {"name": "reviewer_ai", "arguments": "{\"x\": 1}"}
                    }]
                }
            }]
        }"#;
        let resp: ToolChatResponse = serde_json::from_str(json).unwrap();
        let message = &resp.choices[0].message;
        assert!(message.content.is_none());
        assert_eq!(message.tool_calls[0].function.name, "reviewer_ai");
    }

    #[test]
    fn tool_spec_serializes_parameters_schema() {
        let spec = ToolSpec::function(
            "extractor_ai",
            "extracts fields",
            serde_json::json!({"type": "object"}),
        );
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains("\"type\":\"function\""));
        assert!(json.contains("\"parameters\":{\"type\":\"object\"}"));
    }
}
