//! OpenAI-backed scheduling model.
//!
//! One chat-completion call per invocation, with a bounded timeout. The
//! reply is expected to be a single JSON object; code fences are stripped
//! defensively before parsing, and anything that still is not JSON surfaces
//! as a schema violation for the caller to handle.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use dayplan_core::context::ModelContext;
use dayplan_core::error::{PlanError, PlanResult};
use dayplan_core::model::ScheduleModel;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4.1";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_TOKENS: u32 = 1500;
const TEMPERATURE: f32 = 0.2;

const SYSTEM_MESSAGE: &str = "You are a strict JSON scheduling engine. You read a calendar context \
and a description of the user's day and reply ONLY with a single JSON object, with no markdown, \
no backticks, and no extra text. Every event must carry a summary and RFC3339 start and end times.";

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: String,
}

pub struct OpenAiModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout_secs: u64,
}

impl OpenAiModel {
    pub fn new(api_key: impl Into<String>) -> PlanResult<Self> {
        Self::with_options(api_key, DEFAULT_MODEL, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS)
    }

    /// Fails if the HTTP client cannot be built; a client without the
    /// request timeout must never be handed out.
    pub fn with_options(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout_secs: u64,
    ) -> PlanResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PlanError::Upstream(format!("failed to build HTTP client: {e}")))?;
        Ok(OpenAiModel {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
            timeout_secs,
        })
    }
}

#[async_trait]
impl ScheduleModel for OpenAiModel {
    async fn generate(&self, context: &ModelContext) -> PlanResult<Value> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_MESSAGE.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: context.prompt.clone(),
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;
        if !status.is_success() {
            tracing::warn!(%status, "model request rejected");
            return Err(PlanError::Upstream(format!(
                "model API returned {status}: {text}"
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| PlanError::Upstream(format!("malformed model API response: {e}")))?;
        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| PlanError::Upstream("model API returned no choices".to_string()))?;

        parse_reply(content)
    }
}

impl OpenAiModel {
    fn transport_error(&self, err: reqwest::Error) -> PlanError {
        if err.is_timeout() {
            PlanError::UpstreamTimeout(self.timeout_secs)
        } else {
            PlanError::Upstream(format!("model request failed: {err}"))
        }
    }
}

/// Parse the model's reply content into JSON, tolerating markdown fences
/// the model was told not to emit.
fn parse_reply(content: &str) -> PlanResult<Value> {
    let stripped = strip_code_fences(content);
    serde_json::from_str(stripped)
        .map_err(|e| PlanError::SchemaViolation(format!("model reply is not JSON: {e}")))
}

fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the fence line (possibly "```json") and the closing fence.
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or(rest);
    body.trim().trim_end_matches("```").trim()
}
