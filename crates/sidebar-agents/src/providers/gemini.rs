use super::http::{apply_auth, check_credential, join_text_parts, send_json};
use super::{ChatRole, LlmProvider, LlmRequest, LlmStream, ProviderReady, Timeouts, single_snapshot};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use sidebar_common::{Error, Result};
use sidebar_config::{ProviderId, ResolvedProviderConfig};
use std::time::Duration;
use tracing::{debug, info};

/// Google Generative Language API (`candidates[].content.parts[]` response shape).
#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    config: ResolvedProviderConfig,
    timeouts: Timeouts,
}

impl GeminiProvider {
    pub fn new(client: Client, config: ResolvedProviderConfig, timeouts: Timeouts) -> Self {
        Self {
            client,
            config,
            timeouts,
        }
    }

    fn convert_request(&self, request: &LlmRequest) -> GeminiRequest {
        let contents = request
            .messages
            .iter()
            .map(|msg| GeminiContent {
                role: match msg.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "model",
                },
                parts: vec![GeminiPart {
                    text: msg.content.clone(),
                }],
            })
            .collect();

        GeminiRequest {
            contents,
            system_instruction: request.system.as_ref().map(|system| GeminiSystemInstruction {
                parts: vec![GeminiPart {
                    text: system.clone(),
                }],
            }),
            generation_config: GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        }
    }

    async fn send(&self, request: &LlmRequest, budget: Duration) -> Result<Value> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.endpoint, self.config.model
        );
        debug!(%url, "sending Gemini request");

        let builder = self.client.post(&url).json(&self.convert_request(request));
        let builder = apply_auth(builder, &self.config, Some("x-goog-api-key"))?;
        send_json(builder, budget, "Gemini").await
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn provider_id(&self) -> ProviderId {
        ProviderId::Gemini
    }

    fn display_name(&self) -> String {
        format!("{} (Gemini)", self.config.model)
    }

    async fn initialize(&mut self) -> Result<ProviderReady> {
        check_credential(&self.config)?;
        info!(model = %self.config.model, "probing Gemini");
        self.send(&LlmRequest::probe(), self.timeouts.probe).await?;
        Ok(ProviderReady::default())
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmStream> {
        let response = self.send(request, self.timeouts.completion).await?;
        Ok(single_snapshot(parse_response(&response)?))
    }
}

fn parse_response(response: &Value) -> Result<String> {
    let candidate = response
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .ok_or_else(|| {
            let reason = response
                .pointer("/promptFeedback/blockReason")
                .and_then(Value::as_str)
                .map(|r| format!(" (blocked: {r})"))
                .unwrap_or_default();
            Error::MalformedResponse(format!("Gemini response has no candidates{reason}"))
        })?;

    let parts = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            Error::MalformedResponse("Gemini candidate is missing content.parts".to_string())
        })?;

    join_text_parts(parts.iter(), "text")
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| Error::MalformedResponse("Gemini candidate has no text parts".to_string()))
}

// Request Types
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}
