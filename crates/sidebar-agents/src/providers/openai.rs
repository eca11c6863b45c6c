use super::http::{apply_auth, check_credential, send_json};
use super::{ChatRole, LlmProvider, LlmRequest, LlmStream, ProviderReady, Timeouts, single_snapshot};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use sidebar_common::{Error, Result};
use sidebar_config::{ProviderId, ResolvedProviderConfig};
use std::time::Duration;
use tracing::{debug, info};

/// OpenAI chat completions (`choices[].message` response shape).
#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    config: ResolvedProviderConfig,
    timeouts: Timeouts,
}

impl OpenAiProvider {
    pub fn new(client: Client, config: ResolvedProviderConfig, timeouts: Timeouts) -> Self {
        Self {
            client,
            config,
            timeouts,
        }
    }

    fn convert_request(&self, request: &LlmRequest) -> OpenAiRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);

        if let Some(system_prompt) = &request.system {
            messages.push(OpenAiMessage {
                role: "system",
                content: system_prompt.clone(),
            });
        }

        messages.extend(request.messages.iter().map(|msg| OpenAiMessage {
            role: match msg.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            },
            content: msg.content.clone(),
        }));

        OpenAiRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: false,
        }
    }

    async fn send(&self, request: &LlmRequest, budget: Duration) -> Result<Value> {
        let url = format!("{}/chat/completions", self.config.endpoint);
        debug!(%url, model = %self.config.model, "sending OpenAI request");

        let builder = self.client.post(&url).json(&self.convert_request(request));
        let builder = apply_auth(builder, &self.config, None)?;
        send_json(builder, budget, "OpenAI").await
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn provider_id(&self) -> ProviderId {
        ProviderId::OpenAi
    }

    fn display_name(&self) -> String {
        format!("{} (OpenAI)", self.config.model)
    }

    async fn initialize(&mut self) -> Result<ProviderReady> {
        check_credential(&self.config)?;
        info!(model = %self.config.model, "probing OpenAI");
        self.send(&LlmRequest::probe(), self.timeouts.probe).await?;
        Ok(ProviderReady::default())
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmStream> {
        let response = self.send(request, self.timeouts.completion).await?;
        Ok(single_snapshot(parse_response(&response)?))
    }
}

fn parse_response(response: &Value) -> Result<String> {
    let choice = response
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .ok_or_else(|| Error::MalformedResponse("OpenAI response has no choices".to_string()))?;

    let content = choice
        .pointer("/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            Error::MalformedResponse("OpenAI choice is missing message.content".to_string())
        })?;

    if content.trim().is_empty() {
        return Err(Error::MalformedResponse(
            "OpenAI returned empty content".to_string(),
        ));
    }
    Ok(content.to_string())
}

// Request Types
#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    stream: bool,
}

#[derive(Serialize)]
struct OpenAiMessage {
    role: &'static str,
    content: String,
}
