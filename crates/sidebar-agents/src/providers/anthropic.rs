use super::http::{apply_auth, check_credential, join_text_parts, send_json};
use super::{ChatRole, LlmProvider, LlmRequest, LlmStream, ProviderReady, Timeouts, single_snapshot};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use sidebar_common::{Error, Result};
use sidebar_config::{ProviderId, ResolvedProviderConfig};
use std::time::Duration;
use tracing::{debug, info};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Anthropic Messages API (`content[]` block response shape).
#[derive(Clone)]
pub struct AnthropicProvider {
    client: Client,
    config: ResolvedProviderConfig,
    timeouts: Timeouts,
}

impl AnthropicProvider {
    pub fn new(client: Client, config: ResolvedProviderConfig, timeouts: Timeouts) -> Self {
        Self {
            client,
            config,
            timeouts,
        }
    }

    fn create_request_body(&self, request: &LlmRequest) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|msg| {
                json!({
                    "role": match msg.role {
                        ChatRole::User => "user",
                        ChatRole::Assistant => "assistant",
                    },
                    "content": msg.content,
                })
            })
            .collect();

        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        });

        if let Some(system) = &request.system {
            body["system"] = json!(system);
        }

        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }

        body
    }

    async fn send(&self, request: &LlmRequest, budget: Duration) -> Result<Value> {
        let url = format!("{}/v1/messages", self.config.endpoint);
        debug!(%url, model = %self.config.model, "sending Anthropic request");

        let builder = self
            .client
            .post(&url)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.create_request_body(request));
        let builder = apply_auth(builder, &self.config, Some("x-api-key"))?;
        send_json(builder, budget, "Anthropic").await
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn provider_id(&self) -> ProviderId {
        ProviderId::Anthropic
    }

    fn display_name(&self) -> String {
        format!("{} (Anthropic)", self.config.model)
    }

    async fn initialize(&mut self) -> Result<ProviderReady> {
        check_credential(&self.config)?;
        info!(model = %self.config.model, "probing Anthropic");
        self.send(&LlmRequest::probe(), self.timeouts.probe).await?;
        Ok(ProviderReady::default())
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmStream> {
        let response = self.send(request, self.timeouts.completion).await?;
        Ok(single_snapshot(parse_response(&response)?))
    }
}

fn parse_response(response: &Value) -> Result<String> {
    let blocks = response["content"]
        .as_array()
        .ok_or_else(|| Error::MalformedResponse("Anthropic response is missing content".to_string()))?;

    let text_blocks = blocks
        .iter()
        .filter(|block| block["type"].as_str() == Some("text"));

    join_text_parts(text_blocks, "text")
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| {
            Error::MalformedResponse("Anthropic response has no text content block".to_string())
        })
}
