use super::http::{apply_auth, send_json};
use super::{ChatRole, LlmProvider, LlmRequest, LlmStream, ProviderReady, Timeouts, single_snapshot};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use sidebar_common::{Error, Result};
use sidebar_config::{ProviderId, ResolvedProviderConfig};
use std::time::Duration;
use tracing::{debug, info};

/// Local Ollama server, `/api/chat` with streaming disabled.
#[derive(Clone)]
pub struct OllamaProvider {
    client: Client,
    config: ResolvedProviderConfig,
    timeouts: Timeouts,
}

impl OllamaProvider {
    pub fn new(client: Client, config: ResolvedProviderConfig, timeouts: Timeouts) -> Self {
        Self {
            client,
            config,
            timeouts,
        }
    }

    fn build_request_body(&self, request: &LlmRequest) -> Value {
        let mut messages: Vec<Value> = Vec::with_capacity(request.messages.len() + 1);

        if let Some(system) = &request.system {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }

        messages.extend(request.messages.iter().map(|msg| {
            serde_json::json!({
                "role": match msg.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                },
                "content": msg.content,
            })
        }));

        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "stream": false,
        });

        let mut options = serde_json::Map::new();
        if let Some(temp) = request.temperature {
            options.insert("temperature".to_string(), serde_json::json!(temp));
        }
        if let Some(max_tokens) = request.max_tokens {
            options.insert("num_predict".to_string(), serde_json::json!(max_tokens));
        }
        if !options.is_empty() {
            body["options"] = Value::Object(options);
        }

        body
    }

    async fn send(&self, request: &LlmRequest, budget: Duration) -> Result<Value> {
        let url = format!("{}/api/chat", self.config.endpoint);
        debug!(%url, model = %self.config.model, "sending Ollama request");

        let builder = self.client.post(&url).json(&self.build_request_body(request));
        let builder = apply_auth(builder, &self.config, None)?;
        send_json(builder, budget, "Ollama").await
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn provider_id(&self) -> ProviderId {
        ProviderId::Ollama
    }

    fn display_name(&self) -> String {
        format!("{} (Ollama)", self.config.model)
    }

    async fn initialize(&mut self) -> Result<ProviderReady> {
        info!(endpoint = %self.config.endpoint, model = %self.config.model, "probing Ollama");
        self.send(&LlmRequest::probe(), self.timeouts.probe).await?;
        Ok(ProviderReady::default())
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmStream> {
        let response = self.send(request, self.timeouts.completion).await?;
        Ok(single_snapshot(parse_response(&response)?))
    }
}

fn parse_response(response: &Value) -> Result<String> {
    let content = response
        .pointer("/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            Error::MalformedResponse("Ollama response is missing message.content".to_string())
        })?;

    if content.trim().is_empty() {
        return Err(Error::MalformedResponse(
            "Ollama returned empty content".to_string(),
        ));
    }
    Ok(content.to_string())
}
