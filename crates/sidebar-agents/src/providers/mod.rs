use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use sidebar_common::{Result, Turn, TurnRole};
use sidebar_config::{ProviderId, TimeoutSettings};
use std::sync::Arc;
use std::time::Duration;

use crate::summarize::Summarizer;

pub mod anthropic;
pub mod factory;
pub mod gemini;
mod http;
pub mod ollama;
pub mod on_device;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use factory::{DefaultProviderFactory, ProviderFactory};
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use on_device::{Availability, OnDeviceProvider, OnDeviceRuntime, OnDeviceSession};
pub use openai::OpenAiProvider;

/// Trait for chat backends (on-device, Ollama, Gemini, OpenAI, Anthropic).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn provider_id(&self) -> ProviderId;

    /// Name shown for the active model, e.g. "gpt-4o-mini (OpenAI)".
    fn display_name(&self) -> String;

    /// Whether `complete` yields more than one snapshot. Intermediate
    /// snapshots reach the UI only from streaming backends.
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Validate credentials, endpoint and model with a trivial prompt before
    /// the provider is accepted as active.
    async fn initialize(&mut self) -> Result<ProviderReady>;

    /// Run one completion. Every item of the stream is the full reply so far;
    /// single-shot backends yield exactly one item.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmStream>;

    /// Dedicated summarization capability, if the backend has one.
    fn summarizer(&self) -> Option<Arc<dyn Summarizer>> {
        None
    }
}

/// Stream of cumulative-text snapshots.
pub type LlmStream = BoxStream<'static, Result<String>>;

/// Wrap a completed reply as a one-snapshot stream.
pub fn single_snapshot(text: String) -> LlmStream {
    stream::once(async move { Ok(text) }).boxed()
}

/// Outcome of a successful `initialize`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderReady {
    /// Informational status to surface, e.g. a pending model download.
    pub notice: Option<String>,
}

/// Wall-clock budgets for REST calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub probe: Duration,
    pub completion: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::from(&TimeoutSettings::default())
    }
}

impl From<&TimeoutSettings> for Timeouts {
    fn from(settings: &TimeoutSettings) -> Self {
        Self {
            probe: settings.probe(),
            completion: settings.completion(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmRequest {
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

impl LlmRequest {
    /// Replay `transcript` and append `prompt` as the new user message.
    pub fn for_turn(transcript: &[Turn], prompt: String) -> Self {
        let mut messages: Vec<ChatMessage> = transcript.iter().map(ChatMessage::from).collect();
        messages.push(ChatMessage::user(prompt));
        Self {
            system: None,
            messages,
            max_tokens: None,
            temperature: None,
        }
    }

    /// The trivial prompt used to probe a backend.
    pub fn probe() -> Self {
        Self {
            system: None,
            messages: vec![ChatMessage::user("Hello")],
            max_tokens: Some(8),
            temperature: Some(0.0),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        let system = system.into();
        self.system = (!system.trim().is_empty()).then_some(system);
        self
    }

    pub fn with_generation(mut self, temperature: f64, max_tokens: u32) -> Self {
        self.temperature = Some(temperature);
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: match turn.role {
                TurnRole::User => ChatRole::User,
                TurnRole::Assistant => ChatRole::Assistant,
            },
            content: turn.text.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}
