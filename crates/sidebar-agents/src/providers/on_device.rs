//! Adapter for a model that runs inside the host (browser built-in AI).
//!
//! The host exposes the model through [`OnDeviceRuntime`]; the adapter holds a
//! long-lived [`OnDeviceSession`] acquired during `initialize` and drops it
//! when the provider is replaced.

use super::{ChatMessage, LlmProvider, LlmRequest, LlmStream, ProviderReady};
use crate::summarize::Summarizer;
use async_trait::async_trait;
use futures::TryStreamExt;
use sidebar_common::{Error, Result};
use sidebar_config::{ProviderId, ResolvedProviderConfig};
use std::sync::Arc;
use tracing::{info, warn};

/// Whether the host can run the on-device model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Readily,
    /// Usable once the host finishes downloading the weights.
    AfterDownload,
    No,
}

#[async_trait]
pub trait OnDeviceRuntime: Send + Sync {
    async fn availability(&self) -> Result<Availability>;

    async fn create_session(&self, system_prompt: &str) -> Result<Box<dyn OnDeviceSession>>;

    /// `Ok(None)` when the host has no summarizer.
    async fn create_summarizer(&self) -> Result<Option<Arc<dyn Summarizer>>>;
}

pub trait OnDeviceSession: Send + Sync {
    /// Prompt with the replayed conversation; yields cumulative snapshots.
    fn prompt_streaming(&self, messages: &[ChatMessage]) -> LlmStream;
}

pub struct OnDeviceProvider {
    runtime: Option<Arc<dyn OnDeviceRuntime>>,
    config: ResolvedProviderConfig,
    system_prompt: String,
    session: Option<Box<dyn OnDeviceSession>>,
    summarizer: Option<Arc<dyn Summarizer>>,
}

impl OnDeviceProvider {
    pub fn new(
        runtime: Option<Arc<dyn OnDeviceRuntime>>,
        config: ResolvedProviderConfig,
        system_prompt: String,
    ) -> Self {
        Self {
            runtime,
            config,
            system_prompt,
            session: None,
            summarizer: None,
        }
    }
}

#[async_trait]
impl LlmProvider for OnDeviceProvider {
    fn provider_id(&self) -> ProviderId {
        ProviderId::OnDevice
    }

    fn display_name(&self) -> String {
        if self.config.model == ProviderId::OnDevice.default_model() {
            "Gemini Nano".to_string()
        } else {
            self.config.model.clone()
        }
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn initialize(&mut self) -> Result<ProviderReady> {
        let runtime = self.runtime.clone().ok_or_else(|| {
            Error::CapabilityUnavailable("built-in AI is not available in this host".to_string())
        })?;

        let mut ready = ProviderReady::default();
        match runtime.availability().await? {
            Availability::No => {
                return Err(Error::CapabilityUnavailable(
                    "AI model is not available on this device".to_string(),
                ));
            }
            Availability::AfterDownload => {
                ready.notice = Some("Downloading AI model... This may take a while.".to_string());
            }
            Availability::Readily => {}
        }

        self.session = Some(runtime.create_session(&self.system_prompt).await?);
        self.summarizer = match runtime.create_summarizer().await {
            Ok(summarizer) => summarizer,
            Err(e) => {
                warn!("summarizer unavailable, continuing without it: {}", e);
                None
            }
        };
        info!(
            summarizer = self.summarizer.is_some(),
            "on-device session created"
        );
        Ok(ready)
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmStream> {
        let session = self.session.as_ref().ok_or_else(|| {
            Error::CapabilityUnavailable("on-device session is not initialized".to_string())
        })?;
        let stream = session
            .prompt_streaming(&request.messages)
            .map_ok(|snapshot| snapshot.trim().to_string());
        Ok(Box::pin(stream))
    }

    fn summarizer(&self) -> Option<Arc<dyn Summarizer>> {
        self.summarizer.clone()
    }
}
