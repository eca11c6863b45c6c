use super::{
    AnthropicProvider, GeminiProvider, LlmProvider, OllamaProvider, OnDeviceProvider,
    OnDeviceRuntime, OpenAiProvider, Timeouts,
};
use reqwest::Client;
use sidebar_common::Result;
use sidebar_config::{ProviderId, Settings};
use std::sync::Arc;
use tracing::debug;

/// Builds the adapter for the active provider of a settings snapshot.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, settings: &Settings) -> Result<Box<dyn LlmProvider>>;
}

/// Maps each [`ProviderId`] to its adapter, sharing one HTTP client.
#[derive(Clone, Default)]
pub struct DefaultProviderFactory {
    client: Client,
    on_device: Option<Arc<dyn OnDeviceRuntime>>,
}

impl DefaultProviderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Register the host's built-in model runtime.
    pub fn with_on_device_runtime(mut self, runtime: Arc<dyn OnDeviceRuntime>) -> Self {
        self.on_device = Some(runtime);
        self
    }
}

impl ProviderFactory for DefaultProviderFactory {
    fn create(&self, settings: &Settings) -> Result<Box<dyn LlmProvider>> {
        let config = settings.active_config();
        let timeouts = Timeouts::from(&settings.timeouts);
        debug!(provider = %config.id, model = %config.model, "creating provider");

        let provider: Box<dyn LlmProvider> = match config.id {
            ProviderId::OnDevice => Box::new(OnDeviceProvider::new(
                self.on_device.clone(),
                config,
                settings.generation.system_prompt.clone(),
            )),
            ProviderId::Ollama => Box::new(OllamaProvider::new(self.client.clone(), config, timeouts)),
            ProviderId::Gemini => Box::new(GeminiProvider::new(self.client.clone(), config, timeouts)),
            ProviderId::OpenAi => Box::new(OpenAiProvider::new(self.client.clone(), config, timeouts)),
            ProviderId::Anthropic => {
                Box::new(AnthropicProvider::new(self.client.clone(), config, timeouts))
            }
        };
        Ok(provider)
    }
}
