pub mod context;
pub mod engine;
pub mod providers;
pub mod summarize;

pub use context::{ActiveTab, ContextCache, PageContextResolver, PageExtractor};
pub use engine::{ConversationEngine, EngineEvent, EngineState, Severity, TurnOutcome};
pub use providers::{
    AnthropicProvider, Availability, ChatMessage, ChatRole, DefaultProviderFactory,
    GeminiProvider, LlmProvider, LlmRequest, LlmStream, OllamaProvider, OnDeviceProvider,
    OnDeviceRuntime, OnDeviceSession, OpenAiProvider, ProviderFactory, ProviderReady, Timeouts,
};
pub use summarize::{Route, SummarizationRouter, Summarizer};
