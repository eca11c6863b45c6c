use futures::StreamExt;
use sidebar_common::{Error, PageContext, Result, Turn, TurnRole};
use sidebar_config::{ProviderConfig, ProviderId, Settings};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::context::{PageContextResolver, compose_prompt, truncate_chars};
use crate::providers::{LlmProvider, LlmRequest, ProviderFactory, ProviderReady};
use crate::summarize::{Route, SummarizationRouter, Summarizer, display_summary};

const UNAVAILABLE_MODEL_NAME: &str = "Unavailable";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Ready,
    AwaitingResponse,
    /// Initialization failed; only a new `initialize` can recover.
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Notifications for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    UserTurn {
        turn_id: String,
        text: String,
        context_title: Option<String>,
    },
    /// Latest full text of the reply being produced.
    AssistantUpdated { turn_id: String, text: String },
    AssistantCompleted { turn_id: String, text: String },
    Status { message: String, severity: Severity },
    Error { message: String },
}

#[derive(Debug)]
pub enum TurnOutcome {
    /// Not ready, or the text was empty. Nothing changed.
    Rejected,
    Completed { text: String, summarized: bool },
    /// The turn failed; the engine is ready for the next one.
    Failed(Error),
}

struct TurnReply {
    text: String,
    summarized: bool,
}

/// Owns the transcript and the active provider, and runs one turn at a time.
pub struct ConversationEngine {
    factory: Arc<dyn ProviderFactory>,
    resolver: Option<Arc<PageContextResolver>>,
    router: SummarizationRouter,
    events: mpsc::UnboundedSender<EngineEvent>,
    state: EngineState,
    settings: Option<Settings>,
    provider: Option<Box<dyn LlmProvider>>,
    summarizer: Option<Arc<dyn Summarizer>>,
    transcript: Vec<Turn>,
    include_context: bool,
    model_name: String,
}

impl ConversationEngine {
    pub fn new(factory: Arc<dyn ProviderFactory>) -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let engine = Self {
            factory,
            resolver: None,
            router: SummarizationRouter::new(),
            events,
            state: EngineState::Uninitialized,
            settings: None,
            provider: None,
            summarizer: None,
            transcript: Vec::new(),
            include_context: false,
            model_name: String::new(),
        };
        (engine, rx)
    }

    pub fn with_page_context(mut self, resolver: Arc<PageContextResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == EngineState::Ready
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    /// Display name of the active model, `"Unavailable"` after a failed initialization.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn settings(&self) -> Option<&Settings> {
        self.settings.as_ref()
    }

    pub fn active_provider(&self) -> Option<ProviderId> {
        self.provider.as_ref().map(|p| p.provider_id())
    }

    pub fn is_context_included(&self) -> bool {
        self.include_context
    }

    /// Select and probe the active provider of `settings`. Any previous
    /// provider, session and summarizer are dropped first; the transcript is kept.
    #[instrument(skip(self, settings), fields(provider = %settings.active_provider))]
    pub async fn initialize(&mut self, settings: Settings) -> Result<()> {
        self.provider = None;
        self.summarizer = None;
        self.state = EngineState::Initializing;
        self.status(
            format!("Connecting to {}...", settings.active_provider.label()),
            Severity::Info,
        );

        let result = self.create_provider(&settings).await;
        self.settings = Some(settings);

        match result {
            Ok((provider, ready)) => {
                if let Some(notice) = ready.notice {
                    self.status(notice, Severity::Info);
                }
                self.summarizer = provider.summarizer();
                self.model_name = provider.display_name();
                info!(model = %self.model_name, summarizer = self.summarizer.is_some(), "provider ready");
                self.provider = Some(provider);
                self.state = EngineState::Ready;
                self.status("AI ready! Start chatting below.".to_string(), Severity::Success);
                Ok(())
            }
            Err(e) => {
                warn!("provider initialization failed: {}", e);
                self.model_name = UNAVAILABLE_MODEL_NAME.to_string();
                self.state = EngineState::Unavailable(e.to_string());
                self.status(e.to_string(), Severity::Error);
                Err(e)
            }
        }
    }

    /// Make `id` the active provider with `config` and re-initialize.
    pub async fn switch_provider(&mut self, id: ProviderId, config: ProviderConfig) -> Result<()> {
        let next = self
            .settings
            .clone()
            .unwrap_or_default()
            .with_provider(id, config);
        self.initialize(next).await
    }

    /// Flip the one-shot page-context toggle; returns the new value.
    pub fn toggle_context_inclusion(&mut self) -> bool {
        self.include_context = !self.include_context;
        if self.include_context {
            self.status(
                "Page context will be included in next message".to_string(),
                Severity::Info,
            );
        }
        self.include_context
    }

    pub fn clear_conversation(&mut self) {
        info!(turns = self.transcript.len(), "clearing conversation");
        self.transcript.clear();
        self.include_context = false;
    }

    /// Run one turn end to end. Both turns are appended only after the reply
    /// is fully resolved; a failed turn leaves the transcript untouched.
    pub async fn submit_turn(&mut self, text: &str) -> TurnOutcome {
        let prompt = text.trim();
        if prompt.is_empty() || self.state != EngineState::Ready {
            debug!(state = ?self.state, "turn rejected");
            return TurnOutcome::Rejected;
        }

        self.state = EngineState::AwaitingResponse;
        let include_context = std::mem::take(&mut self.include_context);
        let page = if include_context {
            self.resolve_context().await
        } else {
            None
        };

        let user_turn_id = uuid::Uuid::new_v4().to_string();
        let assistant_turn_id = uuid::Uuid::new_v4().to_string();
        self.emit(EngineEvent::UserTurn {
            turn_id: user_turn_id.clone(),
            text: prompt.to_string(),
            context_title: page.as_ref().map(|p| p.title.clone()),
        });

        let result = self
            .run_turn(prompt, page.as_ref(), &assistant_turn_id)
            .await;
        self.state = EngineState::Ready;

        match result {
            Ok(reply) => {
                let display = if reply.summarized {
                    display_summary(&reply.text)
                } else {
                    reply.text.clone()
                };
                self.transcript
                    .push(Turn::with_id(user_turn_id, TurnRole::User, prompt, page));
                self.transcript.push(Turn::with_id(
                    assistant_turn_id.clone(),
                    TurnRole::Assistant,
                    reply.text.clone(),
                    None,
                ));
                self.emit(EngineEvent::AssistantCompleted {
                    turn_id: assistant_turn_id,
                    text: display,
                });
                TurnOutcome::Completed {
                    text: reply.text,
                    summarized: reply.summarized,
                }
            }
            Err(e) => {
                warn!("turn failed: {}", e);
                self.emit(EngineEvent::Error {
                    message: format!("Sorry, I encountered an error: {e}"),
                });
                self.status("Error generating response".to_string(), Severity::Error);
                TurnOutcome::Failed(e)
            }
        }
    }

    async fn create_provider(
        &self,
        settings: &Settings,
    ) -> Result<(Box<dyn LlmProvider>, ProviderReady)> {
        let mut provider = self.factory.create(settings)?;
        let ready = provider.initialize().await?;
        Ok((provider, ready))
    }

    async fn run_turn(
        &self,
        prompt: &str,
        page: Option<&PageContext>,
        turn_id: &str,
    ) -> Result<TurnReply> {
        let provider = self
            .provider
            .as_deref()
            .ok_or_else(|| Error::CapabilityUnavailable("no active provider".to_string()))?;
        let settings = self
            .settings
            .as_ref()
            .ok_or_else(|| Error::Config("engine has no settings".to_string()))?;
        let max_chars = settings.context.max_context_chars;

        if let Route::Summarize { summarizer, page } =
            self.router.route(prompt, page, self.summarizer.as_ref())
        {
            info!(url = %page.url, "routing turn to summarizer");
            let summary = summarizer
                .summarize(&truncate_chars(&page.text, max_chars))
                .await?;
            let summary = summary.trim();
            if summary.is_empty() {
                return Err(Error::MalformedResponse(
                    "summarizer returned an empty summary".to_string(),
                ));
            }
            return Ok(TurnReply {
                text: summary.to_string(),
                summarized: true,
            });
        }

        let request = LlmRequest::for_turn(&self.transcript, compose_prompt(prompt, page, max_chars))
            .with_system(settings.generation.system_prompt.clone())
            .with_generation(settings.generation.temperature, settings.generation.max_tokens);
        debug!(messages = request.messages.len(), provider = %provider.provider_id(), "dispatching completion");

        let streaming = provider.supports_streaming();
        let mut stream = provider.complete(&request).await?;
        let mut latest = String::new();
        while let Some(snapshot) = stream.next().await {
            latest = snapshot?;
            if streaming {
                self.emit(EngineEvent::AssistantUpdated {
                    turn_id: turn_id.to_string(),
                    text: latest.clone(),
                });
            }
        }

        let text = latest.trim();
        if text.is_empty() {
            return Err(Error::MalformedResponse(
                "provider returned an empty response".to_string(),
            ));
        }
        Ok(TurnReply {
            text: text.to_string(),
            summarized: false,
        })
    }

    async fn resolve_context(&self) -> Option<PageContext> {
        let Some(resolver) = &self.resolver else {
            self.status(
                "Page context is not available here".to_string(),
                Severity::Warning,
            );
            return None;
        };

        match resolver.resolve().await {
            Ok(context) => Some(context),
            Err(e) => {
                warn!("page context resolution failed: {}", e);
                self.status(
                    format!("Could not read page context: {e}"),
                    Severity::Warning,
                );
                None
            }
        }
    }

    fn status(&self, message: String, severity: Severity) {
        self.emit(EngineEvent::Status { message, severity });
    }

    fn emit(&self, event: EngineEvent) {
        if self.events.send(event).is_err() {
            debug!("engine event dropped, no listener");
        }
    }
}
