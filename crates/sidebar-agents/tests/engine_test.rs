use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use sidebar_agents::{
    ActiveTab, ConversationEngine, EngineEvent, EngineState, LlmProvider, LlmRequest, LlmStream,
    PageContextResolver, PageExtractor, ProviderFactory, ProviderReady, Severity, Summarizer,
    TurnOutcome,
};
use sidebar_common::{Error, PageContext, Result, TabId, TurnRole};
use sidebar_config::{ContextSettings, ProviderConfig, ProviderId, Settings};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

enum Step {
    Snapshots(Vec<&'static str>),
    Timeout,
    BrokenStream,
}

#[derive(Default)]
struct Shared {
    script: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<(ProviderId, LlmRequest)>>,
    summarized: Mutex<Vec<String>>,
    summarizer_fails: AtomicBool,
}

struct ScriptedProvider {
    id: ProviderId,
    fail_init: bool,
    with_summarizer: bool,
    streaming: bool,
    shared: Arc<Shared>,
}

struct RecordingSummarizer {
    shared: Arc<Shared>,
}

#[async_trait]
impl Summarizer for RecordingSummarizer {
    async fn summarize(&self, text: &str) -> Result<String> {
        self.shared.summarized.lock().unwrap().push(text.to_string());
        if self.shared.summarizer_fails.load(Ordering::SeqCst) {
            return Err(Error::CapabilityUnavailable(
                "summarizer session was destroyed".to_string(),
            ));
        }
        Ok(" The page explains ownership. ".to_string())
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn provider_id(&self) -> ProviderId {
        self.id
    }

    fn display_name(&self) -> String {
        format!("scripted ({})", self.id)
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    async fn initialize(&mut self) -> Result<ProviderReady> {
        if self.fail_init {
            return Err(Error::AuthMissing(
                "no credential configured for openai (set OPENAI_API_KEY)".to_string(),
            ));
        }
        Ok(ProviderReady::default())
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmStream> {
        self.shared
            .requests
            .lock()
            .unwrap()
            .push((self.id, request.clone()));
        let step = self
            .shared
            .script
            .lock()
            .unwrap()
            .pop_front()
            .expect("script exhausted");
        match step {
            Step::Snapshots(snapshots) => Ok(stream::iter(
                snapshots.into_iter().map(|s| Ok(s.to_string())),
            )
            .boxed()),
            Step::Timeout => Err(Error::Timeout(Duration::from_secs(60))),
            Step::BrokenStream => Ok(stream::iter(vec![
                Ok("partial".to_string()),
                Err(Error::ConnectivityFailed("stream interrupted".to_string())),
            ])
            .boxed()),
        }
    }

    fn summarizer(&self) -> Option<Arc<dyn Summarizer>> {
        self.with_summarizer.then(|| {
            Arc::new(RecordingSummarizer {
                shared: self.shared.clone(),
            }) as Arc<dyn Summarizer>
        })
    }
}

#[derive(Default)]
struct ScriptedFactory {
    shared: Arc<Shared>,
    failing: Option<ProviderId>,
    summarizer_on: Option<ProviderId>,
    single_shot: bool,
}

impl ProviderFactory for ScriptedFactory {
    fn create(&self, settings: &Settings) -> Result<Box<dyn LlmProvider>> {
        Ok(Box::new(ScriptedProvider {
            id: settings.active_provider,
            fail_init: self.failing == Some(settings.active_provider),
            with_summarizer: self.summarizer_on == Some(settings.active_provider),
            streaming: !self.single_shot,
            shared: self.shared.clone(),
        }))
    }
}

struct FixedPage {
    fail: bool,
}

#[async_trait]
impl PageExtractor for FixedPage {
    async fn active_tab(&self) -> Result<ActiveTab> {
        Ok(ActiveTab {
            id: TabId(1),
            url: "https://doc.rust-lang.org/book/ch04-01.html".to_string(),
        })
    }

    async fn extract(&self, tab: &ActiveTab, _max_chars: usize) -> Result<PageContext> {
        if self.fail {
            return Err(Error::PageContext("cannot read chrome:// pages".to_string()));
        }
        Ok(PageContext::new(
            "What is Ownership?",
            tab.url.clone(),
            "Ownership is a set of rules that govern how a Rust program manages memory.",
        ))
    }
}

fn script(shared: &Shared, steps: Vec<Step>) {
    shared.script.lock().unwrap().extend(steps);
}

fn settings(id: ProviderId) -> Settings {
    let mut settings = Settings::default().with_provider(id, ProviderConfig::default());
    settings.context.max_context_chars = 20;
    settings
}

fn drain(rx: &mut UnboundedReceiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

async fn ready_engine(
    factory: ScriptedFactory,
    page: Option<FixedPage>,
) -> (ConversationEngine, UnboundedReceiver<EngineEvent>) {
    let (mut engine, mut rx) = ConversationEngine::new(Arc::new(factory));
    if let Some(page) = page {
        let resolver = PageContextResolver::new(Arc::new(page), &ContextSettings::default());
        engine = engine.with_page_context(Arc::new(resolver));
    }
    engine.initialize(settings(ProviderId::OpenAi)).await.unwrap();
    drain(&mut rx);
    (engine, rx)
}

fn last_user_message(request: &LlmRequest) -> &str {
    &request.messages.last().unwrap().content
}

#[tokio::test]
async fn initialize_reports_ready() {
    let (mut engine, mut rx) = ConversationEngine::new(Arc::new(ScriptedFactory::default()));
    assert_eq!(engine.state(), &EngineState::Uninitialized);

    engine.initialize(settings(ProviderId::OpenAi)).await.unwrap();

    assert!(engine.is_ready());
    assert_eq!(engine.model_name(), "scripted (openai)");
    assert_eq!(engine.active_provider(), Some(ProviderId::OpenAi));
    assert!(drain(&mut rx).contains(&EngineEvent::Status {
        message: "AI ready! Start chatting below.".to_string(),
        severity: Severity::Success,
    }));
}

#[tokio::test]
async fn failed_initialize_leaves_engine_unavailable() {
    let factory = ScriptedFactory {
        failing: Some(ProviderId::OpenAi),
        ..Default::default()
    };
    let (mut engine, mut rx) = ConversationEngine::new(Arc::new(factory));

    let err = engine
        .initialize(settings(ProviderId::OpenAi))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AuthMissing(_)));
    assert!(matches!(engine.state(), EngineState::Unavailable(msg) if msg.contains("OPENAI_API_KEY")));
    assert_eq!(engine.model_name(), "Unavailable");
    assert!(drain(&mut rx).iter().any(|e| matches!(
        e,
        EngineEvent::Status { severity: Severity::Error, .. }
    )));

    assert!(matches!(engine.submit_turn("Hello").await, TurnOutcome::Rejected));
    assert!(engine.transcript().is_empty());

    engine
        .switch_provider(ProviderId::Ollama, ProviderConfig::default())
        .await
        .unwrap();
    assert!(engine.is_ready());
}

#[tokio::test]
async fn completed_turn_appends_user_then_assistant() {
    let factory = ScriptedFactory::default();
    let shared = factory.shared.clone();
    script(&shared, vec![Step::Snapshots(vec!["Paris."])]);
    let (mut engine, mut rx) = ready_engine(factory, None).await;

    let outcome = engine.submit_turn("  What is the capital of France?  ").await;
    assert!(matches!(outcome, TurnOutcome::Completed { ref text, summarized: false } if text == "Paris."));

    let transcript = engine.transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].role, TurnRole::User);
    assert_eq!(transcript[0].text, "What is the capital of France?");
    assert!(transcript[0].attached_context.is_none());
    assert_eq!(transcript[1].role, TurnRole::Assistant);
    assert_eq!(transcript[1].text, "Paris.");
    assert!(engine.is_ready());

    let events = drain(&mut rx);
    assert!(matches!(&events[0], EngineEvent::UserTurn { turn_id, context_title: None, .. } if *turn_id == transcript[0].id));
    assert!(matches!(
        events.last(),
        Some(EngineEvent::AssistantCompleted { turn_id, text }) if *turn_id == transcript[1].id && text == "Paris."
    ));

    let requests = shared.requests.lock().unwrap();
    let (_, request) = &requests[0];
    assert!(request.system.is_some());
    assert_eq!(request.messages.len(), 1);
}

#[tokio::test]
async fn snapshots_are_forwarded_and_final_text_trimmed() {
    let factory = ScriptedFactory::default();
    script(&factory.shared, vec![Step::Snapshots(vec!["Hel", "Hello", "Hello world \n"])]);
    let (mut engine, mut rx) = ready_engine(factory, None).await;

    engine.submit_turn("Greet me").await;

    let updates: Vec<String> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            EngineEvent::AssistantUpdated { text, .. } => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(updates, vec!["Hel", "Hello", "Hello world \n"]);
    assert_eq!(engine.transcript()[1].text, "Hello world");
}

#[tokio::test]
async fn single_shot_backend_reports_only_the_completed_reply() {
    let factory = ScriptedFactory {
        single_shot: true,
        ..Default::default()
    };
    script(&factory.shared, vec![Step::Snapshots(vec!["Hello", "Hello world"])]);
    let (mut engine, mut rx) = ready_engine(factory, None).await;

    engine.submit_turn("Greet me").await;

    let events = drain(&mut rx);
    assert!(!events
        .iter()
        .any(|e| matches!(e, EngineEvent::AssistantUpdated { .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::AssistantCompleted { text, .. } if text == "Hello world"
    )));
}

#[tokio::test]
async fn history_is_replayed_in_order() {
    let factory = ScriptedFactory::default();
    let shared = factory.shared.clone();
    script(
        &shared,
        vec![
            Step::Snapshots(vec!["Nice to meet you, Ada."]),
            Step::Snapshots(vec!["Your name is Ada."]),
        ],
    );
    let (mut engine, _rx) = ready_engine(factory, None).await;

    engine.submit_turn("My name is Ada.").await;
    engine.submit_turn("What is my name?").await;

    let requests = shared.requests.lock().unwrap();
    let contents: Vec<&str> = requests[1]
        .1
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(
        contents,
        vec!["My name is Ada.", "Nice to meet you, Ada.", "What is my name?"]
    );
    assert_eq!(engine.transcript().len(), 4);
}

#[tokio::test]
async fn failed_turn_leaves_transcript_untouched() {
    let factory = ScriptedFactory::default();
    let shared = factory.shared.clone();
    script(
        &shared,
        vec![
            Step::Snapshots(vec!["First answer."]),
            Step::Timeout,
            Step::Snapshots(vec!["Third answer."]),
        ],
    );
    let (mut engine, mut rx) = ready_engine(factory, None).await;

    engine.submit_turn("first").await;
    drain(&mut rx);

    let outcome = engine.submit_turn("second").await;
    assert!(matches!(outcome, TurnOutcome::Failed(Error::Timeout(_))));
    assert_eq!(engine.transcript().len(), 2);
    assert!(engine.is_ready());

    let events = drain(&mut rx);
    assert!(events.contains(&EngineEvent::Error {
        message: "Sorry, I encountered an error: request timed out after 60s".to_string(),
    }));
    assert!(events.contains(&EngineEvent::Status {
        message: "Error generating response".to_string(),
        severity: Severity::Error,
    }));

    engine.submit_turn("third").await;
    let requests = shared.requests.lock().unwrap();
    let contents: Vec<&str> = requests[2]
        .1
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, vec!["first", "First answer.", "third"]);
}

#[tokio::test]
async fn stream_error_after_partial_text_fails_the_turn() {
    let factory = ScriptedFactory::default();
    script(&factory.shared, vec![Step::BrokenStream]);
    let (mut engine, mut rx) = ready_engine(factory, None).await;

    let outcome = engine.submit_turn("Tell me a story").await;
    assert!(matches!(outcome, TurnOutcome::Failed(Error::ConnectivityFailed(_))));
    assert!(engine.transcript().is_empty());

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(e, EngineEvent::AssistantUpdated { text, .. } if text == "partial")));
    assert!(!events.iter().any(|e| matches!(e, EngineEvent::AssistantCompleted { .. })));
}

#[tokio::test]
async fn empty_reply_is_a_failure() {
    let factory = ScriptedFactory::default();
    script(&factory.shared, vec![Step::Snapshots(vec!["   "])]);
    let (mut engine, _rx) = ready_engine(factory, None).await;

    let outcome = engine.submit_turn("Hello").await;
    assert!(matches!(outcome, TurnOutcome::Failed(Error::MalformedResponse(_))));
    assert!(engine.transcript().is_empty());
}

#[tokio::test]
async fn blank_or_premature_turns_are_rejected() {
    let (mut engine, mut rx) = ConversationEngine::new(Arc::new(ScriptedFactory::default()));
    assert!(matches!(engine.submit_turn("Hello").await, TurnOutcome::Rejected));
    assert!(drain(&mut rx).is_empty());

    engine.initialize(settings(ProviderId::OpenAi)).await.unwrap();
    drain(&mut rx);
    assert!(matches!(engine.submit_turn("   \n").await, TurnOutcome::Rejected));
    assert!(drain(&mut rx).is_empty());
    assert!(engine.transcript().is_empty());
}

#[tokio::test]
async fn context_is_attached_to_one_turn_only() {
    let factory = ScriptedFactory::default();
    let shared = factory.shared.clone();
    script(
        &shared,
        vec![
            Step::Snapshots(vec!["It is about ownership."]),
            Step::Snapshots(vec!["Sure."]),
        ],
    );
    let (mut engine, mut rx) = ready_engine(factory, Some(FixedPage { fail: false })).await;

    assert!(engine.toggle_context_inclusion());
    assert!(drain(&mut rx).contains(&EngineEvent::Status {
        message: "Page context will be included in next message".to_string(),
        severity: Severity::Info,
    }));

    engine.submit_turn("What is this page about?").await;
    assert!(!engine.is_context_included());
    engine.submit_turn("Thanks").await;

    let requests = shared.requests.lock().unwrap();
    assert_eq!(
        last_user_message(&requests[0].1),
        "Context from page \"What is Ownership?\" (https://doc.rust-lang.org/book/ch04-01.html):\n\n\
         Ownership is a set o...\n\n---\n\nUser question: What is this page about?"
    );
    // Replayed turns carry only what the user typed.
    assert_eq!(requests[1].1.messages[0].content, "What is this page about?");
    assert_eq!(last_user_message(&requests[1].1), "Thanks");

    let transcript = engine.transcript();
    assert_eq!(
        transcript[0].attached_context.as_ref().map(|c| c.title.as_str()),
        Some("What is Ownership?")
    );
    assert!(transcript[2].attached_context.is_none());

    assert!(drain(&mut rx).iter().any(|e| matches!(
        e,
        EngineEvent::UserTurn { context_title: Some(title), .. } if title == "What is Ownership?"
    )));
}

#[tokio::test]
async fn unreadable_page_degrades_to_plain_turn() {
    let factory = ScriptedFactory::default();
    let shared = factory.shared.clone();
    script(&shared, vec![Step::Snapshots(vec!["Hi!"])]);
    let (mut engine, mut rx) = ready_engine(factory, Some(FixedPage { fail: true })).await;

    engine.toggle_context_inclusion();
    let outcome = engine.submit_turn("Hello").await;
    assert!(matches!(outcome, TurnOutcome::Completed { .. }));

    assert!(drain(&mut rx).iter().any(|e| matches!(
        e,
        EngineEvent::Status { severity: Severity::Warning, .. }
    )));
    assert_eq!(last_user_message(&shared.requests.lock().unwrap()[0].1), "Hello");
    assert!(engine.transcript()[0].attached_context.is_none());
}

#[tokio::test]
async fn summary_requests_use_the_summarizer() {
    let factory = ScriptedFactory {
        summarizer_on: Some(ProviderId::OpenAi),
        ..Default::default()
    };
    let shared = factory.shared.clone();
    let (mut engine, mut rx) = ready_engine(factory, Some(FixedPage { fail: false })).await;

    engine.toggle_context_inclusion();
    let outcome = engine.submit_turn("tl;dr please").await;

    assert!(matches!(
        outcome,
        TurnOutcome::Completed { ref text, summarized: true } if text == "The page explains ownership."
    ));
    assert!(shared.requests.lock().unwrap().is_empty());
    assert_eq!(
        shared.summarized.lock().unwrap().as_slice(),
        ["Ownership is a set o..."]
    );
    assert_eq!(engine.transcript()[1].text, "The page explains ownership.");
    assert!(drain(&mut rx).iter().any(|e| matches!(
        e,
        EngineEvent::AssistantCompleted { text, .. } if text == "Summary:\n\nThe page explains ownership."
    )));
}

#[tokio::test]
async fn failing_summarizer_fails_the_turn_without_fallback() {
    let factory = ScriptedFactory {
        summarizer_on: Some(ProviderId::OpenAi),
        ..Default::default()
    };
    let shared = factory.shared.clone();
    shared.summarizer_fails.store(true, Ordering::SeqCst);
    let (mut engine, mut rx) = ready_engine(factory, Some(FixedPage { fail: false })).await;

    engine.toggle_context_inclusion();
    let outcome = engine.submit_turn("tl;dr").await;

    assert!(matches!(
        outcome,
        TurnOutcome::Failed(Error::CapabilityUnavailable(_))
    ));
    assert_eq!(shared.summarized.lock().unwrap().len(), 1);
    assert!(shared.requests.lock().unwrap().is_empty());
    assert!(engine.transcript().is_empty());
    assert!(engine.is_ready());
    assert!(drain(&mut rx).iter().any(|e| matches!(
        e,
        EngineEvent::Error { message } if message.starts_with("Sorry, I encountered an error")
    )));
}

#[tokio::test]
async fn summary_keyword_without_context_goes_to_completion() {
    let factory = ScriptedFactory {
        summarizer_on: Some(ProviderId::OpenAi),
        ..Default::default()
    };
    let shared = factory.shared.clone();
    script(&shared, vec![Step::Snapshots(vec!["Nothing to summarize yet."])]);
    let (mut engine, _rx) = ready_engine(factory, Some(FixedPage { fail: false })).await;

    let outcome = engine.submit_turn("summarize").await;
    assert!(matches!(outcome, TurnOutcome::Completed { summarized: false, .. }));
    assert!(shared.summarized.lock().unwrap().is_empty());
    assert_eq!(shared.requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn switching_provider_keeps_the_conversation() {
    let factory = ScriptedFactory::default();
    let shared = factory.shared.clone();
    script(
        &shared,
        vec![
            Step::Snapshots(vec!["Noted, Ada."]),
            Step::Snapshots(vec!["Ada."]),
        ],
    );
    let (mut engine, _rx) = ready_engine(factory, None).await;

    engine.submit_turn("My name is Ada.").await;
    engine
        .switch_provider(ProviderId::Anthropic, ProviderConfig::default())
        .await
        .unwrap();
    assert_eq!(engine.model_name(), "scripted (anthropic)");
    assert_eq!(engine.settings().unwrap().active_provider, ProviderId::Anthropic);
    assert_eq!(engine.transcript().len(), 2);

    engine.submit_turn("What is my name?").await;

    let requests = shared.requests.lock().unwrap();
    let (provider, request) = &requests[1];
    assert_eq!(*provider, ProviderId::Anthropic);
    assert_eq!(request.messages.len(), 3);
    assert_eq!(request.messages[0].content, "My name is Ada.");
}

#[tokio::test]
async fn switching_provider_drops_the_old_summarizer() {
    let factory = ScriptedFactory {
        summarizer_on: Some(ProviderId::OpenAi),
        ..Default::default()
    };
    let shared = factory.shared.clone();
    script(&shared, vec![Step::Snapshots(vec!["Here is a short summary."])]);
    let (mut engine, _rx) = ready_engine(factory, Some(FixedPage { fail: false })).await;

    engine.toggle_context_inclusion();
    let first = engine.submit_turn("tl;dr").await;
    assert!(matches!(first, TurnOutcome::Completed { summarized: true, .. }));
    assert_eq!(shared.summarized.lock().unwrap().len(), 1);

    engine
        .switch_provider(ProviderId::Anthropic, ProviderConfig::default())
        .await
        .unwrap();
    engine.toggle_context_inclusion();
    let second = engine.submit_turn("tl;dr").await;

    assert!(matches!(second, TurnOutcome::Completed { summarized: false, .. }));
    assert_eq!(shared.summarized.lock().unwrap().len(), 1);
    let requests = shared.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, ProviderId::Anthropic);
    assert!(last_user_message(&requests[0].1).contains("tl;dr"));
}

#[tokio::test]
async fn clear_resets_transcript_and_toggle() {
    let factory = ScriptedFactory::default();
    script(&factory.shared, vec![Step::Snapshots(vec!["Hi"])]);
    let (mut engine, _rx) = ready_engine(factory, Some(FixedPage { fail: false })).await;

    engine.submit_turn("Hello").await;
    engine.toggle_context_inclusion();
    engine.clear_conversation();

    assert!(engine.transcript().is_empty());
    assert!(!engine.is_context_included());
    assert!(engine.is_ready());
}
