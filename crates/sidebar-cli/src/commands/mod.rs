use anyhow::Result;
use sidebar_agents::{ConversationEngine, DefaultProviderFactory, EngineEvent, PageContextResolver};
use sidebar_config::{ProviderId, Settings, SettingsStore};
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::warn;

use crate::page::HttpPageExtractor;
use crate::render::TerminalView;

pub mod ask;
pub mod chat;
pub mod config;

/// Stored settings, with `provider` made active when given.
pub fn session_settings(store: &dyn SettingsStore, provider: Option<ProviderId>) -> Result<Settings> {
    let settings = store.load()?;
    Ok(match provider {
        Some(id) => settings.with_provider(id, settings.provider_config(id)),
        None => settings,
    })
}

pub fn build_engine(
    settings: &Settings,
    page: Option<&str>,
) -> Result<(ConversationEngine, UnboundedReceiver<EngineEvent>)> {
    let client = reqwest::Client::new();
    let factory = DefaultProviderFactory::new().with_client(client.clone());
    let (engine, events) = ConversationEngine::new(Arc::new(factory));

    let engine = match page {
        Some(url) => {
            let extractor = HttpPageExtractor::new(client, url, settings.timeouts.probe())?;
            let resolver = PageContextResolver::new(Arc::new(extractor), &settings.context);
            engine.with_page_context(Arc::new(resolver))
        }
        None => engine,
    };
    Ok((engine, events))
}

/// Await `operation` while rendering the events it emits.
pub async fn drive<F, O, E>(
    operation: F,
    events: &mut UnboundedReceiver<EngineEvent>,
    view: &mut TerminalView<O, E>,
) -> F::Output
where
    F: Future,
    O: Write,
    E: Write,
{
    tokio::pin!(operation);
    let output = loop {
        tokio::select! {
            output = &mut operation => break output,
            Some(event) = events.recv() => show(view, event),
        }
    };
    drain(events, view);
    output
}

/// Render events that are already queued.
pub fn drain<O: Write, E: Write>(
    events: &mut UnboundedReceiver<EngineEvent>,
    view: &mut TerminalView<O, E>,
) {
    while let Ok(event) = events.try_recv() {
        show(view, event);
    }
}

fn show<O: Write, E: Write>(view: &mut TerminalView<O, E>, event: EngineEvent) {
    if let Err(e) = view.show(event) {
        warn!("failed to write to terminal: {}", e);
    }
}
