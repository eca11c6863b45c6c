use anyhow::Result;
use sidebar_agents::{ConversationEngine, EngineEvent, TurnOutcome};
use sidebar_common::TurnRole;
use sidebar_config::{ProviderId, SettingsStore};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

use super::{build_engine, drain, drive, session_settings};
use crate::render::TerminalView;

const HELP: &str = "Commands:
  /context          attach the page to the next message
  /provider <id>    switch to on_device, ollama, gemini, openai or anthropic
  /clear            start a new conversation
  /history          print the conversation so far
  /quit             leave";

/// A line typed at the chat prompt.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Message(&'a str),
    Context,
    Provider(Option<&'a str>),
    Clear,
    History,
    Help,
    Quit,
    Unknown(&'a str),
    Blank,
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Blank;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Message(line);
    };

    let mut parts = command.split_whitespace();
    match parts.next().unwrap_or_default() {
        "context" => Input::Context,
        "provider" => Input::Provider(parts.next()),
        "clear" => Input::Clear,
        "history" => Input::History,
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => Input::Unknown(other),
    }
}

pub async fn run(
    store: &dyn SettingsStore,
    provider: Option<ProviderId>,
    page: Option<&str>,
) -> Result<()> {
    let settings = session_settings(store, provider)?;
    let (mut engine, mut events) = build_engine(&settings, page)?;
    let mut view = TerminalView::stdio();

    if drive(engine.initialize(settings), &mut events, &mut view)
        .await
        .is_err()
    {
        eprintln!("Use /provider <id> to choose another backend, /help for commands.");
    } else {
        println!("Chatting with {}. Type /help for commands.", engine.model_name());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_input(&line) {
            Input::Blank => {}
            Input::Quit => break,
            Input::Help => println!("{HELP}"),
            Input::Unknown(command) => eprintln!("Unknown command /{command}. Type /help."),
            Input::Clear => {
                engine.clear_conversation();
                println!("Conversation cleared.");
            }
            Input::History => print_history(&engine),
            Input::Context => {
                if page.is_none() {
                    eprintln!("No page to attach; start with --page <URL>.");
                } else if !engine.toggle_context_inclusion() {
                    println!("Page context will not be included.");
                }
                drain(&mut events, &mut view);
            }
            Input::Provider(None) => eprintln!("Usage: /provider <id>"),
            Input::Provider(Some(name)) => {
                switch_provider(&mut engine, name, &mut events, &mut view).await
            }
            Input::Message(text) => {
                match drive(engine.submit_turn(text), &mut events, &mut view).await {
                    TurnOutcome::Completed { .. } => {}
                    TurnOutcome::Failed(_) => view.abandon_stream()?,
                    TurnOutcome::Rejected => {
                        eprintln!("The model is not ready. Use /provider <id> to pick one.")
                    }
                }
            }
        }
    }

    info!(turns = engine.transcript().len(), "chat session ended");
    Ok(())
}

async fn switch_provider<O: Write, E: Write>(
    engine: &mut ConversationEngine,
    name: &str,
    events: &mut UnboundedReceiver<EngineEvent>,
    view: &mut TerminalView<O, E>,
) {
    let id = match name.parse::<ProviderId>() {
        Ok(id) => id,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };
    let config = engine
        .settings()
        .map(|settings| settings.provider_config(id))
        .unwrap_or_default();

    if drive(engine.switch_provider(id, config), events, view)
        .await
        .is_ok()
    {
        println!("Now chatting with {}.", engine.model_name());
    }
}

fn print_history(engine: &ConversationEngine) {
    if engine.transcript().is_empty() {
        println!("(no messages yet)");
        return;
    }
    for turn in engine.transcript() {
        let speaker = match turn.role {
            TurnRole::User => "you",
            TurnRole::Assistant => "assistant",
        };
        if let Some(context) = &turn.attached_context {
            println!("[page] {}", context.title);
        }
        println!("{speaker}> {}", turn.text);
    }
}
