use anyhow::{Context, Result, bail};
use sidebar_agents::TurnOutcome;
use sidebar_config::{ProviderId, SettingsStore};

use super::{build_engine, drive, session_settings};
use crate::render::TerminalView;

pub async fn run(
    store: &dyn SettingsStore,
    prompt: &str,
    provider: Option<ProviderId>,
    page: Option<&str>,
    include_context: bool,
) -> Result<()> {
    let settings = session_settings(store, provider)?;
    let (mut engine, mut events) = build_engine(&settings, page)?;
    let mut view = TerminalView::stdio();

    drive(engine.initialize(settings), &mut events, &mut view)
        .await
        .context("no model is available")?;

    if include_context {
        engine.toggle_context_inclusion();
    }

    match drive(engine.submit_turn(prompt), &mut events, &mut view).await {
        TurnOutcome::Completed { .. } => Ok(()),
        TurnOutcome::Rejected => bail!("nothing to ask: the prompt is empty"),
        TurnOutcome::Failed(e) => {
            view.abandon_stream()?;
            Err(anyhow::Error::new(e).context("the model did not answer"))
        }
    }
}
